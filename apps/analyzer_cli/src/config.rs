use std::{fs, path::Path, str::FromStr, sync::Arc, time::Duration};

use analyzer_core::{
    AnalysisProvider, ControllerConfig, MockAnalysisProvider, SubmitPolicy,
    UnavailableAnalysisProvider,
};
use anyhow::{anyhow, Context};

pub const DEFAULT_CONFIG_PATH: &str = "analyzer.toml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Mock,
    Unavailable,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Self::Mock),
            "unavailable" => Ok(Self::Unavailable),
            other => Err(anyhow!(
                "unknown provider '{other}' (expected 'mock' or 'unavailable')"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Text,
    Json,
}

impl FromStr for OutputFormat {
    type Err = anyhow::Error;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(anyhow!("unknown output format '{other}' (expected 'text' or 'json')")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub simulated_delay_ms: u64,
    pub analysis_timeout_ms: Option<u64>,
    pub submit_policy: SubmitPolicy,
    pub provider: ProviderKind,
    pub log_filter: String,
    pub output: OutputFormat,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            simulated_delay_ms: 2000,
            analysis_timeout_ms: None,
            submit_policy: SubmitPolicy::Reject,
            provider: ProviderKind::Mock,
            log_filter: "info".into(),
            output: OutputFormat::Text,
        }
    }
}

/// Setting key, its plain environment variable, and the `APP__` alias that wins over it.
const ENV_KEYS: &[(&str, &str, &str)] = &[
    (
        "simulated_delay_ms",
        "ANALYZER_SIMULATED_DELAY_MS",
        "APP__SIMULATED_DELAY_MS",
    ),
    (
        "analysis_timeout_ms",
        "ANALYZER_ANALYSIS_TIMEOUT_MS",
        "APP__ANALYSIS_TIMEOUT_MS",
    ),
    ("submit_policy", "ANALYZER_SUBMIT_POLICY", "APP__SUBMIT_POLICY"),
    ("provider", "ANALYZER_PROVIDER", "APP__PROVIDER"),
    ("log_filter", "ANALYZER_LOG", "APP__LOG_FILTER"),
    ("output", "ANALYZER_OUTPUT", "APP__OUTPUT"),
];

impl Settings {
    pub fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        match key {
            "simulated_delay_ms" => {
                self.simulated_delay_ms = value
                    .trim()
                    .parse()
                    .with_context(|| format!("invalid simulated_delay_ms '{value}'"))?;
            }
            "analysis_timeout_ms" => {
                self.analysis_timeout_ms = parse_optional_millis(value)
                    .with_context(|| format!("invalid analysis_timeout_ms '{value}'"))?;
            }
            "submit_policy" => self.submit_policy = value.parse()?,
            "provider" => self.provider = value.parse()?,
            "log_filter" => self.log_filter = value.trim().to_string(),
            "output" => self.output = value.parse()?,
            other => return Err(anyhow!("unknown setting '{other}'")),
        }
        Ok(())
    }

    /// Applies a flat TOML table. Bad entries are skipped and reported.
    pub fn apply_file(&mut self, raw: &str) -> Vec<String> {
        let table = match toml::from_str::<toml::Table>(raw) {
            Ok(table) => table,
            Err(err) => return vec![format!("ignoring unreadable config file: {err}")],
        };

        let mut warnings = Vec::new();
        for (key, value) in &table {
            let value = match value {
                toml::Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            if let Err(err) = self.set(key, &value) {
                warnings.push(format!("config file: {err:#}"));
            }
        }
        warnings
    }

    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Vec<String> {
        let mut warnings = Vec::new();
        for (key, plain, alias) in ENV_KEYS {
            for var in [*plain, *alias] {
                if let Some(value) = lookup(var) {
                    if let Err(err) = self.set(*key, &value) {
                        warnings.push(format!("{var}: {err:#}"));
                    }
                }
            }
        }
        warnings
    }

    pub fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            submit_policy: self.submit_policy,
            analysis_timeout: self.analysis_timeout_ms.map(Duration::from_millis),
        }
    }

    pub fn build_provider(&self) -> Arc<dyn AnalysisProvider> {
        match self.provider {
            ProviderKind::Mock => Arc::new(MockAnalysisProvider::new(Duration::from_millis(
                self.simulated_delay_ms,
            ))),
            ProviderKind::Unavailable => Arc::new(UnavailableAnalysisProvider),
        }
    }
}

/// Loads defaults, then the config file (if present), then the environment.
/// Returned warnings are logged once tracing is up.
pub fn load_settings(config_path: &Path) -> (Settings, Vec<String>) {
    let mut settings = Settings::default();
    let mut warnings = Vec::new();

    if let Ok(raw) = fs::read_to_string(config_path) {
        warnings.extend(settings.apply_file(&raw));
    }
    warnings.extend(settings.apply_env(|var| std::env::var(var).ok()));

    (settings, warnings)
}

fn parse_optional_millis(value: &str) -> anyhow::Result<Option<u64>> {
    let value = value.trim();
    if value.is_empty() || value.eq_ignore_ascii_case("none") || value == "0" {
        return Ok(None);
    }
    Ok(Some(value.parse()?))
}

#[cfg(test)]
#[path = "tests/config_tests.rs"]
mod tests;
