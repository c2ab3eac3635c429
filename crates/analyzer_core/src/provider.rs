//! Analysis providers: the seam where a real website-analysis backend plugs in.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use shared::domain::{AnalysisRequest, AnalysisResult};
use tracing::debug;

pub const DEFAULT_SIMULATED_DELAY: Duration = Duration::from_millis(2000);

/// Canned response returned by [`MockAnalysisProvider`] for every URL.
pub const SAMPLE_ANALYSIS_JSON: &str = r#"{
  "businessInfo": {
    "name": "TechGear Pro",
    "logo": "Found in header",
    "contactInfo": {
      "email": "support@techgearpro.com",
      "phone": "(555) 123-4567",
      "address": "123 Tech Street, Silicon Valley, CA"
    }
  },
  "websitePurpose": {
    "mainCategory": "E-commerce",
    "subCategory": "Electronics and Tech Accessories",
    "description": "Online retailer specializing in high-quality tech accessories and gadgets",
    "targetAudience": "Tech enthusiasts and professionals"
  },
  "reviews": [
    {
      "author": "John D.",
      "rating": 5,
      "date": "2024-01-15",
      "text": "Excellent selection of products and fast shipping!"
    },
    {
      "author": "Sarah M.",
      "rating": 4,
      "date": "2024-01-10",
      "text": "Good quality items but shipping could be faster"
    },
    {
      "author": "Mike R.",
      "rating": 5,
      "date": "2024-01-05",
      "text": "Best tech accessories I've found online"
    }
  ],
  "products": [
    "Phone Cases",
    "Laptop Accessories",
    "Charging Solutions",
    "Smart Home Devices"
  ],
  "socialProof": {
    "totalReviews": 1250,
    "averageRating": 4.7,
    "featuredIn": ["Tech Weekly", "Gadget Review", "Digital Trends"]
  },
  "metadata": {
    "description": "Premium tech accessories and gadgets for the modern professional",
    "keywords": ["tech accessories", "gadgets", "phone cases", "laptop accessories"],
    "lastUpdated": "2024-02-01"
  }
}"#;

pub fn sample_result() -> Result<AnalysisResult> {
    parse_analysis_payload(SAMPLE_ANALYSIS_JSON)
}

fn parse_analysis_payload(payload: &str) -> Result<AnalysisResult> {
    serde_json::from_str(payload).context("malformed analysis payload")
}

#[async_trait]
pub trait AnalysisProvider: Send + Sync {
    /// Called at most once per accepted submission. Any error is reported to
    /// the user as a generic analysis failure.
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult>;
}

/// Waits a fixed delay, then answers with the same payload whatever the URL.
pub struct MockAnalysisProvider {
    delay: Duration,
    payload: String,
}

impl MockAnalysisProvider {
    pub fn new(delay: Duration) -> Self {
        Self::with_payload(delay, SAMPLE_ANALYSIS_JSON)
    }

    pub fn with_payload(delay: Duration, payload: impl Into<String>) -> Self {
        Self {
            delay,
            payload: payload.into(),
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

impl Default for MockAnalysisProvider {
    fn default() -> Self {
        Self::new(DEFAULT_SIMULATED_DELAY)
    }
}

#[async_trait]
impl AnalysisProvider for MockAnalysisProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        debug!(
            url = %request.url,
            delay_ms = self.delay.as_millis() as u64,
            "simulating website analysis"
        );
        tokio::time::sleep(self.delay).await;
        parse_analysis_payload(&self.payload)
    }
}

pub struct UnavailableAnalysisProvider;

#[async_trait]
impl AnalysisProvider for UnavailableAnalysisProvider {
    async fn analyze(&self, request: &AnalysisRequest) -> Result<AnalysisResult> {
        Err(anyhow!("analysis backend unavailable for {}", request.url))
    }
}

#[cfg(test)]
#[path = "tests/provider_tests.rs"]
mod tests;
