//! Plain-text and JSON rendering of analysis outcomes.

use std::fmt::Write as _;

use anyhow::{Context, Result};
use shared::{
    domain::AnalysisResult,
    error::{AnalysisError, ErrorBody},
};

use crate::controller::events::{UiErrorContext, UiEvent};

pub fn render_text(result: &AnalysisResult) -> String {
    let mut out = String::new();
    let business = &result.business_info;
    let purpose = &result.website_purpose;

    section(&mut out, "Business Information");
    let _ = writeln!(out, "{}", business.name);
    let _ = writeln!(out, "Logo: {}", business.logo);
    let _ = writeln!(out, "{}", business.contact_info.email);
    let _ = writeln!(out, "{}", business.contact_info.phone);
    let _ = writeln!(out, "{}", business.contact_info.address);
    let _ = writeln!(out, "Website Purpose: {}", purpose.description);
    let _ = writeln!(
        out,
        "Category: {} - {}",
        purpose.main_category, purpose.sub_category
    );
    let _ = writeln!(out, "Audience: {}", purpose.target_audience);

    section(&mut out, "Customer Reviews");
    let proof = &result.social_proof;
    let _ = writeln!(
        out,
        "{} out of 5 ({} reviews)",
        proof.average_rating.get(),
        proof.total_reviews
    );
    if !proof.featured_in.is_empty() {
        let _ = writeln!(out, "Featured in: {}", proof.featured_in.join(", "));
    }
    for review in &result.reviews {
        let _ = writeln!(out);
        let _ = writeln!(out, "{}  {}", review.author, review.date);
        let _ = writeln!(out, "{}", "*".repeat(usize::from(review.rating.get())));
        let _ = writeln!(out, "{}", review.text);
    }

    section(&mut out, "Products/Services");
    for product in &result.products {
        let _ = writeln!(out, "- {product}");
    }

    section(&mut out, "Website Metadata");
    let metadata = &result.metadata;
    let _ = writeln!(out, "Description: {}", metadata.description);
    let _ = writeln!(out, "Keywords: {}", metadata.keywords.join(", "));
    let _ = writeln!(out, "Last Updated: {}", metadata.last_updated);

    out
}

fn section(out: &mut String, title: &str) {
    if !out.is_empty() {
        out.push('\n');
    }
    let _ = writeln!(out, "== {title} ==");
}

pub fn render_json(result: &AnalysisResult) -> Result<String> {
    serde_json::to_string_pretty(result).context("failed to encode analysis result")
}

pub fn render_error_json(error: AnalysisError) -> Result<String> {
    serde_json::to_string_pretty(&ErrorBody::from(error)).context("failed to encode error")
}

/// One line (or block) per event for interactive mode.
pub fn render_ui_event(event: &UiEvent) -> String {
    match event {
        UiEvent::Info(message) => format!("[info] {message}"),
        UiEvent::Loading { submission } => format!("[#{submission}] Analyzing website..."),
        UiEvent::Ready { submission, result } => {
            format!("[#{submission}] Analysis complete\n{}", render_text(result))
        }
        UiEvent::Error(error) => {
            let prefix = match (error.context(), error.submission()) {
                (UiErrorContext::BackendStartup, _) => "[backend] ".to_string(),
                (_, Some(submission)) => format!("[#{submission}] "),
                (_, None) => String::new(),
            };
            format!("{prefix}Error: {}", error.message())
        }
    }
}

#[cfg(test)]
#[path = "tests/report_tests.rs"]
mod tests;
