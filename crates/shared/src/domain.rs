use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{AnalysisError, DomainError};

/// Literal prefix a URL must start with to be accepted for analysis.
pub const REQUIRED_URL_PREFIX: &str = "http";

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(pub u64);

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(SubmissionId);

impl SubmissionId {
    pub fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub url: String,
}

impl AnalysisRequest {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// Prefix test only: `"http"` itself passes, scheme and host are never parsed.
    pub fn is_valid(&self) -> bool {
        self.url.starts_with(REQUIRED_URL_PREFIX)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.is_valid() {
            Ok(())
        } else {
            Err(AnalysisError::InvalidUrl)
        }
    }
}

/// Star rating attached to a single review, always within `1..=5`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Rating(u8);

impl Rating {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 5;

    pub fn new(value: u8) -> Result<Self, DomainError> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::RatingOutOfRange(value))
        }
    }

    pub fn get(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Rating {
    type Error = DomainError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Rating> for u8 {
    fn from(value: Rating) -> Self {
        value.0
    }
}

/// Aggregate rating across all reviews, within `0.0..=5.0`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(try_from = "f32", into = "f32")]
pub struct AverageRating(f32);

impl AverageRating {
    pub const MAX: f32 = 5.0;

    pub fn new(value: f32) -> Result<Self, DomainError> {
        if (0.0..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(DomainError::AverageRatingOutOfRange(value))
        }
    }

    pub fn get(self) -> f32 {
        self.0
    }
}

impl TryFrom<f32> for AverageRating {
    type Error = DomainError;

    fn try_from(value: f32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AverageRating> for f32 {
    fn from(value: AverageRating) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactInfo {
    pub email: String,
    pub phone: String,
    pub address: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BusinessInfo {
    pub name: String,
    /// Where (or whether) a logo was found, e.g. "Found in header".
    pub logo: String,
    pub contact_info: ContactInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebsitePurpose {
    pub main_category: String,
    pub sub_category: String,
    pub description: String,
    pub target_audience: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub author: String,
    pub rating: Rating,
    pub date: NaiveDate,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialProof {
    pub total_reviews: u64,
    pub average_rating: AverageRating,
    pub featured_in: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteMetadata {
    pub description: String,
    pub keywords: Vec<String>,
    pub last_updated: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub business_info: BusinessInfo,
    pub website_purpose: WebsitePurpose,
    pub reviews: Vec<Review>,
    pub products: Vec<String>,
    pub social_proof: SocialProof,
    pub metadata: SiteMetadata,
}
