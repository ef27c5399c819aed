use chrono::{DateTime, Utc};
use serde::Serialize;

/// Contract length as it appears in the source data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Contract {
    #[serde(rename = "Month-to-month")]
    MonthToMonth,
    #[serde(rename = "One year")]
    OneYear,
    #[serde(rename = "Two year")]
    TwoYear,
}

impl Contract {
    /// Tolerant parse over the spellings seen in real exports.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace([' ', '_'], "-").as_str() {
            "month-to-month" | "monthly" | "m2m" => Some(Contract::MonthToMonth),
            "one-year" | "1-year" => Some(Contract::OneYear),
            "two-year" | "2-year" => Some(Contract::TwoYear),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Contract::MonthToMonth => "Month-to-month",
            Contract::OneYear => "One year",
            Contract::TwoYear => "Two year",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum InternetService {
    #[serde(rename = "No")]
    None,
    #[serde(rename = "DSL")]
    Dsl,
    #[serde(rename = "Fiber optic")]
    Fiber,
}

impl InternetService {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "no" | "none" => Some(InternetService::None),
            "dsl" => Some(InternetService::Dsl),
            "fiber optic" | "fiber" | "fibre optic" => Some(InternetService::Fiber),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InternetService::None => "No",
            InternetService::Dsl => "DSL",
            InternetService::Fiber => "Fiber optic",
        }
    }
}

/// Risk tier on the percent scale: >70 High, >30 Medium, else Low.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskTier {
    High,
    Medium,
    Low,
}

impl RiskTier {
    pub fn from_percent(pct: f64) -> Self {
        if pct > 70.0 {
            RiskTier::High
        } else if pct > 30.0 {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskTier::High => "High",
            RiskTier::Medium => "Medium",
            RiskTier::Low => "Low",
        }
    }
}

/// One fully normalized customer record, ready for scoring.
///
/// `row` is the 1-based data-row number in the source file; it stays attached
/// through scoring so skipped rows never shift the correlation.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerProfile {
    pub row: usize,
    pub gender: String,
    pub senior_citizen: bool,
    pub partner: bool,
    pub dependents: bool,
    pub tenure: i64,
    pub contract: Contract,
    pub payment_method: String,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub internet_service: InternetService,
}

/// Engine output for one profile.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChurnScore {
    pub will_churn: bool,
    pub probability: f64,
}

/// One scored record as returned to the caller.
#[derive(Debug, Clone, Serialize)]
pub struct ScoredRecord {
    #[serde(flatten)]
    pub profile: CustomerProfile,
    pub will_churn: bool,
    /// Churn probability on the percent scale, rounded to one decimal.
    pub probability_pct: f64,
    pub risk_tier: RiskTier,
}

#[derive(Debug, Clone, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub high_risk: usize,
    pub high_risk_pct: f64,
    pub medium_risk: usize,
    pub medium_risk_pct: f64,
    pub low_risk: usize,
    pub low_risk_pct: f64,
}

impl BatchSummary {
    pub fn from_counts(total: usize, high: usize, medium: usize, low: usize) -> Self {
        let pct = |count: usize| {
            if total == 0 {
                0.0
            } else {
                round1(count as f64 / total as f64 * 100.0)
            }
        };
        BatchSummary {
            total,
            high_risk: high,
            high_risk_pct: pct(high),
            medium_risk: medium,
            medium_risk_pct: pct(medium),
            low_risk: low,
            low_risk_pct: pct(low),
        }
    }
}

/// The full caller-facing response for one batch submission.
#[derive(Debug, Clone, Serialize)]
pub struct BatchReport {
    pub upload_id: String,
    pub summary: BatchSummary,
    pub results: Vec<ScoredRecord>,
}

/// One stored batch header.
#[derive(Debug, Clone, Serialize)]
pub struct Upload {
    pub id: i64,
    pub upload_id: String,
    pub filename: String,
    pub total_customers: i64,
    pub high_risk_count: i64,
    pub medium_risk_count: i64,
    pub low_risk_count: i64,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredCustomer {
    pub id: i64,
    pub upload_id: String,
    pub gender: String,
    pub senior_citizen: i64,
    pub partner: String,
    pub dependents: String,
    pub tenure: i64,
    pub contract: String,
    pub payment_method: String,
    pub monthly_charges: f64,
    pub total_charges: f64,
    pub internet_service: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StoredPrediction {
    pub id: i64,
    pub customer_id: i64,
    pub will_churn: i64,
    pub churn_probability: f64,
    pub risk_level: String,
    pub created_at: DateTime<Utc>,
}

/// One customer joined with its prediction, as returned by `show`.
#[derive(Debug, Clone, Serialize)]
pub struct CustomerDetail {
    #[serde(flatten)]
    pub customer: StoredCustomer,
    pub prediction: Option<StoredPrediction>,
}

/// Global counts across every stored upload.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total_uploads: i64,
    pub total_customers: i64,
    pub high_risk: i64,
    pub medium_risk: i64,
    pub low_risk: i64,
}

/// Round to one decimal, the resolution used for every reported percentage.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "Yes"
    } else {
        "No"
    }
}
