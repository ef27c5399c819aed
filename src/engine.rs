use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::models::{ChurnScore, Contract, CustomerProfile, InternetService};

const PROB_FLOOR: f64 = 0.05;
const PROB_CEIL: f64 = 0.95;
const BASE_PROBABILITY: f64 = 0.30;
const CHURN_THRESHOLD: f64 = 0.5;
const FEATURE_COUNT: usize = 10;
const ENSEMBLE_SIZE: usize = 2;

/// A scoring engine. Must return a value for every profile; per-record
/// failures are absorbed here, never propagated to the batch loop.
pub trait ChurnModel {
    fn name(&self) -> &'static str;
    fn score(&self, profile: &CustomerProfile) -> ChurnScore;
}

/// Load the configured model artifact, falling back to the rule model when it
/// is absent or unusable. The substitution is invisible to callers.
pub fn load_model(artifact: Option<&Path>) -> Box<dyn ChurnModel> {
    let Some(path) = artifact else {
        return Box::new(RuleModel);
    };
    match EnsembleModel::from_path(path) {
        Ok(model) => Box::new(model),
        Err(err) => {
            warn!(
                "model artifact {} unusable ({err}), using rule model",
                path.display()
            );
            Box::new(RuleModel)
        }
    }
}

/// Deterministic additive scorer: a base probability plus independent,
/// order-insensitive adjustments per profile field, clamped to
/// [0.05, 0.95].
pub struct RuleModel;

impl ChurnModel for RuleModel {
    fn name(&self) -> &'static str {
        "rule"
    }

    fn score(&self, profile: &CustomerProfile) -> ChurnScore {
        let mut probability = BASE_PROBABILITY;

        probability += match profile.contract {
            Contract::MonthToMonth => 0.25,
            Contract::OneYear => 0.05,
            Contract::TwoYear => -0.20,
        };
        probability += tenure_adjustment(profile.tenure);
        probability += charge_adjustment(profile.monthly_charges);
        if profile.senior_citizen {
            probability += 0.08;
        }
        probability += match profile.internet_service {
            InternetService::Fiber => 0.05,
            InternetService::None => -0.10,
            InternetService::Dsl => 0.0,
        };
        if profile.partner {
            probability -= 0.08;
        }
        if profile.dependents {
            probability -= 0.08;
        }
        probability += payment_adjustment(&profile.payment_method);

        let probability = probability.clamp(PROB_FLOOR, PROB_CEIL);
        ChurnScore {
            will_churn: probability > CHURN_THRESHOLD,
            probability,
        }
    }
}

// First matching band wins, checked in this order.
fn tenure_adjustment(months: i64) -> f64 {
    if months < 6 {
        0.20
    } else if months < 12 {
        0.10
    } else if months > 48 {
        -0.15
    } else if months > 24 {
        -0.10
    } else {
        0.0
    }
}

fn charge_adjustment(monthly: f64) -> f64 {
    if monthly > 90.0 {
        0.12
    } else if monthly > 70.0 {
        0.05
    } else if monthly < 30.0 {
        -0.08
    } else {
        0.0
    }
}

fn payment_adjustment(method: &str) -> f64 {
    let method = method.to_lowercase();
    if method.contains("electronic check") {
        0.10
    } else if method.contains("auto") {
        -0.05
    } else {
        0.0
    }
}

#[derive(Debug, Deserialize)]
struct Classifier {
    weights: Vec<f64>,
    bias: f64,
}

impl Classifier {
    fn probability(&self, features: &[f64; FEATURE_COUNT]) -> Option<f64> {
        if self.weights.len() != FEATURE_COUNT {
            return None;
        }
        let z: f64 = self
            .weights
            .iter()
            .zip(features)
            .map(|(weight, feature)| weight * feature)
            .sum::<f64>()
            + self.bias;
        let p = sigmoid(z);
        p.is_finite().then_some(p)
    }
}

fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

/// Two independently trained logistic classifiers averaged into one
/// probability. Any internal inconsistency fails closed to the neutral
/// result (no churn, 0.5) rather than propagating.
#[derive(Debug, Deserialize)]
pub struct EnsembleModel {
    classifiers: Vec<Classifier>,
}

impl EnsembleModel {
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        let model: EnsembleModel = serde_json::from_str(&raw)?;
        anyhow::ensure!(
            model.classifiers.len() == ENSEMBLE_SIZE,
            "expected {ENSEMBLE_SIZE} classifiers, artifact has {}",
            model.classifiers.len()
        );
        anyhow::ensure!(
            model
                .classifiers
                .iter()
                .all(|c| c.weights.len() == FEATURE_COUNT),
            "classifier weight vector must have {FEATURE_COUNT} entries"
        );
        Ok(model)
    }

    /// Fixed categorical-to-integer feature encoding. Unseen payment
    /// methods encode as 1 (mailed check), the documented default.
    fn encode(profile: &CustomerProfile) -> [f64; FEATURE_COUNT] {
        let gender = if profile.gender.eq_ignore_ascii_case("male") {
            1.0
        } else {
            0.0
        };
        let contract = match profile.contract {
            Contract::MonthToMonth => 0.0,
            Contract::OneYear => 1.0,
            Contract::TwoYear => 2.0,
        };
        let internet = match profile.internet_service {
            InternetService::None => 0.0,
            InternetService::Dsl => 1.0,
            InternetService::Fiber => 2.0,
        };
        let payment = match profile.payment_method.to_lowercase().as_str() {
            "electronic check" => 0.0,
            "mailed check" => 1.0,
            "bank transfer (automatic)" => 2.0,
            "credit card (automatic)" => 3.0,
            _ => 1.0,
        };

        [
            gender,
            profile.senior_citizen as i64 as f64,
            profile.partner as i64 as f64,
            profile.dependents as i64 as f64,
            profile.tenure as f64,
            contract,
            profile.monthly_charges,
            profile.total_charges,
            internet,
            payment,
        ]
    }

    fn neutral() -> ChurnScore {
        ChurnScore {
            will_churn: false,
            probability: 0.5,
        }
    }
}

impl ChurnModel for EnsembleModel {
    fn name(&self) -> &'static str {
        "ensemble"
    }

    fn score(&self, profile: &CustomerProfile) -> ChurnScore {
        if self.classifiers.len() != ENSEMBLE_SIZE {
            return Self::neutral();
        }
        let features = Self::encode(profile);
        let mut sum = 0.0;
        for classifier in &self.classifiers {
            match classifier.probability(&features) {
                Some(p) => sum += p,
                None => return Self::neutral(),
            }
        }
        let probability = sum / self.classifiers.len() as f64;
        ChurnScore {
            will_churn: probability > CHURN_THRESHOLD,
            probability,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_profile() -> CustomerProfile {
        CustomerProfile {
            row: 1,
            gender: "Female".to_string(),
            senior_citizen: false,
            partner: false,
            dependents: false,
            tenure: 12,
            contract: Contract::MonthToMonth,
            payment_method: "Mailed check".to_string(),
            monthly_charges: 50.0,
            total_charges: 600.0,
            internet_service: InternetService::Dsl,
        }
    }

    #[test]
    fn high_risk_profile_clamps_at_ceiling() {
        let profile = CustomerProfile {
            tenure: 2,
            senior_citizen: true,
            monthly_charges: 95.0,
            payment_method: "Electronic check".to_string(),
            internet_service: InternetService::Fiber,
            ..sample_profile()
        };

        // 0.30 + 0.25 + 0.20 + 0.12 + 0.08 + 0.05 + 0.10 = 1.10, clamped
        let score = RuleModel.score(&profile);
        assert_eq!(score.probability, 0.95);
        assert!(score.will_churn);
    }

    #[test]
    fn low_risk_profile_clamps_at_floor() {
        let profile = CustomerProfile {
            tenure: 60,
            partner: true,
            dependents: true,
            contract: Contract::TwoYear,
            payment_method: "Bank transfer (automatic)".to_string(),
            ..sample_profile()
        };

        // 0.30 - 0.20 - 0.15 - 0.08 - 0.08 - 0.05 = -0.26, clamped
        let score = RuleModel.score(&profile);
        assert_eq!(score.probability, 0.05);
        assert!(!score.will_churn);
    }

    #[test]
    fn probability_stays_in_bounds_and_agrees_with_flag() {
        let profiles = [
            sample_profile(),
            CustomerProfile {
                tenure: 0,
                monthly_charges: 120.0,
                senior_citizen: true,
                ..sample_profile()
            },
            CustomerProfile {
                tenure: 72,
                contract: Contract::TwoYear,
                monthly_charges: 20.0,
                partner: true,
                dependents: true,
                internet_service: InternetService::None,
                ..sample_profile()
            },
        ];

        for profile in &profiles {
            let score = RuleModel.score(profile);
            assert!((0.05..=0.95).contains(&score.probability));
            assert_eq!(score.will_churn, score.probability > 0.5);
        }
    }

    #[test]
    fn rescoring_is_bit_identical() {
        let profile = sample_profile();
        let first = RuleModel.score(&profile);
        let second = RuleModel.score(&profile);
        assert_eq!(first.probability.to_bits(), second.probability.to_bits());
        assert_eq!(first.will_churn, second.will_churn);
    }

    #[test]
    fn shrinking_tenure_never_lowers_risk() {
        let long = CustomerProfile {
            tenure: 60,
            ..sample_profile()
        };
        let short = CustomerProfile {
            tenure: 2,
            ..sample_profile()
        };
        assert!(RuleModel.score(&short).probability >= RuleModel.score(&long).probability);
    }

    #[test]
    fn one_year_contract_sits_between_extremes() {
        let m2m = RuleModel.score(&sample_profile());
        let one_year = RuleModel.score(&CustomerProfile {
            contract: Contract::OneYear,
            ..sample_profile()
        });
        let two_year = RuleModel.score(&CustomerProfile {
            contract: Contract::TwoYear,
            ..sample_profile()
        });
        assert!(m2m.probability > one_year.probability);
        assert!(one_year.probability > two_year.probability);
    }

    fn classifier(weights: Vec<f64>, bias: f64) -> Classifier {
        Classifier { weights, bias }
    }

    #[test]
    fn ensemble_averages_both_classifiers() {
        let model = EnsembleModel {
            classifiers: vec![
                classifier(vec![0.0; FEATURE_COUNT], 2.0),
                classifier(vec![0.0; FEATURE_COUNT], -2.0),
            ],
        };
        let score = model.score(&sample_profile());
        let expected = (sigmoid(2.0) + sigmoid(-2.0)) / 2.0;
        assert!((score.probability - expected).abs() < 1e-12);
        assert!(!score.will_churn);
    }

    #[test]
    fn ensemble_fails_closed_on_bad_weights() {
        let model = EnsembleModel {
            classifiers: vec![
                classifier(vec![0.0; 3], 0.0),
                classifier(vec![0.0; FEATURE_COUNT], 0.0),
            ],
        };
        let score = model.score(&sample_profile());
        assert_eq!(score.probability, 0.5);
        assert!(!score.will_churn);
    }

    #[test]
    fn missing_artifact_falls_back_to_rule_model() {
        let model = load_model(Some(Path::new("/nonexistent/churn_model.json")));
        assert_eq!(model.name(), "rule");
        let model = load_model(None);
        assert_eq!(model.name(), "rule");
    }
}
