use std::collections::HashMap;

use crate::error::{Error, Result};
use crate::models::{Contract, CustomerProfile, InternetService};

/// One raw tabular row, keyed by normalized header name.
pub type RawRecord = HashMap<String, String>;

/// Collapse header spelling variants: case-insensitive, separators stripped,
/// so `MonthlyCharges`, `monthly_charges` and `Monthly Charges` all match.
pub fn normalize_key(header: &str) -> String {
    header
        .trim()
        .to_lowercase()
        .replace([' ', '_', '-'], "")
}

// Accepted source keys per logical field, in lookup order (already normalized).
const GENDER_KEYS: &[&str] = &["gender"];
const SENIOR_KEYS: &[&str] = &["seniorcitizen", "senior"];
const PARTNER_KEYS: &[&str] = &["partner", "haspartner"];
const DEPENDENTS_KEYS: &[&str] = &["dependents", "hasdependents"];
const TENURE_KEYS: &[&str] = &["tenure", "tenuremonths"];
const CONTRACT_KEYS: &[&str] = &["contract", "contracttype"];
const PAYMENT_KEYS: &[&str] = &["paymentmethod", "payment"];
const MONTHLY_KEYS: &[&str] = &["monthlycharges", "monthlycharge"];
const TOTAL_KEYS: &[&str] = &["totalcharges", "totalcharge"];
const INTERNET_KEYS: &[&str] = &["internetservice", "internet"];

// Defaults applied when no accepted key is present.
const DEFAULT_GENDER: &str = "Male";
const DEFAULT_TENURE: i64 = 12;
const DEFAULT_PAYMENT: &str = "Electronic check";
const DEFAULT_MONTHLY: f64 = 50.0;
const DEFAULT_TOTAL: f64 = 500.0;

fn lookup<'a>(record: &'a RawRecord, keys: &[&str]) -> Option<&'a str> {
    keys.iter().find_map(|key| {
        record
            .get(*key)
            .map(|value| value.trim())
            .filter(|value| !value.is_empty())
    })
}

fn parse_flag(value: &str, row: usize, field: &'static str) -> Result<bool> {
    match value.to_lowercase().as_str() {
        "yes" | "y" | "true" | "1" => Ok(true),
        "no" | "n" | "false" | "0" => Ok(false),
        other => Err(Error::record(row, field, format!("expected yes/no, got {other:?}"))),
    }
}

fn parse_tenure(value: &str, row: usize) -> Result<i64> {
    let months: i64 = value
        .parse()
        .map_err(|_| Error::record(row, "tenure", format!("not an integer: {value:?}")))?;
    if months < 0 {
        return Err(Error::record(row, "tenure", "must be non-negative"));
    }
    Ok(months)
}

fn parse_charge(value: &str, row: usize, field: &'static str) -> Result<f64> {
    let amount: f64 = value
        .parse()
        .map_err(|_| Error::record(row, field, format!("not a number: {value:?}")))?;
    if !amount.is_finite() || amount < 0.0 {
        return Err(Error::record(row, field, "must be a non-negative number"));
    }
    Ok(amount)
}

/// Normalize one raw row into a canonical profile.
///
/// A coercion failure is reported for the offending field only and never
/// aborts sibling rows; the batch loop decides what to do with the error.
pub fn resolve(row: usize, record: &RawRecord) -> Result<CustomerProfile> {
    let gender = lookup(record, GENDER_KEYS)
        .unwrap_or(DEFAULT_GENDER)
        .to_string();

    let senior_citizen = match lookup(record, SENIOR_KEYS) {
        Some(value) => parse_flag(value, row, "senior_citizen")?,
        None => false,
    };
    let partner = match lookup(record, PARTNER_KEYS) {
        Some(value) => parse_flag(value, row, "partner")?,
        None => false,
    };
    let dependents = match lookup(record, DEPENDENTS_KEYS) {
        Some(value) => parse_flag(value, row, "dependents")?,
        None => false,
    };

    let tenure = match lookup(record, TENURE_KEYS) {
        Some(value) => parse_tenure(value, row)?,
        None => DEFAULT_TENURE,
    };

    let contract = match lookup(record, CONTRACT_KEYS) {
        Some(value) => Contract::parse(value)
            .ok_or_else(|| Error::record(row, "contract", format!("unknown contract: {value:?}")))?,
        None => Contract::MonthToMonth,
    };

    let payment_method = lookup(record, PAYMENT_KEYS)
        .unwrap_or(DEFAULT_PAYMENT)
        .to_string();

    let monthly_charges = match lookup(record, MONTHLY_KEYS) {
        Some(value) => parse_charge(value, row, "monthly_charges")?,
        None => DEFAULT_MONTHLY,
    };
    let total_charges = match lookup(record, TOTAL_KEYS) {
        Some(value) => parse_charge(value, row, "total_charges")?,
        None => DEFAULT_TOTAL,
    };

    let internet_service = match lookup(record, INTERNET_KEYS) {
        Some(value) => InternetService::parse(value).ok_or_else(|| {
            Error::record(row, "internet_service", format!("unknown service: {value:?}"))
        })?,
        None => InternetService::None,
    };

    Ok(CustomerProfile {
        row,
        gender,
        senior_citizen,
        partner,
        dependents,
        tenure,
        contract,
        payment_method,
        monthly_charges,
        total_charges,
        internet_service,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, &str)]) -> RawRecord {
        pairs
            .iter()
            .map(|(key, value)| (normalize_key(key), value.to_string()))
            .collect()
    }

    #[test]
    fn resolves_canonical_headers() {
        let raw = record(&[
            ("Gender", "Female"),
            ("SeniorCitizen", "1"),
            ("Partner", "No"),
            ("Dependents", "No"),
            ("tenure", "2"),
            ("Contract", "Month-to-month"),
            ("PaymentMethod", "Electronic check"),
            ("MonthlyCharges", "95.0"),
            ("TotalCharges", "190.0"),
            ("InternetService", "Fiber optic"),
        ]);

        let profile = resolve(1, &raw).unwrap();
        assert_eq!(profile.gender, "Female");
        assert!(profile.senior_citizen);
        assert_eq!(profile.tenure, 2);
        assert_eq!(profile.contract, Contract::MonthToMonth);
        assert_eq!(profile.monthly_charges, 95.0);
        assert_eq!(profile.internet_service, InternetService::Fiber);
    }

    #[test]
    fn resolves_snake_case_headers() {
        let raw = record(&[
            ("gender", "Male"),
            ("senior_citizen", "0"),
            ("monthly_charges", "42.5"),
            ("internet_service", "DSL"),
            ("payment_method", "Mailed check"),
        ]);

        let profile = resolve(3, &raw).unwrap();
        assert_eq!(profile.monthly_charges, 42.5);
        assert_eq!(profile.internet_service, InternetService::Dsl);
        assert_eq!(profile.payment_method, "Mailed check");
    }

    #[test]
    fn missing_fields_take_documented_defaults() {
        let profile = resolve(1, &RawRecord::new()).unwrap();
        assert_eq!(profile.gender, "Male");
        assert!(!profile.senior_citizen);
        assert!(!profile.partner);
        assert_eq!(profile.tenure, 12);
        assert_eq!(profile.contract, Contract::MonthToMonth);
        assert_eq!(profile.payment_method, "Electronic check");
        assert_eq!(profile.monthly_charges, 50.0);
        assert_eq!(profile.total_charges, 500.0);
        assert_eq!(profile.internet_service, InternetService::None);
    }

    #[test]
    fn empty_cell_falls_back_to_default() {
        let raw = record(&[("tenure", ""), ("MonthlyCharges", "  ")]);
        let profile = resolve(1, &raw).unwrap();
        assert_eq!(profile.tenure, 12);
        assert_eq!(profile.monthly_charges, 50.0);
    }

    #[test]
    fn bad_numeric_is_scoped_to_its_field() {
        let raw = record(&[("MonthlyCharges", "abc"), ("tenure", "5")]);
        let err = resolve(2, &raw).unwrap_err();
        match err {
            Error::Record { row, field, .. } => {
                assert_eq!(row, 2);
                assert_eq!(field, "monthly_charges");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn negative_tenure_is_rejected() {
        let raw = record(&[("tenure", "-3")]);
        assert!(resolve(1, &raw).is_err());
    }

    #[test]
    fn unknown_contract_is_rejected() {
        let raw = record(&[("Contract", "lifetime")]);
        assert!(resolve(1, &raw).is_err());
    }

    #[test]
    fn flag_accepts_truthy_variants() {
        for value in ["Yes", "yes", "TRUE", "1", "y"] {
            let raw = record(&[("Partner", value)]);
            assert!(resolve(1, &raw).unwrap().partner, "value {value:?}");
        }
    }
}
