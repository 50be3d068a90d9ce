//! Basic-info form validation, counted field by field for progress display.

use serde::Serialize;

use super::model::{Applicant, ApplicantType, Market, Opportunity};

/// A required basic-info field that is missing or invalid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
    pub path: String,
    pub message: &'static str,
}

const APPLICANT_FIELDS: usize = 5;
const CASE_FIELDS: usize = 4;
const ADDITIONAL_APPLICANT_FIELDS: usize = 3;

/// Number of fields the basic-info form requires.
pub fn required_field_count(has_additional_applicant: bool) -> u32 {
    let extra = if has_additional_applicant {
        ADDITIONAL_APPLICANT_FIELDS
    } else {
        0
    };
    (APPLICANT_FIELDS + CASE_FIELDS + extra) as u32
}

fn blank(value: &Option<String>) -> bool {
    value.as_deref().is_none_or(|v| v.trim().is_empty())
}

fn check(errors: &mut Vec<FieldError>, failed: bool, path: &str, message: &'static str) {
    if failed {
        errors.push(FieldError {
            path: path.to_string(),
            message,
        });
    }
}

fn check_main_applicant(errors: &mut Vec<FieldError>, applicant: Option<&Applicant>) {
    let missing = Applicant {
        applicant_type: ApplicantType::MainApplicant,
        first_name: None,
        last_name: None,
        email: None,
        mobile: None,
        nationality: None,
    };
    let applicant = applicant.unwrap_or(&missing);

    check(errors, blank(&applicant.first_name), "main_applicant.first_name", "Required");
    check(errors, blank(&applicant.last_name), "main_applicant.last_name", "Required");
    check(
        errors,
        !valid_email(&applicant.email),
        "main_applicant.email",
        "Invalid email",
    );
    check(errors, blank(&applicant.mobile), "main_applicant.mobile", "Required");
    check(
        errors,
        blank(&applicant.nationality),
        "main_applicant.nationality",
        "Required",
    );
}

fn valid_email(value: &Option<String>) -> bool {
    !blank(value) && value.as_deref().is_some_and(|v| v.contains('@'))
}

fn check_additional_applicant(errors: &mut Vec<FieldError>, applicant: &Applicant) {
    check(
        errors,
        blank(&applicant.first_name),
        "additional_applicant.first_name",
        "Required",
    );
    check(
        errors,
        blank(&applicant.last_name),
        "additional_applicant.last_name",
        "Required",
    );
    check(
        errors,
        !valid_email(&applicant.email),
        "additional_applicant.email",
        "Invalid email",
    );
}

/// Validate the basic-info form for `market`, one error per failing field.
pub fn validate_basic_info(opportunity: &Opportunity, market: Market) -> Vec<FieldError> {
    let mut errors = Vec::new();

    let main = opportunity.applicants.iter().find(|a| a.is_main());
    check_main_applicant(&mut errors, main);
    if let Some(additional) = opportunity.applicants.iter().find(|a| !a.is_main()) {
        check_additional_applicant(&mut errors, additional);
    }

    let property_value = opportunity.property_value.unwrap_or(0.0);
    check(
        &mut errors,
        property_value <= 0.0,
        "property_value",
        "Must be greater than zero",
    );
    check(
        &mut errors,
        opportunity
            .loan_amount
            .is_none_or(|loan| loan <= 0.0 || loan > property_value),
        "loan_amount",
        "Must be positive and not exceed the property value",
    );
    check(
        &mut errors,
        blank(&opportunity.transaction_type),
        "transaction_type",
        "Required",
    );
    match market {
        Market::Uae => check(&mut errors, blank(&opportunity.emirate), "emirate", "Required"),
        Market::Spain => check(&mut errors, blank(&opportunity.province), "province", "Required"),
    }

    errors
}
