//! Case-creation state record: per-step accessibility and completion.
//!
//! Derived from opportunity and vault data on every change, never stored.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::basic_info::validate_basic_info;
use super::model::{Market, Opportunity, VaultProgress};
use super::rules::CaseCreationRules;

/// One route of the case-creation flow.
///
/// Declaration order is wizard order. Serialized as the route path template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum WizardStep {
    #[serde(rename = "/case/$opportunityId/basic-info")]
    BasicInfo,
    #[serde(rename = "/case/$opportunityId/bank-documents")]
    BankDocuments,
    #[serde(rename = "/case/$opportunityId/submission/fill-forms")]
    FillForms,
    /// Parent of the submission steps. Never a navigation target itself.
    #[serde(rename = "/case/$opportunityId/submission")]
    Submission,
    #[serde(rename = "/case/$opportunityId/submission/select-bank-products")]
    SelectBankProducts,
    #[serde(rename = "/case/$opportunityId/submission/bank-forms")]
    BankForms,
    #[serde(rename = "/case/$opportunityId/submission/submit-applications")]
    SubmitApplications,
}

impl WizardStep {
    pub const ALL: [WizardStep; 7] = [
        Self::BasicInfo,
        Self::BankDocuments,
        Self::FillForms,
        Self::Submission,
        Self::SelectBankProducts,
        Self::BankForms,
        Self::SubmitApplications,
    ];

    /// Route path template, with `$opportunityId` unsubstituted.
    pub fn route(&self) -> &'static str {
        match self {
            Self::BasicInfo => "/case/$opportunityId/basic-info",
            Self::BankDocuments => "/case/$opportunityId/bank-documents",
            Self::FillForms => "/case/$opportunityId/submission/fill-forms",
            Self::Submission => "/case/$opportunityId/submission",
            Self::SelectBankProducts => "/case/$opportunityId/submission/select-bank-products",
            Self::BankForms => "/case/$opportunityId/submission/bank-forms",
            Self::SubmitApplications => "/case/$opportunityId/submission/submit-applications",
        }
    }

    pub fn from_route(route: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|step| step.route() == route)
    }

    /// Concrete path for one opportunity.
    pub fn path(&self, opportunity_id: &str) -> String {
        self.route().replace("$opportunityId", opportunity_id)
    }

    pub fn is_aggregate(&self) -> bool {
        matches!(self, Self::Submission)
    }
}

impl std::fmt::Display for WizardStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.route())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateMetadata {
    pub completed_steps: u32,
    pub total_steps: u32,
}

/// Flags for one step.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepState {
    pub is_accessible: bool,
    pub is_complete: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_aggregate: bool,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_skipped: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_metadata: Option<StateMetadata>,
}

/// Ordered step → flags record.
pub type StateMachine = BTreeMap<WizardStep, StepState>;

/// Everything the state record is derived from.
#[derive(Debug, Clone, Copy)]
pub struct CaseCreationInput<'a> {
    pub opportunity: Option<&'a Opportunity>,
    pub vault_progress: Option<&'a VaultProgress>,
    pub has_selected_banks: bool,
    pub market: Market,
}

/// Completed basic-info fields: required minus failing, or 0 without an opportunity.
fn basic_info_completed(
    opportunity: Option<&Opportunity>,
    market: Market,
    total: u32,
) -> u32 {
    match opportunity {
        Some(opportunity) => {
            let errors = validate_basic_info(opportunity, market).len() as u32;
            total.saturating_sub(errors)
        }
        None => 0,
    }
}

/// Compute every step's flags.
pub fn compute_case_creation_state(
    input: CaseCreationInput<'_>,
    rules: &dyn CaseCreationRules,
) -> StateMachine {
    let CaseCreationInput {
        opportunity,
        vault_progress,
        has_selected_banks,
        market,
    } = input;
    let is_spain = market == Market::Spain;

    let has_additional_applicant = opportunity.is_some_and(Opportunity::has_additional_applicant);
    let basic_info_total = rules.basic_info_required_number_of_fields(has_additional_applicant);
    let basic_info_progress = basic_info_completed(opportunity, market, basic_info_total);
    let basic_info_done = basic_info_progress == basic_info_total;

    let applications = opportunity
        .map(|o| o.bank_applications.as_slice())
        .unwrap_or_default();
    let default_rates: Vec<bool> = applications
        .iter()
        .map(|app| app.bank_details.selected_rate.is_default_rate.unwrap_or(false))
        .collect();
    let has_documents: Vec<bool> = applications
        .iter()
        .map(|app| !app.documents.is_empty())
        .collect();
    let products_done = rules.bank_products_completion(&default_rates);
    let forms_done = rules.bank_forms_completion(&has_documents);

    let documents = vault_progress.and_then(|v| v.document_progress.as_ref());
    let uploaded = documents.and_then(|d| d.uploaded);
    let total = documents.and_then(|d| d.total);

    let submission_open = has_selected_banks && basic_info_done;

    BTreeMap::from([
        (
            WizardStep::BasicInfo,
            StepState {
                is_accessible: true,
                is_complete: basic_info_done,
                state_metadata: Some(StateMetadata {
                    completed_steps: basic_info_progress,
                    total_steps: basic_info_total,
                }),
                ..Default::default()
            },
        ),
        (
            WizardStep::BankDocuments,
            StepState {
                is_accessible: has_selected_banks,
                is_complete: rules.bank_documents_completion(uploaded, total),
                state_metadata: Some(StateMetadata {
                    completed_steps: uploaded.unwrap_or(0),
                    total_steps: total.unwrap_or(0),
                }),
                ..Default::default()
            },
        ),
        (
            WizardStep::FillForms,
            StepState {
                is_accessible: submission_open,
                is_skipped: is_spain,
                ..Default::default()
            },
        ),
        (
            WizardStep::Submission,
            StepState {
                is_accessible: submission_open,
                is_aggregate: true,
                ..Default::default()
            },
        ),
        (
            WizardStep::SelectBankProducts,
            StepState {
                is_accessible: submission_open,
                is_complete: products_done,
                ..Default::default()
            },
        ),
        (
            WizardStep::BankForms,
            StepState {
                is_accessible: submission_open && (is_spain || products_done),
                is_complete: forms_done,
                ..Default::default()
            },
        ),
        (
            WizardStep::SubmitApplications,
            StepState {
                is_accessible: submission_open && forms_done,
                ..Default::default()
            },
        ),
    ])
}

/// Steps the user can actually land on, in order.
pub fn navigable_steps(state: &StateMachine) -> Vec<WizardStep> {
    state
        .iter()
        .filter(|(step, flags)| !step.is_aggregate() && !flags.is_skipped)
        .map(|(step, _)| *step)
        .collect()
}
