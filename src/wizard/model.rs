//! Upstream business data the case-creation wizard is derived from.

use serde::{Deserialize, Serialize};

/// Market the deployment serves. Decides basic-info rules and skipped steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Market {
    /// United Arab Emirates.
    #[default]
    Uae,
    Spain,
}

impl std::str::FromStr for Market {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ae" | "uae" => Ok(Self::Uae),
            "es" | "spain" => Ok(Self::Spain),
            other => Err(format!("unknown market '{other}', expected 'ae' or 'es'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApplicantType {
    MainApplicant,
    CoBorrower,
    Guarantor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Applicant {
    pub applicant_type: ApplicantType,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
    #[serde(default)]
    pub nationality: Option<String>,
}

impl Applicant {
    pub fn is_main(&self) -> bool {
        self.applicant_type == ApplicantType::MainApplicant
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BankApplicationStatus {
    Draft,
    Submitted,
    PreApproved,
    Approved,
    Declined,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectedRate {
    #[serde(default)]
    pub is_default_rate: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankDetails {
    #[serde(default)]
    pub selected_rate: SelectedRate,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankDocument {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BankApplication {
    pub id: String,
    pub status: BankApplicationStatus,
    #[serde(default)]
    pub bank_details: BankDetails,
    #[serde(default)]
    pub documents: Vec<BankDocument>,
}

/// A mortgage case being assembled by a broker.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Opportunity {
    #[serde(default)]
    pub client_external_id: Option<String>,
    #[serde(default)]
    pub applicants: Vec<Applicant>,
    #[serde(default)]
    pub property_value: Option<f64>,
    #[serde(default)]
    pub loan_amount: Option<f64>,
    #[serde(default)]
    pub transaction_type: Option<String>,
    /// UAE only.
    #[serde(default)]
    pub emirate: Option<String>,
    /// Spain only.
    #[serde(default)]
    pub province: Option<String>,
    #[serde(default)]
    pub bank_applications: Vec<BankApplication>,
}

impl Opportunity {
    pub fn has_additional_applicant(&self) -> bool {
        self.applicants.iter().any(|a| !a.is_main())
    }

    /// True once every bank application has left draft (and there is at least one).
    pub fn all_applications_submitted(&self) -> bool {
        !self.bank_applications.is_empty()
            && self
                .bank_applications
                .iter()
                .all(|app| app.status != BankApplicationStatus::Draft)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentProgress {
    #[serde(default)]
    pub uploaded: Option<u32>,
    #[serde(default)]
    pub total: Option<u32>,
}

/// Document vault upload progress for an opportunity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultProgress {
    #[serde(default)]
    pub document_progress: Option<DocumentProgress>,
}
