//! Business rules the wizard's completion flags are derived from.

use super::basic_info;

/// Completion predicates for case-creation steps.
pub trait CaseCreationRules: Send + Sync {
    /// Fields the basic-info form requires.
    fn basic_info_required_number_of_fields(&self, has_additional_applicant: bool) -> u32;

    /// Vault documents are all in.
    fn bank_documents_completion(&self, uploaded: Option<u32>, total: Option<u32>) -> bool;

    /// One flag per bank application: is the selected rate still the bank default.
    fn bank_products_completion(&self, default_rate_selected: &[bool]) -> bool;

    /// One flag per bank application: has it got bank forms attached.
    fn bank_forms_completion(&self, has_documents: &[bool]) -> bool;
}

/// Rules shipped with the service.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultRules;

impl CaseCreationRules for DefaultRules {
    fn basic_info_required_number_of_fields(&self, has_additional_applicant: bool) -> u32 {
        basic_info::required_field_count(has_additional_applicant)
    }

    fn bank_documents_completion(&self, uploaded: Option<u32>, total: Option<u32>) -> bool {
        matches!((uploaded, total), (Some(uploaded), Some(total)) if total > 0 && uploaded >= total)
    }

    fn bank_products_completion(&self, default_rate_selected: &[bool]) -> bool {
        !default_rate_selected.is_empty() && default_rate_selected.iter().all(|is_default| !is_default)
    }

    fn bank_forms_completion(&self, has_documents: &[bool]) -> bool {
        !has_documents.is_empty() && has_documents.iter().all(|has| *has)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn documents_need_a_known_nonzero_total() {
        let rules = DefaultRules;
        assert!(rules.bank_documents_completion(Some(4), Some(4)));
        assert!(!rules.bank_documents_completion(Some(3), Some(4)));
        assert!(!rules.bank_documents_completion(Some(0), Some(0)));
        assert!(!rules.bank_documents_completion(None, Some(4)));
    }

    #[test]
    fn products_done_when_every_bank_has_a_chosen_rate() {
        let rules = DefaultRules;
        assert!(rules.bank_products_completion(&[false, false]));
        assert!(!rules.bank_products_completion(&[false, true]));
        assert!(!rules.bank_products_completion(&[]));
    }

    #[test]
    fn forms_done_when_every_bank_has_documents() {
        let rules = DefaultRules;
        assert!(rules.bank_forms_completion(&[true]));
        assert!(!rules.bank_forms_completion(&[true, false]));
        assert!(!rules.bank_forms_completion(&[]));
    }
}
