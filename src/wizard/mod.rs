//! Case-creation wizard: derived per-step state and the navigation engine
//! that gates which steps a broker can visit.

pub mod basic_info;
pub mod engine;
pub mod model;
pub mod routes;
pub mod rules;
pub mod state;

pub use engine::{CaseCreationEngine, Destination, GuardContext, Navigation};
pub use model::{Market, Opportunity, VaultProgress};
pub use routes::{WizardRouteState, wizard_routes};
pub use rules::{CaseCreationRules, DefaultRules};
pub use state::{StateMachine, StepState, WizardStep, compute_case_creation_state};
