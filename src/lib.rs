//! CaseHub: messaging provider preferences and the case-creation wizard.

pub mod app;
pub mod config;
pub mod error;
pub mod messaging;
pub mod store;
pub mod wizard;
