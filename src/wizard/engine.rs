//! Wizard navigation: which step is current, how far the user may go, and
//! where a visit to a case-creation route should be redirected.
//!
//! The engine is a plain value. Callers rebuild it from the latest state
//! record and carry `latest_state_index` between calls.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::model::Opportunity;
use super::state::{StateMachine, WizardStep, navigable_steps};

/// Route-id prefix added by the router's shared layout.
pub const LAYOUT_ROUTE_ID: &str = "/_layout";

/// Pause before moving to a freshly unlocked step.
pub const UNLOCK_NAVIGATION_DELAY_MS: u64 = 500;

/// Where a navigation lands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Destination {
    Step {
        step: WizardStep,
        opportunity_id: String,
    },
    Cases,
    Clients,
    ClientDetails {
        client_id: String,
        tab: String,
    },
}

impl Destination {
    pub fn path(&self) -> String {
        match self {
            Self::Step {
                step,
                opportunity_id,
            } => step.path(opportunity_id),
            Self::Cases => "/cases".to_string(),
            Self::Clients => "/clients".to_string(),
            Self::ClientDetails { client_id, tab } => format!("/clients/{client_id}?tab={tab}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Navigation {
    pub destination: Destination,
    pub to: String,
    #[serde(default)]
    pub delay_ms: u64,
}

impl Navigation {
    fn now(destination: Destination) -> Self {
        Self::after(destination, 0)
    }

    fn after(destination: Destination, delay_ms: u64) -> Self {
        let to = destination.path();
        Self {
            destination,
            to,
            delay_ms,
        }
    }
}

/// Data the route guard checks before looking at steps.
#[derive(Debug, Clone, Copy)]
pub struct GuardContext<'a> {
    pub is_enabled: bool,
    pub opportunity: Option<&'a Opportunity>,
    pub has_vault_progress: bool,
}

#[derive(Debug, Clone)]
pub struct CaseCreationEngine {
    opportunity_id: Option<String>,
    has_selected_banks: bool,
    state: StateMachine,
    routes: Vec<WizardStep>,
    latest_state_index: usize,
}

/// Right-most accessible navigable step, 0 when none is.
fn determine_latest(state: &StateMachine, routes: &[WizardStep]) -> usize {
    routes
        .iter()
        .rposition(|step| state.get(step).is_some_and(|flags| flags.is_accessible))
        .unwrap_or(0)
}

impl CaseCreationEngine {
    pub fn new(opportunity_id: Option<String>, state: StateMachine, has_selected_banks: bool) -> Self {
        let routes = navigable_steps(&state);
        let latest_state_index = determine_latest(&state, &routes);
        Self {
            opportunity_id,
            has_selected_banks,
            state,
            routes,
            latest_state_index,
        }
    }

    /// Resume with a previously reached index, clamped to the last step.
    pub fn with_latest_state_index(mut self, index: usize) -> Self {
        self.latest_state_index = index.min(self.routes.len().saturating_sub(1));
        self
    }

    /// Resume an index reached under `previous`. It only carries over while
    /// the state record is unchanged; any change resets to the computed latest.
    pub fn resume(self, previous: &StateMachine, index: usize) -> Self {
        if *previous == self.state {
            self.with_latest_state_index(index)
        } else {
            debug!(
                latest_state_index = self.latest_state_index,
                "State changed, discarding resumed index"
            );
            self
        }
    }

    /// Swap in a fresh state record. Any change to it recomputes the
    /// latest index.
    pub fn update(&mut self, state: StateMachine, has_selected_banks: bool) {
        if state != self.state {
            self.routes = navigable_steps(&state);
            self.latest_state_index = determine_latest(&state, &self.routes);
            self.state = state;
        }
        self.has_selected_banks = has_selected_banks;
    }

    pub fn routes(&self) -> &[WizardStep] {
        &self.routes
    }

    pub fn state(&self) -> &StateMachine {
        &self.state
    }

    pub fn latest_state_index(&self) -> usize {
        self.latest_state_index
    }

    fn last_index(&self) -> usize {
        self.routes.len().saturating_sub(1)
    }

    /// Resolve a router location (route id or concrete path) to a step.
    fn step_at(&self, location: &str) -> Option<WizardStep> {
        let location = location.strip_prefix(LAYOUT_ROUTE_ID).unwrap_or(location);
        WizardStep::from_route(location).or_else(|| {
            let id = self.opportunity_id.as_deref()?;
            WizardStep::ALL
                .into_iter()
                .find(|step| step.path(id) == location)
        })
    }

    pub fn current_state_index(&self, location: &str) -> Option<usize> {
        let step = self.step_at(location)?;
        self.routes.iter().position(|s| *s == step)
    }

    pub fn is_next_state_accessible(&self, location: &str) -> bool {
        let next = self.current_state_index(location).map_or(0, |i| i + 1);
        self.routes
            .get(next)
            .and_then(|step| self.state.get(step))
            .is_some_and(|flags| flags.is_accessible)
    }

    fn navigate_to_index(&self, index: usize, delay_ms: u64) -> Option<Navigation> {
        let step = *self.routes.get(index)?;
        let destination = match &self.opportunity_id {
            Some(id) => Destination::Step {
                step,
                opportunity_id: id.clone(),
            },
            None => Destination::Clients,
        };
        Some(Navigation::after(destination, delay_ms))
    }

    /// Advance the reached index when the user completes the step they are on.
    pub fn unlock_next_step(&mut self, location: &str) -> Option<Navigation> {
        if self.latest_state_index >= self.last_index() {
            return None;
        }
        if self.current_state_index(location) != Some(self.latest_state_index) {
            return None;
        }
        self.latest_state_index += 1;
        debug!(latest_state_index = self.latest_state_index, "Unlocked next case-creation step");
        self.navigate_to_index(self.latest_state_index, UNLOCK_NAVIGATION_DELAY_MS)
    }

    pub fn go_to_next_state(&self, location: &str) -> Option<Navigation> {
        let next = self.current_state_index(location).map_or(0, |i| i + 1);
        if next > self.last_index() || self.routes.is_empty() {
            return None;
        }
        if self.has_selected_banks && next > self.latest_state_index {
            return None;
        }
        self.navigate_to_index(next, 0)
    }

    pub fn go_to_previous_state(&self, location: &str) -> Option<Navigation> {
        match self.current_state_index(location) {
            Some(current) if current > 0 => self.navigate_to_index(current - 1, 0),
            _ => None,
        }
    }

    pub fn go_to_state(&self, index: usize) -> Option<Navigation> {
        if index >= self.routes.len() || index > self.latest_state_index {
            return None;
        }
        self.navigate_to_index(index, 0)
    }

    /// Redirect for a visit to `location`, if the visit is not allowed.
    pub fn guard(&self, ctx: GuardContext<'_>, location: Option<&str>) -> Option<Navigation> {
        let Some(opportunity_id) = self.opportunity_id.as_deref() else {
            return Some(Navigation::now(Destination::Clients));
        };
        if !ctx.is_enabled {
            return None;
        }
        let Some(opportunity) = ctx.opportunity.filter(|_| ctx.has_vault_progress) else {
            return Some(Navigation::now(Destination::Cases));
        };
        if opportunity.all_applications_submitted() {
            let client_id = opportunity.client_external_id.clone().unwrap_or_default();
            return Some(Navigation::now(Destination::ClientDetails {
                client_id,
                tab: "cases".to_string(),
            }));
        }

        let to_step = |index: usize| {
            let step = *self.routes.get(index)?;
            Some(Navigation::now(Destination::Step {
                step,
                opportunity_id: opportunity_id.to_string(),
            }))
        };

        let location = location.filter(|l| !l.is_empty());
        let Some(location) = location else {
            return to_step(0);
        };
        let step = self.step_at(location)?;
        if step.is_aggregate() {
            return to_step(self.latest_state_index);
        }
        let index = self.current_state_index(location)?;
        let accessible = self.state.get(&step).is_some_and(|flags| flags.is_accessible);
        if accessible || index <= self.latest_state_index {
            return None;
        }
        debug!(%step, latest_state_index = self.latest_state_index, "Redirecting from locked step");
        to_step(0)
    }
}
