//! Automations: rules tying triggers and conditions to actions.

pub mod conditional_on;
pub mod turn_on_and_off;

use std::sync::Arc;

use crate::guard::run_guarded;
use crate::trigger::Action;

pub use conditional_on::ConditionalOnAutomation;
pub use turn_on_and_off::TurnOnAndOffAutomation;

/// Run every action in order; failures are logged and never stop the rest.
pub(crate) fn run_actions(automation: &str, actions: &[Arc<Action>]) {
    for action in actions {
        if let Err(err) = run_guarded(|| action()) {
            tracing::warn!(automation, %err, "automation action failed");
        }
    }
}
