//! Topology self-check run by every compiler before it returns.

pub mod guards;
pub mod invariants;

use crate::error::TopologyViolation;
use crate::graph::{Controller, Layer, ParamDecl};
use crate::logging::ProfileScope;

pub use invariants::reachable;

/// Structural checks for one layer against the parameters available to it.
pub fn check_layer(layer: &Layer, params: &[ParamDecl]) -> Result<(), TopologyViolation> {
    invariants::assert_unique_state_names(layer)?;
    invariants::assert_transitions_resolve(layer)?;
    invariants::assert_params_declared(layer, params)?;
    invariants::assert_guards_disjoint(layer)?;
    invariants::assert_reachability(layer)?;
    Ok(())
}

/// Full controller check: every layer, plus cross-layer rules. `weight_owner`
/// is also the only layer whose mask may hide other layers' output.
pub fn check_controller(controller: &Controller, weight_owner: &str) -> Result<(), TopologyViolation> {
    let _scope = ProfileScope::new("check_controller");
    invariants::assert_unique_layer_names(controller)?;
    for layer in &controller.layers {
        check_layer(layer, &controller.params)?;
    }
    invariants::assert_weight_ownership(controller, weight_owner)?;
    invariants::assert_mask_exclusive(controller, weight_owner)?;
    Ok(())
}
