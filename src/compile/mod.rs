//! Graph compilers.
//!
//! Each component compiler is a pure function from validated settings to a
//! [`Component`] (layers plus the parameters they use). Every compiler runs
//! the topology self-check before returning, so a component that comes back
//! `Ok` is structurally sound. [`assemble`] merges the four components into
//! one [`Controller`] and re-checks the cross-layer rules.

pub mod automaton;
pub mod deterrent;
pub mod lock;
pub mod timer;

use std::ops::Range;

use serde_json::json;

use crate::config::ProtectionConfig;
use crate::error::{CompileError, TopologyViolation};
use crate::graph::{Controller, Layer, ParamDecl, State};
use crate::logging::{self, v_str, ProfileScope};
use crate::verify;

pub const PASSWORD_LAYER: &str = "Password";
pub const COUNTDOWN_LAYER: &str = "Countdown";
pub const WARNING_LAYER: &str = "Warning";
pub const LOCK_LAYER: &str = "Lock";
pub const DETERRENT_LAYER: &str = "Deterrent";

/// Output of one component compiler.
#[derive(Debug, Clone, PartialEq)]
pub struct Component {
    pub name: &'static str,
    pub params: Vec<ParamDecl>,
    pub layers: Vec<Layer>,
}

impl Component {
    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn state_count(&self) -> usize {
        self.layers.iter().map(|l| l.states.len()).sum()
    }

    pub fn transition_count(&self) -> usize {
        self.layers
            .iter()
            .map(|l| l.transitions.len() + l.any_state.len())
            .sum()
    }

    /// Self-check every layer against this component's parameters.
    pub(crate) fn checked(self) -> Result<Self, CompileError> {
        for layer in &self.layers {
            verify::check_layer(layer, &self.params)?;
        }
        Ok(self)
    }
}

/// Layer index assignment inside the assembled controller. Host layers
/// come first so their indices are stable regardless of what we append.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerLayout {
    pub host_layers: usize,
}

impl LayerLayout {
    pub fn new(host_layers: usize) -> Self {
        Self { host_layers }
    }

    pub fn host(&self) -> Range<usize> {
        0..self.host_layers
    }

    pub fn password(&self) -> usize {
        self.host_layers
    }

    pub fn countdown(&self) -> usize {
        self.host_layers + 1
    }

    pub fn warning(&self) -> usize {
        self.host_layers + 2
    }

    pub fn lock(&self) -> usize {
        self.host_layers + 3
    }

    pub fn deterrent(&self) -> usize {
        self.host_layers + 4
    }

    pub fn total(&self) -> usize {
        self.host_layers + 5
    }
}

/// Stand-in for a pre-existing avatar layer whose weight the lock drives.
pub fn host_layer(index: usize) -> Layer {
    let mut layer = Layer::new(&format!("Host{}", index), "Passthrough");
    layer.add_state(State::new("Passthrough"));
    layer
}

fn merge(controller: &mut Controller, component: Component) -> Result<(), TopologyViolation> {
    for decl in component.params {
        let name = decl.name.clone();
        let kind = decl.kind();
        if controller.declare(decl).is_err() {
            return Err(TopologyViolation::UndeclaredParameter {
                layer: component.name.to_string(),
                param: name,
                expected: kind.as_str(),
            });
        }
    }
    controller.layers.extend(component.layers);
    Ok(())
}

/// Builds and self-checks the full protection controller for one avatar.
pub fn assemble(cfg: &ProtectionConfig) -> Result<Controller, CompileError> {
    let _scope = ProfileScope::with_context("assemble", &[("avatar", v_str(&cfg.name))]);

    let result = build(cfg);
    match &result {
        Ok(controller) => logging::log(
            logging::Level::Debug,
            logging::Domain::Compile,
            "controller_assembled",
            logging::obj(&[
                ("avatar", v_str(&cfg.name)),
                ("layers", json!(controller.layers.len())),
                ("states", json!(controller.state_count())),
                ("transitions", json!(controller.transition_count())),
            ]),
        ),
        Err(CompileError::Config(err)) => logging::log_config_rejected(&cfg.name, &err.to_string()),
        Err(CompileError::Topology(err)) => logging::log_topology_violation(&cfg.name, &err.to_string()),
    }
    result
}

fn build(cfg: &ProtectionConfig) -> Result<Controller, CompileError> {
    cfg.validate_timing()?;
    let layout = LayerLayout::new(cfg.host_layers);

    let components = [
        automaton::compile(&cfg.password, cfg.debounce_secs, cfg.tolerance_secs)?,
        timer::compile(cfg.countdown_secs, cfg.warning_secs)?,
        lock::compile(&layout, &cfg.hide_transforms)?,
        deterrent::compile(
            &deterrent::Payload::from_configs(&cfg.effects)?,
            cfg.padding_states,
            cfg.padding_seed,
        )?,
    ];

    let mut controller = Controller::new(&cfg.name);
    for i in layout.host() {
        controller.layers.push(host_layer(i));
    }
    for component in components {
        logging::log_component_compiled(
            &cfg.name,
            component.name,
            component.layers.len(),
            component.state_count(),
            component.transition_count(),
        );
        merge(&mut controller, component)?;
    }

    verify::check_controller(&controller, LOCK_LAYER)?;
    Ok(controller)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{Action, SUCCESS};

    #[test]
    fn test_layout_matches_assembled_order() {
        let mut cfg = ProtectionConfig::new("a", &[1, 7, 2, 4]);
        cfg.host_layers = 3;
        let controller = assemble(&cfg).unwrap();
        let layout = LayerLayout::new(3);
        assert_eq!(controller.layers.len(), layout.total());
        assert_eq!(controller.layer_index(PASSWORD_LAYER), Some(layout.password()));
        assert_eq!(controller.layer_index(COUNTDOWN_LAYER), Some(layout.countdown()));
        assert_eq!(controller.layer_index(WARNING_LAYER), Some(layout.warning()));
        assert_eq!(controller.layer_index(LOCK_LAYER), Some(layout.lock()));
        assert_eq!(controller.layer_index(DETERRENT_LAYER), Some(layout.deterrent()));
    }

    #[test]
    fn test_success_declared_saved_and_synced() {
        let controller = assemble(&ProtectionConfig::new("a", &[2])).unwrap();
        let success = controller.param(SUCCESS).unwrap();
        assert!(success.saved && success.synced);
        let synced: Vec<&str> = controller
            .params
            .iter()
            .filter(|p| p.synced)
            .map(|p| p.name.as_str())
            .collect();
        assert_eq!(synced, vec![SUCCESS]);
    }

    #[test]
    fn test_only_lock_layer_writes_weight() {
        let mut cfg = ProtectionConfig::new("a", &[1, 2]);
        cfg.host_layers = 2;
        let controller = assemble(&cfg).unwrap();
        for layer in &controller.layers {
            let writes = layer
                .states
                .iter()
                .flat_map(|s| s.on_enter.iter())
                .any(|a| matches!(a, Action::LayerWeight { .. }));
            assert_eq!(writes, layer.name == LOCK_LAYER, "layer {}", layer.name);
        }
    }

    #[test]
    fn test_config_error_emits_no_controller() {
        let cfg = ProtectionConfig::new("a", &[1, 9]);
        let err = assemble(&cfg).unwrap_err();
        assert!(err.is_config());

        let mut cfg = ProtectionConfig::new("a", &[1]);
        cfg.debounce_secs = -1.0;
        assert!(assemble(&cfg).unwrap_err().is_config());
    }

    #[test]
    fn test_lock_mask_must_not_cover_effect_paths() {
        use crate::config::EffectConfig;

        let mut cfg = ProtectionConfig::new("a", &[1, 2]);
        cfg.hide_transforms = vec!["Body".into()];
        cfg.effects = vec![EffectConfig {
            name: "sparks".into(),
            clip: "fx_sparks".into(),
            transforms: vec!["Body/Sparks".into()],
        }];
        assert!(matches!(
            assemble(&cfg),
            Err(CompileError::Topology(TopologyViolation::MaskOverlap { .. }))
        ));

        cfg.effects[0].transforms = vec!["Fx/Sparks".into()];
        let controller = assemble(&cfg).unwrap();
        let fx = controller.layer(DETERRENT_LAYER).and_then(|l| l.mask.as_ref()).unwrap();
        assert!(fx.allows_transform("Fx/Sparks/Trail"));
    }

    #[test]
    fn test_merge_rejects_param_kind_conflict() {
        let mut controller = Controller::new("c");
        controller.declare(ParamDecl::int(SUCCESS)).unwrap();
        let component = Component {
            name: "clash",
            params: vec![ParamDecl::bool(SUCCESS)],
            layers: Vec::new(),
        };
        assert!(matches!(
            merge(&mut controller, component),
            Err(TopologyViolation::UndeclaredParameter { .. })
        ));
    }
}
