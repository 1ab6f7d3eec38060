use std::collections::{BTreeSet, HashSet, VecDeque};

use crate::error::TopologyViolation;
use crate::graph::{Action, Controller, Layer, Motion, ParamDecl, ParamKind, StateRole};

use super::guards;

pub fn assert_unique_state_names(layer: &Layer) -> Result<(), TopologyViolation> {
    let mut seen = HashSet::new();
    for state in &layer.states {
        if !seen.insert(state.name.as_str()) {
            return Err(TopologyViolation::DuplicateStateName {
                layer: layer.name.clone(),
                state: state.name.clone(),
            });
        }
    }
    Ok(())
}

pub fn assert_transitions_resolve(layer: &Layer) -> Result<(), TopologyViolation> {
    let names: HashSet<&str> = layer.states.iter().map(|s| s.name.as_str()).collect();
    let unknown = |state: &str| TopologyViolation::UnknownState {
        layer: layer.name.clone(),
        state: state.to_string(),
    };
    if !names.contains(layer.default_state.as_str()) {
        return Err(unknown(&layer.default_state));
    }
    for t in &layer.transitions {
        if !names.contains(t.from.as_str()) {
            return Err(unknown(&t.from));
        }
        if !names.contains(t.to.as_str()) {
            return Err(unknown(&t.to));
        }
    }
    for t in &layer.any_state {
        if !names.contains(t.to.as_str()) {
            return Err(unknown(&t.to));
        }
    }
    Ok(())
}

/// States reachable from the default state over edges whose guards are
/// satisfiable. Any-state targets are reachable once anything is.
pub fn reachable(layer: &Layer) -> BTreeSet<String> {
    let mut seen = BTreeSet::new();
    let mut queue = VecDeque::new();
    seen.insert(layer.default_state.clone());
    queue.push_back(layer.default_state.clone());

    for t in &layer.any_state {
        if guards::satisfiable(&t.conditions) && seen.insert(t.to.clone()) {
            queue.push_back(t.to.clone());
        }
    }

    while let Some(current) = queue.pop_front() {
        for t in layer.outgoing(&current) {
            if guards::satisfiable(&t.conditions) && seen.insert(t.to.clone()) {
                queue.push_back(t.to.clone());
            }
        }
    }
    seen
}

/// Required states must be reachable, padding states must not be.
pub fn assert_reachability(layer: &Layer) -> Result<(), TopologyViolation> {
    let live = reachable(layer);
    for state in &layer.states {
        let is_live = live.contains(&state.name);
        match state.role {
            StateRole::Required if !is_live => {
                return Err(TopologyViolation::UnreachableRequired {
                    layer: layer.name.clone(),
                    state: state.name.clone(),
                })
            }
            StateRole::Padding if is_live => {
                return Err(TopologyViolation::ReachablePadding {
                    layer: layer.name.clone(),
                    state: state.name.clone(),
                })
            }
            _ => {}
        }
    }
    Ok(())
}

/// No two instant transitions leaving the same source (or two any-state
/// transitions) may hold in the same frame.
pub fn assert_guards_disjoint(layer: &Layer) -> Result<(), TopologyViolation> {
    let check = |source: &str, instants: &[&crate::graph::Transition]| {
        for (i, a) in instants.iter().enumerate() {
            for b in &instants[i + 1..] {
                if let Some(witness) = guards::overlap(&a.conditions, &b.conditions) {
                    return Err(TopologyViolation::OverlappingGuards {
                        layer: layer.name.clone(),
                        state: source.to_string(),
                        first: a.label.clone(),
                        second: b.label.clone(),
                        witness: witness.to_string(),
                    });
                }
            }
        }
        Ok(())
    };

    let any: Vec<_> = layer.any_state.iter().filter(|t| t.mode.is_instant()).collect();
    check(crate::graph::ANY_STATE, &any)?;

    for state in &layer.states {
        let instants: Vec<_> = layer
            .outgoing(&state.name)
            .filter(|t| t.mode.is_instant())
            .collect();
        check(&state.name, &instants)?;
    }
    Ok(())
}

fn assert_declared(
    layer: &Layer,
    params: &[ParamDecl],
    name: &str,
    kind: ParamKind,
) -> Result<(), TopologyViolation> {
    match params.iter().find(|p| p.name == name) {
        Some(p) if p.kind() == kind => Ok(()),
        _ => Err(TopologyViolation::UndeclaredParameter {
            layer: layer.name.clone(),
            param: name.to_string(),
            expected: kind.as_str(),
        }),
    }
}

fn motion_params(motion: &Motion, out: &mut Vec<String>) {
    match motion {
        Motion::Countdown { param, .. } => out.push(param.clone()),
        Motion::Parallel { children } => {
            for child in children {
                motion_params(child, out);
            }
        }
        Motion::None | Motion::Clip { .. } => {}
    }
}

/// Every guard, entry action and motion references a declared parameter
/// of the right kind.
pub fn assert_params_declared(layer: &Layer, params: &[ParamDecl]) -> Result<(), TopologyViolation> {
    for t in layer.transitions.iter().chain(layer.any_state.iter()) {
        for c in &t.conditions {
            assert_declared(layer, params, c.param(), c.expected_kind())?;
        }
    }
    for state in &layer.states {
        for action in &state.on_enter {
            match action {
                Action::SetBool { param, .. } => assert_declared(layer, params, param, ParamKind::Bool)?,
                Action::SetFloat { param, .. } => assert_declared(layer, params, param, ParamKind::Float)?,
                Action::Fire { param } => assert_declared(layer, params, param, ParamKind::Trigger)?,
                Action::LayerWeight { .. } => {}
            }
        }
        let mut driven = Vec::new();
        motion_params(&state.motion, &mut driven);
        for param in driven {
            assert_declared(layer, params, &param, ParamKind::Float)?;
        }
    }
    Ok(())
}

/// Only `owner` may emit layer weight instructions, and every target must
/// exist in the controller.
pub fn assert_weight_ownership(controller: &Controller, owner: &str) -> Result<(), TopologyViolation> {
    let count = controller.layers.len();
    for layer in &controller.layers {
        for state in &layer.states {
            for action in &state.on_enter {
                if let Action::LayerWeight { layer: target, .. } = action {
                    if layer.name != owner {
                        return Err(TopologyViolation::ForeignWeightWriter {
                            layer: layer.name.clone(),
                            state: state.name.clone(),
                        });
                    }
                    if *target >= count {
                        return Err(TopologyViolation::WeightTargetOutOfRange {
                            layer: layer.name.clone(),
                            target: *target,
                            count,
                        });
                    }
                }
            }
        }
    }
    Ok(())
}

/// The owner's mask may not cover a body part or transform that another
/// layer's mask declares.
pub fn assert_mask_exclusive(controller: &Controller, owner: &str) -> Result<(), TopologyViolation> {
    let Some(owned) = controller.layer(owner).and_then(|l| l.mask.as_ref()) else {
        return Ok(());
    };
    for layer in controller.layers.iter().filter(|l| l.name != owner) {
        let Some(mask) = &layer.mask else { continue };
        let overlap = |channel: String| TopologyViolation::MaskOverlap {
            owner: owner.to_string(),
            layer: layer.name.clone(),
            channel,
        };
        if let Some(part) = mask.parts.iter().find(|p| owned.allows_part(**p)) {
            return Err(overlap(format!("{:?}", part)));
        }
        if let Some(path) = mask.transforms.iter().find(|t| owned.allows_transform(t)) {
            return Err(overlap(path.clone()));
        }
    }
    Ok(())
}

pub fn assert_unique_layer_names(controller: &Controller) -> Result<(), TopologyViolation> {
    let mut seen = HashSet::new();
    for layer in &controller.layers {
        if !seen.insert(layer.name.as_str()) {
            return Err(TopologyViolation::DuplicateLayerName {
                layer: layer.name.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::{BodyPart, Condition, LayerMask, State, Transition, SYMBOL};

    fn base() -> Layer {
        let mut layer = Layer::new("t", "A");
        layer.add_state(State::new("A"));
        layer.add_state(State::new("B"));
        layer.add_transition(Transition::instant("A", "B").when(Condition::int_eq(SYMBOL, 1)));
        layer
    }

    #[test]
    fn test_duplicate_state_detected() {
        let mut layer = base();
        layer.add_state(State::new("A"));
        assert!(matches!(
            assert_unique_state_names(&layer),
            Err(TopologyViolation::DuplicateStateName { .. })
        ));
    }

    #[test]
    fn test_unknown_target_detected() {
        let mut layer = base();
        layer.add_transition(Transition::instant("B", "Nowhere"));
        assert!(matches!(
            assert_transitions_resolve(&layer),
            Err(TopologyViolation::UnknownState { .. })
        ));
    }

    #[test]
    fn test_unsatisfiable_edge_does_not_reach() {
        let mut layer = base();
        layer.add_state(State::new("C"));
        layer.add_transition(
            Transition::instant("B", "C")
                .when(Condition::int_eq(SYMBOL, 2))
                .when(Condition::int_eq(SYMBOL, 3)),
        );
        assert!(!reachable(&layer).contains("C"));
        assert!(matches!(
            assert_reachability(&layer),
            Err(TopologyViolation::UnreachableRequired { .. })
        ));
    }

    #[test]
    fn test_padding_must_be_dead() {
        let mut layer = base();
        layer.add_state(State::padding("Pad"));
        assert!(assert_reachability(&layer).is_ok());
        layer.add_transition(Transition::instant("B", "Pad"));
        assert!(matches!(
            assert_reachability(&layer),
            Err(TopologyViolation::ReachablePadding { .. })
        ));
    }

    #[test]
    fn test_overlapping_instants_detected() {
        let mut layer = base();
        layer.add_transition(Transition::instant("A", "A").when(Condition::int_ne(SYMBOL, 0)));
        let err = assert_guards_disjoint(&layer).unwrap_err();
        match err {
            TopologyViolation::OverlappingGuards { state, witness, .. } => {
                assert_eq!(state, "A");
                assert_eq!(witness, "{Symbol=1}");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dwell_is_exempt_from_overlap() {
        let mut layer = base();
        layer.add_transition(Transition::dwell("A", "A", 1.0).when(Condition::int_eq(SYMBOL, 1)));
        assert!(assert_guards_disjoint(&layer).is_ok());
    }

    #[test]
    fn test_undeclared_param_detected() {
        let layer = base();
        assert!(assert_params_declared(&layer, &[ParamDecl::int(SYMBOL)]).is_ok());
        assert!(matches!(
            assert_params_declared(&layer, &[ParamDecl::bool(SYMBOL)]),
            Err(TopologyViolation::UndeclaredParameter { .. })
        ));
    }

    #[test]
    fn test_foreign_weight_writer_detected() {
        let mut layer = base();
        layer.states[1]
            .on_enter
            .push(Action::LayerWeight { layer: 0, weight: 0.0 });
        let mut controller = Controller::new("c");
        controller.layers.push(layer);
        assert!(assert_weight_ownership(&controller, "t").is_ok());
        assert!(matches!(
            assert_weight_ownership(&controller, "Lock"),
            Err(TopologyViolation::ForeignWeightWriter { .. })
        ));
    }

    fn masked(name: &str, parts: &[BodyPart], transforms: &[&str]) -> Layer {
        let mut layer = Layer::new(name, "A");
        layer.add_state(State::new("A"));
        layer.mask = Some(LayerMask {
            parts: parts.iter().copied().collect(),
            transforms: transforms.iter().map(|t| t.to_string()).collect(),
        });
        layer
    }

    #[test]
    fn test_mask_overlap_detected() {
        let mut c = Controller::new("c");
        c.layers.push(masked("Lock", &[BodyPart::Head], &["Body"]));
        c.layers.push(masked("Fx", &[], &["Fx/Sparks", "Bodysuit"]));
        assert!(assert_mask_exclusive(&c, "Lock").is_ok());

        c.layers.push(masked("Props", &[], &["Body/Hat"]));
        assert_eq!(
            assert_mask_exclusive(&c, "Lock"),
            Err(TopologyViolation::MaskOverlap {
                owner: "Lock".into(),
                layer: "Props".into(),
                channel: "Body/Hat".into(),
            })
        );

        c.layers.pop();
        c.layers.push(masked("Face", &[BodyPart::Head], &[]));
        assert!(matches!(
            assert_mask_exclusive(&c, "Lock"),
            Err(TopologyViolation::MaskOverlap { .. })
        ));
    }
}
