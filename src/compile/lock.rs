//! Visibility/lock controller.
//!
//! Every replica starts in `Remote`. The local replica drops into `Locked`
//! until `Success`; remote replicas wait in `Remote` and go straight to
//! `Unlocked` once the synchronized `Success` arrives. This is the only
//! layer allowed to emit layer weight instructions.

use crate::error::CompileError;
use crate::graph::{
    Action, BodyPart, Condition, Layer, LayerMask, Motion, ParamDecl, State, Transition, IS_LOCAL, SUCCESS,
};

use super::{Component, LayerLayout, LOCK_LAYER};

pub const REMOTE: &str = "Remote";
pub const LOCKED: &str = "Locked";
pub const UNLOCKED: &str = "Unlocked";

/// Clip that hides the avatar, restricted by the lock layer's mask.
pub const HIDE_CLIP: &str = "hide_all";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockState {
    Remote,
    Locked,
    Unlocked,
}

impl LockState {
    pub fn from_state_name(name: &str) -> Option<Self> {
        match name {
            REMOTE => Some(LockState::Remote),
            LOCKED => Some(LockState::Locked),
            UNLOCKED => Some(LockState::Unlocked),
            _ => None,
        }
    }
}

/// `(layer, weight)` pairs for a lock state: host layers off and own
/// visuals on when locked, the reverse when unlocked.
pub fn weight_plan(layout: &LayerLayout, locked: bool) -> Vec<(usize, f32)> {
    let (host, own) = if locked { (0.0, 1.0) } else { (1.0, 0.0) };
    layout
        .host()
        .map(|i| (i, host))
        .chain(std::iter::once((layout.lock(), own)))
        .collect()
}

/// The lock's own mask: every body part, plus the renderer paths it hides.
/// With no paths it hides the body only.
pub fn static_mask(hide_transforms: &[String]) -> LayerMask {
    LayerMask {
        parts: BodyPart::ALL.iter().copied().collect(),
        transforms: hide_transforms.iter().cloned().collect(),
    }
}

fn with_weights(mut state: State, plan: Vec<(usize, f32)>) -> State {
    for (layer, weight) in plan {
        state = state.on_enter(Action::LayerWeight { layer, weight });
    }
    state
}

pub fn compile(layout: &LayerLayout, hide_transforms: &[String]) -> Result<Component, CompileError> {
    let mut layer = Layer::new(LOCK_LAYER, REMOTE);
    layer.mask = Some(static_mask(hide_transforms));

    layer.add_state(State::new(REMOTE));
    layer.add_state(with_weights(
        State::new(LOCKED).with_motion(Motion::clip(HIDE_CLIP)),
        weight_plan(layout, true),
    ));
    layer.add_state(with_weights(State::new(UNLOCKED), weight_plan(layout, false)));

    layer.add_transition(
        Transition::instant(REMOTE, UNLOCKED)
            .when(Condition::is_true(SUCCESS))
            .labeled("remote_unlock"),
    );
    layer.add_transition(
        Transition::instant(REMOTE, LOCKED)
            .when(Condition::is_true(IS_LOCAL))
            .when(Condition::is_false(SUCCESS))
            .labeled("lock"),
    );
    layer.add_transition(
        Transition::instant(LOCKED, LOCKED)
            .when(Condition::is_false(SUCCESS))
            .labeled("hold"),
    );
    layer.add_transition(
        Transition::instant(LOCKED, UNLOCKED)
            .when(Condition::is_true(SUCCESS))
            .labeled("unlock"),
    );
    layer.add_transition(
        Transition::instant(UNLOCKED, REMOTE)
            .when(Condition::is_false(SUCCESS))
            .labeled("reset"),
    );

    Component {
        name: "lock",
        params: vec![ParamDecl::bool(SUCCESS).saved().synced(), ParamDecl::bool(IS_LOCAL)],
        layers: vec![layer],
    }
    .checked()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::eval::{LayerRunner, ParamStore};
    use crate::graph::ParamValue;

    fn runner(is_local: bool) -> (LayerRunner, ParamStore) {
        let component = compile(&LayerLayout::new(2), &[]).unwrap();
        let mut store = ParamStore::from_decls(&component.params);
        store.set(IS_LOCAL, ParamValue::Bool(is_local));
        (LayerRunner::new(component.layers[0].clone()), store)
    }

    #[test]
    fn test_weight_plan_inverts() {
        let layout = LayerLayout::new(2);
        assert_eq!(weight_plan(&layout, true), vec![(0, 0.0), (1, 0.0), (5, 1.0)]);
        assert_eq!(weight_plan(&layout, false), vec![(0, 1.0), (1, 1.0), (5, 0.0)]);
    }

    #[test]
    fn test_local_locks_then_unlocks() {
        let (mut lock, mut store) = runner(true);
        let out = lock.step(0.016, &mut store);
        assert_eq!(lock.active_state(), LOCKED);
        assert_eq!(out.weight_overrides, vec![(0, 0.0), (1, 0.0), (5, 1.0)]);

        lock.step(0.016, &mut store);
        assert_eq!(lock.active_state(), LOCKED);

        store.set(SUCCESS, ParamValue::Bool(true));
        let out = lock.step(0.016, &mut store);
        assert_eq!(lock.active_state(), UNLOCKED);
        assert_eq!(out.weight_overrides, vec![(0, 1.0), (1, 1.0), (5, 0.0)]);
    }

    #[test]
    fn test_remote_waits_for_success() {
        let (mut lock, mut store) = runner(false);
        for _ in 0..10 {
            assert!(lock.step(0.016, &mut store).weight_overrides.is_empty());
        }
        assert_eq!(lock.active_state(), REMOTE);
        store.set(SUCCESS, ParamValue::Bool(true));
        lock.step(0.016, &mut store);
        assert_eq!(lock.active_state(), UNLOCKED);
    }

    #[test]
    fn test_reset_returns_to_remote() {
        let (mut lock, mut store) = runner(true);
        store.set(SUCCESS, ParamValue::Bool(true));
        lock.step(0.016, &mut store);
        assert_eq!(lock.active_state(), UNLOCKED);
        store.set(SUCCESS, ParamValue::Bool(false));
        lock.step(0.016, &mut store);
        assert_eq!(lock.active_state(), REMOTE);
        lock.step(0.016, &mut store);
        assert_eq!(lock.active_state(), LOCKED);
    }

    #[test]
    fn test_static_mask_owned_by_layer() {
        let hidden = vec!["Body".to_string(), "Accessories/Hat".to_string()];
        let component = compile(&LayerLayout::new(0), &hidden).unwrap();
        let layer = &component.layers[0];
        let mask = layer.mask.as_ref().unwrap();
        assert!(BodyPart::ALL.iter().all(|p| mask.allows_part(*p)));
        assert!(mask.allows_transform("Body/Mesh"));
        assert!(mask.allows_transform("Accessories/Hat"));
        assert!(!mask.allows_transform("Accessories/Scarf"));
        assert_eq!(layer.state(LOCKED).unwrap().motion.clip_names(), vec![HIDE_CLIP]);
    }

    #[test]
    fn test_empty_hide_list_hides_body_only() {
        let mask = static_mask(&[]);
        assert_eq!(mask.parts.len(), BodyPart::ALL.len());
        assert!(mask.transforms.is_empty());
        assert!(!mask.allows_transform("Body"));
    }
}
