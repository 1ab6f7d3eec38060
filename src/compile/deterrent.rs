//! Timeout-triggered deterrent.
//!
//! `Inactive -> Active` once the local replica's countdown expires without
//! `Success`. The payload is a parallel composition of opaque effects.
//! Padding states only add size to the serialized asset: nothing enters
//! them, so they never influence which state is active.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{EffectConfig, MAX_PADDING_STATES};
use crate::error::{CompileError, ConfigError};
use crate::graph::{Condition, Layer, LayerMask, Motion, ParamDecl, State, Transition, EXPIRED, IS_LOCAL, SUCCESS};

use super::{Component, DETERRENT_LAYER};

pub const INACTIVE: &str = "Inactive";
pub const ACTIVE: &str = "Active";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Effect {
    pub name: String,
    pub clip: String,
    /// Transform paths the clip animates.
    pub transforms: Vec<String>,
}

/// Effects that run side by side while `Active`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Payload {
    effects: Vec<Effect>,
}

impl Payload {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn single(name: &str, clip: &str) -> Self {
        Self {
            effects: vec![Effect {
                name: name.to_string(),
                clip: clip.to_string(),
                transforms: Vec::new(),
            }],
        }
    }

    pub fn from_configs(configs: &[EffectConfig]) -> Result<Self, ConfigError> {
        let mut seen = HashSet::new();
        let mut payload = Payload::empty();
        for cfg in configs {
            if !seen.insert(cfg.name.as_str()) {
                return Err(ConfigError::DuplicateEffect(cfg.name.clone()));
            }
            payload = payload.compose(Payload {
                effects: vec![Effect {
                    name: cfg.name.clone(),
                    clip: cfg.clip.clone(),
                    transforms: cfg.transforms.clone(),
                }],
            });
        }
        Ok(payload)
    }

    /// Parallel composition; associative with `empty()` as identity.
    pub fn compose(mut self, other: Payload) -> Payload {
        self.effects.extend(other.effects);
        self
    }

    pub fn without(&self, name: &str) -> Payload {
        Payload {
            effects: self.effects.iter().filter(|e| e.name != name).cloned().collect(),
        }
    }

    pub fn effects(&self) -> &[Effect] {
        &self.effects
    }

    /// Union of every effect's transforms.
    pub fn mask(&self) -> LayerMask {
        LayerMask {
            parts: Default::default(),
            transforms: self.effects.iter().flat_map(|e| e.transforms.iter().cloned()).collect(),
        }
    }

    pub fn motion(&self) -> Motion {
        self.effects
            .iter()
            .fold(Motion::None, |acc, e| acc.parallel(Motion::clip(&e.clip)))
    }
}

/// Deterministic filler names for a given seed.
pub fn padding_names(count: usize, seed: u64) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seen: HashSet<String> = [INACTIVE, ACTIVE].iter().map(|s| s.to_string()).collect();
    let mut names = Vec::with_capacity(count);
    while names.len() < count {
        let name = format!("{:012x}", rng.gen::<u64>() & 0xffff_ffff_ffff);
        if seen.insert(name.clone()) {
            names.push(name);
        }
    }
    names
}

pub fn compile(payload: &Payload, padding: usize, seed: u64) -> Result<Component, CompileError> {
    if padding > MAX_PADDING_STATES {
        return Err(ConfigError::PaddingTooLarge {
            count: padding,
            limit: MAX_PADDING_STATES,
        }
        .into());
    }

    let mut layer = Layer::new(DETERRENT_LAYER, INACTIVE);
    layer.mask = Some(payload.mask());
    layer.add_state(State::new(INACTIVE));
    layer.add_state(State::new(ACTIVE).with_motion(payload.motion()));

    layer.add_transition(
        Transition::instant(INACTIVE, ACTIVE)
            .when(Condition::is_true(EXPIRED))
            .when(Condition::is_true(IS_LOCAL))
            .when(Condition::is_false(SUCCESS))
            .labeled("trigger"),
    );
    layer.add_transition(
        Transition::instant(ACTIVE, INACTIVE)
            .when(Condition::is_true(SUCCESS))
            .labeled("suppress"),
    );

    for name in padding_names(padding, seed) {
        layer.add_state(State::padding(&name));
        layer.add_transition(Transition::dwell(&name, INACTIVE, 1.0).labeled("pad"));
    }

    Component {
        name: "deterrent",
        params: vec![
            ParamDecl::bool(SUCCESS).saved().synced(),
            ParamDecl::bool(EXPIRED),
            ParamDecl::bool(IS_LOCAL),
        ],
        layers: vec![layer],
    }
    .checked()
}
