//! Declarative state-machine model shared by every compiled component.
//!
//! A [`Controller`] is what the host platform stores as one asset: a flat
//! parameter table plus an ordered list of [`Layer`]s. Each layer is an
//! independent state machine whose transitions are guarded by conjunctions
//! of [`Condition`]s over the parameter table.

pub mod eval;

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

// =============================================================================
// Shared parameter names
// =============================================================================

/// Per-frame input symbol (0 = idle).
pub const SYMBOL: &str = "Symbol";
/// Authentication result. Saved and network-synchronized.
pub const SUCCESS: &str = "Success";
/// Countdown lapsed. Local only.
pub const EXPIRED: &str = "Expired";
/// Platform-provided local/remote discriminator.
pub const IS_LOCAL: &str = "IsLocal";
/// Countdown progress scalar in [0, 1].
pub const PROGRESS: &str = "Progress";
/// Discrete warning pulse.
pub const WARNING: &str = "Warning";

/// Source marker for any-state transitions.
pub const ANY_STATE: &str = "AnyState";

// =============================================================================
// Parameters
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamKind {
    Int,
    Bool,
    Float,
    Trigger,
}

impl ParamKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParamKind::Int => "int",
            ParamKind::Bool => "bool",
            ParamKind::Float => "float",
            ParamKind::Trigger => "trigger",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum ParamValue {
    Int(i32),
    Bool(bool),
    Float(f64),
    Trigger(bool),
}

impl ParamValue {
    pub fn kind(&self) -> ParamKind {
        match self {
            ParamValue::Int(_) => ParamKind::Int,
            ParamValue::Bool(_) => ParamKind::Bool,
            ParamValue::Float(_) => ParamKind::Float,
            ParamValue::Trigger(_) => ParamKind::Trigger,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    pub default: ParamValue,
    /// Persisted across avatar reloads.
    pub saved: bool,
    /// Replicated to remote observers.
    pub synced: bool,
}

impl ParamDecl {
    fn new(name: &str, default: ParamValue) -> Self {
        Self {
            name: name.to_string(),
            default,
            saved: false,
            synced: false,
        }
    }

    pub fn int(name: &str) -> Self {
        Self::new(name, ParamValue::Int(0))
    }

    pub fn bool(name: &str) -> Self {
        Self::new(name, ParamValue::Bool(false))
    }

    pub fn float(name: &str, default: f64) -> Self {
        Self::new(name, ParamValue::Float(default))
    }

    pub fn trigger(name: &str) -> Self {
        Self::new(name, ParamValue::Trigger(false))
    }

    pub fn saved(mut self) -> Self {
        self.saved = true;
        self
    }

    pub fn synced(mut self) -> Self {
        self.synced = true;
        self
    }

    pub fn kind(&self) -> ParamKind {
        self.default.kind()
    }
}

// =============================================================================
// Guards
// =============================================================================

/// One guard atom. A transition fires only when all of its conditions hold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Condition {
    IntEq { param: String, value: i32 },
    IntNe { param: String, value: i32 },
    IsTrue { param: String },
    IsFalse { param: String },
    Triggered { param: String },
}

impl Condition {
    pub fn int_eq(param: &str, value: i32) -> Self {
        Condition::IntEq {
            param: param.to_string(),
            value,
        }
    }

    pub fn int_ne(param: &str, value: i32) -> Self {
        Condition::IntNe {
            param: param.to_string(),
            value,
        }
    }

    pub fn is_true(param: &str) -> Self {
        Condition::IsTrue {
            param: param.to_string(),
        }
    }

    pub fn is_false(param: &str) -> Self {
        Condition::IsFalse {
            param: param.to_string(),
        }
    }

    pub fn param(&self) -> &str {
        match self {
            Condition::IntEq { param, .. }
            | Condition::IntNe { param, .. }
            | Condition::IsTrue { param }
            | Condition::IsFalse { param }
            | Condition::Triggered { param } => param,
        }
    }

    pub fn expected_kind(&self) -> ParamKind {
        match self {
            Condition::IntEq { .. } | Condition::IntNe { .. } => ParamKind::Int,
            Condition::IsTrue { .. } | Condition::IsFalse { .. } => ParamKind::Bool,
            Condition::Triggered { .. } => ParamKind::Trigger,
        }
    }
}

impl fmt::Display for Condition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Condition::IntEq { param, value } => write!(f, "{} == {}", param, value),
            Condition::IntNe { param, value } => write!(f, "{} != {}", param, value),
            Condition::IsTrue { param } => write!(f, "{}", param),
            Condition::IsFalse { param } => write!(f, "!{}", param),
            Condition::Triggered { param } => write!(f, "{}!", param),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TransitionMode {
    /// Fires the frame its guard holds.
    Instant,
    /// Fires once the source has been active for `seconds` with the guard holding.
    Dwell { seconds: f64 },
}

impl TransitionMode {
    pub fn is_instant(&self) -> bool {
        matches!(self, TransitionMode::Instant)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: String,
    pub to: String,
    #[serde(flatten)]
    pub mode: TransitionMode,
    pub conditions: Vec<Condition>,
    pub label: String,
}

impl Transition {
    pub fn instant(from: &str, to: &str) -> Self {
        Self {
            from: from.to_string(),
            to: to.to_string(),
            mode: TransitionMode::Instant,
            conditions: Vec::new(),
            label: format!("{}->{}", from, to),
        }
    }

    pub fn dwell(from: &str, to: &str, seconds: f64) -> Self {
        Self {
            mode: TransitionMode::Dwell { seconds },
            ..Self::instant(from, to)
        }
    }

    /// Any-state transition: evaluated from every state except its target.
    pub fn any(to: &str) -> Self {
        Self::instant(ANY_STATE, to)
    }

    pub fn when(mut self, cond: Condition) -> Self {
        self.conditions.push(cond);
        self
    }

    pub fn labeled(mut self, label: &str) -> Self {
        self.label = label.to_string();
        self
    }

    pub fn guard_text(&self) -> String {
        if self.conditions.is_empty() {
            return "true".to_string();
        }
        self.conditions
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(" && ")
    }
}

// =============================================================================
// States
// =============================================================================

/// Side effect run when a state is entered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    SetBool { param: String, value: bool },
    SetFloat { param: String, value: f64 },
    Fire { param: String },
    LayerWeight { layer: usize, weight: f32 },
}

impl Action {
    pub fn set_bool(param: &str, value: bool) -> Self {
        Action::SetBool {
            param: param.to_string(),
            value,
        }
    }

    pub fn fire(param: &str) -> Self {
        Action::Fire {
            param: param.to_string(),
        }
    }
}

/// Output bound to a state for as long as it is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "motion", rename_all = "snake_case")]
pub enum Motion {
    None,
    Clip { name: String },
    /// Linear 1.0 -> 0.0 over `seconds`, published to `param`.
    Countdown { param: String, seconds: f64 },
    Parallel { children: Vec<Motion> },
}

impl Motion {
    pub fn clip(name: &str) -> Self {
        Motion::Clip {
            name: name.to_string(),
        }
    }

    /// Parallel composition. Nested parallels are flattened and `None` is
    /// the identity, so grouping never changes the result.
    pub fn parallel(self, other: Motion) -> Motion {
        let mut children = Vec::new();
        for m in [self, other] {
            match m {
                Motion::None => {}
                Motion::Parallel { children: inner } => children.extend(inner),
                leaf => children.push(leaf),
            }
        }
        match children.len() {
            0 => Motion::None,
            1 => children.pop().unwrap_or(Motion::None),
            _ => Motion::Parallel { children },
        }
    }

    pub fn clip_names(&self) -> Vec<&str> {
        match self {
            Motion::Clip { name } => vec![name.as_str()],
            Motion::Parallel { children } => children.iter().flat_map(|c| c.clip_names()).collect(),
            _ => Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateRole {
    /// Must be reachable from the layer's default state.
    Required,
    /// Size-inflating filler. Must be unreachable.
    Padding,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct State {
    pub name: String,
    pub role: StateRole,
    pub motion: Motion,
    pub on_enter: Vec<Action>,
}

impl State {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            role: StateRole::Required,
            motion: Motion::None,
            on_enter: Vec::new(),
        }
    }

    pub fn padding(name: &str) -> Self {
        Self {
            role: StateRole::Padding,
            ..Self::new(name)
        }
    }

    pub fn with_motion(mut self, motion: Motion) -> Self {
        self.motion = motion;
        self
    }

    pub fn on_enter(mut self, action: Action) -> Self {
        self.on_enter.push(action);
        self
    }
}

// =============================================================================
// Masks
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BodyPart {
    Root,
    Body,
    Head,
    LeftArm,
    RightArm,
    LeftHand,
    RightHand,
    LeftLeg,
    RightLeg,
    LeftFoot,
    RightFoot,
}

impl BodyPart {
    pub const ALL: [BodyPart; 11] = [
        BodyPart::Root,
        BodyPart::Body,
        BodyPart::Head,
        BodyPart::LeftArm,
        BodyPart::RightArm,
        BodyPart::LeftHand,
        BodyPart::RightHand,
        BodyPart::LeftLeg,
        BodyPart::RightLeg,
        BodyPart::LeftFoot,
        BodyPart::RightFoot,
    ];
}

/// Channels a layer's output drives. An empty mask drives nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerMask {
    pub parts: BTreeSet<BodyPart>,
    /// Transform paths; a path also admits everything beneath it.
    pub transforms: BTreeSet<String>,
}

impl LayerMask {
    pub fn allows_part(&self, part: BodyPart) -> bool {
        self.parts.contains(&part)
    }

    pub fn allows_transform(&self, path: &str) -> bool {
        self.transforms.iter().any(|root| {
            path == root
                || (path.starts_with(root.as_str()) && path[root.len()..].starts_with('/'))
        })
    }
}

// =============================================================================
// Layers and controllers
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub name: String,
    pub default_state: String,
    pub states: Vec<State>,
    pub transitions: Vec<Transition>,
    pub any_state: Vec<Transition>,
    pub mask: Option<LayerMask>,
}

impl Layer {
    pub fn new(name: &str, default_state: &str) -> Self {
        Self {
            name: name.to_string(),
            default_state: default_state.to_string(),
            states: Vec::new(),
            transitions: Vec::new(),
            any_state: Vec::new(),
            mask: None,
        }
    }

    pub fn add_state(&mut self, state: State) {
        self.states.push(state);
    }

    pub fn add_transition(&mut self, transition: Transition) {
        if transition.from == ANY_STATE {
            self.any_state.push(transition);
        } else {
            self.transitions.push(transition);
        }
    }

    pub fn state(&self, name: &str) -> Option<&State> {
        self.states.iter().find(|s| s.name == name)
    }

    pub fn outgoing<'a>(&'a self, from: &'a str) -> impl Iterator<Item = &'a Transition> + 'a {
        self.transitions.iter().filter(move |t| t.from == from)
    }

    pub fn state_names(&self) -> Vec<&str> {
        self.states.iter().map(|s| s.name.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Controller {
    pub name: String,
    pub params: Vec<ParamDecl>,
    pub layers: Vec<Layer>,
}

impl Controller {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            params: Vec::new(),
            layers: Vec::new(),
        }
    }

    pub fn param(&self, name: &str) -> Option<&ParamDecl> {
        self.params.iter().find(|p| p.name == name)
    }

    /// Adds a parameter unless one with the same name exists. Returns the
    /// kind already declared if it conflicts.
    pub fn declare(&mut self, decl: ParamDecl) -> Result<(), ParamKind> {
        match self.param(&decl.name) {
            Some(existing) if existing.kind() != decl.kind() => Err(existing.kind()),
            Some(_) => Ok(()),
            None => {
                self.params.push(decl);
                Ok(())
            }
        }
    }

    pub fn layer(&self, name: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn layer_index(&self, name: &str) -> Option<usize> {
        self.layers.iter().position(|l| l.name == name)
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
}
