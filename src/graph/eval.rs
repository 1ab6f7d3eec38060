//! Per-frame evaluation of a single layer.
//!
//! Order within one frame:
//! 1. time-in-state advances by `dt`
//! 2. any-state transitions (global overrides)
//! 3. the active state's instant transitions
//! 4. the active state's dwell transitions
//!
//! At most one transition fires per layer per frame. Firing resets
//! time-in-state, self-loops included. A dwell fires once its guard has
//! held continuously for its duration inside the current state.

use std::collections::{BTreeMap, HashMap};

use super::{
    Action, Condition, Layer, Motion, ParamDecl, ParamKind, ParamValue, Transition, TransitionMode,
};

/// Slack for dwell comparisons against accumulated frame time.
pub const DWELL_EPSILON: f64 = 1e-6;

// =============================================================================
// Parameter store
// =============================================================================

#[derive(Debug, Clone, Default)]
pub struct ParamStore {
    values: BTreeMap<String, ParamValue>,
}

impl ParamStore {
    pub fn from_decls(decls: &[ParamDecl]) -> Self {
        Self {
            values: decls.iter().map(|d| (d.name.clone(), d.default)).collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<ParamValue> {
        self.values.get(name).copied()
    }

    pub fn int(&self, name: &str) -> i32 {
        match self.get(name) {
            Some(ParamValue::Int(v)) => v,
            _ => 0,
        }
    }

    pub fn bool(&self, name: &str) -> bool {
        matches!(self.get(name), Some(ParamValue::Bool(true)))
    }

    pub fn float(&self, name: &str) -> f64 {
        match self.get(name) {
            Some(ParamValue::Float(v)) => v,
            _ => 0.0,
        }
    }

    pub fn is_triggered(&self, name: &str) -> bool {
        matches!(self.get(name), Some(ParamValue::Trigger(true)))
    }

    /// Writes a value if the parameter exists with the same kind.
    /// Returns false when the write was dropped.
    pub fn set(&mut self, name: &str, value: ParamValue) -> bool {
        match self.values.get_mut(name) {
            Some(slot) if slot.kind() == value.kind() => {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    pub fn fire(&mut self, name: &str) -> bool {
        self.set(name, ParamValue::Trigger(true))
    }

    /// Resets every trigger. Called once at the end of a frame.
    pub fn clear_triggers(&mut self) {
        for value in self.values.values_mut() {
            if value.kind() == ParamKind::Trigger {
                *value = ParamValue::Trigger(false);
            }
        }
    }

    pub fn holds(&self, cond: &Condition) -> bool {
        match cond {
            Condition::IntEq { param, value } => self.int(param) == *value,
            Condition::IntNe { param, value } => self.int(param) != *value,
            Condition::IsTrue { param } => self.bool(param),
            Condition::IsFalse { param } => !self.bool(param),
            Condition::Triggered { param } => self.is_triggered(param),
        }
    }

    pub fn holds_all(&self, conds: &[Condition]) -> bool {
        conds.iter().all(|c| self.holds(c))
    }
}

// =============================================================================
// Layer runner
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Fired {
    pub layer: String,
    pub from: String,
    pub to: String,
    pub label: String,
}

impl Fired {
    /// Re-entry of the same state (idle and hold loops).
    pub fn is_self_loop(&self) -> bool {
        self.from == self.to
    }
}

#[derive(Debug, Clone, Default)]
pub struct StepOutput {
    pub fired: Option<Fired>,
    /// `(layer_index, weight)` instructions from entry actions.
    pub weight_overrides: Vec<(usize, f32)>,
    /// Writes that targeted a missing or mistyped parameter.
    pub dropped_writes: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LayerRunner {
    layer: Layer,
    index: HashMap<String, usize>,
    /// Indices into `layer.transitions`, grouped by source state.
    outgoing: Vec<Vec<usize>>,
    active: usize,
    elapsed: f64,
    /// Continuous guard-hold time per transition, any-state edges after
    /// `layer.transitions`. Reset on every state entry.
    held: Vec<f64>,
    entered: bool,
}

impl LayerRunner {
    pub fn new(layer: Layer) -> Self {
        let index: HashMap<String, usize> = layer
            .states
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.clone(), i))
            .collect();
        let mut outgoing = vec![Vec::new(); layer.states.len()];
        for (i, t) in layer.transitions.iter().enumerate() {
            if let Some(&from) = index.get(&t.from) {
                outgoing[from].push(i);
            }
        }
        let active = index.get(&layer.default_state).copied().unwrap_or(0);
        let held = vec![0.0; layer.transitions.len() + layer.any_state.len()];
        Self {
            layer,
            index,
            outgoing,
            active,
            elapsed: 0.0,
            held,
            entered: false,
        }
    }

    pub fn layer(&self) -> &Layer {
        &self.layer
    }

    pub fn active_state(&self) -> &str {
        self.layer
            .states
            .get(self.active)
            .map(|s| s.name.as_str())
            .unwrap_or("")
    }

    pub fn time_in_state(&self) -> f64 {
        self.elapsed
    }

    pub fn step(&mut self, dt: f64, store: &mut ParamStore) -> StepOutput {
        let mut out = StepOutput::default();
        if !self.entered {
            self.entered = true;
            self.run_entry(store, &mut out);
        }

        let dt = dt.max(0.0);
        self.elapsed += dt;
        self.accumulate_holds(dt, store);

        if let Some(t) = self.select(store).cloned() {
            if let Some(&next) = self.index.get(&t.to) {
                out.fired = Some(Fired {
                    layer: self.layer.name.clone(),
                    from: self.active_state().to_string(),
                    to: t.to.clone(),
                    label: t.label.clone(),
                });
                self.active = next;
                self.elapsed = 0.0;
                self.held.iter_mut().for_each(|h| *h = 0.0);
                self.run_entry(store, &mut out);
            }
        }

        self.drive_motion(store);
        out
    }

    /// Any-state edges as `(slot in held, transition)`.
    fn any_slots(&self) -> impl Iterator<Item = (usize, &Transition)> {
        let base = self.layer.transitions.len();
        self.layer.any_state.iter().enumerate().map(move |(i, t)| (base + i, t))
    }

    /// Active state's edges as `(slot in held, transition)`.
    fn own_slots(&self) -> impl Iterator<Item = (usize, &Transition)> {
        self.outgoing
            .get(self.active)
            .into_iter()
            .flatten()
            .map(|&i| (i, &self.layer.transitions[i]))
    }

    /// Dwell guards must hold without a break; a false frame restarts them.
    fn accumulate_holds(&mut self, dt: f64, store: &ParamStore) {
        let updates: Vec<(usize, bool)> = self
            .any_slots()
            .chain(self.own_slots())
            .filter(|(_, t)| !t.mode.is_instant())
            .map(|(slot, t)| (slot, store.holds_all(&t.conditions)))
            .collect();
        for (slot, holds) in updates {
            self.held[slot] = if holds { self.held[slot] + dt } else { 0.0 };
        }
    }

    fn ready(&self, slot: usize, t: &Transition) -> bool {
        match t.mode {
            TransitionMode::Instant => true,
            TransitionMode::Dwell { seconds } => self.held[slot] + DWELL_EPSILON >= seconds,
        }
    }

    fn select(&self, store: &ParamStore) -> Option<&Transition> {
        let current = self.active_state();

        if let Some((_, t)) = self
            .any_slots()
            .filter(|(_, t)| t.to != current)
            .find(|(slot, t)| self.ready(*slot, t) && store.holds_all(&t.conditions))
        {
            return Some(t);
        }

        if let Some((_, t)) = self
            .own_slots()
            .filter(|(_, t)| t.mode.is_instant())
            .find(|(_, t)| store.holds_all(&t.conditions))
        {
            return Some(t);
        }
        self.own_slots()
            .filter(|(_, t)| !t.mode.is_instant())
            .find(|(slot, t)| self.ready(*slot, t) && store.holds_all(&t.conditions))
            .map(|(_, t)| t)
    }

    fn run_entry(&self, store: &mut ParamStore, out: &mut StepOutput) {
        let Some(state) = self.layer.states.get(self.active) else {
            return;
        };
        for action in &state.on_enter {
            match action {
                Action::SetBool { param, value } => {
                    if !store.set(param, ParamValue::Bool(*value)) {
                        out.dropped_writes.push(param.clone());
                    }
                }
                Action::SetFloat { param, value } => {
                    if !store.set(param, ParamValue::Float(*value)) {
                        out.dropped_writes.push(param.clone());
                    }
                }
                Action::Fire { param } => {
                    if !store.fire(param) {
                        out.dropped_writes.push(param.clone());
                    }
                }
                Action::LayerWeight { layer, weight } => {
                    out.weight_overrides.push((*layer, *weight));
                }
            }
        }
    }

    fn drive_motion(&self, store: &mut ParamStore) {
        if let Some(state) = self.layer.states.get(self.active) {
            drive(&state.motion, self.elapsed, store);
        }
    }
}

fn drive(motion: &Motion, elapsed: f64, store: &mut ParamStore) {
    match motion {
        Motion::Countdown { param, seconds } => {
            let progress = if *seconds > 0.0 {
                (1.0 - elapsed / seconds).clamp(0.0, 1.0)
            } else {
                0.0
            };
            store.set(param, ParamValue::Float(progress));
        }
        Motion::Parallel { children } => {
            for child in children {
                drive(child, elapsed, store);
            }
        }
        Motion::None | Motion::Clip { .. } => {}
    }
}
