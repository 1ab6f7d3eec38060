//! One independently executing instance of the full controller.

use serde::{Deserialize, Serialize};

use crate::compile::automaton::Symbol;
use crate::compile::lock::LockState;
use crate::compile::timer::TimerState;
use crate::compile::{deterrent, COUNTDOWN_LAYER, DETERRENT_LAYER, LOCK_LAYER, PASSWORD_LAYER};
use crate::graph::eval::{Fired, LayerRunner, ParamStore};
use crate::graph::{Controller, ParamValue, EXPIRED, IS_LOCAL, PROGRESS, SUCCESS, SYMBOL, WARNING};
use crate::logging;

use super::weights::{LayerWeights, Rejected, WeightWrite};

/// Sampled inputs for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameInput {
    /// Raw symbol; anything outside 0..=7 reads as idle.
    pub symbol: i64,
    /// Seconds since the previous frame.
    pub dt: f64,
}

impl FrameInput {
    pub fn new(symbol: i64, dt: f64) -> Self {
        Self { symbol, dt }
    }

    pub fn idle(dt: f64) -> Self {
        Self { symbol: 0, dt }
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameReport {
    pub frame: u64,
    pub transitions: Vec<Fired>,
    pub warning: bool,
    /// Committed `(layer, weight)` instructions.
    pub weight_overrides: Vec<(usize, f32)>,
}

#[derive(Debug, Clone)]
pub struct Replica {
    id: String,
    is_local: bool,
    runners: Vec<LayerRunner>,
    store: ParamStore,
    weights: LayerWeights,
    frame: u64,
}

impl Replica {
    pub fn new(id: &str, controller: &Controller, is_local: bool) -> Self {
        let mut store = ParamStore::from_decls(&controller.params);
        store.set(IS_LOCAL, ParamValue::Bool(is_local));
        Self {
            id: id.to_string(),
            is_local,
            runners: controller.layers.iter().cloned().map(LayerRunner::new).collect(),
            store,
            weights: LayerWeights::new(controller.layers.len(), controller.layer_index(LOCK_LAYER)),
            frame: 0,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_local(&self) -> bool {
        self.is_local
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Advances every layer by one frame, in layer order.
    pub fn step(&mut self, input: FrameInput) -> FrameReport {
        self.frame += 1;
        // Only the authoritative replica recognizes input.
        let symbol = if self.is_local { Symbol::sample(input.symbol) } else { Symbol::IDLE };
        self.store.set(SYMBOL, ParamValue::Int(symbol.value()));
        self.store.set(IS_LOCAL, ParamValue::Bool(self.is_local));

        let mut report = FrameReport {
            frame: self.frame,
            ..Default::default()
        };
        let mut writes = Vec::new();
        for (idx, runner) in self.runners.iter_mut().enumerate() {
            let out = runner.step(input.dt, &mut self.store);
            for param in &out.dropped_writes {
                logging::log_dropped_write(&self.id, &runner.layer().name, param);
            }
            writes.extend(out.weight_overrides.iter().map(|&(target, weight)| WeightWrite {
                source: idx,
                target,
                weight,
            }));
            if let Some(fired) = out.fired {
                logging::log_transition(&self.id, &fired.layer, &fired.from, &fired.to, &fired.label);
                report.transitions.push(fired);
            }
        }

        let commit = self.weights.commit(&writes);
        for rejected in &commit.rejected {
            let (Rejected::NotOwner(w) | Rejected::OutOfRange(w)) = rejected;
            logging::log_weight_ignored(&self.id, w.target, self.runners.len());
        }
        report.weight_overrides = commit.applied;

        report.warning = self.store.is_triggered(WARNING);
        self.store.clear_triggers();
        report
    }

    /// Applies a replicated `Success` value.
    pub fn set_synced_success(&mut self, value: bool) {
        self.store.set(SUCCESS, ParamValue::Bool(value));
    }

    pub fn success(&self) -> bool {
        self.store.bool(SUCCESS)
    }

    pub fn expired(&self) -> bool {
        self.store.bool(EXPIRED)
    }

    pub fn active_state(&self, layer: &str) -> Option<&str> {
        self.runners
            .iter()
            .find(|r| r.layer().name == layer)
            .map(|r| r.active_state())
    }

    pub fn automaton_state(&self) -> Option<&str> {
        self.active_state(PASSWORD_LAYER)
    }

    pub fn lock_state(&self) -> Option<LockState> {
        self.active_state(LOCK_LAYER).and_then(LockState::from_state_name)
    }

    pub fn timer_state(&self) -> Option<TimerState> {
        self.active_state(COUNTDOWN_LAYER).and_then(TimerState::from_state_name)
    }

    pub fn deterrent_active(&self) -> bool {
        self.active_state(DETERRENT_LAYER) == Some(deterrent::ACTIVE)
    }

    /// Countdown progress in [0, 1]; `None` once the timer has stopped.
    pub fn countdown_progress(&self) -> Option<f64> {
        match self.timer_state() {
            Some(TimerState::Stopped) | None => None,
            Some(_) => Some(self.store.float(PROGRESS)),
        }
    }

    pub fn weights(&self) -> &LayerWeights {
        &self.weights
    }

    pub fn params(&self) -> &ParamStore {
        &self.store
    }
}
