//! Countdown and warning pulses.
//!
//! `Countdown` drives `Progress` from 1.0 to 0.0 and raises `Expired` when
//! the dwell lapses. `Warning` waits `duration - warning` seconds, then
//! re-enters `Pulse` once per second, firing the `Warning` trigger each
//! time. `Success` stops both layers from any state.

use crate::config::{check_range, COUNTDOWN_RANGE};
use crate::error::{CompileError, ConfigError};
use crate::graph::{Action, Condition, Layer, Motion, ParamDecl, State, Transition, EXPIRED, PROGRESS, SUCCESS, WARNING};

use super::{Component, COUNTDOWN_LAYER, WARNING_LAYER};

pub const COUNTING: &str = "Counting";
pub const EXPIRED_STATE: &str = "Expired";
pub const STOPPED: &str = "Stopped";

pub const WARN_WAIT: &str = "WarnWait";
pub const PULSE: &str = "Pulse";
pub const WARN_DONE: &str = "WarnDone";

pub const PULSE_PERIOD_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerState {
    Counting,
    Expired,
    Stopped,
}

impl TimerState {
    pub fn from_state_name(name: &str) -> Option<Self> {
        match name {
            COUNTING => Some(TimerState::Counting),
            EXPIRED_STATE => Some(TimerState::Expired),
            STOPPED => Some(TimerState::Stopped),
            _ => None,
        }
    }
}

fn countdown_layer(duration: f64) -> Layer {
    let mut layer = Layer::new(COUNTDOWN_LAYER, COUNTING);
    layer.add_state(State::new(COUNTING).with_motion(Motion::Countdown {
        param: PROGRESS.to_string(),
        seconds: duration,
    }));
    layer.add_state(
        State::new(EXPIRED_STATE)
            .on_enter(Action::set_bool(EXPIRED, true))
            .on_enter(Action::SetFloat {
                param: PROGRESS.to_string(),
                value: 0.0,
            }),
    );
    layer.add_state(State::new(STOPPED));

    layer.add_transition(
        Transition::any(STOPPED)
            .when(Condition::is_true(SUCCESS))
            .labeled("stop"),
    );
    layer.add_transition(
        Transition::dwell(COUNTING, EXPIRED_STATE, duration)
            .when(Condition::is_false(SUCCESS))
            .labeled("lapsed"),
    );
    layer
}

fn warning_layer(duration: f64, warning: f64) -> Layer {
    let mut layer = Layer::new(WARNING_LAYER, WARN_WAIT);
    layer.add_state(State::new(WARN_WAIT));
    layer.add_state(State::new(WARN_DONE));

    // Exits are instant so they win over the pulse's dwell self-loop.
    let sources: &[&str] = if warning > 0.0 { &[WARN_WAIT, PULSE] } else { &[WARN_WAIT] };
    for source in sources {
        layer.add_transition(
            Transition::instant(source, WARN_DONE)
                .when(Condition::is_true(SUCCESS))
                .labeled("stop"),
        );
        layer.add_transition(
            Transition::instant(source, WARN_DONE)
                .when(Condition::is_true(EXPIRED))
                .when(Condition::is_false(SUCCESS))
                .labeled("expired"),
        );
    }

    if warning > 0.0 {
        layer.add_state(State::new(PULSE).on_enter(Action::fire(WARNING)));
        layer.add_transition(Transition::dwell(WARN_WAIT, PULSE, duration - warning).labeled("warn"));
        layer.add_transition(Transition::dwell(PULSE, PULSE, PULSE_PERIOD_SECS).labeled("pulse"));
    }
    layer
}

/// Compiles both timer layers. `warning == 0` disables pulsing.
pub fn compile(duration: f64, warning: f64) -> Result<Component, CompileError> {
    check_range("countdown_secs", duration, COUNTDOWN_RANGE)?;
    check_range("warning_secs", warning, (0.0, COUNTDOWN_RANGE.1))?;
    if warning > duration {
        return Err(ConfigError::WarningExceedsDuration { warning, duration }.into());
    }

    Component {
        name: "timer",
        params: vec![
            ParamDecl::bool(SUCCESS).saved().synced(),
            ParamDecl::bool(EXPIRED),
            ParamDecl::float(PROGRESS, 1.0),
            ParamDecl::trigger(WARNING),
        ],
        layers: vec![countdown_layer(duration), warning_layer(duration, warning)],
    }
    .checked()
}
