//! Password recognizer.
//!
//! For a password `p[1..N]` the layer has one `Wait`, `Success` and
//! `Expired` state, one `Holding{i}` per position and `Confirmed{i}` /
//! `Tolerance{i}` for `i < N`. The sampled symbol `g` drives everything:
//!
//! | From            | To              | Mode      | Guard                                   |
//! |-----------------|-----------------|-----------|-----------------------------------------|
//! | any             | Expired         | instant   | `Expired`                               |
//! | Wait            | Holding1        | instant   | `g == p1`                               |
//! | Holding{i}      | Confirmed{i}    | dwell     | `g == p[i]` (Success when `i == N`)     |
//! | Holding{i}      | Holding{i}      | instant   | `g == 0`                                |
//! | Holding{i}      | Holding1        | instant   | `g == p1, g != p[i]`                    |
//! | Holding{i}      | Wait            | instant   | `g ∉ {p[i], 0, p1, p[i+1]}`             |
//! | Confirmed{i}    | Holding{i+1}    | instant   | `g == p[i+1]`                           |
//! | Confirmed{i}    | Confirmed{i}    | instant   | `g == 0` or `g == p[i], g != p[i+1]`    |
//! | Confirmed{i}    | Tolerance{i}    | instant   | `g ∉ {0, p[i+1], p1, p[i]}`             |
//! | Confirmed{i}    | Holding1        | instant   | `g == p1, g ∉ {p[i+1], p[i]}`           |
//! | Tolerance{i}    | Holding{i+1}    | instant   | `g == p[i+1]` (Success when `i == N-1`) |
//! | Tolerance{i}    | Tolerance{i}    | instant   | `g == 0`                                |
//! | Tolerance{i}    | Holding1        | instant   | `g == p1, g != p[i+1]`                  |
//! | Tolerance{i}    | Wait            | dwell     | always (tolerance window)               |
//!
//! Restart edges are omitted when their guard collapses to nothing.
//! `Tolerance{N-1} -> Success` is instant while `Holding{N} -> Success` is
//! dwell-gated; both paths are kept as-is.

use std::str::FromStr;

use crate::config::{check_range, DEBOUNCE_RANGE, TOLERANCE_RANGE};
use crate::error::{CompileError, ConfigError};
use crate::graph::{
    Action, Condition, Layer, ParamDecl, State, Transition, EXPIRED, SUCCESS, SYMBOL,
};

use super::{Component, PASSWORD_LAYER};

pub const WAIT: &str = "Wait";
pub const SUCCESS_STATE: &str = "Success";
pub const EXPIRED_STATE: &str = "Expired";

/// One sampled input value. 0 is idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol(u8);

impl Symbol {
    pub const IDLE: Symbol = Symbol(0);
    pub const MAX: u8 = 7;

    /// Total over every input: anything outside 0..=7 reads as idle.
    pub fn sample(raw: i64) -> Symbol {
        if (0..=Self::MAX as i64).contains(&raw) {
            Symbol(raw as u8)
        } else {
            Symbol::IDLE
        }
    }

    pub fn value(self) -> i32 {
        self.0 as i32
    }

    pub fn is_idle(self) -> bool {
        self.0 == 0
    }
}

/// Validated password: non-empty, every symbol in 1..=7.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Password(Vec<Symbol>);

impl Password {
    pub fn new(raw: &[i64]) -> Result<Self, ConfigError> {
        if raw.is_empty() {
            return Err(ConfigError::EmptyPassword);
        }
        let mut symbols = Vec::with_capacity(raw.len());
        for (idx, &value) in raw.iter().enumerate() {
            if !(1..=Symbol::MAX as i64).contains(&value) {
                return Err(ConfigError::SymbolOutOfRange {
                    position: idx + 1,
                    symbol: value,
                });
            }
            symbols.push(Symbol(value as u8));
        }
        Ok(Self(symbols))
    }

    /// Raw symbol bytes, e.g. `[1, 7, 2, 4]`.
    pub fn parse(bytes: &[u8]) -> Result<Self, ConfigError> {
        let raw: Vec<i64> = bytes.iter().map(|&b| i64::from(b)).collect();
        Self::new(&raw)
    }

    pub(crate) fn len(&self) -> usize {
        self.0.len()
    }

    /// 1-based access, matching state numbering.
    pub fn at(&self, position: usize) -> i32 {
        self.0[position - 1].value()
    }

    pub fn symbols(&self) -> &[Symbol] {
        &self.0
    }

    pub fn to_raw(&self) -> Vec<i64> {
        self.symbols().iter().map(|s| i64::from(s.value())).collect()
    }
}

/// Accepts "1,7,2,4", "1 7 2 4" or "1724".
impl FromStr for Password {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        let malformed = || ConfigError::MalformedPassword(raw.to_string());
        let values: Vec<i64> = if trimmed.contains(',') || trimmed.contains(char::is_whitespace) {
            trimmed
                .split(|c: char| c == ',' || c.is_whitespace())
                .filter(|s| !s.is_empty())
                .map(|s| s.parse::<i64>().map_err(|_| malformed()))
                .collect::<Result<_, _>>()?
        } else {
            trimmed
                .chars()
                .map(|c| c.to_digit(10).map(i64::from).ok_or_else(malformed))
                .collect::<Result<_, _>>()?
        };
        Self::new(&values)
    }
}

pub fn holding(i: usize) -> String {
    format!("Holding{}", i)
}

pub fn confirmed(i: usize) -> String {
    format!("Confirmed{}", i)
}

pub fn tolerance(i: usize) -> String {
    format!("Tolerance{}", i)
}

fn eq(v: i32) -> Condition {
    Condition::int_eq(SYMBOL, v)
}

/// `g` equal to none of `values` (duplicates collapsed).
fn none_of(mut t: Transition, values: &[i32]) -> Transition {
    let mut seen = Vec::new();
    for &v in values {
        if !seen.contains(&v) {
            seen.push(v);
            t = t.when(Condition::int_ne(SYMBOL, v));
        }
    }
    t
}

/// Compiles the recognizer layer. Fails on a malformed password or
/// out-of-range timing; never emits a partial graph.
pub fn compile(password: &[i64], debounce: f64, tolerance_secs: f64) -> Result<Component, CompileError> {
    let password = Password::new(password)?;
    check_range("debounce_secs", debounce, DEBOUNCE_RANGE)?;
    check_range("tolerance_secs", tolerance_secs, TOLERANCE_RANGE)?;

    let n = password.len();
    let p1 = password.at(1);
    let mut layer = Layer::new(PASSWORD_LAYER, WAIT);

    layer.add_state(State::new(WAIT));
    for i in 1..=n {
        layer.add_state(State::new(&holding(i)));
    }
    for i in 1..n {
        layer.add_state(State::new(&confirmed(i)));
        layer.add_state(State::new(&tolerance(i)));
    }
    layer.add_state(State::new(SUCCESS_STATE).on_enter(Action::set_bool(SUCCESS, true)));
    layer.add_state(State::new(EXPIRED_STATE));

    layer.add_transition(
        Transition::any(EXPIRED_STATE)
            .when(Condition::is_true(EXPIRED))
            .labeled("timeout"),
    );

    layer.add_transition(
        Transition::instant(WAIT, &holding(1))
            .when(eq(p1))
            .when(Condition::int_ne(SYMBOL, 0))
            .labeled("start"),
    );

    for i in 1..=n {
        let h = holding(i);
        let pi = password.at(i);
        let next = if i == n { SUCCESS_STATE.to_string() } else { confirmed(i) };

        layer.add_transition(Transition::dwell(&h, &next, debounce).when(eq(pi)).labeled("debounced"));
        layer.add_transition(Transition::instant(&h, &h).when(eq(0)).labeled("idle"));
        if p1 != pi {
            layer.add_transition(
                Transition::instant(&h, &holding(1))
                    .when(eq(p1))
                    .when(Condition::int_ne(SYMBOL, pi))
                    .labeled("restart"),
            );
        }
        let mut excluded = vec![pi, 0, p1];
        if i < n {
            excluded.push(password.at(i + 1));
        }
        layer.add_transition(none_of(Transition::instant(&h, WAIT), &excluded).labeled("reject"));
    }

    for i in 1..n {
        let c = confirmed(i);
        let t = tolerance(i);
        let pi = password.at(i);
        let nxt = password.at(i + 1);

        layer.add_transition(
            Transition::instant(&c, &holding(i + 1))
                .when(eq(nxt))
                .when(Condition::int_ne(SYMBOL, 0))
                .labeled("advance"),
        );
        layer.add_transition(Transition::instant(&c, &c).when(eq(0)).labeled("idle"));
        if pi != nxt {
            // Still holding the symbol that was just confirmed.
            layer.add_transition(
                Transition::instant(&c, &c)
                    .when(eq(pi))
                    .when(Condition::int_ne(SYMBOL, nxt))
                    .labeled("hold"),
            );
        }
        layer.add_transition(none_of(Transition::instant(&c, &t), &[0, nxt, p1, pi]).labeled("mistake"));
        if p1 != nxt && p1 != pi {
            layer.add_transition(
                none_of(Transition::instant(&c, &holding(1)).when(eq(p1)), &[nxt, pi]).labeled("restart"),
            );
        }

        let corrected = if i + 1 == n { SUCCESS_STATE.to_string() } else { holding(i + 1) };
        layer.add_transition(
            Transition::instant(&t, &corrected)
                .when(eq(nxt))
                .when(Condition::int_ne(SYMBOL, 0))
                .labeled("corrected"),
        );
        layer.add_transition(Transition::instant(&t, &t).when(eq(0)).labeled("idle"));
        if p1 != nxt {
            layer.add_transition(
                Transition::instant(&t, &holding(1))
                    .when(eq(p1))
                    .when(Condition::int_ne(SYMBOL, nxt))
                    .labeled("restart"),
            );
        }
        layer.add_transition(Transition::dwell(&t, WAIT, tolerance_secs).labeled("lapsed"));
    }

    Component {
        name: "automaton",
        params: vec![
            ParamDecl::int(SYMBOL),
            ParamDecl::bool(SUCCESS).saved().synced(),
            ParamDecl::bool(EXPIRED),
        ],
        layers: vec![layer],
    }
    .checked()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::TransitionMode;

    fn layer_for(password: &[i64]) -> Layer {
        compile(password, 0.15, 0.3).unwrap().layers.remove(0)
    }

    #[test]
    fn test_state_inventory() {
        let layer = layer_for(&[1, 7, 2, 4]);
        let names = layer.state_names();
        assert_eq!(names.len(), 1 + 4 + 3 + 3 + 2);
        for expected in ["Wait", "Holding4", "Confirmed3", "Tolerance3", "Success", "Expired"] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert!(!names.contains(&"Confirmed4"));
        assert!(!names.contains(&"Tolerance4"));
    }

    #[test]
    fn test_single_symbol_password() {
        let layer = layer_for(&[5]);
        assert_eq!(layer.state_names(), vec!["Wait", "Holding1", "Success", "Expired"]);
        let to_success: Vec<_> = layer.outgoing("Holding1").filter(|t| t.to == "Success").collect();
        assert_eq!(to_success.len(), 1);
        assert!(matches!(to_success[0].mode, TransitionMode::Dwell { .. }));
    }

    #[test]
    fn test_final_paths_asymmetric() {
        let layer = layer_for(&[1, 7, 2, 4]);
        let dwell = layer.outgoing("Holding4").find(|t| t.to == "Success").unwrap();
        assert!(matches!(dwell.mode, TransitionMode::Dwell { seconds } if (seconds - 0.15).abs() < 1e-12));
        let instant = layer.outgoing("Tolerance3").find(|t| t.to == "Success").unwrap();
        assert!(instant.mode.is_instant());
        assert!(layer.outgoing("Tolerance3").all(|t| t.to != "Holding4"));
    }

    #[test]
    fn test_restart_omitted_for_repeated_first_symbol() {
        let layer = layer_for(&[3, 5, 3]);
        assert!(layer.outgoing("Holding3").all(|t| t.label != "restart"));
        assert!(layer.outgoing("Holding2").any(|t| t.label == "restart"));
        // Confirmed2 advances on 3 which is also p1.
        assert!(layer.outgoing("Confirmed2").all(|t| t.label != "restart"));
    }

    #[test]
    fn test_malformed_password_rejected() {
        assert_eq!(
            compile(&[], 0.15, 0.3).unwrap_err(),
            CompileError::Config(ConfigError::EmptyPassword)
        );
        assert_eq!(
            compile(&[1, 0, 2], 0.15, 0.3).unwrap_err(),
            CompileError::Config(ConfigError::SymbolOutOfRange { position: 2, symbol: 0 })
        );
        assert!(compile(&[8], 0.15, 0.3).is_err());
        assert!(compile(&[1], 0.0, 0.3).is_err());
        assert!(compile(&[1], 0.15, f64::INFINITY).is_err());
    }

    #[test]
    fn test_every_password_passes_self_check() {
        // All passwords of length <= 3 over a 3-symbol alphabet, including repeats.
        for a in 1..=3 {
            assert!(compile(&[a], 0.15, 0.3).is_ok());
            for b in 1..=3 {
                assert!(compile(&[a, b], 0.15, 0.3).is_ok());
                for c in 1..=3 {
                    assert!(compile(&[a, b, c], 0.15, 0.3).is_ok(), "{:?}", [a, b, c]);
                }
            }
        }
        assert!(compile(&[1, 2, 3, 4, 5, 6, 7], 0.15, 0.3).is_ok());
    }

    #[test]
    fn test_password_from_str_forms() {
        let expected = Password::new(&[1, 7, 2, 4]).unwrap();
        assert_eq!("1,7,2,4".parse::<Password>().unwrap(), expected);
        assert_eq!(" 1 7  2 4 ".parse::<Password>().unwrap(), expected);
        assert_eq!("1724".parse::<Password>().unwrap(), expected);
        assert_eq!(Password::parse(&[1, 7, 2, 4]).unwrap(), expected);
        assert_eq!(expected.to_raw(), vec![1, 7, 2, 4]);

        assert_eq!("".parse::<Password>(), Err(ConfigError::EmptyPassword));
        assert!(matches!("1,x".parse::<Password>(), Err(ConfigError::MalformedPassword(_))));
        assert!(matches!("17a".parse::<Password>(), Err(ConfigError::MalformedPassword(_))));
        assert_eq!(
            "1,9".parse::<Password>(),
            Err(ConfigError::SymbolOutOfRange { position: 2, symbol: 9 })
        );
        assert_eq!(
            Password::parse(&[3, 0]),
            Err(ConfigError::SymbolOutOfRange { position: 2, symbol: 0 })
        );
    }

    #[test]
    fn test_symbol_sample_is_total() {
        assert_eq!(Symbol::sample(3).value(), 3);
        assert!(Symbol::sample(-1).is_idle());
        assert!(Symbol::sample(8).is_idle());
        assert!(Symbol::sample(i64::MAX).is_idle());
    }
}
