//! Exhaustive satisfiability over the finite guard domain.
//!
//! Int parameters range over the symbol alphabet 0..=7, every constant a
//! guard mentions, and one value above all of them. Bools and triggers
//! range over {false, true}. Guards reference one or two parameters, so
//! brute force stays tiny.

use std::collections::{BTreeMap, BTreeSet};

use crate::graph::eval::ParamStore;
use crate::graph::{Condition, ParamDecl, ParamKind, ParamValue};

/// Symbol alphabet upper bound (inclusive).
pub const SYMBOL_MAX: i32 = 7;

/// A concrete parameter assignment.
#[derive(Debug, Clone, PartialEq)]
pub struct Witness(pub BTreeMap<String, ParamValue>);

impl std::fmt::Display for Witness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let parts: Vec<String> = self
            .0
            .iter()
            .map(|(k, v)| match v {
                ParamValue::Int(i) => format!("{}={}", k, i),
                ParamValue::Bool(b) | ParamValue::Trigger(b) => format!("{}={}", k, b),
                ParamValue::Float(x) => format!("{}={}", k, x),
            })
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

fn domain(param: &str, kind: ParamKind, conds: &[Condition]) -> Vec<ParamValue> {
    match kind {
        ParamKind::Int => {
            let mut values: BTreeSet<i32> = (0..=SYMBOL_MAX).collect();
            for c in conds {
                match c {
                    Condition::IntEq { param: p, value } | Condition::IntNe { param: p, value }
                        if p == param =>
                    {
                        values.insert(*value);
                    }
                    _ => {}
                }
            }
            let above = values.iter().max().copied().unwrap_or(0).saturating_add(1);
            values.insert(above);
            values.into_iter().map(ParamValue::Int).collect()
        }
        ParamKind::Bool => vec![ParamValue::Bool(false), ParamValue::Bool(true)],
        ParamKind::Trigger => vec![ParamValue::Trigger(false), ParamValue::Trigger(true)],
        ParamKind::Float => vec![ParamValue::Float(0.0)],
    }
}

/// Finds an assignment satisfying every condition, or `None` if the
/// conjunction is unsatisfiable.
pub fn find_witness(conds: &[Condition]) -> Option<Witness> {
    let mut params: BTreeMap<String, ParamKind> = BTreeMap::new();
    for c in conds {
        params.insert(c.param().to_string(), c.expected_kind());
    }
    let decls: Vec<ParamDecl> = params
        .iter()
        .map(|(name, kind)| match kind {
            ParamKind::Int => ParamDecl::int(name),
            ParamKind::Bool => ParamDecl::bool(name),
            ParamKind::Trigger => ParamDecl::trigger(name),
            ParamKind::Float => ParamDecl::float(name, 0.0),
        })
        .collect();
    let domains: Vec<(String, Vec<ParamValue>)> = params
        .iter()
        .map(|(name, kind)| (name.clone(), domain(name, *kind, conds)))
        .collect();

    let mut store = ParamStore::from_decls(&decls);
    let mut cursor = vec![0usize; domains.len()];
    loop {
        for (i, (name, values)) in domains.iter().enumerate() {
            store.set(name, values[cursor[i]]);
        }
        if store.holds_all(conds) {
            let assignment = domains
                .iter()
                .enumerate()
                .map(|(i, (name, values))| (name.clone(), values[cursor[i]]))
                .collect();
            return Some(Witness(assignment));
        }

        // Odometer increment over the cartesian product.
        let mut pos = 0;
        loop {
            if pos == cursor.len() {
                return None;
            }
            cursor[pos] += 1;
            if cursor[pos] < domains[pos].1.len() {
                break;
            }
            cursor[pos] = 0;
            pos += 1;
        }
    }
}

pub fn satisfiable(conds: &[Condition]) -> bool {
    find_witness(conds).is_some()
}

/// Witness that both guards can hold in the same frame.
pub fn overlap(a: &[Condition], b: &[Condition]) -> Option<Witness> {
    let joined: Vec<Condition> = a.iter().chain(b.iter()).cloned().collect();
    find_witness(&joined)
}
