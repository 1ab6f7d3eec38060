//! Single authoritative table of layer weights.
//!
//! Layers never write weights directly. Entry actions produce tagged
//! writes; the replica commits them here once per frame and only the
//! owning layer's writes are accepted.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WeightWrite {
    pub source: usize,
    pub target: usize,
    pub weight: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Rejected {
    NotOwner(WeightWrite),
    OutOfRange(WeightWrite),
}

/// Outcome of committing one frame's writes.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Commit {
    pub applied: Vec<(usize, f32)>,
    pub rejected: Vec<Rejected>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayerWeights {
    weights: Vec<f32>,
    owner: Option<usize>,
}

impl LayerWeights {
    /// All layers start fully weighted.
    pub fn new(layers: usize, owner: Option<usize>) -> Self {
        Self {
            weights: vec![1.0; layers],
            owner,
        }
    }

    pub fn get(&self, layer: usize) -> Option<f32> {
        self.weights.get(layer).copied()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.weights
    }

    /// Applies one frame's writes in order; last write wins.
    pub fn commit(&mut self, writes: &[WeightWrite]) -> Commit {
        let mut commit = Commit::default();
        for w in writes {
            if self.owner != Some(w.source) {
                commit.rejected.push(Rejected::NotOwner(*w));
                continue;
            }
            match self.weights.get_mut(w.target) {
                Some(slot) => {
                    *slot = w.weight.clamp(0.0, 1.0);
                    commit.applied.push((w.target, *slot));
                }
                None => commit.rejected.push(Rejected::OutOfRange(*w)),
            }
        }
        commit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(source: usize, target: usize, weight: f32) -> WeightWrite {
        WeightWrite { source, target, weight }
    }

    #[test]
    fn test_owner_writes_applied_in_order() {
        let mut table = LayerWeights::new(3, Some(2));
        let commit = table.commit(&[write(2, 0, 0.0), write(2, 0, 0.5), write(2, 2, 1.5)]);
        assert!(commit.rejected.is_empty());
        assert_eq!(commit.applied, vec![(0, 0.0), (0, 0.5), (2, 1.0)]);
        assert_eq!(table.as_slice(), &[0.5, 1.0, 1.0]);
    }

    #[test]
    fn test_foreign_and_out_of_range_refused() {
        let mut table = LayerWeights::new(2, Some(1));
        let commit = table.commit(&[write(0, 0, 0.0), write(1, 9, 0.0)]);
        assert!(commit.applied.is_empty());
        assert_eq!(
            commit.rejected,
            vec![Rejected::NotOwner(write(0, 0, 0.0)), Rejected::OutOfRange(write(1, 9, 0.0))]
        );
        assert_eq!(table.as_slice(), &[1.0, 1.0]);
    }

    #[test]
    fn test_no_owner_refuses_everything() {
        let mut table = LayerWeights::new(1, None);
        assert_eq!(table.commit(&[write(0, 0, 0.0)]).rejected.len(), 1);
        assert_eq!(table.get(0), Some(1.0));
    }
}
