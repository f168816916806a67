//! Directory of auxiliary variables introduced for bivariate terms.
//!
//! Reformulation introduces an auxiliary `y` for a product of two variables;
//! this map guarantees at most one auxiliary per ordered pair.

use crate::model::Variable;

/// Map from an ordered variable pair to its auxiliary variable index.
///
/// Lookup is linear in the table size but filtered through precomputed
/// id hashes before the full comparison.
#[derive(Debug, Clone, Default)]
pub struct YEqBivar {
    v1: Vec<usize>,
    v2: Vec<usize>,
    hash1: Vec<u32>,
    hash2: Vec<u32>,
    y: Vec<usize>,
}

impl YEqBivar {
    /// Empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// The auxiliary registered for the ordered pair `(v1, v2)`, if any.
    /// With duplicate insertions the most recent entry wins.
    pub fn find_y(&self, v1: &Variable, v2: &Variable) -> Option<usize> {
        let key1 = v1.id;
        let key2 = v2.id;
        for i in (0..self.v1.len()).rev() {
            if self.hash1[i] == key1
                && self.hash2[i] == key2
                && self.v1[i] == v1.index
                && self.v2[i] == v2.index
            {
                return Some(self.y[i]);
            }
        }
        None
    }

    /// Register `auxvar` as the auxiliary for the ordered pair `(v1, v2)`.
    pub fn insert(&mut self, auxvar: usize, v1: &Variable, v2: &Variable) {
        self.v1.push(v1.index);
        self.v2.push(v2.index);
        self.hash1.push(v1.id);
        self.hash2.push(v2.id);
        self.y.push(auxvar);
    }

    /// Number of registered pairs.
    pub fn len(&self) -> usize {
        self.y.len()
    }

    /// Whether the directory is empty.
    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }
}
