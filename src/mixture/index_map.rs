//! Index mapping between the full catalog and the diversity-eligible subset
//!
//! Excluded primitives (the structural no-op) carry no information and
//! would bias any similarity computation toward trivial agreement, so
//! diversity-facing outputs skip them. The mapping is computed once from
//! the excluded *kinds* against the actual configured catalog; there is
//! no position state maintained separately from the names.

use crate::error::{MixNasError, Result};
use crate::primitives::{PrimitiveCatalog, PrimitiveKind};

/// Bidirectional bookkeeping between catalog and eligible index spaces
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexMapping {
    /// Catalog positions to skip, sorted descending so removals by index
    /// do not shift entries that are removed later
    skip_indices: Vec<usize>,
    /// Dense eligible index -> catalog index, strictly increasing
    valid_to_orig: Vec<usize>,
}

impl IndexMapping {
    /// Compute the mapping for a catalog and an excluded set
    pub fn new(catalog: &PrimitiveCatalog, excluded: &[PrimitiveKind]) -> Self {
        let mut skip_indices = Vec::new();
        let mut valid_to_orig = Vec::new();

        for (i, kind) in catalog.iter().enumerate() {
            if excluded.contains(kind) {
                skip_indices.push(i);
            } else {
                valid_to_orig.push(i);
            }
        }
        skip_indices.reverse();

        Self {
            skip_indices,
            valid_to_orig,
        }
    }

    /// Catalog positions to remove from diversity-facing output, descending
    pub fn skip_indices(&self) -> &[usize] {
        &self.skip_indices
    }

    /// Eligible index -> catalog index mapping
    pub fn valid_to_orig(&self) -> &[usize] {
        &self.valid_to_orig
    }

    /// Number of diversity-eligible entries
    pub fn num_valid(&self) -> usize {
        self.valid_to_orig.len()
    }

    /// Translate an eligible index to its catalog index
    pub fn to_orig(&self, valid_index: usize) -> Result<usize> {
        self.valid_to_orig
            .get(valid_index)
            .copied()
            .ok_or(MixNasError::ValidIndexOutOfRange {
                index: valid_index,
                len: self.valid_to_orig.len(),
            })
    }
}
