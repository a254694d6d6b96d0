//! Primitive catalog
//!
//! The ordered set of candidate operations available at a search-graph
//! edge. Downstream top-1 selection sorts by weight and takes index 0 of
//! the survivors, so the structural no-op placeholder must sit at the end
//! of the catalog.

use serde::{Deserialize, Serialize};

use crate::error::{MixNasError, Result};

/// Kinds of primitive operations in the search space
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// Max pooling, window 3
    MaxPool3x3,
    /// Average pooling, window 3
    AvgPool3x3,
    /// Identity pass-through
    SkipConnect,
    /// Separable convolution, kernel 3
    SepConv3x3,
    /// Separable convolution, kernel 5
    SepConv5x5,
    /// Dilated convolution, kernel 3
    DilConv3x3,
    /// Dilated convolution, kernel 5
    DilConv5x5,
    /// Structural no-op placeholder
    Zero,
}

impl PrimitiveKind {
    /// Canonical name, as used in configuration files
    pub fn name(&self) -> &'static str {
        match self {
            Self::MaxPool3x3 => "max_pool_3x3",
            Self::AvgPool3x3 => "avg_pool_3x3",
            Self::SkipConnect => "skip_connect",
            Self::SepConv3x3 => "sep_conv_3x3",
            Self::SepConv5x5 => "sep_conv_5x5",
            Self::DilConv3x3 => "dil_conv_3x3",
            Self::DilConv5x5 => "dil_conv_5x5",
            Self::Zero => "none",
        }
    }

    /// Resolve a canonical name to a kind
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            "max_pool_3x3" => Ok(Self::MaxPool3x3),
            "avg_pool_3x3" => Ok(Self::AvgPool3x3),
            "skip_connect" => Ok(Self::SkipConnect),
            "sep_conv_3x3" => Ok(Self::SepConv3x3),
            "sep_conv_5x5" => Ok(Self::SepConv5x5),
            "dil_conv_3x3" => Ok(Self::DilConv3x3),
            "dil_conv_5x5" => Ok(Self::DilConv5x5),
            "none" => Ok(Self::Zero),
            _ => Err(MixNasError::UnknownPrimitive(name.to_string())),
        }
    }

    /// The default search catalog, no-op placeholder last
    pub fn search_ops() -> Vec<Self> {
        vec![
            Self::MaxPool3x3,
            Self::AvgPool3x3,
            Self::SkipConnect,
            Self::SepConv3x3,
            Self::SepConv5x5,
            Self::DilConv3x3,
            Self::DilConv5x5,
            Self::Zero,
        ]
    }
}

/// An ordered, immutable catalog of primitive kinds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimitiveCatalog {
    kinds: Vec<PrimitiveKind>,
}

impl PrimitiveCatalog {
    /// Create a catalog, enforcing ordering invariants
    ///
    /// The catalog must be non-empty, and `Zero` may only appear as the
    /// final entry.
    pub fn new(kinds: Vec<PrimitiveKind>) -> Result<Self> {
        if kinds.is_empty() {
            return Err(MixNasError::ConfigError(
                "primitive catalog must not be empty".to_string(),
            ));
        }
        let last = kinds.len() - 1;
        for (i, kind) in kinds.iter().enumerate() {
            if *kind == PrimitiveKind::Zero && i != last {
                return Err(MixNasError::ConfigError(format!(
                    "'none' must be the last catalog entry, found at position {}",
                    i
                )));
            }
        }
        Ok(Self { kinds })
    }

    /// Create a catalog from canonical names
    pub fn from_names<S: AsRef<str>>(names: &[S]) -> Result<Self> {
        let kinds = names
            .iter()
            .map(|n| PrimitiveKind::from_name(n.as_ref()))
            .collect::<Result<Vec<_>>>()?;
        Self::new(kinds)
    }

    /// The default search catalog
    pub fn search_default() -> Self {
        Self {
            kinds: PrimitiveKind::search_ops(),
        }
    }

    /// Number of catalog entries
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// Whether the catalog is empty (never true for a constructed catalog)
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Catalog entries, in order
    pub fn kinds(&self) -> &[PrimitiveKind] {
        &self.kinds
    }

    /// Iterate over catalog entries
    pub fn iter(&self) -> std::slice::Iter<'_, PrimitiveKind> {
        self.kinds.iter()
    }
}
