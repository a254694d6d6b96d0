//! Finalized operation descriptors
//!
//! A descriptor is the serializable specification of one sub-operation,
//! produced by the operation's finalize step. External drivers rebuild a
//! discrete architecture from descriptors alone.

use serde::{Deserialize, Serialize};

use super::catalog::PrimitiveKind;

/// Serializable specification of a single operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpDesc {
    /// Operation kind
    pub kind: PrimitiveKind,
    /// Number of channels the operation maps over
    pub channels: usize,
    /// Kernel size (convolutions and pooling)
    pub kernel_size: Option<usize>,
    /// Dilation rate (dilated convolutions)
    pub dilation: Option<usize>,
}

impl OpDesc {
    /// Create a new descriptor
    pub fn new(kind: PrimitiveKind, channels: usize) -> Self {
        Self {
            kind,
            channels,
            kernel_size: None,
            dilation: None,
        }
    }

    /// Set kernel size
    pub fn with_kernel_size(mut self, size: usize) -> Self {
        self.kernel_size = Some(size);
        self
    }

    /// Set dilation rate
    pub fn with_dilation(mut self, dilation: usize) -> Self {
        self.dilation = Some(dilation);
        self
    }

    /// Canonical name of the operation kind
    pub fn name(&self) -> &'static str {
        self.kind.name()
    }
}
