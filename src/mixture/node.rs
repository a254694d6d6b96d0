//! Mixture-of-operations node
//!
//! The node evaluated at each edge of the search graph. Every candidate
//! primitive runs on every forward call and the outputs are combined into
//! one differentiable signal, so gradient descent can learn how much of
//! each discrete choice to use. Per-operation activations can optionally
//! be captured for an external diversity metric.

use ndarray::{Array1, Array2};
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use tracing::debug;

use super::index_map::IndexMapping;
use crate::config::SearchConfig;
use crate::error::{MixNasError, Result};
use crate::primitives::{create_op, OpDesc, PrimitiveCatalog, PrimitiveKind, PrimitiveOp};

/// Scale of the uniform init for self-allocated architecture weights.
/// Nonzero to break symmetry; small to start near-uniform.
const ALPHA_INIT_SCALE: f64 = 1.0e-3;

/// A search-graph node that mixes every catalog primitive into one output
#[derive(Debug)]
pub struct MixtureNode {
    catalog: PrimitiveCatalog,
    ops: Vec<Box<dyn PrimitiveOp>>,
    alphas: Option<Array1<f64>>,
    index_map: IndexMapping,
    collect_activations: bool,
    forward_counter: u64,
    batch_activations: Option<Vec<Array2<f64>>>,
}

impl MixtureNode {
    /// Construct a node, self-allocating architecture weights if the
    /// trainer mode uses them
    pub fn new(channels: usize, config: &SearchConfig, affine: bool) -> Result<Self> {
        Self::with_alphas(channels, config, None, affine)
    }

    /// Construct a node with caller-supplied architecture weights
    ///
    /// `alphas` must hold one scalar per catalog entry. It is ignored when
    /// the trainer mode does not use architecture weights.
    pub fn with_alphas(
        channels: usize,
        config: &SearchConfig,
        alphas: Option<Array1<f64>>,
        affine: bool,
    ) -> Result<Self> {
        config.validate()?;

        let catalog = match &config.catalog {
            Some(names) => PrimitiveCatalog::from_names(names)?,
            None => PrimitiveCatalog::search_default(),
        };
        let excluded = config
            .excluded
            .iter()
            .map(|name| PrimitiveKind::from_name(name))
            .collect::<Result<Vec<_>>>()?;
        let index_map = IndexMapping::new(&catalog, &excluded);

        let mut rng = match config.random_state {
            Some(seed) => Xoshiro256PlusPlus::seed_from_u64(seed),
            None => Xoshiro256PlusPlus::from_entropy(),
        };

        let mut node = Self {
            catalog,
            ops: Vec::new(),
            alphas: None,
            index_map,
            collect_activations: false,
            forward_counter: 0,
            batch_activations: None,
        };

        // Architecture weights must exist before any sub-operation
        // registers parameters; the two groups never overlap.
        if config.trainer.uses_alphas() {
            node.set_alphas(alphas, &mut rng)?;
        }

        let kinds: Vec<PrimitiveKind> = node.catalog.kinds().to_vec();
        for kind in kinds {
            let desc = OpDesc::new(kind, channels);
            let op = create_op(&desc, affine, node.alphas.as_ref(), &mut rng)?;
            node.ops.push(op);
        }

        debug!(
            num_ops = node.ops.len(),
            num_valid = node.index_map.num_valid(),
            weighted = node.alphas.is_some(),
            "constructed mixture node"
        );
        Ok(node)
    }

    /// Allocate or adopt architecture weights
    ///
    /// Must run before any sub-operation is registered; a later call is a
    /// construction-order bug upstream and fails loudly.
    pub(crate) fn set_alphas(
        &mut self,
        alphas: Option<Array1<f64>>,
        rng: &mut impl Rng,
    ) -> Result<()> {
        if !self.ops.is_empty() {
            return Err(MixNasError::ParameterOrderViolation);
        }
        let n = self.catalog.len();
        let alphas = match alphas {
            Some(a) => {
                if a.len() != n {
                    return Err(MixNasError::ConfigError(format!(
                        "expected {} architecture weights, got {}",
                        n,
                        a.len()
                    )));
                }
                a
            }
            None => Array1::from_shape_fn(n, |_| (rng.gen::<f64>() - 0.5) * ALPHA_INIT_SCALE),
        };
        self.alphas = Some(alphas);
        Ok(())
    }

    /// Evaluate the node on one input batch
    ///
    /// Every sub-operation is evaluated exactly once, in catalog order.
    /// With architecture weights present the output is the softmax-weighted
    /// sum of sub-operation outputs; otherwise it is the plain sum. While
    /// capture is enabled the same evaluations are also snapshotted into
    /// the activation buffer with excluded entries removed.
    pub fn forward(&mut self, x: &Array2<f64>) -> Array2<f64> {
        let outputs: Vec<Array2<f64>> = self.ops.iter().map(|op| op.forward(x)).collect();

        if self.collect_activations {
            self.forward_counter += 1;
            let mut activs = outputs.clone();
            for &index in self.index_map.skip_indices() {
                activs.remove(index);
            }
            self.batch_activations = Some(activs);
        }

        match &self.alphas {
            Some(alphas) => {
                let weights = softmax(alphas);
                let mut result = Array2::zeros(x.raw_dim());
                for (&w, out) in weights.iter().zip(&outputs) {
                    result.scaled_add(w, out);
                }
                result
            }
            None => {
                let mut result = Array2::zeros(x.raw_dim());
                for out in &outputs {
                    result += out;
                }
                result
            }
        }
    }

    /// Whether activation capture is enabled
    pub fn collect_activations(&self) -> bool {
        self.collect_activations
    }

    /// Enable or disable activation capture
    pub fn set_collect_activations(&mut self, collect: bool) {
        debug!(collect, "toggling activation capture");
        self.collect_activations = collect;
    }

    /// The most recent capturing call's per-primitive outputs, eligible
    /// entries only, in ascending catalog order
    pub fn activations(&self) -> Option<&[Array2<f64>]> {
        self.batch_activations.as_deref()
    }

    /// Number of forward calls made while capture was enabled
    pub fn forward_count(&self) -> u64 {
        self.forward_counter
    }

    /// Number of diversity-eligible primitives
    pub fn num_valid_ops(&self) -> usize {
        self.index_map.num_valid()
    }

    /// The configured catalog
    pub fn catalog(&self) -> &PrimitiveCatalog {
        &self.catalog
    }

    /// The catalog/eligible index mapping
    pub fn index_mapping(&self) -> &IndexMapping {
        &self.index_map
    }

    /// Finalized descriptor of the sub-operation at a catalog index
    pub fn op_desc(&self, index: usize) -> Result<OpDesc> {
        if index >= self.ops.len() {
            return Err(MixNasError::CatalogIndexOutOfRange {
                index,
                len: self.ops.len(),
            });
        }
        let (desc, _) = self.ops[index].finalize();
        Ok(desc)
    }

    /// Finalized descriptor of the sub-operation at a diversity-eligible
    /// index, translated through the index mapping
    pub fn valid_op_desc(&self, index: usize) -> Result<OpDesc> {
        let orig = self.index_map.to_orig(index)?;
        let (desc, _) = self.ops[orig].finalize();
        Ok(desc)
    }

    /// Architecture-weight parameters (empty when weighting is disabled)
    pub fn arch_params(&self) -> impl Iterator<Item = &Array1<f64>> {
        self.alphas.iter()
    }

    /// Mutable architecture-weight access for the external optimizer
    pub fn arch_params_mut(&mut self) -> impl Iterator<Item = &mut Array1<f64>> {
        self.alphas.iter_mut()
    }

    /// Operation-weight parameters across all sub-operations
    pub fn op_params(&self) -> impl Iterator<Item = &Array1<f64>> + '_ {
        self.ops.iter().flat_map(|op| op.parameters())
    }

    /// Mutable operation-weight access for the external optimizer
    pub fn op_params_mut(&mut self) -> impl Iterator<Item = &mut Array1<f64>> + '_ {
        self.ops.iter_mut().flat_map(|op| op.parameters_mut())
    }

    /// A mixture node never participates in drop-path regularization
    pub fn supports_drop_path(&self) -> bool {
        false
    }
}

/// Numerically stable softmax
fn softmax(logits: &Array1<f64>) -> Array1<f64> {
    let max_val = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp: Array1<f64> = logits.mapv(|x| (x - max_val).exp());
    let sum: f64 = exp.sum();
    if sum > 0.0 {
        exp / sum
    } else {
        Array1::from_elem(logits.len(), 1.0 / logits.len() as f64)
    }
}
