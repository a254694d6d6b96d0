//! Primitive operation implementations
//!
//! One differentiable operation per catalog kind, all shape-preserving
//! over `Array2<f64>` (batch x channels). Convolutions and pooling act
//! along the channel axis with same-padding, so every operation in a
//! mixture produces outputs of identical shape.

use ndarray::{Array1, Array2};
use rand::Rng;

use super::catalog::PrimitiveKind;
use super::desc::OpDesc;
use crate::error::Result;

/// A differentiable candidate operation at a search-graph edge
pub trait PrimitiveOp: std::fmt::Debug {
    /// Operation kind
    fn kind(&self) -> PrimitiveKind;

    /// Evaluate the operation; the output shape equals the input shape
    fn forward(&self, x: &Array2<f64>) -> Array2<f64>;

    /// Produce the serializable descriptor and optional rank metadata
    fn finalize(&self) -> (OpDesc, Option<f64>);

    /// Trainable parameter tensors, in registration order
    fn parameters(&self) -> Vec<&Array1<f64>>;

    /// Mutable parameter access for the external optimizer's update step
    fn parameters_mut(&mut self) -> Vec<&mut Array1<f64>>;
}

/// Structural no-op placeholder
#[derive(Debug, Clone)]
pub struct Zero {
    channels: usize,
}

impl Zero {
    /// Create a new zero op
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl PrimitiveOp for Zero {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::Zero
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        Array2::zeros(x.raw_dim())
    }

    fn finalize(&self) -> (OpDesc, Option<f64>) {
        (OpDesc::new(PrimitiveKind::Zero, self.channels), None)
    }

    fn parameters(&self) -> Vec<&Array1<f64>> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array1<f64>> {
        Vec::new()
    }
}

/// Identity pass-through (skip connection)
#[derive(Debug, Clone)]
pub struct Identity {
    channels: usize,
}

impl Identity {
    /// Create a new identity op
    pub fn new(channels: usize) -> Self {
        Self { channels }
    }
}

impl PrimitiveOp for Identity {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::SkipConnect
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        x.clone()
    }

    fn finalize(&self) -> (OpDesc, Option<f64>) {
        (OpDesc::new(PrimitiveKind::SkipConnect, self.channels), None)
    }

    fn parameters(&self) -> Vec<&Array1<f64>> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array1<f64>> {
        Vec::new()
    }
}

/// Max pooling along the channel axis, stride 1, same padding
#[derive(Debug, Clone)]
pub struct MaxPool1d {
    channels: usize,
    kernel_size: usize,
}

impl MaxPool1d {
    /// Create a new max pool op
    pub fn new(channels: usize, kernel_size: usize) -> Self {
        Self {
            channels,
            kernel_size,
        }
    }
}

impl PrimitiveOp for MaxPool1d {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::MaxPool3x3
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let (n, c) = x.dim();
        let half = self.kernel_size / 2;
        let mut out = Array2::zeros((n, c));
        for i in 0..n {
            for j in 0..c {
                let lo = j.saturating_sub(half);
                let hi = (j + half + 1).min(c);
                let mut best = f64::NEG_INFINITY;
                for t in lo..hi {
                    best = best.max(x[[i, t]]);
                }
                out[[i, j]] = best;
            }
        }
        out
    }

    fn finalize(&self) -> (OpDesc, Option<f64>) {
        (
            OpDesc::new(PrimitiveKind::MaxPool3x3, self.channels)
                .with_kernel_size(self.kernel_size),
            None,
        )
    }

    fn parameters(&self) -> Vec<&Array1<f64>> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array1<f64>> {
        Vec::new()
    }
}

/// Average pooling along the channel axis, stride 1, same padding
///
/// Out-of-range window positions are excluded from the mean.
#[derive(Debug, Clone)]
pub struct AvgPool1d {
    channels: usize,
    kernel_size: usize,
}

impl AvgPool1d {
    /// Create a new average pool op
    pub fn new(channels: usize, kernel_size: usize) -> Self {
        Self {
            channels,
            kernel_size,
        }
    }
}

impl PrimitiveOp for AvgPool1d {
    fn kind(&self) -> PrimitiveKind {
        PrimitiveKind::AvgPool3x3
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let (n, c) = x.dim();
        let half = self.kernel_size / 2;
        let mut out = Array2::zeros((n, c));
        for i in 0..n {
            for j in 0..c {
                let lo = j.saturating_sub(half);
                let hi = (j + half + 1).min(c);
                let mut acc = 0.0;
                for t in lo..hi {
                    acc += x[[i, t]];
                }
                out[[i, j]] = acc / (hi - lo) as f64;
            }
        }
        out
    }

    fn finalize(&self) -> (OpDesc, Option<f64>) {
        (
            OpDesc::new(PrimitiveKind::AvgPool3x3, self.channels)
                .with_kernel_size(self.kernel_size),
            None,
        )
    }

    fn parameters(&self) -> Vec<&Array1<f64>> {
        Vec::new()
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array1<f64>> {
        Vec::new()
    }
}

/// Separable convolution: two stacked depthwise passes plus a
/// per-channel affine transform
#[derive(Debug, Clone)]
pub struct SepConv1d {
    kind: PrimitiveKind,
    channels: usize,
    kernel_size: usize,
    kernel1: Array1<f64>,
    kernel2: Array1<f64>,
    gain: Array1<f64>,
    bias: Array1<f64>,
    affine: bool,
}

impl SepConv1d {
    /// Create a new separable conv op with randomly initialized kernels
    pub fn new(
        kind: PrimitiveKind,
        channels: usize,
        kernel_size: usize,
        affine: bool,
        rng: &mut impl Rng,
    ) -> Self {
        let scale = (2.0 / kernel_size as f64).sqrt();
        let kernel1 = Array1::from_shape_fn(kernel_size, |_| (rng.gen::<f64>() - 0.5) * scale);
        let kernel2 = Array1::from_shape_fn(kernel_size, |_| (rng.gen::<f64>() - 0.5) * scale);

        Self {
            kind,
            channels,
            kernel_size,
            kernel1,
            kernel2,
            gain: Array1::ones(channels),
            bias: Array1::zeros(channels),
            affine,
        }
    }
}

impl PrimitiveOp for SepConv1d {
    fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let y = depthwise_1d(x, &self.kernel1, 1);
        let y = depthwise_1d(&y, &self.kernel2, 1);
        if self.affine {
            y * &self.gain + &self.bias
        } else {
            y
        }
    }

    fn finalize(&self) -> (OpDesc, Option<f64>) {
        (
            OpDesc::new(self.kind, self.channels).with_kernel_size(self.kernel_size),
            None,
        )
    }

    fn parameters(&self) -> Vec<&Array1<f64>> {
        if self.affine {
            vec![&self.kernel1, &self.kernel2, &self.gain, &self.bias]
        } else {
            vec![&self.kernel1, &self.kernel2]
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array1<f64>> {
        if self.affine {
            vec![
                &mut self.kernel1,
                &mut self.kernel2,
                &mut self.gain,
                &mut self.bias,
            ]
        } else {
            vec![&mut self.kernel1, &mut self.kernel2]
        }
    }
}

/// Dilated convolution: one depthwise pass with dilated taps plus a
/// per-channel affine transform
#[derive(Debug, Clone)]
pub struct DilConv1d {
    kind: PrimitiveKind,
    channels: usize,
    kernel_size: usize,
    dilation: usize,
    kernel: Array1<f64>,
    gain: Array1<f64>,
    bias: Array1<f64>,
    affine: bool,
}

impl DilConv1d {
    /// Create a new dilated conv op with a randomly initialized kernel
    pub fn new(
        kind: PrimitiveKind,
        channels: usize,
        kernel_size: usize,
        dilation: usize,
        affine: bool,
        rng: &mut impl Rng,
    ) -> Self {
        let scale = (2.0 / kernel_size as f64).sqrt();
        let kernel = Array1::from_shape_fn(kernel_size, |_| (rng.gen::<f64>() - 0.5) * scale);

        Self {
            kind,
            channels,
            kernel_size,
            dilation,
            kernel,
            gain: Array1::ones(channels),
            bias: Array1::zeros(channels),
            affine,
        }
    }
}

impl PrimitiveOp for DilConv1d {
    fn kind(&self) -> PrimitiveKind {
        self.kind
    }

    fn forward(&self, x: &Array2<f64>) -> Array2<f64> {
        let y = depthwise_1d(x, &self.kernel, self.dilation);
        if self.affine {
            y * &self.gain + &self.bias
        } else {
            y
        }
    }

    fn finalize(&self) -> (OpDesc, Option<f64>) {
        (
            OpDesc::new(self.kind, self.channels)
                .with_kernel_size(self.kernel_size)
                .with_dilation(self.dilation),
            None,
        )
    }

    fn parameters(&self) -> Vec<&Array1<f64>> {
        if self.affine {
            vec![&self.kernel, &self.gain, &self.bias]
        } else {
            vec![&self.kernel]
        }
    }

    fn parameters_mut(&mut self) -> Vec<&mut Array1<f64>> {
        if self.affine {
            vec![&mut self.kernel, &mut self.gain, &mut self.bias]
        } else {
            vec![&mut self.kernel]
        }
    }
}

/// Construct the operation for a descriptor
///
/// The name-to-constructor mapping lives here and is resolved once per
/// registry build, not per call. `shared` is an externally owned
/// weight-sharing handle forwarded by the registry; the built-in
/// operations do not interpret it.
pub fn create_op(
    desc: &OpDesc,
    affine: bool,
    _shared: Option<&Array1<f64>>,
    rng: &mut impl Rng,
) -> Result<Box<dyn PrimitiveOp>> {
    let ch = desc.channels;
    let op: Box<dyn PrimitiveOp> = match desc.kind {
        PrimitiveKind::MaxPool3x3 => Box::new(MaxPool1d::new(ch, 3)),
        PrimitiveKind::AvgPool3x3 => Box::new(AvgPool1d::new(ch, 3)),
        PrimitiveKind::SkipConnect => Box::new(Identity::new(ch)),
        PrimitiveKind::SepConv3x3 => {
            Box::new(SepConv1d::new(PrimitiveKind::SepConv3x3, ch, 3, affine, rng))
        }
        PrimitiveKind::SepConv5x5 => {
            Box::new(SepConv1d::new(PrimitiveKind::SepConv5x5, ch, 5, affine, rng))
        }
        PrimitiveKind::DilConv3x3 => Box::new(DilConv1d::new(
            PrimitiveKind::DilConv3x3,
            ch,
            3,
            2,
            affine,
            rng,
        )),
        PrimitiveKind::DilConv5x5 => Box::new(DilConv1d::new(
            PrimitiveKind::DilConv5x5,
            ch,
            5,
            2,
            affine,
            rng,
        )),
        PrimitiveKind::Zero => Box::new(Zero::new(ch)),
    };
    Ok(op)
}

/// Depthwise convolution along the channel axis with zero padding
fn depthwise_1d(x: &Array2<f64>, kernel: &Array1<f64>, dilation: usize) -> Array2<f64> {
    let (n, c) = x.dim();
    let k = kernel.len();
    let center = (k / 2) as isize;
    let mut out = Array2::zeros((n, c));
    for i in 0..n {
        for j in 0..c {
            let mut acc = 0.0;
            for (t, &w) in kernel.iter().enumerate() {
                let src = j as isize + (t as isize - center) * dilation as isize;
                if src >= 0 && (src as usize) < c {
                    acc += w * x[[i, src as usize]];
                }
            }
            out[[i, j]] = acc;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::SeedableRng;
    use rand_xoshiro::Xoshiro256PlusPlus;

    fn sample_input() -> Array2<f64> {
        array![[1.0, 2.0, 3.0, 4.0], [4.0, 3.0, 2.0, 1.0]]
    }

    #[test]
    fn test_all_kinds_preserve_shape() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let x = sample_input();

        for kind in PrimitiveKind::search_ops() {
            let desc = OpDesc::new(kind, 4);
            let op = create_op(&desc, true, None, &mut rng).unwrap();
            let out = op.forward(&x);
            assert_eq!(out.shape(), x.shape(), "shape changed for {}", kind.name());
        }
    }

    #[test]
    fn test_zero_op() {
        let op = Zero::new(4);
        let out = op.forward(&sample_input());
        assert!(out.iter().all(|&v| v == 0.0));
        assert!(op.parameters().is_empty());
    }

    #[test]
    fn test_identity_op() {
        let op = Identity::new(4);
        let x = sample_input();
        assert_eq!(op.forward(&x), x);
    }

    #[test]
    fn test_max_pool_values() {
        let op = MaxPool1d::new(4, 3);
        let out = op.forward(&sample_input());
        // Row 0 is ascending, so each window max is the right edge.
        assert_eq!(out.row(0).to_vec(), vec![2.0, 3.0, 4.0, 4.0]);
        assert_eq!(out.row(1).to_vec(), vec![4.0, 4.0, 3.0, 2.0]);
    }

    #[test]
    fn test_avg_pool_values() {
        let op = AvgPool1d::new(4, 3);
        let out = op.forward(&sample_input());
        // Clipped windows at the edges average two entries.
        assert!((out[[0, 0]] - 1.5).abs() < 1e-12);
        assert!((out[[0, 1]] - 2.0).abs() < 1e-12);
        assert!((out[[0, 3]] - 3.5).abs() < 1e-12);
    }

    #[test]
    fn test_sep_conv_parameters() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let op = SepConv1d::new(PrimitiveKind::SepConv3x3, 4, 3, true, &mut rng);
        assert_eq!(op.parameters().len(), 4);

        let plain = SepConv1d::new(PrimitiveKind::SepConv3x3, 4, 3, false, &mut rng);
        assert_eq!(plain.parameters().len(), 2);
    }

    #[test]
    fn test_dil_conv_finalize() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        let op = DilConv1d::new(PrimitiveKind::DilConv5x5, 8, 5, 2, true, &mut rng);
        let (desc, rank) = op.finalize();

        assert_eq!(desc.kind, PrimitiveKind::DilConv5x5);
        assert_eq!(desc.channels, 8);
        assert_eq!(desc.kernel_size, Some(5));
        assert_eq!(desc.dilation, Some(2));
        assert!(rank.is_none());
    }

    #[test]
    fn test_factory_dispatch() {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(42);
        for kind in PrimitiveKind::search_ops() {
            let desc = OpDesc::new(kind, 4);
            let op = create_op(&desc, false, None, &mut rng).unwrap();
            assert_eq!(op.kind(), kind);
        }
    }

    #[test]
    fn test_depthwise_identity_kernel() {
        let kernel = array![0.0, 1.0, 0.0];
        let x = sample_input();
        assert_eq!(depthwise_1d(&x, &kernel, 1), x);
    }
}
