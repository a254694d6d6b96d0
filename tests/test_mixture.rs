//! Integration test: mixture node end-to-end

use mixnas::prelude::*;
use ndarray::{array, Array1, Array2};

fn two_op_config() -> SearchConfig {
    SearchConfig::default().with_catalog(vec![
        "skip_connect".to_string(),
        "avg_pool_3x3".to_string(),
        "none".to_string(),
    ])
}

fn sample_batch() -> Array2<f64> {
    array![
        [1.0, 2.0, 3.0, 4.0],
        [4.0, 3.0, 2.0, 1.0],
        [0.5, 0.5, 0.5, 0.5]
    ]
}

fn softmax(logits: &Array1<f64>) -> Array1<f64> {
    let max_val = logits.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let exp: Array1<f64> = logits.mapv(|v| (v - max_val).exp());
    let sum = exp.sum();
    exp / sum
}

#[test]
fn test_two_op_scenario() {
    let mut node = MixtureNode::new(4, &two_op_config(), true).expect("construction");
    let x = sample_batch();

    assert_eq!(node.num_valid_ops(), 2);
    assert_eq!(node.index_mapping().valid_to_orig(), &[0, 1]);

    node.set_collect_activations(true);
    let out = node.forward(&x);

    assert_eq!(node.forward_count(), 1);
    let activs = node.activations().expect("capture buffer");
    assert_eq!(activs.len(), 2);
    // Eligible entries in ascending catalog order: skip first.
    assert_eq!(activs[0], x);

    // Output = softmax(w)[0]*skip(x) + softmax(w)[1]*pool(x) + softmax(w)[2]*0.
    let alphas = node.arch_params().next().expect("weights").clone();
    let w = softmax(&alphas);
    assert!((w.sum() - 1.0).abs() < 1e-9);

    let expected = &activs[0] * w[0] + &activs[1] * w[1];
    for (a, b) in out.iter().zip(expected.iter()) {
        assert!((a - b).abs() < 1e-9, "weighted sum mismatch: {} vs {}", a, b);
    }
}

#[test]
fn test_valid_index_out_of_range() {
    let node = MixtureNode::new(4, &two_op_config(), true).unwrap();

    let err = node.valid_op_desc(2).unwrap_err();
    assert!(matches!(err, MixNasError::ValidIndexOutOfRange { .. }));

    // The full-catalog space fails with its own distinct condition.
    let err = node.op_desc(3).unwrap_err();
    assert!(matches!(err, MixNasError::CatalogIndexOutOfRange { .. }));
}

#[test]
fn test_default_catalog_search_surface() {
    let mut node = MixtureNode::new(8, &SearchConfig::default(), true).expect("construction");
    let x = Array2::from_shape_fn((4, 8), |(i, j)| (i + j) as f64 * 0.1);

    let out = node.forward(&x);
    assert_eq!(out.shape(), x.shape());
    assert!(out.iter().all(|v| v.is_finite()));

    assert_eq!(node.catalog().len(), 8);
    assert_eq!(node.num_valid_ops(), 7);
    assert_eq!(node.catalog().kinds().last(), Some(&PrimitiveKind::Zero));
}

#[test]
fn test_valid_desc_translates_through_mapping() {
    let node = MixtureNode::new(8, &SearchConfig::default(), true).unwrap();

    for i in 0..node.num_valid_ops() {
        let orig = node.index_mapping().valid_to_orig()[i];
        let via_valid = serde_json::to_value(node.valid_op_desc(i).unwrap()).unwrap();
        let direct = serde_json::to_value(node.op_desc(orig).unwrap()).unwrap();
        assert_eq!(via_valid, direct, "descriptor mismatch at eligible index {}", i);
    }
}

#[test]
fn test_unweighted_mode() {
    let config = SearchConfig::new(ArchTrainerKind::NoAlpha, FinalizerKind::Diversity)
        .with_catalog(vec![
            "skip_connect".to_string(),
            "avg_pool_3x3".to_string(),
            "none".to_string(),
        ]);
    let mut node = MixtureNode::new(4, &config, true).expect("construction");
    let x = sample_batch();

    assert_eq!(node.arch_params().count(), 0);

    // Capture must not change the combined output.
    let plain = node.forward(&x);
    node.set_collect_activations(true);
    let captured = node.forward(&x);
    assert_eq!(plain, captured);

    // Plain sum: skip(x) + pool(x) + 0.
    let activs = node.activations().unwrap();
    let expected = &activs[0] + &activs[1];
    for (a, b) in plain.iter().zip(expected.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn test_counter_and_buffer_discipline() {
    let mut node = MixtureNode::new(4, &two_op_config(), true).unwrap();
    let x = sample_batch();

    node.forward(&x);
    assert_eq!(node.forward_count(), 0);
    assert!(node.activations().is_none());

    node.set_collect_activations(true);
    node.forward(&x);
    node.forward(&x);
    assert_eq!(node.forward_count(), 2);

    node.set_collect_activations(false);
    let before = node.activations().unwrap().to_vec();
    node.forward(&x);
    assert_eq!(node.forward_count(), 2);
    assert_eq!(node.activations().unwrap(), &before[..]);
}

#[test]
fn test_config_conflict_fails_fast() {
    let config = SearchConfig::new(ArchTrainerKind::NoAlpha, FinalizerKind::Default);
    let result = MixtureNode::new(4, &config, true);
    assert!(matches!(result, Err(MixNasError::ConfigError(_))));
}

#[test]
fn test_parameter_groups() {
    let mut node = MixtureNode::new(4, &SearchConfig::default(), true).unwrap();

    assert_eq!(node.arch_params().count(), 1);
    let n_op_params = node.op_params().count();
    assert!(n_op_params > 0, "conv kernels and affine params expected");

    // The external optimizer gets live mutable access.
    for p in node.op_params_mut() {
        p.fill(0.0);
    }
    assert!(node.op_params().all(|p| p.iter().all(|&v| v == 0.0)));
}
