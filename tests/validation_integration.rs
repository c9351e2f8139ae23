//! Integration tests for agreement scoring over multi-bus series.

mod common;

use re_atlas::validation::{AgreementError, calculate_agreement};

#[test]
fn per_bus_scores_are_independent() {
    let data = common::bus_series(&[vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 3.0]]);
    let reference = common::bus_series(&[vec![1.0, 2.0, 3.0], vec![1.0, 2.0, 4.0]]);

    let rms = calculate_agreement(&data, &reference, "RMS").ok();
    let values = rms.as_ref().and_then(|r| r.values().ok());
    assert!(values.is_some());
    if let Some(v) = values {
        assert_eq!(v.shape(), &[2]);
        assert_eq!(v[[0]], 0.0);
        assert!((v[[1]] - 1.0 / 3.0).abs() < 1e-12);
    }
}

#[test]
fn every_measure_resolves_case_insensitively() {
    let data = common::bus_series(&[vec![0.2, 0.4, 0.6]]);
    for measure in ["rms", "total", "dkl", "mape", "chi_square"] {
        let out = calculate_agreement(&data, &data, measure);
        assert!(out.is_ok(), "measure \"{measure}\" should resolve");
    }
}

#[test]
fn bogus_measure_fails_fast() {
    let data = common::bus_series(&[vec![0.2, 0.4]]);
    let out = calculate_agreement(&data, &data, "bogus");
    assert!(matches!(out, Err(AgreementError::InvalidMeasure { .. })));
}

#[test]
fn dkl_scores_every_bus_against_its_own_reference_distribution() {
    // Bus b0 matches its reference distribution exactly, b1 does not.
    let data = common::bus_series(&[
        vec![0.1, 0.1, 0.5, 0.5, 0.9, 0.9],
        vec![0.1, 0.1, 0.1, 0.1, 0.9, 0.9],
    ]);
    let reference = common::bus_series(&[
        vec![0.1, 0.1, 0.5, 0.5, 0.9, 0.9],
        vec![0.1, 0.1, 0.9, 0.9, 0.9, 0.9],
    ]);

    let dkl = calculate_agreement(&data, &reference, "DKL").ok();
    let values = dkl.as_ref().and_then(|d| d.values().ok());
    assert!(values.is_some());
    if let Some(v) = values {
        assert_eq!(v[[0]], 0.0);
        assert!(v[[1]] > 0.0, "diverging bus should score above zero");
    }
    assert_eq!(dkl.as_ref().and_then(|d| d.name()), Some("DKL"));
}

#[test]
fn nan_reference_samples_only_skew_their_own_bus() {
    let data = common::bus_series(&[
        vec![0.2, 0.2, 0.4, 0.4],
        vec![0.3, 0.3, 0.3, 0.3],
    ]);
    let reference = common::bus_series(&[
        vec![0.2, f64::NAN, 0.4, 0.4],
        vec![0.3, 0.3, 0.3, 0.3],
    ]);

    let dkl = calculate_agreement(&data, &reference, "DKL").ok();
    let values = dkl.as_ref().and_then(|d| d.values().ok());
    assert!(values.is_some());
    if let Some(v) = values {
        assert!(v[[0]].is_finite());
        // untouched bus stays a perfect match
        assert_eq!(v[[1]], 0.0);
    }
}

#[test]
fn chunked_inputs_are_materialized_transparently() {
    let data = common::bus_series(&[vec![1.0, 2.0, 3.0, 4.0]]);
    let reference = common::bus_series(&[vec![1.0, 2.0, 3.0, 5.0]]);
    let chunked_data = data.rechunk("time", 2).ok();

    let direct = calculate_agreement(&data, &reference, "TOTAL").ok();
    let via_chunks = chunked_data
        .as_ref()
        .and_then(|c| calculate_agreement(c, &reference, "TOTAL").ok());

    let a = direct.as_ref().and_then(|d| d.values().ok());
    let b = via_chunks.as_ref().and_then(|v| v.values().ok());
    assert!(a.is_some());
    assert_eq!(a, b);
}

#[test]
fn zero_reference_samples_poison_only_ratio_measures() {
    let data = common::bus_series(&[vec![1.0, 2.0, 3.0]]);
    let reference = common::bus_series(&[vec![0.0, 2.0, 3.0]]);

    let chi = calculate_agreement(&data, &reference, "CHI_SQUARE").ok();
    let mape = calculate_agreement(&data, &reference, "MAPE").ok();
    let total = calculate_agreement(&data, &reference, "TOTAL").ok();

    let chi_v = chi.as_ref().and_then(|c| c.values().ok()).map(|v| v[[0]]);
    let mape_v = mape.as_ref().and_then(|m| m.values().ok()).map(|v| v[[0]]);
    let total_v = total.as_ref().and_then(|t| t.values().ok()).map(|v| v[[0]]);

    assert!(chi_v.map(|v| !v.is_finite()).unwrap_or(false));
    assert!(mape_v.map(|v| !v.is_finite()).unwrap_or(false));
    assert_eq!(total_v, Some(1.0));
}
