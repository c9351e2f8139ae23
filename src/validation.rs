//! Statistical agreement scoring between simulated and reference generation
//! time series.
//!
//! Every metric collapses the `time` axis to a scalar per remaining
//! coordinate combination. Division by zero in CHI_SQUARE / MAPE / DKL is
//! not an error: it propagates as non-finite or policy-substituted values
//! (see [`Measure::Dkl`]).

use std::error::Error;
use std::fmt;
use std::str::FromStr;

use ndarray::{ArrayD, ArrayView1, Axis, IxDyn};

use crate::array::{ArrayError, Coord, LabeledArray};

/// Number of capacity-factor bins for the DKL probability mass functions.
pub const CF_BINS: usize = 100;

/// Agreement evaluation error.
#[derive(Debug)]
pub enum AgreementError {
    /// The requested measure is not one of the known identifiers.
    InvalidMeasure {
        /// The rejected measure string as given by the caller.
        measure: String,
    },
    /// The input arrays do not satisfy the metric's axis/shape contract.
    Shape {
        /// Human-readable description.
        message: String,
    },
}

impl fmt::Display for AgreementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AgreementError::InvalidMeasure { measure } => {
                write!(
                    f,
                    "unknown measure \"{measure}\", available: RMS, TOTAL, DKL, MAPE, CHI_SQUARE"
                )
            }
            AgreementError::Shape { message } => write!(f, "agreement error: {message}"),
        }
    }
}

impl Error for AgreementError {}

impl From<ArrayError> for AgreementError {
    fn from(e: ArrayError) -> Self {
        AgreementError::Shape {
            message: e.to_string(),
        }
    }
}

/// The fixed set of agreement metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Measure {
    /// Mean squared deviation: `Σ_t (ref−da)² / count(time)`.
    Rms,
    /// Signed total difference: `Σ_t da − Σ_t ref`.
    Total,
    /// Kullback-Leibler divergence over binned capacity-factor
    /// distributions.
    ///
    /// Deviates from the textbook definition: a zero-probability data bin
    /// takes 1 as the ratio denominator, and an exactly-zero ratio is
    /// replaced by 1 so its log contributes nothing. Preserved deliberately;
    /// downstream consumers depend on this behavior.
    Dkl,
    /// Mean absolute percentage error: `mean_t |ref−da| / ref`.
    Mape,
    /// Chi-square statistic: `Σ_t (ref−da)² / ref`.
    ChiSquare,
}

impl Measure {
    /// Name used for the result array.
    pub fn result_name(self) -> &'static str {
        match self {
            Measure::Rms => "RMS",
            Measure::Total => "TOTAL difference",
            Measure::Dkl => "DKL",
            Measure::Mape => "MAPE",
            Measure::ChiSquare => "CHI_SQUARE",
        }
    }
}

impl FromStr for Measure {
    type Err = AgreementError;

    /// Parses a measure identifier, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RMS" => Ok(Measure::Rms),
            "TOTAL" => Ok(Measure::Total),
            "DKL" => Ok(Measure::Dkl),
            "MAPE" => Ok(Measure::Mape),
            "CHI_SQUARE" => Ok(Measure::ChiSquare),
            _ => Err(AgreementError::InvalidMeasure {
                measure: s.to_string(),
            }),
        }
    }
}

/// Calculates an agreement metric between a computed and a reference
/// generation time series.
///
/// `data` and `reference` must share axes and coordinates (NaN missing
/// values are permitted). The measure name is matched case-insensitively;
/// an unknown name is rejected before any computation. For DKL both inputs
/// must be capacity-factor series valued in `[0, 1]` and `reference` must
/// carry `bus` and `time` axes (see [`Measure::Dkl`] for the
/// zero-substitution policy).
///
/// Returns an array with the `time` axis removed, named after the metric.
///
/// # Errors
///
/// Returns [`AgreementError::InvalidMeasure`] for an unknown measure and
/// [`AgreementError::Shape`] when the axis/shape contract is violated.
pub fn calculate_agreement(
    data: &LabeledArray,
    reference: &LabeledArray,
    measure: &str,
) -> Result<LabeledArray, AgreementError> {
    let measure: Measure = measure.parse()?;
    match measure {
        Measure::Rms => calculate_rms(data, reference),
        Measure::Total => calculate_total_difference(data, reference),
        Measure::Dkl => calculate_dkl(data, reference),
        Measure::Mape => calculate_mape(data, reference),
        Measure::ChiSquare => calculate_chi_square(data, reference),
    }
}

/// `Σ_t (ref−da)² / count(time)` per remaining coordinate.
///
/// NaN terms are excluded from the sum, but `count(time)` is the full
/// number of time samples.
fn calculate_rms(
    data: &LabeledArray,
    reference: &LabeledArray,
) -> Result<LabeledArray, AgreementError> {
    reduce_paired(data, reference, Measure::Rms, |da, re| {
        let n = da.len() as f64;
        let sum: f64 = da
            .iter()
            .zip(re.iter())
            .map(|(d, r)| (r - d) * (r - d))
            .filter(|v| !v.is_nan())
            .sum();
        sum / n
    })
}

/// `Σ_t da − Σ_t ref` per remaining coordinate, NaN samples excluded.
fn calculate_total_difference(
    data: &LabeledArray,
    reference: &LabeledArray,
) -> Result<LabeledArray, AgreementError> {
    reduce_paired(data, reference, Measure::Total, |da, re| {
        nan_sum(da) - nan_sum(re)
    })
}

/// `Σ_t (ref−da)² / ref` per remaining coordinate.
///
/// A zero reference sample yields a non-finite term which propagates into
/// the sum; standard floating-point semantics, never an error.
fn calculate_chi_square(
    data: &LabeledArray,
    reference: &LabeledArray,
) -> Result<LabeledArray, AgreementError> {
    reduce_paired(data, reference, Measure::ChiSquare, |da, re| {
        da.iter()
            .zip(re.iter())
            .map(|(d, r)| (r - d) * (r - d) / r)
            .sum()
    })
}

/// `mean_t |ref−da| / ref` per remaining coordinate.
///
/// Zero reference samples are never filtered; they yield non-finite terms.
fn calculate_mape(
    data: &LabeledArray,
    reference: &LabeledArray,
) -> Result<LabeledArray, AgreementError> {
    reduce_paired(data, reference, Measure::Mape, |da, re| {
        let n = da.len() as f64;
        let sum: f64 = da.iter().zip(re.iter()).map(|(d, r)| (r - d).abs() / r).sum();
        sum / n
    })
}

/// Kullback-Leibler divergence over binned capacity-factor distributions.
///
/// A 100-bin PMF over `[0, 1]` is computed along `time` for every non-time
/// coordinate combination of `data`, and per `bus` for `reference` with NaN
/// time samples dropped (which skews the effective sample count per bus; an
/// accepted trade-off). Zero data-PMF bins take 1 as the ratio denominator
/// and exactly-zero ratios are replaced by 1 before the log.
fn calculate_dkl(
    data: &LabeledArray,
    reference: &LabeledArray,
) -> Result<LabeledArray, AgreementError> {
    let da = data.compute()?;
    let re = reference.compute()?;

    let t = da.axis_index("time").ok_or_else(|| AgreementError::Shape {
        message: "DKL requires a time axis in the data".to_string(),
    })?;

    // Reference PMFs, one per bus, NaN samples dropped.
    let ref_bus = re.axis_index("bus").ok_or_else(|| AgreementError::Shape {
        message: "DKL requires a bus axis in the reference".to_string(),
    })?;
    let ref_time = re.axis_index("time").ok_or_else(|| AgreementError::Shape {
        message: "DKL requires a time axis in the reference".to_string(),
    })?;
    if re.dims().len() != 2 {
        return Err(AgreementError::Shape {
            message: format!(
                "DKL reference must have bus and time axes only, got {:?}",
                re.dims()
            ),
        });
    }
    let ref_values = re.values()?;
    let ref_coords = re.coords("bus").unwrap_or(&[]).to_vec();
    let ref_pmfs: Vec<Pmf> = ref_values
        .lanes(Axis(ref_time))
        .into_iter()
        .map(|lane| Pmf::from_samples(lane.iter().copied()))
        .collect();
    debug_assert_eq!(ref_pmfs.len(), ref_values.shape()[ref_bus]);

    // The bus axis must be one of the data's non-time axes so each
    // coordinate combination resolves to exactly one reference PMF.
    let da_bus = da.axis_index("bus").ok_or_else(|| AgreementError::Shape {
        message: "DKL requires a bus axis in the data".to_string(),
    })?;
    let bus_out_pos = if da_bus < t { da_bus } else { da_bus - 1 };

    let values = da.values()?;
    let out_shape: Vec<usize> = values
        .shape()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != t)
        .map(|(_, &s)| s)
        .collect();
    let da_bus_coords = da.coords("bus").unwrap_or(&[]).to_vec();

    let mut results = Vec::with_capacity(out_shape.iter().product());
    for (idx, lane) in ndarray::indices(IxDyn(&out_shape))
        .into_iter()
        .zip(values.lanes(Axis(t)))
    {
        let bus_coord = &da_bus_coords[idx[bus_out_pos]];
        let ref_pos = ref_coords
            .iter()
            .position(|c| c == bus_coord)
            .ok_or_else(|| AgreementError::Shape {
                message: format!("bus \"{bus_coord}\" is missing from the reference"),
            })?;
        let data_pmf = Pmf::from_samples(lane.iter().copied());
        results.push(data_pmf.divergence_from(&ref_pmfs[ref_pos]));
    }

    finish(&da, t, results, Measure::Dkl)
}

/// A normalized histogram of capacity factors over `[0, 1]` with
/// [`CF_BINS`] bins.
#[derive(Debug, Clone)]
struct Pmf {
    probs: Vec<f64>,
}

impl Pmf {
    /// Bins samples and normalizes so the bin values sum to 1.
    ///
    /// Samples outside `[0, 1]` are excluded (NaN fails the range check
    /// too); a capacity factor of exactly 1 lands in the last bin. With no
    /// in-range samples every bin is `0/0 = NaN`, which propagates.
    fn from_samples(samples: impl Iterator<Item = f64>) -> Self {
        let mut counts = [0u64; CF_BINS];
        let mut total = 0u64;
        for v in samples {
            if !(0.0..=1.0).contains(&v) {
                continue;
            }
            let bin = ((v * CF_BINS as f64) as usize).min(CF_BINS - 1);
            counts[bin] += 1;
            total += 1;
        }
        let probs = counts.iter().map(|&c| c as f64 / total as f64).collect();
        Self { probs }
    }

    /// `Σ_bins ln(t) · ref[bin]` with `t = ref[bin] / self[bin]`, applying
    /// the zero-substitution policy in both the denominator and the ratio.
    fn divergence_from(&self, reference: &Pmf) -> f64 {
        self.probs
            .iter()
            .zip(reference.probs.iter())
            .map(|(&p, &q)| {
                let denom = if p == 0.0 { 1.0 } else { p };
                let t = q / denom;
                let t = if t == 0.0 { 1.0 } else { t };
                t.ln() * q
            })
            .sum()
    }
}

/// Applies a per-lane reduction over `time` to a (data, reference) pair
/// with identical axes and coordinates.
fn reduce_paired(
    data: &LabeledArray,
    reference: &LabeledArray,
    measure: Measure,
    f: impl Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> f64,
) -> Result<LabeledArray, AgreementError> {
    let da = data.compute()?;
    let re = reference.compute()?;

    if da.dims() != re.dims() || da.shape() != re.shape() {
        return Err(AgreementError::Shape {
            message: format!(
                "data axes {:?} {:?} do not match reference axes {:?} {:?}",
                da.dims(),
                da.shape(),
                re.dims(),
                re.shape()
            ),
        });
    }
    let t = da.axis_index("time").ok_or_else(|| AgreementError::Shape {
        message: format!("{} requires a time axis", measure.result_name()),
    })?;

    let da_values = da.values()?;
    let re_values = re.values()?;
    let results: Vec<f64> = da_values
        .lanes(Axis(t))
        .into_iter()
        .zip(re_values.lanes(Axis(t)))
        .map(|(d, r)| f(d, r))
        .collect();

    finish(&da, t, results, measure)
}

/// Assembles the reduced values into the output array: `time` removed, all
/// other axes and coordinates preserved, named after the metric.
fn finish(
    da: &LabeledArray,
    t: usize,
    results: Vec<f64>,
    measure: Measure,
) -> Result<LabeledArray, AgreementError> {
    let out_shape: Vec<usize> = da
        .shape()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != t)
        .map(|(_, &s)| s)
        .collect();
    let out_dims: Vec<String> = da
        .dims()
        .iter()
        .enumerate()
        .filter(|(i, _)| *i != t)
        .map(|(_, d)| d.clone())
        .collect();
    let out_coords: Vec<Vec<Coord>> = out_dims
        .iter()
        .map(|d| da.coords(d).unwrap_or(&[]).to_vec())
        .collect();

    let array = ArrayD::from_shape_vec(IxDyn(&out_shape), results).map_err(|e| {
        AgreementError::Shape {
            message: e.to_string(),
        }
    })?;
    let mut out = LabeledArray::new(array, out_dims, out_coords)?;
    out.set_name(measure.result_name());
    Ok(out)
}

/// Sums a lane, treating NaN samples as absent.
fn nan_sum(lane: ArrayView1<'_, f64>) -> f64 {
    lane.iter().filter(|v| !v.is_nan()).sum()
}
