//! Bundled wind-turbine and solar-panel resource curves, and power-curve
//! smoothing.

use std::error::Error;
use std::fmt;

use serde::Deserialize;

/// Bundled turbine definitions, keyed by name.
const BUNDLED_TURBINES: &[(&str, &str)] = &[
    (
        "enercon_e101_3mw",
        include_str!("../resources/windturbine/enercon_e101_3mw.toml"),
    ),
    (
        "vestas_v112_3mw",
        include_str!("../resources/windturbine/vestas_v112_3mw.toml"),
    ),
];

/// Bundled panel definitions, keyed by name.
const BUNDLED_PANELS: &[(&str, &str)] = &[
    ("csi", include_str!("../resources/solarpanel/csi.toml")),
    ("kaneka", include_str!("../resources/solarpanel/kaneka.toml")),
];

/// Resource lookup or definition error.
#[derive(Debug)]
pub struct ResourceError {
    /// The resource name the error relates to.
    pub resource: String,
    /// Human-readable description.
    pub message: String,
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "resource error: {} — {}", self.resource, self.message)
    }
}

impl Error for ResourceError {}

/// A wind turbine power curve: velocity/power pairs plus hub height.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WindTurbineConfig {
    /// Hub height above ground (m).
    pub hub_height_m: f64,
    /// Wind speeds of the curve's sample points (m/s, ascending).
    pub velocities_ms: Vec<f64>,
    /// Power output at each sample point (kW).
    pub power_kw: Vec<f64>,
}

impl WindTurbineConfig {
    /// Rated (nameplate) capacity: the maximum of the power curve (kW).
    pub fn rated_capacity_kw(&self) -> f64 {
        self.power_kw.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }

    fn validate(self, name: &str) -> Result<Self, ResourceError> {
        if self.velocities_ms.len() != self.power_kw.len() {
            return Err(ResourceError {
                resource: name.to_string(),
                message: format!(
                    "{} velocities but {} power values",
                    self.velocities_ms.len(),
                    self.power_kw.len()
                ),
            });
        }
        if self.velocities_ms.len() < 2 {
            return Err(ResourceError {
                resource: name.to_string(),
                message: "power curve needs at least two sample points".to_string(),
            });
        }
        if self.velocities_ms.windows(2).any(|w| w[0] >= w[1]) {
            return Err(ResourceError {
                resource: name.to_string(),
                message: "velocities must be strictly ascending".to_string(),
            });
        }
        Ok(self)
    }
}

/// A solar panel definition: efficiency model plus coefficients.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "model", rename_all = "lowercase")]
pub enum SolarPanelConfig {
    /// Constant-efficiency model.
    Huld {
        /// Panel efficiency at reference conditions.
        efficiency: f64,
    },
    /// Bofinger irradiance-dependent efficiency model.
    Bofinger {
        /// Constant coefficient.
        a: f64,
        /// Linear irradiance coefficient.
        b: f64,
        /// Logarithmic irradiance coefficient.
        c: f64,
    },
}

impl SolarPanelConfig {
    /// Rated capacity of one capacity-layout unit (one m² for huld, one
    /// panel for bofinger at 1000 W/m² reference irradiance).
    pub fn rated_capacity_per_unit(&self) -> f64 {
        match *self {
            SolarPanelConfig::Huld { efficiency } => efficiency,
            SolarPanelConfig::Bofinger { a, b, c } => {
                (a + b * 1000.0 + c * 1000.0_f64.ln()) * 1e3
            }
        }
    }
}

/// Loads a bundled wind turbine definition by name.
///
/// # Errors
///
/// Returns a [`ResourceError`] listing the available turbines if the name is
/// unknown, or describing the defect if the definition is invalid.
pub fn windturbine_config(name: &str) -> Result<WindTurbineConfig, ResourceError> {
    let source = lookup(BUNDLED_TURBINES, name, "turbine")?;
    let config: WindTurbineConfig = toml::from_str(source).map_err(|e| ResourceError {
        resource: name.to_string(),
        message: e.to_string(),
    })?;
    config.validate(name)
}

/// Loads a bundled solar panel definition by name.
///
/// # Errors
///
/// Returns a [`ResourceError`] listing the available panels if the name is
/// unknown.
pub fn solarpanel_config(name: &str) -> Result<SolarPanelConfig, ResourceError> {
    let source = lookup(BUNDLED_PANELS, name, "panel")?;
    toml::from_str(source).map_err(|e| ResourceError {
        resource: name.to_string(),
        message: e.to_string(),
    })
}

/// Names of the bundled wind turbines.
pub fn available_turbines() -> Vec<&'static str> {
    BUNDLED_TURBINES.iter().map(|(name, _)| *name).collect()
}

/// Names of the bundled solar panels.
pub fn available_panels() -> Vec<&'static str> {
    BUNDLED_PANELS.iter().map(|(name, _)| *name).collect()
}

fn lookup<'a>(
    table: &[(&str, &'a str)],
    name: &str,
    kind: &str,
) -> Result<&'a str, ResourceError> {
    table
        .iter()
        .find(|(key, _)| *key == name)
        .map(|(_, source)| *source)
        .ok_or_else(|| ResourceError {
            resource: name.to_string(),
            message: format!(
                "unknown {kind} \"{name}\", available: {}",
                table
                    .iter()
                    .map(|(key, _)| *key)
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        })
}

/// Fleet-smoothing parameters for [`windturbine_smooth`].
///
/// Defaults are the values fitted for the Danish fleet: availability 0.95,
/// mean velocity offset 1.27 m/s, standard deviation 2.29 m/s.
#[derive(Debug, Clone)]
pub struct SmoothingParams {
    /// Fleet availability factor applied to the smoothed curve.
    pub eta: f64,
    /// Mean offset of the velocity kernel (m/s).
    pub delta_v: f64,
    /// Standard deviation of the velocity kernel (m/s).
    pub sigma: f64,
}

impl Default for SmoothingParams {
    fn default() -> Self {
        Self {
            eta: 0.95,
            delta_v: 1.27,
            sigma: 2.29,
        }
    }
}

/// Velocity grid used for the smoothing convolution: −50..50 m/s in 0.1 m/s
/// steps.
const KERNEL_GRID_POINTS: usize = 1001;
const KERNEL_GRID_STEP: f64 = 0.1;

/// Smooths a turbine power curve by convolution with a Gaussian velocity
/// kernel, modeling the spread of a whole fleet around the single-turbine
/// curve.
///
/// The curve is resampled onto a regular −50..50 m/s grid, convolved with
/// the kernel, scaled by the fleet availability `eta`, and sampled down to
/// 72 points over 0..35 m/s. The convolution reduces the curve's maximum
/// power; with `rescale` the smoothed curve is scaled back to the original
/// rated power.
pub fn windturbine_smooth(
    turbine: &WindTurbineConfig,
    params: &SmoothingParams,
    rescale: bool,
) -> WindTurbineConfig {
    let grid = linspace(-50.0, 50.0, KERNEL_GRID_POINTS);
    let power_reg: Vec<f64> = grid
        .iter()
        .map(|&v| interp(v, &turbine.velocities_ms, &turbine.power_kw))
        .collect();
    let kernel: Vec<f64> = grid
        .iter()
        .map(|&v0| {
            let z = (v0 - params.delta_v) / params.sigma;
            (-0.5 * z * z).exp() / (2.0 * std::f64::consts::PI).sqrt() / params.sigma
        })
        .collect();

    // The grid step scales the discrete convolution into a proper integral
    // over velocity.
    let convolution: Vec<f64> = convolve_same(&power_reg, &kernel)
        .into_iter()
        .map(|p| p * KERNEL_GRID_STEP)
        .collect();

    let velocities_new = linspace(0.0, 35.0, 72);
    let mut power_new: Vec<f64> = velocities_new
        .iter()
        .map(|&v| params.eta * interp(v, &grid, &convolution))
        .collect();

    if rescale {
        let original_peak = turbine.rated_capacity_kw();
        let smoothed_peak = power_new.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        for p in &mut power_new {
            *p = *p / smoothed_peak * original_peak;
        }
    }

    WindTurbineConfig {
        hub_height_m: turbine.hub_height_m,
        velocities_ms: velocities_new,
        power_kw: power_new,
    }
}

/// `n` evenly spaced values from `start` to `stop` inclusive.
fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    let step = (stop - start) / (n - 1) as f64;
    (0..n).map(|i| start + step * i as f64).collect()
}

/// Piecewise-linear interpolation with clamping at both ends, over
/// ascending sample points `xp`.
fn interp(x: f64, xp: &[f64], fp: &[f64]) -> f64 {
    if x <= xp[0] {
        return fp[0];
    }
    if x >= xp[xp.len() - 1] {
        return fp[fp.len() - 1];
    }
    let i = xp.partition_point(|&v| v < x);
    let (x0, x1) = (xp[i - 1], xp[i]);
    let (y0, y1) = (fp[i - 1], fp[i]);
    y0 + (y1 - y0) * (x - x0) / (x1 - x0)
}

/// Discrete convolution of two equal-length signals, truncated to the
/// centered `same` window.
fn convolve_same(a: &[f64], b: &[f64]) -> Vec<f64> {
    let n = a.len();
    let offset = (b.len() - 1) / 2;
    (0..n)
        .map(|t| {
            let k = t + offset;
            let j_lo = k.saturating_sub(n - 1);
            let j_hi = k.min(b.len() - 1);
            (j_lo..=j_hi).map(|j| a[k - j] * b[j]).sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bundled_turbines_load() {
        for name in available_turbines() {
            let turbine = windturbine_config(name);
            assert!(turbine.is_ok(), "turbine \"{name}\" should load");
        }
    }

    #[test]
    fn bundled_panels_load() {
        for name in available_panels() {
            let panel = solarpanel_config(name);
            assert!(panel.is_ok(), "panel \"{name}\" should load");
        }
    }

    #[test]
    fn unknown_turbine_lists_available_names() {
        let err = windturbine_config("bogus_9mw").err();
        let message = err.map(|e| e.message).unwrap_or_default();
        assert!(message.contains("vestas_v112_3mw"), "got: {message}");
    }

    #[test]
    fn unknown_panel_rejected() {
        assert!(solarpanel_config("perovskite").is_err());
    }

    #[test]
    fn rated_capacity_is_curve_maximum() {
        let turbine = windturbine_config("vestas_v112_3mw").ok();
        assert_eq!(
            turbine.map(|t| t.rated_capacity_kw()),
            Some(3000.0)
        );
    }

    #[test]
    fn huld_rated_capacity_is_efficiency() {
        let panel = solarpanel_config("csi").ok();
        assert_eq!(panel.map(|p| p.rated_capacity_per_unit()), Some(0.21));
    }

    #[test]
    fn bofinger_rated_capacity_formula() {
        let panel = SolarPanelConfig::Bofinger {
            a: 0.0005,
            b: 0.00022,
            c: -0.000024,
        };
        let expected = (0.0005 + 0.22 - 0.000024 * 1000.0_f64.ln()) * 1e3;
        assert!((panel.rated_capacity_per_unit() - expected).abs() < 1e-9);
    }

    #[test]
    fn smoothing_reduces_peak_without_rescale() {
        let turbine = windturbine_config("vestas_v112_3mw").ok();
        assert!(turbine.is_some());
        if let Some(turbine) = turbine {
            let smoothed = windturbine_smooth(&turbine, &SmoothingParams::default(), false);
            let peak = smoothed.power_kw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!(peak < turbine.rated_capacity_kw());
            assert!(peak > 0.0);
        }
    }

    #[test]
    fn smoothing_with_rescale_restores_peak() {
        let turbine = windturbine_config("vestas_v112_3mw").ok();
        assert!(turbine.is_some());
        if let Some(turbine) = turbine {
            let smoothed = windturbine_smooth(&turbine, &SmoothingParams::default(), true);
            let peak = smoothed.power_kw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            assert!((peak - turbine.rated_capacity_kw()).abs() < 1e-6);
        }
    }

    #[test]
    fn smoothed_curve_has_expected_grid() {
        let turbine = windturbine_config("enercon_e101_3mw").ok();
        assert!(turbine.is_some());
        if let Some(turbine) = turbine {
            let smoothed = windturbine_smooth(&turbine, &SmoothingParams::default(), false);
            assert_eq!(smoothed.velocities_ms.len(), 72);
            assert_eq!(smoothed.power_kw.len(), 72);
            assert_eq!(smoothed.velocities_ms[0], 0.0);
            assert_eq!(smoothed.velocities_ms[71], 35.0);
            assert_eq!(smoothed.hub_height_m, turbine.hub_height_m);
        }
    }

    #[test]
    fn smoothing_plateau_approaches_eta_times_rated() {
        // In the middle of the rated plateau, far from the ramp, the kernel
        // integrates to ~1 and the smoothed value is close to eta * rated.
        let turbine = windturbine_config("vestas_v112_3mw").ok();
        assert!(turbine.is_some());
        if let Some(turbine) = turbine {
            let params = SmoothingParams::default();
            let smoothed = windturbine_smooth(&turbine, &params, false);
            let at_20 = interp(20.0, &smoothed.velocities_ms, &smoothed.power_kw);
            let expected = params.eta * turbine.rated_capacity_kw();
            assert!(
                (at_20 - expected).abs() / expected < 0.05,
                "plateau {at_20} vs {expected}"
            );
        }
    }

    #[test]
    fn interp_clamps_and_interpolates() {
        let xp = [0.0, 1.0, 2.0];
        let fp = [0.0, 10.0, 40.0];
        assert_eq!(interp(-1.0, &xp, &fp), 0.0);
        assert_eq!(interp(3.0, &xp, &fp), 40.0);
        assert_eq!(interp(0.5, &xp, &fp), 5.0);
        assert_eq!(interp(1.5, &xp, &fp), 25.0);
    }

    #[test]
    fn convolve_same_matches_identity_kernel() {
        // Kernel with a single unit impulse at the center leaves the signal
        // unchanged.
        let a = [1.0, 2.0, 3.0, 4.0, 5.0];
        let mut b = [0.0; 5];
        b[2] = 1.0;
        assert_eq!(convolve_same(&a, &b), a.to_vec());
    }

    #[test]
    fn linspace_endpoints() {
        let grid = linspace(-50.0, 50.0, 1001);
        assert_eq!(grid.len(), 1001);
        assert_eq!(grid[0], -50.0);
        assert_eq!(grid[1000], 50.0);
        assert!((grid[1] - -49.9).abs() < 1e-12);
    }
}
