//! Converts reanalysis weather data into renewable-energy time series for
//! power-system studies.
//!
//! The two core components are the spatial aggregator
//! ([`aggregate::aggregate_matrix`]), which remaps per-cell power fields
//! onto grid buses via a weighting matrix, and the agreement evaluator
//! ([`validation::calculate_agreement`]), which scores simulated against
//! reference generation series. Both operate on [`array::LabeledArray`]
//! data, with an eager in-memory path and a lazy chunked path for
//! out-of-core inputs.

/// Spatial aggregation onto buses/regions.
pub mod aggregate;
/// Labeled arrays with named, coordinate-valued axes.
pub mod array;
pub mod config;
/// CSV export.
pub mod io;
pub mod resource;
/// Agreement metrics between simulated and reference series.
pub mod validation;
