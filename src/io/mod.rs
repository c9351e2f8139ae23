/// CSV export for aggregated time series.
pub mod export;
