//! Shared builders for integration tests.
#![allow(dead_code)]

use re_atlas::array::{Coord, LabeledArray, UnitIndex, from_values, range_coords};

/// Builds a (y, x, time) power field with values from `f(flat_index)`.
pub fn grid_field(ny: usize, nx: usize, nt: usize, f: impl Fn(usize) -> f64) -> LabeledArray {
    let values: Vec<f64> = (0..ny * nx * nt).map(f).collect();
    let array = from_values(
        &[ny, nx, nt],
        values,
        vec!["y".to_string(), "x".to_string(), "time".to_string()],
        vec![range_coords(ny), range_coords(nx), range_coords(nt)],
    );
    assert!(array.is_ok(), "test field should be well-formed");
    array.unwrap_or_else(|_| unreachable!())
}

/// Builds a bus index `b0..b{n-1}`.
pub fn bus_index(n: usize) -> UnitIndex {
    UnitIndex::new("bus", (0..n).map(|i| Coord::Str(format!("b{i}"))).collect())
}

/// Builds a (bus, time) capacity-factor series; one row of values per bus.
pub fn bus_series(rows: &[Vec<f64>]) -> LabeledArray {
    let nbus = rows.len();
    let nt = rows.first().map(Vec::len).unwrap_or(0);
    let values: Vec<f64> = rows.iter().flatten().copied().collect();
    let array = from_values(
        &[nbus, nt],
        values,
        vec!["bus".to_string(), "time".to_string()],
        vec![
            (0..nbus).map(|i| Coord::Str(format!("b{i}"))).collect(),
            range_coords(nt),
        ],
    );
    assert!(array.is_ok(), "test series should be well-formed");
    array.unwrap_or_else(|_| unreachable!())
}
