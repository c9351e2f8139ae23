//! CSV export for aggregated (unit × time) series.

use std::fs::File;
use std::io::{self, Write};
use std::path::Path;

use crate::array::LabeledArray;

/// Exports a 2-D labeled array to a CSV file at the given path.
///
/// See [`write_csv`] for the layout.
///
/// # Errors
///
/// Returns an `io::Error` if the array is not exportable or file creation
/// or writing fails.
pub fn export_csv(array: &LabeledArray, path: &Path) -> io::Result<()> {
    let file = File::create(path)?;
    let buf = io::BufWriter::new(file);
    write_csv(array, buf)
}

/// Writes a 2-D labeled array as CSV to any writer.
///
/// The first axis labels the rows (one per aggregation unit), the second
/// axis the columns; the header row carries the first axis name followed by
/// the second axis' coordinates. Produces deterministic output for
/// identical inputs.
///
/// # Errors
///
/// Returns an `io::Error` with kind `InvalidInput` if the array is chunked
/// or not 2-dimensional, or a write error otherwise.
pub fn write_csv(array: &LabeledArray, writer: impl Write) -> io::Result<()> {
    let values = array
        .values()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e.to_string()))?;
    if array.dims().len() != 2 {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("CSV export expects a 2-D array, got axes {:?}", array.dims()),
        ));
    }
    let row_dim = &array.dims()[0];
    let col_dim = &array.dims()[1];
    let row_coords = array.coords(row_dim).unwrap_or(&[]);
    let col_coords = array.coords(col_dim).unwrap_or(&[]);

    let mut wtr = csv::WriterBuilder::new().from_writer(writer);

    // Header
    let mut header = Vec::with_capacity(1 + col_coords.len());
    header.push(row_dim.clone());
    header.extend(col_coords.iter().map(ToString::to_string));
    wtr.write_record(&header)?;

    // One row per unit
    for (i, coord) in row_coords.iter().enumerate() {
        let mut record = Vec::with_capacity(1 + col_coords.len());
        record.push(coord.to_string());
        for j in 0..col_coords.len() {
            record.push(format!("{:.6}", values[[i, j]]));
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::array::{Coord, from_values, range_coords};

    fn bus_series() -> Option<LabeledArray> {
        from_values(
            &[2, 3],
            vec![1.0, 2.0, 3.0, 10.0, 20.0, 30.0],
            vec!["bus".to_string(), "time".to_string()],
            vec![
                vec![Coord::Str("b0".to_string()), Coord::Str("b1".to_string())],
                range_coords(3),
            ],
        )
        .ok()
    }

    #[test]
    fn header_carries_axis_name_and_time_coords() {
        let array = bus_series();
        let mut buf = Vec::new();
        assert!(array.map(|a| write_csv(&a, &mut buf).is_ok()).unwrap_or(false));
        let output = String::from_utf8(buf).ok();
        let first_line = output.as_deref().unwrap_or("").lines().next().unwrap_or("");
        assert_eq!(first_line, "bus,0,1,2");
    }

    #[test]
    fn one_row_per_unit() {
        let array = bus_series();
        let mut buf = Vec::new();
        assert!(array.map(|a| write_csv(&a, &mut buf).is_ok()).unwrap_or(false));
        let output = String::from_utf8(buf).ok();
        let lines: Vec<String> = output
            .as_deref()
            .unwrap_or("")
            .lines()
            .map(str::to_string)
            .collect();
        // 1 header + 2 unit rows
        assert_eq!(lines.len(), 3);
        assert!(lines[1].starts_with("b0,"));
        assert!(lines[2].starts_with("b1,"));
    }

    #[test]
    fn deterministic_output() {
        let array = bus_series();
        let mut buf1 = Vec::new();
        let mut buf2 = Vec::new();
        if let Some(a) = array {
            assert!(write_csv(&a, &mut buf1).is_ok());
            assert!(write_csv(&a, &mut buf2).is_ok());
        }
        assert_eq!(buf1, buf2);
    }

    #[test]
    fn chunked_array_rejected() {
        let array = bus_series().and_then(|a| a.rechunk("time", 2).ok());
        let mut buf = Vec::new();
        assert!(array.map(|a| write_csv(&a, &mut buf).is_err()).unwrap_or(false));
    }

    #[test]
    fn non_2d_array_rejected() {
        let array = from_values(
            &[2, 2, 2],
            vec![0.0; 8],
            vec!["y".to_string(), "x".to_string(), "time".to_string()],
            vec![range_coords(2), range_coords(2), range_coords(2)],
        )
        .ok();
        let mut buf = Vec::new();
        assert!(array.map(|a| write_csv(&a, &mut buf).is_err()).unwrap_or(false));
    }
}
