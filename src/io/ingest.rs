//! Grid and point ingest.
//!
//! Two input formats are supported:
//!
//! - **ESRI ASCII grids** (`.asc`): the magnetic anomaly to analyse
//! - **XYZ CSV**: scattered `(x, y, z)` values, e.g. a saved depth map to regrid
//!
//! Design goals:
//! - **Strict header** for grids (clear errors + exit code 2)
//! - **Row-level validation** for CSV (skip bad rows, but report what happened)
//! - **Separation of concerns**: no spectral logic here

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;

use csv::StringRecord;
use log::{debug, warn};
use nalgebra::DMatrix;

use crate::domain::Extent;
use crate::error::AppError;
use crate::grid::CurieGrid;

/// Default `NODATA_value` when a grid header omits it.
pub const DEFAULT_NODATA: f64 = -9999.0;

/// A raster as read from disk, rows ordered south to north.
#[derive(Debug, Clone)]
pub struct RasterData {
    pub data: DMatrix<f64>,
    pub extent: Extent,
    /// Number of cells that held the `NODATA_value`.
    pub nodata_cells: usize,
}

impl RasterData {
    pub fn into_curie_grid(self) -> Result<CurieGrid, AppError> {
        if self.data.iter().any(|v| !v.is_finite()) {
            return Err(AppError::data(format!(
                "Grid contains {} NODATA/non-finite cells; trim or fill it before spectral analysis.",
                self.data.iter().filter(|v| !v.is_finite()).count()
            )));
        }
        CurieGrid::new(self.data, self.extent)
    }
}

/// Load an ESRI ASCII grid.
pub fn load_ascii_grid(path: &Path) -> Result<RasterData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open grid '{}': {e}", path.display())))?;
    let raster = read_ascii_grid(BufReader::new(file))
        .map_err(|e| AppError::new(e.exit_code(), format!("{}: {}", path.display(), e.message())))?;
    debug!(
        "loaded {}: {}x{} nodes, {} NODATA",
        path.display(),
        raster.data.nrows(),
        raster.data.ncols(),
        raster.nodata_cells
    );
    Ok(raster)
}

/// Parse an ESRI ASCII grid from any reader.
///
/// Header keys are case-insensitive. `xllcorner`/`yllcorner` refer to the
/// outer corner of the lower-left cell, `xllcenter`/`yllcenter` to its node.
pub fn read_ascii_grid<R: BufRead>(reader: R) -> Result<RasterData, AppError> {
    let mut header: HashMap<String, f64> = HashMap::new();
    let mut values: Vec<f64> = Vec::new();

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| AppError::input(format!("Failed to read grid: {e}")))?;
        let mut tokens = line.split_whitespace().peekable();
        let Some(first) = tokens.peek().copied() else {
            continue;
        };

        if values.is_empty() && first.parse::<f64>().is_err() {
            let key = first.to_ascii_lowercase();
            tokens.next();
            let raw = tokens
                .next()
                .ok_or_else(|| AppError::input(format!("Line {}: header '{first}' has no value.", idx + 1)))?;
            let v: f64 = raw
                .parse()
                .map_err(|_| AppError::input(format!("Line {}: invalid header value '{raw}'.", idx + 1)))?;
            header.insert(key, v);
            continue;
        }

        for tok in tokens {
            let v: f64 = tok
                .parse()
                .map_err(|_| AppError::input(format!("Line {}: invalid grid value '{tok}'.", idx + 1)))?;
            values.push(v);
        }
    }

    let get = |key: &str| {
        header
            .get(key)
            .copied()
            .ok_or_else(|| AppError::input(format!("Missing grid header field `{key}`.")))
    };
    let ncols = header_count("ncols", get("ncols")?)?;
    let nrows = header_count("nrows", get("nrows")?)?;
    let cellsize = get("cellsize")?;
    if ncols < 2 || nrows < 2 || !(cellsize.is_finite() && cellsize > 0.0) {
        return Err(AppError::input(format!(
            "Invalid grid header: ncols={ncols}, nrows={nrows}, cellsize={cellsize}."
        )));
    }

    let x0 = match (header.get("xllcenter"), header.get("xllcorner")) {
        (Some(c), _) => *c,
        (None, Some(c)) => c + 0.5 * cellsize,
        (None, None) => return Err(AppError::input("Missing grid header field `xllcorner`/`xllcenter`.")),
    };
    let y0 = match (header.get("yllcenter"), header.get("yllcorner")) {
        (Some(c), _) => *c,
        (None, Some(c)) => c + 0.5 * cellsize,
        (None, None) => return Err(AppError::input("Missing grid header field `yllcorner`/`yllcenter`.")),
    };
    let nodata = header.get("nodata_value").copied().unwrap_or_else(|| {
        debug!("grid header has no NODATA_value; assuming {DEFAULT_NODATA}");
        DEFAULT_NODATA
    });

    let cells = nrows
        .checked_mul(ncols)
        .ok_or_else(|| AppError::input(format!("Grid header declares {nrows}x{ncols} cells; too large.")))?;
    if values.len() != cells {
        return Err(AppError::input(format!(
            "Grid body has {} values, header declares {nrows}x{ncols}={cells}.",
            values.len()
        )));
    }

    // File rows run north to south.
    let mut nodata_cells = 0usize;
    let data = DMatrix::from_fn(nrows, ncols, |r, c| {
        let v = values[(nrows - 1 - r) * ncols + c];
        if v == nodata {
            nodata_cells += 1;
            f64::NAN
        } else {
            v
        }
    });

    let extent = Extent::new(
        x0,
        x0 + (ncols - 1) as f64 * cellsize,
        y0,
        y0 + (nrows - 1) as f64 * cellsize,
    )?;

    Ok(RasterData {
        data,
        extent,
        nodata_cells,
    })
}

/// A row or column count from the grid header.
fn header_count(key: &str, v: f64) -> Result<usize, AppError> {
    if !(v.is_finite() && v.fract() == 0.0 && v >= 1.0 && v < usize::MAX as f64) {
        return Err(AppError::input(format!(
            "Grid header `{key}` must be a positive integer, got {v}."
        )));
    }
    Ok(v as usize)
}

/// A row-level error encountered during CSV ingest.
#[derive(Debug, Clone)]
pub struct RowError {
    pub line: usize,
    pub message: String,
}

/// Points read from an XYZ CSV.
#[derive(Debug, Clone)]
pub struct XyzData {
    pub points: Vec<(f64, f64, f64)>,
    pub row_errors: Vec<RowError>,
    pub rows_read: usize,
}

/// Load scattered points from a CSV with a header row.
///
/// Columns are found by name (`x`/`lon`/`easting`, `y`/`lat`/`northing`,
/// `z`/`value`/`curie_depth`); otherwise the first three columns are used.
pub fn load_xyz_csv(path: &Path) -> Result<XyzData, AppError> {
    let file = File::open(path)
        .map_err(|e| AppError::input(format!("Failed to open CSV '{}': {e}", path.display())))?;
    read_xyz_csv(file)
}

pub fn read_xyz_csv<R: Read>(reader: R) -> Result<XyzData, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| AppError::input(format!("Failed to read CSV headers: {e}")))?
        .clone();
    let header_map = build_header_map(&headers);

    let find = |names: &[&str], fallback: usize| {
        names
            .iter()
            .find_map(|n| header_map.get(*n).copied())
            .unwrap_or(fallback)
    };
    let ix = find(&["x", "lon", "longitude", "easting", "xc"], 0);
    let iy = find(&["y", "lat", "latitude", "northing", "yc"], 1);
    let iz = find(&["z", "value", "curie_depth"], 2);
    if headers.len() < 3 {
        return Err(AppError::input(format!(
            "XYZ CSV needs at least 3 columns, found {}.",
            headers.len()
        )));
    }

    let mut points = Vec::new();
    let mut row_errors = Vec::new();
    let mut rows_read = 0usize;

    for (idx, result) in reader.records().enumerate() {
        // Line 1 holds the header.
        let line = idx + 2;
        rows_read += 1;

        let record = match result {
            Ok(r) => r,
            Err(e) => {
                row_errors.push(RowError {
                    line,
                    message: format!("CSV parse error: {e}"),
                });
                continue;
            }
        };

        match (parse_field(&record, ix), parse_field(&record, iy), parse_field(&record, iz)) {
            (Ok(x), Ok(y), Ok(z)) => points.push((x, y, z)),
            (Err(e), _, _) | (_, Err(e), _) | (_, _, Err(e)) => row_errors.push(RowError { line, message: e }),
        }
    }

    if !row_errors.is_empty() {
        warn!("skipped {} of {rows_read} CSV rows", row_errors.len());
    }
    if points.is_empty() {
        return Err(AppError::data("No valid rows in XYZ CSV."));
    }

    Ok(XyzData {
        points,
        row_errors,
        rows_read,
    })
}

fn parse_field(record: &StringRecord, idx: usize) -> Result<f64, String> {
    let raw = record
        .get(idx)
        .ok_or_else(|| format!("missing column {}", idx + 1))?;
    // Empty cells are gaps (e.g. failed windows in a depth map).
    if raw.is_empty() || raw.eq_ignore_ascii_case("nan") {
        return Ok(f64::NAN);
    }
    raw.parse::<f64>()
        .map_err(|_| format!("invalid number '{raw}' in column {}", idx + 1))
}

fn build_header_map(headers: &StringRecord) -> HashMap<String, usize> {
    headers
        .iter()
        .enumerate()
        .map(|(idx, name)| (normalize_header_name(name), idx))
        .collect()
}

fn normalize_header_name(name: &str) -> String {
    // Strip a UTF-8 BOM some spreadsheet tools prepend to the first header.
    let name = name.trim().trim_start_matches('\u{feff}');
    name.to_ascii_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const SMALL_GRID: &str = "ncols 3\nnrows 2\nxllcorner 0\nyllcorner 100\ncellsize 10\nNODATA_value -9999\n1 2 3\n4 -9999 6\n";

    #[test]
    fn reads_corner_registered_grid_south_up() {
        let raster = read_ascii_grid(Cursor::new(SMALL_GRID)).unwrap();
        assert_eq!(raster.data.shape(), (2, 3));
        // Last file row is the southern row.
        assert_eq!(raster.data[(0, 0)], 4.0);
        assert!(raster.data[(0, 1)].is_nan());
        assert_eq!(raster.data[(1, 2)], 3.0);
        assert_eq!(raster.nodata_cells, 1);
        assert_eq!(raster.extent, Extent::new(5.0, 25.0, 105.0, 115.0).unwrap());
    }

    #[test]
    fn reads_center_registration_and_wrapped_rows() {
        let text = "NCOLS 2\nNROWS 2\nXLLCENTER 1000\nYLLCENTER 2000\nCELLSIZE 500\n1 2 3\n4\n";
        let raster = read_ascii_grid(Cursor::new(text)).unwrap();
        assert_eq!(raster.extent, Extent::new(1000.0, 1500.0, 2000.0, 2500.0).unwrap());
        assert_eq!(raster.data[(0, 0)], 3.0);
        assert_eq!(raster.data[(1, 1)], 2.0);
    }

    #[test]
    fn rejects_truncated_body() {
        let text = "ncols 3\nnrows 2\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3\n";
        let err = read_ascii_grid(Cursor::new(text)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }

    #[test]
    fn huge_header_counts_are_input_errors() {
        let text = "ncols 10000000000000000000\nnrows 10000000000000000000\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3 4\n";
        let err = read_ascii_grid(Cursor::new(text)).unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);

        let text = "ncols 1e19\nnrows 1e19\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3 4\n";
        assert!(read_ascii_grid(Cursor::new(text)).is_err());
    }

    #[test]
    fn fractional_or_negative_counts_are_rejected() {
        for counts in ["ncols 2.5\nnrows 2", "ncols 2\nnrows -2", "ncols inf\nnrows 2"] {
            let text = format!("{counts}\nxllcorner 0\nyllcorner 0\ncellsize 1\n1 2 3 4\n");
            let err = read_ascii_grid(Cursor::new(text)).unwrap_err();
            assert_eq!(err.exit_code(), crate::error::EXIT_INPUT, "{counts}");
        }
    }

    #[test]
    fn nodata_grid_cannot_become_curie_grid() {
        let raster = read_ascii_grid(Cursor::new(SMALL_GRID)).unwrap();
        assert!(raster.into_curie_grid().is_err());
    }

    #[test]
    fn xyz_by_header_name_with_bad_rows() {
        let text = "\u{feff}Z,Lat,Lon\n1.5,10,20\noops,11,21\n2.5,12,\n";
        let xyz = read_xyz_csv(Cursor::new(text)).unwrap();
        assert_eq!(xyz.rows_read, 3);
        assert_eq!(xyz.points.len(), 2);
        assert_eq!(xyz.points[0], (20.0, 10.0, 1.5));
        assert!(xyz.points[1].0.is_nan());
        assert_eq!(xyz.row_errors.len(), 1);
        assert_eq!(xyz.row_errors[0].line, 3);
    }

    #[test]
    fn xyz_falls_back_to_column_order() {
        let text = "a,b,c\n1,2,3\n";
        let xyz = read_xyz_csv(Cursor::new(text)).unwrap();
        assert_eq!(xyz.points, vec![(1.0, 2.0, 3.0)]);
    }
}
