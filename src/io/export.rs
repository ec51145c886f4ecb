//! Export depth maps, spectra and grids.
//!
//! CSV outputs are meant to be easy to consume in spreadsheets, GIS tools or
//! downstream scripts; grids are written back as ESRI ASCII.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use nalgebra::DMatrix;

use crate::domain::{CurieParams, DepthEstimate, Extent, RadialSpectrum};
use crate::error::AppError;
use crate::io::ingest::DEFAULT_NODATA;

/// Write per-window fit results to a CSV file.
///
/// Failed windows keep their coordinates with empty parameter cells and the
/// error message in the last column.
pub fn write_depth_map_csv(path: &Path, estimates: &[DepthEstimate]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create export CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["xc", "yc", "beta", "zt", "dz", "c", "curie_depth", "misfit", "error"])
        .map_err(|e| AppError::input(format!("Failed to write export CSV header: {e}")))?;

    let fmt = |v: Option<f64>| v.map(|x| format!("{x:.6}")).unwrap_or_default();
    for est in estimates {
        let p = est.params;
        let field = |f: fn(&CurieParams) -> f64| fmt(p.as_ref().map(f));
        writer
            .write_record([
                format!("{:.3}", est.xc),
                format!("{:.3}", est.yc),
                field(|p| p.beta),
                field(|p| p.zt),
                field(|p| p.dz),
                field(|p| p.c),
                fmt(est.curie_depth()),
                fmt(est.misfit),
                est.error.clone().unwrap_or_default(),
            ])
            .map_err(|e| AppError::input(format!("Failed to write export CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush export CSV: {e}")))?;
    Ok(())
}

/// Write a radial spectrum as `k,phi,sigma` rows.
pub fn write_spectrum_csv(path: &Path, spectrum: &RadialSpectrum) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create spectrum CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["k", "phi", "sigma"])
        .map_err(|e| AppError::input(format!("Failed to write spectrum CSV header: {e}")))?;
    for i in 0..spectrum.len() {
        writer
            .write_record([
                format!("{:.10}", spectrum.k[i]),
                format!("{:.10}", spectrum.phi[i]),
                format!("{:.10}", spectrum.sigma[i]),
            ])
            .map_err(|e| AppError::input(format!("Failed to write spectrum CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush spectrum CSV: {e}")))?;
    Ok(())
}

/// Write sampled parameter sets (e.g. an MCMC chain) as one row per sample.
pub fn write_samples_csv(path: &Path, samples: &[CurieParams]) -> Result<(), AppError> {
    let mut writer = csv::Writer::from_path(path)
        .map_err(|e| AppError::input(format!("Failed to create samples CSV '{}': {e}", path.display())))?;

    writer
        .write_record(["beta", "zt", "dz", "c", "curie_depth"])
        .map_err(|e| AppError::input(format!("Failed to write samples CSV header: {e}")))?;
    for p in samples {
        writer
            .serialize((p.beta, p.zt, p.dz, p.c, p.curie_depth()))
            .map_err(|e| AppError::input(format!("Failed to write samples CSV row: {e}")))?;
    }

    writer
        .flush()
        .map_err(|e| AppError::input(format!("Failed to flush samples CSV: {e}")))?;
    Ok(())
}

/// Read a spectrum written by `write_spectrum_csv`.
pub fn read_spectrum_csv(path: &Path) -> Result<RadialSpectrum, AppError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| AppError::input(format!("Failed to open spectrum CSV '{}': {e}", path.display())))?;

    let mut spectrum = RadialSpectrum {
        k: Vec::new(),
        phi: Vec::new(),
        sigma: Vec::new(),
    };
    for (idx, result) in reader.records().enumerate() {
        let line = idx + 2;
        let record = result.map_err(|e| AppError::input(format!("Line {line}: CSV parse error: {e}")))?;
        let mut vals = [0.0; 3];
        for (j, v) in vals.iter_mut().enumerate() {
            let raw = record
                .get(j)
                .ok_or_else(|| AppError::input(format!("Line {line}: expected 3 columns (k,phi,sigma).")))?;
            *v = raw
                .parse()
                .map_err(|_| AppError::input(format!("Line {line}: invalid number '{raw}'.")))?;
        }
        spectrum.k.push(vals[0]);
        spectrum.phi.push(vals[1]);
        spectrum.sigma.push(vals[2]);
    }

    if spectrum.is_empty() {
        return Err(AppError::data(format!("Spectrum CSV '{}' has no rows.", path.display())));
    }
    Ok(spectrum)
}

/// Write a grid as ESRI ASCII with node (`xllcenter`) registration.
///
/// Non-finite cells become `NODATA_value`.
pub fn write_ascii_grid(path: &Path, data: &DMatrix<f64>, extent: &Extent) -> Result<(), AppError> {
    let (ny, nx) = data.shape();
    if nx < 2 || ny < 2 {
        return Err(AppError::input(format!("Cannot write a {ny}x{nx} grid (need at least 2x2).")));
    }
    let dx = extent.width() / (nx - 1) as f64;
    let dy = extent.height() / (ny - 1) as f64;
    if ((dx - dy) / dx).abs() > 1e-6 {
        return Err(AppError::input(format!(
            "ESRI ASCII grids need square cells: dx={dx}, dy={dy}."
        )));
    }

    let file = File::create(path)
        .map_err(|e| AppError::input(format!("Failed to create grid '{}': {e}", path.display())))?;
    let mut w = BufWriter::new(file);
    let io_err = |e: std::io::Error| AppError::input(format!("Failed to write grid '{}': {e}", path.display()));

    writeln!(w, "ncols {nx}").map_err(io_err)?;
    writeln!(w, "nrows {ny}").map_err(io_err)?;
    writeln!(w, "xllcenter {}", extent.xmin).map_err(io_err)?;
    writeln!(w, "yllcenter {}", extent.ymin).map_err(io_err)?;
    writeln!(w, "cellsize {dx}").map_err(io_err)?;
    writeln!(w, "NODATA_value {DEFAULT_NODATA}").map_err(io_err)?;

    for r in (0..ny).rev() {
        let row: Vec<String> = (0..nx)
            .map(|c| {
                let v = data[(r, c)];
                if v.is_finite() { format!("{v}") } else { format!("{DEFAULT_NODATA}") }
            })
            .collect();
        writeln!(w, "{}", row.join(" ")).map_err(io_err)?;
    }
    w.flush().map_err(io_err)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::ingest::{load_ascii_grid, load_xyz_csv};

    #[test]
    fn ascii_grid_survives_write_and_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("grid.asc");

        let mut data = DMatrix::from_fn(3, 4, |r, c| (r * 4 + c) as f64 * 0.5);
        data[(1, 2)] = f64::NAN;
        let extent = Extent::new(100.0, 130.0, 200.0, 220.0).unwrap();
        write_ascii_grid(&path, &data, &extent).unwrap();

        let back = load_ascii_grid(&path).unwrap();
        assert_eq!(back.extent, extent);
        assert_eq!(back.nodata_cells, 1);
        assert!(back.data[(1, 2)].is_nan());
        assert_eq!(back.data[(2, 3)], data[(2, 3)]);
        assert_eq!(back.data[(0, 1)], data[(0, 1)]);
    }

    #[test]
    fn depth_map_csv_can_be_regridded_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("map.csv");
        let estimates = vec![
            DepthEstimate {
                xc: 1000.0,
                yc: 2000.0,
                params: Some(CurieParams::new(3.0, 1.0, 20.0, 5.0)),
                misfit: Some(0.25),
                error: None,
            },
            DepthEstimate {
                xc: 3000.0,
                yc: 2000.0,
                params: None,
                misfit: None,
                error: Some("window outside grid".to_string()),
            },
        ];
        write_depth_map_csv(&path, &estimates).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.starts_with("xc,yc,beta,zt,dz,c,curie_depth,misfit,error"));
        assert!(text.contains("window outside grid"));

        let xyz = load_xyz_csv(&path).unwrap();
        assert_eq!(xyz.points.len(), 2);
        assert_eq!(xyz.points[0], (1000.0, 2000.0, 21.0));
        assert!(xyz.points[1].2.is_nan());
    }

    #[test]
    fn spectrum_csv_reads_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("spec.csv");
        let spec = RadialSpectrum {
            k: vec![0.1, 0.2, 0.3],
            phi: vec![5.0, 4.5, 4.25],
            sigma: vec![0.5, 0.25, 0.125],
        };
        write_spectrum_csv(&path, &spec).unwrap();
        let back = read_spectrum_csv(&path).unwrap();
        assert_eq!(back, spec);
    }

    #[test]
    fn samples_csv_has_depth_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chain.csv");
        let samples = [CurieParams::new(3.0, 1.0, 20.0, 5.0), CurieParams::new(2.5, 2.0, 30.0, 4.0)];
        write_samples_csv(&path, &samples).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "beta,zt,dz,c,curie_depth");
        assert_eq!(lines.len(), 3);
        assert!(lines[2].ends_with(",32.0"));
    }
}
