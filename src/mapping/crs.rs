//! Coordinate reference systems and point transforms.
//!
//! Supported systems:
//!
//! - WGS 84 geographic (EPSG:4326), longitude/latitude in degrees
//! - Web Mercator (EPSG:3857), spherical, metres
//! - UTM zones on the WGS 84 ellipsoid (EPSG:326xx north, 327xx south)
//!
//! Every transform goes through WGS 84.

use std::f64::consts::PI;
use std::fmt;

use crate::domain::Extent;
use crate::error::AppError;

/// Spherical radius used by Web Mercator.
const EARTH_RADIUS: f64 = 6_378_137.0;
/// Web Mercator is undefined at the poles.
const MERCATOR_MAX_LAT: f64 = 85.05;

const WGS84_A: f64 = 6_378_137.0;
const WGS84_F: f64 = 1.0 / 298.257_223_563;
const UTM_K0: f64 = 0.9996;
const UTM_FALSE_EASTING: f64 = 500_000.0;
const UTM_FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Crs {
    Wgs84,
    WebMercator,
    Utm { zone: u8, north: bool },
}

impl Crs {
    pub fn from_epsg(code: u32) -> Result<Self, AppError> {
        match code {
            4326 => Ok(Crs::Wgs84),
            3857 => Ok(Crs::WebMercator),
            32601..=32660 => Ok(Crs::Utm {
                zone: (code - 32600) as u8,
                north: true,
            }),
            32701..=32760 => Ok(Crs::Utm {
                zone: (code - 32700) as u8,
                north: false,
            }),
            _ => Err(AppError::input(format!(
                "Unsupported CRS EPSG:{code} (supported: 4326, 3857, 326xx, 327xx)."
            ))),
        }
    }

    /// Parse `"EPSG:4326"` or a bare code.
    pub fn parse(s: &str) -> Result<Self, AppError> {
        let t = s.trim().to_ascii_uppercase();
        let code = t.strip_prefix("EPSG:").unwrap_or(&t);
        let code: u32 = code
            .parse()
            .map_err(|_| AppError::input(format!("Invalid CRS '{s}' (expected e.g. EPSG:4326).")))?;
        Self::from_epsg(code)
    }

    pub fn epsg(&self) -> u32 {
        match self {
            Crs::Wgs84 => 4326,
            Crs::WebMercator => 3857,
            Crs::Utm { zone, north: true } => 32600 + *zone as u32,
            Crs::Utm { zone, north: false } => 32700 + *zone as u32,
        }
    }

    fn inverse(self, x: f64, y: f64) -> (f64, f64) {
        match self {
            Crs::Wgs84 => (x, y),
            Crs::WebMercator => mercator_inverse(x, y),
            Crs::Utm { zone, north } => utm_inverse(x, y, zone, north),
        }
    }

    fn forward(self, lon: f64, lat: f64) -> (f64, f64) {
        match self {
            Crs::Wgs84 => (lon, lat),
            Crs::WebMercator => mercator_forward(lon, lat),
            Crs::Utm { zone, north } => utm_forward(lon, lat, zone, north),
        }
    }
}

impl fmt::Display for Crs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EPSG:{}", self.epsg())
    }
}

/// Transform coordinate arrays from `from` to `to`.
pub fn transform_coordinates(xs: &[f64], ys: &[f64], from: Crs, to: Crs) -> Result<(Vec<f64>, Vec<f64>), AppError> {
    if xs.len() != ys.len() {
        return Err(AppError::input(format!(
            "Coordinate arrays differ in length: {} x values, {} y values.",
            xs.len(),
            ys.len()
        )));
    }
    if from == to {
        return Ok((xs.to_vec(), ys.to_vec()));
    }

    Ok(xs
        .iter()
        .zip(ys.iter())
        .map(|(&x, &y)| {
            let (lon, lat) = from.inverse(x, y);
            to.forward(lon, lat)
        })
        .unzip())
}

/// Bounding extent of `extent`'s four corners after transformation.
pub fn convert_extent(extent: &Extent, from: Crs, to: Crs) -> Result<Extent, AppError> {
    let xs = [extent.xmin, extent.xmax, extent.xmin, extent.xmax];
    let ys = [extent.ymin, extent.ymin, extent.ymax, extent.ymax];
    let (tx, ty) = transform_coordinates(&xs, &ys, from, to)?;

    let fold = |v: &[f64]| {
        v.iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| (lo.min(x), hi.max(x)))
    };
    let (xmin, xmax) = fold(&tx);
    let (ymin, ymax) = fold(&ty);
    Extent::new(xmin, xmax, ymin, ymax)
}

fn mercator_forward(lon: f64, lat: f64) -> (f64, f64) {
    let lat = lat.clamp(-MERCATOR_MAX_LAT, MERCATOR_MAX_LAT);
    let x = lon * EARTH_RADIUS * PI / 180.0;
    let y = ((90.0 + lat) * PI / 360.0).tan().ln() * EARTH_RADIUS;
    (x, y)
}

fn mercator_inverse(x: f64, y: f64) -> (f64, f64) {
    let lon = x * 180.0 / (EARTH_RADIUS * PI);
    let lat = 180.0 / PI * (2.0 * (y / EARTH_RADIUS).exp().atan() - PI / 2.0);
    (lon, lat)
}

fn central_meridian(zone: u8) -> f64 {
    (zone as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

/// Transverse Mercator series (Snyder 1987, eqs. 8-9 to 8-15).
fn utm_forward(lon: f64, lat: f64, zone: u8, north: bool) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);

    let phi = lat.to_radians();
    let dlam = (lon - central_meridian(zone)).to_radians();
    let (sin_phi, cos_phi) = phi.sin_cos();
    let tan_phi = phi.tan();

    let n = WGS84_A / (1.0 - e2 * sin_phi * sin_phi).sqrt();
    let t = tan_phi * tan_phi;
    let c = ep2 * cos_phi * cos_phi;
    let a = cos_phi * dlam;
    let m = meridian_arc(phi, e2);

    let x = UTM_K0
        * n
        * (a + (1.0 - t + c) * a.powi(3) / 6.0
            + (5.0 - 18.0 * t + t * t + 72.0 * c - 58.0 * ep2) * a.powi(5) / 120.0)
        + UTM_FALSE_EASTING;
    let mut y = UTM_K0
        * (m + n
            * tan_phi
            * (a * a / 2.0
                + (5.0 - t + 9.0 * c + 4.0 * c * c) * a.powi(4) / 24.0
                + (61.0 - 58.0 * t + t * t + 600.0 * c - 330.0 * ep2) * a.powi(6) / 720.0));
    if !north {
        y += UTM_FALSE_NORTHING_SOUTH;
    }
    (x, y)
}

fn utm_inverse(x: f64, y: f64, zone: u8, north: bool) -> (f64, f64) {
    let e2 = WGS84_F * (2.0 - WGS84_F);
    let ep2 = e2 / (1.0 - e2);
    let e4 = e2 * e2;
    let e6 = e4 * e2;

    let y = if north { y } else { y - UTM_FALSE_NORTHING_SOUTH };
    let m = y / UTM_K0;
    let mu = m / (WGS84_A * (1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0));

    let sq = (1.0 - e2).sqrt();
    let e1 = (1.0 - sq) / (1.0 + sq);
    let phi1 = mu
        + (3.0 * e1 / 2.0 - 27.0 * e1.powi(3) / 32.0) * (2.0 * mu).sin()
        + (21.0 * e1 * e1 / 16.0 - 55.0 * e1.powi(4) / 32.0) * (4.0 * mu).sin()
        + (151.0 * e1.powi(3) / 96.0) * (6.0 * mu).sin()
        + (1097.0 * e1.powi(4) / 512.0) * (8.0 * mu).sin();

    let (sin1, cos1) = phi1.sin_cos();
    let tan1 = phi1.tan();
    let c1 = ep2 * cos1 * cos1;
    let t1 = tan1 * tan1;
    let w = 1.0 - e2 * sin1 * sin1;
    let n1 = WGS84_A / w.sqrt();
    let r1 = WGS84_A * (1.0 - e2) / w.powf(1.5);
    let d = (x - UTM_FALSE_EASTING) / (n1 * UTM_K0);

    let phi = phi1
        - (n1 * tan1 / r1)
            * (d * d / 2.0
                - (5.0 + 3.0 * t1 + 10.0 * c1 - 4.0 * c1 * c1 - 9.0 * ep2) * d.powi(4) / 24.0
                + (61.0 + 90.0 * t1 + 298.0 * c1 + 45.0 * t1 * t1 - 252.0 * ep2 - 3.0 * c1 * c1) * d.powi(6)
                    / 720.0);
    let lam = (d - (1.0 + 2.0 * t1 + c1) * d.powi(3) / 6.0
        + (5.0 - 2.0 * c1 + 28.0 * t1 - 3.0 * c1 * c1 + 8.0 * ep2 + 24.0 * t1 * t1) * d.powi(5) / 120.0)
        / cos1;

    (central_meridian(zone) + lam.to_degrees(), phi.to_degrees())
}

fn meridian_arc(phi: f64, e2: f64) -> f64 {
    let e4 = e2 * e2;
    let e6 = e4 * e2;
    WGS84_A
        * ((1.0 - e2 / 4.0 - 3.0 * e4 / 64.0 - 5.0 * e6 / 256.0) * phi
            - (3.0 * e2 / 8.0 + 3.0 * e4 / 32.0 + 45.0 * e6 / 1024.0) * (2.0 * phi).sin()
            + (15.0 * e4 / 256.0 + 45.0 * e6 / 1024.0) * (4.0 * phi).sin()
            - (35.0 * e6 / 3072.0) * (6.0 * phi).sin())
}
