//! TOML run configuration.
//!
//! A config file can set starting parameters, priors, bounds and spectrum
//! options. Every section and key is optional; CLI flags applied afterwards
//! override what the file sets.
//!
//! ```toml
//! [initial]
//! beta = 3.0
//! zt = 1.0
//!
//! [priors]
//! beta = { mu = 3.0, sigma = 0.5 }
//!
//! [bounds]
//! dz = [1.0, 80.0]
//!
//! [spectrum]
//! taper = "hann"
//! detrend = "linear"
//! ```

use std::path::Path;

use log::debug;
use serde::Deserialize;

use crate::domain::{CurieParams, Detrend, Param, ParamBounds, Prior, Priors, SpectrumOptions, TaperKind};
use crate::error::AppError;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    #[serde(default)]
    pub initial: ParamSection<f64>,
    #[serde(default)]
    pub priors: ParamSection<PriorEntry>,
    #[serde(default)]
    pub bounds: ParamSection<[f64; 2]>,
    #[serde(default)]
    pub spectrum: SpectrumSection,
}

/// One optional value per Bouligand parameter.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ParamSection<T> {
    pub beta: Option<T>,
    pub zt: Option<T>,
    pub dz: Option<T>,
    #[serde(alias = "C")]
    pub c: Option<T>,
}

impl<T> Default for ParamSection<T> {
    fn default() -> Self {
        Self {
            beta: None,
            zt: None,
            dz: None,
            c: None,
        }
    }
}

impl<T: Copy> ParamSection<T> {
    fn entries(&self) -> impl Iterator<Item = (Param, T)> + '_ {
        [
            (Param::Beta, self.beta),
            (Param::Zt, self.zt),
            (Param::Dz, self.dz),
            (Param::C, self.c),
        ]
        .into_iter()
        .filter_map(|(p, v)| v.map(|v| (p, v)))
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PriorEntry {
    pub mu: f64,
    pub sigma: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpectrumSection {
    pub taper: Option<TaperKind>,
    pub detrend: Option<Detrend>,
    pub power: Option<f64>,
    pub scale: Option<f64>,
}

/// Load and parse a TOML config file.
pub fn load_config(path: &Path) -> Result<FileConfig, AppError> {
    let text = std::fs::read_to_string(path)
        .map_err(|e| AppError::input(format!("Failed to read config '{}': {e}", path.display())))?;
    parse_config(&text).map_err(|e| AppError::input(format!("{}: {}", path.display(), e.message())))
}

pub fn parse_config(text: &str) -> Result<FileConfig, AppError> {
    toml::from_str(text).map_err(|e| AppError::input(format!("Invalid config: {e}")))
}

impl FileConfig {
    /// Layer this file's settings onto the given run settings.
    pub fn apply(
        &self,
        initial: &mut CurieParams,
        priors: &mut Priors,
        bounds: &mut ParamBounds,
        spectrum: &mut SpectrumOptions,
    ) -> Result<(), AppError> {
        let mut x = initial.to_array();
        for (param, v) in self.initial.entries() {
            x[param.index()] = v;
        }
        *initial = CurieParams::from_slice(&x);

        for (param, entry) in self.priors.entries() {
            priors.set(param, Some(Prior::new(entry.mu, entry.sigma)?));
        }
        for (param, [lo, hi]) in self.bounds.entries() {
            bounds.set(param, lo, hi)?;
        }

        if let Some(t) = self.spectrum.taper {
            spectrum.taper = t;
        }
        if let Some(d) = self.spectrum.detrend {
            spectrum.detrend = d;
        }
        if let Some(p) = self.spectrum.power {
            spectrum.power = p;
        }
        if let Some(s) = self.spectrum.scale {
            spectrum.scale = s;
        }

        debug!("config applied: initial={initial:?}, {} priors", priors.iter().count());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn applies_every_section() {
        let cfg = parse_config(
            r#"
            [initial]
            dz = 30.0

            [priors]
            beta = { mu = 3.0, sigma = 0.5 }
            C = { mu = 4.0, sigma = 2.0 }

            [bounds]
            zt = [0.5, 2.0]

            [spectrum]
            taper = "blackman"
            scale = 1.0
            "#,
        )
        .unwrap();

        let mut initial = CurieParams::default();
        let mut priors = Priors::default();
        let mut bounds = ParamBounds::default();
        let mut spectrum = SpectrumOptions::default();
        cfg.apply(&mut initial, &mut priors, &mut bounds, &mut spectrum).unwrap();

        assert_eq!(initial.dz, 30.0);
        assert_eq!(initial.beta, CurieParams::default().beta);
        assert_eq!(priors.get(Param::Beta), Some(Prior { mu: 3.0, sigma: 0.5 }));
        assert_eq!(priors.get(Param::C), Some(Prior { mu: 4.0, sigma: 2.0 }));
        assert!(priors.get(Param::Zt).is_none());
        assert_eq!(bounds.lower[Param::Zt.index()], 0.5);
        assert_eq!(bounds.upper[Param::Zt.index()], 2.0);
        assert_eq!(spectrum.taper, TaperKind::Blackman);
        assert_eq!(spectrum.detrend, Detrend::Linear);
        assert_eq!(spectrum.scale, 1.0);
    }

    #[test]
    fn empty_config_changes_nothing() {
        let cfg = parse_config("").unwrap();
        let mut initial = CurieParams::default();
        let mut priors = Priors::default();
        let mut bounds = ParamBounds::default();
        let mut spectrum = SpectrumOptions::default();
        cfg.apply(&mut initial, &mut priors, &mut bounds, &mut spectrum).unwrap();
        assert_eq!(initial, CurieParams::default());
        assert!(priors.is_empty());
        assert_eq!(bounds, ParamBounds::default());
    }

    #[test]
    fn rejects_unknown_keys_and_bad_priors() {
        assert!(parse_config("[priors]\ngamma = { mu = 1.0, sigma = 1.0 }\n").is_err());

        let cfg = parse_config("[priors]\nzt = { mu = 1.0, sigma = 0.0 }\n").unwrap();
        let err = cfg
            .apply(
                &mut CurieParams::default(),
                &mut Priors::default(),
                &mut ParamBounds::default(),
                &mut SpectrumOptions::default(),
            )
            .unwrap_err();
        assert_eq!(err.exit_code(), crate::error::EXIT_INPUT);
    }
}
