use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{HydroError, Result};
use crate::radiation::kernel::TaperedDirectOptions;
use crate::radiation::RadiationSettings;

/// Reads and validates a hydrodynamics YAML file.
pub fn read_hydro_config<P: AsRef<Path>>(file_path: P) -> Result<HydroConfig> {
    let yaml = std::fs::read_to_string(file_path.as_ref())?;
    parse_hydro_config(&yaml).map_err(|e| match e {
        HydroError::Config(msg) => {
            HydroError::Config(format!("{} ({})", msg, file_path.as_ref().display()))
        }
        e => e,
    })
}

/// Parses and validates hydrodynamics YAML text.
pub fn parse_hydro_config(yaml: &str) -> Result<HydroConfig> {
    let file: HydroFile = serde_yaml::from_str(yaml)?;
    let config = file
        .hydrodynamics
        .ok_or_else(|| HydroError::Config("no 'hydrodynamics:' section found".to_string()))?;

    // Surface malformed period specifications at load time
    config.waves.period_values()?;

    if config.bodies.is_empty() {
        tracing::warn!("no bodies found in hydrodynamics configuration");
    }
    Ok(config)
}

#[derive(Debug, Deserialize)]
struct HydroFile {
    hydrodynamics: Option<HydroConfig>,
}

/// Contents of the `hydrodynamics` section.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct HydroConfig {
    pub bodies: Vec<HydroBody>,
    pub waves: WaveSettings,
    /// `Baseline` or `TaperedDirect`
    pub radiation_convolution_mode: String,
    pub td_smoothing: String,
    pub td_window_length: usize,
    pub td_rirf_end_time: f64,
    pub td_taper_start_percent: f64,
    pub td_taper_end_percent: f64,
    pub td_taper_final_amplitude: f64,
    pub td_export_plot_csv: bool,
}

impl Default for HydroConfig {
    fn default() -> Self {
        let td = TaperedDirectOptions::default();
        Self {
            bodies: vec![],
            waves: WaveSettings::default(),
            radiation_convolution_mode: "Baseline".to_string(),
            td_smoothing: "sg".to_string(),
            td_window_length: td.window_length,
            td_rirf_end_time: td.rirf_end_time,
            td_taper_start_percent: td.taper_start_percent,
            td_taper_end_percent: td.taper_end_percent,
            td_taper_final_amplitude: td.taper_final_amplitude,
            td_export_plot_csv: td.export_csv,
        }
    }
}

impl HydroConfig {
    /// Radiation settings described by this configuration.
    pub fn radiation_settings(&self, diagnostics_dir: Option<PathBuf>) -> Result<RadiationSettings> {
        let settings = RadiationSettings {
            mode: self.radiation_convolution_mode.parse()?,
            options: TaperedDirectOptions {
                smoothing: self.td_smoothing.parse()?,
                window_length: self.td_window_length,
                rirf_end_time: self.td_rirf_end_time,
                taper_start_percent: self.td_taper_start_percent,
                taper_end_percent: self.td_taper_end_percent,
                taper_final_amplitude: self.td_taper_final_amplitude,
                export_csv: self.td_export_plot_csv,
            },
            diagnostics_dir,
        };
        settings.validate()?;
        Ok(settings)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct HydroBody {
    pub name: String,
    #[serde(default)]
    pub h5_file: String,
    #[serde(default = "default_true")]
    pub include_excitation: bool,
    #[serde(default = "default_true")]
    pub include_radiation: bool,
    /// Only `convolution` is supported
    #[serde(default = "default_radiation_calculation")]
    pub radiation_calculation: String,
}

fn default_true() -> bool {
    true
}

fn default_radiation_calculation() -> String {
    "convolution".to_string()
}

//------------------------------------------------------------------------------
// Waves
//------------------------------------------------------------------------------

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct WaveSettings {
    /// `regular`, `irregular`, `no_wave` or `still_ci`
    #[serde(rename = "type")]
    pub wave_type: String,
    pub height: f64,
    pub period: Option<PeriodSpec>,
    /// Heading in degrees, 0 along +x
    pub direction: f64,
    pub phase: f64,
    pub spectrum: String,
    /// Random seed for irregular waves, negative when unset
    pub seed: i64,
}

impl Default for WaveSettings {
    fn default() -> Self {
        Self {
            wave_type: "regular".to_string(),
            height: 0.,
            period: None,
            direction: 0.,
            phase: 0.,
            spectrum: "pierson_moskowitz".to_string(),
            seed: -1,
        }
    }
}

const DEFAULT_SEED: u64 = 1;

impl WaveSettings {
    /// Expanded list of wave periods, empty if no period was given.
    pub fn period_values(&self) -> Result<Vec<f64>> {
        match &self.period {
            None => Ok(vec![]),
            Some(PeriodSpec::Scalar(p)) if *p > 0. => Ok(vec![*p]),
            Some(PeriodSpec::Scalar(_)) => Ok(vec![]),
            Some(PeriodSpec::Forms(forms)) => forms.expand(),
        }
    }

    /// Period used by a single simulation, the first of [`Self::period_values`].
    pub fn effective_period(&self) -> Result<f64> {
        self.period_values()?
            .first()
            .copied()
            .ok_or_else(|| period_error("invalid or empty specification"))
    }

    pub fn seed_or_default(&self) -> u64 {
        u64::try_from(self.seed).unwrap_or(DEFAULT_SEED)
    }
}

/// Wave period, either a single value or a sweep.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum PeriodSpec {
    Scalar(f64),
    Forms(PeriodForms),
}

/// Period sweep; exactly one form must be given.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct PeriodForms {
    pub values: Option<Vec<f64>>,
    pub linspace: Option<Linspace>,
    pub range: Option<PeriodRange>,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Linspace {
    pub start: f64,
    pub stop: f64,
    pub num: usize,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct PeriodRange {
    pub start: f64,
    pub stop: f64,
    pub step: f64,
    #[serde(default = "default_true")]
    pub inclusive: bool,
}

fn period_error(reason: &str) -> HydroError {
    HydroError::invalid_option("waves.period", reason)
}

impl PeriodForms {
    pub fn expand(&self) -> Result<Vec<f64>> {
        let n_forms = [
            self.values.is_some(),
            self.linspace.is_some(),
            self.range.is_some(),
        ]
        .iter()
        .filter(|&&f| f)
        .count();
        if n_forms > 1 {
            return Err(period_error("multiple forms specified"));
        }

        let values = match (&self.values, &self.linspace, &self.range) {
            (Some(values), _, _) => values.clone(),
            (_, Some(lin), _) => lin.expand()?,
            (_, _, Some(range)) => range.expand()?,
            _ => vec![],
        };
        if values.is_empty() {
            return Err(period_error("invalid or empty specification"));
        }
        Ok(values)
    }
}

impl Linspace {
    pub fn expand(&self) -> Result<Vec<f64>> {
        if self.num < 2 {
            return Err(period_error("invalid linspace (require start, stop, num>=2)"));
        }
        if self.num == 2 {
            return Ok(vec![self.start, self.stop]);
        }
        let step = (self.stop - self.start) / (self.num - 1) as f64;
        Ok((0..self.num)
            .map(|k| self.start + step * k as f64)
            .collect())
    }
}

impl PeriodRange {
    /// Upper bound on the number of generated periods
    pub const MAX_VALUES: usize = 1_000_000;

    pub fn expand(&self) -> Result<Vec<f64>> {
        const EPS: f64 = 1e-9;
        if !(self.step > 0.)
            || !self.start.is_finite()
            || !self.stop.is_finite()
            || self.stop < self.start
        {
            return Err(period_error("invalid range (require start<=stop, step>0)"));
        }
        let span = (self.stop - self.start) / self.step;
        if span >= Self::MAX_VALUES as f64 {
            return Err(period_error("range produces too many values"));
        }
        let mut values = (0..=span.floor() as usize)
            .map(|k| self.start + self.step * k as f64)
            .filter(|&t| t < self.stop - EPS)
            .collect::<Vec<_>>();
        if self.inclusive {
            match values.last_mut() {
                Some(last) if (*last - self.stop).abs() <= EPS => *last = self.stop,
                _ => values.push(self.stop),
            }
        }
        if values.is_empty() {
            return Err(period_error("range produced no values"));
        }
        Ok(values)
    }
}
