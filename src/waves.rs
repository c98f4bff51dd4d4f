pub mod irregular;
pub mod regular;

use faer::prelude::*;

use crate::config::WaveSettings;
use crate::error::{HydroError, Result};
use crate::hydro_data::{ExcitationTable, DOF_PER_BODY};

pub use irregular::{IrregularWaveParams, IrregularWaves, Spectrum};
pub use regular::RegularWave;

/// Still water, no excitation.
#[derive(Debug, Clone)]
pub struct NoWave {
    pub num_bodies: usize,
}

impl NoWave {
    pub fn new(num_bodies: usize) -> Self {
        Self { num_bodies }
    }

    pub fn force_at_time(&self, _t: f64) -> Col<f64> {
        Col::zeros(DOF_PER_BODY * self.num_bodies)
    }
}

/// Incident wave model producing excitation forces on all bodies.
#[derive(Debug, Clone)]
pub enum WaveModel {
    NoWave(NoWave),
    Regular(RegularWave),
    Irregular(IrregularWaves),
}

impl WaveModel {
    /// Builds a wave model from configuration.
    ///
    /// `timestep`, `duration` and `ramp` are only used by irregular waves.
    pub fn from_settings(
        settings: &WaveSettings,
        num_bodies: usize,
        timestep: f64,
        duration: f64,
        ramp: f64,
    ) -> Result<Self> {
        match settings.wave_type.as_str() {
            "regular" => {
                let period = settings.effective_period()?;
                let wave = RegularWave::new(num_bodies, settings.height, period, settings.phase)?;
                tracing::debug!(
                    "Attached wave model: RegularWave, H={}m, T={}s",
                    settings.height,
                    period
                );
                Ok(Self::Regular(wave))
            }
            "irregular" => {
                let period = settings.effective_period()?;
                let params = IrregularWaveParams {
                    num_bodies,
                    simulation_dt: timestep,
                    simulation_duration: duration,
                    ramp_duration: ramp,
                    wave_height: settings.height,
                    wave_period: period,
                    seed: settings.seed_or_default(),
                    spectrum: settings.spectrum.parse()?,
                    ..Default::default()
                };
                let wave = IrregularWaves::new(params)?;
                tracing::debug!(
                    "Attached wave model: IrregularWaves, H={}m, T={}s",
                    settings.height,
                    period
                );
                Ok(Self::Irregular(wave))
            }
            "no_wave" | "still_ci" => {
                tracing::debug!("Attached wave model: NoWave (still water)");
                Ok(Self::NoWave(NoWave::new(num_bodies)))
            }
            other => Err(HydroError::UnsupportedWaveType(other.to_string())),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::NoWave(_) => "NoWave",
            Self::Regular(_) => "RegularWave",
            Self::Irregular(_) => "IrregularWaves",
        }
    }

    pub fn num_bodies(&self) -> usize {
        match self {
            Self::NoWave(w) => w.num_bodies,
            Self::Regular(w) => w.num_bodies,
            Self::Irregular(w) => w.params.num_bodies,
        }
    }

    /// Hands the per-body excitation tables to the model.
    pub fn add_hydro_data(&mut self, tables: Vec<ExcitationTable>) {
        match self {
            Self::NoWave(_) => (),
            Self::Regular(w) => w.add_hydro_data(tables),
            Self::Irregular(w) => w.add_hydro_data(tables),
        }
    }

    pub fn initialize(&mut self) -> Result<()> {
        match self {
            Self::NoWave(_) => Ok(()),
            Self::Regular(w) => w.initialize(),
            Self::Irregular(w) => w.initialize(),
        }
    }

    /// Excitation force on all bodies at time `t` `[6N]`
    pub fn force_at_time(&self, t: f64) -> Col<f64> {
        match self {
            Self::NoWave(w) => w.force_at_time(t),
            Self::Regular(w) => w.force_at_time(t),
            Self::Irregular(w) => w.force_at_time(t),
        }
    }
}

#[cfg(test)]
mod tests {

    use std::f64::consts::PI;

    use approx::assert_relative_eq;

    use super::*;
    use crate::config::PeriodSpec;

    fn create_settings(wave_type: &str) -> WaveSettings {
        WaveSettings {
            wave_type: wave_type.to_string(),
            height: 2.,
            period: Some(PeriodSpec::Scalar(5.)),
            ..Default::default()
        }
    }

    #[test]
    fn test_no_wave_is_zero() {
        let w = NoWave::new(3);
        let f = w.force_at_time(12.);
        assert_eq!(f.nrows(), 18);
        f.iter().for_each(|&v| assert_eq!(v, 0.));
    }

    #[test]
    fn test_factory_regular() {
        let w = WaveModel::from_settings(&create_settings("regular"), 1, 0.01, 10., 0.).unwrap();
        match &w {
            WaveModel::Regular(r) => {
                assert_relative_eq!(r.amplitude, 1.0, epsilon = 1e-15);
                assert_relative_eq!(r.omega, 2. * PI / 5., epsilon = 1e-15);
            }
            _ => panic!("expected regular wave, got {}", w.name()),
        }
    }

    #[test]
    fn test_factory_irregular_and_still() {
        let w = WaveModel::from_settings(&create_settings("irregular"), 2, 0.1, 5., 1.).unwrap();
        assert_eq!(w.name(), "IrregularWaves");
        assert_eq!(w.num_bodies(), 2);

        for typ in ["no_wave", "still_ci"] {
            let w = WaveModel::from_settings(&create_settings(typ), 1, 0.1, 5., 1.).unwrap();
            assert_eq!(w.name(), "NoWave");
        }
    }

    #[test]
    fn test_factory_unsupported_type() {
        let err = WaveModel::from_settings(&create_settings("tsunami"), 1, 0.1, 5., 0.).unwrap_err();
        assert!(matches!(err, HydroError::UnsupportedWaveType(_)));
        assert_eq!(err.to_string(), "Unsupported wave type: tsunami");
    }
}
