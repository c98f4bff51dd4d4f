use std::f64::consts::PI;

use faer::prelude::*;

use crate::error::{HydroError, Result};
use crate::hydro_data::{ExcitationTable, DOF_PER_BODY};

/// Monochromatic incident wave.
#[derive(Debug, Clone)]
pub struct RegularWave {
    pub num_bodies: usize,
    pub amplitude: f64, // Wave amplitude (m), half the wave height
    pub omega: f64,     // Angular frequency (rad/s)
    pub phase: f64,     // Phase offset (rad)
    excitation: Vec<ExcitationTable>,
    /// Excitation magnitude at `omega` `[6N]`
    excitation_mag: Col<f64>,
    /// Excitation phase at `omega` `[6N]`
    excitation_phase: Col<f64>,
}

impl RegularWave {
    pub fn new(num_bodies: usize, height: f64, period: f64, phase: f64) -> Result<Self> {
        if !(period > 0.) {
            return Err(HydroError::invalid_option(
                "waves.period",
                format!("regular wave period must be positive, got {}", period),
            ));
        }
        Ok(Self {
            num_bodies,
            amplitude: height / 2.,
            omega: 2. * PI / period,
            phase,
            excitation: vec![],
            excitation_mag: Col::zeros(DOF_PER_BODY * num_bodies),
            excitation_phase: Col::zeros(DOF_PER_BODY * num_bodies),
        })
    }

    pub fn add_hydro_data(&mut self, tables: Vec<ExcitationTable>) {
        self.excitation = tables;
    }

    /// Evaluates the excitation coefficients at the wave frequency.
    pub fn initialize(&mut self) -> Result<()> {
        if self.excitation.len() != self.num_bodies {
            return Err(HydroError::BodyCountMismatch {
                expected: self.num_bodies,
                found: self.excitation.len(),
            });
        }
        for (b, table) in self.excitation.iter().enumerate() {
            for dof in 0..DOF_PER_BODY {
                let (mag, phase) = table.at_frequency(dof, self.omega);
                self.excitation_mag[DOF_PER_BODY * b + dof] = mag;
                self.excitation_phase[DOF_PER_BODY * b + dof] = phase;
            }
        }
        Ok(())
    }

    /// Free surface elevation at the origin
    pub fn elevation_at_time(&self, t: f64) -> f64 {
        self.amplitude * (self.omega * t + self.phase).cos()
    }

    pub fn force_at_time(&self, t: f64) -> Col<f64> {
        let arg = self.omega * t + self.phase;
        Col::from_fn(DOF_PER_BODY * self.num_bodies, |i| {
            self.amplitude * self.excitation_mag[i] * (arg + self.excitation_phase[i]).cos()
        })
    }
}

#[cfg(test)]
mod tests {

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_parameters_from_height_and_period() {
        let wave = RegularWave::new(1, 2.0, 5.0, 0.).unwrap();
        assert_relative_eq!(wave.amplitude, 1.0, epsilon = 1e-15);
        assert_relative_eq!(wave.omega, 2. * PI / 5., epsilon = 1e-15);
    }

    #[test]
    fn test_invalid_period() {
        assert!(RegularWave::new(1, 2.0, 0.0, 0.).is_err());
        assert!(RegularWave::new(1, 2.0, f64::NAN, 0.).is_err());
    }

    #[test]
    fn test_force() {
        let mut wave = RegularWave::new(2, 1.0, 2. * PI, 0.25).unwrap();
        wave.add_hydro_data(vec![
            ExcitationTable::constant([0., 0., 100., 0., 0., 0.], [0., 0., 0.5, 0., 0., 0.]),
            ExcitationTable::constant([10., 0., 0., 0., 0., 0.], [0.; 6]),
        ]);
        wave.initialize().unwrap();

        let t = 1.3;
        let f = wave.force_at_time(t);
        assert_eq!(f.nrows(), 12);
        assert_relative_eq!(f[2], 0.5 * 100. * (t + 0.25 + 0.5).cos(), epsilon = 1e-12);
        assert_relative_eq!(f[6], 0.5 * 10. * (t + 0.25).cos(), epsilon = 1e-12);
        assert_eq!(f[0], 0.);
        assert_relative_eq!(wave.elevation_at_time(t), 0.5 * (t + 0.25).cos(), epsilon = 1e-12);
    }

    #[test]
    fn test_initialize_requires_tables() {
        let mut wave = RegularWave::new(2, 1.0, 4.0, 0.).unwrap();
        wave.add_hydro_data(vec![ExcitationTable::default()]);
        assert!(matches!(
            wave.initialize(),
            Err(HydroError::BodyCountMismatch { expected: 2, found: 1 })
        ));
    }
}
