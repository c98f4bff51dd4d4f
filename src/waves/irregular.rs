use std::f64::consts::PI;
use std::str::FromStr;

use faer::prelude::*;
use itertools::Itertools;
use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::{HydroError, Result};
use crate::hydro_data::{ExcitationTable, DOF_PER_BODY};

/// Wave energy spectrum shape.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Spectrum {
    PiersonMoskowitz,
    Jonswap { gamma: f64 },
}

impl FromStr for Spectrum {
    type Err = HydroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "pierson_moskowitz" | "pm" | "bretschneider" => Ok(Self::PiersonMoskowitz),
            "jonswap" => Ok(Self::Jonswap { gamma: 3.3 }),
            _ => Err(HydroError::UnsupportedSpectrum(s.to_string())),
        }
    }
}

impl Spectrum {
    /// Pierson-Moskowitz spectral density in terms of significant height and peak period.
    pub fn pierson_moskowitz(omega: f64, hs: f64, tp: f64) -> f64 {
        if omega <= 0. {
            return 0.;
        }
        let wp = 2. * PI / tp;
        let r = wp / omega;
        5. / 16. * hs * hs * wp.powi(4) / omega.powi(5) * (-1.25 * r.powi(4)).exp()
    }

    /// Peak enhancement factor applied on top of Pierson-Moskowitz
    fn peak_enhancement(&self, omega: f64, tp: f64) -> f64 {
        match *self {
            Self::PiersonMoskowitz => 1.,
            Self::Jonswap { gamma } => {
                let wp = 2. * PI / tp;
                let sigma = if omega <= wp { 0.07 } else { 0.09 };
                let r = (-(omega - wp).powi(2) / (2. * sigma * sigma * wp * wp)).exp();
                gamma.powf(r)
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct IrregularWaveParams {
    pub num_bodies: usize,
    pub simulation_dt: f64,
    pub simulation_duration: f64,
    /// Startup ramp length (s), disabled when <= 0
    pub ramp_duration: f64,
    /// Significant wave height (m)
    pub wave_height: f64,
    /// Peak period (s)
    pub wave_period: f64,
    pub seed: u64,
    pub spectrum: Spectrum,
    pub n_frequencies: usize,
}

impl Default for IrregularWaveParams {
    fn default() -> Self {
        Self {
            num_bodies: 1,
            simulation_dt: 0.01,
            simulation_duration: 0.,
            ramp_duration: 0.,
            wave_height: 0.,
            wave_period: 1.,
            seed: 1,
            spectrum: Spectrum::PiersonMoskowitz,
            n_frequencies: 200,
        }
    }
}

/// Irregular sea as a superposition of spectrum-sampled regular components.
#[derive(Debug, Clone)]
pub struct IrregularWaves {
    pub params: IrregularWaveParams,
    /// Component angular frequencies `[n_freq]`
    pub omegas: Vec<f64>,
    /// Spectral density at each component `[n_freq]`
    pub spectral_densities: Vec<f64>,
    /// Component amplitudes `[n_freq]`
    pub amplitudes: Vec<f64>,
    /// Random component phases `[n_freq]`
    pub phases: Vec<f64>,
    d_omega: f64,
    eta_time: Vec<f64>,
    eta: Vec<f64>,
    excitation: Vec<ExcitationTable>,
    /// Excitation magnitude `[6N][n_freq]`
    excitation_mag: Mat<f64>,
    /// Excitation phase `[6N][n_freq]`
    excitation_phase: Mat<f64>,
}

impl IrregularWaves {
    pub fn new(params: IrregularWaveParams) -> Result<Self> {
        if !(params.wave_period > 0.) {
            return Err(HydroError::invalid_option(
                "waves.period",
                format!("irregular wave peak period must be positive, got {}", params.wave_period),
            ));
        }
        if !(params.simulation_dt > 0.) {
            return Err(HydroError::invalid_option(
                "timestep",
                format!("must be positive, got {}", params.simulation_dt),
            ));
        }
        if params.n_frequencies == 0 {
            return Err(HydroError::invalid_option("n_frequencies", "must be at least 1"));
        }

        // Discretize the spectrum with midpoints over [0.5, 3] times the peak frequency
        let wp = 2. * PI / params.wave_period;
        let (w_min, w_max) = (0.5 * wp, 3. * wp);
        let n = params.n_frequencies;
        let d_omega = (w_max - w_min) / n as f64;
        let omegas = (0..n)
            .map(|i| w_min + (i as f64 + 0.5) * d_omega)
            .collect_vec();

        let pm = omegas
            .iter()
            .map(|&w| Spectrum::pierson_moskowitz(w, params.wave_height, params.wave_period))
            .collect_vec();
        let shaped = omegas
            .iter()
            .zip(pm.iter())
            .map(|(&w, &s)| s * params.spectrum.peak_enhancement(w, params.wave_period))
            .collect_vec();

        // Rescale so the enhanced spectrum keeps the significant height
        let (m0_pm, m0_shaped) = (pm.iter().sum::<f64>(), shaped.iter().sum::<f64>());
        let scale = if m0_shaped > 0. { m0_pm / m0_shaped } else { 1. };
        let spectral_densities = shaped.iter().map(|s| s * scale).collect_vec();

        let amplitudes = spectral_densities
            .iter()
            .map(|&s| (2. * s * d_omega).sqrt())
            .collect_vec();

        let mut rng = StdRng::seed_from_u64(params.seed);
        let phases = (0..n).map(|_| 2. * PI * rng.gen::<f64>()).collect_vec();

        let n_dofs = DOF_PER_BODY * params.num_bodies;
        let mut waves = Self {
            omegas,
            spectral_densities,
            amplitudes,
            phases,
            d_omega,
            eta_time: vec![],
            eta: vec![],
            excitation: vec![],
            excitation_mag: Mat::zeros(n_dofs, n),
            excitation_phase: Mat::zeros(n_dofs, n),
            params,
        };
        waves.sample_elevation();
        Ok(waves)
    }

    fn sample_elevation(&mut self) {
        let n_steps = (self.params.simulation_duration / self.params.simulation_dt)
            .round()
            .max(0.) as usize;
        self.eta_time = (0..=n_steps)
            .map(|k| k as f64 * self.params.simulation_dt)
            .collect();
        self.eta = self
            .eta_time
            .iter()
            .map(|&t| self.elevation_at_time(t))
            .collect();
    }

    /// Zeroth spectral moment of the discretized spectrum
    pub fn m0(&self) -> f64 {
        self.spectral_densities.iter().sum::<f64>() * self.d_omega
    }

    /// Startup ramp factor, rising from 0 to 1 over the ramp duration
    pub fn ramp(&self, t: f64) -> f64 {
        let tr = self.params.ramp_duration;
        if tr <= 0. || t >= tr {
            1.
        } else if t <= 0. {
            0.
        } else {
            0.5 * (1. - (PI * t / tr).cos())
        }
    }

    pub fn elevation_at_time(&self, t: f64) -> f64 {
        self.ramp(t)
            * self
                .amplitudes
                .iter()
                .zip(self.omegas.iter())
                .zip(self.phases.iter())
                .map(|((&a, &w), &p)| a * (w * t + p).cos())
                .sum::<f64>()
    }

    /// Discretized spectrum as (omega, spectral density)
    pub fn spectrum(&self) -> (&[f64], &[f64]) {
        (&self.omegas, &self.spectral_densities)
    }

    /// Pre-sampled free surface elevation as (time, eta)
    pub fn elevation_series(&self) -> (&[f64], &[f64]) {
        (&self.eta_time, &self.eta)
    }

    pub fn add_hydro_data(&mut self, tables: Vec<ExcitationTable>) {
        self.excitation = tables;
    }

    /// Evaluates the excitation coefficients at every component frequency.
    pub fn initialize(&mut self) -> Result<()> {
        if self.excitation.len() != self.params.num_bodies {
            return Err(HydroError::BodyCountMismatch {
                expected: self.params.num_bodies,
                found: self.excitation.len(),
            });
        }
        for (b, table) in self.excitation.iter().enumerate() {
            for dof in 0..DOF_PER_BODY {
                for (j, &w) in self.omegas.iter().enumerate() {
                    let (mag, phase) = table.at_frequency(dof, w);
                    self.excitation_mag[(DOF_PER_BODY * b + dof, j)] = mag;
                    self.excitation_phase[(DOF_PER_BODY * b + dof, j)] = phase;
                }
            }
        }
        Ok(())
    }

    pub fn force_at_time(&self, t: f64) -> Col<f64> {
        let ramp = self.ramp(t);
        let n_freq = self.omegas.len();
        Col::from_fn(DOF_PER_BODY * self.params.num_bodies, |i| {
            ramp * (0..n_freq)
                .map(|j| {
                    self.amplitudes[j]
                        * self.excitation_mag[(i, j)]
                        * (self.omegas[j] * t + self.phases[j] + self.excitation_phase[(i, j)]).cos()
                })
                .sum::<f64>()
        })
    }
}
