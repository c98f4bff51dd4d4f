pub mod history;
pub mod kernel;

use std::path::PathBuf;
use std::str::FromStr;

use faer::prelude::*;

use crate::error::{HydroError, Result};
use crate::hydro_data::{validate_rirf_time, HydroData, DOF_PER_BODY};
use crate::quadrature::Quadrature;
use crate::system::HostSystem;

use history::{HistoryBuffer, HistoryRecord};
use kernel::{RirfKernel, TaperedDirectOptions};

/// How the impulse response kernel is prepared before convolution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RadiationConvolutionMode {
    /// Kernel used exactly as provided
    #[default]
    Baseline,
    /// Kernel truncated, smoothed and tapered once before first use
    TaperedDirect,
}

impl FromStr for RadiationConvolutionMode {
    type Err = HydroError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "Baseline" | "baseline" => Ok(Self::Baseline),
            "TaperedDirect" | "tapered_direct" => Ok(Self::TaperedDirect),
            _ => Err(HydroError::invalid_option(
                "radiation_convolution_mode",
                format!("expected Baseline or TaperedDirect, got '{}'", s),
            )),
        }
    }
}

/// Radiation convolution configuration, fixed at construction.
#[derive(Clone, Debug, Default)]
pub struct RadiationSettings {
    pub mode: RadiationConvolutionMode,
    pub options: TaperedDirectOptions,
    /// Destination of the kernel CSV export
    pub diagnostics_dir: Option<PathBuf>,
}

impl RadiationSettings {
    pub fn validate(&self) -> Result<()> {
        if self.mode == RadiationConvolutionMode::TaperedDirect {
            self.options.validate()?;
            if self.options.export_csv && self.diagnostics_dir.is_none() {
                return Err(HydroError::invalid_option(
                    "td_export_plot_csv",
                    "CSV export requires a diagnostics directory",
                ));
            }
        }
        Ok(())
    }
}

/// Lazily processed kernel used in tapered-direct mode.
#[derive(Debug)]
pub enum KernelState {
    NotStarted,
    Ready(RirfKernel),
}

//------------------------------------------------------------------------------
// Radiation damping
//------------------------------------------------------------------------------

/// Radiation damping by convolution of the velocity history with the
/// impulse response function.
pub struct RadiationDamping {
    settings: RadiationSettings,
    n_bodies: usize,
    /// Trapezoid weight of each impulse response sample
    widths: Vec<f64>,
    rirf_time: Vec<f64>,
    history: HistoryBuffer,
    kernel: KernelState,
    /// Bodies taking part in the convolution, as rows and as columns
    active: Vec<bool>,
    /// Interpolated velocities at the current query time `[n_bodies][6]`
    vel_interp: Vec<[f64; 6]>,
}

impl RadiationDamping {
    pub fn new<D: HydroData>(data: &D, settings: RadiationSettings) -> Result<Self> {
        settings.validate()?;
        let rirf_time = data.rirf_time_vector().to_vec();
        validate_rirf_time(&rirf_time)?;
        Ok(Self {
            settings,
            n_bodies: data.n_bodies(),
            widths: Quadrature::trapezoidal(&rirf_time).weights,
            rirf_time,
            history: HistoryBuffer::new(),
            kernel: KernelState::NotStarted,
            active: (0..data.n_bodies()).map(|b| data.include_radiation(b)).collect(),
            vel_interp: vec![],
        })
    }

    pub fn mode(&self) -> RadiationConvolutionMode {
        self.settings.mode
    }

    pub fn widths(&self) -> &[f64] {
        &self.widths
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    /// Longest lag of the impulse response
    pub fn rirf_max_time(&self) -> f64 {
        self.rirf_time.last().copied().unwrap_or(0.)
    }

    /// Processed kernel, once tapered-direct preprocessing has run.
    pub fn processed_kernel(&self) -> Option<&RirfKernel> {
        match &self.kernel {
            KernelState::Ready(k) => Some(k),
            KernelState::NotStarted => None,
        }
    }

    /// Builds the processed kernel on first call; later calls do nothing.
    ///
    /// Options are read once, changing them afterwards has no effect.
    pub fn ensure_processed_rirf<D: HydroData>(&mut self, data: &D) {
        if let KernelState::Ready(_) = self.kernel {
            return;
        }
        let raw = RirfKernel::from_data(data);
        let processed = raw.tapered_direct(&self.settings.options);
        tracing::debug!(
            "processed RIRF kernel ({:?} smoothing, window {}, end time {}, taper {}..{} to {})",
            self.settings.options.smoothing,
            self.settings.options.window_length,
            self.settings.options.rirf_end_time,
            self.settings.options.taper_start_percent,
            self.settings.options.taper_end_percent,
            self.settings.options.taper_final_amplitude,
        );

        if self.settings.options.export_csv {
            if let Some(dir) = &self.settings.diagnostics_dir {
                for b in 0..raw.bodies.len() {
                    let path = dir.join(format!("rirf_body{}.csv", b));
                    if let Err(e) = std::fs::create_dir_all(dir)
                        .map_err(HydroError::from)
                        .and_then(|_| raw.write_comparison_csv(&processed, b, &path))
                    {
                        tracing::warn!("failed to export RIRF diagnostics to {}: {}", path.display(), e);
                    }
                }
            }
        }
        self.kernel = KernelState::Ready(processed);
    }

    /// Impulse response value for 6N row `row`, column `col` and `step`.
    pub fn rirf_value<D: HydroData>(&self, data: &D, row: usize, col: usize, step: usize) -> Result<f64> {
        let n_dofs = DOF_PER_BODY * self.n_bodies;
        if row >= n_dofs {
            return Err(HydroError::out_of_range("rirf row", row, n_dofs));
        }
        if col >= n_dofs {
            return Err(HydroError::out_of_range("rirf col", col, n_dofs));
        }
        if step >= self.rirf_time.len() {
            return Err(HydroError::out_of_range("rirf step", step, self.rirf_time.len()));
        }
        let (body, row_dof) = (row / DOF_PER_BODY, row % DOF_PER_BODY);
        Ok(match (&self.kernel, self.settings.mode) {
            (KernelState::Ready(k), RadiationConvolutionMode::TaperedDirect) => {
                k.value(body, row_dof, col, step)
            }
            _ => data.rirf_val(body, row_dof, col, step),
        })
    }

    /// Records the current velocities and convolves the history with the
    /// impulse response, writing the damping force into `force` (length 6N).
    ///
    /// Must be called once per distinct simulation time.
    pub fn compute<D: HydroData>(
        &mut self,
        host: &dyn HostSystem,
        body_ids: &[usize],
        data: &D,
        mut force: ColMut<f64>,
    ) -> Result<()> {
        if !self.active.iter().any(|&a| a) {
            force.fill(0.);
            return Ok(());
        }

        let time = host.time();
        let velocities = body_ids
            .iter()
            .map(|&id| {
                host.body_state(id)
                    .map(|s| s.velocity())
                    .ok_or(HydroError::MissingBody(id))
            })
            .collect::<Result<Vec<_>>>()?;
        self.history.push(HistoryRecord { time, velocities })?;
        if let Err(err) = self.convolve(time, data, force) {
            // Drop the sample so the step can be retried
            self.history.pop_newest();
            return Err(err);
        }
        self.history.prune(time - self.rirf_max_time());
        Ok(())
    }

    /// Sums the impulse response against the velocity history at `time`.
    fn convolve<D: HydroData>(&mut self, time: f64, data: &D, mut force: ColMut<f64>) -> Result<()> {
        force.fill(0.);
        if self.history.len() < 2 {
            return Ok(());
        }

        if self.settings.mode == RadiationConvolutionMode::TaperedDirect {
            self.ensure_processed_rirf(data);
        }

        let mut vel_interp = std::mem::take(&mut self.vel_interp);
        let res = self.accumulate(time, data, &mut vel_interp, force);
        self.vel_interp = vel_interp;
        res
    }

    fn accumulate<D: HydroData>(
        &self,
        time: f64,
        data: &D,
        vel_interp: &mut Vec<[f64; 6]>,
        mut force: ColMut<f64>,
    ) -> Result<()> {
        let n_dofs = DOF_PER_BODY * self.n_bodies;
        let n_hist = self.history.len();
        let mut idx = 0;

        for (step, (&lag, &width)) in self.rirf_time.iter().zip(self.widths.iter()).enumerate() {
            let query = time - lag;
            while idx + 1 < n_hist && self.history.time(idx + 1) > query {
                idx += 1;
            }
            // Out of history, remaining lags are not covered yet
            if idx + 1 >= n_hist {
                break;
            }
            self.history.interpolate_into(idx, query, vel_interp)?;

            for col in 0..n_dofs {
                let v = vel_interp[col / DOF_PER_BODY][col % DOF_PER_BODY];
                if v == 0. || !self.active[col / DOF_PER_BODY] {
                    continue;
                }
                for row in (0..n_dofs).filter(|row| self.active[row / DOF_PER_BODY]) {
                    force[row] += self.rirf_value(data, row, col, step)? * v * width;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use approx::assert_relative_eq;
    use itertools::Itertools;

    use super::*;
    use crate::hydro_data::HydroDatabase;
    use crate::system::System;

    fn create_data(rirf_time: &[f64]) -> HydroDatabase {
        let mut db = HydroDatabase::new(1000., 1, rirf_time);
        for (s, v) in [2., 1., 0.5].iter().take(rirf_time.len()).enumerate() {
            db.set_rirf(0, 2, 2, s, *v).unwrap();
        }
        db
    }

    fn create_system() -> (System, usize) {
        let mut system = System::new();
        let id = system.add_body("float").build();
        (system, id)
    }

    fn set_heave_velocity(system: &mut System, id: usize, time: f64, v: f64) {
        system.set_time(time);
        system.body_mut(id).unwrap().state.linear_velocity = [0., 0., v];
    }

    #[test]
    fn test_mode_from_str() {
        assert_eq!(
            "TaperedDirect".parse::<RadiationConvolutionMode>().unwrap(),
            RadiationConvolutionMode::TaperedDirect
        );
        assert!("StateSpace".parse::<RadiationConvolutionMode>().is_err());
    }

    #[test]
    fn test_export_requires_directory() {
        let settings = RadiationSettings {
            mode: RadiationConvolutionMode::TaperedDirect,
            options: TaperedDirectOptions {
                export_csv: true,
                ..Default::default()
            },
            diagnostics_dir: None,
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_widths_sum_to_span() {
        let data = create_data(&[0., 0.2, 0.3, 0.7, 1.6]);
        let rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        assert_relative_eq!(rd.widths().iter().sum::<f64>(), 1.6, epsilon = 1e-14);
    }

    #[test]
    fn test_cold_start_is_zero() {
        let data = create_data(&[0., 0.5, 1.0]);
        let mut rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        let (mut system, id) = create_system();
        set_heave_velocity(&mut system, id, 0., 3.);

        let mut f = Col::<f64>::from_fn(6, |_| 7.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();
        f.iter().for_each(|&v| assert_eq!(v, 0.));
        assert_eq!(rd.history().len(), 1);
    }

    #[test]
    fn test_two_step_convolution() {
        let data = create_data(&[0., 0.5, 1.0]);
        let mut rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        let (mut system, id) = create_system();
        let mut f = Col::<f64>::zeros(6);

        set_heave_velocity(&mut system, id, 0., 1.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();
        set_heave_velocity(&mut system, id, 0.5, 3.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();

        // K(0) v(0.5) w0 + K(0.5) v(0) w1 = 2 * 3 * 0.25 + 1 * 1 * 0.5
        assert_relative_eq!(f[2], 2.0, epsilon = 1e-12);
        for i in [0, 1, 3, 4, 5] {
            assert_eq!(f[i], 0.);
        }
    }

    #[test]
    fn test_interpolated_history() {
        // Impulse response lags fall between stored samples
        let data = create_data(&[0., 0.25]);
        let mut rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        let (mut system, id) = create_system();
        let mut f = Col::<f64>::zeros(6);

        set_heave_velocity(&mut system, id, 0., 1.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();
        set_heave_velocity(&mut system, id, 0.5, 3.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();

        // v(0.25) = 2, widths [0.125, 0.125]
        assert_relative_eq!(f[2], 2. * 3. * 0.125 + 1. * 2. * 0.125, epsilon = 1e-12);
    }

    #[test]
    fn test_duplicate_step() {
        let data = create_data(&[0., 0.5, 1.0]);
        let mut rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        let (mut system, id) = create_system();
        let mut f = Col::<f64>::zeros(6);

        set_heave_velocity(&mut system, id, 1.0, 1.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();
        let res = rd.compute(&system, &[id], &data, f.as_mut());
        assert!(matches!(res, Err(HydroError::DuplicateStep { .. })));
    }

    #[test]
    fn test_failed_step_is_rolled_back() {
        let data = create_data(&[0., 0.5, 1.0]);
        let mut rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        let (mut system, id) = create_system();
        let mut f = Col::<f64>::zeros(6);

        set_heave_velocity(&mut system, id, 0., 1.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();

        // A NaN time cannot be bracketed by the stored samples
        set_heave_velocity(&mut system, id, f64::NAN, 3.);
        let res = rd.compute(&system, &[id], &data, f.as_mut());
        assert!(matches!(res, Err(HydroError::NotBracketed { .. })));
        assert_eq!(rd.history().len(), 1);
        assert_eq!(rd.history().newest().unwrap().time, 0.);

        // Next step convolves against the history without the failed sample
        set_heave_velocity(&mut system, id, 0.5, 3.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();
        assert_eq!(rd.history().len(), 2);
        assert_relative_eq!(f[2], 2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_history_pruning() {
        let data = create_data(&[0., 0.5, 1.0]);
        let mut rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        let (mut system, id) = create_system();
        let mut f = Col::<f64>::zeros(6);

        for i in 0..50 {
            let t = i as f64 * 0.1;
            set_heave_velocity(&mut system, id, t, (t * 2.).sin());
            rd.compute(&system, &[id], &data, f.as_mut()).unwrap();

            let min_time = t - rd.rirf_max_time();
            let times = rd.history().iter().map(|r| r.time).collect_vec();
            let n_older = times.iter().filter(|&&ti| ti < min_time).count();
            assert!(n_older <= 1);
            // Oldest record still covers the full impulse response
            if t >= rd.rirf_max_time() {
                assert!(*times.last().unwrap() <= min_time);
            }
        }
    }

    #[test]
    fn test_rirf_value_bounds() {
        let data = create_data(&[0., 0.5, 1.0]);
        let rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        assert_eq!(rd.rirf_value(&data, 2, 2, 1).unwrap(), 1.);
        assert!(matches!(
            rd.rirf_value(&data, 6, 0, 0),
            Err(HydroError::IndexOutOfRange { index: 6, .. })
        ));
        assert!(rd.rirf_value(&data, 0, 6, 0).is_err());
        assert!(rd.rirf_value(&data, 0, 0, 3).is_err());
    }

    #[test]
    fn test_excluded_body_has_no_radiation() {
        let mut data = create_data(&[0., 0.5, 1.0]);
        data.body_mut(0).unwrap().include_radiation = false;
        let mut rd = RadiationDamping::new(&data, RadiationSettings::default()).unwrap();
        let (mut system, id) = create_system();
        let mut f = Col::<f64>::zeros(6);

        set_heave_velocity(&mut system, id, 0., 1.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();
        set_heave_velocity(&mut system, id, 0.5, 3.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();
        f.iter().for_each(|&v| assert_eq!(v, 0.));
        assert!(rd.history().is_empty());
    }

    #[test]
    fn test_tapered_direct_runs_once() {
        let data = create_data(&[0., 0.5, 1.0]);
        let settings = RadiationSettings {
            mode: RadiationConvolutionMode::TaperedDirect,
            ..Default::default()
        };
        let mut rd = RadiationDamping::new(&data, settings).unwrap();
        assert!(rd.processed_kernel().is_none());

        let (mut system, id) = create_system();
        let mut f = Col::<f64>::zeros(6);
        set_heave_velocity(&mut system, id, 0., 1.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();
        set_heave_velocity(&mut system, id, 0.5, 1.);
        rd.compute(&system, &[id], &data, f.as_mut()).unwrap();

        let shape = rd.processed_kernel().unwrap().shape();
        assert_eq!(shape, (1, 6, 6, 3));
        // Default taper floors the last sample
        assert_eq!(rd.rirf_value(&data, 2, 2, 2).unwrap(), 0.);
    }
}
