use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::str::FromStr;

use faer::prelude::*;
use itertools::Itertools;

use crate::error::{HydroError, Result};
use crate::hydro_data::{rirf_row, HydroData, DOF_PER_BODY};

/// Smoothing filter applied to each impulse response series.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Smoothing {
    /// Local quadratic least-squares fit
    SavitzkyGolay,
    /// Centered moving average
    MovingAverage,
}

impl FromStr for Smoothing {
    type Err = HydroError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sg" | "savitzky_golay" | "savitzky-golay" => Ok(Self::SavitzkyGolay),
            "moving_average" | "ma" => Ok(Self::MovingAverage),
            _ => Err(HydroError::invalid_option(
                "td_smoothing",
                format!("unknown smoothing '{}'", s),
            )),
        }
    }
}

/// Tuning of the tapered-direct kernel preprocessing.
#[derive(Clone, Debug, PartialEq)]
pub struct TaperedDirectOptions {
    pub smoothing: Smoothing,
    /// Odd smoothing window length, at least 3
    pub window_length: usize,
    /// Samples after this time are dropped; disabled when <= 0
    pub rirf_end_time: f64,
    /// Fraction of the series where the taper begins
    pub taper_start_percent: f64,
    /// Fraction of the series where the taper reaches its floor
    pub taper_end_percent: f64,
    /// Floor of the taper as a fraction of the original amplitude
    pub taper_final_amplitude: f64,
    /// Write before/after kernels to CSV in the diagnostics directory
    pub export_csv: bool,
}

impl Default for TaperedDirectOptions {
    fn default() -> Self {
        Self {
            smoothing: Smoothing::SavitzkyGolay,
            window_length: 5,
            rirf_end_time: -1.,
            taper_start_percent: 0.8,
            taper_end_percent: 1.0,
            taper_final_amplitude: 0.0,
            export_csv: false,
        }
    }
}

impl TaperedDirectOptions {
    pub fn validate(&self) -> Result<()> {
        if self.window_length < 3 || self.window_length % 2 == 0 {
            return Err(HydroError::invalid_option(
                "td_window_length",
                format!("must be odd and >= 3, got {}", self.window_length),
            ));
        }
        let in_unit = |v: f64| (0. ..=1.).contains(&v);
        if !in_unit(self.taper_start_percent) || !in_unit(self.taper_end_percent) {
            return Err(HydroError::invalid_option(
                "td_taper_start_percent",
                "taper start and end must be within [0, 1]",
            ));
        }
        if self.taper_start_percent > self.taper_end_percent {
            return Err(HydroError::invalid_option(
                "td_taper_start_percent",
                format!(
                    "taper start ({}) is after taper end ({})",
                    self.taper_start_percent, self.taper_end_percent
                ),
            ));
        }
        if !in_unit(self.taper_final_amplitude) {
            return Err(HydroError::invalid_option(
                "td_taper_final_amplitude",
                format!("must be within [0, 1], got {}", self.taper_final_amplitude),
            ));
        }
        Ok(())
    }
}

//------------------------------------------------------------------------------
// Kernel storage
//------------------------------------------------------------------------------

/// Radiation impulse response tensor `[body][row_dof][col][step]`.
#[derive(Clone, Debug)]
pub struct RirfKernel {
    pub time: Vec<f64>,
    /// Per body `[col * 6 + row_dof][n_steps]`
    pub bodies: Vec<Mat<f64>>,
    pub n_cols: usize,
}

impl RirfKernel {
    /// Copies the raw impulse response out of the data provider.
    pub fn from_data<D: HydroData>(data: &D) -> Self {
        let n_bodies = data.n_bodies();
        let n_cols = DOF_PER_BODY * n_bodies;
        let time = data.rirf_time_vector().to_vec();
        let bodies = (0..n_bodies)
            .map(|b| {
                Mat::from_fn(DOF_PER_BODY * n_cols, time.len(), |i, s| {
                    data.rirf_val(b, i % DOF_PER_BODY, i / DOF_PER_BODY, s)
                })
            })
            .collect();
        Self {
            time,
            bodies,
            n_cols,
        }
    }

    /// Returns (n_bodies, n_row_dofs, n_cols, n_steps).
    pub fn shape(&self) -> (usize, usize, usize, usize) {
        (self.bodies.len(), DOF_PER_BODY, self.n_cols, self.time.len())
    }

    #[inline]
    pub fn value(&self, body: usize, row_dof: usize, col: usize, step: usize) -> f64 {
        self.bodies[body][(rirf_row(row_dof, col), step)]
    }

    /// Returns a copy with truncation, smoothing and tapering applied to every series.
    pub fn tapered_direct(&self, options: &TaperedDirectOptions) -> Self {
        let n_steps = self.time.len();
        let n_active = if options.rirf_end_time > 0. {
            self.time
                .iter()
                .take_while(|&&t| t <= options.rirf_end_time)
                .count()
                .max(1)
        } else {
            n_steps
        };
        let taper = taper_factors(
            n_active,
            options.taper_start_percent,
            options.taper_end_percent,
            options.taper_final_amplitude,
        );

        let bodies = self
            .bodies
            .iter()
            .map(|raw| {
                let mut processed = Mat::<f64>::zeros(raw.nrows(), n_steps);
                let mut series = vec![0.; n_active];
                for i in 0..raw.nrows() {
                    series
                        .iter_mut()
                        .enumerate()
                        .for_each(|(s, v)| *v = raw[(i, s)]);
                    let smoothed = match options.smoothing {
                        Smoothing::SavitzkyGolay => {
                            savitzky_golay(&series, options.window_length)
                        }
                        Smoothing::MovingAverage => moving_average(&series, options.window_length),
                    };
                    smoothed
                        .iter()
                        .zip(taper.iter())
                        .enumerate()
                        .for_each(|(s, (&v, &f))| processed[(i, s)] = v * f);
                }
                processed
            })
            .collect();

        Self {
            time: self.time.clone(),
            bodies,
            n_cols: self.n_cols,
        }
    }

    /// Writes raw and processed values of every non-zero series of `body` to CSV.
    pub fn write_comparison_csv(&self, processed: &RirfKernel, body: usize, path: &Path) -> Result<()> {
        let mut file = BufWriter::new(File::create(path)?);
        writeln!(file, "time,row,col,raw,processed")?;
        let (raw, proc) = (&self.bodies[body], &processed.bodies[body]);
        for i in 0..raw.nrows() {
            if (0..raw.ncols()).all(|s| raw[(i, s)] == 0.) {
                continue;
            }
            let (row_dof, col) = (i % DOF_PER_BODY, i / DOF_PER_BODY);
            for (s, t) in self.time.iter().enumerate() {
                writeln!(
                    file,
                    "{},{},{},{},{}",
                    t,
                    body * DOF_PER_BODY + row_dof,
                    col,
                    raw[(i, s)],
                    proc[(i, s)]
                )?;
            }
        }
        file.flush()?;
        Ok(())
    }
}

//------------------------------------------------------------------------------
// Computation kernels
//------------------------------------------------------------------------------

/// Largest odd window not exceeding `n`, or `None` if smoothing isn't possible.
fn effective_window(window: usize, n: usize) -> Option<usize> {
    let w = window.min(if n % 2 == 0 { n.saturating_sub(1) } else { n });
    (w >= 3).then_some(w)
}

/// Centered moving average; the window shrinks symmetrically near the ends.
pub fn moving_average(y: &[f64], window: usize) -> Vec<f64> {
    let n = y.len();
    let Some(w) = effective_window(window, n) else {
        return y.to_vec();
    };
    let h = w / 2;
    (0..n)
        .map(|i| {
            let k = h.min(i).min(n - 1 - i);
            y[i - k..=i + k].iter().sum::<f64>() / (2 * k + 1) as f64
        })
        .collect()
}

/// Savitzky-Golay smoothing with a local quadratic fit.
///
/// Near the ends the window is shifted inside the series and the fit is
/// evaluated at the sample's own position.
pub fn savitzky_golay(y: &[f64], window: usize) -> Vec<f64> {
    let n = y.len();
    let Some(w) = effective_window(window, n) else {
        return y.to_vec();
    };
    let h = w / 2;
    const N_COEFF: usize = 3;

    (0..n)
        .map(|i| {
            let start = i.saturating_sub(h).min(n - w);
            let mut a = Mat::<f64>::zeros(N_COEFF, N_COEFF);
            let mut b = Col::<f64>::zeros(N_COEFF);
            for j in start..start + w {
                let x = j as f64 - i as f64;
                let pows = [1., x, x * x, x * x * x, x * x * x * x];
                for p in 0..N_COEFF {
                    b[p] += y[j] * pows[p];
                    for q in 0..N_COEFF {
                        a[(p, q)] += pows[p + q];
                    }
                }
            }
            let c = a.partial_piv_lu().solve(&b);
            c[0]
        })
        .collect()
}

/// Taper window over `n` samples: 1 up to `start`, half-cosine down to
/// `final_amplitude` at `end`, and `final_amplitude` afterwards.
pub fn taper_factors(n: usize, start: f64, end: f64, final_amplitude: f64) -> Vec<f64> {
    if n < 2 {
        return vec![1.; n];
    }
    let last = (n - 1) as f64;
    let (i_start, i_end) = (start * last, end * last);
    (0..n)
        .map(|i| {
            let x = i as f64;
            if x <= i_start {
                1.
            } else if x >= i_end {
                final_amplitude
            } else {
                let r = (x - i_start) / (i_end - i_start);
                let w = 0.5 * (1. + (std::f64::consts::PI * r).cos());
                final_amplitude + (1. - final_amplitude) * w
            }
        })
        .collect_vec()
}
