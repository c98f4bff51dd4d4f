use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;

use faer::prelude::*;

use crate::config::HydroConfig;
use crate::error::{HydroError, Result};
use crate::hydro_data::{ExcitationTable, HydroData};
use crate::hydro_forces::HydroForces;
use crate::system::HostSystem;
use crate::waves::WaveModel;

/// Hydrodynamic data with per-body component switches from the configuration.
pub struct ConfiguredHydroData<D: HydroData> {
    inner: D,
    include_excitation: Vec<bool>,
    include_radiation: Vec<bool>,
}

impl<D: HydroData> ConfiguredHydroData<D> {
    pub fn new(inner: D, include_excitation: Vec<bool>, include_radiation: Vec<bool>) -> Result<Self> {
        let n = inner.n_bodies();
        for flags in [&include_excitation, &include_radiation] {
            if flags.len() != n {
                return Err(HydroError::BodyCountMismatch {
                    expected: n,
                    found: flags.len(),
                });
            }
        }
        Ok(Self {
            inner,
            include_excitation,
            include_radiation,
        })
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }
}

impl<D: HydroData> HydroData for ConfiguredHydroData<D> {
    fn n_bodies(&self) -> usize {
        self.inner.n_bodies()
    }

    fn rho(&self) -> f64 {
        self.inner.rho()
    }

    fn lin_matrix(&self, body: usize) -> MatRef<'_, f64> {
        self.inner.lin_matrix(body)
    }

    fn disp_vol(&self, body: usize) -> f64 {
        self.inner.disp_vol(body)
    }

    fn cg(&self, body: usize) -> [f64; 3] {
        self.inner.cg(body)
    }

    fn cb(&self, body: usize) -> [f64; 3] {
        self.inner.cb(body)
    }

    fn added_mass(&self, body: usize) -> MatRef<'_, f64> {
        self.inner.added_mass(body)
    }

    fn rirf_time_vector(&self) -> &[f64] {
        self.inner.rirf_time_vector()
    }

    fn rirf_val(&self, body: usize, row_dof: usize, col: usize, step: usize) -> f64 {
        self.inner.rirf_val(body, row_dof, col, step)
    }

    fn excitation(&self, body: usize) -> &ExcitationTable {
        self.inner.excitation(body)
    }

    fn include_radiation(&self, body: usize) -> bool {
        self.include_radiation[body] && self.inner.include_radiation(body)
    }

    fn include_excitation(&self, body: usize) -> bool {
        self.include_excitation[body] && self.inner.include_excitation(body)
    }
}

/// Parameters of the host simulation needed to build the loads.
#[derive(Clone, Debug, Default)]
pub struct SimulationParams {
    /// Host time step, used to sample irregular wave elevation
    pub timestep: f64,
    pub duration: f64,
    /// Irregular wave ramp duration
    pub ramp: f64,
    /// Output directory of the optional kernel CSV export
    pub diagnostics_dir: Option<PathBuf>,
}

/// Attaches hydrodynamic loads to the host bodies named in `config`.
///
/// Configured bodies are matched to host bodies by name, in configuration
/// order; `data` must hold one body per matched name in that same order.
pub fn setup_hydro_from_config<D: HydroData + 'static>(
    config: &HydroConfig,
    host: &mut dyn HostSystem,
    data: D,
    params: &SimulationParams,
) -> Result<Rc<RefCell<HydroForces<ConfiguredHydroData<D>>>>> {
    let mut body_ids = vec![];
    let mut include_excitation = vec![];
    let mut include_radiation = vec![];

    for body in config.bodies.iter() {
        if body.radiation_calculation != "convolution" {
            return Err(HydroError::invalid_option(
                "radiation_calculation",
                format!("only 'convolution' is supported, got '{}'", body.radiation_calculation),
            ));
        }
        match host.body_id(&body.name) {
            Some(id) => {
                tracing::debug!("matched hydro body '{}' to host body {}", body.name, id);
                body_ids.push(id);
                include_excitation.push(body.include_excitation);
                include_radiation.push(body.include_radiation);
            }
            None => tracing::warn!("no host body named '{}', skipping", body.name),
        }
    }
    if body_ids.is_empty() {
        return Err(HydroError::NoBodies);
    }
    tracing::info!(
        "matched {} of {} configured hydro bodies",
        body_ids.len(),
        config.bodies.len()
    );

    let data = ConfiguredHydroData::new(data, include_excitation, include_radiation)?;
    let waves = WaveModel::from_settings(
        &config.waves,
        body_ids.len(),
        params.timestep,
        params.duration,
        params.ramp,
    )?;
    let settings = config.radiation_settings(params.diagnostics_dir.clone())?;

    HydroForces::new(host, &body_ids, data, Some(waves), settings)
}
