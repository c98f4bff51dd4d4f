use std::cell::RefCell;
use std::rc::{Rc, Weak};
use std::time::Instant;

use faer::prelude::*;

use crate::error::{HydroError, Result};
use crate::hydro_data::{ExcitationTable, HydroData, DOF_PER_BODY};
use crate::hydrostatics::Hydrostatics;
use crate::radiation::{RadiationDamping, RadiationSettings};
use crate::system::{AppliedLoad, HostSystem};
use crate::waves::{NoWave, WaveModel};

/// Time spent and number of calls per force component.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ProfileStats {
    pub hydrostatics_seconds: f64,
    pub hydrostatics_calls: usize,
    pub radiation_seconds: f64,
    pub radiation_calls: usize,
    pub waves_seconds: f64,
    pub waves_calls: usize,
    /// Number of times the total force was recomputed
    pub recomputations: usize,
    /// Number of force queries answered from the cache
    pub cache_hits: usize,
}

/// Hydrodynamic loads on a set of bodies: hydrostatics, radiation damping and
/// wave excitation, combined once per distinct simulation time.
///
/// Deliberately not `Clone`: each instance registers one load per body with
/// the host, and a copy would apply the forces twice.
pub struct HydroForces<D: HydroData> {
    data: D,
    /// Host body id per hydro body
    body_ids: Vec<usize>,
    hydrostatics: Hydrostatics,
    radiation: RadiationDamping,
    waves: WaveModel,
    force_hydrostatic: Col<f64>,
    force_radiation_damping: Col<f64>,
    force_waves: Col<f64>,
    total_force: Col<f64>,
    /// Time of the cached total force
    prev_time: Option<f64>,
    stats: ProfileStats,
}

impl<D: HydroData + 'static> HydroForces<D> {
    /// Creates the coordinator and registers one [`BodyForce`] per body with the host.
    ///
    /// `body_ids[i]` is the host id of hydro body `i`. The returned handle
    /// must be kept alive while the host evaluates its loads.
    pub fn new(
        host: &mut dyn HostSystem,
        body_ids: &[usize],
        data: D,
        waves: Option<WaveModel>,
        settings: RadiationSettings,
    ) -> Result<Rc<RefCell<Self>>> {
        let n_bodies = body_ids.len();
        if n_bodies == 0 {
            return Err(HydroError::NoBodies);
        }
        if data.n_bodies() != n_bodies {
            return Err(HydroError::BodyCountMismatch {
                expected: data.n_bodies(),
                found: n_bodies,
            });
        }
        if let Some(&id) = body_ids.iter().find(|&&id| host.body_state(id).is_none()) {
            return Err(HydroError::MissingBody(id));
        }

        let n_dofs = DOF_PER_BODY * n_bodies;
        for b in 0..n_bodies {
            let shape = (data.added_mass(b).nrows(), data.added_mass(b).ncols());
            if shape != (DOF_PER_BODY, n_dofs) {
                return Err(HydroError::Config(format!(
                    "added mass of body {} is {}x{}, expected {}x{}",
                    b, shape.0, shape.1, DOF_PER_BODY, n_dofs
                )));
            }
        }
        let mut forces = Self {
            hydrostatics: Hydrostatics::new(&data),
            radiation: RadiationDamping::new(&data, settings)?,
            waves: WaveModel::NoWave(NoWave::new(n_bodies)),
            body_ids: body_ids.to_vec(),
            force_hydrostatic: Col::zeros(n_dofs),
            force_radiation_damping: Col::zeros(n_dofs),
            force_waves: Col::zeros(n_dofs),
            total_force: Col::zeros(n_dofs),
            prev_time: None,
            stats: ProfileStats::default(),
            data,
        };
        forces.add_waves(waves.unwrap_or(WaveModel::NoWave(NoWave::new(n_bodies))))?;

        tracing::info!(
            "hydrodynamic forces on {} bodies ({:?} radiation, {})",
            n_bodies,
            forces.radiation.mode(),
            forces.waves.name()
        );

        let forces = Rc::new(RefCell::new(forces));
        for (index, &id) in body_ids.iter().enumerate() {
            host.add_load(
                id,
                Box::new(BodyForce {
                    body: index,
                    coordinator: Rc::downgrade(&forces),
                }),
            )?;
        }
        Ok(forces)
    }
}

impl<D: HydroData> HydroForces<D> {
    /// Replaces the wave model, feeding it the excitation tables and initializing it.
    pub fn add_waves(&mut self, mut waves: WaveModel) -> Result<()> {
        let n_bodies = self.body_ids.len();
        if waves.num_bodies() != n_bodies {
            return Err(HydroError::BodyCountMismatch {
                expected: n_bodies,
                found: waves.num_bodies(),
            });
        }
        let tables = (0..n_bodies)
            .map(|b| {
                if self.data.include_excitation(b) {
                    self.data.excitation(b).clone()
                } else {
                    ExcitationTable::default()
                }
            })
            .collect();
        waves.add_hydro_data(tables);
        waves.initialize()?;
        self.waves = waves;
        // Radiation history already holds the cached time, refresh the wave term only
        if let Some(time) = self.prev_time {
            self.force_waves = self.waves.force_at_time(time);
            self.sum_total_force();
        }
        Ok(())
    }

    fn sum_total_force(&mut self) {
        zip!(
            &mut self.total_force,
            &self.force_hydrostatic,
            &self.force_radiation_damping,
            &self.force_waves
        )
        .for_each(|unzip!(total, hs, rd, w)| *total = *hs - *rd + *w);
    }

    pub fn n_bodies(&self) -> usize {
        self.body_ids.len()
    }

    pub fn data(&self) -> &D {
        &self.data
    }

    pub fn waves(&self) -> &WaveModel {
        &self.waves
    }

    pub fn radiation(&self) -> &RadiationDamping {
        &self.radiation
    }

    pub fn total_force(&self) -> ColRef<'_, f64> {
        self.total_force.as_ref()
    }

    pub fn force_hydrostatic(&self) -> ColRef<'_, f64> {
        self.force_hydrostatic.as_ref()
    }

    pub fn force_radiation_damping(&self) -> ColRef<'_, f64> {
        self.force_radiation_damping.as_ref()
    }

    pub fn force_waves(&self) -> ColRef<'_, f64> {
        self.force_waves.as_ref()
    }

    /// Added mass rows of hydro body `body` `[6][6N]`.
    ///
    /// Not part of the applied force; the host adds it to its mass matrix.
    pub fn added_mass(&self, body: usize) -> Result<MatRef<'_, f64>> {
        let n_bodies = self.body_ids.len();
        if body >= n_bodies {
            return Err(HydroError::out_of_range("body", body, n_bodies));
        }
        Ok(self.data.added_mass(body))
    }

    /// Added mass of all bodies assembled into one `[6N][6N]` matrix.
    pub fn added_mass_matrix(&self) -> Mat<f64> {
        let n_dofs = DOF_PER_BODY * self.body_ids.len();
        let mut m = Mat::zeros(n_dofs, n_dofs);
        for b in 0..self.body_ids.len() {
            m.as_mut()
                .submatrix_mut(DOF_PER_BODY * b, 0, DOF_PER_BODY, n_dofs)
                .copy_from(self.data.added_mass(b));
        }
        m
    }

    pub fn profile_stats(&self) -> ProfileStats {
        self.stats
    }

    pub fn log_profile_stats(&self) {
        let s = &self.stats;
        tracing::debug!(
            "hydrostatics: {} calls, {:.6}s; radiation: {} calls, {:.6}s; waves: {} calls, {:.6}s; recomputed {} times, cache hits: {}",
            s.hydrostatics_calls,
            s.hydrostatics_seconds,
            s.radiation_calls,
            s.radiation_seconds,
            s.waves_calls,
            s.waves_seconds,
            s.recomputations,
            s.cache_hits
        );
    }

    /// Computes the hydrostatic force on all bodies `[6N]`.
    pub fn compute_force_hydrostatics(&mut self, host: &dyn HostSystem) -> Result<ColRef<'_, f64>> {
        let start = Instant::now();
        self.hydrostatics
            .compute(host, &self.body_ids, &self.data, self.force_hydrostatic.as_mut())?;
        self.stats.hydrostatics_seconds += start.elapsed().as_secs_f64();
        self.stats.hydrostatics_calls += 1;
        Ok(self.force_hydrostatic.as_ref())
    }

    /// Computes the radiation damping force on all bodies `[6N]`.
    ///
    /// Records the current velocities, so it may be called only once per
    /// simulation time.
    pub fn compute_force_radiation_damping_conv(
        &mut self,
        host: &dyn HostSystem,
    ) -> Result<ColRef<'_, f64>> {
        let start = Instant::now();
        self.radiation.compute(
            host,
            &self.body_ids,
            &self.data,
            self.force_radiation_damping.as_mut(),
        )?;
        self.stats.radiation_seconds += start.elapsed().as_secs_f64();
        self.stats.radiation_calls += 1;
        Ok(self.force_radiation_damping.as_ref())
    }

    /// Computes the wave excitation force on all bodies `[6N]`.
    pub fn compute_force_waves(&mut self, host: &dyn HostSystem) -> Result<ColRef<'_, f64>> {
        let start = Instant::now();
        self.force_waves = self.waves.force_at_time(host.time());
        self.stats.waves_seconds += start.elapsed().as_secs_f64();
        self.stats.waves_calls += 1;
        Ok(self.force_waves.as_ref())
    }

    /// Returns component `dof` of the total hydrodynamic force on hydro body
    /// `body`, recomputing every contribution when the host time has changed.
    pub fn coordinate_func_for_body(
        &mut self,
        host: &dyn HostSystem,
        body: usize,
        dof: usize,
    ) -> Result<f64> {
        let n_bodies = self.body_ids.len();
        if body >= n_bodies {
            return Err(HydroError::out_of_range("body", body, n_bodies));
        }
        if dof >= DOF_PER_BODY {
            return Err(HydroError::out_of_range("dof", dof, DOF_PER_BODY));
        }
        let index = DOF_PER_BODY * body + dof;

        let time = host.time();
        if self.prev_time == Some(time) {
            self.stats.cache_hits += 1;
            return Ok(self.total_force[index]);
        }

        self.force_hydrostatic.fill(0.);
        self.force_radiation_damping.fill(0.);
        self.force_waves.fill(0.);

        self.compute_force_hydrostatics(host)?;
        self.compute_force_radiation_damping_conv(host)?;
        self.compute_force_waves(host)?;
        self.sum_total_force();

        self.prev_time = Some(time);
        self.stats.recomputations += 1;
        Ok(self.total_force[index])
    }
}

//------------------------------------------------------------------------------
// Per-body hookup
//------------------------------------------------------------------------------

/// Load registered with the host for one body, forwarding each DOF to the
/// shared coordinator.
///
/// Holds a weak handle: if the coordinator is dropped first, evaluation fails
/// with [`HydroError::CoordinatorDropped`].
pub struct BodyForce<D: HydroData> {
    /// Hydro body index (0-based)
    pub body: usize,
    coordinator: Weak<RefCell<HydroForces<D>>>,
}

impl<D: HydroData> AppliedLoad for BodyForce<D> {
    fn evaluate(&self, host: &dyn HostSystem) -> Result<[f64; 6]> {
        let coordinator = self
            .coordinator
            .upgrade()
            .ok_or(HydroError::CoordinatorDropped)?;
        let mut forces = coordinator
            .try_borrow_mut()
            .map_err(|_| HydroError::CoordinatorBusy)?;
        let mut f = [0.; DOF_PER_BODY];
        for (dof, fi) in f.iter_mut().enumerate() {
            *fi = forces.coordinate_func_for_body(host, self.body, dof)?;
        }
        Ok(f)
    }
}

#[cfg(test)]
mod tests {

    use approx::assert_relative_eq;

    use super::*;
    use crate::hydro_data::HydroDatabase;
    use crate::system::System;
    use crate::waves::RegularWave;

    fn create_data() -> HydroDatabase {
        let mut db = HydroDatabase::new(1000., 1, &[0., 0.5, 1.0]);
        let body = db.body_mut(0).unwrap();
        body.cg = [0., 0., -1.];
        body.cb = [0., 0., -0.5];
        body.disp_vol = 2.;
        body.lin_matrix[(2, 2)] = 4.;
        body.excitation = ExcitationTable::constant([0., 0., 50., 0., 0., 0.], [0.; 6]);
        for (s, v) in [2., 1., 0.5].iter().enumerate() {
            db.set_rirf(0, 2, 2, s, *v).unwrap();
        }
        db
    }

    fn create_system() -> (System, usize) {
        let mut system = System::new();
        let id = system.add_body("float").position(0., 0., -1.).build();
        (system, id)
    }

    #[test]
    fn test_construction_registers_loads() {
        let (mut system, id) = create_system();
        let _forces =
            HydroForces::new(&mut system, &[id], create_data(), None, Default::default()).unwrap();
        assert_eq!(system.n_loads(), 1);
    }

    #[test]
    fn test_construction_errors() {
        let (mut system, id) = create_system();
        assert!(matches!(
            HydroForces::new(&mut system, &[], create_data(), None, Default::default()),
            Err(HydroError::NoBodies)
        ));
        assert!(matches!(
            HydroForces::new(&mut system, &[id, id], create_data(), None, Default::default()),
            Err(HydroError::BodyCountMismatch { .. })
        ));
        assert!(matches!(
            HydroForces::new(&mut system, &[5], create_data(), None, Default::default()),
            Err(HydroError::MissingBody(5))
        ));
        assert_eq!(system.n_loads(), 0);
    }

    #[test]
    fn test_sign_convention() {
        let (mut system, id) = create_system();
        let waves = WaveModel::Regular(RegularWave::new(1, 2., 4., 0.).unwrap());
        let forces =
            HydroForces::new(&mut system, &[id], create_data(), Some(waves), Default::default())
                .unwrap();
        let mut forces = forces.borrow_mut();

        for (i, t) in [0., 0.25, 0.5, 0.75].iter().enumerate() {
            system.set_time(*t);
            system.body_mut(id).unwrap().state.linear_velocity = [0., 0., 0.3 * i as f64 + 0.1];
            system.body_mut(id).unwrap().state.position = [0., 0., -1. + 0.05 * i as f64];
            forces.coordinate_func_for_body(&system, 0, 2).unwrap();

            for k in 0..6 {
                assert_eq!(
                    forces.total_force()[k],
                    forces.force_hydrostatic()[k] - forces.force_radiation_damping()[k]
                        + forces.force_waves()[k]
                );
            }
        }
        assert!(forces.force_radiation_damping()[2] != 0.);
        assert!(forces.force_waves()[2] != 0.);
    }

    #[test]
    fn test_cached_per_time() {
        let (mut system, id) = create_system();
        let forces =
            HydroForces::new(&mut system, &[id], create_data(), None, Default::default()).unwrap();
        let mut forces = forces.borrow_mut();

        system.set_time(0.1);
        let f1 = forces.coordinate_func_for_body(&system, 0, 2).unwrap();
        // A changed state at the same time must not trigger a recompute
        system.body_mut(id).unwrap().state.position = [0., 0., 3.];
        let f2 = forces.coordinate_func_for_body(&system, 0, 2).unwrap();
        assert_eq!(f1.to_bits(), f2.to_bits());

        let stats = forces.profile_stats();
        assert_eq!(stats.hydrostatics_calls, 1);
        assert_eq!(stats.radiation_calls, 1);
        assert_eq!(stats.waves_calls, 1);
        assert_eq!(stats.recomputations, 1);
        assert_eq!(stats.cache_hits, 1);

        // Buoyancy only, at equilibrium
        assert_relative_eq!(f1, 1000. * 9.81 * 2., epsilon = 1e-9);
    }

    #[test]
    fn test_index_out_of_range() {
        let (mut system, id) = create_system();
        let forces =
            HydroForces::new(&mut system, &[id], create_data(), None, Default::default()).unwrap();
        let mut forces = forces.borrow_mut();
        assert!(matches!(
            forces.coordinate_func_for_body(&system, 1, 0),
            Err(HydroError::IndexOutOfRange { what: "body", .. })
        ));
        assert!(matches!(
            forces.coordinate_func_for_body(&system, 0, 6),
            Err(HydroError::IndexOutOfRange { what: "dof", .. })
        ));
    }

    #[test]
    fn test_add_waves_checks_body_count() {
        let (mut system, id) = create_system();
        let forces =
            HydroForces::new(&mut system, &[id], create_data(), None, Default::default()).unwrap();
        let res = forces.borrow_mut().add_waves(WaveModel::NoWave(NoWave::new(2)));
        assert!(res.is_err());
        assert_eq!(forces.borrow().waves().name(), "NoWave");
    }

    #[test]
    fn test_add_waves_at_cached_time() {
        let (mut system, id) = create_system();
        let forces =
            HydroForces::new(&mut system, &[id], create_data(), None, Default::default()).unwrap();
        system.set_time(0.);
        system.body_mut(id).unwrap().state.linear_velocity = [0., 0., 1.];
        system.apply_loads().unwrap();
        let hs = forces.borrow().force_hydrostatic()[2];

        forces
            .borrow_mut()
            .add_waves(WaveModel::Regular(RegularWave::new(1, 2., 5., 0.).unwrap()))
            .unwrap();
        // Same time again: served from the cache with the new wave term
        system.apply_loads().unwrap();

        let forces = forces.borrow();
        assert_eq!(forces.radiation().history().len(), 1);
        assert_eq!(forces.profile_stats().recomputations, 1);
        assert_relative_eq!(forces.force_waves()[2], 50., epsilon = 1e-12);
        assert_relative_eq!(forces.total_force()[2], hs + 50., epsilon = 1e-9);
        assert_relative_eq!(system.bodies[0].applied_force[2], hs + 50., epsilon = 1e-9);
    }

    #[test]
    fn test_added_mass() {
        let mut db = HydroDatabase::new(1000., 2, &[0., 0.5]);
        db.body_mut(0).unwrap().added_mass[(2, 2)] = 300.;
        db.body_mut(0).unwrap().added_mass[(2, 8)] = -20.;
        db.body_mut(1).unwrap().added_mass[(2, 8)] = 500.;

        let mut system = System::new();
        let ids = [system.add_body("a").build(), system.add_body("b").build()];
        let forces = HydroForces::new(&mut system, &ids, db, None, Default::default()).unwrap();
        system.apply_loads().unwrap();
        let forces = forces.borrow();

        // Added mass never enters the applied force
        assert_eq!(forces.total_force()[2], 0.);
        assert_eq!(forces.added_mass(1).unwrap()[(2, 8)], 500.);
        assert!(matches!(
            forces.added_mass(2),
            Err(HydroError::IndexOutOfRange { what: "body", .. })
        ));

        let m = forces.added_mass_matrix();
        assert_eq!((m.nrows(), m.ncols()), (12, 12));
        assert_eq!(m[(2, 2)], 300.);
        assert_eq!(m[(2, 8)], -20.);
        assert_eq!(m[(8, 8)], 500.);
        assert_eq!(m[(8, 2)], 0.);
    }

    #[test]
    fn test_added_mass_shape_checked() {
        let mut db = create_data();
        db.body_mut(0).unwrap().added_mass = Mat::zeros(6, 12);
        let (mut system, id) = create_system();
        assert!(matches!(
            HydroForces::new(&mut system, &[id], db, None, Default::default()),
            Err(HydroError::Config(_))
        ));
    }

    #[test]
    fn test_body_force_after_drop() {
        let (mut system, id) = create_system();
        let forces =
            HydroForces::new(&mut system, &[id], create_data(), None, Default::default()).unwrap();
        system.apply_loads().unwrap();
        drop(forces);
        assert!(matches!(
            system.apply_loads(),
            Err(HydroError::CoordinatorDropped)
        ));
    }
}
