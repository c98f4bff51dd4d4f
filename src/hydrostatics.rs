use faer::prelude::*;

use crate::error::{HydroError, Result};
use crate::hydro_data::{HydroData, DOF_LIN_OR_ROT, DOF_PER_BODY};
use crate::system::HostSystem;
use crate::util::{cross, norm, quat_as_euler_angles};

/// Linear hydrostatic restoring and buoyancy loads.
pub struct Hydrostatics {
    /// Equilibrium displacement per body `[n_bodies][6]`
    pub equilibrium: Vec<[f64; 6]>,
    /// Center of buoyancy relative to center of gravity `[n_bodies][3]`
    pub cb_minus_cg: Vec<[f64; 3]>,
}

impl Hydrostatics {
    pub fn new<D: HydroData>(data: &D) -> Self {
        let n_bodies = data.n_bodies();
        let equilibrium = (0..n_bodies)
            .map(|b| {
                let cg = data.cg(b);
                // Rotational equilibrium is the unrotated pose
                [cg[0], cg[1], cg[2], 0., 0., 0.]
            })
            .collect();
        let cb_minus_cg = (0..n_bodies)
            .map(|b| {
                let (cb, cg) = (data.cb(b), data.cg(b));
                [cb[0] - cg[0], cb[1] - cg[1], cb[2] - cg[2]]
            })
            .collect();
        Self {
            equilibrium,
            cb_minus_cg,
        }
    }

    /// Displacement of `body` from equilibrium, translation in world axes
    /// followed by Cardan XYZ angles.
    pub fn displacement(&self, body: usize, position: &[f64; 3], orientation: &[f64; 4]) -> [f64; 6] {
        let eq = &self.equilibrium[body];
        let rpy = quat_as_euler_angles(orientation);
        [
            position[0] - eq[0],
            position[1] - eq[1],
            position[2] - eq[2],
            rpy[0] - eq[3],
            rpy[1] - eq[4],
            rpy[2] - eq[5],
        ]
    }

    /// Writes the hydrostatic force of every body into `force` (length 6N).
    pub fn compute<D: HydroData>(
        &self,
        host: &dyn HostSystem,
        body_ids: &[usize],
        data: &D,
        mut force: ColMut<f64>,
    ) -> Result<()> {
        let rho = data.rho();
        let g = host.gravity();
        let g_mag = norm(&g);

        for (b, &id) in body_ids.iter().enumerate() {
            let state = host.body_state(id).ok_or(HydroError::MissingBody(id))?;
            let disp = self.displacement(b, &state.position, &state.orientation);

            // Linear restoring force/torque
            let disp = Col::<f64>::from_fn(DOF_PER_BODY, |i| disp[i]);
            let k_disp = data.lin_matrix(b) * disp.as_ref();
            let restoring = Col::<f64>::from_fn(DOF_PER_BODY, |i| -rho * g_mag * k_disp[i]);

            // Buoyancy opposes gravity, whichever way it points
            let vol = data.disp_vol(b);
            let buoyancy = [-rho * g[0] * vol, -rho * g[1] * vol, -rho * g[2] * vol];
            let buoyancy_moment = cross(&self.cb_minus_cg[b], &buoyancy);

            let offset = DOF_PER_BODY * b;
            for i in 0..DOF_LIN_OR_ROT {
                force[offset + i] = restoring[i] + buoyancy[i];
                force[offset + DOF_LIN_OR_ROT + i] =
                    restoring[DOF_LIN_OR_ROT + i] + buoyancy_moment[i];
            }
        }
        Ok(())
    }
}
