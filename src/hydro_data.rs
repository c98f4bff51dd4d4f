use faer::prelude::*;
use interp::{interp, InterpMode};

use crate::error::{HydroError, Result};

/// Number of degrees of freedom per rigid body
pub const DOF_PER_BODY: usize = 6;

/// Number of translational (or rotational) degrees of freedom per body
pub const DOF_LIN_OR_ROT: usize = 3;

/// First body number in legacy names such as `body1`
pub const LEGACY_BODY_INDEX_BASE: usize = 1;

/// Converts a legacy 1-based body number to a 0-based hydro index.
pub fn hydro_index_from_legacy(one_based: usize) -> Result<usize> {
    one_based
        .checked_sub(LEGACY_BODY_INDEX_BASE)
        .ok_or_else(|| HydroError::invalid_option("body", "legacy body numbers start at 1"))
}

/// Legacy name of hydro body `index`, `body1` for the first one.
pub fn legacy_body_name(index: usize) -> String {
    format!("body{}", index + LEGACY_BODY_INDEX_BASE)
}

/// Read-only access to the frequency-domain hydrodynamic coefficients.
///
/// Body indices are 0-based. `col` in the radiation queries spans all bodies'
/// degrees of freedom, `0..6 * n_bodies`.
pub trait HydroData {
    fn n_bodies(&self) -> usize;

    /// Fluid density
    fn rho(&self) -> f64;

    /// Linear hydrostatic restoring matrix (6x6, normalized by rho * g)
    fn lin_matrix(&self, body: usize) -> MatRef<'_, f64>;

    /// Displaced volume at equilibrium
    fn disp_vol(&self, body: usize) -> f64;

    /// Center of gravity
    fn cg(&self, body: usize) -> [f64; 3];

    /// Center of buoyancy
    fn cb(&self, body: usize) -> [f64; 3];

    /// Infinite-frequency added mass rows of `body` against every body's
    /// degrees of freedom `[6][6 * n_bodies]`
    fn added_mass(&self, body: usize) -> MatRef<'_, f64>;

    /// Time samples of the radiation impulse response function
    fn rirf_time_vector(&self) -> &[f64];

    fn rirf_n_steps(&self) -> usize {
        self.rirf_time_vector().len()
    }

    /// Radiation impulse response value for (body, row_dof, col, step)
    fn rirf_val(&self, body: usize, row_dof: usize, col: usize, step: usize) -> f64;

    fn excitation(&self, body: usize) -> &ExcitationTable;

    fn include_radiation(&self, _body: usize) -> bool {
        true
    }

    fn include_excitation(&self, _body: usize) -> bool {
        true
    }
}

//------------------------------------------------------------------------------
// Excitation
//------------------------------------------------------------------------------

/// Wave excitation coefficients of one body, per unit wave amplitude.
#[derive(Clone, Debug)]
pub struct ExcitationTable {
    /// Angular frequencies in ascending order `[n_freq]`
    pub frequencies: Vec<f64>,
    /// Magnitude `[6][n_freq]`
    pub magnitude: Mat<f64>,
    /// Phase in radians `[6][n_freq]`
    pub phase: Mat<f64>,
}

impl Default for ExcitationTable {
    fn default() -> Self {
        Self {
            frequencies: vec![],
            magnitude: Mat::zeros(DOF_PER_BODY, 0),
            phase: Mat::zeros(DOF_PER_BODY, 0),
        }
    }
}

impl ExcitationTable {
    /// Table with frequency independent coefficients.
    pub fn constant(magnitude: [f64; 6], phase: [f64; 6]) -> Self {
        Self {
            frequencies: vec![0.],
            magnitude: Mat::from_fn(DOF_PER_BODY, 1, |i, _| magnitude[i]),
            phase: Mat::from_fn(DOF_PER_BODY, 1, |i, _| phase[i]),
        }
    }

    pub fn n_frequencies(&self) -> usize {
        self.frequencies.len()
    }

    /// Returns (magnitude, phase) of `dof` at angular frequency `omega`.
    ///
    /// Values are interpolated linearly and held constant outside the table.
    /// An empty table yields no excitation.
    pub fn at_frequency(&self, dof: usize, omega: f64) -> (f64, f64) {
        match self.frequencies.len() {
            0 => (0., 0.),
            1 => (self.magnitude[(dof, 0)], self.phase[(dof, 0)]),
            n => {
                let mag = (0..n).map(|j| self.magnitude[(dof, j)]).collect::<Vec<_>>();
                let phase = (0..n).map(|j| self.phase[(dof, j)]).collect::<Vec<_>>();
                (
                    interp(&self.frequencies, &mag, omega, &InterpMode::FirstLast),
                    interp(&self.frequencies, &phase, omega, &InterpMode::FirstLast),
                )
            }
        }
    }
}

//------------------------------------------------------------------------------
// In-memory database
//------------------------------------------------------------------------------

/// Hydrodynamic coefficients of a single body.
#[derive(Clone, Debug)]
pub struct BodyHydroData {
    pub name: String,
    /// Linear restoring matrix `[6][6]`
    pub lin_matrix: Mat<f64>,
    pub disp_vol: f64,
    pub cg: [f64; 3],
    pub cb: [f64; 3],
    /// Added mass `[6][6 * n_bodies]`
    pub added_mass: Mat<f64>,
    /// Radiation impulse response `[col * 6 + row_dof][n_steps]`
    pub rirf: Mat<f64>,
    pub excitation: ExcitationTable,
    pub include_excitation: bool,
    pub include_radiation: bool,
}

/// Row of [`BodyHydroData::rirf`] holding (row_dof, col).
#[inline]
pub fn rirf_row(row_dof: usize, col: usize) -> usize {
    col * DOF_PER_BODY + row_dof
}

/// Hydrodynamic database held in memory.
///
/// Coefficients are typically filled from a preprocessed BEM output by the
/// caller; everything starts zeroed.
#[derive(Clone, Debug)]
pub struct HydroDatabase {
    rho: f64,
    rirf_time: Vec<f64>,
    pub bodies: Vec<BodyHydroData>,
}

impl HydroDatabase {
    pub fn new(rho: f64, n_bodies: usize, rirf_time: &[f64]) -> Self {
        let n_cols = DOF_PER_BODY * n_bodies;
        let bodies = (0..n_bodies)
            .map(|i| BodyHydroData {
                name: legacy_body_name(i),
                lin_matrix: Mat::zeros(DOF_PER_BODY, DOF_PER_BODY),
                disp_vol: 0.,
                cg: [0.; 3],
                cb: [0.; 3],
                added_mass: Mat::zeros(DOF_PER_BODY, n_cols),
                rirf: Mat::zeros(DOF_PER_BODY * n_cols, rirf_time.len()),
                excitation: ExcitationTable::default(),
                include_excitation: true,
                include_radiation: true,
            })
            .collect();
        Self {
            rho,
            rirf_time: rirf_time.to_vec(),
            bodies,
        }
    }

    pub fn body_mut(&mut self, body: usize) -> Result<&mut BodyHydroData> {
        let n = self.bodies.len();
        self.bodies
            .get_mut(body)
            .ok_or(HydroError::out_of_range("body", body, n))
    }

    /// Index of the body called `name`; legacy `bodyN` names are also accepted.
    pub fn body_index(&self, name: &str) -> Option<usize> {
        if let Some(i) = self.bodies.iter().position(|b| b.name == name) {
            return Some(i);
        }
        let number = name.strip_prefix("body")?.parse::<usize>().ok()?;
        hydro_index_from_legacy(number)
            .ok()
            .filter(|&i| i < self.bodies.len())
    }

    /// Sets a single radiation impulse response value.
    pub fn set_rirf(
        &mut self,
        body: usize,
        row_dof: usize,
        col: usize,
        step: usize,
        value: f64,
    ) -> Result<()> {
        let n_cols = DOF_PER_BODY * self.bodies.len();
        let n_steps = self.rirf_time.len();
        if row_dof >= DOF_PER_BODY {
            return Err(HydroError::out_of_range("rirf row dof", row_dof, DOF_PER_BODY));
        }
        if col >= n_cols {
            return Err(HydroError::out_of_range("rirf col", col, n_cols));
        }
        if step >= n_steps {
            return Err(HydroError::out_of_range("rirf step", step, n_steps));
        }
        self.body_mut(body)?.rirf[(rirf_row(row_dof, col), step)] = value;
        Ok(())
    }

    /// Checks that the impulse response time vector is strictly increasing.
    pub fn validate(&self) -> Result<()> {
        validate_rirf_time(&self.rirf_time)
    }
}

pub(crate) fn validate_rirf_time(t: &[f64]) -> Result<()> {
    if t.is_empty() {
        return Err(HydroError::Config("empty RIRF time vector".to_string()));
    }
    if let Some(i) = (1..t.len()).find(|&i| t[i] <= t[i - 1]) {
        return Err(HydroError::Config(format!(
            "RIRF time vector must be strictly increasing (t[{}] = {}, t[{}] = {})",
            i - 1,
            t[i - 1],
            i,
            t[i]
        )));
    }
    Ok(())
}

impl HydroData for HydroDatabase {
    fn n_bodies(&self) -> usize {
        self.bodies.len()
    }

    fn rho(&self) -> f64 {
        self.rho
    }

    fn lin_matrix(&self, body: usize) -> MatRef<'_, f64> {
        self.bodies[body].lin_matrix.as_ref()
    }

    fn disp_vol(&self, body: usize) -> f64 {
        self.bodies[body].disp_vol
    }

    fn cg(&self, body: usize) -> [f64; 3] {
        self.bodies[body].cg
    }

    fn cb(&self, body: usize) -> [f64; 3] {
        self.bodies[body].cb
    }

    fn added_mass(&self, body: usize) -> MatRef<'_, f64> {
        self.bodies[body].added_mass.as_ref()
    }

    fn rirf_time_vector(&self) -> &[f64] {
        &self.rirf_time
    }

    fn rirf_val(&self, body: usize, row_dof: usize, col: usize, step: usize) -> f64 {
        self.bodies[body].rirf[(rirf_row(row_dof, col), step)]
    }

    fn excitation(&self, body: usize) -> &ExcitationTable {
        &self.bodies[body].excitation
    }

    fn include_radiation(&self, body: usize) -> bool {
        self.bodies[body].include_radiation
    }

    fn include_excitation(&self, body: usize) -> bool {
        self.bodies[body].include_excitation
    }
}

#[cfg(test)]
mod tests {

    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn test_excitation_interpolation() {
        let table = ExcitationTable {
            frequencies: vec![0.5, 1.0, 2.0],
            magnitude: Mat::from_fn(6, 3, |i, j| (i + 1) as f64 * [1., 2., 4.][j]),
            phase: Mat::from_fn(6, 3, |_, j| [0., 0.2, 0.4][j]),
        };

        struct Case {
            omega: f64,
            mag_exp: f64,
            phase_exp: f64,
        }

        let test_cases = vec![
            Case {
                omega: 0.75,
                mag_exp: 1.5,
                phase_exp: 0.1,
            },
            Case {
                omega: 1.5,
                mag_exp: 3.0,
                phase_exp: 0.3,
            },
            Case {
                omega: 0.1,
                mag_exp: 1.0,
                phase_exp: 0.0,
            },
            Case {
                omega: 10.,
                mag_exp: 4.0,
                phase_exp: 0.4,
            },
        ];

        for case in test_cases {
            let (mag, phase) = table.at_frequency(0, case.omega);
            assert_relative_eq!(mag, case.mag_exp, epsilon = 1e-12);
            assert_relative_eq!(phase, case.phase_exp, epsilon = 1e-12);
        }

        let (mag, _) = table.at_frequency(2, 1.0);
        assert_relative_eq!(mag, 6.0, epsilon = 1e-12);
    }

    #[test]
    fn test_empty_excitation() {
        assert_eq!(ExcitationTable::default().at_frequency(3, 1.0), (0., 0.));
    }

    #[test]
    fn test_set_rirf() {
        let mut db = HydroDatabase::new(1000., 2, &[0., 0.1, 0.2]);
        db.set_rirf(1, 2, 8, 1, 3.5).unwrap();
        assert_eq!(db.rirf_val(1, 2, 8, 1), 3.5);
        assert_eq!(db.rirf_val(0, 2, 8, 1), 0.);
        assert!(db.set_rirf(0, 6, 0, 0, 1.).is_err());
        assert!(db.set_rirf(0, 0, 12, 0, 1.).is_err());
        assert!(db.set_rirf(0, 0, 0, 3, 1.).is_err());
        assert!(db.set_rirf(2, 0, 0, 0, 1.).is_err());
    }

    #[test]
    fn test_legacy_index() {
        assert_eq!(hydro_index_from_legacy(1).unwrap(), 0);
        assert_eq!(hydro_index_from_legacy(3).unwrap(), 2);
        assert!(hydro_index_from_legacy(0).is_err());
        assert_eq!(legacy_body_name(0), "body1");
    }

    #[test]
    fn test_body_index() {
        let mut db = HydroDatabase::new(1000., 3, &[0., 0.1]);
        assert_eq!(db.bodies[2].name, "body3");
        db.body_mut(1).unwrap().name = "float".to_string();

        assert_eq!(db.body_index("float"), Some(1));
        assert_eq!(db.body_index("body1"), Some(0));
        // Legacy numbering still resolves a renamed body
        assert_eq!(db.body_index("body2"), Some(1));
        assert_eq!(db.body_index("body0"), None);
        assert_eq!(db.body_index("body4"), None);
        assert_eq!(db.body_index("spar"), None);
    }

    #[test]
    fn test_added_mass_shape() {
        let mut db = HydroDatabase::new(1000., 2, &[0., 0.1]);
        db.body_mut(1).unwrap().added_mass[(2, 8)] = 7.;
        assert_eq!(db.added_mass(0).nrows(), 6);
        assert_eq!(db.added_mass(0).ncols(), 12);
        assert_eq!(db.added_mass(1)[(2, 8)], 7.);
        assert_eq!(db.added_mass(0)[(2, 8)], 0.);
    }

    #[test]
    fn test_validate_time_vector() {
        assert!(HydroDatabase::new(1000., 1, &[0., 0.1]).validate().is_ok());
        assert!(HydroDatabase::new(1000., 1, &[0., 0.1, 0.1]).validate().is_err());
        assert!(HydroDatabase::new(1000., 1, &[]).validate().is_err());
    }
}
