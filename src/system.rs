use crate::error::{HydroError, Result};

/// Kinematic state of a rigid body as seen by the hydrodynamic loads.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodyState {
    /// Position of the reference point in world coordinates
    pub position: [f64; 3],
    /// Orientation quaternion `[w, x, y, z]`
    pub orientation: [f64; 4],
    /// Linear velocity in world coordinates
    pub linear_velocity: [f64; 3],
    /// Angular velocity in world (parent) coordinates
    pub angular_velocity: [f64; 3],
}

impl Default for BodyState {
    fn default() -> Self {
        Self {
            position: [0.; 3],
            orientation: [1., 0., 0., 0.],
            linear_velocity: [0.; 3],
            angular_velocity: [0.; 3],
        }
    }
}

impl BodyState {
    /// Returns the 6-DOF velocity (linear followed by angular).
    pub fn velocity(&self) -> [f64; 6] {
        let (v, w) = (self.linear_velocity, self.angular_velocity);
        [v[0], v[1], v[2], w[0], w[1], w[2]]
    }
}

/// A 6-DOF force/torque callback evaluated by the host once per force evaluation.
pub trait AppliedLoad {
    /// Returns `[fx, fy, fz, mx, my, mz]` in world coordinates.
    fn evaluate(&self, host: &dyn HostSystem) -> Result<[f64; 6]>;
}

/// The multibody host the hydrodynamic loads are attached to.
///
/// All bodies share one simulation time and one gravity vector.
pub trait HostSystem {
    fn time(&self) -> f64;

    fn gravity(&self) -> [f64; 3];

    /// Returns the current state of body `id`, or `None` if it doesn't exist.
    fn body_state(&self, id: usize) -> Option<BodyState>;

    /// Looks up a body id by name.
    fn body_id(&self, name: &str) -> Option<usize>;

    /// Registers a load to be applied to body `id`.
    fn add_load(&mut self, id: usize, load: Box<dyn AppliedLoad>) -> Result<()>;
}

//------------------------------------------------------------------------------
// System
//------------------------------------------------------------------------------

pub struct Body {
    pub id: usize,
    pub name: String,
    pub state: BodyState,
    /// Sum of registered loads from the last call to [`System::apply_loads`]
    pub applied_force: [f64; 6],
}

struct RegisteredLoad {
    body_id: usize,
    load: Box<dyn AppliedLoad>,
}

/// Minimal rigid-body host holding time, gravity and body kinematics.
///
/// It doesn't integrate anything; drivers update body states and time
/// between calls to [`System::apply_loads`].
pub struct System {
    time: f64,
    gravity: [f64; 3],
    pub bodies: Vec<Body>,
    loads: Vec<RegisteredLoad>,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    pub fn new() -> Self {
        Self {
            time: 0.,
            gravity: [0., 0., -9.81],
            bodies: vec![],
            loads: vec![],
        }
    }

    /// Set the gravity acceleration in each direction
    pub fn set_gravity(&mut self, x: f64, y: f64, z: f64) {
        self.gravity = [x, y, z];
    }

    pub fn set_time(&mut self, time: f64) {
        self.time = time;
    }

    pub fn n_bodies(&self) -> usize {
        self.bodies.len()
    }

    pub fn n_loads(&self) -> usize {
        self.loads.len()
    }

    pub fn body_mut(&mut self, id: usize) -> Result<&mut Body> {
        let n = self.bodies.len();
        self.bodies.get_mut(id).ok_or(HydroError::out_of_range("body", id, n))
    }

    /// Creates and returns a body builder for adding a new body to the system
    pub fn add_body(&mut self, name: &str) -> BodyBuilder<'_> {
        let id = self.bodies.len();
        self.bodies.push(Body {
            id,
            name: name.to_string(),
            state: BodyState::default(),
            applied_force: [0.; 6],
        });
        BodyBuilder {
            body: &mut self.bodies[id],
        }
    }

    /// Evaluates every registered load at the current state and stores the
    /// per-body sums in [`Body::applied_force`].
    pub fn apply_loads(&mut self) -> Result<()> {
        let mut totals = vec![[0.; 6]; self.bodies.len()];
        for reg in self.loads.iter() {
            let f = reg.load.evaluate(self)?;
            totals[reg.body_id]
                .iter_mut()
                .zip(f.iter())
                .for_each(|(t, &fi)| *t += fi);
        }
        self.bodies
            .iter_mut()
            .zip(totals)
            .for_each(|(body, f)| body.applied_force = f);
        Ok(())
    }
}

impl HostSystem for System {
    fn time(&self) -> f64 {
        self.time
    }

    fn gravity(&self) -> [f64; 3] {
        self.gravity
    }

    fn body_state(&self, id: usize) -> Option<BodyState> {
        self.bodies.get(id).map(|b| b.state)
    }

    fn body_id(&self, name: &str) -> Option<usize> {
        self.bodies.iter().find(|b| b.name == name).map(|b| b.id)
    }

    fn add_load(&mut self, id: usize, load: Box<dyn AppliedLoad>) -> Result<()> {
        if id >= self.bodies.len() {
            return Err(HydroError::MissingBody(id));
        }
        self.loads.push(RegisteredLoad { body_id: id, load });
        Ok(())
    }
}

//------------------------------------------------------------------------------
// Builder
//------------------------------------------------------------------------------

pub struct BodyBuilder<'a> {
    body: &'a mut Body,
}

impl<'a> BodyBuilder<'a> {
    /// Sets position of the body reference point
    pub fn position(self, x: f64, y: f64, z: f64) -> Self {
        self.body.state.position = [x, y, z];
        self
    }

    /// Sets orientation from quaternion
    pub fn orientation(self, w: f64, x: f64, y: f64, z: f64) -> Self {
        self.body.state.orientation = [w, x, y, z];
        self
    }

    /// Sets linear velocity
    pub fn velocity(self, x: f64, y: f64, z: f64) -> Self {
        self.body.state.linear_velocity = [x, y, z];
        self
    }

    /// Sets angular velocity in world coordinates
    pub fn angular_velocity(self, x: f64, y: f64, z: f64) -> Self {
        self.body.state.angular_velocity = [x, y, z];
        self
    }

    pub fn build(self) -> usize {
        self.body.id
    }
}
