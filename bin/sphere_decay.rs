use std::{env, f64::consts::PI, fs::File, io::Write};

use itertools::Itertools;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

use hydrodyn::{
    config::parse_hydro_config,
    hydro_data::{HydroData, HydroDatabase},
    setup::{setup_hydro_from_config, SimulationParams},
    system::System,
};

const CONFIG: &str = r#"
hydrodynamics:
  bodies:
    - name: sphere
  waves:
    type: no_wave
  radiation_convolution_mode: TaperedDirect
  td_rirf_end_time: 8.0
"#;

/// Heave decay of a floating hemisphere released 1 m above equilibrium.
fn main() -> Result<(), Box<dyn std::error::Error>> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let output = env::args().nth(1).unwrap_or("sphere_decay.csv".to_string());

    let rho = 1025.;
    let radius: f64 = 5.;
    let time_step = 0.01;
    let duration = 40.;

    //--------------------------------------------------------------------------
    // Hydrodynamic data
    //--------------------------------------------------------------------------

    let rirf_time = (0..=100).map(|i| 0.1 * i as f64).collect_vec();
    let mut data = HydroDatabase::new(rho, 1, &rirf_time);
    let sphere = data.body_index("body1").ok_or("no body1 in hydro data")?;
    {
        let body = data.body_mut(sphere)?;
        body.disp_vol = 2. / 3. * PI * radius.powi(3);
        body.cg = [0., 0., -2.];
        body.cb = [0., 0., -3. / 8. * radius];
        body.lin_matrix[(2, 2)] = PI * radius * radius;
        // Deep-water hemisphere heave added mass, half the displaced mass
        body.added_mass[(2, 2)] = 0.5 * rho * body.disp_vol;
    }
    // Heave-heave impulse response of a damped oscillator
    for (step, t) in rirf_time.iter().enumerate() {
        data.set_rirf(sphere, 2, 2, step, 1.2e5 * (-0.8 * t).exp() * (1.1 * t).cos())?;
    }

    let mass = rho * data.disp_vol(sphere);

    //--------------------------------------------------------------------------
    // System
    //--------------------------------------------------------------------------

    let mut system = System::new();
    let id = system.add_body("sphere").position(0., 0., -1.).build();

    let config = parse_hydro_config(CONFIG)?;
    let params = SimulationParams {
        timestep: time_step,
        duration,
        ..Default::default()
    };
    let forces = setup_hydro_from_config(&config, &mut system, data, &params)?;
    let added_mass = forces.borrow().added_mass(sphere)?[(2, 2)];
    tracing::info!("heave mass {:.1}, added mass {:.1}", mass, added_mass);

    let mut file = File::create(&output)?;
    file.write_fmt(format_args!("time,heave,heave_velocity,force\n"))?;

    let n_steps = (duration / time_step).round() as usize;
    for i in 0..=n_steps {
        let t = (i as f64) * time_step;
        system.set_time(t);
        system.apply_loads()?;

        // Semi-implicit Euler in heave, gravity applied by the driver
        let body = system.body_mut(id)?;
        let fz = body.applied_force[2] - mass * 9.81;
        let state = &mut body.state;
        state.linear_velocity[2] += time_step * fz / (mass + added_mass);
        state.position[2] += time_step * state.linear_velocity[2];

        file.write_fmt(format_args!(
            "{},{},{},{}\n",
            t, state.position[2], state.linear_velocity[2], body.applied_force[2]
        ))?;
    }

    forces.borrow().log_profile_stats();
    tracing::info!("wrote {} steps to {}", n_steps + 1, output);
    Ok(())
}
