pub mod config;
pub mod error;
pub mod hydro_data;
pub mod hydro_forces;
pub mod hydrostatics;
pub mod quadrature;
pub mod radiation;
pub mod setup;
pub mod system;
pub mod util;
pub mod waves;
