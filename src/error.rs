use thiserror::Error;

/// Errors raised while setting up or evaluating hydrodynamic forces.
#[derive(Error, Debug)]
pub enum HydroError {
    /// Wave type string in the configuration is not recognized.
    #[error("Unsupported wave type: {0}")]
    UnsupportedWaveType(String),

    #[error("Unsupported wave spectrum: {0}")]
    UnsupportedSpectrum(String),

    /// An option value is outside its valid range or conflicts with another.
    #[error("invalid option '{name}': {reason}")]
    InvalidOption { name: String, reason: String },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("Tried to compute the radiation damping convolution twice within the same time step! (t = {time})")]
    DuplicateStep { time: f64 },

    #[error("interpolation error; rirf_query_time not bracketed (query = {query}, newer = {newer}, older = {older})")]
    NotBracketed { query: f64, newer: f64, older: f64 },

    #[error("{what} index {index} out of range (len = {len})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        len: usize,
    },

    #[error("body {0} not found in host system")]
    MissingBody(usize),

    #[error("hydrodynamic forces require at least one body")]
    NoBodies,

    #[error("hydro data describes {expected} bodies but {found} were given")]
    BodyCountMismatch { expected: usize, found: usize },

    /// A body force hookup outlived the coordinator it points to.
    #[error("hydrodynamic force coordinator was dropped while loads are still registered")]
    CoordinatorDropped,

    #[error("hydrodynamic force coordinator is already borrowed")]
    CoordinatorBusy,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
}

impl HydroError {
    pub fn invalid_option(name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOption {
            name: name.into(),
            reason: reason.into(),
        }
    }

    pub fn out_of_range(what: &'static str, index: usize, len: usize) -> Self {
        Self::IndexOutOfRange { what, index, len }
    }
}

pub type Result<T> = std::result::Result<T, HydroError>;
