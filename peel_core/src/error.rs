use thiserror::Error;

#[derive(Debug, Error, Clone)]
pub enum KernelError {
    #[error("hardware error: {0}")]
    Hardware(String),
    #[error("invalid state: {0}")]
    State(String),
    #[error("io error: {0}")]
    Io(String),
}

/// Protocol-level faults: reported to the host, never mutate state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown command '{0}'")]
    UnknownCommand(char),
    #[error("command '{0}' requires a numeric payload")]
    MissingPayload(char),
    #[error("invalid payload for '{0}': {1}")]
    InvalidPayload(char, String),
    #[error("command line exceeds {0} bytes")]
    LineTooLong(usize),
    #[error("empty command line")]
    EmptyLine,
}

/// Faults that abort the calibration wizard, leaving the previous
/// calibration in place.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CalibrationError {
    #[error("timed out waiting for operator input")]
    Timeout,
    #[error("weight entry exceeded {0} digits")]
    TooManyDigits(usize),
    #[error("known weight must be greater than zero grams")]
    InvalidWeight,
    #[error("derived scale is zero or not finite")]
    DegenerateScale,
    #[error("load cell error during calibration: {0}")]
    Sensor(String),
}

#[derive(Debug, Error, Clone)]
pub enum BuildError {
    #[error("missing motion engine")]
    MissingMotion,
    #[error("missing load cell")]
    MissingLoadCell,
    #[error("missing host link")]
    MissingLink,
    #[error("missing non-volatile store")]
    MissingStore,
    #[error("missing limit switches")]
    MissingSwitches,
    #[error("invalid config: {0}")]
    InvalidConfig(&'static str),
}

/// Map a boxed seam error from a capability trait to a typed kernel error.
pub fn map_hw_error(e: &(dyn std::error::Error + 'static)) -> KernelError {
    KernelError::Hardware(e.to_string())
}

pub type Result<T> = eyre::Result<T>;
pub use eyre::Report;
