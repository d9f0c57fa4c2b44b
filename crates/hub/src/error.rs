use thiserror::Error;

/// Fatal configuration/parse errors. These fail startup — never defaulted
/// around.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown zone type: '{0}'")]
    UnknownZone(String),
    #[error("unknown comparison operator: '{0}'")]
    UnknownOperator(String),
    #[error("unknown species: '{0}'")]
    UnknownSpecies(String),
    #[error("unknown sensor unit: '{0}'")]
    UnknownUnit(String),
    #[error("unknown outlet power state: '{0}'")]
    UnknownPower(String),
    #[error("unknown control mode: '{0}'")]
    UnknownMode(String),
}

/// Transient outlet actuation failures. Caught at the call site, recorded
/// in the command audit trail, never allowed to stop the evaluation cycle.
#[derive(Debug, Clone, Error)]
pub enum OutletError {
    #[error("outlet '{outlet_id}' actuation failed: {message}")]
    Actuation { outlet_id: String, message: String },
}

/// Transient sensor read failures.
#[derive(Debug, Clone, Error)]
pub enum SensorError {
    #[error("sensor read failed: {0}")]
    Read(String),
}
