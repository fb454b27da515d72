//! Error types for Maestro.
//!
//! The variant set matches the closed list of error kinds a deployment can
//! fail with. Every variant is carried through to the persisted deployment
//! record as the user-visible failure cause.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("missing field: {0}")]
    MissingField(String),

    #[error("upstream not found: {0}")]
    UpstreamNotFound(String),

    #[error("upstream fault (http): {0}")]
    UpstreamHttpFault(String),

    #[error("upstream fault (store): {0}")]
    UpstreamStoreFault(String),

    #[error("image application '{found}' does not match deployment application '{expected}'")]
    MismatchedImage { expected: String, found: String },

    #[error("incompatible instance type: {0}")]
    IncompatibleInstanceType(String),

    #[error("unknown security groups: {0:?}")]
    UnknownSecurityGroups(Vec<String>),

    #[error("missing load balancers: {0:?}")]
    MissingLoadBalancers(Vec<String>),

    #[error("no subnets for zone(s): {0:?}")]
    NoSubnets(Vec<String>),

    #[error("no matching zones: {0:?}")]
    NoMatchingZones(Vec<String>),

    #[error("unexpected status while {operation}: {status}")]
    UnexpectedRemoteStatus { operation: String, status: u16 },

    #[error("Auto Scaling Group does not exist.")]
    AsgNotFound,

    #[error("configuration missing for {0}")]
    ConfigurationMissing(String),

    #[error("configuration service returned an unexpected response: {0}")]
    ConfigurationUnexpectedResponse(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether this is the one pipeline-step error kind allowed to retry
    /// instead of failing the deployment outright (`check-configuration`).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ConfigurationUnexpectedResponse(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
