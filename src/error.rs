/// Error types for environment and controller checks
use thiserror::Error;

/// Reasons a single check can fail.
///
/// Each variant names the component under check so the rendered line reads
/// on its own, e.g. "kubectl version must be >=1.18.0".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CheckError {
    /// External binary not on PATH
    #[error("{tool} not found")]
    ToolAbsent { tool: String },

    /// Binary found, but running it or capturing its output failed
    #[error("{tool} version can't be determined")]
    ToolInvocationFailed { tool: String, cause: String },

    /// Captured output is not the JSON document we asked for
    #[error("{tool} version output can't be unmarshaled")]
    OutputUndecodable { tool: String, cause: String },

    /// A version string could not be tolerantly parsed
    #[error("{component} version can't be {verb}")]
    VersionUnparseable {
        component: String,
        verb: &'static str,
        input: String,
    },

    /// Parsed version does not satisfy the required range
    #[error("{component} version must be {required}")]
    VersionBelowMinimum {
        component: String,
        required: String,
        actual: String,
    },

    #[error("Kubernetes client initialization failed: {0}")]
    ClusterConfigFailed(String),

    #[error("Kubernetes client initialization failed: {0}")]
    ClusterClientFailed(String),

    #[error("Kubernetes API call failed: {0}")]
    ClusterCallFailed(String),

    /// Readiness assessment reported failure for a deployment
    #[error("{name}: {cause}")]
    DeploymentUnhealthy { name: String, cause: String },
}

impl CheckError {
    /// Underlying cause, when the display message does not already carry it
    pub fn cause(&self) -> Option<&str> {
        match self {
            CheckError::ToolInvocationFailed { cause, .. }
            | CheckError::OutputUndecodable { cause, .. } => Some(cause),
            CheckError::VersionUnparseable { input, .. } => Some(input),
            CheckError::VersionBelowMinimum { actual, .. } => Some(actual),
            _ => None,
        }
    }
}
