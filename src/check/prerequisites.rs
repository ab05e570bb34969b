/// Local tooling and cluster version checks
use semver::Version;
use tokio::time::Instant;
use tracing::debug;

use super::CheckContext;
use crate::error::CheckError;
use crate::kubectl::{decode_client_version, KUBECTL};
use crate::version::{satisfies, VersionError};

pub const KUBECTL_MIN_VERSION: &str = ">=1.18.0";
pub const KUBERNETES_MIN_VERSION: &str = ">=1.16.0";

/// Outcome of one prerequisite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrerequisiteResult {
    pub component: &'static str,
    pub required: &'static str,
    pub outcome: Result<Version, CheckError>,
}

impl PrerequisiteResult {
    pub fn passed(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Line shown to the user, e.g. "kubectl 1.29.2 >=1.18.0"
    pub fn message(&self) -> String {
        match &self.outcome {
            Ok(version) => format!("{} {} {}", self.component, version, self.required),
            Err(e) => e.to_string(),
        }
    }
}

/// Compare a reported version against a minimum, naming the component in errors
fn check_version(
    component: &str,
    actual: &str,
    required: &str,
    unparseable_verb: &'static str,
) -> Result<Version, CheckError> {
    match satisfies(actual, required) {
        Ok((version, true)) => Ok(version),
        Ok((version, false)) => Err(CheckError::VersionBelowMinimum {
            component: component.to_string(),
            required: required.to_string(),
            actual: version.to_string(),
        }),
        Err(VersionError::InvalidRange { input, .. }) => Err(CheckError::VersionUnparseable {
            component: component.to_string(),
            verb: "parsed",
            input,
        }),
        Err(_) => Err(CheckError::VersionUnparseable {
            component: component.to_string(),
            verb: unparseable_verb,
            input: actual.to_string(),
        }),
    }
}

async fn probe_kubectl(
    ctx: &CheckContext<'_>,
    deadline: Instant,
    required: &str,
) -> Result<Version, CheckError> {
    let path = ctx.kubectl.locate()?;
    debug!("Found kubectl at {}", path.display());

    let output = ctx
        .kubectl
        .capture(deadline, &["version", "--client", "--output", "json"])
        .await?;
    let git_version = decode_client_version(&output)?;

    check_version(KUBECTL, &git_version, required, "parsed")
}

/// Verify kubectl is installed and recent enough
pub async fn kubectl_check(
    ctx: &CheckContext<'_>,
    deadline: Instant,
    required: &'static str,
) -> PrerequisiteResult {
    PrerequisiteResult {
        component: KUBECTL,
        required,
        outcome: probe_kubectl(ctx, deadline, required).await,
    }
}

/// Verify the API server is reachable and recent enough
pub async fn kubernetes_check(
    ctx: &CheckContext<'_>,
    deadline: Instant,
    required: &'static str,
) -> PrerequisiteResult {
    let outcome = match ctx.cluster.server_version(deadline).await {
        Ok(git_version) => check_version("Kubernetes", &git_version, required, "determined"),
        Err(e) => Err(e),
    };

    PrerequisiteResult {
        component: "Kubernetes",
        required,
        outcome,
    }
}
