/// Kubernetes cluster access
pub mod client;
pub mod status;

use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;

use crate::error::CheckError;

pub use client::KubernetesClient;
pub use status::DeploymentStatusChecker;

/// Remote control-plane operations the checks depend on
#[async_trait]
pub trait ClusterProbe: Send + Sync {
    /// Server `gitVersion`, e.g. "v1.29.2"
    async fn server_version(&self, deadline: Instant) -> Result<String, CheckError>;

    /// Build the readiness assessor shared by all deployment checks
    async fn status_checker(
        &self,
        interval: Duration,
        timeout: Duration,
    ) -> anyhow::Result<Box<dyn ReadinessAssessor>>;
}

/// Decides whether a named deployment has finished rolling out
#[async_trait]
pub trait ReadinessAssessor: Send + Sync {
    async fn assess(&self, name: &str) -> anyhow::Result<()>;
}
