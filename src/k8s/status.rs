/// Deployment rollout status polling
use async_trait::async_trait;
use k8s_openapi::api::apps::v1::Deployment;
use kube::{Api, Client};
use std::time::Duration;

use super::ReadinessAssessor;
use crate::utils::polling::{PollingConfig, Progress};

/// Where a deployment's rollout currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutStatus {
    Current,
    InProgress(String),
    Failed(String),
}

/// Classify a deployment from its spec and status.
pub fn rollout_status(deployment: &Deployment) -> RolloutStatus {
    let status = match &deployment.status {
        Some(status) => status,
        None => return RolloutStatus::InProgress("no status reported yet".to_string()),
    };

    let generation = deployment.metadata.generation.unwrap_or(0);
    if status.observed_generation.unwrap_or(0) < generation {
        return RolloutStatus::InProgress(format!(
            "generation {} not yet observed",
            generation
        ));
    }

    let conditions = status.conditions.as_deref().unwrap_or_default();
    if conditions.iter().any(|c| {
        c.type_ == "Progressing" && c.reason.as_deref() == Some("ProgressDeadlineExceeded")
    }) {
        return RolloutStatus::Failed("progress deadline exceeded".to_string());
    }

    let desired = deployment
        .spec
        .as_ref()
        .and_then(|spec| spec.replicas)
        .unwrap_or(1);
    let updated = status.updated_replicas.unwrap_or(0);
    let replicas = status.replicas.unwrap_or(0);
    let available = status.available_replicas.unwrap_or(0);
    let ready = status.ready_replicas.unwrap_or(0);

    if updated < desired {
        return RolloutStatus::InProgress(format!(
            "{} of {} replicas updated",
            updated, desired
        ));
    }
    if replicas > updated {
        return RolloutStatus::InProgress(format!(
            "{} old replicas pending termination",
            replicas - updated
        ));
    }
    if available < updated {
        return RolloutStatus::InProgress(format!(
            "{} of {} updated replicas available",
            available, updated
        ));
    }
    if ready < desired {
        return RolloutStatus::InProgress(format!("{} of {} replicas ready", ready, desired));
    }
    if conditions
        .iter()
        .any(|c| c.type_ == "Available" && c.status != "True")
    {
        return RolloutStatus::InProgress("deployment not available".to_string());
    }

    RolloutStatus::Current
}

/// Polls deployments in one namespace until their rollout is current
pub struct DeploymentStatusChecker {
    api: Api<Deployment>,
    namespace: String,
    interval: Duration,
    timeout: Duration,
}

impl DeploymentStatusChecker {
    pub fn new(client: Client, namespace: &str, interval: Duration, timeout: Duration) -> Self {
        Self {
            api: Api::namespaced(client, namespace),
            namespace: namespace.to_string(),
            interval,
            timeout,
        }
    }
}

#[async_trait]
impl ReadinessAssessor for DeploymentStatusChecker {
    async fn assess(&self, name: &str) -> anyhow::Result<()> {
        let config = PollingConfig::new(
            self.timeout,
            self.interval,
            format!("deployment {}/{}", self.namespace, name),
        );

        config
            .poll(|| async {
                let deployment = match self.api.get_opt(name).await {
                    Ok(Some(deployment)) => deployment,
                    Ok(None) => return Ok(Progress::Pending("deployment not found".to_string())),
                    // API hiccups are retried until the timeout
                    Err(e) => return Ok(Progress::Pending(format!("API error: {}", e))),
                };

                match rollout_status(&deployment) {
                    RolloutStatus::Current => Ok(Progress::Ready(())),
                    RolloutStatus::InProgress(reason) => Ok(Progress::Pending(reason)),
                    RolloutStatus::Failed(reason) => {
                        anyhow::bail!("deployment {}/{}: {}", self.namespace, name, reason)
                    }
                }
            })
            .await
    }
}
