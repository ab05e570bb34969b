/// Kubernetes API client construction and discovery
use anyhow::Context;
use async_trait::async_trait;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

use super::{ClusterProbe, DeploymentStatusChecker, ReadinessAssessor};
use crate::config::GlobalConfig;
use crate::error::CheckError;

/// Kubernetes client for the configured kubeconfig and context
pub struct KubernetesClient {
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    namespace: String,
}

impl KubernetesClient {
    pub fn new(config: &GlobalConfig) -> Self {
        Self {
            kubeconfig: config.kubeconfig.clone(),
            context: config.context.clone(),
            namespace: config.namespace.clone(),
        }
    }

    /// Resolve the client configuration from kubeconfig path and context
    pub async fn client_config(&self) -> Result<Config, CheckError> {
        let options = KubeConfigOptions {
            context: self.context.clone(),
            ..Default::default()
        };

        let config = match &self.kubeconfig {
            Some(path) => {
                debug!("Loading kubeconfig from {}", path.display());
                let kubeconfig = Kubeconfig::read_from(path)
                    .map_err(|e| CheckError::ClusterConfigFailed(e.to_string()))?;
                Config::from_custom_kubeconfig(kubeconfig, &options)
                    .await
                    .map_err(|e| CheckError::ClusterConfigFailed(e.to_string()))?
            }
            None if self.context.is_some() => Config::from_kubeconfig(&options)
                .await
                .map_err(|e| CheckError::ClusterConfigFailed(e.to_string()))?,
            // No explicit settings: KUBECONFIG, ~/.kube/config, then in-cluster
            None => Config::infer()
                .await
                .map_err(|e| CheckError::ClusterConfigFailed(e.to_string()))?,
        };

        debug!("Using API server {}", config.cluster_url);
        Ok(config)
    }

    /// Resolve the configuration and construct an API client
    pub async fn client(&self) -> Result<Client, CheckError> {
        let config = self.client_config().await?;
        Client::try_from(config).map_err(|e| CheckError::ClusterClientFailed(e.to_string()))
    }
}

#[async_trait]
impl ClusterProbe for KubernetesClient {
    async fn server_version(&self, deadline: Instant) -> Result<String, CheckError> {
        let client = self.client().await?;

        let info = tokio::time::timeout_at(deadline, client.apiserver_version())
            .await
            .map_err(|_| CheckError::ClusterCallFailed("deadline exceeded".to_string()))?
            .map_err(|e| CheckError::ClusterCallFailed(e.to_string()))?;

        debug!(
            "API server reports {} (platform {})",
            info.git_version, info.platform
        );
        Ok(info.git_version)
    }

    async fn status_checker(
        &self,
        interval: Duration,
        timeout: Duration,
    ) -> anyhow::Result<Box<dyn ReadinessAssessor>> {
        let client = self
            .client()
            .await
            .context("Failed to create status checker")?;

        Ok(Box::new(DeploymentStatusChecker::new(
            client,
            &self.namespace,
            interval,
            timeout,
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KUBECONFIG: &str = r#"apiVersion: v1
kind: Config
clusters:
- name: dev
  cluster:
    server: https://127.0.0.1:6443
    insecure-skip-tls-verify: true
contexts:
- name: dev
  context:
    cluster: dev
    user: dev
current-context: dev
users:
- name: dev
  user:
    token: abc123
"#;

    fn client_for(kubeconfig: PathBuf, context: Option<&str>) -> KubernetesClient {
        KubernetesClient::new(&GlobalConfig {
            kubeconfig: Some(kubeconfig),
            context: context.map(str::to_string),
            ..GlobalConfig::default()
        })
    }

    #[tokio::test]
    async fn test_client_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KUBECONFIG.as_bytes()).unwrap();

        let config = client_for(file.path().to_path_buf(), None)
            .client_config()
            .await
            .unwrap();
        assert_eq!(config.cluster_url.host(), Some("127.0.0.1"));
        assert_eq!(config.cluster_url.port_u16(), Some(6443));
    }

    #[tokio::test]
    async fn test_unknown_context_is_config_failure() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(KUBECONFIG.as_bytes()).unwrap();

        let err = client_for(file.path().to_path_buf(), Some("prod"))
            .client_config()
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::ClusterConfigFailed(_)));
    }

    #[tokio::test]
    async fn test_missing_kubeconfig_is_config_failure() {
        let err = client_for(PathBuf::from("/nonexistent/kubeconfig"), None)
            .server_version(Instant::now() + Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, CheckError::ClusterConfigFailed(_)));
        assert!(err
            .to_string()
            .starts_with("Kubernetes client initialization failed: "));
    }
}
