/// kubectl invocation
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use tokio::time::Instant;
use tracing::debug;

use crate::config::GlobalConfig;
use crate::error::CheckError;
use crate::utils::command::{find_on_path, CommandBuilder};

pub const KUBECTL: &str = "kubectl";

/// Runs kubectl against the configured cluster and captures its stdout
#[async_trait]
pub trait KubectlRunner: Send + Sync {
    /// Find the binary without running it
    fn locate(&self) -> Result<PathBuf, CheckError>;

    /// Run with `args`, killing the process if it outlives `deadline`
    async fn capture(&self, deadline: Instant, args: &[&str]) -> Result<Vec<u8>, CheckError>;
}

/// kubectl bound to a kubeconfig and context
pub struct Kubectl {
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
}

impl Kubectl {
    pub fn new(config: &GlobalConfig) -> Self {
        Self {
            kubeconfig: config.kubeconfig.clone(),
            context: config.context.clone(),
        }
    }
}

#[async_trait]
impl KubectlRunner for Kubectl {
    fn locate(&self) -> Result<PathBuf, CheckError> {
        find_on_path(KUBECTL).ok_or_else(|| CheckError::ToolAbsent {
            tool: KUBECTL.to_string(),
        })
    }

    async fn capture(&self, deadline: Instant, args: &[&str]) -> Result<Vec<u8>, CheckError> {
        debug!("kubectl {}", args.join(" "));

        let mut command = CommandBuilder::new(KUBECTL).deadline(deadline);
        if let Some(context) = &self.context {
            command = command.args(["--context", context.as_str()]);
        }
        if let Some(kubeconfig) = &self.kubeconfig {
            command = command.kubeconfig(kubeconfig);
        }

        command
            .args(args)
            .context(format!("kubectl {} failed", args.first().unwrap_or(&"")))
            .run()
            .await
            .map_err(|e| CheckError::ToolInvocationFailed {
                tool: KUBECTL.to_string(),
                cause: format!("{:#}", e),
            })
    }
}

/// Shape of `kubectl version --client --output json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionOutput {
    client_version: VersionInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VersionInfo {
    git_version: String,
}

/// Extract `clientVersion.gitVersion` from kubectl's JSON version report
pub fn decode_client_version(output: &[u8]) -> Result<String, CheckError> {
    serde_json::from_slice::<VersionOutput>(output)
        .map(|v| v.client_version.git_version)
        .map_err(|e| CheckError::OutputUndecodable {
            tool: KUBECTL.to_string(),
            cause: e.to_string(),
        })
}
