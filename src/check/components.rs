/// Controller deployment health checks
use tracing::debug;

use super::CheckContext;
use crate::error::CheckError;
use crate::k8s::ReadinessAssessor;
use crate::utils::polling::deadline_after;

/// Outcome of checking one deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentCheckResult {
    pub name: String,
    pub healthy: bool,
    pub error: Option<CheckError>,
    pub image: Option<String>,
}

/// Arguments for `kubectl get` printing every image of a deployment, quoted
fn image_query<'a>(namespace: &'a str, name: &'a str) -> [&'a str; 7] {
    [
        "-n",
        namespace,
        "get",
        "deployment",
        name,
        "-o",
        "jsonpath=\"{..image}\"",
    ]
}

fn trim_quotes(output: &str) -> &str {
    let output = output.trim();
    let output = output.strip_prefix('"').unwrap_or(output);
    output.strip_suffix('"').unwrap_or(output)
}

/// Assess each deployment in order and report its running image.
///
/// A failed assessment marks that deployment unhealthy and moves on to the
/// next one; image lookups are best effort.
pub async fn components_check(
    ctx: &CheckContext<'_>,
    assessor: &dyn ReadinessAssessor,
    deployments: &[String],
) -> Vec<DeploymentCheckResult> {
    let deadline = deadline_after(ctx.config.timeout);
    let mut results = Vec::with_capacity(deployments.len());

    for name in deployments {
        let error = match assessor.assess(name).await {
            Ok(()) => {
                ctx.reporter.success(&format!("{}: healthy", name));
                None
            }
            Err(e) => {
                let error = CheckError::DeploymentUnhealthy {
                    name: name.clone(),
                    cause: format!("{:#}", e),
                };
                ctx.reporter.failure(&error.to_string());
                Some(error)
            }
        };

        let image = match ctx
            .kubectl
            .capture(deadline, &image_query(&ctx.config.namespace, name))
            .await
        {
            Ok(output) => {
                let image = trim_quotes(&String::from_utf8_lossy(&output)).to_string();
                Some(image).filter(|i| !i.is_empty())
            }
            Err(e) => {
                debug!("Skipping image lookup for {}: {}", name, e);
                None
            }
        };
        if let Some(image) = &image {
            ctx.reporter.action(image);
        }

        results.push(DeploymentCheckResult {
            name: name.clone(),
            healthy: error.is_none(),
            error,
            image,
        });
    }

    results
}
