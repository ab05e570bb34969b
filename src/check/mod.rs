/// Pre-installation and installation checks
pub mod components;
pub mod prerequisites;
pub mod report;

use tracing::debug;

use crate::config::GlobalConfig;
use crate::k8s::ClusterProbe;
use crate::kubectl::KubectlRunner;
use crate::utils::polling::deadline_after;

pub use components::{components_check, DeploymentCheckResult};
pub use prerequisites::{
    kubectl_check, kubernetes_check, PrerequisiteResult, KUBECTL_MIN_VERSION,
    KUBERNETES_MIN_VERSION,
};
pub use report::{ConsoleReporter, Reporter};

/// Collaborators and settings shared by every check in one run
pub struct CheckContext<'a> {
    pub config: &'a GlobalConfig,
    pub kubectl: &'a dyn KubectlRunner,
    pub cluster: &'a dyn ClusterProbe,
    pub reporter: &'a dyn Reporter,
}

/// Options of the `check` subcommand
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CheckFlags {
    /// Only run pre-installation checks
    pub pre: bool,
    pub components: Vec<String>,
    pub extra_components: Vec<String>,
}

impl CheckFlags {
    /// Deployments to check: `components` then `extra_components`, duplicates kept
    pub fn deployments(&self) -> Vec<String> {
        self.components
            .iter()
            .chain(self.extra_components.iter())
            .cloned()
            .collect()
    }
}

/// Everything a run found, in the order it was checked
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub prerequisites: Vec<PrerequisiteResult>,
    /// `None` when only pre-installation checks ran
    pub components: Option<Vec<DeploymentCheckResult>>,
}

impl CheckReport {
    pub fn prerequisites_passed(&self) -> bool {
        self.prerequisites.iter().all(PrerequisiteResult::passed)
    }

    pub fn components_passed(&self) -> bool {
        self.components
            .as_ref()
            .map_or(true, |results| results.iter().all(|r| r.healthy))
    }

    pub fn passed(&self) -> bool {
        self.prerequisites_passed() && self.components_passed()
    }

    pub fn exit_code(&self) -> i32 {
        if self.passed() {
            0
        } else {
            1
        }
    }

    /// Trace every result at debug level
    pub fn log_summary(&self) {
        for p in &self.prerequisites {
            debug!(component = p.component, required = p.required, passed = p.passed());
        }
        for c in self.components.iter().flatten() {
            debug!(
                deployment = %c.name,
                healthy = c.healthy,
                image = c.image.as_deref().unwrap_or("-"),
                error = %c.error.as_ref().map(|e| e.to_string()).unwrap_or_default(),
            );
        }
    }
}

fn report_prerequisite(reporter: &dyn Reporter, result: &PrerequisiteResult) {
    match &result.outcome {
        Ok(_) => reporter.success(&result.message()),
        Err(e) => {
            if let Some(cause) = e.cause() {
                debug!("{} check failed: {}", result.component, cause);
            }
            reporter.failure(&result.message());
        }
    }
}

/// Run the prerequisite checks and, unless `flags.pre`, the controller checks.
///
/// Both prerequisites always run so every problem shows up in one pass. The
/// only error returned is failure to build the readiness assessor.
pub async fn run_check(ctx: &CheckContext<'_>, flags: &CheckFlags) -> anyhow::Result<CheckReport> {
    let deadline = deadline_after(ctx.config.timeout);

    ctx.reporter.action("checking prerequisites");

    let kubectl = kubectl_check(ctx, deadline, KUBECTL_MIN_VERSION).await;
    report_prerequisite(ctx.reporter, &kubectl);

    let kubernetes = kubernetes_check(ctx, deadline, KUBERNETES_MIN_VERSION).await;
    report_prerequisite(ctx.reporter, &kubernetes);

    let mut report = CheckReport {
        prerequisites: vec![kubectl, kubernetes],
        components: None,
    };

    if flags.pre {
        if report.passed() {
            ctx.reporter.success("prerequisites checks passed");
        } else {
            ctx.reporter.failure("prerequisites checks failed");
        }
        return Ok(report);
    }

    ctx.reporter.action("checking controllers");
    let assessor = ctx
        .cluster
        .status_checker(ctx.config.poll_interval, ctx.config.poll_timeout)
        .await?;
    report.components = Some(components_check(ctx, assessor.as_ref(), &flags.deployments()).await);

    if report.passed() {
        ctx.reporter.success("all checks passed");
    } else {
        ctx.reporter.failure("some checks failed");
    }
    Ok(report)
}


#[cfg(test)]
mod tests {
    use super::fakes::{FakeCluster, FakeKubectl};
    use super::report::testing::RecordingReporter;
    use super::report::LineKind;
    use super::*;
    use crate::error::CheckError;
    use tokio_test::{assert_err, assert_ok};

    fn flags(pre: bool, components: &[&str], extra: &[&str]) -> CheckFlags {
        CheckFlags {
            pre,
            components: components.iter().map(|s| s.to_string()).collect(),
            extra_components: extra.iter().map(|s| s.to_string()).collect(),
        }
    }

    async fn run(
        kubectl: &FakeKubectl,
        cluster: &FakeCluster,
        reporter: &RecordingReporter,
        flags: &CheckFlags,
    ) -> anyhow::Result<CheckReport> {
        let config = GlobalConfig::default();
        let ctx = CheckContext {
            config: &config,
            kubectl,
            cluster,
            reporter,
        };
        run_check(&ctx, flags).await
    }

    #[test]
    fn test_deployments_concatenate_in_order() {
        let f = flags(false, &["a", "b"], &["c", "a"]);
        assert_eq!(f.deployments(), vec!["a", "b", "c", "a"]);
    }

    #[tokio::test]
    async fn test_pre_only_passes() {
        let kubectl = FakeKubectl::with_client_version("v1.29.2");
        let cluster = FakeCluster::with_version("v1.29.0");
        let reporter = RecordingReporter::default();

        let report = assert_ok!(
            run(&kubectl, &cluster, &reporter, &flags(true, &["a", "b"], &[])).await
        );

        assert_eq!(report.exit_code(), 0);
        assert!(report.components.is_none());
        assert!(cluster.assessed().is_empty());
        assert_eq!(kubectl.calls().len(), 1);
        assert_eq!(
            reporter.lines(),
            vec![
                (LineKind::Action, "checking prerequisites".to_string()),
                (LineKind::Success, "kubectl 1.29.2 >=1.18.0".to_string()),
                (LineKind::Success, "Kubernetes 1.29.0 >=1.16.0".to_string()),
                (LineKind::Success, "prerequisites checks passed".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_unbounded_timeout_does_not_overflow_deadline() {
        let config = GlobalConfig {
            timeout: std::time::Duration::MAX,
            ..GlobalConfig::default()
        };
        let kubectl = FakeKubectl::with_client_version("v1.29.2");
        let cluster = FakeCluster::with_version("v1.29.0");
        let reporter = RecordingReporter::default();
        let ctx = CheckContext {
            config: &config,
            kubectl: &kubectl,
            cluster: &cluster,
            reporter: &reporter,
        };

        let report = assert_ok!(run_check(&ctx, &flags(false, &["source-controller"], &[])).await);
        assert_eq!(report.exit_code(), 0);
        assert_eq!(cluster.assessed(), vec!["source-controller"]);
    }

    #[tokio::test]
    async fn test_full_run_with_one_unhealthy_deployment() {
        let kubectl = FakeKubectl::with_client_version("v1.29.2");
        let cluster = FakeCluster::with_version("v1.29.0").unhealthy(&["kustomize-controller"]);
        let reporter = RecordingReporter::default();
        let f = flags(
            false,
            &["source-controller", "kustomize-controller", "helm-controller"],
            &[],
        );

        let report = assert_ok!(run(&kubectl, &cluster, &reporter, &f).await);

        assert_eq!(report.exit_code(), 1);
        assert!(report.prerequisites_passed());
        assert!(!report.components_passed());
        assert_eq!(
            cluster.assessed(),
            vec!["source-controller", "kustomize-controller", "helm-controller"]
        );
        assert_eq!(
            reporter.of(LineKind::Success),
            vec![
                "kubectl 1.29.2 >=1.18.0",
                "Kubernetes 1.29.0 >=1.16.0",
                "source-controller: healthy",
                "helm-controller: healthy",
            ]
        );
        let failures = reporter.of(LineKind::Failure);
        assert_eq!(failures.len(), 2);
        assert!(failures[0].starts_with("kustomize-controller: "));
        assert_eq!(failures[1], "some checks failed");
    }

    #[tokio::test]
    async fn test_full_run_all_healthy() {
        let kubectl = FakeKubectl::with_client_version("v1.29.2");
        let cluster = FakeCluster::with_version("v1.29.0");
        let reporter = RecordingReporter::default();

        let report = assert_ok!(
            run(&kubectl, &cluster, &reporter, &flags(false, &["a"], &["b"])).await
        );

        assert_eq!(report.exit_code(), 0);
        assert_eq!(cluster.assessed(), vec!["a", "b"]);
        assert_eq!(
            reporter.lines().last(),
            Some(&(LineKind::Success, "all checks passed".to_string()))
        );
    }

    #[tokio::test]
    async fn test_pre_only_kubectl_absent_fails() {
        let kubectl = FakeKubectl::absent();
        let cluster = FakeCluster::with_version("v1.29.0");
        let reporter = RecordingReporter::default();

        let report = assert_ok!(run(&kubectl, &cluster, &reporter, &flags(true, &["a"], &[])).await);

        assert_eq!(report.exit_code(), 1);
        assert!(report.prerequisites[1].passed());
        assert!(kubectl.calls().is_empty());
        assert_eq!(
            reporter.of(LineKind::Failure),
            vec!["kubectl not found", "prerequisites checks failed"]
        );
        assert_eq!(
            reporter.of(LineKind::Success),
            vec!["Kubernetes 1.29.0 >=1.16.0"]
        );
    }

    #[tokio::test]
    async fn test_both_prerequisites_reported_when_both_fail() {
        let kubectl = FakeKubectl::absent();
        let cluster = FakeCluster::failing(CheckError::ClusterCallFailed(
            "connection refused".to_string(),
        ));
        let reporter = RecordingReporter::default();

        let report = assert_ok!(run(&kubectl, &cluster, &reporter, &flags(false, &["a"], &[])).await);

        // Controllers are still checked after failed prerequisites
        assert_eq!(report.exit_code(), 1);
        assert_eq!(cluster.assessed(), vec!["a"]);
        let failures = reporter.of(LineKind::Failure);
        assert_eq!(failures[0], "kubectl not found");
        assert_eq!(failures[1], "Kubernetes API call failed: connection refused");
    }

    #[tokio::test]
    async fn test_status_checker_error_is_fatal() {
        let kubectl = FakeKubectl::with_client_version("v1.29.2");
        let cluster =
            FakeCluster::with_version("v1.29.0").broken_status_checker("invalid kubeconfig");
        let reporter = RecordingReporter::default();

        let err = assert_err!(run(&kubectl, &cluster, &reporter, &flags(false, &["a"], &[])).await);

        assert_eq!(err.to_string(), "invalid kubeconfig");
        assert!(cluster.assessed().is_empty());
    }
}
