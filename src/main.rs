/// flux-preflight - GitOps environment and controller checks
///
/// Verifies that kubectl and the Kubernetes API server meet the minimum
/// versions before installation, and that the controller deployments are
/// healthy afterwards.
mod check;
mod config;
mod error;
mod k8s;
mod kubectl;
mod utils;
mod version;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::check::{CheckContext, CheckFlags, ConsoleReporter};
use crate::config::{parse_duration, ConfigOverrides, GlobalConfig, DEFAULT_CONFIG_FILE};
use crate::k8s::KubernetesClient;
use crate::kubectl::Kubectl;

#[derive(Parser)]
#[command(name = "flux-preflight")]
#[command(about = "Check GitOps prerequisites and controller health", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (defaults to flux-preflight.yaml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Path to the kubeconfig file
    #[arg(long, global = true)]
    kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use
    #[arg(long, global = true)]
    context: Option<String>,

    /// Namespace the controllers are installed in
    #[arg(short, long, global = true)]
    namespace: Option<String>,

    /// Timeout for the whole operation, e.g. 90s, 5m, 1h30m
    #[arg(long, global = true, value_parser = parse_duration)]
    timeout: Option<Duration>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Check requirements and installation
    ///
    /// Validates that the local environment is configured correctly and
    /// that the installed components are healthy.
    Check(CheckArgs),

    /// Generate example configuration file
    Init,
}

#[derive(Args)]
struct CheckArgs {
    /// Only run pre-installation checks
    #[arg(long)]
    pre: bool,

    /// List of components, accepts comma-separated values
    #[arg(long, value_delimiter = ',')]
    components: Option<Vec<String>>,

    /// List of components in addition to those supplied or defaulted, accepts comma-separated values
    #[arg(long = "components-extra", value_delimiter = ',')]
    components_extra: Vec<String>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing; stdout is reserved for check output
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("flux_preflight={}", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // Only ring is compiled in, so a second install can only fail harmlessly
    let _ = rustls::crypto::ring::default_provider().install_default();

    let result = match &cli.command {
        Commands::Check(args) => run_check(&cli, args).await,
        Commands::Init => init_config(&cli).await,
    };

    match result {
        Ok(0) => {}
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Resolve the effective configuration from file and flags
fn load_config(cli: &Cli) -> Result<GlobalConfig> {
    GlobalConfig::load(cli.config.as_deref())
        .context("Failed to load configuration")?
        .with_overrides(ConfigOverrides {
            namespace: cli.namespace.clone(),
            kubeconfig: cli.kubeconfig.clone(),
            context: cli.context.clone(),
            timeout: cli.timeout,
        })
        .context("Invalid configuration")
}

/// Run the checks and return the process exit code
async fn run_check(cli: &Cli, args: &CheckArgs) -> Result<i32> {
    let config = load_config(cli)?;
    debug!("Effective configuration: {:?}", config);

    let flags = CheckFlags {
        pre: args.pre,
        components: args
            .components
            .clone()
            .unwrap_or_else(|| config.components.clone()),
        extra_components: args.components_extra.clone(),
    };

    let kubectl = Kubectl::new(&config);
    let cluster = KubernetesClient::new(&config);
    let ctx = CheckContext {
        config: &config,
        kubectl: &kubectl,
        cluster: &cluster,
        reporter: &ConsoleReporter,
    };

    let report = check::run_check(&ctx, &flags).await?;
    report.log_summary();

    Ok(report.exit_code())
}

/// Initialize example configuration file
async fn init_config(cli: &Cli) -> Result<i32> {
    let path = cli
        .config
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    if path.exists() {
        anyhow::bail!("Configuration file already exists: {}", path.display());
    }

    let yaml = serde_yaml::to_string(&GlobalConfig::example())?;

    tokio::fs::write(&path, yaml)
        .await
        .context("Failed to write configuration file")?;

    info!("Example configuration created: {}", path.display());
    info!("Next steps:");
    info!("  1. Edit the configuration file to match your cluster");
    info!("  2. Run the pre-installation checks:");
    info!("     flux-preflight check --pre");

    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_check_flags() {
        let cli = Cli::try_parse_from([
            "flux-preflight",
            "check",
            "--pre",
            "--components",
            "source-controller,helm-controller",
            "--components-extra",
            "image-reflector-controller",
            "--timeout",
            "2m",
            "-n",
            "gitops",
        ])
        .unwrap();

        let Commands::Check(args) = &cli.command else {
            panic!("expected check subcommand");
        };
        assert!(args.pre);
        assert_eq!(
            args.components.as_deref(),
            Some(&["source-controller".to_string(), "helm-controller".to_string()][..])
        );
        assert_eq!(args.components_extra, vec!["image-reflector-controller"]);
        assert_eq!(cli.timeout, Some(Duration::from_secs(120)));
        assert_eq!(cli.namespace.as_deref(), Some("gitops"));
    }

    #[test]
    fn test_components_default_to_none() {
        let cli = Cli::try_parse_from(["flux-preflight", "check"]).unwrap();
        let Commands::Check(args) = &cli.command else {
            panic!("expected check subcommand");
        };
        assert!(!args.pre);
        assert!(args.components.is_none());
        assert!(args.components_extra.is_empty());
    }

    #[test]
    fn test_rejects_bad_timeout() {
        assert!(Cli::try_parse_from(["flux-preflight", "check", "--timeout", "soon"]).is_err());
    }

    #[test]
    fn test_flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "namespace: from-file\ncontext: file-ctx\n").unwrap();

        let cli = Cli::try_parse_from([
            "flux-preflight",
            "--config",
            path.to_str().unwrap(),
            "check",
            "--namespace",
            "from-flag",
        ])
        .unwrap();

        let config = load_config(&cli).unwrap();
        assert_eq!(config.namespace, "from-flag");
        assert_eq!(config.context.as_deref(), Some("file-ctx"));
    }

    #[tokio::test]
    async fn test_init_writes_example_once() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("flux-preflight.yaml");
        let cli = Cli::try_parse_from([
            "flux-preflight",
            "init",
            "--config",
            path.to_str().unwrap(),
        ])
        .unwrap();

        assert_eq!(init_config(&cli).await.unwrap(), 0);
        assert_eq!(
            GlobalConfig::from_file(&path).unwrap(),
            GlobalConfig::example()
        );
        assert!(init_config(&cli).await.is_err());
    }
}
