/// Configuration management for flux-preflight
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file picked up from the working directory when `--config` is not given
pub const DEFAULT_CONFIG_FILE: &str = "flux-preflight.yaml";

/// Upper bound for `timeout` and `poll_timeout`
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 3600);

/// Settings shared by every subcommand
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GlobalConfig {
    /// Namespace the controllers are installed in
    pub namespace: String,

    /// Path to the kubeconfig file (falls back to KUBECONFIG / ~/.kube/config)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kubeconfig: Option<PathBuf>,

    /// Kubeconfig context to use (falls back to the current context)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,

    /// Upper bound for a single command invocation
    #[serde(with = "duration_str")]
    pub timeout: Duration,

    /// Controller deployments checked by default
    pub components: Vec<String>,

    /// How often a deployment's rollout status is polled
    #[serde(with = "duration_str")]
    pub poll_interval: Duration,

    /// How long a single deployment may take to become ready
    #[serde(with = "duration_str")]
    pub poll_timeout: Duration,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            namespace: "flux-system".to_string(),
            kubeconfig: None,
            context: None,
            timeout: Duration::from_secs(5 * 60),
            components: [
                "source-controller",
                "kustomize-controller",
                "helm-controller",
                "notification-controller",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            poll_interval: Duration::from_secs(1),
            poll_timeout: Duration::from_secs(30),
        }
    }
}

/// Values given on the command line; `None` keeps the configured value
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub namespace: Option<String>,
    pub kubeconfig: Option<PathBuf>,
    pub context: Option<String>,
    pub timeout: Option<Duration>,
}

impl GlobalConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let config: GlobalConfig = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load an explicit config file, or the default one if it exists, or defaults
    pub fn load(explicit: Option<&Path>) -> anyhow::Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Apply command line values on top of the loaded configuration
    pub fn with_overrides(mut self, overrides: ConfigOverrides) -> anyhow::Result<Self> {
        if let Some(namespace) = overrides.namespace {
            self.namespace = namespace;
        }
        if overrides.kubeconfig.is_some() {
            self.kubeconfig = overrides.kubeconfig;
        }
        if overrides.context.is_some() {
            self.context = overrides.context;
        }
        if let Some(timeout) = overrides.timeout {
            self.timeout = timeout;
        }
        self.validate()?;
        Ok(self)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.namespace.is_empty() {
            anyhow::bail!("namespace cannot be empty");
        }

        if self.components.iter().any(|c| c.trim().is_empty()) {
            anyhow::bail!("component names cannot be empty");
        }

        if self.timeout.is_zero() {
            anyhow::bail!("timeout must be greater than zero");
        }

        if self.timeout > MAX_TIMEOUT {
            anyhow::bail!(
                "timeout ({}) cannot exceed {}",
                format_duration(self.timeout),
                format_duration(MAX_TIMEOUT)
            );
        }

        if self.poll_timeout > MAX_TIMEOUT {
            anyhow::bail!(
                "poll_timeout ({}) cannot exceed {}",
                format_duration(self.poll_timeout),
                format_duration(MAX_TIMEOUT)
            );
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than zero");
        }

        if self.poll_interval > self.poll_timeout {
            anyhow::bail!(
                "poll_interval ({}) cannot exceed poll_timeout ({})",
                format_duration(self.poll_interval),
                format_duration(self.poll_timeout)
            );
        }

        Ok(())
    }

    /// Generate an example configuration file
    pub fn example() -> Self {
        Self {
            context: Some("kind-flux".to_string()),
            ..Self::default()
        }
    }
}

/// Parse durations like `90s`, `5m`, `1h30m` or a bare number of seconds
pub fn parse_duration(input: &str) -> anyhow::Result<Duration> {
    let input = input.trim();
    if input.is_empty() {
        anyhow::bail!("empty duration");
    }
    if let Ok(secs) = input.parse::<u64>() {
        return Ok(Duration::from_secs(secs));
    }

    let mut total = Duration::ZERO;
    let mut digits = String::new();
    let mut chars = input.chars().peekable();

    while let Some(c) = chars.next() {
        if c.is_ascii_digit() {
            digits.push(c);
            continue;
        }

        let unit = if c == 'm' && chars.peek() == Some(&'s') {
            chars.next();
            "ms"
        } else {
            match c {
                'h' => "h",
                'm' => "m",
                's' => "s",
                other => anyhow::bail!("invalid duration {:?}: unknown unit '{}'", input, other),
            }
        };

        let value: u64 = digits
            .parse()
            .with_context(|| format!("invalid duration {:?}: missing number before '{}'", input, unit))?;
        digits.clear();

        let part = match unit {
            "h" => value.checked_mul(3600).map(Duration::from_secs),
            "m" => value.checked_mul(60).map(Duration::from_secs),
            "s" => Some(Duration::from_secs(value)),
            _ => Some(Duration::from_millis(value)),
        };
        total = part
            .and_then(|part| total.checked_add(part))
            .with_context(|| format!("invalid duration {:?}: too large", input))?;
    }

    if !digits.is_empty() {
        anyhow::bail!("invalid duration {:?}: missing unit after {}", input, digits);
    }

    Ok(total)
}

/// Render a duration in the same notation `parse_duration` accepts
pub fn format_duration(duration: Duration) -> String {
    if duration.subsec_millis() != 0 {
        return format!("{}ms", duration.as_millis());
    }

    let secs = duration.as_secs();
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    let mut out = String::new();
    if h > 0 {
        out.push_str(&format!("{}h", h));
    }
    if m > 0 {
        out.push_str(&format!("{}m", m));
    }
    if s > 0 || out.is_empty() {
        out.push_str(&format!("{}s", s));
    }
    out
}

mod duration_str {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&super::format_duration(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Secs(u64),
            Text(String),
        }

        match Raw::deserialize(deserializer)? {
            Raw::Secs(secs) => Ok(Duration::from_secs(secs)),
            Raw::Text(text) => super::parse_duration(&text).map_err(serde::de::Error::custom),
        }
    }
}
