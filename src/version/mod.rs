/// Version parsing and range matching for prerequisite checks
use semver::Version;
use std::cmp::Ordering;
use std::str::FromStr;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("short version cannot contain pre-release or build metadata: {0}")]
    ShortWithMetadata(String),

    #[error("invalid version {input}: {reason}")]
    Invalid { input: String, reason: String },

    #[error("invalid range {input}: {reason}")]
    InvalidRange { input: String, reason: String },
}

/// Parse a version string leniently.
///
/// Accepts a leading letter prefix (`v1.18.0`), leading zeros in numeric
/// components and a missing minor or patch (`1.18` becomes `1.18.0`).
pub fn parse_tolerant(input: &str) -> Result<Version, VersionError> {
    let trimmed = input
        .trim()
        .trim_start_matches(|c: char| c.is_ascii_alphabetic());

    let mut parts: Vec<String> = trimmed
        .splitn(3, '.')
        .map(|part| {
            if part.len() > 1 {
                let stripped = part.trim_start_matches('0');
                if stripped.starts_with(|c: char| c.is_ascii_digit()) {
                    stripped.to_string()
                } else {
                    format!("0{}", stripped)
                }
            } else {
                part.to_string()
            }
        })
        .collect();

    if parts.len() < 3 {
        if let Some(last) = parts.last() {
            if last.contains(['+', '-']) {
                return Err(VersionError::ShortWithMetadata(input.to_string()));
            }
        }
        parts.resize(3, "0".to_string());
    }

    let normalized = parts.join(".");
    Version::parse(&normalized).map_err(|e| VersionError::Invalid {
        input: input.to_string(),
        reason: e.to_string(),
    })
}

/// Parse `actual` tolerantly and test it against the range `required`.
///
/// Returns the parsed version alongside the outcome so callers can display it.
pub fn satisfies(actual: &str, required: &str) -> Result<(Version, bool), VersionError> {
    let range: VersionRange = required.parse()?;
    let version = parse_tolerant(actual)?;
    let ok = range.matches(&version);
    Ok((version, ok))
}

/// Compare by semantic-version precedence, ignoring build metadata.
fn precedence(a: &Version, b: &Version) -> Ordering {
    (a.major, a.minor, a.patch, &a.pre).cmp(&(b.major, b.minor, b.patch, &b.pre))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
}

impl Op {
    const ALL: [(&'static str, Op); 7] = [
        (">=", Op::Ge),
        ("<=", Op::Le),
        ("==", Op::Eq),
        ("!=", Op::Ne),
        (">", Op::Gt),
        ("<", Op::Lt),
        ("=", Op::Eq),
    ];

    fn split(token: &str) -> (Op, &str) {
        Self::ALL
            .iter()
            .find_map(|(prefix, op)| token.strip_prefix(prefix).map(|rest| (*op, rest)))
            .unwrap_or((Op::Eq, token))
    }

    fn holds(self, ordering: Ordering) -> bool {
        match self {
            Op::Eq => ordering == Ordering::Equal,
            Op::Ne => ordering != Ordering::Equal,
            Op::Gt => ordering == Ordering::Greater,
            Op::Ge => ordering != Ordering::Less,
            Op::Lt => ordering == Ordering::Less,
            Op::Le => ordering != Ordering::Greater,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Comparator {
    op: Op,
    bound: Version,
}

impl Comparator {
    fn matches(&self, version: &Version) -> bool {
        self.op.holds(precedence(version, &self.bound))
    }
}

/// A version range such as `>=1.18.0`, `>=1.16.0 <2.0.0` or `<1.0.0 || >=2.0.0`.
///
/// Whitespace-separated comparators must all hold; `||` separates alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    alternatives: Vec<Vec<Comparator>>,
}

impl VersionRange {
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives
            .iter()
            .any(|all| all.iter().all(|c| c.matches(version)))
    }
}

impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| VersionError::InvalidRange {
            input: input.to_string(),
            reason,
        };

        let mut alternatives = Vec::new();
        for group in input.split("||") {
            // Glue a detached operator onto the version that follows it (">= 1.2.3")
            let mut tokens: Vec<String> = Vec::new();
            for token in group.split_whitespace() {
                match tokens.last_mut() {
                    Some(prev) if prev.chars().all(|c| "<>=!".contains(c)) => prev.push_str(token),
                    _ => tokens.push(token.to_string()),
                }
            }
            if tokens.is_empty() {
                return Err(invalid("empty comparator set".to_string()));
            }

            let comparators = tokens
                .iter()
                .map(|token| {
                    let (op, raw) = Op::split(token);
                    Version::parse(raw)
                        .map(|bound| Comparator { op, bound })
                        .map_err(|e| invalid(format!("{}: {}", token, e)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            alternatives.push(comparators);
        }

        Ok(Self { alternatives })
    }
}
