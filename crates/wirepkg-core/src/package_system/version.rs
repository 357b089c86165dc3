use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};

/// Error type for version parsing
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum VersionError {
    #[error("Invalid version format: '{0}'")]
    InvalidFormat(String),
    #[error("Invalid version constraint '{constraint}': {message}")]
    InvalidConstraint { constraint: String, message: String },
}

/// Represents a version requirement range using semver constraints.
///
/// Accepts Cargo-style requirements (`^1.2`, `>=1.0, <2.0`) as well as the
/// npm forms found in package manifests: whitespace separated comparators
/// (`>=1.0.0 <2.0.0`), hyphen ranges (`1.0.0 - 2.0.0`) and `||`
/// alternatives. A bare full version (`1.2.3`) means exactly that version.
#[derive(Debug, Clone)]
pub struct VersionRange {
    /// The original constraint string
    constraint: String,
    /// One requirement per `||` alternative
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Range matching every version
    pub fn any() -> Self {
        Self { constraint: "*".to_string(), alternatives: vec![VersionReq::STAR] }
    }

    /// Creates a new version range from a constraint string.
    pub fn from_constraint(constraint: &str) -> Result<Self, VersionError> {
        let trimmed = constraint.trim();
        if trimmed.is_empty() {
            return Ok(Self { constraint: constraint.to_string(), alternatives: vec![VersionReq::STAR] });
        }

        let mut alternatives = Vec::new();
        for alternative in trimmed.split("||") {
            let normalized = normalize_alternative(alternative).map_err(|message| {
                VersionError::InvalidConstraint { constraint: constraint.to_string(), message }
            })?;
            let req = VersionReq::parse(&normalized).map_err(|e| VersionError::InvalidConstraint {
                constraint: constraint.to_string(),
                message: e.to_string(),
            })?;
            alternatives.push(req);
        }

        Ok(Self { constraint: constraint.to_string(), alternatives })
    }

    /// Checks if a specific `semver::Version` satisfies this range.
    pub fn includes(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// Returns the original constraint string.
    pub fn constraint_string(&self) -> &str {
        &self.constraint
    }
}

/// Rewrites one npm-style alternative into Cargo requirement syntax.
fn normalize_alternative(alternative: &str) -> Result<String, String> {
    let tokens: Vec<&str> = alternative
        .split(|c: char| c.is_whitespace() || c == ',')
        .filter(|t| !t.is_empty())
        .collect();

    if tokens.is_empty() {
        return Err("empty alternative".to_string());
    }

    // `A - B` hyphen range
    if tokens.len() == 3 && tokens[1] == "-" {
        return Ok(format!(">={}, <={}", tokens[0], tokens[2]));
    }
    if tokens.contains(&"-") {
        return Err(format!("malformed hyphen range '{}'", alternative.trim()));
    }

    let mut comparators = Vec::new();
    let mut pending_op: Option<&str> = None;
    for token in tokens {
        if token.chars().all(|c| "<>=~^".contains(c)) {
            // Operator written apart from its version, as in `>= 1.2.0`
            if pending_op.replace(token).is_some() {
                return Err(format!("dangling operator before '{}'", token));
            }
            continue;
        }
        let comparator = match pending_op.take() {
            Some(op) => format!("{}{}", op, token),
            None => exact_if_bare(token),
        };
        comparators.push(comparator);
    }
    if let Some(op) = pending_op {
        return Err(format!("operator '{}' has no version", op));
    }

    Ok(comparators.join(", "))
}

fn exact_if_bare(token: &str) -> String {
    if matches!(token, "x" | "X") {
        return "*".to_string();
    }
    let token = token.strip_prefix('v').unwrap_or(token);
    let starts_with_digit = token.chars().next().is_some_and(|c| c.is_ascii_digit());
    let has_wildcard = token.contains(['*', 'x', 'X']);
    if starts_with_digit && !has_wildcard {
        format!("={}", token)
    } else {
        token.to_string()
    }
}

/// Extracts the first `major[.minor[.patch]]` run from `text`, padding
/// missing parts with zero and dropping any pre-release or build suffix.
pub fn coerce_version(text: &str) -> Option<Version> {
    let start = text.find(|c: char| c.is_ascii_digit())?;
    let numeric: String = text[start..]
        .chars()
        .take_while(|c| c.is_ascii_digit() || *c == '.')
        .collect();

    let mut parts = numeric.split('.').filter(|p| !p.is_empty()).map(str::parse::<u64>);
    let major = parts.next()?.ok()?;
    let minor = parts.next().and_then(|p| p.ok()).unwrap_or(0);
    let patch = parts.next().and_then(|p| p.ok()).unwrap_or(0);
    Some(Version::new(major, minor, patch))
}

/// Parses a manifest version, accepting a leading `v`.
pub fn parse_version(text: &str) -> Result<Version, VersionError> {
    let trimmed = text.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(trimmed).map_err(|_| VersionError::InvalidFormat(text.to_string()))
}

/// Implement Display to show the original constraint string.
impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.constraint)
    }
}

/// Allow parsing directly from a string slice.
impl FromStr for VersionRange {
    type Err = VersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        VersionRange::from_constraint(s)
    }
}
