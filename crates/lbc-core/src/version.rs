//! Lenient version numbers for external tool output
//!
//! Tools print their versions in many shapes (`Client: v2.16.1+gbbdfe5e`,
//! `v3.3.2+g8b29c4a`, `minikube version: v0.30.0`). The first
//! `major.minor[.patch]` group found in the text is taken and compared as
//! semver, with a missing patch treated as `0`.

use regex::Regex;
use semver::Version;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use crate::error::{CoreError, Result};

static VERSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([0-9]+)\.([0-9]+)(?:\.([0-9]+))?").expect("valid regex")
});

/// A version extracted from tool output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolVersion {
    version: Version,
    text: String,
}

impl ToolVersion {
    /// Find the first version-looking group in `output`
    pub fn find(output: &str) -> Option<Self> {
        let caps = VERSION.captures(output)?;
        let major = caps[1].parse().ok()?;
        let minor = caps[2].parse().ok()?;
        let patch = match caps.get(3) {
            Some(m) => m.as_str().parse().ok()?,
            None => 0,
        };
        Some(Self {
            version: Version::new(major, minor, patch),
            text: caps[0].to_string(),
        })
    }

    pub fn major(&self) -> u64 {
        self.version.major
    }

    pub fn as_semver(&self) -> &Version {
        &self.version
    }

    /// True when this version is at least `minimum`
    pub fn satisfies(&self, minimum: &ToolVersion) -> bool {
        self.version >= minimum.version
    }
}

impl FromStr for ToolVersion {
    type Err = CoreError;

    /// Parse an exact `major.minor[.patch]` string, such as a minimum requirement
    fn from_str(s: &str) -> Result<Self> {
        let padded = match s.matches('.').count() {
            1 => format!("{}.0", s),
            _ => s.to_string(),
        };
        Ok(Self {
            version: Version::parse(&padded)?,
            text: s.to_string(),
        })
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}
