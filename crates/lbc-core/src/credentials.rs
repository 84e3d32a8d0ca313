//! Commercial registry credentials
//!
//! Credentials come from the environment first and fall back to a
//! `key = value` credentials file:
//!
//! ```text
//! realm = Cloudsmith API
//! host = commercial-registry.lightbend.com
//! user = someone
//! password = "secret"
//! ```
//!
//! They are never put on a command line. helm receives them through a
//! temporary values file that is removed when the handle is dropped.

use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tempfile::NamedTempFile;

use crate::error::{CoreError, Result};

pub const USERNAME_ENV: &str = "LIGHTBEND_COMMERCIAL_USERNAME";
pub const PASSWORD_ENV: &str = "LIGHTBEND_COMMERCIAL_PASSWORD";
pub const CREDENTIALS_FILE_ENV: &str = "LIGHTBEND_COMMERCIAL_CREDENTIALS";

/// Default credentials file, relative to the home directory
pub const DEFAULT_CREDENTIALS_FILE: &str = "~/.lightbend/commercial.credentials";

static ENTRY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(\S+)\s*=\s*(".*?"|\S+)"#).expect("valid regex"));

/// Username/password pair for the commercial registry
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CredentialsValues<'a> {
    image_credentials: ImageCredentials<'a>,
}

#[derive(Serialize)]
struct ImageCredentials<'a> {
    username: &'a str,
    password: &'a str,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Resolve from the process environment, falling back to `file`
    pub fn resolve(file: &Path) -> Result<Self> {
        Self::resolve_with(
            std::env::var(USERNAME_ENV).ok(),
            std::env::var(PASSWORD_ENV).ok(),
            file,
        )
    }

    /// Resolve from explicit environment values, falling back to `file`
    ///
    /// Both environment values must be present to skip the file.
    pub fn resolve_with(
        env_username: Option<String>,
        env_password: Option<String>,
        file: &Path,
    ) -> Result<Self> {
        if let (Some(username), Some(password)) = (env_username, env_password) {
            return Ok(Self { username, password });
        }
        Self::from_file(file)
    }

    /// Read `user` and `password` from a credentials file
    pub fn from_file(path: &Path) -> Result<Self> {
        let path = expand_home(path);
        let content = std::fs::read_to_string(&path).map_err(|e| CoreError::Credentials {
            message: format!("unable to read {}: {}", path.display(), e),
        })?;
        Self::parse(&content).ok_or_else(|| CoreError::Credentials {
            message: format!(
                "credentials missing, please check your credentials file\n{}={}",
                CREDENTIALS_FILE_ENV,
                path.display()
            ),
        })
    }

    /// Parse credentials file content; `None` when user or password is missing
    pub fn parse(content: &str) -> Option<Self> {
        let entries: HashMap<&str, &str> = ENTRY
            .captures_iter(content)
            .filter_map(|caps| {
                let key = caps.get(1)?.as_str();
                let value = caps.get(2)?.as_str();
                Some((key, value.trim_matches('"')))
            })
            .collect();

        Some(Self {
            username: entries.get("user")?.to_string(),
            password: entries.get("password")?.to_string(),
        })
    }

    /// Render the helm values document carrying these credentials
    pub fn to_values_yaml(&self) -> Result<String> {
        let values = CredentialsValues {
            image_credentials: ImageCredentials {
                username: &self.username,
                password: &self.password,
            },
        };
        Ok(serde_yaml::to_string(&values)?)
    }

    /// Write the values document to a temporary file
    ///
    /// The file is deleted when the returned handle is dropped.
    pub fn write_values_file(&self) -> Result<NamedTempFile> {
        let mut file = tempfile::Builder::new()
            .prefix("lbc-credentials-")
            .suffix(".yaml")
            .tempfile()?;
        file.write_all(self.to_values_yaml()?.as_bytes())?;
        file.flush()?;
        Ok(file)
    }
}

/// Expand a leading `~` to the home directory
pub fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}
