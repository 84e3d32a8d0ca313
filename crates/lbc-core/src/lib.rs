//! lbc-core - Core types for the Lightbend Console installer
//!
//! This crate holds the parts of the installer that never touch a process or
//! the cluster:
//! - `SetOverride`: helm-style `key=value[,key=value]` overrides with quoting support
//! - `Passthrough`: pre-parsed arguments forwarded verbatim to helm
//! - `ChartReference`: local chart archive or repository chart
//! - `Credentials`: commercial registry credentials and the values file handed to helm
//! - `ToolVersion`: lenient version parsing for external tool output

pub mod chart;
pub mod credentials;
pub mod error;
pub mod passthrough;
pub mod set_string;
pub mod version;

pub use chart::ChartReference;
pub use credentials::{
    CREDENTIALS_FILE_ENV, Credentials, DEFAULT_CREDENTIALS_FILE, PASSWORD_ENV, USERNAME_ENV,
};
pub use error::{CoreError, Result};
pub use passthrough::{Passthrough, ResolvedNamespace};
pub use set_string::{SetOverride, parse_set_string};
pub use version::ToolVersion;
