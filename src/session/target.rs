// ABOUTME: Immutable description of the remote host a run executes against
// ABOUTME: Host, user, optional port and optional identity file reference

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

/// The remote host/user identity remote steps execute against.
///
/// Built once at process start and shared by reference for the whole run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Target {
    host: String,
    user: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    port: Option<u16>,
    #[serde(skip)]
    identity: Option<PathBuf>,
}

impl Target {
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            user: user.into(),
            port: None,
            identity: None,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn with_identity(mut self, identity: impl Into<PathBuf>) -> Self {
        self.identity = Some(identity.into());
        self
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn user(&self) -> &str {
        &self.user
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    pub fn identity(&self) -> Option<&Path> {
        self.identity.as_deref()
    }

    /// `user@host`, as handed to ssh
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.port {
            Some(port) => write!(f, "{}@{}:{}", self.user, self.host, port),
            None => write!(f, "{}@{}", self.user, self.host),
        }
    }
}
