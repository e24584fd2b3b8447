// ABOUTME: OpenSSH-backed session connector using a multiplexed master connection
// ABOUTME: Authenticates once per run; every remote step reuses the master socket

use async_trait::async_trait;
use openssh::{KnownHosts, Session, SessionBuilder};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::command::{CommandOutput, RemoteCommand};
use super::error::{Result, SessionError};
use super::target::Target;
use super::{RemoteSession, SessionConnector};

/// Host key checking policy passed to the ssh client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KnownHostsPolicy {
    /// Refuse unknown or changed host keys
    Strict,
    /// Accept and remember unknown keys, refuse changed ones
    #[default]
    Add,
    /// Accept any key
    Accept,
}

impl From<KnownHostsPolicy> for KnownHosts {
    fn from(policy: KnownHostsPolicy) -> Self {
        match policy {
            KnownHostsPolicy::Strict => KnownHosts::Strict,
            KnownHostsPolicy::Add => KnownHosts::Add,
            KnownHostsPolicy::Accept => KnownHosts::Accept,
        }
    }
}

impl std::str::FromStr for KnownHostsPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "strict" => Ok(KnownHostsPolicy::Strict),
            "add" => Ok(KnownHostsPolicy::Add),
            "accept" => Ok(KnownHostsPolicy::Accept),
            other => Err(format!(
                "unknown known-hosts policy '{}' (expected strict, add or accept)",
                other
            )),
        }
    }
}

/// Connects through the system `ssh` binary
#[derive(Debug, Clone, Default)]
pub struct OpenSshConnector {
    known_hosts: KnownHostsPolicy,
    connect_timeout: Option<Duration>,
}

impl OpenSshConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known_hosts(mut self, policy: KnownHostsPolicy) -> Self {
        self.known_hosts = policy;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.connect_timeout = timeout;
        self
    }

    fn builder(&self, target: &Target) -> SessionBuilder {
        let mut builder = SessionBuilder::default();
        builder
            .user(target.user().to_string())
            .known_hosts_check(self.known_hosts.into());

        if let Some(port) = target.port() {
            builder.port(port);
        }
        if let Some(identity) = target.identity() {
            builder.keyfile(identity);
        }
        if let Some(timeout) = self.connect_timeout {
            builder.connect_timeout(timeout);
        }

        builder
    }
}

#[async_trait]
impl SessionConnector for OpenSshConnector {
    async fn open(&self, target: &Target) -> Result<Box<dyn RemoteSession>> {
        debug!(
            "Connecting to {} (known hosts: {:?})",
            target, self.known_hosts
        );

        let session = self
            .builder(target)
            .connect(target.host())
            .await
            .map_err(|e| SessionError::Connect {
                target: target.to_string(),
                message: e.to_string(),
            })?;

        Ok(Box::new(OpenSshSession {
            session: Some(session),
            target: target.clone(),
        }))
    }
}

pub struct OpenSshSession {
    session: Option<Session>,
    target: Target,
}

impl OpenSshSession {
    fn closed(&self) -> SessionError {
        SessionError::Transport {
            target: self.target.to_string(),
            message: "session already closed".to_string(),
        }
    }
}

#[async_trait]
impl RemoteSession for OpenSshSession {
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput> {
        let session = self.session.as_ref().ok_or_else(|| self.closed())?;
        let line = command.to_shell_line();
        debug!("[{}] run: {}", self.target, line);

        let output = session
            .raw_command(&line)
            .output()
            .await
            .map_err(|e| SessionError::Transport {
                target: self.target.to_string(),
                message: e.to_string(),
            })?;

        Ok(CommandOutput::from(output))
    }

    async fn close(&mut self) -> Result<()> {
        match self.session.take() {
            Some(session) => session.close().await.map_err(|e| SessionError::Close {
                target: self.target.to_string(),
                message: e.to_string(),
            }),
            None => Ok(()),
        }
    }
}
