// ABOUTME: Remote session module: one authenticated connection reused for a whole run
// ABOUTME: Defines the connector/session traits and the scope that guarantees close

pub mod command;
pub mod error;
pub mod ssh;
pub mod target;

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, info};

pub use command::{CommandOutput, RemoteCommand};
pub use error::{Result, SessionError};
pub use ssh::{KnownHostsPolicy, OpenSshConnector};
pub use target::Target;

/// One open, authenticated connection to a target
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Issue a command without re-authenticating
    async fn run(&self, command: &RemoteCommand) -> Result<CommandOutput>;

    /// Release the connection. Called at most once.
    async fn close(&mut self) -> Result<()>;
}

/// Opens sessions to targets
#[async_trait]
pub trait SessionConnector: Send + Sync {
    async fn open(&self, target: &Target) -> Result<Box<dyn RemoteSession>>;
}

/// Owns the run's session slot.
///
/// The session is opened lazily on the first remote step, so purely local
/// tasks never touch the network. The runner calls [`SessionScope::close`] on
/// every exit path.
pub struct SessionScope {
    connector: Arc<dyn SessionConnector>,
    target: Option<Target>,
    session: Option<Box<dyn RemoteSession>>,
}

impl SessionScope {
    pub fn new(connector: Arc<dyn SessionConnector>, target: Option<Target>) -> Self {
        Self {
            connector,
            target,
            session: None,
        }
    }

    pub fn target(&self) -> Option<&Target> {
        self.target.as_ref()
    }

    /// The open session, connecting first if needed
    pub async fn session(&mut self) -> Result<&dyn RemoteSession> {
        if self.session.is_none() {
            let target = self.target.as_ref().ok_or(SessionError::NoTarget)?;
            info!("Opening session to {}", target);
            let session = self.connector.open(target).await?;
            self.session = Some(session);
        }

        match self.session.as_deref() {
            Some(session) => Ok(session),
            None => Err(SessionError::NoTarget),
        }
    }

    /// Close the session if one was opened. Safe to call repeatedly.
    pub async fn close(&mut self) -> Result<()> {
        if let Some(mut session) = self.session.take() {
            if let Some(target) = self.target.as_ref() {
                debug!("Closing session to {}", target);
            }
            session.close().await?;
        }
        Ok(())
    }
}
