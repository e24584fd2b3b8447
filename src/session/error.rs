// ABOUTME: Error types for remote session operations
// ABOUTME: Covers connecting, issuing commands over, and closing a session

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to connect to {target}: {message}")]
    Connect { target: String, message: String },

    #[error("Command transport to {target} failed: {message}")]
    Transport { target: String, message: String },

    #[error("Failed to close session to {target}: {message}")]
    Close { target: String, message: String },

    #[error("No target configured for remote steps")]
    NoTarget,
}

pub type Result<T> = std::result::Result<T, SessionError>;
