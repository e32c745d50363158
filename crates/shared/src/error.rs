//! Error types for LiveDesk

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeskError {
    #[error("Invalid channel name: {0}")]
    InvalidChannel(String),

    #[error("Invalid sender role: {0}")]
    InvalidSender(String),
}
