//! Error handling for the habit sync engine

use std::fmt;

use habit_sync_client::{ClientError, HabitId};
use thiserror::Error;

/// Unified error type for the sync engine
#[derive(Error, Debug)]
pub enum Error {
    /// A remote call failed
    #[error(transparent)]
    Client(#[from] ClientError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation needs a signed-in user
    #[error("No user is signed in")]
    NoUser,

    /// The habit is not part of the loaded list
    #[error("Unknown habit: {0}")]
    UnknownHabit(HabitId),

    /// No completion set has been loaded for the selected date yet
    #[error("Completions for the selected date are not loaded")]
    NotLoaded,
}

impl Error {
    /// Create a new configuration error
    pub fn config<T: fmt::Display>(msg: T) -> Self {
        Error::Config(msg.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
