pub mod auth;
pub mod conversation;
pub mod documents;
pub mod sessions;

pub use conversation::{ConversationController, ConversationError};
pub use documents::{filter_documents, DocumentsController, FileKind};

use crate::api::ApiError;
use crate::settings::SettingsError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Validation(&'static str),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("could not read {}: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Settings(#[from] SettingsError),
}

impl CommandError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, CommandError::Api(err) if err.is_unauthorized())
    }

    pub fn user_message(&self) -> String {
        match self {
            CommandError::Api(err) => err.user_message(),
            other => other.to_string(),
        }
    }
}

pub type CommandResult<T> = Result<T, CommandError>;
