use thiserror::Error;

use crate::command::{CommandOutput, describe_failure};

#[derive(Error, Debug)]
pub enum StmfError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("{0} already exists")]
    AlreadyExists(String),

    #[error("invalid name: {0}")]
    InvalidName(String),

    #[error("command `{command}` failed: {output}")]
    CommandFailed { command: String, output: String },

    #[error("failed to parse stmfadm output: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StmfError {
    pub(crate) fn command_failed(argv: &[String], output: &CommandOutput) -> Self {
        let (command, output) = describe_failure(argv, output);
        StmfError::CommandFailed { command, output }
    }
}

pub type Result<T> = std::result::Result<T, StmfError>;
