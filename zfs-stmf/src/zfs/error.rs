use thiserror::Error;

#[derive(Error, Debug)]
pub enum ZfsError {
    #[error("dataset '{0}' not found")]
    NotFound(String),

    #[error("dataset '{0}' already exists")]
    AlreadyExists(String),

    #[error("invalid dataset name: {0}")]
    InvalidName(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("command `{command}` failed: {output}")]
    CommandFailed { command: String, output: String },

    #[error("failed to parse zfs output: {0}")]
    ParseError(String),

    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("property '{0}' cannot be changed")]
    PropertyReadOnly(String),

    #[error("invalid value '{value}' for property '{property}': {reason}")]
    InvalidValue {
        property: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ZfsError {
    pub(crate) fn command_failed(argv: &[String], output: &crate::command::CommandOutput) -> Self {
        let (command, output) = crate::command::describe_failure(argv, output);
        ZfsError::CommandFailed { command, output }
    }
}

pub type Result<T> = std::result::Result<T, ZfsError>;
