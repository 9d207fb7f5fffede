use drprune_core::PortError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    #[error("missing program")]
    MissingProgram,
    #[error("spawn failed: {0}")]
    Spawn(String),
    #[error("killed by signal")]
    KilledBySignal,
    #[error("io error: {0}")]
    Io(String),
    #[error("unexpected output: {0}")]
    Output(String),
    #[error("cancelled")]
    Cancelled,
}

pub type ExecResult<T> = Result<T, ExecError>;

impl From<std::io::Error> for ExecError {
    fn from(e: std::io::Error) -> Self {
        ExecError::Io(e.to_string())
    }
}

impl From<ExecError> for PortError {
    fn from(e: ExecError) -> Self {
        match e {
            ExecError::Cancelled => PortError::Cancelled,
            ExecError::Output(msg) => PortError::Decode(msg),
            other => PortError::Exec(other.to_string()),
        }
    }
}
