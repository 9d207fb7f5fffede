use drprune_core::PortError;
use drprune_exec::ExecError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("http request failed: {0}")]
    HttpRequest(#[from] reqwest::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error(transparent)]
    Exec(#[from] ExecError),
}

impl From<serde_json::Error> for ClientError {
    fn from(e: serde_json::Error) -> Self {
        ClientError::InvalidResponse(e.to_string())
    }
}

impl From<ClientError> for PortError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::HttpRequest(e) => PortError::Transport(e.to_string()),
            ClientError::Url(e) => PortError::Transport(e.to_string()),
            ClientError::Status { status, body } => PortError::Status { status, body },
            ClientError::InvalidResponse(msg) => PortError::Decode(msg),
            ClientError::Exec(e) => e.into(),
        }
    }
}
