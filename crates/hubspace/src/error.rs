/// Errors returned by the HubSpace client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Credentials or token were rejected. The caller may re-authenticate.
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Transport failure or timeout.
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// The vendor answered with a status that is neither success nor an auth failure.
    #[error("Unexpected HTTP status {status}: {body}")]
    Http { status: u16, body: String },

    /// The response did not have the expected shape.
    #[error("Unrecognized response: {0}")]
    Parse(String),
}

impl Error {
    pub fn is_auth(&self) -> bool {
        matches!(self, Error::Auth(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
