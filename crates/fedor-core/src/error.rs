use thiserror::Error;

#[derive(Debug, Error)]
pub enum FedorError {
    #[error("invalid value for {key}: {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("configuration rejected: {0}")]
    InvalidConfig(String),

    #[error("invalid target '{0}': expected owner/repo#number")]
    InvalidTarget(String),

    #[error("missing signature header")]
    MissingSignature,

    #[error("malformed signature header: {0}")]
    MalformedSignature(String),

    #[error("signature mismatch")]
    SignatureMismatch,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl FedorError {
    /// `true` for the variants that mean the request is not authentic.
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            FedorError::MissingSignature
                | FedorError::MalformedSignature(_)
                | FedorError::SignatureMismatch
        )
    }
}

pub type Result<T> = std::result::Result<T, FedorError>;
