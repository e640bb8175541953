use thiserror::Error;

/// Caller input that cannot be turned into a request
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("Missing required field: {0}")]
    EmptyField(&'static str),

    #[error("Temperature must be within [0, 1], got {0}")]
    TemperatureOutOfRange(f32),

    #[error("max_output_tokens must be greater than zero")]
    ZeroMaxTokens,

    #[error("Unknown {kind}: {value}")]
    UnknownVariant { kind: &'static str, value: String },
}

/// Classified failure of a single call to a hosted model endpoint
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CallError {
    #[error("No API credential configured")]
    Unconfigured,

    #[error("Invalid or missing API credential (401): {0}")]
    Unauthenticated(String),

    #[error("Credential not allowed to use this model (403): {0}")]
    Unauthorized(String),

    #[error("Rate limit reached (429): {0}")]
    RateLimited(String),

    #[error("API request failed: {status} - {body}")]
    ServerError { status: u16, body: String },

    #[error("Transport Error: {0}")]
    TransportError(String),

    #[error("Unexpected response payload: {0}")]
    InvalidResponse(String),
}

impl CallError {
    /// Maps a non-2xx status and its body to a call error
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 => CallError::Unauthenticated(body),
            403 => CallError::Unauthorized(body),
            429 => CallError::RateLimited(body),
            _ => CallError::ServerError { status, body },
        }
    }

    /// Short text suitable for showing in place of an answer
    pub fn user_message(&self) -> String {
        match self {
            CallError::Unconfigured => {
                "Nenhuma chave de API configurada. Defina TUTOR_API_KEY.".to_string()
            }
            CallError::Unauthenticated(_) => {
                "Chave de API inválida. Verifique suas credenciais.".to_string()
            }
            CallError::Unauthorized(_) => {
                "A chave de API não tem permissão para este modelo.".to_string()
            }
            CallError::RateLimited(_) => {
                "Limite de requisições atingido. Aguarde um pouco e tente novamente.".to_string()
            }
            other => format!("Erro ao consultar o modelo: {}", other),
        }
    }
}

impl From<reqwest::Error> for CallError {
    fn from(e: reqwest::Error) -> Self {
        CallError::TransportError(e.to_string())
    }
}

/// Exam tutor errors
#[derive(Error, Debug)]
pub enum TutorError {
    #[error("Configuration Error: {0}")]
    ConfigError(String),

    #[error("Validation Error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Call(#[from] CallError),

    #[error("Invalid State: {0}")]
    InvalidState(String),

    #[error(transparent)]
    SerdeError(#[from] serde_json::Error),

    #[error(transparent)]
    IoError(#[from] std::io::Error),
}

/// Result type for tutor operations
pub type TutorResult<T> = Result<T, TutorError>;
