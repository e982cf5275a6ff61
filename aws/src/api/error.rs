use thiserror::Error;

/// Classification of a service error code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    InvalidState,
    Throttling,
    AccessDenied,
    Validation,
    Conflict,
    Other,
}

impl ErrorKind {
    pub fn from_code(code: &str) -> Self {
        match code {
            "ResourceNotFoundException" | "NotFoundException" => ErrorKind::NotFound,
            c if c.ends_with(".NotFound") => ErrorKind::NotFound,
            "KMSInvalidStateException" | "InvalidStateException" => ErrorKind::InvalidState,
            "ThrottlingException" | "Throttling" | "TooManyRequestsException"
            | "RequestLimitExceeded" => ErrorKind::Throttling,
            "AccessDeniedException" | "UnauthorizedOperation" => ErrorKind::AccessDenied,
            "ValidationException" | "InvalidParameterValue" | "InvalidParameterCombination" => {
                ErrorKind::Validation
            }
            "ConflictException" => ErrorKind::Conflict,
            _ => ErrorKind::Other,
        }
    }
}

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("{code}: {message} (HTTP {status})")]
    Service {
        status: u16,
        code: String,
        message: String,
    },

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Request timeout after {0} seconds")]
    Timeout(u64),

    #[error("Too many requests, rate limited")]
    RateLimited,

    #[error("Service unavailable, retry later")]
    ServiceUnavailable,
}

impl ApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Service { status: 404, code, .. } if code == "UnknownError" => {
                ErrorKind::NotFound
            }
            ApiError::Service { code, .. } => ErrorKind::from_code(code),
            ApiError::RateLimited => ErrorKind::Throttling,
            _ => ErrorKind::Other,
        }
    }

    /// Service error code with namespace prefix and suffix stripped
    pub fn code(&self) -> Option<&str> {
        match self {
            ApiError::Service { code, .. } => Some(code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub fn is_code(&self, code: &str) -> bool {
        self.code() == Some(code)
    }

    /// Whether the error code matches and the message contains `needle`
    pub fn is_code_with_message(&self, code: &str, needle: &str) -> bool {
        match self {
            ApiError::Service {
                code: c, message, ..
            } => c == code && message.contains(needle),
            _ => false,
        }
    }

    /// Throttling and server-side failures are retried by the client
    pub fn is_retryable(&self) -> bool {
        match self {
            ApiError::RateLimited | ApiError::ServiceUnavailable | ApiError::Timeout(_) => true,
            ApiError::Service { status, .. } => {
                *status >= 500 || self.kind() == ErrorKind::Throttling
            }
            _ => false,
        }
    }
}

/// Normalizes an error code: `aws.protocoltests#FooError:http://...` becomes `FooError`
pub fn sanitize_error_code(raw: &str) -> String {
    let code = raw.split(':').next().unwrap_or(raw);
    let code = code.rsplit('#').next().unwrap_or(code);
    code.trim().to_string()
}
