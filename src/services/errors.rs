use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("not found")]
    NotFound,
    #[error("validation error: {0}")]
    Validation(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServiceError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServiceError::NotFound => StatusCode::NOT_FOUND,
            ServiceError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ServiceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::Internal(err.to_string())
    }
}

const UNAUTHORIZED_GUIDANCE: &str = "\n\nPossible causes:\n\
1. Access token expired or invalid\n\
2. Refresh token may need to be regenerated\n\
3. Organization ID may be incorrect\n\
4. API scopes may not include Books API access";

/// Failures of a sync run. Every variant aborts the run; per-record upsert
/// failures never reach this type. `status` is `None` when no HTTP response
/// was received.
#[derive(Debug, Error)]
pub enum SyncError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("{message}")]
    CredentialExchange {
        status: Option<u16>,
        body: String,
        message: String,
    },
    #[error("{message}")]
    RemoteFetch {
        status: Option<u16>,
        body: String,
        message: String,
    },
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl SyncError {
    /// Non-success HTTP status from the OAuth token endpoint.
    pub fn credential_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        SyncError::CredentialExchange {
            status: Some(status),
            message: format!(
                "Zoho authentication failed: failed to get access token: {status} {body}"
            ),
            body,
        }
    }

    /// Success status but no usable `access_token` in the payload.
    pub fn credential_payload(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        SyncError::CredentialExchange {
            status: Some(status),
            message: format!("Zoho authentication failed: invalid token response: {body}"),
            body,
        }
    }

    pub fn credential_transport(err: impl std::fmt::Display) -> Self {
        let body = err.to_string();
        SyncError::CredentialExchange {
            status: None,
            message: format!("Zoho authentication failed: token request error: {body}"),
            body,
        }
    }

    /// Non-success HTTP status from the invoice listing endpoint.
    pub fn remote_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        let mut message = format!("Failed to fetch Zoho invoices: {status} {body}");
        if status == 401 {
            message.push_str(UNAUTHORIZED_GUIDANCE);
        }
        SyncError::RemoteFetch {
            status: Some(status),
            body,
            message,
        }
    }

    /// Application `code` other than 0 inside an HTTP 200 listing response.
    pub fn remote_code(code: Option<i64>, message: Option<&str>) -> Self {
        let detail = message.unwrap_or("Unknown error");
        let code = code.map_or_else(|| "missing".to_string(), |code| code.to_string());
        SyncError::RemoteFetch {
            status: Some(200),
            body: detail.to_string(),
            message: format!("Zoho API error (code {code}): {detail}"),
        }
    }

    pub fn remote_payload(status: u16, err: impl std::fmt::Display) -> Self {
        let body = err.to_string();
        SyncError::RemoteFetch {
            status: Some(status),
            message: format!("Invalid Zoho invoice listing response: {body}"),
            body,
        }
    }

    pub fn remote_transport(err: impl std::fmt::Display) -> Self {
        let body = err.to_string();
        SyncError::RemoteFetch {
            status: None,
            message: format!("Failed to fetch Zoho invoices: {body}"),
            body,
        }
    }

    pub fn persistence(err: impl std::fmt::Display) -> Self {
        SyncError::Persistence(err.to_string())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            SyncError::Configuration(_) | SyncError::Persistence(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            SyncError::CredentialExchange { .. } | SyncError::RemoteFetch { .. } => {
                StatusCode::BAD_GATEWAY
            }
        }
    }
}
