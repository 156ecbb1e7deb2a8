use thiserror::Error;

#[derive(Error, Debug)]
pub enum M365Error {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Option or argument rejected before any request is sent
    #[error("{0}")]
    Validation(String),

    /// Error body returned by Graph or SharePoint, message surfaced verbatim
    #[error("{message}")]
    ApiError {
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// A name lookup matched nothing or the command has nothing to act on
    #[error("{0}")]
    NotFound(String),

    /// A name lookup matched more than one entity
    #[error("{0}")]
    Ambiguous(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Interactive prompt error: {0}")]
    DialoguerError(#[from] dialoguer::Error),

    #[error("No {0} access token found. Run 'm365ctl session set' or export the matching M365_*_TOKEN variable")]
    TokenNotFound(String),
}

pub type Result<T> = std::result::Result<T, M365Error>;

pub use M365Error as Error;

impl M365Error {
    /// HTTP status of an API error, if this is one
    pub fn status(&self) -> Option<u16> {
        match self {
            M365Error::ApiError { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Build an API error from a failed response body
    pub fn from_response(status: u16, body: &str) -> Self {
        let (code, message) = parse_odata_error(body);
        let message = message.unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("HTTP {}", status)
            } else {
                format!("HTTP {}: {}", status, body.trim())
            }
        });
        M365Error::ApiError {
            status,
            code,
            message,
        }
    }
}

/// Extract code and message from a Graph or SharePoint OData error envelope.
///
/// Graph: `{"error": {"code": "...", "message": "..."}}`
/// SharePoint: `{"odata.error": {"code": "...", "message": {"lang": "...", "value": "..."}}}`
pub fn parse_odata_error(body: &str) -> (Option<String>, Option<String>) {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(body) else {
        return (None, None);
    };

    if let Some(error_obj) = json.get("error").filter(|e| e.is_object()) {
        let code = error_obj
            .get("code")
            .and_then(|c| c.as_str())
            .map(String::from);
        let message = error_obj
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from);
        return (code, message);
    }

    if let Some(error_obj) = json.get("odata.error") {
        let code = error_obj
            .get("code")
            .and_then(|c| c.as_str())
            .map(String::from);
        let message = error_obj
            .get("message")
            .and_then(|m| m.get("value").or(Some(m)))
            .and_then(|v| v.as_str())
            .map(String::from);
        return (code, message);
    }

    if let Some(description) = json.get("error_description").and_then(|d| d.as_str()) {
        return (
            json.get("error").and_then(|e| e.as_str()).map(String::from),
            Some(description.to_string()),
        );
    }

    (None, None)
}

/// Hint shown under well-known API errors
pub fn hint_for(error: &M365Error) -> Option<&'static str> {
    let M365Error::ApiError { status, code, .. } = error else {
        return match error {
            M365Error::TokenNotFound(_) | M365Error::AuthError(_) => {
                Some("Obtain a fresh access token and store it with 'm365ctl session set'.")
            }
            _ => None,
        };
    };

    match (code.as_deref(), status) {
        (Some("InvalidAuthenticationToken"), _) | (Some("Unauthorized"), _) | (_, 401) => {
            Some("Your access token may have expired. Store a fresh one with 'm365ctl session set'.")
        }
        (Some("Forbidden"), _) | (Some("Authorization_RequestDenied"), _) | (_, 403) => {
            Some("Check that the token carries the permissions this command needs.")
        }
        (Some("TooManyRequests"), _) | (_, 429) => {
            Some("API rate limit exceeded. Wait a moment and try again.")
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_graph_envelope_surfaces_message() {
        let body = r#"{"error":{"code":"Request_ResourceNotFound","message":"Resource 'abc' does not exist."}}"#;
        let err = M365Error::from_response(404, body);
        assert_eq!(err.to_string(), "Resource 'abc' does not exist.");
        assert_eq!(err.status(), Some(404));
    }

    #[test]
    fn test_spo_envelope_surfaces_message_value() {
        let body = r#"{"odata.error":{"code":"-2147024809, System.ArgumentException","message":{"lang":"en-US","value":"Invalid request"}}}"#;
        let (code, message) = parse_odata_error(body);
        assert_eq!(code.as_deref(), Some("-2147024809, System.ArgumentException"));
        assert_eq!(message.as_deref(), Some("Invalid request"));
    }

    #[test]
    fn test_error_description_envelope() {
        let body = r#"{"error":"invalid_grant","error_description":"AADSTS70000: token expired"}"#;
        let err = M365Error::from_response(400, body);
        assert_eq!(err.to_string(), "AADSTS70000: token expired");
    }

    #[test]
    fn test_unparseable_body_keeps_status() {
        let err = M365Error::from_response(500, "An error has occurred");
        assert_eq!(err.to_string(), "HTTP 500: An error has occurred");

        let err = M365Error::from_response(404, "");
        assert_eq!(err.to_string(), "HTTP 404");
    }

    #[test]
    fn test_hint_for_expired_token() {
        let err = M365Error::ApiError {
            status: 401,
            code: Some("InvalidAuthenticationToken".into()),
            message: "Access token has expired".into(),
        };
        assert!(hint_for(&err).is_some());
        assert!(hint_for(&M365Error::Validation("x".into())).is_none());
    }
}
