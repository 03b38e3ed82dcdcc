//! TRIAS gateway error types.

/// Errors from the TRIAS HTTP gateway.
#[derive(Debug, thiserror::Error)]
pub enum TriasError {
    /// HTTP transport failed (connection refused, DNS, TLS, ...)
    #[error("HTTP error: {0}")]
    Http(reqwest::Error),

    /// The upstream request timed out.
    #[error("upstream request timed out")]
    Timeout,

    /// The upstream returned an error status code.
    #[error("upstream error {status}: {message}")]
    Api { status: u16, message: String },

    /// The response body was not parseable XML.
    #[error("XML parse error: {message}")]
    Xml { message: String },
}

impl From<reqwest::Error> for TriasError {
    fn from(err: reqwest::Error) -> Self {
        // Timeouts are split out so the build loop can classify them.
        if err.is_timeout() {
            TriasError::Timeout
        } else {
            TriasError::Http(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = TriasError::Timeout;
        assert_eq!(err.to_string(), "upstream request timed out");

        let err = TriasError::Api {
            status: 503,
            message: "Service Unavailable".into(),
        };
        assert_eq!(err.to_string(), "upstream error 503: Service Unavailable");

        let err = TriasError::Xml {
            message: "unexpected end of stream".into(),
        };
        assert!(err.to_string().contains("XML parse error"));
    }
}
