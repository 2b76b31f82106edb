//! Classification of non-success HTTP responses into user-facing errors.

use reqwest::StatusCode;

/// Non-success response from the release host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpStatusError {
    /// The artifact does not exist at that URL (HTTP 404)
    NotFound(String),
    /// Access denied (HTTP 401/403)
    Forbidden(String),
    /// Too many requests (HTTP 429)
    RateLimited(String),
    /// Other 4xx responses
    ClientError(u16, String),
    /// 5xx responses
    ServerError(u16, String),
}

impl std::fmt::Display for HttpStatusError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HttpStatusError::NotFound(url) => {
                write!(f, "Not found: {} (is this release published?)", url)
            }
            HttpStatusError::Forbidden(url) => write!(f, "Access forbidden: {}", url),
            HttpStatusError::RateLimited(url) => {
                write!(f, "Rate limit exceeded for {}. Try again later.", url)
            }
            HttpStatusError::ClientError(code, url) => {
                write!(f, "Request error: HTTP {} for {}", code, url)
            }
            HttpStatusError::ServerError(code, url) => {
                write!(f, "Server error: HTTP {} for {}", code, url)
            }
        }
    }
}

impl std::error::Error for HttpStatusError {}

/// Map a response status to an error. `None` for success statuses.
pub fn classify_status(status: StatusCode, url: &str) -> Option<HttpStatusError> {
    if status.is_success() {
        return None;
    }
    let url = url.to_string();
    Some(match status {
        StatusCode::NOT_FOUND => HttpStatusError::NotFound(url),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => HttpStatusError::Forbidden(url),
        StatusCode::TOO_MANY_REQUESTS => HttpStatusError::RateLimited(url),
        s if s.is_server_error() => HttpStatusError::ServerError(s.as_u16(), url),
        s => HttpStatusError::ClientError(s.as_u16(), url),
    })
}
