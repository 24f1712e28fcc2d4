use axum::http::HeaderMap;

use crate::errors::AppError;

// An unset token locks the route rather than opening it.
pub fn require_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), AppError> {
    let auth = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let token = auth.strip_prefix("Bearer ").unwrap_or("").trim();
    if expected_token.is_empty() || token != expected_token {
        return Err(AppError::Unauthorized);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut h = HeaderMap::new();
        h.insert("authorization", HeaderValue::from_str(value).unwrap());
        h
    }

    #[test]
    fn test_bearer_matches() {
        assert!(require_bearer(&headers("Bearer s3cret"), "s3cret").is_ok());
    }

    #[test]
    fn test_bearer_rejects() {
        assert!(require_bearer(&headers("Bearer nope"), "s3cret").is_err());
        assert!(require_bearer(&headers("s3cret"), "s3cret").is_err());
        assert!(require_bearer(&HeaderMap::new(), "s3cret").is_err());
    }

    #[test]
    fn test_empty_expected_token_always_rejects() {
        assert!(require_bearer(&headers("Bearer "), "").is_err());
        assert!(require_bearer(&HeaderMap::new(), "").is_err());
    }
}
