use axum::http::{HeaderMap, HeaderValue};
use axum::{extract::Request, middleware::Next, response::Response};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Caller-supplied ids longer than this are discarded; they end up in
/// log lines and response headers, so an unbounded value is a nuisance.
const MAX_REQUEST_ID_LEN: usize = 64;

fn accept_request_id(headers: &HeaderMap) -> Option<String> {
    let id = headers.get(REQUEST_ID_HEADER)?.to_str().ok()?.trim();
    if id.is_empty() || id.len() > MAX_REQUEST_ID_LEN {
        return None;
    }
    Some(id.to_string())
}

/// Ensures every request carries a usable `x-request-id`, generating
/// one when the caller did not supply an acceptable value, and echoes
/// it on the response.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id =
        accept_request_id(req.headers()).unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(REQUEST_ID_HEADER, header_value);
    }

    let mut response = next.run(req).await;

    if let Ok(header_value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(REQUEST_ID_HEADER, header_value);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers_with(id: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_str(id).unwrap());
        headers
    }

    #[test]
    fn keeps_reasonable_caller_ids() {
        let headers = headers_with("req-abc-123");
        assert_eq!(accept_request_id(&headers).as_deref(), Some("req-abc-123"));
    }

    #[test]
    fn discards_empty_and_oversized_ids() {
        assert_eq!(accept_request_id(&headers_with("")), None);
        assert_eq!(accept_request_id(&headers_with("  ")), None);
        assert_eq!(accept_request_id(&headers_with(&"x".repeat(65))), None);
        assert_eq!(accept_request_id(&HeaderMap::new()), None);
    }
}
