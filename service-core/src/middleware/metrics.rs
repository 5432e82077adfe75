use axum::{extract::Request, middleware::Next, response::Response};
use metrics::{counter, histogram};
use std::time::Instant;

/// Collapses numeric path segments so `/invoices/41` and
/// `/invoices/42` share one `path` label instead of growing the metric
/// per row id.
fn route_label(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
                ":id"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

pub async fn metrics_middleware(req: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let path = route_label(req.uri().path());

    let response = next.run(req).await;

    let duration = start.elapsed();
    let status = response.status().as_u16().to_string();

    let labels = [("method", method), ("path", path), ("status", status)];

    counter!("http_requests_total", &labels).increment(1);
    histogram!("http_request_duration_seconds", &labels).record(duration.as_secs_f64());

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_numeric_segments() {
        assert_eq!(route_label("/invoices/42"), "/invoices/:id");
        assert_eq!(route_label("/job-cards/7/status"), "/job-cards/:id/status");
    }

    #[test]
    fn leaves_static_routes_alone() {
        assert_eq!(route_label("/reconcile"), "/reconcile");
        assert_eq!(route_label("/job-cards/recent"), "/job-cards/recent");
        assert_eq!(route_label("/"), "/");
    }
}
