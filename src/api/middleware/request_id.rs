use axum::{extract::Request, http::HeaderValue, middleware::Next, response::Response};
use uuid::Uuid;

/// Tags every request and its response with an `x-request-id`, minting one
/// when the client did not supply it. The trace span in `main` picks the
/// header up so upload failures can be correlated across log lines.
pub async fn request_id_middleware(mut req: Request, next: Next) -> Response {
    let request_id = req
        .headers()
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| HeaderValue::from_str(v).ok())
        .unwrap_or_else(|| {
            HeaderValue::from_str(&Uuid::new_v4().to_string())
                .expect("uuid is a valid header value")
        });

    req.headers_mut()
        .insert("x-request-id", request_id.clone());

    let mut response = next.run(req).await;

    response.headers_mut().insert("x-request-id", request_id);

    response
}
