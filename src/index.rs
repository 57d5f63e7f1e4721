use axum::{debug_handler, response::{Html, IntoResponse}};

use crate::include_res;

/// Every non-API route gets the single-page shell; the client script takes
/// it from there.
#[debug_handler]
pub async fn shell() -> impl IntoResponse {
    Html(include_res!(str, "/index.html"))
}
