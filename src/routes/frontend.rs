use std::path::Path;

use axum::handler::HandlerWithoutStateExt;
use axum::http::{StatusCode, Uri};
use axum::response::{Html, IntoResponse, Response};
use axum::Router;
use tower_http::services::ServeDir;

/// Serves the built frontend from `dir`.
///
/// Existing files are served as-is. Unknown paths without an extension are
/// client-side routes and get `index.html` with 200; unknown paths with an
/// extension are plain 404s.
pub fn router<S>(dir: &str) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    let index = Path::new(dir).join("index.html");
    let fallback = move |uri: Uri| {
        let index = index.clone();
        async move { index_or_not_found(&index, &uri).await }
    };

    Router::new().fallback_service(ServeDir::new(dir).fallback(fallback.into_service()))
}

async fn index_or_not_found(index: &Path, uri: &Uri) -> Response {
    if Path::new(uri.path()).extension().is_some() {
        return (StatusCode::NOT_FOUND, "Not Found").into_response();
    }

    match tokio::fs::read_to_string(index).await {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::warn!("cannot read {}: {e}", index.display());
            (StatusCode::NOT_FOUND, "Not Found").into_response()
        }
    }
}
