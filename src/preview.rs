//! Local preview server for `dist/` and the generated examples, sending the
//! cache and CORS headers the CDN is expected to use.

use crate::config::BuildConfig;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use regex::Regex;
use std::path::{Component, PathBuf};
use std::sync::{Arc, LazyLock};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, warn};

const IMMUTABLE: &str = "public, max-age=31536000, immutable";
const SHORT_LIVED: &str = "public, max-age=300";

static VERSIONED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_-]+\.[A-Za-z0-9_-]{16}\.min\.(js|css)$").expect("regex")
});

#[derive(Clone)]
pub struct PreviewState {
    inner: Arc<Roots>,
}

struct Roots {
    dist_dir: PathBuf,
    examples_dir: PathBuf,
}

impl PreviewState {
    pub fn new(dist_dir: PathBuf, examples_dir: PathBuf) -> Self {
        Self {
            inner: Arc::new(Roots {
                dist_dir,
                examples_dir,
            }),
        }
    }
}

pub fn router(state: PreviewState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::HEAD]);
    Router::new()
        .route("/healthz", get(|| async { "ok" }))
        .route("/dist/{file}", get(serve_dist))
        .route("/examples/{file}", get(serve_example))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn run(config: BuildConfig) -> anyhow::Result<()> {
    let state = PreviewState::new(config.dist_dir, config.examples_dir);
    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(?err, "failed to listen for ctrl-c");
    }
}

async fn serve_dist(State(state): State<PreviewState>, Path(file): Path<String>) -> Response {
    let cache = if VERSIONED.is_match(&file) {
        IMMUTABLE
    } else {
        SHORT_LIVED
    };
    serve_file(&state.inner.dist_dir, &file, cache).await
}

async fn serve_example(State(state): State<PreviewState>, Path(file): Path<String>) -> Response {
    serve_file(&state.inner.examples_dir, &file, "no-cache").await
}

async fn serve_file(root: &std::path::Path, file: &str, cache: &'static str) -> Response {
    if !is_plain_file_name(file) {
        return StatusCode::BAD_REQUEST.into_response();
    }
    let path = root.join(file);
    match tokio::fs::read(&path).await {
        Ok(bytes) => {
            let mut resp = bytes.into_response();
            let headers = resp.headers_mut();
            headers.insert(
                header::CONTENT_TYPE,
                HeaderValue::from_static(content_type(file)),
            );
            headers.insert(header::CACHE_CONTROL, HeaderValue::from_static(cache));
            resp
        }
        Err(err) => {
            debug!(path = %path.display(), %err, "preview file not found");
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

/// One normal path component, no separators and no dotfiles.
fn is_plain_file_name(file: &str) -> bool {
    if file.starts_with('.') || file.contains(['/', '\\']) {
        return false;
    }
    let mut components = std::path::Path::new(file).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}

fn content_type(file: &str) -> &'static str {
    match file.rsplit('.').next() {
        Some("js") => "application/javascript; charset=utf-8",
        Some("css") => "text/css; charset=utf-8",
        Some("html") => "text/html; charset=utf-8",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    fn fixture() -> (tempfile::TempDir, Router) {
        let dir = tempfile::tempdir().unwrap();
        let dist = dir.path().join("dist");
        let examples = dir.path().join("examples");
        std::fs::create_dir_all(&dist).unwrap();
        std::fs::create_dir_all(&examples).unwrap();
        std::fs::write(dist.join("widget.min.js"), "alert(1)").unwrap();
        std::fs::write(dist.join("widget.AbCd-_0123456789.min.js"), "alert(1)").unwrap();
        std::fs::write(examples.join("basic.html"), "<html></html>").unwrap();
        let app = router(PreviewState::new(dist, examples));
        (dir, app)
    }

    async fn get(app: Router, uri: &str) -> Response {
        app.oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn versioned_assets_are_immutable() {
        let (_dir, app) = fixture();
        let resp = get(app, "/dist/widget.AbCd-_0123456789.min.js").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], IMMUTABLE);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "application/javascript; charset=utf-8"
        );
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body[..], b"alert(1)");
    }

    #[tokio::test]
    async fn canonical_assets_are_short_lived() {
        let (_dir, app) = fixture();
        let resp = get(app, "/dist/widget.min.js").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()[header::CACHE_CONTROL], SHORT_LIVED);
    }

    #[tokio::test]
    async fn serves_examples_and_health() {
        let (_dir, app) = fixture();
        let resp = get(app.clone(), "/examples/basic.html").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers()[header::CONTENT_TYPE],
            "text/html; charset=utf-8"
        );
        let resp = get(app, "/healthz").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rejects_traversal_and_missing_files() {
        let (_dir, app) = fixture();
        let resp = get(app.clone(), "/dist/..%2Fsecret").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = get(app.clone(), "/dist/nope.js").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
        let resp = get(app, "/examples/.hidden").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn absolute_paths_stay_inside_the_root() {
        let (dir, app) = fixture();
        let secret = dir.path().join("secret.txt");
        std::fs::write(&secret, "TOPSECRET").unwrap();
        let encoded = secret.to_str().unwrap().replace('/', "%2F");

        let resp = get(app.clone(), &format!("/dist/{encoded}")).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let resp = get(app, "/examples/%2Fetc%2Fpasswd").await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn plain_file_names_only() {
        assert!(is_plain_file_name("widget.min.js"));
        assert!(!is_plain_file_name("/etc/passwd"));
        assert!(!is_plain_file_name("a/b.js"));
        assert!(!is_plain_file_name(".."));
        assert!(!is_plain_file_name("..\\x"));
        assert!(!is_plain_file_name(""));
    }

    #[tokio::test]
    async fn cors_allows_any_origin() {
        let (_dir, app) = fixture();
        let resp = app
            .oneshot(
                Request::builder()
                    .uri("/dist/widget.min.js")
                    .header(header::ORIGIN, "https://host.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(resp.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
