//! Downloads from the public data directory.

use axum::{
    Json,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use kbchat_tools::{DownloadError, DownloadResolver};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::{ApiError, SharedState};

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub filename: String,
}

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        let status = match err {
            DownloadError::NotFound(_) => StatusCode::NOT_FOUND,
            DownloadError::InvalidPath | DownloadError::NotAFile(_) => StatusCode::BAD_REQUEST,
        };
        ApiError::new(status, err.to_string())
    }
}

async fn resolver(state: &SharedState) -> DownloadResolver {
    DownloadResolver::new(state.config.read().await.data.public_dir.clone())
}

pub async fn download_handler(
    State(state): State<SharedState>,
    Query(query): Query<DownloadQuery>,
) -> Result<Response, ApiError> {
    let path = resolver(&state).await.locate(&query.filename)?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| {
        warn!(path = %path.display(), error = %e, "Download read failed");
        ApiError::internal(format!("Error serving file: {e}"))
    })?;

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| query.filename.clone());
    debug!(file = %name, size = bytes.len(), "Serving download");

    Ok((
        [
            (header::CONTENT_TYPE, "application/octet-stream".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", name.replace('"', "")),
            ),
        ],
        bytes,
    )
        .into_response())
}

pub async fn list_handler(State(state): State<SharedState>) -> Json<serde_json::Value> {
    let resolver = resolver(&state).await;
    if !resolver.public_dir().is_dir() {
        return Json(json!({
            "files": [],
            "message": "Public data directory not found",
        }));
    }

    let files = resolver.list();
    Json(json!({
        "count": files.len(),
        "files": files,
        "directory": resolver.public_dir().display().to_string(),
    }))
}

#[cfg(test)]
mod tests {
    use crate::build_router;
    use crate::test_support::{ScriptedStream, config_in, state_with};
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app(dir: &std::path::Path) -> Router {
        let config = config_in(dir);
        build_router(
            state_with(config.clone(), Arc::new(ScriptedStream::new(vec![]))),
            &config,
        )
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn seed(dir: &std::path::Path) {
        let public = dir.join("public");
        std::fs::create_dir_all(public.join("contracts")).unwrap();
        std::fs::write(public.join("HelloAI_Guide.pdf"), b"%PDF-guide").unwrap();
        std::fs::write(public.join("contracts/Signed.docx"), b"docx").unwrap();
        std::fs::write(dir.join("secret.txt"), b"top secret").unwrap();
    }

    #[tokio::test]
    async fn serves_file_as_attachment() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());

        let response = app(dir.path())
            .oneshot(get("/download?filename=contracts/Signed.docx"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get("content-disposition").unwrap(),
            "attachment; filename=\"Signed.docx\""
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], b"docx");
    }

    #[tokio::test]
    async fn traversal_never_leaves_public_dir() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());

        let response = app(dir.path())
            .oneshot(get("/download?filename=../secret.txt"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = app(dir.path())
            .oneshot(get("/download?filename=contracts"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn missing_file_is_404_with_detail() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());

        let response = app(dir.path())
            .oneshot(get("/download?filename=nope.pdf"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["detail"], "File 'nope.pdf' not found");
    }

    #[tokio::test]
    async fn lists_top_level_files() {
        let dir = tempfile::tempdir().unwrap();
        seed(dir.path());

        let response = app(dir.path()).oneshot(get("/download/list")).await.unwrap();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["count"], 1);
        assert_eq!(json["files"][0]["filename"], "HelloAI_Guide.pdf");
        assert_eq!(json["files"][0]["size"], 10);
    }

    #[tokio::test]
    async fn list_without_public_dir() {
        let dir = tempfile::tempdir().unwrap();
        let response = app(dir.path()).oneshot(get("/download/list")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["files"], serde_json::json!([]));
        assert_eq!(json["message"], "Public data directory not found");
    }
}
