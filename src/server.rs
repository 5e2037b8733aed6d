//! Read-only HTTP mirror of the search engine.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/` | Static search page |
//! | `GET`  | `/search?q=<query>` | JSON array of `{fileName, filePath}` |
//!
//! Any other path answers 404. Errors use the body
//! `{ "error": { "code": "...", "message": "..." } }`.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};

use crate::search::SearchEngine;

/// Build the router. Exposed separately from [`run_server`] so tests can
/// serve it on an ephemeral port.
pub fn router(engine: Arc<SearchEngine>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", get(handle_index))
        .route("/search", get(handle_search))
        .fallback(handle_not_found)
        .layer(cors)
        .with_state(engine)
}

/// Bind to `bind` and serve until the process is terminated.
pub async fn run_server(bind: &str, engine: Arc<SearchEngine>) -> anyhow::Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!(addr = %listener.local_addr()?, "web mirror listening");
    println!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(engine)).await?;
    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code.to_string(),
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

// ============ Handlers ============

#[derive(Deserialize)]
struct SearchParams {
    #[serde(default)]
    q: String,
}

#[derive(Serialize, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
struct SearchHit {
    file_name: String,
    file_path: String,
}

async fn handle_search(
    State(engine): State<Arc<SearchEngine>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<SearchHit>>, AppError> {
    let docs = engine.search(&params.q, &[]).await.map_err(|e| {
        error!(error = %e, "search failed");
        AppError {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "internal",
            message: e.to_string(),
        }
    })?;

    Ok(Json(
        docs.into_iter()
            .map(|d| SearchHit {
                file_name: d.file_name,
                file_path: d.file_path,
            })
            .collect(),
    ))
}

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

async fn handle_not_found() -> AppError {
    AppError {
        status: StatusCode::NOT_FOUND,
        code: "not_found",
        message: "no such route".to_string(),
    }
}

const INDEX_HTML: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
<meta charset="utf-8">
<title>omnizient</title>
<style>
  body { font-family: system-ui, sans-serif; max-width: 48rem; margin: 2rem auto; padding: 0 1rem; }
  form { display: flex; gap: .5rem; margin-bottom: 1rem; }
  input { flex: 1; padding: .5rem; }
  ul { list-style: none; padding: 0; }
  li { padding: .5rem; border-bottom: 1px solid #ddd; }
  .path { color: #666; font-size: .85rem; }
</style>
</head>
<body>
<h1>omnizient</h1>
<form id="f">
  <input id="q" type="search" placeholder="Search documents" autofocus>
  <button type="submit">Search</button>
</form>
<ul id="results"></ul>
<script>
document.getElementById('f').addEventListener('submit', async (ev) => {
  ev.preventDefault();
  const q = document.getElementById('q').value;
  const res = await fetch('/search?q=' + encodeURIComponent(q));
  const list = document.getElementById('results');
  list.replaceChildren();
  if (!res.ok) {
    const li = document.createElement('li');
    li.textContent = 'Search failed (' + res.status + ')';
    list.appendChild(li);
    return;
  }
  for (const hit of await res.json()) {
    const li = document.createElement('li');
    const name = document.createElement('div');
    name.textContent = hit.fileName;
    const path = document.createElement('div');
    path.className = 'path';
    path.textContent = hit.filePath;
    li.append(name, path);
    list.appendChild(li);
  }
});
</script>
</body>
</html>
"#;
