use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::models::{Answer, QueryRequest, SearchRequest, SearchResponse};
use crate::state::AppState;

use super::error_response;

/// POST /api/query - Answer a question from the document corpus.
///
/// Returns `{"status": "insufficient_context"}` when no document is relevant
/// enough; that is a normal 200 response.
pub async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<Answer>, (StatusCode, String)> {
    let question = req.question.trim();
    if question.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Question is required".to_string()));
    }

    let answer = state
        .orchestrator
        .answer(question)
        .await
        .map_err(error_response)?;
    Ok(Json(answer))
}

/// POST /api/search - Semantic document search.
pub async fn search(
    State(state): State<AppState>,
    Json(req): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, (StatusCode, String)> {
    let query = req.query.trim();
    if query.is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Query is required".to_string()));
    }
    let top_k = req.top_k.clamp(1, 50);

    let results = state
        .documents
        .search_tagged(query, top_k, req.tags.as_deref())
        .await
        .map_err(error_response)?;
    Ok(Json(SearchResponse {
        total: results.len(),
        results,
    }))
}
