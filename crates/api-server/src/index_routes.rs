use axum::{
    extract::{Path, State},
    routing::get,
    Json, Router,
};

use crate::{ApiResponse, AppError, AppState};

pub fn index_routes() -> Router<AppState> {
    Router::new().route("/indices/:index_name", get(get_index_listing))
}

async fn get_index_listing(
    State(state): State<AppState>,
    Path(index_name): Path<String>,
) -> Result<Json<ApiResponse<Vec<String>>>, AppError> {
    let symbols = state.indices.get_index_listing(&index_name).await?;
    Ok(Json(ApiResponse::success(symbols)))
}

#[cfg(test)]
mod tests {
    use crate::rest_router;
    use crate::test_support::{body_json, test_state};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_unsupported_index_is_404() {
        let dir = tempfile::tempdir().unwrap();
        let app = rest_router(test_state(&dir).await);

        let response = app
            .oneshot(Request::builder().uri("/indices/NIKKEI").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Index NIKKEI not supported");
    }
}
