//! HTTP application: every route group merged behind the shared layers.

use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::messaging::{MessagingRouteState, messaging_routes};
use crate::wizard::{WizardRouteState, wizard_routes};

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "casehub"
    }))
}

/// Build the full router.
pub fn build_router(messaging: MessagingRouteState, wizard: WizardRouteState) -> Router {
    Router::new()
        .route("/health", get(health))
        .merge(messaging_routes(messaging))
        .merge(wizard_routes(wizard))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::messaging::MessagingUseCases;
    use crate::messaging::use_cases::testing::{RecordingMailer, StubEmailClient, memory_repo};
    use crate::wizard::{DefaultRules, Market};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use secrecy::SecretString;
    use tower::ServiceExt;

    #[tokio::test]
    async fn health_reports_ok() {
        let use_cases = MessagingUseCases::new(
            memory_repo().await,
            Arc::new(StubEmailClient::default()),
            Arc::new(RecordingMailer::default()),
        );
        let router = build_router(
            MessagingRouteState {
                use_cases: Arc::new(use_cases),
                api_key: SecretString::from("k".to_string()),
            },
            WizardRouteState {
                market: Market::Uae,
                rules: Arc::new(DefaultRules),
            },
        );

        let response = router
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }
}
