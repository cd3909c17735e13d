pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::assessment::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // CV intake and analysis
        .route("/api/v1/assessments/cv", post(handlers::handle_analyze_cv))
        .route(
            "/api/v1/assessments/cv/upload",
            post(handlers::handle_upload_cv),
        )
        .route(
            "/api/v1/assessments/cv/generate",
            post(handlers::handle_generate_cv),
        )
        // Interview
        .route(
            "/api/v1/assessments/interview/turn",
            post(handlers::handle_interview_turn),
        )
        .route(
            "/api/v1/assessments/interview/complete",
            post(handlers::handle_complete_interview),
        )
        // Role discovery and selection
        .route(
            "/api/v1/assessments/roles/discover",
            post(handlers::handle_discover_roles),
        )
        .route(
            "/api/v1/assessments/roles/select",
            post(handlers::handle_select_role),
        )
        // Simulation
        .route(
            "/api/v1/assessments/simulation/turn",
            post(handlers::handle_simulation_turn),
        )
        .route(
            "/api/v1/assessments/simulation/complete",
            post(handlers::handle_complete_simulation),
        )
        // Reporting and inspection
        .route(
            "/api/v1/assessments/report",
            post(handlers::handle_generate_report),
        )
        .route(
            "/api/v1/assessments/:owner",
            get(handlers::handle_get_run).delete(handlers::handle_reset_owner),
        )
        .route(
            "/api/v1/assessments/:owner/readiness",
            get(handlers::handle_get_readiness),
        )
        .with_state(state)
}
