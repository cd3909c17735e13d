//! HTTP surface of the assessment pipeline. Handlers stay thin: resolve the
//! owner, delegate to the pipeline, shape the response. Authentication lives
//! in front of this service; the owner identifier in the request is trusted.

use axum::{
    body::Bytes,
    extract::{Multipart, Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use sqlx::types::Json as SqlJson;
use uuid::Uuid;

use crate::assessment::generation::DEFAULT_LANGUAGE;
use crate::assessment::models::{
    Artifact, AssessmentRun, CompletionStatus, CvAnalysis, InterviewEvaluation, RoleSuggestion,
    SelectedRole, SimulationResults, Stage,
};
use crate::assessment::pipeline;
use crate::assessment::readiness::{evaluate_readiness, ReadinessReport};
use crate::errors::AppError;
use crate::identity::{self, OwnerIdentifier, OwnerQuery};
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct AnalyzeCvRequest {
    pub owner: String,
    pub cv_text: String,
    #[serde(default)]
    pub language: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TurnRequest {
    pub owner: String,
    pub message: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// Shared body for stage transitions that take no payload of their own.
#[derive(Debug, Deserialize)]
pub struct StageRequest {
    pub owner: String,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SelectRoleRequest {
    pub owner: String,
    pub role: SelectedRole,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CompleteSimulationRequest {
    pub owner: String,
    #[serde(default)]
    pub results: Option<SimulationResults>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub expected_version: Option<i64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Response bodies
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct AnalyzeCvResponse {
    pub run_id: Uuid,
    pub stage: Stage,
    pub completion: CompletionStatus,
    pub version: i64,
    pub analysis: CvAnalysis,
}

#[derive(Debug, Serialize)]
pub struct TurnResponse {
    pub run_id: Uuid,
    pub stage: Stage,
    pub completion: CompletionStatus,
    pub version: i64,
    pub reply: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteInterviewResponse {
    pub run_id: Uuid,
    pub stage: Stage,
    pub completion: CompletionStatus,
    pub version: i64,
    pub evaluation: InterviewEvaluation,
}

#[derive(Debug, Serialize)]
pub struct DiscoverRolesResponse {
    pub run_id: Uuid,
    pub stage: Stage,
    pub completion: CompletionStatus,
    pub version: i64,
    pub suggestions: Vec<RoleSuggestion>,
}

#[derive(Debug, Serialize)]
pub struct SelectRoleResponse {
    pub run_id: Uuid,
    pub stage: Stage,
    pub completion: CompletionStatus,
    pub version: i64,
    pub selected_role: SelectedRole,
}

#[derive(Debug, Serialize)]
pub struct GenerateCvResponse {
    pub run_id: Uuid,
    pub stage: Stage,
    pub completion: CompletionStatus,
    pub version: i64,
    pub generated_cv: String,
}

#[derive(Debug, Serialize)]
pub struct CompleteSimulationResponse {
    pub run_id: Uuid,
    pub stage: Stage,
    pub completion: CompletionStatus,
    pub version: i64,
    pub results: SimulationResults,
}

#[derive(Debug, Serialize)]
pub struct ReportResponse {
    pub run_id: Uuid,
    pub stage: Stage,
    pub completion: CompletionStatus,
    pub version: i64,
    pub strategic_report: String,
}

/// Full run view for GET requests; the stage is projected at read time.
#[derive(Debug, Serialize)]
pub struct RunView {
    pub stage: Stage,
    pub run: AssessmentRun,
}

#[derive(Debug, Serialize)]
pub struct ResetResponse {
    pub deleted_runs: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /api/v1/assessments/cv
pub async fn handle_analyze_cv(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeCvRequest>,
) -> Result<Json<AnalyzeCvResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let run = pipeline::analyze_cv(
        &*state.store,
        &*state.generator,
        &owner,
        &req.cv_text,
        language_of(&req.language),
    )
    .await?;

    let analysis = expect_artifact(&run.analysis, "analysis")?;
    Ok(Json(AnalyzeCvResponse {
        run_id: run.id,
        stage: run.stage(),
        completion: *run.completion(),
        version: run.version,
        analysis,
    }))
}

/// POST /api/v1/assessments/cv/upload
///
/// Multipart variant: `owner` (text), optional `language` (text), and `file`
/// (a PDF). The extracted text feeds the same analysis path as the JSON
/// endpoint.
pub async fn handle_upload_cv(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<AnalyzeCvResponse>, AppError> {
    let mut owner_raw: Option<String> = None;
    let mut language: Option<String> = None;
    let mut file_bytes: Option<Bytes> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(e.to_string()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "owner" => {
                owner_raw = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                )
            }
            "language" => {
                language = Some(
                    field
                        .text()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                )
            }
            "file" => {
                file_bytes = Some(
                    field
                        .bytes()
                        .await
                        .map_err(|e| AppError::Validation(e.to_string()))?,
                )
            }
            _ => {}
        }
    }

    let owner_raw = owner_raw
        .ok_or_else(|| AppError::Validation("multipart field 'owner' is required".to_string()))?;
    let bytes = file_bytes
        .ok_or_else(|| AppError::Validation("multipart field 'file' is required".to_string()))?;
    let cv_text = extract_pdf_text(&bytes)?;

    let owner = resolve_request_owner(&state, &owner_raw).await?;
    let run = pipeline::analyze_cv(
        &*state.store,
        &*state.generator,
        &owner,
        &cv_text,
        language_of(&language),
    )
    .await?;

    let analysis = expect_artifact(&run.analysis, "analysis")?;
    Ok(Json(AnalyzeCvResponse {
        run_id: run.id,
        stage: run.stage(),
        completion: *run.completion(),
        version: run.version,
        analysis,
    }))
}

/// POST /api/v1/assessments/interview/turn
pub async fn handle_interview_turn(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let outcome = pipeline::interview_turn(
        &*state.store,
        &*state.generator,
        &owner,
        &req.message,
        language_of(&req.language),
    )
    .await?;

    Ok(Json(TurnResponse {
        run_id: outcome.run.id,
        stage: outcome.run.stage(),
        completion: *outcome.run.completion(),
        version: outcome.run.version,
        reply: outcome.reply,
    }))
}

/// POST /api/v1/assessments/interview/complete
pub async fn handle_complete_interview(
    State(state): State<AppState>,
    Json(req): Json<StageRequest>,
) -> Result<Json<CompleteInterviewResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let run = pipeline::complete_interview(
        &*state.store,
        &*state.generator,
        &owner,
        language_of(&req.language),
        req.expected_version,
    )
    .await?;

    let evaluation = expect_artifact(&run.interview_evaluation, "interview evaluation")?;
    Ok(Json(CompleteInterviewResponse {
        run_id: run.id,
        stage: run.stage(),
        completion: *run.completion(),
        version: run.version,
        evaluation,
    }))
}

/// POST /api/v1/assessments/roles/discover
pub async fn handle_discover_roles(
    State(state): State<AppState>,
    Json(req): Json<StageRequest>,
) -> Result<Json<DiscoverRolesResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let run = pipeline::discover_roles(
        &*state.store,
        &*state.generator,
        &owner,
        language_of(&req.language),
        req.expected_version,
    )
    .await?;

    let suggestions = expect_artifact(&run.role_suggestions, "role suggestions")?;
    Ok(Json(DiscoverRolesResponse {
        run_id: run.id,
        stage: run.stage(),
        completion: *run.completion(),
        version: run.version,
        suggestions,
    }))
}

/// POST /api/v1/assessments/roles/select
pub async fn handle_select_role(
    State(state): State<AppState>,
    Json(req): Json<SelectRoleRequest>,
) -> Result<Json<SelectRoleResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let run = pipeline::select_role(&*state.store, &owner, req.role, req.expected_version).await?;

    let selected_role = expect_artifact(&run.selected_role, "selected role")?;
    Ok(Json(SelectRoleResponse {
        run_id: run.id,
        stage: run.stage(),
        completion: *run.completion(),
        version: run.version,
        selected_role,
    }))
}

/// POST /api/v1/assessments/cv/generate
pub async fn handle_generate_cv(
    State(state): State<AppState>,
    Json(req): Json<StageRequest>,
) -> Result<Json<GenerateCvResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let run = pipeline::generate_cv(
        &*state.store,
        &*state.generator,
        &owner,
        language_of(&req.language),
        req.expected_version,
    )
    .await?;

    let generated_cv = expect_text(&run.generated_cv, "generated CV")?;
    Ok(Json(GenerateCvResponse {
        run_id: run.id,
        stage: run.stage(),
        completion: *run.completion(),
        version: run.version,
        generated_cv,
    }))
}

/// POST /api/v1/assessments/simulation/turn
pub async fn handle_simulation_turn(
    State(state): State<AppState>,
    Json(req): Json<TurnRequest>,
) -> Result<Json<TurnResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let outcome = pipeline::simulation_turn(
        &*state.store,
        &*state.generator,
        &owner,
        &req.message,
        language_of(&req.language),
    )
    .await?;

    Ok(Json(TurnResponse {
        run_id: outcome.run.id,
        stage: outcome.run.stage(),
        completion: *outcome.run.completion(),
        version: outcome.run.version,
        reply: outcome.reply,
    }))
}

/// POST /api/v1/assessments/simulation/complete
pub async fn handle_complete_simulation(
    State(state): State<AppState>,
    Json(req): Json<CompleteSimulationRequest>,
) -> Result<Json<CompleteSimulationResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let run = pipeline::complete_simulation(
        &*state.store,
        &*state.generator,
        &owner,
        req.results,
        language_of(&req.language),
        req.expected_version,
    )
    .await?;

    let results = expect_artifact(&run.simulation_results, "simulation results")?;
    Ok(Json(CompleteSimulationResponse {
        run_id: run.id,
        stage: run.stage(),
        completion: *run.completion(),
        version: run.version,
        results,
    }))
}

/// POST /api/v1/assessments/report
pub async fn handle_generate_report(
    State(state): State<AppState>,
    Json(req): Json<StageRequest>,
) -> Result<Json<ReportResponse>, AppError> {
    let owner = resolve_request_owner(&state, &req.owner).await?;
    let run = pipeline::generate_report(
        &*state.store,
        &*state.generator,
        &owner,
        language_of(&req.language),
        req.expected_version,
    )
    .await?;

    let strategic_report = expect_text(&run.strategic_report, "strategic report")?;
    Ok(Json(ReportResponse {
        run_id: run.id,
        stage: run.stage(),
        completion: *run.completion(),
        version: run.version,
        strategic_report,
    }))
}

/// GET /api/v1/assessments/:owner
pub async fn handle_get_run(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<RunView>, AppError> {
    let owner = resolve_request_owner(&state, &owner).await?;
    let run = pipeline::fetch_run(&*state.store, &owner)
        .await?
        .ok_or_else(|| {
            AppError::NotFound(format!("No assessment run for owner '{}'", owner.raw))
        })?;

    Ok(Json(RunView {
        stage: run.stage(),
        run,
    }))
}

/// GET /api/v1/assessments/:owner/readiness
pub async fn handle_get_readiness(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<ReadinessReport>, AppError> {
    let ident = OwnerIdentifier::new(&owner);
    if ident.is_empty() {
        return Err(AppError::Validation("owner must not be empty".to_string()));
    }

    let user = identity::resolve_user(&state.db, &ident).await?;
    let owner = OwnerQuery::new(&ident, user.as_ref());

    let analysis_run = state.store.latest_run_with(&owner, Artifact::Analysis).await?;
    let simulation_run = state
        .store
        .latest_run_with(&owner, Artifact::SimulationResults)
        .await?;

    if user.is_none() && analysis_run.is_none() && simulation_run.is_none() {
        return Err(AppError::NotFound(format!(
            "No user or assessment run for owner '{}'",
            owner.raw
        )));
    }

    Ok(Json(evaluate_readiness(
        user.as_ref(),
        analysis_run.as_ref(),
        simulation_run.as_ref(),
    )))
}

/// DELETE /api/v1/assessments/:owner
pub async fn handle_reset_owner(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<ResetResponse>, AppError> {
    let owner = resolve_request_owner(&state, &owner).await?;
    let deleted_runs = pipeline::reset_owner(&*state.store, &owner).await?;
    Ok(Json(ResetResponse { deleted_runs }))
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn resolve_request_owner(state: &AppState, raw: &str) -> Result<OwnerQuery, AppError> {
    let ident = OwnerIdentifier::new(raw);
    if ident.is_empty() {
        return Err(AppError::Validation("owner must not be empty".to_string()));
    }
    Ok(identity::resolve_owner(&state.db, raw).await?)
}

fn language_of(language: &Option<String>) -> &str {
    language.as_deref().unwrap_or(DEFAULT_LANGUAGE)
}

fn extract_pdf_text(bytes: &[u8]) -> Result<String, AppError> {
    let text = pdf_extract::extract_text_from_mem(bytes)
        .map_err(|e| AppError::Validation(format!("Could not read PDF: {e}")))?;
    if text.trim().is_empty() {
        return Err(AppError::Validation(
            "The PDF contains no extractable text".to_string(),
        ));
    }
    Ok(text)
}

/// A payload field that the pipeline just wrote. Absence here is a bug, not a
/// client error.
fn expect_artifact<T: Clone>(field: &Option<SqlJson<T>>, label: &str) -> Result<T, AppError> {
    field
        .as_ref()
        .map(|j| j.0.clone())
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("{label} missing after write")))
}

fn expect_text(field: &Option<String>, label: &str) -> Result<String, AppError> {
    field
        .clone()
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("{label} missing after write")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_request_defaults() {
        let req: StageRequest =
            serde_json::from_str(r#"{"owner": "jane@example.com"}"#).unwrap();
        assert_eq!(req.owner, "jane@example.com");
        assert!(req.language.is_none());
        assert!(req.expected_version.is_none());
    }

    #[test]
    fn test_complete_simulation_request_accepts_results() {
        let req: CompleteSimulationRequest = serde_json::from_str(
            r#"{
                "owner": "jane@example.com",
                "results": {
                    "summary": "solid",
                    "strengths": [],
                    "areas_for_improvement": [],
                    "overall_score": 7.0
                },
                "expected_version": 4
            }"#,
        )
        .unwrap();
        assert!(req.results.is_some());
        assert_eq!(req.expected_version, Some(4));
    }

    #[test]
    fn test_select_role_request_requires_role() {
        let result: Result<SelectRoleRequest, _> =
            serde_json::from_str(r#"{"owner": "jane@example.com"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_extract_pdf_text_rejects_garbage() {
        let err = extract_pdf_text(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn test_language_defaults_to_english() {
        assert_eq!(language_of(&None), "en");
        assert_eq!(language_of(&Some("pt-BR".to_string())), "pt-BR");
    }
}
