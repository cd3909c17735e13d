//! Assessment pipeline: orchestrates every stage transition.
//!
//! Flow: resolve owner → load run → check prerequisite → generate artifact →
//! persist in one store write → respond. Prerequisites are strict: an
//! operation whose upstream artifact is missing fails with
//! `PrerequisiteMissing`. The one sanctioned exception is
//! `complete_simulation`, which bootstraps a sparse run for owners we have
//! never seen, tagged with its own origin so the shortcut stays visible.
//!
//! Generation failures surface immediately. Whatever was persisted before the
//! failure stays persisted; a candidate turn appended before a failed reply
//! is kept.

use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::info;

use crate::assessment::generation::{StageGenerator, StageKind};
use crate::assessment::models::{
    AssessmentRun, CompletionStatus, RoleSuggestion, SelectedRole, SimulationResults,
    TranscriptTrack, TranscriptTurn, TurnRole, ORIGIN_CV_UPLOAD, ORIGIN_SIMULATION_FAST_PATH,
};
use crate::assessment::store::{NewRun, ProgressStore, RunPatch};
use crate::errors::AppError;
use crate::identity::OwnerQuery;

/// A conversational step: the updated run plus the counterpart's message.
#[derive(Debug)]
pub struct TurnOutcome {
    pub run: AssessmentRun,
    pub reply: String,
}

// ────────────────────────────────────────────────────────────────────────────
// CV analysis
// ────────────────────────────────────────────────────────────────────────────

/// Analyzes a CV, bootstrapping a run when the owner has none. Re-running
/// overwrites the analysis in place; flags already earned stay earned.
pub async fn analyze_cv(
    store: &dyn ProgressStore,
    generator: &dyn StageGenerator,
    owner: &OwnerQuery,
    cv_text: &str,
    language: &str,
) -> Result<AssessmentRun, AppError> {
    if cv_text.trim().is_empty() {
        return Err(AppError::Validation("cv_text must not be empty".to_string()));
    }

    let run = match store.latest_run(owner).await? {
        Some(run) => run,
        None => {
            let run = store
                .insert_run(NewRun::for_owner(owner, ORIGIN_CV_UPLOAD))
                .await?;
            info!("Bootstrapped run {} for owner '{}'", run.id, owner.raw);
            run
        }
    };

    let context = serde_json::json!({ "cv_text": cv_text });
    let value = generator
        .generate(StageKind::CvAnalysis, &context, language)
        .await?;
    let analysis = typed_artifact("analysis", value)?;

    let updated = store
        .apply(
            run.id,
            RunPatch {
                cv_text: Some(cv_text.to_string()),
                analysis: Some(analysis),
                completion: CompletionStatus {
                    cv_analysis_complete: true,
                    ..Default::default()
                },
                ..Default::default()
            },
        )
        .await?;

    info!("CV analysis stored for run {}", updated.id);
    Ok(updated)
}

// ────────────────────────────────────────────────────────────────────────────
// Interview
// ────────────────────────────────────────────────────────────────────────────

/// Records the candidate's message and produces the interviewer's next
/// question. The candidate turn is persisted before the generator is called,
/// so a failed question still leaves the answer on record.
pub async fn interview_turn(
    store: &dyn ProgressStore,
    generator: &dyn StageGenerator,
    owner: &OwnerQuery,
    message: &str,
    language: &str,
) -> Result<TurnOutcome, AppError> {
    if message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    let run = require_run(store, owner).await?;
    if !run.completion().cv_analysis_complete {
        return Err(AppError::PrerequisiteMissing(
            "The interview requires a completed CV analysis".to_string(),
        ));
    }

    let run = store
        .append_turn(
            run.id,
            TranscriptTrack::Interview,
            TranscriptTurn::now(TurnRole::Candidate, message.trim()),
        )
        .await?;

    let context = serde_json::json!({
        "analysis": run.analysis.as_ref().map(|j| &j.0),
        "transcript": &run.interview_transcript.0,
    });
    let value = generator
        .generate(StageKind::InterviewQuestion, &context, language)
        .await?;
    let question = prose_artifact("interview question", value)?;

    let run = store
        .append_turn(
            run.id,
            TranscriptTrack::Interview,
            TranscriptTurn::now(TurnRole::Interviewer, question.clone()),
        )
        .await?;

    info!(
        "Interview turn stored for run {} ({} turns)",
        run.id,
        run.interview_transcript.0.len()
    );
    Ok(TurnOutcome { run, reply: question })
}

/// Evaluates the finished interview and marks it complete.
pub async fn complete_interview(
    store: &dyn ProgressStore,
    generator: &dyn StageGenerator,
    owner: &OwnerQuery,
    language: &str,
    expected_version: Option<i64>,
) -> Result<AssessmentRun, AppError> {
    let run = require_run(store, owner).await?;
    if run.interview_transcript.0.is_empty() {
        return Err(AppError::PrerequisiteMissing(
            "There is no interview transcript to evaluate".to_string(),
        ));
    }

    let context = serde_json::json!({ "transcript": &run.interview_transcript.0 });
    let value = generator
        .generate(StageKind::InterviewEvaluation, &context, language)
        .await?;
    let evaluation = typed_artifact("interview evaluation", value)?;

    let updated = store
        .apply(
            run.id,
            RunPatch {
                interview_evaluation: Some(evaluation),
                completion: CompletionStatus {
                    interview_complete: true,
                    ..Default::default()
                },
                expected_version,
                ..Default::default()
            },
        )
        .await?;

    info!("Interview evaluated for run {}", updated.id);
    Ok(updated)
}

// ────────────────────────────────────────────────────────────────────────────
// Role discovery and selection
// ────────────────────────────────────────────────────────────────────────────

/// Suggests target roles from the analysis and interview evaluation.
pub async fn discover_roles(
    store: &dyn ProgressStore,
    generator: &dyn StageGenerator,
    owner: &OwnerQuery,
    language: &str,
    expected_version: Option<i64>,
) -> Result<AssessmentRun, AppError> {
    let run = require_run(store, owner).await?;
    if !run.completion().interview_complete {
        return Err(AppError::PrerequisiteMissing(
            "Role discovery requires a completed interview".to_string(),
        ));
    }

    let context = serde_json::json!({
        "analysis": run.analysis.as_ref().map(|j| &j.0),
        "evaluation": run.interview_evaluation.as_ref().map(|j| &j.0),
    });
    let value = generator
        .generate(StageKind::RoleDiscovery, &context, language)
        .await?;
    let suggestions: Vec<RoleSuggestion> = typed_artifact("role suggestions", value)?;
    if suggestions.is_empty() {
        return Err(AppError::Generation(
            "role discovery produced no suggestions".to_string(),
        ));
    }

    let updated = store
        .apply(
            run.id,
            RunPatch {
                role_suggestions: Some(suggestions),
                completion: CompletionStatus {
                    role_discovery_complete: true,
                    ..Default::default()
                },
                expected_version,
                ..Default::default()
            },
        )
        .await?;

    info!(
        "Stored {} role suggestions for run {}",
        updated
            .role_suggestions
            .as_ref()
            .map(|j| j.0.len())
            .unwrap_or(0),
        updated.id
    );
    Ok(updated)
}

/// Commits the candidate to one target role. A selection without a title is
/// treated as a missing prerequisite, not silently accepted.
pub async fn select_role(
    store: &dyn ProgressStore,
    owner: &OwnerQuery,
    role: SelectedRole,
    expected_version: Option<i64>,
) -> Result<AssessmentRun, AppError> {
    let run = require_run(store, owner).await?;
    if !run.completion().role_discovery_complete {
        return Err(AppError::PrerequisiteMissing(
            "Role selection requires completed role discovery".to_string(),
        ));
    }
    if role.title.trim().is_empty() {
        return Err(AppError::PrerequisiteMissing(
            "Role selection requires a role with a title".to_string(),
        ));
    }

    let updated = store
        .apply(
            run.id,
            RunPatch {
                selected_role: Some(role),
                completion: CompletionStatus {
                    role_selected: true,
                    ..Default::default()
                },
                expected_version,
                ..Default::default()
            },
        )
        .await?;

    info!("Role selected for run {}", updated.id);
    Ok(updated)
}

// ────────────────────────────────────────────────────────────────────────────
// Tailored CV
// ────────────────────────────────────────────────────────────────────────────

/// Generates a CV tailored to the selected role.
pub async fn generate_cv(
    store: &dyn ProgressStore,
    generator: &dyn StageGenerator,
    owner: &OwnerQuery,
    language: &str,
    expected_version: Option<i64>,
) -> Result<AssessmentRun, AppError> {
    let run = require_run(store, owner).await?;
    if !run.completion().role_selected || run.selected_role.is_none() {
        return Err(AppError::PrerequisiteMissing(
            "CV generation requires a selected role".to_string(),
        ));
    }
    let Some(cv_text) = run.cv_text.as_deref() else {
        return Err(AppError::PrerequisiteMissing(
            "CV generation requires the original CV text".to_string(),
        ));
    };

    let context = serde_json::json!({
        "cv_text": cv_text,
        "analysis": run.analysis.as_ref().map(|j| &j.0),
        "role": run.selected_role.as_ref().map(|j| &j.0),
    });
    let value = generator
        .generate(StageKind::CvGeneration, &context, language)
        .await?;
    let document = prose_artifact("generated CV", value)?;

    let updated = store
        .apply(
            run.id,
            RunPatch {
                generated_cv: Some(document),
                expected_version,
                ..Default::default()
            },
        )
        .await?;

    info!("Tailored CV stored for run {}", updated.id);
    Ok(updated)
}

// ────────────────────────────────────────────────────────────────────────────
// Simulation
// ────────────────────────────────────────────────────────────────────────────

/// Records the candidate's message in the practice interview and produces the
/// simulated interviewer's reply.
pub async fn simulation_turn(
    store: &dyn ProgressStore,
    generator: &dyn StageGenerator,
    owner: &OwnerQuery,
    message: &str,
    language: &str,
) -> Result<TurnOutcome, AppError> {
    if message.trim().is_empty() {
        return Err(AppError::Validation("message must not be empty".to_string()));
    }

    let run = require_run(store, owner).await?;
    if !run.completion().role_selected {
        return Err(AppError::PrerequisiteMissing(
            "The simulation requires a selected role".to_string(),
        ));
    }

    let run = store
        .append_turn(
            run.id,
            TranscriptTrack::Simulation,
            TranscriptTurn::now(TurnRole::Candidate, message.trim()),
        )
        .await?;

    let context = serde_json::json!({
        "role": run.selected_role.as_ref().map(|j| &j.0),
        "transcript": &run.simulation_transcript.0,
    });
    let value = generator
        .generate(StageKind::SimulationReply, &context, language)
        .await?;
    let reply = prose_artifact("simulation reply", value)?;

    let run = store
        .append_turn(
            run.id,
            TranscriptTrack::Simulation,
            TranscriptTurn::now(TurnRole::Interviewer, reply.clone()),
        )
        .await?;

    info!(
        "Simulation turn stored for run {} ({} turns)",
        run.id,
        run.simulation_transcript.0.len()
    );
    Ok(TurnOutcome { run, reply })
}

/// Marks the simulation complete. Results may come from the client (offline
/// or externally scored sessions) or be evaluated from the transcript. An
/// owner with no run on record gets one bootstrapped here, the single
/// sanctioned shortcut into the pipeline, tagged by origin.
pub async fn complete_simulation(
    store: &dyn ProgressStore,
    generator: &dyn StageGenerator,
    owner: &OwnerQuery,
    supplied_results: Option<SimulationResults>,
    language: &str,
    expected_version: Option<i64>,
) -> Result<AssessmentRun, AppError> {
    let run = match store.latest_run(owner).await? {
        Some(run) => run,
        None => {
            let run = store
                .insert_run(NewRun::for_owner(owner, ORIGIN_SIMULATION_FAST_PATH))
                .await?;
            info!(
                "Bootstrapped fast-path run {} for owner '{}'",
                run.id, owner.raw
            );
            run
        }
    };

    let results = match supplied_results {
        Some(results) => results,
        None => {
            if run.simulation_transcript.0.is_empty() {
                return Err(AppError::Validation(
                    "Nothing to complete: supply results or conduct a simulation first"
                        .to_string(),
                ));
            }
            let context = serde_json::json!({
                "role": run.selected_role.as_ref().map(|j| &j.0),
                "transcript": &run.simulation_transcript.0,
            });
            let value = generator
                .generate(StageKind::SimulationEvaluation, &context, language)
                .await?;
            typed_artifact("simulation results", value)?
        }
    };

    let updated = store
        .apply(
            run.id,
            RunPatch {
                simulation_results: Some(results),
                completion: CompletionStatus {
                    simulation_complete: true,
                    ..Default::default()
                },
                expected_version,
                ..Default::default()
            },
        )
        .await?;

    info!("Simulation completed for run {}", updated.id);
    Ok(updated)
}

// ────────────────────────────────────────────────────────────────────────────
// Strategic report
// ────────────────────────────────────────────────────────────────────────────

/// Writes the strategic report from the accumulated artifacts. Interview and
/// simulation verdicts are optional inputs; analysis and a selected role are
/// not.
pub async fn generate_report(
    store: &dyn ProgressStore,
    generator: &dyn StageGenerator,
    owner: &OwnerQuery,
    language: &str,
    expected_version: Option<i64>,
) -> Result<AssessmentRun, AppError> {
    let run = require_run(store, owner).await?;
    if !run.completion().cv_analysis_complete {
        return Err(AppError::PrerequisiteMissing(
            "The strategic report requires a completed CV analysis".to_string(),
        ));
    }
    if !run.completion().role_selected {
        return Err(AppError::PrerequisiteMissing(
            "The strategic report requires a selected role".to_string(),
        ));
    }

    let context = serde_json::json!({
        "analysis": run.analysis.as_ref().map(|j| &j.0),
        "role": run.selected_role.as_ref().map(|j| &j.0),
        "evaluation": run.interview_evaluation.as_ref().map(|j| &j.0),
        "simulation": run.simulation_results.as_ref().map(|j| &j.0),
    });
    let value = generator
        .generate(StageKind::StrategicReport, &context, language)
        .await?;
    let report = prose_artifact("strategic report", value)?;

    let updated = store
        .apply(
            run.id,
            RunPatch {
                strategic_report: Some(report),
                completion: CompletionStatus {
                    strategic_report_complete: true,
                    ..Default::default()
                },
                expected_version,
                ..Default::default()
            },
        )
        .await?;

    info!("Strategic report stored for run {}", updated.id);
    Ok(updated)
}

// ────────────────────────────────────────────────────────────────────────────
// Reads and resets
// ────────────────────────────────────────────────────────────────────────────

pub async fn fetch_run(
    store: &dyn ProgressStore,
    owner: &OwnerQuery,
) -> Result<Option<AssessmentRun>, AppError> {
    Ok(store.latest_run(owner).await?)
}

/// Administrative wipe. The next CV analysis bootstraps a fresh run, so the
/// pipeline recovers from this at any point.
pub async fn reset_owner(store: &dyn ProgressStore, owner: &OwnerQuery) -> Result<u64, AppError> {
    let deleted = store.delete_owner_runs(owner).await?;
    info!("Deleted {} run(s) for owner '{}'", deleted, owner.raw);
    Ok(deleted)
}

// ────────────────────────────────────────────────────────────────────────────
// Helpers
// ────────────────────────────────────────────────────────────────────────────

async fn require_run(
    store: &dyn ProgressStore,
    owner: &OwnerQuery,
) -> Result<AssessmentRun, AppError> {
    store
        .latest_run(owner)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("No assessment run for owner '{}'", owner.raw)))
}

fn typed_artifact<T: DeserializeOwned>(label: &str, value: Value) -> Result<T, AppError> {
    serde_json::from_value(value)
        .map_err(|e| AppError::Generation(format!("unusable {label} payload: {e}")))
}

fn prose_artifact(label: &str, value: Value) -> Result<String, AppError> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Ok(s),
        _ => Err(AppError::Generation(format!(
            "unusable {label} payload: expected text"
        ))),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
