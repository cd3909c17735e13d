//! Test doubles shared across unit tests: an in-memory progress store with
//! the same observable semantics as the Postgres one, plus deterministic
//! generators for scripting pipeline outcomes without HTTP.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Value};
use sqlx::types::Json;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::assessment::generation::{GenerationError, StageGenerator, StageKind};
use crate::assessment::models::{
    Artifact, AssessmentRun, CompletionStatus, SimulationResults, TranscriptTrack, TranscriptTurn,
    ORIGIN_CV_UPLOAD,
};
use crate::assessment::store::{owner_matches, NewRun, ProgressStore, RunPatch, StoreError};
use crate::identity::{normalize_key, OwnerIdentifier, OwnerQuery};

pub fn make_query(raw: &str) -> OwnerQuery {
    OwnerQuery::unresolved(&OwnerIdentifier::new(raw))
}

/// A blank run owned by `raw`, at the initial stage.
pub fn make_run(raw: &str) -> AssessmentRun {
    let now = Utc::now();
    AssessmentRun {
        id: Uuid::new_v4(),
        user_id: None,
        owner_identifier: raw.trim().to_string(),
        owner_key: normalize_key(raw),
        origin: ORIGIN_CV_UPLOAD.to_string(),
        cv_text: None,
        analysis: None,
        interview_transcript: Json(Vec::new()),
        interview_evaluation: None,
        role_suggestions: None,
        selected_role: None,
        generated_cv: None,
        simulation_transcript: Json(Vec::new()),
        simulation_results: None,
        strategic_report: None,
        completion: Json(CompletionStatus::default()),
        version: 1,
        created_at: now,
        updated_at: now,
    }
}

pub fn sample_simulation_results() -> SimulationResults {
    SimulationResults {
        summary: "Held up well across a full practice loop.".to_string(),
        strengths: vec!["calm under pressure".to_string()],
        areas_for_improvement: vec!["answer brevity".to_string()],
        overall_score: 6.8,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// In-memory store
// ────────────────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct MemoryProgressStore {
    runs: Mutex<Vec<AssessmentRun>>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn run_count(&self) -> usize {
        self.runs.lock().await.len()
    }
}

#[async_trait]
impl ProgressStore for MemoryProgressStore {
    async fn latest_run(&self, owner: &OwnerQuery) -> Result<Option<AssessmentRun>, StoreError> {
        let runs = self.runs.lock().await;
        Ok(runs
            .iter()
            .filter(|r| owner_matches(owner, r))
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn latest_run_with(
        &self,
        owner: &OwnerQuery,
        artifact: Artifact,
    ) -> Result<Option<AssessmentRun>, StoreError> {
        let runs = self.runs.lock().await;
        Ok(runs
            .iter()
            .filter(|r| owner_matches(owner, r) && artifact.present_in(r))
            .max_by_key(|r| r.updated_at)
            .cloned())
    }

    async fn insert_run(&self, new_run: NewRun) -> Result<AssessmentRun, StoreError> {
        let mut runs = self.runs.lock().await;
        let now = Utc::now();
        let run = AssessmentRun {
            id: Uuid::new_v4(),
            user_id: new_run.user_id,
            owner_identifier: new_run.owner_identifier,
            owner_key: new_run.owner_key,
            origin: new_run.origin,
            cv_text: new_run.cv_text,
            analysis: None,
            interview_transcript: Json(Vec::new()),
            interview_evaluation: None,
            role_suggestions: None,
            selected_role: None,
            generated_cv: None,
            simulation_transcript: Json(Vec::new()),
            simulation_results: None,
            strategic_report: None,
            completion: Json(CompletionStatus::default()),
            version: 1,
            created_at: now,
            updated_at: now,
        };
        runs.push(run.clone());
        Ok(run)
    }

    async fn apply(&self, run_id: Uuid, patch: RunPatch) -> Result<AssessmentRun, StoreError> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;

        if let Some(expected) = patch.expected_version {
            if run.version != expected {
                return Err(StoreError::StaleWrite {
                    run_id,
                    expected,
                    actual: run.version,
                });
            }
        }

        if let Some(v) = patch.cv_text {
            run.cv_text = Some(v);
        }
        if let Some(v) = patch.analysis {
            run.analysis = Some(Json(v));
        }
        if let Some(v) = patch.interview_evaluation {
            run.interview_evaluation = Some(Json(v));
        }
        if let Some(v) = patch.role_suggestions {
            run.role_suggestions = Some(Json(v));
        }
        if let Some(v) = patch.selected_role {
            run.selected_role = Some(Json(v));
        }
        if let Some(v) = patch.generated_cv {
            run.generated_cv = Some(v);
        }
        if let Some(v) = patch.simulation_results {
            run.simulation_results = Some(Json(v));
        }
        if let Some(v) = patch.strategic_report {
            run.strategic_report = Some(v);
        }
        run.completion = Json(run.completion.0.merge(&patch.completion));
        run.version += 1;
        run.updated_at = Utc::now();

        Ok(run.clone())
    }

    async fn append_turn(
        &self,
        run_id: Uuid,
        track: TranscriptTrack,
        turn: TranscriptTurn,
    ) -> Result<AssessmentRun, StoreError> {
        let mut runs = self.runs.lock().await;
        let run = runs
            .iter_mut()
            .find(|r| r.id == run_id)
            .ok_or(StoreError::RunNotFound(run_id))?;

        match track {
            TranscriptTrack::Interview => run.interview_transcript.0.push(turn),
            TranscriptTrack::Simulation => run.simulation_transcript.0.push(turn),
        }
        run.version += 1;
        run.updated_at = Utc::now();

        Ok(run.clone())
    }

    async fn delete_owner_runs(&self, owner: &OwnerQuery) -> Result<u64, StoreError> {
        let mut runs = self.runs.lock().await;
        let before = runs.len();
        runs.retain(|r| !owner_matches(owner, r));
        Ok((before - runs.len()) as u64)
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Scripted generators
// ────────────────────────────────────────────────────────────────────────────

/// Deterministic generator: the same kind and context always produce the same
/// artifact, which is what idempotency tests lean on.
pub struct ScriptedGenerator;

#[async_trait]
impl StageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        kind: StageKind,
        _context: &Value,
        _language: &str,
    ) -> Result<Value, GenerationError> {
        Ok(match kind {
            StageKind::CvAnalysis => json!({
                "summary": "Seasoned backend engineer with storage depth.",
                "strengths": ["distributed systems", "ownership of delivery"],
                "areas_for_improvement": ["public speaking"],
                "key_skills": ["rust", "postgresql"],
                "experience_level": "senior"
            }),
            StageKind::InterviewQuestion => {
                json!("Walk me through a system you designed end to end.")
            }
            StageKind::InterviewEvaluation => json!({
                "summary": "Structured, specific answers with real depth.",
                "strengths": ["structured thinking"],
                "areas_for_improvement": ["quantifying impact"],
                "overall_score": 7.5
            }),
            StageKind::RoleDiscovery => json!([
                {
                    "title": "Senior Backend Engineer",
                    "match_score": 0.9,
                    "rationale": "Storage depth maps directly onto the role.",
                    "required_skills": ["rust", "postgresql"]
                },
                {
                    "title": "Platform Engineer",
                    "match_score": 0.75,
                    "rationale": "Infrastructure ownership shows through.",
                    "required_skills": ["kubernetes", "terraform"]
                }
            ]),
            StageKind::CvGeneration => {
                json!("# Jane Doe\n\nBackend engineer tailored for the selected role.")
            }
            StageKind::SimulationReply => {
                json!("How would you scale our ingestion pipeline tenfold?")
            }
            StageKind::SimulationEvaluation => json!({
                "summary": "Ready for mid-to-senior interview loops.",
                "strengths": ["calm under pressure"],
                "areas_for_improvement": ["answer brevity"],
                "overall_score": 6.8
            }),
            StageKind::StrategicReport => {
                json!("# Strategic Career Report\n\n1. Where You Stand\n...")
            }
        })
    }
}

/// Generator that always fails upstream.
pub struct FailingGenerator;

#[async_trait]
impl StageGenerator for FailingGenerator {
    async fn generate(
        &self,
        _kind: StageKind,
        _context: &Value,
        _language: &str,
    ) -> Result<Value, GenerationError> {
        Err(GenerationError::Upstream("scripted failure".to_string()))
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Store semantics
// ────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assessment::models::TurnRole;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_interleaved_appends_lose_nothing() {
        let store = Arc::new(MemoryProgressStore::new());
        let run = store
            .insert_run(NewRun::for_owner(&make_query("jane@example.com"), ORIGIN_CV_UPLOAD))
            .await
            .unwrap();

        let mut handles = Vec::new();
        for writer in 0..2 {
            let store = Arc::clone(&store);
            let run_id = run.id;
            handles.push(tokio::spawn(async move {
                for i in 0..3 {
                    store
                        .append_turn(
                            run_id,
                            TranscriptTrack::Simulation,
                            TranscriptTurn::now(
                                TurnRole::Candidate,
                                format!("writer {writer} turn {i}"),
                            ),
                        )
                        .await
                        .unwrap();
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let run = store
            .latest_run(&make_query("jane@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(run.simulation_transcript.0.len(), 6);
    }

    #[tokio::test]
    async fn test_interleaved_flag_writes_both_land() {
        let store = Arc::new(MemoryProgressStore::new());
        let run = store
            .insert_run(NewRun::for_owner(&make_query("jane@example.com"), ORIGIN_CV_UPLOAD))
            .await
            .unwrap();

        let a = {
            let store = Arc::clone(&store);
            let id = run.id;
            tokio::spawn(async move {
                store
                    .apply(
                        id,
                        RunPatch {
                            completion: CompletionStatus {
                                cv_analysis_complete: true,
                                ..Default::default()
                            },
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap()
            })
        };
        let b = {
            let store = Arc::clone(&store);
            let id = run.id;
            tokio::spawn(async move {
                store
                    .apply(
                        id,
                        RunPatch {
                            completion: CompletionStatus {
                                role_selected: true,
                                ..Default::default()
                            },
                            ..Default::default()
                        },
                    )
                    .await
                    .unwrap()
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        let run = store
            .latest_run(&make_query("jane@example.com"))
            .await
            .unwrap()
            .unwrap();
        assert!(run.completion().cv_analysis_complete);
        assert!(run.completion().role_selected);
        assert_eq!(run.version, 3);
    }

    #[tokio::test]
    async fn test_artifact_priority_beats_recency() {
        let store = MemoryProgressStore::new();
        let owner = make_query("jane@example.com");

        // Older run carries the analysis; newer run is sparse.
        let with_analysis = store
            .insert_run(NewRun::for_owner(&owner, ORIGIN_CV_UPLOAD))
            .await
            .unwrap();
        store
            .apply(
                with_analysis.id,
                RunPatch {
                    analysis: Some(crate::assessment::models::CvAnalysis {
                        summary: "solid".to_string(),
                        strengths: vec![],
                        areas_for_improvement: vec![],
                        key_skills: vec![],
                        experience_level: "senior".to_string(),
                    }),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        let sparse = store
            .insert_run(NewRun::for_owner(&owner, ORIGIN_CV_UPLOAD))
            .await
            .unwrap();

        let latest = store.latest_run(&owner).await.unwrap().unwrap();
        assert_eq!(latest.id, sparse.id);

        let with_artifact = store
            .latest_run_with(&owner, Artifact::Analysis)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(with_artifact.id, with_analysis.id);
    }

    #[tokio::test]
    async fn test_stale_write_is_rejected() {
        let store = MemoryProgressStore::new();
        let run = store
            .insert_run(NewRun::for_owner(&make_query("jane@example.com"), ORIGIN_CV_UPLOAD))
            .await
            .unwrap();

        // First write bumps the version from 1 to 2.
        store
            .apply(
                run.id,
                RunPatch {
                    cv_text: Some("first".to_string()),
                    expected_version: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        // A writer still holding version 1 must be turned away.
        let err = store
            .apply(
                run.id,
                RunPatch {
                    cv_text: Some("second".to_string()),
                    expected_version: Some(1),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::StaleWrite { actual: 2, .. }));
    }
}
