//! Run persistence. Every mutation is a single SQL statement: payload columns
//! are overwritten with COALESCE, the completion bitset is merged with jsonb
//! `||` (only true flags in the patch, so nothing resets), and transcript
//! appends concatenate onto the array in place. Interleaved writers can race
//! freely without losing each other's fields.

use async_trait::async_trait;
use sqlx::types::Json;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::assessment::models::{
    Artifact, AssessmentRun, CompletionStatus, CvAnalysis, InterviewEvaluation, RoleSuggestion,
    SelectedRole, SimulationResults, TranscriptTrack, TranscriptTurn,
};
use crate::errors::AppError;
use crate::identity::OwnerQuery;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("assessment run {0} not found")]
    RunNotFound(Uuid),

    #[error("run {run_id} is at version {actual}, write expected version {expected}")]
    StaleWrite {
        run_id: Uuid,
        expected: i64,
        actual: i64,
    },

    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::RunNotFound(id) => {
                AppError::NotFound(format!("Assessment run {id} not found"))
            }
            StoreError::StaleWrite { .. } => AppError::Conflict(err.to_string()),
            StoreError::Database(e) => AppError::Database(e),
        }
    }
}

/// Fields for bootstrapping a fresh run.
#[derive(Debug, Clone)]
pub struct NewRun {
    pub owner_identifier: String,
    pub owner_key: String,
    pub user_id: Option<Uuid>,
    pub origin: String,
    pub cv_text: Option<String>,
}

impl NewRun {
    pub fn for_owner(owner: &OwnerQuery, origin: &str) -> Self {
        Self {
            owner_identifier: owner.raw.clone(),
            owner_key: crate::identity::normalize_key(&owner.raw),
            user_id: owner.user_id,
            origin: origin.to_string(),
            cv_text: None,
        }
    }
}

/// A field-level update. `None` payload fields are left untouched;
/// `completion` lists the flags this write grants (union-merged, never
/// cleared). `expected_version` arms compare-and-set.
#[derive(Debug, Clone, Default)]
pub struct RunPatch {
    pub cv_text: Option<String>,
    pub analysis: Option<CvAnalysis>,
    pub interview_evaluation: Option<InterviewEvaluation>,
    pub role_suggestions: Option<Vec<RoleSuggestion>>,
    pub selected_role: Option<SelectedRole>,
    pub generated_cv: Option<String>,
    pub simulation_results: Option<SimulationResults>,
    pub strategic_report: Option<String>,
    pub completion: CompletionStatus,
    pub expected_version: Option<i64>,
}

/// Persistence seam for assessment runs.
#[async_trait]
pub trait ProgressStore: Send + Sync {
    /// The owner's most recently touched run, if any.
    async fn latest_run(&self, owner: &OwnerQuery) -> Result<Option<AssessmentRun>, StoreError>;

    /// The owner's most recently touched run that carries the given artifact.
    async fn latest_run_with(
        &self,
        owner: &OwnerQuery,
        artifact: Artifact,
    ) -> Result<Option<AssessmentRun>, StoreError>;

    async fn insert_run(&self, new_run: NewRun) -> Result<AssessmentRun, StoreError>;

    /// Applies a field-level patch in one atomic write and returns the
    /// updated row. Fails with `StaleWrite` when `expected_version` is armed
    /// and no longer current.
    async fn apply(&self, run_id: Uuid, patch: RunPatch) -> Result<AssessmentRun, StoreError>;

    /// Appends one turn to a transcript in one atomic write.
    async fn append_turn(
        &self,
        run_id: Uuid,
        track: TranscriptTrack,
        turn: TranscriptTurn,
    ) -> Result<AssessmentRun, StoreError>;

    /// Removes every run matching the owner. Returns the number deleted.
    async fn delete_owner_runs(&self, owner: &OwnerQuery) -> Result<u64, StoreError>;
}

/// Whether a run belongs to the queried owner: explicit user link, any
/// normalized alias, or a raw-identifier match for rows predating key
/// normalization. The SQL in `PgProgressStore` mirrors this exactly.
pub fn owner_matches(owner: &OwnerQuery, run: &AssessmentRun) -> bool {
    (owner.user_id.is_some() && run.user_id == owner.user_id)
        || owner.keys.iter().any(|k| *k == run.owner_key)
        || run.owner_identifier == owner.raw
}

// ────────────────────────────────────────────────────────────────────────────
// Postgres implementation
// ────────────────────────────────────────────────────────────────────────────

const OWNER_PREDICATE: &str =
    "(user_id = $1 OR owner_key = ANY($2) OR owner_identifier = $3)";

#[derive(Clone)]
pub struct PgProgressStore {
    pool: PgPool,
}

impl PgProgressStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn current_version(&self, run_id: Uuid) -> Result<Option<i64>, StoreError> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT version FROM assessment_runs WHERE id = $1")
                .bind(run_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(version)
    }
}

#[async_trait]
impl ProgressStore for PgProgressStore {
    async fn latest_run(&self, owner: &OwnerQuery) -> Result<Option<AssessmentRun>, StoreError> {
        let sql = format!(
            "SELECT * FROM assessment_runs WHERE {OWNER_PREDICATE} \
             ORDER BY updated_at DESC LIMIT 1"
        );
        let run = sqlx::query_as::<_, AssessmentRun>(&sql)
            .bind(owner.user_id)
            .bind(&owner.keys)
            .bind(&owner.raw)
            .fetch_optional(&self.pool)
            .await?;
        Ok(run)
    }

    async fn latest_run_with(
        &self,
        owner: &OwnerQuery,
        artifact: Artifact,
    ) -> Result<Option<AssessmentRun>, StoreError> {
        let sql = format!(
            "SELECT * FROM assessment_runs WHERE {OWNER_PREDICATE} AND {} \
             ORDER BY updated_at DESC LIMIT 1",
            artifact.sql_predicate()
        );
        let run = sqlx::query_as::<_, AssessmentRun>(&sql)
            .bind(owner.user_id)
            .bind(&owner.keys)
            .bind(&owner.raw)
            .fetch_optional(&self.pool)
            .await?;
        Ok(run)
    }

    async fn insert_run(&self, new_run: NewRun) -> Result<AssessmentRun, StoreError> {
        let run = sqlx::query_as::<_, AssessmentRun>(
            r#"
            INSERT INTO assessment_runs
                (id, user_id, owner_identifier, owner_key, origin, cv_text)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(new_run.user_id)
        .bind(&new_run.owner_identifier)
        .bind(&new_run.owner_key)
        .bind(&new_run.origin)
        .bind(&new_run.cv_text)
        .fetch_one(&self.pool)
        .await?;
        Ok(run)
    }

    async fn apply(&self, run_id: Uuid, patch: RunPatch) -> Result<AssessmentRun, StoreError> {
        let updated = sqlx::query_as::<_, AssessmentRun>(
            r#"
            UPDATE assessment_runs SET
                cv_text = COALESCE($2, cv_text),
                analysis = COALESCE($3, analysis),
                interview_evaluation = COALESCE($4, interview_evaluation),
                role_suggestions = COALESCE($5, role_suggestions),
                selected_role = COALESCE($6, selected_role),
                generated_cv = COALESCE($7, generated_cv),
                simulation_results = COALESCE($8, simulation_results),
                strategic_report = COALESCE($9, strategic_report),
                completion = completion || $10,
                version = version + 1,
                updated_at = now()
            WHERE id = $1 AND ($11::bigint IS NULL OR version = $11)
            RETURNING *
            "#,
        )
        .bind(run_id)
        .bind(&patch.cv_text)
        .bind(patch.analysis.as_ref().map(|v| Json(v.clone())))
        .bind(patch.interview_evaluation.as_ref().map(|v| Json(v.clone())))
        .bind(patch.role_suggestions.as_ref().map(|v| Json(v.clone())))
        .bind(patch.selected_role.as_ref().map(|v| Json(v.clone())))
        .bind(&patch.generated_cv)
        .bind(patch.simulation_results.as_ref().map(|v| Json(v.clone())))
        .bind(&patch.strategic_report)
        .bind(patch.completion.true_patch())
        .bind(patch.expected_version)
        .fetch_optional(&self.pool)
        .await?;

        match updated {
            Some(run) => Ok(run),
            // No row matched: either the run is gone or the version check
            // failed. One follow-up read tells them apart.
            None => match (self.current_version(run_id).await?, patch.expected_version) {
                (Some(actual), Some(expected)) => Err(StoreError::StaleWrite {
                    run_id,
                    expected,
                    actual,
                }),
                _ => Err(StoreError::RunNotFound(run_id)),
            },
        }
    }

    async fn append_turn(
        &self,
        run_id: Uuid,
        track: TranscriptTrack,
        turn: TranscriptTurn,
    ) -> Result<AssessmentRun, StoreError> {
        // jsonb `||` appends the object as one array element.
        let sql = match track {
            TranscriptTrack::Interview => {
                r#"
                UPDATE assessment_runs SET
                    interview_transcript = interview_transcript || $2,
                    version = version + 1,
                    updated_at = now()
                WHERE id = $1
                RETURNING *
                "#
            }
            TranscriptTrack::Simulation => {
                r#"
                UPDATE assessment_runs SET
                    simulation_transcript = simulation_transcript || $2,
                    version = version + 1,
                    updated_at = now()
                WHERE id = $1
                RETURNING *
                "#
            }
        };

        let updated = sqlx::query_as::<_, AssessmentRun>(sql)
            .bind(run_id)
            .bind(Json(turn))
            .fetch_optional(&self.pool)
            .await?;

        updated.ok_or(StoreError::RunNotFound(run_id))
    }

    async fn delete_owner_runs(&self, owner: &OwnerQuery) -> Result<u64, StoreError> {
        let sql = format!("DELETE FROM assessment_runs WHERE {OWNER_PREDICATE}");
        let result = sqlx::query(&sql)
            .bind(owner.user_id)
            .bind(&owner.keys)
            .bind(&owner.raw)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{OwnerIdentifier, OwnerQuery};
    use crate::testutil::make_run;

    #[test]
    fn test_owner_matches_normalized_key() {
        let run = make_run("jane@example.com");
        let owner = OwnerQuery::unresolved(&OwnerIdentifier::new("JANE@Example.com"));
        assert!(owner_matches(&owner, &run));
    }

    #[test]
    fn test_owner_matches_raw_identifier_fallback() {
        // Legacy row: identifier stored with odd casing, key column matches
        // it only through the raw leg.
        let mut run = make_run("jane@example.com");
        run.owner_identifier = "Jane Doe".to_string();
        run.owner_key = "stale-key".to_string();

        let owner = OwnerQuery::unresolved(&OwnerIdentifier::new("Jane Doe"));
        assert!(owner_matches(&owner, &run));
    }

    #[test]
    fn test_owner_does_not_match_stranger() {
        let run = make_run("jane@example.com");
        let owner = OwnerQuery::unresolved(&OwnerIdentifier::new("john@example.com"));
        assert!(!owner_matches(&owner, &run));
    }

    #[test]
    fn test_owner_matches_user_link() {
        let mut run = make_run("anything");
        let user_id = Uuid::new_v4();
        run.user_id = Some(user_id);
        run.owner_key = "unrelated".to_string();
        run.owner_identifier = "unrelated".to_string();

        let mut owner = OwnerQuery::unresolved(&OwnerIdentifier::new("jane@example.com"));
        owner.user_id = Some(user_id);
        assert!(owner_matches(&owner, &run));
    }

    #[test]
    fn test_stale_write_maps_to_conflict() {
        let err: AppError = StoreError::StaleWrite {
            run_id: Uuid::new_v4(),
            expected: 3,
            actual: 5,
        }
        .into();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_missing_run_maps_to_not_found() {
        let err: AppError = StoreError::RunNotFound(Uuid::new_v4()).into();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn test_default_patch_changes_no_payload() {
        let patch = RunPatch::default();
        assert!(patch.cv_text.is_none());
        assert!(patch.analysis.is_none());
        assert_eq!(patch.completion, CompletionStatus::default());
        assert!(patch.expected_version.is_none());
        // An empty completion patch merges as a no-op.
        assert_eq!(patch.completion.true_patch(), serde_json::json!({}));
    }
}
