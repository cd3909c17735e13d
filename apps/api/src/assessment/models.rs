//! Assessment domain model.
//!
//! A run's persisted truth is its payload columns plus the completion bitset;
//! the pipeline stage is never stored. `AssessmentRun::stage()` projects it on
//! read, so there is no stored stage to drift out of sync with the flags.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

/// Run bootstrapped by a CV upload (the normal entry point).
pub const ORIGIN_CV_UPLOAD: &str = "cv_upload";
/// Run bootstrapped by completing a simulation with no prior run on record.
pub const ORIGIN_SIMULATION_FAST_PATH: &str = "simulation_fast_path";

// ────────────────────────────────────────────────────────────────────────────
// Stage projection
// ────────────────────────────────────────────────────────────────────────────

/// Where an assessment run stands, derived from its artifacts and flags.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    CvUpload,
    AnalysisComplete,
    InterviewInProgress,
    InterviewComplete,
    RoleDiscovery,
    RoleSelected,
    CvGeneration,
    SimulationInProgress,
    Completed,
}

impl Stage {
    /// Pipeline position. `CvGeneration` and `SimulationInProgress` share a
    /// rank: both are post-selection activities running in parallel tracks.
    pub fn rank(&self) -> u8 {
        match self {
            Stage::CvUpload => 0,
            Stage::AnalysisComplete => 1,
            Stage::InterviewInProgress => 2,
            Stage::InterviewComplete => 3,
            Stage::RoleDiscovery => 4,
            Stage::RoleSelected => 5,
            Stage::CvGeneration => 6,
            Stage::SimulationInProgress => 6,
            Stage::Completed => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::CvUpload => "cv_upload",
            Stage::AnalysisComplete => "analysis_complete",
            Stage::InterviewInProgress => "interview_in_progress",
            Stage::InterviewComplete => "interview_complete",
            Stage::RoleDiscovery => "role_discovery",
            Stage::RoleSelected => "role_selected",
            Stage::CvGeneration => "cv_generation",
            Stage::SimulationInProgress => "simulation_in_progress",
            Stage::Completed => "completed",
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Completion bitset
// ────────────────────────────────────────────────────────────────────────────

/// Which milestones a run has passed. Flags only ever go from false to true;
/// every write path merges with union semantics, so a flag set once stays set
/// no matter how stale the writer's snapshot was.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionStatus {
    #[serde(default)]
    pub cv_analysis_complete: bool,
    #[serde(default)]
    pub interview_complete: bool,
    #[serde(default)]
    pub role_discovery_complete: bool,
    #[serde(default)]
    pub role_selected: bool,
    #[serde(default)]
    pub simulation_complete: bool,
    #[serde(default)]
    pub strategic_report_complete: bool,
}

impl CompletionStatus {
    /// Union of two statuses. Commutative, idempotent, and absorbing: merging
    /// never clears a flag.
    pub fn merge(&self, other: &CompletionStatus) -> CompletionStatus {
        CompletionStatus {
            cv_analysis_complete: self.cv_analysis_complete || other.cv_analysis_complete,
            interview_complete: self.interview_complete || other.interview_complete,
            role_discovery_complete: self.role_discovery_complete
                || other.role_discovery_complete,
            role_selected: self.role_selected || other.role_selected,
            simulation_complete: self.simulation_complete || other.simulation_complete,
            strategic_report_complete: self.strategic_report_complete
                || other.strategic_report_complete,
        }
    }

    /// JSON object holding only the flags that are true. Feeding this to a
    /// jsonb `||` merge sets new flags without ever writing a `false` over an
    /// existing `true`.
    pub fn true_patch(&self) -> serde_json::Value {
        let mut map = serde_json::Map::new();
        for (name, set) in [
            ("cv_analysis_complete", self.cv_analysis_complete),
            ("interview_complete", self.interview_complete),
            ("role_discovery_complete", self.role_discovery_complete),
            ("role_selected", self.role_selected),
            ("simulation_complete", self.simulation_complete),
            ("strategic_report_complete", self.strategic_report_complete),
        ] {
            if set {
                map.insert(name.to_string(), serde_json::Value::Bool(true));
            }
        }
        serde_json::Value::Object(map)
    }

    pub fn is_superset_of(&self, other: &CompletionStatus) -> bool {
        self.merge(other) == *self
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Transcripts
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TurnRole {
    Candidate,
    Interviewer,
}

/// One utterance in an interview or simulation transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TranscriptTurn {
    pub role: TurnRole,
    pub content: String,
    pub timestamp: DateTime<Utc>,
}

impl TranscriptTurn {
    pub fn now(role: TurnRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Which transcript column an append targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TranscriptTrack {
    Interview,
    Simulation,
}

// ────────────────────────────────────────────────────────────────────────────
// Stage payloads
// ────────────────────────────────────────────────────────────────────────────

/// Structured verdict from CV analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CvAnalysis {
    pub summary: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub key_skills: Vec<String>,
    pub experience_level: String,
}

/// Structured verdict over a finished interview transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterviewEvaluation {
    pub summary: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub overall_score: f64,
}

/// One suggested career direction out of role discovery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoleSuggestion {
    pub title: String,
    pub match_score: f64,
    pub rationale: String,
    pub required_skills: Vec<String>,
}

/// The role the candidate committed to pursuing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SelectedRole {
    pub title: String,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Scored outcome of an interview simulation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SimulationResults {
    pub summary: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub overall_score: f64,
}

// ────────────────────────────────────────────────────────────────────────────
// The run row
// ────────────────────────────────────────────────────────────────────────────

/// One assessment run. `user_id` is set when the owner resolved to a canonical
/// account at write time; `owner_key` is the normalized identifier, and
/// `owner_identifier` preserves what the client actually sent.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AssessmentRun {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub owner_identifier: String,
    pub owner_key: String,
    pub origin: String,
    pub cv_text: Option<String>,
    pub analysis: Option<Json<CvAnalysis>>,
    pub interview_transcript: Json<Vec<TranscriptTurn>>,
    pub interview_evaluation: Option<Json<InterviewEvaluation>>,
    pub role_suggestions: Option<Json<Vec<RoleSuggestion>>>,
    pub selected_role: Option<Json<SelectedRole>>,
    pub generated_cv: Option<String>,
    pub simulation_transcript: Json<Vec<TranscriptTurn>>,
    pub simulation_results: Option<Json<SimulationResults>>,
    pub strategic_report: Option<String>,
    pub completion: Json<CompletionStatus>,
    pub version: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl AssessmentRun {
    /// Projects the pipeline stage from flags and artifacts. Checks run in
    /// descending rank order, so granting a flag or adding an artifact can
    /// only move the projection forward. A completed run stays completed no
    /// matter what is overwritten afterwards.
    pub fn stage(&self) -> Stage {
        let c = &self.completion.0;
        if c.strategic_report_complete || c.simulation_complete {
            Stage::Completed
        } else if !self.simulation_transcript.0.is_empty() {
            Stage::SimulationInProgress
        } else if self.generated_cv.is_some() {
            Stage::CvGeneration
        } else if c.role_selected {
            Stage::RoleSelected
        } else if c.role_discovery_complete {
            Stage::RoleDiscovery
        } else if c.interview_complete {
            Stage::InterviewComplete
        } else if !self.interview_transcript.0.is_empty() {
            Stage::InterviewInProgress
        } else if c.cv_analysis_complete {
            Stage::AnalysisComplete
        } else {
            Stage::CvUpload
        }
    }

    pub fn completion(&self) -> &CompletionStatus {
        &self.completion.0
    }
}

/// A stage artifact a lookup can require. Used by the artifact-priority
/// variant of run resolution: "the newest run that actually has X".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Artifact {
    Analysis,
    SimulationResults,
    StrategicReport,
    GeneratedCv,
}

impl Artifact {
    pub fn present_in(&self, run: &AssessmentRun) -> bool {
        match self {
            Artifact::Analysis => run.analysis.is_some(),
            Artifact::SimulationResults => run.simulation_results.is_some(),
            Artifact::StrategicReport => run.strategic_report.is_some(),
            Artifact::GeneratedCv => run.generated_cv.is_some(),
        }
    }

    /// SQL predicate selecting rows that carry this artifact.
    pub fn sql_predicate(&self) -> &'static str {
        match self {
            Artifact::Analysis => "analysis IS NOT NULL",
            Artifact::SimulationResults => "simulation_results IS NOT NULL",
            Artifact::StrategicReport => "strategic_report IS NOT NULL",
            Artifact::GeneratedCv => "generated_cv IS NOT NULL",
        }
    }
}
