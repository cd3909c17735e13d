//! Generation seam for the assessment pipeline. The controller asks for a
//! stage artifact by kind; the production implementation renders the stage
//! prompt and makes one LLM call. Failures propagate to the caller; nothing
//! here queues or retries.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::assessment::prompts::{
    CV_ANALYSIS_PROMPT_TEMPLATE, CV_ANALYSIS_SYSTEM, CV_GENERATION_PROMPT_TEMPLATE,
    CV_GENERATION_SYSTEM, INTERVIEW_EVALUATION_PROMPT_TEMPLATE, INTERVIEW_EVALUATION_SYSTEM,
    INTERVIEW_QUESTION_PROMPT_TEMPLATE, INTERVIEW_QUESTION_SYSTEM, LANGUAGE_INSTRUCTION,
    ROLE_DISCOVERY_PROMPT_TEMPLATE, ROLE_DISCOVERY_SYSTEM, SIMULATION_EVALUATION_PROMPT_TEMPLATE,
    SIMULATION_EVALUATION_SYSTEM, SIMULATION_REPLY_PROMPT_TEMPLATE, SIMULATION_REPLY_SYSTEM,
    STRATEGIC_REPORT_PROMPT_TEMPLATE, STRATEGIC_REPORT_SYSTEM,
};
use crate::errors::AppError;
use crate::llm_client::{LlmClient, LlmError};

/// Language used when a request does not name one.
pub const DEFAULT_LANGUAGE: &str = "en";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("generation call failed: {0}")]
    Upstream(String),

    #[error("generator returned unusable output: {0}")]
    Malformed(String),
}

impl From<GenerationError> for AppError {
    fn from(err: GenerationError) -> Self {
        AppError::Generation(err.to_string())
    }
}

/// The artifact kinds the pipeline can request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    CvAnalysis,
    InterviewQuestion,
    InterviewEvaluation,
    RoleDiscovery,
    CvGeneration,
    SimulationReply,
    SimulationEvaluation,
    StrategicReport,
}

impl StageKind {
    /// Structured kinds return a JSON payload the pipeline deserializes;
    /// the rest return prose.
    pub fn is_structured(&self) -> bool {
        matches!(
            self,
            StageKind::CvAnalysis
                | StageKind::InterviewEvaluation
                | StageKind::RoleDiscovery
                | StageKind::SimulationEvaluation
        )
    }
}

/// Produces stage artifacts from run context. Held as a trait object so tests
/// can script outcomes without HTTP.
#[async_trait]
pub trait StageGenerator: Send + Sync {
    /// Produces the artifact for `kind`. Structured kinds yield a JSON object
    /// or array; prose kinds yield a JSON string.
    async fn generate(
        &self,
        kind: StageKind,
        context: &Value,
        language: &str,
    ) -> Result<Value, GenerationError>;
}

// ────────────────────────────────────────────────────────────────────────────
// LLM-backed implementation
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmGenerator {
    llm: LlmClient,
}

impl LlmGenerator {
    pub fn new(llm: LlmClient) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl StageGenerator for LlmGenerator {
    async fn generate(
        &self,
        kind: StageKind,
        context: &Value,
        language: &str,
    ) -> Result<Value, GenerationError> {
        let (prompt, system) = build_prompt(kind, context, language);

        if kind.is_structured() {
            let value: Value = self
                .llm
                .call_json(&prompt, system)
                .await
                .map_err(classify_llm_error)?;
            Ok(value)
        } else {
            let text = self
                .llm
                .call_text(&prompt, system)
                .await
                .map_err(classify_llm_error)?;
            Ok(Value::String(text))
        }
    }
}

fn classify_llm_error(err: LlmError) -> GenerationError {
    match err {
        LlmError::Parse(e) => GenerationError::Malformed(e.to_string()),
        LlmError::EmptyContent => GenerationError::Malformed("empty response".to_string()),
        other => GenerationError::Upstream(other.to_string()),
    }
}

/// Context field rendered as pretty JSON. Absent fields render as `null`,
/// which the report prompt explicitly tolerates.
fn fragment(context: &Value, key: &str) -> String {
    serde_json::to_string_pretty(context.get(key).unwrap_or(&Value::Null))
        .unwrap_or_else(|_| "null".to_string())
}

/// Context field rendered as raw text (no JSON quoting).
fn text_fragment(context: &Value, key: &str) -> String {
    context
        .get(key)
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

fn build_prompt(kind: StageKind, context: &Value, language: &str) -> (String, &'static str) {
    let (template, system) = match kind {
        StageKind::CvAnalysis => (CV_ANALYSIS_PROMPT_TEMPLATE, CV_ANALYSIS_SYSTEM),
        StageKind::InterviewQuestion => {
            (INTERVIEW_QUESTION_PROMPT_TEMPLATE, INTERVIEW_QUESTION_SYSTEM)
        }
        StageKind::InterviewEvaluation => (
            INTERVIEW_EVALUATION_PROMPT_TEMPLATE,
            INTERVIEW_EVALUATION_SYSTEM,
        ),
        StageKind::RoleDiscovery => (ROLE_DISCOVERY_PROMPT_TEMPLATE, ROLE_DISCOVERY_SYSTEM),
        StageKind::CvGeneration => (CV_GENERATION_PROMPT_TEMPLATE, CV_GENERATION_SYSTEM),
        StageKind::SimulationReply => (SIMULATION_REPLY_PROMPT_TEMPLATE, SIMULATION_REPLY_SYSTEM),
        StageKind::SimulationEvaluation => (
            SIMULATION_EVALUATION_PROMPT_TEMPLATE,
            SIMULATION_EVALUATION_SYSTEM,
        ),
        StageKind::StrategicReport => (STRATEGIC_REPORT_PROMPT_TEMPLATE, STRATEGIC_REPORT_SYSTEM),
    };

    let filled = template
        .replace("{cv_text}", &text_fragment(context, "cv_text"))
        .replace("{analysis_json}", &fragment(context, "analysis"))
        .replace("{evaluation_json}", &fragment(context, "evaluation"))
        .replace("{role_json}", &fragment(context, "role"))
        .replace("{simulation_json}", &fragment(context, "simulation"))
        .replace("{transcript_json}", &fragment(context, "transcript"))
        .replace("{language_instruction}", LANGUAGE_INSTRUCTION)
        .replace("{language}", language);

    (filled, system)
}
