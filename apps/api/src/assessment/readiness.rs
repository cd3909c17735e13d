//! Readiness evaluation: certificate and recommendation eligibility derived
//! on demand. Nothing here is stored; the answer is recomputed from the tier,
//! the manual overrides, and the completion flags on the owner's runs.

use serde::{Deserialize, Serialize};

use crate::assessment::models::AssessmentRun;
use crate::models::user::User;

/// Every input that went into the verdict, echoed for transparency.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessDetails {
    pub is_elite: bool,
    pub certificate_override: bool,
    pub recommendation_override: bool,
    pub has_completed_analysis: bool,
    pub has_completed_simulation: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReadinessReport {
    pub certificate_eligible: bool,
    pub recommendation_eligible: bool,
    pub details: ReadinessDetails,
}

/// Computes eligibility. Elite tier and the manual overrides are absolute:
/// they grant eligibility even when no run exists at all. The assessment path
/// requires BOTH a completed analysis and a completed simulation; the two
/// may live on different runs, but neither alone is ever sufficient.
pub fn evaluate_readiness(
    user: Option<&User>,
    analysis_run: Option<&AssessmentRun>,
    simulation_run: Option<&AssessmentRun>,
) -> ReadinessReport {
    let is_elite = user.map(User::is_elite).unwrap_or(false);
    let certificate_override = user.map(|u| u.can_access_certificates).unwrap_or(false);
    let recommendation_override = user.map(|u| u.can_access_recommendations).unwrap_or(false);

    let has_completed_analysis = analysis_run
        .map(|r| r.completion().cv_analysis_complete)
        .unwrap_or(false);
    let has_completed_simulation = simulation_run
        .map(|r| r.completion().simulation_complete)
        .unwrap_or(false);

    let assessment_path = has_completed_analysis && has_completed_simulation;

    ReadinessReport {
        certificate_eligible: is_elite || certificate_override || assessment_path,
        recommendation_eligible: is_elite || recommendation_override || assessment_path,
        details: ReadinessDetails {
            is_elite,
            certificate_override,
            recommendation_override,
            has_completed_analysis,
            has_completed_simulation,
        },
    }
}
