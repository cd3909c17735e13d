// All LLM prompt constants for the assessment pipeline.
// Structured stages demand JSON matching the exact payload schema;
// conversational and document stages demand plain text.

/// Cross-cutting language fragment. Replace `{language}` before sending.
pub const LANGUAGE_INSTRUCTION: &str =
    "Write every part of your response in the language identified by this tag: {language}. \
    Keep JSON keys in English; only values and prose follow the language tag.";

/// System prompt for CV analysis — enforces JSON-only output.
pub const CV_ANALYSIS_SYSTEM: &str =
    "You are an expert career coach analyzing a candidate's CV. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// CV analysis prompt template. Replace `{cv_text}` and `{language_instruction}`.
pub const CV_ANALYSIS_PROMPT_TEMPLATE: &str = r#"Analyze the following CV and produce a structured assessment.

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "Two to four sentences describing the candidate's profile",
  "strengths": ["Concrete strength grounded in the CV"],
  "areas_for_improvement": ["Concrete gap or weakness"],
  "key_skills": ["rust", "distributed systems"],
  "experience_level": "junior | mid | senior | staff | principal | unknown"
}

Rules:
1. Ground every statement in the CV text — no invention
2. List 3-5 strengths and 2-4 areas for improvement
3. key_skills are lowercase technical or professional skills, most relevant first
4. experience_level is your best estimate from role history and scope

{language_instruction}

CV TEXT:
{cv_text}"#;

/// System prompt for interview questions — plain text output.
pub const INTERVIEW_QUESTION_SYSTEM: &str =
    "You are a senior interviewer conducting a career assessment interview. \
    Respond with the next interview question only — no preamble, no numbering, \
    no commentary around it.";

/// Interview question prompt template.
/// Replace: {analysis_json}, {transcript_json}, {language_instruction}
pub const INTERVIEW_QUESTION_PROMPT_TEMPLATE: &str = r#"You are interviewing a candidate whose CV analysis is below. Ask the single next question.

CV ANALYSIS:
{analysis_json}

INTERVIEW SO FAR (most recent last):
{transcript_json}

Rules:
1. Ask exactly one question
2. Build on the candidate's previous answers; never repeat a question
3. Probe the areas_for_improvement from the analysis before anything else
4. Keep the question under 60 words

{language_instruction}"#;

/// System prompt for interview evaluation — enforces JSON-only output.
pub const INTERVIEW_EVALUATION_SYSTEM: &str =
    "You are a senior interviewer writing a structured evaluation of a finished \
    career assessment interview. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Interview evaluation prompt template.
/// Replace: {transcript_json}, {language_instruction}
pub const INTERVIEW_EVALUATION_PROMPT_TEMPLATE: &str = r#"Evaluate the candidate's performance across this interview transcript.

TRANSCRIPT:
{transcript_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "Three to five sentences on overall performance",
  "strengths": ["Observed strength with evidence from an answer"],
  "areas_for_improvement": ["Observed weakness with evidence"],
  "overall_score": 7.5
}

Rules:
1. overall_score is 0.0-10.0, one decimal place
2. Cite behavior from the transcript — no generic filler
3. Judge only what was said; do not assume facts beyond the transcript

{language_instruction}"#;

/// System prompt for role discovery — enforces JSON-only output.
pub const ROLE_DISCOVERY_SYSTEM: &str =
    "You are a career strategist matching a candidate to realistic target roles. \
    You MUST respond with valid JSON only — a JSON array of role objects. \
    Do NOT include any text outside the JSON array. \
    Do NOT use markdown code fences.";

/// Role discovery prompt template.
/// Replace: {analysis_json}, {evaluation_json}, {language_instruction}
pub const ROLE_DISCOVERY_PROMPT_TEMPLATE: &str = r#"Suggest target roles for this candidate based on their CV analysis and interview evaluation.

CV ANALYSIS:
{analysis_json}

INTERVIEW EVALUATION:
{evaluation_json}

Return a JSON ARRAY of 3-5 role objects, best match first:
[
  {
    "title": "Senior Backend Engineer",
    "match_score": 0.86,
    "rationale": "One or two sentences tying the role to the candidate's evidence",
    "required_skills": ["rust", "postgresql", "system design"]
  }
]

Rules:
1. match_score is 0.0-1.0 and must decrease down the list
2. Titles are concrete industry roles, not aspirational labels
3. rationale must reference the analysis or the interview, not generalities
4. required_skills are lowercase

{language_instruction}"#;

/// System prompt for tailored CV generation — plain text output.
pub const CV_GENERATION_SYSTEM: &str =
    "You are an expert CV writer producing a complete, tailored CV in Markdown. \
    Respond with the CV document only — no preamble and no commentary. \
    Use ONLY facts present in the source CV and analysis; never invent \
    employers, dates, or accomplishments.";

/// Tailored CV generation prompt template.
/// Replace: {cv_text}, {analysis_json}, {role_json}, {language_instruction}
pub const CV_GENERATION_PROMPT_TEMPLATE: &str = r#"Rewrite the candidate's CV, tailored to the selected target role.

SOURCE CV (the only source of facts):
{cv_text}

CV ANALYSIS:
{analysis_json}

TARGET ROLE:
{role_json}

Rules:
1. Markdown output: name/contact header, professional summary, experience, skills, education
2. Reorder and reword for the target role; never fabricate
3. Lead experience bullets with the accomplishments most relevant to the role
4. Keep it to what fits roughly two printed pages

{language_instruction}"#;

/// System prompt for simulation replies — plain text output.
pub const SIMULATION_REPLY_SYSTEM: &str =
    "You are role-playing the hiring interviewer for a specific position in a \
    practice interview. Respond with the interviewer's next message only — \
    no stage directions, no commentary.";

/// Simulation reply prompt template.
/// Replace: {role_json}, {transcript_json}, {language_instruction}
pub const SIMULATION_REPLY_PROMPT_TEMPLATE: &str = r#"You are the interviewer for the role below, running a realistic practice interview.

TARGET ROLE:
{role_json}

CONVERSATION SO FAR (most recent last):
{transcript_json}

Rules:
1. React to the candidate's last message before moving on
2. Ask one question at a time, as a real interviewer for this role would
3. Escalate difficulty gradually; include one role-specific scenario question when the basics are covered
4. Stay in character; keep each message under 80 words

{language_instruction}"#;

/// System prompt for simulation evaluation — enforces JSON-only output.
pub const SIMULATION_EVALUATION_SYSTEM: &str =
    "You are a senior interviewer scoring a finished practice interview for a \
    specific role. \
    You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";

/// Simulation evaluation prompt template.
/// Replace: {role_json}, {transcript_json}, {language_instruction}
pub const SIMULATION_EVALUATION_PROMPT_TEMPLATE: &str = r#"Score the candidate's performance in this practice interview for the target role.

TARGET ROLE:
{role_json}

TRANSCRIPT:
{transcript_json}

Return a JSON object with this EXACT schema (no extra fields):
{
  "summary": "Three to five sentences on readiness for this specific role",
  "strengths": ["Observed strength with evidence"],
  "areas_for_improvement": ["Observed gap with evidence"],
  "overall_score": 6.8
}

Rules:
1. overall_score is 0.0-10.0, one decimal place
2. Score against the expectations of the target role, not in the abstract
3. Cite transcript evidence for every strength and gap

{language_instruction}"#;

/// System prompt for the strategic report — plain text output.
pub const STRATEGIC_REPORT_SYSTEM: &str =
    "You are a career strategist writing a personal strategic report in Markdown. \
    Respond with the report document only — no preamble and no commentary.";

/// Strategic report prompt template.
/// Replace: {analysis_json}, {role_json}, {evaluation_json}, {simulation_json},
///          {language_instruction}
pub const STRATEGIC_REPORT_PROMPT_TEMPLATE: &str = r#"Write the candidate's strategic career report from the assessment artifacts below. Missing artifacts appear as null; work with what exists.

CV ANALYSIS:
{analysis_json}

TARGET ROLE:
{role_json}

INTERVIEW EVALUATION:
{evaluation_json}

SIMULATION RESULTS:
{simulation_json}

Structure the Markdown report as:
1. Where You Stand — current profile versus the target role
2. Gap Analysis — the specific gaps between profile and role, ranked
3. 90-Day Plan — concrete weekly actions closing the top gaps
4. Positioning — how to present existing experience for this role

Rules:
1. Every recommendation must trace to an artifact above
2. Name the gaps plainly; this report is private to the candidate
3. Actions must be specific enough to start this week

{language_instruction}"#;
