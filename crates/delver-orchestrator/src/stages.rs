//! The four pipeline stages as stage agents, and the single-call stage
//! functions built on them.

use crate::types::{ClarifyingQuestionSet, EvidenceSet, ReportData, SearchItem, SearchPlan};
use delver_agent::{InferenceService, SchemaDescriptor, StageAgent};
use delver_core::{DelverError, DelverResult};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

const CLARIFIER_INSTRUCTIONS: &str = "You are a domain expert trying to understand the intent \
behind a user's high-level research query. Return at most 3 clarifying questions, the most \
important ones you would ask to narrow the scope and make the research more targeted and useful. \
Return an empty list when the query is already specific. Output only the questions.";

const PLANNER_INSTRUCTIONS: &str = "You are a research planner. Given a query, and possibly the \
user's answers to clarifying questions, produce a set of web searches that together best answer \
it. Plan between 1 and 5 searches. For each, give the search term and a one-sentence reason.";

const SEARCH_INSTRUCTIONS: &str = "You are a research assistant. Given a search term, search the \
web for it and produce a concise summary of the results: 2-3 paragraphs, under 300 words, \
capturing the main points. Write succinctly; grammar matters less than density. It will be read \
by someone writing a report, so keep only the substance and drop any commentary.";

const WRITER_INSTRUCTIONS: &str = "You are a senior researcher writing a cohesive report for a \
research query. You receive the query and summarized search results. First outline the structure \
of the report, then write it in markdown. Aim for depth: 5-10 pages, at least 1000 words. Also \
give a 2-3 sentence summary of the findings and suggested follow-up research topics.";

/// Output shape of the clarifier.
#[derive(Debug, Deserialize)]
pub struct ClarifyingQuestions {
    /// Up to three questions, most important first.
    pub questions: Vec<String>,
}

/// Output shape of the planner.
#[derive(Debug, Deserialize)]
pub struct WebSearchPlan {
    /// Planned searches, in priority order.
    pub searches: Vec<SearchItem>,
}

/// The clarifying-question stage.
pub fn clarifier_agent() -> StageAgent {
    StageAgent::new(
        "ClarifierAgent",
        CLARIFIER_INSTRUCTIONS,
        SchemaDescriptor::object(
            "clarifying_questions",
            json!({
                "type": "object",
                "properties": {
                    "questions": {
                        "type": "array",
                        "items": {"type": "string"},
                        "description": "Clarifying questions to ask before planning the research."
                    }
                },
                "required": ["questions"],
                "additionalProperties": false
            }),
        ),
    )
}

/// The search planning stage.
pub fn planner_agent() -> StageAgent {
    StageAgent::new(
        "PlannerAgent",
        PLANNER_INSTRUCTIONS,
        SchemaDescriptor::object(
            "web_search_plan",
            json!({
                "type": "object",
                "properties": {
                    "searches": {
                        "type": "array",
                        "items": {
                            "type": "object",
                            "properties": {
                                "reason": {"type": "string", "description": "Why this search matters to the query."},
                                "query": {"type": "string", "description": "The search term."}
                            },
                            "required": ["reason", "query"],
                            "additionalProperties": false
                        }
                    }
                },
                "required": ["searches"],
                "additionalProperties": false
            }),
        ),
    )
}

/// The web search stage. Returns a plain summary.
pub fn search_agent() -> StageAgent {
    StageAgent::new("SearchAgent", SEARCH_INSTRUCTIONS, SchemaDescriptor::Text).with_web_search()
}

/// The report writing stage.
pub fn writer_agent() -> StageAgent {
    StageAgent::new(
        "WriterAgent",
        WRITER_INSTRUCTIONS,
        SchemaDescriptor::object(
            "report_data",
            json!({
                "type": "object",
                "properties": {
                    "short_summary": {"type": "string"},
                    "markdown_report": {"type": "string"},
                    "follow_up_questions": {"type": "array", "items": {"type": "string"}}
                },
                "required": ["short_summary", "markdown_report", "follow_up_questions"],
                "additionalProperties": false
            }),
        ),
    )
}

/// Ask for up to three clarifying questions. Failures propagate.
pub async fn get_clarifying_questions(
    service: &dyn InferenceService,
    query: &str,
) -> DelverResult<ClarifyingQuestionSet> {
    if query.trim().is_empty() {
        return Err(DelverError::Orchestrator(
            "research query must not be empty".to_string(),
        ));
    }
    let out: ClarifyingQuestions = clarifier_agent()
        .invoke_typed(service, &format!("Query: {query}"))
        .await?;
    let questions = ClarifyingQuestionSet::new(out.questions);
    info!(count = questions.len(), "Generated clarifying questions");
    Ok(questions)
}

/// Plan the searches for a combined query. Failures propagate.
pub async fn plan_searches(
    service: &dyn InferenceService,
    combined_query: &str,
) -> DelverResult<SearchPlan> {
    let out: WebSearchPlan = planner_agent().invoke_typed(service, combined_query).await?;
    Ok(SearchPlan::new(out.searches))
}

/// Input sent to the search agent for one item.
pub fn search_prompt(item: &SearchItem) -> String {
    format!("Search term: {}\nReason for searching: {}", item.query, item.reason)
}

/// Input sent to the writer: the query and the summaries as a JSON array.
pub fn report_prompt(query: &str, evidence: &EvidenceSet) -> DelverResult<String> {
    let results = serde_json::to_string(evidence.summaries())?;
    Ok(format!(
        "Original query: {query}\nSummarized search results: {results}"
    ))
}

/// Write the final report. Failures propagate.
pub async fn write_report(
    service: &dyn InferenceService,
    query: &str,
    evidence: &EvidenceSet,
) -> DelverResult<ReportData> {
    let prompt = report_prompt(query, evidence)?;
    writer_agent().invoke_typed(service, &prompt).await
}
