//! End-to-end pipeline and conversation tests against a scripted service.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use async_trait::async_trait;
use chrono::NaiveDate;
use delver_agent::{InferenceService, StageAgent};
use delver_core::{DelverError, DelverResult, Role};
use delver_orchestrator::{
    ConversationDriver, ResearchEvent, ResearchManager, ResearchQuery, SearchExecutor,
    SearchMonitor, SearchPlan, SearchItem, BUSY_NOTICE,
};
use delver_session::{ConversationStage, ConversationState};
use futures_util::StreamExt;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers every stage from a script and records what it was asked.
#[derive(Default)]
struct Scripted {
    questions: Vec<String>,
    plan: Vec<(String, String)>,
    /// Search term → summary. Missing terms fail.
    results: HashMap<String, String>,
    delays_ms: HashMap<String, u64>,
    failing_agent: Option<&'static str>,
    calls: Mutex<Vec<(String, String)>>,
}

impl Scripted {
    fn with_plan(mut self, plan: &[(&str, &str)]) -> Self {
        self.plan = plan
            .iter()
            .map(|(q, r)| (q.to_string(), r.to_string()))
            .collect();
        self
    }

    fn with_result(mut self, term: &str, summary: &str) -> Self {
        self.results.insert(term.to_string(), summary.to_string());
        self
    }

    fn with_delay(mut self, term: &str, ms: u64) -> Self {
        self.delays_ms.insert(term.to_string(), ms);
        self
    }

    fn with_questions(mut self, questions: &[&str]) -> Self {
        self.questions = questions.iter().map(|q| q.to_string()).collect();
        self
    }

    fn failing(mut self, agent: &'static str) -> Self {
        self.failing_agent = Some(agent);
        self
    }

    fn calls(&self) -> Vec<(String, String)> {
        self.calls.lock().unwrap().clone()
    }

    fn prompts_for(&self, agent: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|(name, _)| name == agent)
            .map(|(_, prompt)| prompt)
            .collect()
    }
}

#[async_trait]
impl InferenceService for Scripted {
    async fn invoke(&self, agent: &StageAgent, prompt: &str) -> DelverResult<Value> {
        self.calls
            .lock()
            .unwrap()
            .push((agent.name.clone(), prompt.to_string()));

        if self.failing_agent == Some(agent.name.as_str()) {
            return Err(DelverError::Inference(format!("{} unavailable", agent.name)));
        }

        match agent.name.as_str() {
            "ClarifierAgent" => Ok(json!({ "questions": self.questions })),
            "PlannerAgent" => {
                let searches: Vec<Value> = self
                    .plan
                    .iter()
                    .map(|(query, reason)| json!({ "query": query, "reason": reason }))
                    .collect();
                Ok(json!({ "searches": searches }))
            }
            "SearchAgent" => {
                let term = prompt
                    .lines()
                    .next()
                    .and_then(|line| line.strip_prefix("Search term: "))
                    .unwrap_or_default()
                    .to_string();
                if let Some(ms) = self.delays_ms.get(&term) {
                    tokio::time::sleep(Duration::from_millis(*ms)).await;
                }
                match self.results.get(&term) {
                    Some(summary) => Ok(json!(summary)),
                    None => Err(DelverError::Http(format!("search for {term} failed"))),
                }
            }
            "WriterAgent" => Ok(json!({
                "short_summary": "Short",
                "markdown_report": "# Report",
                "follow_up_questions": ["Next?"]
            })),
            other => Err(DelverError::Inference(format!("unexpected agent {other}"))),
        }
    }
}

fn manager(service: Arc<Scripted>) -> ResearchManager {
    ResearchManager::new(service).with_include_date(false)
}

async fn collect(manager: &ResearchManager, query: ResearchQuery) -> Vec<DelverResult<ResearchEvent>> {
    manager.run(query).collect().await
}

#[tokio::test]
async fn test_full_run_drops_failed_search() {
    let service = Arc::new(
        Scripted::default()
            .with_plan(&[("X", "r1"), ("Y", "r2")])
            .with_result("X", "evidence1"),
    );
    let events = collect(&manager(service.clone()), ResearchQuery::new("Q")).await;

    assert_eq!(events.len(), 3);
    match events[0].as_ref().unwrap() {
        ResearchEvent::Planned { plan } => assert_eq!(plan.len(), 2),
        other => panic!("expected Planned, got {other:?}"),
    }
    assert_eq!(
        events[1].as_ref().unwrap(),
        &ResearchEvent::Searched { found: 1, total: 2 }
    );
    match events[2].as_ref().unwrap() {
        ResearchEvent::Report(report) => {
            assert_eq!(report.markdown_report, "# Report");
            assert_eq!(report.follow_up_questions, vec!["Next?".to_string()]);
        }
        other => panic!("expected Report, got {other:?}"),
    }

    let writer = service.prompts_for("WriterAgent");
    assert_eq!(writer.len(), 1);
    assert_eq!(
        writer[0],
        "Original query: Q\nSummarized search results: [\"evidence1\"]"
    );

    let mut searches = service.prompts_for("SearchAgent");
    searches.sort();
    assert_eq!(
        searches,
        vec![
            "Search term: X\nReason for searching: r1".to_string(),
            "Search term: Y\nReason for searching: r2".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_run_with_every_search_failing_still_writes() {
    let service = Arc::new(Scripted::default().with_plan(&[("X", "r1"), ("Y", "r2")]));
    let events = collect(&manager(service.clone()), ResearchQuery::new("Q")).await;

    assert_eq!(
        events[1].as_ref().unwrap(),
        &ResearchEvent::Searched { found: 0, total: 2 }
    );
    assert!(matches!(events[2], Ok(ResearchEvent::Report(_))));
    assert!(service.prompts_for("WriterAgent")[0].ends_with("Summarized search results: []"));
}

#[tokio::test]
async fn test_empty_plan_skips_search() {
    let service = Arc::new(Scripted::default());
    let events = collect(&manager(service.clone()), ResearchQuery::new("Q")).await;

    assert_eq!(events.len(), 3);
    assert_eq!(
        events[1].as_ref().unwrap(),
        &ResearchEvent::Searched { found: 0, total: 0 }
    );
    assert!(service.prompts_for("SearchAgent").is_empty());
}

#[tokio::test]
async fn test_fanout_collects_in_completion_order() {
    let service = Arc::new(
        Scripted::default()
            .with_result("X", "slow")
            .with_result("Y", "fast")
            .with_delay("X", 50),
    );
    let executor = SearchExecutor::new(service);
    let plan = SearchPlan::new(vec![SearchItem::new("X", "r1"), SearchItem::new("Y", "r2")]);
    let monitor = SearchMonitor::new(plan.len());

    let results = executor.execute_all(&plan, &monitor).await;
    let summaries: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().summary)
        .collect();
    assert_eq!(summaries, vec!["fast".to_string(), "slow".to_string()]);
    assert!(monitor.is_finished());
}

#[tokio::test]
async fn test_planner_failure_ends_stream() {
    let service = Arc::new(Scripted::default().failing("PlannerAgent"));
    let events = collect(&manager(service.clone()), ResearchQuery::new("Q")).await;

    assert_eq!(events.len(), 1);
    assert!(events[0].as_ref().unwrap_err().to_string().contains("PlannerAgent unavailable"));
    assert!(service.prompts_for("SearchAgent").is_empty());
    assert!(service.prompts_for("WriterAgent").is_empty());
}

#[tokio::test]
async fn test_writer_failure_after_search_events() {
    let service = Arc::new(
        Scripted::default()
            .with_plan(&[("X", "r1")])
            .with_result("X", "e")
            .failing("WriterAgent"),
    );
    let events = collect(&manager(service), ResearchQuery::new("Q")).await;

    assert_eq!(events.len(), 3);
    assert!(events[0].is_ok());
    assert!(events[1].is_ok());
    assert!(events[2].is_err());
}

#[tokio::test]
async fn test_run_is_lazy_until_polled() {
    let service = Arc::new(Scripted::default().with_plan(&[("X", "r1")]));
    let manager = manager(service.clone());

    let mut stream = manager.run(ResearchQuery::new("Q"));
    tokio::task::yield_now().await;
    assert!(service.calls().is_empty());

    let first = stream.next().await.unwrap().unwrap();
    assert!(matches!(first, ResearchEvent::Planned { .. }));
    assert_eq!(service.calls().len(), 1);
}

#[tokio::test]
async fn test_empty_clarification_list_matches_plain_query() {
    let service = Arc::new(Scripted::default());
    let manager = manager(service.clone());

    collect(&manager, ResearchQuery::new("Q")).await;
    collect(&manager, ResearchQuery::new("Q").with_clarifications(Vec::new())).await;

    let prompts = service.prompts_for("PlannerAgent");
    assert_eq!(prompts.len(), 2);
    assert_eq!(prompts[0], prompts[1]);
    assert_eq!(prompts[0], "Q");
}

#[tokio::test]
async fn test_date_prefix_reaches_planner_and_writer() {
    let service = Arc::new(Scripted::default());
    let manager = ResearchManager::new(service.clone())
        .with_date(NaiveDate::from_ymd_opt(2025, 3, 1).unwrap());

    collect(&manager, ResearchQuery::new("Q")).await;

    assert_eq!(service.prompts_for("PlannerAgent")[0], "Current date: 2025-03-01\nQ");
    assert!(service.prompts_for("WriterAgent")[0]
        .starts_with("Original query: Current date: 2025-03-01\nQ\n"));
}

// Conversation driver

const QUERY: &str = "How to create a Deep Research Agent?";

fn driver(service: Arc<Scripted>) -> ConversationDriver {
    ConversationDriver::new(Arc::new(manager(service)))
}

#[tokio::test]
async fn test_query_with_questions_awaits_answers() {
    let service = Arc::new(Scripted::default().with_questions(&[
        "Which language?",
        "Which model?",
        "How deep?",
    ]));
    let driver = driver(service.clone());

    let update = driver
        .respond(QUERY, Vec::new(), driver.start_session())
        .await
        .unwrap();

    assert_eq!(update.state.stage, ConversationStage::AwaitingAnswers);
    assert_eq!(update.state.query, QUERY);
    assert_eq!(update.state.questions.len(), 3);
    assert_eq!(update.transcript.len(), 2);
    assert_eq!(update.transcript[0].role, Role::User);
    assert_eq!(
        update.transcript[1].content,
        "1. Which language?\n2. Which model?\n3. How deep?"
    );
    assert!(service.prompts_for("PlannerAgent").is_empty());
}

#[tokio::test]
async fn test_query_without_questions_runs_immediately() {
    let service = Arc::new(
        Scripted::default()
            .with_plan(&[("X", "r1")])
            .with_result("X", "e"),
    );
    let driver = driver(service.clone());

    let update = driver
        .respond(QUERY, Vec::new(), driver.start_session())
        .await
        .unwrap();

    assert_eq!(update.state.stage, ConversationStage::AwaitingQuery);
    assert!(update.state.buffer.is_empty());
    assert_eq!(service.prompts_for("PlannerAgent"), vec![QUERY.to_string()]);

    let reply = &update.transcript.last().unwrap().content;
    assert!(reply.starts_with("Planned 1 searches, searching..."));
    assert!(reply.ends_with("# Report"));
}

#[tokio::test]
async fn test_short_answers_are_padded() {
    let service = Arc::new(
        Scripted::default().with_questions(&["Question 1?", "Question 2?", "Question 3?"]),
    );
    let driver = driver(service.clone());

    let asked = driver
        .respond(QUERY, Vec::new(), driver.start_session())
        .await
        .unwrap();
    let done = driver
        .respond("Rust", asked.transcript, asked.state)
        .await
        .unwrap();

    assert_eq!(done.state.stage, ConversationStage::AwaitingQuery);
    assert_eq!(
        service.prompts_for("PlannerAgent")[0],
        format!(
            "Original query: {QUERY}\n\nUser clarifications:\n\
             Q1: Question 1?\nA1: Rust\nQ2: Question 2?\nA2: \nQ3: Question 3?\nA3: "
        )
    );
    assert_eq!(done.transcript.len(), 4);
}

#[tokio::test]
async fn test_turn_streams_progress_updates() {
    let service = Arc::new(
        Scripted::default()
            .with_plan(&[("X", "r1")])
            .with_result("X", "e"),
    );
    let driver = driver(service);

    let updates: Vec<_> = driver
        .turn(QUERY, Vec::new(), driver.start_session())
        .collect()
        .await;

    // placeholder, three events, final reset
    assert_eq!(updates.len(), 5);
    let stages: Vec<ConversationStage> = updates
        .iter()
        .map(|u| u.as_ref().unwrap().state.stage)
        .collect();
    assert_eq!(stages[0], ConversationStage::Running);
    assert_eq!(stages[3], ConversationStage::Running);
    assert_eq!(stages[4], ConversationStage::AwaitingQuery);
    assert_eq!(updates[3].as_ref().unwrap().state.buffer.len(), 3);
}

#[tokio::test]
async fn test_busy_session_rejects_message() {
    let service = Arc::new(Scripted::default());
    let driver = driver(service.clone());
    let mut state = ConversationState::new();
    state.begin_run("earlier query").unwrap();
    state.push_output("Planned 2 searches, searching...");

    let update = driver
        .respond("Another question", Vec::new(), state.clone())
        .await
        .unwrap();

    assert_eq!(update.state, state);
    assert_eq!(update.transcript.len(), 2);
    assert_eq!(update.transcript[1].content, BUSY_NOTICE);
    assert!(service.calls().is_empty());
}

#[tokio::test]
async fn test_failed_run_resets_session() {
    let service = Arc::new(Scripted::default().failing("PlannerAgent"));
    let driver = driver(service);

    let updates: Vec<_> = driver
        .turn(QUERY, Vec::new(), driver.start_session())
        .collect()
        .await;

    assert!(updates.last().unwrap().is_err());
    let notice = updates[updates.len() - 2].as_ref().unwrap();
    assert_eq!(notice.state.stage, ConversationStage::AwaitingQuery);
    assert!(notice
        .transcript
        .last()
        .unwrap()
        .content
        .starts_with("Research failed: "));
}

#[tokio::test]
async fn test_clarifier_failure_propagates() {
    let service = Arc::new(Scripted::default().failing("ClarifierAgent"));
    let driver = driver(service.clone());

    let err = driver
        .respond(QUERY, Vec::new(), driver.start_session())
        .await
        .unwrap_err();

    assert!(err.to_string().contains("ClarifierAgent unavailable"));
    assert!(service.prompts_for("PlannerAgent").is_empty());
}

#[tokio::test]
async fn test_clarifier_failure_returns_transcript() {
    let service = Arc::new(Scripted::default().failing("ClarifierAgent"));
    let driver = driver(service);

    let updates: Vec<_> = driver
        .turn(QUERY, Vec::new(), driver.start_session())
        .collect()
        .await;

    assert_eq!(updates.len(), 2);
    assert!(updates[1].is_err());
    let notice = updates[0].as_ref().unwrap();
    assert_eq!(notice.state.stage, ConversationStage::AwaitingQuery);
    assert_eq!(notice.transcript.len(), 2);
    assert_eq!(notice.transcript[0].content, QUERY);
    assert!(notice.transcript[1]
        .content
        .starts_with("Research failed: Inference error: ClarifierAgent unavailable"));
}
