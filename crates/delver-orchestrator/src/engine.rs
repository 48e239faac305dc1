use crate::fanout::SearchExecutor;
use crate::monitor::SearchMonitor;
use crate::stages;
use crate::types::{ClarifyingQuestionSet, EvidenceSet, ReportData, ResearchQuery, SearchPlan};
use chrono::{NaiveDate, Utc};
use delver_agent::InferenceService;
use delver_core::DelverResult;
use futures_util::stream::{self, Stream};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::sync::Arc;
use tracing::{info, info_span, Instrument, Span};
use uuid::Uuid;

/// Progress of one research run, in emission order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResearchEvent {
    /// The planner finished.
    Planned {
        /// The searches about to run.
        plan: SearchPlan,
    },
    /// Every search finished.
    Searched {
        /// Searches that produced evidence.
        found: usize,
        /// Searches in the plan.
        total: usize,
    },
    /// The final report. Always the last event of a successful run.
    Report(ReportData),
}

impl std::fmt::Display for ResearchEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResearchEvent::Planned { plan } => {
                write!(f, "Planned {} searches, searching...", plan.len())
            }
            ResearchEvent::Searched { found, total } => {
                write!(f, "Searches complete ({found}/{total} succeeded), writing report...")
            }
            ResearchEvent::Report(report) => f.write_str(&report.markdown_report),
        }
    }
}

/// Lazy, single-use sequence of run events. A stage failure yields one
/// `Err` and ends the stream.
pub type ResearchStream = Pin<Box<dyn Stream<Item = DelverResult<ResearchEvent>> + Send>>;

/// The research pipeline: plan → fan-out search → write.
///
/// Clarification is a separate call; [`ResearchManager::run`] never asks
/// for it.
pub struct ResearchManager {
    service: Arc<dyn InferenceService>,
    executor: SearchExecutor,
    include_date: bool,
    today: Option<NaiveDate>,
}

impl ResearchManager {
    /// A manager whose stages all call `service`.
    pub fn new(service: Arc<dyn InferenceService>) -> Self {
        Self {
            executor: SearchExecutor::new(service.clone()),
            service,
            include_date: true,
            today: None,
        }
    }

    /// Prefix planner and writer input with `Current date: ...`. On by default.
    pub fn with_include_date(mut self, include_date: bool) -> Self {
        self.include_date = include_date;
        self
    }

    /// Pin the date used in the prefix instead of today's UTC date.
    pub fn with_date(mut self, date: NaiveDate) -> Self {
        self.today = Some(date);
        self
    }

    /// Replace the search fan-out executor.
    pub fn with_executor(mut self, executor: SearchExecutor) -> Self {
        self.executor = executor;
        self
    }

    /// Ask the clarifier about `query`. Never part of [`ResearchManager::run`].
    pub async fn get_clarifying_questions(&self, query: &str) -> DelverResult<ClarifyingQuestionSet> {
        info!("Generating clarifying questions");
        stages::get_clarifying_questions(self.service.as_ref(), query).await
    }

    /// The text handed to the planner and writer. An empty block is the
    /// same as no block.
    pub fn combined_query(&self, query: &str, clarifications: Option<&str>) -> String {
        let body = match clarifications {
            Some(block) if !block.trim().is_empty() => {
                format!("Original query: {query}\n\nUser clarifications:\n{block}")
            }
            _ => query.to_string(),
        };
        if self.include_date {
            let today = self.today.unwrap_or_else(|| Utc::now().date_naive());
            format!("Current date: {}\n{body}", today.format("%Y-%m-%d"))
        } else {
            body
        }
    }

    /// Start a run. Nothing executes until the stream is polled.
    pub fn run(&self, query: ResearchQuery) -> ResearchStream {
        let run_id = Uuid::new_v4();
        let block = query.clarification_block();
        let ctx = RunContext {
            service: self.service.clone(),
            executor: self.executor.clone(),
            combined: self.combined_query(query.text(), block.as_deref()),
            span: info_span!("research", run_id = %run_id),
        };
        Box::pin(stream::unfold(RunState::Start(ctx), advance))
    }
}

struct RunContext {
    service: Arc<dyn InferenceService>,
    executor: SearchExecutor,
    combined: String,
    span: Span,
}

enum RunState {
    Start(RunContext),
    Planned(RunContext, SearchPlan),
    Searched(RunContext, EvidenceSet),
    Done,
}

async fn advance(state: RunState) -> Option<(DelverResult<ResearchEvent>, RunState)> {
    match state {
        RunState::Start(ctx) => {
            let span = ctx.span.clone();
            async move {
                info!("Planning searches");
                match stages::plan_searches(ctx.service.as_ref(), &ctx.combined).await {
                    Ok(plan) => {
                        info!(searches = plan.len(), "Plan complete");
                        let event = ResearchEvent::Planned { plan: plan.clone() };
                        Some((Ok(event), RunState::Planned(ctx, plan)))
                    }
                    Err(e) => Some((Err(e), RunState::Done)),
                }
            }
            .instrument(span)
            .await
        }
        RunState::Planned(ctx, plan) => {
            let span = ctx.span.clone();
            async move {
                let monitor = SearchMonitor::new(plan.len());
                let evidence = ctx.executor.execute(&plan, &monitor).await;
                let progress = monitor.snapshot();
                let event = ResearchEvent::Searched {
                    found: progress.succeeded(),
                    total: progress.total,
                };
                Some((Ok(event), RunState::Searched(ctx, evidence)))
            }
            .instrument(span)
            .await
        }
        RunState::Searched(ctx, evidence) => {
            let span = ctx.span.clone();
            async move {
                info!(evidence = evidence.len(), "Writing report");
                match stages::write_report(ctx.service.as_ref(), &ctx.combined, &evidence).await {
                    Ok(report) => {
                        info!("Report written");
                        Some((Ok(ResearchEvent::Report(report)), RunState::Done))
                    }
                    Err(e) => Some((Err(e), RunState::Done)),
                }
            }
            .instrument(span)
            .await
        }
        RunState::Done => None,
    }
}
