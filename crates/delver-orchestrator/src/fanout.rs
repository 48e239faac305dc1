use crate::monitor::SearchMonitor;
use crate::stages::{search_agent, search_prompt};
use crate::types::{Absent, Evidence, EvidenceSet, SearchItem, SearchPlan, SearchResult};
use delver_agent::{InferenceService, StageAgent};
use futures_util::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Runs every item of a plan concurrently and keeps the successes.
///
/// All units are polled together in one `FuturesUnordered`; each converts
/// its own failure into [`Absent`], so the executor itself cannot fail.
#[derive(Clone)]
pub struct SearchExecutor {
    service: Arc<dyn InferenceService>,
    agent: Arc<StageAgent>,
}

impl SearchExecutor {
    /// An executor using the default search agent.
    pub fn new(service: Arc<dyn InferenceService>) -> Self {
        Self {
            service,
            agent: Arc::new(search_agent()),
        }
    }

    /// Use a different search agent (instructions, model routing).
    pub fn with_agent(mut self, agent: StageAgent) -> Self {
        self.agent = Arc::new(agent);
        self
    }

    /// Run the plan and return the present summaries.
    pub async fn execute(&self, plan: &SearchPlan, monitor: &SearchMonitor) -> EvidenceSet {
        let results = self.execute_all(plan, monitor).await;
        let evidence = EvidenceSet::from_results(results);
        info!(
            found = evidence.len(),
            total = plan.len(),
            "Fan-out complete"
        );
        evidence
    }

    /// Run the plan and return every outcome in completion order.
    pub async fn execute_all(&self, plan: &SearchPlan, monitor: &SearchMonitor) -> Vec<SearchResult> {
        if plan.is_empty() {
            return Vec::new();
        }

        let mut in_flight: FuturesUnordered<_> = plan
            .items()
            .iter()
            .cloned()
            .map(|item| self.search(item))
            .collect();

        let mut results = Vec::with_capacity(plan.len());
        while let Some(result) = in_flight.next().await {
            monitor.record(&result);
            results.push(result);
        }
        results
    }

    async fn search(&self, item: SearchItem) -> SearchResult {
        let prompt = search_prompt(&item);
        debug!(query = %item.query, "Search started");
        match self.agent.invoke_text(self.service.as_ref(), &prompt).await {
            Ok(summary) => Ok(Evidence { item, summary }),
            Err(e) => {
                warn!(query = %item.query, error = %e, "Search failed, dropping result");
                Err(Absent {
                    item,
                    reason: e.to_string(),
                })
            }
        }
    }
}
