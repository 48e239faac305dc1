use serde::{Deserialize, Serialize};
use tracing::warn;

/// Upper bound on clarifying questions per query.
pub const MAX_QUESTIONS: usize = 3;
/// Upper bound on searches per plan.
pub const MAX_SEARCHES: usize = 5;

/// One answered clarifying question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clarification {
    /// The question as presented.
    pub question: String,
    /// The user's answer, possibly empty.
    pub answer: String,
}

/// The user's question plus any answered clarifications.
///
/// A run takes the query by value, so it cannot change once started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResearchQuery {
    text: String,
    #[serde(default)]
    clarifications: Vec<Clarification>,
}

impl ResearchQuery {
    /// A query with no clarifications.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            clarifications: Vec::new(),
        }
    }

    /// Attach answered clarifications, in question order.
    pub fn with_clarifications(mut self, clarifications: Vec<Clarification>) -> Self {
        self.clarifications = clarifications;
        self
    }

    /// The original query text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Answered clarifications, possibly none.
    pub fn clarifications(&self) -> &[Clarification] {
        &self.clarifications
    }
}

/// Up to [`MAX_QUESTIONS`] questions in presentation order. Empty means no
/// clarification is needed.
///
/// Deserialization goes through [`ClarifyingQuestionSet::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct ClarifyingQuestionSet(Vec<String>);

impl ClarifyingQuestionSet {
    /// Drops blank questions and keeps the first [`MAX_QUESTIONS`].
    pub fn new(questions: Vec<String>) -> Self {
        let mut questions: Vec<String> = questions
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .collect();
        if questions.len() > MAX_QUESTIONS {
            warn!(
                returned = questions.len(),
                kept = MAX_QUESTIONS,
                "Too many clarifying questions, truncating"
            );
            questions.truncate(MAX_QUESTIONS);
        }
        Self(questions)
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when no clarification is needed.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Questions in presentation order.
    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    /// Consume into the question strings.
    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for ClarifyingQuestionSet {
    fn from(questions: Vec<String>) -> Self {
        Self::new(questions)
    }
}

impl From<ClarifyingQuestionSet> for Vec<String> {
    fn from(set: ClarifyingQuestionSet) -> Self {
        set.0
    }
}

/// A single planned search: what to search for and why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchItem {
    /// Why this search matters to the query.
    pub reason: String,
    /// The search term.
    pub query: String,
}

impl SearchItem {
    /// Build an item from a search term and its rationale.
    pub fn new(query: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
            query: query.into(),
        }
    }
}

/// Up to [`MAX_SEARCHES`] searches in planning priority order.
///
/// Deserialization goes through [`SearchPlan::new`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<SearchItem>", into = "Vec<SearchItem>")]
pub struct SearchPlan(Vec<SearchItem>);

impl SearchPlan {
    /// Keeps the first [`MAX_SEARCHES`] items.
    pub fn new(mut items: Vec<SearchItem>) -> Self {
        if items.len() > MAX_SEARCHES {
            warn!(
                planned = items.len(),
                kept = MAX_SEARCHES,
                "Search plan exceeds fan-out bound, truncating"
            );
            items.truncate(MAX_SEARCHES);
        }
        Self(items)
    }

    /// Number of planned searches.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when the planner asked for no searches.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Items in planning order.
    pub fn items(&self) -> &[SearchItem] {
        &self.0
    }
}

impl From<Vec<SearchItem>> for SearchPlan {
    fn from(items: Vec<SearchItem>) -> Self {
        Self::new(items)
    }
}

impl From<SearchPlan> for Vec<SearchItem> {
    fn from(plan: SearchPlan) -> Self {
        plan.0
    }
}

/// A successful search: the summary bound to the item that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Evidence {
    /// The planned search.
    pub item: SearchItem,
    /// The searcher's summary.
    pub summary: String,
}

/// A failed search. Dropped from the evidence, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Absent {
    /// The planned search.
    pub item: SearchItem,
    /// Why the search produced nothing.
    pub reason: String,
}

/// Outcome of one search unit.
pub type SearchResult = Result<Evidence, Absent>;

/// The present search summaries that feed the report writer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EvidenceSet(Vec<String>);

impl EvidenceSet {
    /// Keep the summaries of successful searches, in the given order.
    pub fn from_results(results: impl IntoIterator<Item = SearchResult>) -> Self {
        Self(
            results
                .into_iter()
                .filter_map(|r| r.ok())
                .map(|e| e.summary)
                .collect(),
        )
    }

    /// Number of present summaries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// True when every search failed or none ran.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The summaries handed to the writer.
    pub fn summaries(&self) -> &[String] {
        &self.0
    }
}

impl From<Vec<String>> for EvidenceSet {
    fn from(summaries: Vec<String>) -> Self {
        Self(summaries)
    }
}

/// The writer's structured output. `markdown_report` is the deliverable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportData {
    /// Two or three sentence overview.
    pub short_summary: String,
    /// The full report body.
    pub markdown_report: String,
    /// Suggested topics for further research.
    #[serde(default)]
    pub follow_up_questions: Vec<String>,
}
