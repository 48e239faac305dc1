//! Text formats around clarifying questions: the numbered list shown to the
//! user, answer parsing, and the `Q{i}/A{i}` block fed to later stages.

use crate::types::{Clarification, ClarifyingQuestionSet, ResearchQuery};

/// `1. first\n2. second`, 1-indexed.
pub fn format_question_list(questions: &[String]) -> String {
    questions
        .iter()
        .enumerate()
        .map(|(idx, q)| format!("{}. {q}", idx + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Split newline-delimited answers, trimming each line and padding with
/// empty strings up to `question_count`. Extra lines are kept.
pub fn parse_answers(answers: &str, question_count: usize) -> Vec<String> {
    let mut lines: Vec<String> = answers.split('\n').map(|l| l.trim().to_string()).collect();
    if lines.len() < question_count {
        lines.resize(question_count, String::new());
    }
    lines
}

/// Pair every question with its positional answer.
pub fn pair_answers(questions: &[String], answers: &str) -> Vec<Clarification> {
    let answers = parse_answers(answers, questions.len());
    questions
        .iter()
        .zip(answers)
        .map(|(question, answer)| Clarification {
            question: question.clone(),
            answer,
        })
        .collect()
}

/// `Q{i}: {question}\nA{i}: {answer}` per pair, newline-joined, no trailing
/// separator.
pub fn render_block(clarifications: &[Clarification]) -> String {
    clarifications
        .iter()
        .enumerate()
        .map(|(idx, c)| format!("Q{n}: {}\nA{n}: {}", c.question, c.answer, n = idx + 1))
        .collect::<Vec<_>>()
        .join("\n")
}

impl ResearchQuery {
    /// Build a query from the raw answer text given to `questions`.
    pub fn from_answers(
        text: impl Into<String>,
        questions: &ClarifyingQuestionSet,
        answers: &str,
    ) -> Self {
        ResearchQuery::new(text).with_clarifications(pair_answers(questions.as_slice(), answers))
    }

    /// The rendered clarification block, or `None` when there is nothing to
    /// render.
    pub fn clarification_block(&self) -> Option<String> {
        if self.clarifications().is_empty() {
            None
        } else {
            Some(render_block(self.clarifications()))
        }
    }
}
