//! Context Assembler
//!
//! Builds the text handed to the sales assistant: fixed instructions, the
//! owner's fact sheet (bounded to a character budget) and the question.
//! Nothing here calls a model; the caller decides where the prompt goes.

use tracing::debug;

use crate::aggregate::{summarize, FactSheet};
use crate::config::ContextConfig;
use crate::error::{Error, Result};
use crate::store::{RecordFilter, RecordStore};

pub const MAX_QUESTION_CHARS: usize = 2000;

/// Appended when the fact sheet does not fit the budget
pub const TRUNCATION_MARKER: &str = "[fact sheet truncated]";

const SYSTEM_INSTRUCTIONS: &str = "\
You are a sales analysis assistant. Answer only questions about the sales \
spreadsheets the user uploaded, using only the facts below. Quantities are \
totals per product for each month/year. Do not invent numbers; if the facts \
do not answer the question, say so and suggest what data would.";

const NO_DATA_INSTRUCTIONS: &str = "\
No sales data is stored yet. Ask the user to upload their monthly sales \
spreadsheets (for example \"Janeiro 2025.xlsx\") before asking questions.";

/// Trim and bound-check a user question
pub fn validate_question(question: &str) -> Result<&str> {
    let question = question.trim();
    let len = question.chars().count();
    if len == 0 {
        return Err(Error::InvalidData("Question is empty".into()));
    }
    if len > MAX_QUESTION_CHARS {
        return Err(Error::InvalidData(format!(
            "Question has {} characters, the limit is {}",
            len, MAX_QUESTION_CHARS
        )));
    }
    Ok(question)
}

/// Cut `text` to at most `max_chars` characters at a line boundary.
///
/// The marker is added on its own line and is not counted in the budget.
pub fn truncate_at_line(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    let cut = text
        .char_indices()
        .nth(max_chars)
        .map(|(idx, _)| idx)
        .unwrap_or(text.len());
    let head = &text[..cut];
    let head = match head.rfind('\n') {
        Some(newline) => &head[..=newline],
        None => head,
    };

    let mut out = head.to_string();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(TRUNCATION_MARKER);
    out
}

/// Everything the assistant gets to know about one owner
#[derive(Debug, Clone)]
pub struct AssistantContext {
    pub fact_sheet: FactSheet,
    /// Stored records the sheet was built from
    pub record_count: usize,
    pub period_count: usize,
    max_chars: usize,
}

impl AssistantContext {
    pub fn has_data(&self) -> bool {
        !self.fact_sheet.is_empty()
    }

    /// The rendered fact sheet within the character budget
    pub fn facts(&self) -> String {
        truncate_at_line(&self.fact_sheet.render(), self.max_chars)
    }

    /// Full prompt for `question`
    pub fn prompt(&self, question: &str) -> Result<String> {
        let question = validate_question(question)?;

        let mut prompt = String::from(SYSTEM_INSTRUCTIONS);
        prompt.push_str("\n\n");
        if !self.has_data() {
            prompt.push_str(NO_DATA_INSTRUCTIONS);
            prompt.push_str("\n\n");
        }
        prompt.push_str(&self.facts());
        if !prompt.ends_with('\n') {
            prompt.push('\n');
        }
        prompt.push_str("\nQuestion: ");
        prompt.push_str(question);
        prompt.push('\n');
        Ok(prompt)
    }
}

/// Loads an owner's records and summarizes them for the assistant
pub struct ContextAssembler<'a, S> {
    store: &'a S,
    config: ContextConfig,
}

impl<'a, S: RecordStore> ContextAssembler<'a, S> {
    pub fn new(store: &'a S, config: ContextConfig) -> Self {
        Self { store, config }
    }

    /// Assemble the context for one owner. Recomputed on every call.
    pub fn for_owner(&self, owner: &str) -> Result<AssistantContext> {
        let records = self.store.select(&RecordFilter::owner(owner))?;
        let fact_sheet = summarize(&records);
        debug!(
            owner,
            records = records.len(),
            periods = fact_sheet.periods.len(),
            "Assembled assistant context"
        );

        Ok(AssistantContext {
            record_count: records.len(),
            period_count: fact_sheet.periods.len(),
            fact_sheet,
            max_chars: self.config.max_chars,
        })
    }
}
