//! Survey submissions.
//!
//! A [`Submission`] is one row of the answer table. It is built from raw form
//! input, stamped with the current time, and never changed afterwards.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Number of free-text questions on the form.
pub const QUESTION_COUNT: usize = 3;

/// Raw field values as typed by the respondent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormInput {
    /// Respondent name (optional).
    pub name: String,
    /// Answer to the first question.
    pub answer1: String,
    /// Answer to the second question.
    pub answer2: String,
    /// Answer to the third question.
    pub answer3: String,
}

impl FormInput {
    /// Check that at least one answer is non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when all three answers are empty.
    pub fn validate(&self) -> Result<()> {
        let answered = [&self.answer1, &self.answer2, &self.answer3]
            .iter()
            .any(|answer| !answer.is_empty());
        if answered {
            Ok(())
        } else {
            Err(Error::validation(
                "Preencha pelo menos uma resposta antes de enviar.",
            ))
        }
    }
}

/// One stored survey response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Submission {
    /// ISO-8601 time the submission was created, kept verbatim.
    pub timestamp: String,
    /// Respondent name, absent when left empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// The three answers, in question order.
    pub answers: [String; QUESTION_COUNT],
}

impl Submission {
    /// Validate form input and stamp it with the current time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when all three answers are empty.
    pub fn from_input(input: FormInput) -> Result<Self> {
        Self::from_input_at(input, Utc::now())
    }

    /// Validate form input and stamp it with the given time.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] when all three answers are empty.
    pub fn from_input_at(input: FormInput, at: DateTime<Utc>) -> Result<Self> {
        input.validate()?;
        Ok(Self::from_parts(
            format_timestamp(at),
            &input.name,
            [input.answer1, input.answer2, input.answer3],
        ))
    }

    /// Assemble a submission from stored column values.
    ///
    /// An empty name is `None`; any other name is kept verbatim.
    #[must_use]
    pub fn from_parts(timestamp: String, name: &str, answers: [String; QUESTION_COUNT]) -> Self {
        Self {
            timestamp,
            name: (!name.is_empty()).then(|| name.to_string()),
            answers,
        }
    }

    /// The name column value (empty when absent).
    #[must_use]
    pub fn name_or_empty(&self) -> &str {
        self.name.as_deref().unwrap_or("")
    }

    /// Answer to question `index` (0-based).
    #[must_use]
    pub fn answer(&self, index: usize) -> Option<&str> {
        self.answers.get(index).map(String::as_str)
    }
}

/// Render a timestamp the way it is stored in the table.
#[must_use]
pub fn format_timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}
