//! The answer table and its CSV encoding.
//!
//! The table is append-only and always serialized in full. Column order and
//! header names never change, so the parser refuses any other header rather
//! than guessing a mapping.

use csv::{ReaderBuilder, Terminator, WriterBuilder};
use serde::Serialize;

use crate::error::{Error, Result};
use crate::submission::Submission;

/// Fixed CSV header of the answer table.
pub const HEADER: [&str; 5] = ["timestamp", "nome", "pergunta1", "pergunta2", "pergunta3"];

/// Ordered, append-only collection of submissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct AnswerTable {
    rows: Vec<Submission>,
}

impl AnswerTable {
    /// Create an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a table holding the given rows in order.
    #[must_use]
    pub fn from_rows(rows: Vec<Submission>) -> Self {
        Self { rows }
    }

    /// Append a row at the end of the table.
    pub fn push(&mut self, submission: Submission) {
        self.rows.push(submission);
    }

    /// Rows in submission order.
    #[must_use]
    pub fn rows(&self) -> &[Submission] {
        &self.rows
    }

    /// Number of rows.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the table has no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Iterate over the rows in submission order.
    pub fn iter(&self) -> std::slice::Iter<'_, Submission> {
        self.rows.iter()
    }

    /// Parse a table from CSV text.
    ///
    /// Empty or whitespace-only content is an empty table.
    ///
    /// # Errors
    ///
    /// Returns an error if the header differs from [`HEADER`] or a record has
    /// the wrong number of fields.
    pub fn from_csv(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::new());
        }

        let mut reader = ReaderBuilder::new()
            .has_headers(true)
            .from_reader(content.as_bytes());

        let header = reader.headers()?;
        if !header.iter().eq(HEADER.iter().copied()) {
            return Err(Error::malformed_table(format!(
                "expected header {:?}, found {:?}",
                HEADER.join(","),
                header.iter().collect::<Vec<_>>().join(",")
            )));
        }

        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record?;
            let field = |i: usize| record.get(i).unwrap_or_default().to_string();
            rows.push(Submission::from_parts(
                field(0),
                record.get(1).unwrap_or_default(),
                [field(2), field(3), field(4)],
            ));
        }
        Ok(Self { rows })
    }

    /// Serialize the whole table, header first.
    ///
    /// # Errors
    ///
    /// Returns an error if CSV encoding fails.
    pub fn to_csv(&self) -> Result<String> {
        let mut writer = WriterBuilder::new()
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        writer.write_record(HEADER)?;
        for row in &self.rows {
            writer.write_record([
                row.timestamp.as_str(),
                row.name_or_empty(),
                row.answers[0].as_str(),
                row.answers[1].as_str(),
                row.answers[2].as_str(),
            ])?;
        }

        let bytes = writer
            .into_inner()
            .map_err(|err| Error::Io(err.into_error()))?;
        Ok(String::from_utf8(bytes)?)
    }
}

impl<'a> IntoIterator for &'a AnswerTable {
    type Item = &'a Submission;
    type IntoIter = std::slice::Iter<'a, Submission>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
