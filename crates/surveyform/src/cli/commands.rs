//! CLI command definitions and output rendering.

use std::fmt::Write as _;
use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::error::Result;
use crate::submission::FormInput;
use crate::table::{AnswerTable, HEADER};

/// Serve command arguments.
#[derive(Debug, Args)]
pub struct ServeCommand {
    /// Address to listen on (overrides `server.bind`)
    #[arg(short, long, value_name = "ADDR")]
    pub bind: Option<SocketAddr>,
}

/// Submit command arguments.
#[derive(Debug, Args)]
pub struct SubmitCommand {
    /// Respondent name
    #[arg(short, long, default_value = "")]
    pub name: String,

    /// Answer to the first question
    #[arg(long, default_value = "")]
    pub answer1: String,

    /// Answer to the second question
    #[arg(long, default_value = "")]
    pub answer2: String,

    /// Answer to the third question
    #[arg(long, default_value = "")]
    pub answer3: String,
}

impl From<SubmitCommand> for FormInput {
    fn from(cmd: SubmitCommand) -> Self {
        Self {
            name: cmd.name,
            answer1: cmd.answer1,
            answer2: cmd.answer2,
            answer3: cmd.answer3,
        }
    }
}

/// List command arguments.
#[derive(Debug, Args)]
pub struct ListCommand {
    /// Output format
    #[arg(short, long, value_enum, default_value = "plain")]
    pub format: OutputFormat,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Output format for commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// One block per submission
    #[default]
    Plain,
    /// Aligned columns
    Table,
    /// JSON array
    Json,
    /// The stored CSV, verbatim
    Csv,
}

/// Longest cell shown by the table format before truncation.
const MAX_CELL_WIDTH: usize = 32;

/// Render `table` in the requested format.
///
/// # Errors
///
/// Returns an error if JSON or CSV serialization fails.
pub fn render_answers(table: &AnswerTable, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Plain => Ok(render_plain(table)),
        OutputFormat::Table => Ok(render_columns(table)),
        OutputFormat::Json => Ok(serde_json::to_string_pretty(table)?),
        OutputFormat::Csv => table.to_csv(),
    }
}

fn render_plain(table: &AnswerTable) -> String {
    if table.is_empty() {
        return "No submissions yet.\n".to_string();
    }
    let mut out = String::new();
    for (i, row) in table.iter().enumerate() {
        let _ = writeln!(out, "#{} {}", i + 1, row.timestamp);
        if let Some(name) = &row.name {
            let _ = writeln!(out, "  nome: {name}");
        }
        for (q, answer) in row.answers.iter().enumerate() {
            let _ = writeln!(out, "  pergunta{}: {answer}", q + 1);
        }
    }
    out
}

fn clip(cell: &str) -> String {
    let flat = cell.replace(['\n', '\r'], " ");
    if flat.chars().count() > MAX_CELL_WIDTH {
        let mut short: String = flat.chars().take(MAX_CELL_WIDTH - 1).collect();
        short.push('…');
        short
    } else {
        flat
    }
}

fn render_columns(table: &AnswerTable) -> String {
    let rows: Vec<[String; 5]> = table
        .iter()
        .map(|row| {
            [
                clip(&row.timestamp),
                clip(row.name_or_empty()),
                clip(&row.answers[0]),
                clip(&row.answers[1]),
                clip(&row.answers[2]),
            ]
        })
        .collect();

    let mut widths = HEADER.map(|h| h.chars().count());
    for row in &rows {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let mut out = String::new();
    let line = |out: &mut String, cells: &[&str]| {
        let padded: Vec<String> = cells
            .iter()
            .zip(widths)
            .map(|(cell, width)| format!("{cell:<width$}"))
            .collect();
        let _ = writeln!(out, "{}", padded.join("  ").trim_end());
    };
    line(&mut out, &HEADER[..]);
    for row in &rows {
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        line(&mut out, &cells);
    }
    let _ = writeln!(out, "({} rows)", rows.len());
    out
}
