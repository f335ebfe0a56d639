//! # Storage
//!
//! Persistent store for questions and ballots. The deployed backend is a
//! spreadsheet with two tables:
//!
//! - questions: `question, description, active`
//! - votes: `phoneNumber, timestamp, question_1, answer_1, ..., question_N, answer_N`
//!
//! Questions are read through their header row since organizers edit that tab
//! by hand. The votes tab is only ever written by this server, so it is parsed
//! by position.
//!
//! The store is optional. When it is not configured, or a call fails, the
//! server keeps working from its in-process lists and only logs the failure.
use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;

use crate::models::{BallotRecord, Question};

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),

    #[error("Invalid credentials: {0}")]
    Credentials(String),

    #[error("Malformed row: {0}")]
    Malformed(String),
}

#[async_trait]
pub trait Storage: Send + Sync {
    async fn load_questions(&self) -> Result<QuestionTable, StorageError>;

    /// Appends `questions`, writing the header first when the table is empty.
    async fn seed_questions(&self, questions: &[Question]) -> Result<(), StorageError>;

    /// Clears the questions table and writes `questions` under a fresh header.
    async fn replace_questions(&self, questions: &[Question]) -> Result<(), StorageError>;

    async fn append_question(&self, question: &Question) -> Result<(), StorageError>;

    async fn append_ballot(&self, record: &BallotRecord) -> Result<(), StorageError>;

    async fn read_ballots(&self) -> Result<Vec<BallotRecord>, StorageError>;
}

pub const QUESTION_COLUMNS: [&str; 3] = ["question", "description", "active"];

pub struct QuestionTable {
    /// Data rows found, usable or not.
    pub rows: usize,
    pub questions: Vec<Question>,
}

impl QuestionTable {
    pub fn parse(table: &[Vec<String>]) -> Self {
        let has_header = table.first().is_some_and(|first| {
            first
                .iter()
                .any(|cell| cell.trim().eq_ignore_ascii_case(QUESTION_COLUMNS[0]))
        });

        let questions = if has_header {
            rows(table)
                .iter()
                .filter_map(|row| Question::from_row(row).ok())
                .collect()
        } else {
            Vec::new()
        };

        Self {
            rows: table.len() - usize::from(has_header),
            questions,
        }
    }
}

pub fn question_header() -> Vec<String> {
    QUESTION_COLUMNS.iter().map(|column| column.to_string()).collect()
}

/// A table row keyed by its lowercased header cells.
pub struct Row {
    cells: HashMap<String, String>,
}

impl Row {
    pub fn new(header: &[String], values: &[String]) -> Self {
        let cells = header
            .iter()
            .zip(values.iter())
            .map(|(column, value)| (column.trim().to_lowercase(), value.clone()))
            .collect();

        Self { cells }
    }

    pub fn required(&self, column: &str) -> Result<&str, StorageError> {
        self.optional(column)
            .filter(|value| !value.trim().is_empty())
            .ok_or_else(|| StorageError::Malformed(format!("missing {column}")))
    }

    pub fn optional(&self, column: &str) -> Option<&str> {
        self.cells.get(&column.to_lowercase()).map(String::as_str)
    }
}

/// First row is the header; the rest become rows keyed by it.
pub fn rows(table: &[Vec<String>]) -> Vec<Row> {
    match table.split_first() {
        Some((header, body)) => body.iter().map(|values| Row::new(header, values)).collect(),
        None => Vec::new(),
    }
}

impl Question {
    pub fn from_row(row: &Row) -> Result<Self, StorageError> {
        Ok(Self {
            text: row.required("question")?.to_string(),
            description: row.optional("description").unwrap_or_default().to_string(),
            active: row
                .optional("active")
                .is_some_and(|active| active.trim().eq_ignore_ascii_case("true")),
        })
    }

    pub fn to_cells(&self) -> Vec<String> {
        vec![
            self.text.clone(),
            self.description.clone(),
            if self.active { "TRUE" } else { "FALSE" }.to_string(),
        ]
    }
}

impl BallotRecord {
    /// Parses a votes-table row. A missing trailing answer reads as empty.
    pub fn from_cells(cells: &[String]) -> Result<Self, StorageError> {
        let phone_number = cells
            .first()
            .map(|phone| phone.trim())
            .filter(|phone| !phone.is_empty())
            .ok_or_else(|| StorageError::Malformed("missing phoneNumber".to_string()))?;

        let timestamp = cells.get(1).cloned().unwrap_or_default();

        let entries = cells
            .get(2..)
            .unwrap_or_default()
            .chunks(2)
            .map(|pair| {
                let question = pair[0].clone();
                let answer = pair.get(1).cloned().unwrap_or_default();
                (question, answer)
            })
            .collect();

        Ok(Self {
            phone_number: phone_number.to_string(),
            timestamp,
            entries,
        })
    }
}

/// True when `cells` is the votes-table header rather than a ballot.
pub fn is_votes_header(cells: &[String]) -> bool {
    cells.first().is_some_and(|first| first.trim().eq_ignore_ascii_case("phoneNumber"))
}
