//! # Votes
//!
//! Every ballot lands in the in-process fallback list first, then best-effort
//! in storage. A voter never sees a storage failure.
//!
//! Reads pick one source per call: storage when configured and reachable,
//! the fallback list otherwise. The two are never merged, so a ballot that
//! only reached the fallback list while storage was down is not counted once
//! storage answers again.
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    database::Storage,
    error::AppError,
    models::{BallotRecord, Question, UNANSWERED},
    utils::timestamp,
};

pub struct BallotLedger {
    fallback: RwLock<Vec<BallotRecord>>,
    storage: Option<Arc<dyn Storage>>,
}

impl BallotLedger {
    pub fn new(storage: Option<Arc<dyn Storage>>) -> Self {
        Self {
            fallback: RwLock::new(Vec::new()),
            storage,
        }
    }

    pub async fn record_vote(
        &self,
        questions: &[Question],
        respondent_id: &str,
        answers: &[String],
    ) -> Result<(), AppError> {
        let respondent_id = respondent_id.trim();

        if respondent_id.is_empty() {
            return Err(AppError::InvalidInput("phoneNumber must not be empty"));
        }

        if answers.is_empty() {
            return Err(AppError::InvalidInput("answers must not be empty"));
        }

        let record = build_record(questions, respondent_id, answers);

        self.fallback.write().await.push(record.clone());

        match &self.storage {
            Some(storage) => match storage.append_ballot(&record).await {
                Ok(()) => info!("Saved vote from {respondent_id}"),
                Err(e) => warn!("Saving vote failed, kept in fallback only: {e}"),
            },
            None => info!("Saved vote from {respondent_id} in fallback"),
        }

        Ok(())
    }

    /// Ballots from the authoritative source for this call.
    pub async fn ballots(&self) -> Vec<BallotRecord> {
        if let Some(storage) = &self.storage {
            match storage.read_ballots().await {
                Ok(records) => return records,
                Err(e) => warn!("Reading votes failed, using fallback: {e}"),
            }
        }

        self.fallback.read().await.clone()
    }
}

/// Pairs each active question with the answer at its position.
pub fn build_record(questions: &[Question], respondent_id: &str, answers: &[String]) -> BallotRecord {
    if answers.len() > questions.len() {
        warn!(
            "Dropping {} answers beyond the {} active questions",
            answers.len() - questions.len(),
            questions.len()
        );
    }

    let entries = questions
        .iter()
        .enumerate()
        .map(|(i, question)| {
            let answer = answers.get(i).map(String::as_str).unwrap_or(UNANSWERED);
            (question.text.clone(), answer.to_string())
        })
        .collect();

    BallotRecord {
        phone_number: respondent_id.to_string(),
        timestamp: timestamp(),
        entries,
    }
}
