use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::Mutex;

use crate::{
    database::{QuestionTable, Storage, StorageError, question_header},
    models::{BallotRecord, Question},
    verification::{ProviderError, Verifier},
};

/// In-memory storage; `down` makes every call fail. Questions are kept as a
/// raw table so they go through the same parsing as the spreadsheet.
#[derive(Default)]
pub struct FakeStorage {
    pub table: Mutex<Vec<Vec<String>>>,
    pub ballots: Mutex<Vec<BallotRecord>>,
    pub replaced: Mutex<Vec<Vec<Question>>>,
    pub down: AtomicBool,
}

impl FakeStorage {
    pub fn with_questions(questions: Vec<Question>) -> Self {
        let mut table = vec![question_header()];
        table.extend(questions.iter().map(Question::to_cells));

        Self::with_table(table)
    }

    pub fn with_table(table: Vec<Vec<String>>) -> Self {
        Self {
            table: Mutex::new(table),
            ..Default::default()
        }
    }

    pub fn unavailable() -> Self {
        Self {
            down: AtomicBool::new(true),
            ..Default::default()
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::Relaxed);
    }

    fn check(&self) -> Result<(), StorageError> {
        if self.down.load(Ordering::Relaxed) {
            return Err(StorageError::Malformed("storage is down".to_string()));
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for FakeStorage {
    async fn load_questions(&self) -> Result<QuestionTable, StorageError> {
        self.check()?;
        Ok(QuestionTable::parse(&self.table.lock().await))
    }

    async fn seed_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        self.check()?;
        let mut table = self.table.lock().await;
        if table.is_empty() {
            table.push(question_header());
        }
        table.extend(questions.iter().map(Question::to_cells));
        Ok(())
    }

    async fn replace_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        self.check()?;
        let mut table = vec![question_header()];
        table.extend(questions.iter().map(Question::to_cells));
        *self.table.lock().await = table;
        self.replaced.lock().await.push(questions.to_vec());
        Ok(())
    }

    async fn append_question(&self, question: &Question) -> Result<(), StorageError> {
        self.check()?;
        self.table.lock().await.push(question.to_cells());
        Ok(())
    }

    async fn append_ballot(&self, record: &BallotRecord) -> Result<(), StorageError> {
        self.check()?;
        self.ballots.lock().await.push(record.clone());
        Ok(())
    }

    async fn read_ballots(&self) -> Result<Vec<BallotRecord>, StorageError> {
        self.check()?;
        Ok(self.ballots.lock().await.clone())
    }
}

/// Records the numbers it was given; `failure` turns every call into a provider error.
#[derive(Default)]
pub struct FakeVerifier {
    pub sent: Mutex<Vec<String>>,
    pub checked: Mutex<Vec<(String, String)>>,
    pub failure: Option<(i64, String)>,
}

impl FakeVerifier {
    fn fail(&self) -> Result<(), ProviderError> {
        match &self.failure {
            Some((code, message)) => Err(ProviderError {
                message: message.clone(),
                code: Some(*code),
            }),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Verifier for FakeVerifier {
    async fn send_code(&self, to: &str) -> Result<Value, ProviderError> {
        self.fail()?;
        self.sent.lock().await.push(to.to_string());
        Ok(json!({ "to": to, "status": "pending", "channel": "sms" }))
    }

    async fn check_code(&self, to: &str, code: &str) -> Result<Value, ProviderError> {
        self.fail()?;
        self.checked
            .lock()
            .await
            .push((to.to_string(), code.to_string()));
        let status = if code == "123456" { "approved" } else { "pending" };
        Ok(json!({ "to": to, "status": status, "valid": status == "approved" }))
    }
}
