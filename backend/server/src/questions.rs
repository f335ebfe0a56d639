use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::{
    database::Storage,
    error::AppError,
    models::{Question, default_questions},
    utils::normalize_question,
};

pub struct QuestionStore {
    questions: RwLock<Vec<Question>>,
    storage: Option<Arc<dyn Storage>>,
}

impl QuestionStore {
    pub async fn load(storage: Option<Arc<dyn Storage>>) -> Self {
        let questions = load_questions(storage.as_deref()).await;

        Self {
            questions: RwLock::new(questions),
            storage,
        }
    }

    pub async fn all(&self) -> Vec<Question> {
        self.questions.read().await.clone()
    }

    /// Ballot positions refer to this list.
    pub async fn active(&self) -> Vec<Question> {
        self.questions
            .read()
            .await
            .iter()
            .filter(|question| question.active)
            .cloned()
            .collect()
    }

    pub async fn add(&self, question: Question) -> Result<(), AppError> {
        let question = sanitize(question)?;

        self.questions.write().await.push(question.clone());

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.append_question(&question).await {
                warn!("Saving question failed, keeping it in memory: {e}");
            }
        }

        Ok(())
    }

    pub async fn replace(&self, questions: Vec<Question>) -> Result<(), AppError> {
        let questions = questions
            .into_iter()
            .map(sanitize)
            .collect::<Result<Vec<_>, _>>()?;

        *self.questions.write().await = questions.clone();
        info!("Replaced question list with {} questions", questions.len());

        if let Some(storage) = &self.storage {
            if let Err(e) = storage.replace_questions(&questions).await {
                warn!("Updating questions failed, keeping them in memory: {e}");
            }
        }

        Ok(())
    }
}

fn sanitize(mut question: Question) -> Result<Question, AppError> {
    question.text = normalize_question(&question.text);

    if question.text.is_empty() {
        return Err(AppError::InvalidInput("question text must not be empty"));
    }

    Ok(question)
}

/// Questions from storage, or the defaults when storage is missing, failing or empty.
pub async fn load_questions(storage: Option<&dyn Storage>) -> Vec<Question> {
    let Some(storage) = storage else {
        info!("No storage configured, using default questions");
        return default_questions();
    };

    let table = match storage.load_questions().await {
        Ok(table) => table,
        Err(e) => {
            warn!("Loading questions failed: {e}");
            info!("Falling back to default questions");
            return default_questions();
        }
    };

    let questions: Vec<Question> = table
        .questions
        .into_iter()
        .filter_map(|question| sanitize(question).ok())
        .collect();

    if questions.is_empty() {
        if table.rows == 0 {
            info!("No questions found in storage, seeding default questions");

            if let Err(e) = storage.seed_questions(&default_questions()).await {
                warn!("Seeding default questions failed: {e}");
            }
        } else {
            warn!(
                "None of the {} question rows are usable, serving default questions",
                table.rows
            );
        }

        return default_questions();
    }

    info!("Loaded {} questions from storage", questions.len());

    questions
}
