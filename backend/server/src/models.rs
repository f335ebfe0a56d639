use serde::{Deserialize, Serialize};

/// Answer token counted as a vote in favour.
pub const FOR: &str = "בעד";
/// Answer token counted as a vote against.
pub const AGAINST: &str = "נגד";
/// Filled in for every active question the voter did not answer.
pub const UNANSWERED: &str = "לא נענה";

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Question {
    #[serde(rename = "question")]
    pub text: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "active_by_default")]
    pub active: bool,
}

fn active_by_default() -> bool {
    true
}

impl Question {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            description: String::new(),
            active: true,
        }
    }
}

pub fn default_questions() -> Vec<Question> {
    vec![
        Question::new("האם אתה תומך בהצעה להאריך את שעות הפעילות של המרכז הקהילתי?"),
        Question::new("האם אתה בעד הקמת גינה קהילתית חדשה בשכונה?"),
    ]
}

/// One stored ballot, flattened into question/answer pairs by position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BallotRecord {
    pub phone_number: String,
    pub timestamp: String,
    pub entries: Vec<(String, String)>,
}

impl BallotRecord {
    pub fn answer(&self, position: usize) -> Option<&str> {
        self.entries.get(position).map(|(_, answer)| answer.as_str())
    }

    /// Flat row in the votes table layout.
    pub fn cells(&self) -> Vec<String> {
        let mut cells = Vec::with_capacity(2 + self.entries.len() * 2);
        cells.push(self.phone_number.clone());
        cells.push(self.timestamp.clone());

        for (question, answer) in &self.entries {
            cells.push(question.clone());
            cells.push(answer.clone());
        }

        cells
    }
}

/// Header row for a votes table holding `questions` question/answer pairs.
pub fn votes_header(questions: usize) -> Vec<String> {
    let mut header = vec!["phoneNumber".to_string(), "timestamp".to_string()];

    for i in 1..=questions {
        header.push(format!("question_{i}"));
        header.push(format!("answer_{i}"));
    }

    header
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct ResultTally {
    pub question: String,
    #[serde(rename = "for")]
    pub for_count: usize,
    #[serde(rename = "against")]
    pub against_count: usize,
}

#[derive(Deserialize, Default)]
pub struct VotePayload {
    #[serde(rename = "phoneNumber")]
    pub phone_number: Option<String>,
    pub answers: Option<Vec<String>>,
}

#[derive(Deserialize, Default)]
pub struct SendCodePayload {
    pub to: Option<String>,
}

#[derive(Deserialize, Default)]
pub struct CheckCodePayload {
    pub to: Option<String>,
    pub code: Option<String>,
}

#[derive(Serialize)]
pub struct Outcome {
    pub success: bool,
}
