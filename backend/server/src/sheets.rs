//! # Google Sheets
//!
//! Spreadsheet-backed [`Storage`]. Talks to the Sheets v4 REST API with a
//! service-account token.
//!
//! ## Auth
//! - Service-account JSON provides `client_email`, `private_key` and `token_uri`
//! - An RS256-signed assertion is exchanged at `token_uri` for a bearer token
//! - The token is cached until a minute before it expires
//!
//! ## Tables
//! - Questions tab is read through its header row, so column order does not matter
//! - Votes tab is positional, its header is written the first time a ballot
//!   is appended to a tab without one
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::{
    database::{QuestionTable, Storage, StorageError, is_votes_header, question_header},
    models::{BallotRecord, Question, votes_header},
};

const SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
const GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME: u64 = 3600;
const TOKEN_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
pub struct ServiceAccount {
    pub client_email: String,
    pub private_key: String,
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: u64,
    exp: u64,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

struct AccessToken {
    value: String,
    expires_at: SystemTime,
}

#[derive(Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

pub struct Sheets {
    client: Client,
    base_url: Url,
    spreadsheet_id: String,
    account: ServiceAccount,
    key: EncodingKey,
    token: Mutex<Option<AccessToken>>,
    questions_sheet: String,
    votes_sheet: String,
    /// Question pairs covered by the votes header, `None` until checked.
    votes_width: Mutex<Option<usize>>,
}

impl Sheets {
    pub fn new(
        base_url: &str,
        spreadsheet_id: &str,
        credentials: &str,
        questions_sheet: &str,
        votes_sheet: &str,
    ) -> Result<Self, StorageError> {
        let account: ServiceAccount = serde_json::from_str(credentials)
            .map_err(|e| StorageError::Credentials(e.to_string()))?;

        let key = EncodingKey::from_rsa_pem(account.private_key.as_bytes())
            .map_err(|e| StorageError::Credentials(e.to_string()))?;

        let base_url =
            Url::parse(base_url).map_err(|e| StorageError::Credentials(e.to_string()))?;

        Ok(Self {
            client: Client::new(),
            base_url,
            spreadsheet_id: spreadsheet_id.to_string(),
            account,
            key,
            token: Mutex::new(None),
            questions_sheet: questions_sheet.to_string(),
            votes_sheet: votes_sheet.to_string(),
            votes_width: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, StorageError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.expires_at > SystemTime::now() + TOKEN_MARGIN {
                return Ok(token.value.clone());
            }
        }

        let issued_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let claims = Claims {
            iss: &self.account.client_email,
            scope: SCOPE,
            aud: &self.account.token_uri,
            iat: issued_at,
            exp: issued_at + TOKEN_LIFETIME,
        };

        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &self.key)
            .map_err(|e| StorageError::Credentials(e.to_string()))?;

        let response: TokenResponse = self
            .client
            .post(&self.account.token_uri)
            .form(&[("grant_type", GRANT_TYPE), ("assertion", assertion.as_str())])
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        info!("Refreshed spreadsheet access token");

        let value = response.access_token.clone();
        *cached = Some(AccessToken {
            value: response.access_token,
            expires_at: SystemTime::now() + Duration::from_secs(response.expires_in),
        });

        Ok(value)
    }

    /// `.../v4/spreadsheets/{id}/values/{range}{suffix}`
    fn values_url(&self, range: &str, suffix: &str) -> Result<Url, StorageError> {
        let mut url = self.base_url.clone();

        url.path_segments_mut()
            .map_err(|_| StorageError::Credentials("invalid spreadsheet API url".to_string()))?
            .pop_if_empty()
            .extend([
                "v4",
                "spreadsheets",
                self.spreadsheet_id.as_str(),
                "values",
                format!("{range}{suffix}").as_str(),
            ]);

        Ok(url)
    }

    async fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, StorageError> {
        let token = self.access_token().await?;

        let response: ValueRange = self
            .client
            .get(self.values_url(range, "")?)
            .bearer_auth(token)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        Ok(response.values)
    }

    async fn append_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), StorageError> {
        let token = self.access_token().await?;

        self.client
            .post(self.values_url(range, ":append")?)
            .query(&[("valueInputOption", "RAW"), ("insertDataOption", "INSERT_ROWS")])
            .bearer_auth(token)
            .json(&json!({ "values": values }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn update_values(&self, range: &str, values: Vec<Vec<String>>) -> Result<(), StorageError> {
        let token = self.access_token().await?;

        self.client
            .put(self.values_url(range, "")?)
            .query(&[("valueInputOption", "RAW")])
            .bearer_auth(token)
            .json(&json!({ "values": values }))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    async fn clear_values(&self, range: &str) -> Result<(), StorageError> {
        let token = self.access_token().await?;

        self.client
            .post(self.values_url(range, ":clear")?)
            .bearer_auth(token)
            .json(&json!({}))
            .send()
            .await?
            .error_for_status()?;

        Ok(())
    }

    /// Writes or widens the votes header so it names `questions` pairs.
    async fn ensure_votes_header(&self, questions: usize) -> Result<(), StorageError> {
        let mut width = self.votes_width.lock().await;

        let current = match *width {
            Some(current) => current,
            None => {
                let first = self.get_values(&format!("{}!1:1", self.votes_sheet)).await?;

                match first.first() {
                    None => 0,
                    Some(cells) if is_votes_header(cells) => cells.len().saturating_sub(2) / 2,
                    Some(_) => {
                        warn!("Votes sheet has no header row, leaving it as is");
                        usize::MAX
                    }
                }
            }
        };

        if questions > current {
            self.update_values(&format!("{}!A1", self.votes_sheet), vec![votes_header(questions)])
                .await?;
            *width = Some(questions);
        } else {
            *width = Some(current);
        }

        Ok(())
    }
}

#[async_trait]
impl Storage for Sheets {
    async fn load_questions(&self) -> Result<QuestionTable, StorageError> {
        let table = self.get_values(&self.questions_sheet).await?;

        Ok(QuestionTable::parse(&table))
    }

    async fn seed_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        let table = self.get_values(&self.questions_sheet).await?;

        let mut values = Vec::with_capacity(questions.len() + 1);
        if table.is_empty() {
            values.push(question_header());
        }
        values.extend(questions.iter().map(Question::to_cells));

        self.append_values(&self.questions_sheet, values).await
    }

    async fn replace_questions(&self, questions: &[Question]) -> Result<(), StorageError> {
        self.clear_values(&self.questions_sheet).await?;

        let mut values = vec![question_header()];
        values.extend(questions.iter().map(Question::to_cells));

        self.update_values(&format!("{}!A1", self.questions_sheet), values)
            .await
    }

    async fn append_question(&self, question: &Question) -> Result<(), StorageError> {
        self.append_values(&self.questions_sheet, vec![question.to_cells()])
            .await
    }

    async fn append_ballot(&self, record: &BallotRecord) -> Result<(), StorageError> {
        self.ensure_votes_header(record.entries.len()).await?;

        self.append_values(&self.votes_sheet, vec![record.cells()])
            .await
    }

    async fn read_ballots(&self) -> Result<Vec<BallotRecord>, StorageError> {
        let table = self.get_values(&self.votes_sheet).await?;

        let records = table
            .iter()
            .filter(|cells| !is_votes_header(cells))
            .filter_map(|cells| {
                BallotRecord::from_cells(cells)
                    .map_err(|e| warn!("Skipping vote row: {e}"))
                    .ok()
            })
            .collect();

        Ok(records)
    }
}
