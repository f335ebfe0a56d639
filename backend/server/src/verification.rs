//! # Phone Verification
//!
//! One-time SMS codes are issued and checked by Twilio Verify. The server
//! only normalizes the phone number and passes the provider's answer through,
//! there is no local fallback.
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::{error::AppError, utils::normalize_phone};

#[derive(Error, Debug)]
#[error("{message}")]
pub struct ProviderError {
    pub message: String,
    pub code: Option<i64>,
}

impl From<reqwest::Error> for ProviderError {
    fn from(error: reqwest::Error) -> Self {
        Self {
            message: error.to_string(),
            code: None,
        }
    }
}

impl From<ProviderError> for AppError {
    fn from(error: ProviderError) -> Self {
        AppError::Provider {
            message: error.message,
            code: error.code,
        }
    }
}

#[async_trait]
pub trait Verifier: Send + Sync {
    async fn send_code(&self, to: &str) -> Result<Value, ProviderError>;

    async fn check_code(&self, to: &str, code: &str) -> Result<Value, ProviderError>;
}

pub struct Twilio {
    client: Client,
    base_url: String,
    account_sid: String,
    auth_token: String,
    service_sid: String,
}

#[derive(Deserialize)]
struct TwilioError {
    message: String,
    code: Option<i64>,
}

impl Twilio {
    pub fn new(base_url: &str, account_sid: &str, auth_token: &str, service_sid: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            account_sid: account_sid.to_string(),
            auth_token: auth_token.to_string(),
            service_sid: service_sid.to_string(),
        }
    }

    async fn post(&self, resource: &str, form: &[(&str, &str)]) -> Result<Value, ProviderError> {
        let url = format!(
            "{}/v2/Services/{}/{resource}",
            self.base_url, self.service_sid
        );

        let response = self
            .client
            .post(url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(form)
            .send()
            .await?;

        read_response(response).await
    }
}

async fn read_response(response: Response) -> Result<Value, ProviderError> {
    let status = response.status();
    let body = response.text().await?;

    if status.is_success() {
        return serde_json::from_str(&body).map_err(|e| ProviderError {
            message: e.to_string(),
            code: None,
        });
    }

    Err(match serde_json::from_str::<TwilioError>(&body) {
        Ok(error) => ProviderError {
            message: error.message,
            code: error.code,
        },
        Err(_) => ProviderError {
            message: format!("Verification provider returned {status}"),
            code: Some(status.as_u16().into()),
        },
    })
}

#[async_trait]
impl Verifier for Twilio {
    async fn send_code(&self, to: &str) -> Result<Value, ProviderError> {
        self.post("Verifications", &[("To", to), ("Channel", "sms")])
            .await
    }

    async fn check_code(&self, to: &str, code: &str) -> Result<Value, ProviderError> {
        self.post("VerificationCheck", &[("To", to), ("Code", code)])
            .await
    }
}

pub struct VerificationGateway {
    verifier: Option<Arc<dyn Verifier>>,
    country_code: String,
}

impl VerificationGateway {
    pub fn new(verifier: Option<Arc<dyn Verifier>>, country_code: &str) -> Self {
        Self {
            verifier,
            country_code: country_code.to_string(),
        }
    }

    fn verifier(&self) -> Result<&dyn Verifier, AppError> {
        self.verifier.as_deref().ok_or_else(|| AppError::Provider {
            message: "Verification provider is not configured".to_string(),
            code: None,
        })
    }

    pub async fn send_code(&self, to: Option<&str>) -> Result<Value, AppError> {
        let to = required(to, "to")?;
        let phone = normalize_phone(to, &self.country_code);

        info!("Sending verification code to {phone}");

        self.verifier()?.send_code(&phone).await.map_err(|e| {
            warn!("Sending verification code failed: {e}");
            e.into()
        })
    }

    pub async fn check_code(&self, to: Option<&str>, code: Option<&str>) -> Result<Value, AppError> {
        let to = required(to, "to")?;
        let code = required(code, "code")?;
        let phone = normalize_phone(to, &self.country_code);

        self.verifier()?.check_code(&phone, code).await.map_err(|e| {
            warn!("Checking verification code failed: {e}");
            e.into()
        })
    }
}

fn required<'a>(value: Option<&'a str>, field: &'static str) -> Result<&'a str, AppError> {
    value
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .ok_or(AppError::MissingField(field))
}
