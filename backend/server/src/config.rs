use std::{env, fmt::Display, fs::read_to_string, str::FromStr};

use tracing::{info, warn};

pub struct Config {
    pub port: u16,
    pub allowed_origins: Vec<String>,
    pub country_code: String,
    pub spreadsheet_id: Option<String>,
    pub google_credentials: Option<String>,
    pub questions_sheet: String,
    pub votes_sheet: String,
    pub sheets_url: String,
    pub twilio_account_sid: Option<String>,
    pub twilio_auth_token: Option<String>,
    pub twilio_service_sid: Option<String>,
    pub verify_url: String,
}

impl Config {
    pub fn load() -> Self {
        Self {
            port: try_load("RUST_PORT", "3000"),
            allowed_origins: try_load::<String>("ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|origin| origin.trim().to_string())
                .filter(|origin| !origin.is_empty())
                .collect(),
            country_code: try_load("DEFAULT_COUNTRY_CODE", "972"),
            spreadsheet_id: read_secret("SPREADSHEET_ID"),
            google_credentials: read_secret("GOOGLE_CREDENTIALS"),
            questions_sheet: try_load("QUESTIONS_SHEET", "questions"),
            votes_sheet: try_load("VOTES_SHEET", "votes"),
            sheets_url: try_load("SHEETS_API_URL", "https://sheets.googleapis.com"),
            twilio_account_sid: read_secret("TWILIO_ACCOUNT_SID"),
            twilio_auth_token: read_secret("TWILIO_AUTH_TOKEN"),
            twilio_service_sid: read_secret("TWILIO_VERIFY_SERVICE_SID"),
            verify_url: try_load("VERIFY_API_URL", "https://verify.twilio.com"),
        }
    }
}

fn var(key: &str) -> Result<String, ()> {
    env::var(key).map_err(|_| {
        warn!("Environment variable {key} not found, using default");
    })
}

fn try_load<T: FromStr>(key: &str, default: &str) -> T
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|_| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e| {
            warn!("Invalid {key} value: {e}");
        })
        .expect("Environment misconfigured!")
}

/// Secrets come from the environment first, then from `/run/secrets/<name>`.
fn read_secret(secret_name: &str) -> Option<String> {
    if let Ok(value) = env::var(secret_name) {
        return Some(value.trim().to_string()).filter(|value| !value.is_empty());
    }

    let path = format!("/run/secrets/{secret_name}");

    read_to_string(&path)
        .map(|s| s.trim().to_string())
        .map_err(|e| {
            warn!("Failed to read {secret_name} from file: {e}");
        })
        .ok()
        .filter(|value| !value.is_empty())
}
