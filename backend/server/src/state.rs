use std::sync::Arc;

use tracing::{info, warn};

use super::{
    config::Config,
    database::Storage,
    questions::QuestionStore,
    sheets::Sheets,
    verification::{Twilio, VerificationGateway, Verifier},
    votes::BallotLedger,
};

pub struct State {
    pub config: Config,
    pub questions: QuestionStore,
    pub ballots: BallotLedger,
    pub verification: VerificationGateway,
}

impl State {
    pub async fn new() -> Arc<Self> {
        let config = Config::load();

        let storage = init_storage(&config);
        let verifier = init_verifier(&config);

        Self::from_parts(config, storage, verifier).await
    }

    pub async fn from_parts(
        config: Config,
        storage: Option<Arc<dyn Storage>>,
        verifier: Option<Arc<dyn Verifier>>,
    ) -> Arc<Self> {
        let questions = QuestionStore::load(storage.clone()).await;
        let ballots = BallotLedger::new(storage);
        let verification = VerificationGateway::new(verifier, &config.country_code);

        Arc::new(Self {
            config,
            questions,
            ballots,
            verification,
        })
    }
}

fn init_storage(config: &Config) -> Option<Arc<dyn Storage>> {
    let (Some(spreadsheet_id), Some(credentials)) =
        (&config.spreadsheet_id, &config.google_credentials)
    else {
        info!("Spreadsheet not configured, votes are kept in memory only");
        return None;
    };

    match Sheets::new(
        &config.sheets_url,
        spreadsheet_id,
        credentials,
        &config.questions_sheet,
        &config.votes_sheet,
    ) {
        Ok(sheets) => Some(Arc::new(sheets)),
        Err(e) => {
            warn!("Spreadsheet disabled: {e}");
            None
        }
    }
}

fn init_verifier(config: &Config) -> Option<Arc<dyn Verifier>> {
    match (
        &config.twilio_account_sid,
        &config.twilio_auth_token,
        &config.twilio_service_sid,
    ) {
        (Some(account_sid), Some(auth_token), Some(service_sid)) => Some(Arc::new(Twilio::new(
            &config.verify_url,
            account_sid,
            auth_token,
            service_sid,
        ))),
        _ => {
            warn!("Twilio not configured, phone verification is unavailable");
            None
        }
    }
}
