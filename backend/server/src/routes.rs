use std::sync::Arc;

use axum::{
    Json,
    extract::{self, rejection::JsonRejection},
    http::{
        StatusCode,
        header::{CONTENT_DISPOSITION, CONTENT_TYPE},
    },
    response::IntoResponse,
};
use tracing::warn;

use crate::{
    error::AppError,
    models::{CheckCodePayload, Outcome, Question, SendCodePayload, VotePayload},
    results::{render_csv, tally},
    state::State,
};

type Shared = extract::State<Arc<State>>;

fn payload<T>(body: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    body.map(|Json(payload)| payload).map_err(|e| {
        warn!("Rejected payload: {e}");
        AppError::MalformedPayload
    })
}

pub async fn questions_handler(extract::State(state): Shared) -> impl IntoResponse {
    Json(state.questions.all().await)
}

pub async fn add_question_handler(
    extract::State(state): Shared,
    body: Result<Json<Question>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    state.questions.add(payload(body)?).await?;

    Ok(Json(Outcome { success: true }))
}

pub async fn update_questions_handler(
    extract::State(state): Shared,
    body: Result<Json<Vec<Question>>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    state.questions.replace(payload(body)?).await?;

    Ok(Json(Outcome { success: true }))
}

pub async fn vote_handler(
    extract::State(state): Shared,
    body: Result<Json<VotePayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let vote = payload(body)?;

    let phone_number = vote
        .phone_number
        .ok_or(AppError::InvalidInput("phoneNumber is required"))?;
    let answers = vote
        .answers
        .ok_or(AppError::InvalidInput("answers are required"))?;

    let questions = state.questions.active().await;
    state
        .ballots
        .record_vote(&questions, &phone_number, &answers)
        .await?;

    Ok(Json(Outcome { success: true }))
}

pub async fn results_handler(extract::State(state): Shared) -> impl IntoResponse {
    let questions = state.questions.active().await;
    let records = state.ballots.ballots().await;

    Json(tally(&questions, &records))
}

pub async fn results_csv_handler(
    extract::State(state): Shared,
) -> Result<impl IntoResponse, AppError> {
    let records = state.ballots.ballots().await;
    let questions = state.questions.active().await.len();

    let csv = render_csv(&records, questions).map_err(|e| {
        warn!("Generating CSV failed: {e}");
        AppError::from(e)
    })?;

    Ok((
        StatusCode::OK,
        [
            (CONTENT_TYPE, "text/csv; charset=utf-8"),
            (
                CONTENT_DISPOSITION,
                "attachment; filename=\"voting-results.csv\"",
            ),
        ],
        csv,
    ))
}

pub async fn send_sms_handler(
    extract::State(state): Shared,
    body: Result<Json<SendCodePayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = payload(body)?;

    let verification = state.verification.send_code(request.to.as_deref()).await?;

    Ok(Json(verification))
}

pub async fn verify_sms_handler(
    extract::State(state): Shared,
    body: Result<Json<CheckCodePayload>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let request = payload(body)?;

    let check = state
        .verification
        .check_code(request.to.as_deref(), request.code.as_deref())
        .await?;

    Ok(Json(check))
}
