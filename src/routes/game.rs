use crate::config::GameConfig;
use crate::database::postgres_repository::PostgresRepository;
use crate::error::app_error::AppError;
use crate::error::json::JsonBody;
use crate::middleware::ClientInfo;
use crate::models::game::{DeviceQuery, FinishRequest, QuestionsResponse, StartRequest, StartResponse};
use crate::models::session::GameResult;
use crate::service::game::{GameService, StartInput, donor_phones};
use crate::service::pool_cache::PoolCache;
use crate::service::question_source::QuestionSource;
use rocket::serde::json::Json;
use rocket::{State, get, post};
use rocket_okapi::openapi;
use sqlx::PgPool;
use std::sync::Arc;

/// Start (or resume) the session for a device
///
/// Returns the advisory answering deadline, or the stored result when the
/// device has already played.
#[openapi(tag = "Game")]
#[post("/start", data = "<payload>")]
pub async fn start(
    pool: &State<PgPool>,
    config: &State<GameConfig>,
    client: ClientInfo,
    payload: JsonBody<StartRequest>,
) -> Result<Json<StartResponse>, AppError> {
    let input = StartInput {
        device_id: payload.device_id()?,
        ip: client.ip,
        user_agent: client.user_agent,
        checked_in: payload.checked_in(),
        link: payload.link(),
    };

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let response = GameService::new(&repo, config.inner()).start(input).await?;
    Ok(Json(response))
}

/// Draw the quiz for a started session
#[openapi(tag = "Game")]
#[get("/questions?<query..>")]
pub async fn get_questions(
    pool: &State<PgPool>,
    config: &State<GameConfig>,
    pools: &State<PoolCache>,
    query: DeviceQuery,
) -> Result<Json<QuestionsResponse>, AppError> {
    let device_id = query.device_id()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let response = GameService::new(&repo, config.inner()).questions(&device_id, pools.inner()).await?;
    Ok(Json(response))
}

/// Submit the score and receive the reward tier
#[openapi(tag = "Game")]
#[post("/finish", data = "<payload>")]
pub async fn finish(pool: &State<PgPool>, config: &State<GameConfig>, payload: JsonBody<FinishRequest>) -> Result<Json<GameResult>, AppError> {
    let device_id = payload.device_id()?;
    let score = payload.score()?;

    let repo = PostgresRepository { pool: pool.inner().clone() };
    let result = GameService::new(&repo, config.inner()).finish(&device_id, score, payload.link()).await?;
    Ok(Json(result))
}

/// Stored result for a device, `null` when it never started
#[openapi(tag = "Game")]
#[get("/result/<device_id>")]
pub async fn get_result(pool: &State<PgPool>, config: &State<GameConfig>, device_id: String) -> Result<Json<Option<GameResult>>, AppError> {
    let repo = PostgresRepository { pool: pool.inner().clone() };
    let result = GameService::new(&repo, config.inner()).result(&device_id).await?;
    Ok(Json(result))
}

/// Donor phone numbers
#[openapi(tag = "Donors")]
#[get("/donors")]
pub async fn list_donors(source: &State<Arc<dyn QuestionSource>>) -> Result<Json<Vec<String>>, AppError> {
    let phones = donor_phones(source.inner().as_ref()).await?;
    Ok(Json(phones))
}

pub fn routes() -> (Vec<rocket::Route>, okapi::openapi3::OpenApi) {
    rocket_okapi::openapi_get_routes_spec![start, get_questions, finish, get_result, list_donors]
}
