//! HTTP handlers
//!
//! Every `/api/*` handler runs behind the auth middleware and receives the
//! caller's identity as an [`Authenticated`] request extension. Business
//! rejections answer 200 with `success: false`, a message and the current
//! state so the client can reconcile without another round trip.

use crate::error::ApiError;
use crate::server::AppState;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use neon_auth::Authenticated;
use neon_core::{GameError, GoalId, ProducerId};
use neon_economics::{GameEngine, LeaderboardEntry, LeaderboardKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::sync::Arc;

type ApiResult = Result<Json<Value>, ApiError>;

/// Run synchronous engine or gateway work on the blocking pool
///
/// Engine calls hold player mutexes and write to the store, so they never run
/// on an async worker.
pub(crate) async fn blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(ApiError::internal)
}

/// Run `op` against the engine for the calling player
async fn with_engine<T, F>(state: &AppState, identity: &Authenticated, op: F) -> Result<T, ApiError>
where
    F: FnOnce(&GameEngine, &str) -> Result<T, GameError> + Send + 'static,
    T: Send + 'static,
{
    let engine: Arc<GameEngine> = state.engine.clone();
    let user_id = identity.user_id.clone();
    Ok(blocking(move || op(&engine, &user_id)).await??)
}

fn to_json<T: Serialize>(value: &T) -> ApiResult {
    Ok(Json(serde_json::to_value(value).map_err(ApiError::internal)?))
}

#[derive(Debug, Deserialize)]
pub struct BuyProducerRequest {
    pub producer_id: ProducerId,
}

#[derive(Debug, Deserialize)]
pub struct DonateRequest {
    pub goal_id: GoalId,
    pub percent: u32,
}

#[derive(Debug, Deserialize)]
pub struct GoalQuery {
    pub id: GoalId,
}

/// Serialize `body` and prepend the outcome fields
fn outcome<T: Serialize>(success: bool, message: Option<&str>, body: &T) -> ApiResult {
    let mut fields = Map::new();
    fields.insert("success".to_string(), Value::Bool(success));
    if let Some(message) = message {
        fields.insert("message".to_string(), Value::String(message.to_string()));
    }
    match serde_json::to_value(body).map_err(ApiError::internal)? {
        Value::Object(extra) => fields.extend(extra),
        other => {
            fields.insert("data".to_string(), other);
        }
    }
    Ok(Json(Value::Object(fields)))
}

fn board(entries: Vec<LeaderboardEntry>, value_field: &str) -> Json<Value> {
    let rows: Vec<Value> = entries
        .into_iter()
        .map(|entry| {
            let mut row = Map::new();
            row.insert("user_id".to_string(), Value::String(entry.user_id));
            row.insert(value_field.to_string(), Value::from(entry.value));
            row.insert("is_self".to_string(), Value::Bool(entry.is_self));
            Value::Object(row)
        })
        .collect();
    Json(Value::Array(rows))
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn metrics(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    state.metrics.players.set(state.engine.player_count() as i64);
    let body = state.metrics.render().map_err(ApiError::internal)?;
    Ok((
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        body,
    ))
}

pub async fn get_state(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    let player = with_engine(&state, &identity, |engine, user| engine.state(user)).await?;
    Ok(Json(json!({ "score": player.score })))
}

pub async fn user_upgrades(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    let info = with_engine(&state, &identity, |engine, user| engine.power_info(user)).await?;
    to_json(&info)
}

pub async fn producers(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    let views = with_engine(&state, &identity, |engine, user| engine.producers(user)).await?;
    to_json(&views)
}

pub async fn production(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    let rate = with_engine(&state, &identity, |engine, user| engine.production(user)).await?;
    Ok(Json(json!({ "production": rate })))
}

pub async fn click(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    let outcome = with_engine(&state, &identity, |engine, user| engine.click(user)).await?;
    state.metrics.clicks_total.inc();
    to_json(&outcome)
}

pub async fn upgrade_power(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    let attempt = with_engine(&state, &identity, |engine, user| {
        match engine.upgrade_power(user) {
            Ok(info) => Ok(Ok(info)),
            Err(err) if err.is_rejection() => {
                let info = engine.power_info(user)?;
                Ok(Err((err, info)))
            }
            Err(err) => Err(err),
        }
    })
    .await?;

    match attempt {
        Ok(info) => {
            state
                .metrics
                .purchases_total
                .with_label_values(&["click_power"])
                .inc();
            outcome(true, None, &info)
        }
        Err((err, info)) => outcome(false, Some(err.client_message()), &info),
    }
}

pub async fn buy_producer(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
    body: Result<Json<BuyProducerRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let producer_id = request.producer_id;

    let attempt = with_engine(&state, &identity, move |engine, user| {
        match engine.buy_producer(user, producer_id) {
            Ok(purchase) => Ok(Ok(purchase)),
            Err(err) if err.is_rejection() => {
                let producers = engine.producers(user)?;
                let score = engine.state(user)?.score;
                Ok(Err((err, producers, score)))
            }
            Err(err) => Err(err),
        }
    })
    .await?;

    match attempt {
        Ok(purchase) => {
            state
                .metrics
                .purchases_total
                .with_label_values(&["producer"])
                .inc();
            outcome(true, None, &purchase)
        }
        Err((err, producers, score)) => {
            let mut body = json!({ "producers": producers, "score": score });
            if let GameError::BuildInProgress { time_left } = err {
                body["build_time_left"] = Value::from(time_left);
            }
            outcome(false, Some(err.client_message()), &body)
        }
    }
}

async fn ranked(
    state: &AppState,
    identity: &Authenticated,
    kind: LeaderboardKind,
    value_field: &'static str,
) -> ApiResult {
    let entries = with_engine(state, identity, move |engine, user| {
        Ok(engine.leaderboard(kind, user))
    })
    .await?;
    Ok(board(entries, value_field))
}

pub async fn leaderboard(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    ranked(&state, &identity, LeaderboardKind::Richest, "score").await
}

pub async fn per_second_leaderboard(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    ranked(&state, &identity, LeaderboardKind::PerSecond, "production_rate").await
}

pub async fn clicks_leaderboard(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
) -> ApiResult {
    ranked(&state, &identity, LeaderboardKind::Clicks, "clicks").await
}

pub async fn donation_goals(State(state): State<AppState>) -> ApiResult {
    let engine = state.engine.clone();
    let goals = blocking(move || engine.goals()).await?;
    to_json(&goals)
}

pub async fn donation_goal(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
    query: Result<Query<GoalQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let detail = with_engine(&state, &identity, move |engine, user| {
        engine.goal_detail(user, query.id)
    })
    .await?;
    to_json(&detail)
}

pub async fn donate(
    State(state): State<AppState>,
    Extension(identity): Extension<Authenticated>,
    body: Result<Json<DonateRequest>, JsonRejection>,
) -> ApiResult {
    let Json(request) = body.map_err(|e| ApiError::bad_request(e.body_text()))?;

    let attempt = with_engine(&state, &identity, move |engine, user| {
        match engine.donate(user, request.goal_id, request.percent) {
            Ok(receipt) => Ok(Ok(receipt)),
            Err(err) if err.is_rejection() => {
                let score = engine.state(user)?.score;
                Ok(Err((err, score)))
            }
            Err(err) => Err(err),
        }
    })
    .await?;

    match attempt {
        Ok(receipt) => {
            state.metrics.donations_total.inc();
            Ok(Json(json!({
                "success": true,
                "score": receipt.score,
                "goal": receipt.goal,
            })))
        }
        Err((err, score)) => outcome(false, Some(err.client_message()), &json!({ "score": score })),
    }
}
