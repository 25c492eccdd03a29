use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use bytes::Bytes;
use serde::Serialize;
use serde_json::Value;

use crate::db::scores::{rank_scores, Ranking, Score};
use crate::error::{AppError, FailureContext, Result};
use crate::state::AppState;

const TOP_SCORES: i64 = 5;

#[derive(Debug, PartialEq)]
pub(crate) struct NewScore {
    pub(crate) player: String,
    pub(crate) points: i64,
}

#[derive(Serialize)]
pub(crate) struct ScoreSaved {
    message: &'static str,
    score: Score,
}

#[derive(Serialize)]
pub(crate) struct Rankings {
    rankings: Vec<Ranking>,
}

/// A JSON object with a non blank string `player` and a positive integer
/// `points`. Anything else is rejected as a whole.
pub(crate) fn parse_submission(body: &[u8]) -> Option<NewScore> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let obj = value.as_object()?;
    let player = obj.get("player")?.as_str()?.trim();
    if player.is_empty() {
        return None;
    }
    let points = obj.get("points")?.as_i64().filter(|p| *p > 0)?;
    Some(NewScore {
        player: player.to_owned(),
        points,
    })
}

#[tracing::instrument(skip(state, body), level = "debug")]
pub(crate) async fn submit_score(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<(StatusCode, Json<ScoreSaved>)> {
    let new_score = parse_submission(&body)
        .ok_or_else(|| AppError::invalid("Invalid player name or points"))?;

    let score = state
        .db
        .create_score(&new_score.player, new_score.points)
        .await
        .or_fail("Failed to save score")?;

    Ok((
        StatusCode::CREATED,
        Json(ScoreSaved {
            message: "Score saved successfully",
            score,
        }),
    ))
}

#[tracing::instrument(skip(state), level = "debug")]
pub(crate) async fn get_rankings(State(state): State<AppState>) -> Result<Json<Rankings>> {
    let scores = state
        .db
        .top_scores(TOP_SCORES)
        .await
        .or_fail("Failed to fetch rankings")?;
    Ok(Json(Rankings {
        rankings: rank_scores(scores),
    }))
}
