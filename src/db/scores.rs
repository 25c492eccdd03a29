use serde::Serialize;
use time::OffsetDateTime;

use super::DBService;
use crate::error::{DBErrorContext, Result};

#[derive(sqlx::FromRow, Serialize, Debug, Clone)]
pub struct Score {
    pub id: i64,
    pub player: String,
    pub points: i64,
    #[serde(rename = "createAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

#[derive(Serialize, Debug, PartialEq)]
pub struct Ranking {
    pub rank: usize,
    pub player: String,
    pub points: i64,
    #[serde(rename = "createAt", with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

/// Number the scores from 1, in the order given.
pub fn rank_scores(scores: Vec<Score>) -> Vec<Ranking> {
    scores
        .into_iter()
        .enumerate()
        .map(|(idx, score)| Ranking {
            rank: idx + 1,
            player: score.player,
            points: score.points,
            created_at: score.created_at,
        })
        .collect()
}

impl DBService {
    pub async fn create_score(&self, player: &str, points: i64) -> Result<Score> {
        let now = OffsetDateTime::now_utc();
        let score = sqlx::query_as::<_, Score>(
            "INSERT INTO score
            (player, points, created_at)
            VALUES (?,?,?)
            RETURNING *",
        )
        .bind(player)
        .bind(points)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .with_context(|| format!("Cannot save score for {player}"))?;

        tracing::info!(
            "Score {} saved for {} with {} points",
            score.id,
            score.player,
            score.points
        );
        Ok(score)
    }

    /// Highest points first, earlier submissions first among equals.
    pub async fn top_scores(&self, limit: i64) -> Result<Vec<Score>> {
        sqlx::query_as::<_, Score>(
            "SELECT * FROM score
            ORDER BY points DESC, id ASC
            LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .with_context(|| "Cannot fetch top scores")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn score(id: i64, player: &str, points: i64) -> Score {
        Score {
            id,
            player: player.to_string(),
            points,
            created_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn ranks_start_at_one() {
        let rankings = rank_scores(vec![score(3, "Grace", 16384), score(1, "Eve", 8192)]);
        assert_eq!(rankings.len(), 2);
        assert_eq!(rankings[0].rank, 1);
        assert_eq!(rankings[0].player, "Grace");
        assert_eq!(rankings[1].rank, 2);
        assert_eq!(rankings[1].points, 8192);
    }

    #[tokio::test]
    async fn ties_keep_submission_order() {
        let db = DBService::in_memory().await.unwrap();
        db.migrate().await.unwrap();
        db.create_score("first", 512).await.unwrap();
        db.create_score("second", 512).await.unwrap();
        db.create_score("best", 2048).await.unwrap();

        let top = db.top_scores(5).await.unwrap();
        let players: Vec<_> = top.iter().map(|s| s.player.as_str()).collect();
        assert_eq!(players, ["best", "first", "second"]);
    }
}
