//! Final award computation and points settlement.
//!
//! Finalize is the terminal transition: it ranks the full field, resolves
//! awards by leaderboard position, credits loyalty points per award, and
//! writes the tournament to `completed`. There is no un-finalize.

use crate::{
    club::PointsLedger,
    db::models::{AwardDef, AwardResult, ScoreCard, Tournament, TournamentStatus},
    error::{AppError, Result},
};
use chrono::Utc;
use sqlx::types::Json;
use std::sync::Arc;

use super::{
    context::TournamentContext,
    leaderboard::{compute_leaderboard, Leaderboard, SortMetric},
    lifecycle::LifecycleEvent,
};

/// Default points for the implicit podium awards; a tournament overrides
/// or extends these through its custom award definitions.
const CHAMPION_POINTS: i64 = 100;
const RUNNER_UP_POINTS: i64 = 50;
const THIRD_PLACE_POINTS: i64 = 30;

const LEADERBOARD_SNAPSHOT_SIZE: usize = 20;

pub(crate) struct AwardsService {
    ctx: Arc<TournamentContext>,
    ledger: Arc<PointsLedger>,
}

impl AwardsService {
    pub(crate) fn new(ctx: Arc<TournamentContext>, ledger: Arc<PointsLedger>) -> Self {
        Self { ctx, ledger }
    }

    pub(crate) async fn finalize(
        &self,
        tournament_id: &str,
    ) -> Result<(Tournament, Vec<AwardResult>, Option<LifecycleEvent>)> {
        let lock = self.ctx.lock_for(tournament_id).await;
        let _guard = lock.lock().await;

        let mut tournament = self.ctx.load_tournament(tournament_id).await?;

        if !matches!(
            tournament.status,
            TournamentStatus::Scoring | TournamentStatus::InProgress
        ) {
            return Err(AppError::InvalidTransition {
                from: tournament.status.as_str().to_string(),
                to: TournamentStatus::Completed.as_str().to_string(),
            });
        }

        // Final ranking uses every round; no round filter
        let cards: Vec<ScoreCard> = sqlx::query_as(
            "SELECT * FROM tournament_scores WHERE tournament_id = ? ORDER BY round, created_at",
        )
        .bind(tournament_id)
        .fetch_all(&*self.ctx.pool)
        .await?;

        let board = compute_leaderboard(&tournament, &cards, None);
        let award_results = resolve_awards(&tournament, &board);

        // Per-award best-effort: one failed credit neither blocks the
        // remaining awards nor the finalize itself.
        for award in award_results.iter().filter(|a| a.points > 0) {
            let Some(player_id) = &award.player_id else {
                continue;
            };

            if let Err(err) = self
                .ledger
                .credit(
                    &tournament.club_id,
                    player_id,
                    award.points,
                    "tournament",
                    tournament_id,
                    Some(award.award_title.clone()),
                )
                .await
            {
                tracing::warn!(
                    "Points credit failed for award '{}' in tournament {}: {}",
                    award.award_title,
                    tournament_id,
                    err
                );
            }
        }

        let snapshot: Vec<_> = board
            .entries
            .iter()
            .take(LEADERBOARD_SNAPSHOT_SIZE)
            .collect();
        let snapshot_value = serde_json::to_value(&snapshot)?;

        tournament.status = TournamentStatus::Completed;
        tournament.results_published = true;
        tournament.leaderboard_snapshot = Some(Json(snapshot_value));
        tournament.award_results = Some(Json(award_results.clone()));
        tournament.updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE tournaments SET
                status = ?, results_published = ?, leaderboard_snapshot = ?,
                award_results = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(tournament.status)
        .bind(tournament.results_published)
        .bind(&tournament.leaderboard_snapshot)
        .bind(&tournament.award_results)
        .bind(&tournament.updated_at)
        .bind(tournament_id)
        .execute(&*self.ctx.pool)
        .await?;

        tracing::info!(
            "Finalized tournament {}: {} awards, {} ranked players",
            tournament_id,
            award_results.len(),
            board.entries.len()
        );

        let recipients = self.ctx.confirmed_player_ids(tournament_id).await?;
        let event = Some(LifecycleEvent {
            event_type: "tournament_completed",
            tournament: tournament.clone(),
            recipient_player_ids: recipients,
        });

        Ok((tournament, award_results, event))
    }
}

/// Implicit podium awards followed by the tournament's custom definitions,
/// each resolved to the player at its 1-based leaderboard position. A
/// position beyond the ranked field is silently skipped.
fn resolve_awards(tournament: &Tournament, board: &Leaderboard) -> Vec<AwardResult> {
    let mut defs = vec![
        AwardDef {
            title: "Champion".to_string(),
            position: 1,
            points: CHAMPION_POINTS,
        },
        AwardDef {
            title: "Runner-up".to_string(),
            position: 2,
            points: RUNNER_UP_POINTS,
        },
        AwardDef {
            title: "Third Place".to_string(),
            position: 3,
            points: THIRD_PLACE_POINTS,
        },
    ];
    defs.extend(tournament.awards.0.iter().cloned());

    defs.into_iter()
        .filter_map(|def| {
            if def.position < 1 {
                return None;
            }
            let entry = board.entries.get(def.position as usize - 1)?;

            let score = match board.sort_by {
                SortMetric::Stableford => entry.total_stableford as i64,
                SortMetric::Gross => entry.total_gross as i64,
                SortMetric::Net => entry.total_net as i64,
            };

            Some(AwardResult {
                award_title: def.title,
                position: def.position,
                player_id: entry.player_id.clone(),
                player_name: entry.player_name.clone(),
                score,
                points: def.points,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::models::TournamentFormat;
    use crate::tournament::leaderboard::compute_leaderboard;
    use sqlx::types::Json as SqlxJson;
    use uuid::Uuid;

    fn tournament_with_awards(custom: Vec<AwardDef>) -> Tournament {
        let mut t = Tournament::new(
            "club".to_string(),
            "20260801-001".to_string(),
            "Club Championship".to_string(),
            TournamentFormat::Stroke,
            "2026-09-01".to_string(),
            "2026-09-01".to_string(),
            18,
            32,
        );
        t.awards.0 = custom;
        t
    }

    fn card(name: &str, net: i32) -> ScoreCard {
        let now = chrono::Utc::now().to_rfc3339();
        ScoreCard {
            id: Uuid::new_v4().to_string(),
            tournament_id: "t".to_string(),
            round: 1,
            reg_id: None,
            player_id: Some(name.to_lowercase()),
            player_name: Some(name.to_string()),
            handicap: 0.0,
            gross_score: Some(net),
            net_score: Some(net),
            hole_scores: SqlxJson(Vec::new()),
            hole_pars: SqlxJson(Vec::new()),
            stableford_points: None,
            attested_by: None,
            attested_by_name: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn podium_awards_resolve_by_position() {
        let t = tournament_with_awards(Vec::new());
        let cards = vec![card("Alice", 70), card("Bob", 72), card("Carol", 75)];
        let board = compute_leaderboard(&t, &cards, None);

        let awards = resolve_awards(&t, &board);
        assert_eq!(awards.len(), 3);
        assert_eq!(awards[0].award_title, "Champion");
        assert_eq!(awards[0].player_name, "Alice");
        assert_eq!(awards[0].points, 100);
        assert_eq!(awards[2].player_name, "Carol");
    }

    #[test]
    fn positions_beyond_field_are_skipped() {
        let t = tournament_with_awards(vec![AwardDef {
            title: "Best of the Rest".to_string(),
            position: 10,
            points: 5,
        }]);
        let cards = vec![card("Alice", 70), card("Bob", 72)];
        let board = compute_leaderboard(&t, &cards, None);

        let awards = resolve_awards(&t, &board);
        // champion + runner-up only; third place and the custom award have
        // no player at their positions
        assert_eq!(awards.len(), 2);
    }

    #[test]
    fn custom_awards_follow_podium() {
        let t = tournament_with_awards(vec![AwardDef {
            title: "Longest Drive Pool".to_string(),
            position: 1,
            points: 10,
        }]);
        let cards = vec![card("Alice", 70), card("Bob", 72), card("Carol", 75)];
        let board = compute_leaderboard(&t, &cards, None);

        let awards = resolve_awards(&t, &board);
        assert_eq!(awards.len(), 4);
        assert_eq!(awards[3].award_title, "Longest Drive Pool");
        assert_eq!(awards[3].player_name, "Alice");
    }
}
