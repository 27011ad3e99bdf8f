use crate::{
    db::models::{ScoreCard, TournamentFormat, TournamentStatus},
    error::{AppError, Result},
};
use chrono::Utc;
use sqlx::types::Json;
use std::sync::Arc;
use uuid::Uuid;

use super::context::TournamentContext;

/// Net score from gross and handicap allowance. The allowance factor is
/// halved for a 9-hole round. No gross, or a non-positive one, yields no
/// net score.
pub fn net_score(gross_score: Option<i32>, handicap: f64, num_holes: usize) -> Option<i32> {
    let gross = gross_score?;
    if gross <= 0 {
        return None;
    }
    let factor = if num_holes == 9 { 0.5 } else { 1.0 };
    Some((gross as f64 - handicap * factor).round() as i32)
}

/// Stableford points over the round.
///
/// Handicap strokes are spread by simple even allocation: every hole gets
/// `handicap / numHoles` strokes and the first `handicap % numHoles` holes
/// (by array position) one extra. This intentionally ignores stroke-index
/// difficulty ranking, matching the product's observed behavior. Holes
/// missing a gross score or par are skipped, not scored as zero.
pub fn stableford_points(
    hole_scores: &[Option<i32>],
    hole_pars: &[Option<i32>],
    handicap: f64,
) -> Option<i32> {
    let num_holes = hole_scores.len();
    if num_holes == 0 {
        return None;
    }

    let allowance = (handicap.max(0.0)) as i32;
    let strokes_per_hole = allowance / num_holes as i32;
    let extra = allowance % num_holes as i32;

    let mut total = 0;
    let mut scored_any = false;

    for (i, hole_score) in hole_scores.iter().enumerate() {
        let (Some(gross), Some(par)) = (hole_score, hole_pars.get(i).copied().flatten()) else {
            continue;
        };
        if *gross <= 0 || par <= 0 {
            continue;
        }

        let allocated = strokes_per_hole + if (i as i32) < extra { 1 } else { 0 };
        let net = gross - allocated;
        total += points_for_diff(par - net);
        scored_any = true;
    }

    if scored_any {
        Some(total)
    } else {
        None
    }
}

/// Points awarded per hole by `par - netHoleScore`.
fn points_for_diff(diff: i32) -> i32 {
    match diff {
        d if d >= 4 => 6,
        3 => 5,
        2 => 4,
        1 => 3,
        0 => 2,
        -1 => 1,
        _ => 0,
    }
}

/// One scorecard submission. Keyed by (tournament, round, player); a
/// re-submission for the same key overwrites in place.
#[derive(Debug, Clone)]
pub struct ScoreEntry {
    pub round: i32,
    pub reg_id: Option<String>,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    pub handicap: f64,
    pub gross_score: Option<i32>,
    pub hole_scores: Vec<Option<i32>>,
    pub hole_pars: Vec<Option<i32>>,
    pub attested_by: Option<String>,
    pub attested_by_name: Option<String>,
}

/// Per-item failure from a best-effort batch.
#[derive(Debug)]
pub struct BatchError {
    pub index: usize,
    pub error: AppError,
}

pub(crate) struct ScoringService {
    ctx: Arc<TournamentContext>,
}

impl ScoringService {
    pub(crate) fn new(ctx: Arc<TournamentContext>) -> Self {
        Self { ctx }
    }

    /// Record (or overwrite) one scorecard. Last write wins for the whole
    /// card; there is no merge and no history.
    pub(crate) async fn record(&self, tournament_id: &str, entry: ScoreEntry) -> Result<ScoreCard> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;

        if !matches!(
            tournament.status,
            TournamentStatus::InProgress | TournamentStatus::Scoring
        ) {
            return Err(AppError::BadRequest(
                "Tournament is not accepting scores".to_string(),
            ));
        }

        if entry.round < 1 || entry.round > tournament.round_count() {
            return Err(AppError::Validation(format!(
                "round must be between 1 and {}",
                tournament.round_count()
            )));
        }
        if entry.reg_id.is_none() && entry.player_id.is_none() && entry.player_name.is_none() {
            return Err(AppError::Validation(
                "One of regId, playerId or playerName is required".to_string(),
            ));
        }

        let handicap = if tournament.handicap_allowed {
            entry.handicap
        } else {
            0.0
        };

        let num_holes = if entry.hole_scores.is_empty() {
            18
        } else {
            entry.hole_scores.len()
        };
        let net = net_score(entry.gross_score, handicap, num_holes);

        let stableford = if tournament.format == TournamentFormat::Stableford {
            stableford_points(&entry.hole_scores, &entry.hole_pars, handicap)
        } else {
            None
        };

        let now = Utc::now().to_rfc3339();
        let existing = self.find_existing(tournament_id, &entry).await?;

        let card = match existing {
            Some(mut card) => {
                card.reg_id = entry.reg_id;
                card.player_id = entry.player_id;
                card.player_name = entry.player_name;
                card.handicap = handicap;
                card.gross_score = entry.gross_score;
                card.net_score = net;
                card.hole_scores = Json(entry.hole_scores);
                card.hole_pars = Json(entry.hole_pars);
                card.stableford_points = stableford;
                card.attested_by = entry.attested_by;
                card.attested_by_name = entry.attested_by_name;
                card.updated_at = now;

                sqlx::query(
                    "UPDATE tournament_scores SET
                        reg_id = ?, player_id = ?, player_name = ?, handicap = ?,
                        gross_score = ?, net_score = ?, hole_scores = ?, hole_pars = ?,
                        stableford_points = ?, attested_by = ?, attested_by_name = ?,
                        updated_at = ?
                     WHERE id = ?",
                )
                .bind(&card.reg_id)
                .bind(&card.player_id)
                .bind(&card.player_name)
                .bind(card.handicap)
                .bind(card.gross_score)
                .bind(card.net_score)
                .bind(&card.hole_scores)
                .bind(&card.hole_pars)
                .bind(card.stableford_points)
                .bind(&card.attested_by)
                .bind(&card.attested_by_name)
                .bind(&card.updated_at)
                .bind(&card.id)
                .execute(&*self.ctx.pool)
                .await?;

                card
            }
            None => {
                let card = ScoreCard {
                    id: Uuid::new_v4().to_string(),
                    tournament_id: tournament_id.to_string(),
                    round: entry.round,
                    reg_id: entry.reg_id,
                    player_id: entry.player_id,
                    player_name: entry.player_name,
                    handicap,
                    gross_score: entry.gross_score,
                    net_score: net,
                    hole_scores: Json(entry.hole_scores),
                    hole_pars: Json(entry.hole_pars),
                    stableford_points: stableford,
                    attested_by: entry.attested_by,
                    attested_by_name: entry.attested_by_name,
                    created_at: now.clone(),
                    updated_at: now,
                };

                sqlx::query(
                    "INSERT INTO tournament_scores (
                        id, tournament_id, round, reg_id, player_id, player_name,
                        handicap, gross_score, net_score, hole_scores, hole_pars,
                        stableford_points, attested_by, attested_by_name,
                        created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                )
                .bind(&card.id)
                .bind(&card.tournament_id)
                .bind(card.round)
                .bind(&card.reg_id)
                .bind(&card.player_id)
                .bind(&card.player_name)
                .bind(card.handicap)
                .bind(card.gross_score)
                .bind(card.net_score)
                .bind(&card.hole_scores)
                .bind(&card.hole_pars)
                .bind(card.stableford_points)
                .bind(&card.attested_by)
                .bind(&card.attested_by_name)
                .bind(&card.created_at)
                .bind(&card.updated_at)
                .execute(&*self.ctx.pool)
                .await?;

                card
            }
        };

        Ok(card)
    }

    /// Best-effort batch: each record is applied independently and a
    /// failure on one never aborts the rest.
    pub(crate) async fn record_batch(
        &self,
        tournament_id: &str,
        entries: Vec<ScoreEntry>,
    ) -> (Vec<ScoreCard>, Vec<BatchError>) {
        let mut recorded = Vec::new();
        let mut errors = Vec::new();

        for (index, entry) in entries.into_iter().enumerate() {
            match self.record(tournament_id, entry).await {
                Ok(card) => recorded.push(card),
                Err(error) => {
                    tracing::warn!(
                        "Batch score record {} failed for tournament {}: {}",
                        index,
                        tournament_id,
                        error
                    );
                    errors.push(BatchError { index, error });
                }
            }
        }

        (recorded, errors)
    }

    pub(crate) async fn list(
        &self,
        tournament_id: &str,
        round: Option<i32>,
    ) -> Result<Vec<ScoreCard>> {
        self.ctx.load_tournament(tournament_id).await?;

        let cards: Vec<ScoreCard> = match round {
            Some(round) => {
                sqlx::query_as(
                    "SELECT * FROM tournament_scores
                     WHERE tournament_id = ? AND round = ?
                     ORDER BY round, created_at",
                )
                .bind(tournament_id)
                .bind(round)
                .fetch_all(&*self.ctx.pool)
                .await?
            }
            None => {
                sqlx::query_as(
                    "SELECT * FROM tournament_scores
                     WHERE tournament_id = ?
                     ORDER BY round, created_at",
                )
                .bind(tournament_id)
                .fetch_all(&*self.ctx.pool)
                .await?
            }
        };

        Ok(cards)
    }

    /// Locate the card for this (round, player) key. The key is the first
    /// identifier present: registration id, then player id, then name.
    async fn find_existing(
        &self,
        tournament_id: &str,
        entry: &ScoreEntry,
    ) -> Result<Option<ScoreCard>> {
        let card = if let Some(reg_id) = &entry.reg_id {
            sqlx::query_as(
                "SELECT * FROM tournament_scores
                 WHERE tournament_id = ? AND round = ? AND reg_id = ?",
            )
            .bind(tournament_id)
            .bind(entry.round)
            .bind(reg_id)
            .fetch_optional(&*self.ctx.pool)
            .await?
        } else if let Some(player_id) = &entry.player_id {
            sqlx::query_as(
                "SELECT * FROM tournament_scores
                 WHERE tournament_id = ? AND round = ? AND player_id = ?",
            )
            .bind(tournament_id)
            .bind(entry.round)
            .bind(player_id)
            .fetch_optional(&*self.ctx.pool)
            .await?
        } else if let Some(player_name) = &entry.player_name {
            sqlx::query_as(
                "SELECT * FROM tournament_scores
                 WHERE tournament_id = ? AND round = ? AND player_name = ?",
            )
            .bind(tournament_id)
            .bind(entry.round)
            .bind(player_name)
            .fetch_optional(&*self.ctx.pool)
            .await?
        } else {
            None
        };

        Ok(card)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn net_score_applies_full_allowance_for_18_holes() {
        assert_eq!(net_score(Some(85), 12.0, 18), Some(73));
        assert_eq!(net_score(Some(85), 0.0, 18), Some(85));
    }

    #[test]
    fn net_score_halves_allowance_for_9_holes() {
        // 42 - 10 * 0.5 = 37
        assert_eq!(net_score(Some(42), 10.0, 9), Some(37));
        // rounding: 40 - 9 * 0.5 = 35.5 -> 36
        assert_eq!(net_score(Some(40), 9.0, 9), Some(36));
    }

    #[test]
    fn net_score_null_when_gross_missing_or_nonpositive() {
        assert_eq!(net_score(None, 10.0, 18), None);
        assert_eq!(net_score(Some(0), 10.0, 18), None);
        assert_eq!(net_score(Some(-3), 10.0, 18), None);
    }

    #[test]
    fn stableford_even_allocation_scenario() {
        // pars [4,4], scores [4,5], handicap 2, 2 holes:
        // strokesPerHole = 1, extra = 0 -> allocated [1,1]
        // net [3,4], diffs [1,0], points [3,2] -> 5
        let scores = vec![Some(4), Some(5)];
        let pars = vec![Some(4), Some(4)];
        assert_eq!(stableford_points(&scores, &pars, 2.0), Some(5));
    }

    #[test]
    fn stableford_extra_strokes_go_to_first_holes() {
        // handicap 3 over 2 holes: base 1 each, first hole gets the extra
        let scores = vec![Some(5), Some(5)];
        let pars = vec![Some(4), Some(4)];
        // allocated [2,1] -> net [3,4] -> diffs [1,0] -> 3 + 2
        assert_eq!(stableford_points(&scores, &pars, 3.0), Some(5));
    }

    #[test]
    fn stableford_skips_holes_without_data() {
        let scores = vec![Some(4), None, Some(3)];
        let pars = vec![Some(4), Some(4), None];
        // only hole 0 scores: allocated 0, diff 0 -> 2 points
        assert_eq!(stableford_points(&scores, &pars, 0.0), Some(2));
    }

    #[test]
    fn stableford_none_without_any_scored_hole() {
        assert_eq!(stableford_points(&[], &[], 5.0), None);
        assert_eq!(stableford_points(&[None, None], &[None, None], 5.0), None);
    }

    #[test]
    fn points_ladder_matches_scoring_table() {
        assert_eq!(points_for_diff(5), 6);
        assert_eq!(points_for_diff(4), 6);
        assert_eq!(points_for_diff(3), 5);
        assert_eq!(points_for_diff(2), 4);
        assert_eq!(points_for_diff(1), 3);
        assert_eq!(points_for_diff(0), 2);
        assert_eq!(points_for_diff(-1), 1);
        assert_eq!(points_for_diff(-2), 0);
        assert_eq!(points_for_diff(-5), 0);
    }
}
