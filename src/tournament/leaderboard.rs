use crate::{
    db::models::{ScoreCard, Tournament, TournamentFormat, TournamentStatus},
    error::Result,
};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use super::context::TournamentContext;

/// Identity a scorecard is aggregated under. Built once at ingestion from
/// the first identifier present (registration id, player id, then name),
/// not re-derived at aggregation time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PlayerKey {
    Reg(String),
    Player(String),
    Name(String),
}

impl PlayerKey {
    pub fn from_card(card: &ScoreCard) -> Option<Self> {
        if let Some(reg_id) = &card.reg_id {
            Some(PlayerKey::Reg(reg_id.clone()))
        } else if let Some(player_id) = &card.player_id {
            Some(PlayerKey::Player(player_id.clone()))
        } else {
            card.player_name.as_ref().map(|n| PlayerKey::Name(n.clone()))
        }
    }
}

/// Which accumulated total orders the board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SortMetric {
    /// Ascending total net (default)
    Net,
    /// Ascending total gross
    Gross,
    /// Descending total Stableford points
    Stableford,
}

impl SortMetric {
    /// Stableford format always ranks by points; otherwise the caller's
    /// choice, defaulting to net.
    pub fn resolve(sort_by: Option<&str>, format: TournamentFormat) -> Self {
        if sort_by == Some("stableford") || format == TournamentFormat::Stableford {
            SortMetric::Stableford
        } else if sort_by == Some("gross") {
            SortMetric::Gross
        } else {
            SortMetric::Net
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RoundDetail {
    pub round: i32,
    pub gross_score: Option<i32>,
    pub net_score: Option<i32>,
    pub stableford_points: Option<i32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: i32,
    pub rank_display: String,
    pub reg_id: Option<String>,
    pub player_id: Option<String>,
    pub player_name: String,
    pub total_gross: i32,
    pub total_net: i32,
    pub total_stableford: i32,
    pub rounds: Vec<RoundDetail>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Leaderboard {
    pub tournament_id: String,
    pub format: TournamentFormat,
    pub status: TournamentStatus,
    pub sort_by: SortMetric,
    pub entries: Vec<LeaderboardEntry>,
}

struct Accumulator {
    reg_id: Option<String>,
    player_id: Option<String>,
    player_name: String,
    total_gross: i32,
    total_net: i32,
    total_stableford: i32,
    rounds: Vec<RoundDetail>,
}

/// Aggregate scorecards into a ranked board. Pure; storage access happens
/// in the service below.
pub fn compute_leaderboard(
    tournament: &Tournament,
    cards: &[ScoreCard],
    sort_by: Option<&str>,
) -> Leaderboard {
    let metric = SortMetric::resolve(sort_by, tournament.format);

    let mut order: Vec<PlayerKey> = Vec::new();
    let mut by_key: HashMap<PlayerKey, Accumulator> = HashMap::new();

    for card in cards {
        let Some(key) = PlayerKey::from_card(card) else {
            continue;
        };

        let acc = by_key.entry(key.clone()).or_insert_with(|| {
            order.push(key);
            Accumulator {
                reg_id: card.reg_id.clone(),
                player_id: card.player_id.clone(),
                player_name: card
                    .player_name
                    .clone()
                    .unwrap_or_else(|| "Unknown".to_string()),
                total_gross: 0,
                total_net: 0,
                total_stableford: 0,
                rounds: Vec::new(),
            }
        });

        // A card with no recorded score contributes 0 and therefore leads
        // an ascending board; finalize assumes every finisher has a score.
        acc.total_gross += card.gross_score.unwrap_or(0);
        acc.total_net += card.net_score.unwrap_or(0);
        acc.total_stableford += card.stableford_points.unwrap_or(0);
        acc.rounds.push(RoundDetail {
            round: card.round,
            gross_score: card.gross_score,
            net_score: card.net_score,
            stableford_points: card.stableford_points,
        });
    }

    let mut entries: Vec<LeaderboardEntry> = order
        .into_iter()
        .filter_map(|key| by_key.remove(&key))
        .map(|acc| LeaderboardEntry {
            rank: 0,
            rank_display: String::new(),
            reg_id: acc.reg_id,
            player_id: acc.player_id,
            player_name: acc.player_name,
            total_gross: acc.total_gross,
            total_net: acc.total_net,
            total_stableford: acc.total_stableford,
            rounds: acc.rounds,
        })
        .collect();

    let key_of = |e: &LeaderboardEntry| -> i64 {
        match metric {
            SortMetric::Net => e.total_net as i64,
            SortMetric::Gross => e.total_gross as i64,
            // negate so one ascending sort covers both directions
            SortMetric::Stableford => -(e.total_stableford as i64),
        }
    };

    entries.sort_by_key(key_of);
    assign_ranks(&mut entries, key_of);

    Leaderboard {
        tournament_id: tournament.id.clone(),
        format: tournament.format,
        status: tournament.status,
        sort_by: metric,
        entries,
    }
}

/// Rank advances to index+1 only when the sort-key value changes, so equal
/// values share a rank (70, 70, 72 -> 1, 1, 3). Shared ranks get a "T"
/// prefix; rank 1 keeps its historical "T1" display even when unique.
fn assign_ranks<F>(entries: &mut [LeaderboardEntry], key_of: F)
where
    F: Fn(&LeaderboardEntry) -> i64,
{
    let mut prev_value = None;
    let mut current_rank = 1;

    for i in 0..entries.len() {
        let value = key_of(&entries[i]);
        if prev_value != Some(value) {
            current_rank = i as i32 + 1;
        }
        entries[i].rank = current_rank;
        prev_value = Some(value);
    }

    let mut rank_counts: HashMap<i32, usize> = HashMap::new();
    for entry in entries.iter() {
        *rank_counts.entry(entry.rank).or_insert(0) += 1;
    }

    for entry in entries.iter_mut() {
        let shared = rank_counts.get(&entry.rank).copied().unwrap_or(0) > 1;
        entry.rank_display = if shared || entry.rank == 1 {
            format!("T{}", entry.rank)
        } else {
            entry.rank.to_string()
        };
    }
}

pub(crate) struct LeaderboardService {
    ctx: Arc<TournamentContext>,
}

impl LeaderboardService {
    pub(crate) fn new(ctx: Arc<TournamentContext>) -> Self {
        Self { ctx }
    }

    pub(crate) async fn leaderboard(
        &self,
        tournament_id: &str,
        sort_by: Option<&str>,
        round: Option<i32>,
    ) -> Result<Leaderboard> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;

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

        Ok(compute_leaderboard(&tournament, &cards, sort_by))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use sqlx::types::Json;
    use uuid::Uuid;

    fn tournament(format: TournamentFormat) -> Tournament {
        Tournament::new(
            "club".to_string(),
            "20260801-001".to_string(),
            "Test Open".to_string(),
            format,
            "2026-09-01".to_string(),
            "2026-09-02".to_string(),
            36,
            32,
        )
    }

    fn card(name: &str, round: i32, gross: i32, net: i32, stableford: i32) -> ScoreCard {
        let now = Utc::now().to_rfc3339();
        ScoreCard {
            id: Uuid::new_v4().to_string(),
            tournament_id: "t".to_string(),
            round,
            reg_id: None,
            player_id: Some(name.to_lowercase()),
            player_name: Some(name.to_string()),
            handicap: 0.0,
            gross_score: Some(gross),
            net_score: Some(net),
            hole_scores: Json(Vec::new()),
            hole_pars: Json(Vec::new()),
            stableford_points: Some(stableford),
            attested_by: None,
            attested_by_name: None,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    #[test]
    fn ties_share_rank_and_next_rank_skips() {
        let t = tournament(TournamentFormat::Stroke);
        let cards = vec![
            card("Alice", 1, 74, 70, 0),
            card("Bob", 1, 75, 70, 0),
            card("Carol", 1, 80, 72, 0),
        ];

        let board = compute_leaderboard(&t, &cards, None);
        let ranks: Vec<i32> = board.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 1, 3]);

        let displays: Vec<&str> = board
            .entries
            .iter()
            .map(|e| e.rank_display.as_str())
            .collect();
        assert_eq!(displays, vec!["T1", "T1", "3"]);
    }

    #[test]
    fn unique_leader_still_displays_t1() {
        let t = tournament(TournamentFormat::Stroke);
        let cards = vec![card("Alice", 1, 74, 68, 0), card("Bob", 1, 75, 71, 0)];

        let board = compute_leaderboard(&t, &cards, None);
        assert_eq!(board.entries[0].rank_display, "T1");
        assert_eq!(board.entries[1].rank_display, "2");
    }

    #[test]
    fn rounds_accumulate_per_player() {
        let t = tournament(TournamentFormat::Stroke);
        let cards = vec![
            card("Alice", 1, 74, 70, 0),
            card("Alice", 2, 76, 72, 0),
            card("Bob", 1, 70, 70, 0),
        ];

        let board = compute_leaderboard(&t, &cards, None);
        let alice = board
            .entries
            .iter()
            .find(|e| e.player_name == "Alice")
            .unwrap();
        assert_eq!(alice.total_gross, 150);
        assert_eq!(alice.total_net, 142);
        assert_eq!(alice.rounds.len(), 2);
        // Bob played one round and sits ahead on net
        assert_eq!(board.entries[0].player_name, "Bob");
    }

    #[test]
    fn stableford_format_sorts_descending_by_points() {
        let t = tournament(TournamentFormat::Stableford);
        let cards = vec![
            card("Alice", 1, 80, 75, 28),
            card("Bob", 1, 74, 70, 36),
        ];

        let board = compute_leaderboard(&t, &cards, None);
        assert_eq!(board.sort_by, SortMetric::Stableford);
        assert_eq!(board.entries[0].player_name, "Bob");
        assert_eq!(board.entries[0].rank, 1);
    }

    #[test]
    fn explicit_gross_sort_overrides_default() {
        let t = tournament(TournamentFormat::Stroke);
        let cards = vec![
            card("Alice", 1, 74, 60, 0), // best net, worse gross
            card("Bob", 1, 71, 71, 0),
        ];

        let board = compute_leaderboard(&t, &cards, Some("gross"));
        assert_eq!(board.sort_by, SortMetric::Gross);
        assert_eq!(board.entries[0].player_name, "Bob");
    }

    #[test]
    fn scoreless_card_accumulates_zero_and_leads_ascending_board() {
        let t = tournament(TournamentFormat::Stroke);
        let mut no_score = card("Idle", 1, 0, 0, 0);
        no_score.gross_score = None;
        no_score.net_score = None;
        no_score.stableford_points = None;
        let cards = vec![card("Alice", 1, 74, 70, 0), no_score];

        let board = compute_leaderboard(&t, &cards, None);
        let idle = board.entries.iter().find(|e| e.player_name == "Idle").unwrap();
        assert_eq!(idle.total_net, 0);
        assert_eq!(idle.rank, 1);
    }

    #[test]
    fn ranks_are_monotonically_non_decreasing() {
        let t = tournament(TournamentFormat::Stroke);
        let cards = vec![
            card("A", 1, 70, 70, 0),
            card("B", 1, 70, 70, 0),
            card("C", 1, 70, 70, 0),
            card("D", 1, 72, 72, 0),
            card("E", 1, 75, 75, 0),
        ];

        let board = compute_leaderboard(&t, &cards, None);
        let ranks: Vec<i32> = board.entries.iter().map(|e| e.rank).collect();
        assert_eq!(ranks, vec![1, 1, 1, 4, 5]);
        for pair in ranks.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
    }
}
