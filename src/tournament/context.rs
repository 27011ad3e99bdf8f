use crate::{
    db::{
        models::{Tournament, TournamentRegistration},
        DbPool,
    },
    error::{AppError, Result},
};
use chrono::Utc;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, RwLock};

/// Shared store access for the tournament services.
///
/// Also owns a per-tournament mutex map: registration capacity checks,
/// waitlist promotion and auto-grouping are read-then-write sequences, so
/// writers for the same tournament are serialized in-process.
pub(crate) struct TournamentContext {
    pub(crate) pool: Arc<DbPool>,
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl TournamentContext {
    pub(crate) fn new(pool: Arc<DbPool>) -> Self {
        Self {
            pool,
            locks: RwLock::new(HashMap::new()),
        }
    }

    /// Mutex guarding writes for one tournament.
    pub(crate) async fn lock_for(&self, tournament_id: &str) -> Arc<Mutex<()>> {
        if let Some(lock) = self.locks.read().await.get(tournament_id) {
            return lock.clone();
        }
        let mut locks = self.locks.write().await;
        locks
            .entry(tournament_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    pub(crate) async fn load_tournament(&self, tournament_id: &str) -> Result<Tournament> {
        sqlx::query_as::<_, Tournament>("SELECT * FROM tournaments WHERE id = ?")
            .bind(tournament_id)
            .fetch_optional(&*self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Tournament not found".to_string()))
    }

    pub(crate) async fn load_registration(&self, reg_id: &str) -> Result<TournamentRegistration> {
        sqlx::query_as::<_, TournamentRegistration>(
            "SELECT * FROM tournament_registrations WHERE id = ?",
        )
        .bind(reg_id)
        .fetch_optional(&*self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))
    }

    pub(crate) async fn save_tournament(&self, tournament: &Tournament) -> Result<()> {
        sqlx::query(
            "INSERT INTO tournaments (
                id, club_id, tournament_no, name, format,
                start_date, end_date, total_holes, max_players, member_only,
                handicap_min, handicap_max, registration_deadline, handicap_allowed,
                tie_breaker, group_size, start_type, tee_times, awards,
                registered_count, group_count, results_published,
                leaderboard_snapshot, award_results, status, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&tournament.id)
        .bind(&tournament.club_id)
        .bind(&tournament.tournament_no)
        .bind(&tournament.name)
        .bind(tournament.format)
        .bind(&tournament.start_date)
        .bind(&tournament.end_date)
        .bind(tournament.total_holes)
        .bind(tournament.max_players)
        .bind(tournament.member_only)
        .bind(tournament.handicap_min)
        .bind(tournament.handicap_max)
        .bind(&tournament.registration_deadline)
        .bind(tournament.handicap_allowed)
        .bind(&tournament.tie_breaker)
        .bind(tournament.group_size)
        .bind(&tournament.start_type)
        .bind(&tournament.tee_times)
        .bind(&tournament.awards)
        .bind(tournament.registered_count)
        .bind(tournament.group_count)
        .bind(tournament.results_published)
        .bind(&tournament.leaderboard_snapshot)
        .bind(&tournament.award_results)
        .bind(tournament.status)
        .bind(&tournament.created_at)
        .bind(&tournament.updated_at)
        .execute(&*self.pool)
        .await?;

        Ok(())
    }

    /// Next club-scoped tournament number, date-prefixed: "YYYYMMDD-NNN".
    pub(crate) async fn next_tournament_no(&self, club_id: &str) -> Result<String> {
        let prefix = Utc::now().format("%Y%m%d").to_string();

        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tournaments WHERE club_id = ? AND tournament_no LIKE ?",
        )
        .bind(club_id)
        .bind(format!("{}-%", prefix))
        .fetch_one(&*self.pool)
        .await?;

        Ok(format!("{}-{:03}", prefix, count + 1))
    }

    /// Next tournament-scoped registration number.
    pub(crate) async fn next_reg_no(&self, tournament_id: &str) -> Result<i64> {
        let (max_no,): (Option<i64>,) = sqlx::query_as(
            "SELECT MAX(reg_no) FROM tournament_registrations WHERE tournament_id = ?",
        )
        .bind(tournament_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(max_no.unwrap_or(0) + 1)
    }

    /// Count of confirmed registrations; the capacity check input.
    pub(crate) async fn confirmed_count(&self, tournament_id: &str) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM tournament_registrations
             WHERE tournament_id = ? AND status = 'confirmed'",
        )
        .bind(tournament_id)
        .fetch_one(&*self.pool)
        .await?;

        Ok(count)
    }

    /// Player ids of all confirmed registrants, for lifecycle notifications.
    pub(crate) async fn confirmed_player_ids(&self, tournament_id: &str) -> Result<Vec<String>> {
        let rows: Vec<(Option<String>,)> = sqlx::query_as(
            "SELECT player_id FROM tournament_registrations
             WHERE tournament_id = ? AND status = 'confirmed'",
        )
        .bind(tournament_id)
        .fetch_all(&*self.pool)
        .await?;

        Ok(rows.into_iter().flat_map(|(id,)| id).collect())
    }

    pub(crate) async fn touch_tournament(&self, tournament_id: &str) -> Result<()> {
        sqlx::query("UPDATE tournaments SET updated_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(tournament_id)
            .execute(&*self.pool)
            .await?;

        Ok(())
    }
}
