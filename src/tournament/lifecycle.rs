//! Tournament lifecycle state machine.
//!
//! The transition table is exhaustive over the source status, so adding a
//! status forces the compiler to flag the missing arm. A rejected transition
//! leaves the tournament untouched; side effects (notifications) are emitted
//! as events for the manager to dispatch after the write commits.

use crate::{
    db::models::{AwardDef, Tournament, TournamentFormat, TournamentStatus},
    error::{AppError, Result},
};
use chrono::Utc;
use std::sync::Arc;

use super::context::TournamentContext;

/// Legal target states for each status. `draft` is the only initial state;
/// `archived` is terminal. Reopening registration from `closed` is permitted.
pub fn allowed_transitions(from: TournamentStatus) -> &'static [TournamentStatus] {
    use TournamentStatus::*;
    match from {
        Draft => &[Registration, Archived],
        Registration => &[Closed, Archived],
        Closed => &[Grouping, Registration],
        Grouping => &[InProgress, Closed],
        InProgress => &[Scoring],
        Scoring => &[Completed],
        Completed => &[Archived],
        Archived => &[],
    }
}

pub fn is_allowed(from: TournamentStatus, to: TournamentStatus) -> bool {
    allowed_transitions(from).contains(&to)
}

/// Notification owed to confirmed registrants after a status change commits.
/// Dispatch is fire-and-forget; a notifier outage cannot roll back the
/// transition.
#[derive(Debug, Clone)]
pub struct LifecycleEvent {
    pub event_type: &'static str,
    pub tournament: Tournament,
    pub recipient_player_ids: Vec<String>,
}

fn event_type_for(status: TournamentStatus) -> Option<&'static str> {
    match status {
        TournamentStatus::Registration => Some("registration_open"),
        TournamentStatus::Closed => Some("registration_closed"),
        TournamentStatus::Grouping => Some("grouping_started"),
        TournamentStatus::InProgress => Some("tournament_started"),
        TournamentStatus::Completed => Some("tournament_completed"),
        TournamentStatus::Draft | TournamentStatus::Scoring | TournamentStatus::Archived => None,
    }
}

/// Configuration for creating a tournament
#[derive(Debug, Clone)]
pub struct TournamentConfig {
    pub club_id: String,
    pub name: String,
    pub format: TournamentFormat,
    pub start_date: String,
    pub end_date: String,
    pub total_holes: i32,
    pub max_players: i32,
    pub member_only: bool,
    pub handicap_min: Option<f64>,
    pub handicap_max: Option<f64>,
    pub registration_deadline: Option<String>,
    pub handicap_allowed: bool,
    pub tie_breaker: Option<String>,
    pub group_size: i32,
    pub start_type: String,
    pub tee_times: Vec<String>,
    pub awards: Vec<AwardDef>,
}

/// Fields editable while the tournament is still in draft or registration.
#[derive(Debug, Clone, Default)]
pub struct TournamentUpdate {
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub max_players: Option<i32>,
    pub member_only: Option<bool>,
    pub handicap_min: Option<Option<f64>>,
    pub handicap_max: Option<Option<f64>>,
    pub registration_deadline: Option<Option<String>>,
    pub group_size: Option<i32>,
    pub start_type: Option<String>,
    pub tee_times: Option<Vec<String>>,
    pub awards: Option<Vec<AwardDef>>,
}

pub(crate) struct LifecycleService {
    ctx: Arc<TournamentContext>,
}

impl LifecycleService {
    pub(crate) fn new(ctx: Arc<TournamentContext>) -> Self {
        Self { ctx }
    }

    /// Create a new tournament in `draft`
    pub(crate) async fn create(&self, config: TournamentConfig) -> Result<Tournament> {
        if config.name.trim().is_empty() {
            return Err(AppError::Validation("Tournament name is required".to_string()));
        }
        if config.max_players <= 0 {
            return Err(AppError::Validation("maxPlayers must be positive".to_string()));
        }
        if !matches!(config.total_holes, 18 | 36 | 54 | 72) {
            return Err(AppError::Validation(
                "totalHoles must be one of 18, 36, 54, 72".to_string(),
            ));
        }
        if config.group_size <= 0 {
            return Err(AppError::Validation("groupSize must be positive".to_string()));
        }

        let tournament_no = self.ctx.next_tournament_no(&config.club_id).await?;

        let mut tournament = Tournament::new(
            config.club_id,
            tournament_no,
            config.name,
            config.format,
            config.start_date,
            config.end_date,
            config.total_holes,
            config.max_players,
        );
        tournament.member_only = config.member_only;
        tournament.handicap_min = config.handicap_min;
        tournament.handicap_max = config.handicap_max;
        tournament.registration_deadline = config.registration_deadline;
        tournament.handicap_allowed = config.handicap_allowed;
        tournament.tie_breaker = config.tie_breaker;
        tournament.group_size = config.group_size;
        tournament.start_type = config.start_type;
        tournament.tee_times.0 = config.tee_times;
        tournament.awards.0 = config.awards;

        self.ctx.save_tournament(&tournament).await?;

        tracing::info!(
            "Created tournament: {} ({}, no. {})",
            tournament.name,
            tournament.id,
            tournament.tournament_no
        );
        Ok(tournament)
    }

    /// Apply edits; only legal before the field goes out to play.
    pub(crate) async fn update(
        &self,
        tournament_id: &str,
        update: TournamentUpdate,
    ) -> Result<Tournament> {
        let mut tournament = self.ctx.load_tournament(tournament_id).await?;

        if !matches!(
            tournament.status,
            TournamentStatus::Draft | TournamentStatus::Registration
        ) {
            return Err(AppError::BadRequest(
                "Tournament can only be edited in draft or registration".to_string(),
            ));
        }

        if let Some(name) = update.name {
            if name.trim().is_empty() {
                return Err(AppError::Validation("Tournament name is required".to_string()));
            }
            tournament.name = name;
        }
        if let Some(start_date) = update.start_date {
            tournament.start_date = start_date;
        }
        if let Some(end_date) = update.end_date {
            tournament.end_date = end_date;
        }
        if let Some(max_players) = update.max_players {
            if max_players <= 0 {
                return Err(AppError::Validation("maxPlayers must be positive".to_string()));
            }
            tournament.max_players = max_players;
        }
        if let Some(member_only) = update.member_only {
            tournament.member_only = member_only;
        }
        if let Some(handicap_min) = update.handicap_min {
            tournament.handicap_min = handicap_min;
        }
        if let Some(handicap_max) = update.handicap_max {
            tournament.handicap_max = handicap_max;
        }
        if let Some(deadline) = update.registration_deadline {
            tournament.registration_deadline = deadline;
        }
        if let Some(group_size) = update.group_size {
            if group_size <= 0 {
                return Err(AppError::Validation("groupSize must be positive".to_string()));
            }
            tournament.group_size = group_size;
        }
        if let Some(start_type) = update.start_type {
            tournament.start_type = start_type;
        }
        if let Some(tee_times) = update.tee_times {
            tournament.tee_times.0 = tee_times;
        }
        if let Some(awards) = update.awards {
            tournament.awards.0 = awards;
        }

        tournament.updated_at = Utc::now().to_rfc3339();

        sqlx::query(
            "UPDATE tournaments SET
                name = ?, start_date = ?, end_date = ?, max_players = ?,
                member_only = ?, handicap_min = ?, handicap_max = ?,
                registration_deadline = ?, group_size = ?, start_type = ?,
                tee_times = ?, awards = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&tournament.name)
        .bind(&tournament.start_date)
        .bind(&tournament.end_date)
        .bind(tournament.max_players)
        .bind(tournament.member_only)
        .bind(tournament.handicap_min)
        .bind(tournament.handicap_max)
        .bind(&tournament.registration_deadline)
        .bind(tournament.group_size)
        .bind(&tournament.start_type)
        .bind(&tournament.tee_times)
        .bind(&tournament.awards)
        .bind(&tournament.updated_at)
        .bind(tournament_id)
        .execute(&*self.ctx.pool)
        .await?;

        Ok(tournament)
    }

    /// Change status through the transition table. Returns the updated
    /// tournament plus any notification event owed to confirmed registrants.
    pub(crate) async fn change_status(
        &self,
        tournament_id: &str,
        to: TournamentStatus,
    ) -> Result<(Tournament, Option<LifecycleEvent>)> {
        let mut tournament = self.ctx.load_tournament(tournament_id).await?;

        if !is_allowed(tournament.status, to) {
            return Err(AppError::InvalidTransition {
                from: tournament.status.as_str().to_string(),
                to: to.as_str().to_string(),
            });
        }

        tournament.status = to;
        tournament.updated_at = Utc::now().to_rfc3339();

        sqlx::query("UPDATE tournaments SET status = ?, updated_at = ? WHERE id = ?")
            .bind(tournament.status)
            .bind(&tournament.updated_at)
            .bind(tournament_id)
            .execute(&*self.ctx.pool)
            .await?;

        tracing::info!(
            "Tournament {} status -> {}",
            tournament_id,
            to.as_str()
        );

        let event = match event_type_for(to) {
            Some(event_type) => {
                let recipients = self.ctx.confirmed_player_ids(tournament_id).await?;
                Some(LifecycleEvent {
                    event_type,
                    tournament: tournament.clone(),
                    recipient_player_ids: recipients,
                })
            }
            None => None,
        };

        Ok((tournament, event))
    }

    /// Hard delete, permitted only in draft or archived. Everything past
    /// draft must leave an audit trail and can only be archived.
    pub(crate) async fn delete(&self, tournament_id: &str) -> Result<()> {
        let tournament = self.ctx.load_tournament(tournament_id).await?;

        if !matches!(
            tournament.status,
            TournamentStatus::Draft | TournamentStatus::Archived
        ) {
            return Err(AppError::BadRequest(
                "Only draft or archived tournaments can be deleted".to_string(),
            ));
        }

        sqlx::query("DELETE FROM tournament_scores WHERE tournament_id = ?")
            .bind(tournament_id)
            .execute(&*self.ctx.pool)
            .await?;
        sqlx::query("DELETE FROM tournament_groups WHERE tournament_id = ?")
            .bind(tournament_id)
            .execute(&*self.ctx.pool)
            .await?;
        sqlx::query("DELETE FROM tournament_registrations WHERE tournament_id = ?")
            .bind(tournament_id)
            .execute(&*self.ctx.pool)
            .await?;
        sqlx::query("DELETE FROM tournaments WHERE id = ?")
            .bind(tournament_id)
            .execute(&*self.ctx.pool)
            .await?;

        tracing::info!("Deleted tournament {}", tournament_id);
        Ok(())
    }
}
