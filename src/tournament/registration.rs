use crate::{
    club::PlayerDirectory,
    db::models::{RegistrationStatus, Tournament, TournamentRegistration, TournamentStatus},
    error::{AppError, Result},
};
use chrono::{NaiveDate, Utc};
use std::sync::Arc;

use super::context::TournamentContext;

/// Player details captured at registration time. The handicap is a
/// snapshot; later directory changes do not alter standings.
#[derive(Debug, Clone)]
pub struct PlayerEntry {
    pub player_id: Option<String>,
    pub player_name: String,
    pub phone: Option<String>,
    pub identity_code: Option<String>,
    pub handicap: f64,
}

/// Snapshot fields editable after the fact.
#[derive(Debug, Clone, Default)]
pub struct RegistrationUpdate {
    pub player_name: Option<String>,
    pub phone: Option<String>,
    pub handicap: Option<f64>,
}

pub(crate) struct RegistrationService {
    ctx: Arc<TournamentContext>,
    directory: Arc<PlayerDirectory>,
}

impl RegistrationService {
    pub(crate) fn new(ctx: Arc<TournamentContext>, directory: Arc<PlayerDirectory>) -> Self {
        Self { ctx, directory }
    }

    /// Register a player entry. At capacity the entry is silently
    /// waitlisted rather than rejected.
    pub(crate) async fn register(
        &self,
        tournament_id: &str,
        entry: PlayerEntry,
    ) -> Result<TournamentRegistration> {
        if entry.player_name.trim().is_empty() {
            return Err(AppError::Validation("playerName is required".to_string()));
        }

        // Serialize against concurrent registrations and cancellations for
        // the same tournament; the capacity check below is read-then-write.
        let lock = self.ctx.lock_for(tournament_id).await;
        let _guard = lock.lock().await;

        let tournament = self.ctx.load_tournament(tournament_id).await?;

        if tournament.status != TournamentStatus::Registration {
            return Err(AppError::NotInRegistrationPhase {
                status: tournament.status.as_str().to_string(),
            });
        }

        check_deadline(&tournament)?;
        self.check_eligibility(&tournament, &entry).await?;

        // At most one confirmed registration per (tournament, player)
        if let Some(player_id) = &entry.player_id {
            let existing: Option<(String,)> = sqlx::query_as(
                "SELECT id FROM tournament_registrations
                 WHERE tournament_id = ? AND player_id = ? AND status = 'confirmed'",
            )
            .bind(tournament_id)
            .bind(player_id)
            .fetch_optional(&*self.ctx.pool)
            .await?;

            if existing.is_some() {
                return Err(AppError::DuplicateRegistration);
            }
        }

        let confirmed = self.ctx.confirmed_count(tournament_id).await?;
        let status = if confirmed < tournament.max_players as i64 {
            RegistrationStatus::Confirmed
        } else {
            RegistrationStatus::Waitlisted
        };

        let reg_no = self.ctx.next_reg_no(tournament_id).await?;
        let registration = TournamentRegistration::new(
            tournament_id.to_string(),
            reg_no,
            entry.player_id,
            entry.player_name,
            entry.phone,
            entry.identity_code,
            entry.handicap,
            status,
        );

        self.insert_registration(&registration).await?;

        if status == RegistrationStatus::Confirmed {
            sqlx::query(
                "UPDATE tournaments SET registered_count = registered_count + 1, updated_at = ?
                 WHERE id = ?",
            )
            .bind(Utc::now().to_rfc3339())
            .bind(tournament_id)
            .execute(&*self.ctx.pool)
            .await?;
        }

        tracing::info!(
            "Registered {} for tournament {} as {} (reg no. {})",
            registration.player_name,
            tournament_id,
            match status {
                RegistrationStatus::Confirmed => "confirmed",
                RegistrationStatus::Waitlisted => "waitlisted",
                RegistrationStatus::Cancelled => "cancelled",
            },
            reg_no
        );

        Ok(registration)
    }

    /// Cancel a registration. Cancelling a confirmed entry promotes the
    /// single earliest-registered waitlisted entry, preserving FIFO order;
    /// the registration row itself is kept for the audit trail.
    pub(crate) async fn cancel(
        &self,
        reg_id: &str,
    ) -> Result<(TournamentRegistration, Option<TournamentRegistration>)> {
        // Narrow read to learn which tournament to serialize on; the
        // status check must happen under the lock or two concurrent
        // cancels of the same entry each promote a waitlisted peer.
        let (tournament_id,): (String,) = sqlx::query_as(
            "SELECT tournament_id FROM tournament_registrations WHERE id = ?",
        )
        .bind(reg_id)
        .fetch_optional(&*self.ctx.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Registration not found".to_string()))?;

        let lock = self.ctx.lock_for(&tournament_id).await;
        let _guard = lock.lock().await;

        let mut registration = self.ctx.load_registration(reg_id).await?;

        if registration.status == RegistrationStatus::Cancelled {
            return Err(AppError::BadRequest(
                "Registration is already cancelled".to_string(),
            ));
        }

        let was_confirmed = registration.status == RegistrationStatus::Confirmed;

        sqlx::query("UPDATE tournament_registrations SET status = 'cancelled' WHERE id = ?")
            .bind(reg_id)
            .execute(&*self.ctx.pool)
            .await?;
        registration.status = RegistrationStatus::Cancelled;

        let mut promoted = None;
        if was_confirmed {
            promoted = self.promote_next_waitlisted(&registration.tournament_id).await?;

            // A promotion keeps the confirmed count unchanged; otherwise a
            // confirmed seat was freed.
            if promoted.is_none() {
                sqlx::query(
                    "UPDATE tournaments SET registered_count = registered_count - 1, updated_at = ?
                     WHERE id = ?",
                )
                .bind(Utc::now().to_rfc3339())
                .bind(&registration.tournament_id)
                .execute(&*self.ctx.pool)
                .await?;
            }
        }

        tracing::info!(
            "Cancelled registration {} (promoted: {})",
            reg_id,
            promoted.as_ref().map(|p| p.player_name.as_str()).unwrap_or("none")
        );

        Ok((registration, promoted))
    }

    /// Promote the oldest waitlisted entry to confirmed. One promotion per
    /// cancellation; there is no batch re-balancing.
    async fn promote_next_waitlisted(
        &self,
        tournament_id: &str,
    ) -> Result<Option<TournamentRegistration>> {
        let next: Option<TournamentRegistration> = sqlx::query_as(
            "SELECT * FROM tournament_registrations
             WHERE tournament_id = ? AND status = 'waitlisted'
             ORDER BY registered_at ASC, reg_no ASC
             LIMIT 1",
        )
        .bind(tournament_id)
        .fetch_optional(&*self.ctx.pool)
        .await?;

        let Some(mut next) = next else {
            return Ok(None);
        };

        sqlx::query("UPDATE tournament_registrations SET status = 'confirmed' WHERE id = ?")
            .bind(&next.id)
            .execute(&*self.ctx.pool)
            .await?;
        next.status = RegistrationStatus::Confirmed;

        tracing::info!(
            "Promoted {} from waitlist for tournament {}",
            next.player_name,
            tournament_id
        );

        Ok(Some(next))
    }

    /// Edit snapshot fields. Locked once score entry has begun.
    pub(crate) async fn update(
        &self,
        reg_id: &str,
        update: RegistrationUpdate,
    ) -> Result<TournamentRegistration> {
        let mut registration = self.ctx.load_registration(reg_id).await?;
        let tournament = self.ctx.load_tournament(&registration.tournament_id).await?;

        if matches!(
            tournament.status,
            TournamentStatus::Scoring | TournamentStatus::Completed | TournamentStatus::Archived
        ) {
            return Err(AppError::BadRequest(
                "Registrations cannot be edited once scoring has started".to_string(),
            ));
        }

        if let Some(player_name) = update.player_name {
            if player_name.trim().is_empty() {
                return Err(AppError::Validation("playerName is required".to_string()));
            }
            registration.player_name = player_name;
        }
        if let Some(phone) = update.phone {
            registration.phone = Some(phone);
        }
        if let Some(handicap) = update.handicap {
            registration.handicap = handicap;
        }

        sqlx::query(
            "UPDATE tournament_registrations SET player_name = ?, phone = ?, handicap = ?
             WHERE id = ?",
        )
        .bind(&registration.player_name)
        .bind(&registration.phone)
        .bind(registration.handicap)
        .bind(reg_id)
        .execute(&*self.ctx.pool)
        .await?;

        Ok(registration)
    }

    pub(crate) async fn list(&self, tournament_id: &str) -> Result<Vec<TournamentRegistration>> {
        // Surface a NotFound for bad tournament ids rather than an empty list
        self.ctx.load_tournament(tournament_id).await?;

        let registrations: Vec<TournamentRegistration> = sqlx::query_as(
            "SELECT * FROM tournament_registrations WHERE tournament_id = ? ORDER BY reg_no",
        )
        .bind(tournament_id)
        .fetch_all(&*self.ctx.pool)
        .await?;

        Ok(registrations)
    }

    async fn check_eligibility(&self, tournament: &Tournament, entry: &PlayerEntry) -> Result<()> {
        if tournament.member_only {
            let identity_code = entry
                .identity_code
                .as_deref()
                .ok_or_else(|| AppError::NotEligible("Tournament is members only".to_string()))?;

            if !self
                .directory
                .is_member(&tournament.club_id, identity_code)
                .await?
            {
                return Err(AppError::NotEligible(
                    "Tournament is members only".to_string(),
                ));
            }
        }

        if let Some(min) = tournament.handicap_min {
            if entry.handicap < min {
                return Err(AppError::NotEligible(format!(
                    "Handicap {} is below the minimum {}",
                    entry.handicap, min
                )));
            }
        }
        if let Some(max) = tournament.handicap_max {
            if entry.handicap > max {
                return Err(AppError::NotEligible(format!(
                    "Handicap {} is above the maximum {}",
                    entry.handicap, max
                )));
            }
        }

        Ok(())
    }

    async fn insert_registration(&self, registration: &TournamentRegistration) -> Result<()> {
        sqlx::query(
            "INSERT INTO tournament_registrations (
                id, tournament_id, reg_no, player_id, player_name, phone,
                identity_code, handicap, status, group_id, group_no, tee_time,
                starting_hole, registered_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&registration.id)
        .bind(&registration.tournament_id)
        .bind(registration.reg_no)
        .bind(&registration.player_id)
        .bind(&registration.player_name)
        .bind(&registration.phone)
        .bind(&registration.identity_code)
        .bind(registration.handicap)
        .bind(registration.status)
        .bind(&registration.group_id)
        .bind(registration.group_no)
        .bind(&registration.tee_time)
        .bind(registration.starting_hole)
        .bind(&registration.registered_at)
        .execute(&*self.ctx.pool)
        .await?;

        Ok(())
    }
}

/// Deadline comparison is date-only and end-of-day inclusive: registering
/// on the deadline date itself is allowed.
fn check_deadline(tournament: &Tournament) -> Result<()> {
    let Some(deadline) = tournament.registration_deadline.as_deref() else {
        return Ok(());
    };

    let Some(deadline_date) = parse_date(deadline) else {
        // A malformed deadline never blocks registration
        return Ok(());
    };

    if Utc::now().date_naive() > deadline_date {
        return Err(AppError::DeadlinePassed);
    }

    Ok(())
}

fn parse_date(value: &str) -> Option<NaiveDate> {
    let date_part = value.get(..10)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}
