//! Tournament manager
//!
//! Facade over the tournament services. Owns the shared context plus the
//! club collaborators and is the only place lifecycle events get
//! dispatched: the state change commits first, then the notification goes
//! out fire-and-forget.

use crate::{
    club::{NotificationDispatcher, PlayerDirectory, PointsLedger},
    db::{
        models::{
            AwardResult, ScoreCard, Tournament, TournamentGroup, TournamentRegistration,
            TournamentStatus,
        },
        DbPool,
    },
    error::Result,
};
use std::sync::Arc;

use super::{
    awards::AwardsService,
    context::TournamentContext,
    grouping::{GroupUpdate, GroupingMethod, GroupingService},
    leaderboard::{Leaderboard, LeaderboardService},
    lifecycle::{LifecycleEvent, LifecycleService, TournamentConfig, TournamentUpdate},
    registration::{PlayerEntry, RegistrationService, RegistrationUpdate},
    scoring::{BatchError, ScoreEntry, ScoringService},
};

pub struct TournamentManager {
    lifecycle: LifecycleService,
    registration: RegistrationService,
    grouping: GroupingService,
    scoring: ScoringService,
    leaderboard: LeaderboardService,
    awards: AwardsService,
    notifier: NotificationDispatcher,
}

impl TournamentManager {
    pub fn new(pool: Arc<DbPool>) -> Self {
        let ctx = Arc::new(TournamentContext::new(pool.clone()));
        let directory = Arc::new(PlayerDirectory::new(pool.clone()));
        let ledger = Arc::new(PointsLedger::new(pool));

        Self {
            lifecycle: LifecycleService::new(ctx.clone()),
            registration: RegistrationService::new(ctx.clone(), directory),
            grouping: GroupingService::new(ctx.clone()),
            scoring: ScoringService::new(ctx.clone()),
            leaderboard: LeaderboardService::new(ctx.clone()),
            awards: AwardsService::new(ctx, ledger),
            notifier: NotificationDispatcher::new(),
        }
    }

    // ==================== Lifecycle ====================

    pub async fn create_tournament(&self, config: TournamentConfig) -> Result<Tournament> {
        self.lifecycle.create(config).await
    }

    pub async fn update_tournament(
        &self,
        tournament_id: &str,
        update: TournamentUpdate,
    ) -> Result<Tournament> {
        self.lifecycle.update(tournament_id, update).await
    }

    pub async fn change_status(
        &self,
        tournament_id: &str,
        to: TournamentStatus,
    ) -> Result<Tournament> {
        let (tournament, event) = self.lifecycle.change_status(tournament_id, to).await?;
        self.dispatch(event).await;
        Ok(tournament)
    }

    pub async fn delete_tournament(&self, tournament_id: &str) -> Result<()> {
        self.lifecycle.delete(tournament_id).await
    }

    // ==================== Registration ====================

    pub async fn register(
        &self,
        tournament_id: &str,
        entry: PlayerEntry,
    ) -> Result<TournamentRegistration> {
        self.registration.register(tournament_id, entry).await
    }

    pub async fn cancel_registration(
        &self,
        reg_id: &str,
    ) -> Result<(TournamentRegistration, Option<TournamentRegistration>)> {
        self.registration.cancel(reg_id).await
    }

    pub async fn update_registration(
        &self,
        reg_id: &str,
        update: RegistrationUpdate,
    ) -> Result<TournamentRegistration> {
        self.registration.update(reg_id, update).await
    }

    pub async fn list_registrations(
        &self,
        tournament_id: &str,
    ) -> Result<Vec<TournamentRegistration>> {
        self.registration.list(tournament_id).await
    }

    // ==================== Grouping ====================

    pub async fn auto_group(
        &self,
        tournament_id: &str,
        method: GroupingMethod,
        group_size: Option<i32>,
    ) -> Result<Vec<TournamentGroup>> {
        let (groups, event) = self
            .grouping
            .auto_group(tournament_id, method, group_size)
            .await?;
        self.dispatch(event).await;
        Ok(groups)
    }

    pub async fn update_group(
        &self,
        tournament_id: &str,
        group_no: i32,
        update: GroupUpdate,
    ) -> Result<TournamentGroup> {
        self.grouping.update_group(tournament_id, group_no, update).await
    }

    pub async fn list_groups(&self, tournament_id: &str) -> Result<Vec<TournamentGroup>> {
        self.grouping.list(tournament_id).await
    }

    // ==================== Scoring ====================

    pub async fn record_score(
        &self,
        tournament_id: &str,
        entry: ScoreEntry,
    ) -> Result<ScoreCard> {
        self.scoring.record(tournament_id, entry).await
    }

    pub async fn record_scores(
        &self,
        tournament_id: &str,
        entries: Vec<ScoreEntry>,
    ) -> (Vec<ScoreCard>, Vec<BatchError>) {
        self.scoring.record_batch(tournament_id, entries).await
    }

    pub async fn list_scores(
        &self,
        tournament_id: &str,
        round: Option<i32>,
    ) -> Result<Vec<ScoreCard>> {
        self.scoring.list(tournament_id, round).await
    }

    // ==================== Leaderboard & finalize ====================

    pub async fn leaderboard(
        &self,
        tournament_id: &str,
        sort_by: Option<&str>,
        round: Option<i32>,
    ) -> Result<Leaderboard> {
        self.leaderboard.leaderboard(tournament_id, sort_by, round).await
    }

    pub async fn finalize(
        &self,
        tournament_id: &str,
    ) -> Result<(Tournament, Vec<AwardResult>)> {
        let (tournament, awards, event) = self.awards.finalize(tournament_id).await?;
        self.dispatch(event).await;
        Ok((tournament, awards))
    }

    async fn dispatch(&self, event: Option<LifecycleEvent>) {
        if let Some(event) = event {
            self.notifier
                .notify_tournament(
                    &event.tournament.club_id,
                    event.event_type,
                    &event.tournament,
                    &event.recipient_player_ids,
                )
                .await;
        }
    }
}
