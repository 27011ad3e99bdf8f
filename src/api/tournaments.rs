use crate::{
    db::models::{
        AwardDef, AwardResult, GroupMember, ScoreCard, Tournament, TournamentFormat,
        TournamentGroup, TournamentRegistration, TournamentStatus,
    },
    error::{AppError, Result},
    tournament::{
        grouping::{GroupUpdate, GroupingMethod},
        leaderboard::Leaderboard,
        lifecycle::{TournamentConfig, TournamentUpdate},
        registration::{PlayerEntry, RegistrationUpdate},
        scoring::ScoreEntry,
        TournamentManager,
    },
};
use axum::{
    extract::{Path, Query, State},
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

// ==================== Request/Response Types ====================

#[derive(Debug, Deserialize)]
pub struct CreateTournamentRequest {
    pub club_id: String,
    pub name: String,
    pub format: TournamentFormat,
    pub start_date: String,
    pub end_date: String,
    pub total_holes: Option<i32>,
    pub max_players: i32,
    pub member_only: Option<bool>,
    pub handicap_min: Option<f64>,
    pub handicap_max: Option<f64>,
    pub registration_deadline: Option<String>,
    pub handicap_allowed: Option<bool>,
    pub tie_breaker: Option<String>,
    pub group_size: Option<i32>,
    pub start_type: Option<String>,
    pub tee_times: Option<Vec<String>>,
    pub awards: Option<Vec<AwardDef>>,
}

/// Double-Option fields distinguish "absent" (leave as is) from "null"
/// (clear the value).
#[derive(Debug, Deserialize)]
pub struct UpdateTournamentRequest {
    pub name: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub max_players: Option<i32>,
    pub member_only: Option<bool>,
    #[serde(default)]
    pub handicap_min: Option<Option<f64>>,
    #[serde(default)]
    pub handicap_max: Option<Option<f64>>,
    #[serde(default)]
    pub registration_deadline: Option<Option<String>>,
    pub group_size: Option<i32>,
    pub start_type: Option<String>,
    pub tee_times: Option<Vec<String>>,
    pub awards: Option<Vec<AwardDef>>,
}

#[derive(Debug, Deserialize)]
pub struct ChangeStatusRequest {
    pub status: TournamentStatus,
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub player_id: Option<String>,
    pub player_name: String,
    pub phone: Option<String>,
    pub identity_code: Option<String>,
    pub handicap: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateRegistrationRequest {
    pub player_name: Option<String>,
    pub phone: Option<String>,
    pub handicap: Option<f64>,
}

#[derive(Debug, Deserialize)]
pub struct AutoGroupRequest {
    pub method: Option<String>,
    pub group_size: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateGroupRequest {
    #[serde(default)]
    pub tee_time: Option<Option<String>>,
    pub starting_hole: Option<i32>,
    pub players: Option<Vec<GroupMember>>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub round: i32,
    pub reg_id: Option<String>,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    pub handicap: Option<f64>,
    pub gross_score: Option<i32>,
    pub hole_scores: Option<Vec<Option<i32>>>,
    pub hole_pars: Option<Vec<Option<i32>>>,
    pub attested_by: Option<String>,
    pub attested_by_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BatchScoreRequest {
    pub scores: Vec<ScoreRequest>,
}

#[derive(Debug, Deserialize)]
pub struct ListQuery {
    pub club_id: String,
    pub status: Option<TournamentStatus>,
}

#[derive(Debug, Deserialize)]
pub struct StatsQuery {
    pub club_id: String,
}

#[derive(Debug, Deserialize)]
pub struct ScoresQuery {
    pub round: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct LeaderboardQuery {
    pub sort_by: Option<String>,
    pub round: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct TournamentListResponse {
    pub tournaments: Vec<Tournament>,
}

#[derive(Debug, Serialize)]
pub struct RegistrationResponse {
    pub registration: TournamentRegistration,
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub registration: TournamentRegistration,
    /// Waitlisted entry promoted by this cancellation, if any
    pub promoted: Option<TournamentRegistration>,
}

#[derive(Debug, Serialize)]
pub struct GroupsResponse {
    pub groups: Vec<TournamentGroup>,
}

#[derive(Debug, Serialize)]
pub struct ScoresResponse {
    pub scores: Vec<ScoreCard>,
}

#[derive(Debug, Serialize)]
pub struct BatchScoreItemError {
    pub index: usize,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BatchScoreResponse {
    pub recorded: Vec<ScoreCard>,
    pub errors: Vec<BatchScoreItemError>,
}

#[derive(Debug, Serialize)]
pub struct FinalizeResponse {
    pub tournament: Tournament,
    pub awards: Vec<AwardResult>,
}

#[derive(Debug, Serialize)]
pub struct StatsResponse {
    pub total: i64,
    pub by_status: HashMap<String, i64>,
    pub confirmed_registrations: i64,
}

// ==================== AppState ====================

pub struct TournamentAppState {
    pub pool: crate::db::DbPool,
    pub tournament_manager: Arc<TournamentManager>,
}

// ==================== Router ====================

pub fn router() -> Router<Arc<TournamentAppState>> {
    Router::new()
        // Tournament management
        .route("/", get(list_tournaments).post(create_tournament))
        .route("/stats", get(tournament_stats))
        .route(
            "/:id",
            get(get_tournament)
                .put(update_tournament)
                .delete(delete_tournament),
        )
        .route("/:id/status", post(change_status))
        // Registration
        .route("/:id/registrations", get(list_registrations))
        .route("/:id/register", post(register_player))
        .route("/registrations/:reg_id", put(update_registration))
        .route("/registrations/:reg_id/cancel", post(cancel_registration))
        // Grouping
        .route("/:id/groups", get(list_groups))
        .route("/:id/group", post(auto_group))
        .route("/:id/groups/:group_no", put(update_group))
        // Scoring
        .route("/:id/scores", get(list_scores).post(record_score))
        .route("/:id/scores/batch", post(record_scores_batch))
        // Results
        .route("/:id/leaderboard", get(get_leaderboard))
        .route("/:id/finalize", post(finalize_tournament))
}

// ==================== Handlers ====================

async fn list_tournaments(
    State(state): State<Arc<TournamentAppState>>,
    Query(query): Query<ListQuery>,
) -> Result<Json<TournamentListResponse>> {
    let tournaments: Vec<Tournament> = match query.status {
        Some(status) => {
            sqlx::query_as(
                "SELECT * FROM tournaments WHERE club_id = ? AND status = ?
                 ORDER BY start_date DESC, created_at DESC",
            )
            .bind(&query.club_id)
            .bind(status)
            .fetch_all(&state.pool)
            .await?
        }
        None => {
            sqlx::query_as(
                "SELECT * FROM tournaments WHERE club_id = ?
                 ORDER BY start_date DESC, created_at DESC",
            )
            .bind(&query.club_id)
            .fetch_all(&state.pool)
            .await?
        }
    };

    Ok(Json(TournamentListResponse { tournaments }))
}

async fn create_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Json(req): Json<CreateTournamentRequest>,
) -> Result<Json<Tournament>> {
    let config = TournamentConfig {
        club_id: req.club_id,
        name: req.name,
        format: req.format,
        start_date: req.start_date,
        end_date: req.end_date,
        total_holes: req.total_holes.unwrap_or(18),
        max_players: req.max_players,
        member_only: req.member_only.unwrap_or(false),
        handicap_min: req.handicap_min,
        handicap_max: req.handicap_max,
        registration_deadline: req.registration_deadline,
        handicap_allowed: req.handicap_allowed.unwrap_or(true),
        tie_breaker: req.tie_breaker,
        group_size: req.group_size.unwrap_or(4),
        start_type: req.start_type.unwrap_or_else(|| "tee_times".to_string()),
        tee_times: req.tee_times.unwrap_or_default(),
        awards: req.awards.unwrap_or_default(),
    };

    let tournament = state.tournament_manager.create_tournament(config).await?;
    Ok(Json(tournament))
}

async fn get_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<Tournament>> {
    let tournament: Tournament = sqlx::query_as("SELECT * FROM tournaments WHERE id = ?")
        .bind(&id)
        .fetch_optional(&state.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Tournament not found".to_string()))?;

    Ok(Json(tournament))
}

async fn update_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    Json(req): Json<UpdateTournamentRequest>,
) -> Result<Json<Tournament>> {
    let update = TournamentUpdate {
        name: req.name,
        start_date: req.start_date,
        end_date: req.end_date,
        max_players: req.max_players,
        member_only: req.member_only,
        handicap_min: req.handicap_min,
        handicap_max: req.handicap_max,
        registration_deadline: req.registration_deadline,
        group_size: req.group_size,
        start_type: req.start_type,
        tee_times: req.tee_times,
        awards: req.awards,
    };

    let tournament = state.tournament_manager.update_tournament(&id, update).await?;
    Ok(Json(tournament))
}

async fn delete_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>> {
    state.tournament_manager.delete_tournament(&id).await?;
    Ok(Json(json!({ "success": true })))
}

async fn change_status(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    Json(req): Json<ChangeStatusRequest>,
) -> Result<Json<Tournament>> {
    let tournament = state.tournament_manager.change_status(&id, req.status).await?;
    Ok(Json(tournament))
}

async fn tournament_stats(
    State(state): State<Arc<TournamentAppState>>,
    Query(query): Query<StatsQuery>,
) -> Result<Json<StatsResponse>> {
    let rows: Vec<(TournamentStatus, i64)> = sqlx::query_as(
        "SELECT status, COUNT(*) FROM tournaments WHERE club_id = ? GROUP BY status",
    )
    .bind(&query.club_id)
    .fetch_all(&state.pool)
    .await?;

    let mut by_status = HashMap::new();
    let mut total = 0;
    for (status, count) in rows {
        total += count;
        by_status.insert(status.as_str().to_string(), count);
    }

    let (confirmed_registrations,): (i64,) = sqlx::query_as(
        "SELECT COUNT(*) FROM tournament_registrations tr
         JOIN tournaments t ON tr.tournament_id = t.id
         WHERE t.club_id = ? AND tr.status = 'confirmed'",
    )
    .bind(&query.club_id)
    .fetch_one(&state.pool)
    .await?;

    Ok(Json(StatsResponse {
        total,
        by_status,
        confirmed_registrations,
    }))
}

async fn list_registrations(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<Vec<TournamentRegistration>>> {
    let registrations = state.tournament_manager.list_registrations(&id).await?;
    Ok(Json(registrations))
}

async fn register_player(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    Json(req): Json<RegisterRequest>,
) -> Result<Json<RegistrationResponse>> {
    let entry = PlayerEntry {
        player_id: req.player_id,
        player_name: req.player_name,
        phone: req.phone,
        identity_code: req.identity_code,
        handicap: req.handicap.unwrap_or(0.0),
    };

    let registration = state.tournament_manager.register(&id, entry).await?;
    Ok(Json(RegistrationResponse { registration }))
}

async fn update_registration(
    State(state): State<Arc<TournamentAppState>>,
    Path(reg_id): Path<String>,
    Json(req): Json<UpdateRegistrationRequest>,
) -> Result<Json<RegistrationResponse>> {
    let update = RegistrationUpdate {
        player_name: req.player_name,
        phone: req.phone,
        handicap: req.handicap,
    };

    let registration = state
        .tournament_manager
        .update_registration(&reg_id, update)
        .await?;
    Ok(Json(RegistrationResponse { registration }))
}

async fn cancel_registration(
    State(state): State<Arc<TournamentAppState>>,
    Path(reg_id): Path<String>,
) -> Result<Json<CancelResponse>> {
    let (registration, promoted) = state.tournament_manager.cancel_registration(&reg_id).await?;
    Ok(Json(CancelResponse {
        registration,
        promoted,
    }))
}

async fn list_groups(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<GroupsResponse>> {
    let groups = state.tournament_manager.list_groups(&id).await?;
    Ok(Json(GroupsResponse { groups }))
}

async fn auto_group(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    Json(req): Json<AutoGroupRequest>,
) -> Result<Json<GroupsResponse>> {
    let method = GroupingMethod::parse(req.method.as_deref().unwrap_or("seeded"));
    let groups = state
        .tournament_manager
        .auto_group(&id, method, req.group_size)
        .await?;
    Ok(Json(GroupsResponse { groups }))
}

async fn update_group(
    State(state): State<Arc<TournamentAppState>>,
    Path((id, group_no)): Path<(String, i32)>,
    Json(req): Json<UpdateGroupRequest>,
) -> Result<Json<TournamentGroup>> {
    let update = GroupUpdate {
        tee_time: req.tee_time,
        starting_hole: req.starting_hole,
        players: req.players,
    };

    let group = state
        .tournament_manager
        .update_group(&id, group_no, update)
        .await?;
    Ok(Json(group))
}

async fn list_scores(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    Query(query): Query<ScoresQuery>,
) -> Result<Json<ScoresResponse>> {
    let scores = state.tournament_manager.list_scores(&id, query.round).await?;
    Ok(Json(ScoresResponse { scores }))
}

async fn record_score(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    Json(req): Json<ScoreRequest>,
) -> Result<Json<ScoreCard>> {
    let card = state
        .tournament_manager
        .record_score(&id, score_entry_from(req))
        .await?;
    Ok(Json(card))
}

async fn record_scores_batch(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    Json(req): Json<BatchScoreRequest>,
) -> Result<Json<BatchScoreResponse>> {
    let entries = req.scores.into_iter().map(score_entry_from).collect();
    let (recorded, errors) = state.tournament_manager.record_scores(&id, entries).await;

    Ok(Json(BatchScoreResponse {
        recorded,
        errors: errors
            .into_iter()
            .map(|e| BatchScoreItemError {
                index: e.index,
                error: e.error.to_string(),
            })
            .collect(),
    }))
}

async fn get_leaderboard(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
    Query(query): Query<LeaderboardQuery>,
) -> Result<Json<Leaderboard>> {
    let board = state
        .tournament_manager
        .leaderboard(&id, query.sort_by.as_deref(), query.round)
        .await?;
    Ok(Json(board))
}

async fn finalize_tournament(
    State(state): State<Arc<TournamentAppState>>,
    Path(id): Path<String>,
) -> Result<Json<FinalizeResponse>> {
    let (tournament, awards) = state.tournament_manager.finalize(&id).await?;
    Ok(Json(FinalizeResponse { tournament, awards }))
}

fn score_entry_from(req: ScoreRequest) -> ScoreEntry {
    ScoreEntry {
        round: req.round,
        reg_id: req.reg_id,
        player_id: req.player_id,
        player_name: req.player_name,
        handicap: req.handicap.unwrap_or(0.0),
        gross_score: req.gross_score,
        hole_scores: req.hole_scores.unwrap_or_default(),
        hole_pars: req.hole_pars.unwrap_or_default(),
        attested_by: req.attested_by,
        attested_by_name: req.attested_by_name,
    }
}
