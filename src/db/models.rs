use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

// ============================================================================
// Players (read-only directory backing eligibility checks)
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Player {
    pub id: String,
    pub club_id: String,
    pub name: String,
    pub phone: Option<String>,
    pub identity_code: Option<String>,
    pub is_member: bool,
    pub handicap: f64,
    pub created_at: String,
}

// ============================================================================
// Tournament
// ============================================================================

/// Tournament lifecycle status. Stored as snake_case TEXT; the allowed
/// transition table lives in `tournament::lifecycle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TournamentStatus {
    Draft,
    Registration,
    Closed,
    Grouping,
    InProgress,
    Scoring,
    Completed,
    Archived,
}

impl TournamentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TournamentStatus::Draft => "draft",
            TournamentStatus::Registration => "registration",
            TournamentStatus::Closed => "closed",
            TournamentStatus::Grouping => "grouping",
            TournamentStatus::InProgress => "in_progress",
            TournamentStatus::Scoring => "scoring",
            TournamentStatus::Completed => "completed",
            TournamentStatus::Archived => "archived",
        }
    }
}

/// Competition format. Fixes which scoring rules apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum TournamentFormat {
    Stroke,
    Match,
    Stableford,
    Scramble,
    BestBall,
    Shotgun,
}

/// Custom award definition stored on the tournament: the player at the
/// 1-based leaderboard `position` wins `points`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardDef {
    pub title: String,
    pub position: i32,
    #[serde(default)]
    pub points: i64,
}

/// Outcome of a single award, written once during finalize.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AwardResult {
    pub award_title: String,
    pub position: i32,
    pub player_id: Option<String>,
    pub player_name: String,
    pub score: i64,
    pub points: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tournament {
    pub id: String,
    pub club_id: String,
    /// Club-scoped, date-prefixed sequence, e.g. "20260831-003"
    pub tournament_no: String,
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
    pub tee_times: Json<Vec<String>>,
    pub awards: Json<Vec<AwardDef>>,
    pub registered_count: i32,
    pub group_count: i32,
    pub results_published: bool,
    pub leaderboard_snapshot: Option<Json<serde_json::Value>>,
    pub award_results: Option<Json<Vec<AwardResult>>>,
    pub status: TournamentStatus,
    pub created_at: String,
    pub updated_at: String,
}

impl Tournament {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        club_id: String,
        tournament_no: String,
        name: String,
        format: TournamentFormat,
        start_date: String,
        end_date: String,
        total_holes: i32,
        max_players: i32,
    ) -> Self {
        let now = Utc::now().to_rfc3339();
        Self {
            id: Uuid::new_v4().to_string(),
            club_id,
            tournament_no,
            name,
            format,
            start_date,
            end_date,
            total_holes,
            max_players,
            member_only: false,
            handicap_min: None,
            handicap_max: None,
            registration_deadline: None,
            handicap_allowed: true,
            tie_breaker: None,
            group_size: 4,
            start_type: "tee_times".to_string(),
            tee_times: Json(Vec::new()),
            awards: Json(Vec::new()),
            registered_count: 0,
            group_count: 0,
            results_published: false,
            leaderboard_snapshot: None,
            award_results: None,
            status: TournamentStatus::Draft,
            created_at: now.clone(),
            updated_at: now,
        }
    }

    /// Number of rounds derived from total holes (18 holes per round).
    pub fn round_count(&self) -> i32 {
        (self.total_holes + 17) / 18
    }
}

// ============================================================================
// Registration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
pub enum RegistrationStatus {
    Confirmed,
    Waitlisted,
    Cancelled,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TournamentRegistration {
    pub id: String,
    pub tournament_id: String,
    /// Tournament-scoped sequence
    pub reg_no: i64,
    pub player_id: Option<String>,
    pub player_name: String,
    pub phone: Option<String>,
    pub identity_code: Option<String>,
    /// Handicap snapshot taken at registration time; later changes in the
    /// player directory do not retroactively alter standings.
    pub handicap: f64,
    pub status: RegistrationStatus,
    pub group_id: Option<String>,
    pub group_no: Option<i32>,
    pub tee_time: Option<String>,
    pub starting_hole: Option<i32>,
    pub registered_at: String,
}

impl TournamentRegistration {
    pub fn new(
        tournament_id: String,
        reg_no: i64,
        player_id: Option<String>,
        player_name: String,
        phone: Option<String>,
        identity_code: Option<String>,
        handicap: f64,
        status: RegistrationStatus,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tournament_id,
            reg_no,
            player_id,
            player_name,
            phone,
            identity_code,
            handicap,
            status,
            group_id: None,
            group_no: None,
            tee_time: None,
            starting_hole: None,
            registered_at: Utc::now().to_rfc3339(),
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupMember {
    pub reg_id: String,
    pub player_id: Option<String>,
    pub player_name: String,
    pub handicap: f64,
    pub order_in_group: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TournamentGroup {
    pub id: String,
    pub tournament_id: String,
    /// 1-based, dense
    pub group_no: i32,
    pub tee_time: Option<String>,
    pub starting_hole: i32,
    pub players: Json<Vec<GroupMember>>,
    pub created_at: String,
}

impl TournamentGroup {
    pub fn new(
        tournament_id: String,
        group_no: i32,
        tee_time: Option<String>,
        starting_hole: i32,
        players: Vec<GroupMember>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            tournament_id,
            group_no,
            tee_time,
            starting_hole,
            players: Json(players),
            created_at: Utc::now().to_rfc3339(),
        }
    }
}

// ============================================================================
// Scorecards
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ScoreCard {
    pub id: String,
    pub tournament_id: String,
    pub round: i32,
    pub reg_id: Option<String>,
    pub player_id: Option<String>,
    pub player_name: Option<String>,
    pub handicap: f64,
    pub gross_score: Option<i32>,
    pub net_score: Option<i32>,
    pub hole_scores: Json<Vec<Option<i32>>>,
    pub hole_pars: Json<Vec<Option<i32>>>,
    pub stableford_points: Option<i32>,
    pub attested_by: Option<String>,
    pub attested_by_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

// ============================================================================
// Points ledger
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PointTransaction {
    pub id: String,
    pub club_id: String,
    pub player_id: String,
    pub amount: i64,
    pub source_type: String,
    pub source_id: String,
    pub description: Option<String>,
    pub created_at: String,
}

impl PointTransaction {
    pub fn new(
        club_id: String,
        player_id: String,
        amount: i64,
        source_type: String,
        source_id: String,
        description: Option<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            club_id,
            player_id,
            amount,
            source_type,
            source_id,
            description,
            created_at: Utc::now().to_rfc3339(),
        }
    }
}
