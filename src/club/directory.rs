use crate::{
    db::{models::Player, DbPool},
    error::Result,
};
use std::sync::Arc;

/// Read-only lookup into the club's player records. Used at registration
/// time only; scorecards carry the handicap supplied at scoring time.
pub struct PlayerDirectory {
    pool: Arc<DbPool>,
}

impl PlayerDirectory {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, club_id: &str, player_id: &str) -> Result<Option<Player>> {
        let player = sqlx::query_as::<_, Player>(
            "SELECT * FROM players WHERE club_id = ? AND id = ?",
        )
        .bind(club_id)
        .bind(player_id)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(player)
    }

    pub async fn find_by_identity_code(
        &self,
        club_id: &str,
        identity_code: &str,
    ) -> Result<Option<Player>> {
        let player = sqlx::query_as::<_, Player>(
            "SELECT * FROM players WHERE club_id = ? AND identity_code = ?",
        )
        .bind(club_id)
        .bind(identity_code)
        .fetch_optional(&*self.pool)
        .await?;

        Ok(player)
    }

    /// Whether the identity code denotes a current club member.
    pub async fn is_member(&self, club_id: &str, identity_code: &str) -> Result<bool> {
        let player = self.find_by_identity_code(club_id, identity_code).await?;
        Ok(player.map(|p| p.is_member).unwrap_or(false))
    }
}
