use crate::{
    db::{models::PointTransaction, DbPool},
    error::Result,
};
use std::sync::Arc;

/// Loyalty points ledger. Each award credit is a separate signed
/// transaction; callers treat failures as best-effort.
pub struct PointsLedger {
    pool: Arc<DbPool>,
}

impl PointsLedger {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    pub async fn credit(
        &self,
        club_id: &str,
        player_id: &str,
        amount: i64,
        source_type: &str,
        source_id: &str,
        description: Option<String>,
    ) -> Result<PointTransaction> {
        let tx = PointTransaction::new(
            club_id.to_string(),
            player_id.to_string(),
            amount,
            source_type.to_string(),
            source_id.to_string(),
            description,
        );

        sqlx::query(
            "INSERT INTO point_transactions
                (id, club_id, player_id, amount, source_type, source_id, description, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&tx.id)
        .bind(&tx.club_id)
        .bind(&tx.player_id)
        .bind(tx.amount)
        .bind(&tx.source_type)
        .bind(&tx.source_id)
        .bind(&tx.description)
        .bind(&tx.created_at)
        .execute(&*self.pool)
        .await?;

        tracing::info!(
            "Credited {} points to player {} (source: {}/{})",
            tx.amount,
            tx.player_id,
            tx.source_type,
            tx.source_id
        );

        Ok(tx)
    }
}
