use crate::db::models::Tournament;

/// Fire-and-forget bridge to the club's notification service.
///
/// Lifecycle transitions must never stall on the notifier, so dispatch
/// errors are logged and swallowed here; the state change has already been
/// committed by the time this runs.
pub struct NotificationDispatcher;

impl NotificationDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub async fn notify_tournament(
        &self,
        club_id: &str,
        event_type: &str,
        tournament: &Tournament,
        recipient_player_ids: &[String],
    ) {
        // The real transport lives in the club notification service; this
        // core only hands the event off.
        tracing::info!(
            "Tournament notification: club={} event={} tournament={} ({}) recipients={}",
            club_id,
            event_type,
            tournament.name,
            tournament.id,
            recipient_player_ids.len()
        );
    }
}

impl Default for NotificationDispatcher {
    fn default() -> Self {
        Self::new()
    }
}
