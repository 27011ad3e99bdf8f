pub mod tournaments;

pub use tournaments::{router as tournaments_router, TournamentAppState};
