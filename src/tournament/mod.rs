mod context;

pub mod awards;
pub mod grouping;
pub mod leaderboard;
pub mod lifecycle;
pub mod manager;
pub mod registration;
pub mod scoring;

pub use manager::TournamentManager;
