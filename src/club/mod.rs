//! Narrow interfaces to the rest of the club backend: the read-only player
//! directory, the loyalty points ledger, and the notification dispatcher.

pub mod directory;
pub mod notify;
pub mod points;

pub use directory::PlayerDirectory;
pub use notify::NotificationDispatcher;
pub use points::PointsLedger;
