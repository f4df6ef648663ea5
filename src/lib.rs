pub mod auth;
pub mod clients;
pub mod config;
pub mod core;
pub mod error;
pub mod export;
pub mod quiz;
pub mod report;
pub mod terminal;

// Convenient re-exports
pub use auth::AuthContext;
pub use config::ClientConfig;
pub use quiz::{Navigator, QuizRunner, ScoreReport};
