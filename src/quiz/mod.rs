pub mod fetcher;
pub mod model;
pub mod navigator;
pub mod runner;
pub mod scorer;
pub mod session;

pub use fetcher::{BatchFetcher, FetchOutcome};
pub use model::{Options, Question, QuestionBatch, SessionId, StartedQuiz};
pub use navigator::{
    Advance, FetchApplied, FetchRequest, FetchTicket, FinishReason, Navigator, QuizState,
};
pub use runner::{QuizRunner, Step};
pub use scorer::{QuestionOutcome, ScoreReport};
pub use session::Session;
