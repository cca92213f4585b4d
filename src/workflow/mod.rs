pub mod quiz_ctx;
pub mod quiz_flow;

pub use quiz_ctx::QuizCtx;
pub use quiz_flow::{QuizFlow, StepPolicy};
