pub mod answer;
pub mod prompt;
pub mod provider;
pub mod submission;
pub mod verdict;

pub use answer::{AnswerValue, ExtractionPhase, SolvedAnswer};
pub use prompt::PromptContext;
pub use provider::ProviderKind;
pub use submission::{SubmissionPayload, SubmitRequest};
pub use verdict::Verdict;
