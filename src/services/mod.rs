pub mod answer_extractor;
pub mod model_backend;
pub mod page_fetcher;
pub mod submitter;

pub use answer_extractor::extract;
pub use model_backend::{build_backend, AnthropicBackend, ModelBackend, OpenAiBackend};
pub use page_fetcher::{BrowserPageFetcher, PageFetcher};
pub use submitter::{HttpSubmitter, Submitter};
