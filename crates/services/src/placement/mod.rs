mod batch;
mod service;
mod view;

// Public API of the placement subsystem.
pub use crate::error::PlacementError;
pub use service::{PlacementService, StartedTest, SubmitOutcome, TestStatus};
pub use view::QuestionView;
