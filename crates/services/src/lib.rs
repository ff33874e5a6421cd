#![forbid(unsafe_code)]

pub mod error;
pub mod placement;
pub mod stats_service;

pub use placement_core::Clock;

pub use error::{BatchError, PlacementError, StatsServiceError};

pub use placement::{
    PlacementService, QuestionView, StartedTest, SubmitOutcome, TestStatus,
};
pub use stats_service::StatsService;
