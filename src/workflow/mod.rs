pub mod pagination;
pub mod reporter;
pub mod tracking_flow;

pub use pagination::{
    PaginationOutcome, PaginationReport, PaginationSession, PaginationWalker, MAX_PAGES,
};
pub use reporter::{ProgressSink, RecordingSink};
pub use tracking_flow::{OrderTrackingPipeline, TrackingOutcome, TrackingPages};
