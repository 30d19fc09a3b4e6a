pub mod command;
pub mod event;
pub mod job;
pub mod sheet;
pub mod tracking;

pub use command::{Ack, Command, CommandResponse};
pub use event::{CrawlSummary, Event, ExportSummary, ProgressEvent, StatusSnapshot};
pub use job::{AutoRerunConfig, JobKind, JobState, OrderJobParams, TabId};
pub use sheet::SheetRef;
pub use tracking::{Lookup, TrackingRecord, TrackingUpdate};
