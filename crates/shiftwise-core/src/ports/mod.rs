pub mod store;

pub use store::{ApplyCommit, ApplyFailureRecord, CommitOutcome, ScheduleStore};
