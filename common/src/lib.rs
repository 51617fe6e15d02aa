pub mod batch;
pub mod job;
pub mod logs;
pub mod task;

pub use batch::{BatchRequest, BatchSummary, BatchTaskOutcome, BatchTaskStatus};
pub use job::{Job, JobCreate, JobId, JobStatus};
pub use logs::{LogContent, LogFile};
pub use task::{Frequency, OutputFormat, TaskConfig, TaskUpdate};
