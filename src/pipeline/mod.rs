pub mod clock;
pub mod error;
pub mod mapper;
pub mod poll;
pub mod runner;
pub mod task;
pub mod window;

pub use clock::{Clock, SystemClock};
pub use error::SourceError;
pub use mapper::{derive_topic, map_event, OutputRecord, ValueSchema};
pub use poll::PollCycle;
pub use runner::{commit_checkpoints, run_source, PipelineError, RunStats};
pub use task::{SourceClients, SourceTask, TaskStatus};
pub use window::{StartPolicy, WindowTracker};
