pub mod cloudwatch;
pub mod resolver;
pub mod traits;
pub mod types;

pub use cloudwatch::CloudWatchLogs;
pub use resolver::StreamResolver;
pub use traits::{EventPage, FetchError, FetchRequest, LogReader, StreamLister};
pub use types::{OutputEvent, ResolvedStream, SourcePartitionKey, StreamSummary};
