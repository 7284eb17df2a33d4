pub mod checkpoint;
pub mod file;
pub mod memory;
pub mod traits;

pub use checkpoint::Checkpoint;
pub use file::FileCheckpointStore;
pub use memory::MemoryCheckpointStore;
pub use traits::{CheckpointStore, StorageError};
