/// Data model shared by the engine and its callers.
pub mod file_node;
pub mod request;
pub mod volume;

pub use file_node::{FileNode, ROOT_NAME};
pub use request::{Mode, OperationRequest, SortOptions, SortOrder};
pub use volume::{ArbitrationHandle, Volume};
