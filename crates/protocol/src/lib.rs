pub mod chunk;
pub mod constants;
pub mod envelope;
pub mod error;
pub mod messages;
pub mod types;

// Re-export primary types for convenience.
pub use constants::MessageType;
pub use envelope::Message;
pub use error::{ErrorName, RpcError};
pub use types::{Entry, FileSystemInfo, Flags, Link, Metadata, ReadOptions, WriteOptions};
