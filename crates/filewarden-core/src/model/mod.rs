/// Data model for FileWarden.
///
/// Re-exports the identity types and the snapshot store shared between the
/// scheduler and the command dispatcher.
pub mod identity;
pub mod size;
pub mod snapshot;

pub use identity::{CommandRequest, UserId};
pub use snapshot::{entry_set, EntrySet, SnapshotStore};
