//! Configuration entries for installed SmartApps
//!
//! One entry represents one authorized binding between the bridge and a
//! location's device set. Entries carry typed SmartApp credentials, move
//! through a lifecycle state machine during setup/unload, and persist to a
//! versioned JSON storage file. The refresh token field is rewritten in
//! place whenever the broker regenerates tokens.

mod entry;
mod manager;
mod storage;

pub use entry::{format_unique_id, is_valid_uid, ConfigEntry, ConfigEntryState, SmartAppData};
pub use manager::{ConfigEntries, ConfigEntriesError, ConfigEntriesResult};
pub use storage::{Storage, StorageError, StorageFile, StorageResult};
