pub mod codec;
pub mod persistence;
pub mod state;

pub use persistence::{ReplaceFile, SnapshotManager, load_snapshot, write_snapshot};
pub use state::StateStore;
