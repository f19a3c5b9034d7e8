pub mod merge;
pub mod policy;
pub mod transport;

pub use merge::{MergeOutcome, merge_entry};
pub use policy::{AppendOnly, MergePolicy, Tombstoning};
pub use transport::{ClusterTransport, FnTransport, GossipEndpoint, InMemoryGossip, NoopTransport};
