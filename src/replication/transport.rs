use crate::core::{LogError, Result};
use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Mutex};

/// Outbound side of the cluster as seen by a log.
pub trait ClusterTransport: Send + Sync {
    /// Best-effort delivery of `payload` to the other members.
    fn broadcast(&self, payload: Vec<u8>) -> Result<()>;

    /// True when the transport already floods `payload` to every member on
    /// its own, so forwarding it again would only add traffic.
    fn is_oversized(&self, _payload: &[u8]) -> bool {
        false
    }
}

/// Drops every broadcast. Used until a real transport is attached.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTransport;

impl ClusterTransport for NoopTransport {
    fn broadcast(&self, _payload: Vec<u8>) -> Result<()> {
        Ok(())
    }
}

/// Adapts a plain callback into a transport that never reports oversized
/// payloads.
pub struct FnTransport<F> {
    callback: F,
}

impl<F> FnTransport<F>
where
    F: Fn(Vec<u8>) -> Result<()> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

impl<F> ClusterTransport for FnTransport<F>
where
    F: Fn(Vec<u8>) -> Result<()> + Send + Sync,
{
    fn broadcast(&self, payload: Vec<u8>) -> Result<()> {
        (self.callback)(payload)
    }
}

// ============================================================================
// In-memory Gossip
// ============================================================================

/// An in-process broadcast hub for tests and single-binary clusters.
///
/// Every registered peer owns an inbox; a broadcast from one endpoint lands
/// in every other peer's inbox and stays there until drained.
#[derive(Clone, Default)]
pub struct InMemoryGossip {
    peers: Arc<Mutex<HashMap<String, VecDeque<Vec<u8>>>>>,
    oversized_threshold: Option<usize>,
}

impl InMemoryGossip {
    pub fn new() -> Self {
        Self::default()
    }

    /// Payloads strictly larger than `bytes` are reported as oversized.
    pub fn with_oversized_threshold(mut self, bytes: usize) -> Self {
        self.oversized_threshold = Some(bytes);
        self
    }

    pub fn register_peer(&self, node_id: impl Into<String>) -> Result<()> {
        let node_id = node_id.into();
        if node_id.trim().is_empty() {
            return Err(LogError::InvalidArgument(
                "node_id must not be empty".to_string(),
            ));
        }
        let mut peers = self.peers.lock()?;
        peers.entry(node_id).or_default();
        Ok(())
    }

    /// Returns the transport a log on `node_id` should broadcast through.
    pub fn endpoint(&self, node_id: &str) -> Result<Arc<GossipEndpoint>> {
        let peers = self.peers.lock()?;
        if !peers.contains_key(node_id) {
            return Err(unknown_peer(node_id));
        }
        Ok(Arc::new(GossipEndpoint {
            node_id: node_id.to_string(),
            hub: self.clone(),
        }))
    }

    /// Takes every message waiting for `node_id`, oldest first.
    pub fn drain(&self, node_id: &str) -> Result<Vec<Vec<u8>>> {
        let mut peers = self.peers.lock()?;
        let inbox = peers.get_mut(node_id).ok_or_else(|| unknown_peer(node_id))?;
        Ok(inbox.drain(..).collect())
    }

    pub fn pending(&self, node_id: &str) -> Result<usize> {
        let peers = self.peers.lock()?;
        peers
            .get(node_id)
            .map(VecDeque::len)
            .ok_or_else(|| unknown_peer(node_id))
    }

    fn publish(&self, from: &str, payload: Vec<u8>) -> Result<()> {
        let mut peers = self.peers.lock()?;
        for (node_id, inbox) in peers.iter_mut() {
            if node_id != from {
                inbox.push_back(payload.clone());
            }
        }
        Ok(())
    }
}

impl fmt::Debug for InMemoryGossip {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InMemoryGossip")
            .field("oversized_threshold", &self.oversized_threshold)
            .finish_non_exhaustive()
    }
}

fn unknown_peer(node_id: &str) -> LogError {
    LogError::Broadcast(format!("gossip peer '{}' is not registered", node_id))
}

/// One peer's handle on an [`InMemoryGossip`] hub.
#[derive(Debug)]
pub struct GossipEndpoint {
    node_id: String,
    hub: InMemoryGossip,
}

impl GossipEndpoint {
    pub fn node_id(&self) -> &str {
        &self.node_id
    }
}

impl ClusterTransport for GossipEndpoint {
    fn broadcast(&self, payload: Vec<u8>) -> Result<()> {
        self.hub.publish(&self.node_id, payload)
    }

    fn is_oversized(&self, payload: &[u8]) -> bool {
        self.hub
            .oversized_threshold
            .is_some_and(|limit| payload.len() > limit)
    }
}
