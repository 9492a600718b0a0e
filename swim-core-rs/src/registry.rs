//! Node registry: the authoritative membership state.
//!
//! Holds the lifecycle state of every known node, applies transitions
//! atomically, and turns them into events on two channels:
//! - public [`MembershipEvent`]s (join on `Init -> Healthy`, leave on any
//!   transition into `Dead` or `Left`)
//! - internal [`StateChanged`] records for every transition that alters the
//!   store
//!
//! Target selection (`next`) round-robins over `Healthy` and `Suspicion`
//! nodes with a shared cursor that lives outside the store lock. Snapshot and
//! cursor advance are not one transaction, so concurrent membership changes
//! can cause skips or repeats. `Dead` entries are purged whenever the cursor
//! wraps to zero.

use crate::channel::{EventChannel, EventReceiver};
use crate::config::RegistryConfig;
use crate::error::{RegistryError, Result};
use crate::types::{MembershipEvent, NodeAddress, NodeState, StateChanged};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info, info_span, Span};

/// Point-in-time copy of the registry contents, ordered by address
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipSnapshot {
    pub nodes: Vec<(NodeAddress, NodeState)>,
}

impl MembershipSnapshot {
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Concurrency-safe registry of cluster nodes
pub struct Registry {
    nodes: RwLock<BTreeMap<NodeAddress, NodeState>>,
    /// Round-robin position for `next`
    cursor: AtomicUsize,
    events: EventChannel<MembershipEvent>,
    state_changes: EventChannel<StateChanged>,
    /// Logging context for transitions
    span: Span,
}

impl Registry {
    /// Create a registry logging under a default `swim_registry` span
    pub fn new(config: RegistryConfig) -> Self {
        Self::with_span(config, info_span!("swim_registry"))
    }

    /// Create a registry whose log lines are recorded inside `span`
    pub fn with_span(config: RegistryConfig, span: Span) -> Self {
        Self {
            nodes: RwLock::new(BTreeMap::new()),
            cursor: AtomicUsize::new(0),
            events: EventChannel::new(config.event_capacity),
            state_changes: EventChannel::new(config.state_change_capacity),
            span,
        }
    }

    /// Receiver for public join/leave events
    pub fn membership_events(&self) -> EventReceiver<MembershipEvent> {
        self.events.receiver()
    }

    /// Receiver for internal state change records
    pub fn state_changes(&self) -> EventReceiver<StateChanged> {
        self.state_changes.receiver()
    }

    /// Start tracking `address` in `Init`. No-op if already tracked.
    pub fn add_node(&self, address: NodeAddress) {
        self.nodes.write().entry(address).or_insert(NodeState::Init);
    }

    /// Move `address` to `new_state`.
    ///
    /// Does nothing if the node is already in `new_state`. Otherwise the
    /// store is updated, the transition is logged and the derived events are
    /// offered, all under the store's write lock so event order matches the
    /// order of transitions.
    pub fn change_node_state(&self, address: &NodeAddress, new_state: NodeState) -> Result<()> {
        let mut nodes = self.nodes.write();
        let current = nodes
            .get_mut(address)
            .ok_or_else(|| RegistryError::UnknownNode(address.clone()))?;

        if *current == new_state {
            return Ok(());
        }

        let old_state = std::mem::replace(current, new_state);

        self.span.in_scope(|| {
            info!(node = %address, from = %old_state, to = %new_state, "node state changed");
        });

        if let Some(event) = membership_event(address, old_state, new_state) {
            self.events.offer(event);
        }
        self.state_changes
            .offer(StateChanged::new(address.clone(), old_state, new_state));

        Ok(())
    }

    /// Stop tracking `address`. Absent nodes are ignored; no event is emitted.
    pub fn disconnect(&self, address: &NodeAddress) {
        self.nodes.write().remove(address);
    }

    /// Current state of `address`
    pub fn node_state(&self, address: &NodeAddress) -> Result<NodeState> {
        self.nodes
            .read()
            .get(address)
            .copied()
            .ok_or_else(|| RegistryError::UnknownNode(address.clone()))
    }

    pub fn contains(&self, address: &NodeAddress) -> bool {
        self.nodes.read().contains_key(address)
    }

    /// Number of tracked nodes in any state
    pub fn number_of_nodes(&self) -> usize {
        self.nodes.read().len()
    }

    /// Nodes currently `Healthy`
    pub fn healthy_nodes(&self) -> Vec<NodeAddress> {
        self.nodes_in(NodeState::Healthy)
    }

    /// Nodes currently in `state`
    pub fn nodes_in(&self, state: NodeState) -> Vec<NodeAddress> {
        self.nodes
            .read()
            .iter()
            .filter(|(_, s)| **s == state)
            .map(|(addr, _)| addr.clone())
            .collect()
    }

    /// Pick the next probe/gossip target among `Healthy` and `Suspicion`
    /// nodes, skipping `exclude`.
    ///
    /// Purges `Dead` entries whenever the cursor wraps to zero, including
    /// when there is nothing eligible.
    pub fn next(&self, exclude: Option<&NodeAddress>) -> Option<NodeAddress> {
        let eligible: Vec<NodeAddress> = self
            .nodes
            .read()
            .iter()
            .filter(|(addr, state)| state.is_eligible() && Some(*addr) != exclude)
            .map(|(addr, _)| addr.clone())
            .collect();

        let index = self.advance_cursor(eligible.len());
        if index == 0 {
            self.purge_dead();
        }

        eligible.get(index).cloned()
    }

    /// Advance the shared cursor against a list of `len` candidates and
    /// return the new position
    fn advance_cursor(&self, len: usize) -> usize {
        let last = len.saturating_sub(1);
        let step = |cursor: usize| if cursor < last { cursor + 1 } else { 0 };

        let previous = match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some(step(c)))
        {
            Ok(previous) | Err(previous) => previous,
        };
        step(previous)
    }

    /// Remove every `Dead` entry, returning the removed addresses
    pub fn purge_dead(&self) -> Vec<NodeAddress> {
        let mut nodes = self.nodes.write();
        let dead: Vec<NodeAddress> = nodes
            .iter()
            .filter(|(_, state)| **state == NodeState::Dead)
            .map(|(addr, _)| addr.clone())
            .collect();

        for addr in &dead {
            nodes.remove(addr);
        }

        if !dead.is_empty() {
            self.span.in_scope(|| {
                debug!(purged = dead.len(), remaining = nodes.len(), "purged dead nodes");
            });
        }

        dead
    }

    /// Consistent copy of every entry
    pub fn snapshot(&self) -> MembershipSnapshot {
        let nodes = self
            .nodes
            .read()
            .iter()
            .map(|(addr, state)| (addr.clone(), *state))
            .collect();
        MembershipSnapshot { nodes }
    }

    /// Human-readable summary for operators
    pub fn describe(&self) -> String {
        let snapshot = self.snapshot();
        let mut out = format!("Registry: {} nodes", snapshot.len());
        for (addr, state) in &snapshot.nodes {
            out.push_str(&format!("\n  {} {}", addr, state));
        }
        out
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(RegistryConfig::default())
    }
}

impl fmt::Display for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe())
    }
}

/// Public event implied by a transition, if any
fn membership_event(
    address: &NodeAddress,
    old_state: NodeState,
    new_state: NodeState,
) -> Option<MembershipEvent> {
    match (old_state, new_state) {
        (_, new_state) if new_state.is_terminal() => {
            Some(MembershipEvent::Leave(address.clone()))
        }
        (NodeState::Init, NodeState::Healthy) => Some(MembershipEvent::Join(address.clone())),
        _ => None,
    }
}
