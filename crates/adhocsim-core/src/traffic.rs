//! The ring echo traffic pattern.
//!
//! Every node runs an echo client that targets the next node on the ring, `(i + 1) % N`, while
//! a single echo sink listens on node `N - 1`. The two are independent: most clients address a
//! node with nothing listening, and only client `N - 2` reaches the sink.

use crate::ident::NodeId;

/// The clients, their destinations, and the sink for one run.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct TrafficAssignment {
    destinations: Vec<(NodeId, NodeId)>,
    sink: NodeId,
}

impl TrafficAssignment {
    /// Builds the ring assignment for `nr_nodes` nodes.
    ///
    /// A ring of one node would have its only client address itself, so `nr_nodes` must be at
    /// least 2.
    pub fn build(nr_nodes: usize) -> Result<Self, TrafficError> {
        if nr_nodes < 2 {
            return Err(TrafficError::InvalidTopologySize(nr_nodes));
        }
        let destinations = (0..nr_nodes)
            .map(NodeId::new)
            .map(|client| (client, client.ring_next(nr_nodes)))
            .collect();
        Ok(Self {
            destinations,
            sink: NodeId::new(nr_nodes - 1),
        })
    }

    /// The node running the echo sink.
    pub fn sink(&self) -> NodeId {
        self.sink
    }

    /// The destination of `client`, if it is part of this assignment.
    pub fn destination(&self, client: NodeId) -> Option<NodeId> {
        self.destinations.get(client.inner()).map(|&(_, dst)| dst)
    }

    /// Iterate over `(client, destination)` pairs in client order.
    pub fn destinations(&self) -> impl Iterator<Item = (NodeId, NodeId)> + '_ {
        self.destinations.iter().copied()
    }

    /// The clients whose traffic is addressed to the sink.
    pub fn clients_addressing_sink(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.destinations()
            .filter_map(|(client, dst)| (dst == self.sink).then_some(client))
    }

    pub fn nr_nodes(&self) -> usize {
        self.destinations.len()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TrafficError {
    #[error("a ring needs at least 2 nodes (got {0})")]
    InvalidTopologySize(usize),
}
