//! Flow statistics. An engine hands back one [`FlowRecord`] of raw counters per flow; the
//! reducer turns each into [`FlowMetrics`].
//!
//! Every derived figure is optional. A flow that never transmitted has no transmit rate rather
//! than a rate of zero, and the same goes for the receive rate, the mean delay of a flow that
//! received nothing, and the loss ratio of a flow with no transmitted packets.

use std::collections::BTreeMap;

use crate::ident::FlowId;
use crate::units::{Bytes, Kbps, Nanosecs};

/// Raw counters for one flow, as collected by the engine's flow monitor.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FlowRecord {
    pub tx_bytes: Bytes,
    pub rx_bytes: Bytes,
    pub tx_packets: u64,
    pub rx_packets: u64,
    pub lost_packets: u64,
    /// The sum of the end-to-end delays of all received packets.
    pub delay_sum: Nanosecs,
}

impl FlowRecord {
    /// Reduces these counters over a run of length `duration`.
    pub fn reduce(&self, duration: Nanosecs) -> FlowMetrics {
        let rate = |bytes: Bytes| (bytes > Bytes::ZERO).then(|| Kbps::over(bytes, duration));
        FlowMetrics {
            tx_bitrate: rate(self.tx_bytes),
            rx_bitrate: rate(self.rx_bytes),
            mean_delay: self.delay_sum.checked_div(self.rx_packets),
            loss_ratio: (self.tx_packets > 0)
                .then(|| self.lost_packets as f64 / self.tx_packets as f64 * 100.0),
        }
    }
}

/// Reduces `record` over a run of length `duration`.
pub fn reduce(record: &FlowRecord, duration: Nanosecs) -> FlowMetrics {
    record.reduce(duration)
}

/// Figures derived from a [`FlowRecord`].
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FlowMetrics {
    /// Average transmit rate, absent if nothing was sent.
    pub tx_bitrate: Option<Kbps>,
    /// Average receive rate, absent if nothing was received.
    pub rx_bitrate: Option<Kbps>,
    /// Mean end-to-end delay, absent if no packet was received.
    pub mean_delay: Option<Nanosecs>,
    /// Lost packets as a percentage of transmitted packets, absent if no packet was sent.
    pub loss_ratio: Option<f64>,
}

/// All flow records of a run, ordered by flow ID.
#[derive(Debug, Default, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct FlowRecords {
    inner: BTreeMap<FlowId, FlowRecord>,
}

impl FlowRecords {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: FlowId, record: FlowRecord) -> Option<FlowRecord> {
        self.inner.insert(id, record)
    }

    pub fn get(&self, id: FlowId) -> Option<&FlowRecord> {
        self.inner.get(&id)
    }

    /// The record for `id`, or an all-zero record if the engine never saw that flow.
    pub fn get_or_default(&self, id: FlowId) -> FlowRecord {
        self.get(id).copied().unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlowId, &FlowRecord)> + '_ {
        self.inner.iter().map(|(&id, record)| (id, record))
    }

    delegate::delegate! {
        to self.inner {
            pub fn len(&self) -> usize;

            pub fn is_empty(&self) -> bool;
        }
    }
}

impl FromIterator<(FlowId, FlowRecord)> for FlowRecords {
    fn from_iter<T: IntoIterator<Item = (FlowId, FlowRecord)>>(iter: T) -> Self {
        Self {
            inner: iter.into_iter().collect(),
        }
    }
}
