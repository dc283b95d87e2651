//! This module defines [`RunParameters`], the immutable configuration of one simulation run,
//! and [`DeviceParams`], the wireless device and network stack settings it carries.

use std::net::Ipv4Addr;

use derivative::Derivative;

use crate::constants;
use crate::ident::NodeId;
use crate::topology::GridLayout;
use crate::units::{Bytes, Nanosecs};

/// The configuration of one run. A sweep derives one of these per node count from a template
/// with [`RunParameters::with_nodes`].
#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct RunParameters {
    /// The number of nodes.
    #[builder(default = constants::MIN_NODES)]
    pub nr_nodes: usize,
    /// Time between two packets of the same client.
    #[builder(default = constants::INTERVAL, setter(into))]
    pub interval: Nanosecs,
    /// Packets each client sends before going quiet.
    #[builder(default = constants::MAX_PACKETS)]
    pub max_packets: u32,
    /// The port the sink listens on.
    #[builder(default = constants::PORT)]
    pub port: u16,
    /// Echo payload size.
    #[builder(default = constants::PACKET_SIZE, setter(into))]
    pub packet_size: Bytes,
    /// When applications start.
    #[builder(default = constants::START_TIME, setter(into))]
    pub start: Nanosecs,
    /// When applications stop, and when the simulation ends.
    #[builder(default = constants::STOP_TIME, setter(into))]
    pub stop: Nanosecs,
    /// Node placement.
    #[builder(default)]
    pub grid: GridLayout,
    /// Horizontal node spacing in the animation trace.
    #[builder(default = constants::ANIM_SPACING)]
    pub anim_spacing: f64,
    /// Wireless device and network stack settings.
    #[builder(default)]
    pub device: DeviceParams,
}

impl Default for RunParameters {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl RunParameters {
    /// A copy of these parameters with the node count fixed to `nr_nodes`.
    pub fn with_nodes(&self, nr_nodes: usize) -> Self {
        Self {
            nr_nodes,
            ..self.clone()
        }
    }

    /// The time between application start and stop.
    pub fn duration(&self) -> Nanosecs {
        Nanosecs::new(self.stop.into_u64().saturating_sub(self.start.into_u64()))
    }

    /// Checks the invariants the scenario relies on.
    ///
    /// Correctness properties:
    ///
    /// - The stop time must come after the start time.
    /// - Clients must wait a nonzero interval between packets.
    /// - Every node's flow must have a 32-bit flow ID.
    pub fn validate(&self) -> Result<(), ParamsError> {
        // CORRECTNESS: The stop time must come after the start time.
        if self.stop <= self.start {
            return Err(ParamsError::EmptyWindow {
                start: self.start,
                stop: self.stop,
            });
        }
        // CORRECTNESS: Clients must wait a nonzero interval between packets.
        if self.interval == Nanosecs::ZERO {
            return Err(ParamsError::ZeroInterval);
        }
        // CORRECTNESS: Every node's flow must have a 32-bit flow ID.
        if u32::try_from(self.nr_nodes).is_err() {
            return Err(ParamsError::TooManyNodes(self.nr_nodes));
        }
        Ok(())
    }
}

/// Invalid run parameters.
#[derive(Debug, thiserror::Error)]
pub enum ParamsError {
    #[error("stop time {stop} does not come after start time {start}")]
    EmptyWindow { start: Nanosecs, stop: Nanosecs },

    #[error("the inter-packet interval must be nonzero")]
    ZeroInterval,

    #[error("{0} nodes have more flows than flow IDs")]
    TooManyNodes(usize),
}

/// Wireless device and network stack settings. Every node gets an ad-hoc MAC on a shared
/// channel.
#[derive(Debug, Clone, PartialEq, typed_builder::TypedBuilder, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct DeviceParams {
    #[builder(default)]
    pub standard: WifiStandard,
    /// Frames larger than this use an RTS/CTS exchange.
    #[builder(default = constants::RTS_CTS_THRESHOLD, setter(into))]
    pub rts_cts_threshold: Bytes,
    /// The network addresses are assigned from.
    #[builder(default = constants::IPV4_BASE)]
    pub ipv4_base: Ipv4Addr,
    #[builder(default = constants::IPV4_MASK)]
    pub ipv4_mask: Ipv4Addr,
    /// Capture packets on every device.
    #[builder(default)]
    pub pcap: bool,
    /// Have the echo applications log every packet.
    #[builder(default)]
    pub app_logging: bool,
}

impl Default for DeviceParams {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DeviceParams {
    /// The number of assignable host addresses in the network.
    pub fn nr_hosts(&self) -> usize {
        let host_bits = u32::from(self.ipv4_mask).count_zeros();
        (1usize << host_bits).saturating_sub(2)
    }

    /// The address assigned to `node`. Addresses are handed out in node order, starting at the
    /// first host of the network. Returns `None` if the network is too small.
    pub fn address_of(&self, node: NodeId) -> Option<Ipv4Addr> {
        let host = node.inner() + 1;
        if host > self.nr_hosts() {
            return None;
        }
        let net = u32::from(self.ipv4_base) & u32::from(self.ipv4_mask);
        Some(Ipv4Addr::from(net + host as u32))
    }
}

/// The Wi-Fi standard installed on every device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Derivative, serde::Serialize, serde::Deserialize)]
#[derivative(Default)]
#[serde(rename_all = "lowercase")]
pub enum WifiStandard {
    /// 802.11p, vehicular.
    #[derivative(Default)]
    Ieee80211p,
    Ieee80211a,
    Ieee80211b,
    Ieee80211g,
    Ieee80211n,
}

impl WifiStandard {
    pub fn as_str(&self) -> &'static str {
        match self {
            WifiStandard::Ieee80211p => "80211p",
            WifiStandard::Ieee80211a => "80211a",
            WifiStandard::Ieee80211b => "80211b",
            WifiStandard::Ieee80211g => "80211g",
            WifiStandard::Ieee80211n => "80211n",
        }
    }

    /// The lowest mandatory data rate, in bits per second.
    pub fn base_rate(&self) -> u64 {
        match self {
            WifiStandard::Ieee80211p => 3_000_000,
            WifiStandard::Ieee80211a | WifiStandard::Ieee80211g => 6_000_000,
            WifiStandard::Ieee80211b => 1_000_000,
            WifiStandard::Ieee80211n => 6_500_000,
        }
    }
}
