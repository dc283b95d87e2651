//! Default scenario constants. These are the values used when a [`RunParameters`] field is not
//! set explicitly.
//!
//! [`RunParameters`]: crate::params::RunParameters

use std::net::Ipv4Addr;
use std::num::NonZeroUsize;

use crate::units::{Bytes, Nanosecs};

/// Number of nodes per grid row.
pub const GRID_WIDTH: NonZeroUsize = match NonZeroUsize::new(6) {
    Some(width) => width,
    None => unreachable!(),
};

/// Grid origin, in meters.
pub const GRID_MIN_X: f64 = 0.0;
pub const GRID_MIN_Y: f64 = 0.0;

/// Grid spacing, in meters.
pub const GRID_DELTA_X: f64 = 5.0;
pub const GRID_DELTA_Y: f64 = 10.0;

/// Horizontal spacing of nodes in the animation trace.
pub const ANIM_SPACING: f64 = 10.0;

/// The port the echo sink listens on and clients send to.
pub const PORT: u16 = 443;

/// Echo payload size.
pub const PACKET_SIZE: Bytes = Bytes::new(512);

/// UDP (8B) and IPv4 (20B) headers, counted by the flow monitor on top of the payload.
pub const UDP_IPV4_OVERHEAD: Bytes = Bytes::new(28);

/// The largest payload one UDP datagram over IPv4 can carry.
pub const MAX_UDP_PAYLOAD: Bytes = Bytes::new(65_507);

pub const START_TIME: Nanosecs = Nanosecs::from_secs(1);
pub const STOP_TIME: Nanosecs = Nanosecs::from_secs(25);

pub const INTERVAL: Nanosecs = Nanosecs::from_millis(5);
pub const MAX_PACKETS: u32 = 10;

/// Frames larger than this use an RTS/CTS exchange.
pub const RTS_CTS_THRESHOLD: Bytes = Bytes::new(1000);

pub const IPV4_BASE: Ipv4Addr = Ipv4Addr::new(10, 1, 1, 0);
pub const IPV4_MASK: Ipv4Addr = Ipv4Addr::new(255, 255, 255, 0);

/// Flow IDs below this are never reported.
pub const FIRST_REPORTED_FLOW: u32 = 2;

/// Sweep bounds used by the command-line tool.
pub const MIN_NODES: usize = 2;
pub const MAX_NODES: usize = 30;
