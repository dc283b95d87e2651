//! This crate contains implementations of the [`Engine`](adhocsim_core::Engine) trait.
//! The types here bridge `adhocsim` and the simulators that actually move packets.

#![warn(unreachable_pub, missing_debug_implementations, missing_docs)]

pub mod ideal;
pub mod ns3;

mod utils;

pub use crate::ideal::IdealEngine;
pub use crate::ns3::Ns3Engine;
