//! Gateway implementations.
//!
//! - `NetboxClient`: the NetBox REST API over HTTP
//! - `MemoryGateway`: an in-process inventory with the same contract, used by tests

pub mod memory;
pub mod netbox;

pub use memory::{CallCounts, MemoryGateway};
pub use netbox::{ClientConfig, NetboxClient};
