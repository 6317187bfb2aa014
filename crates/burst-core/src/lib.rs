//! burst-core: wire format, message buffers, routing info and configuration
//! shared by the datapath and everything that drives it.

pub mod checksum;
pub mod config;
pub mod msgbuf;
pub mod routing;
pub mod wire;

pub use config::DatapathConfig;
pub use msgbuf::MsgBuffer;
pub use routing::{Endpoint, RoutingInfo};
pub use wire::{PktHdr, PKT_HDR_SIZE};
