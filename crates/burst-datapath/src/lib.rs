//! burst-datapath: the packet-level transmit and receive paths of the
//! transport, driving one NIC queue pair through a poll-mode driver
//! interface.
//!
//! - `format`: per-packet header formatting
//! - `tx`: the transmit engine
//! - `ring` / `rx`: the receive ring and receive engine
//! - `mbuf` / `device`: driver buffers and the NIC interface
//! - `sim`: an in-memory NIC for tests and local runs

pub mod checks;
pub mod device;
pub mod error;
pub mod format;
pub mod mbuf;
pub mod ring;
pub mod rx;
pub mod sim;
pub mod transport;
pub mod tx;

pub use checks::Checks;
pub use device::EthDev;
pub use error::DatapathError;
pub use mbuf::{Mbuf, Mempool};
pub use ring::RxRing;
pub use sim::SimPort;
pub use transport::{Transport, TransportStats};
pub use tx::TxBurstItem;
