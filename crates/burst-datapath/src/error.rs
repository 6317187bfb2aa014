use thiserror::Error;

/// Reasons a transport cannot be built from a configuration. The transmit
/// and receive paths themselves never return errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DatapathError {
    #[error("mtu {mtu} exceeds mbuf data room {room}")]
    MtuTooLarge { mtu: usize, room: usize },
    #[error("mtu {mtu} leaves no room for payload after a {hdr}-byte header")]
    MtuTooSmall { mtu: usize, hdr: usize },
    #[error("tx.max_batch must be non-zero")]
    EmptyTxBatch,
    #[error("rx.batch_size must be non-zero")]
    EmptyRxBatch,
    #[error("rx ring of {entries} entries cannot absorb a {batch}-packet poll")]
    RingTooSmall { entries: usize, batch: usize },
    #[error("mempool of {capacity} mbufs cannot back a {entries}-entry rx ring")]
    PoolTooSmall { capacity: usize, entries: usize },
}
