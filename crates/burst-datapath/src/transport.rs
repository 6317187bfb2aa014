//! The queue-scoped datapath context.
//!
//! A `Transport` owns one NIC queue pair for one worker: the device handle,
//! the buffer pool, the receive ring and the scratch state the transmit and
//! receive paths reuse between calls. Nothing here is shared across threads.

use burst_core::wire::PKT_HDR_SIZE;
use burst_core::{DatapathConfig, Endpoint};

use crate::checks::Checks;
use crate::device::EthDev;
use crate::error::DatapathError;
use crate::mbuf::{Mbuf, Mempool, MBUF_DATA_ROOM};
use crate::ring::RxRing;

/// Datapath counters. Plain integers; read them through `Transport::stats`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransportStats {
    /// `tx_flush` calls.
    pub tx_flush_count: u64,
    /// Resubmissions of a partially accepted batch.
    pub tx_retries: u64,
    /// "Queue stuck" warnings raised while retrying.
    pub tx_stall_warnings: u64,
    pub tx_pkts: u64,
    pub rx_pkts: u64,
    /// Packets discarded by `drain`.
    pub drained_pkts: u64,
}

pub struct Transport<D: EthDev> {
    pub(crate) dev: D,
    pub(crate) pool: Mempool,
    pub(crate) queue: u16,
    pub(crate) endpoint: Endpoint,
    pub(crate) mtu: usize,
    pub(crate) tx_max_batch: usize,
    pub(crate) tx_stall_warn_interval: u64,
    pub(crate) rx_batch_size: usize,
    pub(crate) rx_ring: RxRing,
    pub(crate) rx_ring_full: bool,
    /// Packets returned by the last device poll, before they enter the ring.
    pub(crate) rx_pkts: Vec<Mbuf>,
    /// Descriptors of the batch being transmitted. Empty between calls.
    pub(crate) tx_mbufs: Vec<Option<Mbuf>>,
    pub(crate) checks: Checks,
    pub(crate) stats: TransportStats,
}

impl<D: EthDev> Transport<D> {
    /// Bind queue `queue` of `dev`, validating the datapath configuration.
    /// `endpoint` is the local identity received frames are checked against.
    pub fn new(
        dev: D,
        pool: Mempool,
        queue: u16,
        endpoint: Endpoint,
        config: &DatapathConfig,
    ) -> Result<Self, DatapathError> {
        let mtu = config.wire.mtu;
        if mtu > MBUF_DATA_ROOM {
            return Err(DatapathError::MtuTooLarge {
                mtu,
                room: MBUF_DATA_ROOM,
            });
        }
        if mtu <= PKT_HDR_SIZE {
            return Err(DatapathError::MtuTooSmall {
                mtu,
                hdr: PKT_HDR_SIZE,
            });
        }
        if config.tx.max_batch == 0 {
            return Err(DatapathError::EmptyTxBatch);
        }
        if config.rx.batch_size == 0 {
            return Err(DatapathError::EmptyRxBatch);
        }
        if config.rx.ring_entries <= config.rx.batch_size {
            return Err(DatapathError::RingTooSmall {
                entries: config.rx.ring_entries,
                batch: config.rx.batch_size,
            });
        }
        if pool.capacity() < config.rx.ring_entries {
            return Err(DatapathError::PoolTooSmall {
                capacity: pool.capacity(),
                entries: config.rx.ring_entries,
            });
        }

        let checks = Checks::from_config(&config.checks);
        tracing::info!(
            queue,
            endpoint = %endpoint,
            mtu,
            max_data_per_pkt = config.wire.max_data_per_pkt(),
            ring_entries = config.rx.ring_entries,
            pool = pool.capacity(),
            ?checks,
            "transport queue ready"
        );

        Ok(Self {
            dev,
            pool,
            queue,
            endpoint,
            mtu,
            tx_max_batch: config.tx.max_batch,
            tx_stall_warn_interval: config.tx.stall_warn_interval,
            rx_batch_size: config.rx.batch_size,
            rx_ring: RxRing::new(config.rx.ring_entries),
            rx_ring_full: false,
            rx_pkts: Vec::with_capacity(config.rx.batch_size),
            tx_mbufs: Vec::with_capacity(config.tx.max_batch),
            checks,
            stats: TransportStats::default(),
        })
    }

    #[inline]
    pub fn queue(&self) -> u16 {
        self.queue
    }

    #[inline]
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    #[inline]
    pub fn mtu(&self) -> usize {
        self.mtu
    }

    /// Payload bytes per packet; message buffers sent through this transport
    /// must be split at this size.
    #[inline]
    pub fn max_data_per_pkt(&self) -> usize {
        self.mtu - PKT_HDR_SIZE
    }

    #[inline]
    pub fn max_tx_batch(&self) -> usize {
        self.tx_max_batch
    }

    /// Received packets not yet released with `post_recvs`.
    #[inline]
    pub fn rx_ring(&self) -> &RxRing {
        &self.rx_ring
    }

    #[inline]
    pub fn stats(&self) -> &TransportStats {
        &self.stats
    }

    #[inline]
    pub fn checks(&self) -> Checks {
        self.checks
    }

    #[inline]
    pub fn device(&self) -> &D {
        &self.dev
    }

    #[inline]
    pub fn device_mut(&mut self) -> &mut D {
        &mut self.dev
    }

    #[inline]
    pub fn pool(&self) -> &Mempool {
        &self.pool
    }
}

impl<D: EthDev> Drop for Transport<D> {
    fn drop(&mut self) {
        let outstanding = self.rx_ring.len();
        while let Some(mbuf) = self.rx_ring.release_oldest() {
            mbuf.free();
        }
        tracing::debug!(
            queue = self.queue,
            released = outstanding,
            "transport queue closed"
        );
    }
}
