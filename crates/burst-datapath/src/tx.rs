//! Transmit path: turn send descriptors into driver buffers and hand them to
//! the NIC, retrying until the whole batch is accepted.
//!
//! Packet 0 of a message goes out as one segment holding its header and the
//! first payload chunk. Every later packet is two chained segments: a copy
//! of its header, then its slice of the payload.

use zerocopy::AsBytes;

use burst_core::wire::{frame_header_to_string, PKT_HDR_SIZE};
use burst_core::{MsgBuffer, RoutingInfo};

use crate::device::EthDev;
use crate::format::format_pkthdr;
use crate::mbuf::Mbuf;
use crate::transport::Transport;

/// One packet to send: packet `pkt_idx` of `msg_buffer`, addressed with
/// `routing_info`. Borrowed for the duration of one `transmit` call.
#[derive(Debug, Clone, Copy)]
pub struct TxBurstItem<'a> {
    pub msg_buffer: &'a MsgBuffer,
    pub pkt_idx: usize,
    pub routing_info: &'a RoutingInfo,
    /// Fault injection: send the packet so the network discards it.
    pub drop: bool,
}

// ── Submission state ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitState {
    /// Nothing offered to the device yet.
    Submitting,
    /// The device took a prefix; the rest is resubmitted.
    PartiallyAccepted { accepted: usize, remaining: usize },
    Complete,
}

/// Progress of one batch through the device's transmit queue.
#[derive(Debug)]
pub struct TxSubmission {
    total: usize,
    state: SubmitState,
}

impl TxSubmission {
    pub fn new(total: usize) -> Self {
        let state = if total == 0 {
            SubmitState::Complete
        } else {
            SubmitState::Submitting
        };
        Self { total, state }
    }

    #[inline]
    pub fn state(&self) -> SubmitState {
        self.state
    }

    /// Descriptors the device has taken so far.
    #[inline]
    pub fn accepted(&self) -> usize {
        match self.state {
            SubmitState::Submitting => 0,
            SubmitState::PartiallyAccepted { accepted, .. } => accepted,
            SubmitState::Complete => self.total,
        }
    }

    /// Record that the device accepted `n` more descriptors.
    pub fn record(&mut self, n: usize) -> SubmitState {
        debug_assert!(n <= self.total - self.accepted());
        let accepted = (self.accepted() + n).min(self.total);
        self.state = if accepted == self.total {
            SubmitState::Complete
        } else {
            SubmitState::PartiallyAccepted {
                accepted,
                remaining: self.total - accepted,
            }
        };
        self.state
    }
}

/// Counts retries of a stuck batch and says when to warn about it.
#[derive(Debug)]
pub struct TxWatchdog {
    interval: u64,
    since_warning: u64,
    retries: u64,
}

impl TxWatchdog {
    /// Warn every `interval` retries. Zero disables warnings.
    pub fn new(interval: u64) -> Self {
        Self {
            interval,
            since_warning: 0,
            retries: 0,
        }
    }

    /// Note one retry. True when a warning is due.
    pub fn on_retry(&mut self) -> bool {
        self.retries += 1;
        self.since_warning += 1;
        if self.interval != 0 && self.since_warning >= self.interval {
            self.since_warning = 0;
            return true;
        }
        false
    }

    #[inline]
    pub fn retries(&self) -> u64 {
        self.retries
    }
}

// ── Transmit ─────────────────────────────────────────────────────────────────

/// Write `item`'s header, formatted for a `pkt_size`-byte frame, at the
/// front of `mbuf`.
#[inline]
fn write_pkthdr(mbuf: &mut Mbuf, item: &TxBurstItem<'_>, pkt_size: usize) {
    let mut hdr = *item.msg_buffer.pkthdr(item.pkt_idx);
    format_pkthdr(&mut hdr, item, pkt_size);
    mbuf.room_mut()[..PKT_HDR_SIZE].copy_from_slice(hdr.as_bytes());
}

impl<D: EthDev> Transport<D> {
    /// Send every packet in `items`, blocking until the device has accepted
    /// all of them. At most `max_tx_batch()` items per call.
    ///
    /// # Panics
    /// Running out of driver buffers is fatal.
    pub fn transmit(&mut self, items: &[TxBurstItem<'_>]) {
        if items.is_empty() {
            return;
        }
        debug_assert!(
            items.len() <= self.tx_max_batch,
            "tx batch of {} exceeds {}",
            items.len(),
            self.tx_max_batch
        );
        debug_assert!(self.tx_mbufs.is_empty());

        for item in items {
            let msg = item.msg_buffer;
            let pkt_size = msg.pkt_size(item.pkt_idx);
            debug_assert!(pkt_size <= self.mtu);

            let mut head = self.alloc_tx_mbuf();
            if item.pkt_idx == 0 {
                write_pkthdr(&mut head, item, pkt_size);
                head.room_mut()[PKT_HDR_SIZE..pkt_size].copy_from_slice(msg.payload_chunk(0));
                head.set_len(pkt_size);
            } else {
                write_pkthdr(&mut head, item, pkt_size);
                head.set_len(PKT_HDR_SIZE);

                let chunk = msg.payload_chunk(item.pkt_idx);
                let mut payload = self.alloc_tx_mbuf();
                payload.room_mut()[..chunk.len()].copy_from_slice(chunk);
                payload.set_len(chunk.len());
                head.chain(payload);
            }

            tracing::trace!(
                queue = self.queue,
                pkt_idx = item.pkt_idx,
                pkt_size,
                nb_segs = head.nb_segs(),
                drop = item.drop,
                hdr = %msg.pkthdr(item.pkt_idx),
                frame = %frame_header_to_string(head.data()),
                "tx packet"
            );
            self.tx_mbufs.push(Some(head));
        }

        self.submit_tx_batch();
    }

    /// Flush the device's transmit queue. Packets are handed over eagerly by
    /// `transmit`, so this only counts calls.
    pub fn tx_flush(&mut self) {
        self.stats.tx_flush_count += 1;
        tracing::trace!(queue = self.queue, "tx flush");
    }

    fn alloc_tx_mbuf(&self) -> Mbuf {
        match self.pool.alloc() {
            Some(mbuf) => mbuf,
            None => {
                tracing::error!(
                    queue = self.queue,
                    capacity = self.pool.capacity(),
                    pending = self.tx_mbufs.len(),
                    "mbuf pool exhausted on transmit"
                );
                panic!("mbuf pool exhausted on transmit");
            }
        }
    }

    /// Offer `tx_mbufs` to the device, resubmitting the unaccepted tail
    /// until nothing is left.
    fn submit_tx_batch(&mut self) {
        let total = self.tx_mbufs.len();
        let mut submission = TxSubmission::new(total);
        let mut watchdog = TxWatchdog::new(self.tx_stall_warn_interval);

        loop {
            let from = submission.accepted();
            let n = self.dev.tx_burst(self.queue, &mut self.tx_mbufs[from..]);
            match submission.record(n) {
                SubmitState::Complete => break,
                SubmitState::PartiallyAccepted {
                    accepted,
                    remaining,
                } => {
                    self.stats.tx_retries += 1;
                    if watchdog.on_retry() {
                        self.stats.tx_stall_warnings += 1;
                        tracing::warn!(
                            queue = self.queue,
                            accepted,
                            remaining,
                            retries = watchdog.retries(),
                            "tx queue not draining, still retrying"
                        );
                    }
                }
                SubmitState::Submitting => unreachable!("record always advances the state"),
            }
        }

        debug_assert!(self.tx_mbufs.iter().all(Option::is_none));
        self.tx_mbufs.clear();
        self.stats.tx_pkts += total as u64;
    }
}
