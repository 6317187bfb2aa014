//! An in-memory NIC implementing `EthDev`.
//!
//! Each queue has a receive FIFO fed by `inject` (or by loopback) and a
//! capture list of transmitted buffers. Transmit acceptance can be scripted
//! per call to model a congested queue, and every `tx_burst` call is logged.

use std::collections::VecDeque;

use crate::device::EthDev;
use crate::mbuf::{Mbuf, Mempool, MBUF_DATA_ROOM};

/// One logged `tx_burst` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxCall {
    pub offered: usize,
    pub accepted: usize,
}

#[derive(Default)]
struct SimQueue {
    rx: VecDeque<Mbuf>,
    sent: Vec<Mbuf>,
    tx_script: VecDeque<usize>,
    tx_calls: Vec<TxCall>,
}

pub struct SimPort {
    pool: Mempool,
    queues: Vec<SimQueue>,
    loopback: bool,
    rx_missed: u64,
}

impl SimPort {
    /// A port with `num_queues` queue pairs. Received frames are copied into
    /// buffers from `pool`.
    pub fn new(pool: Mempool, num_queues: u16) -> Self {
        Self {
            pool,
            queues: (0..num_queues).map(|_| SimQueue::default()).collect(),
            loopback: false,
            rx_missed: 0,
        }
    }

    /// Feed every transmitted frame back into the same queue's receive side
    /// instead of capturing it.
    pub fn with_loopback(mut self) -> Self {
        self.loopback = true;
        self
    }

    fn queue_mut(&mut self, queue: u16) -> &mut SimQueue {
        &mut self.queues[queue as usize]
    }

    fn queue(&self, queue: u16) -> &SimQueue {
        &self.queues[queue as usize]
    }

    /// Deliver `frame` to `queue`'s receive side. False if it was dropped
    /// for lack of a buffer or because it does not fit one.
    pub fn inject(&mut self, queue: u16, frame: &[u8]) -> bool {
        let Some(mbuf) = copy_into_mbuf(&self.pool, frame) else {
            self.rx_missed += 1;
            return false;
        };
        self.queue_mut(queue).rx.push_back(mbuf);
        true
    }

    /// Accept at most these many descriptors on successive `tx_burst` calls.
    /// Once the script runs out every offered descriptor is accepted.
    pub fn script_tx_accept(&mut self, queue: u16, limits: impl IntoIterator<Item = usize>) {
        self.queue_mut(queue).tx_script.extend(limits);
    }

    pub fn tx_calls(&self, queue: u16) -> &[TxCall] {
        &self.queue(queue).tx_calls
    }

    /// Transmitted packets captured so far, in acceptance order.
    pub fn sent(&self, queue: u16) -> &[Mbuf] {
        &self.queue(queue).sent
    }

    pub fn take_sent(&mut self, queue: u16) -> Vec<Mbuf> {
        std::mem::take(&mut self.queue_mut(queue).sent)
    }

    /// Finish transmission of every captured packet, returning its buffers
    /// to the pool. Returns the number of packets completed.
    pub fn complete_tx(&mut self, queue: u16) -> usize {
        let sent = self.take_sent(queue);
        let n = sent.len();
        sent.into_iter().for_each(Mbuf::free);
        n
    }

    /// Frames waiting on `queue`'s receive side.
    pub fn rx_pending(&self, queue: u16) -> usize {
        self.queue(queue).rx.len()
    }

    /// Frames dropped on receive because no buffer was available.
    pub fn rx_missed(&self) -> u64 {
        self.rx_missed
    }
}

fn copy_into_mbuf(pool: &Mempool, frame: &[u8]) -> Option<Mbuf> {
    if frame.len() > MBUF_DATA_ROOM {
        return None;
    }
    let mut mbuf = pool.alloc()?;
    mbuf.room_mut()[..frame.len()].copy_from_slice(frame);
    mbuf.set_len(frame.len());
    Some(mbuf)
}

impl EthDev for SimPort {
    fn rx_burst(&mut self, queue: u16, out: &mut Vec<Mbuf>, max: usize) -> usize {
        let rx = &mut self.queue_mut(queue).rx;
        let n = max.min(rx.len());
        out.extend(rx.drain(..n));
        n
    }

    fn tx_burst(&mut self, queue: u16, pkts: &mut [Option<Mbuf>]) -> usize {
        let q = &mut self.queues[queue as usize];
        let limit = q.tx_script.pop_front().unwrap_or(usize::MAX);
        let accepted = limit.min(pkts.len());
        q.tx_calls.push(TxCall {
            offered: pkts.len(),
            accepted,
        });

        for mbuf in pkts[..accepted].iter_mut().filter_map(Option::take) {
            if !self.loopback {
                q.sent.push(mbuf);
                continue;
            }
            // Loopback: the wire sees the packet linearised.
            let frame = mbuf.to_vec();
            mbuf.free();
            match copy_into_mbuf(&self.pool, &frame) {
                Some(rx) => q.rx.push_back(rx),
                None => self.rx_missed += 1,
            }
        }
        tracing::trace!(queue, offered = pkts.len(), accepted, "sim tx_burst");
        accepted
    }
}
