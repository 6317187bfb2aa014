//! Receive path: poll the NIC into the receive ring, release consumed
//! entries back to the pool, and drain stale packets at startup.

use burst_core::wire::{frame_header_to_string, PktHdr, WireError};
use burst_core::Endpoint;

use crate::device::EthDev;
use crate::mbuf::Mbuf;
use crate::transport::Transport;

#[derive(Debug, thiserror::Error)]
enum ForeignFrame {
    #[error(transparent)]
    Malformed(#[from] WireError),
    #[error("addressed to {ip}:{port}")]
    WrongDestination { ip: std::net::Ipv4Addr, port: u16 },
}

/// A received frame must carry a datapath header addressed to `local`.
fn check_rx_identity(local: &Endpoint, frame: &[u8]) -> Result<(), ForeignFrame> {
    let hdr = PktHdr::parse(frame)?;
    let ip = hdr.ipv4.dst_addr();
    let port = hdr.udp.dst_port.get();
    if ip != local.ipv4_addr || port != local.udp_port {
        return Err(ForeignFrame::WrongDestination { ip, port });
    }
    Ok(())
}

impl<D: EthDev> Transport<D> {
    /// Discard every packet waiting in the NIC's receive queue. Used once
    /// before the queue is put to work. Returns the number discarded.
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        loop {
            let n = self
                .dev
                .rx_burst(self.queue, &mut self.rx_pkts, self.rx_batch_size);
            if n == 0 {
                break;
            }
            drained += n;
            self.rx_pkts.drain(..).for_each(Mbuf::free);
        }

        self.stats.drained_pkts += drained as u64;
        tracing::debug!(queue = self.queue, drained, "rx queue drained");
        drained
    }

    /// Poll the NIC once and append what arrived to the receive ring.
    /// Returns the number of packets received; they occupy the ring slots
    /// from the pre-call `rx_ring().head()` onwards.
    ///
    /// A poll never takes more packets than the ring has free slots, so
    /// unreleased entries are never overwritten.
    ///
    /// # Panics
    /// With `validate_rx_identity` on, a frame not addressed to this
    /// transport's endpoint is fatal.
    pub fn rx_burst(&mut self) -> usize {
        let budget = self.rx_batch_size.min(self.rx_ring.free_slots());
        if budget == 0 {
            if !self.rx_ring_full {
                self.rx_ring_full = true;
                tracing::warn!(
                    queue = self.queue,
                    outstanding = self.rx_ring.len(),
                    "rx ring full, not polling until buffers are released"
                );
            }
            return 0;
        }
        self.rx_ring_full = false;

        let n = self.dev.rx_burst(self.queue, &mut self.rx_pkts, budget);
        debug_assert!(n <= budget);

        for mbuf in self.rx_pkts.drain(..) {
            let frame = mbuf.data();
            tracing::trace!(
                queue = self.queue,
                slot = self.rx_ring.head(),
                len = frame.len(),
                hdr = %PktHdr::parse(frame).map(|h| h.to_string()).unwrap_or_default(),
                frame = %frame_header_to_string(frame),
                "rx packet"
            );

            if self.checks.validate_rx_identity {
                if let Err(reason) = check_rx_identity(&self.endpoint, frame) {
                    tracing::error!(
                        queue = self.queue,
                        local = %self.endpoint,
                        %reason,
                        frame = %frame_header_to_string(frame),
                        "received frame not addressed to this endpoint"
                    );
                    panic!("received frame not addressed to this endpoint: {reason}");
                }
            }

            if let Err(mbuf) = self.rx_ring.push(mbuf) {
                tracing::error!(
                    queue = self.queue,
                    budget,
                    "device returned more packets than requested, dropping"
                );
                mbuf.free();
            }
        }

        self.stats.rx_pkts += n as u64;
        n
    }

    /// Release the `n` oldest receive ring entries back to the pool.
    pub fn post_recvs(&mut self, n: usize) {
        debug_assert!(
            n <= self.rx_ring.len(),
            "post_recvs({n}) with only {} outstanding",
            self.rx_ring.len()
        );

        for _ in 0..n {
            let Some(mbuf) = self.rx_ring.release_oldest() else {
                tracing::error!(
                    queue = self.queue,
                    requested = n,
                    "post_recvs past the last outstanding rx buffer"
                );
                break;
            };
            if self.checks.mbuf_sanity {
                mbuf.sanity_check(true);
            }
            mbuf.free();
        }
    }
}
