//! Message buffers: an application payload plus one precomputed header per
//! packet the payload is split into.
//!
//! Layout of the backing storage:
//!
//! ```text
//! [pkthdr 0][payload, max_data_size rounded up to 8][pkthdr 1]...[pkthdr n-1]
//! ```
//!
//! Header 0 sits immediately before the payload, so packet 0 (header plus the
//! first chunk) is one contiguous byte range. Headers for later packets live
//! past the payload and are sent in a segment of their own, chained to a
//! segment holding that packet's slice of the payload.

use std::ops::Range;

use bytes::BytesMut;
use zerocopy::{AsBytes, FromBytes};

use crate::wire::{PktHdr, PKT_HDR_SIZE};

pub struct MsgBuffer {
    storage: BytesMut,
    /// Payload bytes this buffer can hold.
    max_data_size: usize,
    /// Current payload length, <= max_data_size.
    data_size: usize,
    max_num_pkts: usize,
    num_pkts: usize,
    max_data_per_pkt: usize,
}

#[inline]
fn round_up_8(n: usize) -> usize {
    (n + 7) & !7
}

/// Packets needed for `data_size` bytes. An empty message is still one packet.
#[inline]
fn pkts_for(data_size: usize, max_data_per_pkt: usize) -> usize {
    data_size.div_ceil(max_data_per_pkt).max(1)
}

impl MsgBuffer {
    /// Allocate a zeroed buffer for up to `max_data_size` payload bytes, split
    /// into packets of at most `max_data_per_pkt` bytes each.
    ///
    /// # Panics
    /// Panics if `max_data_per_pkt` is zero.
    pub fn new(max_data_size: usize, max_data_per_pkt: usize) -> Self {
        assert!(max_data_per_pkt > 0, "max_data_per_pkt must be non-zero");
        let max_num_pkts = pkts_for(max_data_size, max_data_per_pkt);
        let len = PKT_HDR_SIZE + round_up_8(max_data_size) + (max_num_pkts - 1) * PKT_HDR_SIZE;

        Self {
            storage: BytesMut::zeroed(len),
            max_data_size,
            data_size: max_data_size,
            max_num_pkts,
            num_pkts: max_num_pkts,
            max_data_per_pkt,
        }
    }

    /// Allocate a buffer holding exactly `payload`.
    pub fn from_payload(payload: &[u8], max_data_per_pkt: usize) -> Self {
        let mut buf = Self::new(payload.len(), max_data_per_pkt);
        buf.data_mut().copy_from_slice(payload);
        buf
    }

    /// Shrink (or regrow) the payload without reallocating.
    ///
    /// # Panics
    /// Panics if `data_size` exceeds the allocated capacity.
    pub fn resize(&mut self, data_size: usize) {
        assert!(
            data_size <= self.max_data_size,
            "resize to {data_size} exceeds capacity {}",
            self.max_data_size
        );
        self.data_size = data_size;
        self.num_pkts = pkts_for(data_size, self.max_data_per_pkt);
    }

    #[inline]
    pub fn data_size(&self) -> usize {
        self.data_size
    }

    #[inline]
    pub fn max_data_size(&self) -> usize {
        self.max_data_size
    }

    #[inline]
    pub fn max_data_per_pkt(&self) -> usize {
        self.max_data_per_pkt
    }

    #[inline]
    pub fn num_pkts(&self) -> usize {
        self.num_pkts
    }

    /// The payload.
    #[inline]
    pub fn data(&self) -> &[u8] {
        &self.storage[PKT_HDR_SIZE..PKT_HDR_SIZE + self.data_size]
    }

    #[inline]
    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.storage[PKT_HDR_SIZE..PKT_HDR_SIZE + self.data_size]
    }

    /// Payload bytes carried by packet `pkt_idx`: the per-packet maximum for
    /// every packet but the last, the remainder for the last.
    #[inline]
    pub fn chunk_len(&self, pkt_idx: usize) -> usize {
        debug_assert!(pkt_idx < self.num_pkts);
        let offset = pkt_idx * self.max_data_per_pkt;
        self.data_size.saturating_sub(offset).min(self.max_data_per_pkt)
    }

    /// Exact wire size of packet `pkt_idx`: header plus its payload chunk.
    #[inline]
    pub fn pkt_size(&self, pkt_idx: usize) -> usize {
        PKT_HDR_SIZE + self.chunk_len(pkt_idx)
    }

    /// Packet `pkt_idx`'s slice of the payload,
    /// `[pkt_idx * max_data_per_pkt, pkt_idx * max_data_per_pkt + chunk_len)`.
    #[inline]
    pub fn payload_chunk(&self, pkt_idx: usize) -> &[u8] {
        let start = pkt_idx * self.max_data_per_pkt;
        &self.data()[start..start + self.chunk_len(pkt_idx)]
    }

    fn hdr_range(&self, pkt_idx: usize) -> Range<usize> {
        assert!(
            pkt_idx < self.max_num_pkts,
            "packet index {pkt_idx} out of range ({} packets)",
            self.max_num_pkts
        );
        let start = match pkt_idx {
            0 => 0,
            n => PKT_HDR_SIZE + round_up_8(self.max_data_size) + (n - 1) * PKT_HDR_SIZE,
        };
        start..start + PKT_HDR_SIZE
    }

    /// Header slot bytes for packet `pkt_idx`.
    #[inline]
    pub fn pkthdr_bytes(&self, pkt_idx: usize) -> &[u8] {
        &self.storage[self.hdr_range(pkt_idx)]
    }

    pub fn pkthdr(&self, pkt_idx: usize) -> &PktHdr {
        let range = self.hdr_range(pkt_idx);
        PktHdr::ref_from(&self.storage[range]).expect("header slot is PKT_HDR_SIZE bytes")
    }

    pub fn pkthdr_mut(&mut self, pkt_idx: usize) -> &mut PktHdr {
        let range = self.hdr_range(pkt_idx);
        PktHdr::mut_from(&mut self.storage[range]).expect("header slot is PKT_HDR_SIZE bytes")
    }

    /// Write `f(i)` into the header slot of every packet `i`.
    pub fn fill_pkthdrs(&mut self, mut f: impl FnMut(usize) -> PktHdr) {
        for i in 0..self.num_pkts {
            let hdr = f(i);
            let range = self.hdr_range(i);
            self.storage[range].copy_from_slice(hdr.as_bytes());
        }
    }
}

impl std::fmt::Debug for MsgBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MsgBuffer")
            .field("data_size", &self.data_size)
            .field("max_data_size", &self.max_data_size)
            .field("num_pkts", &self.num_pkts)
            .field("max_data_per_pkt", &self.max_data_per_pkt)
            .finish()
    }
}
