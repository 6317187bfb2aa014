//! Per-packet header formatting at transmit time.

use zerocopy::AsBytes;

use burst_core::checksum::ipv4_checksum;
use burst_core::wire::{PktHdr, ETH_HDR_SIZE, HDR_COPY_SIZE, IPV4_HDR_SIZE};

use crate::tx::TxBurstItem;

/// Whether the per-descriptor `drop` flag is honoured.
pub const FAULT_INJECTION: bool = cfg!(any(test, feature = "fault-injection"));

/// Stamp addressing and length fields into a packet header that is about to
/// go out as a `pkt_size`-byte frame.
///
/// The first `HDR_COPY_SIZE` bytes come verbatim from the item's routing
/// info. The UDP checksum, which follows that span, must already be zero;
/// it is never computed.
#[inline]
pub fn format_pkthdr(pkthdr: &mut PktHdr, item: &TxBurstItem<'_>, pkt_size: usize) {
    pkthdr.as_bytes_mut()[..HDR_COPY_SIZE].copy_from_slice(item.routing_info.header_span());

    if FAULT_INJECTION && item.drop {
        // A zero destination MAC is discarded by the switch.
        pkthdr.eth.dst_mac = [0; 6];
    }

    pkthdr.ipv4.tot_len.set((pkt_size - ETH_HDR_SIZE) as u16);
    pkthdr.ipv4.check.set(ipv4_checksum(&pkthdr.ipv4));

    debug_assert_eq!(pkthdr.udp.check.get(), 0, "UDP checksum must stay zero");
    pkthdr
        .udp
        .len
        .set((pkt_size - ETH_HDR_SIZE - IPV4_HDR_SIZE) as u16);
}
