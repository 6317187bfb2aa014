//! Internet checksum (RFC 1071) for the IPv4 header.
//!
//! The UDP checksum is never computed: it is left zero on every packet.

use zerocopy::AsBytes;

use crate::wire::Ipv4Hdr;

/// One's-complement sum of big-endian 16-bit words. An odd trailing byte is
/// padded with zero on the right.
fn ones_complement_sum(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    let mut words = data.chunks_exact(2);
    for w in &mut words {
        sum = sum.wrapping_add(u16::from_be_bytes([w[0], w[1]]) as u32);
    }
    if let [last] = words.remainder() {
        sum = sum.wrapping_add((*last as u32) << 8);
    }
    sum
}

fn fold(mut sum: u32) -> u16 {
    while (sum >> 16) != 0 {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// Checksum of an IPv4 header, with its `check` field treated as zero.
pub fn ipv4_checksum(hdr: &Ipv4Hdr) -> u16 {
    let mut copy = *hdr;
    copy.check.set(0);
    fold(ones_complement_sum(copy.as_bytes()))
}

/// True if the header's stored checksum matches its contents.
pub fn ipv4_checksum_valid(hdr: &Ipv4Hdr) -> bool {
    fold(ones_complement_sum(hdr.as_bytes())) == 0
}
