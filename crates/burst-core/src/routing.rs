//! Routing info and endpoint identity.
//!
//! Routing info is an opaque, pre-resolved blob owned by the session layer.
//! The datapath only ever copies its first `HDR_COPY_SIZE` bytes into the
//! head of a packet; it never interprets or resolves it.

use std::fmt;
use std::net::Ipv4Addr;

use zerocopy::{AsBytes, FromZeroes};

use crate::wire::{
    mac_to_string, Be16, EthHdr, Ipv4Hdr, UdpHdr, ETH_HDR_SIZE, ETH_P_IPV4, HDR_COPY_SIZE,
    IPPROTO_UDP, IPV4_DEFAULT_TTL, IPV4_HDR_SIZE, IPV4_VERSION_IHL, MAX_ROUTING_INFO_SIZE,
};

/// A resolved network identity: link address, IPv4 address and UDP port.
///
/// For the local side this is the identity the receive path validates
/// against; `udp_port` is the port the NIC steers this queue's flow to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Endpoint {
    pub mac: [u8; 6],
    pub ipv4_addr: Ipv4Addr,
    pub udp_port: u16,
}

impl Endpoint {
    pub fn new(mac: [u8; 6], ipv4_addr: Ipv4Addr, udp_port: u16) -> Self {
        Self {
            mac,
            ipv4_addr,
            udp_port,
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} ({})",
            self.ipv4_addr,
            self.udp_port,
            mac_to_string(&self.mac)
        )
    }
}

/// Precomputed addressing bytes for one destination.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct RoutingInfo {
    bytes: [u8; MAX_ROUTING_INFO_SIZE],
}

impl RoutingInfo {
    /// Wrap a blob handed down by the session layer.
    pub fn from_bytes(bytes: [u8; MAX_ROUTING_INFO_SIZE]) -> Self {
        Self { bytes }
    }

    /// Build the Ethernet/IPv4/UDP framing for a flow from `local` to
    /// `remote`. Lengths and checksums are left zero; they are filled in per
    /// packet at transmit time.
    pub fn udp_flow(local: &Endpoint, remote: &Endpoint) -> Self {
        let eth = EthHdr {
            dst_mac: remote.mac,
            src_mac: local.mac,
            eth_type: Be16::new(ETH_P_IPV4),
        };

        let mut ipv4 = Ipv4Hdr::new_zeroed();
        ipv4.version_ihl = IPV4_VERSION_IHL;
        ipv4.ttl = IPV4_DEFAULT_TTL;
        ipv4.protocol = IPPROTO_UDP;
        ipv4.src_ip.set(u32::from(local.ipv4_addr));
        ipv4.dst_ip.set(u32::from(remote.ipv4_addr));

        let mut udp = UdpHdr::new_zeroed();
        udp.src_port.set(local.udp_port);
        udp.dst_port.set(remote.udp_port);

        let mut bytes = [0u8; MAX_ROUTING_INFO_SIZE];
        bytes[..ETH_HDR_SIZE].copy_from_slice(eth.as_bytes());
        bytes[ETH_HDR_SIZE..ETH_HDR_SIZE + IPV4_HDR_SIZE].copy_from_slice(ipv4.as_bytes());
        // The UDP checksum (last 2 bytes of the header) is outside the copy span
        // and stays zero.
        let udp_off = ETH_HDR_SIZE + IPV4_HDR_SIZE;
        bytes[udp_off..HDR_COPY_SIZE].copy_from_slice(&udp.as_bytes()[..HDR_COPY_SIZE - udp_off]);

        Self { bytes }
    }

    pub fn as_bytes(&self) -> &[u8; MAX_ROUTING_INFO_SIZE] {
        &self.bytes
    }

    /// The addressing span copied into every packet header.
    #[inline]
    pub fn header_span(&self) -> &[u8] {
        &self.bytes[..HDR_COPY_SIZE]
    }
}

impl fmt::Debug for RoutingInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RoutingInfo")
            .field("frame", &crate::wire::frame_header_to_string(&self.bytes))
            .finish()
    }
}
