//! burst wire format: the framing every datapath packet carries.
//!
//! A packet on the wire is laid out as
//!
//! ```text
//! [EthHdr 14][Ipv4Hdr 20][UdpHdr 8][AppHdr 16][payload ...]
//! ```
//!
//! The first three headers are the inet framing produced from a peer's
//! routing info; `AppHdr` is the RPC layer's sub-header. The four together
//! form `PktHdr`, the fixed 58-byte prefix of every packet.
//!
//! All types are #[repr(C, packed)] with zerocopy derives so a header can be
//! viewed in place inside a driver buffer. Multi-byte inet fields are
//! big-endian; `AppHdr` fields are little-endian.

use std::fmt;
use std::net::Ipv4Addr;

use static_assertions::{assert_eq_size, const_assert, const_assert_eq};
use zerocopy::byteorder::{LittleEndian, NetworkEndian, U16, U32, U64};
use zerocopy::{AsBytes, FromBytes, FromZeroes, Unaligned};

pub type Be16 = U16<NetworkEndian>;
pub type Be32 = U32<NetworkEndian>;
pub type Le16 = U16<LittleEndian>;
pub type Le64 = U64<LittleEndian>;

// ── Sizes ────────────────────────────────────────────────────────────────────

pub const ETH_HDR_SIZE: usize = 14;
pub const IPV4_HDR_SIZE: usize = 20;
pub const UDP_HDR_SIZE: usize = 8;

/// Ethernet + IPv4 + UDP.
pub const INET_HDRS_TOT_SIZE: usize = ETH_HDR_SIZE + IPV4_HDR_SIZE + UDP_HDR_SIZE;

/// Bytes of routing info copied into each header: the inet headers minus the
/// trailing 2-byte UDP checksum, which stays zero.
pub const HDR_COPY_SIZE: usize = INET_HDRS_TOT_SIZE - 2;

pub const APP_HDR_SIZE: usize = 16;

/// Size of the full per-packet header.
pub const PKT_HDR_SIZE: usize = INET_HDRS_TOT_SIZE + APP_HDR_SIZE;

/// Size of an opaque routing-info blob.
pub const MAX_ROUTING_INFO_SIZE: usize = 48;

pub const ETH_P_IPV4: u16 = 0x0800;
pub const IPPROTO_UDP: u8 = 17;

/// Version 4, 5-word header, no options.
pub const IPV4_VERSION_IHL: u8 = 0x45;
pub const IPV4_DEFAULT_TTL: u8 = 64;

/// Value of the 4-bit magic in every valid `AppHdr`.
pub const PKT_HDR_MAGIC: u8 = 11;

pub const MAX_MSG_SIZE: usize = (1 << 24) - 1;
pub const MAX_PKT_NUM: u16 = (1 << 14) - 1;
pub const MAX_REQ_NUM: u64 = (1 << 44) - 1;

// The routing-info block copy is a whole number of 8-byte words.
const_assert_eq!(HDR_COPY_SIZE, 40);
const_assert!(HDR_COPY_SIZE % 8 == 0);
const_assert!(MAX_ROUTING_INFO_SIZE >= HDR_COPY_SIZE);

// ── Inet headers ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct EthHdr {
    pub dst_mac: [u8; 6],
    pub src_mac: [u8; 6],
    pub eth_type: Be16,
}

assert_eq_size!(EthHdr, [u8; ETH_HDR_SIZE]);

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct Ipv4Hdr {
    pub version_ihl: u8,
    pub tos: u8,
    /// IPv4 header + everything after it, i.e. packet size minus `EthHdr`.
    pub tot_len: Be16,
    pub id: Be16,
    pub frag_off: Be16,
    pub ttl: u8,
    pub protocol: u8,
    pub check: Be16,
    pub src_ip: Be32,
    pub dst_ip: Be32,
}

assert_eq_size!(Ipv4Hdr, [u8; IPV4_HDR_SIZE]);

impl Ipv4Hdr {
    pub fn src_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.src_ip.get())
    }

    pub fn dst_addr(&self) -> Ipv4Addr {
        Ipv4Addr::from(self.dst_ip.get())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct UdpHdr {
    pub src_port: Be16,
    pub dst_port: Be16,
    /// UDP header + payload.
    pub len: Be16,
    /// Always zero; checksum offload is not used.
    pub check: Be16,
}

assert_eq_size!(UdpHdr, [u8; UDP_HDR_SIZE]);

// ── Application sub-header ───────────────────────────────────────────────────

/// Packet type carried in the top two bits of `AppHdr::pkt_type_num`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PktType {
    /// Request packet.
    Req = 0,
    /// Request-for-response: asks the server for the next response packet.
    ReqForResp = 1,
    /// Response packet.
    Resp = 2,
    /// Explicit credit return, no payload.
    CreditReturn = 3,
}

impl TryFrom<u8> for PktType {
    type Error = WireError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(PktType::Req),
            1 => Ok(PktType::ReqForResp),
            2 => Ok(PktType::Resp),
            3 => Ok(PktType::CreditReturn),
            other => Err(WireError::UnknownPktType(other)),
        }
    }
}

impl fmt::Display for PktType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PktType::Req => "REQ",
            PktType::ReqForResp => "RFR",
            PktType::Resp => "RESP",
            PktType::CreditReturn => "CR",
        };
        f.write_str(s)
    }
}

/// RPC sub-header (16 bytes).
///
/// ```text
/// Offset  Size  Field
/// 0       1     req_type
/// 1       3     msg_size (24-bit)
/// 4       2     dest_session_num
/// 6       2     pkt_type (2 bits, high) | pkt_num (14 bits)
/// 8       8     req_num (44 bits) | magic (4 bits) | reserved (16 bits)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct AppHdr {
    pub req_type: u8,
    msg_size: [u8; 3],
    pub dest_session_num: Le16,
    pkt_type_num: Le16,
    req_num_magic: Le64,
}

assert_eq_size!(AppHdr, [u8; APP_HDR_SIZE]);

impl AppHdr {
    pub fn new(
        req_type: u8,
        msg_size: usize,
        dest_session_num: u16,
        pkt_type: PktType,
        pkt_num: u16,
        req_num: u64,
    ) -> Self {
        debug_assert!(msg_size <= MAX_MSG_SIZE);
        debug_assert!(pkt_num <= MAX_PKT_NUM);
        debug_assert!(req_num <= MAX_REQ_NUM);

        let size = (msg_size as u32).to_le_bytes();
        let type_num = ((pkt_type as u16) << 14) | (pkt_num & MAX_PKT_NUM);
        let num_magic = (req_num & MAX_REQ_NUM) | ((PKT_HDR_MAGIC as u64) << 44);

        Self {
            req_type,
            msg_size: [size[0], size[1], size[2]],
            dest_session_num: Le16::new(dest_session_num),
            pkt_type_num: Le16::new(type_num),
            req_num_magic: Le64::new(num_magic),
        }
    }

    #[inline]
    pub fn msg_size(&self) -> usize {
        let b = self.msg_size;
        u32::from_le_bytes([b[0], b[1], b[2], 0]) as usize
    }

    #[inline]
    pub fn pkt_type(&self) -> PktType {
        match self.pkt_type_num.get() >> 14 {
            0 => PktType::Req,
            1 => PktType::ReqForResp,
            2 => PktType::Resp,
            _ => PktType::CreditReturn,
        }
    }

    #[inline]
    pub fn pkt_num(&self) -> u16 {
        self.pkt_type_num.get() & MAX_PKT_NUM
    }

    #[inline]
    pub fn req_num(&self) -> u64 {
        self.req_num_magic.get() & MAX_REQ_NUM
    }

    #[inline]
    pub fn magic(&self) -> u8 {
        ((self.req_num_magic.get() >> 44) & 0x0f) as u8
    }

    #[inline]
    pub fn is_valid_magic(&self) -> bool {
        self.magic() == PKT_HDR_MAGIC
    }
}

impl fmt::Display for AppHdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[type {}, dsn {}, reqn {}, pktn {}, msz {}, magic {}]",
            self.pkt_type(),
            self.dest_session_num.get(),
            self.req_num(),
            self.pkt_num(),
            self.msg_size(),
            self.magic()
        )
    }
}

// ── Full packet header ───────────────────────────────────────────────────────

/// The fixed prefix of every datapath packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes, Unaligned)]
#[repr(C, packed)]
pub struct PktHdr {
    pub eth: EthHdr,
    pub ipv4: Ipv4Hdr,
    pub udp: UdpHdr,
    pub app: AppHdr,
}

assert_eq_size!(PktHdr, [u8; PKT_HDR_SIZE]);

impl PktHdr {
    /// A header with zeroed inet framing and the given sub-header. The inet
    /// part is filled in per packet from routing info at transmit time.
    pub fn with_app(app: AppHdr) -> Self {
        let mut hdr = PktHdr::new_zeroed();
        hdr.app = app;
        hdr
    }

    /// View the header at the front of a received frame, checking that it is
    /// an IPv4/UDP frame long enough to carry one.
    pub fn parse(frame: &[u8]) -> Result<&PktHdr, WireError> {
        let hdr = PktHdr::ref_from_prefix(frame).ok_or(WireError::Truncated {
            len: frame.len(),
            need: PKT_HDR_SIZE,
        })?;
        let eth_type = hdr.eth.eth_type.get();
        if eth_type != ETH_P_IPV4 {
            return Err(WireError::UnexpectedEthType(eth_type));
        }
        if hdr.ipv4.protocol != IPPROTO_UDP {
            return Err(WireError::UnexpectedProtocol(hdr.ipv4.protocol));
        }
        Ok(hdr)
    }
}

impl fmt::Display for PktHdr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.app, f)
    }
}

// ── Trace rendering ──────────────────────────────────────────────────────────

/// Colon-separated MAC address.
pub fn mac_to_string(mac: &[u8; 6]) -> String {
    format!(
        "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
        mac[0], mac[1], mac[2], mac[3], mac[4], mac[5]
    )
}

/// One-line summary of the inet framing at the front of `frame`.
pub fn frame_header_to_string(frame: &[u8]) -> String {
    let at = |off: usize| frame.get(off..).unwrap_or_default();
    let (Some(eth), Some(ipv4), Some(udp)) = (
        EthHdr::ref_from_prefix(frame),
        Ipv4Hdr::ref_from_prefix(at(ETH_HDR_SIZE)),
        UdpHdr::ref_from_prefix(at(ETH_HDR_SIZE + IPV4_HDR_SIZE)),
    ) else {
        return format!("[truncated frame, {} bytes]", frame.len());
    };
    format!(
        "[ETH: dst {}, src {}, eth_type {:#x}], \
         [IPv4: ihl {:#x}, tot_len {}, ttl {}, check {}, src {}, dst {}], \
         [UDP: src_port {}, dst_port {}, len {}, check {}]",
        mac_to_string(&eth.dst_mac),
        mac_to_string(&eth.src_mac),
        eth.eth_type.get(),
        ipv4.version_ihl,
        ipv4.tot_len.get(),
        ipv4.ttl,
        ipv4.check.get(),
        ipv4.src_addr(),
        ipv4.dst_addr(),
        udp.src_port.get(),
        udp.dst_port.get(),
        udp.len.get(),
        udp.check.get()
    )
}

// ── Errors ───────────────────────────────────────────────────────────────────

/// Errors that can arise when interpreting wire-format data.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WireError {
    #[error("frame of {len} bytes is shorter than the {need}-byte header")]
    Truncated { len: usize, need: usize },

    #[error("unexpected ethertype 0x{0:04x}")]
    UnexpectedEthType(u16),

    #[error("unexpected IP protocol {0}")]
    UnexpectedProtocol(u8),

    #[error("unknown packet type {0}")]
    UnknownPktType(u8),
}

// ── Tests ────────────────────────────────────────────────────────────────────
