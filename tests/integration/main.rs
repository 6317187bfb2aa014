//! Datapath integration test harness.
//!
//! Every test builds a transport over the in-memory NIC, so nothing here
//! needs hardware or privileges:
//!
//!   cargo test --test integration
//!
//! Tests share no state; each one owns its pool, port and transport.

use std::net::Ipv4Addr;

use anyhow::{bail, Context, Result};
use zerocopy::AsBytes;

use burst_core::wire::{AppHdr, PktHdr, PktType, PKT_HDR_SIZE};
use burst_core::{DatapathConfig, Endpoint, MsgBuffer, RoutingInfo};
use burst_datapath::{Mbuf, Mempool, SimPort, Transport, TxBurstItem};

mod backpressure;
mod config;
mod fault;
mod loopback;
mod rx;
mod tx;

// ── Harness ───────────────────────────────────────────────────────────────────

/// MTU giving 1400 payload bytes per packet.
pub const MTU_1400: usize = 1400 + PKT_HDR_SIZE;
pub const POOL_SIZE: usize = 512;

pub fn local() -> Endpoint {
    Endpoint::new([0x02, 0, 0, 0, 0, 0x0a], Ipv4Addr::new(10, 10, 0, 1), 31850)
}

pub fn peer() -> Endpoint {
    Endpoint::new([0x02, 0, 0, 0, 0, 0x0b], Ipv4Addr::new(10, 10, 0, 2), 31851)
}

/// Small ring and batches, all checks on.
pub fn test_config() -> DatapathConfig {
    let mut config = DatapathConfig::default();
    config.wire.mtu = MTU_1400;
    config.rx.batch_size = 8;
    config.rx.ring_entries = 64;
    config.tx.max_batch = 16;
    config.tx.stall_warn_interval = 10;
    config.checks.validate_rx_identity = Some(true);
    config.checks.mbuf_sanity = Some(true);
    config
}

pub fn transport_with(
    config: &DatapathConfig,
    port: impl FnOnce(Mempool) -> SimPort,
) -> Result<Transport<SimPort>> {
    let pool = Mempool::new(POOL_SIZE);
    let dev = port(pool.clone());
    Transport::new(dev, pool, 0, local(), config).context("failed to build transport")
}

pub fn transport() -> Result<Transport<SimPort>> {
    transport_with(&test_config(), |pool| SimPort::new(pool, 1))
}

/// A message of `len` patterned bytes with a header per packet, sized for
/// `transport`'s MTU.
pub fn message(t: &Transport<SimPort>, len: usize, req_num: u64) -> MsgBuffer {
    let payload: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
    let mut msg = MsgBuffer::from_payload(&payload, t.max_data_per_pkt());
    msg.fill_pkthdrs(|i| {
        PktHdr::with_app(AppHdr::new(4, len, 21, PktType::Req, i as u16, req_num))
    });
    msg
}

/// Descriptors for every packet of `msg`.
pub fn burst<'a>(msg: &'a MsgBuffer, routing_info: &'a RoutingInfo) -> Vec<TxBurstItem<'a>> {
    (0..msg.num_pkts())
        .map(|pkt_idx| TxBurstItem {
            msg_buffer: msg,
            pkt_idx,
            routing_info,
            drop: false,
        })
        .collect()
}

/// A frame `from` would send to `to`, tagged with `pkt_num`.
pub fn frame(from: &Endpoint, to: &Endpoint, pkt_num: u16, payload_len: usize) -> Vec<u8> {
    let ri = RoutingInfo::udp_flow(from, to);
    let mut hdr = PktHdr::with_app(AppHdr::new(4, payload_len, 21, PktType::Resp, pkt_num, 1));
    hdr.as_bytes_mut()[..ri.header_span().len()].copy_from_slice(ri.header_span());
    let mut bytes = hdr.as_bytes().to_vec();
    bytes.extend((0..payload_len).map(|i| i as u8));
    bytes
}

pub fn pkt_num(data: &[u8]) -> Result<u16> {
    Ok(PktHdr::parse(data)?.app.pkt_num())
}

/// Concatenated payload of captured packets.
pub fn payload_of(pkts: &[Mbuf]) -> Vec<u8> {
    pkts.iter()
        .flat_map(|m| m.to_vec().split_off(PKT_HDR_SIZE))
        .collect()
}
