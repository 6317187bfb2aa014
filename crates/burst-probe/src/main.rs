//! burst-probe: push messages through a loopback datapath and check that
//! every packet comes back intact.

use std::net::Ipv4Addr;

use anyhow::{bail, ensure, Context, Result};

use burst_core::wire::{AppHdr, PktHdr, PktType, PKT_HDR_SIZE};
use burst_core::{DatapathConfig, Endpoint, MsgBuffer, RoutingInfo};
use burst_datapath::{Mempool, SimPort, Transport, TxBurstItem};

const PROBE_REQ_TYPE: u8 = 1;
const PROBE_SESSION: u16 = 0;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    if let Err(e) = DatapathConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = DatapathConfig::load().unwrap_or_else(|e| {
        tracing::warn!(error = %e, "failed to load config, using defaults");
        DatapathConfig::default()
    });

    let local = Endpoint::new(
        [0x02, 0, 0, 0, 0, 0x01],
        Ipv4Addr::new(10, 0, 0, 1),
        31850,
    );
    let pool = Mempool::new(config.mempool.num_mbufs);
    let port = SimPort::new(pool.clone(), 1).with_loopback();
    let mut transport = Transport::new(port, pool, 0, local, &config)
        .context("failed to set up transport queue")?;
    transport.drain();

    // Loopback delivers to the sending queue, so address packets to ourselves.
    let routing = RoutingInfo::udp_flow(&local, &local);
    let mut msg = MsgBuffer::new(config.probe.msg_size, transport.max_data_per_pkt());
    msg.data_mut()
        .iter_mut()
        .enumerate()
        .for_each(|(i, b)| *b = (i % 251) as u8);
    tracing::info!(
        msg_size = msg.data_size(),
        num_pkts = msg.num_pkts(),
        rounds = config.probe.rounds,
        "probe starting"
    );

    for round in 0..config.probe.rounds {
        run_round(&mut transport, &mut msg, &routing, round)
            .with_context(|| format!("round {round}"))?;
    }

    let stats = transport.stats();
    tracing::info!(
        tx_pkts = stats.tx_pkts,
        rx_pkts = stats.rx_pkts,
        tx_retries = stats.tx_retries,
        tx_flushes = stats.tx_flush_count,
        pool_in_use = transport.pool().in_use(),
        "probe finished"
    );
    Ok(())
}

/// Send `msg` once and receive every packet of it back.
fn run_round(
    transport: &mut Transport<SimPort>,
    msg: &mut MsgBuffer,
    routing: &RoutingInfo,
    round: u64,
) -> Result<()> {
    let data_size = msg.data_size();
    msg.fill_pkthdrs(|i| {
        PktHdr::with_app(AppHdr::new(
            PROBE_REQ_TYPE,
            data_size,
            PROBE_SESSION,
            PktType::Req,
            i as u16,
            round,
        ))
    });
    let msg = &*msg;

    let items: Vec<TxBurstItem<'_>> = (0..msg.num_pkts())
        .map(|pkt_idx| TxBurstItem {
            msg_buffer: msg,
            pkt_idx,
            routing_info: routing,
            drop: false,
        })
        .collect();
    for batch in items.chunks(transport.max_tx_batch()) {
        transport.transmit(batch);
    }
    transport.tx_flush();

    let mut next_pkt = 0;
    while next_pkt < msg.num_pkts() {
        let n = transport.rx_burst();
        if n == 0 {
            bail!("lost packets: got {next_pkt} of {}", msg.num_pkts());
        }
        for (_, frame) in transport.rx_ring().unreleased() {
            let hdr = PktHdr::parse(frame)?;
            ensure!(hdr.app.is_valid_magic(), "bad magic in packet {next_pkt}");
            ensure!(hdr.app.req_num() == round, "stale packet from another round");
            let pkt_num = hdr.app.pkt_num() as usize;
            ensure!(pkt_num == next_pkt, "packet {pkt_num} arrived out of order");
            ensure!(
                &frame[PKT_HDR_SIZE..] == msg.payload_chunk(pkt_num),
                "payload mismatch in packet {pkt_num}"
            );
            next_pkt += 1;
        }
        transport.post_recvs(n);
    }
    Ok(())
}
