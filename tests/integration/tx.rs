use crate::*;

use burst_core::checksum::ipv4_checksum_valid;

#[test]
fn test_3000_byte_message_splits_1400_1400_200() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 3000, 1);
    let ri = RoutingInfo::udp_flow(&local(), &peer());
    t.transmit(&burst(&msg, &ri));

    let sent = t.device_mut().take_sent(0);
    let sizes: Vec<usize> = sent.iter().map(Mbuf::pkt_len).collect();
    assert_eq!(sizes, vec![1458, 1458, 258]);
    let segs: Vec<usize> = sent.iter().map(Mbuf::nb_segs).collect();
    assert_eq!(segs, vec![1, 2, 2]);

    // Later packets: a header-only segment, then the payload chunk.
    assert_eq!(sent[1].data_len(), PKT_HDR_SIZE);
    assert_eq!(sent[2].next().context("payload segment")?.data_len(), 200);

    assert_eq!(payload_of(&sent), msg.data());
    Ok(())
}

#[test]
fn test_length_fields_and_checksums() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 3000, 1);
    let ri = RoutingInfo::udp_flow(&local(), &peer());
    t.transmit(&burst(&msg, &ri));

    for pkt in t.device_mut().take_sent(0) {
        let frame = pkt.to_vec();
        let hdr = PktHdr::parse(&frame)?;
        assert_eq!(hdr.ipv4.tot_len.get() as usize, frame.len() - 14);
        assert_eq!(hdr.udp.len.get() as usize, frame.len() - 34);
        assert_eq!(hdr.udp.check.get(), 0);
        assert!(ipv4_checksum_valid(&hdr.ipv4));
    }
    Ok(())
}

#[test]
fn test_routing_info_addresses_every_packet() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 3000, 1);
    let ri = RoutingInfo::udp_flow(&local(), &peer());
    t.transmit(&burst(&msg, &ri));

    for pkt in t.device_mut().take_sent(0) {
        let hdr = PktHdr::parse(pkt.data())?;
        assert_eq!(hdr.eth.dst_mac, peer().mac);
        assert_eq!(hdr.eth.src_mac, local().mac);
        assert_eq!(hdr.ipv4.src_addr(), local().ipv4_addr);
        assert_eq!(hdr.ipv4.dst_addr(), peer().ipv4_addr);
        assert_eq!(hdr.udp.dst_port.get(), peer().udp_port);
        assert_eq!(hdr.app.msg_size(), 3000);
    }
    Ok(())
}

#[test]
fn test_one_batch_can_mix_messages_and_destinations() -> Result<()> {
    let mut t = transport()?;
    let other = Endpoint::new([2, 0, 0, 0, 0, 0x0c], Ipv4Addr::new(10, 10, 0, 3), 40000);
    let to_peer = RoutingInfo::udp_flow(&local(), &peer());
    let to_other = RoutingInfo::udp_flow(&local(), &other);
    let a = message(&t, 100, 7);
    let b = message(&t, 1500, 8);

    let mut items = burst(&a, &to_peer);
    items.extend(burst(&b, &to_other));
    t.transmit(&items);

    let sent = t.device_mut().take_sent(0);
    assert_eq!(sent.len(), 3);
    let dests: Vec<(u64, u16)> = sent
        .iter()
        .map(|m| {
            let hdr = PktHdr::parse(m.data()).expect("valid header");
            (hdr.app.req_num(), hdr.udp.dst_port.get())
        })
        .collect();
    assert_eq!(dests, vec![(7, 31851), (8, 40000), (8, 40000)]);
    Ok(())
}

#[test]
fn test_single_packet_resend() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 3000, 1);
    let ri = RoutingInfo::udp_flow(&local(), &peer());

    // Retransmitting just packet 2 needs no other packets of the message.
    let items = burst(&msg, &ri);
    t.transmit(&items[2..]);

    let sent = t.device_mut().take_sent(0);
    assert_eq!(sent.len(), 1);
    assert_eq!(pkt_num(sent[0].data())?, 2);
    assert_eq!(sent[0].pkt_len(), PKT_HDR_SIZE + 200);
    Ok(())
}

#[test]
fn test_tx_buffers_are_reclaimed_on_completion() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 3000, 1);
    let ri = RoutingInfo::udp_flow(&local(), &peer());
    t.transmit(&burst(&msg, &ri));
    t.tx_flush();

    assert_eq!(t.pool().in_use(), 5);
    assert_eq!(t.device_mut().complete_tx(0), 3);
    assert_eq!(t.pool().in_use(), 0);
    assert_eq!(t.stats().tx_pkts, 3);
    assert_eq!(t.stats().tx_flush_count, 1);
    Ok(())
}
