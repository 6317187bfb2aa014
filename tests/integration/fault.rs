use crate::*;

#[test]
fn test_drop_flag_blanks_only_flagged_packet() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 3000, 9);
    let ri = RoutingInfo::udp_flow(&local(), &peer());
    let mut items = burst(&msg, &ri);
    items[1].drop = true;
    t.transmit(&items);

    let sent = t.device_mut().take_sent(0);
    let macs: Vec<[u8; 6]> = sent
        .iter()
        .map(|m| PktHdr::parse(m.data()).map(|h| h.eth.dst_mac))
        .collect::<Result<_, _>>()?;
    assert_eq!(macs, vec![peer().mac, [0; 6], peer().mac]);

    // Everything but the destination MAC is formatted as usual.
    let dropped = PktHdr::parse(sent[1].data())?;
    assert_eq!(dropped.ipv4.dst_addr(), peer().ipv4_addr);
    assert_eq!(dropped.udp.len.get() as usize, sent[1].pkt_len() - 34);
    assert_eq!(payload_of(&sent), msg.data());
    Ok(())
}

#[test]
#[should_panic(expected = "not addressed to this endpoint")]
fn test_frame_for_another_port_is_fatal() {
    let mut t = transport().unwrap();
    let elsewhere = Endpoint::new(local().mac, local().ipv4_addr, 9999);
    assert!(t.device_mut().inject(0, &frame(&peer(), &elsewhere, 0, 0)));
    t.rx_burst();
}

#[test]
fn test_identity_check_off_accepts_foreign_frames() -> Result<()> {
    let mut config = test_config();
    config.checks.validate_rx_identity = Some(false);
    let mut t = transport_with(&config, |pool| SimPort::new(pool, 1))?;

    let elsewhere = Endpoint::new(local().mac, Ipv4Addr::new(192, 0, 2, 1), 9999);
    assert!(t.device_mut().inject(0, &frame(&peer(), &elsewhere, 0, 0)));
    assert_eq!(t.rx_burst(), 1);
    Ok(())
}

#[test]
#[should_panic(expected = "mbuf pool exhausted")]
fn test_pool_exhaustion_on_transmit_is_fatal() {
    let mut t = transport().unwrap();
    let pool = t.pool().clone();
    let _held: Vec<Mbuf> = std::iter::from_fn(|| pool.alloc()).collect();

    let msg = message(&t, 3000, 1);
    let ri = RoutingInfo::udp_flow(&local(), &peer());
    t.transmit(&burst(&msg, &ri));
}
