use crate::*;

fn loopback_transport() -> Result<Transport<SimPort>> {
    transport_with(&test_config(), |pool| SimPort::new(pool, 1).with_loopback())
}

/// Receive one whole message and return its reassembled payload.
fn receive_message(t: &mut Transport<SimPort>, num_pkts: usize) -> Result<Vec<u8>> {
    let mut payload = Vec::new();
    let mut got = 0;
    while got < num_pkts {
        let n = t.rx_burst();
        anyhow::ensure!(n > 0, "only {got} of {num_pkts} packets came back");
        for (_, data) in t.rx_ring().unreleased() {
            anyhow::ensure!(pkt_num(data)? as usize == got, "out of order");
            payload.extend_from_slice(&data[PKT_HDR_SIZE..]);
            got += 1;
        }
        t.post_recvs(n);
    }
    Ok(payload)
}

#[test]
fn test_message_survives_round_trip() -> Result<()> {
    let mut t = loopback_transport()?;
    let msg = message(&t, 3000, 1);
    let ri = RoutingInfo::udp_flow(&local(), &local());
    t.transmit(&burst(&msg, &ri));

    assert_eq!(receive_message(&mut t, 3)?, msg.data());
    assert_eq!(t.pool().in_use(), 0);
    Ok(())
}

#[test]
fn test_many_rounds_wrap_the_ring() -> Result<()> {
    let mut t = loopback_transport()?;
    let ri = RoutingInfo::udp_flow(&local(), &local());

    for round in 0..40 {
        let msg = message(&t, 3000, round);
        t.transmit(&burst(&msg, &ri));
        assert_eq!(receive_message(&mut t, 3)?, msg.data(), "round {round}");
    }
    assert_eq!(t.rx_ring().head(), (40 * 3) % 64);
    assert_eq!(t.stats().tx_pkts, 120);
    assert_eq!(t.stats().rx_pkts, 120);
    assert_eq!(t.pool().in_use(), 0);
    Ok(())
}

#[test]
fn test_drain_then_traffic() -> Result<()> {
    let mut t = loopback_transport()?;
    for i in 0..12 {
        assert!(t.device_mut().inject(0, &frame(&peer(), &local(), i, 16)));
    }
    assert_eq!(t.drain(), 12);

    let msg = message(&t, 1000, 2);
    let ri = RoutingInfo::udp_flow(&local(), &local());
    t.transmit(&burst(&msg, &ri));
    assert_eq!(receive_message(&mut t, 1)?, msg.data());
    Ok(())
}
