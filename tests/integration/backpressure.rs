use crate::*;

use burst_datapath::sim::TxCall;

#[test]
fn test_partial_acceptance_sends_each_packet_once_in_order() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 7000, 3);
    let ri = RoutingInfo::udp_flow(&local(), &peer());
    assert_eq!(msg.num_pkts(), 5);

    t.device_mut().script_tx_accept(0, [3, 0, 0, 1]);
    t.transmit(&burst(&msg, &ri));

    assert_eq!(
        t.device().tx_calls(0),
        &[
            TxCall { offered: 5, accepted: 3 },
            TxCall { offered: 2, accepted: 0 },
            TxCall { offered: 2, accepted: 0 },
            TxCall { offered: 2, accepted: 1 },
            TxCall { offered: 1, accepted: 1 },
        ]
    );
    let sent = t.device_mut().take_sent(0);
    let nums = sent
        .iter()
        .map(|m| pkt_num(m.data()))
        .collect::<Result<Vec<_>>>()?;
    assert_eq!(nums, vec![0, 1, 2, 3, 4]);
    assert_eq!(payload_of(&sent), msg.data());
    assert_eq!(t.stats().tx_retries, 4);
    Ok(())
}

#[test]
fn test_stalled_queue_warns_and_keeps_retrying() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 10, 3);
    let ri = RoutingInfo::udp_flow(&local(), &peer());

    t.device_mut().script_tx_accept(0, std::iter::repeat(0).take(25));
    t.transmit(&burst(&msg, &ri));

    // Warned at retries 10 and 20, then the queue drained.
    assert_eq!(t.stats().tx_retries, 25);
    assert_eq!(t.stats().tx_stall_warnings, 2);
    assert_eq!(t.device().sent(0).len(), 1);
    assert_eq!(t.device().tx_calls(0).len(), 26);
    Ok(())
}

#[test]
fn test_backpressure_does_not_leak_buffers() -> Result<()> {
    let mut t = transport()?;
    let msg = message(&t, 3000, 3);
    let ri = RoutingInfo::udp_flow(&local(), &peer());

    for _ in 0..50 {
        t.device_mut().script_tx_accept(0, [1, 0, 1]);
        t.transmit(&burst(&msg, &ri));
        t.device_mut().complete_tx(0);
    }
    assert_eq!(t.pool().in_use(), 0);
    assert_eq!(t.stats().tx_pkts, 150);
    Ok(())
}
