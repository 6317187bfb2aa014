//! The NIC queue interface the datapath drives.

use crate::mbuf::Mbuf;

/// One Ethernet port as seen by a poll-mode driver: non-blocking burst
/// receive and transmit on numbered queue pairs.
pub trait EthDev {
    /// Move up to `max` received packets from `queue` into `out`, returning
    /// how many were appended. Never blocks; `0` means nothing is pending.
    fn rx_burst(&mut self, queue: u16, out: &mut Vec<Mbuf>, max: usize) -> usize;

    /// Offer `pkts` to `queue`. The device takes ownership of an accepted
    /// prefix, leaving `None` in those slots, and returns its length. The
    /// rest stay with the caller untouched.
    fn tx_burst(&mut self, queue: u16, pkts: &mut [Option<Mbuf>]) -> usize;
}

impl<D: EthDev + ?Sized> EthDev for &mut D {
    #[inline]
    fn rx_burst(&mut self, queue: u16, out: &mut Vec<Mbuf>, max: usize) -> usize {
        (**self).rx_burst(queue, out, max)
    }

    #[inline]
    fn tx_burst(&mut self, queue: u16, pkts: &mut [Option<Mbuf>]) -> usize {
        (**self).tx_burst(queue, pkts)
    }
}
