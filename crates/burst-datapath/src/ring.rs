//! The receive ring: received packet data pointers, handed to the layer
//! above in arrival order and released back to the pool oldest first.
//!
//! The ring owns every buffer it holds. `head` is the slot the next
//! received packet lands in, `tail` the oldest unreleased one; both advance
//! modulo the capacity.

use std::fmt;
use std::ptr::NonNull;

use crate::mbuf::Mbuf;

#[derive(Clone, Copy)]
struct RxSlot {
    data: NonNull<u8>,
    len: usize,
}

pub struct RxRing {
    slots: Box<[Option<RxSlot>]>,
    head: usize,
    tail: usize,
    len: usize,
}

impl RxRing {
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "rx ring needs at least one slot");
        Self {
            slots: vec![None; capacity].into_boxed_slice(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Unreleased entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn free_slots(&self) -> usize {
        self.capacity() - self.len
    }

    #[inline]
    pub fn head(&self) -> usize {
        self.head
    }

    #[inline]
    pub fn tail(&self) -> usize {
        self.tail
    }

    /// Store `mbuf`'s data pointer at the head and advance it, returning the
    /// slot used. A full ring hands the buffer back.
    pub fn push(&mut self, mbuf: Mbuf) -> Result<usize, Mbuf> {
        if self.len == self.capacity() {
            return Err(mbuf);
        }
        let slot = self.head;
        let len = mbuf.data_len();
        self.slots[slot] = Some(RxSlot {
            data: mbuf.into_raw(),
            len,
        });
        self.head = (self.head + 1) % self.capacity();
        self.len += 1;
        Ok(slot)
    }

    /// Reclaim the oldest entry's buffer and advance the tail.
    pub fn release_oldest(&mut self) -> Option<Mbuf> {
        if self.len == 0 {
            return None;
        }
        let slot = self.slots[self.tail].take()?;
        self.tail = (self.tail + 1) % self.capacity();
        self.len -= 1;
        // Safety: the pointer came from Mbuf::into_raw in push and the slot
        // has just been cleared, so it is reclaimed once.
        Some(unsafe { Mbuf::from_raw(slot.data) })
    }

    /// Packet data held in `slot`, if that slot is occupied.
    pub fn packet(&self, slot: usize) -> Option<&[u8]> {
        let entry = self.slots.get(slot)?.as_ref()?;
        // Safety: the ring owns the buffer until release_oldest, which needs
        // &mut self.
        Some(unsafe { std::slice::from_raw_parts(entry.data.as_ptr(), entry.len) })
    }

    /// Unreleased packets, oldest first, with their slot indices.
    pub fn unreleased(&self) -> impl Iterator<Item = (usize, &[u8])> + '_ {
        (0..self.len).filter_map(move |i| {
            let slot = (self.tail + i) % self.capacity();
            self.packet(slot).map(|data| (slot, data))
        })
    }
}

impl Drop for RxRing {
    fn drop(&mut self) {
        while let Some(mbuf) = self.release_oldest() {
            mbuf.free();
        }
    }
}

impl fmt::Debug for RxRing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RxRing")
            .field("capacity", &self.capacity())
            .field("len", &self.len)
            .field("head", &self.head)
            .field("tail", &self.tail)
            .finish()
    }
}
