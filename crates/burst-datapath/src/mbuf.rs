//! Driver packet buffers and the fixed pool they come from.
//!
//! An `Mbuf` is an owned handle to one pool segment: a small metadata block
//! followed by `MBUF_HEADROOM + MBUF_DATA_ROOM` bytes of buffer. Segments can
//! be chained into a multi-segment packet through `next`. Dropping (or
//! `free`ing) the head of a chain returns every segment to its pool, so a
//! segment is released exactly once and never while still referenced.
//!
//! `into_raw`/`from_raw` convert between a handle and the raw pointer to its
//! packet data. The receive ring stores those pointers; `from_raw` is the
//! data-pointer → handle resolver used when the buffer is released.
//!
//! Pools are single-threaded (`Rc`); a pool and its buffers belong to the one
//! worker driving a queue.

use std::cell::RefCell;
use std::fmt;
use std::marker::PhantomData;
use std::mem;
use std::ptr::NonNull;
use std::rc::{Rc, Weak};

use static_assertions::const_assert;

/// Bytes reserved in front of the packet data of every segment.
pub const MBUF_HEADROOM: usize = 128;
/// Bytes available for packet data in one segment.
pub const MBUF_DATA_ROOM: usize = 2048;

const MBUF_BUF_LEN: usize = MBUF_HEADROOM + MBUF_DATA_ROOM;

// Offsets and lengths are stored as u16.
const_assert!(MBUF_BUF_LEN <= u16::MAX as usize);

#[repr(C, align(64))]
struct MbufSeg {
    meta: SegMeta,
    buf: [u8; MBUF_BUF_LEN],
}

struct SegMeta {
    /// Start of packet data within `buf`.
    data_off: u16,
    /// Bytes of packet data in this segment.
    data_len: u16,
    /// Segments in the chain starting here (meaningful on the head only).
    nb_segs: u16,
    /// Bytes of packet data across the chain (meaningful on the head only).
    pkt_len: u32,
    next: Option<Mbuf>,
    pool: Weak<PoolShared>,
}

struct PoolShared {
    free: RefCell<Vec<NonNull<MbufSeg>>>,
    capacity: usize,
}

impl Drop for PoolShared {
    fn drop(&mut self) {
        for seg in self.free.get_mut().drain(..) {
            // Safety: every pooled segment came from Box::leak in Mempool::new
            // and is not referenced by any live Mbuf.
            unsafe { drop(Box::from_raw(seg.as_ptr())) };
        }
    }
}

// ── Mempool ──────────────────────────────────────────────────────────────────

/// Fixed-capacity pool of packet buffer segments.
///
/// Cloning yields another handle to the same pool.
#[derive(Clone)]
pub struct Mempool {
    shared: Rc<PoolShared>,
}

impl Mempool {
    /// Allocate `capacity` segments up front.
    pub fn new(capacity: usize) -> Self {
        let free = (0..capacity)
            .map(|_| {
                let seg = Box::new(MbufSeg {
                    meta: SegMeta {
                        data_off: MBUF_HEADROOM as u16,
                        data_len: 0,
                        nb_segs: 1,
                        pkt_len: 0,
                        next: None,
                        pool: Weak::new(),
                    },
                    buf: [0u8; MBUF_BUF_LEN],
                });
                NonNull::from(Box::leak(seg))
            })
            .collect();

        Self {
            shared: Rc::new(PoolShared {
                free: RefCell::new(free),
                capacity,
            }),
        }
    }

    /// Take a segment from the pool, reset to an empty single-segment buffer
    /// with default headroom. `None` when the pool is exhausted.
    pub fn alloc(&self) -> Option<Mbuf> {
        let seg = self.shared.free.borrow_mut().pop()?;
        let mut mbuf = Mbuf {
            seg,
            _owns: PhantomData,
        };
        let meta = mbuf.meta_mut();
        meta.data_off = MBUF_HEADROOM as u16;
        meta.data_len = 0;
        meta.nb_segs = 1;
        meta.pkt_len = 0;
        meta.next = None;
        meta.pool = Rc::downgrade(&self.shared);
        Some(mbuf)
    }

    /// Return a buffer (and every segment chained to it) to its pool.
    #[inline]
    pub fn free(&self, mbuf: Mbuf) {
        mbuf.free();
    }

    /// Segments currently in the pool.
    pub fn available(&self) -> usize {
        self.shared.free.borrow().len()
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity
    }

    /// Segments currently handed out.
    pub fn in_use(&self) -> usize {
        self.capacity() - self.available()
    }
}

impl fmt::Debug for Mempool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mempool")
            .field("capacity", &self.capacity())
            .field("available", &self.available())
            .finish()
    }
}

// ── Mbuf ─────────────────────────────────────────────────────────────────────

/// Owned handle to a pool segment, possibly the head of a chain.
pub struct Mbuf {
    seg: NonNull<MbufSeg>,
    _owns: PhantomData<MbufSeg>,
}

impl Mbuf {
    #[inline]
    fn meta(&self) -> &SegMeta {
        // Safety: the handle uniquely owns its segment.
        unsafe { &(*self.seg.as_ptr()).meta }
    }

    #[inline]
    fn meta_mut(&mut self) -> &mut SegMeta {
        unsafe { &mut (*self.seg.as_ptr()).meta }
    }

    #[inline]
    fn buf(&self) -> &[u8; MBUF_BUF_LEN] {
        unsafe { &(*self.seg.as_ptr()).buf }
    }

    #[inline]
    fn buf_mut(&mut self) -> &mut [u8; MBUF_BUF_LEN] {
        unsafe { &mut (*self.seg.as_ptr()).buf }
    }

    #[inline]
    pub fn data_len(&self) -> usize {
        self.meta().data_len as usize
    }

    #[inline]
    pub fn pkt_len(&self) -> usize {
        self.meta().pkt_len as usize
    }

    #[inline]
    pub fn nb_segs(&self) -> usize {
        self.meta().nb_segs as usize
    }

    /// Writable bytes from the data start to the end of the segment.
    #[inline]
    pub fn tailroom(&self) -> usize {
        MBUF_BUF_LEN - self.meta().data_off as usize
    }

    /// This segment's packet data.
    #[inline]
    pub fn data(&self) -> &[u8] {
        let off = self.meta().data_off as usize;
        &self.buf()[off..off + self.data_len()]
    }

    /// The whole writable region starting at the data pointer, regardless of
    /// the current data length.
    #[inline]
    pub fn room_mut(&mut self) -> &mut [u8] {
        let off = self.meta().data_off as usize;
        &mut self.buf_mut()[off..]
    }

    /// Set this segment's data length and the packet length to `len`.
    #[inline]
    pub fn set_len(&mut self, len: usize) {
        debug_assert!(len <= self.tailroom());
        let meta = self.meta_mut();
        meta.data_len = len as u16;
        meta.pkt_len = len as u32;
    }

    /// Append `tail` to the end of this chain. The head's segment count and
    /// packet length grow by the tail's.
    pub fn chain(&mut self, tail: Mbuf) {
        fn append(slot: &mut Option<Mbuf>, tail: Mbuf) {
            match slot {
                Some(seg) => append(&mut seg.meta_mut().next, tail),
                None => *slot = Some(tail),
            }
        }

        let meta = self.meta_mut();
        meta.nb_segs += tail.nb_segs() as u16;
        meta.pkt_len += tail.pkt_len() as u32;
        append(&mut meta.next, tail);
    }

    /// The next segment in the chain.
    #[inline]
    pub fn next(&self) -> Option<&Mbuf> {
        self.meta().next.as_ref()
    }

    /// Data of every segment in chain order.
    pub fn segments(&self) -> Segments<'_> {
        Segments { cur: Some(self) }
    }

    /// The whole packet, segments concatenated.
    pub fn to_vec(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.pkt_len());
        self.segments().for_each(|s| out.extend_from_slice(s));
        out
    }

    /// Return this buffer and its chain to the pool.
    #[inline]
    pub fn free(self) {
        drop(self);
    }

    /// Consume the handle, returning a pointer to its packet data. The
    /// segment stays out of the pool until `from_raw` reclaims it.
    pub fn into_raw(self) -> NonNull<u8> {
        debug_assert_eq!(self.meta().data_off as usize, MBUF_HEADROOM);
        let seg = self.seg.as_ptr();
        mem::forget(self);
        // Safety: HEADROOM is within the segment's buffer.
        unsafe {
            let buf = std::ptr::addr_of_mut!((*seg).buf).cast::<u8>();
            NonNull::new_unchecked(buf.add(MBUF_HEADROOM))
        }
    }

    /// Recover the handle owning the packet data at `data`.
    ///
    /// # Safety
    /// `data` must have been returned by `into_raw` and not reclaimed since.
    pub unsafe fn from_raw(data: NonNull<u8>) -> Mbuf {
        let offset = mem::offset_of!(MbufSeg, buf) + MBUF_HEADROOM;
        let seg = data.as_ptr().sub(offset).cast::<MbufSeg>();
        Mbuf {
            seg: NonNull::new_unchecked(seg),
            _owns: PhantomData,
        }
    }

    /// Structural consistency of this buffer. With `is_header`, also checks
    /// the chain against the head's segment count and packet length.
    pub fn check(&self, is_header: bool) -> Result<(), &'static str> {
        let meta = self.meta();
        if meta.data_off as usize + meta.data_len as usize > MBUF_BUF_LEN {
            return Err("data overruns segment");
        }
        if meta.pool.upgrade().is_none() {
            return Err("segment has no pool");
        }
        if !is_header {
            return Ok(());
        }

        let (segs, len) = self
            .segments()
            .fold((0usize, 0usize), |(n, l), s| (n + 1, l + s.len()));
        if segs != self.nb_segs() {
            return Err("bad nb_segs");
        }
        if len != self.pkt_len() {
            return Err("bad pkt_len");
        }
        Ok(())
    }

    /// Like `check`, but a corrupt buffer is fatal.
    pub fn sanity_check(&self, is_header: bool) {
        if let Err(reason) = self.check(is_header) {
            tracing::error!(reason, mbuf = ?self, "mbuf sanity check failed");
            panic!("mbuf sanity check failed: {reason}");
        }
    }
}

impl Drop for Mbuf {
    fn drop(&mut self) {
        let next = self.meta_mut().next.take();
        let pool = self.meta().pool.upgrade();
        match pool {
            Some(pool) => pool.free.borrow_mut().push(self.seg),
            // Pool already gone: nothing to return to.
            None => unsafe { drop(Box::from_raw(self.seg.as_ptr())) },
        }
        drop(next);
    }
}

impl fmt::Debug for Mbuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mbuf")
            .field("data_off", &self.meta().data_off)
            .field("data_len", &self.data_len())
            .field("pkt_len", &self.pkt_len())
            .field("nb_segs", &self.nb_segs())
            .finish()
    }
}

/// Iterator over the data of each segment in a chain.
pub struct Segments<'a> {
    cur: Option<&'a Mbuf>,
}

impl<'a> Iterator for Segments<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        let seg = self.cur?;
        self.cur = seg.next();
        Some(seg.data())
    }
}
