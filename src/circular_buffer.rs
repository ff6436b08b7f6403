/*! Circular buffer used to back streams.

Each [`Buffer`] is a single producer / single consumer ring buffer, shared
between the writing block and the reading block via an `Arc`. Unlike a
classic lock-free SPSC queue, a `Buffer` is polled cooperatively by the
single-threaded [`crate::graph::Graph`] scheduler: there's no blocking here,
only "how much is available right now".
*/
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::stream::Tag;
use crate::{Error, Result};

static NEXT_BUFFER_ID: AtomicUsize = AtomicUsize::new(1);

struct Inner<T> {
    buf: Vec<T>,
    rpos: usize,
    wpos: usize,
    // `len` is true capacity; rpos==wpos always means empty, so we keep one
    // extra slot of headroom and never completely fill the backing Vec.
    full: bool,
    closed: bool,
}

/// A fixed-capacity ring buffer of samples, shared by the read and write
/// side of a stream.
pub struct Buffer<T> {
    id: usize,
    capacity: usize,
    inner: Mutex<Inner<T>>,
}

impl<T: Copy> Buffer<T> {
    /// Create a new buffer with room for `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::new("circular buffer capacity must be nonzero"));
        }
        Ok(Self {
            id: NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed),
            capacity,
            inner: Mutex::new(Inner {
                buf: Vec::with_capacity(capacity),
                rpos: 0,
                wpos: 0,
                full: false,
                closed: false,
            }),
        })
    }

    /// ID shared between the read and write side of the stream this buffer
    /// backs.
    #[must_use]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Total capacity of this buffer, in samples.
    #[must_use]
    pub fn total_size(&self) -> usize {
        self.capacity
    }

    /// Number of samples free for writing right now.
    #[must_use]
    pub fn free(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        self.capacity - Self::used(&inner, self.capacity)
    }

    /// True if there's nothing to read right now.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        let inner = self.inner.lock().unwrap();
        Self::used(&inner, self.capacity) == 0
    }

    fn used(inner: &Inner<T>, capacity: usize) -> usize {
        if inner.full {
            capacity
        } else if inner.wpos >= inner.rpos {
            inner.wpos - inner.rpos
        } else {
            capacity - inner.rpos + inner.wpos
        }
    }

    /// Mark this side closed. The other side will see EOF once the buffer
    /// drains.
    pub(crate) fn close(&self) {
        self.inner.lock().unwrap().closed = true;
    }

    /// Return how many samples are available to read, without blocking.
    /// The single-threaded graph calls this once per scheduling pass rather
    /// than actually waiting.
    #[must_use]
    pub fn wait_for_read(&self, _need: usize) -> usize {
        let inner = self.inner.lock().unwrap();
        Self::used(&inner, self.capacity)
    }

    /// Return how many samples worth of space are available to write,
    /// without blocking.
    #[must_use]
    pub fn wait_for_write(&self, _need: usize) -> usize {
        self.capacity - Self::used(&self.inner.lock().unwrap(), self.capacity)
    }

    /// Get a reader over the currently readable contiguous range.
    pub fn read_buf(self: Arc<Self>) -> Result<(BufferReader<T>, Vec<Tag>)> {
        Ok((BufferReader { circ: self }, Vec::new()))
    }

    /// Get a writer over the currently writable contiguous range.
    pub fn write_buf(self: Arc<Self>) -> Result<BufferWriter<T>> {
        Ok(BufferWriter { circ: self })
    }
}

/// A read-only window into a [`Buffer`]'s currently available data.
///
/// Data is returned as a contiguous slice: when the readable range wraps
/// around the end of the backing storage, only the first contiguous run is
/// exposed. The caller will see the rest on its next call, after consuming.
pub struct BufferReader<T> {
    circ: Arc<Buffer<T>>,
}

impl<T: Copy> BufferReader<T> {
    /// Number of samples available in this contiguous window.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slice().len()
    }

    /// True if there's nothing available right now.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the available data as a contiguous slice.
    #[must_use]
    pub fn slice(&self) -> &[T] {
        let inner = self.circ.inner.lock().unwrap();
        let (start, end) = Self::contiguous_read_range(&inner, self.circ.capacity);
        // SAFETY: we only ever hand out one BufferReader and one
        // BufferWriter at a time (enforced by the refcount checks in
        // stream.rs), and this slice never outlives the lock's data, since
        // the backing Vec is never reallocated after construction.
        let buf_ptr = inner.buf.as_ptr();
        unsafe { std::slice::from_raw_parts(buf_ptr.add(start), end - start) }
    }

    /// Iterate over the available data.
    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.slice().iter()
    }

    /// Mark `n` samples as consumed, freeing that space for writing.
    pub fn consume(&self, n: usize) {
        let mut inner = self.circ.inner.lock().unwrap();
        let used = Buffer::<T>::used(&inner, self.circ.capacity);
        assert!(n <= used, "consumed too much: {n} > {used}");
        if n > 0 {
            inner.full = false;
        }
        inner.rpos = (inner.rpos + n) % self.circ.capacity;
    }

    fn contiguous_read_range(inner: &Inner<T>, capacity: usize) -> (usize, usize) {
        if inner.buf.len() < capacity {
            // Buffer hasn't been grown to capacity yet; nothing written
            // past its current length.
            return (inner.rpos.min(inner.buf.len()), inner.wpos.min(inner.buf.len()));
        }
        if Buffer::<T>::used(inner, capacity) == 0 {
            (inner.rpos, inner.rpos)
        } else if inner.wpos > inner.rpos {
            (inner.rpos, inner.wpos)
        } else {
            // Wrapped: only the run up to the end of the backing storage is
            // contiguous.
            (inner.rpos, capacity)
        }
    }
}

/// A writable window into a [`Buffer`]'s currently free space.
pub struct BufferWriter<T> {
    circ: Arc<Buffer<T>>,
}

impl<T: Copy + Default> BufferWriter<T> {
    /// Number of samples that can be written in this contiguous window.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.circ.inner.lock().unwrap();
        let (start, end) = Self::contiguous_write_range(&inner, self.circ.capacity);
        end - start
    }

    /// True if there's no room to write right now.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Borrow the writable window as a mutable slice.
    #[must_use]
    pub fn slice(&mut self) -> &mut [T] {
        let mut inner = self.circ.inner.lock().unwrap();
        let capacity = self.circ.capacity;
        if inner.buf.len() < capacity {
            inner.buf.resize(capacity, T::default());
        }
        let (start, end) = Self::contiguous_write_range(&inner, capacity);
        let buf_ptr = inner.buf.as_mut_ptr();
        unsafe { std::slice::from_raw_parts_mut(buf_ptr.add(start), end - start) }
    }

    /// Copy `data` into the writable window. Panics if there isn't room.
    pub fn fill_from_slice(&mut self, data: &[T]) {
        let dst = self.slice();
        assert!(data.len() <= dst.len(), "fill_from_slice: not enough room");
        dst[..data.len()].copy_from_slice(data);
    }

    /// Copy the contents of `iter` into the writable window. Panics if
    /// there isn't room.
    pub fn fill_from_iter<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        let dst = self.slice();
        let mut n = 0;
        for (slot, val) in dst.iter_mut().zip(iter) {
            *slot = val;
            n += 1;
        }
        assert!(n <= dst.len(), "fill_from_iter: not enough room");
    }

    /// Commit `n` written samples, along with any tags attached at this
    /// position. Tags are currently dropped; nothing in this receiver
    /// produces them yet.
    pub fn produce(&mut self, n: usize, _tags: &[Tag]) {
        let mut inner = self.circ.inner.lock().unwrap();
        let capacity = self.circ.capacity;
        let (start, end) = Self::contiguous_write_range(&inner, capacity);
        assert!(n <= end - start, "produced too much: {n} > {}", end - start);
        inner.wpos = (inner.wpos + n) % capacity;
        if n > 0 && inner.wpos == inner.rpos {
            inner.full = true;
        }
    }

    fn contiguous_write_range(inner: &Inner<T>, capacity: usize) -> (usize, usize) {
        if inner.full {
            return (inner.wpos, inner.wpos);
        }
        if inner.wpos >= inner.rpos {
            (inner.wpos, capacity)
        } else {
            (inner.wpos, inner.rpos)
        }
    }
}
