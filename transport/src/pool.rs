//! A bounded pool of fixed-size views carved from one arena allocation.

use std::sync::{Arc, Condvar, Mutex};

use strom_bytes::view::View;

use crate::markers::MARKER_LEN;
use crate::{ViewProvider, ViewSink};

/// A fixed budget of reusable views.
///
/// The pool carves a single arena allocation into `views` windows of `view_bytes`
/// each. [`acquire`](ViewPool::acquire) blocks while the freelist is empty and the
/// pool is open; this is the designated suspension point through which downstream
/// slowness propagates back into the producing thread. [`close`](ViewPool::close)
/// releases every blocked caller with `None`, which is the hard-cancel path.
pub struct ViewPool {
    shared: Mutex<Shared>,
    available: Condvar,
    views: usize,
    view_bytes: usize,
    reserve: usize,
}

struct Shared {
    free: Vec<View>,
    closed: bool,
}

impl ViewPool {

    /// Allocates a pool of `views` views of `view_bytes` bytes each.
    pub fn new(views: usize, view_bytes: usize) -> Arc<ViewPool> {
        ViewPool::with_reserve(views, view_bytes, 0)
    }

    /// Allocates a pool whose views reserve their first `reserve` bytes.
    ///
    /// The reserved prefix leaves room for a transport header to be written in front
    /// of the payload without copying it.
    pub fn with_reserve(views: usize, view_bytes: usize, reserve: usize) -> Arc<ViewPool> {

        assert!(views > 0);
        assert!(view_bytes > reserve + MARKER_LEN);

        let arena = vec![0u8; views * view_bytes].into_boxed_slice();
        let free = View::carve(arena, view_bytes, reserve);

        Arc::new(ViewPool {
            shared: Mutex::new(Shared { free, closed: false }),
            available: Condvar::new(),
            views,
            view_bytes,
            reserve,
        })
    }

    /// Takes the next free view, blocking while none is available.
    ///
    /// Returns `None` once the pool has been closed; a thread blocked here when
    /// [`close`](ViewPool::close) is called observes `None` rather than blocking
    /// forever.
    pub fn acquire(&self) -> Option<View> {
        let mut shared = self.shared.lock().expect("unable to lock pool");
        loop {
            if let Some(view) = shared.free.pop() {
                return Some(view);
            }
            if shared.closed {
                return None;
            }
            shared = self.available.wait(shared).expect("unable to wait on pool");
        }
    }

    /// Returns a view to the freelist and wakes one blocked acquirer.
    ///
    /// Views with a foreign geometry (arrivals allocated elsewhere, e.g. by a network
    /// receiver) are dropped rather than adopted, keeping the freelist uniform.
    pub fn release(&self, view: View) {
        if view.capacity() != self.view_bytes || view.base_offset() != self.reserve {
            return;
        }
        let mut shared = self.shared.lock().expect("unable to lock pool");
        if !shared.closed {
            shared.free.push(view);
            self.available.notify_one();
        }
    }

    /// Closes the pool, waking every blocked acquirer with `None`.
    pub fn close(&self) {
        let mut shared = self.shared.lock().expect("unable to lock pool");
        shared.closed = true;
        shared.free.clear();
        self.available.notify_all();
    }

    /// The number of currently free views.
    pub fn free_views(&self) -> usize {
        self.shared.lock().expect("unable to lock pool").free.len()
    }

    /// The total number of views in the pool's budget.
    pub fn views(&self) -> usize {
        self.views
    }

    /// Bytes per view, including any reserved prefix.
    pub fn view_bytes(&self) -> usize {
        self.view_bytes
    }

    /// Reserved leading bytes per view.
    pub fn reserve(&self) -> usize {
        self.reserve
    }
}

impl ViewProvider for Arc<ViewPool> {
    fn get(&mut self) -> Option<View> {
        self.acquire()
    }
}

impl ViewSink for Arc<ViewPool> {
    fn put(&mut self, view: View) {
        self.release(view)
    }
}
