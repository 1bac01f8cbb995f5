//! Exclusively owned byte windows carved from a common allocation.
//!
//! A [`view::View`] is a bounded window into pool-owned memory: it dereferences to a
//! mutable byte slice, records a `base_offset` of reserved leading bytes, and keeps
//! the backing allocation alive through a shared handle. Views are move-only values;
//! handing one from a producer to the transport, or from the transport to a consumer,
//! transfers ownership outright, so no two pipeline stages can write the same bytes
//! concurrently.
//!
//! # Examples
//!
//! ```
//! use strom_bytes::view::View;
//!
//! let arena = vec![0u8; 1024].into_boxed_slice();
//! let mut views = View::carve(arena, 256, 16);
//!
//! assert_eq!(views.len(), 4);
//! for view in views.iter() {
//!     assert_eq!(view.capacity(), 256);
//!     assert_eq!(view.base_offset(), 16);
//!     assert_eq!(view.size(), 240);
//! }
//!
//! // Writes through one view are invisible to the others.
//! let mut view = views.pop().unwrap();
//! for byte in view.iter_mut() { *byte = 1u8; }
//! assert!(views.iter().all(|v| v.iter().all(|b| *b == 0u8)));
//! ```
#![forbid(missing_docs)]

/// A movable window into a shared allocation.
pub mod view {

    use std::ops::{Deref, DerefMut};
    use std::sync::Arc;
    use std::any::Any;

    /// A bounded window into pool-owned memory.
    ///
    /// An instance of this type contends that `ptr` is valid for `cap` bytes, and that
    /// no other reference to these bytes exists for as long as the instance does. The
    /// allocation itself lives behind `sequestered`, which keeps its address stable
    /// for the lifetime of every view carved from it.
    ///
    /// The first `base` bytes of the window are reserved space, available for a
    /// transport header to be written in front of the payload without copying it.
    pub struct View {
        /// Pointer to the start of this window (not the allocation).
        ptr: *mut u8,
        /// Length of this window.
        cap: usize,
        /// First usable byte of the window.
        base: usize,
        /// Shared access to underlying resources.
        sequestered: Arc<dyn Any>,
    }

    // The windows of carved views are pairwise disjoint, and the backing allocation
    // remains allocated and pinned behind `sequestered` until the last view drops.
    unsafe impl Send for View { }

    impl View {

        /// Wraps an entire allocation as a single view with no reserved prefix.
        pub fn from<B>(bytes: B) -> View where B: DerefMut<Target=[u8]>+'static {
            View::with_base(bytes, 0)
        }

        /// Wraps an entire allocation as a single view whose first `base` bytes are reserved.
        pub fn with_base<B>(bytes: B, base: usize) -> View where B: DerefMut<Target=[u8]>+'static {

            let mut sequestered = Arc::new(bytes) as Arc<dyn Any>;
            let (ptr, cap) =
            Arc::get_mut(&mut sequestered)
                .unwrap()
                .downcast_mut::<B>()
                .map(|a| (a.as_mut_ptr(), a.len()))
                .unwrap();

            assert!(base < cap);

            View {
                ptr,
                cap,
                base,
                sequestered,
            }
        }

        /// Splits one allocation into equal disjoint windows of `segment` bytes.
        ///
        /// Each window reserves its first `base` bytes; trailing bytes of the
        /// allocation that do not fill a whole segment are left unused.
        pub fn carve<B>(bytes: B, segment: usize, base: usize) -> Vec<View> where B: DerefMut<Target=[u8]>+'static {

            assert!(segment > 0);
            assert!(base < segment);

            let mut sequestered = Arc::new(bytes) as Arc<dyn Any>;
            let (ptr, len) =
            Arc::get_mut(&mut sequestered)
                .unwrap()
                .downcast_mut::<B>()
                .map(|a| (a.as_mut_ptr(), a.len()))
                .unwrap();

            (0 .. len / segment)
                .map(|index| View {
                    ptr: ptr.wrapping_add(index * segment),
                    cap: segment,
                    base,
                    sequestered: Arc::clone(&sequestered),
                })
                .collect()
        }

        /// The first usable byte of the window.
        #[inline(always)]
        pub fn base_offset(&self) -> usize {
            self.base
        }

        /// Usable length: the window's capacity less its reserved prefix.
        #[inline(always)]
        pub fn size(&self) -> usize {
            self.cap - self.base
        }

        /// Total length of the window in bytes.
        #[inline(always)]
        pub fn capacity(&self) -> usize {
            self.cap
        }
    }

    impl Deref for View {
        type Target = [u8];
        #[inline(always)]
        fn deref(&self) -> &[u8] {
            unsafe { ::std::slice::from_raw_parts(self.ptr, self.cap) }
        }
    }

    impl DerefMut for View {
        #[inline(always)]
        fn deref_mut(&mut self) -> &mut [u8] {
            unsafe { ::std::slice::from_raw_parts_mut(self.ptr, self.cap) }
        }
    }

    #[cfg(test)]
    mod tests {

        use super::View;

        #[test]
        fn carve_is_disjoint() {
            let arena = vec![0u8; 64].into_boxed_slice();
            let mut views = View::carve(arena, 16, 0);
            assert_eq!(views.len(), 4);
            for (index, view) in views.iter_mut().enumerate() {
                for byte in view.iter_mut() { *byte = index as u8; }
            }
            for (index, view) in views.iter().enumerate() {
                assert!(view.iter().all(|b| *b == index as u8));
            }
        }

        #[test]
        fn carve_drops_partial_tail() {
            let arena = vec![0u8; 100].into_boxed_slice();
            let views = View::carve(arena, 32, 0);
            assert_eq!(views.len(), 3);
        }

        #[test]
        fn views_survive_across_threads() {
            let arena = vec![0u8; 32].into_boxed_slice();
            let mut views = View::carve(arena, 16, 4);
            let view = views.pop().unwrap();
            let view = std::thread::spawn(move || {
                assert_eq!(view.size(), 12);
                view
            }).join().unwrap();
            assert_eq!(view.capacity(), 16);
        }
    }
}
