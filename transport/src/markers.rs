//! In-band boundary markers shared by the writer and the record layer.
//!
//! The output stream writes markers; the input stream never interprets them, it is a
//! byte pump. The record layer above the input stream recognizes both sequences at
//! frame positions and must never surface them to its caller as payload.
//!
//! Record frames open with a big-endian `u32` length strictly below
//! [`MAX_RECORD_LEN`], while both markers decode as `u32` values above it. A frame
//! position therefore reads unambiguously as either a length or a marker, with no
//! escaping required of the record encoding.

/// Written when the next write plus the reserved trailer does not fit the current
/// view: the view changes here, more data follows.
pub const BLOCK_END: [u8; 4] = [0xff, 0xff, 0xff, 0xfe];

/// Written exactly once when the logical stream closes: no more data follows.
pub const ITERATION_END: [u8; 4] = [0xff, 0xff, 0xff, 0xff];

/// Length in bytes of either marker.
pub const MARKER_LEN: usize = 4;

/// Largest serialized record length the frame prefix can carry.
pub const MAX_RECORD_LEN: usize = 0xffff_fffd;

#[cfg(test)]
mod tests {

    use super::*;

    #[test]
    fn markers_exceed_any_frame_length() {
        let block_end = u32::from_be_bytes(BLOCK_END) as usize;
        let iteration_end = u32::from_be_bytes(ITERATION_END) as usize;
        assert!(block_end > MAX_RECORD_LEN);
        assert!(iteration_end > MAX_RECORD_LEN);
        assert_ne!(block_end, iteration_end);
    }
}
