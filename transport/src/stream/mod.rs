//! Continuous byte streams over pooled views.
//!
//! The writer owns the boundary-marker policy; the reader is a dumb byte pump that
//! rotates views transparently and leaves marker interpretation to the record layer
//! above it. Keeping the two concerns apart keeps the stream types symmetric and the
//! marker policy in one place.

pub mod output;
pub mod input;

pub use output::ContinuousOutputStream;
pub use input::ContinuousInputStream;
