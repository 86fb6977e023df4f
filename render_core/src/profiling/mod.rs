//! Optional Tracy instrumentation
//!
//! Enabled with the `tracy` feature and started with [`start`]. Without the
//! feature every hook compiles to nothing.

pub mod tracy;

pub use crate::profile_zone;
pub use tracy::{mark_frame, set_thread_name, start};
