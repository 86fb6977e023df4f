#[cfg(feature = "tracy")]
pub use tracy_client::{span_location, Client};

/// Open a profiling zone that lasts until the end of the enclosing scope
#[cfg(not(feature = "tracy"))]
#[macro_export]
macro_rules! profile_zone {
    ($name:expr) => {};
}

/// Open a profiling zone that lasts until the end of the enclosing scope
///
/// Does nothing until the profiler client is started.
#[cfg(feature = "tracy")]
#[macro_export]
macro_rules! profile_zone {
    ($name:expr) => {
        let _tracy_zone = $crate::profiling::tracy::Client::running()
            .map(|client| client.span($crate::profiling::tracy::span_location!($name), 0));
    };
}

/// Start the profiler client
#[cfg(feature = "tracy")]
pub fn start() {
    Client::start();
}

#[cfg(not(feature = "tracy"))]
pub fn start() {}

/// Mark the end of a rendered frame
#[cfg(feature = "tracy")]
pub fn mark_frame() {
    if let Some(client) = Client::running() {
        client.frame_mark();
    }
}

#[cfg(not(feature = "tracy"))]
pub fn mark_frame() {}

/// Name the current thread in the profiler
#[cfg(feature = "tracy")]
pub fn set_thread_name(name: &str) {
    if let Some(client) = Client::running() {
        client.set_thread_name(name);
    }
}

#[cfg(not(feature = "tracy"))]
pub fn set_thread_name(_name: &str) {}
