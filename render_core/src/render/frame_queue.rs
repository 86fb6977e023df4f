//! Depth-1 hand-off between the logical and render threads
//!
//! The logical thread only pushes into an empty slot, so a slow render
//! thread makes it skip frames instead of queueing them. The render thread
//! blocks on the condition variable until a frame arrives or quit is
//! requested.

use super::frame::RenderFrame;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};
use tracing::debug;

#[derive(Default)]
struct Slot {
    frame: Option<RenderFrame>,
    quit: bool,
}

/// Single-slot frame queue
#[derive(Default)]
pub struct FrameQueue {
    slot: Mutex<Slot>,
    ready: Condvar,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `frame` if the slot is empty, otherwise hand it back
    ///
    /// Frames are refused once quit was requested.
    pub fn try_push(&self, frame: RenderFrame) -> Result<(), RenderFrame> {
        let mut slot = self.lock();
        if slot.quit || slot.frame.is_some() {
            return Err(frame);
        }
        slot.frame = Some(frame);
        drop(slot);
        self.ready.notify_one();
        Ok(())
    }

    /// Whether a frame is waiting to be rendered
    pub fn is_occupied(&self) -> bool {
        self.lock().frame.is_some()
    }

    /// Number of queued frames, zero or one
    pub fn len(&self) -> usize {
        usize::from(self.is_occupied())
    }

    pub fn is_empty(&self) -> bool {
        !self.is_occupied()
    }

    /// Wait for the next frame; `None` once quit was requested
    pub fn pop_blocking(&self) -> Option<RenderFrame> {
        let mut slot = self.lock();
        loop {
            if slot.quit {
                return None;
            }
            if let Some(frame) = slot.frame.take() {
                return Some(frame);
            }
            slot = self
                .ready
                .wait(slot)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`pop_blocking`](Self::pop_blocking) but gives up after `timeout`
    pub fn pop_timeout(&self, timeout: Duration) -> Option<RenderFrame> {
        let deadline = Instant::now() + timeout;
        let mut slot = self.lock();
        loop {
            if slot.quit {
                return None;
            }
            if let Some(frame) = slot.frame.take() {
                return Some(frame);
            }
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return None;
            }
            slot = self
                .ready
                .wait_timeout(slot, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Stop the pipeline and wake every waiting thread
    ///
    /// A frame still in the slot is dropped undelivered.
    pub fn request_quit(&self) {
        let mut slot = self.lock();
        slot.quit = true;
        if let Some(frame) = slot.frame.take() {
            debug!(frame = frame.number, "Dropping queued frame on quit");
        }
        drop(slot);
        self.ready.notify_all();
    }

    pub fn is_quitting(&self) -> bool {
        self.lock().quit
    }

    fn lock(&self) -> MutexGuard<'_, Slot> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
