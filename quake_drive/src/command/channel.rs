//! Bounded command channel and single-slot urgent signal path.
//!
//! The ordinary channel is a fixed-capacity FIFO between the ingestion and
//! motion contexts. Enqueue blocks while full, giving backpressure to the
//! ingestion side instead of silently losing commands; dequeue never
//! blocks, so the dispatcher never stalls waiting for work.
//!
//! `BATCH_SIZE` replaces the capacity at runtime. The resize is
//! **destructive**: queued-but-unprocessed commands are discarded and
//! their count is returned so the caller can report it.
//!
//! The urgent slot carries at most one `Stop`/`Reset` signal and is
//! checked by the dispatcher before the ordinary queue on every iteration,
//! so urgent signals are never starved behind queued motions.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use quake_common::command::{Command, UrgentSignal};

#[derive(Debug)]
struct ChannelState {
    queue: VecDeque<Command>,
    capacity: usize,
}

/// Bounded FIFO of ordinary commands.
#[derive(Debug)]
pub struct CommandChannel {
    state: Mutex<ChannelState>,
    space: Condvar,
}

impl CommandChannel {
    /// Create a channel with the given capacity (at least 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            state: Mutex::new(ChannelState {
                queue: VecDeque::with_capacity(capacity),
                capacity,
            }),
            space: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ChannelState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Enqueue a command, blocking while the channel is full.
    pub fn push(&self, command: Command) {
        let mut state = self.lock();
        while state.queue.len() >= state.capacity {
            state = self
                .space
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
        state.queue.push_back(command);
    }

    /// Dequeue the oldest command without blocking.
    pub fn try_pop(&self) -> Option<Command> {
        let mut state = self.lock();
        let command = state.queue.pop_front();
        if command.is_some() {
            self.space.notify_one();
        }
        command
    }

    /// Discard all queued commands, returning how many were dropped.
    pub fn flush(&self) -> usize {
        let mut state = self.lock();
        let discarded = state.queue.len();
        state.queue.clear();
        self.space.notify_all();
        discarded
    }

    /// Replace the capacity, discarding all queued commands.
    ///
    /// Returns the number of discarded commands; the caller is expected to
    /// surface a non-zero count rather than hide it.
    pub fn resize(&self, capacity: usize) -> usize {
        let mut state = self.lock();
        let discarded = state.queue.len();
        state.queue = VecDeque::with_capacity(capacity);
        state.capacity = capacity;
        self.space.notify_all();
        discarded
    }

    /// Number of queued commands.
    pub fn len(&self) -> usize {
        self.lock().queue.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Current capacity.
    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }
}

/// Single-slot channel for `Stop`/`Reset`, latest signal wins.
#[derive(Debug, Default)]
pub struct UrgentSlot(AtomicU8);

impl UrgentSlot {
    /// Create an empty slot.
    pub const fn new() -> Self {
        Self(AtomicU8::new(0))
    }

    /// Post a signal, replacing any pending one.
    pub fn post(&self, signal: UrgentSignal) {
        self.0.store(signal as u8, Ordering::SeqCst);
    }

    /// Take the pending signal, if any, emptying the slot.
    pub fn take(&self) -> Option<UrgentSignal> {
        UrgentSignal::from_u8(self.0.swap(0, Ordering::SeqCst))
    }

    /// Whether a signal is pending (without consuming it).
    pub fn is_pending(&self) -> bool {
        self.0.load(Ordering::SeqCst) != 0
    }
}
