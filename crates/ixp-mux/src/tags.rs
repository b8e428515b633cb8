use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use tracing::warn;

/// Tag reserved for sequential requests. Never issued by a [`TagPool`].
pub const NOTAG: u16 = 0xFFFF;

/// Bounded pool of request tags.
///
/// [`acquire`](TagPool::acquire) blocks while every tag is issued, which is
/// what bounds the number of tagged requests in flight. Released tags are
/// reissued most-recently-freed first.
#[derive(Debug)]
pub struct TagPool {
    state: Mutex<PoolState>,
    freed: Condvar,
}

#[derive(Debug)]
struct PoolState {
    free: Vec<u16>,
    issued: Vec<bool>,
    closed: bool,
}

impl TagPool {
    /// Create a pool issuing tags `1..=max_tags`, skipping [`NOTAG`].
    pub fn new(max_tags: u16) -> Self {
        let free: Vec<u16> = (1..=max_tags).filter(|&tag| tag != NOTAG).rev().collect();
        Self {
            state: Mutex::new(PoolState {
                free,
                issued: vec![false; max_tags as usize + 1],
                closed: false,
            }),
            freed: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take a free tag, waiting for one to be released if necessary.
    ///
    /// Returns `None` once the pool has been closed.
    pub fn acquire(&self) -> Option<u16> {
        let mut state = self.lock();
        loop {
            if state.closed {
                return None;
            }
            if let Some(tag) = state.free.pop() {
                state.issued[tag as usize] = true;
                return Some(tag);
            }
            state = self
                .freed
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Return a tag to the pool.
    ///
    /// Returns `false`, and changes nothing, if the tag was not issued.
    pub fn release(&self, tag: u16) -> bool {
        let mut state = self.lock();
        match state.issued.get_mut(tag as usize) {
            Some(issued) if *issued => *issued = false,
            _ => {
                warn!(tag, "release of a tag that is not issued");
                return false;
            }
        }
        state.free.push(tag);
        drop(state);
        self.freed.notify_one();
        true
    }

    /// Close the pool, waking every waiter. Later acquires return `None`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.freed.notify_all();
    }

    /// Number of tags currently free.
    pub fn available(&self) -> usize {
        self.lock().free.len()
    }
}

#[cfg(test)]
impl TagPool {
    fn try_acquire(&self) -> Option<u16> {
        let mut state = self.lock();
        if state.closed {
            return None;
        }
        let tag = state.free.pop()?;
        state.issued[tag as usize] = true;
        Some(tag)
    }

    fn is_closed(&self) -> bool {
        self.lock().closed
    }

    fn capacity(&self) -> usize {
        let state = self.lock();
        state.free.len() + state.issued.iter().filter(|&&issued| issued).count()
    }
}
