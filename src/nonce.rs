use std::collections::VecDeque;

use bytes::Bytes;

/// Bounded history of recently seen interest nonces, most recent first.
pub struct NonceHistory {
    seen: VecDeque<Bytes>,
    capacity: usize,
}

impl NonceHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            seen: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Returns true if `nonce` was already recorded. Otherwise records it, forgetting the oldest
    /// nonce when the history is full.
    pub fn find_or_append(&mut self, nonce: &Bytes) -> bool {
        if self.seen.iter().any(|seen| seen == nonce) {
            return true;
        }
        if self.capacity == 0 {
            return false;
        }
        if self.seen.len() >= self.capacity {
            self.seen.pop_back();
        }
        self.seen.push_front(nonce.clone());
        false
    }
}
