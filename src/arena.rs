//! Slot storage with tombstones, used by the PIT and the content store.
//!
//! Entries are appended at the end and removal only marks a slot unused, so a pass over the
//! table can delete the entry it is looking at (or any other) without disturbing the walk.
//! Unused slots are reclaimed by `compact` once the pass is over. Handles carry the generation
//! they were issued in, and a handle from before a compaction no longer resolves.

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Handle {
    index: u32,
    generation: u32,
}

pub struct Arena<T> {
    slots: Vec<Option<T>>,
    generation: u32,
    live: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            generation: 0,
            live: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    pub fn insert(&mut self, value: T) -> Handle {
        let handle = Handle {
            index: self.slots.len() as u32,
            generation: self.generation,
        };
        self.slots.push(Some(value));
        self.live += 1;
        handle
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.get(handle.index as usize)?.as_ref()
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        if handle.generation != self.generation {
            return None;
        }
        self.slots.get_mut(handle.index as usize)?.as_mut()
    }

    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        if handle.generation != self.generation {
            return None;
        }
        let value = self.slots.get_mut(handle.index as usize)?.take()?;
        self.live -= 1;
        Some(value)
    }

    /// Drops the tombstones left by removals. Invalidates every outstanding handle.
    pub fn compact(&mut self) {
        if self.live == self.slots.len() {
            return;
        }
        self.slots.retain(Option::is_some);
        self.generation = self.generation.wrapping_add(1);
    }

    /// Starts a walk over the entries present right now. Entries inserted during the walk are
    /// not visited.
    pub fn cursor(&self) -> Cursor {
        Cursor {
            next: 0,
            end: self.slots.len(),
            generation: self.generation,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &T)> {
        let generation = self.generation;
        self.slots.iter().enumerate().filter_map(move |(i, slot)| {
            slot.as_ref().map(|value| {
                (
                    Handle {
                        index: i as u32,
                        generation,
                    },
                    value,
                )
            })
        })
    }

    pub fn retain<F: FnMut(&mut T) -> bool>(&mut self, mut keep: F) {
        for slot in self.slots.iter_mut() {
            if let Some(value) = slot {
                if !keep(value) {
                    *slot = None;
                    self.live -= 1;
                }
            }
        }
        self.compact();
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A detached position in an arena walk. It does not borrow the arena, so the caller can mutate
/// the arena between steps.
#[derive(Clone, Debug)]
pub struct Cursor {
    next: usize,
    end: usize,
    generation: u32,
}

impl Cursor {
    pub fn next<T>(&mut self, arena: &Arena<T>) -> Option<Handle> {
        if arena.generation != self.generation {
            return None;
        }
        while self.next < self.end {
            let index = self.next;
            self.next += 1;
            if matches!(arena.slots.get(index), Some(Some(_))) {
                return Some(Handle {
                    index: index as u32,
                    generation: self.generation,
                });
            }
        }
        None
    }
}
