use log::{debug, warn};
use serde::Serialize;

use crate::arena::{Arena, Cursor, Handle};
use crate::clock::Timestamp;
use crate::error::{RelayError, Result};
use crate::packet::Packet;
use crate::prefix::Prefix;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ContentFlags {
    /// Pinned: never evicted or aged out.
    pub is_static: bool,
    /// Past its freshness period. Still served unless the interest insists on fresh content.
    pub stale: bool,
}

pub struct ContentEntry {
    packet: Packet,
    pub flags: ContentFlags,
    served_count: u32,
    last_used: Timestamp,
}

impl ContentEntry {
    pub fn new(packet: Packet, now: Timestamp) -> Self {
        Self {
            packet,
            flags: ContentFlags::default(),
            served_count: 0,
            last_used: now,
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn prefix(&self) -> &Prefix {
        self.packet.prefix()
    }

    pub fn served_count(&self) -> u32 {
        self.served_count
    }

    pub fn last_used(&self) -> Timestamp {
        self.last_used
    }

    pub(crate) fn record_served(&mut self, times: u32) {
        self.served_count = self.served_count.saturating_add(times);
    }

    pub(crate) fn touch(&mut self, now: Timestamp) {
        self.last_used = self.last_used.max(now);
    }

    /// Swaps in a newer copy of the same content and clears the stale mark.
    pub(crate) fn refresh(&mut self, packet: Packet, now: Timestamp) {
        self.packet = packet;
        self.flags.stale = false;
        self.touch(now);
    }
}

/// Hooks into what the store keeps. Both have defaults: cache everything, evict the oldest.
pub trait CacheStrategy {
    /// Called when the store is full and `incoming` wants in. Returning true means the strategy
    /// dealt with it and the default eviction is skipped. The content is only stored if there
    /// is room afterwards.
    fn make_room(&mut self, _store: &mut ContentStore, _incoming: &Packet) -> bool {
        false
    }

    /// Whether `content` should be cached at all.
    fn admit(&mut self, _store: &ContentStore, _content: &Packet) -> bool {
        true
    }
}

/// Bounded content cache. A capacity of 0 means unbounded.
pub struct ContentStore {
    entries: Arena<ContentEntry>,
    max_entries: usize,
}

impl ContentStore {
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: Arena::new(),
            max_entries,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    fn is_full(&self) -> bool {
        self.max_entries != 0 && self.entries.len() >= self.max_entries
    }

    pub fn get(&self, handle: Handle) -> Option<&ContentEntry> {
        self.entries.get(handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut ContentEntry> {
        self.entries.get_mut(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &ContentEntry)> {
        self.entries.iter()
    }

    pub fn cursor(&self) -> Cursor {
        self.entries.cursor()
    }

    pub fn next(&self, cursor: &mut Cursor) -> Option<Handle> {
        cursor.next(&self.entries)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<ContentEntry> {
        self.entries.remove(handle)
    }

    pub fn compact(&mut self) {
        self.entries.compact()
    }

    pub fn find_exact(&self, prefix: &Prefix) -> Option<Handle> {
        self.entries
            .iter()
            .find(|(_, entry)| {
                entry.prefix().suite() == prefix.suite() && entry.prefix().is_exact_match(prefix)
            })
            .map(|(handle, _)| handle)
    }

    /// The least recently used entry that is not pinned. Ties go to the earliest stored.
    pub fn oldest_evictable(&self) -> Option<Handle> {
        let mut oldest: Option<(Handle, Timestamp)> = None;
        for (handle, entry) in self.entries.iter() {
            if entry.flags.is_static {
                continue;
            }
            if oldest.map_or(true, |(_, age)| entry.last_used < age) {
                oldest = Some((handle, entry.last_used));
            }
        }
        oldest.map(|(handle, _)| handle)
    }

    /// Stores `entry`. Content already present under the same name is refused. When full, the
    /// strategy gets a chance to make room, and otherwise the oldest unpinned entry is evicted.
    pub fn add(
        &mut self,
        entry: ContentEntry,
        strategy: Option<&mut Box<dyn CacheStrategy>>,
    ) -> Result<Handle> {
        if self.find_exact(entry.prefix()).is_some() {
            debug!("cs: {} already cached", entry.prefix());
            return Err(RelayError::AlreadyPresent("content"));
        }

        if self.is_full() {
            let handled = match strategy {
                Some(strategy) => strategy.make_room(self, &entry.packet),
                None => false,
            };
            if !handled {
                if let Some(oldest) = self.oldest_evictable() {
                    if let Some(evicted) = self.entries.remove(oldest) {
                        debug!("cs: evicting {}", evicted.prefix());
                    }
                }
            }
            self.entries.compact();
            if self.is_full() {
                warn!("cs: no room for {}", entry.prefix());
                return Err(RelayError::CapacityExceeded {
                    what: "content store",
                    limit: self.max_entries,
                });
            }
        }

        debug!("cs: caching {}", entry.prefix());
        Ok(self.entries.insert(entry))
    }

    /// First entry whose rendered path leads `path`.
    pub fn lookup_path(&self, path: &str) -> Option<Handle> {
        self.entries
            .iter()
            .find(|(_, entry)| {
                entry
                    .prefix()
                    .to_path()
                    .map_or(false, |rendered| path.as_bytes().starts_with(rendered.as_bytes()))
            })
            .map(|(handle, _)| handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefix::Suite;

    fn content(uri: &str) -> Packet {
        let prefix = Prefix::from_uri(Suite::Ccntlv, uri).unwrap();
        Packet::content(prefix, &b"payload"[..], uri.as_bytes().to_vec()).unwrap()
    }

    fn at(ms: u64) -> Timestamp {
        Timestamp::from_ms(ms)
    }

    #[test]
    fn test_duplicate_is_refused() {
        let mut store = ContentStore::new(0);
        store.add(ContentEntry::new(content("/x/y"), at(0)), None).unwrap();
        assert_eq!(
            store
                .add(ContentEntry::new(content("/x/y"), at(1)), None)
                .map(|_| ()),
            Err(RelayError::AlreadyPresent("content"))
        );
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_evicts_oldest() {
        let mut store = ContentStore::new(1);
        store.add(ContentEntry::new(content("/a"), at(0)), None).unwrap();
        store.add(ContentEntry::new(content("/b"), at(10)), None).unwrap();
        assert_eq!(store.len(), 1);
        let names: Vec<_> = store.iter().map(|(_, e)| e.prefix().to_string()).collect();
        assert_eq!(names, vec!["/b"]);
    }

    #[test]
    fn test_eviction_tie_goes_to_earliest() {
        let mut store = ContentStore::new(2);
        store.add(ContentEntry::new(content("/a"), at(5)), None).unwrap();
        store.add(ContentEntry::new(content("/b"), at(5)), None).unwrap();
        store.add(ContentEntry::new(content("/c"), at(6)), None).unwrap();
        let names: Vec<_> = store.iter().map(|(_, e)| e.prefix().to_string()).collect();
        assert_eq!(names, vec!["/b", "/c"]);
    }

    #[test]
    fn test_pinned_entries_are_kept() {
        let mut store = ContentStore::new(1);
        let pinned = store.add(ContentEntry::new(content("/a"), at(0)), None).unwrap();
        store.get_mut(pinned).unwrap().flags.is_static = true;
        assert_eq!(
            store
                .add(ContentEntry::new(content("/b"), at(1)), None)
                .map(|_| ()),
            Err(RelayError::CapacityExceeded {
                what: "content store",
                limit: 1
            })
        );
        assert_eq!(store.len(), 1);
    }

    struct KeepEverything;

    impl CacheStrategy for KeepEverything {
        fn make_room(&mut self, _store: &mut ContentStore, _incoming: &Packet) -> bool {
            true
        }
    }

    #[test]
    fn test_strategy_can_refuse_eviction() {
        let mut strategy: Box<dyn CacheStrategy> = Box::new(KeepEverything);
        let mut store = ContentStore::new(1);
        store.add(ContentEntry::new(content("/a"), at(0)), Some(&mut strategy)).unwrap();
        assert!(store
            .add(ContentEntry::new(content("/b"), at(1)), Some(&mut strategy))
            .is_err());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_lookup_path() {
        let mut store = ContentStore::new(0);
        store.add(ContentEntry::new(content("/a/b"), at(0)), None).unwrap();
        assert!(store.lookup_path("/a/b").is_some());
        assert!(store.lookup_path("/a/b/c").is_some());
        assert!(store.lookup_path("/a").is_none());
        assert!(store.lookup_path("/x").is_none());
    }

    #[test]
    fn test_lookup_path_with_escaped_name() {
        let component = [0x01u8; 1000];
        let prefix = Prefix::from_components(Suite::Ccntlv, [&component[..]]).unwrap();
        let packet = Packet::content(prefix, &b"payload"[..], b"C".to_vec()).unwrap();
        let mut store = ContentStore::new(0);
        store.add(ContentEntry::new(packet, at(0)), None).unwrap();

        let path = format!("/{}", "%01".repeat(1000));
        assert!(store.lookup_path(&path).is_some());
        assert!(store.lookup_path(&path[..path.len() - 3]).is_none());
    }
}
