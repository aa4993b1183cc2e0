use bytes::Bytes;

use crate::arena::{Arena, Cursor, Handle};
use crate::clock::Timestamp;
use crate::face::FaceId;
use crate::packet::Packet;

/// A face that asked for an entry's content, and when it last asked.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Waiter {
    pub face: FaceId,
    pub last_used: Timestamp,
}

/// Who is interested in an entry besides its waiters.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Origin {
    Network,
    /// The relay's own application asked for it and gets the content by upcall.
    Local,
}

pub struct PitEntry {
    packet: Packet,
    /// Arrival face, cleared once that face is gone.
    from: Option<FaceId>,
    origin: Origin,
    pending: Vec<Waiter>,
    pub(crate) retries: u32,
    lifetime_ms: u64,
    last_used: Timestamp,
}

impl PitEntry {
    pub fn from_face(packet: Packet, face: FaceId, lifetime_ms: u64, now: Timestamp) -> Self {
        Self {
            packet,
            from: Some(face),
            origin: Origin::Network,
            pending: vec![Waiter {
                face,
                last_used: now,
            }],
            retries: 0,
            lifetime_ms,
            last_used: now,
        }
    }

    pub fn local(packet: Packet, lifetime_ms: u64, now: Timestamp) -> Self {
        Self {
            packet,
            from: None,
            origin: Origin::Local,
            pending: Vec::new(),
            retries: 0,
            lifetime_ms,
            last_used: now,
        }
    }

    pub fn packet(&self) -> &Packet {
        &self.packet
    }

    pub fn origin(&self) -> Origin {
        self.origin
    }

    pub fn from(&self) -> Option<FaceId> {
        self.from
    }

    pub fn is_local(&self) -> bool {
        self.origin == Origin::Local
    }

    pub(crate) fn mark_local(&mut self) {
        self.origin = Origin::Local;
    }

    pub fn pending(&self) -> &[Waiter] {
        &self.pending
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    pub fn lifetime_ms(&self) -> u64 {
        self.lifetime_ms
    }

    pub fn last_used(&self) -> Timestamp {
        self.last_used
    }

    pub fn nonce(&self) -> Option<&Bytes> {
        self.packet.nonce()
    }

    /// Records another request from `face`. A face is listed once; asking again only refreshes it.
    pub fn append_waiter(&mut self, face: FaceId, now: Timestamp) {
        match self.pending.iter_mut().find(|w| w.face == face) {
            Some(waiter) => waiter.last_used = now,
            None => self.pending.push(Waiter {
                face,
                last_used: now,
            }),
        }
    }

    /// Forgets `face` as origin and waiter. Returns whether the entry should go: nobody is left
    /// waiting and the application did not ask for it.
    pub fn forget_face(&mut self, face: FaceId) -> bool {
        if self.from == Some(face) {
            self.from = None;
        }
        self.pending.retain(|w| w.face != face);
        self.pending.is_empty() && !self.is_local()
    }

    pub fn is_expired(&self, max_retransmit: u32, now: Timestamp) -> bool {
        self.last_used.has_elapsed(self.lifetime_ms, now) || self.retries >= max_retransmit
    }
}

/// Pending interest table.
#[derive(Default)]
pub struct Pit {
    entries: Arena<PitEntry>,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn insert(&mut self, entry: PitEntry) -> Handle {
        self.entries.insert(entry)
    }

    pub fn get(&self, handle: Handle) -> Option<&PitEntry> {
        self.entries.get(handle)
    }

    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut PitEntry> {
        self.entries.get_mut(handle)
    }

    pub fn remove(&mut self, handle: Handle) -> Option<PitEntry> {
        self.entries.remove(handle)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle, &PitEntry)> {
        self.entries.iter()
    }

    pub fn cursor(&self) -> Cursor {
        self.entries.cursor()
    }

    pub fn next(&self, cursor: &mut Cursor) -> Option<Handle> {
        cursor.next(&self.entries)
    }

    pub fn compact(&mut self) {
        self.entries.compact()
    }

    /// The entry already recording the same request as `interest`.
    pub fn find_same(&self, interest: &Packet) -> Option<Handle> {
        self.entries
            .iter()
            .find(|(_, entry)| entry.packet.is_same_interest(interest))
            .map(|(handle, _)| handle)
    }

    pub fn has_nonce(&self, nonce: &[u8]) -> bool {
        self.entries
            .iter()
            .any(|(_, entry)| entry.nonce().map_or(false, |n| n.as_ref() == nonce))
    }

    /// Drops `face` from every entry and removes entries nobody waits for anymore.
    pub fn remove_face(&mut self, face: FaceId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|entry| !entry.forget_face(face));
        before - self.entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packet::SuiteFields;
    use crate::prefix::{Prefix, Suite};

    fn interest(uri: &str, nonce: &'static [u8]) -> Packet {
        Packet::interest(Prefix::from_uri(Suite::Ndntlv, uri).unwrap(), nonce)
            .unwrap()
            .with_fields(SuiteFields::Ndntlv {
                min_suffix: 0,
                max_suffix: 1,
                nonce: Some(Bytes::from_static(nonce)),
                must_be_fresh: false,
                lifetime_ms: None,
                freshness_period_ms: 0,
            })
            .unwrap()
    }

    #[test]
    fn test_waiters_are_deduplicated() {
        let t0 = Timestamp::from_ms(0);
        let mut entry = PitEntry::from_face(interest("/a", b"n1"), FaceId(1), 1000, t0);
        entry.append_waiter(FaceId(2), t0);
        entry.append_waiter(FaceId(1), Timestamp::from_ms(5));
        assert_eq!(entry.pending().len(), 2);
        assert_eq!(entry.pending()[0].last_used, Timestamp::from_ms(5));
    }

    #[test]
    fn test_find_same_and_nonces() {
        let mut pit = Pit::new();
        let h = pit.insert(PitEntry::from_face(
            interest("/a", b"n1"),
            FaceId(1),
            1000,
            Timestamp::default(),
        ));
        assert_eq!(pit.find_same(&interest("/a", b"n2")), Some(h));
        assert_eq!(pit.find_same(&interest("/b", b"n1")), None);
        assert!(pit.has_nonce(b"n1"));
        assert!(!pit.has_nonce(b"n2"));
    }

    #[test]
    fn test_remove_face_keeps_local_and_shared_entries() {
        let t0 = Timestamp::default();
        let mut pit = Pit::new();
        pit.insert(PitEntry::from_face(interest("/a", b"1"), FaceId(1), 1000, t0));
        let shared = pit.insert(PitEntry::from_face(interest("/b", b"2"), FaceId(1), 1000, t0));
        pit.get_mut(shared).unwrap().append_waiter(FaceId(2), t0);
        pit.insert(PitEntry::local(interest("/c", b"3"), 1000, t0));

        assert_eq!(pit.remove_face(FaceId(1)), 1);
        assert_eq!(pit.len(), 2);
        let survivor = pit
            .iter()
            .find(|(_, e)| e.packet().prefix().to_string() == "/b")
            .map(|(_, e)| (e.from(), e.pending().to_vec()))
            .unwrap();
        assert_eq!(survivor.0, None);
        assert_eq!(survivor.1.len(), 1);
        assert_eq!(survivor.1[0].face, FaceId(2));
    }

    #[test]
    fn test_expiry() {
        let mut entry =
            PitEntry::from_face(interest("/a", b"1"), FaceId(1), 100, Timestamp::from_ms(0));
        assert!(!entry.is_expired(7, Timestamp::from_ms(99)));
        assert!(entry.is_expired(7, Timestamp::from_ms(100)));
        entry.retries = 7;
        assert!(entry.is_expired(7, Timestamp::from_ms(0)));
    }
}
