use bytes::Bytes;
use log::debug;

use crate::error::{RelayError, Result};
use crate::face::FaceId;
use crate::prefix::{MatchMode, Prefix};

/// Observer invoked with (arrival face, name, wire bytes) for every interest routed through the
/// entry it is attached to.
pub type Tap = Box<dyn FnMut(Option<FaceId>, &Prefix, &Bytes)>;

pub struct FibEntry {
    prefix: Prefix,
    face: Option<FaceId>,
    tap: Option<Tap>,
}

impl FibEntry {
    pub fn prefix(&self) -> &Prefix {
        &self.prefix
    }

    pub fn face(&self) -> Option<FaceId> {
        self.face
    }

    pub fn has_tap(&self) -> bool {
        self.tap.is_some()
    }

    /// True if every component of the entry's prefix leads `name` and the suites agree.
    pub fn matches(&self, name: &Prefix) -> bool {
        self.prefix.suite() == name.suite()
            && self.prefix.compare(None, name, MatchMode::Longest) as usize
                == self.prefix.component_count()
    }

    pub(crate) fn notify_tap(&mut self, from: Option<FaceId>, name: &Prefix, wire: &Bytes) {
        if let Some(tap) = self.tap.as_mut() {
            tap(from, name, wire);
        }
    }
}

/// Forwarding table, kept in insertion order. Every matching entry is a next hop.
#[derive(Default)]
pub struct Fib {
    entries: Vec<FibEntry>,
}

impl Fib {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> impl Iterator<Item = &FibEntry> {
        self.entries.iter()
    }

    fn find_exact(&mut self, prefix: &Prefix) -> Option<&mut FibEntry> {
        self.entries
            .iter_mut()
            .find(|e| e.prefix.suite() == prefix.suite() && e.prefix.is_exact_match(prefix))
    }

    /// Routes `prefix` to `face`. An entry for the same prefix and suite is redirected instead of
    /// duplicated; returns true in that case.
    pub fn add_entry(&mut self, prefix: Prefix, face: FaceId) -> bool {
        if let Some(entry) = self.find_exact(&prefix) {
            debug!("fib: {} now routed to {}", prefix, face);
            entry.face = Some(face);
            return true;
        }
        debug!("fib: adding {} via {}", prefix, face);
        self.entries.push(FibEntry {
            prefix,
            face: Some(face),
            tap: None,
        });
        false
    }

    /// Attaches an observer to `prefix`, creating a face-less entry if none exists.
    pub fn add_tap(&mut self, prefix: Prefix, tap: Tap) {
        if let Some(entry) = self.find_exact(&prefix) {
            entry.tap = Some(tap);
            return;
        }
        self.entries.push(FibEntry {
            prefix,
            face: None,
            tap: Some(tap),
        });
    }

    /// Removes the first entry that matches every filter given. A missing filter matches all.
    pub fn remove_entry(&mut self, prefix: Option<&Prefix>, face: Option<FaceId>) -> Result<()> {
        let position = self.entries.iter().position(|e| {
            prefix.map_or(true, |p| e.prefix.suite() == p.suite() && e.prefix.is_exact_match(p))
                && face.map_or(true, |f| e.face == Some(f))
        });
        match position {
            Some(index) => {
                let removed = self.entries.remove(index);
                debug!("fib: removed {}", removed.prefix);
                Ok(())
            }
            None => Err(RelayError::NotFound("fib entry")),
        }
    }

    /// Removes every entry routed to `face`, returning how many went.
    pub fn remove_face(&mut self, face: FaceId) -> usize {
        let before = self.entries.len();
        self.entries.retain(|e| e.face != Some(face));
        before - self.entries.len()
    }

    pub(crate) fn matching_mut<'a>(
        &'a mut self,
        name: &'a Prefix,
    ) -> impl Iterator<Item = &'a mut FibEntry> + 'a {
        self.entries.iter_mut().filter(move |e| e.matches(name))
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::prefix::Suite;

    fn ndn(uri: &str) -> Prefix {
        Prefix::from_uri(Suite::Ndntlv, uri).unwrap()
    }

    #[test]
    fn test_longest_prefix_entries_match() {
        let mut fib = Fib::new();
        fib.add_entry(ndn("/a/b"), FaceId(1));
        fib.add_entry(ndn("/a"), FaceId(2));
        fib.add_entry(Prefix::from_uri(Suite::Ccntlv, "/a").unwrap(), FaceId(3));

        let name = ndn("/a/b/c");
        let hops: Vec<_> = fib.matching_mut(&name).map(|e| e.face()).collect();
        assert_eq!(hops, vec![Some(FaceId(1)), Some(FaceId(2))]);

        let name = ndn("/a/x");
        let hops: Vec<_> = fib.matching_mut(&name).map(|e| e.face()).collect();
        assert_eq!(hops, vec![Some(FaceId(2))]);
    }

    #[test]
    fn test_empty_prefix_is_default_route() {
        let mut fib = Fib::new();
        fib.add_entry(Prefix::new(Suite::Ndntlv), FaceId(9));
        let name = ndn("/anything");
        assert_eq!(fib.matching_mut(&name).count(), 1);
    }

    #[test]
    fn test_add_replaces_same_prefix() {
        let mut fib = Fib::new();
        assert!(!fib.add_entry(ndn("/a"), FaceId(1)));
        assert!(fib.add_entry(ndn("/a"), FaceId(2)));
        assert_eq!(fib.len(), 1);
        assert_eq!(fib.entries().next().and_then(FibEntry::face), Some(FaceId(2)));
    }

    #[test]
    fn test_remove_entry_filters() {
        let mut fib = Fib::new();
        fib.add_entry(ndn("/a"), FaceId(1));
        fib.add_entry(ndn("/b"), FaceId(1));
        fib.add_entry(ndn("/c"), FaceId(2));

        assert_eq!(
            fib.remove_entry(Some(&ndn("/a")), Some(FaceId(2))),
            Err(RelayError::NotFound("fib entry"))
        );
        assert_eq!(fib.remove_entry(None, Some(FaceId(2))), Ok(()));
        assert_eq!(fib.remove_entry(Some(&ndn("/b")), None), Ok(()));
        assert_eq!(fib.len(), 1);
        assert_eq!(fib.remove_face(FaceId(1)), 1);
        assert!(fib.is_empty());
    }

    #[test]
    fn test_tap_sees_routed_interests() {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        let mut fib = Fib::new();
        fib.add_tap(
            ndn("/t"),
            Box::new(move |from: Option<FaceId>, name: &Prefix, _wire: &Bytes| {
                sink.borrow_mut().push((from, name.to_string()))
            }),
        );
        let name = ndn("/t/1");
        for entry in fib.matching_mut(&name) {
            entry.notify_tap(Some(FaceId(4)), &name, &Bytes::new());
        }
        assert_eq!(*seen.borrow(), vec![(Some(FaceId(4)), "/t/1".to_string())]);
    }
}
