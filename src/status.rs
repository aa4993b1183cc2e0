//! Point-in-time view of the relay tables, for management and debugging.

use serde::Serialize;

use crate::clock::Timestamp;
use crate::face::{Address, Face, FaceFlags, FaceId};
use crate::fib::FibEntry;
use crate::interface::Interface;
use crate::pit::PitEntry;
use crate::prefix::Suite;
use crate::store::{ContentEntry, ContentFlags};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RelayCounters {
    pub interests_received: u64,
    pub contents_received: u64,
    pub interests_forwarded: u64,
    pub contents_forwarded: u64,
    pub cache_hits: u64,
    pub duplicates_dropped: u64,
    pub unsolicited_dropped: u64,
    pub interest_timeouts: u64,
    pub queue_drops: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FaceStatus {
    pub id: FaceId,
    pub interface: Option<usize>,
    pub peer: Option<Address>,
    pub flags: FaceFlags,
    pub last_used: Timestamp,
    pub queued: usize,
}

impl From<&Face> for FaceStatus {
    fn from(face: &Face) -> Self {
        Self {
            id: face.id(),
            interface: face.interface(),
            peer: face.peer().cloned(),
            flags: face.flags,
            last_used: face.last_used(),
            queued: face.queue_len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FibRow {
    pub prefix: String,
    pub suite: Suite,
    pub face: Option<FaceId>,
    pub tap: bool,
}

impl From<&FibEntry> for FibRow {
    fn from(entry: &FibEntry) -> Self {
        Self {
            prefix: entry.prefix().to_string(),
            suite: entry.prefix().suite(),
            face: entry.face(),
            tap: entry.has_tap(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PitRow {
    pub name: String,
    pub suite: Suite,
    pub from: Option<FaceId>,
    pub local: bool,
    pub waiters: usize,
    pub retries: u32,
    pub last_used: Timestamp,
}

impl From<&PitEntry> for PitRow {
    fn from(entry: &PitEntry) -> Self {
        Self {
            name: entry.packet().prefix().to_string(),
            suite: entry.packet().suite(),
            from: entry.from(),
            local: entry.is_local(),
            waiters: entry.pending().len(),
            retries: entry.retries(),
            last_used: entry.last_used(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContentRow {
    pub name: String,
    pub suite: Suite,
    pub chunk: Option<u32>,
    pub served: u32,
    pub flags: ContentFlags,
    pub last_used: Timestamp,
    pub size: usize,
}

impl From<&ContentEntry> for ContentRow {
    fn from(entry: &ContentEntry) -> Self {
        Self {
            name: entry.prefix().to_string(),
            suite: entry.prefix().suite(),
            chunk: entry.prefix().chunk_number(),
            served: entry.served_count(),
            flags: entry.flags,
            last_used: entry.last_used(),
            size: entry.packet().wire().len(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InterfaceStatus {
    pub index: usize,
    pub address: Address,
    pub queued: usize,
    pub transmitted: u64,
    pub dropped: u64,
}

impl InterfaceStatus {
    pub fn new(index: usize, interface: &Interface) -> Self {
        Self {
            index,
            address: interface.address().clone(),
            queued: interface.queue_len(),
            transmitted: interface.tx_count(),
            dropped: interface.dropped(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RelayStatus {
    pub now: Timestamp,
    pub faces: Vec<FaceStatus>,
    pub interfaces: Vec<InterfaceStatus>,
    /// Sorted by prefix.
    pub fib: Vec<FibRow>,
    pub pit: Vec<PitRow>,
    pub contents: Vec<ContentRow>,
    pub max_cache_entries: usize,
    pub counters: RelayCounters,
}
