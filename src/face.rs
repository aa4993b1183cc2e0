use core::fmt;
use std::collections::VecDeque;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::clock::Timestamp;
use crate::prefix::Suite;

/// Ethertype used for relay frames on a raw link.
pub const LINK_ETHERTYPE: u16 = 0x3456;

/// Identifies a face for the lifetime of the relay. Ids only grow and are never handed out twice.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize)]
pub struct FaceId(pub(crate) u32);

impl FaceId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for FaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "face#{}", self.0)
    }
}

/// A transport address: either an IP socket address or a link-layer address.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "family", rename_all = "lowercase")]
pub enum Address {
    Inet { addr: SocketAddr },
    Link { mac: [u8; 6], ethertype: u16 },
}

impl Address {
    pub fn inet(addr: SocketAddr) -> Self {
        Address::Inet { addr }
    }

    pub fn link(mac: [u8; 6]) -> Self {
        Address::Link {
            mac,
            ethertype: LINK_ETHERTYPE,
        }
    }

    /// IPv4, IPv6 and link addresses are three distinct families.
    pub fn same_family(&self, other: &Address) -> bool {
        match (self, other) {
            (Address::Inet { addr: a }, Address::Inet { addr: b }) => a.is_ipv4() == b.is_ipv4(),
            (Address::Link { .. }, Address::Link { .. }) => true,
            _ => false,
        }
    }

    /// The address that reaches every peer on the same medium as `self`.
    pub fn broadcast(&self, suite: Suite) -> Address {
        match self {
            Address::Inet { addr } if addr.is_ipv4() => Address::inet(SocketAddr::new(
                IpAddr::V4(Ipv4Addr::BROADCAST),
                suite.default_port(),
            )),
            Address::Inet { .. } => Address::inet(SocketAddr::new(
                IpAddr::V6(Ipv6Addr::UNSPECIFIED),
                suite.default_port(),
            )),
            Address::Link { .. } => Address::link([0xff; 6]),
        }
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Address::Inet { addr } => write!(f, "{}", addr),
            Address::Link { mac, ethertype } => write!(
                f,
                "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}/0x{:04x}",
                mac[0], mac[1], mac[2], mac[3], mac[4], mac[5], ethertype
            ),
        }
    }
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FaceFlags {
    /// Never aged out.
    pub is_static: bool,
    /// Interests may be forwarded back out of the face they came in on.
    pub reflect: bool,
    /// Repeated interests from this face are propagated again.
    pub forward_all: bool,
    /// Already got the content in the current serving pass.
    #[serde(skip)]
    pub(crate) served: bool,
}

/// Rate control for a face or an interface. Without one, packets move as soon as they are queued.
pub trait Scheduler {
    /// Asks to send `count` packets of `len` bytes in total. Returns whether it may go ahead now.
    fn request_to_send(&mut self, count: usize, len: usize) -> bool;

    /// Reports that `count` packets of `len` bytes have left.
    fn sent(&mut self, _count: usize, _len: usize) {}
}

/// A logical peer: an interface plus a remote address, or the local application when it has
/// neither.
pub struct Face {
    id: FaceId,
    interface: Option<usize>,
    peer: Option<Address>,
    pub flags: FaceFlags,
    last_used: Timestamp,
    out_queue: VecDeque<Bytes>,
    scheduler: Option<Box<dyn Scheduler>>,
}

impl Face {
    pub(crate) fn new(
        id: FaceId,
        interface: Option<usize>,
        peer: Option<Address>,
        flags: FaceFlags,
        now: Timestamp,
    ) -> Self {
        Self {
            id,
            interface,
            peer,
            flags,
            last_used: now,
            out_queue: VecDeque::new(),
            scheduler: None,
        }
    }

    pub fn id(&self) -> FaceId {
        self.id
    }

    pub fn interface(&self) -> Option<usize> {
        self.interface
    }

    pub fn peer(&self) -> Option<&Address> {
        self.peer.as_ref()
    }

    /// The face of the local application. Its queue is drained by the application itself.
    pub fn is_local(&self) -> bool {
        self.interface.is_none()
    }

    pub fn last_used(&self) -> Timestamp {
        self.last_used
    }

    pub fn touch(&mut self, now: Timestamp) {
        self.last_used = self.last_used.max(now);
    }

    pub fn queue_len(&self) -> usize {
        self.out_queue.len()
    }

    pub fn set_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        self.scheduler = Some(scheduler);
    }

    /// Queues `packet` unless the very same bytes are already waiting. Returns whether it was
    /// queued.
    pub fn enqueue(&mut self, packet: Bytes) -> bool {
        if self.out_queue.iter().any(|queued| *queued == packet) {
            return false;
        }
        self.out_queue.push_back(packet);
        true
    }

    pub fn dequeue(&mut self) -> Option<Bytes> {
        self.out_queue.pop_front()
    }

    pub(crate) fn request_to_send(&mut self, len: usize) -> bool {
        match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.request_to_send(1, len),
            None => true,
        }
    }

    pub(crate) fn sent(&mut self, len: usize) {
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.sent(1, len);
        }
    }

    pub fn is_expired(&self, timeout_ms: u64, now: Timestamp) -> bool {
        !self.flags.is_static && self.last_used.has_elapsed(timeout_ms, now)
    }
}

/// Registry of faces, kept sorted by id.
pub(crate) struct Faces {
    faces: Vec<Face>,
    latest_face_id: u32,
}

impl Faces {
    pub fn new() -> Self {
        Self {
            faces: Vec::new(),
            latest_face_id: 0,
        }
    }

    pub fn next_id(&mut self) -> Option<FaceId> {
        self.latest_face_id = self.latest_face_id.checked_add(1)?;
        Some(FaceId(self.latest_face_id))
    }

    pub fn insert(&mut self, face: Face) {
        // Ids are handed out in increasing order, so pushing keeps the vector sorted.
        debug_assert!(self.faces.last().map_or(true, |last| last.id < face.id));
        self.faces.push(face);
    }

    pub fn remove(&mut self, id: FaceId) -> Option<Face> {
        let index = self.find(id)?;
        Some(self.faces.remove(index))
    }

    fn find(&self, id: FaceId) -> Option<usize> {
        self.faces.binary_search_by_key(&id, |face| face.id).ok()
    }

    pub fn get(&self, id: FaceId) -> Option<&Face> {
        self.find(id).map(|index| &self.faces[index])
    }

    pub fn get_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        let index = self.find(id)?;
        self.faces.get_mut(index)
    }

    pub fn find_by_peer(&self, interface: Option<usize>, peer: Option<&Address>) -> Option<FaceId> {
        self.faces
            .iter()
            .find(|face| face.interface == interface && face.peer.as_ref() == peer)
            .map(|face| face.id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Face> {
        self.faces.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Face> {
        self.faces.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.faces.len()
    }
}
