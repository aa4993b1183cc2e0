use bytes::Bytes;
use log::{debug, info, trace, warn};

use crate::arena::Handle;
use crate::clock::{Clock, Timestamp};
use crate::config::{InterfaceConfig, NonceCheck, RelayConfig};
use crate::error::{RelayError, Result};
use crate::face::{Address, Face, FaceFlags, FaceId, Faces, Scheduler};
use crate::fib::{Fib, Tap};
use crate::hash::{digest_of, Hasher, Sha256Digest, DIGEST_LEN};
use crate::interface::{Interface, LinkLayer, TxRequest};
use crate::nonce::NonceHistory;
use crate::packet::{Codec, Packet, PacketKind, MAX_PACKET_SIZE};
use crate::pit::{Pit, PitEntry};
use crate::prefix::{Prefix, Suite};
use crate::status::{
    ContentRow, FaceStatus, FibRow, InterfaceStatus, PitRow, RelayCounters, RelayStatus,
};
use crate::store::{CacheStrategy, ContentEntry, ContentStore};

/// Hands content to the local application. The face is `None` for content the relay itself
/// asked for through `express_interest`.
pub type Delivery = Box<dyn FnMut(Option<FaceId>, &Packet)>;

/// Builds the scheduler for a newly created face, if it should have one.
pub type SchedulerFactory = Box<dyn FnMut(FaceId) -> Option<Box<dyn Scheduler>>>;

#[derive(Default)]
struct Served {
    count: u32,
    local: bool,
}

pub struct Relay<C, H> {
    config: RelayConfig,
    clock: C,
    hasher: H,
    faces: Faces,
    interfaces: Vec<Interface>,
    fib: Fib,
    pit: Pit,
    content_store: ContentStore,
    nonces: NonceHistory,
    cache_strategy: Option<Box<dyn CacheStrategy>>,
    scheduler_factory: Option<SchedulerFactory>,
    delivery: Option<Delivery>,
    counters: RelayCounters,
    face_scratch: Vec<FaceId>,
}

#[cfg(feature = "sha2")]
pub type DefaultRelay = Relay<crate::clock::MonotonicClock, crate::hash::sha::Sha256Hasher>;

#[cfg(feature = "sha2")]
impl DefaultRelay {
    pub fn with_config(config: RelayConfig) -> Result<Self> {
        Relay::new(
            config,
            crate::clock::MonotonicClock::new(),
            crate::hash::sha::Sha256Hasher::new(),
        )
    }
}

impl<C, H> Relay<C, H>
where
    C: Clock,
    H: Hasher<Digest = Sha256Digest>,
{
    pub fn new(config: RelayConfig, clock: C, hasher: H) -> Result<Self> {
        if config.interfaces.len() > config.max_interfaces {
            return Err(RelayError::CapacityExceeded {
                what: "interfaces",
                limit: config.max_interfaces,
            });
        }
        let interfaces = config.interfaces.iter().map(Interface::from_config).collect();
        let nonce_capacity = match config.nonce_check {
            NonceCheck::History { capacity } => capacity,
            NonceCheck::PendingTable => 0,
        };
        Ok(Self {
            content_store: ContentStore::new(config.max_cache_entries),
            nonces: NonceHistory::new(nonce_capacity),
            config,
            clock,
            hasher,
            faces: Faces::new(),
            interfaces,
            fib: Fib::new(),
            pit: Pit::new(),
            cache_strategy: None,
            scheduler_factory: None,
            delivery: None,
            counters: RelayCounters::default(),
            face_scratch: Vec::new(),
        })
    }

    pub fn config(&self) -> &RelayConfig {
        &self.config
    }

    pub fn now(&mut self) -> Timestamp {
        self.clock.now()
    }

    pub fn set_cache_strategy(&mut self, strategy: Box<dyn CacheStrategy>) {
        self.cache_strategy = Some(strategy);
    }

    pub fn set_delivery(&mut self, delivery: Delivery) {
        self.delivery = Some(delivery);
    }

    pub fn set_scheduler_factory(&mut self, factory: SchedulerFactory) {
        self.scheduler_factory = Some(factory);
    }

    pub fn counters(&self) -> &RelayCounters {
        &self.counters
    }

    // Interfaces

    pub fn add_interface(&mut self, config: &InterfaceConfig) -> Result<usize> {
        if self.interfaces.len() >= self.config.max_interfaces {
            return Err(RelayError::CapacityExceeded {
                what: "interfaces",
                limit: self.config.max_interfaces,
            });
        }
        self.interfaces.push(Interface::from_config(config));
        info!("interface {} up at {}", self.interfaces.len() - 1, config.address);
        Ok(self.interfaces.len() - 1)
    }

    pub fn interface(&self, index: usize) -> Option<&Interface> {
        self.interfaces.get(index)
    }

    pub fn interfaces(&self) -> &[Interface] {
        &self.interfaces
    }

    pub fn set_interface_scheduler(
        &mut self,
        index: usize,
        scheduler: Box<dyn Scheduler>,
    ) -> Result<()> {
        self.interfaces
            .get_mut(index)
            .ok_or(RelayError::NotFound("interface"))?
            .set_scheduler(scheduler);
        Ok(())
    }

    /// Queues `packet` for `destination` on an interface. A full queue drops the packet.
    pub fn interface_enqueue(
        &mut self,
        index: usize,
        face: Option<FaceId>,
        packet: Bytes,
        destination: Address,
    ) -> bool {
        let Some(interface) = self.interfaces.get_mut(index) else {
            warn!("no interface {} to send {} bytes on", index, packet.len());
            return false;
        };
        let queued = interface.enqueue(TxRequest {
            packet,
            destination,
            face,
        });
        if !queued {
            self.counters.queue_drops += 1;
        }
        queued
    }

    /// Sends the front packet of interface `index` through `link`. Returns false if nothing was
    /// queued.
    pub fn interface_clear_to_send<L>(&mut self, index: usize, link: &mut L) -> bool
    where
        L: LinkLayer + ?Sized,
    {
        let Some(interface) = self.interfaces.get_mut(index) else {
            return false;
        };
        let Some(request) = interface.clear_to_send(index, link) else {
            return false;
        };
        if let Some(face) = request.face.and_then(|id| self.faces.get_mut(id)) {
            face.sent(request.packet.len());
        }
        true
    }

    /// Drains every interface as far as its scheduler allows. Returns the packets sent.
    pub fn transmit_all<L>(&mut self, link: &mut L) -> usize
    where
        L: LinkLayer + ?Sized,
    {
        let mut sent = 0;
        for index in 0..self.interfaces.len() {
            while self.interfaces[index].ready() && self.interface_clear_to_send(index, link) {
                sent += 1;
            }
        }
        sent
    }

    // Faces

    pub fn face(&self, id: FaceId) -> Option<&Face> {
        self.faces.get(id)
    }

    pub fn face_mut(&mut self, id: FaceId) -> Option<&mut Face> {
        self.faces.get_mut(id)
    }

    pub fn faces(&self) -> impl Iterator<Item = &Face> {
        self.faces.iter()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    /// Finds the face for `peer` on `interface`, creating it on first contact. Without a peer
    /// this is the local application's face. Without an interface, the first interface of the
    /// peer's address family is used.
    pub fn get_face_or_create(
        &mut self,
        interface: Option<usize>,
        peer: Option<&Address>,
    ) -> Result<FaceId> {
        let now = self.clock.now();
        let interface = match (interface, peer) {
            (_, None) => None,
            (Some(index), Some(_)) if index < self.interfaces.len() => Some(index),
            (Some(_), Some(_)) => return Err(RelayError::NotFound("interface")),
            (None, Some(peer)) => Some(
                self.interfaces
                    .iter()
                    .position(|i| i.address().same_family(peer))
                    .ok_or(RelayError::NotFound("interface"))?,
            ),
        };

        if let Some(id) = self.faces.find_by_peer(interface, peer) {
            if let Some(face) = self.faces.get_mut(id) {
                face.touch(now);
            }
            return Ok(id);
        }

        let id = self.faces.next_id().ok_or(RelayError::CapacityExceeded {
            what: "face ids",
            limit: u32::MAX as usize,
        })?;
        let mut flags = FaceFlags::default();
        if let Some(iface) = interface.and_then(|index| self.interfaces.get(index)) {
            flags.reflect = iface.reflect;
            flags.forward_all = iface.forward_all;
        }
        let mut face = Face::new(id, interface, peer.cloned(), flags, now);
        if let Some(scheduler) = self.scheduler_factory.as_mut().and_then(|make| make(id)) {
            face.set_scheduler(scheduler);
        }
        self.faces.insert(face);

        match peer {
            Some(peer) => debug!("{} created for {} on interface {:?}", id, peer, interface),
            None => debug!("{} created for the local application", id),
        }
        Ok(id)
    }

    /// Removes a face with everything that refers to it: its routes, its place in pending
    /// interests and its queued packets.
    pub fn face_remove(&mut self, id: FaceId) -> Result<()> {
        let face = self.faces.remove(id).ok_or(RelayError::NotFound("face"))?;
        let dropped_interests = self.pit.remove_face(id);
        let dropped_routes = self.fib.remove_face(id);
        debug!(
            "{} removed: {} pending interests, {} routes and {} queued packets dropped",
            id,
            dropped_interests,
            dropped_routes,
            face.queue_len()
        );
        Ok(())
    }

    /// Queues `packet` on a face and, if its scheduler agrees, moves it on to the interface.
    /// Returns false if the same bytes were already queued there.
    pub fn face_enqueue(&mut self, id: FaceId, packet: Bytes) -> Result<bool> {
        let face = self.faces.get_mut(id).ok_or(RelayError::NotFound("face"))?;
        let len = packet.len();
        if !face.enqueue(packet) {
            debug!("{}: identical packet already queued", id);
            return Ok(false);
        }
        if face.request_to_send(len) {
            self.face_clear_to_send(id);
        }
        Ok(true)
    }

    /// Takes the next queued packet off a face. This is how the local application reads what
    /// the relay sends it.
    pub fn face_dequeue(&mut self, id: FaceId) -> Option<Bytes> {
        self.faces.get_mut(id)?.dequeue()
    }

    /// Moves one packet from the face queue to its interface, addressed to the face's peer.
    /// The local face keeps its packets until the application dequeues them.
    pub fn face_clear_to_send(&mut self, id: FaceId) -> bool {
        let Some(face) = self.faces.get_mut(id) else {
            return false;
        };
        let (Some(interface), Some(destination)) = (face.interface(), face.peer().cloned()) else {
            return false;
        };
        let Some(packet) = face.dequeue() else {
            return false;
        };
        self.interface_enqueue(interface, Some(id), packet, destination)
    }

    // FIB

    pub fn fib(&self) -> &Fib {
        &self.fib
    }

    pub fn fib_add_entry(&mut self, prefix: Prefix, face: FaceId) -> Result<()> {
        if self.faces.get(face).is_none() {
            return Err(RelayError::NotFound("face"));
        }
        self.fib.add_entry(prefix, face);
        Ok(())
    }

    pub fn fib_add_tap(&mut self, prefix: Prefix, tap: Tap) {
        self.fib.add_tap(prefix, tap);
    }

    pub fn fib_remove_entry(&mut self, prefix: Option<&Prefix>, face: Option<FaceId>) -> Result<()> {
        self.fib.remove_entry(prefix, face)
    }

    // Packet arrival

    /// Decodes bytes received from `peer` on `interface` and dispatches the packet.
    pub fn receive<D>(
        &mut self,
        codec: &mut D,
        interface: usize,
        peer: &Address,
        bytes: &[u8],
    ) -> Result<()>
    where
        D: Codec + ?Sized,
    {
        if bytes.len() > MAX_PACKET_SIZE {
            warn!("dropping {} byte packet from {}", bytes.len(), peer);
            return Err(RelayError::CapacityExceeded {
                what: "packet bytes",
                limit: MAX_PACKET_SIZE,
            });
        }
        let packet = codec.decode(bytes).map_err(|e| {
            debug!("dropping undecodable packet from {}: {}", peer, e);
            e
        })?;
        let from = self.get_face_or_create(Some(interface), Some(peer))?;
        self.dispatch(from, packet)
    }

    pub fn dispatch(&mut self, from: FaceId, packet: Packet) -> Result<()> {
        match packet.kind() {
            PacketKind::Interest => self.handle_interest(from, packet),
            PacketKind::Content => self.handle_content(from, packet),
        }
    }

    /// Checks an interest's nonce against the configured duplicate policy. With a history, the
    /// nonce is remembered as a side effect.
    pub fn nonce_is_dup(&mut self, packet: &Packet) -> bool {
        let Some(nonce) = packet.nonce() else {
            return false;
        };
        match self.config.nonce_check {
            NonceCheck::History { .. } => self.nonces.find_or_append(nonce),
            NonceCheck::PendingTable => self.pit.has_nonce(nonce),
        }
    }

    pub fn handle_interest(&mut self, from: FaceId, interest: Packet) -> Result<()> {
        if !interest.is_interest() {
            return Err(RelayError::MalformedInput("expected an interest".into()));
        }
        let now = self.clock.now();
        let face = self.faces.get_mut(from).ok_or(RelayError::NotFound("face"))?;
        face.touch(now);
        let from_local = face.is_local();
        let forward_all = face.flags.forward_all;
        self.counters.interests_received += 1;

        if self.nonce_is_dup(&interest) {
            warn!("dropping interest {} from {}: duplicate nonce", interest.prefix(), from);
            self.counters.duplicates_dropped += 1;
            return Ok(());
        }

        if let Some(hit) = self.cache_lookup(&interest) {
            self.counters.cache_hits += 1;
            let Some(entry) = self.content_store.get_mut(hit) else {
                return Ok(());
            };
            entry.record_served(1);
            entry.touch(now);
            info!("answering {} for {} from the cache", entry.prefix(), from);
            if from_local {
                if let Some(deliver) = self.delivery.as_mut() {
                    deliver(Some(from), entry.packet());
                }
            } else {
                let wire = entry.packet().wire().clone();
                self.counters.contents_forwarded += 1;
                self.face_enqueue(from, wire)?;
            }
            return Ok(());
        }

        match self.pit.find_same(&interest) {
            Some(handle) => {
                if let Some(entry) = self.pit.get_mut(handle) {
                    entry.append_waiter(from, now);
                    debug!("pit: {} also wanted by {}", entry.packet().prefix(), from);
                }
                if forward_all {
                    self.interest_propagate(handle);
                }
            }
            None => {
                let lifetime = interest
                    .lifetime_ms()
                    .unwrap_or(self.config.interest_timeout_ms);
                debug!("pit: new entry {} from {}", interest.prefix(), from);
                let handle = self
                    .pit
                    .insert(PitEntry::from_face(interest, from, lifetime, now));
                self.interest_propagate(handle);
            }
        }
        Ok(())
    }

    /// Asks for content on behalf of the local application. The content is handed to the
    /// delivery upcall when it arrives.
    pub fn express_interest(&mut self, interest: Packet) -> Result<()> {
        if !interest.is_interest() {
            return Err(RelayError::MalformedInput("expected an interest".into()));
        }
        let now = self.clock.now();
        if self.nonce_is_dup(&interest) {
            warn!("not expressing {}: duplicate nonce", interest.prefix());
            self.counters.duplicates_dropped += 1;
            return Ok(());
        }

        if let Some(hit) = self.cache_lookup(&interest) {
            self.counters.cache_hits += 1;
            if let Some(entry) = self.content_store.get_mut(hit) {
                entry.record_served(1);
                entry.touch(now);
                entry.flags.is_static = true;
                if let Some(deliver) = self.delivery.as_mut() {
                    deliver(None, entry.packet());
                }
            }
            return Ok(());
        }

        match self.pit.find_same(&interest) {
            Some(handle) => {
                if let Some(entry) = self.pit.get_mut(handle) {
                    entry.mark_local();
                }
            }
            None => {
                let lifetime = interest
                    .lifetime_ms()
                    .unwrap_or(self.config.interest_timeout_ms);
                debug!("pit: new local entry {}", interest.prefix());
                let handle = self.pit.insert(PitEntry::local(interest, lifetime, now));
                self.interest_propagate(handle);
            }
        }
        Ok(())
    }

    pub fn handle_content(&mut self, from: FaceId, content: Packet) -> Result<()> {
        if content.is_interest() {
            return Err(RelayError::MalformedInput("expected content".into()));
        }
        let now = self.clock.now();
        self.faces
            .get_mut(from)
            .ok_or(RelayError::NotFound("face"))?
            .touch(now);
        self.counters.contents_received += 1;

        let stale_copy = self.content_store.find_exact(content.prefix());
        if let Some(existing) = stale_copy {
            let stale = self
                .content_store
                .get(existing)
                .map_or(false, |entry| entry.flags.stale);
            if !stale {
                debug!("cs: {} already cached", content.prefix());
                self.serve_pending(existing);
                return Ok(());
            }
        }

        let served = self.serve_pending_packet(&content);
        if served.count == 0 {
            debug!("dropping unsolicited content {} from {}", content.prefix(), from);
            self.counters.unsolicited_dropped += 1;
            return Ok(());
        }

        let admit = match self.cache_strategy.as_mut() {
            Some(strategy) => strategy.admit(&self.content_store, &content),
            None => true,
        };
        if !admit {
            debug!("cs: not caching {}", content.prefix());
            return Ok(());
        }

        // The stale copy stays until a solicited, admitted one takes its slot.
        if let Some(entry) = stale_copy.and_then(|handle| self.content_store.get_mut(handle)) {
            debug!("cs: refreshing stale {}", content.prefix());
            entry.refresh(content, now);
            entry.record_served(served.count);
            entry.flags.is_static |= served.local;
            return Ok(());
        }

        let mut entry = ContentEntry::new(content, now);
        entry.record_served(served.count);
        entry.flags.is_static = served.local;
        if let Err(e) = self.content_store.add(entry, self.cache_strategy.as_mut()) {
            debug!("cs: content not cached: {}", e);
        }
        Ok(())
    }

    // Pending interests

    pub fn pit(&self) -> &Pit {
        &self.pit
    }

    /// Sends the interest of a PIT entry along every matching route. When no route took it, and
    /// with the fallback enabled, it is broadcast on every interface instead.
    pub fn interest_propagate(&mut self, handle: Handle) {
        let Some(entry) = self.pit.get(handle) else {
            return;
        };
        let from = entry.from();
        let reflect = from
            .and_then(|id| self.faces.get(id))
            .map_or(false, |face| face.flags.reflect);
        let name = entry.packet().prefix();
        let suite = name.suite();
        let wire = entry.packet().wire().clone();

        let mut targets = core::mem::take(&mut self.face_scratch);
        let mut matched = false;
        for route in self.fib.matching_mut(name) {
            if from.is_some() && route.face() == from && !reflect {
                trace!("not sending {} back to {:?}", name, from);
                continue;
            }
            matched = true;
            route.notify_tap(from, name, &wire);
            if let Some(face) = route.face() {
                targets.push(face);
            }
        }

        for face in targets.iter() {
            info!("forwarding interest {} to {}", name, face);
        }
        for face in targets.drain(..) {
            self.counters.interests_forwarded += 1;
            if let Err(e) = self.face_enqueue(face, wire.clone()) {
                warn!("cannot forward interest to {}: {}", face, e);
            }
        }
        self.face_scratch = targets;

        if !matched && self.config.broadcast_fallback {
            self.broadcast(&wire, suite);
        }
    }

    /// Sends the interest of a PIT entry to the broadcast address of every interface.
    pub fn interest_broadcast(&mut self, handle: Handle) {
        let Some(entry) = self.pit.get(handle) else {
            return;
        };
        let suite = entry.packet().suite();
        let wire = entry.packet().wire().clone();
        self.broadcast(&wire, suite);
    }

    fn broadcast(&mut self, wire: &Bytes, suite: Suite) {
        for index in 0..self.interfaces.len() {
            let destination = self.interfaces[index].address().broadcast(suite);
            match self.get_face_or_create(Some(index), Some(&destination)) {
                Ok(face) => {
                    info!("broadcasting interest to {} on interface {}", destination, index);
                    self.counters.interests_forwarded += 1;
                    if let Err(e) = self.face_enqueue(face, wire.clone()) {
                        warn!("cannot broadcast on interface {}: {}", index, e);
                    }
                }
                Err(e) => warn!("no broadcast face on interface {}: {}", index, e),
            }
        }
    }

    // Content store

    pub fn content_store(&self) -> &ContentStore {
        &self.content_store
    }

    fn cache_lookup(&mut self, interest: &Packet) -> Option<Handle> {
        let must_be_fresh = interest.must_be_fresh();
        let hasher = &mut self.hasher;
        self.content_store
            .iter()
            .find(|(_, entry)| {
                if must_be_fresh && entry.flags.stale {
                    return false;
                }
                let wire = entry.packet().wire();
                interest.is_satisfied_by(entry.packet(), &mut || digest_of(hasher, wire))
            })
            .map(|(handle, _)| handle)
    }

    /// Stores content, evicting if needed. Content already cached under the same name is
    /// refused with `AlreadyPresent`.
    pub fn add_to_cache(&mut self, content: Packet) -> Result<Handle> {
        let now = self.clock.now();
        self.content_store
            .add(ContentEntry::new(content, now), self.cache_strategy.as_mut())
    }

    /// Caches content and serves the interests waiting for it. Returns how many were served.
    pub fn cs_add(&mut self, content: Packet) -> Result<usize> {
        let handle = self.add_to_cache(content)?;
        Ok(self.serve_pending(handle))
    }

    /// Removes the first cached entry whose rendered name leads `path`.
    pub fn cs_remove(&mut self, path: &str) -> Result<()> {
        let handle = self
            .content_store
            .lookup_path(path)
            .ok_or(RelayError::NotFound("content"))?;
        if let Some(entry) = self.content_store.remove(handle) {
            debug!("cs: removed {}", entry.prefix());
        }
        self.content_store.compact();
        Ok(())
    }

    pub fn cs_lookup(&self, path: &str) -> Option<&ContentEntry> {
        let handle = self.content_store.lookup_path(path)?;
        self.content_store.get(handle)
    }

    /// Answers every pending interest the cached entry satisfies. Returns the number of replies.
    pub fn serve_pending(&mut self, handle: Handle) -> usize {
        let Some(content) = self.content_store.get(handle).map(|e| e.packet().clone()) else {
            return 0;
        };
        let served = self.serve_pending_packet(&content);
        if let Some(entry) = self.content_store.get_mut(handle) {
            entry.record_served(served.count);
            if served.local {
                entry.flags.is_static = true;
            }
        }
        served.count as usize
    }

    fn serve_pending_packet(&mut self, content: &Packet) -> Served {
        for face in self.faces.iter_mut() {
            face.flags.served = false;
        }

        let mut served = Served::default();
        let mut digest: Option<[u8; DIGEST_LEN]> = None;
        let mut network = core::mem::take(&mut self.face_scratch);
        let mut local = Vec::new();

        let mut cursor = self.pit.cursor();
        while let Some(handle) = self.pit.next(&mut cursor) {
            let Some(entry) = self.pit.get(handle) else {
                continue;
            };
            let hasher = &mut self.hasher;
            let satisfied = entry.packet().is_satisfied_by(content, &mut || {
                *digest.get_or_insert_with(|| digest_of(hasher, content.wire()))
            });
            if !satisfied {
                continue;
            }
            trace!("pit: {} satisfied by {}", entry.packet().prefix(), content.prefix());

            if entry.is_local() {
                served.local = true;
                served.count += 1;
                local.push(None);
            }
            for waiter in entry.pending() {
                let Some(face) = self.faces.get_mut(waiter.face) else {
                    continue;
                };
                if face.flags.served {
                    continue;
                }
                face.flags.served = true;
                if face.is_local() {
                    local.push(Some(face.id()));
                } else {
                    network.push(face.id());
                }
                served.count += 1;
            }
            self.pit.remove(handle);
        }
        self.pit.compact();

        for face in network.drain(..) {
            info!("sending content {} to {}", content.prefix(), face);
            self.counters.contents_forwarded += 1;
            if let Err(e) = self.face_enqueue(face, content.wire().clone()) {
                warn!("cannot send content to {}: {}", face, e);
            }
        }
        self.face_scratch = network;

        if let Some(deliver) = self.delivery.as_mut() {
            for face in local {
                deliver(face, content);
            }
        }
        served
    }

    // Ageing

    /// One pass over the content store, the PIT and the faces, dropping what has timed out.
    /// Pending interests that have not timed out are sent again.
    pub fn do_ageing(&mut self) {
        let now = self.clock.now();

        let mut cursor = self.content_store.cursor();
        while let Some(handle) = self.content_store.next(&mut cursor) {
            let Some(entry) = self.content_store.get_mut(handle) else {
                continue;
            };
            if !entry.flags.is_static
                && entry
                    .last_used()
                    .has_elapsed(self.config.content_timeout_ms, now)
            {
                debug!("cs: {} timed out", entry.prefix());
                self.content_store.remove(handle);
            } else if let Some(freshness) = entry.packet().freshness_period_ms() {
                if !entry.flags.is_static
                    && !entry.flags.stale
                    && entry.last_used().has_elapsed(freshness, now)
                {
                    trace!("cs: {} is stale", entry.prefix());
                    entry.flags.stale = true;
                }
            }
        }
        self.content_store.compact();

        let mut cursor = self.pit.cursor();
        while let Some(handle) = self.pit.next(&mut cursor) {
            let Some(entry) = self.pit.get(handle) else {
                continue;
            };
            if entry.is_expired(self.config.max_interest_retransmit, now) {
                debug!(
                    "pit: {} timed out after {} retries",
                    entry.packet().prefix(),
                    entry.retries()
                );
                self.counters.interest_timeouts += 1;
                self.pit.remove(handle);
            } else {
                trace!("pit: retransmitting {}", entry.packet().prefix());
                self.interest_propagate(handle);
                if let Some(entry) = self.pit.get_mut(handle) {
                    entry.retries += 1;
                }
            }
        }
        self.pit.compact();

        let timeout = self.config.face_timeout_ms;
        let expired: Vec<FaceId> = self
            .faces
            .iter()
            .filter(|face| face.is_expired(timeout, now))
            .map(Face::id)
            .collect();
        for id in expired {
            debug!("{} timed out", id);
            if let Err(e) = self.face_remove(id) {
                warn!("cannot remove {}: {}", id, e);
            }
        }
    }

    // Status

    pub fn status(&mut self) -> RelayStatus {
        let now = self.clock.now();
        let mut routes: Vec<_> = self.fib.entries().collect();
        routes.sort_by(|a, b| a.prefix().cmp(b.prefix()));
        RelayStatus {
            now,
            faces: self.faces.iter().map(FaceStatus::from).collect(),
            interfaces: self
                .interfaces
                .iter()
                .enumerate()
                .map(|(index, interface)| InterfaceStatus::new(index, interface))
                .collect(),
            fib: routes.into_iter().map(FibRow::from).collect(),
            pit: self.pit.iter().map(|(_, entry)| PitRow::from(entry)).collect(),
            contents: self
                .content_store
                .iter()
                .map(|(_, entry)| ContentRow::from(entry))
                .collect(),
            max_cache_entries: self.content_store.max_entries(),
            counters: self.counters,
        }
    }
}
