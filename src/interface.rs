use bytes::Bytes;
use log::warn;

use crate::config::InterfaceConfig;
use crate::face::{Address, FaceId, Scheduler};

pub const MAX_IF_QLEN: usize = 64;

/// A packet waiting on an interface, with where it goes and which face queued it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TxRequest {
    pub packet: Bytes,
    pub destination: Address,
    pub face: Option<FaceId>,
}

/// Fixed ring of transmit requests. One slot is always left empty so that a full ring and an
/// empty ring have different head positions.
pub struct TxQueue<const SIZE: usize> {
    slots: [Option<TxRequest>; SIZE],
    read: usize,
    write: usize,
}

impl<const SIZE: usize> TxQueue<SIZE> {
    pub fn new() -> Self {
        Self {
            slots: core::array::from_fn(|_| None),
            read: 0,
            write: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        SIZE.saturating_sub(1)
    }

    pub fn len(&self) -> usize {
        (self.write + SIZE - self.read) % SIZE
    }

    pub fn is_empty(&self) -> bool {
        self.read == self.write
    }

    pub fn is_full(&self) -> bool {
        (self.write + 1) % SIZE == self.read
    }

    /// Hands the request back if there is no room.
    pub fn push(&mut self, request: TxRequest) -> Result<(), TxRequest> {
        if SIZE == 0 || self.is_full() {
            return Err(request);
        }
        self.slots[self.write] = Some(request);
        self.write = (self.write + 1) % SIZE;
        Ok(())
    }

    pub fn pop(&mut self) -> Option<TxRequest> {
        if self.is_empty() {
            return None;
        }
        let request = self.slots[self.read].take();
        self.read = (self.read + 1) % SIZE;
        request
    }

    pub fn front(&self) -> Option<&TxRequest> {
        if self.is_empty() {
            return None;
        }
        self.slots[self.read].as_ref()
    }
}

impl<const SIZE: usize> Default for TxQueue<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

/// Hands frames to the medium. Implemented by whatever owns the sockets.
pub trait LinkLayer {
    fn transmit(&mut self, interface: usize, destination: &Address, packet: &[u8]);
}

/// A local attachment point to a network medium.
pub struct Interface {
    address: Address,
    pub reflect: bool,
    pub forward_all: bool,
    queue: TxQueue<{ MAX_IF_QLEN + 1 }>,
    scheduler: Option<Box<dyn Scheduler>>,
    tx_count: u64,
    dropped: u64,
}

impl Interface {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            reflect: false,
            forward_all: false,
            queue: TxQueue::new(),
            scheduler: None,
            tx_count: 0,
            dropped: 0,
        }
    }

    pub fn from_config(config: &InterfaceConfig) -> Self {
        let mut interface = Self::new(config.address.clone());
        interface.reflect = config.reflect;
        interface.forward_all = config.forward_all;
        interface
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    pub fn tx_count(&self) -> u64 {
        self.tx_count
    }

    pub fn dropped(&self) -> u64 {
        self.dropped
    }

    pub fn set_scheduler(&mut self, scheduler: Box<dyn Scheduler>) {
        self.scheduler = Some(scheduler);
    }

    /// Queues a request. When the queue is full the new request is dropped and false returned.
    pub fn enqueue(&mut self, request: TxRequest) -> bool {
        match self.queue.push(request) {
            Ok(()) => true,
            Err(rejected) => {
                self.dropped += 1;
                warn!(
                    "interface {} queue full, dropping {} bytes to {}",
                    self.address,
                    rejected.packet.len(),
                    rejected.destination
                );
                false
            }
        }
    }

    /// Whether the front request may be sent now.
    pub fn ready(&mut self) -> bool {
        let Some(len) = self.queue.front().map(|request| request.packet.len()) else {
            return false;
        };
        match self.scheduler.as_mut() {
            Some(scheduler) => scheduler.request_to_send(1, len),
            None => true,
        }
    }

    /// Sends the front request through `link`. Returns the request so the caller can notify the
    /// face that queued it.
    pub fn clear_to_send<L>(&mut self, index: usize, link: &mut L) -> Option<TxRequest>
    where
        L: LinkLayer + ?Sized,
    {
        let request = self.queue.pop()?;
        link.transmit(index, &request.destination, &request.packet);
        self.tx_count += 1;
        if let Some(scheduler) = self.scheduler.as_mut() {
            scheduler.sent(1, request.packet.len());
        }
        Some(request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(n: u8) -> TxRequest {
        TxRequest {
            packet: Bytes::from(vec![n]),
            destination: Address::link([n; 6]),
            face: None,
        }
    }

    #[test]
    fn test_ring_wraps_around() {
        let mut queue = TxQueue::<4>::new();
        assert_eq!(queue.capacity(), 3);
        for round in 0..5u8 {
            assert!(queue.push(request(round)).is_ok());
            assert!(queue.push(request(round + 100)).is_ok());
            assert_eq!(queue.len(), 2);
            assert_eq!(queue.pop().map(|r| r.packet[0]), Some(round));
            assert_eq!(queue.pop().map(|r| r.packet[0]), Some(round + 100));
            assert!(queue.is_empty());
        }
    }

    #[test]
    fn test_ring_rejects_when_full() {
        let mut queue = TxQueue::<3>::new();
        assert!(queue.push(request(1)).is_ok());
        assert!(queue.push(request(2)).is_ok());
        assert!(queue.is_full());
        assert_eq!(queue.push(request(3)).map_err(|r| r.packet[0]), Err(3));
        assert_eq!(queue.front().map(|r| r.packet[0]), Some(1));
    }

    #[test]
    fn test_interface_drops_newest_when_full() {
        let mut interface = Interface::new(Address::link([0; 6]));
        for n in 0..MAX_IF_QLEN {
            assert!(interface.enqueue(request(n as u8)));
        }
        assert!(!interface.enqueue(request(0xee)));
        assert_eq!(interface.queue_len(), MAX_IF_QLEN);
        assert_eq!(interface.dropped(), 1);
    }

    struct Recorder(Vec<(usize, Address, Vec<u8>)>);

    impl LinkLayer for Recorder {
        fn transmit(&mut self, interface: usize, destination: &Address, packet: &[u8]) {
            self.0.push((interface, destination.clone(), packet.to_vec()));
        }
    }

    struct Gate(bool, usize);

    impl Scheduler for Gate {
        fn request_to_send(&mut self, _count: usize, _len: usize) -> bool {
            self.0
        }

        fn sent(&mut self, count: usize, _len: usize) {
            self.1 += count;
        }
    }

    #[test]
    fn test_clear_to_send_transmits_in_order() {
        let mut interface = Interface::new(Address::link([0; 6]));
        interface.enqueue(request(1));
        interface.enqueue(request(2));
        let mut link = Recorder(Vec::new());
        while interface.ready() {
            interface.clear_to_send(3, &mut link);
        }
        assert_eq!(link.0.len(), 2);
        assert_eq!(link.0[0], (3, Address::link([1; 6]), vec![1]));
        assert_eq!(interface.tx_count(), 2);
    }

    #[test]
    fn test_scheduler_holds_queue() {
        let mut interface = Interface::new(Address::link([0; 6]));
        interface.set_scheduler(Box::new(Gate(false, 0)));
        interface.enqueue(request(1));
        assert!(!interface.ready());
        assert_eq!(interface.queue_len(), 1);
    }
}
