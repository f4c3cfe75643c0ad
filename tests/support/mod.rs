//! Shared harness for link tests
//!
//! A relay sits between an initiator and an acceptor running over
//! in-memory pipes, so tests can observe or tamper with each message.

#![allow(dead_code)]

use replink::connection::Connection;
use replink::protocol::SharedKey;
use replink::transport::{MemoryTransport, Transport};

pub const ROUNDS: usize = 20;

pub fn key(byte: u8) -> SharedKey {
    SharedKey::from_bytes(&[byte; 16]).unwrap()
}

/// Two links joined by a relay: initiator <-> (relay) <-> acceptor.
pub struct Wire {
    pub to_initiator: MemoryTransport,
    pub to_acceptor: MemoryTransport,
    /// Messages the initiator sent, as seen before tampering.
    pub from_initiator: Vec<Vec<u8>>,
    pub from_acceptor: Vec<Vec<u8>>,
}

pub fn wire() -> (MemoryTransport, MemoryTransport, Wire) {
    let (init_end, relay_i) = MemoryTransport::pair();
    let (relay_a, acc_end) = MemoryTransport::pair();
    let wire = Wire {
        to_initiator: relay_i,
        to_acceptor: relay_a,
        from_initiator: Vec::new(),
        from_acceptor: Vec::new(),
    };
    (init_end, acc_end, wire)
}

impl Wire {
    /// Forward whatever is pending in each direction. `tamper` sees every
    /// initiator message with its 1-based index.
    pub fn relay(&mut self, tamper: &mut dyn FnMut(usize, &mut Vec<u8>)) {
        if self.to_initiator.is_open() && self.to_initiator.pending() > 0 {
            let mut msg = self.to_initiator.read_bytes(usize::MAX).unwrap();
            self.from_initiator.push(msg.clone());
            tamper(self.from_initiator.len(), &mut msg);
            let _ = self.to_acceptor.write_bytes(&msg);
        }
        if self.to_acceptor.is_open() && self.to_acceptor.pending() > 0 {
            let msg = self.to_acceptor.read_bytes(usize::MAX).unwrap();
            self.from_acceptor.push(msg.clone());
            let _ = self.to_initiator.write_bytes(&msg);
        }

        // Pass a hang-up through once its data has been forwarded.
        if peer_closed(&mut self.to_acceptor) {
            self.to_acceptor.close();
            self.to_initiator.close();
        }
        if peer_closed(&mut self.to_initiator) {
            self.to_initiator.close();
            self.to_acceptor.close();
        }
    }
}

fn peer_closed(end: &mut MemoryTransport) -> bool {
    end.is_open() && end.pending() == 0 && end.has_data().unwrap_or(false)
}

/// Step both sides in lockstep, relaying between every step.
pub fn pump(
    init: &mut Connection<'_, MemoryTransport>,
    acc: &mut Connection<'_, MemoryTransport>,
    wire: &mut Wire,
    tamper: &mut dyn FnMut(usize, &mut Vec<u8>),
) {
    for _ in 0..ROUNDS {
        init.step().unwrap();
        wire.relay(tamper);
        acc.step().unwrap();
        wire.relay(tamper);
    }
}

/// Like [`pump`], but the initiator takes `init_steps` steps for every
/// acceptor step, so back-to-back sends reach the acceptor in one read.
pub fn pump_uneven(
    init: &mut Connection<'_, MemoryTransport>,
    acc: &mut Connection<'_, MemoryTransport>,
    wire: &mut Wire,
    init_steps: usize,
) {
    for _ in 0..ROUNDS {
        for _ in 0..init_steps {
            init.step().unwrap();
        }
        wire.relay(&mut |_, _| {});
        acc.step().unwrap();
        wire.relay(&mut |_, _| {});
    }
}
