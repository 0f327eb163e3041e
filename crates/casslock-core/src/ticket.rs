//! Ticket and entering-set cell keys
//!
//! Every field is written as a big-endian u32, most significant field first.
//! Comparing two encoded keys byte by byte therefore gives the same answer
//! as comparing the decoded tuples, which lets the store's native cell
//! ordering stand in for a sort by priority.

use byteorder::{BigEndian, ByteOrder};

/// Width of an encoded ticket key
pub const TICKET_KEY_LEN: usize = 12;

/// Width of an encoded entering key
pub const ENTERING_KEY_LEN: usize = 8;

/// Cell key of the entering set: who is currently picking a ticket number
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EnteringKey {
    pub host_id: u32,
    pub pid: u32,
}

impl EnteringKey {
    pub fn new(host_id: u32, pid: u32) -> Self {
        Self { host_id, pid }
    }

    pub fn encode(&self) -> [u8; ENTERING_KEY_LEN] {
        let mut buf = [0u8; ENTERING_KEY_LEN];
        BigEndian::write_u32(&mut buf[0..4], self.host_id);
        BigEndian::write_u32(&mut buf[4..8], self.pid);
        buf
    }

    pub fn decode(key: &[u8]) -> Option<Self> {
        if key.len() != ENTERING_KEY_LEN {
            return None;
        }
        Some(Self {
            host_id: BigEndian::read_u32(&key[0..4]),
            pid: BigEndian::read_u32(&key[4..8]),
        })
    }
}

/// Cell key of the ticket set
///
/// Field order is priority order: a smaller ticket number goes first, then
/// the smaller host identifier, then the smaller process identifier. The
/// derived `Ord` follows the same order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TicketKey {
    pub number: u32,
    pub host_id: u32,
    pub pid: u32,
}

impl TicketKey {
    pub fn new(number: u32, host_id: u32, pid: u32) -> Self {
        Self {
            number,
            host_id,
            pid,
        }
    }

    pub fn encode(&self) -> [u8; TICKET_KEY_LEN] {
        let mut buf = [0u8; TICKET_KEY_LEN];
        BigEndian::write_u32(&mut buf[0..4], self.number);
        BigEndian::write_u32(&mut buf[4..8], self.host_id);
        BigEndian::write_u32(&mut buf[8..12], self.pid);
        buf
    }

    pub fn decode(key: &[u8]) -> Option<Self> {
        if key.len() != TICKET_KEY_LEN {
            return None;
        }
        Some(Self {
            number: BigEndian::read_u32(&key[0..4]),
            host_id: BigEndian::read_u32(&key[4..8]),
            pid: BigEndian::read_u32(&key[8..12]),
        })
    }

    /// Whether this ticket must enter the critical section before `other`
    pub fn has_priority_over(&self, other: &TicketKey) -> bool {
        self < other
    }

    pub fn owner(&self) -> EnteringKey {
        EnteringKey::new(self.host_id, self.pid)
    }
}

impl std::fmt::Display for TicketKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.number, self.host_id, self.pid)
    }
}

/// Number of the ticket to take after `existing`: one more than the largest,
/// or `None` when that would overflow
pub fn next_ticket_number<I>(existing: I) -> Option<u32>
where
    I: IntoIterator<Item = u32>,
{
    existing.into_iter().max().unwrap_or(0).checked_add(1)
}
