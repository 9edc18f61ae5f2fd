//! ICMP echo client: sends one echo every `interval` ticks, logs
//! round-trip ticks and timeouts (`spec.md` C10, SPEC_FULL.md §8).

use std::any::Any;
use std::collections::{HashMap, VecDeque};

use crate::addr::Ipv4Addr;
use crate::packet::{Ipv4Protocol, ProtocolKind};
use crate::rng::SimRng;
use crate::stack::Delivery;

use super::{AppContext, Application};

/// Ticks an unanswered echo waits before it's logged as a timeout.
pub const DEFAULT_PING_TIMEOUT: u64 = 40;

const LOG_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PingOutcome {
    Reply { rtt: u64 },
    Timeout,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PingLogEntry {
    pub seq: u16,
    pub outcome: PingOutcome,
}

pub struct Ping {
    dst: Ipv4Addr,
    bound_addr: Ipv4Addr,
    iface: usize,
    id: u16,
    count: Option<u32>,
    interval: u32,
    timeout: u64,
    protocol_bound: bool,
    clock: u64,
    next_seq: u16,
    sent_count: u32,
    ticks_since_send: u32,
    outstanding: HashMap<u16, u64>,
    log: VecDeque<PingLogEntry>,
}

impl Ping {
    /// Draws the ICMP identifier from `rng`, per the concurrency note in
    /// `spec.md` §5.
    pub fn new(
        rng: &mut SimRng,
        bound_addr: Ipv4Addr,
        iface: usize,
        dst: Ipv4Addr,
        count: Option<u32>,
        interval: u32,
    ) -> Self {
        Ping::with_id(rng.gen_u16(), bound_addr, iface, dst, count, interval)
    }

    /// Constructs with an explicit identifier, for scenarios that pin it
    /// down for reproducibility (`spec.md` §8 scenario 1: "identifier 42").
    pub fn with_id(
        id: u16,
        bound_addr: Ipv4Addr,
        iface: usize,
        dst: Ipv4Addr,
        count: Option<u32>,
        interval: u32,
    ) -> Self {
        Ping {
            dst,
            bound_addr,
            iface,
            id,
            count,
            interval: interval.max(1),
            timeout: DEFAULT_PING_TIMEOUT.max(interval as u64 * 2),
            protocol_bound: false,
            clock: 0,
            next_seq: 1,
            sent_count: 0,
            ticks_since_send: interval,
            outstanding: HashMap::new(),
            log: VecDeque::new(),
        }
    }

    pub fn id(&self) -> u16 {
        self.id
    }

    pub fn log(&self) -> &VecDeque<PingLogEntry> {
        &self.log
    }

    fn push_log(&mut self, entry: PingLogEntry) {
        if self.log.len() >= LOG_CAPACITY {
            self.log.pop_front();
        }
        self.log.push_back(entry);
    }
}

impl Application for Ping {
    fn name(&self) -> &str {
        "ping"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn step(&mut self, ctx: &mut AppContext) {
        if !self.protocol_bound {
            let _ = ctx
                .stack
                .bind_protocol(ProtocolKind::IcmpReply, self.bound_addr, self.id);
            self.protocol_bound = true;
        }
        self.clock += 1;

        for delivery in ctx
            .stack
            .take_deliveries(ProtocolKind::IcmpReply, self.bound_addr, self.id)
        {
            if let Delivery::IcmpReply { seq, .. } = delivery {
                if let Some(sent_at) = self.outstanding.remove(&seq) {
                    self.push_log(PingLogEntry {
                        seq,
                        outcome: PingOutcome::Reply {
                            rtt: self.clock - sent_at,
                        },
                    });
                }
            }
        }

        let clock = self.clock;
        let timeout = self.timeout;
        let timed_out: Vec<u16> = self
            .outstanding
            .iter()
            .filter(|(_, &sent_at)| clock - sent_at >= timeout)
            .map(|(&seq, _)| seq)
            .collect();
        for seq in timed_out {
            self.outstanding.remove(&seq);
            self.push_log(PingLogEntry {
                seq,
                outcome: PingOutcome::Timeout,
            });
        }

        if self.count.map(|c| self.sent_count >= c).unwrap_or(false) {
            return;
        }

        self.ticks_since_send += 1;
        if self.ticks_since_send < self.interval {
            return;
        }
        self.ticks_since_send = 0;

        let seq = self.next_seq;
        self.next_seq = self.next_seq.wrapping_add(1);
        self.sent_count += 1;
        self.outstanding.insert(seq, self.clock);
        ctx.stack.send(
            ctx.interfaces,
            self.dst,
            Ipv4Protocol::IcmpEcho {
                id: self.id,
                seq,
                payload: Vec::new(),
            },
            Some(self.bound_addr),
            Some(self.iface),
            None,
        );
    }
}
