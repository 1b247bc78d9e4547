// SPDX-FileCopyrightText: 2026 Courier Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-ordered unique identifiers for sessions and messages.
//!
//! A 63-bit id is laid out as 39 bits of 10 ms ticks since [`EPOCH_MILLIS`],
//! 8 bits of per-tick sequence and 16 bits of node id. Distinct nodes sharing
//! one database must be configured with distinct node ids.
//!
//! A burst may run at most [`MAX_LEAD_TICKS`] ahead of the wall clock. A new
//! generator starts that far ahead, so a restarted process never reissues an
//! id its predecessor handed out.

use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;

use crate::error::CourierError;
use crate::types::{MessageId, SessionId};

/// 2024-01-01T00:00:00Z in Unix milliseconds.
pub const EPOCH_MILLIS: i64 = 1_704_067_200_000;

const TICK_MILLIS: i64 = 10;
const BITS_TIME: u32 = 39;
const BITS_SEQUENCE: u32 = 8;
const BITS_NODE: u32 = 16;
const SEQUENCE_MASK: u16 = (1 << BITS_SEQUENCE) - 1;

/// How many ticks ids may run ahead of the clock (100 ms).
pub const MAX_LEAD_TICKS: i64 = 10;

#[derive(Debug)]
struct State {
    elapsed: i64,
    sequence: u16,
}

/// Sonyflake-style id generator.
#[derive(Debug)]
pub struct Snowflake {
    node_id: u16,
    state: Mutex<State>,
}

impl Snowflake {
    /// Creates a generator for `node_id`. Fails when the system clock is
    /// before the id epoch.
    pub fn new(node_id: u16) -> Result<Self, CourierError> {
        let now = current_tick();
        if now < 0 {
            return Err(CourierError::IdGenerator(
                "system clock is before the id epoch".into(),
            ));
        }
        // The first id lands on tick `now + MAX_LEAD_TICKS`.
        Ok(Self {
            node_id,
            state: Mutex::new(State {
                elapsed: now + MAX_LEAD_TICKS - 1,
                sequence: SEQUENCE_MASK,
            }),
        })
    }

    pub fn node_id(&self) -> u16 {
        self.node_id
    }

    /// Returns the next id. Ids are strictly increasing for one generator.
    ///
    /// When the sequence for a tick is exhausted the id borrows the next tick.
    /// Once the borrowed tick is more than [`MAX_LEAD_TICKS`] ahead of the
    /// clock the call sleeps until the clock catches up.
    pub fn next_id(&self) -> Result<u64, CourierError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| CourierError::IdGenerator("generator lock poisoned".into()))?;

        let mut now = current_tick();
        if state.elapsed < now {
            state.elapsed = now;
            state.sequence = 0;
        } else {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                state.elapsed += 1;
            }
        }

        while state.elapsed - now > MAX_LEAD_TICKS {
            let behind = state.elapsed - now - MAX_LEAD_TICKS;
            std::thread::sleep(Duration::from_millis((behind * TICK_MILLIS) as u64));
            now = current_tick();
        }

        if state.elapsed >= 1 << BITS_TIME {
            return Err(CourierError::IdGenerator("time horizon exceeded".into()));
        }

        Ok(((state.elapsed as u64) << (BITS_SEQUENCE + BITS_NODE))
            | (u64::from(state.sequence) << BITS_NODE)
            | u64::from(self.node_id))
    }

    /// `session-<n>`
    pub fn new_session_id(&self) -> Result<SessionId, CourierError> {
        Ok(SessionId(format!("session-{}", self.next_id()?)))
    }

    /// `msg-<n>`
    pub fn new_message_id(&self) -> Result<MessageId, CourierError> {
        Ok(MessageId(format!("msg-{}", self.next_id()?)))
    }
}

fn current_tick() -> i64 {
    (Utc::now().timestamp_millis() - EPOCH_MILLIS) / TICK_MILLIS
}

/// Splits an id into (ticks, sequence, node id).
pub fn decompose(id: u64) -> (u64, u16, u16) {
    let node = (id & ((1 << BITS_NODE) - 1)) as u16;
    let sequence = ((id >> BITS_NODE) & u64::from(SEQUENCE_MASK)) as u16;
    let ticks = id >> (BITS_SEQUENCE + BITS_NODE);
    (ticks, sequence, node)
}
