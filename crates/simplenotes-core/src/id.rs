use std::sync::Mutex;

use crate::error::{Result, SimplenotesError};
use crate::types::now_millis;

/// 2010-11-04T01:42:54.657Z, the conventional snowflake epoch.
const EPOCH_MILLIS: i64 = 1_288_834_974_657;
const MACHINE_BITS: u32 = 10;
const SEQUENCE_BITS: u32 = 12;
const MAX_MACHINE_ID: u16 = (1 << MACHINE_BITS) - 1;
const SEQUENCE_MASK: i64 = (1 << SEQUENCE_BITS) - 1;

/// Time-ordered 63-bit id generator (snowflake layout: 41 bits of
/// milliseconds, 10 bits of machine id, 12 bits of sequence).
///
/// Constructed once at startup and handed to whatever needs ids.
pub struct IdGenerator {
    machine_id: i64,
    state: Mutex<State>,
}

struct State {
    last_ms: i64,
    sequence: i64,
}

impl IdGenerator {
    pub fn new(machine_id: u16) -> Result<Self> {
        if machine_id > MAX_MACHINE_ID {
            return Err(SimplenotesError::Config(format!(
                "machine id {machine_id} exceeds {MAX_MACHINE_ID}"
            )));
        }
        Ok(Self {
            machine_id: i64::from(machine_id),
            state: Mutex::new(State {
                last_ms: 0,
                sequence: 0,
            }),
        })
    }

    pub fn machine_id(&self) -> u16 {
        // Range-checked in `new`.
        self.machine_id as u16
    }

    /// Next id. Strictly increasing for a given generator.
    pub fn generate(&self) -> i64 {
        let mut state = self.state.lock().unwrap_or_else(|p| p.into_inner());
        let mut now = now_millis().max(state.last_ms);

        if now == state.last_ms {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                // 4096 ids issued this millisecond; wait for the clock.
                while now <= state.last_ms {
                    std::thread::yield_now();
                    now = now_millis().max(state.last_ms);
                }
            }
        } else {
            state.sequence = 0;
        }
        state.last_ms = now;

        ((now - EPOCH_MILLIS) << (MACHINE_BITS + SEQUENCE_BITS))
            | (self.machine_id << SEQUENCE_BITS)
            | state.sequence
    }

    /// Next id rendered as a decimal string.
    pub fn generate_string(&self) -> String {
        self.generate().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn rejects_out_of_range_machine_id() {
        assert!(IdGenerator::new(1024).is_err());
        assert!(IdGenerator::new(1023).is_ok());
    }

    #[test]
    fn ids_are_unique_and_increasing() {
        let ids = IdGenerator::new(3).unwrap();
        let mut seen = HashSet::new();
        let mut last = 0;
        for _ in 0..10_000 {
            let id = ids.generate();
            assert!(id > last, "ids must increase");
            assert!(seen.insert(id));
            last = id;
        }
    }

    #[test]
    fn machine_id_is_embedded() {
        let ids = IdGenerator::new(42).unwrap();
        let id = ids.generate();
        assert_eq!((id >> SEQUENCE_BITS) & i64::from(MAX_MACHINE_ID), 42);
        assert_eq!(ids.machine_id(), 42);
    }
}
