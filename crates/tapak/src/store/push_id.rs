//! Push-style record ids.
//!
//! Ids are 20 characters from the Firebase push alphabet: 8 characters of
//! creation time in milliseconds, 4 of a per-millisecond sequence number and
//! 8 derived from a `blake3` digest. They sort lexicographically in creation
//! order within one generator.

use std::sync::Mutex;

use chrono::{DateTime, Utc};

const PUSH_CHARS: &[u8; 64] = b"-0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ_abcdefghijklmnopqrstuvwxyz";

/// Length of every generated id.
pub const PUSH_ID_LEN: usize = 20;

#[derive(Debug, Default)]
struct Clock {
    last_millis: i64,
    sequence: u64,
}

/// Generates push-style ids.
#[derive(Debug, Default)]
pub struct PushIdGenerator {
    clock: Mutex<Clock>,
}

impl PushIdGenerator {
    /// Create a new generator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate an id for a document with the given body at `now`.
    pub fn next_id(&self, now: DateTime<Utc>, body: &[u8]) -> String {
        let (millis, sequence) = {
            let mut clock = match self.clock.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Never go backwards, even if the wall clock does.
            let millis = now.timestamp_millis().max(clock.last_millis);
            if millis == clock.last_millis {
                clock.sequence += 1;
            } else {
                clock.last_millis = millis;
                clock.sequence = 0;
            }
            (millis, clock.sequence)
        };

        let mut hasher = blake3::Hasher::new();
        hasher.update(&millis.to_be_bytes());
        hasher.update(&sequence.to_be_bytes());
        hasher.update(&std::process::id().to_be_bytes());
        hasher.update(body);
        let digest = hasher.finalize();

        let mut id = String::with_capacity(PUSH_ID_LEN);
        push_base64(&mut id, u64::try_from(millis).unwrap_or(0), 8);
        push_base64(&mut id, sequence, 4);
        for byte in &digest.as_bytes()[..8] {
            id.push(char::from(PUSH_CHARS[usize::from(byte % 64)]));
        }
        id
    }
}

fn push_base64(out: &mut String, mut value: u64, width: usize) {
    let mut chars = vec![b'-'; width];
    for slot in chars.iter_mut().rev() {
        *slot = PUSH_CHARS[usize::try_from(value % 64).unwrap_or(0)];
        value /= 64;
    }
    out.extend(chars.into_iter().map(char::from));
}
