//! Coordination-free, time-sortable 64-bit identifier generation.
//!
//! Bit layout, most significant first:
//!
//! ```text
//! [ timestamp: 41 ][ region: 3 ][ worker: 10 ][ sequence: 10 ]
//! ```
//!
//! The timestamp counts milliseconds since [`EPOCH_MILLIS`] (2024-01-01 UTC),
//! giving roughly 69 years of range. Each `(region, worker)` pair can issue
//! 1024 identifiers per millisecond.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tracing::warn;

use crate::error::AppError;
use crate::utils::clock::{SharedClock, SystemClock};

/// Custom epoch: 2024-01-01T00:00:00Z in Unix milliseconds.
pub const EPOCH_MILLIS: u64 = 1_704_067_200_000;

pub const MAX_REGION: u16 = 7;
pub const MAX_WORKER: u16 = 1023;

const SEQUENCE_BITS: u64 = 10;
const WORKER_BITS: u64 = 10;
const REGION_BITS: u64 = 3;
const TIMESTAMP_BITS: u64 = 41;

const WORKER_SHIFT: u64 = SEQUENCE_BITS;
const REGION_SHIFT: u64 = SEQUENCE_BITS + WORKER_BITS;
const TIMESTAMP_SHIFT: u64 = SEQUENCE_BITS + WORKER_BITS + REGION_BITS;

const SEQUENCE_MASK: u64 = (1 << SEQUENCE_BITS) - 1;
const WORKER_MASK: u64 = (1 << WORKER_BITS) - 1;
const REGION_MASK: u64 = (1 << REGION_BITS) - 1;
const TIMESTAMP_MASK: u64 = (1 << TIMESTAMP_BITS) - 1;

/// What [`IdGenerator::generate`] does when the wall clock reads earlier than
/// the last timestamp it issued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClockRegressionPolicy {
    /// Spin under the lock until the clock catches up, then continue the
    /// sequence as if still inside the last millisecond.
    #[default]
    Wait,
    /// Fail the call with [`AppError::ClockMovedBackwards`].
    Reject,
    /// Reset the sequence and carry on with the earlier timestamp. May reissue
    /// an identifier already handed out before the regression.
    Tolerate,
}

impl FromStr for ClockRegressionPolicy {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "wait" => Ok(Self::Wait),
            "reject" => Ok(Self::Reject),
            "tolerate" => Ok(Self::Tolerate),
            other => Err(AppError::Configuration(format!(
                "unknown clock regression policy '{other}', expected wait, reject or tolerate"
            ))),
        }
    }
}

impl fmt::Display for ClockRegressionPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wait => f.write_str("wait"),
            Self::Reject => f.write_str("reject"),
            Self::Tolerate => f.write_str("tolerate"),
        }
    }
}

/// The four fields packed into an identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdParts {
    pub timestamp: u64,
    pub region: u16,
    pub worker: u16,
    pub sequence: u16,
}

impl IdParts {
    pub fn pack(&self) -> u64 {
        ((self.timestamp & TIMESTAMP_MASK) << TIMESTAMP_SHIFT)
            | ((self.region as u64 & REGION_MASK) << REGION_SHIFT)
            | ((self.worker as u64 & WORKER_MASK) << WORKER_SHIFT)
            | (self.sequence as u64 & SEQUENCE_MASK)
    }
}

pub fn timestamp_of(id: u64) -> u64 {
    (id >> TIMESTAMP_SHIFT) & TIMESTAMP_MASK
}

pub fn region_of(id: u64) -> u16 {
    ((id >> REGION_SHIFT) & REGION_MASK) as u16
}

pub fn worker_of(id: u64) -> u16 {
    ((id >> WORKER_SHIFT) & WORKER_MASK) as u16
}

pub fn sequence_of(id: u64) -> u16 {
    (id & SEQUENCE_MASK) as u16
}

pub fn decompose(id: u64) -> IdParts {
    IdParts {
        timestamp: timestamp_of(id),
        region: region_of(id),
        worker: worker_of(id),
        sequence: sequence_of(id),
    }
}

/// Wall-clock time at which `id` was generated.
pub fn created_at(id: u64) -> Option<DateTime<Utc>> {
    let millis = i64::try_from(timestamp_of(id) + EPOCH_MILLIS).ok()?;
    DateTime::from_timestamp_millis(millis)
}

#[derive(Debug, Default)]
struct GeneratorState {
    last_timestamp: Option<u64>,
    sequence: u64,
}

/// Issues identifiers for one `(region, worker)` pair.
///
/// `last_timestamp` and `sequence` live behind a single mutex which stays held
/// for the whole call, including any spin-wait, so no two callers can observe
/// the same `(timestamp, sequence)` pair.
pub struct IdGenerator {
    region: u16,
    worker: u16,
    policy: ClockRegressionPolicy,
    clock: SharedClock,
    state: Mutex<GeneratorState>,
}

impl IdGenerator {
    /// # Errors
    ///
    /// Returns [`AppError::Configuration`] if `region > 7` or `worker > 1023`.
    pub fn new(
        region: u16,
        worker: u16,
        policy: ClockRegressionPolicy,
        clock: SharedClock,
    ) -> Result<Self, AppError> {
        if region > MAX_REGION {
            return Err(AppError::Configuration(format!(
                "region id must be between 0 and {MAX_REGION}, got {region}"
            )));
        }
        if worker > MAX_WORKER {
            return Err(AppError::Configuration(format!(
                "worker id must be between 0 and {MAX_WORKER}, got {worker}"
            )));
        }

        Ok(Self {
            region,
            worker,
            policy,
            clock,
            state: Mutex::new(GeneratorState::default()),
        })
    }

    pub fn with_system_clock(region: u16, worker: u16) -> Result<Self, AppError> {
        Self::new(
            region,
            worker,
            ClockRegressionPolicy::default(),
            std::sync::Arc::new(SystemClock),
        )
    }

    pub fn region(&self) -> u16 {
        self.region
    }

    pub fn worker(&self) -> u16 {
        self.worker
    }

    pub fn policy(&self) -> ClockRegressionPolicy {
        self.policy
    }

    /// Generates the next identifier.
    ///
    /// May busy-wait when 1024 identifiers were already issued in the current
    /// millisecond, or when the clock regressed under [`ClockRegressionPolicy::Wait`].
    ///
    /// # Errors
    ///
    /// - [`AppError::ClockMovedBackwards`] under [`ClockRegressionPolicy::Reject`]
    /// - [`AppError::Internal`] once the 41-bit timestamp range is exhausted
    pub fn generate(&self) -> Result<u64, AppError> {
        let mut state = self.state.lock();
        let mut timestamp = self.current_timestamp();

        if let Some(last) = state.last_timestamp
            && timestamp < last
        {
            match self.policy {
                ClockRegressionPolicy::Reject => {
                    return Err(AppError::ClockMovedBackwards {
                        last,
                        now: timestamp,
                    });
                }
                ClockRegressionPolicy::Wait => {
                    warn!(
                        last,
                        now = timestamp,
                        "Clock moved backwards, waiting for it to catch up"
                    );
                    timestamp = self.spin_until(move |now| now >= last);
                }
                ClockRegressionPolicy::Tolerate => {
                    warn!(
                        last,
                        now = timestamp,
                        "Clock moved backwards, resetting sequence"
                    );
                }
            }
        }

        if state.last_timestamp == Some(timestamp) {
            state.sequence = (state.sequence + 1) & SEQUENCE_MASK;
            if state.sequence == 0 {
                let exhausted = timestamp;
                timestamp = self.spin_until(move |now| now > exhausted);
            }
        } else {
            state.sequence = 0;
        }

        if timestamp > TIMESTAMP_MASK {
            return Err(AppError::internal("identifier timestamp space exhausted"));
        }

        state.last_timestamp = Some(timestamp);

        Ok(IdParts {
            timestamp,
            region: self.region,
            worker: self.worker,
            sequence: state.sequence as u16,
        }
        .pack())
    }

    fn current_timestamp(&self) -> u64 {
        self.clock.now_millis().saturating_sub(EPOCH_MILLIS)
    }

    /// Re-reads the clock until `ready` accepts it. Called with the state lock held.
    fn spin_until(&self, ready: impl Fn(u64) -> bool) -> u64 {
        loop {
            let now = self.current_timestamp();
            if ready(now) {
                return now;
            }
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::clock::ManualClock;
    use std::collections::HashSet;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    fn manual_generator(
        start: u64,
        policy: ClockRegressionPolicy,
    ) -> (IdGenerator, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(start));
        let generator = IdGenerator::new(3, 517, policy, clock.clone()).unwrap();
        (generator, clock)
    }

    #[test]
    fn test_rejects_out_of_range_region_and_worker() {
        let clock: SharedClock = Arc::new(ManualClock::new(EPOCH_MILLIS));

        assert!(matches!(
            IdGenerator::new(8, 0, ClockRegressionPolicy::Wait, clock.clone()),
            Err(AppError::Configuration(_))
        ));
        assert!(matches!(
            IdGenerator::new(0, 1024, ClockRegressionPolicy::Wait, clock.clone()),
            Err(AppError::Configuration(_))
        ));
        assert!(IdGenerator::new(7, 1023, ClockRegressionPolicy::Wait, clock).is_ok());
    }

    #[test]
    fn test_fields_round_trip_through_extractors() {
        let (generator, _clock) =
            manual_generator(EPOCH_MILLIS + 123_456, ClockRegressionPolicy::Wait);

        let first = generator.generate().unwrap();
        let second = generator.generate().unwrap();

        assert_eq!(timestamp_of(first), 123_456);
        assert_eq!(region_of(first), 3);
        assert_eq!(worker_of(first), 517);
        assert_eq!(sequence_of(first), 0);
        assert_eq!(sequence_of(second), 1);
        assert_eq!(timestamp_of(second), 123_456);
    }

    #[test]
    fn test_pack_layout() {
        let parts = IdParts {
            timestamp: 1,
            region: 1,
            worker: 1,
            sequence: 1,
        };
        assert_eq!(parts.pack(), (1 << 23) | (1 << 20) | (1 << 10) | 1);
        assert_eq!(decompose(parts.pack()), parts);
    }

    #[test]
    fn test_extractors_are_total() {
        let parts = decompose(u64::MAX);
        assert_eq!(parts.region, 7);
        assert_eq!(parts.worker, 1023);
        assert_eq!(parts.sequence, 1023);
        assert_eq!(parts.timestamp, TIMESTAMP_MASK);
    }

    #[test]
    fn test_sequence_resets_on_new_millisecond() {
        let (generator, clock) = manual_generator(EPOCH_MILLIS + 10, ClockRegressionPolicy::Wait);

        generator.generate().unwrap();
        generator.generate().unwrap();
        clock.advance(1);
        let id = generator.generate().unwrap();

        assert_eq!(sequence_of(id), 0);
        assert_eq!(timestamp_of(id), 11);
    }

    #[test]
    fn test_sequence_overflow_waits_for_next_millisecond() {
        let (generator, clock) = manual_generator(EPOCH_MILLIS + 500, ClockRegressionPolicy::Wait);

        let mut seen = HashSet::new();
        for _ in 0..1024 {
            let id = generator.generate().unwrap();
            assert_eq!(timestamp_of(id), 500);
            assert!(seen.insert(sequence_of(id)));
        }

        let ticker = clock.clone();
        let id = thread::scope(|s| {
            s.spawn(move || {
                thread::sleep(Duration::from_millis(20));
                ticker.advance(1);
            });
            generator.generate().unwrap()
        });

        assert_eq!(timestamp_of(id), 501);
        assert_eq!(sequence_of(id), 0);
    }

    #[test]
    fn test_reject_policy_errors_on_regression() {
        let (generator, clock) =
            manual_generator(EPOCH_MILLIS + 1_000, ClockRegressionPolicy::Reject);

        generator.generate().unwrap();
        clock.set(EPOCH_MILLIS + 990);

        assert!(matches!(
            generator.generate(),
            Err(AppError::ClockMovedBackwards {
                last: 1_000,
                now: 990
            })
        ));
    }

    #[test]
    fn test_wait_policy_blocks_until_clock_catches_up() {
        let (generator, clock) = manual_generator(EPOCH_MILLIS + 1_000, ClockRegressionPolicy::Wait);

        let before = generator.generate().unwrap();
        clock.set(EPOCH_MILLIS + 990);

        let ticker = clock.clone();
        let after = thread::scope(|s| {
            s.spawn(move || {
                thread::sleep(Duration::from_millis(20));
                ticker.set(EPOCH_MILLIS + 1_000);
            });
            generator.generate().unwrap()
        });

        assert!(after > before);
        assert_eq!(timestamp_of(after), 1_000);
        assert_eq!(sequence_of(after), 1);
    }

    #[test]
    fn test_tolerate_policy_resets_sequence() {
        let (generator, clock) =
            manual_generator(EPOCH_MILLIS + 1_000, ClockRegressionPolicy::Tolerate);

        generator.generate().unwrap();
        clock.set(EPOCH_MILLIS + 990);
        let id = generator.generate().unwrap();

        assert_eq!(timestamp_of(id), 990);
        assert_eq!(sequence_of(id), 0);
    }

    #[test]
    fn test_concurrent_generation_is_unique_and_ordered_per_thread() {
        let generator = Arc::new(IdGenerator::with_system_clock(1, 42).unwrap());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let generator = generator.clone();
                thread::spawn(move || {
                    let ids: Vec<u64> = (0..2_000).map(|_| generator.generate().unwrap()).collect();
                    assert!(ids.windows(2).all(|w| w[0] < w[1]));
                    assert!(
                        ids.windows(2)
                            .all(|w| timestamp_of(w[1]) >= timestamp_of(w[0]))
                    );
                    ids
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(all.len(), 16_000);
    }

    #[test]
    fn test_created_at_uses_custom_epoch() {
        let id = IdParts {
            timestamp: 0,
            region: 0,
            worker: 0,
            sequence: 0,
        }
        .pack();
        let at = created_at(id).unwrap();
        assert_eq!(at.timestamp_millis() as u64, EPOCH_MILLIS);
    }

    #[test]
    fn test_policy_parsing() {
        assert_eq!(
            "WAIT".parse::<ClockRegressionPolicy>().unwrap(),
            ClockRegressionPolicy::Wait
        );
        assert_eq!(
            "reject".parse::<ClockRegressionPolicy>().unwrap(),
            ClockRegressionPolicy::Reject
        );
        assert!("sometimes".parse::<ClockRegressionPolicy>().is_err());
    }
}
