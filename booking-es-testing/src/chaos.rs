//! Fault injection for event stores.
//!
//! [`ChaosEventStore`] wraps any [`EventStore`] and, with configured
//! probabilities, fails operations or reports version conflicts before the
//! inner store sees them.

use std::{future::Future, sync::Mutex};

use booking_es_types::{
    EventStore, EventStoreError, EventStreamReader, EventStreamSlice, ExpectedVersion, Operation,
    StreamId, StreamVersion, StreamWrites,
};
use nutype::nutype;
use rand::{Rng, SeedableRng, random, rngs::StdRng};

/// Probability value for chaos engineering injection rates.
///
/// Probability represents a value in the range [0.0, 1.0] where 0.0 means
/// never inject failures and 1.0 means always inject failures.
///
/// # Examples
///
/// ```ignore
/// use booking_es_testing::chaos::Probability;
///
/// let never = Probability::try_new(0.0).unwrap();
/// let always = Probability::try_new(1.0).unwrap();
///
/// // Values outside [0.0, 1.0] are rejected
/// assert!(Probability::try_new(1.5).is_err());
/// ```
#[nutype(
    validate(greater_or_equal = 0.0, less_or_equal = 1.0),
    derive(Debug, Clone, Copy, PartialEq, PartialOrd, Display, Into)
)]
pub struct Probability(f32);

/// How often a [`ChaosEventStore`] misbehaves.
#[derive(Debug, Clone)]
pub struct ChaosConfig {
    deterministic_seed: Option<u64>,
    failure_probability: Probability,
    version_conflict_probability: Probability,
}

impl ChaosConfig {
    /// A configuration whose random decisions repeat from run to run.
    pub fn deterministic() -> Self {
        Self {
            deterministic_seed: Some(0),
            ..Self::default()
        }
    }

    /// Chance that an operation fails with [`EventStoreError::StoreFailure`].
    /// Clamped to [0.0, 1.0].
    #[must_use]
    pub fn with_failure_probability(mut self, probability: f32) -> Self {
        self.failure_probability = Probability::try_new(probability.clamp(0.0, 1.0))
            .expect("clamped value is always valid");
        self
    }

    /// Chance that an append fails with [`EventStoreError::VersionConflict`].
    /// Clamped to [0.0, 1.0].
    #[must_use]
    pub fn with_version_conflict_probability(mut self, probability: f32) -> Self {
        self.version_conflict_probability = Probability::try_new(probability.clamp(0.0, 1.0))
            .expect("clamped value is always valid");
        self
    }
}

impl Default for ChaosConfig {
    fn default() -> Self {
        Self {
            deterministic_seed: None,
            failure_probability: Probability::try_new(0.0).expect("0.0 is valid probability"),
            version_conflict_probability: Probability::try_new(0.0)
                .expect("0.0 is valid probability"),
        }
    }
}

/// Wraps any store in a [`ChaosEventStore`].
pub trait ChaosEventStoreExt: Sized {
    /// Wrap `self` with the given chaos configuration.
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventStore<Self>;
}

/// An event store that randomly fails before delegating to the wrapped one.
///
/// Injected failures never reach the wrapped store, so nothing is written
/// when an append is failed.
#[derive(Debug)]
pub struct ChaosEventStore<S> {
    store: S,
    config: ChaosConfig,
    rng: Mutex<StdRng>,
}

impl<S> ChaosEventStore<S> {
    /// Wrap `store`.
    pub fn new(store: S, config: ChaosConfig) -> Self {
        let rng = match config.deterministic_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::seed_from_u64(random()),
        };

        Self {
            store,
            config,
            rng: Mutex::new(rng),
        }
    }

    /// The wrapped store, for inspecting what actually got written.
    pub fn inner(&self) -> &S {
        &self.store
    }

    fn should_inject(&self, probability: Probability) -> bool {
        let prob_f32: f32 = probability.into();

        if prob_f32 <= 0.0 {
            return false;
        }

        if prob_f32 >= 1.0 {
            return true;
        }

        let mut rng = self
            .rng
            .lock()
            .expect("chaos RNG mutex should not be poisoned");

        rng.random_bool(f64::from(prob_f32))
    }
}

/// A conflict reported against the first registered stream, as if another
/// writer had appended one event after the caller's read.
fn injected_conflict(writes: &StreamWrites) -> EventStoreError {
    match writes.expected_versions().iter().next() {
        Some((stream_id, expected)) => {
            let actual = match expected {
                ExpectedVersion::Exact(version) => version.increment(),
                ExpectedVersion::Any => StreamVersion::new(0),
            };

            EventStoreError::VersionConflict {
                stream_id: stream_id.clone(),
                expected: *expected,
                actual,
            }
        }
        None => EventStoreError::StoreFailure {
            operation: Operation::AppendEvents,
        },
    }
}

impl<S> EventStore for ChaosEventStore<S>
where
    S: EventStore + Sync,
{
    fn read_stream(
        &self,
        stream_id: StreamId,
    ) -> impl Future<Output = Result<EventStreamReader, EventStoreError>> + Send {
        let should_fail = self.should_inject(self.config.failure_probability);
        let store = &self.store;

        async move {
            if should_fail {
                return Err(EventStoreError::StoreFailure {
                    operation: Operation::ReadStream,
                });
            }

            store.read_stream(stream_id).await
        }
    }

    fn append_events(
        &self,
        writes: StreamWrites,
    ) -> impl Future<Output = Result<EventStreamSlice, EventStoreError>> + Send {
        let conflict = self
            .should_inject(self.config.version_conflict_probability)
            .then(|| injected_conflict(&writes));
        let should_fail = self.should_inject(self.config.failure_probability);
        let store = &self.store;

        async move {
            if let Some(conflict) = conflict {
                return Err(conflict);
            }

            if should_fail {
                return Err(EventStoreError::StoreFailure {
                    operation: Operation::AppendEvents,
                });
            }

            store.append_events(writes).await
        }
    }
}

impl<S> ChaosEventStoreExt for S
where
    S: EventStore + Sync,
{
    fn with_chaos(self, config: ChaosConfig) -> ChaosEventStore<Self> {
        ChaosEventStore::new(self, config)
    }
}
