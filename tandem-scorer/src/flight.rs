//! Per-key single-flight coordination.
//!
//! The first caller for a key becomes the leader and runs the computation.
//! Callers arriving while it is in flight wait for the leader's value, up
//! to a bound. A follower that times out, or whose leader panicked, computes
//! on its own instead of blocking.

use std::hash::Hash;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::Duration;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

#[derive(Debug)]
enum FlightState<V> {
    Pending,
    Done(V),
    Abandoned,
}

#[derive(Debug)]
struct Flight<V> {
    state: Mutex<FlightState<V>>,
    settled: Condvar,
}

impl<V: Clone> Flight<V> {
    const fn new() -> Self {
        Self {
            state: Mutex::new(FlightState::Pending),
            settled: Condvar::new(),
        }
    }

    fn settle(&self, state: FlightState<V>) {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner) = state;
        self.settled.notify_all();
    }

    fn wait(&self, timeout: Duration) -> Option<V> {
        let guard = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let (state, _) = self
            .settled
            .wait_timeout_while(guard, timeout, |s| matches!(s, FlightState::Pending))
            .unwrap_or_else(PoisonError::into_inner);
        match &*state {
            FlightState::Done(value) => Some(value.clone()),
            FlightState::Pending | FlightState::Abandoned => None,
        }
    }
}

/// How a [`SingleFlight::run`] call obtained its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlightOutcome<V> {
    /// This caller ran the computation for everyone.
    Led(V),
    /// This caller reused the leader's value.
    Joined(V),
    /// The leader did not deliver in time; this caller computed alone.
    Uncoordinated(V),
}

impl<V> FlightOutcome<V> {
    /// The value, however it was obtained.
    #[must_use]
    pub fn into_value(self) -> V {
        match self {
            Self::Led(value) | Self::Joined(value) | Self::Uncoordinated(value) => value,
        }
    }
}

/// Deduplicates concurrent computations of the same key.
#[derive(Debug)]
pub struct SingleFlight<K: Eq + Hash, V> {
    flights: DashMap<K, Arc<Flight<V>>>,
}

impl<K: Eq + Hash, V> Default for SingleFlight<K, V> {
    fn default() -> Self {
        Self {
            flights: DashMap::new(),
        }
    }
}

struct Leader<'a, K: Eq + Hash, V: Clone> {
    flights: &'a DashMap<K, Arc<Flight<V>>>,
    key: K,
    flight: Arc<Flight<V>>,
    finished: bool,
}

impl<K: Eq + Hash, V: Clone> Leader<'_, K, V> {
    fn finish(mut self, value: V) {
        self.flight.settle(FlightState::Done(value));
        self.finished = true;
    }
}

impl<K: Eq + Hash, V: Clone> Drop for Leader<'_, K, V> {
    fn drop(&mut self) {
        if !self.finished {
            self.flight.settle(FlightState::Abandoned);
        }
        self.flights
            .remove_if(&self.key, |_, flight| Arc::ptr_eq(flight, &self.flight));
    }
}

impl<K: Eq + Hash + Clone, V: Clone> SingleFlight<K, V> {
    /// Create an empty coordinator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `compute` for `key` unless an identical computation is in flight.
    ///
    /// Followers wait at most `timeout` for the leader.
    #[must_use]
    pub fn run<F>(&self, key: K, timeout: Duration, compute: F) -> FlightOutcome<V>
    where
        F: FnOnce() -> V,
    {
        let flight = match self.flights.entry(key.clone()) {
            Entry::Occupied(entry) => Arc::clone(entry.get()),
            Entry::Vacant(entry) => {
                let flight = Arc::new(Flight::new());
                entry.insert(Arc::clone(&flight));
                let leader = Leader {
                    flights: &self.flights,
                    key,
                    flight,
                    finished: false,
                };
                let value = compute();
                leader.finish(value.clone());
                return FlightOutcome::Led(value);
            }
        };
        if let Some(value) = flight.wait(timeout) {
            return FlightOutcome::Joined(value);
        }
        log::warn!(
            "in-flight computation did not complete within {}ms; recomputing",
            timeout.as_millis()
        );
        FlightOutcome::Uncoordinated(compute())
    }

    /// Number of keys currently being computed.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }
}
