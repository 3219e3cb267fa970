// Copyright 2025 New Vector Ltd.
//
// SPDX-License-Identifier: AGPL-3.0-only
// Please see LICENSE in the repository root for full details.

//! Temporal bookkeeping for attributes scraped from remote systems.
//!
//! Each attribute keeps one current value with its validity window and the
//! time it was last confirmed, so readers can tell "this was still true at
//! `retrieved.latest`" apart from "this changed at `period.start`".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The validity window of an observed value. `end` is `None` while the value
/// is still the current truth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub start: DateTime<Utc>,
    pub end: Option<DateTime<Utc>>,
}

/// Retrieval bookkeeping for an observed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Retrieval {
    /// When the value was last confirmed by a scrape.
    pub latest: DateTime<Utc>,
}

/// An observation arrived out of order: it was captured before the latest
/// retrieval already recorded for this attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("observation captured at {captured_at} is older than the latest retrieval at {latest}")]
pub struct StaleObservation {
    pub captured_at: DateTime<Utc>,
    pub latest: DateTime<Utc>,
}

/// One externally observed attribute, with provenance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalField<T> {
    pub period: Period,
    pub retrieved: Retrieval,
    pub value: T,
}

impl<T> TemporalField<T> {
    /// Start a new field from a first observation.
    #[must_use]
    pub fn new(captured_at: DateTime<Utc>, value: T) -> Self {
        Self {
            period: Period {
                start: captured_at,
                end: None,
            },
            retrieved: Retrieval {
                latest: captured_at,
            },
            value,
        }
    }
}

impl<T: PartialEq> TemporalField<T> {
    /// Merge an observation into an optional stored field.
    ///
    /// - No stored value: the observation opens a new period.
    /// - Unchanged value: only `retrieved.latest` advances.
    /// - Changed value: the previous period is closed at `captured_at` and a
    ///   new one starts there. Only the latest period is kept.
    ///
    /// # Errors
    ///
    /// Returns [`StaleObservation`] if `captured_at` is strictly before the
    /// stored `retrieved.latest`, which indicates a clock or scrape-ordering
    /// bug on the caller side.
    pub fn record(
        slot: &mut Option<Self>,
        captured_at: DateTime<Utc>,
        value: T,
    ) -> Result<(), StaleObservation> {
        let Some(stored) = slot else {
            *slot = Some(Self::new(captured_at, value));
            return Ok(());
        };

        if captured_at < stored.retrieved.latest {
            return Err(StaleObservation {
                captured_at,
                latest: stored.retrieved.latest,
            });
        }

        if stored.value == value {
            stored.retrieved.latest = stored.retrieved.latest.max(captured_at);
        } else {
            // The closed prior period is not kept: only the latest one is.
            *stored = Self::new(captured_at, value);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;

    use super::*;
    use crate::clock::{Clock, MockClock};

    #[test]
    fn first_observation_opens_a_period() {
        let clock = MockClock::default();
        let t0 = clock.now();

        let mut slot: Option<TemporalField<u32>> = None;
        TemporalField::record(&mut slot, t0, 12).unwrap();

        let field = slot.unwrap();
        assert_eq!(field.period.start, t0);
        assert_eq!(field.period.end, None);
        assert_eq!(field.retrieved.latest, t0);
        assert_eq!(field.value, 12);
    }

    #[test]
    fn unchanged_value_only_advances_retrieval() {
        let clock = MockClock::default();
        let t1 = clock.now();
        clock.advance(Duration::hours(1));
        let t2 = clock.now();
        clock.advance(Duration::hours(1));
        let t3 = clock.now();

        let mut slot: Option<TemporalField<char>> = None;
        TemporalField::record(&mut slot, t1, 'A').unwrap();
        TemporalField::record(&mut slot, t2, 'A').unwrap();

        {
            let field = slot.as_ref().unwrap();
            assert_eq!(field.period.start, t1);
            assert_eq!(field.retrieved.latest, t2);
            assert_eq!(field.value, 'A');
        }

        // A changed value closes the period and starts over
        TemporalField::record(&mut slot, t3, 'B').unwrap();

        let field = slot.unwrap();
        assert_eq!(field.period.start, t3);
        assert_eq!(field.period.end, None);
        assert_eq!(field.retrieved.latest, t3);
        assert_eq!(field.value, 'B');
    }

    #[test]
    fn time_travel_is_rejected() {
        let clock = MockClock::default();
        let t0 = clock.now();
        clock.advance(Duration::hours(1));
        let t1 = clock.now();

        let mut slot: Option<TemporalField<u32>> = None;
        TemporalField::record(&mut slot, t1, 7).unwrap();

        let err = TemporalField::record(&mut slot, t0, 8).unwrap_err();
        assert_eq!(
            err,
            StaleObservation {
                captured_at: t0,
                latest: t1,
            }
        );

        // The stored value is left untouched
        let field = slot.unwrap();
        assert_eq!(field.value, 7);
        assert_eq!(field.retrieved.latest, t1);
    }

    #[test]
    fn same_instant_observation_is_accepted() {
        let clock = MockClock::default();
        let t0 = clock.now();

        let mut slot: Option<TemporalField<u32>> = None;
        TemporalField::record(&mut slot, t0, 1).unwrap();
        TemporalField::record(&mut slot, t0, 1).unwrap();

        let field = slot.unwrap();
        assert_eq!(field.retrieved.latest, t0);
    }
}
