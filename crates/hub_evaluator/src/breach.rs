//! Per-condition breach tracking.
//!
//! ```text
//! Clear --satisfied--> Breaching{since} --held for window--> Fired{since}
//!   ^                        |                                    |
//!   +------not satisfied-----+--------------not satisfied---------+
//! ```
//!
//! A condition with a zero window goes straight from `Clear` to `Fired`.
//! While satisfied, `Fired` stays `Fired` and the policy fires again on every
//! tick.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Breach state of one condition of one policy.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum BreachState {
    /// Condition not satisfied.
    #[default]
    Clear,
    /// Satisfied since `since`, window not yet elapsed.
    Breaching {
        /// First tick of the current breach.
        since: DateTime<Utc>,
    },
    /// Satisfied for at least the window.
    Fired {
        /// First tick of the current breach.
        since: DateTime<Utc>,
    },
}

impl BreachState {
    /// Advances the state with the result of one tick.
    #[must_use]
    pub fn advance(self, satisfied: bool, now: DateTime<Utc>, window: Duration) -> Self {
        if !satisfied {
            return Self::Clear;
        }
        let since = self.since().unwrap_or(now);
        if now - since >= window {
            Self::Fired { since }
        } else {
            Self::Breaching { since }
        }
    }

    /// Start of the current breach, if any.
    #[must_use]
    pub const fn since(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Clear => None,
            Self::Breaching { since } | Self::Fired { since } => Some(*since),
        }
    }

    /// Returns true once the window has elapsed.
    #[must_use]
    pub const fn is_fired(&self) -> bool {
        matches!(self, Self::Fired { .. })
    }

    /// Returns true while the condition is satisfied.
    #[must_use]
    pub const fn is_active(&self) -> bool {
        !matches!(self, Self::Clear)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    #[test]
    fn fires_once_window_elapsed() {
        let window = Duration::minutes(5);
        let mut state = BreachState::Clear;

        for minute in 0..5 {
            state = state.advance(true, at(minute), window);
            assert_eq!(state, BreachState::Breaching { since: at(0) });
        }
        state = state.advance(true, at(5), window);
        assert_eq!(state, BreachState::Fired { since: at(0) });

        state = state.advance(true, at(6), window);
        assert!(state.is_fired());
    }

    #[test]
    fn unsatisfied_tick_resets() {
        let window = Duration::minutes(5);
        let state = BreachState::Clear
            .advance(true, at(0), window)
            .advance(true, at(3), window)
            .advance(false, at(4), window);
        assert_eq!(state, BreachState::Clear);

        let state = state.advance(true, at(5), window);
        assert_eq!(state.since(), Some(at(5)));
    }

    #[test]
    fn zero_window_fires_immediately() {
        let state = BreachState::Clear.advance(true, at(0), Duration::zero());
        assert_eq!(state, BreachState::Fired { since: at(0) });
    }

    proptest! {
        #[test]
        fn fired_implies_window_held(
            ticks in proptest::collection::vec(any::<bool>(), 1..40),
            window in 0i64..10,
        ) {
            let window = Duration::minutes(window);
            let mut state = BreachState::Clear;
            let mut run_start = None;

            for (minute, satisfied) in ticks.into_iter().enumerate() {
                let now = at(i64::try_from(minute).unwrap());
                state = state.advance(satisfied, now, window);
                run_start = if satisfied { run_start.or(Some(now)) } else { None };

                prop_assert_eq!(state.since(), run_start);
                if let Some(start) = run_start {
                    prop_assert_eq!(state.is_fired(), now - start >= window);
                }
            }
        }
    }
}
