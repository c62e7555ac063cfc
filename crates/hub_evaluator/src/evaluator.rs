//! Tick evaluation of a policy set.

use crate::breach::BreachState;
use crate::condition::Predicate;
use crate::error::{ConditionError, Error, Result};
use crate::report::{ConditionFault, FiringEvent, PolicyOutcome, PolicyStatus, TickReport};
use crate::snapshot::MetricSnapshot;
use crate::store::{BreachKey, BreachStore};
use hub_policy::{MatchMode, Policy, PolicySet, PolicyType};
use tracing::{debug, trace, warn};

/// Evaluates policy sets against metric snapshots.
///
/// The evaluator is stateless. Everything that must survive between ticks
/// lives in the [`BreachStore`] passed to [`Evaluator::evaluate`], so
/// evaluating the same snapshot against two copies of the same store gives
/// the same report.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

#[allow(clippy::unused_self)]
impl Evaluator {
    /// Creates an evaluator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Evaluates every policy of `set` against `snapshot`.
    ///
    /// Policies run in execution order. A policy that cannot be evaluated
    /// reports an error status without affecting the others. States of
    /// policies no longer in `set` are dropped from `store`.
    pub fn evaluate<S>(&self, set: &PolicySet, snapshot: &MetricSnapshot, store: &mut S) -> TickReport
    where
        S: BreachStore + ?Sized,
    {
        store.retain_policies(&|id| set.contains(id));

        let mut report = TickReport::new(snapshot.timestamp);
        for policy in set.ordered() {
            let (status, event) = evaluate_policy(policy, snapshot, store);

            if status.is_error() {
                warn!(
                    policy = %policy.id,
                    faults = status.faults().len(),
                    "policy could not be evaluated"
                );
            }
            if let Some(event) = event {
                debug!(policy = %policy.id, policy_type = %policy.kind(), "policy fired");
                report.events.push(event);
            }
            report.outcomes.push(PolicyOutcome {
                policy_id: policy.id.clone(),
                policy_type: policy.kind(),
                status,
            });
        }

        store.record_tick(snapshot.timestamp);
        debug!(
            timestamp = %snapshot.timestamp,
            policies = report.outcomes.len(),
            fired = report.events.len(),
            "tick evaluated"
        );
        report
    }

    /// Like [`Evaluator::evaluate`], but rejects snapshots older than the
    /// last tick recorded in `store`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StaleSnapshot`] if the snapshot predates the last tick.
    pub fn evaluate_in_order<S>(
        &self,
        set: &PolicySet,
        snapshot: &MetricSnapshot,
        store: &mut S,
    ) -> Result<TickReport>
    where
        S: BreachStore + ?Sized,
    {
        if let Some(last) = store.last_tick() {
            if snapshot.timestamp < last {
                return Err(Error::StaleSnapshot {
                    snapshot: snapshot.timestamp,
                    last,
                });
            }
        }
        Ok(self.evaluate(set, snapshot, store))
    }
}

/// Compiles every condition of a policy.
///
/// # Errors
///
/// Returns the faults of every condition that does not compile, or
/// [`ConditionError::NoConditions`] for a monitoring policy without conditions.
pub fn compile_policy(policy: &Policy) -> std::result::Result<Vec<Predicate>, Vec<ConditionFault>> {
    if policy.conditions.is_empty() && policy.kind() == PolicyType::Monitoring {
        return Err(vec![ConditionFault {
            condition: None,
            error: ConditionError::NoConditions,
        }]);
    }

    let mut predicates = Vec::with_capacity(policy.conditions.len());
    let mut faults = Vec::new();
    for (index, condition) in policy.conditions.iter().enumerate() {
        match Predicate::compile(condition) {
            Ok(predicate) => predicates.push(predicate),
            Err(error) => faults.push(ConditionFault {
                condition: Some(index),
                error,
            }),
        }
    }

    if faults.is_empty() {
        Ok(predicates)
    } else {
        Err(faults)
    }
}

fn evaluate_policy<S>(
    policy: &Policy,
    snapshot: &MetricSnapshot,
    store: &mut S,
) -> (PolicyStatus, Option<FiringEvent>)
where
    S: BreachStore + ?Sized,
{
    if !policy.enabled {
        store.clear_policy(&policy.id);
        return (PolicyStatus::Disabled, None);
    }

    let predicates = match compile_policy(policy) {
        Ok(predicates) => predicates,
        Err(faults) => {
            store.clear_policy(&policy.id);
            return (PolicyStatus::ConfigError { faults }, None);
        }
    };

    // No conditions on a non-monitoring policy: applies on every tick.
    if predicates.is_empty() {
        return (PolicyStatus::Firing, Some(firing_event(policy, snapshot)));
    }

    let mut satisfied = Vec::with_capacity(predicates.len());
    let mut faults = Vec::new();
    for (index, predicate) in predicates.iter().enumerate() {
        match snapshot.get(predicate.metric()) {
            None => {
                trace!(policy = %policy.id, metric = %predicate.metric(), "metric missing from snapshot");
                satisfied.push(false);
            }
            Some(sample) => match predicate.test(sample) {
                Ok(hit) => satisfied.push(hit),
                Err(error) => faults.push(ConditionFault {
                    condition: Some(index),
                    error,
                }),
            },
        }
    }

    if !faults.is_empty() {
        store.clear_policy(&policy.id);
        return (PolicyStatus::EvaluationError { faults }, None);
    }

    let mut states = Vec::with_capacity(predicates.len());
    for (index, (predicate, hit)) in predicates.iter().zip(satisfied).enumerate() {
        let key = BreachKey::new(policy.id.clone(), index);
        let state = store
            .get(&key)
            .advance(hit, snapshot.timestamp, predicate.window());
        store.set(key, state);
        states.push(state);
    }

    let fired = match policy.match_mode {
        MatchMode::All => states.iter().all(BreachState::is_fired),
        MatchMode::Any => states.iter().any(BreachState::is_fired),
    };

    if fired {
        (PolicyStatus::Firing, Some(firing_event(policy, snapshot)))
    } else if states.iter().any(BreachState::is_active) {
        (PolicyStatus::Breaching, None)
    } else {
        (PolicyStatus::Idle, None)
    }
}

fn firing_event(policy: &Policy, snapshot: &MetricSnapshot) -> FiringEvent {
    FiringEvent {
        policy_id: policy.id.clone(),
        policy_name: policy.name.clone(),
        policy_type: policy.kind(),
        severity: policy.severity(),
        timestamp: snapshot.timestamp,
        channels: policy.channels.clone(),
        config: policy.config.clone(),
    }
}
