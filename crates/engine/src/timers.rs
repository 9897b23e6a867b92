//! Named stopwatches and the ordering assertion between them.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use drover_types::{TimerComparison, TimerOp};

use crate::error::StepError;

#[derive(Debug, Clone)]
struct Timer {
    started: Instant,
    taken: Option<Duration>,
}

/// Registry of named stopwatches. A name is started at most once and
/// stopped at most once; only stopped timers can be compared.
#[derive(Debug, Default)]
pub struct TimerRegistry {
    timers: HashMap<String, Timer>,
}

impl TimerRegistry {
    /// Start a stopwatch. Fails if the name is already taken.
    pub fn start(&mut self, name: &str) -> Result<(), StepError> {
        if self.timers.contains_key(name) {
            return Err(StepError::DuplicateTimer { name: name.to_string() });
        }
        self.timers.insert(
            name.to_string(),
            Timer {
                started: Instant::now(),
                taken: None,
            },
        );
        Ok(())
    }

    /// Stop a running stopwatch and record its elapsed time.
    pub fn stop(&mut self, name: &str) -> Result<Duration, StepError> {
        let timer = self
            .timers
            .get_mut(name)
            .ok_or_else(|| StepError::UnknownTimer { name: name.to_string() })?;
        if timer.taken.is_some() {
            return Err(StepError::TimerAlreadyStopped { name: name.to_string() });
        }
        let taken = timer.started.elapsed();
        timer.taken = Some(taken);
        Ok(taken)
    }

    /// Assert an ordering between two stopped timers. A violated comparison
    /// is the test verdict, not a query result.
    pub fn check(&self, comparison: &TimerComparison) -> Result<(), StepError> {
        let left_taken = self.taken(&comparison.left)?;
        let right_taken = self.taken(&comparison.right)?;

        let holds = match comparison.op {
            TimerOp::Less => left_taken < right_taken,
            TimerOp::Greater => left_taken > right_taken,
        };
        if !holds {
            return Err(StepError::TimerOrderViolation {
                left: comparison.left.clone(),
                left_taken,
                op: comparison.op,
                right: comparison.right.clone(),
                right_taken,
            });
        }
        Ok(())
    }

    fn taken(&self, name: &str) -> Result<Duration, StepError> {
        let timer = self
            .timers
            .get(name)
            .ok_or_else(|| StepError::UnknownTimer { name: name.to_string() })?;
        timer
            .taken
            .ok_or_else(|| StepError::TimerStillRunning { name: name.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    fn stopped(registry: &mut TimerRegistry, name: &str, busy: Duration) -> Duration {
        registry.start(name).expect("start");
        thread::sleep(busy);
        registry.stop(name).expect("stop")
    }

    #[test]
    fn start_twice_is_a_duplicate() {
        let mut registry = TimerRegistry::default();
        registry.start("t1").unwrap();
        assert!(matches!(registry.start("t1"), Err(StepError::DuplicateTimer { .. })));
    }

    #[test]
    fn stop_requires_a_started_timer_and_happens_once() {
        let mut registry = TimerRegistry::default();
        assert!(matches!(registry.stop("t1"), Err(StepError::UnknownTimer { .. })));

        registry.start("t1").unwrap();
        registry.stop("t1").unwrap();
        assert!(matches!(registry.stop("t1"), Err(StepError::TimerAlreadyStopped { .. })));
    }

    #[test]
    fn check_orders_recorded_elapsed_times() {
        let mut registry = TimerRegistry::default();
        let slow = stopped(&mut registry, "slow", Duration::from_millis(30));
        let fast = stopped(&mut registry, "fast", Duration::from_millis(5));
        assert!(slow > fast);

        let comparison: TimerComparison = "fast < slow".parse().expect("expression");
        registry.check(&comparison).expect("fast < slow holds");

        let reversed: TimerComparison = "fast > slow".parse().expect("expression");
        let error = registry.check(&reversed).expect_err("fast > slow fails");
        assert!(matches!(error, StepError::TimerOrderViolation { .. }));
    }

    #[test]
    fn check_rejects_missing_or_running_timers() {
        let mut registry = TimerRegistry::default();
        let comparison: TimerComparison = "a < b".parse().expect("expression");
        assert!(matches!(registry.check(&comparison), Err(StepError::UnknownTimer { .. })));

        registry.start("a").unwrap();
        registry.start("b").unwrap();
        assert!(matches!(registry.check(&comparison), Err(StepError::TimerStillRunning { .. })));
    }
}
