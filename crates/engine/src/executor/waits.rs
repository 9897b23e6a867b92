//! Blocking and timed wait steps.
//!
//! Both waits share the same loop contract: ask the target to advance its
//! event loop by exactly one tick, then re-evaluate the condition
//! predicate. There is deliberately no sleeping between ticks; progress is
//! measured in target events, which keeps every wait deterministic against
//! a scripted target.

use std::time::{Duration, Instant};

use tracing::info;

use drover_types::{Condition, SleepBudget};

use crate::conditions::conditions_met;
use crate::context::{ExecContext, Scope};
use crate::error::StepError;

/// `block`: pump until the conditions hold. No timeout; a target that never
/// satisfies the conditions blocks forever, exactly like the page-ready
/// wait it models.
pub(crate) fn block(ctx: &mut ExecContext, conditions: &[Condition]) -> Result<(), StepError> {
    let browser = ctx.browser.as_mut().ok_or(StepError::BrowserNotLaunched)?;
    while !conditions_met(&ctx.windows, &**browser, conditions)? {
        browser.pump_tick()?;
    }
    Ok(())
}

/// `sleep-ms`: pump until the conditions hold or the budget elapses.
///
/// A literal budget counts wall-clock milliseconds from step entry. A named
/// budget borrows the owning repeat's counter (milliseconds) and measures
/// from that repeat's current iteration start; meeting the conditions
/// inside the budget also flags the repeat to terminate. Neither branch is
/// a failure: the step only reports which way it ended.
pub(crate) fn sleep_ms(
    ctx: &mut ExecContext,
    scope: Scope,
    conditions: &[Condition],
    time: &SleepBudget,
) -> Result<(), StepError> {
    if ctx.browser.is_none() {
        return Err(StepError::BrowserNotLaunched);
    }

    let (budget, started, linked_repeat) = match time {
        SleepBudget::Millis(ms) => (Duration::from_millis(*ms), Instant::now(), None),
        SleepBudget::FromRepeat(name) => {
            let state = ctx
                .repeats
                .get(name)
                .ok_or_else(|| StepError::UnknownRepeat { name: name.clone() })?;
            (
                Duration::from_millis(state.counter.max(0) as u64),
                state.started,
                Some(name.clone()),
            )
        }
    };

    let browser = ctx.browser.as_mut().expect("browser checked above");
    loop {
        let slept = started.elapsed();
        if conditions_met(&ctx.windows, &**browser, conditions)? {
            if let Some(name) = &linked_repeat
                && let Some(state) = ctx.repeats.get_mut(name)
            {
                state.active = false;
            }
            info!(
                depth = scope.depth(),
                elapsed_ms = slept.as_millis() as u64,
                "condition met within budget"
            );
            return Ok(());
        }
        if slept > budget {
            info!(
                depth = scope.depth(),
                budget_ms = budget.as_millis() as u64,
                "condition not met within budget"
            );
            return Ok(());
        }
        browser.pump_tick()?;
    }
}
