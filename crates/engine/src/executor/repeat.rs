//! The repeat loop controller.
//!
//! A repeat registers a named counter and runs its nested steps through the
//! dispatcher until something clears its `active` flag, in practice a
//! `sleep-ms` step elsewhere in the body that names this repeat as its
//! budget. The loop is do-while shaped: the flag is only consulted after an
//! iteration's body has fully executed. A repeat whose body never links
//! back loops forever; that is intentional plan-authoring territory, and no
//! hidden iteration bound is imposed here.

use std::time::Instant;

use tracing::{debug, info};

use drover_types::Step;

use crate::context::{ExecContext, RepeatState, Scope};
use crate::error::StepError;
use crate::target::TargetLauncher;

use super::run_step;

pub(crate) fn run_repeat(
    ctx: &mut ExecContext,
    launcher: &dyn TargetLauncher,
    scope: Scope,
    tag: &str,
    min: i64,
    step_by: i64,
    steps: &[Step],
) -> Result<(), StepError> {
    if ctx.repeats.contains_key(tag) {
        return Err(StepError::DuplicateRepeat { tag: tag.to_string() });
    }
    ctx.repeats.insert(
        tag.to_string(),
        RepeatState {
            counter: min,
            step: step_by,
            started: Instant::now(),
            active: true,
        },
    );

    let mut iterations = 0u64;
    loop {
        let state = ctx.repeats.get_mut(tag).expect("repeat state registered above");
        state.started = Instant::now();
        iterations += 1;

        let child = scope.child();
        for nested in steps {
            run_step(ctx, launcher, child, nested)?;
        }

        let state = ctx.repeats.get_mut(tag).expect("repeat state registered above");
        state.counter += state.step;
        if !state.active {
            break;
        }
        debug!(repeat = tag, iterations, counter = state.counter, "repeat continues");
    }

    info!(depth = scope.depth(), repeat = tag, iterations, "repeat finished");
    Ok(())
}
