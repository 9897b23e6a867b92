//! Plan walker and step dispatcher.
//!
//! `run_plan` owns the top of the run: it walks the plan's steps in order
//! and hands each one to `run_step`, which matches exhaustively over the
//! closed action vocabulary and calls the matching handler. Handlers mutate
//! the [`ExecContext`] in place and reach the target only through its
//! facade trait, so the whole executor runs unchanged against a scripted
//! target in tests.

use std::time::{Duration, Instant};

use tracing::info;

use drover_types::{Plan, PlotAssertion, Step, TimerComparison};

use crate::context::{ExecContext, Scope};
use crate::error::StepError;
use crate::target::{PlotCommand, TargetLauncher};

mod repeat;
mod waits;

/// How long `window-close` keeps pumping for the death notification before
/// the liveness assertion fires.
const WINDOW_DEATH_WAIT: Duration = Duration::from_secs(1);

/// Execute a whole plan against a fresh context.
pub fn run_plan(plan: &Plan, ctx: &mut ExecContext, launcher: &dyn TargetLauncher) -> Result<(), StepError> {
    info!(group = %plan.group, title = %plan.title, "running test plan");
    for step in &plan.steps {
        run_step(ctx, launcher, Scope::root(), step)?;
    }
    Ok(())
}

/// Execute a single step. Recursion point for nested repeat bodies.
pub fn run_step(
    ctx: &mut ExecContext,
    launcher: &dyn TargetLauncher,
    scope: Scope,
    step: &Step,
) -> Result<(), StepError> {
    info!(depth = scope.depth(), action = step.action_name(), "running step");
    match step {
        Step::Launch => launch(ctx, launcher),
        Step::WindowNew { tag, url } => window_new(ctx, tag, url.as_deref()),
        Step::WindowClose { window } => window_close(ctx, window),
        Step::Navigate { window, url } => navigate(ctx, scope, window, url),
        Step::SleepMs { conditions, time } => waits::sleep_ms(ctx, scope, conditions, time),
        Step::Block { conditions } => waits::block(ctx, conditions),
        Step::Repeat { tag, min, step, steps } => repeat::run_repeat(ctx, launcher, scope, tag, *min, *step, steps),
        Step::TimerStart { tag } => {
            ensure_browser(ctx)?;
            ctx.timers.start(tag)
        }
        Step::TimerStop { timer } => timer_stop(ctx, scope, timer),
        Step::TimerCheck { condition } => timer_check(ctx, condition),
        Step::PlotCheck { window, checks } => plot_check(ctx, window, checks),
        Step::Quit => quit(ctx),
    }
}

fn ensure_browser(ctx: &ExecContext) -> Result<(), StepError> {
    if ctx.browser.is_none() {
        return Err(StepError::BrowserNotLaunched);
    }
    Ok(())
}

fn launch(ctx: &mut ExecContext, launcher: &dyn TargetLauncher) -> Result<(), StepError> {
    if ctx.browser.is_some() {
        return Err(StepError::BrowserAlreadyLaunched);
    }
    ctx.browser = Some(launcher.launch(&ctx.target_path)?);
    ctx.windows.clear();
    Ok(())
}

fn window_new(ctx: &mut ExecContext, tag: &str, url: Option<&str>) -> Result<(), StepError> {
    ensure_browser(ctx)?;
    if ctx.windows.contains_key(tag) {
        return Err(StepError::DuplicateWindowTag { tag: tag.to_string() });
    }
    let browser = ctx.browser.as_mut().expect("browser checked above");
    let id = browser.new_window(url)?;
    ctx.windows.insert(tag.to_string(), id);
    Ok(())
}

fn window_close(ctx: &mut ExecContext, tag: &str) -> Result<(), StepError> {
    ensure_browser(ctx)?;
    let id = ctx
        .windows
        .shift_remove(tag)
        .ok_or_else(|| StepError::UnknownWindowTag { tag: tag.to_string() })?;

    let browser = ctx.browser.as_mut().expect("browser checked above");
    browser.kill_window(id)?;

    let deadline = Instant::now() + WINDOW_DEATH_WAIT;
    while browser.window_state(id).alive && Instant::now() < deadline {
        browser.pump_tick()?;
    }
    if browser.window_state(id).alive {
        return Err(StepError::WindowStillAlive { tag: tag.to_string() });
    }
    Ok(())
}

fn navigate(ctx: &mut ExecContext, scope: Scope, tag: &str, url: &str) -> Result<(), StepError> {
    ensure_browser(ctx)?;
    let id = *ctx
        .windows
        .get(tag)
        .ok_or_else(|| StepError::UnknownWindowTag { tag: tag.to_string() })?;
    info!(depth = scope.depth(), window = tag, url, "navigating");
    let browser = ctx.browser.as_mut().expect("browser checked above");
    browser.navigate(id, url)?;
    Ok(())
}

fn timer_stop(ctx: &mut ExecContext, scope: Scope, name: &str) -> Result<(), StepError> {
    ensure_browser(ctx)?;
    let taken = ctx.timers.stop(name)?;
    info!(
        depth = scope.depth(),
        timer = name,
        taken_ms = taken.as_millis() as u64,
        "timer stopped"
    );
    Ok(())
}

fn timer_check(ctx: &ExecContext, expression: &str) -> Result<(), StepError> {
    ensure_browser(ctx)?;
    let comparison: TimerComparison = expression
        .parse()
        .map_err(|reason| StepError::MalformedTimerCheck { reason })?;
    ctx.timers.check(&comparison)
}

fn plot_check(ctx: &mut ExecContext, tag: &str, checks: &[PlotAssertion]) -> Result<(), StepError> {
    ensure_browser(ctx)?;
    let id = *ctx
        .windows
        .get(tag)
        .ok_or_else(|| StepError::UnknownWindowTag { tag: tag.to_string() })?;
    let browser = ctx.browser.as_mut().expect("browser checked above");
    let plots = browser.redraw(id)?;

    let mut fragments: Vec<String> = Vec::new();
    let mut bitmaps = 0usize;
    for plot in plots {
        match plot {
            PlotCommand::Text { text, .. } => fragments.push(text),
            PlotCommand::Bitmap { .. } => bitmaps += 1,
        }
    }
    let text = fragments.join(" ");

    for check in checks {
        match check {
            PlotAssertion::TextContains(needle) => {
                info!(needle = %needle, text = %text, "checking redraw text");
                if !text.contains(needle) {
                    return Err(StepError::TextNotFound {
                        needle: needle.clone(),
                        haystack: text,
                    });
                }
            }
            PlotAssertion::BitmapCount(expected) => {
                if bitmaps != *expected {
                    return Err(StepError::BitmapCountMismatch {
                        expected: *expected,
                        actual: bitmaps,
                    });
                }
            }
        }
    }
    Ok(())
}

fn quit(ctx: &mut ExecContext) -> Result<(), StepError> {
    let mut browser = ctx.browser.take().ok_or(StepError::BrowserNotLaunched)?;
    ctx.windows.clear();
    if !browser.quit_and_wait()? {
        return Err(StepError::QuitNotConfirmed);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    use drover_types::{Condition, ConditionStatus, SleepBudget, WindowSelector};

    use crate::target::{ScriptedLauncher, ScriptedTarget, TickEffect, WindowId};

    fn complete(tag: &str) -> Condition {
        Condition {
            window: WindowSelector::Tag(tag.to_string()),
            status: ConditionStatus::Complete,
        }
    }

    fn run(steps: Vec<Step>, target: ScriptedTarget) -> (ExecContext, Result<(), StepError>) {
        let launcher = ScriptedLauncher::new(target);
        let mut ctx = ExecContext::new("/opt/fake-target");
        let plan = Plan {
            group: "executor-tests".into(),
            title: "scripted run".into(),
            steps,
        };
        let result = run_plan(&plan, &mut ctx, &launcher);
        (ctx, result)
    }

    #[test]
    fn smoke_scenario_pumps_until_ready_then_checks_text_and_quits() {
        let mut target = ScriptedTarget::with_script([
            TickEffect::Idle,
            TickEffect::Idle,
            TickEffect::StopThrobber(WindowId(1)),
        ]);
        target.stage_plots(
            WindowId(1),
            vec![
                PlotCommand::Text {
                    x: 0,
                    y: 12,
                    text: "Hello from the target".into(),
                },
                PlotCommand::Bitmap {
                    x: 0,
                    y: 40,
                    width: 16,
                    height: 16,
                },
            ],
        );

        let (ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: Some("http://x/".into()),
                },
                Step::Block {
                    conditions: vec![complete("w1")],
                },
                Step::PlotCheck {
                    window: "w1".into(),
                    checks: vec![PlotAssertion::TextContains("Hello".into()), PlotAssertion::BitmapCount(1)],
                },
                Step::Quit,
            ],
            target,
        );

        result.expect("plan should pass");
        assert!(ctx.browser.is_none(), "quit must take the browser handle");
        assert!(ctx.windows.is_empty());
    }

    #[test]
    fn steps_before_launch_are_rejected() {
        let (_ctx, result) = run(
            vec![Step::WindowNew {
                tag: "w1".into(),
                url: None,
            }],
            ScriptedTarget::new(),
        );
        assert!(matches!(result, Err(StepError::BrowserNotLaunched)));
    }

    #[test]
    fn launching_twice_is_rejected() {
        let (_ctx, result) = run(vec![Step::Launch, Step::Launch], ScriptedTarget::new());
        assert!(matches!(result, Err(StepError::BrowserAlreadyLaunched)));
    }

    #[test]
    fn duplicate_window_tags_are_rejected() {
        let (_ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: None,
                },
                Step::WindowNew {
                    tag: "w1".into(),
                    url: None,
                },
            ],
            ScriptedTarget::new(),
        );
        assert!(matches!(result, Err(StepError::DuplicateWindowTag { .. })));
    }

    #[test]
    fn navigate_and_close_require_a_known_tag() {
        let (_ctx, navigate_result) = run(
            vec![
                Step::Launch,
                Step::Navigate {
                    window: "ghost".into(),
                    url: "http://x/".into(),
                },
            ],
            ScriptedTarget::new(),
        );
        assert!(matches!(navigate_result, Err(StepError::UnknownWindowTag { .. })));

        let (_ctx, close_result) = run(
            vec![
                Step::Launch,
                Step::WindowClose {
                    window: "ghost".into(),
                },
            ],
            ScriptedTarget::new(),
        );
        assert!(matches!(close_result, Err(StepError::UnknownWindowTag { .. })));
    }

    #[test]
    fn window_close_removes_the_tag_once_the_window_dies() {
        let (ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: None,
                },
                Step::WindowClose { window: "w1".into() },
            ],
            ScriptedTarget::new(),
        );
        result.expect("close should succeed");
        assert!(ctx.windows.is_empty());
    }

    #[test]
    fn window_that_never_dies_fails_the_liveness_assertion() {
        let mut target = ScriptedTarget::new();
        target.ignore_kill();
        let (_ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: None,
                },
                Step::WindowClose { window: "w1".into() },
            ],
            target,
        );
        assert!(matches!(result, Err(StepError::WindowStillAlive { .. })));
    }

    #[test]
    fn plot_check_reports_missing_text_with_the_haystack() {
        let mut target = ScriptedTarget::with_script([TickEffect::StopThrobber(WindowId(1))]);
        target.stage_plots(
            WindowId(1),
            vec![PlotCommand::Text {
                x: 0,
                y: 0,
                text: "something else entirely".into(),
            }],
        );
        let (_ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: Some("http://x/".into()),
                },
                Step::Block {
                    conditions: vec![complete("w1")],
                },
                Step::PlotCheck {
                    window: "w1".into(),
                    checks: vec![PlotAssertion::TextContains("Loaded".into())],
                },
            ],
            target,
        );
        let Err(StepError::TextNotFound { needle, haystack }) = result else {
            panic!("expected TextNotFound, got {result:?}");
        };
        assert_eq!(needle, "Loaded");
        assert!(haystack.contains("something else"));
    }

    #[test]
    fn plot_check_counts_bitmaps_exactly() {
        let bitmap = PlotCommand::Bitmap {
            x: 0,
            y: 0,
            width: 8,
            height: 8,
        };
        let mut target = ScriptedTarget::new();
        target.stage_plots(WindowId(1), vec![bitmap.clone(), bitmap]);

        let (_ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: None,
                },
                Step::PlotCheck {
                    window: "w1".into(),
                    checks: vec![PlotAssertion::BitmapCount(2)],
                },
                Step::PlotCheck {
                    window: "w1".into(),
                    checks: vec![PlotAssertion::BitmapCount(3)],
                },
            ],
            target,
        );
        let Err(StepError::BitmapCountMismatch { expected, actual }) = result else {
            panic!("expected BitmapCountMismatch, got {result:?}");
        };
        assert_eq!(expected, 3);
        assert_eq!(actual, 2);
    }

    #[test]
    fn named_sleep_terminates_its_repeat_when_the_condition_lands_in_budget() {
        let target = ScriptedTarget::with_script([TickEffect::Idle, TickEffect::StopThrobber(WindowId(1))]);
        let (ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: Some("http://x/".into()),
                },
                Step::Repeat {
                    tag: "poll".into(),
                    min: 500,
                    step: 100,
                    steps: vec![Step::SleepMs {
                        conditions: vec![complete("w1")],
                        time: SleepBudget::FromRepeat("poll".into()),
                    }],
                },
            ],
            target,
        );

        result.expect("repeat should terminate via the linked sleep");
        let state = ctx.repeats.get("poll").expect("repeat state survives the loop");
        assert!(!state.active);
        // One iteration: counter advanced exactly once.
        assert_eq!(state.counter, 600);
    }

    #[test]
    fn reusing_a_repeat_tag_is_rejected() {
        // The first repeat terminates on the first iteration; its state
        // stays registered, so the second repeat with the same tag fails.
        let poll_once = |window: &str| Step::Repeat {
            tag: "poll".into(),
            min: 200,
            step: 50,
            steps: vec![Step::SleepMs {
                conditions: vec![complete(window)],
                time: SleepBudget::FromRepeat("poll".into()),
            }],
        };
        let target = ScriptedTarget::with_script([TickEffect::StopThrobber(WindowId(1))]);
        let (_ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: Some("http://x/".into()),
                },
                poll_once("w1"),
                poll_once("w1"),
            ],
            target,
        );
        assert!(matches!(result, Err(StepError::DuplicateRepeat { .. })));
    }

    #[test]
    fn literal_sleep_gives_up_when_the_budget_elapses() {
        // No scripted effect ever stops the throbber; the sleep must end on
        // its own without failing the run.
        let target = ScriptedTarget::new();
        let (ctx, result) = run(
            vec![
                Step::Launch,
                Step::WindowNew {
                    tag: "w1".into(),
                    url: Some("http://x/".into()),
                },
                Step::SleepMs {
                    conditions: vec![complete("w1")],
                    time: SleepBudget::Millis(25),
                },
            ],
            target,
        );
        result.expect("sleep-ms never fails");
        let browser = ctx.browser.as_ref().expect("browser still running");
        assert!(browser.window_state(WindowId(1)).throbbing);
    }

    #[test]
    fn sleep_naming_an_unknown_repeat_is_rejected() {
        let (_ctx, result) = run(
            vec![
                Step::Launch,
                Step::SleepMs {
                    conditions: vec![],
                    time: SleepBudget::FromRepeat("ghost".into()),
                },
            ],
            ScriptedTarget::new(),
        );
        assert!(matches!(result, Err(StepError::UnknownRepeat { .. })));
    }

    #[test]
    fn timer_scenario_orders_two_measured_intervals() {
        let launcher = ScriptedLauncher::new(ScriptedTarget::new());
        let mut ctx = ExecContext::new("/opt/fake-target");
        let scope = Scope::root();

        run_step(&mut ctx, &launcher, scope, &Step::Launch).unwrap();
        run_step(&mut ctx, &launcher, scope, &Step::TimerStart { tag: "t1".into() }).unwrap();
        thread::sleep(Duration::from_millis(25));
        run_step(&mut ctx, &launcher, scope, &Step::TimerStop { timer: "t1".into() }).unwrap();
        run_step(&mut ctx, &launcher, scope, &Step::TimerStart { tag: "t2".into() }).unwrap();
        thread::sleep(Duration::from_millis(2));
        run_step(&mut ctx, &launcher, scope, &Step::TimerStop { timer: "t2".into() }).unwrap();

        run_step(
            &mut ctx,
            &launcher,
            scope,
            &Step::TimerCheck {
                condition: "t1 > t2".into(),
            },
        )
        .expect("t1 measured the longer interval");

        let error = run_step(
            &mut ctx,
            &launcher,
            scope,
            &Step::TimerCheck {
                condition: "t1 < t2".into(),
            },
        )
        .expect_err("reversed comparison fails");
        assert!(matches!(error, StepError::TimerOrderViolation { .. }));
    }

    #[test]
    fn unconfirmed_shutdown_is_fatal() {
        let mut target = ScriptedTarget::new();
        target.refuse_quit();
        let (ctx, result) = run(vec![Step::Launch, Step::Quit], target);
        assert!(matches!(result, Err(StepError::QuitNotConfirmed)));
        assert!(ctx.browser.is_none());
    }

    #[test]
    fn quit_without_a_browser_is_rejected() {
        let (_ctx, result) = run(vec![Step::Quit], ScriptedTarget::new());
        assert!(matches!(result, Err(StepError::BrowserNotLaunched)));
    }
}
