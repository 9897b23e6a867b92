//! The condition evaluator used by every blocking construct.
//!
//! A condition pairs a window selector with a required status; the only
//! status in the vocabulary, `complete`, holds when the selected window has
//! stopped throbbing. The predicate is the conjunction over all supplied
//! conditions and is pure with respect to window state: without an
//! intervening tick it always returns the same answer.

use indexmap::IndexMap;

use drover_types::{Condition, WindowSelector};

use crate::error::StepError;
use crate::target::{Target, WindowId};

/// True iff every supplied condition holds for the current window states.
///
/// A concrete tag that is not in the window map is a precondition error;
/// the wildcard over an empty map is trivially satisfied.
pub fn conditions_met(
    windows: &IndexMap<String, WindowId>,
    target: &dyn Target,
    conditions: &[Condition],
) -> Result<bool, StepError> {
    for condition in conditions {
        match &condition.window {
            WindowSelector::All => {
                for id in windows.values() {
                    if target.window_state(*id).throbbing {
                        return Ok(false);
                    }
                }
            }
            WindowSelector::Tag(tag) => {
                let id = windows
                    .get(tag)
                    .ok_or_else(|| StepError::UnknownWindowTag { tag: tag.clone() })?;
                if target.window_state(*id).throbbing {
                    return Ok(false);
                }
            }
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drover_types::ConditionStatus;

    use crate::target::ScriptedTarget;

    fn complete(selector: WindowSelector) -> Condition {
        Condition {
            window: selector,
            status: ConditionStatus::Complete,
        }
    }

    fn two_window_fixture() -> (IndexMap<String, WindowId>, ScriptedTarget) {
        let mut target = ScriptedTarget::new();
        let first = target.new_window(Some("http://a/")).expect("window a");
        let second = target.new_window(None).expect("window b");
        let mut windows = IndexMap::new();
        windows.insert("a".to_string(), first);
        windows.insert("b".to_string(), second);
        (windows, target)
    }

    #[test]
    fn concrete_tag_depends_only_on_that_window() {
        let (windows, target) = two_window_fixture();
        // "a" is still loading, "b" never started.
        let throbbing = conditions_met(&windows, &target, &[complete(WindowSelector::Tag("a".into()))]);
        let idle = conditions_met(&windows, &target, &[complete(WindowSelector::Tag("b".into()))]);
        assert!(!throbbing.unwrap());
        assert!(idle.unwrap());
    }

    #[test]
    fn wildcard_is_true_iff_no_window_throbs() {
        let (windows, mut target) = two_window_fixture();
        assert!(!conditions_met(&windows, &target, &[complete(WindowSelector::All)]).unwrap());

        target.push_effect(crate::target::TickEffect::StopThrobber(windows["a"]));
        target.pump_tick().unwrap();
        assert!(conditions_met(&windows, &target, &[complete(WindowSelector::All)]).unwrap());
    }

    #[test]
    fn evaluation_is_idempotent_without_state_changes() {
        let (windows, target) = two_window_fixture();
        let conditions = [complete(WindowSelector::All), complete(WindowSelector::Tag("b".into()))];
        let first = conditions_met(&windows, &target, &conditions).unwrap();
        for _ in 0..5 {
            assert_eq!(conditions_met(&windows, &target, &conditions).unwrap(), first);
        }
    }

    #[test]
    fn conjunction_fails_when_any_condition_fails() {
        let (windows, target) = two_window_fixture();
        let conditions = [
            complete(WindowSelector::Tag("b".into())),
            complete(WindowSelector::Tag("a".into())),
        ];
        assert!(!conditions_met(&windows, &target, &conditions).unwrap());
    }

    #[test]
    fn unknown_tag_is_a_precondition_error() {
        let (windows, target) = two_window_fixture();
        let error = conditions_met(&windows, &target, &[complete(WindowSelector::Tag("ghost".into()))]);
        assert!(matches!(error, Err(StepError::UnknownWindowTag { .. })));
    }

    #[test]
    fn empty_condition_list_is_trivially_met() {
        let (windows, target) = two_window_fixture();
        assert!(conditions_met(&windows, &target, &[]).unwrap());
    }
}
