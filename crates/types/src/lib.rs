//! Shared type definitions for the drover test driver.
//!
//! The only schema that crosses crate boundaries is the plan document: the
//! YAML file an author writes to describe a browser test run. The engine and
//! the CLI both consume these types; neither adds fields of its own.

pub mod plan;

pub use plan::{
    Condition, ConditionStatus, Plan, PlotAssertion, SleepBudget, Step, TimerComparison, TimerOp, WindowSelector,
};
pub use plan::validation::{PlanValidationError, validate_plan};
