#![forbid(unsafe_code)]
#![warn(missing_docs)]

//! # Conductor Execution
//!
//! Runtime bookkeeping for one orchestration run.
//!
//! - [`ResourceState`] and [`can_transition`], the per-resource readiness
//!   state machine
//! - [`StateTable`], the shared compare-and-set state table control tasks
//!   await on
//! - [`LaunchPlan`], start levels plus fully resolved [`LaunchSpec`]s
//! - [`RunReport`], the per-resource final state, [`Outcome`] and history

pub mod error;
pub mod plan;
pub mod report;
pub mod state;
pub mod table;
pub mod transition;

pub use error::ExecutionError;
pub use plan::{LaunchPlan, LaunchSpec, PlannedResource};
pub use report::{Failure, Outcome, ResourceReport, RunReport};
pub use state::ResourceState;
pub use table::{Gate, StateTable, StateView, Transition};
pub use transition::{can_transition, validate_transition};
