//! Runs reinforcement learning experiments against a traffic simulation. The simulation and the
//! learning agent live elsewhere; this crate only drives the loop, collects statistics, and
//! periodically asks the environment to persist what it has learned.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

pub use crate::emission::emission_to_csv;
pub use crate::env::{Environment, NoOp, Policy, SimParams, Transition};
pub use crate::runner::{Experiment, ExperimentConfig, RunInfo};

mod emission;
mod env;
mod runner;
pub mod stats;
