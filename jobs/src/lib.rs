//! Batch jobs over experiment results: merging rollout evaluations and tidying up the files they
//! came from.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

pub use crate::batch::{archive, load_batch, Batch};
pub use crate::merge::{concat, evaluation, Field, Merged};

mod batch;
mod merge;
