use std::path::{Path, PathBuf};

use anyhow::Result;

/// Parameters of the underlying simulator that the experiment needs to know about.
#[derive(Clone, Debug, PartialEq)]
pub struct SimParams {
    /// Seconds of simulated time per step
    pub sim_step: f64,
    /// If set, the simulator writes `{network_name}-emission.xml` into this directory.
    pub emission_path: Option<PathBuf>,
}

impl Default for SimParams {
    fn default() -> SimParams {
        SimParams {
            sim_step: 1.0,
            emission_path: None,
        }
    }
}

/// The result of advancing the environment one step.
#[derive(Clone, Debug, PartialEq)]
pub struct Transition<S> {
    pub state: S,
    pub reward: f64,
    /// The environment has nothing more to simulate in this run.
    pub done: bool,
}

/// A simulation wrapped as a reinforcement learning environment. Implementations own the
/// simulator and the learner's persisted state; the experiment only calls into them.
pub trait Environment {
    type State;
    type Action;
    /// Whatever the environment exposes about itself at a decision point.
    type Observation;
    /// The learned state (like a Q table) that can be swapped in during evaluation.
    type Policy;

    /// Starts a new run and returns the initial state.
    fn reset(&mut self) -> Result<Self::State>;

    /// `None` is the no-op action.
    fn step(&mut self, action: Option<Self::Action>) -> Result<Transition<Self::State>>;

    fn vehicle_ids(&self) -> Vec<String>;

    /// The speed of every vehicle currently in the simulation.
    fn vehicle_speeds(&self) -> Vec<f64>;

    /// Seconds in one signal cycle, for environments that make decisions once per cycle.
    fn cycle_time(&self) -> Option<f64> {
        None
    }

    /// Steps taken since the last reset.
    fn step_counter(&self) -> usize;

    /// Seconds elapsed in the current cycle; 0 at the start of each cycle.
    fn duration(&self) -> f64 {
        0.0
    }

    fn observation_space(&self) -> Self::Observation;

    /// The last action the agent decided on, if any.
    fn last_action(&self) -> Option<Self::Action> {
        None
    }

    /// Writes the learned policy to `dir/filename`. Returns false if this environment has nothing
    /// to dump.
    fn dump_policy(&self, _dir: &Path, _filename: &str) -> Result<bool> {
        Ok(false)
    }

    /// Replaces the learned policy.
    fn swap_policy(&mut self, _policy: Self::Policy) {}

    fn sim_params(&self) -> &SimParams;

    fn network_name(&self) -> &str;

    /// Stops the simulator. When this returns, any emission file has been completely written.
    fn terminate(&mut self) -> Result<()>;
}

/// Maps states to actions. Any closure from a state to an optional action works.
pub trait Policy<S, A> {
    fn act(&mut self, state: &S) -> Option<A>;
}

impl<S, A, F: FnMut(&S) -> Option<A>> Policy<S, A> for F {
    fn act(&mut self, state: &S) -> Option<A> {
        self(state)
    }
}

/// Never acts, leaving the environment to its default control.
pub struct NoOp;

impl<S, A> Policy<S, A> for NoOp {
    fn act(&mut self, _: &S) -> Option<A> {
        None
    }
}
