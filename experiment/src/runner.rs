use std::path::{Path, PathBuf};

use abstutil::Timer;
use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::emission::emission_to_csv;
use crate::stats::{nan_mean, nan_mean_std, round4};
use crate::{Environment, Policy};

/// Every this many decisions, the learned policy is saved (when training) or replaced (when
/// evaluating).
const DECISIONS_PER_CHECKPOINT: usize = 100;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// Where policy snapshots go
    pub dir_path: PathBuf,
    /// When false, the experiment evaluates previously learned policies instead of saving new
    /// ones.
    pub train: bool,
}

impl Default for ExperimentConfig {
    fn default() -> ExperimentConfig {
        ExperimentConfig {
            dir_path: default_emissions_dir(),
            train: true,
        }
    }
}

impl ExperimentConfig {
    pub fn load<P: AsRef<Path>>(path: P) -> Result<ExperimentConfig> {
        abstutil::read_json(path)
    }
}

/// `$ILURL_HOME/data/emissions` if the variable is set, or `data/emissions` otherwise.
fn default_emissions_dir() -> PathBuf {
    match std::env::var("ILURL_HOME") {
        Ok(home) => Path::new(&home).join("data").join("emissions"),
        Err(_) => Path::new("data").join("emissions"),
    }
}

/// What happened during an experiment. The outer lists have one entry per run; the inner lists
/// have one entry per save step.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RunInfo<O, A> {
    /// The network name
    pub id: String,
    /// Seconds per signal cycle, if the environment works in cycles
    pub cycle: Option<f64>,
    /// Simulation steps between two save steps
    pub save_step: f64,
    pub rewards: Vec<Vec<f64>>,
    /// Mean vehicle speed; None when there were no vehicles at all.
    pub velocities: Vec<Vec<Option<f64>>>,
    /// Mean number of vehicles in the network
    pub vehicles: Vec<Vec<f64>>,
    pub observation_spaces: Vec<Vec<O>>,
    pub rl_actions: Vec<Vec<Option<A>>>,
}

/// Runs an environment for a number of runs, collecting rewards and traffic statistics.
///
/// ```ignore
/// let mut exp = Experiment::new(env, ExperimentConfig::default(), Vec::new())?;
/// let info = exp.run(1, 1000, &mut |state: &State| Some(agent.act(state)), false)?;
/// ```
pub struct Experiment<E: Environment> {
    env: E,
    config: ExperimentConfig,
    /// Evaluation mode swaps these in, one per run.
    policies: Vec<E::Policy>,
    cycle: Option<f64>,
    save_step: f64,
}

impl<E> Experiment<E>
where
    E: Environment,
    E::Policy: Clone,
{
    pub fn new(
        env: E,
        config: ExperimentConfig,
        policies: Vec<E::Policy>,
    ) -> Result<Experiment<E>> {
        if !config.train && policies.is_empty() {
            bail!("In evaluation mode, some policies must be provided");
        }
        let sim_step = env.sim_params().sim_step;
        if !(sim_step > 0.0) {
            bail!("The simulation step must be positive, not {}", sim_step);
        }
        let cycle = env.cycle_time();
        let save_step = cycle.unwrap_or(1.0) / sim_step;
        info!(
            "Starting experiment {} (train = {}, save step = {})",
            env.network_name(),
            config.train,
            save_step
        );
        Ok(Experiment {
            env,
            config,
            policies,
            cycle,
            save_step,
        })
    }

    pub fn env(&self) -> &E {
        &self.env
    }

    pub fn into_env(self) -> E {
        self.env
    }

    /// Runs the environment `num_runs` times, for at most `num_steps` steps each. If
    /// `convert_to_csv` is set, the emission file is converted after the last run.
    pub fn run<P: Policy<E::State, E::Action>>(
        &mut self,
        num_runs: usize,
        num_steps: usize,
        policy: &mut P,
        convert_to_csv: bool,
    ) -> Result<RunInfo<E::Observation, E::Action>> {
        // Fail before simulating anything, rather than at the very end.
        if convert_to_csv && self.env.sim_params().emission_path.is_none() {
            bail!(
                "convert_to_csv is set, but no emission file will be generated. Set \
                 emission_path in the simulation parameters, or don't ask to convert emissions."
            );
        }

        let mut info = RunInfo {
            id: self.env.network_name().to_string(),
            cycle: self.cycle,
            save_step: self.save_step,
            rewards: Vec::new(),
            velocities: Vec::new(),
            vehicles: Vec::new(),
            observation_spaces: Vec::new(),
            rl_actions: Vec::new(),
        };

        let mut timer = Timer::new(format!("experiment {}", info.id));
        for run in 0..num_runs {
            timer.start(format!("run {}", run));
            let mut rewards = Vec::new();
            let mut velocities = Vec::new();
            let mut vehicles = Vec::new();
            let mut observations = Vec::new();
            let mut actions = Vec::new();

            // Per-step values since the last save step
            let mut window_vehicles: Vec<f64> = Vec::new();
            let mut window_speeds: Vec<f64> = Vec::new();

            let mut state = self.env.reset()?;
            for step in 0..num_steps {
                let transition = self.env.step(policy.act(&state))?;
                state = transition.state;

                window_vehicles.push(self.env.vehicle_ids().len() as f64);
                window_speeds.push(nan_mean(&self.env.vehicle_speeds()).unwrap_or(f64::NAN));

                if self.is_save_step() {
                    observations.push(self.env.observation_space());
                    actions.push(self.env.last_action());
                    rewards.push(round4(transition.reward));
                    vehicles.push(round4(nan_mean(&window_vehicles).unwrap_or(0.0)));
                    velocities.push(nan_mean(&window_speeds).map(round4));
                    window_vehicles.clear();
                    window_speeds.clear();
                }

                if transition.done {
                    debug!("Run {} finished early, after {} steps", run, step + 1);
                    break;
                }

                if self.is_checkpoint() {
                    if self.config.train {
                        let n = (step as f64 / self.save_step) as usize + 1;
                        let filename = format!("{}.Q.{}-{}.pickle", info.id, run + 1, n);
                        if self.env.dump_policy(&self.config.dir_path, &filename)? {
                            debug!("Saved {}", filename);
                        }
                    } else if let Some(policy) = self.policies.get(run) {
                        self.env.swap_policy(policy.clone());
                    }
                }
            }
            timer.stop(format!("run {}", run));

            info!(
                "Round {}\treturn: {:.2}\tavg speed: {}",
                run,
                rewards.iter().sum::<f64>(),
                describe(nan_mean(&flatten(&velocities)))
            );
            record_run(&mut info, rewards, velocities, vehicles, observations, actions);
        }

        let returns: Vec<f64> = info
            .rewards
            .iter()
            .map(|r| nan_mean(r).unwrap_or(f64::NAN))
            .collect();
        let speeds: Vec<f64> = info
            .velocities
            .iter()
            .map(|v| nan_mean(&flatten(v)).unwrap_or(f64::NAN))
            .collect();
        if let Some((mean, std)) = nan_mean_std(&returns) {
            info!("Average, std return: {}, {}", mean, std);
        }
        if let Some((mean, std)) = nan_mean_std(&speeds) {
            info!("Average, std speed: {}, {}", mean, std);
        }

        self.env.terminate()?;
        if convert_to_csv {
            if let Some(ref dir) = self.env.sim_params().emission_path {
                emission_to_csv(dir.join(format!("{}-emission.xml", info.id)))?;
            }
        }
        timer.done();

        Ok(info)
    }

    fn is_save_step(&self) -> bool {
        if self.cycle.is_some() {
            self.env.duration() == 0.0
        } else {
            self.env.step_counter() % self.steps_per_save() == 0
        }
    }

    fn is_checkpoint(&self) -> bool {
        let every = DECISIONS_PER_CHECKPOINT.saturating_mul(self.steps_per_save());
        self.env.step_counter() % every == 0
    }

    // The counters are whole steps, so round a fractional save step.
    fn steps_per_save(&self) -> usize {
        (self.save_step.round() as usize).max(1)
    }
}

fn record_run<O, A>(
    info: &mut RunInfo<O, A>,
    rewards: Vec<f64>,
    velocities: Vec<Option<f64>>,
    vehicles: Vec<f64>,
    observations: Vec<O>,
    actions: Vec<Option<A>>,
) {
    info.rewards.push(rewards);
    info.velocities.push(velocities);
    info.vehicles.push(vehicles);
    info.observation_spaces.push(observations);
    info.rl_actions.push(actions);
}

fn flatten(values: &[Option<f64>]) -> Vec<f64> {
    values.iter().map(|x| x.unwrap_or(f64::NAN)).collect()
}

fn describe(x: Option<f64>) -> String {
    match x {
        Some(x) => format!("{:.4}", x),
        None => "no vehicles".to_string(),
    }
}
