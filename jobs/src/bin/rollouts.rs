//! Merges the rollout evaluations of a batch into `merged.json`, then moves the evaluations out of
//! the way into a timestamped directory.

use std::path::PathBuf;

use anyhow::Result;
use structopt::StructOpt;

#[derive(StructOpt)]
#[structopt(name = "rollouts", about = "Merges the rollouts of a batch of experiments")]
struct Args {
    /// A directory containing `0.json`, `1.json`, ...
    #[structopt(parse(from_os_str))]
    batch_dir: PathBuf,
}

fn main() -> Result<()> {
    abstutil::logger::setup();
    let args = Args::from_args();

    let mut timer = abstutil::Timer::new(format!("merge {}", args.batch_dir.display()));
    timer.start("load batch");
    let batch = jobs::load_batch(&args.batch_dir)?;
    timer.stop("load batch");

    timer.start("concat");
    let merged = jobs::concat(batch.evaluations)?;
    timer.stop("concat");
    timer.note(format!("{} distinct experiments", merged.id.len()));

    abstutil::write_json(args.batch_dir.join("merged.json"), &merged)?;
    jobs::archive(&batch.paths)?;
    timer.done();
    Ok(())
}
