#[macro_use]
extern crate log;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use fdshim_probe::{
    plan::{Plan, Step},
    runner::Runner,
};

/// Drives the fixed-arity open/fcntl/ioctl shims and reports raw results
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    #[clap(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the steps of a YAML plan
    Plan {
        #[clap()]
        plan_file: PathBuf,
    },
    /// Open a single path and report the descriptor or errno
    Open {
        #[clap()]
        path: PathBuf,

        /// Open flag name, e.g. O_RDWR; may be repeated
        #[clap(short = 'f', long = "flag")]
        flags: Vec<String>,

        /// Octal permission bits, selects the three-argument form
        #[clap(short, long)]
        mode: Option<String>,
    },
}

fn main() -> Result<()> {
    std::env::set_var(
        "RUST_LOG",
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
    );
    pretty_env_logger::init();

    trace!("parsing args");
    let args = Args::parse();

    let plan = match args.command {
        Command::Plan { plan_file } => {
            info!("parsing plan {plan_file:?}");
            Plan::from_file(&plan_file)?
        }
        Command::Open { path, flags, mode } => {
            let plan = Plan {
                steps: vec![Step::Open {
                    handle: "cli".into(),
                    path,
                    flags,
                    mode,
                    expect: None,
                }],
            };
            plan.validate()?;
            plan
        }
    };
    trace!("{plan:#?}");

    let outcomes = Runner::new().run(&plan)?;
    info!("{} step(s) completed", outcomes.len());
    Ok(())
}
