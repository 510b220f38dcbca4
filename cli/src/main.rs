//! Command-line tools for building road networks without an editor attached.

#[macro_use]
extern crate anyhow;
#[macro_use]
extern crate log;

mod build;

use anyhow::Result;
use structopt::StructOpt;

use road_network::EngineConfig;

#[derive(StructOpt)]
#[structopt(name = "rncli", about = "Road network synthesis tools")]
enum Command {
    /// Builds a network from a JSON scenario describing roads and how their ends connect, then
    /// prints a summary.
    Build {
        /// The path to a JSON scenario
        #[structopt()]
        input: String,
        /// The path to an engine config. Defaults are used for anything missing.
        #[structopt(long)]
        config: Option<String>,
        /// Write the resulting network state as JSON here
        #[structopt(long)]
        output: Option<String>,
    },
    /// Print the default engine config as JSON
    DumpConfig,
}

fn main() -> Result<()> {
    let cmd = Command::from_args();

    // Output of some commands is meant to be piped elsewhere
    if !matches!(cmd, Command::DumpConfig) {
        abstutil::logger::setup();
    }

    match cmd {
        Command::Build {
            input,
            config,
            output,
        } => {
            let config = match config {
                Some(path) => EngineConfig::load(&path)?,
                None => EngineConfig::default(),
            };
            build::run(input, config, output)?;
        }
        Command::DumpConfig => println!("{}", abstutil::to_json(&EngineConfig::default())?),
    }
    Ok(())
}
