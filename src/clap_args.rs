use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
pub struct Args {
    /// Verbose mode (-v, --verbose)
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run a concurrency sweep against the configured server
    Run {
        /// Path of the config file
        #[arg(short, long, default_value = "loadsweep.toml")]
        config: String,

        /// Override the configured concurrency levels (comma separated)
        #[arg(long, value_delimiter = ',')]
        levels: Vec<u32>,

        /// Override the per-level load duration in seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Override the target host
        #[arg(long)]
        host: Option<String>,

        /// Override the target port
        #[arg(long)]
        port: Option<u16>,

        /// Override the results file path
        #[arg(long)]
        output: Option<String>,
    },

    /// Write an example loadsweep.toml to the current directory
    Init,
}

pub fn parse() -> Args {
    Args::parse()
}
