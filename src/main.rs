use anyhow::Context;
use colored::*;
use loadsweep::{clap_args, config::Config};
use std::path::Path;
use tracing::Level;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = clap_args::parse();

    let debug_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(debug_level).init();

    match args.command {
        clap_args::Commands::Run {
            config,
            levels,
            duration,
            host,
            port,
            output,
        } => {
            let mut config = Config::try_from_path(Path::new(&config))
                .context(format!("Failed to load config {}", config))?;

            // CLI overrides win over the config file
            if !levels.is_empty() {
                config.benchmark.levels = levels;
            }
            if let Some(duration) = duration {
                config.benchmark.duration = duration;
            }
            if let Some(host) = host {
                config.target.host = host;
            }
            if let Some(port) = port {
                config.target.port = port;
            }
            if let Some(output) = output {
                config.benchmark.output = output;
            }

            loadsweep::run(&config).await?;
        }

        clap_args::Commands::Init => {
            match Config::write_example_to_file(Path::new("./loadsweep.toml")) {
                Ok(_) => println!("{}", "loadsweep.toml created!".green()),
                Err(err) => {
                    println!("{}\n{}", "Error creating config.".red(), err);
                    std::process::exit(1);
                }
            }
        }
    }

    Ok(())
}
