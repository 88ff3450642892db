use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{Read, Write},
};

static EXAMPLE_CONFIG: &str = include_str!("templates/loadsweep.toml");

// ******** ******** ********
// **    CONFIGURATION     **
// ******** ******** ********
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    pub server: ServerProcess,
    pub target: Target,
    pub benchmark: Benchmark,
}
impl Config {
    pub fn write_example_to_file(path: &std::path::Path) -> anyhow::Result<File> {
        let mut file = File::create_new(path)?;
        File::write_all(&mut file, EXAMPLE_CONFIG.as_bytes())?;
        Ok(file)
    }

    pub fn try_from_path(path: &std::path::Path) -> anyhow::Result<Config> {
        let mut config_str = String::new();
        fs::File::open(path)?.read_to_string(&mut config_str)?;
        Config::try_from_str(&config_str)
    }

    pub fn try_from_str(conf_str: &str) -> anyhow::Result<Config> {
        toml::from_str::<Config>(conf_str).map_err(|e| anyhow::anyhow!("TOML parsing error: {}", e))
    }

    /// Checks the sweep parameters make sense before any process is started.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.up.trim().is_empty() {
            return Err(anyhow::anyhow!("Server up command is empty"));
        }
        if self.benchmark.command.trim().is_empty() {
            return Err(anyhow::anyhow!("Benchmark command is empty"));
        }
        if self.benchmark.levels.is_empty() {
            return Err(anyhow::anyhow!("No concurrency levels configured"));
        }
        if self.benchmark.levels.iter().any(|level| *level == 0) {
            return Err(anyhow::anyhow!("Concurrency levels must be positive"));
        }
        if self.benchmark.duration == 0 {
            return Err(anyhow::anyhow!("Benchmark duration must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, PartialEq, Clone, Copy, Serialize)]
#[serde(tag = "to", rename_all = "lowercase")]
pub enum Redirect {
    Null,
    Parent,
    File,
}

/// The server-under-test. Spawned detached before the sweep starts and torn
/// down after it completes, whatever the outcome.
#[derive(Debug, Deserialize, PartialEq, Serialize, Clone)]
pub struct ServerProcess {
    pub name: String,
    pub up: String,
    pub down: Option<String>,
    pub redirect: Option<Redirect>,
    /// Seconds to wait after spawning before load is applied.
    #[serde(default = "default_startup_delay")]
    pub startup_delay: u64,
}

#[derive(Debug, Deserialize, PartialEq, Serialize, Clone)]
pub struct Target {
    pub host: String,
    pub port: u16,
}

/// The load generator and the sweep it is driven through. The command is
/// invoked once per level as `<command> <host> <port> <concurrency> <duration>`.
#[derive(Debug, Deserialize, PartialEq, Serialize, Clone)]
pub struct Benchmark {
    pub command: String,
    #[serde(default = "default_levels")]
    pub levels: Vec<u32>,
    #[serde(default = "default_duration")]
    pub duration: u64,
    #[serde(default = "default_output")]
    pub output: String,
}

fn default_startup_delay() -> u64 {
    2
}

fn default_levels() -> Vec<u32> {
    vec![10, 50, 100, 200, 500]
}

fn default_duration() -> u64 {
    5
}

fn default_output() -> String {
    "benchmark_results.csv".to_string()
}
