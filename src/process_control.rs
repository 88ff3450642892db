/*
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this
 * file, You can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::config::{Redirect, ServerProcess};
use anyhow::{anyhow, Context};
use colored::*;
use std::{
    fs::OpenOptions,
    process::Command,
    time::{Duration, Instant},
};
use subprocess::{Exec, NullFile, Redirection};
use sysinfo::{Pid, ProcessStatus, Signal, System};
use tracing::{debug, warn};

/// How long `stop` waits for a graceful exit before escalating to a kill,
/// and again after the kill before giving up.
const STOP_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Starting,
    Ready,
    Stopped,
    Failed,
}

/// A running server-under-test. There is exactly one live handle per sweep;
/// ownership is threaded through the pipeline so teardown happens exactly
/// once, on every exit path, via `stop` or `Drop`.
#[derive(Debug)]
pub struct ServerHandle {
    process_name: String,
    pid: u32,
    down: Option<String>,
    state: ServerState,
}

/// Runs the given command as a detached process. This function does not block
/// because the process is managed by the OS and running separately from this
/// thread.
///
/// # Arguments
///
/// * command - The command to run.
///
/// # Returns
///
/// The PID returned by the operating system
fn run_command_detached(command: &str, redirect: Option<Redirect>) -> anyhow::Result<u32> {
    let redirect = redirect.unwrap_or(Redirect::Null);

    // break command string into POSIX words
    let words = shlex::split(command).context("Command string is not POSIX compliant.")?;

    // split command string into command and args
    match &words[..] {
        [command, args @ ..] => {
            let exec = Exec::cmd(command).args(args);

            let exec = match redirect {
                Redirect::Null => exec.stdout(NullFile).stderr(NullFile),
                Redirect::Parent => exec,
                Redirect::File => {
                    let out_file = OpenOptions::new()
                        .append(true)
                        .create(true)
                        .open("./.stdout")?;
                    let err_file = OpenOptions::new()
                        .append(true)
                        .create(true)
                        .open("./.stderr")?;
                    exec.stdout(Redirection::File(out_file))
                        .stderr(Redirection::File(err_file))
                }
            };

            exec.detached()
                .popen()
                .context(format!(
                    "Failed to spawn detached process, command: {}",
                    command
                ))?
                .pid()
                .context("Process should have a PID")
        }
        _ => Err(anyhow!("Empty command")),
    }
}

/// Spawn the server-under-test as a detached process. Returns as soon as the
/// OS has launched it; the server signals no readiness of its own, so callers
/// follow up with [`ServerHandle::await_ready`]. A spawn failure is fatal to
/// the whole run.
pub fn start(server: &ServerProcess) -> anyhow::Result<ServerHandle> {
    debug!("Running command {} in detached mode", server.up);
    let pid = run_command_detached(&server.up, server.redirect)?;

    Ok(ServerHandle {
        process_name: server.name.clone(),
        pid,
        down: server
            .down
            .clone()
            .map(|down| down.replace("{pid}", &pid.to_string())),
        state: ServerState::Starting,
    })
}

impl ServerHandle {
    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn state(&self) -> ServerState {
        self.state
    }

    /// Fixed pause giving the server time to bind its listening port before
    /// load is applied. This is not a health check: the server is presumed
    /// reachable once the delay has passed. An active probe against the
    /// target port would be more robust.
    pub async fn await_ready(&mut self, delay: Duration) {
        tokio::time::sleep(delay).await;
        if self.state == ServerState::Starting {
            self.state = ServerState::Ready;
        }
    }

    pub fn is_running(&self) -> bool {
        process_exists(self.pid)
    }

    /// Stop the server. Graceful first (the configured down command if there
    /// is one, otherwise a termination signal), then a forced kill if the
    /// process is still alive after the grace period. Calling stop on an
    /// already stopped handle is a no-op.
    pub fn stop(&mut self) -> anyhow::Result<()> {
        if self.state == ServerState::Stopped {
            return Ok(());
        }
        self.state = ServerState::Stopped;

        println!("> stopping process {}", self.process_name.green());

        match &self.down {
            Some(down) => {
                if let Err(err) = run_down_command(down) {
                    warn!(
                        "Down command failed for process {}, falling back to a signal\n{}",
                        self.process_name, err
                    );
                    signal_process(self.pid, Signal::Term);
                }
            }
            None => signal_process(self.pid, Signal::Term),
        }

        if !wait_for_exit(self.pid, STOP_GRACE) {
            warn!(
                "Process {} (pid {}) did not exit within {:?}, killing it",
                self.process_name, self.pid, STOP_GRACE
            );
            signal_process(self.pid, Signal::Kill);
            if !wait_for_exit(self.pid, STOP_GRACE) {
                self.state = ServerState::Failed;
                return Err(anyhow!(
                    "Process {} (pid {}) is still running after a forced kill",
                    self.process_name,
                    self.pid
                ));
            }
        }

        Ok(())
    }
}

impl Drop for ServerHandle {
    // Teardown must run on every exit path of the sweep, including an error
    // or panic unwinding through the pipeline.
    fn drop(&mut self) {
        if let Err(err) = self.stop() {
            warn!(
                "Failed to stop process {}\n{}",
                self.process_name, err
            );
        }
    }
}

fn run_down_command(down: &str) -> anyhow::Result<()> {
    let words = shlex::split(down).context("Command string is not POSIX compliant.")?;
    match &words[..] {
        [command, args @ ..] => {
            Command::new(command)
                .args(args)
                .output()
                .context(format!("Failed to run down command: {}", down))?;
            Ok(())
        }
        _ => Err(anyhow!("Empty down command")),
    }
}

fn process_exists(pid: u32) -> bool {
    let mut system = System::new();
    system.refresh_all();
    match system.process(Pid::from_u32(pid)) {
        // a zombie has exited but not been reaped; it holds no resources
        Some(proc) => proc.status() != ProcessStatus::Zombie,
        None => false,
    }
}

fn signal_process(pid: u32, signal: Signal) {
    let mut system = System::new();
    system.refresh_all();
    if let Some(proc) = system.process(Pid::from_u32(pid)) {
        proc.kill_with(signal);
    }
}

fn wait_for_exit(pid: u32, timeout: Duration) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if !process_exists(pid) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    !process_exists(pid)
}

#[cfg(test)]
#[cfg(target_family = "unix")]
mod tests {
    use super::*;

    fn sleep_server(up: &str) -> ServerProcess {
        ServerProcess {
            name: "sleep".to_string(),
            up: up.to_string(),
            down: None,
            redirect: Some(Redirect::Null),
            startup_delay: 0,
        }
    }

    #[test]
    fn can_start_and_stop_a_server() -> anyhow::Result<()> {
        let mut handle = start(&sleep_server("sleep 15"))?;

        assert!(handle.pid() > 0);
        assert_eq!(handle.state(), ServerState::Starting);
        assert!(handle.is_running());

        handle.stop()?;
        assert_eq!(handle.state(), ServerState::Stopped);
        assert!(!handle.is_running());

        Ok(())
    }

    #[test]
    fn stop_is_idempotent() -> anyhow::Result<()> {
        let mut handle = start(&sleep_server("sleep 15"))?;

        handle.stop()?;
        handle.stop()?;
        assert!(!handle.is_running());

        Ok(())
    }

    #[test]
    fn dropping_the_handle_stops_the_server() -> anyhow::Result<()> {
        let handle = start(&sleep_server("sleep 15"))?;
        let pid = handle.pid();
        drop(handle);

        assert!(!process_exists(pid));

        Ok(())
    }

    #[test]
    fn down_command_is_used_for_graceful_shutdown() -> anyhow::Result<()> {
        let server = ServerProcess {
            down: Some("kill {pid}".to_string()),
            ..sleep_server("sleep 15")
        };
        let mut handle = start(&server)?;

        handle.stop()?;
        assert!(!handle.is_running());

        Ok(())
    }

    #[tokio::test]
    async fn await_ready_marks_the_handle_ready() -> anyhow::Result<()> {
        let mut handle = start(&sleep_server("sleep 15"))?;

        handle.await_ready(Duration::from_millis(10)).await;
        assert_eq!(handle.state(), ServerState::Ready);

        handle.stop()?;
        Ok(())
    }

    #[test]
    fn starting_a_missing_binary_is_fatal() {
        let res = start(&sleep_server("./does/not/exist"));
        assert!(res.is_err());
    }
}
