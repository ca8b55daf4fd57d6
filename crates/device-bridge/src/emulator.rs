//! Emulator launcher
//!
//! Boots AVDs into emulator instances that outlive the process.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use droidrun_core::Device;
use droidrun_sdk::Sdk;
use parking_lot::Mutex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::adb::AdbClient;
use crate::{console_serial, CONSOLE_PORT_RANGE};

/// Polls while waiting for a fresh emulator to appear in the device list.
const ONLINE_WAIT_ATTEMPTS: u32 = 120;
const ONLINE_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Emulator errors
#[derive(Debug, thiserror::Error)]
pub enum EmulatorError {
    #[error("emulator not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("no free emulator console port")]
    NoFreePort,
    #[error("emulator for {id} exited early: {stderr}")]
    StartFailed { id: String, stderr: String },
    #[error("emulator {0} did not come online in time")]
    OnlineTimeout(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Launches emulator processes for installed AVDs.
pub struct EmulatorLauncher {
    emulator: PathBuf,
    env: Vec<(&'static str, PathBuf)>,
}

impl EmulatorLauncher {
    /// Launcher for the given SDK.
    pub fn new(sdk: &Sdk) -> Self {
        Self::with_tool(sdk.emulator_path(), sdk.command_env())
    }

    /// Launcher for an explicit emulator binary and environment.
    pub fn with_tool(emulator: PathBuf, env: Vec<(&'static str, PathBuf)>) -> Self {
        Self { emulator, env }
    }

    /// Boot the AVD and wait for the instance to show up connectable in
    /// the device list. The emulator process is left running on return.
    pub async fn boot(&self, adb: &AdbClient, id: &str) -> Result<Device, EmulatorError> {
        if !self.emulator.exists() {
            return Err(EmulatorError::NotFound(self.emulator.clone()));
        }
        let port = free_console_port().await.ok_or(EmulatorError::NoFreePort)?;
        let serial = console_serial(port);
        info!("booting {id} on console port {port}");

        let port_arg = port.to_string();
        let mut command = Command::new(&self.emulator);
        command
            .args(["-avd", id, "-port", port_arg.as_str()])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        for (key, value) in &self.env {
            command.env(key, value);
        }
        let mut child = command.spawn()?;

        // Keep the pipe drained for the lifetime of the emulator and hold
        // on to the output in case the process dies during startup.
        let stderr_tail: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let mut drain = None;
        if let Some(stderr) = child.stderr.take() {
            let tail = Arc::clone(&stderr_tail);
            drain = Some(tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    debug!("emulator: {line}");
                    tail.lock().push(line);
                }
            }));
        }

        for _ in 0..ONLINE_WAIT_ATTEMPTS {
            if let Some(status) = child.try_wait()? {
                if let Some(drain) = drain.take() {
                    let _ = drain.await;
                }
                let stderr = stderr_tail.lock().join("\n");
                warn!("emulator for {id} exited with {status} before coming online");
                return Err(EmulatorError::StartFailed {
                    id: id.to_string(),
                    stderr,
                });
            }
            match adb.devices().await {
                Ok(devices) => {
                    let found = devices
                        .into_iter()
                        .find(|d| d.serial == serial && d.is_usable());
                    if let Some(mut device) = found {
                        if device.avd_id.is_none() {
                            device.avd_id = Some(id.to_string());
                        }
                        info!("emulator {serial} is connectable");
                        return Ok(device);
                    }
                }
                Err(err) => debug!("device list not ready yet: {err}"),
            }
            tokio::time::sleep(ONLINE_POLL_INTERVAL).await;
        }
        Err(EmulatorError::OnlineTimeout(serial))
    }
}

/// First even console port in the emulator range nothing is listening on.
async fn free_console_port() -> Option<u16> {
    for port in CONSOLE_PORT_RANGE.step_by(2) {
        if tokio::net::TcpListener::bind(("127.0.0.1", port))
            .await
            .is_ok()
        {
            return Some(port);
        }
    }
    None
}
