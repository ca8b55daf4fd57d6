//! Run lifecycle orchestration
//!
//! Drives one deploy-and-launch run through its phases:
//!
//! ```text
//! Idle → Selecting → BootWaiting → [PortForwarding] → Installing
//!      → Launching → Running → [WaitingForClose] → TearingDown → Done
//! ```
//!
//! Teardown actions are registered the moment a resource is acquired, and
//! the registry executes exactly once whether the run finishes, fails, or
//! is interrupted. On a successful non-interactive run the application and
//! any port forward are deliberately left in place.

use std::path::PathBuf;
use std::sync::Arc;

use futures::FutureExt;
use tracing::{debug, info, warn};

use crate::bridge::{DeviceBridge, DeviceInventory};
use crate::device::{ApplicationInfo, Device, PortMapping};
use crate::error::Result;
use crate::select::select_device;
use crate::teardown::{TeardownHandle, TeardownRegistry};

/// Phases of one run, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunPhase {
    /// Nothing started yet.
    Idle,
    /// Taking an inventory snapshot and selecting the device.
    Selecting,
    /// Waiting for the selected device to finish booting.
    BootWaiting,
    /// Establishing the requested port forward.
    PortForwarding,
    /// Installing the APK.
    Installing,
    /// Starting the main activity.
    Launching,
    /// The application is running on the device.
    Running,
    /// Interactive mode: waiting for the application to exit.
    WaitingForClose,
    /// Executing registered teardown actions.
    TearingDown,
    /// The run is over.
    Done,
}

/// What the user asked for.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// APK to deploy.
    pub apk: PathBuf,
    /// Explicit device serial or AVD id.
    pub target: Option<String>,
    /// Prefer virtual devices over connected hardware.
    pub prefer_virtual: bool,
    /// Optional device-port to host-port forward.
    pub forward: Option<PortMapping>,
    /// Interactive mode: wait for the app to close, then clean up.
    pub connect: bool,
}

/// How a run ended when it did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    /// All phases completed.
    Finished,
    /// An interrupt arrived; teardown still ran.
    Interrupted,
}

/// Everything one run holds once a device is selected.
#[derive(Debug, Clone)]
pub struct RunContext {
    /// The selected device.
    pub device: Device,
    /// The requested port mapping, when any.
    pub ports: Option<PortMapping>,
    /// Application identity resolved from the APK.
    pub app: ApplicationInfo,
}

enum DriveEnd {
    Finished(Result<()>),
    Interrupted,
}

/// Drives the device bridge through the run phases.
pub struct RunOrchestrator<B> {
    bridge: Arc<B>,
    phase: RunPhase,
}

impl<B> RunOrchestrator<B>
where
    B: DeviceBridge + 'static,
{
    /// New orchestrator over the given bridge.
    pub fn new(bridge: Arc<B>) -> Self {
        RunOrchestrator {
            bridge,
            phase: RunPhase::Idle,
        }
    }

    /// The current phase.
    pub fn phase(&self) -> RunPhase {
        self.phase
    }

    /// Run to completion. Ctrl-C at any suspension point still executes
    /// teardown before this returns.
    pub async fn run(
        &mut self,
        options: &RunOptions,
        app: &ApplicationInfo,
    ) -> Result<RunOutcome> {
        self.run_until(options, app, interrupt_signal()).await
    }

    /// Like [`RunOrchestrator::run`] with a caller-supplied interrupt
    /// condition.
    pub async fn run_until<F>(
        &mut self,
        options: &RunOptions,
        app: &ApplicationInfo,
        interrupt: F,
    ) -> Result<RunOutcome>
    where
        F: std::future::Future<Output = ()>,
    {
        let mut teardown = TeardownRegistry::new();
        let end = tokio::select! {
            result = self.drive(options, app, &mut teardown) => DriveEnd::Finished(result),
            _ = interrupt => {
                info!("interrupt received, tearing down");
                DriveEnd::Interrupted
            }
        };
        self.set_phase(RunPhase::TearingDown);
        teardown.run_all().await;
        self.set_phase(RunPhase::Done);
        match end {
            DriveEnd::Finished(Ok(())) => Ok(RunOutcome::Finished),
            DriveEnd::Finished(Err(err)) => Err(err),
            DriveEnd::Interrupted => Ok(RunOutcome::Interrupted),
        }
    }

    async fn drive(
        &mut self,
        options: &RunOptions,
        app: &ApplicationInfo,
        teardown: &mut TeardownRegistry,
    ) -> Result<()> {
        self.set_phase(RunPhase::Selecting);
        let inventory = DeviceInventory::snapshot(self.bridge.as_ref()).await?;
        debug!(
            "inventory: {} connected device(s), {} installed AVD(s)",
            inventory.devices.len(),
            inventory.avds.len()
        );
        let device = select_device(
            self.bridge.as_ref(),
            &inventory,
            options.target.as_deref(),
            options.prefer_virtual,
        )
        .await?;
        println!("{}", selection_line(&device));

        let ctx = RunContext {
            device,
            ports: options.forward.clone(),
            app: app.clone(),
        };

        self.set_phase(RunPhase::BootWaiting);
        debug!("waiting for {} to report boot complete", ctx.device.serial);
        self.bridge.wait_for_boot(&ctx.device).await?;

        let mut forward_guard: Option<TeardownHandle> = None;
        if let Some(mapping) = &ctx.ports {
            self.set_phase(RunPhase::PortForwarding);
            self.bridge.forward_ports(&ctx.device, mapping).await?;
            forward_guard = Some(self.register_unforward(teardown, &ctx.device, mapping));
            println!(
                "Forwarded device port {} to host port {}",
                mapping.device, mapping.host
            );
        }

        self.set_phase(RunPhase::Installing);
        println!("Installing {}...", options.apk.display());
        self.bridge
            .install_package(&ctx.device, &options.apk, &ctx.app.app_id)
            .await?;

        self.set_phase(RunPhase::Launching);
        println!("Starting activity {}", ctx.app.component());
        self.bridge
            .start_activity(&ctx.device, &ctx.app.app_id, &ctx.app.activity)
            .await?;
        println!("Run successful");

        self.set_phase(RunPhase::Running);
        if options.connect {
            self.register_force_stop(teardown, &ctx);
            self.set_phase(RunPhase::WaitingForClose);
            println!("Waiting for the app to close...");
            self.bridge
                .wait_for_close(&ctx.device, &ctx.app.app_id)
                .await?;
        } else if let Some(handle) = forward_guard {
            // The mapping is handed over to the user on this path.
            debug!("leaving port forward active");
            teardown.dismiss(handle);
        }
        Ok(())
    }

    fn register_unforward(
        &self,
        teardown: &mut TeardownRegistry,
        device: &Device,
        mapping: &PortMapping,
    ) -> TeardownHandle {
        let bridge = Arc::clone(&self.bridge);
        let device = device.clone();
        let mapping = mapping.clone();
        teardown.register("unforward ports", move || {
            async move { bridge.unforward_ports(&device, &mapping).await }.boxed()
        })
    }

    fn register_force_stop(&self, teardown: &mut TeardownRegistry, ctx: &RunContext) {
        let bridge = Arc::clone(&self.bridge);
        let device = ctx.device.clone();
        let app_id = ctx.app.app_id.clone();
        teardown.register("force-stop app", move || {
            async move { bridge.force_stop(&device, &app_id).await }.boxed()
        });
    }

    fn set_phase(&mut self, phase: RunPhase) {
        if self.phase != phase {
            debug!("phase transition: {:?} -> {:?}", self.phase, phase);
            self.phase = phase;
        }
    }
}

// The confirmation names the device by bare serial, the form every other
// tool accepts it in.
fn selection_line(device: &Device) -> String {
    let kind = if device.is_virtual() {
        "emulator"
    } else {
        "hardware device"
    };
    format!("Selected {kind} {}", device.serial)
}

/// Resolves when Ctrl-C is received. If the handler cannot be installed
/// the run proceeds uninterruptible.
async fn interrupt_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {}
        Err(err) => {
            warn!("cannot listen for interrupts: {err}");
            std::future::pending::<()>().await;
        }
    }
}
