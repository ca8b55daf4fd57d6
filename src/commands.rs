//! Command wiring
//!
//! Translates parsed flags into the three entry points: the
//! deploy-and-run flow, `--list` and `--sdk-info`. Flag values are
//! validated here, before any device interaction, so malformed input is
//! rejected as [`BadInput`](droidrun_core::ErrorKind::BadInput).

use std::sync::Arc;

use tracing::debug;

use droidrun_core::{
    DeviceInventory, PortMapping, Result, RunError, RunOptions, RunOrchestrator, RunOutcome,
};
use droidrun_device_bridge::AdbDeviceBridge;
use droidrun_sdk::{discover_packages, ApkInfo, PackageResolver, Sdk, SdkPackage};

use crate::cli::Cli;

/// Executes the selected command and reports how it ended.
pub async fn execute(cli: &Cli) -> Result<RunOutcome> {
    if cli.list {
        list(cli.json).await?;
        return Ok(RunOutcome::Finished);
    }
    if cli.sdk_info {
        sdk_info(cli.json).await?;
        return Ok(RunOutcome::Finished);
    }
    run(cli).await
}

async fn run(cli: &Cli) -> Result<RunOutcome> {
    let forward = cli
        .forward
        .as_deref()
        .map(str::parse::<PortMapping>)
        .transpose()?;
    let apk = cli
        .app
        .clone()
        .ok_or_else(|| RunError::BadInput("--app is required".to_string()))?;
    let info = ApkInfo::load(&apk)?;
    let app = info.application();
    debug!("deploying {} from {}", app.app_id, apk.display());

    let sdk = Sdk::resolve()?;
    let bridge = Arc::new(AdbDeviceBridge::new(&sdk));
    let options = RunOptions {
        apk,
        target: cli.target.clone(),
        prefer_virtual: cli.prefer_virtual,
        forward,
        connect: cli.connect,
    };
    let mut orchestrator = RunOrchestrator::new(bridge);
    orchestrator.run(&options, &app).await
}

async fn list(json: bool) -> Result<()> {
    let sdk = Sdk::resolve()?;
    let bridge = AdbDeviceBridge::new(&sdk);
    let inventory = DeviceInventory::snapshot(&bridge).await?;

    if json {
        let listing = serde_json::json!({
            "devices": inventory.devices,
            "virtualDevices": inventory.avds,
        });
        println!("{listing:#}");
        return Ok(());
    }

    if inventory.devices.is_empty() {
        println!("No connected devices");
    } else {
        println!("Connected devices:");
        for device in &inventory.devices {
            let kind = if device.is_virtual() {
                "emulator"
            } else {
                "hardware"
            };
            println!("  {} - {} ({})", device.display_name(), device.state, kind);
        }
    }
    println!();
    if inventory.avds.is_empty() {
        println!("No installed virtual devices");
    } else {
        println!("Installed virtual devices:");
        for avd in &inventory.avds {
            println!(
                "  {} - {} ({})",
                avd.id,
                avd.display_name(),
                avd.target.as_deref().unwrap_or("unknown target"),
            );
        }
    }
    Ok(())
}

async fn sdk_info(json: bool) -> Result<()> {
    let sdk = Sdk::resolve()?;
    let resolver = PackageResolver::new();
    let packages = discover_packages(&sdk, &resolver).await;

    if json {
        let entries: Vec<&SdkPackage> = packages.iter().map(|p| &**p).collect();
        let info = serde_json::json!({
            "root": sdk.root.display().to_string(),
            "emulatorHome": sdk.emulator_home.display().to_string(),
            "avdHome": sdk.avd_home.display().to_string(),
            "packages": entries,
        });
        println!("{info:#}");
        return Ok(());
    }

    println!("SDK root: {}", sdk.root.display());
    println!("Emulator home: {}", sdk.emulator_home.display());
    println!("AVD home: {}", sdk.avd_home.display());
    println!();
    if packages.is_empty() {
        println!("No SDK packages found");
    } else {
        println!("Installed packages:");
        for package in &packages {
            println!("  {} - {} ({})", package.path, package.name, package.version);
        }
    }
    Ok(())
}
