//! Show the effective configuration and platform capabilities.

use std::path::Path;

use castline_platform_core::{capability_report, MediaDevices};
use castline_platform_synthetic::SyntheticPlatform;

use crate::config::CliConfig;

pub async fn run(config: &CliConfig, path: &Path) -> anyhow::Result<()> {
    println!("Castline System Check");
    println!("{}", "=".repeat(50));

    if path.exists() {
        println!("[OK] Config: {}", path.display());
    } else {
        println!("[--] Config: {} (not found, using defaults)", path.display());
    }
    match config.stream.validate() {
        Ok(()) => println!("[OK] Stream config is valid"),
        Err(e) => println!("[FAIL] Stream config: {e}"),
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&config.stream)?);
    println!();

    // Only the synthetic host ships with the CLI.
    let synthetic = SyntheticPlatform::new();
    let capabilities = capability_report(synthetic.devices.as_ref());
    println!("Platform capabilities (synthetic host):");
    for cap in &capabilities {
        let status = if cap.available { "OK" } else { "MISSING" };
        let required = if cap.required { "required" } else { "optional" };
        println!("  [{status}] {} ({required}): {}", cap.name, cap.description);
    }

    let devices = synthetic.devices.enumerate_devices().await?;
    println!();
    println!("Devices detected: {}", devices.len());
    for device in &devices {
        println!("  {:?} {} ({})", device.kind, device.id, device.label);
    }

    let all_required_ok = capabilities
        .iter()
        .filter(|c| c.required)
        .all(|c| c.available);

    println!();
    if all_required_ok && config.stream.validate().is_ok() {
        println!("All required capabilities are available. Castline is ready.");
    } else {
        println!("Some requirements are not met. See above for details.");
    }

    Ok(())
}
