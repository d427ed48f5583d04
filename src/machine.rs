//! Machine identity: a stable fingerprint for the current host.
//!
//! The fingerprint is a sha256 over host attributes that survive reboots:
//! OS family, architecture, hostname, CPU descriptor and, where available,
//! the OS machine id. Fingerprint drift (hardware replacement, renamed
//! host) is an accepted non-goal; callers persist bindings, not
//! fingerprints in isolation.

use sha2::{Digest, Sha256};
use std::env;

/// Derives the fingerprint for the current machine. Deterministic across
/// repeated calls on the same host.
pub fn fingerprint() -> String {
    let mut parts = vec![
        env::consts::OS.to_string(),
        env::consts::ARCH.to_string(),
        current_hostname(),
        cpu_descriptor(),
    ];
    if let Some(id) = hardware_id() {
        parts.push(id);
    }
    hex::encode(Sha256::digest(parts.join("|").as_bytes()))
}

fn current_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

fn cpu_descriptor() -> String {
    #[cfg(target_os = "linux")]
    {
        let model = std::fs::read_to_string("/proc/cpuinfo").ok().and_then(|cpuinfo| {
            cpuinfo
                .lines()
                .find(|line| line.starts_with("model name"))
                .and_then(|line| line.split(':').nth(1))
                .map(|s| s.trim().to_string())
        });
        if let Some(model) = model {
            return model;
        }
    }

    #[cfg(target_os = "macos")]
    {
        let brand = std::process::Command::new("sysctl")
            .args(["-n", "machdep.cpu.brand_string"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        if let Some(brand) = brand {
            return brand;
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Ok(id) = env::var("PROCESSOR_IDENTIFIER") {
            return id;
        }
    }

    env::consts::ARCH.to_string()
}

/// A hardware-rooted identifier for this install, when the platform
/// exposes one.
fn hardware_id() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/etc/machine-id")
            .or_else(|_| std::fs::read_to_string("/var/lib/dbus/machine-id"))
            .ok()
            .map(|s| s.trim().to_string())
    }

    #[cfg(target_os = "macos")]
    {
        std::process::Command::new("ioreg")
            .args(["-rd1", "-c", "IOPlatformExpertDevice"])
            .output()
            .ok()
            .and_then(|o| String::from_utf8(o.stdout).ok())
            .and_then(|out| {
                out.lines()
                    .find(|line| line.contains("IOPlatformUUID"))
                    .and_then(|line| line.split('"').nth(3))
                    .map(String::from)
            })
    }

    #[cfg(target_os = "windows")]
    {
        use winreg::RegKey;
        use winreg::enums::HKEY_LOCAL_MACHINE;

        RegKey::predef(HKEY_LOCAL_MACHINE)
            .open_subkey("SOFTWARE\\Microsoft\\Cryptography")
            .and_then(|key| key.get_value::<String, _>("MachineGuid"))
            .ok()
    }

    #[cfg(not(any(target_os = "linux", target_os = "macos", target_os = "windows")))]
    {
        None
    }
}
