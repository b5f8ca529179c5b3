//! Package management module
//!
//! Installs packages using the appropriate package manager (apt, yum, dnf, zypper, apk).

use super::{PhaseContext, Step};
use crate::CloudApplyError;
use crate::config::Document;
use std::str::FromStr;
use tracing::{debug, info, warn};

/// Detected package manager
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Apt,
    Dnf,
    Yum,
    Zypper,
    Apk,
}

impl PackageManager {
    /// Detect the system's package manager
    pub async fn detect() -> Option<Self> {
        // Check in order of preference
        for (binary, pm) in [
            ("apt-get", Self::Apt),
            ("dnf", Self::Dnf),
            ("yum", Self::Yum),
            ("zypper", Self::Zypper),
            ("apk", Self::Apk),
        ] {
            if command_exists(binary).await {
                return Some(pm);
            }
        }
        None
    }

    fn install_prefix(&self) -> &'static str {
        match self {
            Self::Apt => "apt-get install -y",
            Self::Dnf => "dnf install -y",
            Self::Yum => "yum install -y",
            Self::Zypper => "zypper --non-interactive install",
            Self::Apk => "apk add --no-cache",
        }
    }

    /// Command installing a single package
    pub fn install_command(&self, package: &str) -> String {
        format!(
            "{} {}",
            self.install_prefix(),
            shell_words::quote(package)
        )
    }

    /// Command refreshing the package index
    pub fn update_command(&self) -> &'static str {
        match self {
            Self::Apt => "apt-get update",
            Self::Dnf => "dnf makecache",
            Self::Yum => "yum makecache",
            Self::Zypper => "zypper --non-interactive refresh",
            Self::Apk => "apk update",
        }
    }

    /// Command upgrading every installed package
    pub fn upgrade_command(&self) -> &'static str {
        match self {
            Self::Apt => "apt-get upgrade -y",
            Self::Dnf => "dnf upgrade -y",
            Self::Yum => "yum update -y",
            Self::Zypper => "zypper --non-interactive update",
            Self::Apk => "apk upgrade",
        }
    }
}

impl std::fmt::Display for PackageManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Apt => write!(f, "apt"),
            Self::Dnf => write!(f, "dnf"),
            Self::Yum => write!(f, "yum"),
            Self::Zypper => write!(f, "zypper"),
            Self::Apk => write!(f, "apk"),
        }
    }
}

impl FromStr for PackageManager {
    type Err = CloudApplyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "apt" | "apt-get" => Ok(Self::Apt),
            "dnf" => Ok(Self::Dnf),
            "yum" => Ok(Self::Yum),
            "zypper" => Ok(Self::Zypper),
            "apk" => Ok(Self::Apk),
            other => Err(CloudApplyError::Usage(format!(
                "unknown package manager '{other}'"
            ))),
        }
    }
}

/// Check if a command exists
async fn command_exists(cmd: &str) -> bool {
    tokio::process::Command::new("which")
        .arg(cmd)
        .output()
        .await
        .is_ok_and(|o| o.status.success())
}

/// Install packages, refreshing/upgrading first when requested
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    let packages = doc.packages();
    let update = doc.flag("package_update");
    let upgrade = doc.flag("package_upgrade");

    if packages.is_empty() && !update && !upgrade {
        return Ok(());
    }

    let pm = resolve_package_manager(ctx).await?;
    info!("Installing {} packages using {}", packages.len(), pm);
    debug!("Packages: {:?}", packages);

    // Index refresh and upgrade issues are often transient; never fatal
    if update {
        ctx.exec(Step::new("update package cache", pm.update_command()).allow_failure(true))
            .await?;
    }
    if upgrade {
        ctx.exec(Step::new("upgrade installed packages", pm.upgrade_command()).allow_failure(true))
            .await?;
    }

    for package in &packages {
        ctx.exec(Step::new(format!("install {package}"), pm.install_command(package)))
            .await?;
    }

    Ok(())
}

async fn resolve_package_manager(ctx: &PhaseContext<'_>) -> Result<PackageManager, CloudApplyError> {
    if let Some(pm) = ctx.config.package_manager {
        return Ok(pm);
    }
    if let Some(pm) = PackageManager::detect().await {
        return Ok(pm);
    }
    if ctx.config.is_execute() {
        return Err(CloudApplyError::DependencyUnavailable(
            "no supported package manager found".to_string(),
        ));
    }
    warn!("No supported package manager found; showing apt commands");
    Ok(PackageManager::Apt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_install_command_quotes() {
        assert_eq!(
            PackageManager::Apt.install_command("curl"),
            "apt-get install -y curl"
        );
        assert_eq!(
            PackageManager::Apk.install_command("evil; rm -rf /"),
            "apk add --no-cache 'evil; rm -rf /'"
        );
    }

    #[test]
    fn test_from_str() {
        assert_eq!("APT".parse::<PackageManager>().unwrap(), PackageManager::Apt);
        assert_eq!(
            "zypper".parse::<PackageManager>().unwrap(),
            PackageManager::Zypper
        );
        assert!("pacman".parse::<PackageManager>().is_err());
    }

    #[test]
    fn test_display_round_trips() {
        for pm in [
            PackageManager::Apt,
            PackageManager::Dnf,
            PackageManager::Yum,
            PackageManager::Zypper,
            PackageManager::Apk,
        ] {
            assert_eq!(pm.to_string().parse::<PackageManager>().unwrap(), pm);
        }
    }
}
