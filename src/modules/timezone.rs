//! Timezone configuration module
//!
//! The pipeline skips this phase outright when validation found no zoneinfo
//! data for the requested zone.

use super::{PhaseContext, Step};
use crate::CloudApplyError;
use crate::config::Document;
use std::path::Path;

pub const LOCALTIME: &str = "/etc/localtime";
pub const ETC_TIMEZONE: &str = "/etc/timezone";

/// Set the system timezone
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    let Some(timezone) = doc.timezone() else {
        return Ok(());
    };

    let command = set_timezone_command(&ctx.config.zoneinfo_dir, &timezone);
    let step = Step::new(format!("set timezone to {timezone}"), command)
        .backup(LOCALTIME)
        .backup(ETC_TIMEZONE);
    ctx.exec(step).await
}

/// Try timedatectl first, then symlink /etc/localtime and write /etc/timezone
pub fn set_timezone_command(zoneinfo_dir: &Path, timezone: &str) -> String {
    let zone = shell_words::quote(timezone);
    let zoneinfo = zoneinfo_dir.join(timezone);
    let zoneinfo = shell_words::quote(&zoneinfo.to_string_lossy()).into_owned();

    format!(
        "timedatectl set-timezone {zone} 2>/dev/null || \
         {{ ln -sf {zoneinfo} {LOCALTIME} && printf '%s\\n' {zone} > {ETC_TIMEZONE}; }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_timezone_command() {
        let cmd = set_timezone_command(Path::new("/usr/share/zoneinfo"), "Europe/Berlin");
        assert!(cmd.starts_with("timedatectl set-timezone Europe/Berlin 2>/dev/null || "));
        assert!(cmd.contains("ln -sf /usr/share/zoneinfo/Europe/Berlin /etc/localtime"));
        assert!(cmd.ends_with("> /etc/timezone; }"));
    }
}
