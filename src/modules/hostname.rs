//! Hostname configuration module

use super::{PhaseContext, Step};
use crate::CloudApplyError;
use crate::config::Document;

pub const HOSTNAME_FILE: &str = "/etc/hostname";

/// Set the system hostname
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    let Some(hostname) = doc.hostname() else {
        return Ok(());
    };

    let step = Step::new(
        format!("set hostname to {hostname}"),
        set_hostname_command(&hostname),
    )
    .backup(HOSTNAME_FILE);
    ctx.exec(step).await
}

/// Prefer hostnamectl; otherwise write /etc/hostname and apply it immediately
pub fn set_hostname_command(hostname: &str) -> String {
    let name = shell_words::quote(hostname);
    format!(
        "hostnamectl set-hostname {name} 2>/dev/null || \
         {{ printf '%s\\n' {name} > {HOSTNAME_FILE} && hostname {name}; }}"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_hostname_command() {
        assert_eq!(
            set_hostname_command("srv1"),
            "hostnamectl set-hostname srv1 2>/dev/null || \
             { printf '%s\\n' srv1 > /etc/hostname && hostname srv1; }"
        );
    }
}
