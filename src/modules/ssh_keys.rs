//! SSH key configuration module
//!
//! Top-level `ssh_authorized_keys` go to the default user: the first named
//! entry in `users`, or root when there is none.

use super::{PhaseContext, Step};
use crate::CloudApplyError;
use crate::config::Document;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Install authorized keys for the default user
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    let keys = doc.ssh_authorized_keys();
    if keys.is_empty() {
        return Ok(());
    }

    let username = doc.default_user().unwrap_or_else(|| "root".to_string());
    info!("Configuring {} SSH keys for user {}", keys.len(), username);

    let ssh_dir = get_user_home(&username).await.join(".ssh");
    let authorized_keys = ssh_dir.join("authorized_keys");

    let total = keys.len();
    for (i, key) in keys.iter().enumerate() {
        let mut step = Step::new(
            format!("authorize ssh key {}/{total} for {username}", i + 1),
            authorize_key_command(&username, &ssh_dir, key),
        );
        if i == 0 {
            step = step.backup(&authorized_keys);
        }
        ctx.exec(step).await?;
    }

    Ok(())
}

/// Append `key` unless already present, with 700/600 modes and user ownership
pub fn authorize_key_command(username: &str, ssh_dir: &Path, key: &str) -> String {
    let dir = shell_words::quote(&ssh_dir.to_string_lossy()).into_owned();
    let file =
        shell_words::quote(&ssh_dir.join("authorized_keys").to_string_lossy()).into_owned();
    let key = shell_words::quote(key);
    let user = shell_words::quote(username);

    format!(
        "mkdir -p {dir} && chmod 700 {dir} && touch {file} && chmod 600 {file} && \
         (grep -qxF {key} {file} || printf '%s\\n' {key} >> {file}) && chown -R {user}: {dir}"
    )
}

async fn get_user_home(username: &str) -> PathBuf {
    // Read /etc/passwd to find home directory
    if let Ok(passwd) = fs::read_to_string("/etc/passwd").await {
        for line in passwd.lines() {
            let fields: Vec<&str> = line.split(':').collect();
            if fields.len() >= 6 && fields[0] == username {
                return PathBuf::from(fields[5]);
            }
        }
    }

    // The user may not exist yet (dry run)
    if username == "root" {
        PathBuf::from("/root")
    } else {
        PathBuf::from(format!("/home/{}", username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_authorize_key_command() {
        let cmd = authorize_key_command(
            "deploy",
            Path::new("/home/deploy/.ssh"),
            "ssh-ed25519 AAAA deploy@laptop",
        );
        assert!(cmd.starts_with("mkdir -p /home/deploy/.ssh && chmod 700 /home/deploy/.ssh"));
        assert!(cmd.contains("grep -qxF 'ssh-ed25519 AAAA deploy@laptop' /home/deploy/.ssh/authorized_keys"));
        assert!(cmd.ends_with("chown -R deploy: /home/deploy/.ssh"));
    }

    #[tokio::test]
    async fn test_unknown_user_home() {
        let home = get_user_home("no-such-user-here").await;
        assert_eq!(home, PathBuf::from("/home/no-such-user-here"));
    }
}
