//! User creation module
//!
//! Only the user name is consumed; accounts that already exist are left as is.

use super::{PhaseContext, Step};
use crate::CloudApplyError;
use crate::config::Document;
use tracing::info;

/// Create users from cloud-config, in document order
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    for (index, entry) in doc.users().into_iter().enumerate() {
        let name = match entry {
            Ok(user) => user.name,
            Err(_) => None,
        };
        let Some(name) = name else {
            info!("Skipping users[{}]: no usable name", index);
            continue;
        };

        ctx.exec(Step::new(format!("create user {name}"), create_user_command(&name)))
            .await?;
    }
    Ok(())
}

/// `useradd` guarded by an existence check
pub fn create_user_command(name: &str) -> String {
    let name = shell_words::quote(name);
    format!("id -u {name} >/dev/null 2>&1 || useradd --create-home {name}")
}
