//! Locale configuration module

use super::{PhaseContext, Step};
use crate::CloudApplyError;
use crate::config::Document;

pub const DEFAULT_LOCALE: &str = "/etc/default/locale";
pub const LOCALE_CONF: &str = "/etc/locale.conf";

/// Generate and set the system locale
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    let Some(locale) = doc.locale() else {
        return Ok(());
    };

    ctx.exec(Step::new(
        format!("generate locale {locale}"),
        generate_locale_command(&locale),
    ))
    .await?;

    let step = Step::new(format!("set locale to {locale}"), set_locale_command(&locale))
        .backup(DEFAULT_LOCALE)
        .backup(LOCALE_CONF);
    ctx.exec(step).await
}

/// locale-gen only exists on Debian-style systems
pub fn generate_locale_command(locale: &str) -> String {
    format!(
        "if command -v locale-gen >/dev/null 2>&1; then locale-gen {}; fi",
        shell_words::quote(locale)
    )
}

/// Try localectl; otherwise write both the systemd and Debian locale files
pub fn set_locale_command(locale: &str) -> String {
    let lang = format!("LANG={}", shell_words::quote(locale));
    format!(
        "localectl set-locale {lang} 2>/dev/null || \
         {{ printf '%s\\n' {lang} > {LOCALE_CONF} && mkdir -p /etc/default && \
         printf '%s\\n' {lang} > {DEFAULT_LOCALE}; }}"
    )
}
