//! Write files module

use super::{PhaseContext, Step};
use crate::CloudApplyError;
use crate::config::{Document, FileRecord};
use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use flate2::read::GzDecoder;
use std::io::Read;
use std::path::Path;
use tracing::{info, warn};

const ENCODINGS: &[&str] = &[
    "base64",
    "b64",
    "gzip",
    "gz",
    "gz+base64",
    "gzip+base64",
    "gz+b64",
    "b64+gzip",
    "base64+gzip",
];

/// Write files from cloud-config
///
/// Entries whose content cannot be decoded are skipped with a warning, the
/// same as malformed records.
pub async fn apply(doc: &Document, ctx: &mut PhaseContext<'_>) -> Result<(), CloudApplyError> {
    for (index, entry) in doc.write_files().into_iter().enumerate() {
        let file = match entry {
            Ok(file) => file,
            Err(_) => {
                info!("Skipping write_files[{}]: malformed entry", index);
                continue;
            }
        };

        let content = match decode_content(file.content(), file.encoding.as_deref()) {
            Ok(content) => content,
            Err(e) => {
                warn!("Skipping write_files[{}] ({}): {}", index, file.path, e);
                continue;
            }
        };
        let description = if file.is_append() {
            format!("append to {}", file.path)
        } else {
            format!("write {}", file.path)
        };

        let staged = ctx.stage(&content).await?;
        ctx.exec(Step::new(description, write_file_command(&file, &staged)).backup(&file.path))
            .await?;
    }
    Ok(())
}

pub fn is_known_encoding(encoding: &str) -> bool {
    ENCODINGS.contains(&encoding)
}

/// Shell command copying the staged content at `staged` to the file's path
pub fn write_file_command(file: &FileRecord, staged: &Path) -> String {
    let path = Path::new(&file.path);
    let target = shell_words::quote(&file.path);
    let redirect = if file.is_append() { ">>" } else { ">" };

    let mut cmd = String::new();
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        cmd.push_str(&format!(
            "mkdir -p {} && ",
            shell_words::quote(&parent.to_string_lossy())
        ));
    }
    cmd.push_str(&format!(
        "cat {} {redirect} {target} && chmod {} {target}",
        shell_words::quote(&staged.to_string_lossy()),
        shell_words::quote(file.permissions()),
    ));
    if let Some(owner) = &file.owner {
        cmd.push_str(&format!(" && chown {} {target}", shell_words::quote(owner)));
    }
    cmd
}

/// Decode content based on encoding type
fn decode_content(content: &str, encoding: Option<&str>) -> Result<Vec<u8>, CloudApplyError> {
    match encoding {
        Some("base64") | Some("b64") => BASE64
            .decode(content.trim())
            .map_err(|e| CloudApplyError::InvalidData(format!("Invalid base64: {}", e))),
        Some("gzip") | Some("gz") => {
            // Content is raw gzip bytes (unusual but supported)
            decompress_gzip(content.as_bytes())
        }
        Some("gz+base64") | Some("gzip+base64") | Some("gz+b64") | Some("b64+gzip")
        | Some("base64+gzip") => {
            // Base64-encoded gzip data (most common)
            let decoded = BASE64
                .decode(content.trim())
                .map_err(|e| CloudApplyError::InvalidData(format!("Invalid base64: {}", e)))?;
            decompress_gzip(&decoded)
        }
        Some(other) => Err(CloudApplyError::InvalidData(format!(
            "Unknown encoding: {}",
            other
        ))),
        None => Ok(content.as_bytes().to_vec()),
    }
}

/// Decompress gzip data
fn decompress_gzip(data: &[u8]) -> Result<Vec<u8>, CloudApplyError> {
    let mut decoder = GzDecoder::new(data);
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| CloudApplyError::InvalidData(format!("Failed to decompress gzip: {}", e)))?;
    Ok(decompressed)
}
