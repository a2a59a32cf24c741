//! MD5 command - Digest of a file and of the argument itself

use std::path::Path;

use anyhow::Result;
use clap::Args;
use pcsync_sync::filesystem::md5_file;

use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Args)]
pub struct Md5Command {
    /// File path or arbitrary string
    pub value: String,
}

/// Digests printed for `value`: the file's, when it names a regular file,
/// then always the string's
pub async fn digests(value: &str) -> Result<(Option<String>, String)> {
    let path = Path::new(value);
    let file = if tokio::fs::metadata(path).await.is_ok_and(|m| m.is_file()) {
        let owned = path.to_path_buf();
        Some(tokio::task::spawn_blocking(move || md5_file(&owned)).await??)
    } else {
        None
    };
    let string = format!("{:x}", md5::compute(value.as_bytes()));
    Ok((file, string))
}

impl Md5Command {
    pub async fn execute(&self, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format.is_json());
        let (file, string) = digests(&self.value).await?;

        if format.is_json() {
            formatter.print_json(&serde_json::json!({
                "value": self.value,
                "file_md5": file,
                "string_md5": string,
            }));
            return Ok(());
        }

        let mut out = String::new();
        if let Some(file) = file {
            out.push_str(&format!("File: {}\nMD5: {}\n", self.value, file));
        }
        out.push_str(&format!("String: {}\nMD5: {}\n", self.value, string));
        formatter.text(&out);
        Ok(())
    }
}
