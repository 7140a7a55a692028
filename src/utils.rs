use std::io::Read;
use std::path::Path;

use indicatif::ProgressStyle;
use serde::de::DeserializeOwned;

use crate::error::Result;

pub fn pb_style() -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}",
        )
        .expect("invalid progress template")
        .progress_chars("#>-")
}

/// Parse a JSON trigger event from a file, or from stdin when `path` is `-`
pub fn read_event<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let text = if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        text
    } else {
        std::fs::read_to_string(path)?
    };
    Ok(parse_event(&text)?)
}

pub fn parse_event<T: DeserializeOwned>(text: &str) -> Result<T> {
    Ok(serde_json::from_str(text)?)
}
