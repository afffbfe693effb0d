//! `KEY=VALUE` environment files.
//!
//! Accepts the shell-ish subset people actually write:
//!
//! ```text
//! # provider keys
//! export OPENAI_API_KEY=sk-...
//! ANTHROPIC_API_KEY="sk-ant-..."
//! GW_NAME='my gateway'
//! ```

use anyhow::{anyhow, Context, Result};
use std::collections::HashMap;
use std::path::Path;

/// Read and parse an environment file.
pub fn load(path: &Path) -> Result<HashMap<String, String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read env file: {}", path.display()))?;

    parse(&content).with_context(|| format!("Invalid env file: {}", path.display()))
}

/// Parse environment file content. Later assignments win.
pub fn parse(content: &str) -> Result<HashMap<String, String>> {
    let mut vars = HashMap::new();

    for (index, raw) in content.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let line = line.strip_prefix("export ").map(str::trim_start).unwrap_or(line);

        let (key, value) = line
            .split_once('=')
            .ok_or_else(|| anyhow!("line {}: expected KEY=VALUE", index + 1))?;

        let key = key.trim();
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(anyhow!("line {}: invalid variable name {:?}", index + 1, key));
        }

        vars.insert(key.to_string(), unquote(value.trim()).to_string());
    }

    Ok(vars)
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
