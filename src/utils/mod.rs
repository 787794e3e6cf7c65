pub mod logging;

use anyhow::{Context, Result};

/// This host's name up to the first `.`.
pub fn local_short_hostname() -> Result<String> {
    let name = hostname::get().context("Unable to read the local host name")?;
    let name = name
        .into_string()
        .map_err(|raw| anyhow::anyhow!("Local host name is not valid UTF-8: {:?}", raw))?;
    Ok(short_hostname(&name).to_string())
}

pub fn short_hostname(name: &str) -> &str {
    name.split('.').next().unwrap_or(name)
}
