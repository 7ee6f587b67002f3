use crate::config::ProxyConfig;
use crate::proxy::ProxyEndpoint;
use crate::ConfigResult;
use std::path::Path;

/// Reads a proxy list file
///
/// One entry per line. Blank lines and `#` comments are skipped; malformed
/// lines are logged and skipped so one typo does not sink the whole list.
pub fn load_proxy_list(path: &Path) -> ConfigResult<Vec<ProxyEndpoint>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_proxy_list(&content))
}

/// Parses proxy list text, see [`load_proxy_list`]
pub fn parse_proxy_list(content: &str) -> Vec<ProxyEndpoint> {
    content
        .lines()
        .enumerate()
        .filter_map(|(number, line)| {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                return None;
            }
            match ProxyEndpoint::parse(line) {
                Ok(endpoint) => Some(endpoint),
                Err(e) => {
                    tracing::warn!("Skipping proxy list line {}: {}", number + 1, e);
                    None
                }
            }
        })
        .collect()
}

/// All proxies named by the configuration: inline entries first, then the file
pub fn proxies_from_config(config: &ProxyConfig) -> ConfigResult<Vec<ProxyEndpoint>> {
    let mut endpoints = config
        .addresses
        .iter()
        .map(|entry| ProxyEndpoint::parse(entry))
        .collect::<ConfigResult<Vec<_>>>()?;

    if let Some(file) = &config.file {
        let from_file = load_proxy_list(Path::new(file))?;
        tracing::info!("Loaded {} proxies from {}", from_file.len(), file);
        endpoints.extend(from_file);
    }

    Ok(endpoints)
}
