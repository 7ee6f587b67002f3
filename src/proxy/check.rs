use crate::proxy::ProxyEndpoint;
use reqwest::{Client, Proxy};
use std::time::Duration;

/// Builds a client that sends every request through `endpoint`
pub fn client_for_proxy(
    endpoint: &ProxyEndpoint,
    connect_timeout: Duration,
    timeout: Duration,
    accept_invalid_certs: bool,
) -> Result<Client, reqwest::Error> {
    let mut proxy = Proxy::all(endpoint.proxy_url())?;
    if let Some((user, pass)) = endpoint.credentials() {
        proxy = proxy.basic_auth(user, pass);
    }

    Client::builder()
        .proxy(proxy)
        .connect_timeout(connect_timeout)
        .timeout(timeout)
        .danger_accept_invalid_certs(accept_invalid_certs)
        .gzip(true)
        .brotli(true)
        .build()
}

/// Returns true if `check_url` answers with a 2xx through `endpoint`
pub async fn check_proxy(endpoint: &ProxyEndpoint, check_url: &str, timeout: Duration) -> bool {
    let client = match client_for_proxy(endpoint, timeout, timeout, false) {
        Ok(client) => client,
        Err(e) => {
            tracing::debug!("Proxy {}: client build failed: {}", endpoint, e);
            return false;
        }
    };

    match client.get(check_url).send().await {
        Ok(response) => {
            let ok = response.status().is_success();
            tracing::debug!("Proxy {}: check status {}", endpoint, response.status());
            ok
        }
        Err(e) => {
            tracing::debug!("Proxy {}: check failed: {}", endpoint, e);
            false
        }
    }
}

/// Checks every endpoint concurrently, returning `(endpoint, reachable)` in input order
pub async fn check_all(
    endpoints: &[ProxyEndpoint],
    check_url: &str,
    timeout: Duration,
) -> Vec<(ProxyEndpoint, bool)> {
    let mut tasks = tokio::task::JoinSet::new();
    for (index, endpoint) in endpoints.iter().cloned().enumerate() {
        let url = check_url.to_string();
        tasks.spawn(async move {
            let ok = check_proxy(&endpoint, &url, timeout).await;
            (index, endpoint, ok)
        });
    }

    let mut results = Vec::with_capacity(endpoints.len());
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok(result) => results.push(result),
            Err(e) => tracing::warn!("Proxy check task failed: {}", e),
        }
    }

    results.sort_by_key(|(index, _, _)| *index);
    results
        .into_iter()
        .map(|(_, endpoint, ok)| (endpoint, ok))
        .collect()
}
