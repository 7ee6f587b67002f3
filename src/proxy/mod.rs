//! Proxy rotation
//!
//! - `ProxyEndpoint`: parsed `ip:port[:user:pass]` entries
//! - `ProxyPool`: weighted selection, per-proxy concurrency cap, quarantine
//! - list loading from config and files, reachability checks

mod check;
mod endpoint;
mod pool;
mod source;

pub use check::{check_all, check_proxy, client_for_proxy};
pub use endpoint::ProxyEndpoint;
pub use pool::{
    lock_pool, PoolPolicy, ProxyHandle, ProxyLease, ProxyPool, ProxySnapshot, SharedProxyPool,
};
pub use source::{load_proxy_list, parse_proxy_list, proxies_from_config};
