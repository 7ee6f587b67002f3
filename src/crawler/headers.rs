//! Per-request header sets
//!
//! Each request gets a user agent drawn from the pool and client-hint headers
//! that agree with it, so a mobile agent never claims a desktop platform.

use crate::config::HeaderConfig;
use rand::Rng;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, COOKIE, REFERER, USER_AGENT,
};

const DEFAULT_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Safari/605.1.15",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; SM-S918N) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Mobile Safari/537.36",
];

const ACCEPT_VALUE: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8";

/// Header profile built from `[headers]`
#[derive(Debug, Clone)]
pub struct HeaderProfile {
    user_agents: Vec<String>,
    accept_language: String,
    cookie: Option<String>,
}

impl HeaderProfile {
    pub fn from_config(config: &HeaderConfig) -> Self {
        let user_agents = if config.user_agents.is_empty() {
            DEFAULT_USER_AGENTS.iter().map(|ua| ua.to_string()).collect()
        } else {
            config.user_agents.clone()
        };

        Self {
            user_agents,
            accept_language: config.accept_language.clone(),
            cookie: config.cookie.clone().filter(|c| !c.trim().is_empty()),
        }
    }

    /// Random user agent from the pool
    pub fn pick_user_agent(&self) -> &str {
        let index = rand::rng().random_range(0..self.user_agents.len());
        &self.user_agents[index]
    }

    /// Builds a fresh header set; `referer` is the product page when known
    pub fn build(&self, referer: Option<&str>) -> HeaderMap {
        let user_agent = self.pick_user_agent();
        let (platform, mobile) = platform_for(user_agent);

        let mut headers = HeaderMap::new();
        insert(&mut headers, USER_AGENT, user_agent);
        insert(&mut headers, ACCEPT, ACCEPT_VALUE);
        insert(&mut headers, ACCEPT_LANGUAGE, &self.accept_language);
        insert(
            &mut headers,
            HeaderName::from_static("sec-ch-ua-platform"),
            &format!("\"{}\"", platform),
        );
        insert(
            &mut headers,
            HeaderName::from_static("sec-ch-ua-mobile"),
            if mobile { "?1" } else { "?0" },
        );
        insert(&mut headers, HeaderName::from_static("sec-fetch-dest"), "empty");
        insert(&mut headers, HeaderName::from_static("sec-fetch-mode"), "cors");
        insert(&mut headers, HeaderName::from_static("sec-fetch-site"), "same-origin");
        if let Some(referer) = referer {
            insert(&mut headers, REFERER, referer);
        }
        if let Some(cookie) = &self.cookie {
            insert(&mut headers, COOKIE, cookie);
        }
        headers
    }
}

impl Default for HeaderProfile {
    fn default() -> Self {
        Self::from_config(&HeaderConfig::default())
    }
}

/// Client-hint platform and mobile flag implied by a user agent
fn platform_for(user_agent: &str) -> (&'static str, bool) {
    if user_agent.contains("iPhone") || user_agent.contains("iPad") {
        ("iOS", true)
    } else if user_agent.contains("Android") {
        ("Android", true)
    } else if user_agent.contains("Macintosh") {
        ("macOS", false)
    } else if user_agent.contains("Linux") || user_agent.contains("X11") {
        ("Linux", false)
    } else {
        ("Windows", false)
    }
}

fn insert(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => tracing::debug!("Dropping header {}: value is not valid", name),
    }
}
