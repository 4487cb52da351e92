use rand::seq::SliceRandom;
use reqwest::Client;
use std::time::Duration;

use crate::error::Result;

/// Default identity, kept around for sources that notice agent rotation.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_12_5) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/59.0.3071.115 Safari/537.36";

/// Pool of browser identities rotated between sessions against sources that
/// ban by fingerprint.
pub const USER_AGENT_POOL: &[&str] = &[
    DEFAULT_USER_AGENT,
    "Mozilla/5.0 (compatible; MSIE 10.0; Macintosh; Intel Mac OS X 10_7_3; Trident/6.0)",
    "Mozilla/5.0 (compatible; MSIE 10.0; Windows NT 6.2; WOW64; Trident/6.0)",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_14_1) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/70.0.3538.110 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.13; rv:70.0) Gecko/20100101 Firefox/70.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10.14; rv:63.0) Gecko/20100101 Firefox/63.0",
    "Mozilla/5.0 (Windows NT 6.2; WOW64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/33.0.1750.146 Safari/537.36",
    "Mozilla/5.0 (Windows NT 6.2; WOW64; rv:28.0) Gecko/20100101 Firefox/28.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/33.0.1750.146 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:23.0) Gecko/20100101 Firefox/23.0",
];

pub fn random_user_agent() -> &'static str {
    USER_AGENT_POOL
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENT)
}

/// Plain client for sources without login walls.
pub fn build_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(DEFAULT_USER_AGENT)
        .timeout(Duration::from_secs(60))
        .gzip(true)
        .build()?;
    Ok(client)
}

/// Client with a cookie store, for form-login sources. A fresh call gives a
/// fresh jar, which is what a login rotation wants.
pub fn build_session_client() -> Result<Client> {
    let client = Client::builder()
        .user_agent(random_user_agent())
        .timeout(Duration::from_secs(60))
        .cookie_store(true)
        .gzip(true)
        .build()?;
    Ok(client)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_contains_chosen_agent() {
        let agent = random_user_agent();
        assert!(USER_AGENT_POOL.contains(&agent));
    }

    #[test]
    fn clients_build() {
        assert!(build_client().is_ok());
        assert!(build_session_client().is_ok());
    }
}
