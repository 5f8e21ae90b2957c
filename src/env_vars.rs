//! One getter function per `BERKSHELF_*`/`CHEF_*` environment variable,
//! mirroring the teacher's `env_vars` module shape.

use std::time::Duration;

#[must_use]
pub fn cache_path() -> Option<String> {
    std::env::var("BERKSHELF_CACHE_PATH").ok()
}

#[must_use]
pub fn default_sources() -> Option<Vec<String>> {
    std::env::var("BERKSHELF_DEFAULT_SOURCES").ok().map(|v| split_csv(&v))
}

#[must_use]
pub fn ssl_verify() -> Option<bool> {
    std::env::var("BERKSHELF_SSL_VERIFY").ok().map(|v| parse_bool(&v))
}

fn split_csv(value: &str) -> Vec<String> {
    value.split(',').map(str::trim).map(str::to_string).collect()
}

fn parse_bool(value: &str) -> bool {
    !matches!(value, "0" | "false" | "no")
}

#[must_use]
pub fn proxy() -> Option<String> {
    std::env::var("BERKSHELF_PROXY").ok()
}

#[must_use]
pub fn no_proxy() -> Option<Vec<String>> {
    std::env::var("BERKSHELF_NO_PROXY")
        .ok()
        .map(|v| v.split(',').map(str::trim).map(str::to_string).collect())
}

#[must_use]
pub fn api_timeout() -> Option<Duration> {
    std::env::var("BERKSHELF_API_TIMEOUT")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_secs)
}

#[must_use]
pub fn retry_count() -> Option<u32> {
    std::env::var("BERKSHELF_RETRY_COUNT").ok().and_then(|v| v.parse().ok())
}

#[must_use]
pub fn retry_delay() -> Option<Duration> {
    std::env::var("BERKSHELF_RETRY_DELAY")
        .ok()
        .and_then(|v| v.parse().ok())
        .map(Duration::from_millis)
}

#[must_use]
pub fn concurrency() -> Option<usize> {
    std::env::var("BERKSHELF_CONCURRENCY").ok().and_then(|v| v.parse().ok())
}

#[must_use]
pub fn chef_server_url() -> Option<String> {
    std::env::var("CHEF_SERVER_URL").ok()
}

#[must_use]
pub fn chef_node_name() -> Option<String> {
    std::env::var("CHEF_NODE_NAME").ok()
}

#[must_use]
pub fn chef_client_key() -> Option<String> {
    std::env::var("CHEF_CLIENT_KEY").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_falsy_values() {
        assert!(!parse_bool("false"));
        assert!(!parse_bool("0"));
        assert!(!parse_bool("no"));
        assert!(parse_bool("true"));
        assert!(parse_bool("yes"));
    }

    #[test]
    fn splits_and_trims_csv() {
        assert_eq!(
            split_csv("a, b,c"),
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }
}
