//! Turning raw user input into a resolved [`Item`].

use std::time::Duration;

use url::Url;

use playqueue_types::Item;

use crate::adapters::Resolver;
use crate::error::ResolveError;

/// Hosts whose links are looked up directly instead of searched.
pub const DEFAULT_DIRECT_HOSTS: &[&str] = &["youtube.com", "youtu.be"];
const SEARCH_RETRY_STEP: Duration = Duration::from_secs(2);
const SEARCH_RETRY_CAP: Duration = Duration::from_secs(8);

/// What the caller asked to play.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TrackRequest {
    Search(String),
    Locator(String),
    Resolved(Item),
}

impl TrackRequest {
    /// Classify free-form input. Links to one of `direct_hosts` (or a
    /// subdomain of one) become locators, everything else is a search.
    pub fn parse(input: &str, direct_hosts: &[String]) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if is_direct_link(input, direct_hosts) {
            return Some(TrackRequest::Locator(input.to_string()));
        }
        // Links pasted without a scheme, e.g. `youtu.be/abc`.
        if !input.contains("://") && !input.contains(char::is_whitespace) {
            let prefixed = format!("https://{input}");
            if is_direct_link(&prefixed, direct_hosts) {
                return Some(TrackRequest::Locator(prefixed));
            }
        }
        Some(TrackRequest::Search(input.to_string()))
    }
}

fn is_direct_link(input: &str, direct_hosts: &[String]) -> bool {
    let Ok(url) = Url::parse(input) else {
        return false;
    };
    if !matches!(url.scheme(), "http" | "https") {
        return false;
    }
    url.host_str().is_some_and(|host| {
        let host = host.to_ascii_lowercase();
        direct_hosts.iter().any(|allowed| {
            let allowed = allowed.to_ascii_lowercase();
            host == allowed || host.ends_with(&format!(".{allowed}"))
        })
    })
}

/// Resolve `request`, retrying searches that failed on a blocking upstream
/// error up to `search_retries` times.
pub async fn resolve_request(
    resolver: &dyn Resolver,
    request: TrackRequest,
    search_retries: u32,
) -> Result<Item, ResolveError> {
    match request {
        TrackRequest::Resolved(item) => Ok(item),
        TrackRequest::Locator(locator) => resolver.lookup(&locator).await,
        TrackRequest::Search(query) => {
            let mut retry = 0u32;
            loop {
                match resolver.search(&query).await {
                    Ok(item) => return Ok(item),
                    Err(err) if err.class().is_blocking() && retry < search_retries => {
                        retry += 1;
                        let wait = search_retry_delay(retry);
                        tracing::warn!(
                            query = %query,
                            retry,
                            wait_ms = wait.as_millis() as u64,
                            error = %err,
                            "search blocked, retrying"
                        );
                        tokio::time::sleep(wait).await;
                    }
                    Err(err) => return Err(err),
                }
            }
        }
    }
}

fn search_retry_delay(retry: u32) -> Duration {
    (SEARCH_RETRY_STEP * retry).min(SEARCH_RETRY_CAP)
}
