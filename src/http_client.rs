use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT};

// stats.nba.com drops requests that do not look like they come from the site itself.
const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";
const STATS_ORIGIN: &str = "https://www.nba.com";
const STATS_REFERER: &str = "https://www.nba.com/";

pub fn http_client(timeout: Duration) -> Result<Client> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_USER_AGENT));
    headers.insert(ACCEPT, HeaderValue::from_static("application/json, text/plain, */*"));
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert(ORIGIN, HeaderValue::from_static(STATS_ORIGIN));
    headers.insert(REFERER, HeaderValue::from_static(STATS_REFERER));
    headers.insert("x-nba-stats-origin", HeaderValue::from_static("stats"));
    headers.insert("x-nba-stats-token", HeaderValue::from_static("true"));

    Client::builder()
        .default_headers(headers)
        .timeout(timeout)
        .build()
        .context("failed to build http client")
}

/// Enforces a minimum gap between the end of one external call and the start
/// of the next, across every caller sharing the throttle.
#[derive(Debug)]
pub struct Throttle {
    cooldown: Duration,
    last_finished: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            last_finished: Mutex::new(None),
        }
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Waits out the cooldown, runs `call`, then restarts the cooldown
    /// regardless of whether the call succeeded.
    pub fn run<T>(&self, call: impl FnOnce() -> T) -> T {
        // Holding the lock for the whole call keeps calls strictly sequential.
        let mut guard = match self.last_finished.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(last) = *guard {
            let ready_at = last + self.cooldown;
            let now = Instant::now();
            if ready_at > now {
                thread::sleep(ready_at - now);
            }
        }
        let out = call();
        *guard = Some(Instant::now());
        out
    }
}
