//! Runtime configuration (spec 9's ambient config concerns). There isn't
//! enough surface here to justify an external config crate; a small
//! struct with a sane [`Default`] does the job.

use std::time::Duration;

/// Knobs that affect how the core talks to the outside world. Currently
/// just the padding-oracle client's per-request network timeout.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub oracle_timeout: Duration,
}

impl Default for Config {
    fn default() -> Config {
        Config { oracle_timeout: Duration::from_secs(10) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_timeout_is_ten_seconds() {
        assert_eq!(Config::default().oracle_timeout, Duration::from_secs(10));
    }
}
