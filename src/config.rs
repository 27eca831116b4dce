//! Configuration for provider access, retries and mirroring.
//!
//! Secrets such as API keys are injected here instead of being compiled in.
//! Every field has a default so a partial TOML file is enough:
//!
//! ```toml
//! request_timeout = 10
//! max_retries = 2
//!
//! [lastfm]
//! api_key = "..."
//!
//! [tidal]
//! token = "..."
//! country_code = "NL"
//!
//! [mirror]
//! providers = ["sliderkz"]
//! duration_tolerance_ms = 2000
//! match = "exact"
//! ```

use std::{fs, path::Path, time::Duration};

use serde::Deserialize;
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use veil::Redact;

use crate::error::{Error, Result};

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Name and version sent to providers that do not mandate their own
    /// `User-Agent`.
    pub user_agent: String,

    /// Per-call timeout. Expiry is what triggers the retry policy.
    #[serde_as(as = "DurationSeconds<u64>")]
    pub request_timeout: Duration,

    /// Additional attempts after a timed out request.
    pub max_retries: u32,

    /// Delay before the first retry; later retries back off exponentially.
    #[serde(rename = "retry_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_delay: Duration,

    /// Upper bound for the backoff delay.
    #[serde(rename = "retry_max_delay_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_max_delay: Duration,

    pub lastfm: LastFm,
    pub tidal: Tidal,
    pub sliderkz: SliderKz,
    pub mirror: Mirror,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Redact)]
#[serde(default)]
pub struct LastFm {
    #[redact]
    pub api_key: String,
    pub search_limit: usize,
}

#[derive(Clone, PartialEq, Eq, Deserialize, Redact)]
#[serde(default)]
pub struct Tidal {
    #[redact]
    pub token: String,
    pub country_code: String,
    pub search_limit: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SliderKz {
    pub base_url: String,
}

#[serde_as]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Mirror {
    /// Mirror providers by name, in the order they are tried.
    pub providers: Vec<String>,

    /// Maximum difference between the original and the candidate duration.
    #[serde(rename = "duration_tolerance_ms")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub duration_tolerance: Duration,

    #[serde(rename = "match")]
    pub matching: MatchPolicy,
}

/// How strictly a mirror candidate must agree with the original track.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// Normalized title and artist must be equal.
    #[default]
    Exact,

    /// Normalized title and artist of one must contain the other's.
    Loose,
}

impl Config {
    /// Largest configuration file that will be read.
    const MAX_FILE_SIZE: u64 = 64 * 1024;

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Will return `Err` if the file cannot be read, is larger than 64 KiB
    /// or is not valid TOML for this structure.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        // Prevent out-of-memory condition: configuration should be small.
        let file_size = fs::metadata(path)?.len();
        if file_size > Self::MAX_FILE_SIZE {
            return Err(Error::invalid_argument(format!(
                "{} is too large ({file_size} bytes)",
                path.display()
            )));
        }

        let contents = fs::read_to_string(path)?;
        contents.parse()
    }

    /// Validates values that deserialize fine but cannot work.
    ///
    /// # Errors
    ///
    /// Will return `Err` if a search limit is zero or the request timeout is
    /// zero.
    pub fn validate(&self) -> Result<()> {
        if self.request_timeout.is_zero() {
            return Err(Error::invalid_argument("request timeout must not be zero"));
        }
        if self.lastfm.search_limit == 0 || self.tidal.search_limit == 0 {
            return Err(Error::invalid_argument("search limit must not be zero"));
        }
        if self.tidal.country_code.chars().count() != 2 {
            return Err(Error::invalid_argument(format!(
                "country code \"{}\" is not two characters",
                self.tidal.country_code
            )));
        }
        Ok(())
    }
}

impl std::str::FromStr for Config {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let config: Self = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for Config {
    fn default() -> Self {
        let app_name = env!("CARGO_PKG_NAME");
        let app_version = env!("CARGO_PKG_VERSION");

        Self {
            user_agent: format!("{app_name}/{app_version} (Rust)"),
            request_timeout: Duration::from_secs(10),
            max_retries: 2,
            retry_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_secs(2),
            lastfm: LastFm::default(),
            tidal: Tidal::default(),
            sliderkz: SliderKz::default(),
            mirror: Mirror::default(),
        }
    }
}

impl Default for LastFm {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            search_limit: 6,
        }
    }
}

impl Default for Tidal {
    fn default() -> Self {
        Self {
            token: String::new(),
            country_code: "US".to_owned(),
            search_limit: 7,
        }
    }
}

impl Default for SliderKz {
    fn default() -> Self {
        Self {
            base_url: "https://hayqbhgr.slider.kz/".to_owned(),
        }
    }
}

impl Default for Mirror {
    fn default() -> Self {
        Self {
            providers: vec!["sliderkz".to_owned()],
            duration_tolerance: Duration::from_secs(2),
            matching: MatchPolicy::Exact,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config: Config = r#"
            max_retries = 4

            [lastfm]
            api_key = "secret"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.max_retries, 4);
        assert_eq!(config.lastfm.api_key, "secret");
        assert_eq!(config.lastfm.search_limit, 6);
        assert_eq!(config.tidal.country_code, "US");
        assert_eq!(config.request_timeout, Duration::from_secs(10));
        assert_eq!(config.mirror.providers, vec!["sliderkz".to_owned()]);
    }

    #[test]
    fn durations_use_their_units() {
        let config: Config = r#"
            request_timeout = 3
            retry_delay_ms = 5

            [mirror]
            duration_tolerance_ms = 1500
            match = "loose"
        "#
        .parse()
        .unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(3));
        assert_eq!(config.retry_delay, Duration::from_millis(5));
        assert_eq!(config.mirror.duration_tolerance, Duration::from_millis(1500));
        assert_eq!(config.mirror.matching, MatchPolicy::Loose);
    }

    #[test]
    fn secrets_are_redacted() {
        let mut config = Config::default();
        config.lastfm.api_key = "hunter2".to_owned();
        config.tidal.token = "swordfish".to_owned();

        let debug = format!("{config:?}");
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("swordfish"));
    }

    #[test]
    fn zero_search_limit_is_rejected() {
        let result = "[tidal]\nsearch_limit = 0".parse::<Config>();
        assert!(result.is_err());
    }
}
