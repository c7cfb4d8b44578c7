//! Property-test run profile parsing for CI and local overrides.
//!
//! Centralises environment-driven proptest tuning so multiple suites share
//! one policy surface: the heavyweight merge-law suite defaults to its full
//! case count in CI while a developer can dial it down locally.

use std::env;

/// Environment variable controlling proptest case counts.
pub const ENGAWA_PBT_CASES_ENV_KEY: &str = "ENGAWA_PBT_CASES";
/// Environment variable controlling proptest process forking.
pub const ENGAWA_PBT_FORK_ENV_KEY: &str = "ENGAWA_PBT_FORK";

/// Runtime profile for property-test execution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ProptestRunProfile {
    cases: u32,
    fork: bool,
}

impl ProptestRunProfile {
    /// Load a profile from environment variables with provided defaults.
    ///
    /// Overrides that fail to parse are logged and ignored in favour of the
    /// defaults; a case count of zero counts as unparseable.
    ///
    /// # Examples
    ///
    /// ```
    /// use engawa_test_support::ProptestRunProfile;
    ///
    /// let profile = ProptestRunProfile::load(64, false);
    /// assert!(profile.cases() > 0);
    /// ```
    #[must_use]
    pub fn load(default_cases: u32, default_fork: bool) -> Self {
        Self {
            cases: env_override(ENGAWA_PBT_CASES_ENV_KEY, default_cases, |raw| {
                raw.trim().parse::<u32>().ok().filter(|&cases| cases > 0)
            }),
            fork: env_override(ENGAWA_PBT_FORK_ENV_KEY, default_fork, parse_switch),
        }
    }

    /// Number of cases to run per property.
    #[must_use]
    pub fn cases(&self) -> u32 {
        self.cases
    }

    /// Whether to run proptest cases in forked subprocesses.
    #[must_use]
    pub fn fork(&self) -> bool {
        self.fork
    }
}

/// Reads `key` and runs it through `parse`, falling back to `default` when
/// the variable is unset or unparseable.
fn env_override<T: Copy>(
    key: &'static str,
    default: T,
    parse: impl Fn(&str) -> Option<T>,
) -> T {
    let Ok(raw) = env::var(key) else {
        return default;
    };
    parse(&raw).unwrap_or_else(|| {
        tracing::warn!(env = key, raw = %raw, "unparseable property-test override ignored");
        default
    })
}

fn parse_switch(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
