//! Analysis options.

use std::sync::OnceLock;

/// Environment variable read by [`LivenessOptions::from_env`].
pub const DEBUG_ENV_VAR: &str = "ORI_DEBUG_LIVENESS";

/// Knobs for [`SsaLivenessAnalysis`](crate::SsaLivenessAnalysis).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LivenessOptions {
    /// Re-check the linear order and every interval after convergence.
    /// A failed check panics.
    pub verify: bool,
    /// Print every block's sets and every interval to stderr after
    /// convergence.
    pub dump: bool,
}

impl Default for LivenessOptions {
    fn default() -> Self {
        Self {
            verify: cfg!(debug_assertions),
            dump: false,
        }
    }
}

impl LivenessOptions {
    /// Options from `ORI_DEBUG_LIVENESS`, read once per process.
    ///
    /// - unset: defaults
    /// - `verify`: dump and verify
    /// - anything else: dump
    pub fn from_env() -> Self {
        static FROM_ENV: OnceLock<LivenessOptions> = OnceLock::new();
        *FROM_ENV.get_or_init(|| Self::from_env_value(std::env::var(DEBUG_ENV_VAR).ok().as_deref()))
    }

    fn from_env_value(value: Option<&str>) -> Self {
        let defaults = Self::default();
        match value {
            None => defaults,
            Some("verify") => Self {
                verify: true,
                dump: true,
            },
            Some(_) => Self {
                dump: true,
                ..defaults
            },
        }
    }
}
