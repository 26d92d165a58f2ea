//! Watcher configuration
//!
//! A [`WatcherConfig`] tells a watcher session what to look for (its brief),
//! which parent chunks should start an evaluation, how much observed history
//! to keep between evaluations, and whether interject decisions are injected
//! automatically.

use std::time::Duration;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::error::{OrchestratorError, Result};

/// Default token budget for the sliding-window retention strategy
pub const DEFAULT_WINDOW_TOKENS: usize = 8_000;

/// Default quiet period after which pending observations are evaluated
pub const DEFAULT_SILENCE_TIMEOUT: Duration = Duration::from_secs(5);

bitflags! {
    /// Chunk classes that start a watcher evaluation
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct TriggerKinds: u8 {
        /// Parent finished a turn
        const TURN_COMPLETE = 0b0001;
        /// Parent received a tool result
        const TOOL_RESULT = 0b0010;
        /// Parent turn failed
        const ERROR = 0b0100;
        /// Parent turn was interrupted
        const INTERRUPTED = 0b1000;
    }
}

impl Default for TriggerKinds {
    fn default() -> Self {
        Self::all()
    }
}

/// How much observed history a watcher keeps after each evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum RetentionStrategy {
    /// Keep the newest observations that fit the token budget
    SlidingWindow {
        /// Estimated token budget
        max_tokens: usize,
    },
    /// Keep only tool traffic, failures and gaps
    RelevanceFiltered {
        /// Maximum number of observations kept
        max_items: usize,
    },
    /// Keep nothing; the watcher's own conversation is its memory
    Autonomous,
}

impl Default for RetentionStrategy {
    fn default() -> Self {
        Self::SlidingWindow {
            max_tokens: DEFAULT_WINDOW_TOKENS,
        }
    }
}

/// Configuration of a watcher session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatcherConfig {
    /// Instructions defining what the watcher evaluates for
    pub brief: String,
    /// Retention strategy applied after each evaluation
    #[serde(default)]
    pub retention: RetentionStrategy,
    /// Chunk classes that start an evaluation
    #[serde(default)]
    pub triggers: TriggerKinds,
    /// Evaluate pending observations after this much parent silence
    #[serde(default, with = "optional_millis")]
    pub silence_timeout: Option<Duration>,
    /// Inject interject decisions without caller review
    #[serde(default = "default_auto_inject")]
    pub auto_inject: bool,
}

const fn default_auto_inject() -> bool {
    true
}

impl WatcherConfig {
    /// Create a new builder for `WatcherConfig`
    pub fn builder(brief: impl Into<String>) -> WatcherConfigBuilder {
        WatcherConfigBuilder {
            config: Self {
                brief: brief.into(),
                retention: RetentionStrategy::default(),
                triggers: TriggerKinds::default(),
                silence_timeout: Some(DEFAULT_SILENCE_TIMEOUT),
                auto_inject: true,
            },
        }
    }

    /// Check the configuration for values a watcher loop cannot run with
    ///
    /// # Errors
    /// Returns `InvalidConfig` on an empty brief, an empty trigger set, a zero
    /// retention bound or a zero silence timeout.
    pub fn validate(&self) -> Result<()> {
        if self.brief.trim().is_empty() {
            return Err(OrchestratorError::invalid_config("watcher brief cannot be empty"));
        }
        if self.triggers.is_empty() && self.silence_timeout.is_none() {
            return Err(OrchestratorError::invalid_config(
                "watcher needs at least one trigger or a silence timeout",
            ));
        }
        match self.retention {
            RetentionStrategy::SlidingWindow { max_tokens: 0 } => {
                return Err(OrchestratorError::invalid_config(
                    "sliding window max_tokens must be at least 1",
                ));
            }
            RetentionStrategy::RelevanceFiltered { max_items: 0 } => {
                return Err(OrchestratorError::invalid_config(
                    "relevance filter max_items must be at least 1",
                ));
            }
            _ => {}
        }
        if self.silence_timeout == Some(Duration::ZERO) {
            return Err(OrchestratorError::invalid_config(
                "silence timeout must be non-zero",
            ));
        }
        Ok(())
    }
}

/// Builder for `WatcherConfig`
#[derive(Debug)]
pub struct WatcherConfigBuilder {
    config: WatcherConfig,
}

impl WatcherConfigBuilder {
    /// Set the retention strategy
    #[must_use]
    pub const fn retention(mut self, retention: RetentionStrategy) -> Self {
        self.config.retention = retention;
        self
    }

    /// Set the trigger chunk classes
    #[must_use]
    pub const fn triggers(mut self, triggers: TriggerKinds) -> Self {
        self.config.triggers = triggers;
        self
    }

    /// Set the silence timeout (`None` disables it)
    #[must_use]
    pub const fn silence_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.config.silence_timeout = timeout;
        self
    }

    /// Set whether interject decisions are injected automatically
    #[must_use]
    pub const fn auto_inject(mut self, auto_inject: bool) -> Self {
        self.config.auto_inject = auto_inject;
        self
    }

    /// Build and validate the configuration
    ///
    /// # Errors
    /// See [`WatcherConfig::validate`].
    pub fn build(self) -> Result<WatcherConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

mod optional_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Option<Duration>, s: S) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => s.serialize_some(&(d.as_millis() as u64)),
            None => s.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(d)?.map(Duration::from_millis))
    }
}
