//! Inventory listener configuration.

use crate::error::MessagingError;
use crate::split_list;

/// Consumer group used when `ORDER_EVENT_GROUP` is unset.
pub const DEFAULT_ORDER_EVENT_GROUP: &str = "inventory";

/// Topic list used when `ORDER_EVENT_TOPICS` is unset.
pub const DEFAULT_ORDER_EVENT_TOPICS: &str = "ORDER_EVENT";

/// Where the inventory listener connects and what it subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Bootstrap brokers.
    pub brokers: Vec<String>,
    /// Consumer group id.
    pub group: String,
    /// Subscribed topics.
    pub topics: Vec<String>,
}

impl ListenerConfig {
    /// Reads `KAFKA_BROKERS`, `ORDER_EVENT_GROUP` and `ORDER_EVENT_TOPICS`
    /// from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Config` if no brokers or no topics are given.
    pub fn from_env() -> Result<Self, MessagingError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `MessagingError::Config` if no brokers or no topics are given.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, MessagingError> {
        let brokers = split_list(&lookup("KAFKA_BROKERS").unwrap_or_default());
        if brokers.is_empty() {
            return Err(MessagingError::Config(
                "KAFKA_BROKERS must list at least one broker".to_owned(),
            ));
        }
        let group = lookup("ORDER_EVENT_GROUP")
            .filter(|group| !group.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ORDER_EVENT_GROUP.to_owned());
        let topics = split_list(
            &lookup("ORDER_EVENT_TOPICS").unwrap_or_else(|| DEFAULT_ORDER_EVENT_TOPICS.to_owned()),
        );
        if topics.is_empty() {
            return Err(MessagingError::Config(
                "ORDER_EVENT_TOPICS must list at least one topic".to_owned(),
            ));
        }
        Ok(Self {
            brokers,
            group,
            topics,
        })
    }

    /// Brokers joined for `bootstrap.servers`.
    #[must_use]
    pub fn bootstrap_servers(&self) -> String {
        self.brokers.join(",")
    }
}
