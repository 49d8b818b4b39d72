//! Event provider trait, the bus abstraction behind the publisher
//!
//! All bus backends (NATS JetStream, in-memory) implement `EventProvider`
//! so the publisher never depends on a concrete transport.

use crate::error::Result;
use crate::types::Event;
use async_trait::async_trait;

pub mod memory;
pub mod nats;

/// Core trait for bus backends
///
/// Delivery is at-least-once and best-effort. Errors are opaque to callers
/// except for `Cancelled`/`Timeout`, which the publisher treats as a signal
/// to stop the current batch.
#[async_trait]
pub trait EventProvider: Send + Sync {
    /// Publish an event to `subject`, returning the provider-assigned sequence number
    async fn publish(&self, subject: &str, event: &Event) -> Result<u64>;

    /// Build the default subject for an event of `name` in `hub`
    fn build_subject(&self, hub: &str, name: &str) -> String;

    /// Provider name (e.g., "nats", "memory")
    fn name(&self) -> &str;

    /// Returns true if the provider is connected and operational
    async fn health(&self) -> Result<bool> {
        Ok(true)
    }
}

/// Make a hub name safe to use as a single subject token
///
/// Event names are dot-qualified on purpose and only have whitespace replaced.
pub fn subject_token(raw: &str, keep_dots: bool) -> String {
    let token: String = raw
        .chars()
        .map(|c| match c {
            c if c.is_whitespace() => '_',
            '.' if !keep_dots => '_',
            '*' | '>' => '_',
            c => c,
        })
        .collect();

    if token.is_empty() {
        "_".to_string()
    } else {
        token
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subject_token() {
        assert_eq!(subject_token("hub a", false), "hub_a");
        assert_eq!(subject_token("hub.a", false), "hub_a");
        assert_eq!(subject_token("Disk Full.firing", true), "Disk_Full.firing");
        assert_eq!(subject_token("", false), "_");
        assert_eq!(subject_token("a>*", true), "a__");
    }
}
