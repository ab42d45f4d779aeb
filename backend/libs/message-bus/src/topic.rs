//! Topic and pattern helpers
//!
//! Topics are dot separated (`user.update.sync.42`). A pattern is either a
//! literal topic or a prefix followed by a single trailing `*`
//! (`user.update.sync.*`), which is also a valid Redis PSUBSCRIBE glob.

use crate::{BusError, Result};

/// Wildcard suffix accepted in patterns
pub const WILDCARD: char = '*';

/// Build a topic from a prefix and an id
///
/// # Example
///
/// ```
/// use message_bus::topic::build_topic;
///
/// assert_eq!(build_topic("user.update.sync", 42), "user.update.sync.42");
/// ```
pub fn build_topic(prefix: &str, id: impl std::fmt::Display) -> String {
    format!("{}.{}", prefix, id)
}

/// Pattern matching every topic under `prefix`
///
/// ```
/// use message_bus::topic::prefix_pattern;
///
/// assert_eq!(prefix_pattern("user.update.sync"), "user.update.sync.*");
/// ```
pub fn prefix_pattern(prefix: &str) -> String {
    format!("{}.{}", prefix, WILDCARD)
}

/// Whether the pattern ends in a wildcard
pub fn is_wildcard(pattern: &str) -> bool {
    pattern.ends_with(WILDCARD)
}

/// Check that `pattern` matches the concrete `topic`
///
/// ```
/// use message_bus::topic::pattern_matches;
///
/// assert!(pattern_matches("user.update.sync.*", "user.update.sync.42"));
/// assert!(pattern_matches("server.signatures", "server.signatures"));
/// assert!(!pattern_matches("user.update.sync.*", "user.update.other.42"));
/// ```
pub fn pattern_matches(pattern: &str, topic: &str) -> bool {
    match pattern.strip_suffix(WILDCARD) {
        Some(prefix) => topic.starts_with(prefix),
        None => pattern == topic,
    }
}

/// Return the part of `topic` following `prefix.`, if any
///
/// ```
/// use message_bus::topic::topic_suffix;
///
/// assert_eq!(topic_suffix("user.update.sync", "user.update.sync.42"), Some("42"));
/// assert_eq!(topic_suffix("user.update.sync", "user.update.sync"), None);
/// ```
pub fn topic_suffix<'a>(prefix: &str, topic: &'a str) -> Option<&'a str> {
    topic
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_prefix('.'))
        .filter(|rest| !rest.is_empty())
}

/// Validate a concrete topic (publish side)
pub fn validate_topic(topic: &str) -> Result<()> {
    if topic.is_empty() || topic.contains(WILDCARD) || topic.chars().any(char::is_whitespace) {
        return Err(BusError::InvalidTopic(topic.to_string()));
    }
    Ok(())
}

/// Validate a subscription pattern
pub fn validate_pattern(pattern: &str) -> Result<()> {
    let literal = pattern.strip_suffix(WILDCARD).unwrap_or(pattern);
    if pattern.is_empty()
        || literal.contains(WILDCARD)
        || literal.chars().any(char::is_whitespace)
    {
        return Err(BusError::InvalidTopic(pattern.to_string()));
    }
    Ok(())
}
