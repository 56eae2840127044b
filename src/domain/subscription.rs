//! Per-connection channel subscription set.
//!
//! Clients always send their complete desired set, so the only mutation is
//! a wholesale [`SubscriptionSet::replace`]; there is no incremental
//! subscribe/unsubscribe on the server.

use std::collections::HashSet;

/// The channels a single connection receives `channel_message` frames for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionSet {
    channels: HashSet<String>,
}

impl SubscriptionSet {
    /// Creates an empty subscription set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Overwrites the stored set with `channels`. Blank names are ignored.
    pub fn replace<I, S>(&mut self, channels: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.channels = channels
            .into_iter()
            .map(|c| c.as_ref().trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
    }

    /// Returns `true` if the connection subscribes to `channel`.
    #[must_use]
    pub fn matches(&self, channel: &str) -> bool {
        self.channels.contains(channel)
    }

    /// Number of subscribed channels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Returns `true` if nothing is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Iterates over subscribed channel names in no particular order.
    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.iter().map(String::as_str)
    }
}

impl<S: AsRef<str>> FromIterator<S> for SubscriptionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = Self::new();
        set.replace(iter);
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_matches_nothing() {
        let set = SubscriptionSet::new();
        assert!(!set.matches("general"));
        assert!(set.is_empty());
    }

    #[test]
    fn replace_overwrites_instead_of_merging() {
        let mut set: SubscriptionSet = ["a", "b"].into_iter().collect();
        assert!(set.matches("a"));
        assert!(set.matches("b"));

        set.replace(["b"]);
        assert!(!set.matches("a"));
        assert!(set.matches("b"));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn replace_with_empty_clears() {
        let mut set: SubscriptionSet = ["home"].into_iter().collect();
        set.replace(Vec::<String>::new());
        assert!(set.is_empty());
    }

    #[test]
    fn blank_and_duplicate_names_collapse() {
        let set: SubscriptionSet = ["home", " ", "home", ""].into_iter().collect();
        assert_eq!(set.len(), 1);
        assert_eq!(set.channels().collect::<Vec<_>>(), vec!["home"]);
    }
}
