use std::fmt::{Display, Formatter};

/// The ids of the services currently being resolved on one resolution path,
/// outermost first.
///
/// Chains are never mutated in place. Each nested resolution gets its own
/// child chain through [`DependencyChain::with_request`], so independent
/// resolutions cannot see each other's ancestry.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct DependencyChain {
    service_path: Vec<String>,
}

impl DependencyChain {
    /// Creates a new, empty chain.
    #[must_use]
    pub fn new() -> Self {
        DependencyChain::default()
    }

    /// Creates a child chain with the given service appended to the end.
    #[must_use]
    pub fn with_request(&self, service_id: &str) -> Self {
        let mut child = self.clone();
        child.service_path.push(service_id.to_owned());
        child
    }

    /// Gets the services on this chain, outermost first.
    #[must_use]
    pub fn service_path(&self) -> &[String] {
        &self.service_path
    }

    /// Counts how many times a service appears on this chain.
    #[must_use]
    pub fn occurrences(&self, service_id: &str) -> usize {
        self.service_path
            .iter()
            .filter(|id| id.as_str() == service_id)
            .count()
    }

    /// Checks whether a service is already being resolved on this chain.
    #[must_use]
    pub fn contains(&self, service_id: &str) -> bool {
        self.occurrences(service_id) > 0
    }

    /// The number of services on this chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.service_path.len()
    }

    /// Checks whether this chain is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.service_path.is_empty()
    }
}

impl Display for DependencyChain {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.service_path.join(" -> "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_chain_does_not_change_parent() {
        let parent = DependencyChain::new().with_request("a");
        let child = parent.with_request("b");

        assert_eq!(&["a".to_owned()], parent.service_path());
        assert_eq!(&["a".to_owned(), "b".to_owned()], child.service_path());
    }

    #[test]
    fn occurrences_are_counted() {
        let chain = DependencyChain::new()
            .with_request("a")
            .with_request("b")
            .with_request("a");

        assert_eq!(2, chain.occurrences("a"));
        assert_eq!(1, chain.occurrences("b"));
        assert!(!chain.contains("c"));
        assert_eq!("a -> b -> a", chain.to_string());
    }
}
