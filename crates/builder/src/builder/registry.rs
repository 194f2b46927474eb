//! Builder registry - decides which builders run.
//!
//! Filters are added from the command line before anything is built. A
//! builder runs only if every filter accepts its name.

use std::cell::RefCell;
use std::collections::BTreeSet;

type Filter = Box<dyn Fn(&str) -> bool>;

#[derive(Default)]
pub struct BuilderRegistry {
    filters: Vec<Filter>,
    registered: RefCell<BTreeSet<String>>,
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_filter(&mut self, filter: impl Fn(&str) -> bool + 'static) {
        self.filters.push(Box::new(filter));
    }

    /// Only allow the listed builders.
    pub fn add_builds<I, S>(&mut self, builds: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let allowed: BTreeSet<String> = builds.into_iter().map(Into::into).collect();
        self.add_filter(move |name| allowed.contains(name));
    }

    /// Never build the listed builders.
    pub fn add_skips<I, S>(&mut self, skips: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let denied: BTreeSet<String> = skips.into_iter().map(Into::into).collect();
        self.add_filter(move |name| !denied.contains(name));
    }

    #[must_use]
    pub fn should_build(&self, name: &str) -> bool {
        self.filters.iter().all(|filter| filter(name))
    }

    pub fn register(&self, name: &str) {
        self.registered.borrow_mut().insert(name.to_string());
    }

    /// Names of every builder that reached the gate, built or skipped.
    pub fn registered(&self) -> Vec<String> {
        self.registered.borrow().iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filters_builds_everything() {
        let registry = BuilderRegistry::new();
        assert!(registry.should_build("stage1"));
        assert!(registry.should_build("libxml2"));
    }

    #[test]
    fn test_builds_and_skips_combine() {
        let mut registry = BuilderRegistry::new();
        registry.add_builds(["stage2", "libxml2", "builtins"]);
        registry.add_skips(["builtins"]);
        assert!(registry.should_build("stage2"));
        assert!(!registry.should_build("stage1"));
        assert!(!registry.should_build("builtins"));
    }

    #[test]
    fn test_register() {
        let registry = BuilderRegistry::new();
        registry.register("stage1");
        registry.register("libzstd");
        registry.register("stage1");
        assert_eq!(registry.registered(), vec!["libzstd", "stage1"]);
    }
}
