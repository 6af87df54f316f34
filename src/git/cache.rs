//! Memo cells for repeated repository queries.
//!
//! A cache lives inside [`super::Repo`] for the duration of one command, so
//! nothing leaks between runs.

/// A lazily-filled value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cached<T> {
    value: Option<T>,
}

impl<T> Default for Cached<T> {
    fn default() -> Self {
        Self { value: None }
    }
}

impl<T: Clone> Cached<T> {
    /// Whether a value has been stored
    pub const fn initialized(&self) -> bool {
        self.value.is_some()
    }

    /// Store a value
    pub fn set(&mut self, value: T) {
        self.value = Some(value);
    }

    /// The stored value, if any
    pub fn get(&self) -> Option<T> {
        self.value.clone()
    }

    /// Forget the stored value
    pub fn invalidate(&mut self) {
        self.value = None;
    }
}

/// Cached boolean
pub type BoolCache = Cached<bool>;
/// Cached string
pub type StringCache = Cached<String>;
/// Cached list of strings
pub type StringListCache = Cached<Vec<String>>;

/// Per-run memo of repository facts that only change through our own steps.
#[derive(Debug, Clone, Default)]
pub struct RepoCache {
    /// Currently checked out branch
    pub current_branch: StringCache,
    /// Absolute path of the working tree root
    pub root_dir: StringCache,
    /// Configured remotes
    pub remotes: StringListCache,
    /// Remote-tracking branches (`origin/foo`)
    pub remote_branches: StringListCache,
    /// Whether `origin` is configured
    pub has_origin: BoolCache,
}

impl RepoCache {
    /// Drop everything derived from refs (branches, remotes)
    pub fn invalidate_refs(&mut self) {
        self.current_branch.invalidate();
        self.remote_branches.invalidate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bool_cache() {
        let mut cache = BoolCache::default();
        assert!(!cache.initialized());
        cache.set(true);
        assert!(cache.initialized());
        assert_eq!(cache.get(), Some(true));
    }

    #[test]
    fn test_string_cache() {
        let mut cache = StringCache::default();
        assert!(!cache.initialized());
        cache.set("foo".to_string());
        assert!(cache.initialized());
        assert_eq!(cache.get().as_deref(), Some("foo"));
    }

    #[test]
    fn test_string_list_cache() {
        let mut cache = StringListCache::default();
        assert!(!cache.initialized());
        cache.set(vec!["foo".to_string()]);
        assert!(cache.initialized());
        assert_eq!(cache.get(), Some(vec!["foo".to_string()]));
    }

    #[test]
    fn test_invalidate_refs_keeps_root() {
        let mut cache = RepoCache::default();
        cache.current_branch.set("main".to_string());
        cache.root_dir.set("/repo".to_string());
        cache.invalidate_refs();
        assert!(!cache.current_branch.initialized());
        assert!(cache.root_dir.initialized());
    }
}
