//! Static registry of upstream mirrors

use std::sync::Arc;

use crate::utils::url::sanitize_base_url;

/// Ordered set of mirror base URLs expected to serve equivalent data.
///
/// Cloning is cheap; the list itself is shared.
#[derive(Debug, Clone)]
pub struct MirrorRegistry {
    mirrors: Arc<[String]>,
}

impl MirrorRegistry {
    /// Build a registry, dropping trailing slashes and duplicate entries
    /// while keeping first-seen order.
    pub fn new<I, S>(mirrors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut seen: Vec<String> = Vec::new();
        for mirror in mirrors {
            let mirror = sanitize_base_url(mirror.as_ref());
            if !mirror.is_empty() && !seen.contains(&mirror) {
                seen.push(mirror);
            }
        }
        Self {
            mirrors: seen.into(),
        }
    }

    pub fn mirrors(&self) -> &[String] {
        &self.mirrors
    }

    pub fn len(&self) -> usize {
        self.mirrors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mirrors.is_empty()
    }

    /// Uniformly random permutation of the registry (Fisher-Yates)
    pub fn shuffled(&self) -> Vec<String> {
        let mut order = self.mirrors.to_vec();
        fastrand::shuffle(&mut order);
        order
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registry_normalizes_and_dedupes() {
        let registry = MirrorRegistry::new([
            "https://a.example/",
            "https://b.example",
            "https://a.example",
            "  ",
        ]);
        assert_eq!(
            registry.mirrors(),
            &["https://a.example".to_string(), "https://b.example".to_string()]
        );
    }

    #[test]
    fn test_shuffled_is_permutation() {
        let registry = MirrorRegistry::new(["m1", "m2", "m3", "m4", "m5"]);
        for _ in 0..50 {
            let mut shuffled = registry.shuffled();
            assert_eq!(shuffled.len(), 5);
            shuffled.sort();
            assert_eq!(shuffled, registry.mirrors());
        }
    }

    #[test]
    fn test_single_mirror() {
        let registry = MirrorRegistry::new(["https://only.example"]);
        assert_eq!(registry.shuffled(), vec!["https://only.example".to_string()]);
    }
}
