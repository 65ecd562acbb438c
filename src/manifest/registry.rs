//! Schema registry keyed by group/version/kind.

use std::collections::HashMap;

use once_cell::sync::OnceCell;

use super::kinds::builtin_kinds;
use super::schema::Schema;

/// Group used for apiVersions without a slash (`v1`).
pub const CORE_GROUP: &str = "core";

/// Group/Version/Kind of a resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Gvk {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl Gvk {
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Split an `apiVersion` into group and version. `v1` becomes `core/v1`.
    pub fn from_api_version(api_version: &str, kind: &str) -> Self {
        match api_version.split_once('/') {
            Some((group, version)) => Self::new(group, version, kind),
            None => Self::new(CORE_GROUP, api_version, kind),
        }
    }

    /// Registry key, `group/version/kind`.
    pub fn key(&self) -> String {
        format!("{}/{}/{}", self.group, self.version, self.kind)
    }

    /// The apiVersion as it appears in manifests.
    pub fn api_version(&self) -> String {
        if self.group == CORE_GROUP {
            self.version.clone()
        } else {
            format!("{}/{}", self.group, self.version)
        }
    }
}

impl std::fmt::Display for Gvk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.key())
    }
}

/// Read-only schema registry, filled on first use.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    schemas: OnceCell<HashMap<String, Schema>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn schemas(&self) -> &HashMap<String, Schema> {
        self.schemas.get_or_init(|| {
            let map: HashMap<String, Schema> = builtin_kinds()
                .into_iter()
                .map(|k| (Gvk::new(k.group, k.version, k.kind).key(), k.schema))
                .collect();
            tracing::debug!(kinds = map.len(), "schema registry initialized");
            map
        })
    }

    pub fn get(&self, gvk: &Gvk) -> Option<&Schema> {
        self.schemas().get(&gvk.key())
    }

    pub fn contains(&self, gvk: &Gvk) -> bool {
        self.get(gvk).is_some()
    }

    /// Registered kinds, sorted by key.
    pub fn kinds(&self) -> Vec<Gvk> {
        let mut kinds: Vec<Gvk> = builtin_kinds()
            .into_iter()
            .map(|k| Gvk::new(k.group, k.version, k.kind))
            .filter(|gvk| self.contains(gvk))
            .collect();
        kinds.sort();
        kinds
    }

    pub fn is_initialized(&self) -> bool {
        self.schemas.get().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_api_version() {
        let gvk = Gvk::from_api_version("apps/v1", "Deployment");
        assert_eq!(gvk.key(), "apps/v1/Deployment");
        assert_eq!(gvk.api_version(), "apps/v1");

        let gvk = Gvk::from_api_version("v1", "Service");
        assert_eq!(gvk.key(), "core/v1/Service");
        assert_eq!(gvk.api_version(), "v1");
    }

    #[test]
    fn test_lazy_initialization() {
        let registry = SchemaRegistry::new();
        assert!(!registry.is_initialized());
        assert!(registry.get(&Gvk::from_api_version("v1", "ConfigMap")).is_some());
        assert!(registry.is_initialized());
    }

    #[test]
    fn test_version_must_match() {
        let registry = SchemaRegistry::new();
        assert!(registry.contains(&Gvk::from_api_version("apps/v1", "Deployment")));
        assert!(!registry.contains(&Gvk::from_api_version("extensions/v1beta1", "Deployment")));
        assert!(!registry.contains(&Gvk::from_api_version("example.com/v1", "CustomThing")));
    }

    #[test]
    fn test_kinds_sorted() {
        let kinds = SchemaRegistry::new().kinds();
        assert_eq!(kinds.len(), builtin_kinds().len());
        let mut sorted = kinds.clone();
        sorted.sort();
        assert_eq!(kinds, sorted);
    }
}
