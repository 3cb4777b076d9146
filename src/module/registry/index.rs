//! Module registry
//!
//! Indexes validated descriptors by path, category, namespace and CVE id.
//! `by_path` is the source of truth; every other index is rebuilt from it.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::warn;

use crate::module::registry::descriptor::{Category, ModuleDescriptor};
use crate::module::validation::ValidationError;

/// Package-style prefix accepted in front of module paths
pub const MODULE_PATH_PREFIX: &str = "modules.";

/// Upper-case, `_` to `-`, and a `CVE-` prefix when missing
pub fn normalize_cve_id(id: &str) -> String {
    let id = id.trim().to_ascii_uppercase().replace('_', "-");
    if id.starts_with("CVE-") {
        id
    } else {
        format!("CVE-{}", id)
    }
}

/// Whether a target name should be resolved through the CVE index
pub fn looks_like_cve(target: &str) -> bool {
    let upper = target.trim().to_ascii_uppercase();
    upper.starts_with("CVE-") || upper.starts_with("CVE_")
}

/// One row of the root catalog
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategorySummary {
    pub category: Category,
    pub description: &'static str,
    pub count: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegistryStats {
    pub total_modules: usize,
    pub total_namespaces: usize,
    pub total_cves: usize,
    pub by_category: BTreeMap<Category, usize>,
}

#[derive(Debug, Clone, Default)]
pub struct ModuleRegistry {
    by_path: BTreeMap<String, Arc<ModuleDescriptor>>,
    by_category: BTreeMap<Category, BTreeSet<String>>,
    namespaces: BTreeSet<String>,
    cve_index: BTreeMap<String, String>,
}

impl ModuleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry; the first descriptor for a path or id wins
    pub fn from_descriptors<I>(descriptors: I) -> (Self, Vec<ValidationError>)
    where
        I: IntoIterator<Item = ModuleDescriptor>,
    {
        let mut by_path: BTreeMap<String, Arc<ModuleDescriptor>> = BTreeMap::new();
        let mut ids: HashMap<String, String> = HashMap::new();
        let mut errors = Vec::new();

        for descriptor in descriptors {
            if let Some(first) = by_path.get(&descriptor.path) {
                warn!(
                    "Duplicate module path {} in {}, keeping the one from {}",
                    descriptor.path, descriptor.source, first.source
                );
                errors.push(ValidationError::DuplicatePath {
                    document: descriptor.source.clone(),
                    path: descriptor.path.clone(),
                    first: first.source.clone(),
                });
                continue;
            }
            if let Some(path) = ids.get(&descriptor.id) {
                warn!(
                    "Duplicate module id {} in {}, already used by {}",
                    descriptor.id, descriptor.source, path
                );
                errors.push(ValidationError::DuplicateId {
                    document: descriptor.source.clone(),
                    id: descriptor.id.clone(),
                    path: path.clone(),
                });
                continue;
            }
            ids.insert(descriptor.id.clone(), descriptor.path.clone());
            by_path.insert(descriptor.path.clone(), Arc::new(descriptor));
        }

        let mut registry = Self {
            by_path,
            ..Self::default()
        };
        registry.rebuild_indexes();
        (registry, errors)
    }

    fn rebuild_indexes(&mut self) {
        self.by_category.clear();
        self.namespaces.clear();
        self.cve_index.clear();

        for (path, descriptor) in &self.by_path {
            self.by_category
                .entry(descriptor.category)
                .or_default()
                .insert(path.clone());
            if descriptor.is_namespace {
                self.namespaces.insert(path.clone());
            }
            if let Some(cve_id) = descriptor.cve_id() {
                self.cve_index
                    .entry(normalize_cve_id(cve_id))
                    .or_insert_with(|| path.clone());
            }
        }
    }

    /// Look up by path or CVE id, retrying with the package prefix stripped
    pub fn get(&self, path: &str) -> Option<&Arc<ModuleDescriptor>> {
        let path = path.trim();
        if looks_like_cve(path) {
            if let Some(resolved) = self.resolve_cve(path) {
                return self.by_path.get(resolved);
            }
        }
        self.by_path.get(path).or_else(|| {
            path.strip_prefix(MODULE_PATH_PREFIX)
                .and_then(|stripped| self.by_path.get(stripped))
        })
    }

    pub fn contains(&self, path: &str) -> bool {
        self.get(path).is_some()
    }

    pub fn is_namespace(&self, path: &str) -> bool {
        self.namespaces.contains(path)
    }

    pub fn namespaces(&self) -> impl Iterator<Item = &str> {
        self.namespaces.iter().map(String::as_str)
    }

    /// Path registered for a CVE id, in any accepted spelling
    pub fn resolve_cve(&self, id: &str) -> Option<&str> {
        self.cve_index
            .get(&normalize_cve_id(id))
            .map(String::as_str)
    }

    /// Descriptors in a category; `cloud` lists provider namespaces only
    ///
    /// Unknown category names yield an empty list.
    pub fn list_by_category(&self, category: &str) -> Vec<Arc<ModuleDescriptor>> {
        let Some(category) = Category::lookup(category) else {
            return Vec::new();
        };
        let mut listing: Vec<Arc<ModuleDescriptor>> = self
            .by_category
            .get(&category)
            .into_iter()
            .flatten()
            .filter_map(|path| self.by_path.get(path))
            .filter(|d| category != Category::Cloud || d.is_namespace)
            .cloned()
            .collect();
        sort_by_name(&mut listing);
        listing
    }

    /// Non-namespace descriptors strictly below `namespace`
    pub fn list_under_namespace(&self, namespace: &str) -> Vec<Arc<ModuleDescriptor>> {
        let prefix = format!("{}.", namespace);
        let mut listing: Vec<Arc<ModuleDescriptor>> = self
            .by_path
            .range(prefix.clone()..)
            .take_while(|(path, _)| path.starts_with(&prefix))
            .map(|(_, d)| d)
            .filter(|d| !d.is_namespace)
            .cloned()
            .collect();
        sort_by_name(&mut listing);
        listing
    }

    /// Case-insensitive substring match over name, description, CVE id, category and author
    pub fn search(&self, query: &str) -> Vec<Arc<ModuleDescriptor>> {
        let query = query.trim().to_lowercase();
        let mut matches: Vec<Arc<ModuleDescriptor>> = self
            .by_path
            .values()
            .filter(|d| {
                d.name.to_lowercase().contains(&query)
                    || d.description.to_lowercase().contains(&query)
                    || d.cve_id()
                        .map_or(false, |id| id.to_lowercase().contains(&query))
                    || d.category.as_str().contains(&query)
                    || d.author.to_lowercase().contains(&query)
            })
            .cloned()
            .collect();
        sort_by_name(&mut matches);
        matches
    }

    /// The fixed category catalog with module counts
    pub fn categories(&self) -> Vec<CategorySummary> {
        Category::ALL
            .iter()
            .map(|category| CategorySummary {
                category: *category,
                description: category.description(),
                count: self.count_modules(*category),
            })
            .collect()
    }

    fn count_modules(&self, category: Category) -> usize {
        self.by_category.get(&category).map_or(0, |paths| {
            paths.iter().filter(|p| !self.namespaces.contains(*p)).count()
        })
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            total_modules: self.by_path.len() - self.namespaces.len(),
            total_namespaces: self.namespaces.len(),
            total_cves: self.cve_index.len(),
            by_category: Category::ALL
                .iter()
                .map(|c| (*c, self.count_modules(*c)))
                .collect(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<ModuleDescriptor>> {
        self.by_path.values()
    }

    pub fn len(&self) -> usize {
        self.by_path.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_path.is_empty()
    }
}

fn sort_by_name(listing: &mut [Arc<ModuleDescriptor>]) {
    listing.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::options::OptionSchema;

    fn descriptor(path: &str, name: &str, category: Category) -> ModuleDescriptor {
        ModuleDescriptor {
            id: path.to_string(),
            path: path.to_string(),
            name: name.to_string(),
            description: String::new(),
            author: "Unknown".to_string(),
            version: "1.0".to_string(),
            category,
            subcategory: None,
            is_namespace: false,
            options: Arc::new(OptionSchema::new()),
            cve: None,
            references: Vec::new(),
            affected_versions: Vec::new(),
            source: "test".to_string(),
        }
    }

    fn namespace(path: &str, category: Category) -> ModuleDescriptor {
        ModuleDescriptor {
            is_namespace: true,
            ..descriptor(path, path, category)
        }
    }

    #[test]
    fn test_normalize_cve_id() {
        assert_eq!(normalize_cve_id("cve-2021-44228"), "CVE-2021-44228");
        assert_eq!(normalize_cve_id("CVE_2021_44228"), "CVE-2021-44228");
        assert_eq!(normalize_cve_id("2021-44228"), "CVE-2021-44228");
        assert!(looks_like_cve("cve_2021_1"));
        assert!(!looks_like_cve("cloud.aws"));
    }

    #[test]
    fn test_cloud_listing_shows_namespaces_only() {
        let (registry, errors) = ModuleRegistry::from_descriptors(vec![
            namespace("cloud.aws", Category::Cloud),
            descriptor("cloud.aws.ec2", "EC2", Category::Cloud),
            namespace("cloud.azure", Category::Cloud),
        ]);
        assert!(errors.is_empty());
        let paths: Vec<_> = registry
            .list_by_category("cloud")
            .iter()
            .map(|d| d.path.clone())
            .collect();
        assert_eq!(paths, vec!["cloud.aws", "cloud.azure"]);
        assert_eq!(registry.stats().by_category[&Category::Cloud], 1);
    }

    #[test]
    fn test_list_under_namespace_is_strict_prefix() {
        let (registry, _) = ModuleRegistry::from_descriptors(vec![
            namespace("cloud.aws", Category::Cloud),
            descriptor("cloud.aws.s3", "S3", Category::Cloud),
            descriptor("cloud.aws.ec2", "EC2", Category::Cloud),
            descriptor("cloud.awsx.iam", "IAM", Category::Cloud),
        ]);
        let names: Vec<_> = registry
            .list_under_namespace("cloud.aws")
            .iter()
            .map(|d| d.name.clone())
            .collect();
        assert_eq!(names, vec!["EC2", "S3"]);
    }

    #[test]
    fn test_category_aliases_and_unknown() {
        let (registry, _) = ModuleRegistry::from_descriptors(vec![descriptor(
            "misc.hello",
            "Hello",
            Category::Misc,
        )]);
        assert_eq!(registry.list_by_category("auxiliary").len(), 1);
        assert_eq!(registry.list_by_category("AUX").len(), 1);
        assert!(registry.list_by_category("mobile").is_empty());
    }

    #[test]
    fn test_get_strips_package_prefix() {
        let (registry, _) = ModuleRegistry::from_descriptors(vec![descriptor(
            "misc.hello",
            "Hello",
            Category::Misc,
        )]);
        assert!(registry.get("modules.misc.hello").is_some());
        assert!(registry.get("misc.nope").is_none());
    }

    #[test]
    fn test_duplicate_id_rejected() {
        let mut second = descriptor("misc.other", "Other", Category::Misc);
        second.id = "misc.hello".to_string();
        let (registry, errors) = ModuleRegistry::from_descriptors(vec![
            descriptor("misc.hello", "Hello", Category::Misc),
            second,
        ]);
        assert_eq!(registry.len(), 1);
        assert!(matches!(errors[0], ValidationError::DuplicateId { .. }));
    }
}
