//! Navigation state machine
//!
//! The navigator moves the session between root, category and namespace
//! contexts, resolves short module names, and drives module execution.
//!
//! Context states:
//!
//! - **Root**: empty context, lists the category catalog
//! - **Category**: context is a canonical category name
//! - **Namespace**: context is a registered namespace path
//!
//! Whether a module is loaded is tracked independently of the context.

use std::sync::Arc;
use tracing::{info, warn};

use crate::module::options::{is_global_option, normalize_key, OptionType, OptionValue};
use crate::module::registry::{
    CatalogSources, Category, CategorySummary, DescriptorStore, ModuleDescriptor, ModuleRegistry,
};
use crate::module::{FactoryTable, ModuleHandle, ModuleLoader, RunReport, ValidationError};
use crate::session::{Session, SessionError};

/// What a context shows when listed
#[derive(Debug, Clone)]
pub enum Listing {
    Categories(Vec<CategorySummary>),
    Category {
        category: Category,
        modules: Vec<Arc<ModuleDescriptor>>,
    },
    Namespace {
        path: String,
        modules: Vec<Arc<ModuleDescriptor>>,
    },
}

#[derive(Debug, Clone)]
pub enum UseOutcome {
    /// A module was instantiated and made active
    Loaded {
        path: String,
        replaced: Option<String>,
    },
    /// The name was a namespace; the context moved there instead
    Entered(Listing),
}

#[derive(Debug, Clone, PartialEq)]
pub enum SetOutcome {
    Global {
        key: String,
        value: String,
        applied_to_module: bool,
    },
    Module {
        key: String,
        value: OptionValue,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackOutcome {
    Unloaded(String),
    Navigated(String),
    AtRoot,
}

#[derive(Debug, Clone)]
pub struct ReloadSummary {
    pub modules: usize,
    pub errors: Vec<ValidationError>,
    pub unloaded: Option<String>,
    pub context: String,
}

/// Where a displayed option value is scoped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionSource {
    Global,
    Module,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OptionRow {
    pub key: String,
    /// Unmasked text of the value; masking is a rendering concern
    pub value: String,
    pub kind: OptionType,
    pub required: bool,
    pub source: OptionSource,
    pub description: String,
}

#[derive(Debug, Clone)]
pub struct ModuleInfo {
    pub descriptor: Arc<ModuleDescriptor>,
    pub options: Vec<OptionRow>,
    pub active: bool,
}

pub struct Navigator {
    catalog: CatalogSources,
    registry: ModuleRegistry,
    loader: ModuleLoader,
    session: Session,
    load_errors: Vec<ValidationError>,
}

impl Navigator {
    /// Collect the catalog and build the initial registry
    pub fn new(catalog: CatalogSources, factories: FactoryTable) -> Result<Self, SessionError> {
        let sources = catalog
            .collect()
            .map_err(|e| SessionError::CatalogUnavailable(e.to_string()))?;
        let (registry, load_errors) = DescriptorStore::load_collected(&sources);
        info!("Catalog ready with {} entries", registry.len());
        Ok(Self {
            catalog,
            registry,
            loader: ModuleLoader::new(factories),
            session: Session::new(),
            load_errors,
        })
    }

    pub fn registry(&self) -> &ModuleRegistry {
        &self.registry
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn context(&self) -> &str {
        self.session.context()
    }

    /// Validation errors from the most recent catalog load
    pub fn load_errors(&self) -> &[ValidationError] {
        &self.load_errors
    }

    /// `list` with a target moves there first, like `cd`
    pub fn list(&mut self, target: Option<&str>) -> Result<Listing, SessionError> {
        match target {
            Some(target) => self.cd(Some(target)),
            None => Ok(self.listing()),
        }
    }

    pub fn cd(&mut self, target: Option<&str>) -> Result<Listing, SessionError> {
        let Some(target) = target.map(str::trim).filter(|t| !t.is_empty()) else {
            self.session.set_context("");
            return Ok(self.listing());
        };

        if target == ".." {
            self.session.pop_context();
            return Ok(self.listing());
        }

        let resolved = self
            .resolve_target(target)
            .ok_or_else(|| SessionError::InvalidPath(target.to_string()))?;
        self.session.set_context(resolved);
        Ok(self.listing())
    }

    /// Context-relative namespace, absolute namespace, then category
    fn resolve_target(&self, target: &str) -> Option<String> {
        let target = target.to_lowercase();
        let context = self.session.context();
        if !context.is_empty() && !target.contains('.') {
            let relative = format!("{}.{}", context, target);
            if self.registry.is_namespace(&relative) {
                return Some(relative);
            }
        }
        if self.registry.is_namespace(&target) {
            return Some(target);
        }
        Category::lookup(&target).map(|category| category.as_str().to_string())
    }

    fn listing(&self) -> Listing {
        let context = self.session.context();
        if context.is_empty() {
            return Listing::Categories(self.registry.categories());
        }
        if !self.registry.is_namespace(context) {
            if let Some(category) = Category::lookup(context) {
                return Listing::Category {
                    category,
                    modules: self.registry.list_by_category(context),
                };
            }
        }
        Listing::Namespace {
            path: context.to_string(),
            modules: self.registry.list_under_namespace(context),
        }
    }

    fn context_is_valid(&self, context: &str) -> bool {
        context.is_empty()
            || self.registry.is_namespace(context)
            || Category::lookup(context).is_some()
    }

    /// Resolve `name` and make it the active module
    ///
    /// Order: namespace (enter it), `context.name`, `namespace.name` for each
    /// namespace below the context in lexicographic order, then `name` as given.
    /// Only the last attempt reports its failure. On failure the previously
    /// active module stays active.
    pub fn use_module(&mut self, name: &str) -> Result<UseOutcome, SessionError> {
        let name = name.trim();
        let context = self.session.context().to_string();
        let relative = !context.is_empty() && !name.contains('.');

        let qualified = format!("{}.{}", context, name);
        let namespace = if relative && self.registry.is_namespace(&qualified) {
            Some(qualified.clone())
        } else if self.registry.is_namespace(name) {
            Some(name.to_string())
        } else {
            None
        };
        if let Some(namespace) = namespace {
            self.session.set_context(namespace);
            return Ok(UseOutcome::Entered(self.listing()));
        }

        if relative {
            if let Ok(handle) = self.loader.instantiate_silent(&self.registry, &qualified) {
                return Ok(self.activate(handle));
            }

            let prefix = format!("{}.", context);
            let candidates: Vec<String> = self
                .registry
                .namespaces()
                .filter(|ns| ns.starts_with(&prefix))
                .map(|ns| format!("{}.{}", ns, name))
                .collect();
            for candidate in candidates {
                if let Ok(handle) = self.loader.instantiate_silent(&self.registry, &candidate) {
                    return Ok(self.activate(handle));
                }
            }
        }

        let handle = self.loader.instantiate(&self.registry, name)?;
        Ok(self.activate(handle))
    }

    fn activate(&mut self, handle: ModuleHandle) -> UseOutcome {
        let path = handle.path().to_string();
        let replaced = self.session.activate(handle);
        info!("Active module: {}", path);
        UseOutcome::Loaded { path, replaced }
    }

    /// Set a global or module-scoped option
    pub fn set(&mut self, key: &str, value: &str) -> Result<SetOutcome, SessionError> {
        let key = normalize_key(key);
        if is_global_option(&key) {
            let applied_to_module = self.session.set_global(&key, value)?;
            return Ok(SetOutcome::Global {
                key,
                value: value.to_string(),
                applied_to_module,
            });
        }
        let value = self.session.set_module_option(&key, value)?;
        Ok(SetOutcome::Module { key, value })
    }

    /// Run the active module with the session's option values
    pub fn run(&mut self) -> Result<RunReport, SessionError> {
        let active = self
            .session
            .active_mut()
            .ok_or(SessionError::NoActiveModule)?;
        active.sync()?;

        let path = active.path().to_string();
        match active.handle_mut().run() {
            Ok(report) => {
                info!("Module {} finished (success: {})", path, report.success);
                Ok(report)
            }
            Err(e) => {
                warn!("Module {} failed: {}", path, e);
                Err(SessionError::RunFailure {
                    path,
                    message: e.to_string(),
                })
            }
        }
    }

    /// Unload the active module, else go up one level
    pub fn back(&mut self) -> BackOutcome {
        if let Some(path) = self.session.deactivate() {
            info!("Unloaded module {}", path);
            return BackOutcome::Unloaded(path);
        }
        if self.session.pop_context() {
            BackOutcome::Navigated(self.session.context().to_string())
        } else {
            BackOutcome::AtRoot
        }
    }

    /// Rebuild the catalog from its sources
    ///
    /// The active module is always unloaded, global options survive, and the
    /// context survives only if it still names a namespace or category. If the
    /// sources cannot be collected nothing changes.
    pub fn reload(&mut self) -> Result<ReloadSummary, SessionError> {
        let sources = self
            .catalog
            .collect()
            .map_err(|e| SessionError::ReloadFailed(e.to_string()))?;
        let (registry, errors) = DescriptorStore::load_collected(&sources);

        self.registry = registry;
        self.loader.invalidate();
        self.load_errors = errors.clone();
        let unloaded = self.session.deactivate();

        let context = self.session.context().to_string();
        if !self.context_is_valid(&context) {
            warn!("Context '{}' no longer exists after reload", context);
            self.session.set_context("");
        }

        info!("Reloaded catalog: {} entries", self.registry.len());
        Ok(ReloadSummary {
            modules: self.registry.len(),
            errors,
            unloaded,
            context: self.session.context().to_string(),
        })
    }

    pub fn search(&self, query: &str) -> Vec<Arc<ModuleDescriptor>> {
        self.registry.search(query)
    }

    /// Descriptor and options of `target`, or of the active module
    pub fn info(&self, target: Option<&str>) -> Result<ModuleInfo, SessionError> {
        let target = match target.map(str::trim).filter(|t| !t.is_empty()) {
            Some(target) => target.to_string(),
            None => self
                .session
                .active_path()
                .ok_or(SessionError::NoActiveModule)?
                .to_string(),
        };
        let descriptor = self
            .registry
            .get(&target)
            .cloned()
            .ok_or_else(|| crate::module::ModuleError::NotRegistered(target.clone()))?;

        let active = self.session.active_path() == Some(descriptor.path.as_str());
        let options = if active {
            self.show_options()?
        } else {
            descriptor
                .options
                .specs()
                .map(|spec| {
                    let source = self.source_of(&spec.name);
                    let value = match source {
                        OptionSource::Global => self.session.global(&spec.name),
                        OptionSource::Module => None,
                    };
                    OptionRow {
                        key: spec.name.clone(),
                        value: value.map_or_else(|| spec.default.to_string(), str::to_string),
                        kind: spec.kind,
                        required: descriptor.options.is_required(&spec.name),
                        source,
                        description: spec.description.clone(),
                    }
                })
                .collect()
        };

        Ok(ModuleInfo {
            descriptor,
            options,
            active,
        })
    }

    /// Current option values of the active module
    pub fn show_options(&self) -> Result<Vec<OptionRow>, SessionError> {
        let active = self.session.active().ok_or(SessionError::NoActiveModule)?;
        let options = active.options();
        let schema = options.schema();
        Ok(options
            .iter()
            .map(|(key, value)| {
                let spec = schema.get(key);
                OptionRow {
                    key: key.to_string(),
                    value: value.to_string(),
                    kind: value.kind(),
                    required: schema.is_required(key),
                    source: self.source_of(key),
                    description: spec.map(|s| s.description.clone()).unwrap_or_default(),
                }
            })
            .collect())
    }

    /// Global option names with their current values (empty when unset)
    pub fn show_globals(&self) -> Vec<(String, String)> {
        crate::module::options::GLOBAL_OPTIONS
            .iter()
            .map(|key| {
                (
                    key.to_string(),
                    self.session.global(key).unwrap_or_default().to_string(),
                )
            })
            .collect()
    }

    /// `Global` only for a global-capable key that currently has a session value
    fn source_of(&self, key: &str) -> OptionSource {
        if is_global_option(key) && self.session.global(key).is_some() {
            OptionSource::Global
        } else {
            OptionSource::Module
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::options::OptionSet;
    use crate::module::registry::DescriptorSource;
    use crate::module::{AuxiliaryModule, Implementation, ModuleError};
    use serde_json::json;

    struct Echo;

    impl AuxiliaryModule for Echo {
        fn execute(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError> {
            Ok(RunReport::success(json!({
                "region": options.text("AWS_REGION"),
                "count": options.integer("COUNT"),
            })))
        }
    }

    const CATALOG: &str = r#"
[[modules]]
id = "cloud.aws"
name = "AWS"
module_path = "cloud.aws"
category = "cloud"
is_namespace = true

[[modules]]
id = "ec2"
name = "EC2 audit"
module_path = "cloud.aws.ec2"
category = "cloud"
[modules.options]
AWS_REGION = "us-east-1"
COUNT = 1

[[modules]]
id = "hello"
name = "Hello"
module_path = "misc.hello"
category = "misc"
"#;

    fn navigator() -> Navigator {
        let catalog =
            CatalogSources::new().with_embedded(vec![DescriptorSource::toml("test", CATALOG)]);
        let mut factories = FactoryTable::new();
        factories
            .register("cloud.aws.ec2", |_| Ok(Implementation::Auxiliary(Box::new(Echo))))
            .register("misc.hello", |_| Ok(Implementation::Auxiliary(Box::new(Echo))));
        Navigator::new(catalog, factories).unwrap()
    }

    #[test]
    fn test_cd_resolution_order() {
        let mut nav = navigator();
        assert!(matches!(nav.cd(Some("Cloud")).unwrap(), Listing::Category { .. }));
        assert_eq!(nav.context(), "cloud");
        assert!(matches!(nav.cd(Some("aws")).unwrap(), Listing::Namespace { .. }));
        assert_eq!(nav.context(), "cloud.aws");
        nav.cd(Some("..")).unwrap();
        assert_eq!(nav.context(), "cloud");
        nav.cd(Some("auxiliary")).unwrap();
        assert_eq!(nav.context(), "misc");
        assert!(matches!(nav.cd(Some("nowhere")), Err(SessionError::InvalidPath(_))));
        assert_eq!(nav.context(), "misc");
        nav.cd(None).unwrap();
        assert_eq!(nav.context(), "");
    }

    #[test]
    fn test_use_namespace_enters_it() {
        let mut nav = navigator();
        nav.cd(Some("cloud")).unwrap();
        assert!(matches!(nav.use_module("aws").unwrap(), UseOutcome::Entered(_)));
        assert_eq!(nav.context(), "cloud.aws");
        assert!(nav.session().active().is_none());
    }

    #[test]
    fn test_use_searches_descendant_namespaces() {
        let mut nav = navigator();
        nav.cd(Some("cloud")).unwrap();
        match nav.use_module("ec2").unwrap() {
            UseOutcome::Loaded { path, replaced } => {
                assert_eq!(path, "cloud.aws.ec2");
                assert_eq!(replaced, None);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_global_overlay_then_module_override() {
        let mut nav = navigator();
        nav.set("aws_region", "eu-west-1").unwrap();
        nav.use_module("cloud.aws.ec2").unwrap();
        let report = nav.run().unwrap();
        assert_eq!(report.data.unwrap()["region"], json!("eu-west-1"));

        nav.set("COUNT", "3").unwrap();
        let report = nav.run().unwrap();
        assert_eq!(report.data.unwrap()["count"], json!(3));
    }

    fn region_row(rows: &[OptionRow]) -> &OptionRow {
        rows.iter().find(|row| row.key == "AWS_REGION").unwrap()
    }

    #[test]
    fn test_option_source_global_only_when_set() {
        let mut nav = navigator();
        let info = nav.info(Some("cloud.aws.ec2")).unwrap();
        let row = region_row(&info.options);
        assert_eq!(row.source, OptionSource::Module);
        assert_eq!(row.value, "us-east-1");

        nav.use_module("cloud.aws.ec2").unwrap();
        assert_eq!(region_row(&nav.show_options().unwrap()).source, OptionSource::Module);
        nav.back();

        nav.set("AWS_REGION", "eu-west-1").unwrap();
        let info = nav.info(Some("cloud.aws.ec2")).unwrap();
        let row = region_row(&info.options);
        assert_eq!(row.source, OptionSource::Global);
        assert_eq!(row.value, "eu-west-1");

        nav.use_module("cloud.aws.ec2").unwrap();
        let rows = nav.show_options().unwrap();
        assert_eq!(region_row(&rows).source, OptionSource::Global);
        assert_eq!(rows.iter().find(|r| r.key == "COUNT").unwrap().source, OptionSource::Module);
    }

    #[test]
    fn test_failed_use_keeps_active_module() {
        let mut nav = navigator();
        nav.use_module("misc.hello").unwrap();
        assert!(nav.use_module("misc.nope").is_err());
        assert_eq!(nav.session().active_path(), Some("misc.hello"));
    }

    #[test]
    fn test_back_unloads_then_navigates() {
        let mut nav = navigator();
        nav.cd(Some("cloud")).unwrap();
        nav.cd(Some("aws")).unwrap();
        nav.use_module("ec2").unwrap();
        assert_eq!(nav.back(), BackOutcome::Unloaded("cloud.aws.ec2".to_string()));
        assert_eq!(nav.back(), BackOutcome::Navigated("cloud".to_string()));
        assert_eq!(nav.back(), BackOutcome::Navigated(String::new()));
        assert_eq!(nav.back(), BackOutcome::AtRoot);
    }

    #[test]
    fn test_run_without_module() {
        let mut nav = navigator();
        assert!(matches!(nav.run(), Err(SessionError::NoActiveModule)));
        assert!(matches!(nav.set("RHOST", "x"), Err(SessionError::NoActiveModule)));
    }
}
