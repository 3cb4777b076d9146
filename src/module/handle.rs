//! Loaded module instances
//!
//! A [`ModuleHandle`] pairs one freshly built implementation with its live
//! option values. It is the only thing the session holds for the active module.

use serde_json::json;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::module::options::{OptionError, OptionSet, OptionValue};
use crate::module::registry::ModuleDescriptor;
use crate::module::traits::{Implementation, ModuleError, RunReport};

pub struct ModuleHandle {
    instance_id: String,
    descriptor: Arc<ModuleDescriptor>,
    options: OptionSet,
    implementation: Implementation,
}

impl ModuleHandle {
    /// Wrap a new implementation; options start at the schema defaults
    pub fn new(descriptor: Arc<ModuleDescriptor>, implementation: Implementation) -> Self {
        let instance_id = format!("{}_{}", descriptor.path, Uuid::new_v4());
        let options = OptionSet::from_schema(descriptor.options.clone());
        Self {
            instance_id,
            descriptor,
            options,
            implementation,
        }
    }

    /// Unique per instantiation, even for the same path
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn path(&self) -> &str {
        &self.descriptor.path
    }

    pub fn descriptor(&self) -> &Arc<ModuleDescriptor> {
        &self.descriptor
    }

    /// `auxiliary`, `exploit` or `cloud`
    pub fn kind(&self) -> &'static str {
        self.implementation.kind()
    }

    pub fn options(&self) -> &OptionSet {
        &self.options
    }

    pub fn required_options(&self) -> Vec<String> {
        self.options.schema().required().map(str::to_string).collect()
    }

    /// Coerce and store operator input
    pub fn set_option(&mut self, key: &str, raw: &str) -> Result<OptionValue, OptionError> {
        let value = self.options.set_raw(key, raw)?;
        debug!("{}: {} = {}", self.instance_id, key, value);
        Ok(value)
    }

    /// Store an already-typed value
    pub fn apply_option(&mut self, key: &str, value: OptionValue) -> Result<(), OptionError> {
        self.options.set_value(key, value)
    }

    /// Validate required options, then dispatch on the capability
    ///
    /// A panic inside the implementation is reported as an operation error
    /// and leaves the handle usable.
    pub fn run(&mut self) -> Result<RunReport, ModuleError> {
        let missing = self.options.missing_required();
        if !missing.is_empty() {
            return Ok(RunReport::failure(format!(
                "Invalid options: required option(s) not set: {}",
                missing.join(", ")
            )));
        }

        info!("Running {} as {}", self.descriptor.path, self.kind());
        let options = &self.options;
        let implementation = &mut self.implementation;
        panic::catch_unwind(AssertUnwindSafe(|| dispatch(implementation, options))).unwrap_or_else(
            |payload| {
                Err(ModuleError::OperationError(format!(
                    "module panicked: {}",
                    panic_message(payload.as_ref())
                )))
            },
        )
    }
}

impl std::fmt::Debug for ModuleHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleHandle")
            .field("instance_id", &self.instance_id)
            .field("implementation", &self.implementation)
            .finish()
    }
}

fn dispatch(
    implementation: &mut Implementation,
    options: &OptionSet,
) -> Result<RunReport, ModuleError> {
    match implementation {
        Implementation::Auxiliary(module) => module.execute(options),
        Implementation::Exploit(module) => {
            if !module.check(options)? {
                return Ok(RunReport::failure_with_data(
                    "Target does not appear to be vulnerable",
                    json!({ "vulnerable": false, "exploited": false }),
                ));
            }
            module.exploit(options)
        }
        Implementation::Cloud(module) => {
            let resources = module.enumerate_resources(options)?;
            let findings = module.check_misconfigurations(options)?;
            let mut data = json!({
                "provider": module.provider(),
                "total_resources": resources.len(),
                "total_issues": findings.len(),
                "resources": serde_json::to_value(&resources)?,
                "misconfigurations": serde_json::to_value(&findings)?,
            });
            if let Some(credentials) = module.credentials(options) {
                data["credentials"] = credentials;
            }
            Ok(RunReport::success(data))
        }
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
