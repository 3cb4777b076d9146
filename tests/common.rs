//! Shared fixtures for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tempfile::TempDir;

use serde_json::json;
use vigil::module::registry::{CatalogSources, DescriptorSource};
use vigil::module::{
    AuxiliaryModule, ExploitModule, FactoryTable, Implementation, ModuleError, OptionSet,
    RunReport,
};
use vigil::session::Navigator;

/// Catalog directory in an isolated temp dir
pub struct CatalogFixture {
    pub temp_dir: TempDir,
    pub catalog_dir: PathBuf,
}

impl CatalogFixture {
    pub fn new() -> Result<Self, Box<dyn std::error::Error>> {
        let temp_dir = TempDir::new()?;
        let catalog_dir = temp_dir.path().join("catalog");
        std::fs::create_dir_all(&catalog_dir)?;
        Ok(Self {
            temp_dir,
            catalog_dir,
        })
    }

    /// Write a descriptor document below the catalog dir
    pub fn write_document<P: AsRef<Path>>(
        &self,
        relative: P,
        contents: &str,
    ) -> Result<PathBuf, Box<dyn std::error::Error>> {
        let path = self.catalog_dir.join(relative);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, contents)?;
        Ok(path)
    }

    pub fn sources(&self) -> CatalogSources {
        CatalogSources::new().with_dir(&self.catalog_dir)
    }
}

/// Catalog used by the session and shell tests
pub const TEST_CATALOG: &str = r#"
[[modules]]
id = "cloud.aws"
name = "AWS"
module_path = "cloud.aws"
category = "cloud"
is_namespace = true

[[modules]]
id = "cloud.aws.iam"
name = "IAM"
module_path = "cloud.aws.iam"
category = "cloud"
is_namespace = true

[[modules]]
id = "aws_ec2"
name = "EC2 audit"
description = "Audit EC2 instances"
module_path = "cloud.aws.ec2"
category = "cloud"
required_options = ["AWS_REGION"]

[modules.options]
AWS_REGION = "us-east-1"
SECRET_KEY = ""

[[modules]]
id = "aws_iam_users"
name = "IAM users"
module_path = "cloud.aws.iam.users"
category = "cloud"

[[modules]]
id = "CVE-2021-44228"
name = "Log4Shell"
description = "JNDI lookup injection in Apache Log4j"
module_path = "cve.2021.log4shell"
category = "cve"
cve_id = "CVE-2021-44228"
cvss_score = 10.0
required_options = ["RHOST"]

[modules.options]
RHOST = { type = "string" }
RPORT = 8080

[[modules]]
id = "echo"
name = "Echo"
module_path = "misc.echo"
category = "misc"

[modules.options]
MESSAGE = "hello"

[[modules]]
id = "boom"
name = "Boom"
module_path = "misc.boom"
category = "misc"

[[modules]]
id = "orphan"
name = "Orphan"
module_path = "misc.orphan"
category = "misc"
"#;

/// Echoes its MESSAGE option and counts runs
pub struct Echo {
    pub runs: Arc<AtomicUsize>,
}

impl AuxiliaryModule for Echo {
    fn execute(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError> {
        self.runs.fetch_add(1, Ordering::SeqCst);
        Ok(RunReport::success(json!({
            "message": options.text("MESSAGE"),
            "region": options.text("AWS_REGION"),
        })))
    }
}

/// Panics on every run
pub struct Boom;

impl AuxiliaryModule for Boom {
    fn execute(&mut self, _options: &OptionSet) -> Result<RunReport, ModuleError> {
        panic!("boom");
    }
}

/// Vulnerable when RHOST is `vulnerable.local`
pub struct StubExploit;

impl ExploitModule for StubExploit {
    fn check(&mut self, options: &OptionSet) -> Result<bool, ModuleError> {
        Ok(options.text("RHOST") == "vulnerable.local")
    }

    fn exploit(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError> {
        Ok(RunReport::success(json!({
            "target": format!("{}:{}", options.text("RHOST"), options.text("RPORT")),
        })))
    }
}

/// Factories for [`TEST_CATALOG`]; `misc.orphan` deliberately has none
pub fn test_factories(runs: Arc<AtomicUsize>) -> FactoryTable {
    let mut table = FactoryTable::new();
    let echo_runs = runs.clone();
    table
        .register("misc.echo", move |_| {
            Ok(Implementation::Auxiliary(Box::new(Echo {
                runs: echo_runs.clone(),
            })))
        })
        .register("cloud.aws.ec2", move |_| {
            Ok(Implementation::Auxiliary(Box::new(Echo { runs: runs.clone() })))
        })
        .register("cloud.aws.iam.users", |_| {
            Ok(Implementation::Auxiliary(Box::new(Boom)))
        })
        .register("misc.boom", |_| Ok(Implementation::Auxiliary(Box::new(Boom))))
        .register("cve.2021.log4shell", |_| {
            Ok(Implementation::Exploit(Box::new(StubExploit)))
        });
    table
}

/// Navigator over [`TEST_CATALOG`] as an embedded document
pub fn test_navigator() -> Navigator {
    let sources = CatalogSources::new()
        .with_embedded(vec![DescriptorSource::toml("test-catalog", TEST_CATALOG)]);
    Navigator::new(sources, test_factories(Arc::new(AtomicUsize::new(0))))
        .expect("embedded catalog always collects")
}
