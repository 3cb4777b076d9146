//! Built-in modules
//!
//! The descriptor documents under `catalog/` are compiled into the binary and
//! every non-namespace entry has a factory in [`factories`].

pub mod apache_traversal;
pub mod aws_ec2;
pub mod grafana_traversal;
pub mod hello_world;
pub mod http;
pub mod port_scan;

use crate::module::{DescriptorSource, FactoryTable, Implementation};

/// Embedded catalog documents, named after their file under `catalog/`
pub fn catalog() -> Vec<DescriptorSource> {
    vec![
        DescriptorSource::toml("builtin:misc.toml", include_str!("../../catalog/misc.toml")),
        DescriptorSource::toml(
            "builtin:enumeration.toml",
            include_str!("../../catalog/enumeration.toml"),
        ),
        DescriptorSource::toml("builtin:cve.toml", include_str!("../../catalog/cve.toml")),
        DescriptorSource::toml(
            "builtin:cloud/aws.toml",
            include_str!("../../catalog/cloud/aws.toml"),
        ),
    ]
}

/// Factories for every built-in module path
pub fn factories() -> FactoryTable {
    let mut table = FactoryTable::new();
    table
        .register("misc.hello_world", |_| {
            Ok(Implementation::Auxiliary(Box::new(hello_world::HelloWorld)))
        })
        .register("enumeration.tcp_port_scan", |_| {
            Ok(Implementation::Auxiliary(Box::new(port_scan::TcpPortScan)))
        })
        .register("cve.2021.apache_path_traversal", |_| {
            Ok(Implementation::Exploit(Box::new(
                apache_traversal::ApachePathTraversal,
            )))
        })
        .register("cve.2021.grafana_plugin_traversal", |_| {
            Ok(Implementation::Exploit(Box::new(
                grafana_traversal::GrafanaPluginTraversal::default(),
            )))
        })
        .register("cloud.aws.ec2", |_| {
            Ok(Implementation::Cloud(Box::new(aws_ec2::Ec2Audit::default())))
        });
    table
}
