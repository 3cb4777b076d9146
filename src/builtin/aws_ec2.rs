//! Offline EC2 misconfiguration audit
//!
//! Works from the JSON the AWS CLI prints for `describe-instances`,
//! `describe-security-groups` and `describe-volumes`, merged into one
//! document (any of the three top-level arrays may be missing).

use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::path::Path;
use tracing::{debug, info};

use crate::module::options::mask_value;
use crate::module::{CloudModule, Finding, ModuleError, OptionSet, Resource, Severity};

/// Credential options reported, masked, with every run
const CREDENTIAL_OPTIONS: [&str; 3] = ["ACCESS_KEY", "SECRET_KEY", "SESSION_TOKEN"];

/// Ports that should never be open to the whole internet
const ADMIN_PORTS: [(i64, &str); 2] = [(22, "SSH"), (3389, "RDP")];
const OPEN_CIDRS: [&str; 2] = ["0.0.0.0/0", "::/0"];

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Inventory {
    #[serde(default)]
    reservations: Vec<Reservation>,
    #[serde(default)]
    security_groups: Vec<Value>,
    #[serde(default)]
    volumes: Vec<Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Reservation {
    #[serde(default)]
    instances: Vec<Value>,
}

#[derive(Default)]
pub struct Ec2Audit {
    inventory: Inventory,
}

fn load_inventory(path: &Path) -> Result<Inventory, ModuleError> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        ModuleError::OperationError(format!("Cannot read inventory {}: {}", path.display(), e))
    })?;
    Ok(serde_json::from_str(&contents)?)
}

fn text<'a>(value: &'a Value, key: &str) -> &'a str {
    value.get(key).and_then(Value::as_str).unwrap_or_default()
}

fn resource(kind: &str, id: &str, region: &str, value: &Value, verbose: bool) -> Resource {
    let attributes = match value {
        Value::Object(map) if verbose => map.clone(),
        _ => Map::new(),
    };
    Resource {
        kind: kind.to_string(),
        id: id.to_string(),
        region: Some(region.to_string()),
        attributes,
    }
}

/// True when an ingress permission is reachable from anywhere
fn open_to_world(permission: &Value) -> bool {
    let v4 = permission
        .get("IpRanges")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .any(|range| OPEN_CIDRS.contains(&text(range, "CidrIp")));
    let v6 = permission
        .get("Ipv6Ranges")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .any(|range| OPEN_CIDRS.contains(&text(range, "CidrIpv6")));
    v4 || v6
}

/// Port range of a permission; protocol `-1` means every port
fn port_range(permission: &Value) -> Option<(i64, i64)> {
    if text(permission, "IpProtocol") == "-1" {
        return None;
    }
    let from = permission.get("FromPort").and_then(Value::as_i64)?;
    let to = permission.get("ToPort").and_then(Value::as_i64)?;
    Some((from, to))
}

fn security_group_findings(group: &Value) -> Vec<Finding> {
    let id = text(group, "GroupId");
    let mut findings = Vec::new();
    let permissions = group
        .get("IpPermissions")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter(|permission| open_to_world(permission));

    for permission in permissions {
        match port_range(permission) {
            None => findings.push(Finding {
                severity: Severity::Critical,
                resource_id: id.to_string(),
                title: "All traffic open to the internet".to_string(),
                detail: format!("{} allows every protocol and port from anywhere", id),
            }),
            Some((from, to)) => {
                for (port, service) in ADMIN_PORTS {
                    if (from..=to).contains(&port) {
                        findings.push(Finding {
                            severity: Severity::High,
                            resource_id: id.to_string(),
                            title: format!("{} open to the internet", service),
                            detail: format!("{} allows port {} from anywhere", id, port),
                        });
                    }
                }
            }
        }
    }
    findings
}

fn instance_findings(instance: &Value) -> Vec<Finding> {
    let id = text(instance, "InstanceId");
    let mut findings = Vec::new();

    let public_ip = text(instance, "PublicIpAddress");
    if !public_ip.is_empty() {
        findings.push(Finding {
            severity: Severity::Medium,
            resource_id: id.to_string(),
            title: "Instance has a public IP address".to_string(),
            detail: format!("{} is reachable at {}", id, public_ip),
        });
    }

    let tokens = instance
        .get("MetadataOptions")
        .map(|options| text(options, "HttpTokens"))
        .unwrap_or_default();
    if tokens != "required" {
        findings.push(Finding {
            severity: Severity::Medium,
            resource_id: id.to_string(),
            title: "IMDSv1 enabled".to_string(),
            detail: format!("{} does not require session tokens for instance metadata", id),
        });
    }
    findings
}

fn volume_findings(volume: &Value) -> Vec<Finding> {
    let id = text(volume, "VolumeId");
    if volume.get("Encrypted").and_then(Value::as_bool).unwrap_or(false) {
        return Vec::new();
    }
    vec![Finding {
        severity: Severity::Low,
        resource_id: id.to_string(),
        title: "Unencrypted EBS volume".to_string(),
        detail: format!("{} is not encrypted at rest", id),
    }]
}

impl Ec2Audit {
    fn instances(&self) -> impl Iterator<Item = &Value> {
        self.inventory
            .reservations
            .iter()
            .flat_map(|reservation| reservation.instances.iter())
    }
}

impl CloudModule for Ec2Audit {
    fn provider(&self) -> &str {
        "aws"
    }

    fn enumerate_resources(&mut self, options: &OptionSet) -> Result<Vec<Resource>, ModuleError> {
        let region = options.text("AWS_REGION");
        let verbose = options.flag("VERBOSE");
        let path = options.text("INVENTORY_FILE");
        self.inventory = load_inventory(Path::new(&path))?;

        let mut resources: Vec<Resource> = self
            .instances()
            .map(|instance| {
                resource("instance", text(instance, "InstanceId"), &region, instance, verbose)
            })
            .collect();
        resources.extend(self.inventory.security_groups.iter().map(|group| {
            resource("security_group", text(group, "GroupId"), &region, group, verbose)
        }));
        resources.extend(self.inventory.volumes.iter().map(|volume| {
            resource("volume", text(volume, "VolumeId"), &region, volume, verbose)
        }));

        let profile = options.text("AWS_PROFILE");
        info!(
            "Enumerated {} EC2 resource(s) in {} from {}{}",
            resources.len(),
            region,
            path,
            if profile.is_empty() { String::new() } else { format!(" (profile {})", profile) }
        );
        Ok(resources)
    }

    fn check_misconfigurations(
        &mut self,
        _options: &OptionSet,
    ) -> Result<Vec<Finding>, ModuleError> {
        let mut findings: Vec<Finding> = self
            .inventory
            .security_groups
            .iter()
            .flat_map(security_group_findings)
            .collect();
        findings.extend(self.instances().flat_map(instance_findings));
        findings.extend(self.inventory.volumes.iter().flat_map(volume_findings));

        findings.sort_by(|a, b| b.severity.cmp(&a.severity));
        debug!("EC2 audit produced {} finding(s)", findings.len());
        Ok(findings)
    }

    fn credentials(&self, options: &OptionSet) -> Option<Value> {
        let mut summary = Map::new();
        summary.insert(
            "profile".to_string(),
            json!(mask_value("AWS_PROFILE", &options.text("AWS_PROFILE"))),
        );
        for key in CREDENTIAL_OPTIONS {
            summary.insert(key.to_ascii_lowercase(), json!(mask_value(key, &options.text(key))));
        }
        Some(Value::Object(summary))
    }
}

/// Sample inventory used by tests
#[cfg(test)]
pub(crate) fn sample_inventory() -> Value {
    serde_json::json!({
        "Reservations": [{
            "Instances": [
                {
                    "InstanceId": "i-0abc",
                    "PublicIpAddress": "203.0.113.10",
                    "MetadataOptions": { "HttpTokens": "optional" }
                },
                {
                    "InstanceId": "i-0def",
                    "MetadataOptions": { "HttpTokens": "required" }
                }
            ]
        }],
        "SecurityGroups": [
            {
                "GroupId": "sg-ssh",
                "IpPermissions": [{
                    "IpProtocol": "tcp", "FromPort": 22, "ToPort": 22,
                    "IpRanges": [{ "CidrIp": "0.0.0.0/0" }]
                }]
            },
            {
                "GroupId": "sg-all",
                "IpPermissions": [{
                    "IpProtocol": "-1",
                    "Ipv6Ranges": [{ "CidrIpv6": "::/0" }]
                }]
            },
            {
                "GroupId": "sg-internal",
                "IpPermissions": [{
                    "IpProtocol": "tcp", "FromPort": 0, "ToPort": 65535,
                    "IpRanges": [{ "CidrIp": "10.0.0.0/8" }]
                }]
            }
        ],
        "Volumes": [
            { "VolumeId": "vol-plain", "Encrypted": false },
            { "VolumeId": "vol-safe", "Encrypted": true }
        ]
    })
}
