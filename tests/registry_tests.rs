//! Catalog loading and registry indexing from descriptor documents on disk

mod common;

use common::CatalogFixture;
use proptest::prelude::*;

use vigil::module::registry::{CatalogSources, DescriptorSource, DescriptorStore};
use vigil::module::{Category, OptionType, OptionValue, ValidationError};

#[test]
fn test_directory_catalog_mixed_formats() {
    let fixture = CatalogFixture::new().unwrap();
    fixture
        .write_document(
            "cve/2021.toml",
            r#"
[[modules]]
id = "CVE-2021-44228"
name = "Log4Shell"
module_path = "cve.2021.log4shell"
category = "vuln"
cve_id = "cve-2021-44228"
"#,
        )
        .unwrap();
    fixture
        .write_document(
            "misc.json",
            r#"{"modules": [{"id": "hello", "name": "Hello",
                "module_path": "misc.hello", "category": "aux"}]}"#,
        )
        .unwrap();
    fixture.write_document("README.md", "not a descriptor").unwrap();

    let sources = fixture.sources().collect().unwrap().documents;
    assert_eq!(sources.len(), 2);

    let (registry, errors) = DescriptorStore::load(&sources);
    assert!(errors.is_empty(), "{:?}", errors);
    assert_eq!(registry.len(), 2);
    assert_eq!(registry.get("CVE-2021-44228").unwrap().category, Category::Cve);
    assert_eq!(registry.get("modules.misc.hello").unwrap().category, Category::Misc);
    assert_eq!(registry.resolve_cve("cve_2021_44228"), Some("cve.2021.log4shell"));
}

#[test]
fn test_first_definition_wins_across_documents() {
    let fixture = CatalogFixture::new().unwrap();
    let entry = |name: &str| {
        format!(
            concat!(
                "[[modules]]\nid = \"{0}\"\nname = \"{0}\"\n",
                "module_path = \"misc.dup\"\ncategory = \"misc\"\n",
            ),
            name
        )
    };
    fixture.write_document("a.toml", &entry("first")).unwrap();
    fixture.write_document("b.toml", &entry("second")).unwrap();

    let (registry, errors) = DescriptorStore::load_collected(&fixture.sources().collect().unwrap());
    assert_eq!(registry.get("misc.dup").unwrap().name, "first");
    assert_eq!(errors.len(), 1);
    assert!(matches!(errors[0], ValidationError::DuplicatePath { .. }));
}

#[test]
fn test_bad_entries_do_not_block_good_ones() {
    let document = r#"
[[modules]]
id = "ok"
name = "Ok"
module_path = "misc.ok"
category = "misc"

[[modules]]
id = "no-path"
name = "No path"
category = "misc"

[[modules]]
id = "bad-option"
name = "Bad option"
module_path = "misc.bad_option"
category = "misc"
[modules.options]
PORT = { type = "integer", default = "eighty" }
"#;
    let sources = vec![
        DescriptorSource::toml("good-and-bad", document),
        DescriptorSource::json("broken", "{ not json"),
    ];
    let (registry, errors) = DescriptorStore::load(&sources);

    assert_eq!(registry.len(), 1);
    assert!(registry.contains("misc.ok"));
    assert_eq!(errors.len(), 3);
    assert!(errors.iter().any(|e| matches!(
        e,
        ValidationError::MissingFields { fields, .. } if fields.contains(&"module_path".to_string())
    )));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::InvalidDefinition { .. })));
    assert!(errors.iter().any(|e| matches!(e, ValidationError::MalformedDocument { .. })));
}

#[test]
fn test_unknown_category_falls_back_to_misc() {
    let document =
        r#"{"modules": [{"id": "x", "name": "X", "module_path": "web.x", "category": "web"}]}"#;
    let (registry, errors) = DescriptorStore::load(&[DescriptorSource::json("doc", document)]);
    assert!(errors.is_empty());
    assert_eq!(registry.get("web.x").unwrap().category, Category::Misc);
    assert!(registry.list_by_category("web").is_empty());
}

#[test]
fn test_cloud_category_lists_namespaces_only() {
    let document = r#"
[[modules]]
id = "cloud.gcp"
name = "GCP"
module_path = "cloud.gcp"
category = "cloud"
is_namespace = true

[[modules]]
id = "gcs"
name = "GCS buckets"
module_path = "cloud.gcp.gcs"
category = "cloud"
"#;
    let (registry, _) = DescriptorStore::load(&[DescriptorSource::toml("doc", document)]);
    let listing = registry.list_by_category("cloud");
    assert_eq!(listing.len(), 1);
    assert!(listing[0].is_namespace);
    assert_eq!(registry.list_under_namespace("cloud.gcp").len(), 1);
    assert_eq!(registry.stats().total_modules, 1);
}

#[test]
fn test_empty_catalog() {
    let collected = CatalogSources::new().collect().unwrap();
    let (registry, errors) = DescriptorStore::load_collected(&collected);
    assert!(registry.is_empty());
    assert!(errors.is_empty());
}

const SEARCH_CATALOG: &str = r#"
[[modules]]
id = "CVE-2021-42013"
name = "Apache traversal"
description = "Reads files through a path traversal in Apache 2.4.50"
author = "alice"
module_path = "cve.2021.apache"
category = "cve"

[[modules]]
id = "ssh_enum"
name = "SSH users"
description = "Enumerates SSH users"
author = "Bob Builder"
module_path = "enumeration.ssh_users"
category = "enumeration"

[[modules]]
id = "greeter"
name = "Greeter"
description = "Says hello"
author = "carol"
module_path = "misc.greeter"
category = "misc"
"#;

fn search_paths(query: &str) -> Vec<String> {
    let (registry, errors) =
        DescriptorStore::load(&[DescriptorSource::toml("search", SEARCH_CATALOG)]);
    assert!(errors.is_empty(), "{:?}", errors);
    registry.search(query).iter().map(|d| d.path.clone()).collect()
}

#[test]
fn test_search_matches_description_case_insensitively() {
    assert_eq!(search_paths("traversal"), vec!["cve.2021.apache"]);
    assert_eq!(search_paths("TRAVERSAL"), vec!["cve.2021.apache"]);
    assert_eq!(search_paths("path traversal"), vec!["cve.2021.apache"]);
}

#[test]
fn test_search_matches_cve_author_and_category() {
    assert_eq!(search_paths("cve-2021-42013"), vec!["cve.2021.apache"]);
    assert_eq!(search_paths("builder"), vec!["enumeration.ssh_users"]);
    assert_eq!(search_paths("enumeration"), vec!["enumeration.ssh_users"]);
    assert_eq!(search_paths("misc"), vec!["misc.greeter"]);
    assert!(search_paths("kubernetes").is_empty());
}

#[test]
fn test_search_results_sorted_by_name() {
    assert_eq!(
        search_paths("e"),
        vec!["cve.2021.apache", "misc.greeter", "enumeration.ssh_users"]
    );
}

proptest! {
    #[test]
    fn prop_get_returns_submitted_fields(
        entries in prop::collection::vec(
            (
                0usize..5,
                "[a-z]{1,8}",
                "[a-z ]{0,24}",
                "[A-Za-z]{1,10}",
                (0u8..10, 0u8..20),
                1i64..65536,
                any::<bool>(),
            ),
            1..12,
        )
    ) {
        let modules: Vec<serde_json::Value> = entries
            .iter()
            .enumerate()
            .map(|(i, (slot, name, description, author, (major, minor), port, with_cve))| {
                let mut module = serde_json::json!({
                    "id": format!("id{}", i),
                    "name": name,
                    "description": description,
                    "author": author,
                    "version": format!("{}.{}", major, minor),
                    "module_path": format!("misc.m{}", slot),
                    "category": "misc",
                    "options": { "RPORT": port, "RHOST": { "type": "string" } },
                    "required_options": ["RHOST"],
                });
                if *with_cve {
                    module["cve_id"] = serde_json::json!(format!("CVE-2020-{:04}", i));
                    module["cvss_score"] = serde_json::json!(7.5);
                }
                module
            })
            .collect();
        let document = serde_json::json!({ "modules": modules }).to_string();
        let (registry, _) = DescriptorStore::load(&[DescriptorSource::json("prop", document)]);

        let mut seen = std::collections::HashSet::new();
        for (i, entry) in entries.iter().enumerate() {
            let (slot, name, description, author, (major, minor), port, with_cve) = entry;
            if !seen.insert(*slot) {
                continue;
            }
            let descriptor = registry.get(&format!("misc.m{}", slot)).unwrap();
            prop_assert_eq!(&descriptor.id, &format!("id{}", i));
            prop_assert_eq!(&descriptor.name, name);
            prop_assert_eq!(&descriptor.description, description);
            prop_assert_eq!(&descriptor.author, author);
            prop_assert_eq!(&descriptor.version, &format!("{}.{}", major, minor));
            prop_assert_eq!(descriptor.category, Category::Misc);
            prop_assert_eq!(descriptor.source.as_str(), "prop");

            let rport = descriptor.options.get("RPORT").unwrap();
            prop_assert_eq!(rport.kind, OptionType::Integer);
            prop_assert_eq!(&rport.default, &OptionValue::Integer(*port));
            prop_assert_eq!(descriptor.options.get("RHOST").unwrap().kind, OptionType::String);
            prop_assert!(descriptor.options.is_required("RHOST"));

            if *with_cve {
                let cve_id = format!("CVE-2020-{:04}", i);
                prop_assert_eq!(descriptor.cve_id(), Some(cve_id.as_str()));
                prop_assert_eq!(descriptor.cve.as_ref().and_then(|c| c.cvss_score), Some(7.5));
                prop_assert_eq!(registry.get(&cve_id).unwrap(), descriptor);
            } else {
                prop_assert_eq!(descriptor.cve_id(), None);
            }
        }
    }

    #[test]
    fn prop_first_occurrence_of_each_path_is_kept(
        entries in prop::collection::vec((0usize..5, "[a-z]{1,8}"), 1..20)
    ) {
        let modules: Vec<serde_json::Value> = entries
            .iter()
            .enumerate()
            .map(|(i, (slot, name))| serde_json::json!({
                "id": format!("id{}", i),
                "name": name,
                "module_path": format!("misc.m{}", slot),
                "category": "misc",
            }))
            .collect();
        let document = serde_json::json!({ "modules": modules }).to_string();
        let (registry, errors) = DescriptorStore::load(&[DescriptorSource::json("prop", document)]);

        let mut seen = std::collections::HashSet::new();
        let firsts: Vec<&(usize, String)> =
            entries.iter().filter(|(slot, _)| seen.insert(*slot)).collect();

        prop_assert_eq!(registry.len(), firsts.len());
        prop_assert_eq!(errors.len(), entries.len() - firsts.len());
        for (slot, name) in firsts {
            let path = format!("misc.m{}", slot);
            let descriptor = registry.get(&path).unwrap();
            prop_assert_eq!(&descriptor.name, name);
            prop_assert_eq!(registry.get(&format!("modules.{}", path)).unwrap(), descriptor);
        }
    }
}
