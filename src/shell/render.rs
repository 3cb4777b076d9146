//! Terminal rendering for shell output
//!
//! Everything the operator sees goes through here, written to any `Write`.

use comfy_table::modifiers::UTF8_ROUND_CORNERS;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use std::io::{self, Write};

use crate::module::options::mask_value;
use crate::module::registry::ModuleDescriptor;
use crate::module::RunReport;
use crate::session::{Listing, ModuleInfo, OptionRow, OptionSource};

const DESCRIPTION_WIDTH: usize = 60;

const HELP: [(&str, &str); 13] = [
    ("help", "Show this help"),
    ("clear, cls", "Clear the screen"),
    ("list, ls [target]", "List the current context, or move to target and list it"),
    ("cd [target|..]", "Change context; no target returns to root"),
    ("use, select <module>", "Load a module by path, short name or CVE id"),
    ("info [module]", "Show module details (default: active module)"),
    ("set <option> <value>", "Set a module or global option"),
    ("show options|global", "Show module options or global options"),
    ("run, exploit", "Run the active module"),
    ("back", "Unload the active module, or go up one level"),
    ("search <query>", "Search modules by name, description, CVE, category or author"),
    ("reload", "Reload the module catalog"),
    ("exit, quit, q", "Leave the shell"),
];

fn table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        );
    table
}

fn truncate(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        text.to_string()
    } else {
        let cut: String = text.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", cut)
    }
}

pub fn success(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "[+] {}", message)
}

pub fn status(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "[*] {}", message)
}

pub fn warning(out: &mut impl Write, message: &str) -> io::Result<()> {
    writeln!(out, "[!] {}", message)
}

pub fn error(out: &mut impl Write, err: &dyn std::fmt::Display) -> io::Result<()> {
    writeln!(out, "[-] {}", err)
}

pub fn help(out: &mut impl Write) -> io::Result<()> {
    let mut table = table(&["Command", "Description"]);
    for (command, description) in HELP {
        table.add_row(vec![Cell::new(command).fg(Color::Cyan), Cell::new(description)]);
    }
    writeln!(out, "{}", table)
}

pub fn clear(out: &mut impl Write) -> io::Result<()> {
    write!(out, "\x1B[2J\x1B[H")?;
    out.flush()
}

pub fn listing(out: &mut impl Write, listing: &Listing) -> io::Result<()> {
    match listing {
        Listing::Categories(categories) => {
            let mut table = table(&["Category", "Modules", "Description"]);
            for summary in categories {
                table.add_row(vec![
                    Cell::new(summary.category.as_str()).fg(Color::Cyan),
                    Cell::new(summary.count),
                    Cell::new(summary.description),
                ]);
            }
            writeln!(out, "{}", table)
        }
        Listing::Category { category, modules } => {
            if modules.is_empty() {
                return status(out, &format!("No modules in category '{}'", category));
            }
            module_table(out, modules)
        }
        Listing::Namespace { path, modules } => {
            if modules.is_empty() {
                return status(out, &format!("No modules under '{}'", path));
            }
            module_table(out, modules)
        }
    }
}

pub fn module_table(
    out: &mut impl Write,
    modules: &[std::sync::Arc<ModuleDescriptor>],
) -> io::Result<()> {
    let mut table = table(&["Path", "Name", "CVE", "Description"]);
    for descriptor in modules {
        let path = if descriptor.is_namespace {
            format!("{}/", descriptor.path)
        } else {
            descriptor.path.clone()
        };
        table.add_row(vec![
            Cell::new(path).fg(Color::Cyan),
            Cell::new(&descriptor.name),
            Cell::new(descriptor.cve_id().unwrap_or("-")),
            Cell::new(truncate(&descriptor.description, DESCRIPTION_WIDTH)),
        ]);
    }
    writeln!(out, "{}", table)
}

pub fn search_results(
    out: &mut impl Write,
    query: &str,
    results: &[std::sync::Arc<ModuleDescriptor>],
) -> io::Result<()> {
    if results.is_empty() {
        return error(out, &format!("No modules found matching '{}'", query));
    }
    status(out, &format!("Found {} module(s) matching '{}'", results.len(), query))?;
    module_table(out, results)
}

pub fn options(out: &mut impl Write, rows: &[OptionRow]) -> io::Result<()> {
    if rows.is_empty() {
        return status(out, "This module has no options");
    }
    let mut table = table(&["Option", "Value", "Type", "Required", "Source", "Description"]);
    for row in rows {
        let required = if row.required {
            Cell::new("yes").fg(Color::Red)
        } else {
            Cell::new("no")
        };
        let source = match row.source {
            OptionSource::Global => Cell::new("global").fg(Color::Yellow),
            OptionSource::Module => Cell::new("module"),
        };
        table.add_row(vec![
            Cell::new(&row.key).fg(Color::Cyan),
            Cell::new(mask_value(&row.key, &row.value)),
            Cell::new(row.kind),
            required,
            source,
            Cell::new(truncate(&row.description, DESCRIPTION_WIDTH)),
        ]);
    }
    writeln!(out, "{}", table)
}

pub fn globals(out: &mut impl Write, globals: &[(String, String)]) -> io::Result<()> {
    let mut table = table(&["Global option", "Value"]);
    for (key, value) in globals {
        table.add_row(vec![Cell::new(key).fg(Color::Cyan), Cell::new(mask_value(key, value))]);
    }
    writeln!(out, "{}", table)
}

pub fn info(out: &mut impl Write, info: &ModuleInfo) -> io::Result<()> {
    let descriptor = &info.descriptor;
    let mut table = table(&["Field", "Value"]);
    let mut row = |field: &str, value: String| {
        table.add_row(vec![Cell::new(field).add_attribute(Attribute::Bold), Cell::new(value)]);
    };

    row("Name", descriptor.name.clone());
    row("Path", descriptor.path.clone());
    row("Category", descriptor.category.to_string());
    if let Some(subcategory) = &descriptor.subcategory {
        row("Subcategory", subcategory.clone());
    }
    row("Author", descriptor.author.clone());
    row("Version", descriptor.version.clone());
    if let Some(cve_id) = descriptor.cve_id() {
        row("CVE", cve_id.to_string());
    }
    if let Some(cve) = &descriptor.cve {
        if let Some(score) = cve.cvss_score {
            row("CVSS", format!("{:.1}", score));
        }
        if let Some(rank) = &cve.rank {
            row("Rank", rank.clone());
        }
        if let Some(date) = &cve.disclosure_date {
            row("Disclosed", date.clone());
        }
    }
    if !descriptor.affected_versions.is_empty() {
        row("Affected", descriptor.affected_versions.join(", "));
    }
    if !descriptor.references.is_empty() {
        row("References", descriptor.references.join("\n"));
    }
    row("Source", descriptor.source.clone());
    if !descriptor.description.is_empty() {
        row("Description", descriptor.description.clone());
    }
    writeln!(out, "{}", table)?;

    if descriptor.is_namespace {
        return status(out, "Namespace: use 'cd' to browse its modules");
    }
    options(out, &info.options)
}

pub fn run_report(out: &mut impl Write, path: &str, report: &RunReport) -> io::Result<()> {
    if report.success {
        success(out, &format!("{} completed successfully", path))?;
    } else {
        let reason = report.error.as_deref().unwrap_or("no reason given");
        error(out, &format!("{} did not succeed: {}", path, reason))?;
    }
    if let Some(data) = &report.data {
        match serde_json::to_string_pretty(data) {
            Ok(text) => writeln!(out, "{}", text)?,
            Err(e) => error(out, &e)?,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::module::options::OptionType;
    use serde_json::json;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghijkl", 8), "abcde...");
    }

    #[test]
    fn test_options_mask_secrets() {
        let rows = vec![
            OptionRow {
                key: "SECRET_KEY".to_string(),
                value: "hunter2".to_string(),
                kind: OptionType::String,
                required: false,
                source: OptionSource::Global,
                description: String::new(),
            },
            OptionRow {
                key: "RHOST".to_string(),
                value: String::new(),
                kind: OptionType::String,
                required: true,
                source: OptionSource::Module,
                description: "Target host".to_string(),
            },
        ];
        let mut out = Vec::new();
        options(&mut out, &rows).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.contains("***"));
        assert!(!text.contains("hunter2"));
        assert!(text.contains("<not set>"));
        assert!(text.contains("global"));
    }

    #[test]
    fn test_run_report_failure() {
        let mut out = Vec::new();
        run_report(
            &mut out,
            "cve.demo",
            &RunReport::failure_with_data("not vulnerable", json!({"vulnerable": false})),
        )
        .unwrap();
        let text = String::from_utf8(out).unwrap();
        assert!(text.starts_with("[-] cve.demo did not succeed: not vulnerable"));
        assert!(text.contains("\"vulnerable\": false"));
    }
}
