//! Greeting module for smoke-testing the shell

use serde_json::json;
use tracing::info;

use crate::module::{AuxiliaryModule, ModuleError, OptionSet, RunReport};

pub struct HelloWorld;

impl AuxiliaryModule for HelloWorld {
    fn execute(&mut self, options: &OptionSet) -> Result<RunReport, ModuleError> {
        let message = options.text("MESSAGE");
        let times = options.integer("TIMES").unwrap_or(1);
        if times < 1 {
            return Ok(RunReport::failure("TIMES must be at least 1"));
        }

        let lines: Vec<String> = (0..times).map(|_| message.clone()).collect();
        info!("hello_world printed {} line(s)", lines.len());
        Ok(RunReport::success(json!({ "message": message, "lines": lines })))
    }
}
