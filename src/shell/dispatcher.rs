//! Command dispatcher
//!
//! Routes parsed commands to the navigator and renders the outcome. Errors are
//! rendered, never propagated: only output failures leave `dispatch`.

use std::io::{self, Write};
use tracing::debug;

use crate::module::options::mask_value;
use crate::session::{BackOutcome, Navigator, SetOutcome, UseOutcome};
use crate::shell::command::{Command, ShowTarget};
use crate::shell::render;

/// Whether the shell loop should keep reading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

pub struct Dispatcher<W: Write> {
    navigator: Navigator,
    out: W,
}

impl<W: Write> Dispatcher<W> {
    pub fn new(navigator: Navigator, out: W) -> Self {
        Self { navigator, out }
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }

    pub fn navigator_mut(&mut self) -> &mut Navigator {
        &mut self.navigator
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn output_mut(&mut self) -> &mut W {
        &mut self.out
    }

    /// `vigil> ` at root, `vigil(<context>)> ` elsewhere
    pub fn prompt(&self) -> String {
        match self.navigator.context() {
            "" => "vigil> ".to_string(),
            context => format!("vigil({})> ", context),
        }
    }

    /// Parse and execute one input line
    pub fn dispatch(&mut self, line: &str) -> io::Result<Flow> {
        match Command::parse(line) {
            Ok(Some(command)) => {
                debug!("Dispatching {:?}", command);
                self.execute(command)
            }
            Ok(None) => Ok(Flow::Continue),
            Err(e) => {
                render::error(&mut self.out, &e)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn execute(&mut self, command: Command) -> io::Result<Flow> {
        let out = &mut self.out;
        let nav = &mut self.navigator;

        match command {
            Command::Help => render::help(out)?,
            Command::Clear => render::clear(out)?,
            Command::List(target) => match nav.list(target.as_deref()) {
                Ok(listing) => render::listing(out, &listing)?,
                Err(e) => render::error(out, &e)?,
            },
            Command::Cd(target) => match nav.cd(target.as_deref()) {
                Ok(_) => match nav.context() {
                    "" => render::status(out, "At root")?,
                    context => render::status(out, &format!("Context: {}", context))?,
                },
                Err(e) => render::error(out, &e)?,
            },
            Command::Use(name) => match nav.use_module(&name) {
                Ok(UseOutcome::Loaded { path, replaced }) => {
                    if let Some(old) = replaced.filter(|old| *old != path) {
                        render::status(out, &format!("Unloaded {}", old))?;
                    }
                    render::success(out, &format!("Loaded module: {}", path))?;
                }
                Ok(UseOutcome::Entered(listing)) => {
                    render::status(out, &format!("Entered namespace: {}", nav.context()))?;
                    render::listing(out, &listing)?;
                }
                Err(e) => render::error(out, &e)?,
            },
            Command::Set { key, value } => match nav.set(&key, &value) {
                Ok(SetOutcome::Global {
                    key,
                    value,
                    applied_to_module,
                }) => {
                    let scope = if applied_to_module {
                        "global, applied to active module"
                    } else {
                        "global"
                    };
                    render::success(
                        out,
                        &format!("{} => {} ({})", key, mask_value(&key, &value), scope),
                    )?;
                }
                Ok(SetOutcome::Module { key, value }) => {
                    render::success(
                        out,
                        &format!("{} => {}", key, mask_value(&key, &value.to_string())),
                    )?;
                }
                Err(e) => render::error(out, &e)?,
            },
            Command::Show(ShowTarget::Options) => match nav.show_options() {
                Ok(rows) => render::options(out, &rows)?,
                Err(e) => render::error(out, &e)?,
            },
            Command::Show(ShowTarget::Globals) => render::globals(out, &nav.show_globals())?,
            Command::Run => {
                let path = nav.session().active_path().map(str::to_string);
                if let Some(path) = &path {
                    render::status(out, &format!("Running {}...", path))?;
                }
                match nav.run() {
                    Ok(report) => render::run_report(out, path.as_deref().unwrap_or(""), &report)?,
                    Err(e) => render::error(out, &e)?,
                }
            }
            Command::Back => match nav.back() {
                BackOutcome::Unloaded(path) => render::status(out, &format!("Unloaded {}", path))?,
                BackOutcome::Navigated(context) if context.is_empty() => {
                    render::status(out, "At root")?
                }
                BackOutcome::Navigated(context) => {
                    render::status(out, &format!("Context: {}", context))?
                }
                BackOutcome::AtRoot => render::status(out, "Already at root")?,
            },
            Command::Reload => match nav.reload() {
                Ok(summary) => {
                    if let Some(path) = &summary.unloaded {
                        render::status(out, &format!("Unloaded {}", path))?;
                    }
                    for err in &summary.errors {
                        render::warning(out, &err.to_string())?;
                    }
                    render::success(
                        out,
                        &format!("Reloaded {} catalog entries", summary.modules),
                    )?;
                }
                Err(e) => render::error(out, &e)?,
            },
            Command::Search(query) => {
                let results = nav.search(&query);
                render::search_results(out, &query, &results)?;
            }
            Command::Info(target) => match nav.info(target.as_deref()) {
                Ok(info) => render::info(out, &info)?,
                Err(e) => render::error(out, &e)?,
            },
            Command::Exit => {
                writeln!(out, "Goodbye.")?;
                return Ok(Flow::Exit);
            }
        }
        Ok(Flow::Continue)
    }
}
