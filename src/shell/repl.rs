//! Interactive read-eval-print loop

use std::io::{self, BufRead, Write};
use tracing::info;

use crate::shell::dispatcher::{Dispatcher, Flow};
use crate::shell::render;

/// Print the startup banner with catalog statistics
pub fn banner<W: Write>(dispatcher: &mut Dispatcher<W>) -> io::Result<()> {
    let stats = dispatcher.navigator().registry().stats();
    let rejected = dispatcher.navigator().load_errors().len();
    let out = dispatcher.output_mut();

    writeln!(out, "vigil {}", env!("CARGO_PKG_VERSION"))?;
    render::status(
        out,
        &format!(
            "{} modules ({} CVE) in {} namespaces",
            stats.total_modules, stats.total_cves, stats.total_namespaces
        ),
    )?;
    if rejected > 0 {
        render::warning(
            out,
            &format!("{} catalog definitions were rejected, see the log", rejected),
        )?;
    }
    render::status(out, "Type 'help' for commands")
}

/// Read lines until `exit` or end of input
///
/// Input bytes that are not UTF-8 are replaced, never fatal.
pub fn run<R: BufRead, W: Write>(
    dispatcher: &mut Dispatcher<W>,
    mut input: R,
) -> io::Result<()> {
    let mut buf = Vec::new();
    loop {
        let prompt = dispatcher.prompt();
        let out = dispatcher.output_mut();
        write!(out, "{}", prompt)?;
        out.flush()?;

        buf.clear();
        if input.read_until(b'\n', &mut buf)? == 0 {
            writeln!(out)?;
            render::status(out, "Session terminated")?;
            info!("Input closed, leaving shell");
            return Ok(());
        }

        let line = String::from_utf8_lossy(&buf);
        if dispatcher.dispatch(&line)? == Flow::Exit {
            info!("Shell exited");
            return Ok(());
        }
    }
}
