//! Tells the appliance to pick up the rewritten configuration document.

use log::{info, trace};
use snafu::{ensure, OptionExt, ResultExt};
use std::process::Command;

use crate::error::{self, Result};

/// Runs the reload command, given as a program followed by its arguments.  A non-zero exit
/// is an error.
pub fn reload<S: AsRef<str>>(command: &[S]) -> Result<()> {
    let command: Vec<&str> = command.iter().map(|part| part.as_ref()).collect();
    let (program, args) = command.split_first().context(error::EmptyReloadCommandSnafu)?;
    let display = command.join(" ");

    info!("Running '{}'", display);
    let output = Command::new(program)
        .args(args)
        .output()
        .context(error::ReloadExecutionSnafu { command: &display })?;

    trace!("stdout: {}", String::from_utf8_lossy(&output.stdout));
    trace!("stderr: {}", String::from_utf8_lossy(&output.stderr));

    ensure!(
        output.status.success(),
        error::ReloadFailureSnafu {
            command: display,
            output,
        }
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::reload;
    use crate::error::Error;

    #[test]
    fn success() {
        reload(&["true"]).unwrap();
        reload(&["sh", "-c", "exit 0"]).unwrap();
    }

    #[test]
    fn failures() {
        assert!(matches!(
            reload(&["sh", "-c", "echo oops >&2; exit 3"]),
            Err(Error::ReloadFailure { .. })
        ));
        assert!(matches!(
            reload(&["/nonexistent/rc.reload_all"]),
            Err(Error::ReloadExecution { .. })
        ));
        assert!(matches!(
            reload::<&str>(&[]),
            Err(Error::EmptyReloadCommand)
        ));
    }
}
