// Remote command channel used by the provisioner.

use crate::error::TargetDetails;
use crate::ssh::{is_connection_error, CommandOutput};

/// A channel that runs shell command batches on one host.
///
/// Implementations never return `Err`: transport failures are reported as a
/// failed [`CommandOutput`] so the caller decides whether a failure is fatal,
/// ignorable, or informational.
pub trait RemoteExecutor {
    /// Run a command batch and capture stdout, stderr and exit status.
    fn execute(&self, command: &str) -> CommandOutput;

    /// Write `content` to `remote_path`, replacing any existing file.
    fn write_file(&self, remote_path: &str, content: &str) -> CommandOutput;

    /// The host and user commands run as, for error details and logs.
    fn target(&self) -> TargetDetails;

    /// Did this failure come from the channel rather than the command?
    fn is_transport_failure(&self, output: &CommandOutput) -> bool {
        is_connection_error(output)
    }
}

impl<T: RemoteExecutor + ?Sized> RemoteExecutor for &T {
    fn execute(&self, command: &str) -> CommandOutput {
        (**self).execute(command)
    }

    fn write_file(&self, remote_path: &str, content: &str) -> CommandOutput {
        (**self).write_file(remote_path, content)
    }

    fn target(&self) -> TargetDetails {
        (**self).target()
    }

    fn is_transport_failure(&self, output: &CommandOutput) -> bool {
        (**self).is_transport_failure(output)
    }
}
