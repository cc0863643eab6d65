use tokio::process::Command;

/// Build a command that runs `command_line` through the platform shell,
/// the way `shell=True` process creation behaves.
#[cfg(unix)]
pub(crate) fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command_line);
    cmd
}

#[cfg(windows)]
pub(crate) fn shell_command(command_line: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.args(["/C", command_line]);
    cmd
}
