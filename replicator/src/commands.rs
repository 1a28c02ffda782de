// File: replicator/src/commands.rs
use std::fmt;
use std::process::Stdio;
use tokio::process::{Child, Command as AsyncCommand};
use tracing::{debug, info};

/// A local command that ran but did not succeed (or could not be spawned)
#[derive(Debug, Clone)]
pub struct CommandFailure {
    pub command: String,
    pub status: Option<i32>,
    pub stderr: String,
}

impl CommandFailure {
    fn spawn_error(command: String, err: std::io::Error) -> Self {
        Self {
            command,
            status: None,
            stderr: err.to_string(),
        }
    }

    /// stderr, or the exit status when the command printed nothing
    pub fn reason(&self) -> String {
        let stderr = self.stderr.trim();
        if !stderr.is_empty() {
            return stderr.to_string();
        }
        match self.status {
            Some(code) => format!("exited with status {}", code),
            None => "terminated by signal".to_string(),
        }
    }
}

impl fmt::Display for CommandFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.command, self.reason())
    }
}

impl std::error::Error for CommandFailure {}

pub fn describe(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Run a program to completion and return its stdout
pub async fn run_command(program: &str, args: &[String]) -> Result<String, CommandFailure> {
    let command = describe(program, args);
    debug!("Executing command: {}", command);

    let output = AsyncCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|e| CommandFailure::spawn_error(command.clone(), e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        Err(CommandFailure {
            command,
            status: output.status.code(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

/// Spawn a program with piped stdout/stderr; the child is killed if dropped unfinished
pub fn spawn_producer(program: &str, args: &[String]) -> Result<Child, CommandFailure> {
    let command = describe(program, args);
    debug!("Spawning stream producer: {}", command);

    AsyncCommand::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandFailure::spawn_error(command, e))
}

/// Spawn a program with piped stdin/stderr; the child is killed if dropped unfinished
pub fn spawn_consumer(program: &str, args: &[String]) -> Result<Child, CommandFailure> {
    let command = describe(program, args);
    debug!("Spawning stream consumer: {}", command);

    AsyncCommand::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| CommandFailure::spawn_error(command, e))
}

/// Verify that every required binary is on PATH
pub fn check_dependencies(required: &[&str]) -> anyhow::Result<()> {
    let missing: Vec<&str> = required
        .iter()
        .copied()
        .filter(|cmd| which::which(cmd).is_err())
        .collect();

    if !missing.is_empty() {
        return Err(anyhow::anyhow!(
            "required commands not found: {} (install zfsutils-linux / openssh-client)",
            missing.join(", ")
        ));
    }

    info!("All system dependencies verified: {:?}", required);
    Ok(())
}
