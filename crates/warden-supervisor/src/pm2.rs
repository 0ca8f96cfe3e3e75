//! pm2 backend
//!
//! Drives the `pm2` command-line tool. Listings come from `pm2 jlist`;
//! stopping uses `pm2 delete` so the name is freed for the next start.

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::process::Command;
use tracing::{debug, info};
use warden_types::{ProcessInfo, ProcessStatus};

use crate::error::{SupervisorError, SupervisorResult};
use crate::launch::LaunchSpec;
use crate::traits::ProcessSupervisor;

/// Variables of the controller's own environment that pm2 is allowed to see.
/// Everything else is cleared so nothing the controller holds reaches a worker.
const INHERITED_ENV: &[&str] = &["PATH", "HOME", "PM2_HOME", "USER", "LANG", "TZ"];

/// Supervisor backed by the `pm2` CLI.
#[derive(Debug, Clone)]
pub struct Pm2Supervisor {
    binary: PathBuf,
    command_timeout: Duration,
}

struct CommandOutput {
    success: bool,
    code: Option<i32>,
    stdout: String,
    stderr: String,
}

impl Pm2Supervisor {
    pub fn new(binary: impl Into<PathBuf>, command_timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            command_timeout,
        }
    }

    async fn run(
        &self,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> SupervisorResult<CommandOutput> {
        let command = format!(
            "{} {}",
            self.binary.display(),
            args.first().map(String::as_str).unwrap_or("")
        );

        let mut cmd = Command::new(&self.binary);
        cmd.env_clear();
        for key in INHERITED_ENV {
            if let Some(value) = std::env::var_os(key) {
                cmd.env(key, value);
            }
        }
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.command_timeout, cmd.output())
            .await
            .map_err(|_| SupervisorError::Timeout {
                command: command.clone(),
                timeout_secs: self.command_timeout.as_secs(),
            })?
            .map_err(|source| SupervisorError::Spawn {
                command: command.clone(),
                source,
            })?;

        Ok(CommandOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }

    async fn run_checked(
        &self,
        args: &[String],
        env: &BTreeMap<String, String>,
    ) -> SupervisorResult<CommandOutput> {
        let output = self.run(args, env).await?;
        if output.success {
            Ok(output)
        } else {
            Err(SupervisorError::CommandFailed {
                command: args.join(" "),
                code: output.code,
                message: last_line(&output.stderr, &output.stdout),
            })
        }
    }
}

/// Arguments for `pm2 start`.
pub(crate) fn start_args(name: &str, spec: &LaunchSpec) -> Vec<String> {
    let mut args = vec![
        "start".to_string(),
        spec.script.display().to_string(),
        "--name".to_string(),
        name.to_string(),
        "--time".to_string(),
    ];

    if let Some(interpreter) = &spec.interpreter {
        args.push("--interpreter".to_string());
        args.push(interpreter.clone());
    }
    if let Some(cwd) = &spec.cwd {
        args.push("--cwd".to_string());
        args.push(cwd.display().to_string());
    }
    if let Some(limit) = &spec.max_memory_restart {
        args.push("--max-memory-restart".to_string());
        args.push(limit.clone());
    }
    if let Some(restarts) = spec.max_restarts {
        args.push("--max-restarts".to_string());
        args.push(restarts.to_string());
    }
    if let Some(out) = &spec.out_log {
        args.push("--output".to_string());
        args.push(out.display().to_string());
    }
    if let Some(err) = &spec.err_log {
        args.push("--error".to_string());
        args.push(err.display().to_string());
    }
    if !spec.args.is_empty() {
        args.push("--".to_string());
        args.extend(spec.args.iter().cloned());
    }

    args
}

#[derive(Debug, Deserialize)]
struct JlistEntry {
    name: String,
    #[serde(default)]
    pid: Option<u32>,
    pm2_env: JlistEnv,
    #[serde(default)]
    monit: Option<JlistMonit>,
}

#[derive(Debug, Deserialize)]
struct JlistEnv {
    status: String,
    #[serde(default)]
    restart_time: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct JlistMonit {
    #[serde(default)]
    memory: Option<u64>,
    #[serde(default)]
    cpu: Option<f32>,
}

/// Parse `pm2 jlist` output.
///
/// pm2 prints `[PM2] ...` banner lines around the JSON when it has to spawn
/// its daemon, so every line opening with `[` is tried until one parses.
pub(crate) fn parse_jlist(stdout: &str) -> SupervisorResult<Vec<ProcessInfo>> {
    let mut offset = 0;
    let mut last_error = None;

    for line in stdout.split_inclusive('\n') {
        if line.trim_start().starts_with('[') {
            let mut values = serde_json::Deserializer::from_str(&stdout[offset..])
                .into_iter::<Vec<JlistEntry>>();
            match values.next() {
                Some(Ok(entries)) => return Ok(entries.into_iter().map(process_info).collect()),
                Some(Err(e)) => last_error = Some(e.to_string()),
                None => {}
            }
        }
        offset += line.len();
    }

    Err(SupervisorError::Parse(match last_error {
        Some(e) => format!("pm2 jlist: {}", e),
        None => "no JSON array in pm2 jlist output".to_string(),
    }))
}

fn process_info(entry: JlistEntry) -> ProcessInfo {
    ProcessInfo {
        name: entry.name,
        status: ProcessStatus::parse(&entry.pm2_env.status),
        pid: entry.pid.filter(|pid| *pid > 0),
        restarts: entry.pm2_env.restart_time.unwrap_or(0),
        memory_bytes: entry.monit.as_ref().and_then(|m| m.memory),
        cpu_percent: entry.monit.as_ref().and_then(|m| m.cpu),
    }
}

/// pm2 reports an unknown name as `Process or Namespace <name> not found`.
fn is_not_found(output: &CommandOutput) -> bool {
    format!("{}\n{}", output.stdout, output.stderr)
        .lines()
        .map(str::to_ascii_lowercase)
        .any(|line| line.contains("process or namespace") && line.contains("not found"))
}

fn last_line(stderr: &str, stdout: &str) -> String {
    stderr
        .lines()
        .chain(stdout.lines())
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .last()
        .unwrap_or("no output")
        .to_string()
}

#[async_trait]
impl ProcessSupervisor for Pm2Supervisor {
    async fn describe(&self, name: &str) -> SupervisorResult<Option<ProcessInfo>> {
        Ok(self.list().await?.into_iter().find(|p| p.name == name))
    }

    async fn start(&self, name: &str, spec: &LaunchSpec) -> SupervisorResult<()> {
        match self.describe(name).await? {
            Some(existing) if existing.status.is_online() => {
                info!(instance = %name, "Process already online, adopting");
                return Ok(());
            }
            Some(existing) => {
                debug!(
                    instance = %name,
                    status = %existing.status,
                    "Deleting stale process before start"
                );
                self.stop(name).await?;
            }
            None => {}
        }

        self.run_checked(&start_args(name, spec), &spec.env).await?;
        info!(instance = %name, "Started process");
        Ok(())
    }

    async fn stop(&self, name: &str) -> SupervisorResult<()> {
        let args = vec!["delete".to_string(), name.to_string()];
        let output = self.run(&args, &BTreeMap::new()).await?;

        if output.success {
            info!(instance = %name, "Stopped process");
            Ok(())
        } else if is_not_found(&output) {
            debug!(instance = %name, "Process not found, nothing to stop");
            Ok(())
        } else {
            Err(SupervisorError::CommandFailed {
                command: args.join(" "),
                code: output.code,
                message: last_line(&output.stderr, &output.stdout),
            })
        }
    }

    async fn list(&self) -> SupervisorResult<Vec<ProcessInfo>> {
        let output = self
            .run_checked(&["jlist".to_string()], &BTreeMap::new())
            .await?;
        parse_jlist(&output.stdout)
    }

    async fn disconnect(&self) -> SupervisorResult<()> {
        // Each pm2 CLI call is its own connection to the pm2 daemon.
        debug!("pm2 backend holds no connection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_jlist_with_banner() {
        let stdout = r#"[PM2] Spawning PM2 daemon with pm2_home=/root/.pm2
[{"name":"worker-t1-r1","pid":4242,"pm2_env":{"status":"online","restart_time":2,"pm_uptime":1700000000000},"monit":{"memory":52428800,"cpu":1.5}},
 {"name":"coordinator","pid":0,"pm2_env":{"status":"errored"}}]
"#;

        let processes = parse_jlist(stdout).unwrap();
        assert_eq!(processes.len(), 2);
        assert_eq!(processes[0].name, "worker-t1-r1");
        assert_eq!(processes[0].status, ProcessStatus::Online);
        assert_eq!(processes[0].pid, Some(4242));
        assert_eq!(processes[0].restarts, 2);
        assert_eq!(processes[0].memory_bytes, Some(52_428_800));
        assert_eq!(processes[1].status, ProcessStatus::Errored);
        assert_eq!(processes[1].pid, None);
    }

    #[test]
    fn test_parse_empty_jlist() {
        assert!(parse_jlist("[]").unwrap().is_empty());
    }

    #[test]
    fn test_parse_jlist_after_daemon_spawn() {
        let stdout = "[PM2] Spawning PM2 daemon with pm2_home=/root/.pm2\n\
                      [PM2] PM2 Successfully daemonized\n\
                      [{\"name\":\"worker-t1-r1\",\"pm2_env\":{\"status\":\"online\"}}]\n";

        let processes = parse_jlist(stdout).unwrap();
        assert_eq!(processes.len(), 1);
        assert_eq!(processes[0].name, "worker-t1-r1");

        let empty = "[PM2] Spawning PM2 daemon with pm2_home=/root/.pm2\n[]\n[PM2] done\n";
        assert!(parse_jlist(empty).unwrap().is_empty());
    }

    #[test]
    fn test_parse_garbage_fails() {
        assert!(matches!(parse_jlist("daemon not running"), Err(SupervisorError::Parse(_))));
    }

    #[test]
    fn test_start_args_carry_policy_and_args() {
        let spec = LaunchSpec {
            script: PathBuf::from("/srv/worker/index.js"),
            interpreter: Some("node".to_string()),
            max_memory_restart: Some("500M".to_string()),
            max_restarts: Some(10),
            out_log: Some(PathBuf::from("/var/log/w-out.log")),
            err_log: Some(PathBuf::from("/var/log/w-error.log")),
            args: vec!["--verbose".to_string()],
            ..Default::default()
        }
        .with_env("TENANT_ID", "t1");

        let args = start_args("worker-t1-r1", &spec);
        assert_eq!(&args[..4], &["start", "/srv/worker/index.js", "--name", "worker-t1-r1"]);
        assert!(args.windows(2).any(|w| w == ["--max-memory-restart", "500M"]));
        assert!(args.windows(2).any(|w| w == ["--max-restarts", "10"]));
        assert!(args.windows(2).any(|w| w == ["--error", "/var/log/w-error.log"]));
        assert_eq!(&args[args.len() - 2..], &["--", "--verbose"]);
        // environment goes through the process env, never argv
        assert!(!args.iter().any(|a| a.contains("TENANT_ID")));
    }

    #[test]
    fn test_not_found_detection() {
        let output = CommandOutput {
            success: false,
            code: Some(1),
            stdout: String::new(),
            stderr: "[PM2][ERROR] Process or Namespace worker-x not found".to_string(),
        };
        assert!(is_not_found(&output));

        let missing_script = CommandOutput {
            stderr: "[PM2][ERROR] Script not found: /srv/worker/index.js".to_string(),
            ..output
        };
        assert!(!is_not_found(&missing_script));
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let supervisor = Pm2Supervisor::new("/nonexistent/pm2-binary", Duration::from_secs(5));
        let err = supervisor.list().await.unwrap_err();
        assert!(matches!(err, SupervisorError::Spawn { .. }));
    }

    /// A stand-in `pm2` that logs its argv, answers `jlist` from a file and
    /// dumps its environment on `start`.
    #[cfg(unix)]
    mod fake {
        use std::os::unix::fs::PermissionsExt;
        use std::path::{Path, PathBuf};
        use std::sync::{Mutex, MutexGuard};

        const SCRIPT: &str = r#"#!/bin/sh
DIR="$(dirname "$0")"
echo "$*" >> "$DIR/calls"
case "$1" in
  jlist)
    cat "$DIR/jlist"
    ;;
  start)
    env > "$DIR/start.env"
    ;;
  delete)
    if [ -f "$DIR/delete.err" ]; then
      cat "$DIR/delete.err" >&2
      exit 1
    fi
    ;;
esac
"#;

        // Scripts are written then executed; a concurrent fork holding the
        // write fd makes exec fail with ETXTBSY.
        static SERIAL: Mutex<()> = Mutex::new(());

        pub fn serial() -> MutexGuard<'static, ()> {
            SERIAL.lock().unwrap_or_else(|e| e.into_inner())
        }

        pub struct FakePm2 {
            pub dir: tempfile::TempDir,
        }

        impl FakePm2 {
            pub fn new(jlist: &str) -> Self {
                let dir = tempfile::tempdir().unwrap();
                let binary = dir.path().join("pm2");
                std::fs::write(&binary, SCRIPT).unwrap();
                std::fs::set_permissions(&binary, std::fs::Permissions::from_mode(0o755)).unwrap();
                std::fs::write(dir.path().join("jlist"), jlist).unwrap();
                Self { dir }
            }

            pub fn binary(&self) -> PathBuf {
                self.dir.path().join("pm2")
            }

            pub fn fail_delete(&self, stderr: &str) {
                std::fs::write(self.dir.path().join("delete.err"), stderr).unwrap();
            }

            pub fn calls(&self) -> Vec<String> {
                read_lines(&self.dir.path().join("calls"))
            }

            pub fn start_env(&self) -> Vec<String> {
                read_lines(&self.dir.path().join("start.env"))
            }
        }

        fn read_lines(path: &Path) -> Vec<String> {
            std::fs::read_to_string(path)
                .unwrap_or_default()
                .lines()
                .map(str::to_string)
                .collect()
        }
    }

    #[cfg(unix)]
    fn worker_spec() -> LaunchSpec {
        LaunchSpec::new("/srv/worker/index.js")
            .with_env("TENANT_ID", "t1")
            .with_env("RESOURCE_ID", "r1")
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_after_daemon_spawn_banner() {
        let _serial = fake::serial();
        let pm2 = fake::FakePm2::new("[PM2] Spawning PM2 daemon with pm2_home=/tmp/.pm2\n[]\n");
        let supervisor = Pm2Supervisor::new(pm2.binary(), Duration::from_secs(10));

        supervisor.start("worker-t1-r1", &worker_spec()).await.unwrap();

        let calls = pm2.calls();
        assert_eq!(calls[0], "jlist");
        assert!(calls[1].starts_with("start /srv/worker/index.js --name worker-t1-r1"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_passes_only_identity_env() {
        let _serial = fake::serial();
        std::env::set_var("WARDEN_DESIRED_STATE__URL", "postgres://warden:s3cret@db/app");
        let pm2 = fake::FakePm2::new("[]");
        let supervisor = Pm2Supervisor::new(pm2.binary(), Duration::from_secs(10));

        supervisor.start("worker-t1-r1", &worker_spec()).await.unwrap();

        let env = pm2.start_env();
        assert!(env.iter().any(|line| line == "TENANT_ID=t1"));
        assert!(env.iter().any(|line| line == "RESOURCE_ID=r1"));
        assert!(!env.iter().any(|line| line.starts_with("WARDEN_")));
        assert!(!env.iter().any(|line| line.contains("s3cret")));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_adopts_online_process() {
        let _serial = fake::serial();
        let pm2 = fake::FakePm2::new(
            r#"[{"name":"worker-t1-r1","pid":4242,"pm2_env":{"status":"online"}}]"#,
        );
        let supervisor = Pm2Supervisor::new(pm2.binary(), Duration::from_secs(10));

        supervisor.start("worker-t1-r1", &worker_spec()).await.unwrap();

        assert_eq!(pm2.calls(), vec!["jlist"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_start_deletes_stale_entry_first() {
        let _serial = fake::serial();
        let pm2 = fake::FakePm2::new(
            r#"[{"name":"worker-t1-r1","pid":0,"pm2_env":{"status":"errored"}}]"#,
        );
        let supervisor = Pm2Supervisor::new(pm2.binary(), Duration::from_secs(10));

        supervisor.start("worker-t1-r1", &worker_spec()).await.unwrap();

        let calls = pm2.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], "jlist");
        assert_eq!(calls[1], "delete worker-t1-r1");
        assert!(calls[2].starts_with("start "));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_unknown_name_succeeds() {
        let _serial = fake::serial();
        let pm2 = fake::FakePm2::new("[]");
        pm2.fail_delete("[PM2][ERROR] Process or Namespace worker-t9-r9 not found\n");
        let supervisor = Pm2Supervisor::new(pm2.binary(), Duration::from_secs(10));

        supervisor.stop("worker-t9-r9").await.unwrap();
        assert_eq!(pm2.calls(), vec!["delete worker-t9-r9"]);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_stop_other_failure_is_an_error() {
        let _serial = fake::serial();
        let pm2 = fake::FakePm2::new("[]");
        pm2.fail_delete("[PM2][ERROR] Script not found: /srv/worker/index.js\n");
        let supervisor = Pm2Supervisor::new(pm2.binary(), Duration::from_secs(10));

        let err = supervisor.stop("worker-t1-r1").await.unwrap_err();
        assert!(matches!(err, SupervisorError::CommandFailed { code: Some(1), .. }));
    }
}
