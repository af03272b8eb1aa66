//! Spawning and supervising the Node.js sidecar.

use std::{
    path::{Path, PathBuf},
    process::Stdio,
    time::Duration,
};

use {
    anyhow::{Context, Result, bail},
    tokio::{
        io::{AsyncBufReadExt, AsyncRead, BufReader},
        process::{Child, Command},
    },
    tracing::{debug, error, info, warn},
};

use relay_config::SessionConfig;

/// Environment variable naming the sidecar directory.
pub const SIDECAR_DIR_ENV: &str = "RELAY_WHATSAPP_SIDECAR_DIR";

/// Sidecar location relative to the binary or working directory.
const SIDECAR_REL_PATH: &str = "sidecar/whatsapp-web";

/// Grace period between SIGTERM and a hard kill.
const STOP_TIMEOUT: Duration = Duration::from_secs(5);

/// How long a fresh process must survive to count as started.
const STARTUP_PROBE: Duration = Duration::from_millis(500);

/// A running sidecar.
pub struct SidecarProcess {
    child: Child,
    port: u16,
}

impl SidecarProcess {
    #[must_use]
    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// SIGTERM, then kill if the process outlives the grace period.
    pub async fn stop(&mut self) -> Result<()> {
        info!("stopping WhatsApp sidecar");

        #[cfg(unix)]
        {
            use nix::{
                sys::signal::{Signal, kill},
                unistd::Pid,
            };

            if let Some(pid) = self.child.id()
                && let Ok(pid) = i32::try_from(pid)
            {
                let _ = kill(Pid::from_raw(pid), Signal::SIGTERM);
            }
        }

        #[cfg(not(unix))]
        {
            let _ = self.child.kill().await;
        }

        match tokio::time::timeout(STOP_TIMEOUT, self.child.wait()).await {
            Ok(Ok(status)) => info!(?status, "WhatsApp sidecar exited"),
            Ok(Err(e)) => warn!(error = %e, "error waiting for sidecar to exit"),
            Err(_) => {
                warn!(
                    timeout_secs = STOP_TIMEOUT.as_secs(),
                    "sidecar ignored SIGTERM, killing"
                );
                self.child.kill().await.context("failed to kill sidecar")?;
            },
        }
        Ok(())
    }
}

/// How to launch the sidecar.
#[derive(Debug, Clone)]
pub struct SidecarConfig {
    /// Directory containing the sidecar's `package.json`.
    pub sidecar_dir: PathBuf,
    pub port: u16,
    pub session: String,
    pub auth_dir: Option<PathBuf>,
}

impl SidecarConfig {
    /// Resolve the sidecar directory and combine it with the session config.
    pub fn from_session(config: &SessionConfig) -> Result<Self> {
        let env_dir = std::env::var_os(SIDECAR_DIR_ENV).map(PathBuf::from);
        Ok(Self {
            sidecar_dir: find_sidecar_dir(config.sidecar_dir.as_deref(), env_dir.as_deref())?,
            port: config.sidecar_port,
            session: config.name.clone(),
            auth_dir: config.auth_dir.clone(),
        })
    }
}

fn has_package_json(dir: &Path) -> bool {
    dir.join("package.json").is_file()
}

/// Locate the sidecar.
///
/// Order: the configured path, then `$RELAY_WHATSAPP_SIDECAR_DIR`, then
/// `sidecar/whatsapp-web` next to the executable, then relative to the
/// working directory. A configured path that is wrong is an error rather
/// than a fallthrough.
pub fn find_sidecar_dir(configured: Option<&Path>, env_dir: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if has_package_json(path) {
            return Ok(path.to_path_buf());
        }
        bail!(
            "configured sidecar directory has no package.json: {}",
            path.display()
        );
    }

    if let Some(path) = env_dir {
        if has_package_json(path) {
            return Ok(path.to_path_buf());
        }
        warn!(path = %path.display(), "{SIDECAR_DIR_ENV} set but package.json not found");
    }

    let mut candidates = Vec::new();
    if let Ok(exe) = std::env::current_exe()
        && let Some(exe_dir) = exe.parent()
    {
        // Installed layout, then `target/<profile>/` during development.
        candidates.push(exe_dir.join("..").join(SIDECAR_REL_PATH));
        candidates.push(exe_dir.join("../..").join(SIDECAR_REL_PATH));
    }
    candidates.push(PathBuf::from(SIDECAR_REL_PATH));
    candidates.push(Path::new("..").join(SIDECAR_REL_PATH));

    for path in candidates {
        if has_package_json(&path) {
            return Ok(path.canonicalize().unwrap_or(path));
        }
    }

    bail!(
        "WhatsApp sidecar not found. Set session.sidecar_dir or {SIDECAR_DIR_ENV}, \
         or install it under {SIDECAR_REL_PATH}"
    )
}

/// Build the sidecar with npm unless `dist/index.js` already exists.
async fn ensure_built(sidecar_dir: &Path) -> Result<()> {
    if sidecar_dir.join("dist/index.js").exists() {
        return Ok(());
    }
    info!(path = %sidecar_dir.display(), "building WhatsApp sidecar");
    if !sidecar_dir.join("node_modules").exists() {
        run_npm(sidecar_dir, &["install"]).await?;
    }
    run_npm(sidecar_dir, &["run", "build"]).await
}

async fn run_npm(sidecar_dir: &Path, args: &[&str]) -> Result<()> {
    let step = format!("npm {}", args.join(" "));
    debug!(path = %sidecar_dir.display(), %step, "running");

    let output = Command::new("npm")
        .args(args)
        .current_dir(sidecar_dir)
        .output()
        .await
        .with_context(|| format!("failed to run {step}"))?;

    if !output.status.success() {
        bail!(
            "{step} failed: {}",
            String::from_utf8_lossy(&output.stderr).trim()
        );
    }
    Ok(())
}

/// Spawn the sidecar and wait briefly to catch an immediate crash.
pub async fn start_sidecar(config: SidecarConfig) -> Result<SidecarProcess> {
    ensure_built(&config.sidecar_dir).await?;

    info!(
        path = %config.sidecar_dir.display(),
        port = config.port,
        session = %config.session,
        "starting WhatsApp sidecar"
    );

    let mut cmd = Command::new("node");
    cmd.arg("dist/index.js")
        .current_dir(&config.sidecar_dir)
        .env("RELAY_WHATSAPP_PORT", config.port.to_string())
        .env("RELAY_WHATSAPP_SESSION", &config.session)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if let Some(auth_dir) = &config.auth_dir {
        cmd.env("RELAY_WHATSAPP_AUTH_DIR", auth_dir);
    }

    let mut child = cmd.spawn().context("failed to spawn sidecar (is node installed?)")?;

    if let Some(stdout) = child.stdout.take() {
        tokio::spawn(forward_lines(stdout, false));
    }
    if let Some(stderr) = child.stderr.take() {
        tokio::spawn(forward_lines(stderr, true));
    }

    tokio::time::sleep(STARTUP_PROBE).await;
    if let Some(status) = child
        .try_wait()
        .context("failed to check sidecar status")?
    {
        bail!("sidecar exited immediately with {status}");
    }

    info!(port = config.port, "WhatsApp sidecar started");
    Ok(SidecarProcess {
        child,
        port: config.port,
    })
}

async fn forward_lines(stream: impl AsyncRead + Unpin, is_stderr: bool) {
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if is_stderr {
            warn!(target: "whatsapp_sidecar", "{line}");
        } else {
            forward_log_line(&line);
        }
    }
}

/// Severity of a sidecar stdout line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

/// Split a pino JSON log line into level and message. Plain lines are info.
fn parse_log_line(line: &str) -> (LogLevel, String) {
    if line.starts_with('{')
        && let Ok(log) = serde_json::from_str::<serde_json::Value>(line)
    {
        let level = match log.get("level").and_then(serde_json::Value::as_u64) {
            Some(10 | 20) => LogLevel::Debug,
            Some(40) => LogLevel::Warn,
            Some(50..) => LogLevel::Error,
            _ => LogLevel::Info,
        };
        let msg = log
            .get("msg")
            .and_then(serde_json::Value::as_str)
            .unwrap_or(line)
            .to_string();
        return (level, msg);
    }
    (LogLevel::Info, line.to_string())
}

fn forward_log_line(line: &str) {
    let (level, msg) = parse_log_line(line);
    match level {
        LogLevel::Debug => debug!(target: "whatsapp_sidecar", "{msg}"),
        LogLevel::Info => info!(target: "whatsapp_sidecar", "{msg}"),
        LogLevel::Warn => warn!(target: "whatsapp_sidecar", "{msg}"),
        LogLevel::Error => error!(target: "whatsapp_sidecar", "{msg}"),
    }
}
