//! Identity context attached to every sample
//!
//! Each piece of identity comes from a separate fallible call. A failure in one
//! of them is logged and leaves that field empty; the rest are still collected.

use std::env;
use std::fmt;
use sysinfo::{ProcessRefreshKind, ProcessesToUpdate, System, UpdateKind, Users};
use tracing::warn;

use crate::error::TelemetryError;
use crate::session::SessionId;

/// Environment variables consulted for the user name, in order
const USER_ENV_VARS: [&str; 4] = ["LOGNAME", "USER", "LNAME", "USERNAME"];

/// Source of the host facts a logger records
pub trait IdentityProbe {
    fn user(&self) -> Result<String, TelemetryError>;

    fn hostname(&self) -> Result<String, TelemetryError>;

    /// Platform family and version, collected together
    fn os_and_version(&self) -> Result<(String, String), TelemetryError>;

    fn client_version(&self) -> Result<String, TelemetryError>;
}

type VersionSource = Box<dyn Fn() -> anyhow::Result<String> + Send + Sync>;

/// Probe backed by the running operating system
///
/// The client version cannot be discovered here, so the host supplies a
/// callback for it.
pub struct SystemProbe {
    client_version: VersionSource,
}

impl SystemProbe {
    pub fn new<F>(client_version: F) -> Self
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self {
            client_version: Box::new(client_version),
        }
    }

    /// Probe reporting a version the host already knows
    pub fn with_version(version: impl Into<String>) -> Self {
        let version = version.into();
        Self::new(move || Ok(version.clone()))
    }
}

impl Default for SystemProbe {
    fn default() -> Self {
        Self::new(|| anyhow::bail!("no client version source configured"))
    }
}

impl fmt::Debug for SystemProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemProbe").finish_non_exhaustive()
    }
}

impl IdentityProbe for SystemProbe {
    fn user(&self) -> Result<String, TelemetryError> {
        for var in USER_ENV_VARS {
            if let Ok(name) = env::var(var) {
                if !name.is_empty() {
                    return Ok(name);
                }
            }
        }
        process_owner()
    }

    fn hostname(&self) -> Result<String, TelemetryError> {
        let name = hostname::get()
            .map_err(|e| TelemetryError::Identity(format!("hostname lookup failed: {}", e)))?;
        Ok(name.to_string_lossy().into_owned())
    }

    fn os_and_version(&self) -> Result<(String, String), TelemetryError> {
        let os = os_family(env::consts::OS);
        let version = System::kernel_version().unwrap_or_default();
        Ok((or_unknown(os), or_unknown(version)))
    }

    fn client_version(&self) -> Result<String, TelemetryError> {
        (self.client_version)().map_err(|e| TelemetryError::Identity(format!("{:#}", e)))
    }
}

/// Name of the OS account that owns the current process
fn process_owner() -> Result<String, TelemetryError> {
    let pid = sysinfo::get_current_pid()
        .map_err(|e| TelemetryError::Identity(format!("current process id unavailable: {}", e)))?;

    let mut system = System::new();
    system.refresh_processes_specifics(
        ProcessesToUpdate::Some(&[pid]),
        true,
        ProcessRefreshKind::nothing().with_user(UpdateKind::Always),
    );

    let uid = system
        .process(pid)
        .and_then(|process| process.user_id())
        .ok_or_else(|| TelemetryError::Identity("process owner unavailable".to_string()))?;

    let users = Users::new_with_refreshed_list();
    users
        .get_user_by_id(uid)
        .map(|user| user.name().to_string())
        .ok_or_else(|| TelemetryError::Identity(format!("no account for uid {:?}", uid)))
}

/// Map a Rust target OS name to the platform family reported in samples
fn os_family(target_os: &str) -> String {
    match target_os {
        "linux" => "Linux".to_string(),
        "macos" => "macOS".to_string(),
        "windows" => "Windows".to_string(),
        "freebsd" => "FreeBSD".to_string(),
        "openbsd" => "OpenBSD".to_string(),
        "netbsd" => "NetBSD".to_string(),
        other => other.to_string(),
    }
}

fn or_unknown(value: String) -> String {
    if value.is_empty() {
        "unknown".to_string()
    } else {
        value
    }
}

/// Identity fields a logger stamps onto each sample
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub session_id: SessionId,
    pub user: String,
    pub hostname: String,
    pub os: String,
    pub os_version: String,
    pub client_version: String,
}

impl Identity {
    /// Collect identity through `probe`, never failing as a whole
    pub fn collect<P>(session_id: SessionId, probe: &P) -> Self
    where
        P: IdentityProbe + ?Sized,
    {
        let user = or_empty("username", probe.user());
        let hostname = or_empty("hostname", probe.hostname());
        let (os, os_version) = match probe.os_and_version() {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "error determining OS information for telemetry logging");
                (String::new(), String::new())
            }
        };
        let client_version = or_empty("client version", probe.client_version());

        Self {
            session_id,
            user,
            hostname,
            os,
            os_version,
            client_version,
        }
    }

    /// Identity of this process, using its shared session id
    pub fn current<P>(probe: &P) -> Self
    where
        P: IdentityProbe + ?Sized,
    {
        Self::collect(SessionId::current(), probe)
    }
}

fn or_empty(what: &str, result: Result<String, TelemetryError>) -> String {
    result.unwrap_or_else(|e| {
        warn!(error = %e, "error determining {} for telemetry logging", what);
        String::new()
    })
}
