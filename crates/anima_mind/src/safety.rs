//! Command safety gate
//!
//! Classifies arbitrary shell commands into safe / needs-approval /
//! paid-api and executes only the safe ones, in the workspace
//! directory, under a timeout. Every attempt, refusals included,
//! lands in an append-only audit log.

use anima_core::JsonStore;
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::time::Duration;

const MAX_HISTORY: usize = 1000;
const CAPTURE_LIMIT: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyLevel {
    Safe,
    NeedsApproval,
    PaidApi,
}

impl SafetyLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SafetyLevel::Safe => "safe",
            SafetyLevel::NeedsApproval => "needs_approval",
            SafetyLevel::PaidApi => "paid_api",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRecord {
    pub command: String,
    pub stdout: String,
    pub stderr: String,
    pub returncode: i32,
    pub success: bool,
    pub reason: String,
    /// ISO-8601.
    pub timestamp: String,
    pub safety_level: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CommandStats {
    pub total: u64,
    pub successful: u64,
    pub failed: u64,
    pub blocked: u64,
    pub paid_api_requests: u64,
}

/// Block destructive commands, flag paid endpoints, run the rest.
pub struct SafetyRules {
    destructive: Vec<Regex>,
    paid: Vec<Regex>,
}

impl SafetyRules {
    pub fn new(paid_api_hosts: &[String]) -> Self {
        let destructive_patterns = [
            r"rm\s+-rf?\s+/\S*",
            r"rm\s+-fr\s+/\S*",
            r"format\s+[a-z]:",
            r"del\s+/[fs]\s+/q",
            r"rd\s+/s\s+/q",
            r"\bshutdown\b",
            r"\breboot\b",
            r"restart-computer",
            r"stop-computer",
            r"\\\\\.\\physicaldrive",
            r"\bdiskpart\b",
            r"\bbcdedit\b",
            r"reg\s+delete.*hklm",
            r"\bmkfs\b",
            r">\s*/dev/sd[a-z]",
            r"dd\s+.*of=/dev/",
        ];
        let destructive = destructive_patterns
            .iter()
            .map(|p| Regex::new(&format!("(?i){}", p)).expect("static pattern"))
            .collect();

        let paid = paid_api_hosts
            .iter()
            .map(|host| {
                Regex::new(&format!("(?i){}", regex::escape(host))).expect("escaped host pattern")
            })
            .collect();

        Self { destructive, paid }
    }

    pub fn classify(&self, command: &str) -> SafetyLevel {
        for pattern in &self.destructive {
            if pattern.is_match(command) {
                return SafetyLevel::NeedsApproval;
            }
        }
        for pattern in &self.paid {
            if pattern.is_match(command) {
                return SafetyLevel::PaidApi;
            }
        }
        SafetyLevel::Safe
    }
}

struct AuditLog {
    history: Vec<CommandRecord>,
    stats: CommandStats,
}

pub struct CommandGate {
    rules: SafetyRules,
    workdir: PathBuf,
    timeout: Duration,
    log: Mutex<AuditLog>,
    store: JsonStore,
}

impl CommandGate {
    pub fn new(
        workdir: impl Into<PathBuf>,
        history_path: impl AsRef<Path>,
        paid_api_hosts: &[String],
        timeout: Duration,
    ) -> Self {
        let store = JsonStore::new(history_path.as_ref().to_path_buf());
        let history: Vec<CommandRecord> = store.load_or_default(|_: &Vec<CommandRecord>| true);
        tracing::info!("command gate ready, {} historical records", history.len());
        Self {
            rules: SafetyRules::new(paid_api_hosts),
            workdir: workdir.into(),
            timeout,
            log: Mutex::new(AuditLog {
                history,
                stats: CommandStats::default(),
            }),
            store,
        }
    }

    pub fn classify(&self, command: &str) -> SafetyLevel {
        self.rules.classify(command)
    }

    /// Run a command through the gate. Safe commands execute and return
    /// their record; refused commands are logged and return `None`.
    pub async fn execute(&self, command: &str, reason: &str) -> Option<CommandRecord> {
        let level = self.rules.classify(command);
        match level {
            SafetyLevel::NeedsApproval => {
                tracing::warn!("blocked destructive command: {} ({})", command, reason);
                self.append_refusal(command, reason, level, "blocked: needs user approval");
                None
            }
            SafetyLevel::PaidApi => {
                tracing::warn!("blocked paid-api command: {} ({})", command, reason);
                self.append_refusal(command, reason, level, "blocked: paid API requires approval");
                None
            }
            SafetyLevel::Safe => Some(self.run(command, reason).await),
        }
    }

    async fn run(&self, command: &str, reason: &str) -> CommandRecord {
        tracing::info!("executing command: {} (reason: {})", command, reason);
        let _ = std::fs::create_dir_all(&self.workdir);

        let child = tokio::process::Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output();

        let record = match tokio::time::timeout(self.timeout, child).await {
            Ok(Ok(output)) => {
                let returncode = output.status.code().unwrap_or(-1);
                CommandRecord {
                    command: command.to_string(),
                    stdout: capture(&output.stdout),
                    stderr: capture(&output.stderr),
                    returncode,
                    success: returncode == 0,
                    reason: reason.to_string(),
                    timestamp: chrono::Utc::now().to_rfc3339(),
                    safety_level: SafetyLevel::Safe.as_str().to_string(),
                }
            }
            Ok(Err(e)) => CommandRecord {
                command: command.to_string(),
                stdout: String::new(),
                stderr: e.to_string(),
                returncode: -1,
                success: false,
                reason: reason.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                safety_level: SafetyLevel::Safe.as_str().to_string(),
            },
            Err(_) => CommandRecord {
                command: command.to_string(),
                stdout: String::new(),
                stderr: format!("Timeout after {}s", self.timeout.as_secs()),
                returncode: -1,
                success: false,
                reason: reason.to_string(),
                timestamp: chrono::Utc::now().to_rfc3339(),
                safety_level: SafetyLevel::Safe.as_str().to_string(),
            },
        };

        {
            let mut log = self.log.lock().unwrap();
            log.stats.total += 1;
            if record.success {
                log.stats.successful += 1;
            } else {
                log.stats.failed += 1;
            }
            push_record(&mut log.history, record.clone());
            self.persist(&log.history);
        }
        record
    }

    fn append_refusal(&self, command: &str, reason: &str, level: SafetyLevel, note: &str) {
        let record = CommandRecord {
            command: command.to_string(),
            stdout: String::new(),
            stderr: note.to_string(),
            returncode: -1,
            success: false,
            reason: reason.to_string(),
            timestamp: chrono::Utc::now().to_rfc3339(),
            safety_level: level.as_str().to_string(),
        };
        let mut log = self.log.lock().unwrap();
        log.stats.total += 1;
        match level {
            SafetyLevel::NeedsApproval => log.stats.blocked += 1,
            SafetyLevel::PaidApi => log.stats.paid_api_requests += 1,
            SafetyLevel::Safe => {}
        }
        push_record(&mut log.history, record);
        self.persist(&log.history);
    }

    pub fn stats(&self) -> CommandStats {
        self.log.lock().unwrap().stats
    }

    pub fn recent_records(&self, count: usize) -> Vec<CommandRecord> {
        let log = self.log.lock().unwrap();
        log.history.iter().rev().take(count).cloned().collect()
    }

    fn persist(&self, history: &Vec<CommandRecord>) {
        if let Err(e) = self.store.save(history) {
            tracing::error!("failed to save command history: {}", e);
        }
    }
}

fn push_record(history: &mut Vec<CommandRecord>, record: CommandRecord) {
    history.push(record);
    if history.len() > MAX_HISTORY {
        let drop = history.len() - MAX_HISTORY;
        history.drain(..drop);
    }
}

fn capture(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes)
        .chars()
        .take(CAPTURE_LIMIT)
        .collect()
}
