//! Scan records, findings and severity levels

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;

pub mod state;

pub use state::{ScanState, validate_transition};

/// Severity level of a finding
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational finding, no immediate action required
    Info,
    /// Low severity, should be reviewed
    Low,
    /// Medium severity, should be addressed
    Medium,
    /// High severity, requires prompt attention
    High,
    /// Critical severity, requires immediate action
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Severity::Info => write!(f, "info"),
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

impl std::str::FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "info" => Ok(Severity::Info),
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(format!("unknown severity '{other}'")),
        }
    }
}

/// One discrete result produced by a completed scan.
///
/// Findings are ordered children of their record; the store keys them by the
/// owning scan id and preserves insertion order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub description: String,
    pub detected_at: DateTime<Utc>,
}

impl Finding {
    pub fn new(severity: Severity, description: impl Into<String>) -> Self {
        Self {
            severity,
            description: description.into(),
            detected_at: Utc::now(),
        }
    }
}

/// One scan job tracked through its lifecycle.
///
/// Mutated only through the transition helpers below, which enforce the
/// lifecycle graph and stamp timestamps on the edges that define them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanRecord {
    /// Unique id, assigned at creation, never reused
    pub id: Uuid,
    /// Opaque description of what is being scanned, immutable after creation
    pub target: String,
    /// Executor selector tag, immutable after creation
    pub kind: String,
    pub state: ScanState,
    pub created_at: DateTime<Utc>,
    /// Set on dispatch (Pending -> Running)
    pub started_at: Option<DateTime<Utc>>,
    /// Set on every transition into a terminal state
    pub finished_at: Option<DateTime<Utc>>,
    /// Diagnostic, populated only in Failed state
    pub error: Option<String>,
    /// Ordered findings, populated only on Completed
    pub findings: Vec<Finding>,
}

impl ScanRecord {
    /// Creates a new Pending record. The id comes from the registry claim.
    pub fn new(id: Uuid, target: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id,
            target: target.into(),
            kind: kind.into(),
            state: ScanState::Pending,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            error: None,
            findings: Vec::new(),
        }
    }

    /// Pending -> Running; stamps `started_at`.
    pub fn mark_running(&mut self) -> Result<()> {
        self.transition(ScanState::Running)
    }

    /// Running -> Completed; attaches the findings.
    pub fn complete(&mut self, findings: Vec<Finding>) -> Result<()> {
        self.transition(ScanState::Completed)?;
        self.findings = findings;
        Ok(())
    }

    /// Running -> Failed; records the diagnostic.
    pub fn fail(&mut self, error: impl Into<String>) -> Result<()> {
        self.transition(ScanState::Failed)?;
        self.error = Some(error.into());
        Ok(())
    }

    /// Pending/Running -> Cancelled.
    pub fn cancel(&mut self) -> Result<()> {
        self.transition(ScanState::Cancelled)
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    fn transition(&mut self, next: ScanState) -> Result<()> {
        validate_transition(self.state, next)?;
        if next == ScanState::Running {
            self.started_at = Some(Utc::now());
        }
        if next.is_terminal() {
            self.finished_at = Some(Utc::now());
        }
        self.state = next;
        Ok(())
    }
}
