//! Per-bridge sequence number persistence.
//!
//! The management server stamps every topology and routing-policy push with
//! a monotonically increasing sequence number. Updates can arrive out of
//! order when the agent retries, so each daemon records the last applied
//! number per bridge and kind, and an incoming number that is not strictly
//! greater leaves the bridge untouched.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{FlowMgrError, FlowMgrResult};

/// Default directory for sequence files.
pub const DEFAULT_SEQUENCE_DIR: &str = "/var/run/ovs-flowmgr";

static BRIDGE_NAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").expect("Invalid regex pattern"));

/// Which kind of update a sequence number belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SequenceKind {
    /// VPC network topology pushes.
    Topology,
    /// Routing policy (ACL) pushes.
    Policy,
}

impl SequenceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceKind::Topology => "topology",
            SequenceKind::Policy => "policy",
        }
    }
}

/// Result of a staleness check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeqStatus {
    /// The incoming sequence is newer than anything applied.
    Fresh,
    /// The incoming sequence was already applied or superseded.
    Stale {
        /// The sequence currently recorded for the bridge.
        current: u64,
    },
}

/// File-backed store of applied sequence numbers.
#[derive(Debug, Clone)]
pub struct SequenceStore {
    dir: PathBuf,
}

impl Default for SequenceStore {
    fn default() -> Self {
        Self::new(DEFAULT_SEQUENCE_DIR)
    }
}

impl SequenceStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn file_path(&self, bridge: &str, kind: SequenceKind) -> FlowMgrResult<PathBuf> {
        if !BRIDGE_NAME_RE.is_match(bridge) {
            return Err(FlowMgrError::invalid_config(
                "bridge",
                format!("Invalid bridge name '{}'", bridge),
            ));
        }
        Ok(self.dir.join(format!("{}.{}.seq", bridge, kind.as_str())))
    }

    /// Loads the recorded sequence for a bridge, if any.
    ///
    /// A corrupt file is treated as absent so a damaged host can recover
    /// on the next push.
    pub async fn load(&self, bridge: &str, kind: SequenceKind) -> FlowMgrResult<Option<u64>> {
        let path = self.file_path(bridge, kind)?;
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(FlowMgrError::SequenceStore {
                    path: path.display().to_string(),
                    source: e,
                })
            }
        };
        match contents.trim().parse::<u64>() {
            Ok(seq) => Ok(Some(seq)),
            Err(_) => {
                tracing::warn!(path = %path.display(), "Corrupt sequence file, ignoring");
                Ok(None)
            }
        }
    }

    /// Checks an incoming sequence number against the recorded one.
    pub async fn check(
        &self,
        bridge: &str,
        kind: SequenceKind,
        seq: u64,
    ) -> FlowMgrResult<SeqStatus> {
        match self.load(bridge, kind).await? {
            Some(current) if current >= seq => Ok(SeqStatus::Stale { current }),
            _ => Ok(SeqStatus::Fresh),
        }
    }

    /// Records an applied sequence number.
    pub async fn store(&self, bridge: &str, kind: SequenceKind, seq: u64) -> FlowMgrResult<()> {
        let path = self.file_path(bridge, kind)?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| FlowMgrError::SequenceStore {
                    path: parent.display().to_string(),
                    source: e,
                })?;
        }
        tokio::fs::write(&path, format!("{}\n", seq))
            .await
            .map_err(|e| FlowMgrError::SequenceStore {
                path: path.display().to_string(),
                source: e,
            })?;
        tracing::debug!(bridge = %bridge, kind = kind.as_str(), seq = seq, "Recorded sequence");
        Ok(())
    }

    /// The directory backing this store.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}
