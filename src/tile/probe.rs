//! Dataset health probe.
//!
//! Reads a fixed set of sample tiles from every dataset and classifies the
//! dataset from the outcomes. Absent and out-of-range tiles are expected
//! misses; store errors are failures.

use std::fmt;

use serde::Serialize;
use tracing::{debug, error};

use crate::dataset::{DatasetEntry, Registry};

/// Sample addresses as (level, column, row).
pub const PROBE_ADDRESSES: [(u32, u32, u32); 3] = [(0, 0, 0), (1, 0, 0), (2, 1, 1)];

/// Outcome of reading one sample tile.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ProbeOutcome {
    Served {
        bytes: usize,
        content_type: &'static str,
    },
    Miss {
        reason: String,
    },
    Failure {
        reason: String,
    },
}

/// Health classification of a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    /// At least one sample served, none failed
    Healthy,
    /// No sample served and none failed, e.g. a sparse pyramid
    Empty,
    /// Some samples served, some failed
    Partial,
    /// Nothing served, at least one failed
    Failed,
}

impl ProbeStatus {
    /// Whether any sample hit a store error.
    pub fn is_failing(self) -> bool {
        matches!(self, ProbeStatus::Partial | ProbeStatus::Failed)
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Healthy => write!(f, "healthy"),
            ProbeStatus::Empty => write!(f, "empty"),
            ProbeStatus::Partial => write!(f, "partial"),
            ProbeStatus::Failed => write!(f, "failed"),
        }
    }
}

/// Probe results for one dataset.
#[derive(Debug, Clone, Serialize)]
pub struct DatasetProbe {
    pub route: String,
    pub samples: Vec<((u32, u32, u32), ProbeOutcome)>,
}

impl DatasetProbe {
    pub fn served(&self) -> usize {
        self.count(|o| matches!(o, ProbeOutcome::Served { .. }))
    }

    pub fn failures(&self) -> usize {
        self.count(|o| matches!(o, ProbeOutcome::Failure { .. }))
    }

    fn count(&self, pred: impl Fn(&ProbeOutcome) -> bool) -> usize {
        self.samples.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn status(&self) -> ProbeStatus {
        match (self.failures(), self.served()) {
            (0, 0) => ProbeStatus::Empty,
            (0, _) => ProbeStatus::Healthy,
            (_, 0) => ProbeStatus::Failed,
            _ => ProbeStatus::Partial,
        }
    }
}

impl fmt::Display for DatasetProbe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}", self.route, self.status())?;
        for ((level, col, row), outcome) in &self.samples {
            match outcome {
                ProbeOutcome::Served {
                    bytes,
                    content_type,
                } => writeln!(f, "  {}/{}/{} ok {} bytes {}", level, col, row, bytes, content_type)?,
                ProbeOutcome::Miss { reason } => {
                    writeln!(f, "  {}/{}/{} miss: {}", level, col, row, reason)?
                }
                ProbeOutcome::Failure { reason } => {
                    writeln!(f, "  {}/{}/{} FAILED: {}", level, col, row, reason)?
                }
            }
        }
        Ok(())
    }
}

/// Read every sample address of one dataset directly from its store.
pub async fn probe_dataset(entry: &DatasetEntry) -> DatasetProbe {
    let mut samples = Vec::with_capacity(PROBE_ADDRESSES.len());

    for (level, col, row) in PROBE_ADDRESSES {
        let outcome = match entry.store.read_tile(level, col, row).await {
            Ok(tile) => ProbeOutcome::Served {
                bytes: tile.data.len(),
                content_type: tile.content_type,
            },
            Err(err) if err.is_not_found() => {
                debug!(route = %entry.route, level, col, row, "Probe miss: {}", err);
                ProbeOutcome::Miss {
                    reason: err.to_string(),
                }
            }
            Err(err) => {
                error!(route = %entry.route, level, col, row, error = %err, "Probe failed");
                ProbeOutcome::Failure {
                    reason: err.to_string(),
                }
            }
        };
        samples.push(((level, col, row), outcome));
    }

    DatasetProbe {
        route: entry.route.clone(),
        samples,
    }
}

/// Probe every dataset of a registry, in route order.
pub async fn probe_registry(registry: &Registry) -> Vec<DatasetProbe> {
    let mut probes = Vec::with_capacity(registry.len());
    for entry in registry.entries() {
        probes.push(probe_dataset(entry).await);
    }
    probes
}
