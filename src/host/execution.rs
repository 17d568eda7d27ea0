//! Pipeline execution hand-off.
//!
//! DAT does not run pipelines. Once a recipe is compiled, the resulting
//! version and its destination cell are handed to an [`ExecutionSink`] and
//! DAT moves on; results and errors are reported by the host.

use crate::error::{DatError, Result};
use crate::host::id::VersionId;
use crossbeam_channel::{unbounded, Receiver, Sender};
use serde::{Deserialize, Serialize};

/// Handle to a compiled pipeline in the version store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PipelineInformation {
    pub version: VersionId,
}

impl PipelineInformation {
    pub fn new(version: VersionId) -> Self {
        Self { version }
    }
}

/// Destination of a pipeline's output in the host's spreadsheet.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CellInformation {
    pub sheet: String,
    pub row: u32,
    pub column: u32,
}

impl CellInformation {
    pub fn new(sheet: impl Into<String>, row: u32, column: u32) -> Self {
        Self {
            sheet: sheet.into(),
            row,
            column,
        }
    }
}

/// Host pipeline execution engine.
#[cfg_attr(test, mockall::automock)]
pub trait ExecutionSink: Send + Sync {
    /// Queue the pipeline for execution. Must not block on the execution itself.
    fn execute(&self, pipeline: PipelineInformation, destination: &CellInformation) -> Result<()>;
}

/// A queued execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionRequest {
    pub pipeline: PipelineInformation,
    pub destination: CellInformation,
}

/// Execution sink that forwards requests over a channel to an executor thread.
#[derive(Debug, Clone)]
pub struct ChannelExecutionSink {
    sender: Sender<ExecutionRequest>,
}

impl ChannelExecutionSink {
    /// Create a sink and the receiving end the executor drains.
    pub fn new() -> (Self, Receiver<ExecutionRequest>) {
        let (sender, receiver) = unbounded();
        (Self { sender }, receiver)
    }
}

impl ExecutionSink for ChannelExecutionSink {
    fn execute(&self, pipeline: PipelineInformation, destination: &CellInformation) -> Result<()> {
        tracing::info!(
            "Queueing pipeline {} for cell {}[{}, {}]",
            pipeline.version,
            destination.sheet,
            destination.row,
            destination.column
        );
        self.sender
            .send(ExecutionRequest {
                pipeline,
                destination: destination.clone(),
            })
            .map_err(|_| DatError::Host("execution engine is gone".to_string()))
    }
}
