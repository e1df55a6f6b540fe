//! Worker 错误类型

use contracts::{ContractError, WorkerId};
use thiserror::Error;

use crate::WorkerStats;

/// Worker 错误
///
/// 所有变体都会终止 worker，并携带退出前的统计。
#[derive(Debug, Error)]
pub enum WorkerError {
    /// fetch / store 返回不可恢复错误
    #[error("worker {worker_id} stopped on fatal error: {source}")]
    Fatal {
        worker_id: WorkerId,
        #[source]
        source: ContractError,
        partial: Box<WorkerStats>,
    },

    /// 下游队列已关闭
    #[error("worker {worker_id} could not deliver to closed queue '{queue}'")]
    OutboundClosed {
        worker_id: WorkerId,
        queue: String,
        partial: Box<WorkerStats>,
    },
}

impl WorkerError {
    /// 出错的 worker
    pub fn worker_id(&self) -> WorkerId {
        match self {
            Self::Fatal { worker_id, .. } | Self::OutboundClosed { worker_id, .. } => *worker_id,
        }
    }

    /// 退出前的统计
    pub fn partial_stats(&self) -> &WorkerStats {
        match self {
            Self::Fatal { partial, .. } | Self::OutboundClosed { partial, .. } => partial,
        }
    }
}

impl From<WorkerError> for ContractError {
    fn from(err: WorkerError) -> Self {
        match err {
            WorkerError::Fatal { source, .. } => source,
            WorkerError::OutboundClosed { queue, .. } => ContractError::QueueClosed { queue },
        }
    }
}

/// Result 类型别名
pub type Result<T> = std::result::Result<T, WorkerError>;
