//! StageQueue 错误类型

use contracts::ContractError;
use thiserror::Error;

/// StageQueue 错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum QueueError {
    /// 队列已关闭，写入被拒绝
    #[error("queue '{queue}' is closed")]
    Closed {
        /// 队列名称
        queue: String,
    },

    /// 容量必须大于 0
    #[error("queue '{queue}' capacity must be > 0")]
    ZeroCapacity {
        /// 队列名称
        queue: String,
    },
}

impl From<QueueError> for ContractError {
    fn from(err: QueueError) -> Self {
        match err {
            QueueError::Closed { queue } => ContractError::QueueClosed { queue },
            QueueError::ZeroCapacity { queue } => {
                ContractError::config_validation(format!("queue[{queue}].capacity"), "must be > 0")
            }
        }
    }
}

/// StageQueue Result 类型别名
pub type Result<T> = std::result::Result<T, QueueError>;
