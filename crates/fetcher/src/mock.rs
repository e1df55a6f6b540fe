//! Mock fetcher
//!
//! 用于无网络环境的测试，支持按 item 注入失败场景。

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use contracts::{ContractError, FetchBatch, Fetcher, Resource, WorkItem};
use rand::Rng;
use tracing::trace;

/// 单次 fetch 的脚本化结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockResponse {
    /// 成功，返回 n 个资源
    Resources(usize),
    /// 网络错误（可选 HTTP 状态码）
    Transient(Option<u16>),
    /// 超时
    Timeout,
    /// 内容无法解析
    Malformed,
    /// 致命错误，worker 必须退出
    Fatal,
    /// 直接 panic（模拟崩溃）
    Panic,
}

/// Mock fetcher
///
/// 未配置的 item 默认返回一个资源，identity 为 item 本身。
pub struct MockFetcher {
    /// item -> 响应序列（最后一个响应会一直重复）
    script: Mutex<HashMap<String, VecDeque<MockResponse>>>,
    /// 默认响应
    default: MockResponse,
    /// 固定延迟
    delay: Duration,
    /// 随机附加延迟上限
    jitter: Duration,
    /// 调用计数
    calls: AtomicUsize,
    /// 调用历史（按调用顺序）
    history: Mutex<Vec<String>>,
}

impl Default for MockFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFetcher {
    /// 创建默认 mock fetcher
    pub fn new() -> Self {
        Self {
            script: Mutex::new(HashMap::new()),
            default: MockResponse::Resources(1),
            delay: Duration::ZERO,
            jitter: Duration::ZERO,
            calls: AtomicUsize::new(0),
            history: Mutex::new(Vec::new()),
        }
    }

    /// 设置未配置 item 的默认响应
    pub fn with_default(mut self, response: MockResponse) -> Self {
        self.default = response;
        self
    }

    /// 每次 fetch 的固定延迟
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// 每次 fetch 额外的随机延迟 (0..=max)
    pub fn with_jitter(mut self, max: Duration) -> Self {
        self.jitter = max;
        self
    }

    /// 为 item 设置固定响应
    pub fn respond(self, item: impl ToString, response: MockResponse) -> Self {
        self.respond_sequence(item, vec![response])
    }

    /// 为 item 设置响应序列（每次调用取一个，最后一个一直重复）
    pub fn respond_sequence(self, item: impl ToString, responses: Vec<MockResponse>) -> Self {
        self.script
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(item.to_string(), responses.into());
        self
    }

    /// 总调用次数
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 某个 item 的调用次数
    pub fn calls_for(&self, item: impl ToString) -> usize {
        let key = item.to_string();
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|called| **called == key)
            .count()
    }

    /// 调用历史
    pub fn history(&self) -> Vec<String> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn next_response(&self, key: &str) -> MockResponse {
        let mut script = self.script.lock().unwrap_or_else(PoisonError::into_inner);
        match script.get_mut(key) {
            Some(queue) if queue.len() > 1 => {
                queue.pop_front().unwrap_or(MockResponse::Resources(1))
            }
            Some(queue) => queue.front().cloned().unwrap_or(MockResponse::Resources(1)),
            None => self.default.clone(),
        }
    }

    fn latency(&self) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let extra = if jitter_ms > 0 {
            rand::rng().random_range(0..=jitter_ms)
        } else {
            0
        };
        self.delay + Duration::from_millis(extra)
    }
}

impl<I: WorkItem> Fetcher<I> for MockFetcher {
    async fn fetch(&self, item: &I, timeout: Duration) -> Result<FetchBatch, ContractError> {
        let key = item.to_string();
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.history
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(key.clone());

        let response = self.next_response(&key);
        let latency = self.latency();
        trace!(item = %key, ?response, ?latency, "mock fetch");

        if latency > timeout {
            tokio::time::sleep(timeout).await;
            return Err(ContractError::Timeout {
                item: key,
                timeout_ms: timeout.as_millis() as u64,
            });
        }
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        match response {
            MockResponse::Resources(n) => Ok(FetchBatch {
                resources: (0..n).map(|k| mock_resource(&key, k, n)).collect(),
                failures: Vec::new(),
            }),
            MockResponse::Transient(status) => {
                Err(ContractError::transient(key, status, "mock transient failure"))
            }
            MockResponse::Timeout => Err(ContractError::Timeout {
                item: key,
                timeout_ms: timeout.as_millis() as u64,
            }),
            MockResponse::Malformed => Err(ContractError::malformed(key, "mock malformed content")),
            MockResponse::Fatal => {
                Err(ContractError::worker_fatal(format!("mock fatal on '{key}'")))
            }
            MockResponse::Panic => panic!("mock fetcher panic on '{key}'"),
        }
    }
}

fn mock_resource(key: &str, k: usize, n: usize) -> Resource {
    let identity = if n == 1 {
        key.to_string()
    } else {
        format!("{key}/{k}")
    };
    let content = format!("content of {identity}");
    Resource::new(identity, content)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_default_single_resource() {
        let fetcher = MockFetcher::new();
        let item = "colombo".to_string();
        let batch = Fetcher::<String>::fetch(&fetcher, &item, Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(batch.resources.len(), 1);
        assert_eq!(batch.resources[0].identity, "colombo");
        assert_eq!(fetcher.calls(), 1);
    }

    #[tokio::test]
    async fn test_sequence_last_response_repeats() {
        let fetcher = MockFetcher::new().respond_sequence(
            "q",
            vec![MockResponse::Transient(Some(503)), MockResponse::Resources(2)],
        );
        let item = "q".to_string();
        let timeout = Duration::from_secs(1);

        assert!(Fetcher::<String>::fetch(&fetcher, &item, timeout).await.is_err());
        assert_eq!(Fetcher::<String>::fetch(&fetcher, &item, timeout).await.unwrap().len(), 2);
        assert_eq!(Fetcher::<String>::fetch(&fetcher, &item, timeout).await.unwrap().len(), 2);
        assert_eq!(fetcher.calls_for("q"), 3);
    }

    #[tokio::test]
    async fn test_delay_beyond_timeout() {
        let fetcher = MockFetcher::new().with_delay(Duration::from_millis(200));
        let err = Fetcher::<String>::fetch(&fetcher, &"slow".to_string(), Duration::from_millis(10))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::Timeout { timeout_ms: 10, .. }));
    }

    #[tokio::test]
    async fn test_fatal() {
        let fetcher = MockFetcher::new().respond("boom", MockResponse::Fatal);
        let err = Fetcher::<String>::fetch(&fetcher, &"boom".to_string(), Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.is_fatal());
    }
}
