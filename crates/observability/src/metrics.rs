//! Fetch pipeline 指标收集模块
//!
//! 指标名统一使用 `fetchpipe_` 前缀。

use contracts::WorkerId;
use metrics::{counter, histogram};

/// 记录一个 item 的最终结果
///
/// `outcome`: `stored` / `failed` / `skipped` / `abandoned`
pub fn record_item_outcome(outcome: &'static str) {
    counter!("fetchpipe_items_total", "outcome" => outcome).increment(1);
}

/// 记录一次 fetch 调用（包含重试）
pub fn record_fetch_attempt(worker_id: WorkerId) {
    counter!(
        "fetchpipe_fetch_attempts_total",
        "worker" => worker_id.to_string()
    )
    .increment(1);
}

/// 记录单次 fetch 延迟
pub fn record_fetch_latency_ms(latency_ms: f64) {
    histogram!("fetchpipe_fetch_latency_ms").record(latency_ms);
}

/// 记录 worker 退出
///
/// `status`: `completed` / `fatal` / `panicked`
pub fn record_worker_exit(status: &'static str) {
    counter!("fetchpipe_worker_exits_total", "status" => status).increment(1);
}

/// 记录 artifact 交付给 consumer
pub fn record_artifact_consumed(consumer_name: &str, success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!(
        "fetchpipe_artifacts_consumed_total",
        "consumer" => consumer_name.to_string(),
        "status" => status
    )
    .increment(1);
}

/// 统计摘要
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StatsSummary {
    pub count: u64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub std_dev: f64,
}

impl From<&RunningStats> for StatsSummary {
    fn from(stats: &RunningStats) -> Self {
        Self {
            count: stats.count,
            min: stats.min,
            max: stats.max,
            mean: stats.mean(),
            std_dev: stats.std_dev(),
        }
    }
}

impl std::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.count == 0 {
            write!(f, "N/A")
        } else {
            write!(
                f,
                "min={:.1}, max={:.1}, mean={:.1}, std={:.1} (n={})",
                self.min, self.max, self.mean, self.std_dev, self.count
            )
        }
    }
}

/// 在线统计计算器 (Welford's algorithm)
///
/// 每个 worker 各自累积，结束后用 [`merge`](Self::merge) 合并，
/// 合并结果与合并顺序无关（浮点误差范围内）。
#[derive(Debug, Clone, Default)]
pub struct RunningStats {
    count: u64,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
}

impl RunningStats {
    /// 添加新值
    pub fn push(&mut self, value: f64) {
        self.count += 1;

        if self.count == 1 {
            self.min = value;
            self.max = value;
            self.mean = value;
            self.m2 = 0.0;
            return;
        }

        self.min = self.min.min(value);
        self.max = self.max.max(value);

        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    /// 合并另一组统计 (Chan et al. 并行算法)
    pub fn merge(&mut self, other: &RunningStats) {
        if other.count == 0 {
            return;
        }
        if self.count == 0 {
            *self = other.clone();
            return;
        }

        let total = self.count + other.count;
        let delta = other.mean - self.mean;
        let weight = self.count as f64 * other.count as f64 / total as f64;
        self.m2 += other.m2 + delta * delta * weight;
        self.mean += delta * other.count as f64 / total as f64;
        self.min = self.min.min(other.min);
        self.max = self.max.max(other.max);
        self.count = total;
    }

    /// 样本数量
    pub fn count(&self) -> u64 {
        self.count
    }

    /// 均值
    pub fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.mean
        }
    }

    /// 样本方差
    pub fn variance(&self) -> f64 {
        if self.count < 2 {
            0.0
        } else {
            self.m2 / (self.count - 1) as f64
        }
    }

    /// 标准差
    pub fn std_dev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// 摘要
    pub fn summary(&self) -> StatsSummary {
        StatsSummary::from(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_running_stats() {
        let mut stats = RunningStats::default();
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            stats.push(v);
        }

        assert_eq!(stats.count(), 5);
        assert!((stats.mean() - 3.0).abs() < 1e-10);
        assert!((stats.variance() - 2.5).abs() < 1e-10);
        let summary = stats.summary();
        assert!((summary.min - 1.0).abs() < 1e-10);
        assert!((summary.max - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_merge_matches_sequential() {
        let values = [3.0, 9.5, 1.25, 7.0, 7.0, 12.0, 0.5];

        let mut all = RunningStats::default();
        values.iter().for_each(|v| all.push(*v));

        let mut left = RunningStats::default();
        let mut right = RunningStats::default();
        values[..3].iter().for_each(|v| left.push(*v));
        values[3..].iter().for_each(|v| right.push(*v));

        let mut merged = right.clone();
        merged.merge(&left);

        assert_eq!(merged.count(), all.count());
        assert!((merged.mean() - all.mean()).abs() < 1e-9);
        assert!((merged.variance() - all.variance()).abs() < 1e-9);
        assert_eq!(merged.summary().min, 0.5);
        assert_eq!(merged.summary().max, 12.0);
    }

    #[test]
    fn test_merge_with_empty() {
        let mut stats = RunningStats::default();
        stats.merge(&RunningStats::default());
        assert_eq!(stats.count(), 0);
        assert_eq!(format!("{}", stats.summary()), "N/A");

        let mut other = RunningStats::default();
        other.push(4.0);
        stats.merge(&other);
        assert_eq!(stats.count(), 1);
        assert!(format!("{}", stats.summary()).contains("n=1"));
    }
}
