//! # Observability
//!
//! 可观测性模块：Tracing + Prometheus 指标。
//!
//! ## 功能
//!
//! - Tracing 初始化 (JSON/Pretty/Compact 格式)
//! - Prometheus 指标导出
//! - fetch / worker / consumer 指标记录
//! - 在线延迟统计 (Welford)
//!
//! ## 使用示例
//!
//! ```ignore
//! use observability::{init, metrics};
//!
//! // 初始化
//! observability::init()?;
//!
//! // 记录一次 fetch
//! metrics::record_fetch_attempt(worker_id);
//! metrics::record_fetch_latency_ms(elapsed.as_secs_f64() * 1000.0);
//! metrics::record_item_outcome("stored");
//! ```

pub mod metrics;

use std::net::SocketAddr;

use anyhow::{Context, Result};
use metrics_exporter_prometheus::PrometheusBuilder;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

pub use crate::metrics::{
    record_artifact_consumed, record_fetch_attempt, record_fetch_latency_ms, record_item_outcome,
    record_worker_exit, RunningStats, StatsSummary,
};

/// 噪声较大的依赖默认只输出 `warn`，`RUST_LOG` 可覆盖
const QUIET_DEPENDENCIES: &[&str] = &["hyper", "hyper_util", "reqwest", "rustls", "h2"];

/// 使用默认配置初始化
pub fn init() -> Result<()> {
    init_with_config(ObservabilityConfig::default())
}

/// 可观测性配置
#[derive(Debug, Clone)]
pub struct ObservabilityConfig {
    /// 日志格式
    pub log_format: LogFormat,
    /// Prometheus 端口 (None = 禁用)
    pub metrics_port: Option<u16>,
    /// 默认日志级别
    pub default_log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_format: LogFormat::Compact,
            metrics_port: None,
            default_log_level: "info".to_string(),
        }
    }
}

impl ObservabilityConfig {
    /// 未设置 `RUST_LOG` 时使用的过滤器
    fn default_filter(&self) -> String {
        let mut directives = vec![self.default_log_level.clone()];
        directives.extend(QUIET_DEPENDENCIES.iter().map(|dep| format!("{dep}=warn")));
        directives.join(",")
    }
}

/// 日志格式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// JSON 结构化日志
    Json,
    /// 人类可读格式
    Pretty,
    /// 紧凑单行格式
    #[default]
    Compact,
}

/// 初始化 tracing 订阅器，并按需启动 Prometheus 导出
///
/// 每个进程只能成功调用一次。
pub fn init_with_config(config: ObservabilityConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter()));

    let fmt_layer = match config.log_format {
        LogFormat::Json => fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => fmt::layer().pretty().boxed(),
        LogFormat::Compact => fmt::layer().compact().with_target(false).boxed(),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .context("Failed to initialize tracing subscriber")?;

    if let Some(port) = config.metrics_port {
        install_prometheus(port)?;
    }

    tracing::info!(
        log_format = ?config.log_format,
        metrics_port = ?config.metrics_port,
        "Observability initialized"
    );

    Ok(())
}

/// 仅启动 Prometheus 导出（日志由调用方自行初始化）
pub fn init_metrics_only(port: u16) -> Result<()> {
    install_prometheus(port)
}

fn install_prometheus(port: u16) -> Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .with_context(|| format!("Failed to install Prometheus recorder on {addr}"))?;

    tracing::info!(%addr, "Prometheus metrics endpoint initialized");
    Ok(())
}
