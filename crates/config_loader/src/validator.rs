//! 配置校验模块
//!
//! 校验规则：
//! - 数值范围 (workers / capacity / max_attempts ...) 由 `validator` derive 检查
//! - source 必须且只能指定一种 (queries / urls / template)
//! - queries 需要 [search] 配置, endpoint 为合法 http(s) URL
//! - static 模式只接受 URL 类 source
//! - template 必须包含 `{i}`, `start + count` 不得溢出, count 不超过上限
//! - consumer name 唯一

use std::collections::HashSet;

use contracts::{ContractError, PipelineBlueprint, PipelineMode, SourceKind, UrlTemplate};
use url::Url;
use validator::Validate;

/// 校验 PipelineBlueprint 配置
///
/// 返回第一个遇到的错误，或 Ok(())。
pub fn validate(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    validate_ranges(blueprint)?;
    validate_source(blueprint)?;
    validate_search(blueprint)?;
    validate_mode(blueprint)?;
    validate_storage(blueprint)?;
    validate_consumers(blueprint)?;
    Ok(())
}

/// 校验数值范围
fn validate_ranges(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    blueprint
        .validate()
        .map_err(|e| ContractError::config_validation("blueprint", e.to_string()))
}

/// 校验 source
fn validate_source(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let source = &blueprint.source;

    if source.kind().is_none() {
        return Err(ContractError::config_validation(
            "source",
            "exactly one of queries, urls or template must be set",
        ));
    }

    if source.rounds == 0 {
        return Err(ContractError::config_validation(
            "source.rounds",
            "rounds must be >= 1",
        ));
    }

    for (idx, raw) in source.urls.iter().enumerate() {
        parse_http_url(raw).map_err(|message| {
            ContractError::config_validation(format!("source.urls[{idx}]"), message)
        })?;
    }

    if let Some(template) = &source.template {
        if !template.pattern.contains("{i}") {
            return Err(ContractError::config_validation(
                "source.template.pattern",
                format!("pattern '{}' has no {{i}} placeholder", template.pattern),
            ));
        }
        validate_template_range(template)?;
    }

    if source.queries.iter().any(|q| q.trim().is_empty()) {
        return Err(ContractError::config_validation(
            "source.queries",
            "queries cannot be empty strings",
        ));
    }

    Ok(())
}

/// 校验 template 的下标范围
///
/// 首尾两个 URL 都必须是合法的 http(s) URL。
fn validate_template_range(template: &UrlTemplate) -> Result<(), ContractError> {
    if template.count > UrlTemplate::MAX_COUNT {
        return Err(ContractError::config_validation(
            "source.template.count",
            format!(
                "count {} exceeds the maximum of {}",
                template.count,
                UrlTemplate::MAX_COUNT
            ),
        ));
    }

    let indices = template.indices()?;
    let first = indices.start;
    let last = indices.end.saturating_sub(1).max(first);
    for index in [first, last] {
        parse_http_url(&template.render(index)).map_err(|message| {
            ContractError::config_validation("source.template.pattern", message)
        })?;
    }
    Ok(())
}

/// 校验 search 配置
fn validate_search(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.source.kind() != Some(SourceKind::Queries) {
        return Ok(());
    }

    let search = blueprint.search.as_ref().ok_or_else(|| {
        ContractError::config_validation("search", "query sources require a [search] section")
    })?;

    parse_http_url(&search.endpoint)
        .map_err(|message| ContractError::config_validation("search.endpoint", message))?;

    for (field, pointer) in [
        ("search.results_pointer", &search.results_pointer),
        ("search.url_pointer", &search.url_pointer),
    ] {
        if !pointer.is_empty() && !pointer.starts_with('/') {
            return Err(ContractError::config_validation(
                field,
                format!("JSON pointer '{pointer}' must start with '/'"),
            ));
        }
    }

    Ok(())
}

/// 校验拓扑与 source 的组合
fn validate_mode(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    if blueprint.pipeline.mode == PipelineMode::Static
        && blueprint.source.kind() != Some(SourceKind::Urls)
    {
        return Err(ContractError::config_validation(
            "pipeline.mode",
            "static mode requires a urls or template source",
        ));
    }
    Ok(())
}

/// 校验存储配置
fn validate_storage(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let ext = &blueprint.storage.extension;
    if ext.contains('/') || ext.contains('\\') {
        return Err(ContractError::config_validation(
            "storage.extension",
            format!("extension '{ext}' cannot contain path separators"),
        ));
    }
    Ok(())
}

/// 校验 consumer 配置
fn validate_consumers(blueprint: &PipelineBlueprint) -> Result<(), ContractError> {
    let mut seen = HashSet::new();
    for consumer in &blueprint.consumers {
        if !seen.insert(consumer.name.as_str()) {
            return Err(ContractError::config_validation(
                format!("consumers[name={}]", consumer.name),
                "duplicate consumer name",
            ));
        }
    }
    Ok(())
}

fn parse_http_url(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| format!("invalid URL '{raw}': {e}"))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(format!("unsupported URL scheme '{other}' in '{raw}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ConsumerConfig, ConsumerKind};

    fn minimal_blueprint() -> PipelineBlueprint {
        let mut bp = PipelineBlueprint::for_queries(
            &["colombo", "matara"],
            "https://unsplash.com/napi/search/photos",
        );
        bp.consumers.push(ConsumerConfig {
            name: "log".into(),
            kind: ConsumerKind::Log,
            queue_capacity: 100,
            params: Default::default(),
        });
        bp
    }

    #[test]
    fn test_valid_config() {
        let bp = minimal_blueprint();
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut bp = minimal_blueprint();
        bp.pipeline.workers = 0;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("workers"), "got: {err}");
    }

    #[test]
    fn test_ambiguous_source() {
        let mut bp = minimal_blueprint();
        bp.source.urls = vec!["https://example.com/a.jpg".into()];
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("exactly one"), "got: {err}");
    }

    #[test]
    fn test_queries_require_search() {
        let mut bp = minimal_blueprint();
        bp.search = None;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("[search]"), "got: {err}");
    }

    #[test]
    fn test_invalid_endpoint_scheme() {
        let mut bp = minimal_blueprint();
        if let Some(search) = bp.search.as_mut() {
            search.endpoint = "ftp://example.com/search".into();
        }
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("unsupported URL scheme"), "got: {err}");
    }

    #[test]
    fn test_static_mode_requires_urls() {
        let mut bp = minimal_blueprint();
        bp.pipeline.mode = PipelineMode::Static;
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("static mode"), "got: {err}");

        bp.source.queries.clear();
        bp.source.template = Some(UrlTemplate {
            pattern: "https://picsum.photos/id/{i}/400/600".into(),
            count: 8,
            start: 0,
        });
        assert!(validate(&bp).is_ok());
    }

    #[test]
    fn test_template_placeholder_required() {
        let mut bp = minimal_blueprint();
        bp.source.queries.clear();
        bp.source.template = Some(UrlTemplate {
            pattern: "https://picsum.photos/id/1/400/600".into(),
            count: 8,
            start: 0,
        });
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("placeholder"), "got: {err}");
    }

    #[test]
    fn test_duplicate_consumer_name() {
        let mut bp = minimal_blueprint();
        bp.consumers.push(bp.consumers[0].clone());
        let err = validate(&bp).unwrap_err().to_string();
        assert!(err.contains("duplicate consumer name"), "got: {err}");
    }

    #[test]
    fn test_empty_consumer_name() {
        let mut bp = minimal_blueprint();
        bp.consumers[0].name = String::new();
        assert!(validate(&bp).is_err());
    }

    fn template_blueprint(start: u64, count: u64) -> PipelineBlueprint {
        let mut bp = minimal_blueprint();
        bp.source.queries.clear();
        bp.source.template = Some(UrlTemplate {
            pattern: "https://picsum.photos/id/{i}/400/600".into(),
            count,
            start,
        });
        bp
    }

    #[test]
    fn test_template_index_overflow_rejected() {
        let err = validate(&template_blueprint(u64::MAX - 1, 5)).unwrap_err();
        assert!(err.to_string().contains("overflows"), "got: {err}");

        // The last index may be u64::MAX - 1
        assert!(validate(&template_blueprint(u64::MAX - 5, 5)).is_ok());
    }

    #[test]
    fn test_template_count_limit() {
        let err = validate(&template_blueprint(0, UrlTemplate::MAX_COUNT + 1)).unwrap_err();
        assert!(err.to_string().contains("source.template.count"), "got: {err}");
        assert!(validate(&template_blueprint(0, UrlTemplate::MAX_COUNT)).is_ok());
    }

    #[test]
    fn test_template_last_url_checked() {
        let mut bp = template_blueprint(65_530, 10);
        if let Some(template) = bp.source.template.as_mut() {
            template.pattern = "http://localhost:{i}/image.jpg".into();
        }
        // Port 65530 is fine, 65539 is not
        let err = validate(&bp).unwrap_err();
        assert!(err.to_string().contains("invalid URL"), "got: {err}");
    }
}
