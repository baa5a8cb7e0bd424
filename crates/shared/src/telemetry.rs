//! 遥测模块（日志 + 分布式追踪）
//!
//! 提供 tracing 订阅器初始化和 OpenTelemetry 配置，
//! 支持 OTLP 协议导出到 Jaeger/Tempo 等后端。
//! 同时提供 Kafka 消息头的 W3C TraceContext 注入/提取工具，
//! 使追踪链路可以跨越 broker 传播（生产者注入，消费者提取）。

use std::collections::HashMap;

use anyhow::Result;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::{KeyValue, trace::TracerProvider as _};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::{
    Resource, runtime,
    trace::{RandomIdGenerator, Sampler, TracerProvider},
};
use opentelemetry_semantic_conventions::resource::SERVICE_NAME;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::ObservabilityConfig;

/// 遥测资源守卫
///
/// 持有 TracerProvider，在 Drop 时优雅关闭并刷新待发送的 span。
pub struct TelemetryGuard {
    provider: Option<TracerProvider>,
}

impl Drop for TelemetryGuard {
    fn drop(&mut self) {
        if let Some(provider) = self.provider.take() {
            if let Err(e) = provider.shutdown() {
                eprintln!("Error shutting down tracer provider: {:?}", e);
            }
        }
    }
}

/// 初始化遥测（日志 + 追踪）
pub fn init(service_name: &str, config: &ObservabilityConfig) -> Result<TelemetryGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = if config.log_format == "json" {
        fmt::layer()
            .json()
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_thread_ids(true)
            .boxed()
    } else {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
            .boxed()
    };

    // W3C TraceContext 是唯一的跨进程传播格式，生产消费双方必须一致
    opentelemetry::global::set_text_map_propagator(TraceContextPropagator::new());

    // 根据是否配置 OTLP 端点决定是否启用分布式追踪
    let (otel_layer, provider) = if config.tracing_enabled
        && let Some(endpoint) = &config.tracing_endpoint
    {
        let provider = init_tracer_provider(service_name, endpoint)?;
        let tracer = provider.tracer(service_name.to_string());
        let otel_layer = tracing_opentelemetry::layer().with_tracer(tracer);
        (Some(otel_layer), Some(provider))
    } else {
        (None, None)
    };

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer);

    if let Some(otel_layer) = otel_layer {
        subscriber.with(otel_layer).try_init()?;
    } else {
        subscriber.try_init()?;
    }

    Ok(TelemetryGuard { provider })
}

/// 初始化 OpenTelemetry TracerProvider
fn init_tracer_provider(service_name: &str, endpoint: &str) -> Result<TracerProvider> {
    let resource = Resource::new(vec![KeyValue::new(SERVICE_NAME, service_name.to_string())]);

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .build()?;

    let provider = TracerProvider::builder()
        .with_batch_exporter(exporter, runtime::Tokio)
        .with_sampler(Sampler::AlwaysOn)
        .with_id_generator(RandomIdGenerator::default())
        .with_resource(resource)
        .build();

    opentelemetry::global::set_tracer_provider(provider.clone());

    Ok(provider)
}

/// 将当前 span 的追踪上下文注入到字符串 map（Kafka 消息头载体）
pub fn inject_trace_context(carrier: &mut HashMap<String, String>) {
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let cx = tracing::Span::current().context();
    let propagator = TraceContextPropagator::new();
    propagator.inject_context(&cx, carrier);
}

/// 从字符串 map（Kafka 消息头）提取追踪上下文并挂到当前 span
///
/// 消费者在进入处理逻辑前调用，使 handler 的 span 成为
/// 生产者 span 的子节点，串起跨服务链路。
pub fn extract_trace_context(carrier: &HashMap<String, String>) {
    use tracing_opentelemetry::OpenTelemetrySpanExt;

    let propagator = TraceContextPropagator::new();
    let cx = propagator.extract(carrier);
    tracing::Span::current().set_parent(cx);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inject_without_active_span_is_noop() {
        // 没有初始化 tracing 时注入不应 panic，载体保持为空或仅含无效上下文
        let mut carrier = HashMap::new();
        inject_trace_context(&mut carrier);
        // W3C 传播器在无有效 span 时不写入 traceparent
        assert!(carrier.get("traceparent").is_none() || !carrier["traceparent"].is_empty());
    }

    #[test]
    fn test_extract_from_empty_carrier_is_noop() {
        let carrier = HashMap::new();
        extract_trace_context(&carrier);
    }
}
