//! 熔断器 (Circuit Breaker) 模块
//!
//! 实现标准的三态熔断器模式，用于保护对下游服务（gRPC）的出站调用。
//! Closed 状态下在滚动窗口内统计请求数与失败率，满足跳闸条件时断路器
//! 跳闸（Open），恢复窗口到期后允许少量探测请求（Half-Open），
//! 探测全部成功则恢复（Closed），任一失败则重新跳闸。
//!
//! 跳闸条件：窗口内请求数 >= 5 且失败率 >= 0.6。

use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tracing::{info, warn};

/// 熔断器状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// 正常放行所有请求
    Closed,
    /// 断路器跳闸，拒绝所有请求
    Open,
    /// 允许少量探测请求，成功则恢复
    HalfOpen,
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Closed => write!(f, "closed"),
            Self::Open => write!(f, "open"),
            Self::HalfOpen => write!(f, "half_open"),
        }
    }
}

/// 熔断器配置
#[derive(Debug, Clone)]
pub struct CircuitBreakerConfig {
    /// 半开状态允许通过的探测请求数（默认 3）
    pub max_requests: u32,
    /// Closed 状态计数器的滚动窗口长度（默认 5 秒）
    pub interval: Duration,
    /// 跳闸后多久进入半开状态（默认 10 秒）
    pub timeout: Duration,
    /// 跳闸所需的窗口内最小请求数（默认 5）
    pub min_requests: u32,
    /// 跳闸的失败率阈值（默认 0.6）
    pub failure_ratio: f64,
    /// 熔断器名称，用于日志和指标区分不同的下游
    pub name: String,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            max_requests: 3,
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(10),
            min_requests: 5,
            failure_ratio: 0.6,
            name: "default".to_string(),
        }
    }
}

impl CircuitBreakerConfig {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_requests(mut self, max_requests: u32) -> Self {
        self.max_requests = max_requests;
        self
    }
}

/// 窗口内计数
#[derive(Debug, Clone, Copy, Default)]
struct Counts {
    requests: u32,
    total_failures: u32,
}

impl Counts {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn failure_ratio(&self) -> f64 {
        if self.requests == 0 {
            return 0.0;
        }
        self.total_failures as f64 / self.requests as f64
    }
}

/// 熔断器内部状态，受 Mutex 保护
///
/// 状态转换涉及多个字段的一致性更新，统一用互斥保护；
/// 锁内只有纯内存操作，临界区极短。
struct InnerState {
    state: CircuitState,
    counts: Counts,
    /// Closed 窗口起点，到期后计数清零
    window_started_at: Instant,
    /// Open->HalfOpen 计时起点
    opened_at: Option<Instant>,
    /// HalfOpen 中已放行的探测请求数
    half_open_attempts: u32,
    /// HalfOpen 中已成功的探测请求数
    half_open_successes: u32,
}

/// 熔断器
///
/// 线程安全，可在多个 handler 间通过 Arc/Clone 共享。
/// 典型用法是 `call` 包装一次下游调用，跳闸时直接返回
/// `CircuitBreakerError::Open`，由边缘层映射为 HTTP 503。
#[derive(Clone)]
pub struct CircuitBreaker {
    config: CircuitBreakerConfig,
    inner: Arc<Mutex<InnerState>>,
}

impl CircuitBreaker {
    pub fn new(config: CircuitBreakerConfig) -> Self {
        info!(
            name = %config.name,
            max_requests = config.max_requests,
            interval_ms = config.interval.as_millis() as u64,
            timeout_ms = config.timeout.as_millis() as u64,
            min_requests = config.min_requests,
            failure_ratio = config.failure_ratio,
            "熔断器已创建"
        );

        Self {
            config,
            inner: Arc::new(Mutex::new(InnerState {
                state: CircuitState::Closed,
                counts: Counts::default(),
                window_started_at: Instant::now(),
                opened_at: None,
                half_open_attempts: 0,
                half_open_successes: 0,
            })),
        }
    }

    /// 获取当前状态（用于监控和日志）
    pub fn state(&self) -> CircuitState {
        let inner = self.inner.lock();
        if inner.state == CircuitState::Open
            && let Some(opened_at) = inner.opened_at
            && opened_at.elapsed() >= self.config.timeout
        {
            return CircuitState::HalfOpen;
        }
        inner.state
    }

    /// 判断是否允许发起请求
    ///
    /// Closed：始终允许（窗口到期则先清零计数）
    /// Open：检查恢复超时，到期则转为 HalfOpen 并放行第一个探测
    /// HalfOpen：在探测配额内允许
    pub fn allow_request(&self) -> bool {
        let mut inner = self.inner.lock();
        self.maybe_reset_window(&mut inner);

        match inner.state {
            CircuitState::Closed => true,
            CircuitState::Open => {
                let recovered = inner
                    .opened_at
                    .is_some_and(|at| at.elapsed() >= self.config.timeout);
                if recovered {
                    self.transition_to(&mut inner, CircuitState::HalfOpen);
                    inner.half_open_attempts = 1;
                    true
                } else {
                    false
                }
            }
            CircuitState::HalfOpen => {
                if inner.half_open_attempts < self.config.max_requests {
                    inner.half_open_attempts += 1;
                    true
                } else {
                    false
                }
            }
        }
    }

    /// 记录调用成功
    pub fn record_success(&self) {
        let mut inner = self.inner.lock();
        self.maybe_reset_window(&mut inner);

        match inner.state {
            CircuitState::Closed => {
                inner.counts.requests += 1;
            }
            CircuitState::HalfOpen => {
                inner.half_open_successes += 1;
                // 探测配额内全部成功，恢复为 Closed
                if inner.half_open_successes >= self.config.max_requests {
                    self.transition_to(&mut inner, CircuitState::Closed);
                }
            }
            CircuitState::Open => {
                // Open 状态不应有成功调用（不允许请求），忽略
            }
        }
    }

    /// 记录调用失败
    pub fn record_failure(&self) {
        let mut inner = self.inner.lock();
        self.maybe_reset_window(&mut inner);

        match inner.state {
            CircuitState::Closed => {
                inner.counts.requests += 1;
                inner.counts.total_failures += 1;

                if inner.counts.requests >= self.config.min_requests
                    && inner.counts.failure_ratio() >= self.config.failure_ratio
                {
                    self.transition_to(&mut inner, CircuitState::Open);
                }
            }
            CircuitState::HalfOpen => {
                // 半开状态下任一探测失败，立即重新跳闸
                self.transition_to(&mut inner, CircuitState::Open);
            }
            CircuitState::Open => {}
        }
    }

    /// 执行受熔断器保护的异步调用
    ///
    /// 如果熔断器跳闸则返回 Err(Open)，否则执行 f 并根据结果更新状态。
    pub async fn call<F, Fut, T, E>(&self, f: F) -> Result<T, CircuitBreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<T, E>>,
    {
        if !self.allow_request() {
            metrics::counter!(
                "circuit_breaker_rejections_total",
                "name" => self.config.name.clone()
            )
            .increment(1);
            return Err(CircuitBreakerError::Open {
                name: self.config.name.clone(),
            });
        }

        match f().await {
            Ok(result) => {
                self.record_success();
                Ok(result)
            }
            Err(e) => {
                self.record_failure();
                Err(CircuitBreakerError::Service(e))
            }
        }
    }

    /// Closed 状态下窗口到期清零计数（在锁内调用）
    fn maybe_reset_window(&self, inner: &mut InnerState) {
        if inner.state == CircuitState::Closed
            && inner.window_started_at.elapsed() >= self.config.interval
        {
            inner.counts.reset();
            inner.window_started_at = Instant::now();
        }
    }

    /// 状态转换（在锁内调用）
    fn transition_to(&self, inner: &mut InnerState, new_state: CircuitState) {
        let old_state = inner.state;
        inner.state = new_state;

        match new_state {
            CircuitState::Open => {
                inner.opened_at = Some(Instant::now());
                warn!(
                    name = %self.config.name,
                    from = %old_state,
                    requests = inner.counts.requests,
                    failures = inner.counts.total_failures,
                    "熔断器跳闸：后续请求将被拒绝直到恢复窗口到期"
                );
            }
            CircuitState::HalfOpen => {
                inner.half_open_attempts = 0;
                inner.half_open_successes = 0;
                info!(
                    name = %self.config.name,
                    permits = self.config.max_requests,
                    "熔断器进入半开状态：允许探测请求"
                );
            }
            CircuitState::Closed => {
                inner.counts.reset();
                inner.window_started_at = Instant::now();
                inner.opened_at = None;
                info!(name = %self.config.name, "熔断器恢复：下游已恢复正常");
            }
        }

        metrics::counter!(
            "circuit_breaker_transitions_total",
            "name" => self.config.name.clone(),
            "from" => old_state.to_string(),
            "to" => new_state.to_string()
        )
        .increment(1);
    }
}

/// 熔断器错误
#[derive(Debug)]
pub enum CircuitBreakerError<E> {
    /// 熔断器跳闸，请求被拒绝
    Open { name: String },
    /// 底层服务调用失败
    Service(E),
}

impl<E: std::fmt::Display> std::fmt::Display for CircuitBreakerError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Open { name } => write!(f, "熔断器 '{}' 处于跳闸状态，请求被拒绝", name),
            Self::Service(e) => write!(f, "{}", e),
        }
    }
}

impl<E: std::fmt::Display + std::fmt::Debug> std::error::Error for CircuitBreakerError<E> {}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            max_requests: 2,
            interval: Duration::from_secs(5),
            timeout: Duration::from_millis(100),
            min_requests: 5,
            failure_ratio: 0.6,
            name: "test".to_string(),
        }
    }

    #[test]
    fn test_initial_state_is_closed() {
        let cb = CircuitBreaker::new(test_config());
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());
    }

    #[test]
    fn test_trips_on_failure_ratio() {
        let cb = CircuitBreaker::new(test_config());

        // 2 成功 + 3 失败 = 5 请求，失败率 0.6，应跳闸
        cb.record_success();
        cb.record_success();
        cb.record_failure();
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Closed); // 4 请求，未达最小请求数
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_no_trip_below_min_requests() {
        let cb = CircuitBreaker::new(test_config());

        // 4 次全失败，请求数不足 5，不应跳闸
        for _ in 0..4 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Closed);
        assert!(cb.allow_request());

        // 第 5 次失败后达到条件（5 请求，失败率 1.0）
        cb.record_failure();
        assert_eq!(cb.state(), CircuitState::Open);
    }

    #[test]
    fn test_no_trip_below_failure_ratio() {
        let cb = CircuitBreaker::new(test_config());

        // 6 请求中 2 失败，失败率 0.33 < 0.6，不应跳闸
        for _ in 0..4 {
            cb.record_success();
        }
        cb.record_failure();
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_window_reset_clears_counts() {
        let config = CircuitBreakerConfig {
            interval: Duration::from_millis(50),
            ..test_config()
        };
        let cb = CircuitBreaker::new(config);

        // 窗口内积累 4 次失败
        for _ in 0..4 {
            cb.record_failure();
        }

        // 等窗口到期，计数清零
        std::thread::sleep(Duration::from_millis(80));
        cb.record_failure();

        // 新窗口内只有 1 次失败，不满足最小请求数
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_recovery_to_half_open() {
        let cb = CircuitBreaker::new(test_config());

        for _ in 0..5 {
            cb.record_failure();
        }
        assert_eq!(cb.state(), CircuitState::Open);

        std::thread::sleep(Duration::from_millis(150));

        assert!(cb.allow_request());
        assert_eq!(cb.state(), CircuitState::HalfOpen);
    }

    #[test]
    fn test_half_open_probe_quota() {
        let cb = CircuitBreaker::new(test_config());

        for _ in 0..5 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(150));

        // max_requests = 2：两个探测放行，第三个拒绝
        assert!(cb.allow_request());
        assert!(cb.allow_request());
        assert!(!cb.allow_request());
    }

    #[test]
    fn test_half_open_recovery() {
        let cb = CircuitBreaker::new(test_config());

        for _ in 0..5 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(150));

        assert!(cb.allow_request());
        cb.record_success();
        assert!(cb.allow_request());
        cb.record_success();

        // 两次探测全部成功（max_requests = 2），恢复为 Closed
        assert_eq!(cb.state(), CircuitState::Closed);
    }

    #[test]
    fn test_half_open_failure_trips_again() {
        let cb = CircuitBreaker::new(test_config());

        for _ in 0..5 {
            cb.record_failure();
        }
        std::thread::sleep(Duration::from_millis(150));

        assert!(cb.allow_request());
        cb.record_failure();

        assert_eq!(cb.state(), CircuitState::Open);
        assert!(!cb.allow_request());
    }

    #[tokio::test]
    async fn test_call_wrapper() {
        let cb = CircuitBreaker::new(test_config());

        let result: Result<i32, CircuitBreakerError<String>> = cb.call(|| async { Ok(42) }).await;
        assert_eq!(result.unwrap(), 42);

        for _ in 0..5 {
            let _: Result<i32, CircuitBreakerError<String>> = cb
                .call(|| async { Err("service down".to_string()) })
                .await;
        }

        // 熔断器跳闸后应返回 Open 错误
        let result: Result<i32, CircuitBreakerError<String>> = cb.call(|| async { Ok(42) }).await;
        assert!(matches!(result, Err(CircuitBreakerError::Open { .. })));
    }

    #[test]
    fn test_config_builder() {
        let config = CircuitBreakerConfig::new("grpc-identity")
            .with_max_requests(5)
            .with_interval(Duration::from_secs(10))
            .with_timeout(Duration::from_secs(60));

        assert_eq!(config.name, "grpc-identity");
        assert_eq!(config.max_requests, 5);
        assert_eq!(config.interval, Duration::from_secs(10));
        assert_eq!(config.timeout, Duration::from_secs(60));
    }

    #[test]
    fn test_display_circuit_breaker_error() {
        let err: CircuitBreakerError<String> = CircuitBreakerError::Open {
            name: "test".to_string(),
        };
        assert!(err.to_string().contains("跳闸"));

        let err: CircuitBreakerError<String> =
            CircuitBreakerError::Service("connection refused".to_string());
        assert_eq!(err.to_string(), "connection refused");
    }
}
