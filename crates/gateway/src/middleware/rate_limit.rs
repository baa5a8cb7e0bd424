//! 按客户端 IP 限流
//!
//! 固定窗口计数：每个 IP 在 5 秒窗口内最多 20 个请求，超出返回
//! HTTP 429。计数器放在进程内 DashMap（网关无 Redis 依赖），
//! 多实例部署时限额按实例生效。

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::Json;
use axum::body::Body;
use axum::extract::{ConnectInfo, State};
use axum::http::{Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use dashmap::DashMap;
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

/// 窗口内允许的最大请求数
const MAX_REQUESTS: u32 = 20;
/// 窗口长度
const WINDOW: Duration = Duration::from_secs(5);

/// 单个 IP 的窗口计数
struct WindowCounter {
    window_started_at: Instant,
    count: u32,
}

/// 固定窗口限流器
#[derive(Clone, Default)]
pub struct RateLimiter {
    counters: Arc<DashMap<IpAddr, WindowCounter>>,
}

impl RateLimiter {
    /// 记录一次请求，返回是否放行
    pub fn check(&self, ip: IpAddr) -> bool {
        let mut entry = self.counters.entry(ip).or_insert_with(|| WindowCounter {
            window_started_at: Instant::now(),
            count: 0,
        });

        if entry.window_started_at.elapsed() >= WINDOW {
            entry.window_started_at = Instant::now();
            entry.count = 0;
        }

        entry.count += 1;
        entry.count <= MAX_REQUESTS
    }
}

/// 限流中间件，放在所有路由最外层
pub async fn rate_limit_middleware(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !state.rate_limiter.check(addr.ip()) {
        warn!(client_ip = %addr.ip(), "客户端请求频率超限");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({"error": "Too many requests. Try again later."})),
        )
            .into_response();
    }

    next.run(request).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(last: u8) -> IpAddr {
        IpAddr::from([127, 0, 0, last])
    }

    #[test]
    fn test_allows_up_to_limit() {
        let limiter = RateLimiter::default();

        for _ in 0..MAX_REQUESTS {
            assert!(limiter.check(ip(1)));
        }
        // 第 21 个请求被拒绝
        assert!(!limiter.check(ip(1)));
    }

    #[test]
    fn test_limits_are_per_ip() {
        let limiter = RateLimiter::default();

        for _ in 0..=MAX_REQUESTS {
            limiter.check(ip(1));
        }
        assert!(!limiter.check(ip(1)));

        // 另一个 IP 不受影响
        assert!(limiter.check(ip(2)));
    }

    #[test]
    fn test_window_constants() {
        assert_eq!(MAX_REQUESTS, 20);
        assert_eq!(WINDOW, Duration::from_secs(5));
    }
}
