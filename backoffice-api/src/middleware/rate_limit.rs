/// Rate limiting for public endpoints
///
/// Public inquiry submissions are limited per client IP with a token bucket
/// kept in Redis, so every API instance shares the same budget.
///
/// # Algorithm
///
/// - The bucket holds `INQUIRY_RATE_LIMIT` tokens and refills at that many
///   tokens per minute
/// - Each request consumes 1 token
/// - Request blocked with 429 if the bucket is empty
///
/// # Storage
///
/// Keys: `ratelimit:inquiries:{client_ip}`, TTL 2 minutes.
///
/// When Redis is unreachable the request is let through and a warning is
/// logged; an outage of the limiter never takes the contact form down.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per minute
/// - `X-RateLimit-Remaining`: Tokens remaining
/// - `Retry-After`: Seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::net::SocketAddr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds a bucket survives without traffic
const BUCKET_TTL_SECS: u64 = 120;

/// Rate limit configuration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum requests per minute
    pub requests_per_minute: u32,

    /// Token refill rate (tokens per second)
    pub refill_rate: f64,

    /// Maximum tokens in bucket (burst capacity)
    pub bucket_capacity: u32,
}

impl RateLimit {
    pub fn per_minute(requests_per_minute: u32) -> Self {
        let requests_per_minute = requests_per_minute.max(1);
        RateLimit {
            requests_per_minute,
            refill_rate: f64::from(requests_per_minute) / 60.0,
            bucket_capacity: requests_per_minute,
        }
    }
}

/// Token bucket arithmetic, mirrored by the Lua script below
#[derive(Debug, Clone, PartialEq)]
struct TokenBucket {
    tokens: f64,

    /// Last refill timestamp (Unix seconds)
    last_refill: u64,
}

impl TokenBucket {
    fn full(capacity: u32, now: u64) -> Self {
        TokenBucket {
            tokens: f64::from(capacity),
            last_refill: now,
        }
    }

    fn refill(&mut self, limit: &RateLimit, now: u64) {
        let elapsed_secs = now.saturating_sub(self.last_refill) as f64;
        self.tokens = (self.tokens + elapsed_secs * limit.refill_rate)
            .min(f64::from(limit.bucket_capacity));
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn seconds_until_available(&self, limit: &RateLimit) -> u64 {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / limit.refill_rate).ceil() as u64
        }
    }
}

/// Result of rate limit check
#[derive(Debug, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Tokens remaining
    pub remaining: u32,

    /// Seconds until a token is available
    pub retry_after: u64,
}

/// Best-effort client address
///
/// Prefers the first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// socket peer address.
pub fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    let forwarded = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    let real_ip = headers
        .get("x-real-ip")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty());

    forwarded
        .or(real_ip)
        .map(str::to_string)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Client address of a request, `"unknown"` when none can be determined
pub fn request_client_ip(request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    client_ip(request.headers(), peer).unwrap_or_else(|| "unknown".to_string())
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Rate limiting middleware for public inquiry submissions
///
/// # Errors
///
/// - 429 Too Many Requests: Rate limit exceeded
pub async fn inquiry_rate_limit(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limit = RateLimit::per_minute(state.config.rate_limit.inquiries_per_minute);
    let client = request_client_ip(&request);
    let key = format!("ratelimit:inquiries:{}", client);

    let result = match check_rate_limit_redis(&state.redis, &key, limit).await {
        Ok(result) => result,
        Err(e) => {
            tracing::warn!(error = %e, client = %client, "Rate limiter unavailable, allowing request");
            RateLimitResult {
                ok: true,
                remaining: limit.bucket_capacity,
                retry_after: 0,
            }
        }
    };

    if !result.ok {
        tracing::info!(client = %client, retry_after = result.retry_after, "Inquiry rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Too many submissions. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "X-RateLimit-Limit",
        HeaderValue::from(limit.requests_per_minute),
    );
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}

/// Checks and consumes one token atomically in Redis
///
/// The Lua script applies the same arithmetic as [`TokenBucket`].
async fn check_rate_limit_redis(
    client: &redis::Client,
    key: &str,
    limit: RateLimit,
) -> Result<RateLimitResult, redis::RedisError> {
    let mut conn = client.get_multiplexed_async_connection().await?;

    let script = redis::Script::new(
        r#"
        local key = KEYS[1]
        local capacity = tonumber(ARGV[1])
        local refill_rate = tonumber(ARGV[2])
        local now = tonumber(ARGV[3])
        local ttl = tonumber(ARGV[4])

        local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
        local tokens = tonumber(bucket[1])
        local last_refill = tonumber(bucket[2])

        if not tokens then
            tokens = capacity
            last_refill = now
        end

        local elapsed = math.max(0, now - last_refill)
        tokens = math.min(capacity, tokens + (elapsed * refill_rate))

        if tokens >= 1 then
            tokens = tokens - 1
            redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
            redis.call('EXPIRE', key, ttl)
            return {1, math.floor(tokens), 0}
        else
            redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
            redis.call('EXPIRE', key, ttl)
            return {0, 0, math.ceil((1 - tokens) / refill_rate)}
        end
        "#,
    );

    let result: Vec<i64> = script
        .key(key)
        .arg(limit.bucket_capacity)
        .arg(limit.refill_rate)
        .arg(unix_now())
        .arg(BUCKET_TTL_SECS)
        .invoke_async(&mut conn)
        .await?;

    Ok(RateLimitResult {
        ok: result.first() == Some(&1),
        remaining: result.get(1).copied().unwrap_or(0).max(0) as u32,
        retry_after: result.get(2).copied().unwrap_or(0).max(0) as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rate_limit_per_minute() {
        let limit = RateLimit::per_minute(5);
        assert_eq!(limit.requests_per_minute, 5);
        assert_eq!(limit.bucket_capacity, 5);
        assert!((limit.refill_rate - 5.0 / 60.0).abs() < 1e-9);

        assert_eq!(RateLimit::per_minute(0).bucket_capacity, 1);
    }

    #[test]
    fn test_token_bucket_exhausts_then_waits() {
        let limit = RateLimit::per_minute(5);
        let mut bucket = TokenBucket::full(limit.bucket_capacity, 1_000);

        for _ in 0..5 {
            assert!(bucket.try_consume());
        }
        assert!(!bucket.try_consume());

        // one token every 12 seconds
        assert_eq!(bucket.seconds_until_available(&limit), 12);

        bucket.refill(&limit, 1_012);
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
    }

    #[test]
    fn test_token_bucket_refill_capped() {
        let limit = RateLimit::per_minute(60);
        let mut bucket = TokenBucket {
            tokens: 55.0,
            last_refill: 100,
        };

        bucket.refill(&limit, 200);
        assert_eq!(bucket.tokens, 60.0);
    }

    #[test]
    fn test_token_bucket_ignores_clock_going_backwards() {
        let limit = RateLimit::per_minute(60);
        let mut bucket = TokenBucket {
            tokens: 3.0,
            last_refill: 500,
        };

        bucket.refill(&limit, 400);
        assert_eq!(bucket.tokens, 3.0);
    }

    #[test]
    fn test_client_ip_precedence() {
        let peer: SocketAddr = "10.0.0.9:5000".parse().unwrap();

        let mut headers = HeaderMap::new();
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("10.0.0.9"));
        assert_eq!(client_ip(&headers, None), None);

        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.7"));
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("198.51.100.7"));

        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.5, 10.0.0.1"),
        );
        assert_eq!(client_ip(&headers, Some(peer)).as_deref(), Some("203.0.113.5"));
    }
}
