/// Middleware modules for the API server
///
/// - `security`: Security response headers
/// - `rate_limit`: Redis token bucket for public submissions

pub mod rate_limit;
pub mod security;
