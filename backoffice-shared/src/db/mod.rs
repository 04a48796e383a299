/// Database layer
///
/// - `pool`: PostgreSQL connection pool management with health checks
/// - `migrations`: Embedded migration runner
///
/// Models live in the crate-level `models` module.

pub mod migrations;
pub mod pool;
