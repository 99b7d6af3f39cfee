/// Postgres connection pool and schema migrations
///
/// # Modules
///
/// - `pool`: Pool construction, health checks and shutdown
/// - `migrations`: Embedded schema migrations
///
/// Most callers go through [`crate::store::postgres::PgStore::connect`], which
/// uses both.

pub mod migrations;
pub mod pool;
