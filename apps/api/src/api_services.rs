mod database;
mod redis;
mod session_purge;
mod state_builder;

pub use database::connect_and_migrate;
pub use redis::build_redis_client;
pub use session_purge::spawn_session_purge;
pub use state_builder::build_app_state;
