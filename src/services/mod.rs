//! Persistence services behind the route handlers
//!
//! Each store has a MongoDB implementation for production and an in-memory
//! implementation for dev mode and tests.

pub mod exchanges;
pub mod users;

pub use exchanges::{parse_id, ExchangeStore, MemoryExchangeStore, MongoExchangeStore};
pub use users::{MemoryUserStore, MongoUserStore, UserListQuery, UserStore};
