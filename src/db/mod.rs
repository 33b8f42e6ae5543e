//! Document store: MongoDB client and schemas

pub mod mongo;
pub mod schemas;

pub use mongo::{IntoIndexes, MongoClient, MongoCollection, MutMetadata};
