//! Repository implementations using SQLite.

mod resource_repository;

pub use resource_repository::SqliteResourceStore;
