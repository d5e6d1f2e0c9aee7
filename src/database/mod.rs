pub mod manager;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;

pub use manager::{DatabaseError, DatabaseManager};
pub use memory::MemoryAccountStore;
pub use models::{Account, AccountPatch, NewAccount};
pub use postgres::PgAccountStore;
pub use store::{AccountStore, StoreError};
