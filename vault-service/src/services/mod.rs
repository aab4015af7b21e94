pub mod accounts;
pub mod database;
pub mod files;
pub mod jwt;
pub mod memory;
pub mod metrics;
pub mod search;
pub mod storage;
pub mod users;

pub use database::MongoDb;
pub use files::{FileStore, MongoFileStore, TypeBreakdown};
pub use jwt::{TokenClaims, TokenCodec};
pub use memory::{InMemoryFileStore, InMemoryUserStore};
pub use search::FileQuery;
pub use storage::{InMemoryStorage, LocalStorage, LocalUrlSigner, ObjectStore, S3Storage};
pub use users::{MongoUserStore, UserFilter, UserStore};
