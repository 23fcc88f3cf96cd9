pub mod sqlite_repo;

pub use sqlite_repo::{SqliteDeploymentRepository, SqliteProjectRepository};
