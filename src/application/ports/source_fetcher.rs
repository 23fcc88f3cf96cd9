use async_trait::async_trait;

use crate::db::models::Project;
use crate::error::Result;

/// Ensures `<projectsRoot>/<project.id>` contains a checkout of
/// `project.branch` at the remote tip: clones on first use, fetches and
/// hard-resets on every use after.
#[async_trait]
pub trait SourceFetcher: Send + Sync {
    async fn prepare_source(&self, project: &Project) -> Result<()>;
}
