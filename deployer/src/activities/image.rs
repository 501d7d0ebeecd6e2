use async_trait::async_trait;
use mlg_common::{Error, ErrorKind};
use mlg_registry::ImageRef;
use mlg_workflow::{Task, TaskResult};
use tracing::info;

use crate::ctx::ActivityCtx;

/// Step 4 of `CreateService` (§4.1.2, §4.3): probes the registry for the computed tag.
/// When it already exists, `BuildImage`/`CleanupSource` are skipped by the workflow body.
pub struct ImageExists;

#[async_trait]
impl Task<ActivityCtx> for ImageExists {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let image_ref = match ctx.scratch.lock().await.image_ref.clone() {
            Some(image_ref) => image_ref,
            None => {
                return TaskResult::Err(Error::custom(
                    ErrorKind::SourceMissing,
                    "image-exists ran before the build context was resolved",
                ))
            }
        };

        let parsed = match ImageRef::parse(&image_ref) {
            Ok(parsed) => parsed,
            Err(err) => return TaskResult::Err(Error::custom(ErrorKind::SourceMissing, err.to_string())),
        };

        match ctx.registry.image_exists(&parsed).await {
            Ok(exists) => {
                info!(%image_ref, exists, "probed registry for existing image");
                ctx.scratch.lock().await.image_already_exists = exists;
                TaskResult::Done(())
            }
            Err(err) => TaskResult::Err(err),
        }
    }
}
