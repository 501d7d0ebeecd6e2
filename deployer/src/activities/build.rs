use async_trait::async_trait;
use mlg_common::models::BuildPack;
use mlg_common::{Error, ErrorKind};
use mlg_workflow::{Task, TaskResult};
use tracing::info;

use crate::clients::{BuildRequest, HttpBuildLogger};
use crate::ctx::ActivityCtx;

const CADDY_STATIC_DOCKERFILE: &str = "FROM caddy:2-alpine\nWORKDIR /srv\nCOPY . .\nEXPOSE 8080\nCMD [\"caddy\", \"file-server\", \"--listen\", \":8080\", \"--root\", \"/srv\"]\n";

/// Step 5 of `CreateService` (§4.1.2): drives BuildKit through one of three flavors
/// selected by the resolved build pack. All three share the `<registry>/cache/<ns>/<svc>`
/// import/export cache ref and stream progress through the build-log sidecar.
pub struct BuildImage;

#[async_trait]
impl Task<ActivityCtx> for BuildImage {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let (source_path, image_ref, namespace, service_name, build_pack, publish_directory, dockerfile_path) = {
            let scratch = ctx.scratch.lock().await;
            let Some(source_path) = scratch.source_path.clone() else {
                return TaskResult::Err(Error::custom(ErrorKind::SourceMissing, "build-image ran with no source tree"));
            };
            let Some(image_ref) = scratch.image_ref.clone() else {
                return TaskResult::Err(Error::custom(ErrorKind::SourceMissing, "build-image ran before the image ref was resolved"));
            };
            let Some(namespace) = scratch.namespace.clone() else {
                return TaskResult::Err(Error::custom(ErrorKind::SourceMissing, "build-image ran before the namespace was resolved"));
            };
            let Some(service_name) = scratch.service_name.clone() else {
                return TaskResult::Err(Error::custom(ErrorKind::SourceMissing, "build-image ran before the service name was resolved"));
            };
            let Some(build_pack) = scratch.build_pack else {
                return TaskResult::Err(Error::custom(ErrorKind::SourceMissing, "build-image ran before the build pack was resolved"));
            };
            let publish_directory = scratch
                .build_config
                .as_ref()
                .and_then(|c| c.publish_directory.clone());
            let dockerfile_path = scratch
                .build_config
                .as_ref()
                .and_then(|c| c.dockerfile_path.clone())
                .unwrap_or_else(|| "Dockerfile".to_string());
            (source_path, image_ref, namespace, service_name, build_pack, publish_directory, dockerfile_path)
        };

        let cache_ref = format!("{}/cache/{namespace}/{service_name}:buildcache", ctx.config.registry_host);
        let logger = HttpBuildLogger::new(ctx.config.log_ingest_url.clone(), service_name.clone(), namespace.clone());

        let result = match build_pack {
            BuildPack::Static => {
                let publish_dir = publish_directory.unwrap_or_default();
                let build_root = source_path.join(&publish_dir);
                let dockerfile_on_disk = build_root.join("Dockerfile");
                if let Err(err) = tokio::fs::write(&dockerfile_on_disk, CADDY_STATIC_DOCKERFILE).await {
                    return TaskResult::Err(err.into());
                }
                logger.log("Synthesizing Caddy-based static Dockerfile...");
                ctx.buildkit
                    .solve(
                        BuildRequest {
                            source_path: &build_root,
                            dockerfile_path: &dockerfile_on_disk,
                            image_ref: &image_ref,
                            cache_ref: &cache_ref,
                        },
                        &logger,
                    )
                    .await
            }
            BuildPack::Dockerfile => {
                logger.log("Building image from Dockerfile with BuildKit...");
                ctx.buildkit
                    .solve(
                        BuildRequest {
                            source_path: &source_path,
                            dockerfile_path: &source_path.join(&dockerfile_path),
                            image_ref: &image_ref,
                            cache_ref: &cache_ref,
                        },
                        &logger,
                    )
                    .await
            }
            // Railpack / Nixpacks: a real build-plan-generation step would run here before
            // handing the plan to BuildKit; the BuildKit client trait hides that behind
            // the same `solve` entry point since this crate stands it in regardless.
            BuildPack::Railpack | BuildPack::Nixpacks => {
                logger.log("Generating build plan with railpack...");
                ctx.buildkit
                    .solve(
                        BuildRequest {
                            source_path: &source_path,
                            dockerfile_path: &source_path.join("Dockerfile"),
                            image_ref: &image_ref,
                            cache_ref: &cache_ref,
                        },
                        &logger,
                    )
                    .await
            }
            BuildPack::Auto => unreachable!("ResolveBuildContext always canonicalizes auto to a concrete build pack"),
        };

        match result {
            Ok(()) => {
                logger.log(&format!("BUILD SUCCESS: {image_ref}"));
                logger.flush();
                info!(%image_ref, %build_pack, "build completed");
                TaskResult::Done(())
            }
            Err(err) => {
                logger.log(&format!("BUILD FAILED: {err}"));
                logger.flush();
                TaskResult::Err(Error::custom(ErrorKind::BuildFailure, err.to_string()))
            }
        }
    }
}
