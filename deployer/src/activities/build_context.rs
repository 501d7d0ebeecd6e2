use async_trait::async_trait;
use mlg_backends::naming::{namespace_name, service_name};
use mlg_common::models::{BuildPack, EnvVar};
use mlg_common::{Error, ErrorKind};
use mlg_registry::derive_tag;
use mlg_workflow::{Task, TaskResult};
use tracing::info;

use crate::ctx::ActivityCtx;
use crate::port::{effective_app_port, extract_port_from_dockerfile};

/// Step 3 of `CreateService` (§4.1.2).
pub struct ResolveBuildContext {
    pub service_id: String,
    pub user_handle: String,
}

#[async_trait]
impl Task<ActivityCtx> for ResolveBuildContext {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let service = match ctx.services.get_by_id(&self.service_id).await {
            Ok(service) => service,
            Err(err) => return TaskResult::Err(err),
        };

        let project = match ctx.projects.get_by_id(&service.project_id).await {
            Ok(project) => project,
            Err(err) => return TaskResult::Err(err),
        };

        let source_path = match ctx.scratch.lock().await.source_path.clone() {
            Some(path) => path,
            None => {
                return TaskResult::Err(Error::custom(
                    ErrorKind::SourceMissing,
                    "resolve-build-context ran before a source tree was cloned",
                ))
            }
        };

        let dockerfile_path = source_path.join(
            service
                .build_config
                .dockerfile_path
                .clone()
                .unwrap_or_else(|| "Dockerfile".to_string()),
        );
        let has_dockerfile = tokio::fs::metadata(&dockerfile_path).await.is_ok();

        let build_pack = match service.build_pack {
            BuildPack::Dockerfile => {
                if !has_dockerfile {
                    return TaskResult::Err(Error::custom(
                        ErrorKind::SourceMissing,
                        "build pack is 'dockerfile' but no Dockerfile found in repo",
                    ));
                }
                BuildPack::Dockerfile
            }
            BuildPack::Auto => {
                if has_dockerfile {
                    BuildPack::Dockerfile
                } else {
                    BuildPack::Railpack
                }
            }
            other => other.canonical(),
        };

        let namespace = namespace_name(&self.user_handle, &project.ref_);
        let svc_name = service_name(&service.name);

        let mut port = effective_app_port(
            build_pack,
            service.port,
            service.build_config.publish_directory.as_deref(),
        );
        if build_pack == BuildPack::Dockerfile && service.port.is_none() {
            if let Ok(contents) = tokio::fs::read_to_string(&dockerfile_path).await {
                if let Some(exposed) = extract_port_from_dockerfile(&contents) {
                    port = exposed;
                }
            }
        }

        let mut env = service.env.clone();
        env.retain(|e| e.key != "PORT");
        env.push(EnvVar {
            key: "PORT".to_string(),
            value: port.to_string(),
            build_time: false,
        });

        let commit_sha = match ctx.scratch.lock().await.commit_sha.clone() {
            Some(sha) => sha,
            None => {
                return TaskResult::Err(Error::custom(
                    ErrorKind::SourceMissing,
                    "resolve-build-context ran before a commit SHA was recorded",
                ))
            }
        };
        let short_sha: String = commit_sha.chars().take(7).collect();
        let tag = derive_tag(&short_sha, build_pack, &service.build_config);
        let image_ref = format!("{}/{namespace}/{svc_name}:{tag}", ctx.config.registry_host);

        info!(service_id = %self.service_id, %namespace, name = %svc_name, %build_pack, %image_ref, "resolved build context");

        let mut scratch = ctx.scratch.lock().await;
        scratch.build_pack = Some(build_pack);
        scratch.build_config = Some(service.build_config);
        scratch.namespace = Some(namespace);
        scratch.service_name = Some(svc_name);
        scratch.port = Some(port);
        scratch.env = env;
        scratch.image_ref = Some(image_ref);
        scratch.commit_sha = Some(short_sha);
        TaskResult::Done(())
    }
}
