//! The deployment service facade (§4.4): a thin, synchronous API surface consumed by
//! webhook handlers and (eventually) MCP/GraphQL resolvers in the `gateway` crate. Every
//! operation here either resolves a name/ref against the database or starts one of the
//! five workflows and returns immediately — none of it waits for a workflow to finish.

use std::sync::Arc;

use mlg_common::models::{BuildConfig, BuildPack, EnvVar, GitProvider, Project, Service};
use mlg_common::{Error, ErrorKind};
use mlg_workflow::{new_run_id, ReusePolicy, WorkflowEngine};

use crate::ctx::ActivityCtx;
use crate::workflows::{
    attach_custom_domain_workflow, create_service_workflow, delete_service_workflow,
    detach_custom_domain_workflow, redeploy_service_workflow, redeploy_workflow_id, AttachCustomDomainInput,
    CreateServiceInput, DeleteServiceInput, DetachCustomDomainInput, RedeployServiceInput,
};

pub struct CreateAppInput {
    pub user_id: String,
    pub user_handle: String,
    /// `None` resolves (or creates) the user's `default` project; `Some` resolves (or
    /// creates) the project with that ref.
    pub project_ref: Option<String>,
    pub name: String,
    pub repo: String,
    pub branch: String,
    pub provider: GitProvider,
    pub build_pack: BuildPack,
    pub build_config: BuildConfig,
    pub port: Option<u16>,
    pub env: Vec<EnvVar>,
}

pub struct CreateAppResult {
    pub service_id: String,
    pub name: String,
    pub status: &'static str,
    pub workflow_id: String,
}

pub struct DeleteAppInput {
    pub user_id: String,
    pub user_handle: String,
    pub name: String,
    pub project_ref: Option<String>,
}

/// Owns the long-lived `WorkflowEngine` and the shared `ActivityCtx` template every
/// workflow run clones its scratch pad from.
#[derive(Clone)]
pub struct DeploymentFacade {
    engine: Arc<WorkflowEngine>,
    ctx: ActivityCtx,
}

impl DeploymentFacade {
    pub fn new(engine: Arc<WorkflowEngine>, ctx: ActivityCtx) -> Self {
        Self { engine, ctx }
    }

    async fn resolve_project(&self, user_id: &str, project_ref: Option<&str>) -> Result<Project, Error> {
        match project_ref {
            None => self.ctx.projects.get_or_create_default(user_id).await,
            Some(ref_) => match self.ctx.projects.get_by_ref(user_id, ref_).await? {
                Some(project) => Ok(project),
                None => {
                    let project = Project {
                        id: uuid::Uuid::new_v4().to_string(),
                        user_id: user_id.to_string(),
                        name: ref_.to_string(),
                        ref_: ref_.to_string(),
                    };
                    self.ctx.projects.create(&project).await?;
                    Ok(project)
                }
            },
        }
    }

    /// `CreateApp(input)` — validates, resolves or auto-creates the project by ref, mints
    /// a service ID, starts `CreateService`, returns `{serviceID, name, status=queued, workflowID}`.
    pub async fn create_app(&self, input: CreateAppInput) -> Result<CreateAppResult, Error> {
        let project = self.resolve_project(&input.user_id, input.project_ref.as_deref()).await?;
        let service_id = Service::short_id();
        let workflow_id = crate::workflows::create_service_workflow_id(&input.user_handle, &input.repo, &input.branch);
        let run_id = new_run_id();

        let task = create_service_workflow(CreateServiceInput {
            service_id: service_id.clone(),
            user_id: input.user_id,
            user_handle: input.user_handle,
            project_id: project.id,
            name: input.name.clone(),
            repo: input.repo,
            branch: input.branch,
            provider: input.provider,
            build_pack: input.build_pack,
            build_config: input.build_config,
            port: input.port,
            env: input.env,
            expected_commit_sha: None,
            workflow_id: workflow_id.clone(),
            run_id: run_id.clone(),
        });

        let started = self
            .engine
            .start(workflow_id, ReusePolicy::StartFresh, run_id, self.ctx.for_new_run(), task)
            .await?;

        Ok(CreateAppResult {
            service_id,
            name: input.name,
            status: "queued",
            workflow_id: started.workflow_id,
        })
    }

    /// Finds services matching `(repo, branch, provider)`, for webhook push dispatch.
    pub async fn find_services_by_repo_branch(
        &self,
        repo: &str,
        branch: &str,
        provider: GitProvider,
    ) -> Result<Vec<Service>, Error> {
        self.ctx.services.find_by_repo_branch_provider(repo, branch, provider).await
    }

    /// `ListApps(userID, limit, offset)` — paginated listing.
    pub async fn list_apps(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<Service>, Error> {
        self.ctx.services.list_for_user(user_id, limit, offset).await
    }

    /// `GetAppByNameAndProject` — name resolution within a tenant's named project.
    pub async fn get_app_by_name_and_project(&self, project_id: &str, name: &str) -> Result<Service, Error> {
        self.ctx.services.get_by_name_and_project(project_id, name).await
    }

    /// `GetAppByNameAndUserProject` — name resolution against the caller's default project.
    pub async fn get_app_by_name_and_user_project(&self, user_id: &str, name: &str) -> Result<Service, Error> {
        let project = self.ctx.projects.get_or_create_default(user_id).await?;
        self.ctx.services.get_by_name_and_project(&project.id, name).await
    }

    /// `RedeployApp(serviceID, externalID)` — ad-hoc redeploy with a fresh random
    /// workflow ID, no dedup.
    pub async fn redeploy_app(&self, service_id: &str, user_handle: &str) -> Result<String, Error> {
        let workflow_id = format!("redeploy-{service_id}-{}", uuid::Uuid::new_v4());
        self.start_redeploy(workflow_id, ReusePolicy::StartFresh, service_id, user_handle, None)
            .await
    }

    /// `RedeployFromGitHubPush(serviceID, externalID, afterSHA, deliveryID?)`.
    pub async fn redeploy_from_github_push(
        &self,
        service_id: &str,
        user_handle: &str,
        after_sha: Option<&str>,
        delivery_id: Option<&str>,
    ) -> Result<String, Error> {
        let workflow_id = redeploy_workflow_id(service_id, after_sha, delivery_id);
        self.start_redeploy(
            workflow_id,
            ReusePolicy::RejectDuplicate,
            service_id,
            user_handle,
            after_sha,
        )
        .await
    }

    /// `RedeployFromInternalGitPush(serviceID, externalID, afterSHA, deliveryID?)`.
    pub async fn redeploy_from_internal_git_push(
        &self,
        service_id: &str,
        user_handle: &str,
        after_sha: Option<&str>,
        delivery_id: Option<&str>,
    ) -> Result<String, Error> {
        let workflow_id = redeploy_workflow_id(service_id, after_sha, delivery_id);
        self.start_redeploy(
            workflow_id,
            ReusePolicy::RejectDuplicate,
            service_id,
            user_handle,
            after_sha,
        )
        .await
    }

    async fn start_redeploy(
        &self,
        workflow_id: String,
        reuse_policy: ReusePolicy,
        service_id: &str,
        user_handle: &str,
        expected_commit_sha: Option<&str>,
    ) -> Result<String, Error> {
        let service = self.ctx.services.get_by_id(service_id).await?;
        let run_id = new_run_id();

        let task = redeploy_service_workflow(
            workflow_id.clone(),
            RedeployServiceInput {
                service_id: service.id,
                user_handle: user_handle.to_string(),
                repo: service.repo,
                branch: service.branch,
                provider: service.provider,
                expected_commit_sha: expected_commit_sha.map(str::to_string),
            },
        );

        // An `already-started` condition from the engine is swallowed per §4.4: the
        // caller gets back the existing workflow ID instead of an error.
        let started = self
            .engine
            .start(workflow_id, reuse_policy, run_id, self.ctx.for_new_run(), task)
            .await?;

        Ok(started.workflow_id)
    }

    /// `DeleteApp({name, project, userID})` — name-resolves the service, starts `DeleteService`.
    pub async fn delete_app(&self, input: DeleteAppInput) -> Result<String, Error> {
        let project = self.resolve_project(&input.user_id, input.project_ref.as_deref()).await?;
        let service = self.ctx.services.get_by_name_and_project(&project.id, &input.name).await?;

        let namespace = mlg_backends::naming::namespace_name(&input.user_handle, &project.ref_);
        let service_name = mlg_backends::naming::service_name(&service.name);
        let workflow_id = crate::workflows::delete_service_workflow_id(&service.id);

        let task = delete_service_workflow(
            workflow_id.clone(),
            DeleteServiceInput {
                service_id: service.id,
                namespace,
                service_name,
                fqdn: service.fqdn,
            },
        );

        let started = self
            .engine
            .start(workflow_id, ReusePolicy::StartFresh, new_run_id(), self.ctx.for_new_run(), task)
            .await?;

        Ok(started.workflow_id)
    }

    /// Attaches a custom domain, ending with `UpdateCustomDomainDBStatus(active)`.
    pub async fn attach_custom_domain(
        &self,
        service_id: &str,
        user_handle: &str,
        custom_domain_id: &str,
        domain: &str,
    ) -> Result<String, Error> {
        let service = self.ctx.services.get_by_id(service_id).await?;
        let project = self.ctx.projects.get_by_id(&service.project_id).await?;
        let namespace = mlg_backends::naming::namespace_name(user_handle, &project.ref_);
        let service_name = mlg_backends::naming::service_name(&service.name);
        let port = service.port.ok_or_else(|| Error::custom(ErrorKind::Conflict, "service has no resolved port yet"))?;

        let workflow_id = format!("attach-domain-{service_id}-{custom_domain_id}");
        let task = attach_custom_domain_workflow(
            workflow_id.clone(),
            AttachCustomDomainInput {
                custom_domain_id: custom_domain_id.to_string(),
                namespace,
                service_name,
                domain: domain.to_string(),
                port,
            },
        );

        let started = self
            .engine
            .start(workflow_id, ReusePolicy::StartFresh, new_run_id(), self.ctx.for_new_run(), task)
            .await?;
        Ok(started.workflow_id)
    }

    /// Detaches a custom domain, ending with `UpdateCustomDomainDBStatus(detached)`.
    pub async fn detach_custom_domain(
        &self,
        service_id: &str,
        user_handle: &str,
        custom_domain_id: &str,
    ) -> Result<String, Error> {
        let service = self.ctx.services.get_by_id(service_id).await?;
        let project = self.ctx.projects.get_by_id(&service.project_id).await?;
        let namespace = mlg_backends::naming::namespace_name(user_handle, &project.ref_);
        let service_name = mlg_backends::naming::service_name(&service.name);

        let workflow_id = format!("detach-domain-{service_id}-{custom_domain_id}");
        let task = detach_custom_domain_workflow(
            workflow_id.clone(),
            DetachCustomDomainInput {
                custom_domain_id: custom_domain_id.to_string(),
                namespace,
                service_name,
            },
        );

        let started = self
            .engine
            .start(workflow_id, ReusePolicy::StartFresh, new_run_id(), self.ctx.for_new_run(), task)
            .await?;
        Ok(started.workflow_id)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use mlg_common::ControlPlaneConfig;

    use super::*;
    use crate::clients::{LoggingBuildKitClient, LoggingDnsClient, LoggingKubernetesClient};
    use crate::dal::{DeploymentsDal, InternalReposDal, ServicesDal};
    use mlg_common::models::{BuildStatus, Deployment, InternalRepo};
    use mlg_registry::RegistryClient;

    /// An in-memory `ProjectsDal` keyed by `(user_id, ref_)`, just enough for exercising
    /// [`DeploymentFacade::resolve_project`] without a database.
    #[derive(Default)]
    struct FakeProjectsDal {
        by_ref: Mutex<std::collections::HashMap<(String, String), Project>>,
    }

    #[async_trait]
    impl ProjectsDal for FakeProjectsDal {
        async fn get_or_create_default(&self, user_id: &str) -> Result<Project, Error> {
            let key = (user_id.to_string(), Project::DEFAULT_NAME.to_string());
            let mut by_ref = self.by_ref.lock().unwrap();
            Ok(by_ref.entry(key).or_insert_with(|| Project::default_for_user(user_id)).clone())
        }

        async fn get_by_ref(&self, user_id: &str, ref_: &str) -> Result<Option<Project>, Error> {
            Ok(self.by_ref.lock().unwrap().get(&(user_id.to_string(), ref_.to_string())).cloned())
        }

        async fn get_by_id(&self, id: &str) -> Result<Project, Error> {
            self.by_ref
                .lock()
                .unwrap()
                .values()
                .find(|p| p.id == id)
                .cloned()
                .ok_or_else(|| Error::from_kind(ErrorKind::NotFound))
        }

        async fn create(&self, project: &Project) -> Result<(), Error> {
            self.by_ref
                .lock()
                .unwrap()
                .insert((project.user_id.clone(), project.ref_.clone()), project.clone());
            Ok(())
        }
    }

    struct UnusedServicesDal;

    #[async_trait]
    impl ServicesDal for UnusedServicesDal {
        async fn create(&self, _service: &Service) -> Result<(), Error> {
            unreachable!("not exercised by these tests")
        }
        async fn get_by_id(&self, _id: &str) -> Result<Service, Error> {
            unreachable!("not exercised by these tests")
        }
        async fn get_by_name_and_project(&self, _project_id: &str, _name: &str) -> Result<Service, Error> {
            unreachable!("not exercised by these tests")
        }
        async fn list_for_user(&self, _user_id: &str, _limit: i64, _offset: i64) -> Result<Vec<Service>, Error> {
            unreachable!("not exercised by these tests")
        }
        async fn find_by_repo_branch_provider(
            &self,
            _repo: &str,
            _branch: &str,
            _provider: GitProvider,
        ) -> Result<Vec<Service>, Error> {
            unreachable!("not exercised by these tests")
        }
        async fn set_workflow_linkage(&self, _id: &str, _workflow_id: &str, _run_id: &str) -> Result<(), Error> {
            unreachable!("not exercised by these tests")
        }
        async fn update_build_status(&self, _id: &str, _status: BuildStatus) -> Result<(), Error> {
            unreachable!("not exercised by these tests")
        }
        async fn mark_running(&self, _id: &str, _fqdn: &str, _commit_sha: &str) -> Result<(), Error> {
            unreachable!("not exercised by these tests")
        }
        async fn mark_failed(&self, _id: &str, _error_message: &str) -> Result<(), Error> {
            unreachable!("not exercised by these tests")
        }
        async fn soft_delete(&self, _id: &str) -> Result<(), Error> {
            unreachable!("not exercised by these tests")
        }
    }

    struct UnusedInternalReposDal;

    #[async_trait]
    impl InternalReposDal for UnusedInternalReposDal {
        async fn get_by_full_name(&self, _full_name: &str) -> Result<Option<InternalRepo>, Error> {
            unreachable!("not exercised by these tests")
        }
        async fn create(&self, _repo: &InternalRepo) -> Result<(), Error> {
            unreachable!("not exercised by these tests")
        }
    }

    struct UnusedDeploymentsDal;

    #[async_trait]
    impl DeploymentsDal for UnusedDeploymentsDal {
        async fn record(&self, _deployment: &Deployment) -> Result<(), Error> {
            unreachable!("not exercised by these tests")
        }
    }

    fn test_facade() -> (DeploymentFacade, Arc<FakeProjectsDal>) {
        let projects = Arc::new(FakeProjectsDal::default());
        let ctx = ActivityCtx::new(
            Arc::new(UnusedServicesDal),
            projects.clone(),
            Arc::new(UnusedInternalReposDal),
            Arc::new(UnusedDeploymentsDal),
            Arc::new(RegistryClient::new()),
            Arc::new(LoggingKubernetesClient),
            Arc::new(LoggingBuildKitClient),
            Arc::new(LoggingDnsClient),
            Arc::new(ControlPlaneConfig {
                database_url: "sqlite::memory:".to_string(),
                workflow_address: "127.0.0.1:7790".to_string(),
                task_queue: "deployments".to_string(),
                registry_host: "registry.test".to_string(),
                buildkit_host: "tcp://127.0.0.1:1234".to_string(),
                log_ingest_url: "http://127.0.0.1:9000".to_string(),
                github_webhook_secret: "secret".to_string(),
                internal_git_webhook_secret: "secret".to_string(),
                repos_root: std::path::PathBuf::from("/tmp/mlg-test-repos"),
                base_domain: "apps.example.com".to_string(),
                gitserver_addr: "0.0.0.0:8080".to_string(),
                gateway_addr: "0.0.0.0:8090".to_string(),
                gateway_internal_url: "http://127.0.0.1:8090".to_string(),
            }),
        );
        (DeploymentFacade::new(Arc::new(WorkflowEngine::new()), ctx), projects)
    }

    #[tokio::test]
    async fn resolve_project_falls_back_to_default_when_no_ref_given() {
        let (facade, _projects) = test_facade();
        let project = facade.resolve_project("user-1", None).await.unwrap();
        assert_eq!(project.ref_, Project::DEFAULT_NAME);
    }

    #[tokio::test]
    async fn resolve_project_auto_creates_a_named_project_on_first_use() {
        let (facade, projects) = test_facade();
        let project = facade.resolve_project("user-1", Some("staging")).await.unwrap();
        assert_eq!(project.ref_, "staging");

        let again = facade.resolve_project("user-1", Some("staging")).await.unwrap();
        assert_eq!(again.id, project.id, "second call should reuse the created project");
        assert_eq!(projects.by_ref.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn resolve_project_reuses_existing_project_by_ref() {
        let (facade, projects) = test_facade();
        let existing = Project {
            id: "proj-existing".to_string(),
            user_id: "user-1".to_string(),
            name: "prod".to_string(),
            ref_: "prod".to_string(),
        };
        projects.create(&existing).await.unwrap();

        let resolved = facade.resolve_project("user-1", Some("prod")).await.unwrap();
        assert_eq!(resolved.id, "proj-existing");
    }
}
