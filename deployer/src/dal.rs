use async_trait::async_trait;
use mlg_common::models::{
    BuildConfig, BuildPack, BuildStatus, Deployment, EnvVar, GitProvider, InternalRepo, Project,
    RuntimeStatus, Service,
};
use mlg_common::{Error, ErrorKind};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Trait-per-entity persistence, mirroring the teacher's `Dal` shape: one trait per table,
/// a single sqlite pool backing all of them. Hand-written SQL, not a migration tool, per
/// the ambient-stack note — there is no toolchain invocation available to generate one.
#[async_trait]
pub trait ServicesDal: Send + Sync {
    async fn create(&self, service: &Service) -> Result<(), Error>;
    async fn get_by_id(&self, id: &str) -> Result<Service, Error>;
    async fn get_by_name_and_project(&self, project_id: &str, name: &str) -> Result<Service, Error>;
    async fn list_for_user(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<Service>, Error>;
    async fn find_by_repo_branch_provider(
        &self,
        repo: &str,
        branch: &str,
        provider: GitProvider,
    ) -> Result<Vec<Service>, Error>;
    async fn set_workflow_linkage(&self, id: &str, workflow_id: &str, run_id: &str) -> Result<(), Error>;
    async fn update_build_status(&self, id: &str, status: BuildStatus) -> Result<(), Error>;
    async fn mark_running(&self, id: &str, fqdn: &str, commit_sha: &str) -> Result<(), Error>;
    async fn mark_failed(&self, id: &str, error_message: &str) -> Result<(), Error>;
    async fn soft_delete(&self, id: &str) -> Result<(), Error>;
}

#[async_trait]
pub trait ProjectsDal: Send + Sync {
    async fn get_or_create_default(&self, user_id: &str) -> Result<Project, Error>;
    async fn get_by_ref(&self, user_id: &str, ref_: &str) -> Result<Option<Project>, Error>;
    async fn get_by_id(&self, id: &str) -> Result<Project, Error>;
    async fn create(&self, project: &Project) -> Result<(), Error>;
}

#[async_trait]
pub trait InternalReposDal: Send + Sync {
    async fn get_by_full_name(&self, full_name: &str) -> Result<Option<InternalRepo>, Error>;
    async fn create(&self, repo: &InternalRepo) -> Result<(), Error>;
}

#[async_trait]
pub trait DeploymentsDal: Send + Sync {
    async fn record(&self, deployment: &Deployment) -> Result<(), Error>;
}

pub struct SqliteDal {
    pool: SqlitePool,
}

impl SqliteDal {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Creates the tables this crate owns if they don't already exist. Hand-rolled rather
    /// than a migration runner, matching the teacher's `dal.rs` inline `CREATE TABLE IF NOT
    /// EXISTS` approach for the sqlite-backed local store.
    pub async fn ensure_schema(&self) -> Result<(), Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                name TEXT NOT NULL,
                ref_ TEXT NOT NULL,
                UNIQUE(user_id, ref_)
            );

            CREATE TABLE IF NOT EXISTS services (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                name TEXT NOT NULL,
                repo TEXT NOT NULL,
                branch TEXT NOT NULL,
                provider TEXT NOT NULL,
                build_pack TEXT NOT NULL,
                build_config TEXT NOT NULL,
                port INTEGER,
                env TEXT NOT NULL,
                build_status TEXT NOT NULL,
                runtime_status TEXT NOT NULL,
                error_message TEXT,
                commit_sha TEXT,
                fqdn TEXT,
                last_workflow_id TEXT,
                last_run_id TEXT,
                deleted INTEGER NOT NULL DEFAULT 0,
                UNIQUE(project_id, name)
            );

            CREATE TABLE IF NOT EXISTS internal_repos (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                full_name TEXT NOT NULL UNIQUE,
                bare_path TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS git_tokens (
                id TEXT PRIMARY KEY,
                token_hash BLOB NOT NULL UNIQUE,
                prefix TEXT NOT NULL,
                user_id TEXT NOT NULL,
                repo_id TEXT,
                scopes TEXT NOT NULL,
                expires_at TEXT,
                revoked INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS deployments (
                id TEXT PRIMARY KEY,
                service_id TEXT NOT NULL,
                workflow_id TEXT NOT NULL,
                run_id TEXT NOT NULL,
                commit_sha TEXT NOT NULL,
                image_ref TEXT,
                status TEXT NOT NULL,
                error_message TEXT,
                build_started_at TEXT NOT NULL,
                build_ended_at TEXT
            );
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct ServiceRow {
    id: String,
    user_id: String,
    project_id: String,
    name: String,
    repo: String,
    branch: String,
    provider: String,
    build_pack: String,
    build_config: String,
    port: Option<i64>,
    env: String,
    build_status: String,
    runtime_status: String,
    error_message: Option<String>,
    commit_sha: Option<String>,
    fqdn: Option<String>,
    last_workflow_id: Option<String>,
    last_run_id: Option<String>,
    deleted: bool,
}

impl ServiceRow {
    fn into_model(self) -> Result<Service, Error> {
        Ok(Service {
            id: self.id,
            user_id: self.user_id,
            project_id: self.project_id,
            name: self.name,
            repo: self.repo,
            branch: self.branch,
            provider: GitProvider::from_str(&self.provider)
                .map_err(|_| Error::custom(ErrorKind::Database, "bad provider in row"))?,
            build_pack: BuildPack::from_str(&self.build_pack)
                .map_err(|_| Error::custom(ErrorKind::Database, "bad build_pack in row"))?,
            build_config: serde_json::from_str::<BuildConfig>(&self.build_config)
                .map_err(|_| Error::custom(ErrorKind::Database, "bad build_config json"))?,
            port: self.port.map(|p| p as u16),
            env: serde_json::from_str::<Vec<EnvVar>>(&self.env)
                .map_err(|_| Error::custom(ErrorKind::Database, "bad env json"))?,
            build_status: BuildStatus::from_str(&self.build_status)
                .map_err(|_| Error::custom(ErrorKind::Database, "bad build_status in row"))?,
            runtime_status: RuntimeStatus::from_str(&self.runtime_status)
                .map_err(|_| Error::custom(ErrorKind::Database, "bad runtime_status in row"))?,
            error_message: self.error_message,
            commit_sha: self.commit_sha,
            fqdn: self.fqdn,
            last_workflow_id: self.last_workflow_id,
            last_run_id: self.last_run_id,
            deleted: self.deleted,
        })
    }
}

#[async_trait]
impl ServicesDal for SqliteDal {
    async fn create(&self, service: &Service) -> Result<(), Error> {
        let build_config = serde_json::to_string(&service.build_config).expect("BuildConfig always serializes");
        let env = serde_json::to_string(&service.env).expect("Vec<EnvVar> always serializes");

        sqlx::query(
            "INSERT INTO services (id, user_id, project_id, name, repo, branch, provider, build_pack, \
             build_config, port, env, build_status, runtime_status, error_message, commit_sha, fqdn, \
             last_workflow_id, last_run_id, deleted) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&service.id)
        .bind(&service.user_id)
        .bind(&service.project_id)
        .bind(&service.name)
        .bind(&service.repo)
        .bind(&service.branch)
        .bind(service.provider.to_string())
        .bind(service.build_pack.to_string())
        .bind(build_config)
        .bind(service.port.map(|p| p as i64))
        .bind(env)
        .bind(service.build_status.to_string())
        .bind(service.runtime_status.to_string())
        .bind(&service.error_message)
        .bind(&service.commit_sha)
        .bind(&service.fqdn)
        .bind(&service.last_workflow_id)
        .bind(&service.last_run_id)
        .bind(service.deleted)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get_by_id(&self, id: &str) -> Result<Service, Error> {
        let row: ServiceRow = sqlx::query_as("SELECT * FROM services WHERE id = ? AND deleted = 0")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        row.into_model()
    }

    async fn get_by_name_and_project(&self, project_id: &str, name: &str) -> Result<Service, Error> {
        let row: ServiceRow =
            sqlx::query_as("SELECT * FROM services WHERE project_id = ? AND name = ? AND deleted = 0")
                .bind(project_id)
                .bind(name)
                .fetch_one(&self.pool)
                .await?;
        row.into_model()
    }

    async fn list_for_user(&self, user_id: &str, limit: i64, offset: i64) -> Result<Vec<Service>, Error> {
        let rows: Vec<ServiceRow> = sqlx::query_as(
            "SELECT * FROM services WHERE user_id = ? AND deleted = 0 ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ServiceRow::into_model).collect()
    }

    async fn find_by_repo_branch_provider(
        &self,
        repo: &str,
        branch: &str,
        provider: GitProvider,
    ) -> Result<Vec<Service>, Error> {
        let rows: Vec<ServiceRow> = sqlx::query_as(
            "SELECT * FROM services WHERE repo = ? AND branch = ? AND provider = ? AND deleted = 0",
        )
        .bind(repo)
        .bind(branch)
        .bind(provider.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ServiceRow::into_model).collect()
    }

    async fn set_workflow_linkage(&self, id: &str, workflow_id: &str, run_id: &str) -> Result<(), Error> {
        sqlx::query("UPDATE services SET last_workflow_id = ?, last_run_id = ? WHERE id = ?")
            .bind(workflow_id)
            .bind(run_id)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_build_status(&self, id: &str, status: BuildStatus) -> Result<(), Error> {
        sqlx::query("UPDATE services SET build_status = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn mark_running(&self, id: &str, fqdn: &str, commit_sha: &str) -> Result<(), Error> {
        sqlx::query(
            "UPDATE services SET build_status = ?, runtime_status = ?, fqdn = ?, commit_sha = ?, error_message = NULL WHERE id = ?",
        )
        .bind(BuildStatus::Success.to_string())
        .bind(RuntimeStatus::Running.to_string())
        .bind(fqdn)
        .bind(commit_sha)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn mark_failed(&self, id: &str, error_message: &str) -> Result<(), Error> {
        sqlx::query("UPDATE services SET build_status = ?, error_message = ? WHERE id = ?")
            .bind(BuildStatus::Failed.to_string())
            .bind(error_message)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn soft_delete(&self, id: &str) -> Result<(), Error> {
        sqlx::query("UPDATE services SET deleted = 1 WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl ProjectsDal for SqliteDal {
    async fn get_or_create_default(&self, user_id: &str) -> Result<Project, Error> {
        if let Some(existing) = self.get_by_ref(user_id, Project::DEFAULT_NAME).await? {
            return Ok(existing);
        }

        let project = Project::default_for_user(user_id);
        sqlx::query("INSERT INTO projects (id, user_id, name, ref_) VALUES (?, ?, ?, ?)")
            .bind(&project.id)
            .bind(&project.user_id)
            .bind(&project.name)
            .bind(&project.ref_)
            .execute(&self.pool)
            .await?;
        Ok(project)
    }

    async fn get_by_ref(&self, user_id: &str, ref_: &str) -> Result<Option<Project>, Error> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: String,
            user_id: String,
            name: String,
            ref_: String,
        }

        let row: Option<Row> = sqlx::query_as("SELECT * FROM projects WHERE user_id = ? AND ref_ = ?")
            .bind(user_id)
            .bind(ref_)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| Project {
            id: r.id,
            user_id: r.user_id,
            name: r.name,
            ref_: r.ref_,
        }))
    }

    async fn get_by_id(&self, id: &str) -> Result<Project, Error> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: String,
            user_id: String,
            name: String,
            ref_: String,
        }

        let row: Row = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;

        Ok(Project {
            id: row.id,
            user_id: row.user_id,
            name: row.name,
            ref_: row.ref_,
        })
    }

    async fn create(&self, project: &Project) -> Result<(), Error> {
        sqlx::query("INSERT INTO projects (id, user_id, name, ref_) VALUES (?, ?, ?, ?)")
            .bind(&project.id)
            .bind(&project.user_id)
            .bind(&project.name)
            .bind(&project.ref_)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl InternalReposDal for SqliteDal {
    async fn get_by_full_name(&self, full_name: &str) -> Result<Option<InternalRepo>, Error> {
        #[derive(sqlx::FromRow)]
        struct Row {
            id: String,
            user_id: String,
            full_name: String,
            bare_path: String,
        }

        let row: Option<Row> = sqlx::query_as("SELECT * FROM internal_repos WHERE full_name = ?")
            .bind(full_name)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| InternalRepo {
            id: r.id,
            user_id: r.user_id,
            full_name: r.full_name,
            bare_path: r.bare_path,
        }))
    }

    async fn create(&self, repo: &InternalRepo) -> Result<(), Error> {
        sqlx::query("INSERT INTO internal_repos (id, user_id, full_name, bare_path) VALUES (?, ?, ?, ?)")
            .bind(&repo.id)
            .bind(&repo.user_id)
            .bind(&repo.full_name)
            .bind(&repo.bare_path)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl DeploymentsDal for SqliteDal {
    async fn record(&self, deployment: &Deployment) -> Result<(), Error> {
        sqlx::query(
            "INSERT INTO deployments (id, service_id, workflow_id, run_id, commit_sha, image_ref, status, \
             error_message, build_started_at, build_ended_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&deployment.id)
        .bind(&deployment.service_id)
        .bind(&deployment.workflow_id)
        .bind(&deployment.run_id)
        .bind(&deployment.commit_sha)
        .bind(&deployment.image_ref)
        .bind(deployment.status.to_string())
        .bind(&deployment.error_message)
        .bind(deployment.build_started_at)
        .bind(deployment.build_ended_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
