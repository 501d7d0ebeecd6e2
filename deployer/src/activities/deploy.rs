use async_trait::async_trait;
use mlg_common::{Error, ErrorKind};
use mlg_workflow::{Task, TaskResult};
use tracing::{info, warn};

use crate::clients::RolloutStatus;
use crate::ctx::ActivityCtx;

const MAX_LOG_LINES: usize = 25;
const MAX_LOG_LINE_LEN: usize = 300;

/// Step 7 of `CreateService` / last-but-one step of `RedeployService`: server-side
/// applies namespace, deployment, service and default ingress.
pub struct Deploy {
    pub service_id: String,
}

#[async_trait]
impl Task<ActivityCtx> for Deploy {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let (namespace, service_name, image_ref, port, env) = {
            let scratch = ctx.scratch.lock().await;
            let (Some(namespace), Some(service_name), Some(image_ref), Some(port)) = (
                scratch.namespace.clone(),
                scratch.service_name.clone(),
                scratch.image_ref.clone(),
                scratch.port,
            ) else {
                return TaskResult::Err(Error::custom(
                    ErrorKind::SourceMissing,
                    "deploy ran before the build context was resolved",
                ));
            };
            let env: Vec<(String, String)> = scratch.env.iter().map(|e| (e.key.clone(), e.value.clone())).collect();
            (namespace, service_name, image_ref, port, env)
        };

        if let Err(err) = ctx.k8s.apply_namespace(&namespace).await {
            return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string()));
        }
        if let Err(err) = ctx.k8s.apply_deployment(&namespace, &service_name, &image_ref, port, &env).await {
            return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string()));
        }
        if let Err(err) = ctx.k8s.apply_service(&namespace, &service_name, port).await {
            return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string()));
        }
        let host = format!("{service_name}-{}.{}", short_suffix(&self.service_id), ctx.config.base_domain);
        if let Err(err) = ctx.k8s.apply_ingress(&namespace, &service_name, &host, port).await {
            return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string()));
        }

        info!(%namespace, name = %service_name, %image_ref, "applied kubernetes objects");
        ctx.scratch.lock().await.fqdn = Some(host);
        TaskResult::Done(())
    }
}

fn short_suffix(service_id: &str) -> String {
    service_id.chars().rev().take(6).collect::<String>().chars().rev().collect()
}

/// Step 8 of `CreateService`: polls rollout status at a fixed interval until it
/// finishes, fails, or is cancelled.
pub struct WaitForRollout {
    polled: bool,
}

impl WaitForRollout {
    pub fn new() -> Self {
        Self { polled: false }
    }
}

impl Default for WaitForRollout {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Task<ActivityCtx> for WaitForRollout {
    type Output = ();
    type Error = Error;

    async fn poll(&mut self, ctx: ActivityCtx) -> TaskResult<Self::Output, Self::Error> {
        let (namespace, service_name) = {
            let scratch = ctx.scratch.lock().await;
            let (Some(namespace), Some(service_name)) = (scratch.namespace.clone(), scratch.service_name.clone()) else {
                return TaskResult::Err(Error::custom(
                    ErrorKind::SourceMissing,
                    "wait-for-rollout ran before the build context was resolved",
                ));
            };
            (namespace, service_name)
        };

        self.polled = true;
        let status = match ctx.k8s.rollout_status(&namespace, &service_name).await {
            Ok(status) => status,
            Err(err) => return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string())),
        };

        match status {
            RolloutStatus::Finished => {
                let host = match ctx.k8s.ingress_host(&namespace, &service_name).await {
                    Ok(host) => host,
                    Err(err) => return TaskResult::Err(Error::custom(ErrorKind::OrchestratorTransient, err.to_string())),
                };
                if let Some(host) = host {
                    ctx.scratch.lock().await.fqdn = Some(host);
                }
                info!(%namespace, name = %service_name, "rollout finished");
                TaskResult::Done(())
            }
            RolloutStatus::InProgress => TaskResult::Pending(()),
            RolloutStatus::Failed | RolloutStatus::Cancelled => {
                let logs = ctx.k8s.recent_logs(&namespace, &service_name, MAX_LOG_LINES).await.unwrap_or_default();
                let message = truncate_logs(&logs);
                warn!(%namespace, name = %service_name, "rollout did not finish");
                TaskResult::Err(Error::custom(ErrorKind::RolloutTimeout, message))
            }
        }
    }
}

fn truncate_logs(lines: &[String]) -> String {
    lines
        .iter()
        .rev()
        .take(MAX_LOG_LINES)
        .rev()
        .filter(|line| !line.is_empty())
        .map(|line| {
            if line.chars().count() > MAX_LOG_LINE_LEN {
                line.chars().take(MAX_LOG_LINE_LEN).collect::<String>()
            } else {
                line.clone()
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_logs_caps_line_count_and_length() {
        let lines: Vec<String> = (0..40).map(|i| format!("line-{i}")).collect();
        let joined = truncate_logs(&lines);
        assert_eq!(joined.lines().count(), MAX_LOG_LINES);
        assert!(joined.starts_with("line-15"));
    }

    #[test]
    fn truncate_logs_drops_empty_lines() {
        let lines = vec!["".to_string(), "a".to_string(), "".to_string()];
        assert_eq!(truncate_logs(&lines), "a");
    }

    #[test]
    fn truncate_logs_does_not_split_a_multibyte_char_boundary() {
        let line = "é".repeat(MAX_LOG_LINE_LEN + 10);
        let truncated = truncate_logs(&[line]);
        assert_eq!(truncated.chars().count(), MAX_LOG_LINE_LEN);
    }
}
