use crate::{
    context::WorkspaceContext,
    error::{ApiError, RepoError},
    session::{ApiSession, NONE},
};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

/// Folder `update_or_create` keeps job repos in.
pub const JOBS_FOLDER: &str = "/Repos/jobs";

/// Repo attributes as returned by the repos API. Missing fields stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub head_commit_id: Option<String>,
}

impl RepoDetails {
    /// Overwrites every field present in `update`.
    fn merge(&mut self, update: RepoDetails) {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if update.$field.is_some() { self.$field = update.$field; })*
            };
        }
        take!(id, path, url, provider, branch, head_commit_id);
    }
}

/// What `pull` moves the repo to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullTarget {
    Branch(String),
    Tag(String),
    /// Latest commit of the branch the repo is on.
    Current,
}

#[derive(Deserialize)]
struct RepoList {
    repos: Option<Vec<RepoDetails>>,
}

pub struct RepoHandler {
    session: ApiSession,
    details: RepoDetails,
}

impl RepoHandler {
    pub fn new(ctx: &WorkspaceContext) -> Result<Self, ApiError> {
        Ok(Self::with_session(ApiSession::new("repos", ctx)?))
    }

    pub fn with_session(session: ApiSession) -> Self {
        RepoHandler {
            session,
            details: RepoDetails::default(),
        }
    }

    pub fn details(&self) -> &RepoDetails {
        &self.details
    }

    /// Loads the single repo whose path starts with `path_prefix`.
    pub async fn get_repo(&mut self, path_prefix: &str) -> Result<&RepoDetails, RepoError> {
        let list: RepoList = self
            .session
            .request_json(Method::GET, "", Some(&[("path_prefix", path_prefix)]), NONE)
            .await?;

        let mut repos = list.repos.ok_or(RepoError::NotFound)?;
        match repos.len() {
            0 => Err(RepoError::NotFound),
            1 => {
                let repo = repos.remove(0);
                info!("Found repo {:?} at {:?}", repo.id, repo.path);
                self.details.merge(repo);
                Ok(&self.details)
            }
            n => Err(RepoError::Ambiguous(n)),
        }
    }

    /// Checks out `target` on the loaded repo.
    pub async fn pull(&mut self, target: PullTarget) -> Result<&RepoDetails, RepoError> {
        let id = self.details.id.ok_or(RepoError::NotLoaded)?;
        let body = match target {
            PullTarget::Branch(branch) => json!({ "branch": branch }),
            PullTarget::Tag(tag) => json!({ "tag": tag }),
            PullTarget::Current => {
                let branch = self
                    .details
                    .branch
                    .clone()
                    .ok_or(RepoError::MissingField("branch"))?;
                json!({ "branch": branch })
            }
        };

        let updated: RepoDetails = self
            .session
            .request_json(Method::PATCH, &id.to_string(), NONE, Some(&body))
            .await?;
        self.details.merge(updated);

        info!(
            "Repo {} is at {:?} ({:?})",
            id, self.details.branch, self.details.head_commit_id
        );
        Ok(&self.details)
    }

    /// Clones `url` into `path`, which is `/Repos/<folder>/<repo>` or `<folder>/<repo>`.
    pub async fn clone(
        &mut self,
        path: &str,
        provider: &str,
        url: &str,
    ) -> Result<&RepoDetails, RepoError> {
        let path = normalize_repo_path(path)?;
        let body = json!({
            "path": path,
            "provider": provider,
            "url": url,
        });

        let created: RepoDetails = self
            .session
            .request_json(Method::POST, "", NONE, Some(&body))
            .await?;
        info!("Cloned {} into {}", url, path);
        self.details.merge(created);
        Ok(&self.details)
    }

    /// Makes sure the repo at `url` exists under the jobs folder and is up to date.
    ///
    /// An empty `branch` pulls the branch the repo is already on.
    pub async fn update_or_create(
        &mut self,
        provider: &str,
        url: &str,
        branch: &str,
    ) -> Result<&RepoDetails, RepoError> {
        let path = format!("{}/{}", JOBS_FOLDER, repo_name(url));

        let exists = match self.get_repo(&path).await {
            Ok(_) => true,
            Err(RepoError::NotFound) => false,
            Err(err) => return Err(err),
        };
        if !exists {
            self.clone(&path, provider, url).await?;
        }

        let target = if branch.is_empty() {
            PullTarget::Current
        } else {
            PullTarget::Branch(branch.to_string())
        };
        self.pull(target).await
    }
}

/// Last URL segment up to the first `.`, e.g. `tools` for `https://git/org/tools.git`.
pub fn repo_name(url: &str) -> &str {
    let last = url.rsplit('/').next().unwrap_or(url);
    last.split('.').next().unwrap_or(last)
}

pub fn normalize_repo_path(path: &str) -> Result<String, RepoError> {
    let segments: Vec<&str> = path.split('/').collect();
    match segments.as_slice() {
        ["", "Repos", folder, repo] if !folder.is_empty() && !repo.is_empty() => {
            Ok(path.to_string())
        }
        [folder, repo] if !folder.is_empty() && !repo.is_empty() => Ok(format!("/Repos/{path}")),
        _ => Err(RepoError::InvalidPath(path.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_absolute_and_relative_paths() {
        assert_eq!(
            normalize_repo_path("/Repos/jobs/tools").unwrap(),
            "/Repos/jobs/tools"
        );
        assert_eq!(normalize_repo_path("team/tools").unwrap(), "/Repos/team/tools");
    }

    #[test]
    fn rejects_other_paths() {
        for path in [
            "tools",
            "/Repos/tools",
            "/Workspace/jobs/tools",
            "/Repos/jobs/tools/extra",
            "a/b/c",
            "/a",
            "team/",
            "/Repos//tools",
        ] {
            assert!(
                matches!(normalize_repo_path(path), Err(RepoError::InvalidPath(_))),
                "{path} should be rejected"
            );
        }
    }

    #[test]
    fn repo_name_strips_suffix() {
        assert_eq!(repo_name("https://github.com/org/tools.git"), "tools");
        assert_eq!(repo_name("https://github.com/org/tools"), "tools");
    }

    #[test]
    fn merge_keeps_fields_missing_from_update() {
        let mut details = RepoDetails {
            id: Some(7),
            branch: Some("main".into()),
            ..Default::default()
        };
        details.merge(RepoDetails {
            head_commit_id: Some("abc".into()),
            ..Default::default()
        });
        assert_eq!(details.id, Some(7));
        assert_eq!(details.branch.as_deref(), Some("main"));
        assert_eq!(details.head_commit_id.as_deref(), Some("abc"));
    }
}
