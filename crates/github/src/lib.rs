pub mod comments;
pub mod links;
pub mod render;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod token;

use anyhow::{Context, Result};
use octocrab::{Octocrab, models::CommentId};
use serde::Deserialize;

/// A comment on an issue or pull request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteComment {
    pub id: u64,
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequestRef {
    pub number: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowJob {
    pub id: u64,
    pub name: String,
    pub status: String,
    #[serde(default)]
    pub steps: Vec<WorkflowStep>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WorkflowStep {
    pub number: u64,
    pub status: String,
}

/// The remote operations the reconciler and link resolver depend on.
#[allow(async_fn_in_trait)]
pub trait GitHubApi {
    async fn list_comments(&self, issue: u64) -> Result<Vec<RemoteComment>>;

    async fn create_comment(&self, issue: u64, body: &str) -> Result<u64>;

    async fn update_comment(&self, id: u64, body: &str) -> Result<()>;

    async fn delete_comment(&self, id: u64) -> Result<()>;

    async fn list_pull_requests_for_commit(&self, sha: &str) -> Result<Vec<PullRequestRef>>;

    async fn list_jobs_for_run(&self, run_id: u64) -> Result<Vec<WorkflowJob>>;
}

/// GitHub REST client scoped to a single repository.
#[derive(Clone)]
pub struct GitHub {
    pub client: Octocrab,
    pub owner: String,
    pub repo: String,
}

#[derive(serde::Serialize)]
struct PageParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    per_page: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    page: Option<u32>,
}

#[derive(Deserialize)]
struct WorkflowJobs {
    total_count: u64,
    jobs: Vec<WorkflowJob>,
}

impl GitHub {
    pub fn new(token: &str, api_url: Option<&str>, owner: &str, repo: &str) -> Result<Self> {
        let mut builder = Octocrab::builder().personal_token(token.to_string());
        if let Some(api_url) = api_url {
            builder = builder.base_uri(api_url).context("Invalid GitHub API URL")?;
        }
        let client = builder.build().context("Failed to create GitHub client")?;
        Ok(Self { client, owner: owner.to_string(), repo: repo.to_string() })
    }
}

impl GitHubApi for GitHub {
    async fn list_comments(&self, issue: u64) -> Result<Vec<RemoteComment>> {
        let page = self
            .client
            .issues(&self.owner, &self.repo)
            .list_comments(issue)
            .per_page(100)
            .send()
            .await
            .with_context(|| format!("Failed to list comments for #{issue}"))?;
        let comments = self.client.all_pages(page).await?;
        Ok(comments
            .into_iter()
            .map(|c| RemoteComment { id: c.id.into_inner(), body: c.body.unwrap_or_default() })
            .collect())
    }

    async fn create_comment(&self, issue: u64, body: &str) -> Result<u64> {
        let comment = self
            .client
            .issues(&self.owner, &self.repo)
            .create_comment(issue, body)
            .await
            .with_context(|| format!("Failed to create comment on #{issue}"))?;
        Ok(comment.id.into_inner())
    }

    async fn update_comment(&self, id: u64, body: &str) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .update_comment(CommentId(id), body)
            .await
            .with_context(|| format!("Failed to update comment {id}"))?;
        Ok(())
    }

    async fn delete_comment(&self, id: u64) -> Result<()> {
        self.client
            .issues(&self.owner, &self.repo)
            .delete_comment(CommentId(id))
            .await
            .with_context(|| format!("Failed to delete comment {id}"))?;
        Ok(())
    }

    async fn list_pull_requests_for_commit(&self, sha: &str) -> Result<Vec<PullRequestRef>> {
        self.client
            .get(
                format!("/repos/{}/{}/commits/{sha}/pulls", self.owner, self.repo),
                Some(&PageParams { per_page: Some(100), page: None }),
            )
            .await
            .with_context(|| format!("Failed to list pull requests for commit {sha}"))
    }

    async fn list_jobs_for_run(&self, run_id: u64) -> Result<Vec<WorkflowJob>> {
        let route = format!("/repos/{}/{}/actions/runs/{run_id}/jobs", self.owner, self.repo);
        let mut page = 1;
        let mut response: WorkflowJobs = self
            .client
            .get(&route, Some(&PageParams { per_page: Some(100), page: Some(page) }))
            .await
            .with_context(|| format!("Failed to list jobs for run {run_id}"))?;
        let mut jobs = std::mem::take(&mut response.jobs);
        while (jobs.len() as u64) < response.total_count {
            page += 1;
            response = self
                .client
                .get(&route, Some(&PageParams { per_page: Some(100), page: Some(page) }))
                .await
                .with_context(|| format!("Failed to list jobs for run {run_id} (page {page})"))?;
            if response.jobs.is_empty() {
                break;
            }
            jobs.append(&mut response.jobs);
        }
        Ok(jobs)
    }
}
