use std::sync::Mutex;

use anyhow::{Result, bail};

use crate::{GitHubApi, PullRequestRef, RemoteComment, WorkflowJob};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    List(u64),
    Create(u64),
    Update(u64),
    Delete(u64),
}

#[derive(Default)]
struct State {
    comments: Vec<RemoteComment>,
    pulls: Vec<u64>,
    jobs: Vec<WorkflowJob>,
    calls: Vec<Call>,
    next_id: u64,
    error: Option<String>,
}

/// In-memory comment store for a single issue.
#[derive(Default)]
pub struct FakeGitHub {
    state: Mutex<State>,
}

impl FakeGitHub {
    pub fn with_comments(comments: &[(u64, String)]) -> Self {
        let api = Self::default();
        {
            let mut state = api.state.lock().unwrap();
            state.comments = comments
                .iter()
                .map(|(id, body)| RemoteComment { id: *id, body: body.clone() })
                .collect();
            state.next_id = comments.iter().map(|(id, _)| *id).max().unwrap_or(0) + 1;
        }
        api
    }

    pub fn set_pulls(&self, pulls: Vec<u64>) { self.state.lock().unwrap().pulls = pulls; }

    pub fn set_jobs(&self, jobs: Vec<WorkflowJob>) { self.state.lock().unwrap().jobs = jobs; }

    pub fn fail_with(&self, message: &str) {
        self.state.lock().unwrap().error = Some(message.to_string());
    }

    pub fn comments(&self) -> Vec<RemoteComment> { self.state.lock().unwrap().comments.clone() }

    pub fn calls(&self) -> Vec<Call> { self.state.lock().unwrap().calls.clone() }

    fn check(&self, call: Option<Call>) -> Result<std::sync::MutexGuard<'_, State>> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = &state.error {
            bail!("{error}");
        }
        if let Some(call) = call {
            state.calls.push(call);
        }
        Ok(state)
    }
}

impl GitHubApi for FakeGitHub {
    async fn list_comments(&self, issue: u64) -> Result<Vec<RemoteComment>> {
        Ok(self.check(Some(Call::List(issue)))?.comments.clone())
    }

    async fn create_comment(&self, issue: u64, body: &str) -> Result<u64> {
        let mut state = self.check(Some(Call::Create(issue)))?;
        state.next_id = state.next_id.max(1);
        let id = state.next_id;
        state.next_id += 1;
        state.comments.push(RemoteComment { id, body: body.to_string() });
        Ok(id)
    }

    async fn update_comment(&self, id: u64, body: &str) -> Result<()> {
        let mut state = self.check(Some(Call::Update(id)))?;
        let Some(comment) = state.comments.iter_mut().find(|c| c.id == id) else {
            bail!("Comment {id} not found");
        };
        comment.body = body.to_string();
        Ok(())
    }

    async fn delete_comment(&self, id: u64) -> Result<()> {
        let mut state = self.check(Some(Call::Delete(id)))?;
        state.comments.retain(|c| c.id != id);
        Ok(())
    }

    async fn list_pull_requests_for_commit(&self, _sha: &str) -> Result<Vec<PullRequestRef>> {
        let state = self.check(None)?;
        Ok(state.pulls.iter().map(|&number| PullRequestRef { number }).collect())
    }

    async fn list_jobs_for_run(&self, _run_id: u64) -> Result<Vec<WorkflowJob>> {
        Ok(self.check(None)?.jobs.clone())
    }
}
