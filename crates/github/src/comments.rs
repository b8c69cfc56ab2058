use std::collections::HashSet;

use anyhow::{Context, Result};
use run_report_core::config::RunContext;

use crate::{
    GitHubApi,
    render::RenderedUnit,
    token::{Token, sanitize_identifier},
};

/// What a reconciliation pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    pub issue: Option<u64>,
    pub created: Vec<u64>,
    pub updated: Vec<u64>,
    pub deleted: Vec<u64>,
}

impl ReconcileOutcome {
    pub fn mutated(&self) -> bool {
        !self.created.is_empty() || !self.updated.is_empty() || !self.deleted.is_empty()
    }
}

/// The issue or pull request to comment on: the one from the triggering
/// event, else the first pull request containing the commit.
pub async fn resolve_issue(api: &impl GitHubApi, run: &RunContext) -> Result<Option<u64>> {
    if let Some(issue) = run.event_issue {
        return Ok(Some(issue));
    }
    let Some(sha) = run.sha.as_deref() else {
        return Ok(None);
    };
    let pulls = api
        .list_pull_requests_for_commit(sha)
        .await
        .context("Failed to fetch pull requests for commit")?;
    tracing::debug!("Found {} pull requests for {}", pulls.len(), sha);
    Ok(pulls.first().map(|pr| pr.number))
}

/// Bring the comments on `issue` in line with `units`.
///
/// Each unit updates the first comment carrying its token, or creates one.
/// Afterwards, any other comment carrying a token for `identifier` is
/// deleted: either its failure no longer exists or it duplicates a unit.
pub async fn reconcile(
    api: &impl GitHubApi,
    issue: u64,
    identifier: &str,
    units: &[RenderedUnit],
) -> Result<ReconcileOutcome> {
    let comments = api.list_comments(issue).await?;
    let mut outcome = ReconcileOutcome { issue: Some(issue), ..Default::default() };
    let mut claimed = HashSet::new();

    for unit in units {
        let marker = unit.token.to_string();
        let existing = comments
            .iter()
            .find(|comment| !claimed.contains(&comment.id) && comment.body.contains(&marker));
        if let Some(existing) = existing {
            api.update_comment(existing.id, &unit.body).await?;
            tracing::info!("Updated comment {} on #{}", existing.id, issue);
            claimed.insert(existing.id);
            outcome.updated.push(existing.id);
        } else {
            let id = api.create_comment(issue, &unit.body).await?;
            tracing::info!("Created comment {} on #{}", id, issue);
            outcome.created.push(id);
        }
    }

    let active = units.iter().map(|unit| &unit.token).collect::<HashSet<_>>();
    let own = sanitize_identifier(identifier);
    for comment in comments.iter().filter(|comment| !claimed.contains(&comment.id)) {
        let tokens = Token::find_all(&comment.body);
        let Some(token) = tokens.iter().find(|token| token.identifier == own) else {
            continue;
        };
        if active.contains(token) {
            tracing::info!("Deleting duplicate comment {} on #{}", comment.id, issue);
        } else {
            tracing::info!("Deleting stale comment {} on #{}", comment.id, issue);
        }
        api.delete_comment(comment.id).await?;
        outcome.deleted.push(comment.id);
    }

    Ok(outcome)
}

/// Resolve the issue and reconcile. Failures are logged, never returned.
pub async fn publish(
    api: &impl GitHubApi,
    run: &RunContext,
    identifier: &str,
    units: &[RenderedUnit],
) -> ReconcileOutcome {
    let result: Result<ReconcileOutcome> = async {
        let Some(issue) = resolve_issue(api, run).await? else {
            tracing::info!("No pull request found for this run, skipping comments");
            return Ok(ReconcileOutcome::default());
        };
        reconcile(api, issue, identifier, units).await
    }
    .await;
    match result {
        Ok(outcome) => outcome,
        Err(e) => {
            tracing::warn!(
                "Failed to publish comments: {:?}. Pull requests from forks usually lack \
                 permission to comment.",
                e
            );
            ReconcileOutcome::default()
        }
    }
}
