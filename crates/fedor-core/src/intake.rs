//! Classification of GitHub webhook deliveries into review triggers.
//!
//! Only the handful of fields the classifier reads are modelled; everything
//! else in the payload is ignored.

use serde::Deserialize;

use crate::target::Target;

/// Header naming the event type of a delivery.
pub const EVENT_HEADER: &str = "x-github-event";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub repository: Option<Repository>,
    #[serde(default)]
    pub pull_request: Option<PullRequest>,
    #[serde(default)]
    pub issue: Option<Issue>,
    #[serde(default)]
    pub comment: Option<Comment>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub full_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PullRequest {
    pub number: u64,
    #[serde(default)]
    pub labels: Vec<Label>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Issue {
    pub number: u64,
    #[serde(default)]
    pub labels: Vec<Label>,
    /// Present (with link fields) only when the issue is a pull request.
    #[serde(default)]
    pub pull_request: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Label {
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Comment {
    pub user: User,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
}

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// A delivery that should (re)arm the debounce timer for `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trigger {
    pub target: Target,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Schedule(Trigger),
    Ignore(String),
}

/// Filters applied during classification.
#[derive(Debug, Clone)]
pub struct IntakeRules<'a> {
    pub required_label: Option<&'a str>,
    pub bot_login: &'a str,
}

impl IntakeRules<'_> {
    fn has_required_label(&self, labels: &[Label]) -> bool {
        match self.required_label {
            None => true,
            Some(required) => labels.iter().any(|l| l.name == required),
        }
    }

    fn missing_label(&self) -> Decision {
        Decision::Ignore(format!(
            "missing required label {:?}",
            self.required_label.unwrap_or_default()
        ))
    }
}

/// Decide what to do with one delivery.
pub fn classify(event: &str, payload: &WebhookPayload, rules: &IntakeRules<'_>) -> Decision {
    let action = payload.action.as_deref().unwrap_or("");
    match (event, action) {
        ("pull_request", "opened" | "synchronize" | "labeled") => {
            let (Some(repo), Some(pr)) = (&payload.repository, &payload.pull_request) else {
                return Decision::Ignore("malformed pull_request payload".into());
            };
            if !rules.has_required_label(&pr.labels) {
                return rules.missing_label();
            }
            let reason = match action {
                "opened" => "new PR",
                "synchronize" => "new commits pushed",
                _ => "label added",
            };
            schedule(repo, pr.number, reason.to_string())
        }

        ("pull_request_review_comment", "created") => {
            let (Some(repo), Some(pr), Some(comment)) =
                (&payload.repository, &payload.pull_request, &payload.comment)
            else {
                return Decision::Ignore("malformed review comment payload".into());
            };
            let sender = &comment.user.login;
            if sender == rules.bot_login {
                return Decision::Ignore("own review comment".into());
            }
            if !rules.has_required_label(&pr.labels) {
                return rules.missing_label();
            }
            schedule(repo, pr.number, format!("review comment from @{sender}"))
        }

        ("issue_comment", "created") => {
            let (Some(repo), Some(issue), Some(comment)) =
                (&payload.repository, &payload.issue, &payload.comment)
            else {
                return Decision::Ignore("malformed issue comment payload".into());
            };
            if issue.pull_request.is_none() {
                return Decision::Ignore("not a PR comment".into());
            }
            let sender = &comment.user.login;
            if sender == rules.bot_login {
                return Decision::Ignore("own comment".into());
            }
            if !rules.has_required_label(&issue.labels) {
                return rules.missing_label();
            }
            schedule(repo, issue.number, format!("comment from @{sender}"))
        }

        _ => Decision::Ignore(format!("{event}/{action}")),
    }
}

fn schedule(repo: &Repository, pr: u64, reason: String) -> Decision {
    Decision::Schedule(Trigger {
        target: Target::new(repo.full_name.clone(), pr),
        reason,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
