//! Prompt template and the named operations the agent may invoke.
//!
//! Operations are `just` recipes living in the project directory; the agent
//! reaches them through its single shell grant (`Bash(just *)`).

use std::fmt::Write as _;
use std::path::Path;

use crate::target::Target;

/// One named operation from the outbound capability surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Comments,
    ReviewComments,
    Review,
    Comment,
    ReplyComment,
    SubmitReview,
    Approve,
}

impl Operation {
    pub const ALL: [Operation; 7] = [
        Operation::Comments,
        Operation::ReviewComments,
        Operation::Review,
        Operation::Comment,
        Operation::ReplyComment,
        Operation::SubmitReview,
        Operation::Approve,
    ];

    /// Recipe name as invoked via `just <name>`.
    pub fn recipe(self) -> &'static str {
        match self {
            Operation::Comments => "comments",
            Operation::ReviewComments => "review-comments",
            Operation::Review => "review",
            Operation::Comment => "comment",
            Operation::ReplyComment => "reply-comment",
            Operation::SubmitReview => "submit-review",
            Operation::Approve => "approve",
        }
    }

    /// Arguments after `<repo> <pr>`.
    fn extra_args(self) -> &'static str {
        match self {
            Operation::Comments | Operation::ReviewComments | Operation::Review => "",
            Operation::Comment | Operation::Approve => r#" "<message>""#,
            Operation::ReplyComment => r#" <comment_id> "<message>""#,
            Operation::SubmitReview => " <EVENT> '<json>'",
        }
    }

    fn summary(self) -> &'static str {
        match self {
            Operation::Comments => "show existing PR issue comments",
            Operation::ReviewComments => {
                "show review threads (inline comments) with status, paths and comment IDs"
            }
            Operation::Review => {
                "clone the PR, run the code review and print the result (posts nothing)"
            }
            Operation::Comment => "post an issue comment on the PR",
            Operation::ReplyComment => {
                "reply in a review thread (comment IDs come from `review-comments`)"
            }
            Operation::SubmitReview => {
                "submit a review with inline comments; EVENT is COMMENT or REQUEST_CHANGES; \
                 json: {\"body\":\"summary\",\"comments\":[{\"path\":\"file.py\",\"line\":10,\"body\":\"issue\"}]}"
            }
            Operation::Approve => "approve the PR (resolves all open review threads first)",
        }
    }

    /// Full usage line for `target`, e.g. `just comment acme/repo 42 "<message>"`.
    pub fn usage(self, target: &Target) -> String {
        format!(
            "just {} {} {}{}",
            self.recipe(),
            target.repo,
            target.pr,
            self.extra_args()
        )
    }

    pub fn from_recipe(name: &str) -> Option<Operation> {
        Operation::ALL.into_iter().find(|op| op.recipe() == name)
    }
}

/// Name of the `just` recipe a shell command invokes, if it is one of the
/// named operations.
pub fn operation_of(command: &str) -> Option<Operation> {
    let mut words = command.split_whitespace();
    if words.next()? != "just" {
        return None;
    }
    Operation::from_recipe(words.next()?)
}

/// Materialise the agent prompt for one run.
pub fn render_prompt(target: &Target, trigger: &str, clone_dir: &Path, bot_login: &str) -> String {
    let repo = &target.repo;
    let pr = target.pr;
    let clone_dir = clone_dir.display();

    let mut p = String::with_capacity(4096);
    let _ = writeln!(p, "You are Agent Fedor ({bot_login}), an automated code reviewer.");
    p.push('\n');
    let _ = writeln!(p, "Repository: {repo}");
    let _ = writeln!(p, "Pull Request: #{pr}");
    let _ = writeln!(p, "Trigger: {trigger}");
    p.push('\n');
    let _ = writeln!(p, "Clone directory: {clone_dir}");
    let _ = writeln!(
        p,
        "Once `just review` has run, the checked-out code is under {clone_dir}/<sha> and can be read directly."
    );
    p.push('\n');
    p.push_str("Available commands:\n\n");
    for op in Operation::ALL {
        let _ = writeln!(p, "  {:<66} : {}", op.usage(target), op.summary());
    }
    p.push('\n');
    p.push_str("Rules:\n");
    let _ = writeln!(
        p,
        "- Comments from \"{bot_login}\" are your own earlier comments, not developer feedback."
    );
    p.push_str(
        "- Comments from anyone else are developer feedback; respect their decisions.\n\
         - If a developer dismissed a concern as intentional or out of scope, do not raise it again.\n\
         - You run unattended as a background service. Act on your decisions; never ask for \
         permission or offer options.\n\
         - Output printed to stdout is discarded. The only channel is the PR, through the `just` commands.\n\
         - Every run must end with `just submit-review`, `just approve` or `just comment`.\n\
         - Every `just` command must be a single line. Write \\n for line breaks inside messages; \
         multi-line commands are rejected.\n",
    );
    p.push('\n');
    p.push_str("Your task:\n");
    let _ = writeln!(
        p,
        "1. Run `just comments {repo} {pr}` and `just review-comments {repo} {pr}` to read the existing discussion."
    );
    p.push_str("2. Decide what to do from the trigger and that context:\n");
    let _ = writeln!(
        p,
        "   - New PR or new commits: run `just review {repo} {pr}`. If it finds issues, submit them \
         with `just submit-review {repo} {pr} COMMENT '<json>'` (REQUEST_CHANGES for blocking issues). \
         If the code is clean, `just approve {repo} {pr} \"<summary>\"`."
    );
    let _ = writeln!(
        p,
        "   - Developer reply in a review thread: read the thread via `just review-comments {repo} {pr}` \
         and answer with `just reply-comment {repo} {pr} <comment_id> \"<response>\"`. Approve once \
         every concern is addressed."
    );
    p.push_str("   - Developer issue comment: read what was asked and respond.\n");
    p.push_str("3. Prefer inline review comments over issue comments for code-specific feedback.\n");
    let _ = writeln!(
        p,
        "4. When the code is ready, run `just approve {repo} {pr} \"<summary>\"` right away."
    );
    p.push_str("5. With real blocking issues outstanding, do not approve; the review comments stand.\n");
    p
}
