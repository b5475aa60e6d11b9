/// Errors that can occur while configuring, building, or operating the [`crate::UpdateHub`].
#[derive(Debug, thiserror::Error)]
pub enum UpdateHubError {
    #[error("a repository in the form 'owner/name' is required")]
    MissingRepository,

    #[error("a GitHub token requires a public base URL so clients download through this server")]
    TokenRequiresBaseUrl,

    #[error("github client initialization failed: {0}")]
    GitHubInit(#[from] octocrab::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("upstream fetch exhausted its retry budget: {0}")]
    FetchExhausted(String),
}
