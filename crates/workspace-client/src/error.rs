use connectors::http::error::HttpError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("The '{0}' API is not implemented (supported: repos, sql)")]
    NotImplemented(String),

    /// HTTP 400 with the upstream error payload.
    #[error("Workspace API 400 error: {message} ({error_code})")]
    BadRequest { message: String, error_code: String },

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error("Invalid workspace URL '{0}'")]
    InvalidUrl(String),
}

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Repo not found, please expand your search criteria.")]
    NotFound,

    #[error("{0} repos found, please narrow your search criteria.")]
    Ambiguous(usize),

    #[error("Supplied path should be in the form: (/Repos/)<folder-name>/<repo-name>, got '{0}'")]
    InvalidPath(String),

    #[error("No repo loaded, call get_repo or clone first")]
    NotLoaded,

    #[error("Repo has no {0} to pull")]
    MissingField(&'static str),

    #[error(transparent)]
    Api(#[from] ApiError),
}
