use url::Url;

use crate::error::SyncError;

const BLOB_SEPARATOR: &str = "/-/blob/";

/// Rewrite a GitLab browser URL (`.../{repo}/-/blob/{branch}/{path}`) into the
/// raw file endpoint of the GitLab REST API.
pub fn raw_file_url(blob_url: &str) -> Result<String, SyncError> {
    let url = Url::parse(blob_url)
        .map_err(|e| SyncError::invalid(format!("Invalid GitLab URL '{blob_url}': {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| SyncError::invalid(format!("GitLab URL '{blob_url}' has no host")))?;
    let authority = match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    };

    let (repo, rest) = url.path().split_once(BLOB_SEPARATOR).ok_or_else(|| {
        SyncError::invalid(format!(
            "GitLab URL '{blob_url}' does not contain '{BLOB_SEPARATOR}'"
        ))
    })?;
    let repo = repo.trim_start_matches('/');
    let (branch, file_path) = rest.split_once('/').ok_or_else(|| {
        SyncError::invalid(format!("GitLab URL '{blob_url}' does not name a file"))
    })?;

    if repo.is_empty() || branch.is_empty() || file_path.is_empty() {
        return Err(SyncError::invalid(format!(
            "GitLab URL '{blob_url}' must name a repository, branch and file"
        )));
    }

    Ok(format!(
        "{}://{}/api/v4/projects/{}/repository/files/{}/raw?ref={}",
        url.scheme(),
        authority,
        encode(repo),
        encode(file_path),
        encode(branch),
    ))
}

// The path arrives percent-encoded from `Url`, decode first so it isn't encoded twice.
fn encode(segment: &str) -> String {
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    urlencoding::encode(&decoded).into_owned()
}
