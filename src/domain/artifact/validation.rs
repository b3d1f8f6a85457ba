//! Source URL and path validation for artifact requests

use std::path::{Component, Path, PathBuf};

use reqwest::Url;

use crate::domain::error::ProvisionError;

/// Parse an http(s) source URL
pub fn parse_source_url(url: &str) -> Result<Url, ProvisionError> {
    let parsed = Url::parse(url.trim())
        .map_err(|e| ProvisionError::invalid_source(url, format!("not a valid URL: {}", e)))?;

    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(ProvisionError::invalid_source(
            url,
            format!("unsupported scheme '{}'", other),
        )),
    }
}

/// Directory name a repository is cloned into: the repo segment of
/// `<host_prefix><owner>/<repo>[.git]`.
pub fn repository_dir_name(url: &str, host_prefix: &str) -> Result<String, ProvisionError> {
    let trimmed = url.trim();
    let remainder = trimmed.strip_prefix(host_prefix).ok_or_else(|| {
        ProvisionError::invalid_source(url, format!("expected a URL under '{}'", host_prefix))
    })?;

    let path = remainder
        .split(['?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('/');
    let segments: Vec<&str> = path.split('/').collect();

    let [owner, repo] = segments.as_slice() else {
        return Err(ProvisionError::invalid_source(
            url,
            "expected exactly an owner and a repository segment",
        ));
    };

    if owner.is_empty() {
        return Err(ProvisionError::invalid_source(url, "missing owner segment"));
    }

    let name = repo.strip_suffix(".git").unwrap_or(*repo);
    validate_file_name(name).map_err(|_| {
        ProvisionError::invalid_source(url, "missing or invalid repository segment")
    })?;

    Ok(name.to_string())
}

/// Name of a model repository, the last segment of `<host>/<owner>/<repo>`
pub fn model_repository_name(url: &str) -> Result<String, ProvisionError> {
    let parsed = parse_source_url(url)?;
    let segments: Vec<&str> = parsed
        .path_segments()
        .map(|segments| segments.filter(|s| !s.is_empty()).collect())
        .unwrap_or_default();

    let [.., owner, repo] = segments.as_slice() else {
        return Err(ProvisionError::invalid_source(
            url,
            "expected an owner and a repository segment",
        ));
    };

    let name = repo.strip_suffix(".git").unwrap_or(*repo);
    if owner.is_empty() || validate_file_name(name).is_err() {
        return Err(ProvisionError::invalid_source(url, "invalid repository segment"));
    }

    Ok(name.to_string())
}

/// File name for a downloaded weight: the explicit name when given, otherwise
/// the last URL path segment without its query string.
pub fn weight_file_name(url: &str, explicit: Option<&str>) -> Result<String, ProvisionError> {
    if let Some(name) = explicit {
        validate_file_name(name).map_err(|reason| ProvisionError::invalid_source(url, reason))?;
        return Ok(name.to_string());
    }

    let parsed = parse_source_url(url)?;
    let last = parsed
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default();

    validate_file_name(last).map_err(|_| {
        ProvisionError::invalid_source(url, "cannot derive a file name from the URL path")
    })?;

    Ok(last.to_string())
}

/// Destination directories are relative and stay under the models root
pub fn validate_destination(destination: &str) -> Result<PathBuf, ProvisionError> {
    let path = Path::new(destination.trim());

    if path.as_os_str().is_empty() {
        return Err(ProvisionError::invalid_source(
            destination,
            "destination must not be empty",
        ));
    }

    if !path.components().all(|c| matches!(c, Component::Normal(_))) {
        return Err(ProvisionError::invalid_source(
            destination,
            "destination must be a relative path without '..'",
        ));
    }

    Ok(path.to_path_buf())
}

/// A plain file name: non-empty, no separators, not `.` or `..`
pub fn validate_file_name(name: &str) -> Result<(), String> {
    if name.is_empty() {
        return Err("file name must not be empty".to_string());
    }

    if name == "." || name == ".." {
        return Err(format!("'{}' is not a file name", name));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(format!("'{}' must not contain path separators", name));
    }

    Ok(())
}
