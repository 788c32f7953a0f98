//! Git helpers: remote tag listing, ref resolution and shallow clones.

use semver::Version;
use serde::{Deserialize, Serialize};
use std::path::Path;
use texasbbq_process::{CommandOutput, CommandSpec, ProcessExecutor, Result};

/// How to pick "the latest release" out of a remote's tags.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleasePolicy {
    /// Accept tags written as `v1.2.3` as well as `1.2.3`.
    #[serde(default)]
    pub v_prefix: bool,

    /// Ignore tags starting with this prefix.
    #[serde(default)]
    pub exclude_prefix: Option<String>,
}

/// Pick the newest non-prerelease tag allowed by `policy`.
///
/// Tags that are not versions (`nightly`, `docs-2019`) or are prereleases
/// (`1.0.0-rc.1`) are ignored. Short versions such as `0.5` count as
/// `0.5.0`. Returns the tag as spelled on the remote.
pub fn resolve_ref<S: AsRef<str>>(remote_tags: &[S], policy: &ReleasePolicy) -> Option<String> {
    remote_tags
        .iter()
        .map(AsRef::as_ref)
        .filter(|tag| match &policy.exclude_prefix {
            Some(prefix) => !tag.starts_with(prefix.as_str()),
            None => true,
        })
        .filter_map(|tag| {
            let bare = if policy.v_prefix {
                tag.strip_prefix('v').unwrap_or(tag)
            } else {
                tag
            };
            let version = parse_release(bare)?;
            Some((version, tag))
        })
        .max_by(|(a, _), (b, _)| a.cmp(b))
        .map(|(_, tag)| tag.to_string())
}

fn parse_release(raw: &str) -> Option<Version> {
    let version = match Version::parse(raw) {
        Ok(v) => v,
        Err(_) => {
            let parts: Vec<&str> = raw.split('.').collect();
            if parts.is_empty()
                || parts.len() > 3
                || !parts
                    .iter()
                    .all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
            {
                return None;
            }
            let mut padded = parts.clone();
            padded.resize(3, "0");
            Version::parse(&padded.join(".")).ok()?
        }
    };
    version.pre.is_empty().then_some(version)
}

/// Tag names from `git ls-remote --tags --refs` output.
pub fn parse_ls_remote(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| line.split('\t').nth(1))
        .filter_map(|reference| reference.trim().strip_prefix("refs/tags/"))
        .map(str::to_string)
        .collect()
}

/// List the tags of the remote at `url`.
pub fn ls_remote_tags(executor: &dyn ProcessExecutor, url: &str) -> Result<Vec<String>> {
    let output = executor.check(&CommandSpec::new("git").args(["ls-remote", "--tags", "--refs", url]))?;
    Ok(parse_ls_remote(&output.stdout))
}

/// Shallow clone of `git_ref` from `url` into `dest`.
pub fn clone_ref(
    executor: &dyn ProcessExecutor,
    url: &str,
    git_ref: &str,
    dest: &Path,
) -> Result<CommandOutput> {
    executor.check(
        &CommandSpec::new("git")
            .args(["clone", "-b", git_ref, url, "--depth=1"])
            .arg(dest.to_string_lossy()),
    )
}
