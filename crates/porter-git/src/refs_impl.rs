//! gix-backed revision resolution.

use crate::error::GitError;
use crate::gix_repo::{GixRepo, from_gix_oid};
use crate::types::GitOid;

pub fn rev_parse(repo: &GixRepo, spec: &str) -> Result<GitOid, GitError> {
    let spec = spec.trim();
    if spec.is_empty() {
        return Err(GitError::NotFound {
            message: "empty revision".to_owned(),
        });
    }
    let id = repo
        .repo
        .rev_parse_single(spec)
        .map_err(|e| GitError::NotFound {
            message: format!("rev-parse '{spec}': {e}"),
        })?;
    from_gix_oid(id.as_ref())
}
