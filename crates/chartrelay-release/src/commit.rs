//! Signed commits of generated files

use chartrelay_core::{ArtifactStore, ChangedFile, FileStatus};
use chartrelay_repo::{
    CommitApi, CommitInfo, CommitMessage, CommittableBranch, CreateCommitOnBranchInput,
    FileAddition, FileChanges, FileDeletion,
};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::{ReleaseError, Result};

/// Builds `createCommitOnBranch` mutations for one repository
pub struct SignedCommitBuilder {
    api: Arc<dyn CommitApi>,
    /// `owner/name`
    repository: String,
}

impl SignedCommitBuilder {
    pub fn new(api: Arc<dyn CommitApi>, repository: impl Into<String>) -> Self {
        Self {
            api,
            repository: repository.into(),
        }
    }

    /// Commit additions and deletions on top of `expected_head`
    ///
    /// Returns `None` without calling the API when there is nothing to
    /// commit. The mutation fails if the branch no longer points at
    /// `expected_head`.
    pub async fn commit(
        &self,
        branch: &str,
        expected_head: &str,
        changes: FileChanges,
        message: &str,
    ) -> Result<Option<CommitInfo>> {
        if branch.trim().is_empty() {
            return Err(ReleaseError::EmptyBranch);
        }
        if expected_head.trim().is_empty() {
            return Err(ReleaseError::EmptyHead);
        }
        if message.trim().is_empty() {
            return Err(ReleaseError::EmptyMessage);
        }
        if changes.is_empty() {
            debug!(branch, "nothing to commit");
            return Ok(None);
        }

        let count = changes.len();
        let input = CreateCommitOnBranchInput {
            branch: CommittableBranch {
                repository_name_with_owner: self.repository.clone(),
                branch_name: branch.to_string(),
            },
            expected_head_oid: expected_head.to_string(),
            file_changes: changes,
            message: CommitMessage::parse(message),
        };

        let commit = self.api.create_commit_on_branch(&input).await?;
        info!(branch, oid = %commit.oid, files = count, "signed commit created");
        Ok(Some(commit))
    }
}

/// File changes of a staged diff, with contents read from the store
pub fn changes_from_staged(
    store: &dyn ArtifactStore,
    staged: &[ChangedFile],
) -> Result<FileChanges> {
    let mut changes = FileChanges::default();

    for file in staged {
        match file.status {
            FileStatus::Removed => changes.deletions.push(FileDeletion::new(&file.path)),
            FileStatus::Added | FileStatus::Modified | FileStatus::Renamed => {
                let contents = store.read(Path::new(&file.path))?;
                changes
                    .additions
                    .push(FileAddition::new(&file.path, &contents));
            }
        }
    }

    Ok(changes)
}
