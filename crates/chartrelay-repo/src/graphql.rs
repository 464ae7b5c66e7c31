//! Signed commits through the `createCommitOnBranch` GraphQL mutation
//!
//! The hosting platform signs commits created this way. The expected head
//! OID makes the mutation fail instead of overwriting a branch that moved.

use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

use crate::error::{RepoError, Result};

pub const CREATE_COMMIT_MUTATION: &str = "mutation ($input: CreateCommitOnBranchInput!) {
  createCommitOnBranch(input: $input) {
    commit {
      oid
      url
    }
  }
}";

/// Mutation input
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommitOnBranchInput {
    pub branch: CommittableBranch,
    pub expected_head_oid: String,
    pub file_changes: FileChanges,
    pub message: CommitMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittableBranch {
    /// `owner/name`
    pub repository_name_with_owner: String,
    pub branch_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileChanges {
    pub additions: Vec<FileAddition>,
    pub deletions: Vec<FileDeletion>,
}

impl FileChanges {
    pub fn len(&self) -> usize {
        self.additions.len() + self.deletions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// File added or modified by the commit
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileAddition {
    pub path: String,
    /// Base64 encoded file content
    pub contents: String,
}

impl FileAddition {
    pub fn new(path: impl Into<String>, contents: &[u8]) -> Self {
        Self {
            path: path.into(),
            contents: base64::engine::general_purpose::STANDARD.encode(contents),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileDeletion {
    pub path: String,
}

impl FileDeletion {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitMessage {
    pub headline: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

impl CommitMessage {
    /// Split a message into headline (first line) and body
    pub fn parse(message: &str) -> Self {
        let message = message.trim();
        match message.split_once('\n') {
            Some((headline, body)) if !body.trim().is_empty() => Self {
                headline: headline.trim().to_string(),
                body: Some(body.trim().to_string()),
            },
            Some((headline, _)) => Self {
                headline: headline.trim().to_string(),
                body: None,
            },
            None => Self {
                headline: message.to_string(),
                body: None,
            },
        }
    }
}

/// A created commit
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CommitInfo {
    pub oid: String,
    #[serde(default)]
    pub url: Option<String>,
}

/// Request body of a GraphQL call
#[derive(Debug, Serialize)]
pub struct GraphQlRequest<'a, V: Serialize> {
    pub query: &'a str,
    pub variables: V,
}

#[derive(Debug, Serialize)]
pub struct InputVariables<'a> {
    pub input: &'a CreateCommitOnBranchInput,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlResponse<T> {
    pub data: Option<T>,
    #[serde(default)]
    pub errors: Vec<GraphQlError>,
}

#[derive(Debug, Deserialize)]
pub struct GraphQlError {
    pub message: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommitData {
    pub create_commit_on_branch: Option<CreateCommitPayload>,
}

#[derive(Debug, Deserialize)]
pub struct CreateCommitPayload {
    pub commit: Option<CommitInfo>,
}

impl GraphQlResponse<CreateCommitData> {
    /// Commit of a successful mutation, or the reported errors
    pub fn into_commit(self) -> Result<CommitInfo> {
        if !self.errors.is_empty() {
            let message = self
                .errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(RepoError::GraphQl { message });
        }

        self.data
            .and_then(|d| d.create_commit_on_branch)
            .and_then(|p| p.commit)
            .ok_or_else(|| RepoError::GraphQl {
                message: "response carries no commit".to_string(),
            })
    }
}

/// Transport for the signed commit mutation
#[async_trait]
pub trait CommitApi: Send + Sync {
    async fn create_commit_on_branch(&self, input: &CreateCommitOnBranchInput)
    -> Result<CommitInfo>;
}
