//! Issue references embedded in release notes

use serde::{Deserialize, Serialize};

/// A closed issue linked to a chart release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub number: u64,
    pub title: String,
    pub url: String,
}
