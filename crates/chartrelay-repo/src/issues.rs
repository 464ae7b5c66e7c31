//! Issue lookups for release notes

use async_trait::async_trait;
use chartrelay_core::{Chart, IssueRef};

/// Source of closed issues referenced by a chart release
///
/// Lookups never fail: an unavailable tracker yields no issues.
#[async_trait]
pub trait IssueTracker: Send + Sync {
    async fn closed_issues(&self, chart: &Chart) -> Vec<IssueRef>;
}

/// Tracker that never reports issues
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIssues;

#[async_trait]
impl IssueTracker for NoIssues {
    async fn closed_issues(&self, _chart: &Chart) -> Vec<IssueRef> {
        Vec::new()
    }
}
