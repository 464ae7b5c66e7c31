//! In-memory collaborators for testing
//!
//! These doubles keep their state in memory and count the operations
//! performed on them, so pipelines can be exercised without a network.

use async_trait::async_trait;
use chartrelay_core::package::sha256_hex;
use chartrelay_core::{Chart, ChartRef, IssueRef, Package};
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};

use crate::error::{RepoError, Result};
use crate::graphql::{CommitApi, CommitInfo, CreateCommitOnBranchInput};
use crate::issues::IssueTracker;
use crate::oci::{OciPublisher, PushOutcome};
use crate::releases::{NewRelease, Release, ReleaseApi, ReleaseAsset};

/// Base timestamp of mock releases; release `n` is published `n` seconds later
const EPOCH_OFFSET: i64 = 1_700_000_000;

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone)]
pub struct OperationCounts {
    pub gets: usize,
    pub lists: usize,
    pub creates: usize,
    pub uploads: usize,
    pub downloads: usize,
    pub deletes: usize,
}

#[derive(Default)]
struct ReleaseState {
    releases: Vec<Release>,
    asset_data: HashMap<u64, Vec<u8>>,
    next_id: u64,
    deleted_tags: Vec<String>,
    deleted_packages: Vec<String>,
    failing_uploads: HashSet<String>,
}

impl ReleaseState {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// In-memory release host
#[derive(Clone, Default)]
pub struct MockReleaseApi {
    state: Arc<RwLock<ReleaseState>>,
    operations: Arc<RwLock<OperationCounts>>,
}

impl MockReleaseApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a published release carrying one asset
    pub fn add_release(&self, tag: &str, file_name: &str, data: &[u8]) -> Release {
        let mut state = self.state.write().unwrap();
        let id = state.next_id();
        let mut release = mock_release(id, NewRelease::new(tag, ""));
        let asset = mock_asset(state.next_id(), tag, file_name, data);
        state.asset_data.insert(asset.id, data.to_vec());
        release.assets.push(asset);
        state.releases.push(release.clone());
        release
    }

    /// Make uploads to the release with this tag fail
    pub fn fail_uploads_for(&self, tag: &str) {
        self.state
            .write()
            .unwrap()
            .failing_uploads
            .insert(tag.to_string());
    }

    pub fn operation_counts(&self) -> OperationCounts {
        self.operations.read().unwrap().clone()
    }

    pub fn reset_counts(&self) {
        *self.operations.write().unwrap() = OperationCounts::default();
    }

    pub fn releases(&self) -> Vec<Release> {
        self.state.read().unwrap().releases.clone()
    }

    pub fn release_count(&self) -> usize {
        self.state.read().unwrap().releases.len()
    }

    pub fn deleted_tags(&self) -> Vec<String> {
        self.state.read().unwrap().deleted_tags.clone()
    }

    pub fn deleted_packages(&self) -> Vec<String> {
        self.state.read().unwrap().deleted_packages.clone()
    }

    fn count(&self, f: impl FnOnce(&mut OperationCounts)) {
        f(&mut self.operations.write().unwrap());
    }
}

fn mock_release(id: u64, new: NewRelease) -> Release {
    let timestamp = DateTime::<Utc>::from_timestamp(EPOCH_OFFSET + id as i64, 0);
    Release {
        id,
        tag_name: new.tag_name,
        name: Some(new.name),
        body: Some(new.body),
        draft: new.draft,
        prerelease: new.prerelease,
        created_at: timestamp,
        published_at: timestamp,
        assets: Vec::new(),
    }
}

fn mock_asset(id: u64, tag: &str, file_name: &str, data: &[u8]) -> ReleaseAsset {
    ReleaseAsset {
        id,
        name: file_name.to_string(),
        label: None,
        content_type: Some("application/gzip".to_string()),
        size: data.len() as u64,
        url: format!("https://api.example.com/assets/{}", id),
        browser_download_url: format!(
            "https://example.com/releases/download/{}/{}",
            tag, file_name
        ),
        digest: Some(format!("sha256:{}", sha256_hex(data))),
    }
}

#[async_trait]
impl ReleaseApi for MockReleaseApi {
    async fn get_release_by_tag(&self, tag: &str) -> Result<Option<Release>> {
        self.count(|ops| ops.gets += 1);
        let state = self.state.read().unwrap();
        Ok(state.releases.iter().find(|r| r.tag_name == tag).cloned())
    }

    async fn list_releases(&self) -> Result<Vec<Release>> {
        self.count(|ops| ops.lists += 1);
        Ok(self.releases())
    }

    async fn create_release(&self, release: &NewRelease) -> Result<Release> {
        self.count(|ops| ops.creates += 1);
        let mut state = self.state.write().unwrap();
        if state
            .releases
            .iter()
            .any(|r| r.tag_name == release.tag_name)
        {
            return Err(RepoError::HttpError {
                status: 422,
                message: "Validation Failed: already_exists".to_string(),
            });
        }
        let id = state.next_id();
        let created = mock_release(id, release.clone());
        state.releases.push(created.clone());
        Ok(created)
    }

    async fn upload_asset(
        &self,
        release: &Release,
        file_name: &str,
        label: &str,
        data: Vec<u8>,
    ) -> Result<ReleaseAsset> {
        self.count(|ops| ops.uploads += 1);
        let mut state = self.state.write().unwrap();
        if state.failing_uploads.contains(&release.tag_name) {
            return Err(RepoError::HttpError {
                status: 502,
                message: "Bad Gateway".to_string(),
            });
        }

        let mut asset = mock_asset(state.next_id(), &release.tag_name, file_name, &data);
        asset.label = Some(label.to_string());
        state.asset_data.insert(asset.id, data);

        let stored = state
            .releases
            .iter_mut()
            .find(|r| r.id == release.id)
            .ok_or_else(|| RepoError::NotFound {
                resource: format!("release {}", release.id),
            })?;
        stored.assets.push(asset.clone());
        Ok(asset)
    }

    async fn download_asset(&self, asset: &ReleaseAsset) -> Result<Vec<u8>> {
        self.count(|ops| ops.downloads += 1);
        self.state
            .read()
            .unwrap()
            .asset_data
            .get(&asset.id)
            .cloned()
            .ok_or_else(|| RepoError::NotFound {
                resource: format!("asset {}", asset.name),
            })
    }

    async fn delete_release(&self, release: &Release) -> Result<()> {
        self.count(|ops| ops.deletes += 1);
        let mut state = self.state.write().unwrap();
        state.releases.retain(|r| r.id != release.id);
        Ok(())
    }

    async fn delete_tag(&self, tag: &str) -> Result<()> {
        self.count(|ops| ops.deletes += 1);
        self.state
            .write()
            .unwrap()
            .deleted_tags
            .push(tag.to_string());
        Ok(())
    }

    async fn delete_package(&self, package: &str) -> Result<()> {
        self.count(|ops| ops.deletes += 1);
        self.state
            .write()
            .unwrap()
            .deleted_packages
            .push(package.to_string());
        Ok(())
    }
}

/// Records signed commit requests
#[derive(Clone, Default)]
pub struct MockCommitApi {
    requests: Arc<RwLock<Vec<CreateCommitOnBranchInput>>>,
    failure: Arc<RwLock<Option<String>>>,
}

impl MockCommitApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every mutation fail with this message
    pub fn fail_with(&self, message: &str) {
        *self.failure.write().unwrap() = Some(message.to_string());
    }

    pub fn requests(&self) -> Vec<CreateCommitOnBranchInput> {
        self.requests.read().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.requests.read().unwrap().len()
    }
}

#[async_trait]
impl CommitApi for MockCommitApi {
    async fn create_commit_on_branch(
        &self,
        input: &CreateCommitOnBranchInput,
    ) -> Result<CommitInfo> {
        let mut requests = self.requests.write().unwrap();
        requests.push(input.clone());

        if let Some(message) = self.failure.read().unwrap().clone() {
            return Err(RepoError::GraphQl { message });
        }

        Ok(CommitInfo {
            oid: format!("commit-{}", requests.len()),
            url: None,
        })
    }
}

#[derive(Default)]
struct RegistryState {
    authenticated: bool,
    auth_scopes: Vec<String>,
    present: HashSet<String>,
    pushed: Vec<String>,
    deleted: Vec<ChartRef>,
    failing: HashSet<String>,
}

/// In-memory registry; references are `<kind>/<name>:<version>`
#[derive(Clone, Default)]
pub struct MockOciPublisher {
    state: Arc<RwLock<RegistryState>>,
}

impl MockOciPublisher {
    /// A registry that accepts the login
    pub fn new() -> Self {
        let publisher = Self::default();
        publisher.state.write().unwrap().authenticated = true;
        publisher
    }

    /// A registry that rejects the login
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    /// Seed a reference as already pushed
    pub fn with_present(self, reference: &str) -> Self {
        self.state
            .write()
            .unwrap()
            .present
            .insert(reference.to_string());
        self
    }

    /// Make pushes of this chart name fail
    pub fn fail_for(&self, name: &str) {
        self.state
            .write()
            .unwrap()
            .failing
            .insert(name.to_string());
    }

    pub fn pushed(&self) -> Vec<String> {
        self.state.read().unwrap().pushed.clone()
    }

    pub fn deleted(&self) -> Vec<ChartRef> {
        self.state.read().unwrap().deleted.clone()
    }

    /// Scopes of every login attempt
    pub fn auth_scopes(&self) -> Vec<String> {
        self.state.read().unwrap().auth_scopes.clone()
    }
}

#[async_trait]
impl OciPublisher for MockOciPublisher {
    async fn authenticate(&self, packages: &[Package]) -> bool {
        let mut state = self.state.write().unwrap();
        state.auth_scopes.extend(crate::oci::auth_scopes(packages));
        state.authenticated
    }

    async fn publish(&self, package: &Package) -> Result<PushOutcome> {
        let reference = format!("{}/{}:{}", package.kind, package.name, package.version);
        let mut state = self.state.write().unwrap();

        if state.failing.contains(&package.name) {
            return Err(RepoError::OciPushFailed {
                message: format!("push of {} rejected", reference),
            });
        }
        if state.present.contains(&reference) {
            return Ok(PushOutcome::AlreadyPresent);
        }

        state.present.insert(reference.clone());
        state.pushed.push(reference.clone());
        Ok(PushOutcome::Pushed { reference })
    }

    async fn delete(&self, chart: &ChartRef) -> Result<()> {
        let mut state = self.state.write().unwrap();
        let prefix = format!("{}/{}:", chart.kind, chart.name);
        state.present.retain(|r| !r.starts_with(&prefix));
        state.deleted.push(chart.clone());
        Ok(())
    }
}

/// Issue tracker with canned answers per chart name
#[derive(Clone, Default)]
pub struct MockIssueTracker {
    issues: Arc<RwLock<HashMap<String, Vec<IssueRef>>>>,
    calls: Arc<RwLock<usize>>,
}

impl MockIssueTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_issue(self, chart: &str, number: u64, title: &str) -> Self {
        self.issues
            .write()
            .unwrap()
            .entry(chart.to_string())
            .or_default()
            .push(IssueRef {
                number,
                title: title.to_string(),
                url: format!("https://example.com/issues/{}", number),
            });
        self
    }

    pub fn call_count(&self) -> usize {
        *self.calls.read().unwrap()
    }
}

#[async_trait]
impl IssueTracker for MockIssueTracker {
    async fn closed_issues(&self, chart: &Chart) -> Vec<IssueRef> {
        *self.calls.write().unwrap() += 1;
        self.issues
            .read()
            .unwrap()
            .get(&chart.name)
            .cloned()
            .unwrap_or_default()
    }
}
