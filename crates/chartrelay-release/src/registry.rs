//! Registry mirroring phase

use chartrelay_core::Package;
use chartrelay_repo::{OciPublisher, PushOutcome};
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::info;

use crate::error::{ReleaseError, Result, Stage, StageContext, StageError};
use crate::summary::{RegistrySummary, absorb};

/// Pushes packages of the current run to the OCI registry
pub struct RegistryPhase {
    publisher: Option<Arc<dyn OciPublisher>>,
    concurrency: usize,
}

impl RegistryPhase {
    /// `None` disables the phase
    pub fn new(publisher: Option<Arc<dyn OciPublisher>>, concurrency: usize) -> Self {
        Self {
            publisher,
            concurrency: concurrency.max(1),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.publisher.is_some()
    }

    pub fn publisher(&self) -> Option<&Arc<dyn OciPublisher>> {
        self.publisher.as_ref()
    }

    /// Push packages; a failed login skips the whole phase
    pub async fn publish(&self, packages: &[Package]) -> Result<RegistrySummary> {
        let mut summary = RegistrySummary::default();

        let Some(publisher) = &self.publisher else {
            summary.disabled = true;
            return Ok(summary);
        };
        if packages.is_empty() {
            return Ok(summary);
        }

        if !publisher.authenticate(packages).await {
            let gate = StageError::new("*", Stage::Authenticate, ReleaseError::RegistryAuth);
            summary.unauthenticated = true;
            absorb(&mut summary.failures, gate)?;
            return Ok(summary);
        }

        let results: Vec<std::result::Result<PushOutcome, StageError>> = stream::iter(packages)
            .map(|package| async move {
                publisher
                    .publish(package)
                    .await
                    .stage(&package.name, Stage::Push)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                Ok(PushOutcome::Pushed { .. }) => summary.pushed += 1,
                Ok(PushOutcome::AlreadyPresent) => summary.skipped += 1,
                Err(e) => absorb(&mut summary.failures, e)?,
            }
        }

        info!(
            pushed = summary.pushed,
            skipped = summary.skipped,
            failed = summary.failed(),
            "registry phase finished"
        );
        Ok(summary)
    }
}
