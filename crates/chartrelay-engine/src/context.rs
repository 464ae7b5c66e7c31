//! Rendering contexts
//!
//! Typed values handed to templates. Field names are the template variables.

use chartrelay_core::{Chart, ChartDependency, ChartKind, IssueRef, PipelineConfig};
use serde::Serialize;

/// Chart fields exposed to the notes template
#[derive(Debug, Clone, Serialize)]
pub struct ChartSummary {
    pub name: String,
    pub version: String,
    pub kind: ChartKind,
    pub directory: String,
    pub description: Option<String>,
    pub app_version: Option<String>,
    pub kube_version: Option<String>,
    pub icon: Option<String>,
    pub has_icon: bool,
    /// Icon file in the chart directory, served from the release tag
    pub icon_file: Option<String>,
    pub sources: Vec<String>,
}

/// A dependency resolved to something a reader can click
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyLink {
    pub name: String,
    pub version: Option<String>,
    /// `None` when the dependency declares no repository
    pub link: Option<String>,
}

impl DependencyLink {
    /// Resolve a manifest dependency
    ///
    /// `file://` dependencies point at charts of this repository and link to
    /// their documentation page; anything else links to its repository.
    /// A dependency without a repository gets no link.
    pub fn resolve(dep: &ChartDependency, config: &PipelineConfig) -> Self {
        let link = match dep.repository.as_deref() {
            Some(repo) if dep.is_local() => {
                let library_root = config.root_for(ChartKind::Library);
                let kind = if repo.contains(&format!("{}/", library_root))
                    || repo.ends_with(library_root)
                {
                    ChartKind::Library
                } else {
                    ChartKind::Application
                };
                Some(config.docs_url_for(kind, &dep.name))
            }
            Some(repo) => Some(repo.to_string()),
            None => None,
        };

        Self {
            name: dep.alias.clone().unwrap_or_else(|| dep.name.clone()),
            version: dep.version.clone(),
            link,
        }
    }
}

/// Context of the release notes template
#[derive(Debug, Clone, Serialize)]
pub struct NotesContext {
    pub chart: ChartSummary,
    pub tag: String,
    pub dependencies: Vec<DependencyLink>,
    pub issues: Vec<IssueRef>,
    pub repository_url: String,
    pub docs_url: String,
}

impl NotesContext {
    pub fn new(chart: &Chart, tag: &str, issues: Vec<IssueRef>, config: &PipelineConfig) -> Self {
        let metadata = &chart.metadata;

        Self {
            chart: ChartSummary {
                name: chart.name.clone(),
                version: chart.version.clone(),
                kind: chart.kind,
                directory: chart.directory.to_string_lossy().replace('\\', "/"),
                description: metadata.description.clone(),
                app_version: metadata.app_version.clone(),
                kube_version: metadata.kube_version.clone(),
                icon: metadata.icon.clone(),
                has_icon: chart.has_icon(),
                icon_file: chart.icon_file.clone(),
                sources: metadata.sources.clone(),
            },
            tag: tag.to_string(),
            dependencies: metadata
                .dependencies
                .iter()
                .map(|d| DependencyLink::resolve(d, config))
                .collect(),
            issues,
            repository_url: config.repository.url.trim_end_matches('/').to_string(),
            docs_url: config.docs_url_for(chart.kind, &chart.name),
        }
    }
}

/// Context of the redirect page template
#[derive(Debug, Clone, Serialize)]
pub struct RedirectContext {
    pub name: String,
    pub url: String,
}
