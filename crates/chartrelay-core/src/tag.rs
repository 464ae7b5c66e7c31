//! Release tag templates
//!
//! The same template yields the tag of one chart version and the prefix
//! shared by every release of that chart.

use semver::Version;

use crate::error::{CoreError, Result};

const NAME_PLACEHOLDER: &str = "{name}";
const VERSION_PLACEHOLDER: &str = "{version}";

/// Template such as `{name}-{version}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagTemplate {
    template: String,
}

impl TagTemplate {
    /// Create a template; it must mention both placeholders
    pub fn new(template: impl Into<String>) -> Result<Self> {
        let template = template.into();
        for placeholder in [NAME_PLACEHOLDER, VERSION_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(CoreError::InvalidConfig {
                    message: format!(
                        "release title template '{}' is missing {}",
                        template, placeholder
                    ),
                });
            }
        }
        Ok(Self { template })
    }

    pub fn as_str(&self) -> &str {
        &self.template
    }

    /// Tag for a chart version
    pub fn render(&self, name: &str, version: &str) -> String {
        self.template
            .replace(NAME_PLACEHOLDER, name)
            .replace(VERSION_PLACEHOLDER, version)
    }

    /// Tag prefix shared by all versions of a chart (rendered with an empty version)
    pub fn prefix(&self, name: &str) -> String {
        self.render(name, "")
    }

    /// Version encoded in `tag` if it is a release of `name`
    ///
    /// A bare prefix match is not enough: `nginx-` also prefixes
    /// `nginx-ingress-1.0.0`, so the remainder must be a semver version.
    pub fn version_of(&self, name: &str, tag: &str) -> Option<Version> {
        let (head, tail) = self.template.split_once(VERSION_PLACEHOLDER)?;
        let head = head.replace(NAME_PLACEHOLDER, name);
        let tail = tail.replace(NAME_PLACEHOLDER, name);

        let rest = tag.strip_prefix(&head)?;
        let version = rest.strip_suffix(&tail)?;
        Version::parse(version).ok()
    }

    /// True when `tag` belongs to chart `name`
    pub fn matches(&self, name: &str, tag: &str) -> bool {
        tag.starts_with(&self.prefix(name)) && self.version_of(name, tag).is_some()
    }
}
