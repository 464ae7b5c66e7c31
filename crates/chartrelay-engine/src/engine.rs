//! Template engine based on MiniJinja

use chartrelay_core::PipelineConfig;
use minijinja::{AutoEscape, Environment, UndefinedBehavior};
use serde::Serialize;
use std::path::Path;

use crate::context::{NotesContext, RedirectContext};
use crate::error::{EngineError, Result};
use crate::filters;

const NOTES_TEMPLATE: &str = "release-notes.md.j2";
const REDIRECT_TEMPLATE: &str = "redirect.html.j2";

const DEFAULT_NOTES: &str = include_str!("../templates/release-notes.md.j2");
const DEFAULT_REDIRECT: &str = include_str!("../templates/redirect.html.j2");

/// Template engine builder
pub struct EngineBuilder {
    strict_mode: bool,
    notes_template: String,
    redirect_template: String,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            strict_mode: true,
            notes_template: DEFAULT_NOTES.to_string(),
            redirect_template: DEFAULT_REDIRECT.to_string(),
        }
    }

    /// Set strict mode (fail on undefined variables)
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict_mode = strict;
        self
    }

    /// Replace the release notes template source
    pub fn notes_template(mut self, source: impl Into<String>) -> Self {
        self.notes_template = source.into();
        self
    }

    /// Replace the redirect page template source
    pub fn redirect_template(mut self, source: impl Into<String>) -> Self {
        self.redirect_template = source.into();
        self
    }

    /// Apply template overrides from configuration, reading them relative to `root`
    pub fn with_config(mut self, config: &PipelineConfig, root: &Path) -> Result<Self> {
        if let Some(path) = &config.release.notes_template {
            self.notes_template = read_template(&root.join(path))?;
        }
        if let Some(path) = &config.pages.redirect_template {
            self.redirect_template = read_template(&root.join(path))?;
        }
        Ok(self)
    }

    /// Compile the templates
    pub fn build(self) -> Result<NotesEngine> {
        let mut env = Environment::new();

        if self.strict_mode {
            env.set_undefined_behavior(UndefinedBehavior::Strict);
        } else {
            env.set_undefined_behavior(UndefinedBehavior::Lenient);
        }
        // Markdown and URLs are emitted verbatim
        env.set_auto_escape_callback(|_| AutoEscape::None);

        env.add_filter("trimprefix", filters::trimprefix);
        env.add_filter("trimsuffix", filters::trimsuffix);
        env.add_filter("mdescape", filters::mdescape);
        env.add_filter("quote", filters::quote);

        env.add_template_owned(NOTES_TEMPLATE, self.notes_template)
            .map_err(|e| EngineError::template(NOTES_TEMPLATE, &e))?;
        env.add_template_owned(REDIRECT_TEMPLATE, self.redirect_template)
            .map_err(|e| EngineError::template(REDIRECT_TEMPLATE, &e))?;

        Ok(NotesEngine { env })
    }
}

fn read_template(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|source| EngineError::Io {
        path: path.display().to_string(),
        source,
    })
}

/// Compiled release templates
pub struct NotesEngine {
    env: Environment<'static>,
}

impl NotesEngine {
    /// Engine with the embedded templates
    pub fn new() -> Result<Self> {
        EngineBuilder::new().build()
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Render release notes; empty output is an error
    pub fn render_notes(&self, context: &NotesContext) -> Result<String> {
        self.render(NOTES_TEMPLATE, context)
    }

    /// Render the redirect page of a chart directory
    pub fn render_redirect(&self, context: &RedirectContext) -> Result<String> {
        self.render(REDIRECT_TEMPLATE, context)
    }

    fn render<S: Serialize>(&self, name: &str, context: &S) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| EngineError::template(name, &e))?;

        let rendered = template
            .render(context)
            .map_err(|e| EngineError::template(name, &e))?;

        if rendered.trim().is_empty() {
            return Err(EngineError::EmptyOutput {
                name: name.to_string(),
            });
        }

        Ok(rendered)
    }
}
