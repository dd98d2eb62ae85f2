//! Tweak Specifications
//!
//! [`Tweaks`] keeps the unrendered template next to the tweaks it produced,
//! so [`Tweaks::regenerate`] can render the next iteration with fresh
//! random draws and advanced cycle cursors.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::selector::Tweak;
use crate::error::{Result, TemplateRenderError, TweakError};
use crate::template::TweakRenderer;

/// Name given to specifications created without one.
pub const DEFAULT_TWEAKS_NAME: &str = "Default Tweaks";

#[derive(Deserialize)]
struct RawDocument {
    #[serde(default)]
    tweaks: Option<Vec<RawTweak>>,
}

#[derive(Deserialize)]
struct RawTweak {
    #[serde(default)]
    selector: Map<String, Value>,
    #[serde(default)]
    changes: Map<String, Value>,
}

#[derive(Serialize)]
struct SavedDocument<'a> {
    tweaks: &'a [Tweak],
}

/// An ordered list of tweaks rendered from a template.
#[derive(Debug, Clone)]
pub struct Tweaks {
    tweaks: Vec<Tweak>,
    name: String,
    template: String,
    iteration: u64,
    renderer: Option<Arc<TweakRenderer>>,
}

impl Tweaks {
    /// A specification with no tweaks and no template.
    pub fn empty(name: impl Into<String>) -> Self {
        Self {
            tweaks: Vec::new(),
            name: name.into(),
            template: String::new(),
            iteration: 0,
            renderer: None,
        }
    }

    /// Renders `template` at iteration 0.
    pub fn from_template(
        renderer: Arc<TweakRenderer>,
        template: impl Into<String>,
        name: impl Into<String>,
    ) -> Result<Self> {
        Self::from_template_at(renderer, template, name, 0)
    }

    /// Renders `template` at the given iteration.
    ///
    /// A whitespace-only template yields an empty specification.
    pub fn from_template_at(
        renderer: Arc<TweakRenderer>,
        template: impl Into<String>,
        name: impl Into<String>,
        iteration: u64,
    ) -> Result<Self> {
        let template = template.into();
        let tweaks = if template.trim().is_empty() {
            Vec::new()
        } else {
            let rendered = renderer.render(&template, iteration)?;
            parse_rendered(&rendered)?
        };

        Ok(Self {
            tweaks,
            name: name.into(),
            template,
            iteration,
            renderer: Some(renderer),
        })
    }

    /// Reads and renders a tweaks file.
    pub fn from_file(
        renderer: Arc<TweakRenderer>,
        path: impl AsRef<Path>,
        name: impl Into<String>,
    ) -> Result<Self> {
        let path = path.as_ref();
        let template = fs::read_to_string(path).map_err(|e| TweakError::io(path, e))?;
        info!("Loading tweaks from: {}", path.display());
        Self::from_template(renderer, template, name)
    }

    /// Renders the same template at the next iteration.
    ///
    /// Specifications without a template (built with [`Tweaks::empty`] or
    /// [`Tweaks::with_tweak`]) keep their tweaks and only advance the
    /// counter.
    pub fn regenerate(&self) -> Result<Self> {
        let iteration = self.iteration + 1;
        match &self.renderer {
            Some(renderer) if !self.template.trim().is_empty() => Self::from_template_at(
                Arc::clone(renderer),
                self.template.clone(),
                self.name.clone(),
                iteration,
            ),
            _ => {
                debug!("Tweaks '{}' have no template, keeping values", self.name);
                Ok(Self {
                    iteration,
                    ..self.clone()
                })
            }
        }
    }

    /// Returns a new specification with `tweak` appended.
    ///
    /// The result no longer carries a template, so regenerating it keeps
    /// every tweak as is.
    pub fn with_tweak(&self, tweak: Tweak) -> Self {
        let mut tweaks = self.tweaks.clone();
        tweaks.push(tweak);
        Self {
            tweaks,
            name: self.name.clone(),
            template: String::new(),
            iteration: self.iteration,
            renderer: self.renderer.clone(),
        }
    }

    /// Writes the resolved tweaks as YAML.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let yaml = serde_yaml::to_string(&SavedDocument {
            tweaks: &self.tweaks,
        })?;
        fs::write(path, yaml).map_err(|e| TweakError::io(path, e))?;
        info!("Tweaks saved to: {}", path.display());
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tweaks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tweaks.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Tweak> {
        self.tweaks.iter()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn iteration(&self) -> u64 {
        self.iteration
    }

    /// The unrendered template text.
    pub fn template(&self) -> &str {
        &self.template
    }
}

impl PartialEq for Tweaks {
    fn eq(&self, other: &Self) -> bool {
        self.tweaks == other.tweaks
            && self.name == other.name
            && self.template == other.template
            && self.iteration == other.iteration
    }
}

impl Default for Tweaks {
    fn default() -> Self {
        Self::empty(DEFAULT_TWEAKS_NAME)
    }
}

impl<'a> IntoIterator for &'a Tweaks {
    type Item = &'a Tweak;
    type IntoIter = std::slice::Iter<'a, Tweak>;

    fn into_iter(self) -> Self::IntoIter {
        self.tweaks.iter()
    }
}

/// Parses rendered YAML into validated tweaks.
fn parse_rendered(rendered: &str) -> Result<Vec<Tweak>> {
    if rendered.trim().is_empty() {
        return Err(TemplateRenderError::MissingTweaks.into());
    }

    let document: RawDocument = serde_yaml::from_str(rendered)
        .map_err(|e| TemplateRenderError::Yaml(e.to_string()))?;
    let raw = document.tweaks.ok_or(TemplateRenderError::MissingTweaks)?;

    let tweaks = raw
        .into_iter()
        .map(|raw| Tweak::from_parts(&raw.selector, raw.changes))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    debug!("Parsed {} tweak(s)", tweaks.len());
    Ok(tweaks)
}
