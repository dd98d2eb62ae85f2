//! Tweak Template Renderer
//!
//! Owns the state that outlives a single render: settings, the random
//! source and the cycle cursors. Every call to [`TweakRenderer::render`]
//! builds a fresh environment from the function table.

use std::fmt;
use std::sync::Arc;

use log::debug;
use minijinja::{context, Environment};

use super::folders::CycleStore;
use super::registry::{self, FunctionContext};
use super::FunctionError;
use crate::environment::Settings;
use crate::error::{Result, TemplateRenderError, TweakError};
use crate::random::{RandomSource, StdRandom};

/// Renders tweak templates.
///
/// # Example
/// ```
/// use tweakrunner::environment::Settings;
/// use tweakrunner::template::TweakRenderer;
///
/// let renderer = TweakRenderer::new(Settings::default());
/// let text = renderer.render("step: {{ iteration * 10 }}", 3).unwrap();
/// assert_eq!(text, "step: 30");
/// ```
pub struct TweakRenderer {
    context: Arc<FunctionContext>,
}

impl TweakRenderer {
    /// Creates a renderer drawing randomness from the operating system.
    pub fn new(settings: Settings) -> Self {
        Self::with_random(settings, Arc::new(StdRandom::from_entropy()))
    }

    /// Creates a renderer with an explicit random source.
    pub fn with_random(settings: Settings, random: Arc<dyn RandomSource>) -> Self {
        Self {
            context: Arc::new(FunctionContext {
                settings,
                random,
                cycles: CycleStore::new(),
            }),
        }
    }

    /// Creates a renderer with a reproducible random sequence.
    pub fn seeded(settings: Settings, seed: u64) -> Self {
        Self::with_random(settings, Arc::new(StdRandom::seeded(seed)))
    }

    pub fn settings(&self) -> &Settings {
        &self.context.settings
    }

    /// Cycle cursors shared by every render of this renderer.
    pub fn cycles(&self) -> &CycleStore {
        &self.context.cycles
    }

    /// Renders `template` with `iteration` bound.
    ///
    /// A failing `wildcards` filter is reported as [`TweakError::Wildcard`];
    /// every other failure is a [`TemplateRenderError::Render`].
    pub fn render(&self, template: &str, iteration: u64) -> Result<String> {
        let mut env = Environment::new();
        registry::install(&mut env, &self.context);

        let rendered = env
            .render_str(template, context! { iteration => iteration })
            .map_err(|e| match FunctionError::wildcard_cause(&e) {
                Some(wildcard) => TweakError::Wildcard(wildcard.clone()),
                None => TweakError::Template(TemplateRenderError::Render(e.to_string())),
            })?;

        debug!(
            "Rendered template (iteration {}): {} -> {} bytes",
            iteration,
            template.len(),
            rendered.len()
        );
        Ok(rendered)
    }
}

impl Default for TweakRenderer {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl fmt::Debug for TweakRenderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TweakRenderer")
            .field("settings", &self.context.settings)
            .field("cycles", &self.context.cycles.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::testing::ScriptedRandom;
    use crate::wildcards::WildcardError;
    use std::fs;
    use tempfile::tempdir;

    fn scripted(random: ScriptedRandom) -> TweakRenderer {
        TweakRenderer::with_random(Settings::default(), Arc::new(random))
    }

    #[test]
    fn test_iteration_counter() {
        let renderer = TweakRenderer::default();
        let values: Vec<String> = (0..5)
            .map(|i| renderer.render("{{ iteration }}", i).unwrap())
            .collect();
        assert_eq!(values, vec!["0", "1", "2", "3", "4"]);
    }

    #[test]
    fn test_set_and_macro() {
        let renderer = TweakRenderer::default();
        let template = "{% set base = 7 %}{% macro double(x) %}{{ x * 2 }}{% endmacro %}{{ double(base) }}";
        assert_eq!(renderer.render(template, 0).unwrap(), "14");
    }

    #[test]
    fn test_xy_matrix_from_iteration() {
        let renderer = TweakRenderer::default();
        let template = "{% set cfgs = [4, 7] %}{% set steps = [20, 30, 40] %}\
                        {{ cfgs[iteration % 2] }}/{{ steps[(iteration // 2) % 3] }}";
        let cells: Vec<String> = (0..6).map(|i| renderer.render(template, i).unwrap()).collect();
        assert_eq!(cells, vec!["4/20", "7/20", "4/30", "7/30", "4/40", "7/40"]);
    }

    #[test]
    fn test_unknown_function_fails() {
        let renderer = TweakRenderer::default();
        let result = renderer.render("{{ not_a_function() }}", 0);
        assert!(matches!(
            result,
            Err(TweakError::Template(TemplateRenderError::Render(_)))
        ));
    }

    #[test]
    fn test_malformed_template_fails() {
        let renderer = TweakRenderer::default();
        assert!(renderer.render("{% if %}", 0).is_err());
    }

    #[test]
    fn test_function_failure_is_fatal() {
        let renderer = TweakRenderer::default();
        let result = renderer.render("{{ random_choice([]) }}", 0);
        let Err(TweakError::Template(TemplateRenderError::Render(message))) = result else {
            panic!("expected render error");
        };
        assert!(message.contains("empty list"));
    }

    #[test]
    fn test_wildcard_failure_keeps_its_kind() {
        let renderer = TweakRenderer::default();
        let result = renderer.render("{{ 'a {} b' | wildcards }}", 0);
        let Err(TweakError::Wildcard(err)) = result else {
            panic!("expected wildcard error, got {:?}", result);
        };
        assert_eq!(err, WildcardError::EmptyChoice(2));
    }

    #[test]
    fn test_unbounded_random_float_fails() {
        let renderer = TweakRenderer::seeded(Settings::default(), 5);
        let result = renderer.render("{{ random_float(-1.5e308, 1.5e308) }}", 0);
        assert!(matches!(
            result,
            Err(TweakError::Template(TemplateRenderError::Render(_)))
        ));
    }

    #[test]
    fn test_random_functions_use_source() {
        let renderer = scripted(ScriptedRandom::with_ints(vec![3, 99]));
        let rendered = renderer
            .render("{{ random_int(1, 5) }} {{ random_seed() }}", 0)
            .unwrap();
        assert_eq!(rendered, "3 99");
    }

    #[test]
    fn test_random_choice_over_filtered_list() {
        let renderer = scripted(ScriptedRandom::with_indices(vec![1]));
        let rendered = renderer
            .render(
                "{{ random_choice(['cartoon_a', 'real', 'Cartoon_b'] | match('cartoon')) }}",
                0,
            )
            .unwrap();
        assert_eq!(rendered, "Cartoon_b");
    }

    #[test]
    fn test_regex_match_filter() {
        let renderer = TweakRenderer::default();
        let rendered = renderer
            .render("{{ ['abc', 'xabc', 'abd'] | regex_match('ab') | join(',') }}", 0)
            .unwrap();
        assert_eq!(rendered, "abc,abd");
    }

    #[test]
    fn test_folder_cycling_across_renders() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("file1.safetensors"), "").unwrap();
        fs::write(temp_dir.path().join("file2.safetensors"), "").unwrap();

        // Cycling never consults the random source
        let random = Arc::new(ScriptedRandom::default());
        let renderer = TweakRenderer::with_random(Settings::default(), random.clone());
        let template = format!(
            "{{{{ from_folder('{}', cycle=true) }}}}",
            temp_dir.path().display()
        );

        let picks: Vec<String> = (0..4)
            .map(|i| renderer.render(&template, i).unwrap())
            .collect();
        assert_eq!(
            picks,
            vec!["file1.safetensors", "file2.safetensors", "file1.safetensors", "file2.safetensors"]
        );
        assert!(random.calls().is_empty());
    }

    #[test]
    fn test_cycle_reset() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("a.txt"), "first").unwrap();
        fs::write(temp_dir.path().join("b.txt"), "second").unwrap();

        let renderer = TweakRenderer::default();
        let template = format!(
            "{{{{ from_file_in_folder('{}', cycle=true) }}}}",
            temp_dir.path().display()
        );

        assert_eq!(renderer.render(&template, 0).unwrap(), "first");
        assert_eq!(renderer.render(&template, 1).unwrap(), "second");
        renderer.cycles().reset();
        assert_eq!(renderer.render(&template, 2).unwrap(), "first");
    }

    #[test]
    fn test_from_folder_match_kwarg() {
        let temp_dir = tempdir().unwrap();
        for name in ["ink.safetensors", "oil.safetensors", "ink_v2.safetensors"] {
            fs::write(temp_dir.path().join(name), "").unwrap();
        }

        let renderer = scripted(ScriptedRandom::with_indices(vec![1]));
        let template = format!(
            "{{{{ from_folder('{}', match='INK') }}}}",
            temp_dir.path().display()
        );
        assert_eq!(renderer.render(&template, 0).unwrap(), "ink_v2.safetensors");
    }

    #[test]
    fn test_unknown_kwarg_fails() {
        let temp_dir = tempdir().unwrap();
        let renderer = TweakRenderer::default();
        let template = format!(
            "{{{{ from_folder('{}', colour='red') }}}}",
            temp_dir.path().display()
        );
        assert!(renderer.render(&template, 0).is_err());
    }

    #[test]
    fn test_wildcards_directory_from_settings() {
        let temp_dir = tempdir().unwrap();
        fs::write(temp_dir.path().join("animals.txt"), "fox\nowl\n").unwrap();

        let settings = Settings {
            wildcards_directory: Some(temp_dir.path().to_path_buf()),
            ..Settings::default()
        };
        let renderer =
            TweakRenderer::with_random(settings, Arc::new(ScriptedRandom::with_indices(vec![1])));
        let rendered = renderer.render("{{ 'a __animals__' | wildcards }}", 0).unwrap();
        assert_eq!(rendered, "a owl");
    }
}
