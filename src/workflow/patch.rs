//! Tweak Application
//!
//! Applying tweaks never touches the source workflow: both documents are
//! cloned and each tweak is written into the clones in order, so later
//! tweaks see the effect of earlier ones.
//!
//! For every changed field the position of the field among the execution
//! node's `inputs` gives the slot to overwrite in the presentation node's
//! `widgets_values`.

use log::{debug, error};
use serde_json::Value;

use super::model::{ExecutionGraph, PresentationGraph, Workflow};
use crate::error::{GraphKind, NodeFieldError, Result, SelectorError};
use crate::tweaks::{Selector, Tweak, Tweaks};

impl Workflow {
    /// Returns a new workflow with `tweaks` applied.
    pub fn apply_tweaks(&self, tweaks: &Tweaks) -> Result<Workflow> {
        let mut presentation = self.presentation().clone();
        let mut execution = self.execution().clone();

        for tweak in tweaks {
            apply_tweak(&mut presentation, &mut execution, tweak)?;
        }

        Ok(Workflow::new(self.name(), presentation, execution))
    }

    /// Checks that `tweaks` apply cleanly, discarding the result.
    pub fn validate(&self, tweaks: &Tweaks) -> Result<()> {
        self.apply_tweaks(tweaks).map(|_| ()).map_err(|e| {
            error!("Tweaks '{}' do not apply to '{}': {}", tweaks.name(), self.name(), e);
            e
        })
    }
}

fn apply_tweak(
    presentation: &mut PresentationGraph,
    execution: &mut ExecutionGraph,
    tweak: &Tweak,
) -> Result<()> {
    let selector = tweak.selector();
    let index = find_presentation_node(presentation, selector)?;
    let key = find_execution_node(execution, selector)?;

    let inputs = execution
        .node_mut(&key)
        .and_then(|node| node.get_mut("inputs"))
        .and_then(Value::as_object_mut);
    let Some(inputs) = inputs else {
        // A node without inputs has no field to change
        return match tweak.changes().keys().next() {
            Some(field) => Err(missing_field(selector, field).into()),
            None => Ok(()),
        };
    };

    for (field, value) in tweak.changes() {
        let position = inputs
            .keys()
            .position(|name| name == field)
            .ok_or_else(|| missing_field(selector, field))?;

        let widgets = presentation
            .node_mut(index)
            .and_then(|node| node.get_mut("widgets_values"))
            .and_then(Value::as_array_mut);

        match widgets {
            Some(widgets) if position < widgets.len() => widgets[position] = value.clone(),
            other => {
                return Err(NodeFieldError::MissingWidget {
                    selector: selector.to_string(),
                    field: field.clone(),
                    index: position,
                    available: other.map_or(0, |w| w.len()),
                }
                .into())
            }
        }

        inputs.insert(field.clone(), value.clone());
        debug!("Set {} field \"{}\" (slot {}) to {}", selector, field, position, value);
    }

    Ok(())
}

fn missing_field(selector: &Selector, field: &str) -> NodeFieldError {
    NodeFieldError::MissingField {
        selector: selector.to_string(),
        field: field.to_string(),
    }
}

fn canonical_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Index of the single presentation node matching `selector`.
fn find_presentation_node(
    graph: &PresentationGraph,
    selector: &Selector,
) -> std::result::Result<usize, SelectorError> {
    let matches: Vec<usize> = graph
        .nodes()
        .iter()
        .enumerate()
        .filter(|(_, node)| match selector {
            Selector::Id(id) => node.get("id").and_then(canonical_id).as_deref() == Some(id.as_str()),
            Selector::Name(name) => {
                node.get("title").and_then(Value::as_str) == Some(name.as_str())
            }
        })
        .map(|(index, _)| index)
        .collect();

    unique(matches, GraphKind::Presentation, selector)
}

/// Key of the single execution node matching `selector`.
fn find_execution_node(
    graph: &ExecutionGraph,
    selector: &Selector,
) -> std::result::Result<String, SelectorError> {
    let matches: Vec<String> = match selector {
        Selector::Id(id) => graph.node(id).map(|_| id.clone()).into_iter().collect(),
        Selector::Name(name) => graph
            .nodes()
            .iter()
            .filter(|(_, node)| {
                node.get("_meta")
                    .and_then(|meta| meta.get("title"))
                    .and_then(Value::as_str)
                    == Some(name.as_str())
            })
            .map(|(key, _)| key.clone())
            .collect(),
    };

    unique(matches, GraphKind::Execution, selector)
}

fn unique<T>(
    mut matches: Vec<T>,
    graph: GraphKind,
    selector: &Selector,
) -> std::result::Result<T, SelectorError> {
    match matches.len() {
        0 => Err(SelectorError::NotFound {
            graph,
            selector: selector.to_string(),
        }),
        1 => Ok(matches.remove(0)),
        count => Err(SelectorError::NonUnique {
            graph,
            selector: selector.to_string(),
            count,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TweakError;
    use serde_json::{json, Map};

    fn workflow() -> Workflow {
        Workflow::from_documents(
            "test",
            json!({
                "nodes": [
                    {"id": 3, "title": "Sampler", "widgets_values": ["A", "B"]},
                    {"id": 6, "title": "Prompt", "widgets_values": ["a cat"]},
                    {"id": 7, "title": "Prompt", "widgets_values": ["blurry"]},
                    {"id": 9, "widgets_values": []}
                ],
                "links": []
            }),
            json!({
                "3": {"inputs": {"f1": "A", "f2": "B"}, "_meta": {"title": "Sampler"}},
                "6": {"inputs": {"text": "a cat"}, "_meta": {"title": "Prompt"}},
                "7": {"inputs": {"text": "blurry"}, "_meta": {"title": "Prompt"}},
                "9": {"inputs": {"image": "x.png"}}
            }),
        )
        .unwrap()
    }

    fn tweaks(selector: Selector, changes: Value) -> Tweaks {
        let changes: Map<String, Value> = changes.as_object().cloned().unwrap();
        Tweaks::empty("test").with_tweak(Tweak::new(selector, changes))
    }

    fn widgets(workflow: &Workflow, index: usize) -> Value {
        workflow.presentation().nodes()[index]["widgets_values"].clone()
    }

    #[test]
    fn test_patch_both_graphs() {
        let original = workflow();
        let patched = original
            .apply_tweaks(&tweaks(Selector::id("3"), json!({"f2": "Z"})))
            .unwrap();

        assert_eq!(widgets(&patched, 0), json!(["A", "Z"]));
        assert_eq!(
            patched.execution().node("3").unwrap()["inputs"],
            json!({"f1": "A", "f2": "Z"})
        );
        assert_eq!(patched.name(), "test");
    }

    #[test]
    fn test_original_is_not_mutated() {
        let original = workflow();
        let snapshot = original.clone();
        original
            .apply_tweaks(&tweaks(Selector::name("Sampler"), json!({"f1": 1})))
            .unwrap();
        assert_eq!(original, snapshot);
    }

    #[test]
    fn test_empty_tweaks_are_identity() {
        let original = workflow();
        assert_eq!(original.apply_tweaks(&Tweaks::empty("none")).unwrap(), original);
    }

    #[test]
    fn test_later_tweaks_see_earlier_ones() {
        let mut first = Map::new();
        first.insert("f1".to_string(), json!("X"));
        let mut second = Map::new();
        second.insert("f2".to_string(), json!("Y"));

        let spec = Tweaks::empty("seq")
            .with_tweak(Tweak::new(Selector::id("3"), first))
            .with_tweak(Tweak::new(Selector::name("Sampler"), second));

        let patched = workflow().apply_tweaks(&spec).unwrap();
        assert_eq!(widgets(&patched, 0), json!(["X", "Y"]));
    }

    #[test]
    fn test_unknown_field() {
        let result = workflow().apply_tweaks(&tweaks(Selector::id("3"), json!({"cfg": 7})));
        assert!(matches!(
            result,
            Err(TweakError::NodeField(NodeFieldError::MissingField { .. }))
        ));
    }

    #[test]
    fn test_short_widget_list() {
        let result = workflow().apply_tweaks(&tweaks(Selector::id("9"), json!({"image": "y.png"})));
        assert!(matches!(
            result,
            Err(TweakError::NodeField(NodeFieldError::MissingWidget {
                index: 0,
                available: 0,
                ..
            }))
        ));
    }

    #[test]
    fn test_unknown_selector() {
        let by_id = workflow().apply_tweaks(&tweaks(Selector::id("42"), json!({"f1": 1})));
        assert!(matches!(
            by_id,
            Err(TweakError::Selector(SelectorError::NotFound { .. }))
        ));

        let by_name = workflow().apply_tweaks(&tweaks(Selector::name("Upscaler"), json!({})));
        assert!(matches!(
            by_name,
            Err(TweakError::Selector(SelectorError::NotFound {
                graph: GraphKind::Presentation,
                ..
            }))
        ));
    }

    #[test]
    fn test_duplicate_title() {
        let result = workflow().apply_tweaks(&tweaks(Selector::name("Prompt"), json!({"text": "x"})));
        assert!(matches!(
            result,
            Err(TweakError::Selector(SelectorError::NonUnique { count: 2, .. }))
        ));
    }

    #[test]
    fn test_string_node_ids() {
        let workflow = Workflow::from_documents(
            "string ids",
            json!({"nodes": [{"id": "12", "widgets_values": [1]}]}),
            json!({"12": {"inputs": {"seed": 1}}}),
        )
        .unwrap();
        let patched = workflow
            .apply_tweaks(&tweaks(Selector::id("12"), json!({"seed": 5})))
            .unwrap();
        assert_eq!(widgets(&patched, 0), json!([5]));
    }

    #[test]
    fn test_execution_only_mismatch() {
        // Present in the presentation graph but missing from the execution graph
        let workflow = Workflow::from_documents(
            "mismatch",
            json!({"nodes": [{"id": 1, "widgets_values": [1]}]}),
            json!({}),
        )
        .unwrap();
        let result = workflow.apply_tweaks(&tweaks(Selector::id("1"), json!({"seed": 2})));
        assert!(matches!(
            result,
            Err(TweakError::Selector(SelectorError::NotFound {
                graph: GraphKind::Execution,
                ..
            }))
        ));
    }

    #[test]
    fn test_validate() {
        let original = workflow();
        assert!(original.validate(&tweaks(Selector::id("3"), json!({"f1": 0}))).is_ok());
        assert!(original.validate(&tweaks(Selector::id("3"), json!({"nope": 0}))).is_err());
    }
}
