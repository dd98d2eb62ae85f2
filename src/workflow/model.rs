//! Workflow Data Model
//!
//! A workflow is the same node graph stored twice.
//!
//! The presentation graph (`workflow` document) keeps node values as a
//! positional list:
//!
//! ```json
//! {"nodes": [{"id": 3, "title": "Sampler", "widgets_values": [1234, "fixed", 20]}]}
//! ```
//!
//! The execution graph (`prompt` document) keys nodes by id and names their
//! inputs, in the same order as the widget values:
//!
//! ```json
//! {"3": {"inputs": {"seed": 1234, "control": "fixed", "steps": 20},
//!        "_meta": {"title": "Sampler"}}}
//! ```

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{GraphKind, Result, TweakError};

/// The `workflow` document: a `nodes` array plus untouched extra content.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct PresentationGraph(Value);

impl PresentationGraph {
    /// Wraps a document, requiring an object with a `nodes` array.
    pub fn new(document: Value) -> Result<Self> {
        match document.get("nodes") {
            Some(Value::Array(_)) => Ok(Self(document)),
            Some(_) => Err(format_error(GraphKind::Presentation, "`nodes` is not an array")),
            None if document.is_object() => {
                Err(format_error(GraphKind::Presentation, "missing `nodes` array"))
            }
            None => Err(format_error(GraphKind::Presentation, "document is not an object")),
        }
    }

    pub fn nodes(&self) -> &[Value] {
        self.0
            .get("nodes")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub(crate) fn node_mut(&mut self, index: usize) -> Option<&mut Value> {
        self.0
            .get_mut("nodes")
            .and_then(Value::as_array_mut)
            .and_then(|nodes| nodes.get_mut(index))
    }

    pub fn as_value(&self) -> &Value {
        &self.0
    }

    pub fn into_value(self) -> Value {
        self.0
    }
}

/// The `prompt` document: node id to node record.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ExecutionGraph(Map<String, Value>);

impl ExecutionGraph {
    /// Wraps a document, requiring an object.
    pub fn new(document: Value) -> Result<Self> {
        match document {
            Value::Object(nodes) => Ok(Self(nodes)),
            _ => Err(format_error(GraphKind::Execution, "document is not an object")),
        }
    }

    pub fn nodes(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn node(&self, id: &str) -> Option<&Value> {
        self.0.get(id)
    }

    pub(crate) fn node_mut(&mut self, id: &str) -> Option<&mut Value> {
        self.0.get_mut(id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }
}

fn format_error(graph: GraphKind, message: &str) -> TweakError {
    TweakError::GraphFormat {
        graph,
        message: message.to_string(),
    }
}

/// A named pair of presentation and execution graphs.
#[derive(Debug, Clone, PartialEq)]
pub struct Workflow {
    name: String,
    presentation: PresentationGraph,
    execution: ExecutionGraph,
}

impl Workflow {
    pub fn new(
        name: impl Into<String>,
        presentation: PresentationGraph,
        execution: ExecutionGraph,
    ) -> Self {
        Self {
            name: name.into(),
            presentation,
            execution,
        }
    }

    /// Builds a workflow from the two raw JSON documents.
    pub fn from_documents(
        name: impl Into<String>,
        presentation: Value,
        execution: Value,
    ) -> Result<Self> {
        Ok(Self::new(
            name,
            PresentationGraph::new(presentation)?,
            ExecutionGraph::new(execution)?,
        ))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn presentation(&self) -> &PresentationGraph {
        &self.presentation
    }

    pub fn execution(&self) -> &ExecutionGraph {
        &self.execution
    }

    /// Number of nodes in the execution graph.
    pub fn len(&self) -> usize {
        self.execution.len()
    }

    pub fn is_empty(&self) -> bool {
        self.execution.is_empty()
    }
}
