use serde_json::Value;

/// Structural fingerprint of a workflow document.
///
/// Two documents with equal shapes differ only in leaf values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowShape {
    pub node_types: Vec<String>,
    /// Total outgoing edges per connection source, sorted
    pub edge_counts: Vec<usize>,
}

impl WorkflowShape {
    pub fn of(nodes: &[Value], connections: &Value) -> Self {
        let node_types = nodes
            .iter()
            .map(|node| {
                node.get("type")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string()
            })
            .collect();

        let mut edge_counts: Vec<usize> = connections
            .as_object()
            .map(|sources| sources.values().map(count_edges).collect())
            .unwrap_or_default();
        edge_counts.sort_unstable();

        Self {
            node_types,
            edge_counts,
        }
    }

    pub fn node_count(&self) -> usize {
        self.node_types.len()
    }

    pub fn source_count(&self) -> usize {
        self.edge_counts.len()
    }
}

// { "main": [[edge, ...], [edge, ...]], "ai_tool": [...] }
fn count_edges(source: &Value) -> usize {
    source
        .as_object()
        .map(|outputs| {
            outputs
                .values()
                .filter_map(Value::as_array)
                .flatten()
                .filter_map(Value::as_array)
                .map(Vec::len)
                .sum()
        })
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_shape_counts_edges_per_source() {
        let nodes = vec![
            json!({ "name": "A", "type": "trigger" }),
            json!({ "name": "B", "type": "switch" }),
            json!({ "name": "C", "type": "action" }),
        ];
        let connections = json!({
            "A": { "main": [[{ "node": "B" }]] },
            "B": { "main": [[{ "node": "C" }], [{ "node": "C" }, { "node": "A" }]] }
        });

        let shape = WorkflowShape::of(&nodes, &connections);

        assert_eq!(shape.node_count(), 3);
        assert_eq!(shape.node_types[1], "switch");
        assert_eq!(shape.edge_counts, vec![1, 3]);
        assert_eq!(shape.source_count(), 2);
    }

    #[test]
    fn test_shape_detects_extra_edge() {
        let nodes = vec![json!({ "type": "a" }), json!({ "type": "b" })];
        let before = json!({ "A": { "main": [[{ "node": "B" }]] } });
        let after = json!({ "A": { "main": [[{ "node": "B" }, { "node": "B" }]] } });

        assert_ne!(
            WorkflowShape::of(&nodes, &before),
            WorkflowShape::of(&nodes, &after)
        );
    }
}
