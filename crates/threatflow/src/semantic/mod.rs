//! Semantic graph construction.
//!
//! The semantic graph is a simplified view of a diagram used for publishing:
//! the canvas and every block become nodes, and every line touching at least
//! one block becomes an edge. Each edge end records the anchor position the
//! line is attached through, which is how branch channels are told apart.

mod graph;

pub use graph::{EdgeEnd, SemanticEdge, SemanticGraph, SemanticNode};

use log::{debug, trace, warn};

use threatflow_core::diagram::{Diagram, Endpoint, ObjectKey, ObjectKind};

use crate::error::FlowError;

/// Builds the semantic graph of the canvas at `root`.
///
/// # Errors
///
/// Returns [`FlowError::Graph`] if `root` is missing or is not a canvas.
pub fn build<'d>(diagram: &'d Diagram, root: ObjectKey) -> Result<SemanticGraph<'d>, FlowError> {
    let canvas = diagram
        .get(root)
        .ok_or_else(|| FlowError::Graph("Canvas object missing from diagram".to_string()))?;
    if canvas.kind() != ObjectKind::Canvas {
        return Err(FlowError::Graph(format!(
            "Semantic graph root must be a canvas, found a {}",
            canvas.kind()
        )));
    }

    let mut graph = SemanticGraph::new(SemanticNode::new(canvas));
    let mut lines = Vec::new();
    for key in diagram.descendants(root) {
        let Some(object) = diagram.get(key) else {
            continue;
        };
        match object.kind() {
            ObjectKind::Block => graph.add_node(SemanticNode::new(object)),
            ObjectKind::Line => lines.push(key),
            _ => {}
        }
    }

    for line in lines {
        let Some(object) = diagram.get(line) else {
            continue;
        };
        let source = edge_end(diagram, &graph, line, Endpoint::Source);
        let target = edge_end(diagram, &graph, line, Endpoint::Target);
        match (source, target) {
            (None, None) => {
                trace!(line:% = object.instance(); "Skipping unattached line");
                continue;
            }
            (Some(_), Some(_)) => {}
            _ => warn!(line:% = object.instance(); "Line has a missing endpoint"),
        }
        graph.add_edge(SemanticEdge {
            instance: object.instance(),
            source,
            target,
        });
    }

    debug!(
        nodes = graph.nodes_count(),
        edges = graph.edges_count();
        "Semantic graph built"
    );
    Ok(graph)
}

/// The node and anchor position a line endpoint is attached to.
fn edge_end<'d>(
    diagram: &'d Diagram,
    graph: &SemanticGraph<'d>,
    line: ObjectKey,
    endpoint: Endpoint,
) -> Option<EdgeEnd<'d>> {
    let latch = diagram.endpoint(line, endpoint)?;
    let block = diagram.attached_block(latch)?;
    let node = diagram.get(block)?.instance();
    if !graph.contains_node(node) {
        return None;
    }
    let via = diagram
        .get(latch)?
        .linked_anchor()
        .and_then(|anchor| diagram.anchor_position(anchor));
    Some(EdgeEnd { node, via })
}

#[cfg(test)]
mod tests {
    use threatflow_core::{factory::DiagramFactory, identifier::TemplateId, template::TemplateCatalog};

    use super::*;

    fn connect(diagram: &mut Diagram, line: ObjectKey, endpoint: Endpoint, block: ObjectKey, position: &str) {
        let anchor = diagram
            .get(block)
            .and_then(|b| b.as_block())
            .and_then(|b| b.anchor(position))
            .unwrap();
        let latch = diagram.endpoint(line, endpoint).unwrap();
        diagram.link(anchor, latch).unwrap();
    }

    #[test]
    fn test_build_collects_blocks_and_lines() {
        let catalog = TemplateCatalog::attack_flow().unwrap();
        let factory = DiagramFactory::new(&catalog);
        let mut diagram = Diagram::new();
        let canvas = factory.create_canvas(&mut diagram).unwrap();
        let condition = factory.create(&mut diagram, TemplateId::new("condition")).unwrap();
        let action = factory.create(&mut diagram, TemplateId::new("action")).unwrap();
        let line = factory
            .create(&mut diagram, catalog.line_template().unwrap())
            .unwrap();
        let loose = factory
            .create(&mut diagram, catalog.line_template().unwrap())
            .unwrap();
        for child in [condition, action, line, loose] {
            diagram.add_child(canvas, child, None).unwrap();
        }
        connect(&mut diagram, line, Endpoint::Source, condition, "true_anchor");
        connect(&mut diagram, line, Endpoint::Target, action, "d90");

        let graph = build(&diagram, canvas).unwrap();

        assert_eq!(graph.nodes_count(), 3);
        assert_eq!(graph.edges_count(), 1);
        let edge = graph.edges().next().unwrap();
        let (source, target) = edge.ends().unwrap();
        assert_eq!(source.via, Some("true_anchor"));
        assert_eq!(target.node, diagram.get(action).unwrap().instance());
    }

    #[test]
    fn test_half_attached_line_is_kept() {
        let catalog = TemplateCatalog::attack_flow().unwrap();
        let factory = DiagramFactory::new(&catalog);
        let mut diagram = Diagram::new();
        let canvas = factory.create_canvas(&mut diagram).unwrap();
        let action = factory.create(&mut diagram, TemplateId::new("action")).unwrap();
        let line = factory
            .create(&mut diagram, catalog.line_template().unwrap())
            .unwrap();
        diagram.add_child(canvas, action, None).unwrap();
        diagram.add_child(canvas, line, None).unwrap();
        connect(&mut diagram, line, Endpoint::Source, action, "d0");

        let graph = build(&diagram, canvas).unwrap();
        let edge = graph.edges().next().unwrap();
        assert!(edge.source.is_some());
        assert!(edge.target.is_none());
    }

    #[test]
    fn test_root_must_be_canvas() {
        let catalog = TemplateCatalog::attack_flow().unwrap();
        let factory = DiagramFactory::new(&catalog);
        let mut diagram = Diagram::new();
        let action = factory.create(&mut diagram, TemplateId::new("action")).unwrap();

        assert!(matches!(build(&diagram, action), Err(FlowError::Graph(_))));
    }
}
