//! Semantic graph storage.
//!
//! # Architecture
//!
//! - [`SemanticNode`]: A meaningful diagram object (the canvas or a block)
//! - [`SemanticEdge`]: A line, with the node and anchor position at each end
//! - [`SemanticGraph`]: Nodes and edges in diagram order, with per-node
//!   ordered lists of incoming (`prev`) and outgoing (`next`) edges
//!
//! Edges may have a missing endpoint. Such edges are stored, but never show
//! up when walking from node to node.

use std::collections::HashMap;

use indexmap::IndexMap;

use threatflow_core::{
    diagram::DiagramObject,
    identifier::{InstanceId, TemplateId},
    property::RootProperty,
};

// =============================================================================
// Nodes and edges
// =============================================================================

/// A node of the semantic graph, borrowing its diagram object.
#[derive(Debug, Clone, Copy)]
pub struct SemanticNode<'d> {
    object: &'d DiagramObject,
}

impl<'d> SemanticNode<'d> {
    pub fn new(object: &'d DiagramObject) -> Self {
        Self { object }
    }

    pub fn instance(&self) -> InstanceId {
        self.object.instance()
    }

    pub fn template(&self) -> TemplateId {
        self.object.template()
    }

    pub fn properties(&self) -> &'d RootProperty {
        self.object.properties()
    }
}

/// One end of an edge: the node it touches and the anchor position used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EdgeEnd<'d> {
    pub node: InstanceId,
    pub via: Option<&'d str>,
}

/// A directed connection derived from a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SemanticEdge<'d> {
    /// Instance of the line.
    pub instance: InstanceId,
    pub source: Option<EdgeEnd<'d>>,
    pub target: Option<EdgeEnd<'d>>,
}

impl<'d> SemanticEdge<'d> {
    /// Returns both ends if the edge connects two nodes.
    pub fn ends(&self) -> Option<(EdgeEnd<'d>, EdgeEnd<'d>)> {
        Some((self.source?, self.target?))
    }
}

// =============================================================================
// Graph
// =============================================================================

/// Directed graph over the meaningful objects of one diagram.
///
/// Nodes and edges iterate in insertion order, which the builder keeps equal
/// to diagram order.
#[derive(Debug)]
pub struct SemanticGraph<'d> {
    root: InstanceId,
    nodes: IndexMap<InstanceId, SemanticNode<'d>>,
    edges: Vec<SemanticEdge<'d>>,
    incoming: HashMap<InstanceId, Vec<usize>>,
    outgoing: HashMap<InstanceId, Vec<usize>>,
}

impl<'d> SemanticGraph<'d> {
    /// Creates a graph holding only its root node.
    pub fn new(root: SemanticNode<'d>) -> Self {
        let mut nodes = IndexMap::new();
        nodes.insert(root.instance(), root);
        Self {
            root: root.instance(),
            nodes,
            edges: Vec::new(),
            incoming: HashMap::new(),
            outgoing: HashMap::new(),
        }
    }

    /// The canvas node.
    pub fn root(&self) -> SemanticNode<'d> {
        self.nodes[&self.root]
    }

    pub fn node(&self, id: InstanceId) -> Option<SemanticNode<'d>> {
        self.nodes.get(&id).copied()
    }

    pub fn contains_node(&self, id: InstanceId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Every node except the root, in diagram order.
    pub fn members(&self) -> impl Iterator<Item = SemanticNode<'d>> + '_ {
        self.nodes
            .values()
            .copied()
            .filter(move |node| node.instance() != self.root)
    }

    pub fn nodes_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edges(&self) -> impl Iterator<Item = &SemanticEdge<'d>> {
        self.edges.iter()
    }

    pub fn edges_count(&self) -> usize {
        self.edges.len()
    }

    /// Edges ending at `id`, in insertion order.
    pub fn prev(&self, id: InstanceId) -> impl Iterator<Item = &SemanticEdge<'d>> {
        self.incoming
            .get(&id)
            .into_iter()
            .flatten()
            .map(|idx| &self.edges[*idx])
    }

    /// Edges starting at `id`, in insertion order.
    pub fn next(&self, id: InstanceId) -> impl Iterator<Item = &SemanticEdge<'d>> {
        self.outgoing
            .get(&id)
            .into_iter()
            .flatten()
            .map(|idx| &self.edges[*idx])
    }

    /// Nodes reached from `id` through a fully connected edge.
    pub fn next_nodes(&self, id: InstanceId) -> impl Iterator<Item = InstanceId> + '_ {
        self.next(id)
            .filter_map(|edge| edge.target.map(|end| end.node))
    }

    /// Adds a node. A node with the same instance is replaced.
    pub fn add_node(&mut self, node: SemanticNode<'d>) {
        self.nodes.insert(node.instance(), node);
    }

    /// Adds an edge and indexes it under each endpoint node.
    ///
    /// # Panics
    /// Panics in debug mode if an endpoint names a node that is not in the
    /// graph. The builder only creates ends for known nodes.
    pub fn add_edge(&mut self, edge: SemanticEdge<'d>) {
        #[cfg(debug_assertions)]
        {
            for end in edge.source.iter().chain(edge.target.iter()) {
                assert!(
                    self.nodes.contains_key(&end.node),
                    "Adding edge: node {} does not exist for {edge:?}",
                    end.node
                );
            }
        }

        let idx = self.edges.len();
        if let Some(source) = edge.source {
            self.outgoing.entry(source.node).or_default().push(idx);
        }
        if let Some(target) = edge.target {
            self.incoming.entry(target.node).or_default().push(idx);
        }
        self.edges.push(edge);
    }
}
