use std::collections::{BTreeMap, BTreeSet};

use petgraph::algo::is_cyclic_directed;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use thiserror::Error;
use tracing::{debug, warn};

use crate::outputs::{DashboardData, OutputKind, OutputSpec, OutputValue};
use crate::selection::{Selection, SelectionChange, SelectionField};

/// A node is either a selection field or a renderable output; edges run from
/// each field to the outputs that declare it as an input, plus the one
/// sanctioned field-to-field edge for the country correction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Node {
    Field(SelectionField),
    Output(OutputKind),
}

#[derive(Debug, Error)]
pub enum GraphBuildError {
    #[error("output {0:?} registered twice")]
    DuplicateOutput(OutputKind),
    #[error("dependency graph contains a cycle")]
    Cyclic,
}

/// Everything recomputed in response to one selection event, published as a
/// single unit so downstream consumers never observe a partial update.
#[derive(Debug, Clone)]
pub struct UpdateBatch {
    pub event_seq: u64,
    pub changed_fields: BTreeSet<SelectionField>,
    pub values: Vec<(OutputKind, OutputValue)>,
}

/// Consumer boundary for published batches (the renderer layer).
pub trait BatchSink {
    fn publish(&mut self, batch: &UpdateBatch);
}

/// The dependency structure and update algorithm between selection fields and
/// outputs. Holds the session's selection, the cached current value of every
/// output, and the publish watermark for stale-event discard.
pub struct RecomputationGraph<'d> {
    data: &'d DashboardData,
    selection: Selection,
    specs: BTreeMap<OutputKind, OutputSpec>,
    graph: DiGraph<Node, ()>,
    field_nodes: BTreeMap<SelectionField, NodeIndex>,
    values: BTreeMap<OutputKind, OutputValue>,
    next_seq: u64,
    last_published: Option<u64>,
}

impl<'d> RecomputationGraph<'d> {
    /// Build the graph, reject cycles, and seed every output's value against
    /// the initial selection (running the correction step once so the initial
    /// state already satisfies the country invariant).
    pub fn new(
        data: &'d DashboardData,
        outputs: Vec<OutputSpec>,
        initial: Selection,
    ) -> Result<Self, GraphBuildError> {
        let mut graph = DiGraph::new();
        let mut field_nodes = BTreeMap::new();
        for field in SelectionField::ALL {
            field_nodes.insert(field, graph.add_node(Node::Field(field)));
        }
        // the corrected country value is derived from the continent filter
        // and the latest map click
        graph.add_edge(
            field_nodes[&SelectionField::Continents],
            field_nodes[&SelectionField::Countries],
            (),
        );
        graph.add_edge(
            field_nodes[&SelectionField::MapClick],
            field_nodes[&SelectionField::Countries],
            (),
        );

        let mut specs = BTreeMap::new();
        for spec in outputs {
            if specs.contains_key(&spec.kind) {
                return Err(GraphBuildError::DuplicateOutput(spec.kind));
            }
            let node = graph.add_node(Node::Output(spec.kind));
            for input in spec.inputs {
                graph.add_edge(field_nodes[input], node, ());
            }
            specs.insert(spec.kind, spec);
        }
        if is_cyclic_directed(&graph) {
            return Err(GraphBuildError::Cyclic);
        }

        let mut this = RecomputationGraph {
            data,
            selection: initial,
            specs,
            graph,
            field_nodes,
            values: BTreeMap::new(),
            next_seq: 1,
            last_published: None,
        };
        this.run_update(SelectionField::ALL.into_iter().collect());
        Ok(this)
    }

    pub fn selection(&self) -> &Selection {
        &self.selection
    }

    /// Cached current value of one output.
    pub fn value(&self, kind: OutputKind) -> Option<&OutputValue> {
        self.values.get(&kind)
    }

    /// The seed state as a batch, for the first render of a session.
    pub fn initial_batch(&self) -> UpdateBatch {
        UpdateBatch {
            event_seq: 0,
            changed_fields: SelectionField::ALL.into_iter().collect(),
            values: self.values.iter().map(|(k, v)| (*k, v.clone())).collect(),
        }
    }

    /// Process one selection event end to end: mutate the field, run the
    /// correction pass, recompute exactly the outputs whose declared inputs
    /// intersect the changed fields, and return the batch.
    pub fn apply(&mut self, change: SelectionChange) -> UpdateBatch {
        let event_seq = self.next_seq;
        self.next_seq += 1;
        let field = self.selection.apply(change);
        let (changed_fields, values) = self.run_update(BTreeSet::from([field]));
        debug!(
            seq = event_seq,
            changed = ?changed_fields,
            recomputed = values.len(),
            "processed selection event"
        );
        UpdateBatch {
            event_seq,
            changed_fields,
            values,
        }
    }

    /// Hand a batch to the sink unless this event, or a fresher one, has
    /// already been published. Freshness is event recency, not completion
    /// order, so a stale in-flight result can never overwrite a newer one,
    /// and re-publishing the same batch is a no-op.
    pub fn publish(&mut self, batch: &UpdateBatch, sink: &mut dyn BatchSink) -> bool {
        if let Some(last) = self.last_published {
            if batch.event_seq <= last {
                debug!(seq = batch.event_seq, last, "discarding stale batch");
                return false;
            }
        }
        self.last_published = Some(batch.event_seq);
        sink.publish(batch);
        true
    }

    /// The update protocol. The country correction runs first (a single
    /// fixed-point pass, never a loop) and its corrected value is folded into
    /// the changed set before any other output is evaluated.
    fn run_update(
        &mut self,
        mut changed: BTreeSet<SelectionField>,
    ) -> (BTreeSet<SelectionField>, Vec<(OutputKind, OutputValue)>) {
        let mut computed: Vec<(OutputKind, OutputValue)> = Vec::new();

        let triggers_correction = changed.contains(&SelectionField::Continents)
            || changed.contains(&SelectionField::MapClick)
            || changed.contains(&SelectionField::Countries);
        if triggers_correction && self.specs.contains_key(&OutputKind::CountryOptions) {
            let value = self.evaluate(OutputKind::CountryOptions);
            if let OutputValue::CountryOptions(opts) = &value {
                if opts.corrected != self.selection.countries {
                    debug!(corrected = ?opts.corrected, "auto-correcting country selection");
                    self.selection.countries = opts.corrected.clone();
                    changed.insert(SelectionField::Countries);
                }
            }
            computed.push((OutputKind::CountryOptions, value));
        }
        // a click has precedence only within the event that delivered it;
        // consuming it here keeps it from overriding later dropdown choices
        self.selection.map_click = None;

        let mut affected: BTreeSet<OutputKind> = BTreeSet::new();
        for field in &changed {
            let idx = self.field_nodes[field];
            for neighbor in self.graph.neighbors_directed(idx, Direction::Outgoing) {
                if let Node::Output(kind) = self.graph[neighbor] {
                    affected.insert(kind);
                }
            }
        }
        for kind in affected {
            // already evaluated as the correction step
            if computed.iter().any(|(k, _)| *k == kind) {
                continue;
            }
            let value = self.evaluate(kind);
            computed.push((kind, value));
        }

        computed.sort_by_key(|(kind, _)| *kind);
        for (kind, value) in &computed {
            self.values.insert(*kind, value.clone());
        }
        (changed, computed)
    }

    /// Evaluate one output against the current selection. A compute failure
    /// is downgraded to the output's empty state here, at the output
    /// boundary, so it cannot take the rest of the pass down with it.
    fn evaluate(&self, kind: OutputKind) -> OutputValue {
        let spec = &self.specs[&kind];
        match (spec.compute)(self.data, &self.selection) {
            Ok(value) => value,
            Err(err) => {
                warn!(output = kind.name(), %err, "output failed; using its empty state");
                kind.empty_value(&self.selection)
            }
        }
    }
}
