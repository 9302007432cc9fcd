//! HNSW (Hierarchical Navigable Small World) index implementation.
//!
//! HNSW builds a multi-layer graph where layer 0 holds every node and each
//! higher layer holds a geometrically shrinking subset, so a search
//! greedily descends from a sparse top layer down to a dense layer 0. Node
//! identity is a noun id (`NounId`); the graph only ever stores ids and
//! vectors, never the rest of the noun record (metadata lives in
//! storage).

use brainy_core::Connections;
use crate::{DistanceMetric, NounId, Result, SearchResult, VectorError};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

/// Configuration for HNSW index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswConfig {
    /// Maximum number of bi-directional links per element per layer (M)
    pub max_connections: usize,

    /// Maximum number of connections for layer 0 (typically M * 2)
    pub max_connections_layer0: usize,

    /// Size of the dynamic candidate list during construction (ef_construction)
    pub ef_construction: usize,

    /// Size of the dynamic candidate list during search (ef_search)
    pub ef_search: usize,

    /// Normalization factor for level selection, 1.0 / ln(M)
    pub level_multiplier: f64,

    /// Hard cap on the level a node can be assigned, regardless of what
    /// the random draw produces.
    pub max_level: usize,
}

impl Default for HnswConfig {
    fn default() -> Self {
        let m = 16;
        Self {
            max_connections: m,
            max_connections_layer0: m * 2,
            ef_construction: 200,
            ef_search: 50,
            level_multiplier: 1.0 / (m as f64).ln(),
            max_level: 16,
        }
    }
}

impl HnswConfig {
    /// Create a fast configuration (less accuracy, faster search)
    pub fn fast() -> Self {
        let m = 8;
        Self {
            max_connections: m,
            max_connections_layer0: m * 2,
            ef_construction: 100,
            ef_search: 50,
            level_multiplier: 1.0 / (m as f64).ln(),
            max_level: 16,
        }
    }

    /// Create a balanced configuration (default)
    pub fn balanced() -> Self {
        Self::default()
    }

    /// Create a high-quality configuration (better accuracy, slower search)
    pub fn high_quality() -> Self {
        let m = 32;
        Self {
            max_connections: m,
            max_connections_layer0: m * 2,
            ef_construction: 400,
            ef_search: 200,
            level_multiplier: 1.0 / (m as f64).ln(),
            max_level: 16,
        }
    }
}

/// A node in the HNSW graph
#[derive(Debug, Clone, Serialize, Deserialize)]
struct HnswNode {
    id: NounId,
    level: usize,
    /// Connections at each layer (layer -> set of neighbor ids). May hold
    /// ids no longer present in `nodes` after an out-of-band delete
    /// elsewhere in the system; these are tolerated as dangling references
    /// and filtered out wherever they're encountered.
    connections: Vec<HashSet<NounId>>,
    /// Soft-delete tombstone (§4.1 Delete). Tombstoned nodes stay in the
    /// graph — their edges keep other nodes reachable — but never appear
    /// in search results.
    tombstoned: bool,
}

impl HnswNode {
    fn new(id: NounId, level: usize) -> Self {
        let connections = (0..=level).map(|_| HashSet::new()).collect();
        Self {
            id,
            level,
            connections,
            tombstoned: false,
        }
    }
}

/// HNSW index for fast approximate nearest neighbor search
pub struct HnswIndex {
    config: HnswConfig,
    metric: DistanceMetric,
    nodes: HashMap<NounId, HnswNode>,
    vectors: HashMap<NounId, Vec<f32>>,
    entry_point: Option<NounId>,
    max_layer: usize,
    dimension: Option<usize>,
}

impl HnswIndex {
    pub fn new(config: HnswConfig, metric: DistanceMetric) -> Self {
        Self {
            config,
            metric,
            nodes: HashMap::new(),
            vectors: HashMap::new(),
            entry_point: None,
            max_layer: 0,
            dimension: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn check_dimension(&mut self, vector: &[f32]) -> Result<()> {
        match self.dimension {
            Some(dim) if dim != vector.len() => Err(VectorError::DimensionMismatch {
                expected: dim,
                actual: vector.len(),
            }),
            Some(_) => Ok(()),
            None => {
                self.dimension = Some(vector.len());
                Ok(())
            }
        }
    }

    /// Insert a vector into the index (§4.1 Insert).
    pub fn insert(&mut self, id: NounId, vector: &[f32]) -> Result<()> {
        self.check_dimension(vector)?;
        self.vectors.insert(id.clone(), vector.to_vec());

        let level = self.select_layer();
        let mut node = HnswNode::new(id.clone(), level);

        let Some(entry_id) = self.entry_point.clone() else {
            self.entry_point = Some(id.clone());
            self.max_layer = level;
            self.nodes.insert(id, node);
            return Ok(());
        };

        let mut current_nearest = vec![entry_id];

        // Greedy one-step descent from the top layer down to target level + 1.
        for layer in (level + 1..=self.max_layer).rev() {
            current_nearest = self.search_layer(vector, &current_nearest, 1, layer)?;
        }

        // Full ef_construction search + neighbor selection from target layer down to 0.
        for layer in (0..=level).rev() {
            let candidates =
                self.search_layer(vector, &current_nearest, self.config.ef_construction, layer)?;

            let m = self.connection_cap(layer);
            let neighbors = self.select_neighbors(&candidates, m, vector);

            for neighbor_id in &neighbors {
                node.connections[layer].insert(neighbor_id.clone());
            }

            for neighbor_id in &neighbors {
                self.add_back_edge_and_prune(neighbor_id, &id, layer, m);
            }

            current_nearest = candidates;
        }

        // Matches `reassign_entry_point`'s tie-break: among nodes at the
        // highest level, the entry point is the smallest id.
        let becomes_entry_point = match &self.entry_point {
            Some(current_id) => level > self.max_layer || (level == self.max_layer && id < *current_id),
            None => true,
        };
        if becomes_entry_point {
            self.max_layer = level;
            self.entry_point = Some(id.clone());
        }

        self.nodes.insert(id, node);
        Ok(())
    }

    fn connection_cap(&self, layer: usize) -> usize {
        if layer == 0 {
            self.config.max_connections_layer0
        } else {
            self.config.max_connections
        }
    }

    /// Adds the reverse edge `neighbor -> id` and, if that pushes the
    /// neighbor over its connection cap at this layer, re-selects which of
    /// its neighbors to keep (§4.1 invariant 2: bidirectional edges).
    fn add_back_edge_and_prune(&mut self, neighbor_id: &NounId, id: &NounId, layer: usize, m: usize) {
        let Some(neighbor) = self.nodes.get_mut(neighbor_id) else {
            tracing::warn!(neighbor = %neighbor_id, "dangling neighbor reference during insert");
            return;
        };
        if layer >= neighbor.connections.len() {
            return;
        }
        neighbor.connections[layer].insert(id.clone());

        if neighbor.connections[layer].len() > m {
            let Some(neighbor_vec) = self.vectors.get(neighbor_id).cloned() else {
                return;
            };
            let candidates: Vec<NounId> = self.nodes[neighbor_id].connections[layer]
                .iter()
                .cloned()
                .collect();
            let kept = self.select_neighbors(&candidates, m, &neighbor_vec);
            if let Some(neighbor) = self.nodes.get_mut(neighbor_id) {
                neighbor.connections[layer] = kept.into_iter().collect();
            }
        }
    }

    /// Search for k nearest neighbors. Tombstoned nodes are excluded from
    /// the returned results but still take part in graph traversal.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<SearchResult>> {
        if let Some(dim) = self.dimension
            && dim != query.len()
        {
            return Err(VectorError::DimensionMismatch {
                expected: dim,
                actual: query.len(),
            });
        }

        let Some(entry_id) = self.entry_point.clone() else {
            return Ok(Vec::new());
        };

        let mut current_nearest = vec![entry_id];
        for layer in (1..=self.max_layer).rev() {
            current_nearest = self.search_layer(query, &current_nearest, 1, layer)?;
        }

        let ef = self.config.ef_search.max(k);
        current_nearest = self.search_layer(query, &current_nearest, ef, 0)?;

        let mut results: Vec<SearchResult> = current_nearest
            .iter()
            .filter(|id| !self.nodes.get(*id).is_some_and(|n| n.tombstoned))
            .filter_map(|id| {
                self.vectors.get(id).map(|vector| {
                    let score = self.metric.calculate(query, vector);
                    SearchResult::new(id.clone(), score)
                })
            })
            .collect();

        results.sort_by(|a, b| a.cmp_by_metric(b, self.metric));
        results.truncate(k);
        Ok(results)
    }

    /// Soft-deletes a node: tombstoned, excluded from results, but its
    /// edges are left intact so other nodes stay reachable. This is the
    /// default delete mode.
    pub fn soft_delete(&mut self, id: &NounId) -> Result<()> {
        let node = self
            .nodes
            .get_mut(id)
            .ok_or_else(|| VectorError::NotFound(id.clone()))?;
        node.tombstoned = true;
        Ok(())
    }

    /// Hard-deletes a node: physically removed, back-edges from its direct
    /// neighbors are torn down, and those neighbors are re-pruned against
    /// their surviving candidate set (Open Question: direct neighbors
    /// only, not a transitive repair).
    pub fn hard_delete(&mut self, id: &NounId) -> Result<()> {
        let node = self
            .nodes
            .remove(id)
            .ok_or_else(|| VectorError::NotFound(id.clone()))?;

        for (layer, neighbors) in node.connections.iter().enumerate() {
            for neighbor_id in neighbors {
                if let Some(neighbor) = self.nodes.get_mut(neighbor_id) {
                    neighbor.connections[layer].remove(id);
                }
            }
        }

        self.vectors.remove(id);

        if self.entry_point.as_deref() == Some(id.as_str()) {
            self.reassign_entry_point();
        }

        Ok(())
    }

    /// Deterministic entry-point reassignment: the surviving node at the
    /// highest level, tie-broken by smallest id.
    fn reassign_entry_point(&mut self) {
        let best = self
            .nodes
            .values()
            .max_by(|a, b| a.level.cmp(&b.level).then_with(|| b.id.cmp(&a.id)))
            .map(|n| (n.id.clone(), n.level));

        match best {
            Some((id, level)) => {
                self.entry_point = Some(id);
                self.max_layer = level;
            }
            None => {
                self.entry_point = None;
                self.max_layer = 0;
            }
        }
    }

    /// Explicitly re-prunes a node's neighbor list at every layer down to
    /// its configured cap (§4.1.5), independent of insert/delete. Used by
    /// maintenance passes after a burst of deletes.
    pub fn prune(&mut self, id: &NounId) -> Result<()> {
        let Some(node) = self.nodes.get(id) else {
            return Err(VectorError::NotFound(id.clone()));
        };
        let Some(vector) = self.vectors.get(id).cloned() else {
            return Ok(());
        };

        for layer in 0..=node.level {
            let m = self.connection_cap(layer);
            let candidates: Vec<NounId> = self.nodes[id].connections[layer].iter().cloned().collect();
            if candidates.len() <= m {
                continue;
            }
            let kept = self.select_neighbors(&candidates, m, &vector);
            let dropped: Vec<NounId> = candidates.into_iter().filter(|c| !kept.contains(c)).collect();

            if let Some(node) = self.nodes.get_mut(id) {
                node.connections[layer] = kept.into_iter().collect();
            }
            for dropped_id in dropped {
                if let Some(neighbor) = self.nodes.get_mut(&dropped_id) {
                    if layer < neighbor.connections.len() {
                        neighbor.connections[layer].remove(id);
                    }
                }
            }
        }
        Ok(())
    }

    /// Search a single layer for nearest neighbors, tolerant of dangling
    /// neighbor ids (logged and skipped, never an error — §4.1 failure
    /// behavior).
    fn search_layer(
        &self,
        query: &[f32],
        entry_points: &[NounId],
        num_to_return: usize,
        layer: usize,
    ) -> Result<Vec<NounId>> {
        let mut visited = HashSet::new();
        let mut candidates = BinaryHeap::new();
        let mut nearest = BinaryHeap::new();

        for ep in entry_points {
            if !self.nodes.contains_key(ep) {
                tracing::warn!(id = %ep, "dangling entry point reference");
                continue;
            }
            if visited.insert(ep.clone()) {
                let dist = self.distance(query, ep)?;
                candidates.push(Reverse(ScoredId(dist, ep.clone())));
                nearest.push(ScoredId(dist, ep.clone()));
            }
        }

        while let Some(Reverse(ScoredId(current_dist, current_id))) = candidates.pop() {
            if let Some(ScoredId(farthest_dist, _)) = nearest.peek()
                && current_dist > *farthest_dist
                && nearest.len() >= num_to_return
            {
                break;
            }

            let Some(node) = self.nodes.get(&current_id) else {
                continue;
            };
            if layer >= node.connections.len() {
                continue;
            }

            for neighbor_id in &node.connections[layer] {
                if !self.nodes.contains_key(neighbor_id) {
                    tracing::warn!(id = %neighbor_id, "dangling neighbor reference during search");
                    continue;
                }
                if visited.insert(neighbor_id.clone()) {
                    let dist = self.distance(query, neighbor_id)?;

                    if nearest.len() < num_to_return
                        || dist < nearest.peek().map(|s| s.0).unwrap_or(f32::MAX)
                    {
                        candidates.push(Reverse(ScoredId(dist, neighbor_id.clone())));
                        nearest.push(ScoredId(dist, neighbor_id.clone()));

                        if nearest.len() > num_to_return {
                            nearest.pop();
                        }
                    }
                }
            }
        }

        let mut result: Vec<_> = nearest.into_iter().collect();
        result.sort();
        Ok(result.into_iter().map(|s| s.1).collect())
    }

    /// Selects up to `m` nearest candidates by distance, tie-broken by id
    /// for determinism.
    fn select_neighbors(&self, candidates: &[NounId], m: usize, query: &[f32]) -> Vec<NounId> {
        if candidates.len() <= m {
            return candidates.to_vec();
        }

        let mut scored: Vec<_> = candidates
            .iter()
            .map(|id| {
                let dist = self.distance(query, id).unwrap_or(f32::MAX);
                ScoredId(dist, id.clone())
            })
            .collect();

        scored.sort();
        scored.into_iter().take(m).map(|s| s.1).collect()
    }

    fn distance(&self, query: &[f32], id: &NounId) -> Result<f32> {
        let vector = self
            .vectors
            .get(id)
            .ok_or_else(|| VectorError::NotFound(id.clone()))?;

        let score = self.metric.calculate(query, vector);
        Ok(if self.metric.higher_is_better() {
            1.0 - score
        } else {
            score
        })
    }

    fn select_layer(&self) -> usize {
        let uniform: f64 = rand::random();
        let level = (-uniform.ln() * self.config.level_multiplier).floor() as usize;
        level.min(self.config.max_level)
    }

    /// Per-layer neighbor ids for a node, in the storage record's shape
    /// (layer -> neighbor list), for persistence.
    pub fn connections_for(&self, id: &NounId) -> Option<Connections> {
        let node = self.nodes.get(id)?;
        Some(
            node.connections
                .iter()
                .enumerate()
                .map(|(layer, neighbors)| (layer as u32, neighbors.iter().cloned().collect()))
                .collect(),
        )
    }

    pub fn is_tombstoned(&self, id: &NounId) -> bool {
        self.nodes.get(id).is_some_and(|n| n.tombstoned)
    }

    pub fn vector_for(&self, id: &NounId) -> Option<&Vec<f32>> {
        self.vectors.get(id)
    }

    /// Reinstates a fully-formed node from a persisted record, bypassing
    /// the usual insert algorithm so the graph structure loaded from
    /// storage is reproduced exactly rather than recomputed.
    pub fn rehydrate(
        &mut self,
        id: NounId,
        vector: Vec<f32>,
        connections: &Connections,
        tombstoned: bool,
    ) -> Result<()> {
        self.check_dimension(&vector)?;

        let level = connections.keys().max().copied().unwrap_or(0) as usize;
        let mut node = HnswNode::new(id.clone(), level);
        node.tombstoned = tombstoned;
        for (layer, neighbors) in connections {
            let layer = *layer as usize;
            if layer < node.connections.len() {
                node.connections[layer] = neighbors.iter().cloned().collect();
            }
        }

        self.vectors.insert(id.clone(), vector);

        if level > self.max_layer || self.entry_point.is_none() {
            self.max_layer = level;
            self.entry_point = Some(id.clone());
        }

        self.nodes.insert(id, node);
        Ok(())
    }
}

/// Orders by distance ascending, then by id for a deterministic tie-break.
#[derive(Debug, Clone, PartialEq)]
struct ScoredId(f32, NounId);

impl Eq for ScoredId {}

impl PartialOrd for ScoredId {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ScoredId {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.0
            .partial_cmp(&other.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| self.1.cmp(&other.1))
    }
}
