//! Linear effect chain with click-free bypass and snapshot support.
//!
//! [`EffectChain`] owns an ordered list of boxed effects and drives them
//! block by block. Nodes can be added, removed, reordered, toggled, and
//! retuned while audio keeps flowing.
//!
//! # Bypass
//!
//! Toggling a node never hard-switches the signal. Each node carries a
//! short linear crossfade envelope (about 10 ms); the node's effect keeps
//! processing during the fade and while bypassed, so delay lines and filter
//! state stay warm and re-enabling is seamless. Re-asserting the current
//! state is a no-op: the fade is not restarted.
//!
//! # Relinking
//!
//! Every structural mutation (push, insert, remove, reorder) rebuilds the
//! processing order from scratch rather than patching it incrementally.
//! The rebuilt order is always the node list order, so the outcome of a
//! mutation sequence is deterministic regardless of history.
//!
//! # Snapshots
//!
//! [`snapshot()`](EffectChain::snapshot) captures id, kind, enabled flag,
//! and named parameter values per node. [`restore_with()`](EffectChain::restore_with)
//! rebuilds the chain through a caller-supplied factory and replays each
//! parameter through the same validated path live retuning uses. Restore is
//! not atomic: a parameter the current build rejects is skipped and logged,
//! and the rest of the snapshot still applies.

#[cfg(not(feature = "std"))]
use alloc::{boxed::Box, string::String, vec::Vec};

use core::fmt;

use crate::buffer::StereoBuffer;
use crate::effect_with_params::EffectWithParams;
use crate::math::wet_dry_mix;
use crate::param::LinearSmoothedParam;
use crate::param_info::ParamWriteError;

/// Bypass crossfade length in milliseconds.
const BYPASS_FADE_MS: f32 = 10.0;

/// Unique identifier for a node in the effect chain.
///
/// Node IDs are assigned sequentially and never reused within a chain
/// instance. They remain stable across chain mutations and reorders.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Returns the raw numeric identifier.
    #[inline]
    pub fn index(self) -> u32 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

/// Error type for chain operations.
#[derive(Debug, Clone, PartialEq)]
pub enum ChainError {
    /// The referenced node does not exist in this chain.
    NodeNotFound(NodeId),
    /// No parameter with the given name exists on the node's effect.
    UnknownParam {
        /// The name that failed to resolve.
        name: String,
    },
    /// The effect rejected the parameter write; its state is unchanged.
    Rejected(ParamWriteError),
}

impl fmt::Display for ChainError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NodeNotFound(id) => write!(f, "node {id} not found"),
            Self::UnknownParam { name } => write!(f, "no parameter named '{name}'"),
            Self::Rejected(err) => write!(f, "parameter update rejected: {err}"),
        }
    }
}

impl core::error::Error for ChainError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::Rejected(err) => Some(err),
            _ => None,
        }
    }
}

/// Captured state of a single chain node.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    /// The node's stable identifier.
    pub id: u32,
    /// The kind string the node was registered under.
    pub kind: String,
    /// Whether the node was enabled at capture time.
    pub enabled: bool,
    /// Named parameter values, in declaration order.
    pub params: Vec<(String, f32)>,
}

/// Captured state of a whole chain, in processing order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChainSnapshot {
    /// Per-node snapshots.
    pub nodes: Vec<NodeSnapshot>,
}

/// A single effect slot in the chain.
struct ChainNode {
    id: NodeId,
    /// Kind string for snapshots and factory-based restore.
    kind: &'static str,
    effect: Box<dyn EffectWithParams + Send>,
    enabled: bool,
    /// Crossfade envelope for click-free bypass toggling.
    /// 1.0 = wet (active), 0.0 = dry (bypassed).
    fade: LinearSmoothedParam,
    /// Pre-allocated buffer to save the dry (input) signal before effect
    /// processing, so the crossfade has both signals even though the
    /// effect runs in-place.
    dry: StereoBuffer,
}

impl ChainNode {
    fn new(
        id: NodeId,
        kind: &'static str,
        effect: Box<dyn EffectWithParams + Send>,
        enabled: bool,
        sample_rate: f32,
        block_size: usize,
    ) -> Self {
        let mut fade = LinearSmoothedParam::with_config(
            if enabled { 1.0 } else { 0.0 },
            sample_rate,
            BYPASS_FADE_MS,
        );
        fade.snap_to_target();
        Self {
            id,
            kind,
            effect,
            enabled,
            fade,
            dry: StereoBuffer::new(block_size),
        }
    }
}

/// Ordered, mutable chain of boxed effects.
///
/// # Usage
///
/// 1. Create a chain with [`new()`](Self::new)
/// 2. Add effects: [`push()`](Self::push), [`insert()`](Self::insert)
/// 3. Drive audio: [`process_block_stereo()`](Self::process_block_stereo)
/// 4. Control live: [`set_enabled()`](Self::set_enabled),
///    [`update_named()`](Self::update_named)
/// 5. Persist: [`snapshot()`](Self::snapshot),
///    [`restore_with()`](Self::restore_with)
pub struct EffectChain {
    nodes: Vec<ChainNode>,
    /// Processing order as indices into `nodes`. Rebuilt wholesale by
    /// `relink()` after every structural mutation.
    order: Vec<usize>,
    sample_rate: f32,
    block_size: usize,
    next_id: u32,
}

impl EffectChain {
    /// Creates an empty chain.
    ///
    /// # Arguments
    ///
    /// * `sample_rate` - Sample rate in Hz (e.g., 48000.0)
    /// * `block_size` - Number of samples per processing block (e.g., 512)
    pub fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            nodes: Vec::new(),
            order: Vec::new(),
            sample_rate,
            block_size,
            next_id: 0,
        }
    }

    /// Returns the number of nodes in the chain.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if the chain has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the node IDs in processing order.
    pub fn ids(&self) -> Vec<NodeId> {
        self.order.iter().map(|&idx| self.nodes[idx].id).collect()
    }

    /// Returns the kind string a node was registered under.
    pub fn node_kind(&self, id: NodeId) -> Option<&'static str> {
        self.find(id).map(|idx| self.nodes[idx].kind)
    }

    /// Borrows a node's effect.
    ///
    /// Combined with [`EffectWithParams::as_any`] this recovers the
    /// concrete effect type behind the box.
    pub fn node_effect(&self, id: NodeId) -> Option<&(dyn EffectWithParams + Send)> {
        self.find(id).map(|idx| self.nodes[idx].effect.as_ref())
    }

    /// Mutably borrows a node's effect.
    pub fn node_effect_mut(&mut self, id: NodeId) -> Option<&mut (dyn EffectWithParams + Send)> {
        let idx = self.find(id)?;
        Some(self.nodes[idx].effect.as_mut())
    }

    // --- Structural mutations ---

    /// Appends an effect at the end of the chain. Returns the new node's ID.
    ///
    /// The effect's sample rate is set to the chain's sample rate and the
    /// node starts enabled with a settled fade.
    pub fn push(&mut self, kind: &'static str, effect: Box<dyn EffectWithParams + Send>) -> NodeId {
        let position = self.nodes.len();
        self.insert(position, kind, effect)
    }

    /// Inserts an effect at the given position. Returns the new node's ID.
    ///
    /// Positions beyond the end are clamped to the end.
    pub fn insert(
        &mut self,
        position: usize,
        kind: &'static str,
        mut effect: Box<dyn EffectWithParams + Send>,
    ) -> NodeId {
        effect.set_sample_rate(self.sample_rate);
        let id = NodeId(self.next_id);
        self.next_id += 1;
        let node = ChainNode::new(id, kind, effect, true, self.sample_rate, self.block_size);
        let position = position.min(self.nodes.len());
        self.nodes.insert(position, node);
        self.relink();
        #[cfg(feature = "tracing")]
        tracing::debug!("chain_add: {kind} node {id} at position {position}");
        id
    }

    /// Removes a node from the chain.
    ///
    /// Returns an error if the node doesn't exist.
    pub fn remove(&mut self, id: NodeId) -> Result<(), ChainError> {
        let idx = self.find(id).ok_or(ChainError::NodeNotFound(id))?;
        self.nodes.remove(idx);
        self.relink();
        #[cfg(feature = "tracing")]
        tracing::debug!("chain_remove: node {id}");
        Ok(())
    }

    /// Moves a node to a new position in the chain.
    ///
    /// Positions beyond the end are clamped to the end. Returns an error
    /// if the node doesn't exist.
    pub fn reorder(&mut self, id: NodeId, position: usize) -> Result<(), ChainError> {
        let idx = self.find(id).ok_or(ChainError::NodeNotFound(id))?;
        let node = self.nodes.remove(idx);
        let position = position.min(self.nodes.len());
        self.nodes.insert(position, node);
        self.relink();
        #[cfg(feature = "tracing")]
        tracing::debug!("chain_reorder: node {id} to position {position}");
        Ok(())
    }

    /// Rebuilds the processing order from the node list.
    ///
    /// Always runs from scratch, never patches the previous order: the same
    /// node list yields the same order no matter which mutations produced it.
    fn relink(&mut self) {
        self.order.clear();
        self.order.extend(0..self.nodes.len());
        #[cfg(feature = "tracing")]
        tracing::debug!("chain_relink: {} nodes", self.nodes.len());
    }

    // --- Node control ---

    /// Sets the enabled state of a node.
    ///
    /// Toggling starts a short crossfade instead of a hard switch; the
    /// effect keeps processing underneath so its state stays warm.
    /// Re-asserting the current state returns without touching the fade.
    pub fn set_enabled(&mut self, id: NodeId, enabled: bool) -> Result<(), ChainError> {
        let idx = self.find(id).ok_or(ChainError::NodeNotFound(id))?;
        let node = &mut self.nodes[idx];
        if node.enabled == enabled {
            return Ok(());
        }
        node.enabled = enabled;
        node.fade.set_target(if enabled { 1.0 } else { 0.0 });
        #[cfg(feature = "tracing")]
        tracing::debug!("chain_toggle: node {id} enabled={enabled}");
        Ok(())
    }

    /// Returns whether the node is enabled.
    pub fn is_enabled(&self, id: NodeId) -> bool {
        self.find(id).is_some_and(|idx| self.nodes[idx].enabled)
    }

    /// Updates a parameter on a node by name through the validated path.
    ///
    /// Name lookup is case-insensitive against both full and short names.
    /// A write the effect rejects leaves its state untouched and is
    /// reported in the returned error.
    pub fn update_named(&mut self, id: NodeId, name: &str, value: f32) -> Result<(), ChainError> {
        let idx = self.find(id).ok_or(ChainError::NodeNotFound(id))?;
        let node = &mut self.nodes[idx];
        let param_idx =
            node.effect
                .effect_find_param_by_name(name)
                .ok_or_else(|| ChainError::UnknownParam {
                    name: String::from(name),
                })?;
        node.effect
            .effect_set_param_checked(param_idx, value)
            .map_err(ChainError::Rejected)?;
        #[cfg(feature = "tracing")]
        tracing::debug!("chain_param: node {id} {name}={value}");
        Ok(())
    }

    /// Reads a parameter value from a node by name.
    pub fn param_value(&self, id: NodeId, name: &str) -> Option<f32> {
        let idx = self.find(id)?;
        let node = &self.nodes[idx];
        let param_idx = node.effect.effect_find_param_by_name(name)?;
        Some(node.effect.effect_get_param(param_idx))
    }

    // --- Processing ---

    /// Processes a stereo block through every node in order.
    ///
    /// Each node runs three phases: save the dry signal if a fade is in
    /// flight or the node is bypassed, always run the effect in-place, then
    /// crossfade between dry and wet. Buffers longer than the configured
    /// block size are processed up to the block size.
    pub fn process_block_stereo(&mut self, left: &mut [f32], right: &mut [f32]) {
        let len = left.len().min(right.len()).min(self.block_size);
        for &idx in &self.order {
            let node = &mut self.nodes[idx];
            let fade_active = !node.enabled || !node.fade.is_settled();

            // Phase 1: Save dry signal before effect processing.
            if fade_active {
                node.dry.left[..len].copy_from_slice(&left[..len]);
                node.dry.right[..len].copy_from_slice(&right[..len]);
            }

            // Phase 2: Process through effect (always, keeps state warm).
            node.effect
                .process_block_stereo(&mut left[..len], &mut right[..len]);

            // Phase 3: Crossfade between dry and wet.
            if fade_active {
                for i in 0..len {
                    let fade = node.fade.advance();
                    // fade=1.0 → wet (active), fade=0.0 → dry (bypassed)
                    left[i] = wet_dry_mix(node.dry.left[i], left[i], fade);
                    right[i] = wet_dry_mix(node.dry.right[i], right[i], fade);
                }
            }
        }
    }

    // --- Lifecycle ---

    /// Sets the sample rate for all nodes.
    pub fn set_sample_rate(&mut self, sample_rate: f32) {
        self.sample_rate = sample_rate;
        for node in &mut self.nodes {
            node.effect.set_sample_rate(sample_rate);
            node.fade.set_sample_rate(sample_rate);
        }
    }

    /// Sets the block size and resizes per-node scratch buffers.
    pub fn set_block_size(&mut self, block_size: usize) {
        self.block_size = block_size;
        for node in &mut self.nodes {
            node.dry.resize(block_size);
        }
    }

    /// Resets all effects and settles in-flight fades.
    pub fn reset(&mut self) {
        for node in &mut self.nodes {
            node.effect.reset();
            node.fade.snap_to_target();
        }
    }

    /// Returns the total latency of the enabled nodes in samples.
    pub fn latency_samples(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.enabled)
            .map(|n| n.effect.latency_samples())
            .sum()
    }

    // --- Snapshots ---

    /// Captures the chain's structure and parameter state.
    ///
    /// Per node: id, kind, enabled flag, and every named parameter value.
    pub fn snapshot(&self) -> ChainSnapshot {
        let nodes = self
            .order
            .iter()
            .map(|&idx| {
                let node = &self.nodes[idx];
                let params = (0..node.effect.effect_param_count())
                    .filter_map(|i| {
                        node.effect
                            .effect_param_info(i)
                            .map(|desc| (String::from(desc.name), node.effect.effect_get_param(i)))
                    })
                    .collect();
                NodeSnapshot {
                    id: node.id.0,
                    kind: String::from(node.kind),
                    enabled: node.enabled,
                    params,
                }
            })
            .collect();
        ChainSnapshot { nodes }
    }

    /// Rebuilds the chain from a snapshot using a factory for each kind.
    ///
    /// The factory maps a kind string to a fresh boxed effect (with its
    /// defaults applied), or `None` for kinds it does not know; unknown
    /// kinds are skipped. Parameters are replayed one at a time through the
    /// validated path, so values the current build rejects are skipped
    /// while the rest of the snapshot still lands. Node IDs are preserved.
    pub fn restore_with<F>(&mut self, snapshot: &ChainSnapshot, mut factory: F)
    where
        F: FnMut(&str) -> Option<(&'static str, Box<dyn EffectWithParams + Send>)>,
    {
        self.nodes.clear();
        for entry in &snapshot.nodes {
            let Some((kind, mut effect)) = factory(&entry.kind) else {
                #[cfg(feature = "tracing")]
                tracing::warn!("chain_restore: no factory for kind '{}', skipped", entry.kind);
                continue;
            };
            effect.set_sample_rate(self.sample_rate);
            for (name, value) in &entry.params {
                match effect.effect_find_param_by_name(name) {
                    Some(param_idx) => {
                        if let Err(_err) = effect.effect_set_param_checked(param_idx, *value) {
                            #[cfg(feature = "tracing")]
                            tracing::warn!(
                                "chain_restore: node {} param {name}={value} rejected: {_err}",
                                entry.id
                            );
                        }
                    }
                    None => {
                        #[cfg(feature = "tracing")]
                        tracing::warn!(
                            "chain_restore: node {} has no param '{name}', skipped",
                            entry.id
                        );
                    }
                }
            }
            let node = ChainNode::new(
                NodeId(entry.id),
                kind,
                effect,
                entry.enabled,
                self.sample_rate,
                self.block_size,
            );
            self.next_id = self.next_id.max(entry.id + 1);
            self.nodes.push(node);
        }
        self.relink();
        #[cfg(feature = "tracing")]
        tracing::debug!("chain_restore: {} nodes restored", self.nodes.len());
    }

    fn find(&self, id: NodeId) -> Option<usize> {
        self.nodes.iter().position(|n| n.id == id)
    }
}
