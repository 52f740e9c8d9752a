//! Transfer links: point-to-point item and fluid logistics.
//!
//! Links never reference machines. Their endpoints are positions resolved
//! through the [`SpatialIoRegistry`] whenever a transfer is attempted, and
//! two links are adjacent when one's end is exactly the other's start and
//! both share kind and archetype.
//!
//! Only root links (no upstream neighbour) count progress and initiate
//! transfers. A root's transfer searches depth first through its downstream
//! links for the first node that can take the item, rotating the starting
//! branch at each junction so parallel branches are served in turn. A
//! successful transfer moves items straight from the root's start node into
//! the found node; intermediate links hold nothing.

use crate::catalog::{LinkArchetype, LinkKind};
use crate::event::{EventBuffer, SimEvent};
use crate::fixed::Ticks;
use crate::id::{ItemId, LinkId, LinkTypeId, MachineId, NodeRef};
use crate::machine::Machine;
use crate::node::IoNode;
use crate::spatial::{GridPosition, SpatialIoRegistry};
use serde::{Deserialize, Serialize};
use slotmap::SlotMap;
use std::collections::{BTreeMap, HashSet};

/// Per-tick usage mark, reset at the start of every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LinkUsage {
    #[default]
    Unused,
    /// Lay on the path of another root's transfer.
    Carried,
    /// Initiated a transfer as a root.
    Drove,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferLink {
    pub start: GridPosition,
    pub end: GridPosition,
    pub archetype: LinkTypeId,
    pub kind: LinkKind,
    pub transfer_quantity: u32,
    pub transfer_ticks: u32,
    /// Ticks counted towards the next transfer attempt. Roots only.
    pub progress: u32,
    pub upstream: Vec<LinkId>,
    pub downstream: Vec<LinkId>,
    /// Downstream index the next search starts from.
    pub round_robin: usize,
    /// Saturates at the world's recency cap.
    pub ticks_since_transfer: u32,
    pub usage: LinkUsage,
}

impl TransferLink {
    pub fn new(
        start: GridPosition,
        end: GridPosition,
        archetype_id: LinkTypeId,
        archetype: &LinkArchetype,
        recency_cap: u32,
    ) -> Self {
        Self {
            start,
            end,
            archetype: archetype_id,
            kind: archetype.kind,
            transfer_quantity: archetype.transfer_quantity,
            transfer_ticks: archetype.transfer_ticks.max(1),
            progress: 0,
            upstream: Vec::new(),
            downstream: Vec::new(),
            round_robin: 0,
            ticks_since_transfer: recency_cap,
            usage: LinkUsage::Unused,
        }
    }

    pub fn is_root(&self) -> bool {
        self.upstream.is_empty()
    }

    fn chains_into(&self, next: &TransferLink) -> bool {
        self.end == next.start && self.kind == next.kind && self.archetype == next.archetype
    }
}

/// Read-only view used to resolve link endpoints to nodes.
pub struct NodeLookup<'a> {
    pub io: &'a SpatialIoRegistry,
    pub machines: &'a SlotMap<MachineId, Machine>,
}

impl<'a> NodeLookup<'a> {
    /// The node a link of `kind` sees at `pos`, if any.
    pub fn node_at(&self, pos: GridPosition, kind: LinkKind) -> Option<(NodeRef, &'a IoNode)> {
        let node_ref = self.io.item_node_at(pos)?;
        let node = self
            .machines
            .get(node_ref.machine)?
            .nodes
            .get(node_ref.index)?;
        kind.matches_node(node.kind).then_some((node_ref, node))
    }
}

/// Outcome of one root transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub item: ItemId,
    pub quantity: u32,
    pub from: NodeRef,
    pub to: NodeRef,
    /// Root first.
    pub path: Vec<LinkId>,
}

/// Counts from one [`LinkNetwork::tick_all`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LinkTickStats {
    pub roots: u32,
    pub transfers: u32,
}

/// Every transfer link plus the position index used to wire neighbours.
#[derive(Debug, Default)]
pub struct LinkNetwork {
    links: SlotMap<LinkId, TransferLink>,
    by_position: BTreeMap<GridPosition, Vec<LinkId>>,
}

impl LinkNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a link and wire it to neighbours that chain into or out of it.
    pub fn register(&mut self, link: TransferLink) -> LinkId {
        let start = link.start;
        let end = link.end;
        let id = self.links.insert(link);

        let mut upstream = Vec::new();
        let mut downstream = Vec::new();
        for pos in [start, end] {
            for other in self.by_position.get(&pos).into_iter().flatten() {
                let (Some(this), Some(that)) = (self.links.get(id), self.links.get(*other)) else {
                    continue;
                };
                if that.chains_into(this) && !upstream.contains(other) {
                    upstream.push(*other);
                }
                if this.chains_into(that) && !downstream.contains(other) {
                    downstream.push(*other);
                }
            }
        }
        for up in &upstream {
            if let Some(l) = self.links.get_mut(*up) {
                l.downstream.push(id);
            }
        }
        for down in &downstream {
            if let Some(l) = self.links.get_mut(*down) {
                l.upstream.push(id);
            }
        }
        if let Some(l) = self.links.get_mut(id) {
            l.upstream = upstream;
            l.downstream = downstream;
        }

        self.by_position.entry(start).or_default().push(id);
        if end != start {
            self.by_position.entry(end).or_default().push(id);
        }
        id
    }

    /// Remove a link and unlink it from its neighbours. Removing an unknown
    /// link is a registry consistency error: logged, not fatal.
    pub fn remove(&mut self, id: LinkId) -> Option<TransferLink> {
        let Some(link) = self.links.remove(id) else {
            tracing::warn!(link = ?id, "removing a transfer link that is not registered");
            return None;
        };
        for pos in [link.start, link.end] {
            if let Some(list) = self.by_position.get_mut(&pos) {
                list.retain(|l| *l != id);
                if list.is_empty() {
                    self.by_position.remove(&pos);
                }
            }
        }
        for up in &link.upstream {
            if let Some(l) = self.links.get_mut(*up) {
                l.downstream.retain(|d| *d != id);
                l.round_robin = 0;
            }
        }
        for down in &link.downstream {
            if let Some(l) = self.links.get_mut(*down) {
                l.upstream.retain(|u| *u != id);
            }
        }
        Some(link)
    }

    /// Clear every link's per-tick usage mark.
    pub fn reset_usage(&mut self) {
        for link in self.links.values_mut() {
            link.usage = LinkUsage::Unused;
        }
    }

    /// Depth-first search from `id` for a node that is empty or already
    /// holds `item`. Returns the node and the link path, `id` first.
    ///
    /// At each link the downstream branches are tried starting at its
    /// round-robin index; the index advances past the branch that succeeds.
    pub fn find_valid_target(
        &mut self,
        id: LinkId,
        item: ItemId,
        lookup: &NodeLookup<'_>,
        visited: &mut HashSet<LinkId>,
    ) -> Option<(NodeRef, Vec<LinkId>)> {
        if !visited.insert(id) {
            return None;
        }
        let link = self.links.get(id)?;
        if let Some((node_ref, node)) = lookup.node_at(link.end, link.kind)
            && node.item().is_none_or(|held| held == item)
        {
            return Some((node_ref, vec![id]));
        }

        let len = link.downstream.len();
        let start = link.round_robin;
        for i in 0..len {
            let index = (start + i) % len;
            let Some(next) = self.links.get(id).and_then(|l| l.downstream.get(index).copied())
            else {
                continue;
            };
            if visited.contains(&next) {
                continue;
            }
            if let Some((node, mut path)) = self.find_valid_target(next, item, lookup, visited) {
                if let Some(l) = self.links.get_mut(id) {
                    l.round_robin = (index + 1) % len;
                }
                path.insert(0, id);
                return Some((node, path));
            }
        }
        None
    }

    /// Tick every link in arena order. All links age their recency counter;
    /// only roots count progress and attempt transfers.
    pub fn tick_all(
        &mut self,
        io: &SpatialIoRegistry,
        machines: &mut SlotMap<MachineId, Machine>,
        recency_cap: u32,
        events: &mut EventBuffer,
        tick: Ticks,
    ) -> LinkTickStats {
        let mut stats = LinkTickStats::default();
        let ids: Vec<LinkId> = self.links.keys().collect();
        for id in ids {
            let Some(link) = self.links.get_mut(id) else {
                continue;
            };
            link.ticks_since_transfer = link.ticks_since_transfer.saturating_add(1).min(recency_cap);
            if !link.is_root() {
                continue;
            }
            stats.roots += 1;
            if let Some(transfer) = self.tick_root(id, io, machines) {
                stats.transfers += 1;
                tracing::trace!(
                    root = ?id,
                    item = ?transfer.item,
                    quantity = transfer.quantity,
                    hops = transfer.path.len(),
                    "items transferred"
                );
                events.push(SimEvent::ItemsTransferred {
                    root: id,
                    item: transfer.item,
                    quantity: transfer.quantity,
                    hops: transfer.path.len() as u32,
                    tick,
                });
            }
        }
        stats
    }

    /// Advance one root link. Returns the transfer it made, if any.
    pub fn tick_root(
        &mut self,
        id: LinkId,
        io: &SpatialIoRegistry,
        machines: &mut SlotMap<MachineId, Machine>,
    ) -> Option<Transfer> {
        let link = self.links.get_mut(id)?;
        link.progress += 1;
        if link.progress < link.transfer_ticks {
            return None;
        }
        // A missed interval is not carried over.
        link.progress = 0;
        let (start, kind, quantity) = (link.start, link.kind, link.transfer_quantity);

        let (source, item, to_remove, target, path) = {
            let lookup = NodeLookup {
                io,
                machines: &*machines,
            };
            let (source, node) = lookup.node_at(start, kind)?;
            let item = node.item()?;
            let to_remove = node.quantity().min(quantity);
            if to_remove == 0 {
                return None;
            }
            let mut visited = HashSet::new();
            let (target, path) = self.find_valid_target(id, item, &lookup, &mut visited)?;
            (source, item, to_remove, target, path)
        };
        if target == source {
            return None;
        }

        let accepted = {
            let node = machines
                .get_mut(target.machine)?
                .nodes
                .get_mut(target.index)?;
            node.claim(item);
            if node.item() != Some(item) {
                return None;
            }
            node.insert(item, to_remove)
        };
        if accepted == 0 {
            return None;
        }
        let removed = machines
            .get_mut(source.machine)
            .and_then(|m| m.nodes.get_mut(source.index))
            .map_or(0, |n| n.withdraw(accepted));
        debug_assert_eq!(removed, accepted);

        for hop in &path {
            if let Some(l) = self.links.get_mut(*hop) {
                l.usage = LinkUsage::Carried;
                l.ticks_since_transfer = 0;
            }
        }
        if let Some(l) = self.links.get_mut(id) {
            l.usage = LinkUsage::Drove;
        }

        Some(Transfer {
            item,
            quantity: accepted,
            from: source,
            to: target,
            path,
        })
    }

    // -- Queries --

    pub fn get(&self, id: LinkId) -> Option<&TransferLink> {
        self.links.get(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (LinkId, &TransferLink)> {
        self.links.iter()
    }

    pub fn links_at(&self, pos: GridPosition) -> &[LinkId] {
        self.by_position.get(&pos).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
