//! District-partitioned waypoint graph and the shrinking safe-zone
//! reachability recomputation described in spec.md §4.8. Grounded on
//! `original_source`'s `BattleMap.cpp/.h` (the largest file in the
//! corpus) and the map-data glossary entries for District/Waypoint.

use bevy_ecs::prelude::Resource;
use std::collections::{HashMap, HashSet, VecDeque};

pub type WaypointId = u32;

#[derive(Debug, Clone)]
pub struct WaypointNode {
    pub id: WaypointId,
    pub district_id: u16,
    pub tile: (i32, i32),
    /// Straight-line distance from this node to the current safe-zone
    /// centre, recomputed whenever the centre moves (it does not, in this
    /// spec — safe-zone centre is fixed for a battle, see DESIGN.md).
    pub radius_to_centre: f32,
    pub links: Vec<WaypointId>,
    /// Whether this node currently survives the safe-zone + reachability
    /// pruning. Unlinked nodes remain in the table (so district ids don't
    /// shift) but are skipped by patrol/explore bookkeeping.
    pub reachable: bool,
}

#[derive(Debug, Default, Resource)]
pub struct WaypointGraph {
    nodes: HashMap<WaypointId, WaypointNode>,
    pub start_waypoint: Option<WaypointId>,
}

impl WaypointGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(&mut self, node: WaypointNode) {
        self.nodes.insert(node.id, node);
    }

    pub fn link(&mut self, a: WaypointId, b: WaypointId) {
        if let Some(node) = self.nodes.get_mut(&a) {
            if !node.links.contains(&b) {
                node.links.push(b);
            }
        }
        if let Some(node) = self.nodes.get_mut(&b) {
            if !node.links.contains(&a) {
                node.links.push(a);
            }
        }
    }

    pub fn get(&self, id: WaypointId) -> Option<&WaypointNode> {
        self.nodes.get(&id)
    }

    pub fn reachable_districts(&self) -> HashSet<u16> {
        self.nodes
            .values()
            .filter(|n| n.reachable)
            .map(|n| n.district_id)
            .collect()
    }

    /// Spec.md §4.8: unlink any node whose `radius_to_centre` exceeds
    /// `current_safe_zone_radius - current_safe_distance`, then run a
    /// reachability DFS from `start_waypoint`; unreached nodes are also
    /// unlinked. Districts left with zero reachable nodes effectively
    /// vanish (callers read `reachable_districts()` to notice).
    pub fn shrink_safe_zone(&mut self, safe_zone_radius: f32, safe_distance: f32) {
        let threshold = safe_zone_radius - safe_distance;
        for node in self.nodes.values_mut() {
            if node.radius_to_centre > threshold {
                node.reachable = false;
            }
        }

        let Some(start) = self.start_waypoint else {
            return;
        };
        if !self.nodes.get(&start).map(|n| n.reachable).unwrap_or(false) {
            // start itself fell outside the zone: nothing is reachable anymore
            for node in self.nodes.values_mut() {
                node.reachable = false;
            }
            return;
        }

        let mut reached: HashSet<WaypointId> = HashSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(start);
        reached.insert(start);
        while let Some(id) = queue.pop_front() {
            let Some(node) = self.nodes.get(&id) else { continue };
            for &next in &node.links {
                if reached.contains(&next) {
                    continue;
                }
                let Some(next_node) = self.nodes.get(&next) else { continue };
                if !next_node.reachable {
                    continue; // pruned by radius check above, DFS does not cross it
                }
                reached.insert(next);
                queue.push_back(next);
            }
        }

        for (id, node) in self.nodes.iter_mut() {
            if node.reachable && !reached.contains(id) {
                node.reachable = false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph_a_b_c() -> WaypointGraph {
        // District chain A-B-C: B sits between A and C, linked to each by one waypoint.
        let mut g = WaypointGraph::new();
        g.add_node(WaypointNode { id: 1, district_id: 0, tile: (0, 0), radius_to_centre: 0.0, links: vec![], reachable: true });
        g.add_node(WaypointNode { id: 2, district_id: 1, tile: (10, 0), radius_to_centre: 100.0, links: vec![], reachable: true });
        g.add_node(WaypointNode { id: 3, district_id: 2, tile: (20, 0), radius_to_centre: 200.0, links: vec![], reachable: true });
        g.link(1, 2);
        g.link(2, 3);
        g.start_waypoint = Some(1);
        g
    }

    #[test]
    fn shrink_beyond_b_to_c_distance_removes_district_c() {
        let mut g = graph_a_b_c();
        // current_safe_zone_radius - current_safe_distance must fall below 200 (B->C link distance)
        g.shrink_safe_zone(210.0, 20.0); // threshold = 190 < 200, so node 3 is pruned
        let districts = g.reachable_districts();
        assert!(districts.contains(&0));
        assert!(districts.contains(&1));
        assert!(!districts.contains(&2));
    }

    #[test]
    fn shrink_within_radius_keeps_all_districts_reachable() {
        let mut g = graph_a_b_c();
        g.shrink_safe_zone(1000.0, 20.0);
        let districts = g.reachable_districts();
        assert_eq!(districts.len(), 3);
    }

    #[test]
    fn start_node_falling_outside_zone_clears_everything() {
        let mut g = graph_a_b_c();
        g.shrink_safe_zone(5.0, 0.0);
        assert!(g.reachable_districts().is_empty());
    }
}
