//! Scene graph: drawable nodes projected from the snapshot.
//!
//! Nodes live in an arena indexed by effect id. A node never points back
//! at its effect; lookups go through the id index.

use std::collections::HashMap;

use splice_decode_engine::FrameRef;
use splice_timeline_model::{EffectId, Transform};

/// Arena slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Video,
    Image,
    Text,
}

/// A drawable projection of one visual effect.
#[derive(Debug, Clone)]
pub struct Node {
    pub effect_id: EffectId,
    pub kind: NodeKind,
    pub z: usize,
    /// Transform used for the last draw.
    pub transform: Transform,
    /// Frame currently uploaded to the node's texture (video only).
    pub texture: Option<FrameRef>,
    pub visible: bool,
}

impl Node {
    pub fn new(effect_id: EffectId, kind: NodeKind, z: usize) -> Self {
        Self {
            effect_id,
            kind,
            z,
            transform: Transform::default(),
            texture: None,
            visible: true,
        }
    }

    /// Whether the normalized canvas point lies on the node, honouring
    /// rotation about the rect center.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        let rect = self.transform.rect;
        let (cx, cy) = rect.center();
        let theta = -self.transform.rotation_deg.to_radians();
        let (sin, cos) = theta.sin_cos();
        let (dx, dy) = (x - cx, y - cy);
        let local_x = cx + dx * cos - dy * sin;
        let local_y = cy + dx * sin + dy * cos;
        rect.contains(local_x, local_y)
    }
}

#[derive(Debug, Default)]
pub struct SceneGraph {
    slots: Vec<Option<Node>>,
    free: Vec<usize>,
    index: HashMap<EffectId, NodeId>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node, replacing any node for the same effect.
    pub fn insert(&mut self, node: Node) -> NodeId {
        self.remove(&node.effect_id);
        let effect_id = node.effect_id.clone();
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                NodeId(slot)
            }
            None => {
                self.slots.push(Some(node));
                NodeId(self.slots.len() - 1)
            }
        };
        self.index.insert(effect_id, id);
        id
    }

    pub fn remove(&mut self, effect_id: &EffectId) -> Option<Node> {
        let NodeId(slot) = self.index.remove(effect_id)?;
        let node = self.slots.get_mut(slot)?.take();
        self.free.push(slot);
        node
    }

    pub fn id_of(&self, effect_id: &EffectId) -> Option<NodeId> {
        self.index.get(effect_id).copied()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.slots.get(id.0)?.as_ref()
    }

    pub fn get(&self, effect_id: &EffectId) -> Option<&Node> {
        self.node(self.id_of(effect_id)?)
    }

    pub fn get_mut(&mut self, effect_id: &EffectId) -> Option<&mut Node> {
        let NodeId(slot) = self.id_of(effect_id)?;
        self.slots.get_mut(slot)?.as_mut()
    }

    pub fn contains(&self, effect_id: &EffectId) -> bool {
        self.index.contains_key(effect_id)
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Node> {
        self.slots.iter().flatten()
    }

    pub fn effect_ids(&self) -> Vec<EffectId> {
        let mut ids: Vec<EffectId> = self.index.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.free.clear();
        self.index.clear();
    }

    /// Front-most visible effect under a normalized canvas point.
    pub fn hit_test(&self, x: f64, y: f64) -> Option<EffectId> {
        self.iter()
            .filter(|n| n.visible && n.transform.opacity > 0.0 && n.contains(x, y))
            .max_by(|a, b| a.z.cmp(&b.z).then_with(|| a.effect_id.cmp(&b.effect_id)))
            .map(|n| n.effect_id.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use splice_timeline_model::Rect;

    fn node(id: &str, z: usize, rect: Rect) -> Node {
        let mut n = Node::new(EffectId::new(id), NodeKind::Image, z);
        n.transform.rect = rect;
        n
    }

    #[test]
    fn test_slots_are_reused() {
        let mut scene = SceneGraph::new();
        let a = scene.insert(node("a", 1, Rect::FULL));
        scene.insert(node("b", 1, Rect::FULL));
        scene.remove(&EffectId::new("a"));
        let c = scene.insert(node("c", 1, Rect::FULL));
        assert_eq!(a, c);
        assert_eq!(scene.len(), 2);
        assert_eq!(scene.effect_ids(), vec![EffectId::new("b"), EffectId::new("c")]);
    }

    #[test]
    fn test_insert_replaces_same_effect() {
        let mut scene = SceneGraph::new();
        scene.insert(node("a", 1, Rect::FULL));
        scene.insert(node("a", 4, Rect::FULL));
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.get(&EffectId::new("a")).unwrap().z, 4);
    }

    #[test]
    fn test_hit_test_picks_front_most() {
        let mut scene = SceneGraph::new();
        scene.insert(node("background", 1, Rect::FULL));
        scene.insert(node("overlay", 2, Rect::new(0.5, 0.5, 0.5, 0.5)));

        assert_eq!(scene.hit_test(0.75, 0.75), Some(EffectId::new("overlay")));
        assert_eq!(scene.hit_test(0.25, 0.25), Some(EffectId::new("background")));
        assert_eq!(scene.hit_test(1.5, 0.5), None);

        scene.get_mut(&EffectId::new("overlay")).unwrap().visible = false;
        assert_eq!(scene.hit_test(0.75, 0.75), Some(EffectId::new("background")));
    }

    #[test]
    fn test_hit_test_honours_rotation() {
        let mut scene = SceneGraph::new();
        let mut bar = node("bar", 1, Rect::centered(0.5, 0.5, 0.8, 0.1));
        bar.transform.rotation_deg = 90.0;
        scene.insert(bar);
        assert_eq!(scene.hit_test(0.5, 0.85), Some(EffectId::new("bar")));
        assert_eq!(scene.hit_test(0.85, 0.5), None);
    }

    proptest! {
        #[test]
        fn hit_is_the_front_most_containing_node(
            rects in proptest::collection::vec((0.0f64..1.0, 0.0f64..1.0, 0.05f64..1.0, 0.05f64..1.0, 0usize..4), 1..8),
            px in 0.0f64..1.0,
            py in 0.0f64..1.0,
        ) {
            let mut scene = SceneGraph::new();
            for (i, (x, y, w, h, z)) in rects.iter().enumerate() {
                scene.insert(node(&format!("n{i}"), *z, Rect::new(*x, *y, *w, *h)));
            }
            let containing: Vec<&Node> = scene.iter().filter(|n| n.contains(px, py)).collect();
            match scene.hit_test(px, py) {
                None => prop_assert!(containing.is_empty()),
                Some(id) => {
                    let hit = scene.get(&id).unwrap();
                    prop_assert!(hit.contains(px, py));
                    prop_assert!(containing.iter().all(|n| n.z <= hit.z));
                }
            }
        }
    }
}
