//! Draw lists and the surface they are submitted to.

use std::sync::{Arc, Mutex, PoisonError};

use serde::Serialize;
use splice_common::clock::Millis;
use splice_decode_engine::FrameRef;
use splice_timeline_model::{EffectId, FilterOp, TextStyle, Transform};

use crate::error::RenderResult;

/// What a draw command paints.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawSource {
    /// The node's current video texture.
    Frame(FrameRef),
    Image { source: String },
    Text { text: String, style: TextStyle },
}

/// One layer of a composed frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrawCommand {
    pub effect_id: EffectId,
    /// Paint order; higher is in front.
    pub z: usize,
    /// Final transform, opacity included.
    pub transform: Transform,
    pub source: DrawSource,
    pub filters: Vec<FilterOp>,
}

/// Everything drawn for one timecode, back to front.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DrawList {
    pub timecode: Millis,
    pub commands: Vec<DrawCommand>,
}

impl DrawList {
    pub fn new(timecode: Millis, mut commands: Vec<DrawCommand>) -> Self {
        commands.sort_by(|a, b| a.z.cmp(&b.z).then_with(|| a.effect_id.cmp(&b.effect_id)));
        Self { timecode, commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn get(&self, id: &EffectId) -> Option<&DrawCommand> {
        self.commands.iter().find(|c| &c.effect_id == id)
    }

    /// Effect ids in paint order.
    pub fn effect_ids(&self) -> Vec<EffectId> {
        self.commands.iter().map(|c| c.effect_id.clone()).collect()
    }
}

/// A drawing backend. One call per composed frame.
pub trait RenderSurface: Send {
    fn draw(&mut self, list: &DrawList) -> RenderResult<()>;
}

#[derive(Debug, Default)]
struct Recorded {
    last: Option<DrawList>,
    draw_calls: u64,
}

/// Surface that remembers what it was asked to draw. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct RecordingSurface {
    inner: Arc<Mutex<Recorded>>,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last(&self) -> Option<DrawList> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .last
            .clone()
    }

    pub fn draw_calls(&self) -> u64 {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .draw_calls
    }
}

impl RenderSurface for RecordingSurface {
    fn draw(&mut self, list: &DrawList) -> RenderResult<()> {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        inner.last = Some(list.clone());
        inner.draw_calls += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn command(id: &str, z: usize) -> DrawCommand {
        DrawCommand {
            effect_id: EffectId::new(id),
            z,
            transform: Transform::default(),
            source: DrawSource::Image {
                source: "img".to_string(),
            },
            filters: Vec::new(),
        }
    }

    #[test]
    fn test_draw_list_is_back_to_front() {
        let list = DrawList::new(0.0, vec![command("front", 3), command("back", 1), command("mid", 2)]);
        let ids: Vec<String> = list.effect_ids().iter().map(ToString::to_string).collect();
        assert_eq!(ids, vec!["back", "mid", "front"]);
        assert!(list.get(&EffectId::new("mid")).is_some());
    }

    #[test]
    fn test_recording_surface_shares_state() {
        let surface = RecordingSurface::new();
        let mut handle = surface.clone();
        handle.draw(&DrawList::new(40.0, vec![command("a", 1)])).unwrap();
        assert_eq!(surface.draw_calls(), 1);
        assert_eq!(surface.last().unwrap().timecode, 40.0);
    }

    #[test]
    fn test_serializes_tagged_sources() {
        let json = serde_json::to_string(&command("a", 1)).unwrap();
        assert!(json.contains("\"kind\":\"image\""));
    }
}
