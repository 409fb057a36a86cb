//! Frame clock, cancellation handle, and the pulse animation

use std::cell::Cell;
use std::rc::Rc;
use std::time::Duration;

use bevy::math::{Quat, Vec3};

use crate::config::PulseConfig;
use crate::graph::{NodeId, SceneGraph};

/// Cancels a running render loop. Clones share the same flag.
#[derive(Debug, Clone, Default)]
pub struct LoopHandle(Rc<Cell<bool>>);

impl LoopHandle {
    /// Stop the loop; later calls are no-ops
    pub fn cancel(&self) {
        self.0.set(true);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

/// Frame bookkeeping for one mount
#[derive(Debug, Default)]
pub struct RenderLoop {
    handle: LoopHandle,
    last_tick: Option<Duration>,
    frames: u64,
}

impl RenderLoop {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self) -> LoopHandle {
        self.handle.clone()
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_cancelled()
    }

    pub fn cancel(&self) {
        self.handle.cancel();
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Start a frame at wall-clock `now`.
    ///
    /// Returns seconds elapsed since the previous frame (zero for the first
    /// one, and when the clock goes backwards), or `None` once cancelled.
    pub fn advance(&mut self, now: Duration) -> Option<f32> {
        if self.handle.is_cancelled() {
            return None;
        }
        let dt = self
            .last_tick
            .map(|last| now.saturating_sub(last).as_secs_f32())
            .unwrap_or(0.0);
        self.last_tick = Some(now);
        self.frames += 1;
        Some(dt)
    }
}

/// Scale and spin every pulse marker for wall-clock time `seconds`
pub fn animate_pulses(graph: &mut SceneGraph, pulses: &[NodeId], config: &PulseConfig, seconds: f32) {
    let scale = 1.0 + config.amplitude * (config.frequency * seconds).sin();
    let rotation = Quat::from_rotation_y(config.spin * seconds);
    for id in pulses {
        if let Some(node) = graph.get_mut(*id) {
            node.transform.scale = Vec3::splat(scale);
            node.transform.rotation = rotation;
        }
    }
}
