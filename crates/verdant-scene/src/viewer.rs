//! The owned viewer context
//!
//! A [`Viewer`] holds the camera, the scene and its registry, selection state
//! and, while mounted, the container's surface and listeners. Hosts forward
//! pointer events and frame callbacks to it; everything inside runs
//! synchronously on the host's thread.

use std::time::Duration;

use bevy::math::Vec2;
use tracing::{debug, error, info, warn};
use verdant_core::{
    ControlAck, ControlAction, ControlCommand, ControlError, ControlSink, GreenhouseSnapshot, Zone,
};

use crate::builder::{BuildReport, Scene};
use crate::camera::{CameraRig, Viewport};
use crate::config::ViewerConfig;
use crate::error::ViewerError;
use crate::labels::{project_anchors, Label};
use crate::picking::{pick, PointerTracker};
use crate::registry::{EntityHandle, EntityKind, SceneEntity};
use crate::render_loop::{animate_pulses, LoopHandle, RenderLoop};
use crate::surface::{Container, Frame, ListenerId, PointerEventKind, RenderSurface};

/// Called with the new selection whenever it changes
pub type SelectCallback = Box<dyn FnMut(Option<&SceneEntity>)>;

struct Mounted<C: Container> {
    container: C,
    surface: C::Surface,
    listeners: Vec<ListenerId>,
    render_loop: RenderLoop,
}

pub struct Viewer<C: Container> {
    config: ViewerConfig,
    scene: Scene,
    camera: CameraRig,
    pointer: PointerTracker,
    zones: Vec<Zone>,
    /// Snapshot waiting for the next frame
    pending: Option<Vec<Zone>>,
    selection: Option<EntityHandle>,
    labels: Vec<Label>,
    on_select: Option<SelectCallback>,
    mounted: Option<Mounted<C>>,
}

impl<C: Container> Viewer<C> {
    pub fn new(config: ViewerConfig) -> Self {
        let camera = CameraRig::new(&config.camera, config.input.drag_sensitivity);
        let pointer = PointerTracker::new(config.input.drag_threshold_px);
        Self {
            config,
            scene: Scene::new(),
            camera,
            pointer,
            zones: Vec::new(),
            pending: None,
            selection: None,
            labels: Vec::new(),
            on_select: None,
            mounted: None,
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &CameraRig {
        &self.camera
    }

    pub fn is_mounted(&self) -> bool {
        self.mounted.is_some()
    }

    pub fn container(&self) -> Option<&C> {
        self.mounted.as_ref().map(|m| &m.container)
    }

    /// Attach to `container`: acquire a surface, subscribe to pointer events,
    /// build the scene, and schedule the first frame.
    pub fn mount(&mut self, mut container: C) -> Result<LoopHandle, ViewerError> {
        if self.mounted.is_some() {
            return Err(ViewerError::AlreadyMounted);
        }

        let viewport = container.viewport();
        let surface = container.create_surface(viewport).map_err(|e| {
            error!(error = %e, "Rendering context unavailable");
            e
        })?;

        let listeners = PointerEventKind::ALL
            .iter()
            .map(|kind| container.listen(*kind))
            .collect();

        let render_loop = RenderLoop::new();
        let handle = render_loop.handle();
        self.mounted = Some(Mounted {
            container,
            surface,
            listeners,
            render_loop,
        });

        // Hitboxes must exist before the first frame can be picked
        if let Some(zones) = self.pending.take() {
            self.zones = zones;
        }
        if let Err(e) = self.rebuild() {
            self.unmount();
            return Err(e);
        }

        if let Some(mounted) = self.mounted.as_mut() {
            mounted.container.request_frame();
        }
        info!(
            width = viewport.width,
            height = viewport.height,
            "Viewer mounted"
        );
        Ok(handle)
    }

    /// Detach from the container and free everything the mount acquired.
    /// Safe to call any number of times.
    pub fn unmount(&mut self) {
        let Some(mut mounted) = self.mounted.take() else {
            return;
        };
        mounted.render_loop.cancel();
        for id in mounted.listeners.drain(..) {
            mounted.container.unlisten(id);
        }
        mounted.surface.release();

        self.set_selection(None);
        self.scene.clear();
        self.labels.clear();
        self.pointer.reset();
        info!(frames = mounted.render_loop.frames(), "Viewer unmounted");
    }

    /// Queue a full replacement of the zone data; applied on the next frame
    pub fn apply_snapshot(&mut self, snapshot: GreenhouseSnapshot) {
        debug!(
            greenhouse = %snapshot.greenhouse_id,
            zones = snapshot.zones.len(),
            "Snapshot queued"
        );
        self.pending = Some(snapshot.zones);
    }

    pub fn has_pending_snapshot(&self) -> bool {
        self.pending.is_some()
    }

    /// Rebuild the scene from the current zones, keeping the selection when
    /// the selected entity survives
    pub fn rebuild(&mut self) -> Result<BuildReport, ViewerError> {
        let selected = self.selection().map(|e| (e.kind, e.id.clone()));

        let report = self.scene.rebuild(&self.zones)?;
        self.labels.clear();

        // Handles from the previous build are stale; observers hear about the
        // re-resolved entity even when it is the same zone
        let handle = selected.and_then(|(kind, id)| self.scene.registry.find(kind, &id));
        let had_selection = self.selection.take().is_some();
        if had_selection {
            self.selection = handle;
            self.notify_selection();
        }
        Ok(report)
    }

    /// Run one frame at wall-clock time `now`. Does nothing when unmounted or
    /// cancelled.
    pub fn frame(&mut self, now: Duration) {
        let Some(dt) = self.mounted.as_mut().and_then(|m| m.render_loop.advance(now)) else {
            return;
        };

        if let Some(zones) = self.pending.take() {
            self.zones = zones;
            if let Err(e) = self.rebuild() {
                warn!(error = %e, "Scene rebuild failed, keeping previous frame state");
            }
        }

        self.camera.tick(dt);
        let pose = self.camera.pose();

        let Some(mounted) = self.mounted.as_mut() else {
            return;
        };
        let viewport = mounted.container.viewport();

        self.labels = project_anchors(&self.scene.graph, &self.scene.anchors, &pose, &viewport);

        animate_pulses(
            &mut self.scene.graph,
            &self.scene.pulses,
            &self.config.pulse,
            now.as_secs_f32(),
        );

        mounted.surface.draw(&Frame {
            graph: &self.scene.graph,
            pose,
            viewport,
            labels: &self.labels,
            number: mounted.render_loop.frames(),
        });

        if mounted.render_loop.is_running() {
            mounted.container.request_frame();
        }
    }

    /// Labels computed by the most recent frame
    pub fn labels(&self) -> &[Label] {
        &self.labels
    }

    pub fn auto_patrol(&self) -> bool {
        self.camera.auto_patrol()
    }

    pub fn set_auto_patrol(&mut self, enabled: bool) {
        self.camera.set_auto_patrol(enabled);
        debug!(enabled, "Auto-patrol toggled");
    }

    pub fn on_select(&mut self, callback: SelectCallback) {
        self.on_select = Some(callback);
    }

    pub fn selection(&self) -> Option<&SceneEntity> {
        self.selection.and_then(|h| self.scene.registry.get(h))
    }

    pub fn pointer_down(&mut self, position: Vec2) {
        if self.is_mounted() {
            self.pointer.pointer_down(position);
        }
    }

    pub fn pointer_move(&mut self, position: Vec2) {
        if let Some(delta) = self.pointer.pointer_move(position) {
            self.camera.drag(delta.x, delta.y);
        }
    }

    pub fn pointer_up(&mut self, position: Vec2) {
        self.pointer.pointer_up(position);
    }

    /// Pick at `position` and select the result; a miss clears the selection
    pub fn click(&mut self, position: Vec2) {
        if !self.pointer.click() {
            debug!("Click after drag ignored");
            return;
        }
        let Some(viewport) = self.viewport() else {
            return;
        };
        let pose = self.camera.pose();
        let hit = pick(
            &self.scene.graph,
            &self.scene.registry,
            &pose,
            &viewport,
            position,
        );
        self.set_selection(hit);
    }

    /// Select a zone by id, as when its floating label is clicked
    pub fn select_zone(&mut self, zone_id: &str) -> bool {
        match self.scene.registry.find(EntityKind::Zone, zone_id) {
            Some(handle) => {
                self.set_selection(Some(handle));
                true
            }
            None => false,
        }
    }

    pub fn clear_selection(&mut self) {
        self.set_selection(None);
    }

    /// Build a command for an actuator that exists in the current scene
    pub fn control_command(
        &self,
        actuator_id: &str,
        action: ControlAction,
        duration_secs: u32,
    ) -> Result<ControlCommand, ControlError> {
        if self
            .scene
            .registry
            .find(EntityKind::Actuator, actuator_id)
            .is_none()
        {
            return Err(ControlError::UnknownActuator(actuator_id.to_string()));
        }
        ControlCommand::new(actuator_id, action, duration_secs)
    }

    fn viewport(&self) -> Option<Viewport> {
        self.mounted.as_ref().map(|m| m.container.viewport())
    }

    fn set_selection(&mut self, handle: Option<EntityHandle>) {
        if self.selection == handle {
            return;
        }
        self.selection = handle;
        self.notify_selection();
    }

    fn notify_selection(&mut self) {
        let entity = self.selection.and_then(|h| self.scene.registry.get(h));
        match entity {
            Some(e) => debug!(kind = ?e.kind, id = %e.id, "Selected"),
            None => debug!("Selection cleared"),
        }
        if let Some(callback) = self.on_select.as_mut() {
            callback(entity);
        }
    }
}

impl<C: Container> Drop for Viewer<C> {
    fn drop(&mut self) {
        self.unmount();
    }
}

/// Send `command` through `sink`. Failures are logged and returned unchanged.
pub async fn issue_control<S: ControlSink>(
    sink: &S,
    command: &ControlCommand,
) -> Result<ControlAck, ControlError> {
    match sink.issue_control(command).await {
        Ok(ack) => {
            info!(
                actuator = %command.actuator_id,
                action = ?command.action,
                duration = command.duration_secs,
                "Control command accepted"
            );
            Ok(ack)
        }
        Err(e) => {
            warn!(actuator = %command.actuator_id, error = %e, "Control command failed");
            Err(e)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::{Frame, RenderSurface};
    use std::cell::RefCell;
    use std::rc::Rc;
    use verdant_core::{slot_for_index, Actuator, ActuatorKind, ZoneStatus};

    #[derive(Default)]
    struct HostState {
        listeners: Vec<ListenerId>,
        next_listener: u32,
        live_surfaces: usize,
        draws: usize,
        frame_requests: usize,
        fail_context: bool,
    }

    struct FakeContainer {
        state: Rc<RefCell<HostState>>,
    }

    struct FakeSurface {
        state: Rc<RefCell<HostState>>,
        released: bool,
    }

    impl RenderSurface for FakeSurface {
        fn draw(&mut self, _frame: &Frame<'_>) {
            self.state.borrow_mut().draws += 1;
        }

        fn release(&mut self) {
            if !self.released {
                self.released = true;
                self.state.borrow_mut().live_surfaces -= 1;
            }
        }
    }

    impl Container for FakeContainer {
        type Surface = FakeSurface;

        fn create_surface(&mut self, _viewport: Viewport) -> Result<FakeSurface, ViewerError> {
            let mut state = self.state.borrow_mut();
            if state.fail_context {
                return Err(ViewerError::ContextAcquisition("webgl2 unavailable".to_string()));
            }
            state.live_surfaces += 1;
            Ok(FakeSurface {
                state: self.state.clone(),
                released: false,
            })
        }

        fn viewport(&self) -> Viewport {
            Viewport::new(1200.0, 800.0)
        }

        fn listen(&mut self, _kind: PointerEventKind) -> ListenerId {
            let mut state = self.state.borrow_mut();
            state.next_listener += 1;
            let id = ListenerId(state.next_listener);
            state.listeners.push(id);
            id
        }

        fn unlisten(&mut self, id: ListenerId) {
            self.state.borrow_mut().listeners.retain(|l| *l != id);
        }

        fn request_frame(&mut self) {
            self.state.borrow_mut().frame_requests += 1;
        }
    }

    fn host() -> (Rc<RefCell<HostState>>, FakeContainer) {
        let state = Rc::new(RefCell::new(HostState::default()));
        let container = FakeContainer {
            state: state.clone(),
        };
        (state, container)
    }

    fn zone(index: usize, id: &str, status: ZoneStatus) -> Zone {
        Zone {
            id: id.to_string(),
            name: id.to_string(),
            crop: "Basil".to_string(),
            status,
            moisture: None,
            temperature: None,
            days_planted: None,
            alert: None,
            placement: slot_for_index(index),
            actuators: vec![Actuator {
                id: format!("{}-pump", id),
                name: "Pump".to_string(),
                zone_id: id.to_string(),
                kind: ActuatorKind::Pump,
                current_value: "OFF".to_string(),
                auto_mode: true,
            }],
        }
    }

    fn snapshot(zones: Vec<Zone>) -> GreenhouseSnapshot {
        GreenhouseSnapshot {
            greenhouse_id: "gh-1".to_string(),
            zones,
        }
    }

    #[test]
    fn test_mount_and_unmount_release_everything() {
        let (state, container) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.apply_snapshot(snapshot(vec![zone(0, "A", ZoneStatus::Optimal)]));

        let handle = viewer.mount(container).unwrap();
        assert_eq!(state.borrow().listeners.len(), 4);
        assert_eq!(state.borrow().live_surfaces, 1);
        assert_eq!(viewer.scene().registry.len(), 2);

        viewer.unmount();
        viewer.unmount();
        assert!(handle.is_cancelled());
        assert!(state.borrow().listeners.is_empty());
        assert_eq!(state.borrow().live_surfaces, 0);
        assert!(viewer.scene().graph.is_empty());
    }

    #[test]
    fn test_context_failure_is_distinct() {
        let (state, container) = host();
        state.borrow_mut().fail_context = true;
        let mut viewer = Viewer::new(ViewerConfig::default());

        let err = viewer.mount(container).unwrap_err();
        assert!(matches!(err, ViewerError::ContextAcquisition(_)));
        assert!(!viewer.is_mounted());
        assert!(state.borrow().listeners.is_empty());
    }

    #[test]
    fn test_second_mount_rejected() {
        let (_, first) = host();
        let (other_state, second) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.mount(first).unwrap();
        assert_eq!(viewer.mount(second).unwrap_err(), ViewerError::AlreadyMounted);
        assert_eq!(other_state.borrow().live_surfaces, 0);
    }

    #[test]
    fn test_frame_applies_snapshot_and_draws() {
        let (state, container) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.mount(container).unwrap();
        assert!(viewer.scene().placeholder.is_some());

        viewer.apply_snapshot(snapshot(vec![
            zone(0, "A", ZoneStatus::Optimal),
            zone(1, "B", ZoneStatus::Warning),
        ]));
        viewer.frame(Duration::from_millis(16));

        assert!(!viewer.has_pending_snapshot());
        assert!(viewer.scene().placeholder.is_none());
        assert_eq!(viewer.scene().anchors.len(), 1);
        assert_eq!(state.borrow().draws, 1);
        // One request from mount, one from the frame
        assert_eq!(state.borrow().frame_requests, 2);
    }

    #[test]
    fn test_cancelled_loop_stops_drawing() {
        let (state, container) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        let handle = viewer.mount(container).unwrap();

        viewer.frame(Duration::from_millis(16));
        handle.cancel();
        viewer.frame(Duration::from_millis(32));
        assert_eq!(state.borrow().draws, 1);
    }

    #[test]
    fn test_selection_survives_rebuild_and_notifies() {
        let (_, container) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.apply_snapshot(snapshot(vec![zone(0, "A", ZoneStatus::Optimal)]));
        viewer.mount(container).unwrap();

        let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::default();
        let sink = seen.clone();
        viewer.on_select(Box::new(move |entity| {
            sink.borrow_mut().push(entity.map(|e| e.id.clone()));
        }));

        assert!(viewer.select_zone("A"));
        assert!(!viewer.select_zone("missing"));
        viewer.apply_snapshot(snapshot(vec![
            zone(0, "A", ZoneStatus::Critical),
            zone(1, "B", ZoneStatus::Optimal),
        ]));
        viewer.frame(Duration::ZERO);
        let selected = viewer.selection().and_then(|e| e.zone()).map(|z| z.status);
        assert_eq!(selected, Some(ZoneStatus::Critical));

        viewer.clear_selection();
        assert_eq!(
            *seen.borrow(),
            vec![Some("A".to_string()), Some("A".to_string()), None]
        );
    }

    #[test]
    fn test_unmount_clears_selection_and_notifies() {
        let (_, container) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.apply_snapshot(snapshot(vec![zone(0, "A", ZoneStatus::Optimal)]));
        viewer.mount(container).unwrap();

        let seen: Rc<RefCell<Vec<Option<String>>>> = Rc::default();
        let sink = seen.clone();
        viewer.on_select(Box::new(move |entity| {
            sink.borrow_mut().push(entity.map(|e| e.id.clone()));
        }));
        viewer.select_zone("A");

        viewer.unmount();
        viewer.unmount();
        assert!(viewer.selection().is_none());
        assert_eq!(*seen.borrow(), vec![Some("A".to_string()), None]);
    }

    #[test]
    fn test_drag_orbits_and_suppresses_pick() {
        let (_, container) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.apply_snapshot(snapshot(vec![zone(0, "A", ZoneStatus::Optimal)]));
        viewer.mount(container).unwrap();
        viewer.set_auto_patrol(true);
        viewer.select_zone("A");

        let azimuth = viewer.camera().azimuth();
        viewer.pointer_down(Vec2::new(100.0, 100.0));
        viewer.pointer_move(Vec2::new(160.0, 100.0));
        viewer.pointer_up(Vec2::new(160.0, 100.0));
        // Would miss and clear selection if it were picked
        viewer.click(Vec2::new(600.0, 1.0));

        assert!(!viewer.auto_patrol());
        assert!((viewer.camera().azimuth() - (azimuth - 0.3)).abs() < 1e-5);
        assert_eq!(viewer.selection().map(|e| e.id.as_str()), Some("A"));

        viewer.pointer_down(Vec2::new(600.0, 1.0));
        viewer.pointer_up(Vec2::new(600.0, 1.0));
        viewer.click(Vec2::new(600.0, 1.0));
        assert!(viewer.selection().is_none());
    }

    #[test]
    fn test_control_command_requires_known_actuator() {
        let (_, container) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.apply_snapshot(snapshot(vec![zone(0, "A", ZoneStatus::Optimal)]));
        viewer.mount(container).unwrap();

        let command = viewer
            .control_command("A-pump", ControlAction::Irrigation, 300)
            .unwrap();
        assert_eq!(command.actuator_id, "A-pump");
        assert_eq!(
            viewer.control_command("ghost", ControlAction::Irrigation, 300),
            Err(ControlError::UnknownActuator("ghost".to_string()))
        );
        assert_eq!(
            viewer.control_command("A-pump", ControlAction::Irrigation, 0),
            Err(ControlError::InvalidDuration)
        );
    }

    struct RejectingSink;

    impl ControlSink for RejectingSink {
        async fn issue_control(&self, _command: &ControlCommand) -> Result<ControlAck, ControlError> {
            Err(ControlError::Rejected {
                code: 500,
                message: "device offline".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_failed_control_leaves_viewer_untouched() {
        let (_, container) = host();
        let mut viewer = Viewer::new(ViewerConfig::default());
        viewer.apply_snapshot(snapshot(vec![zone(0, "A", ZoneStatus::Optimal)]));
        viewer.mount(container).unwrap();
        viewer.select_zone("A");
        let camera = viewer.camera().clone();

        let command = viewer
            .control_command("A-pump", ControlAction::Irrigation, 300)
            .unwrap();
        let result = issue_control(&RejectingSink, &command).await;

        assert!(matches!(result, Err(ControlError::Rejected { code: 500, .. })));
        assert_eq!(viewer.selection().map(|e| e.id.as_str()), Some("A"));
        assert_eq!(viewer.camera(), &camera);
    }
}
