//! End-to-end: mount a viewer over two zones, read labels, pick, unmount

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use bevy::math::{Vec2, Vec3};
use verdant_core::{slot_for_index, GreenhouseSnapshot, Zone, ZoneStatus};
use verdant_scene::{
    Container, EntityKind, Frame, ListenerId, PointerEventKind, RenderSurface, ViewerConfig,
    Viewer, ViewerError, Viewport,
};

#[derive(Default)]
struct Host {
    listeners: Vec<(ListenerId, PointerEventKind)>,
    next_listener: u32,
    live_surfaces: usize,
    drawn_labels: Vec<usize>,
}

struct Canvas(Rc<RefCell<Host>>);

struct Surface {
    host: Rc<RefCell<Host>>,
    live: bool,
}

impl RenderSurface for Surface {
    fn draw(&mut self, frame: &Frame<'_>) {
        self.host.borrow_mut().drawn_labels.push(frame.labels.len());
    }

    fn release(&mut self) {
        if std::mem::take(&mut self.live) {
            self.host.borrow_mut().live_surfaces -= 1;
        }
    }
}

impl Container for Canvas {
    type Surface = Surface;

    fn create_surface(&mut self, _viewport: Viewport) -> Result<Surface, ViewerError> {
        self.0.borrow_mut().live_surfaces += 1;
        Ok(Surface {
            host: self.0.clone(),
            live: true,
        })
    }

    fn viewport(&self) -> Viewport {
        Viewport::new(1200.0, 800.0).with_device_pixel_ratio(2.0)
    }

    fn listen(&mut self, kind: PointerEventKind) -> ListenerId {
        let mut host = self.0.borrow_mut();
        host.next_listener += 1;
        let id = ListenerId(host.next_listener);
        host.listeners.push((id, kind));
        id
    }

    fn unlisten(&mut self, id: ListenerId) {
        self.0.borrow_mut().listeners.retain(|(l, _)| *l != id);
    }

    fn request_frame(&mut self) {}
}

fn zone(index: usize, id: &str, status: ZoneStatus) -> Zone {
    Zone {
        id: id.to_string(),
        name: format!("Zone {}", id),
        crop: "Tomato".to_string(),
        status,
        moisture: Some(41.0),
        temperature: Some(27.0),
        days_planted: Some(30),
        alert: None,
        placement: slot_for_index(index),
        actuators: Vec::new(),
    }
}

fn screen_position(viewer: &Viewer<Canvas>, world: Vec3) -> Vec2 {
    let viewport = Viewport::new(1200.0, 800.0);
    let ndc = viewer
        .camera()
        .pose()
        .view_projection(&viewport)
        .project_point3(world);
    Vec2::new(
        (ndc.x + 1.0) * 0.5 * viewport.width,
        (1.0 - ndc.y) * 0.5 * viewport.height,
    )
}

#[test]
fn test_two_zone_scenario() {
    let host = Rc::new(RefCell::new(Host::default()));
    let mut viewer = Viewer::new(ViewerConfig::default());
    viewer.apply_snapshot(GreenhouseSnapshot {
        greenhouse_id: "gh-1".to_string(),
        zones: vec![
            zone(0, "A", ZoneStatus::Optimal),
            zone(1, "B", ZoneStatus::Critical),
        ],
    });

    let handle = viewer.mount(Canvas(host.clone())).unwrap();
    assert_eq!(host.borrow().listeners.len(), 4);

    viewer.frame(Duration::from_millis(16));
    let labels = viewer.labels().to_vec();
    assert_eq!(labels.len(), 1);
    assert_eq!(labels[0].id, "B");
    assert_eq!(labels[0].text, "Critical alarm");
    assert_eq!(labels[0].status, ZoneStatus::Critical);

    let a_center = screen_position(&viewer, Vec3::new(-3.5, 0.5, -4.0));
    viewer.pointer_down(a_center);
    viewer.pointer_up(a_center);
    viewer.click(a_center);

    let selected = viewer.selection().unwrap();
    assert_eq!(selected.kind, EntityKind::Zone);
    assert_eq!(selected.id, "A");
    assert_eq!(viewer.labels(), labels.as_slice());

    viewer.frame(Duration::from_millis(16));
    assert_eq!(viewer.labels(), labels.as_slice());
    assert_eq!(host.borrow().drawn_labels, vec![1, 1]);

    viewer.unmount();
    assert!(handle.is_cancelled());
    assert!(host.borrow().listeners.is_empty());
    assert_eq!(host.borrow().live_surfaces, 0);
    assert!(viewer.scene().registry.is_empty());
}
