//! Pointer and keyboard forwarding from Bevy input to the viewer

use bevy::prelude::*;
use bevy_egui::EguiContexts;
use verdant_scene::PointerEventKind;

use crate::twin::{drive_viewer, TwinViewer};

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Update, (forward_pointer, handle_deselection).before(drive_viewer));
    }
}

/// Translate left-button state into down/move/up/click for the viewer.
///
/// Presses that start over egui never reach the scene. A click is only
/// reported when the press also started in the scene.
fn forward_pointer(
    mut twin: NonSendMut<TwinViewer>,
    mouse_button: Res<ButtonInput<MouseButton>>,
    windows: Query<&Window>,
    mut contexts: EguiContexts,
    mut pressed_in_scene: Local<bool>,
) {
    // Check if egui wants the pointer
    let egui_wants_pointer = contexts
        .ctx_mut()
        .map(|ctx| ctx.wants_pointer_input())
        .unwrap_or(false);

    let Ok(window) = windows.single() else {
        return;
    };
    let Some(position) = window.cursor_position() else {
        return;
    };

    let link = twin.link.clone();
    let listening = |kind| link.borrow().is_listening(kind);

    if mouse_button.just_pressed(MouseButton::Left)
        && !egui_wants_pointer
        && listening(PointerEventKind::Down)
    {
        twin.viewer.pointer_down(position);
        *pressed_in_scene = true;
    }

    if mouse_button.pressed(MouseButton::Left) && listening(PointerEventKind::Move) {
        twin.viewer.pointer_move(position);
    }

    if mouse_button.just_released(MouseButton::Left) {
        if listening(PointerEventKind::Up) {
            twin.viewer.pointer_up(position);
        }
        if std::mem::take(&mut *pressed_in_scene)
            && !egui_wants_pointer
            && listening(PointerEventKind::Click)
        {
            twin.viewer.click(position);
        }
    }
}

/// Handle Escape key to deselect current selection
fn handle_deselection(mut twin: NonSendMut<TwinViewer>, keyboard: Res<ButtonInput<KeyCode>>) {
    if keyboard.just_pressed(KeyCode::Escape) {
        twin.viewer.clear_selection();
    }
}
