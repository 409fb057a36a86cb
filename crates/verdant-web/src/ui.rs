//! UI overlays using bevy_egui

use bevy::prelude::*;
use bevy_egui::{egui, EguiContexts, EguiPrimaryContextPass};
use verdant_core::{
    Actuator, ControlAction, Zone, ZoneStatus, DEFAULT_CONTROL_DURATION_SECS,
};
use verdant_scene::{SceneEntity, PLACEHOLDER_TEXT};

use crate::network::{send_control, BackendConfig, ControlFeedback, FetchState, PendingControl};
use crate::twin::{TwinViewer, ViewerStatus};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        // Main UI system runs in EguiPrimaryContextPass for proper input handling (bevy_egui 0.38+)
        app.add_systems(EguiPrimaryContextPass, ui_system);
    }
}

/// Changes requested while drawing, applied once the frame's UI is built
enum UiAction {
    SelectZone(String),
    ClearSelection,
    SetAutoPatrol(bool),
    Control {
        actuator_id: String,
        action: ControlAction,
    },
}

fn status_color(status: ZoneStatus) -> egui::Color32 {
    let [r, g, b] = status.color_rgb();
    egui::Color32::from_rgb(r, g, b)
}

fn ui_system(
    mut contexts: EguiContexts,
    mut twin: NonSendMut<TwinViewer>,
    status: Res<ViewerStatus>,
    fetch: Res<FetchState>,
    backend: Res<BackendConfig>,
    pending_control: Res<PendingControl>,
    mut feedback: ResMut<ControlFeedback>,
) {
    // Get the egui context - early return if not available
    let Ok(ctx) = contexts.ctx_mut() else { return };

    if let ViewerStatus::Failed(reason) = status.as_ref() {
        context_failure_panel(ctx, reason);
        return;
    }

    let mut actions = Vec::new();
    let viewer = &twin.viewer;

    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.heading("Verdant");
            ui.separator();
            match fetch.as_ref() {
                FetchState::Idle => {}
                FetchState::Loading => {
                    ui.spinner();
                    ui.label("Loading greenhouse...");
                }
                FetchState::Loaded {
                    greenhouse_id,
                    zones,
                } => {
                    ui.label(format!("Greenhouse {} · {} zones", greenhouse_id, zones));
                }
                FetchState::Failed(e) => {
                    ui.colored_label(egui::Color32::from_rgb(0xef, 0x44, 0x44), "●");
                    ui.label(format!("Backend unavailable: {}", e));
                }
            }

            ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                let mut patrol = viewer.auto_patrol();
                if ui.checkbox(&mut patrol, "Auto patrol").changed() {
                    actions.push(UiAction::SetAutoPatrol(patrol));
                }
            });
        });
    });

    if viewer.scene().placeholder.is_some() {
        egui::Area::new(egui::Id::new("placeholder"))
            .anchor(egui::Align2::CENTER_CENTER, egui::vec2(0.0, 0.0))
            .interactable(false)
            .show(ctx, |ui| {
                ui.label(
                    egui::RichText::new(PLACEHOLDER_TEXT)
                        .size(22.0)
                        .color(egui::Color32::from_gray(200)),
                );
            });
    }

    // Floating alert labels; clicking one selects its zone
    for label in viewer.labels() {
        egui::Area::new(egui::Id::new(("alert-label", label.id.as_str())))
            .fixed_pos(egui::pos2(label.x, label.y))
            .pivot(egui::Align2::CENTER_BOTTOM)
            .order(egui::Order::Foreground)
            .show(ctx, |ui| {
                let text = egui::RichText::new(format!("⚠ {}", label.text))
                    .color(egui::Color32::WHITE)
                    .strong();
                let button = egui::Button::new(text)
                    .fill(status_color(label.status))
                    .corner_radius(egui::CornerRadius::same(6));
                if ui.add(button).clicked() {
                    actions.push(UiAction::SelectZone(label.id.clone()));
                }
            });
    }

    if let Some(entity) = viewer.selection() {
        egui::SidePanel::right("detail_panel")
            .default_width(280.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(entity_title(entity));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.button("✕").clicked() {
                            actions.push(UiAction::ClearSelection);
                        }
                    });
                });
                ui.separator();

                if let Some(zone) = entity.zone() {
                    zone_details(ui, zone, feedback.in_flight > 0, &mut actions);
                } else if let Some(actuator) = entity.actuator() {
                    actuator_row(ui, actuator, feedback.in_flight > 0, &mut actions);
                }

                if let Some(message) = &feedback.message {
                    ui.separator();
                    ui.label(message);
                }
            });
    }

    for action in actions {
        match action {
            UiAction::SelectZone(id) => {
                twin.viewer.select_zone(&id);
            }
            UiAction::ClearSelection => twin.viewer.clear_selection(),
            UiAction::SetAutoPatrol(enabled) => twin.viewer.set_auto_patrol(enabled),
            UiAction::Control {
                actuator_id,
                action,
            } => match twin
                .viewer
                .control_command(&actuator_id, action, DEFAULT_CONTROL_DURATION_SECS)
            {
                Ok(command) => {
                    feedback.in_flight += 1;
                    feedback.message = Some(format!("Sending {}...", action.label()));
                    send_control(&backend, &pending_control, command);
                }
                Err(e) => feedback.message = Some(e.to_string()),
            },
        }
    }
}

fn entity_title(entity: &SceneEntity) -> String {
    match (entity.zone(), entity.actuator()) {
        (Some(zone), _) => zone.name.clone(),
        (_, Some(actuator)) => actuator.name.clone(),
        _ => entity.id.clone(),
    }
}

fn zone_details(ui: &mut egui::Ui, zone: &Zone, busy: bool, actions: &mut Vec<UiAction>) {
    ui.horizontal(|ui| {
        ui.colored_label(status_color(zone.status), "●");
        ui.label(zone.status.as_str());
    });
    if let Some(alert) = zone.alert_text() {
        ui.colored_label(status_color(zone.status), alert);
    }

    egui::Grid::new("zone_readings").num_columns(2).show(ui, |ui| {
        ui.label("Crop");
        ui.label(&zone.crop);
        ui.end_row();

        ui.label("Moisture");
        ui.label(zone.moisture.map_or("-".to_string(), |m| format!("{:.0}%", m)));
        ui.end_row();

        ui.label("Temperature");
        ui.label(zone.temperature.map_or("-".to_string(), |t| format!("{:.1} °C", t)));
        ui.end_row();

        ui.label("Days planted");
        ui.label(zone.days_planted.map_or("-".to_string(), |d| d.to_string()));
        ui.end_row();
    });

    if zone.actuators.is_empty() {
        return;
    }
    ui.separator();
    ui.label(egui::RichText::new("Actuators").strong());
    for actuator in &zone.actuators {
        actuator_row(ui, actuator, busy, actions);
    }
}

fn actuator_row(ui: &mut egui::Ui, actuator: &Actuator, busy: bool, actions: &mut Vec<UiAction>) {
    let action = ControlAction::for_actuator(actuator.kind);
    ui.horizontal(|ui| {
        ui.label(format!("{} ({})", actuator.name, actuator.kind.label()));
        ui.label(egui::RichText::new(&actuator.current_value).weak());
        if actuator.auto_mode {
            ui.label(egui::RichText::new("AUTO").small());
        }
        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
            let minutes = DEFAULT_CONTROL_DURATION_SECS / 60;
            let button = egui::Button::new(format!("{} {} min", action.label(), minutes));
            if ui.add_enabled(!busy, button).clicked() {
                actions.push(UiAction::Control {
                    actuator_id: actuator.id.clone(),
                    action,
                });
            }
        });
    });
}

/// Shown instead of the 3D view when no rendering context could be acquired
fn context_failure_panel(ctx: &egui::Context, reason: &str) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.vertical_centered(|ui| {
            ui.add_space(80.0);
            ui.heading("3D view unavailable");
            ui.label(reason);
            ui.add_space(8.0);
            ui.label("This browser could not provide a WebGPU or WebGL2 context.");
        });
    });
}
