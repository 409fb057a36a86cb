//! Bevy application setup

use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use bevy_picking::DefaultPickingPlugins;
use verdant_scene::ViewerConfig;

use crate::input::InputPlugin;
use crate::network::NetworkPlugin;
use crate::twin::TwinPlugin;
use crate::ui::UiPlugin;

/// Viewer tunables. Native builds read `verdant.toml` from the working
/// directory; the browser build uses the defaults.
fn load_viewer_config() -> ViewerConfig {
    #[cfg(not(target_arch = "wasm32"))]
    {
        match ViewerConfig::load(std::path::Path::new("verdant.toml")) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("Invalid viewer configuration, using defaults: {}", e);
                ViewerConfig::default()
            }
        }
    }
    #[cfg(target_arch = "wasm32")]
    {
        ViewerConfig::default()
    }
}

/// Run the Bevy application
pub fn run() {
    App::new()
        .insert_resource(ClearColor(Color::srgb(0.06, 0.09, 0.16))) // Night-sky slate
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Verdant - Greenhouse Digital Twin".to_string(),
                canvas: Some("#verdant-canvas".to_string()),
                fit_canvas_to_parent: true,
                prevent_default_event_handling: false,
                ..default()
            }),
            ..default()
        }))
        // bevy_egui looks for the bevy_picking crate's PickingPlugin; add it before EguiPlugin
        .add_plugins(DefaultPickingPlugins)
        .add_plugins(EguiPlugin::default())
        .add_plugins(TwinPlugin {
            config: load_viewer_config(),
        })
        .add_plugins(InputPlugin)
        .add_plugins(NetworkPlugin)
        .add_plugins(UiPlugin)
        .run();
}
