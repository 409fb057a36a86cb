//! Verdant Web - Greenhouse digital twin in the browser
//!
//! Hosts the `verdant-scene` viewer inside a Bevy app rendering to
//! `#verdant-canvas`, with an egui overlay for labels and zone details.

mod app;
mod input;
mod network;
mod twin;
mod ui;

use wasm_bindgen::prelude::*;

/// Entry point for WASM module
#[wasm_bindgen(start)]
pub fn main() {
    // Set panic hook for better error messages
    console_error_panic_hook::set_once();

    // Initialize logging with filtering to reduce wgpu noise
    tracing_wasm::set_as_global_default_with_config(
        tracing_wasm::WASMLayerConfigBuilder::new()
            .set_max_level(tracing::Level::WARN)
            .build()
    );

    app::run();
}
