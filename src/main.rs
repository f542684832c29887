mod config;
mod debug;
mod gameplay;
mod input;
mod render;
mod states;
mod ui;
mod web;

use bevy::diagnostic::FrameTimeDiagnosticsPlugin;
use bevy::prelude::*;
use bevy_egui::EguiPlugin;
use config::ConfigPlugin;
use debug::DebugOverlayPlugin;
use gameplay::GameplayPlugin;
use input::InputPlugin;
use render::RenderPlugin;
use states::{GameState, GameStatePlugin};
use ui::GameHudPlugin;
use web::WebSupportPlugin;

fn main() {
    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "Portfolio Drive".to_string(),
                resolution: (1280, 720).into(),
                ..default()
            }),
            ..default()
        }))
        .add_plugins(EguiPlugin::default())
        .add_plugins(FrameTimeDiagnosticsPlugin::default())
        .add_plugins(ConfigPlugin)
        .add_plugins(WebSupportPlugin)
        .add_plugins(InputPlugin)
        .add_plugins(GameplayPlugin)
        .add_plugins(RenderPlugin)
        .add_plugins(GameHudPlugin)
        .add_plugins(DebugOverlayPlugin)
        .init_state::<GameState>()
        .add_plugins(GameStatePlugin)
        .run();
}
