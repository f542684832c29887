use crate::config::GameConfig;
use crate::gameplay::next_unit_random;
use bevy::app::AppExit;
use bevy::prelude::*;

const LOADING_TICK_SECONDS: f32 = 0.2;
const LOADING_MAX_INCREMENT: f32 = 15.0;
const LOADING_SETTLE_SECONDS: f32 = 0.5;
const LOADING_SEED: u64 = 0x51DE_C0DE_2B7F_0042;

#[derive(States, Debug, Clone, Copy, Eq, PartialEq, Hash, Default)]
pub enum GameState {
    #[default]
    Boot,
    Loading,
    Portfolio,
    Driving,
}

pub struct GameStatePlugin;

impl Plugin for GameStatePlugin {
    fn build(&self, app: &mut App) {
        app.add_systems(Startup, setup_camera)
            .add_systems(OnEnter(GameState::Boot), enter_boot)
            .add_systems(Update, boot_to_loading.run_if(in_state(GameState::Boot)))
            .add_systems(OnEnter(GameState::Loading), enter_loading)
            .add_systems(OnExit(GameState::Loading), cleanup_loading_screen)
            .add_systems(
                Update,
                (advance_loading_progress, update_loading_screen)
                    .chain()
                    .run_if(in_state(GameState::Loading)),
            )
            .add_systems(OnEnter(GameState::Portfolio), enter_portfolio)
            .add_systems(OnExit(GameState::Portfolio), cleanup_portfolio_screen)
            .add_systems(
                Update,
                portfolio_controls.run_if(in_state(GameState::Portfolio)),
            )
            .add_systems(OnEnter(GameState::Driving), enter_driving);
    }
}

#[derive(Component)]
pub struct ScreenCamera;

#[derive(Component)]
struct LoadingScreenRoot;

#[derive(Component)]
struct LoadingProgressText;

#[derive(Component)]
struct PortfolioScreenRoot;

#[derive(Resource, Debug, Clone, Copy, PartialEq)]
pub struct LoadingProgress {
    percent: f32,
    since_tick_s: f32,
    settled_s: f32,
    seed: u64,
}

impl Default for LoadingProgress {
    fn default() -> Self {
        Self::with_seed(LOADING_SEED)
    }
}

impl LoadingProgress {
    pub fn with_seed(seed: u64) -> Self {
        Self {
            percent: 0.0,
            since_tick_s: 0.0,
            settled_s: 0.0,
            seed,
        }
    }

    pub fn percent(&self) -> f32 {
        self.percent
    }

    pub fn is_done(&self) -> bool {
        self.percent >= 100.0 && self.settled_s >= LOADING_SETTLE_SECONDS
    }

    pub fn advance(&mut self, dt: f32) -> f32 {
        let dt = if dt.is_finite() { dt.max(0.0) } else { 0.0 };
        if self.percent >= 100.0 {
            self.settled_s += dt;
            return self.percent;
        }

        self.since_tick_s += dt;
        while self.since_tick_s >= LOADING_TICK_SECONDS && self.percent < 100.0 {
            self.since_tick_s -= LOADING_TICK_SECONDS;
            let increment = next_unit_random(&mut self.seed) * LOADING_MAX_INCREMENT;
            self.percent = (self.percent + increment).min(100.0);
        }
        self.percent
    }
}

fn setup_camera(mut commands: Commands) {
    commands.spawn((Name::new("ScreenCamera"), ScreenCamera, Camera2d));
}

fn enter_boot() {
    info!("Entered state: Boot");
}

fn boot_to_loading(mut next_state: ResMut<NextState<GameState>>) {
    next_state.set(GameState::Loading);
}

fn enter_loading(mut commands: Commands) {
    info!("Entered state: Loading");
    commands.insert_resource(LoadingProgress::default());

    commands
        .spawn((
            Name::new("LoadingScreen"),
            LoadingScreenRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(12.0),
                ..default()
            },
            BackgroundColor(Color::srgb(0.04, 0.07, 0.13)),
            ZIndex(300),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("Loading portfolio"),
                TextFont {
                    font_size: 30.0,
                    ..default()
                },
                TextColor(Color::srgb(0.88, 0.95, 1.0)),
            ));
            parent.spawn((
                LoadingProgressText,
                Text::new("0%"),
                TextFont {
                    font_size: 22.0,
                    ..default()
                },
                TextColor(Color::srgb(0.55, 0.78, 0.98)),
            ));
        });
}

fn advance_loading_progress(
    time: Res<Time>,
    progress: Option<ResMut<LoadingProgress>>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let Some(mut progress) = progress else {
        return;
    };

    progress.advance(time.delta_secs());
    if progress.is_done() {
        next_state.set(GameState::Portfolio);
    }
}

fn update_loading_screen(
    progress: Option<Res<LoadingProgress>>,
    mut text_query: Query<&mut Text, With<LoadingProgressText>>,
) {
    let Some(progress) = progress else {
        return;
    };
    let Ok(mut text) = text_query.single_mut() else {
        return;
    };

    let label = format!("{:.0}%", progress.percent());
    if text.0 != label {
        text.0 = label;
    }
}

fn cleanup_loading_screen(
    mut commands: Commands,
    loading_query: Query<Entity, With<LoadingScreenRoot>>,
) {
    for entity in &loading_query {
        commands.entity(entity).try_despawn();
    }
    commands.remove_resource::<LoadingProgress>();
}

fn enter_portfolio(mut commands: Commands, config: Option<Res<GameConfig>>) {
    let (sections_text, drive_hint) = match config.as_deref() {
        Some(config) => (
            config
                .sections
                .sections
                .iter()
                .map(|section| format!("{}  -  {}", section.label, section.description))
                .collect::<Vec<_>>()
                .join("\n"),
            "Enter / G - Drive around and explore",
        ),
        None => (
            String::new(),
            "Drive mode unavailable: configuration failed to load",
        ),
    };

    commands
        .spawn((
            Name::new("PortfolioScreen"),
            PortfolioScreenRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                row_gap: Val::Px(14.0),
                ..default()
            },
            BackgroundColor(Color::srgb(0.04, 0.07, 0.13)),
            ZIndex(280),
        ))
        .with_children(|parent| {
            parent.spawn((
                Text::new("Portfolio"),
                TextFont {
                    font_size: 40.0,
                    ..default()
                },
                TextColor(Color::srgb(0.88, 0.95, 1.0)),
            ));
            parent.spawn((
                Text::new(sections_text),
                TextFont {
                    font_size: 18.0,
                    ..default()
                },
                TextColor(Color::srgb(0.70, 0.80, 0.90)),
            ));
            parent.spawn((
                Text::new(format!("{drive_hint}\nQ - Quit")),
                TextFont {
                    font_size: 20.0,
                    ..default()
                },
                TextColor(Color::srgb(0.98, 0.80, 0.35)),
            ));
        });

    info!("Entered state: Portfolio");
}

fn cleanup_portfolio_screen(
    mut commands: Commands,
    portfolio_query: Query<Entity, With<PortfolioScreenRoot>>,
) {
    for entity in &portfolio_query {
        commands.entity(entity).try_despawn();
    }
}

fn portfolio_controls(
    keyboard: Res<ButtonInput<KeyCode>>,
    mut next_state: ResMut<NextState<GameState>>,
    mut exit: MessageWriter<AppExit>,
) {
    if keyboard.any_just_pressed([KeyCode::Enter, KeyCode::KeyG]) {
        next_state.set(GameState::Driving);
    }

    if keyboard.just_pressed(KeyCode::KeyQ) {
        exit.write(AppExit::Success);
    }
}

fn enter_driving() {
    info!("Entered state: Driving");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loading_progress_is_monotonic_and_capped() {
        let mut progress = LoadingProgress::with_seed(7);
        let mut previous = progress.percent();

        for _ in 0..1_000 {
            let percent = progress.advance(1.0 / 60.0);
            assert!(percent >= previous && percent <= 100.0);
            previous = percent;
        }

        assert_eq!(progress.percent(), 100.0);
        assert!(progress.is_done());
    }

    #[test]
    fn loading_waits_to_settle_at_full() {
        let mut progress = LoadingProgress::with_seed(11);
        while progress.percent() < 100.0 {
            progress.advance(0.2);
        }
        assert!(!progress.is_done());

        progress.advance(0.3);
        assert!(!progress.is_done());
        progress.advance(0.25);
        assert!(progress.is_done());
    }

    #[test]
    fn loading_ignores_invalid_dt() {
        let mut progress = LoadingProgress::default();

        progress.advance(f32::NAN);
        progress.advance(-1.0);

        assert_eq!(progress.percent(), 0.0);
    }
}
