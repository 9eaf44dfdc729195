use arboard::Clipboard;
use macroquad::prelude::*;
use std::sync::OnceLock;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use waypoint_nav::config::{VisualConfig, DEFAULT_CONFIG_PATH};
use waypoint_nav::{CellKind, Config, ControlEvent, Coord, Direction, MissionController, MissionSnapshot, SpeedLevel};

const EMPTY: Color = Color::new(0.94, 0.94, 0.96, 1.0);
const OBSTACLE: Color = Color::new(0.12, 0.12, 0.14, 1.0);
const TASK: Color = Color::new(0.2, 0.71, 0.39, 1.0);
const TASK_DONE: Color = Color::new(0.71, 0.71, 0.75, 1.0);
const PATH: Color = Color::new(0.78, 0.86, 1.0, 1.0);
const BACKGROUND: Color = Color::new(0.98, 0.98, 0.99, 1.0);
const TEXT: Color = Color::new(0.16, 0.16, 0.2, 1.0);
const TEXT_SECONDARY: Color = Color::new(0.39, 0.39, 0.43, 1.0);
const COMPLETE: Color = Color::new(0.16, 0.47, 0.24, 1.0);

static CONFIG: OnceLock<Config> = OnceLock::new();

/// Read `config.toml` and install the subscriber on first use.
///
/// macroquad calls `window_conf` before `main`, so whichever runs first does the loading.
fn startup_config() -> &'static Config {
    CONFIG.get_or_init(|| {
        let (config, source) = Config::locate(DEFAULT_CONFIG_PATH);
        init_tracing(&config.logging.filter);
        source.log(DEFAULT_CONFIG_PATH);
        config
    })
}

fn window_conf() -> Conf {
    let config = startup_config();
    let visual = &config.visual;
    let stride = visual.cell_size + visual.margin;
    Conf {
        window_title: visual.window_title.clone(),
        window_width: (config.grid.cols as f32 * stride + visual.margin * 2.0) as i32,
        window_height: (visual.header_height + config.grid.rows as f32 * stride + visual.margin * 2.0) as i32,
        ..Default::default()
    }
}

/// Viewer state: the mission plus how to lay it out on screen
struct ViewerState {
    mission: MissionController,
    visual: VisualConfig,
}

impl ViewerState {
    fn cell_origin(&self, coord: Coord) -> (f32, f32) {
        let stride = self.visual.cell_size + self.visual.margin;
        let x = coord.col as f32 * stride + self.visual.margin;
        let y = self.visual.header_height + coord.row as f32 * stride + self.visual.margin;
        (x, y)
    }

    /// Map key presses to control events
    fn poll_events(&self) -> Vec<ControlEvent> {
        let mut events = Vec::new();
        if is_key_pressed(KeyCode::Space) {
            events.push(ControlEvent::ToggleAutoRun);
        }
        if is_key_pressed(KeyCode::S) {
            events.push(ControlEvent::Step);
        }
        for (key, level) in [(KeyCode::Key1, 1), (KeyCode::Key2, 2), (KeyCode::Key3, 3)] {
            if is_key_pressed(key) {
                if let Some(speed) = SpeedLevel::from_level(level) {
                    events.push(ControlEvent::SetSpeed(speed));
                }
            }
        }
        if is_key_pressed(KeyCode::R) {
            events.push(ControlEvent::Reset);
        }
        if is_key_pressed(KeyCode::Q) || is_key_pressed(KeyCode::Escape) {
            events.push(ControlEvent::Quit);
        }
        events
    }

    fn copy_to_clipboard(&self) {
        let layout = self.mission.grid().to_layout();
        match Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(layout) {
                    warn!("Failed to copy to clipboard: {}", e);
                } else {
                    info!("Grid layout copied to clipboard");
                    // Keep clipboard alive for a moment to ensure clipboard managers can capture it
                    std::thread::sleep(std::time::Duration::from_millis(100));
                }
            }
            Err(e) => {
                warn!("Failed to access clipboard: {}", e);
            }
        }
    }

    fn draw(&self) {
        let snap = self.mission.snapshot();
        clear_background(BACKGROUND);
        self.draw_grid(&snap);
        self.draw_header(&snap);
    }

    fn draw_grid(&self, snap: &MissionSnapshot) {
        let size = self.visual.cell_size;
        for row in 0..snap.rows {
            for col in 0..snap.cols {
                let coord = Coord::new(row, col);
                let (x, y) = self.cell_origin(coord);
                let kind = snap.cell(coord).unwrap_or(CellKind::Blocked);

                let fill = match kind {
                    CellKind::Blocked => OBSTACLE,
                    CellKind::Waypoint => TASK,
                    CellKind::VisitedWaypoint => TASK_DONE,
                    CellKind::Free if snap.path.contains(&coord) => PATH,
                    CellKind::Free | CellKind::Agent => EMPTY,
                };
                draw_rectangle(x, y, size, size, fill);

                if let Some(waypoint) = snap.waypoint_at(coord) {
                    if kind != CellKind::Agent {
                        let color = if waypoint.visited { TEXT_SECONDARY } else { WHITE };
                        let label = waypoint.id.to_string();
                        let dims = measure_text(&label, None, 24, 1.0);
                        draw_text(&label, x + (size - dims.width) / 2.0, y + (size + dims.height) / 2.0, 24.0, color);
                    }
                }
                if kind == CellKind::Agent {
                    draw_agent(x + size / 2.0, y + size / 2.0, size / 3.0, snap.facing);
                }

                draw_rectangle_lines(x, y, size, size, 1.0, Color::from_rgba(200, 200, 210, 255));
            }
        }
    }

    fn draw_header(&self, snap: &MissionSnapshot) {
        let width = screen_width();
        let header_height = self.visual.header_height;
        draw_rectangle(0.0, 0.0, width, header_height, WHITE);
        draw_line(0.0, header_height - 1.0, width, header_height - 1.0, 2.0, Color::from_rgba(220, 220, 230, 255));

        let total = snap.waypoints.len();
        let goal = snap.current_goal.map(|i| i + 1).unwrap_or(total);
        let stats = [
            (format!("Steps: {}", snap.steps_taken), TEXT),
            (format!("Waypoints: {}/{}", snap.visited_count(), total), TEXT),
            (format!("Goal: {}/{}", goal, total), TEXT),
            (format!("Speed: {}{}", snap.speed.label(), if snap.auto_run { " (auto)" } else { "" }), TEXT_SECONDARY),
        ];
        let mut x = 16.0;
        for (text, color) in &stats {
            draw_text(text, x, 26.0, 24.0, *color);
            x += 140.0;
        }

        let status_color = if self.mission.is_complete() { COMPLETE } else { TEXT_SECONDARY };
        draw_text(&snap.status_message, 16.0, 48.0, 22.0, status_color);
        draw_text(
            "Space=Run  S=Step  1/2/3=Speed  R=Reset  C=Copy  Q=Quit",
            16.0,
            70.0,
            20.0,
            TEXT_SECONDARY,
        );
    }
}

/// Body circle plus a wedge pointing the way the agent last moved
fn draw_agent(cx: f32, cy: f32, radius: f32, facing: Direction) {
    draw_circle(cx, cy, radius, Color::from_rgba(50, 100, 200, 255));
    draw_circle_lines(cx, cy, radius, 2.0, Color::from_rgba(30, 70, 160, 255));

    let (dr, dc) = facing.delta();
    let (dx, dy) = (dc as f32, dr as f32);
    let tip = vec2(cx + dx * (radius + 4.0), cy + dy * (radius + 4.0));
    let perp = vec2(-dy * 5.0, dx * 5.0);
    let base = vec2(cx + dx * radius * 0.3, cy + dy * radius * 0.3);
    draw_triangle(base + perp, base - perp, tip, Color::from_rgba(80, 140, 255, 255));
}

fn init_tracing(default_filter: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();
}

#[macroquad::main(window_conf)]
async fn main() {
    let config = startup_config();

    let mission = match MissionController::new(config.mission_settings(), config.build_provider()) {
        Ok(mission) => mission,
        Err(e) => {
            error!("Failed to start mission: {}", e);
            return;
        }
    };
    let mut state = ViewerState {
        mission,
        visual: config.visual.clone(),
    };

    'frames: loop {
        for event in state.poll_events() {
            if !state.mission.handle(event) {
                break 'frames;
            }
        }

        // Copy grid to clipboard on C key
        if is_key_pressed(KeyCode::C) {
            state.copy_to_clipboard();
        }

        state.mission.tick();
        state.draw();

        next_frame().await
    }
}
