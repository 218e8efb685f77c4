//! End-to-end host tests: inbound payloads through the command router into
//! the shared state, then out through the scheduler and compositor, the same
//! path the firmware drives every frame.

use embedded_graphics::pixelcolor::Rgb888;
use embedded_graphics::prelude::RgbColor;
use pixelclock_core::command::{self, CommandKind, Effect, ParseMode};
use pixelclock_core::render::Renderer;
use pixelclock_core::scheduler;
use pixelclock_core::state::{Page, SharedState};
use pixelclock_core::weather;

const PAGES: &[Page] = &[Page::Clock, Page::Calendar, Page::Weather];

fn deliver(state: &mut SharedState, suffix: &str, payload: &[u8], now_ms: u32) -> Option<Effect> {
    let kind = CommandKind::from_suffix(suffix).expect("known suffix");
    let cmd = command::parse(kind, payload, ParseMode::Strict).expect("valid payload");
    command::apply(state, cmd, now_ms)
}

#[test]
fn time_then_clock_renders_digits() {
    let mut state = SharedState::default();
    let mut renderer = Renderer::new();

    // nothing delivered yet: placeholder, no status pixel
    assert!(renderer.compose(&mut state, None, 0));
    assert_eq!(renderer.buffer.get(31, 7), Rgb888::BLACK);

    // 2024-07-03 12:00:00 CDT
    deliver(&mut state, "time", br#"{"unix_time":1720026000}"#, 1_000);
    assert!(renderer.compose(&mut state, None, 2_000));
    assert_ne!(renderer.buffer.get(31, 7), Rgb888::BLACK);
    assert!(renderer.buffer.lit_count() > 20);
}

#[test]
fn weather_command_round_trip() {
    let mut state = SharedState::default();

    let effect = deliver(&mut state, "weather", b"{}", 0);
    assert_eq!(effect, Some(Effect::FetchWeatherNow));

    // the fetch the effect triggers eventually stores a reading
    let reading = weather::parse_response(
        br#"{"weather":[{"main":"Thunderstorm","icon":"11d"}],"main":{"temp":88.5}}"#,
    )
    .unwrap();
    state.weather.apply(reading, 5_000);

    deliver(&mut state, "time", br#"{"unix_time":1720026000}"#, 5_000);
    deliver(&mut state, "page", br#"{"page":"weather"}"#, 5_000);

    let mut renderer = Renderer::new();
    assert!(renderer.compose(&mut state, None, 6_000));
    // warm temperature: leans red over blue
    let temp_pixel = pixelclock_core::render::temperature_color(88.5);
    assert!(temp_pixel.r() > temp_pixel.b());
}

#[test]
fn notification_preempts_rotation_then_restores_it() {
    let mut state = SharedState::default();
    deliver(&mut state, "time", br#"{"unix_time":1720026000}"#, 0);
    deliver(
        &mut state,
        "notify",
        br##"{"text":"DOOR","color":"#00ff00","duration":5}"##,
        0,
    );

    // rotation stands still while the notification shows
    for t in (0..20_000).step_by(1_000) {
        scheduler::tick(&mut state, PAGES, t);
        if state.notification.active {
            assert_eq!(state.page.current_page, Page::Clock);
        }
        let mut renderer = Renderer::new();
        renderer.compose(&mut state, None, t);
    }
    // expired by the compositor, rotation resumed afterwards
    assert!(!state.notification.active);
    assert_ne!(state.page.current_page, Page::Clock);
}

#[test]
fn config_changes_apply_to_rotation_and_weather_interval() {
    let mut state = SharedState::default();
    deliver(
        &mut state,
        "config",
        br#"{"page_duration":15,"weather_update_minutes":30}"#,
        0,
    );
    assert_eq!(state.config.page_duration_ms, 15_000);
    assert_eq!(state.config.weather_update_interval_ms, 1_800_000);

    scheduler::tick(&mut state, PAGES, 14_999);
    assert_eq!(state.page.current_page, Page::Clock);
    scheduler::tick(&mut state, PAGES, 15_000);
    assert_eq!(state.page.current_page, Page::Calendar);

    state.weather.valid = true;
    state.weather.last_fetch_ms = 0;
    assert!(!state.weather_refresh_due(1_799_999));
    assert!(state.weather_refresh_due(1_800_000));
}

#[test]
fn brightness_commands_clamp_into_display_range() {
    let mut state = SharedState::default();
    deliver(&mut state, "brightness", br#"{"brightness":900}"#, 0);
    assert_eq!(state.brightness.manual_value, 255);
    assert!(!state.brightness.auto_enabled);

    let mut renderer = Renderer::new();
    renderer.compose(&mut state, None, 0);
    assert_eq!(state.brightness.current_value, 255);

    deliver(&mut state, "brightness", br#"{"brightness":0}"#, 0);
    renderer.compose(&mut state, None, 0);
    assert_eq!(state.brightness.current_value, 1);

    deliver(&mut state, "auto_brightness", br#"{"enabled":true}"#, 0);
    assert!(state.brightness.auto_enabled);
}
