//! The shared state store: every entity both execution contexts coordinate
//! through. The firmware wraps one [`SharedState`] in a single mutex; all
//! mutation paths (command handlers, weather writer, time writer, page
//! scheduler, compositor) go through that lock.

use embedded_graphics::pixelcolor::Rgb888;
use heapless::String;

use crate::age_ms;
use crate::clock::TimeSource;
use crate::weather::Condition;

/// Maximum notification text length in bytes.
pub const NOTIFICATION_TEXT_MAX: usize = 63;

/// Default notification color (yellow).
pub const DEFAULT_NOTIFY_COLOR: Rgb888 = Rgb888::new(255, 200, 0);

/// Runtime display configuration, mutated only by the `config` command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct DisplayConfig {
    pub page_duration_ms: u32,
    pub rotation_enabled: bool,
    pub weather_update_interval_ms: u32,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            page_duration_ms: 10_000,
            rotation_enabled: true,
            weather_update_interval_ms: 15 * 60_000,
        }
    }
}

/// Brightness policy state. `current_value` is recomputed every render tick
/// from the ambient curve or the manual value, then floored by night mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BrightnessState {
    pub auto_enabled: bool,
    pub manual_value: u8,
    pub current_value: u8,
    pub last_ambient_read_ms: u32,
}

impl Default for BrightnessState {
    fn default() -> Self {
        Self {
            auto_enabled: true,
            manual_value: 128,
            current_value: 128,
            last_ambient_read_ms: 0,
        }
    }
}

impl BrightnessState {
    /// Clamp an arbitrary requested level into the valid display range.
    pub fn clamp_level(requested: i64) -> u8 {
        requested.clamp(1, 255) as u8
    }

    /// Map a 12-bit ambient light reading to a display brightness.
    pub fn level_from_ambient(raw: u16) -> u8 {
        ((raw >> 4).min(255) as u8).max(1)
    }

    /// Recompute `current_value` from the latest ambient sample (if auto) or
    /// the manual value, then apply the night-mode floor.
    pub fn recompute(&mut self, ambient_raw: Option<u16>, night: bool, night_floor: u8) {
        if self.auto_enabled {
            if let Some(raw) = ambient_raw {
                self.current_value = Self::level_from_ambient(raw);
            }
        } else {
            self.current_value = self.manual_value;
        }
        if night && self.current_value > night_floor {
            self.current_value = night_floor;
        }
        debug_assert!(self.current_value >= 1);
    }
}

/// A transient text overlay that preempts page rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct NotificationState {
    pub active: bool,
    pub text: String<NOTIFICATION_TEXT_MAX>,
    pub color: Rgb888,
    pub started_at_ms: u32,
    pub end_at_ms: u32,
    pub scroll_speed_ms: u16,
    pub repeat_count: u8,
}

impl Default for NotificationState {
    fn default() -> Self {
        Self {
            active: false,
            text: String::new(),
            color: DEFAULT_NOTIFY_COLOR,
            started_at_ms: 0,
            end_at_ms: 0,
            scroll_speed_ms: 80,
            repeat_count: 2,
        }
    }
}

/// Latest successfully fetched weather. Retained unchanged on fetch failure;
/// `valid` stays false until the first successful fetch.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WeatherSnapshot {
    pub condition: Condition,
    pub is_night_icon: bool,
    pub temperature_f: f32,
    pub last_fetch_ms: u32,
    pub valid: bool,
}

impl Default for WeatherSnapshot {
    fn default() -> Self {
        Self {
            condition: Condition::Unknown,
            is_night_icon: false,
            temperature_f: 0.0,
            last_fetch_ms: 0,
            valid: false,
        }
    }
}

/// One full-screen display mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Page {
    Clock,
    Calendar,
    Weather,
}

impl Page {
    pub fn as_str(self) -> &'static str {
        match self {
            Page::Clock => "clock",
            Page::Calendar => "calendar",
            Page::Weather => "weather",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "clock" => Some(Page::Clock),
            "calendar" => Some(Page::Calendar),
            "weather" => Some(Page::Weather),
            _ => None,
        }
    }
}

/// Page rotation and colon animation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PageState {
    pub current_page: Page,
    pub last_page_change_ms: u32,
    pub colon_visible: bool,
    pub last_colon_toggle_ms: u32,
}

impl Default for PageState {
    fn default() -> Self {
        Self {
            current_page: Page::Clock,
            last_page_change_ms: 0,
            colon_visible: true,
            last_colon_toggle_ms: 0,
        }
    }
}

/// Everything behind the firmware's single state mutex. A reboot resets all
/// of it; nothing here persists.
#[derive(Debug, Clone, Default)]
pub struct SharedState {
    pub config: DisplayConfig,
    pub brightness: BrightnessState,
    pub notification: NotificationState,
    pub weather: WeatherSnapshot,
    pub time: TimeSource,
    pub page: PageState,
}

impl SharedState {
    /// Expire the notification once its deadline has passed. Called by the
    /// render engine at the top of each composited frame.
    pub fn expire_notification(&mut self, now_ms: u32) {
        if self.notification.active && crate::deadline_reached(now_ms, self.notification.end_at_ms)
        {
            self.notification = NotificationState::default();
        }
    }

    /// Whether the scheduled weather refresh is due.
    pub fn weather_refresh_due(&self, now_ms: u32) -> bool {
        !self.weather.valid
            || age_ms(now_ms, self.weather.last_fetch_ms) >= self.config.weather_update_interval_ms
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn defaults_match_boot_contract() {
        let state = SharedState::default();
        assert_eq!(state.config.page_duration_ms, 10_000);
        assert!(state.config.rotation_enabled);
        assert_eq!(state.config.weather_update_interval_ms, 900_000);
        assert_eq!(state.page.current_page, Page::Clock);
        assert!(!state.notification.active);
        assert!(!state.weather.valid);
        assert!(!state.time.available);
    }

    #[test]
    fn brightness_clamp_bounds() {
        assert_eq!(BrightnessState::clamp_level(i64::MIN), 1);
        assert_eq!(BrightnessState::clamp_level(0), 1);
        assert_eq!(BrightnessState::clamp_level(1), 1);
        assert_eq!(BrightnessState::clamp_level(255), 255);
        assert_eq!(BrightnessState::clamp_level(300), 255);
        assert_eq!(BrightnessState::clamp_level(i64::MAX), 255);
    }

    #[test]
    fn night_floor_only_lowers() {
        let mut b = BrightnessState {
            auto_enabled: false,
            manual_value: 200,
            ..Default::default()
        };
        b.recompute(None, true, 10);
        assert_eq!(b.current_value, 10);

        let mut dim = BrightnessState {
            auto_enabled: false,
            manual_value: 4,
            ..Default::default()
        };
        dim.recompute(None, true, 10);
        assert_eq!(dim.current_value, 4);
    }

    #[test]
    fn ambient_curve_tracks_sensor_in_auto_mode() {
        let mut b = BrightnessState::default();
        b.recompute(Some(4095), false, 10);
        assert_eq!(b.current_value, 255);
        b.recompute(Some(0), false, 10);
        assert_eq!(b.current_value, 1);
        // no fresh sample keeps the previous level
        b.recompute(None, false, 10);
        assert_eq!(b.current_value, 1);
    }

    #[test]
    fn notification_expires_exactly_at_deadline() {
        let mut state = SharedState::default();
        state.notification.active = true;
        state.notification.end_at_ms = 5_000;
        state.expire_notification(4_999);
        assert!(state.notification.active);
        state.expire_notification(5_000);
        assert!(!state.notification.active);
    }

    #[test]
    fn weather_refresh_due_on_boot_and_after_interval() {
        let mut state = SharedState::default();
        assert!(state.weather_refresh_due(0));
        state.weather.valid = true;
        state.weather.last_fetch_ms = 1_000;
        assert!(!state.weather_refresh_due(1_000 + 899_999));
        assert!(state.weather_refresh_due(1_000 + 900_000));
    }

    proptest! {
        #[test]
        fn brightness_always_in_display_range(requested in any::<i64>()) {
            let v = BrightnessState::clamp_level(requested);
            prop_assert!((1..=255).contains(&v));
        }

        #[test]
        fn ambient_level_always_in_display_range(raw in any::<u16>()) {
            let v = BrightnessState::level_from_ambient(raw);
            prop_assert!((1..=255).contains(&v));
        }
    }
}
