//! Static deployment configuration. Everything here is baked in at build
//! time: credentials, broker address, weather coordinates and the page set
//! for this device. None of it is part of the runtime protocol.

use pixelclock_core::command::ParseMode;
use pixelclock_core::state::Page;

pub const WIFI_SSID: &str = "your-network";
pub const WIFI_PASSWORD: &str = "your-password";

pub const MQTT_HOST: &str = "192.168.1.100";
pub const MQTT_PORT: u16 = 1883;
pub const MQTT_CLIENT_ID: &str = "pixelclock";

/// Base for all command topics: `<base>/<suffix>`.
pub const TOPIC_BASE: &str = "pixelclock";

pub const WEATHER_LATITUDE: f32 = 41.85;
pub const WEATHER_LONGITUDE: f32 = -87.65;
pub const WEATHER_API_KEY: &str = "your-openweathermap-key";

/// Rotation set for this deployment; drop `Page::Calendar` for the
/// two-page variant.
pub const PAGES: &[Page] = &[Page::Clock, Page::Calendar, Page::Weather];

/// Inbound payload strictness. Lenient repairs bare JSON keys once before
/// giving up on a payload.
pub const PARSE_MODE: ParseMode = ParseMode::Lenient;

/// Seed for the network stack's local port randomization.
pub const NET_SEED: u64 = 0x0f38_11f3_9cc8_a64d;
