//! The command router: inbound protocol messages arrive as
//! `<base>/<suffix>` topics with JSON payloads. The suffix is resolved to a
//! closed [`CommandKind`] once, the payload length is checked against the
//! hard cap *before* any parsing, and each kind deserializes under its own
//! strict schema. Parsed commands are applied to the shared state as a
//! separate, pure step so both halves test on the host.

use embedded_graphics::pixelcolor::Rgb888;
use heapless::String;
use serde::Deserialize;

use crate::render::{NotifyLayout, notification_layout};
use crate::state::{
    BrightnessState, DEFAULT_NOTIFY_COLOR, NOTIFICATION_TEXT_MAX, Page, SharedState,
};
use crate::WIDTH;

/// Hard cap on inbound payload size, enforced before parsing.
pub const MAX_PAYLOAD_BYTES: usize = 500;

/// Capacity of the lenient-mode repair buffer. Quoting bare keys grows a
/// payload by two bytes per key, so this bounds the repairable key count.
const REPAIR_BUF_BYTES: usize = 600;

const DEFAULT_NOTIFY_DURATION_S: u32 = 4;
const DEFAULT_NOTIFY_SPEED_MS: u16 = 80;
const DEFAULT_NOTIFY_REPEAT: u8 = 2;

/// Payload parsing strictness. Lenient mode retries a failed parse after one
/// bounded repair pass that quotes bare object keys; it never rewrites
/// anything else.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ParseMode {
    Strict,
    Lenient,
}

/// The closed set of inbound command kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandKind {
    Notify,
    Page,
    Brightness,
    AutoBrightness,
    Config,
    Weather,
    Time,
}

impl CommandKind {
    pub const ALL: [CommandKind; 7] = [
        CommandKind::Notify,
        CommandKind::Page,
        CommandKind::Brightness,
        CommandKind::AutoBrightness,
        CommandKind::Config,
        CommandKind::Weather,
        CommandKind::Time,
    ];

    /// Topic suffix for this command.
    pub fn suffix(self) -> &'static str {
        match self {
            CommandKind::Notify => "notify",
            CommandKind::Page => "page",
            CommandKind::Brightness => "brightness",
            CommandKind::AutoBrightness => "auto_brightness",
            CommandKind::Config => "config",
            CommandKind::Weather => "weather",
            CommandKind::Time => "time",
        }
    }

    /// Resolve a topic suffix. Unknown suffixes are simply not ours.
    pub fn from_suffix(suffix: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.suffix() == suffix)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolError {
    /// Payload longer than [`MAX_PAYLOAD_BYTES`]; dropped before parsing.
    Oversized(usize),
    /// Payload failed to deserialize under the command's schema.
    Malformed,
    /// `page` command named a page this firmware does not know.
    UnknownPage,
    /// `color` field was present but not a 6-digit hex color.
    InvalidColor,
}

/// A fully validated command, ready to apply.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Command {
    Notify {
        text: String<NOTIFICATION_TEXT_MAX>,
        color: Rgb888,
        duration_s: u32,
        speed_ms: u16,
        repeat: u8,
    },
    SetPage(Page),
    SetBrightness(u8),
    SetAutoBrightness(bool),
    UpdateConfig {
        page_duration_s: Option<u32>,
        rotation_enabled: Option<bool>,
        weather_update_minutes: Option<u32>,
    },
    FetchWeather,
    SetTime(i64),
}

/// Side effects a command asks of the network context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Effect {
    FetchWeatherNow,
}

#[derive(Deserialize)]
struct NotifyPayload {
    text: String<NOTIFICATION_TEXT_MAX>,
    color: Option<String<8>>,
    duration: Option<u32>,
    speed: Option<u16>,
    repeat: Option<u8>,
}

#[derive(Deserialize)]
struct PagePayload {
    page: String<16>,
}

#[derive(Deserialize)]
struct BrightnessPayload {
    brightness: i64,
}

#[derive(Deserialize)]
struct AutoBrightnessPayload {
    enabled: bool,
}

#[derive(Deserialize)]
struct ConfigPayload {
    page_duration: Option<u32>,
    rotation_enabled: Option<bool>,
    weather_update_minutes: Option<u32>,
}

#[derive(Deserialize)]
struct TimePayload {
    unix_time: i64,
}

/// Parse a payload for a known command kind.
pub fn parse(kind: CommandKind, payload: &[u8], mode: ParseMode) -> Result<Command, ProtocolError> {
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(ProtocolError::Oversized(payload.len()));
    }
    match kind {
        CommandKind::Notify => {
            let p: NotifyPayload = parse_json(payload, mode)?;
            let color = match &p.color {
                Some(hex) => parse_hex_color(hex).ok_or(ProtocolError::InvalidColor)?,
                None => DEFAULT_NOTIFY_COLOR,
            };
            Ok(Command::Notify {
                text: p.text,
                color,
                duration_s: p.duration.unwrap_or(DEFAULT_NOTIFY_DURATION_S),
                speed_ms: p.speed.unwrap_or(DEFAULT_NOTIFY_SPEED_MS),
                repeat: p.repeat.unwrap_or(DEFAULT_NOTIFY_REPEAT),
            })
        }
        CommandKind::Page => {
            let p: PagePayload = parse_json(payload, mode)?;
            Page::from_name(p.page.as_str())
                .map(Command::SetPage)
                .ok_or(ProtocolError::UnknownPage)
        }
        CommandKind::Brightness => {
            let p: BrightnessPayload = parse_json(payload, mode)?;
            Ok(Command::SetBrightness(BrightnessState::clamp_level(
                p.brightness,
            )))
        }
        CommandKind::AutoBrightness => {
            let p: AutoBrightnessPayload = parse_json(payload, mode)?;
            Ok(Command::SetAutoBrightness(p.enabled))
        }
        CommandKind::Config => {
            let p: ConfigPayload = parse_json(payload, mode)?;
            Ok(Command::UpdateConfig {
                page_duration_s: p.page_duration,
                rotation_enabled: p.rotation_enabled,
                weather_update_minutes: p.weather_update_minutes,
            })
        }
        // body is ignored by contract, malformed or not
        CommandKind::Weather => Ok(Command::FetchWeather),
        CommandKind::Time => {
            let p: TimePayload = parse_json(payload, mode)?;
            Ok(Command::SetTime(p.unix_time))
        }
    }
}

/// Apply a command to the shared state. Returns the side effect the network
/// context must carry out, if any.
pub fn apply(state: &mut SharedState, command: Command, now_ms: u32) -> Option<Effect> {
    match command {
        Command::Notify {
            text,
            color,
            duration_s,
            speed_ms,
            repeat,
        } => {
            let end_at_ms = match notification_layout(text.as_str()) {
                NotifyLayout::Scroll { text_width } => {
                    // one loop carries the text fully across and off the matrix
                    let loop_px = (text_width + WIDTH) as u32;
                    now_ms.wrapping_add(
                        u32::from(speed_ms.max(1))
                            .saturating_mul(loop_px)
                            .saturating_mul(u32::from(repeat.max(1))),
                    )
                }
                _ => now_ms.wrapping_add(duration_s.saturating_mul(1_000)),
            };
            let n = &mut state.notification;
            n.active = true;
            n.text = text;
            n.color = color;
            n.started_at_ms = now_ms;
            n.end_at_ms = end_at_ms;
            n.scroll_speed_ms = speed_ms;
            n.repeat_count = repeat;
            None
        }
        Command::SetPage(page) => {
            if state.page.current_page != page {
                state.page.current_page = page;
                state.page.last_page_change_ms = now_ms;
            }
            None
        }
        Command::SetBrightness(level) => {
            state.brightness.manual_value = level;
            state.brightness.auto_enabled = false;
            None
        }
        Command::SetAutoBrightness(enabled) => {
            state.brightness.auto_enabled = enabled;
            None
        }
        Command::UpdateConfig {
            page_duration_s,
            rotation_enabled,
            weather_update_minutes,
        } => {
            if let Some(s) = page_duration_s {
                state.config.page_duration_ms = s.saturating_mul(1_000);
            }
            if let Some(enabled) = rotation_enabled {
                state.config.rotation_enabled = enabled;
            }
            if let Some(minutes) = weather_update_minutes {
                state.config.weather_update_interval_ms = minutes.saturating_mul(60_000);
            }
            None
        }
        Command::FetchWeather => Some(Effect::FetchWeatherNow),
        Command::SetTime(unix_time) => {
            state.time.update(unix_time, now_ms);
            None
        }
    }
}

fn parse_json<T: serde::de::DeserializeOwned>(
    payload: &[u8],
    mode: ParseMode,
) -> Result<T, ProtocolError> {
    match serde_json_core::from_slice::<T>(payload) {
        Ok((value, _)) => Ok(value),
        Err(_) if mode == ParseMode::Lenient => {
            let text = core::str::from_utf8(payload).map_err(|_| ProtocolError::Malformed)?;
            let mut repaired: String<REPAIR_BUF_BYTES> = String::new();
            repair_bare_keys(text, &mut repaired)?;
            let (value, _) = serde_json_core::from_slice::<T>(repaired.as_bytes())
                .map_err(|_| ProtocolError::Malformed)?;
            Ok(value)
        }
        Err(_) => Err(ProtocolError::Malformed),
    }
}

/// One bounded repair pass for lenient parsing: wrap bare object keys (an
/// identifier followed by `:`) in quotes. String contents and everything
/// else pass through untouched.
fn repair_bare_keys<const N: usize>(
    input: &str,
    out: &mut String<N>,
) -> Result<(), ProtocolError> {
    let overflow = |_| ProtocolError::Malformed;
    let bytes = input.as_bytes();
    let mut chars = input.char_indices();
    let mut in_string = false;
    let mut escaped = false;

    while let Some((i, c)) = chars.next() {
        if in_string {
            out.push(c).map_err(overflow)?;
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        if c == '"' {
            in_string = true;
            out.push(c).map_err(overflow)?;
            continue;
        }
        if c.is_ascii_alphabetic() || c == '_' {
            // scan the identifier, then peek past whitespace for a `:`
            let start = i;
            let mut end = i + 1;
            while end < bytes.len() && (bytes[end].is_ascii_alphanumeric() || bytes[end] == b'_')
            {
                end += 1;
                chars.next();
            }
            let mut peek = end;
            while peek < bytes.len() && bytes[peek].is_ascii_whitespace() {
                peek += 1;
            }
            let is_key = peek < bytes.len() && bytes[peek] == b':';
            if is_key {
                out.push('"').map_err(overflow)?;
            }
            out.push_str(&input[start..end]).map_err(overflow)?;
            if is_key {
                out.push('"').map_err(overflow)?;
            }
            continue;
        }
        out.push(c).map_err(overflow)?;
    }
    Ok(())
}

fn parse_hex_color(hex: &str) -> Option<Rgb888> {
    let digits = hex.strip_prefix('#').unwrap_or(hex);
    if digits.len() != 6 || !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
    Some(Rgb888::new(channel(0)?, channel(2)?, channel(4)?))
}
