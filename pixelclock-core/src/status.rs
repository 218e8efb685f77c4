//! The periodic status record published to `<base>/status` as an
//! observability hook: connectivity, visible page, effective brightness and
//! the age anchor of the last successful weather fetch.

use serde::Serialize;

use crate::state::SharedState;

#[derive(Debug, Serialize)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StatusRecord {
    pub connected: bool,
    pub page: &'static str,
    pub brightness: u8,
    #[serde(rename = "lastWeatherFetchMs")]
    pub last_weather_fetch_ms: u32,
}

impl StatusRecord {
    pub fn gather(state: &SharedState, connected: bool) -> Self {
        Self {
            connected,
            page: state.page.current_page.as_str(),
            brightness: state.brightness.current_value,
            last_weather_fetch_ms: if state.weather.valid {
                state.weather.last_fetch_ms
            } else {
                0
            },
        }
    }

    /// Serialize into `buf`, returning the used prefix.
    pub fn to_json<'a>(&self, buf: &'a mut [u8]) -> Option<&'a [u8]> {
        let len = serde_json_core::to_slice(self, buf).ok()?;
        Some(&buf[..len])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::Page;

    #[test]
    fn serializes_with_schema_field_names() {
        let mut state = SharedState::default();
        state.page.current_page = Page::Weather;
        state.brightness.current_value = 42;
        state.weather.valid = true;
        state.weather.last_fetch_ms = 123_456;

        let record = StatusRecord::gather(&state, true);
        let mut buf = [0u8; 128];
        let json = core::str::from_utf8(record.to_json(&mut buf).unwrap())
            .unwrap()
            .to_owned();
        assert_eq!(
            json,
            r#"{"connected":true,"page":"weather","brightness":42,"lastWeatherFetchMs":123456}"#
        );
    }

    #[test]
    fn unfetched_weather_reports_zero_anchor() {
        let state = SharedState::default();
        let record = StatusRecord::gather(&state, false);
        assert!(!record.connected);
        assert_eq!(record.page, "clock");
        assert_eq!(record.last_weather_fetch_ms, 0);
    }
}
