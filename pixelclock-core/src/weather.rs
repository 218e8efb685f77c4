//! Weather data mapping: parse the provider's JSON response and reduce it to
//! the display-friendly condition/temperature pair. The HTTP transfer itself
//! lives in the firmware crate; on any failure there the previous snapshot
//! is simply retained.

use heapless::{String, Vec};
use serde::Deserialize;

use crate::state::WeatherSnapshot;

/// Display condition categories. `Unknown` only occurs before the first
/// successful fetch; unrecognized provider strings map to `Clouds`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Condition {
    Clear,
    Clouds,
    Rain,
    Drizzle,
    Snow,
    Thunderstorm,
    Unknown,
}

impl Condition {
    pub fn from_provider(s: &str) -> Self {
        match s {
            "Clear" => Condition::Clear,
            "Clouds" => Condition::Clouds,
            "Rain" => Condition::Rain,
            "Drizzle" => Condition::Drizzle,
            "Snow" => Condition::Snow,
            "Thunderstorm" => Condition::Thunderstorm,
            _ => Condition::Clouds,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Condition::Clear => "clear",
            Condition::Clouds => "clouds",
            Condition::Rain => "rain",
            Condition::Drizzle => "drizzle",
            Condition::Snow => "snow",
            Condition::Thunderstorm => "thunderstorm",
            Condition::Unknown => "unknown",
        }
    }
}

#[derive(Debug, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WeatherError {
    /// Response body did not parse under the expected schema.
    BadResponse,
    /// Response parsed but carried no weather entry.
    EmptyReport,
}

#[derive(Deserialize)]
struct ProviderMain {
    temp: f32,
}

#[derive(Deserialize)]
struct ProviderCondition {
    main: String<24>,
    icon: String<4>,
}

#[derive(Deserialize)]
struct ProviderResponse {
    main: ProviderMain,
    weather: Vec<ProviderCondition, 3>,
}

/// A reduced weather report ready to store in the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct WeatherReading {
    pub temperature_f: f32,
    pub condition: Condition,
    pub is_night_icon: bool,
}

/// Parse a provider response body. The icon code's trailing character
/// distinguishes day (`d`) from night (`n`) artwork.
pub fn parse_response(body: &[u8]) -> Result<WeatherReading, WeatherError> {
    let (resp, _) = serde_json_core::from_slice::<ProviderResponse>(body)
        .map_err(|_| WeatherError::BadResponse)?;
    let primary = resp.weather.first().ok_or(WeatherError::EmptyReport)?;
    Ok(WeatherReading {
        temperature_f: resp.main.temp,
        condition: Condition::from_provider(primary.main.as_str()),
        is_night_icon: primary.icon.as_str().ends_with('n'),
    })
}

impl WeatherSnapshot {
    /// Store a successful reading.
    pub fn apply(&mut self, reading: WeatherReading, now_ms: u32) {
        self.condition = reading.condition;
        self.is_night_icon = reading.is_night_icon;
        self.temperature_f = reading.temperature_f;
        self.last_fetch_ms = now_ms;
        self.valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BODY: &[u8] = br#"{"coord":{"lon":-87.65,"lat":41.85},"weather":[{"id":211,"main":"Thunderstorm","description":"thunderstorm","icon":"11n"}],"base":"stations","main":{"temp":71.6,"feels_like":72.1,"temp_min":68.0,"temp_max":75.2,"pressure":1012,"humidity":83},"visibility":10000,"name":"Chicago","cod":200}"#;

    #[test]
    fn parses_provider_response() {
        let reading = parse_response(BODY).unwrap();
        assert_eq!(reading.condition, Condition::Thunderstorm);
        assert!(reading.is_night_icon);
        assert!((reading.temperature_f - 71.6).abs() < 1e-3);
    }

    #[test]
    fn day_icon_code() {
        let body = br#"{"weather":[{"main":"Clear","icon":"01d"}],"main":{"temp":32.0}}"#;
        let reading = parse_response(body).unwrap();
        assert_eq!(reading.condition, Condition::Clear);
        assert!(!reading.is_night_icon);
    }

    #[test]
    fn unknown_condition_defaults_to_clouds() {
        for s in ["Mist", "Haze", "Fog", "Squall", ""] {
            assert_eq!(Condition::from_provider(s), Condition::Clouds);
        }
        assert_eq!(Condition::from_provider("Snow"), Condition::Snow);
    }

    #[test]
    fn malformed_body_is_rejected() {
        assert_eq!(parse_response(b"not json"), Err(WeatherError::BadResponse));
        assert_eq!(
            parse_response(br#"{"weather":[],"main":{"temp":1.0}}"#),
            Err(WeatherError::EmptyReport)
        );
    }

    #[test]
    fn snapshot_apply_marks_valid() {
        let mut snap = WeatherSnapshot::default();
        assert!(!snap.valid);
        snap.apply(
            WeatherReading {
                temperature_f: -5.0,
                condition: Condition::Snow,
                is_night_icon: false,
            },
            42,
        );
        assert!(snap.valid);
        assert_eq!(snap.condition, Condition::Snow);
        assert_eq!(snap.last_fetch_ms, 42);
    }
}
