//! Background theme selection.
//!
//! Maps a WMO weather code plus the local time of day at the forecast
//! location to a gradient key such as `clear_dawn` or `rain_night`.
//! Resolution is total: exact key, then the day/night variant, then the
//! bare category, then `default_day` / `default_night`.

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{DateTime, FixedOffset, Local, Timelike, Utc};
use chrono_tz::Tz;

const MINUTES_PER_HOUR: i32 = 60;

/// Visual category derived from a weather code
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ThemeCategory {
    Clear,
    PartlyCloudy,
    Overcast,
    Fog,
    LightRain,
    Rain,
    HeavyRain,
    Snow,
    Thunderstorm,
    Default,
}

impl ThemeCategory {
    /// Convert a WMO weather code.
    /// See: https://open-meteo.com/en/docs#weathervariables
    pub fn from_weather_code(code: i32) -> Self {
        match code {
            0 => Self::Clear,
            1 | 2 => Self::PartlyCloudy,
            3 => Self::Overcast,
            45 | 48 => Self::Fog,
            51 | 53 | 61 => Self::LightRain,
            55 | 56 | 57 | 63 | 66 | 67 | 80 | 81 => Self::Rain,
            65 | 82 => Self::HeavyRain,
            71 | 73 | 75 | 77 | 85 | 86 => Self::Snow,
            95 | 96 | 99 => Self::Thunderstorm,
            _ => Self::Default,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Clear => "clear",
            Self::PartlyCloudy => "partly_cloudy",
            Self::Overcast => "overcast",
            Self::Fog => "fog",
            Self::LightRain => "light_rain",
            Self::Rain => "rain",
            Self::HeavyRain => "heavy_rain",
            Self::Snow => "snow",
            Self::Thunderstorm => "thunderstorm",
            Self::Default => "default",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeOfDay {
    Dawn,
    Day,
    Evening,
    Night,
}

impl TimeOfDay {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dawn => "dawn",
            Self::Day => "day",
            Self::Evening => "evening",
            Self::Night => "night",
        }
    }

    /// Plain hour rule used when no sun times are known.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            5..=7 => Self::Dawn,
            8..=17 => Self::Day,
            18..=20 => Self::Evening,
            _ => Self::Night,
        }
    }

    /// Bucket a local minute-of-day against local sunrise/sunset minutes.
    ///
    /// Dawn and evening are the inclusive hour either side of sunrise and
    /// sunset. No wraparound: a minute past midnight is never "dawn" for a
    /// sunrise just before midnight.
    pub fn from_sun_times(now_minute: i32, sunrise_minute: i32, sunset_minute: i32) -> Self {
        let dawn_start = sunrise_minute - MINUTES_PER_HOUR;
        let dawn_end = sunrise_minute + MINUTES_PER_HOUR;
        let evening_start = sunset_minute - MINUTES_PER_HOUR;
        let evening_end = sunset_minute + MINUTES_PER_HOUR;

        if (dawn_start..=dawn_end).contains(&now_minute) {
            Self::Dawn
        } else if (evening_start..=evening_end).contains(&now_minute) {
            Self::Evening
        } else if now_minute > dawn_end && now_minute < evening_start {
            Self::Day
        } else {
            Self::Night
        }
    }
}

/// Where and when the sky is being drawn. Every field is optional.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SolarContext {
    /// Sunrise, epoch seconds
    pub sunrise: Option<i64>,
    /// Sunset, epoch seconds
    pub sunset: Option<i64>,
    /// IANA zone name of the location, e.g. `Europe/Paris`
    pub timezone: Option<String>,
    pub utc_offset_seconds: Option<i32>,
}

impl SolarContext {
    fn knows_zone(&self) -> bool {
        self.timezone.is_some() || self.utc_offset_seconds.is_some()
    }
}

/// Wall-clock minute of day (0..1440) of `instant` at the target location.
///
/// Tries the IANA zone, then the fixed UTC offset, then the process-local
/// zone. Never fails.
pub fn local_minute_of_day(
    instant: DateTime<Utc>,
    timezone: Option<&str>,
    utc_offset_seconds: Option<i32>,
) -> i32 {
    if let Some(name) = timezone {
        match name.parse::<Tz>() {
            Ok(tz) => return minute_of_day(&instant.with_timezone(&tz)),
            Err(_) => {
                tracing::debug!("Unknown timezone {:?}, falling back to UTC offset", name);
            }
        }
    }

    if let Some(seconds) = utc_offset_seconds {
        match FixedOffset::east_opt(seconds) {
            Some(offset) => return minute_of_day(&instant.with_timezone(&offset)),
            None => tracing::debug!("UTC offset {}s out of range, using local time", seconds),
        }
    }

    minute_of_day(&instant.with_timezone(&Local))
}

fn minute_of_day<T: Timelike>(t: &T) -> i32 {
    // hour() < 24 and minute() < 60, so this always fits
    (t.hour() * 60 + t.minute()) as i32
}

/// Time-of-day bucket at `now` for the given location context.
///
/// With sunrise and sunset the bucket follows the sun. Without them the
/// hour rule applies if the location's zone is known; with no temporal
/// context at all the caller's `is_day` flag decides between day and night.
pub fn time_of_day_at(now: DateTime<Utc>, is_day: bool, ctx: &SolarContext) -> TimeOfDay {
    let tz = ctx.timezone.as_deref();
    let offset = ctx.utc_offset_seconds;

    match (ctx.sunrise, ctx.sunset) {
        (Some(sunrise), Some(sunset)) => {
            let (Some(sunrise), Some(sunset)) = (
                DateTime::from_timestamp(sunrise, 0),
                DateTime::from_timestamp(sunset, 0),
            ) else {
                return day_or_night(is_day);
            };
            TimeOfDay::from_sun_times(
                local_minute_of_day(now, tz, offset),
                local_minute_of_day(sunrise, tz, offset),
                local_minute_of_day(sunset, tz, offset),
            )
        }
        _ if ctx.knows_zone() => {
            let hour = local_minute_of_day(now, tz, offset) / MINUTES_PER_HOUR;
            TimeOfDay::from_hour(hour.unsigned_abs())
        }
        _ => day_or_night(is_day),
    }
}

fn day_or_night(is_day: bool) -> TimeOfDay {
    if is_day {
        TimeOfDay::Day
    } else {
        TimeOfDay::Night
    }
}

/// Registered gradients, keyed by theme key.
#[derive(Debug, Clone, Default)]
pub struct GradientRegistry {
    gradients: HashMap<String, Vec<&'static str>>,
}

impl GradientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a gradient.
    pub fn with(mut self, key: impl Into<String>, colors: &[&'static str]) -> Self {
        self.gradients.insert(key.into(), colors.to_vec());
        self
    }

    /// The shipped palette.
    pub fn builtin() -> &'static GradientRegistry {
        static BUILTIN: OnceLock<GradientRegistry> = OnceLock::new();
        BUILTIN.get_or_init(|| {
            BUILTIN_GRADIENTS
                .iter()
                .fold(GradientRegistry::new(), |registry, (key, colors)| {
                    registry.with(*key, colors)
                })
        })
    }

    pub fn contains(&self, key: &str) -> bool {
        self.gradients.contains_key(key)
    }

    pub fn gradient(&self, key: &str) -> Option<&[&'static str]> {
        self.gradients.get(key).map(Vec::as_slice)
    }

    /// Colors for `key`, or the bare `default` gradient (or nothing, for an
    /// empty registry).
    pub fn gradient_or_default(&self, key: &str) -> &[&'static str] {
        self.gradient(key)
            .or_else(|| self.gradient(ThemeCategory::Default.as_str()))
            .unwrap_or(&[])
    }

    /// Pick the most specific registered key.
    pub fn resolve(&self, category: ThemeCategory, time: TimeOfDay, is_day: bool) -> String {
        let base = category.as_str();

        let exact = format!("{}_{}", base, time.as_str());
        if self.contains(&exact) {
            return exact;
        }

        let day_night = format!("{}_{}", base, if is_day { "day" } else { "night" });
        if self.contains(&day_night) {
            return day_night;
        }

        if self.contains(base) {
            return base.to_string();
        }

        if is_day {
            "default_day".to_string()
        } else {
            "default_night".to_string()
        }
    }

    pub fn theme_key_at(
        &self,
        now: DateTime<Utc>,
        weather_code: i32,
        is_day: bool,
        ctx: &SolarContext,
    ) -> String {
        let category = ThemeCategory::from_weather_code(weather_code);
        let time = time_of_day_at(now, is_day, ctx);
        self.resolve(category, time, is_day)
    }
}

/// Theme key for the current instant using the shipped palette.
pub fn theme_key(weather_code: i32, is_day: bool, ctx: &SolarContext) -> String {
    theme_key_at(Utc::now(), weather_code, is_day, ctx)
}

/// Theme key at a fixed instant using the shipped palette.
pub fn theme_key_at(
    now: DateTime<Utc>,
    weather_code: i32,
    is_day: bool,
    ctx: &SolarContext,
) -> String {
    GradientRegistry::builtin().theme_key_at(now, weather_code, is_day, ctx)
}

/// Colors for a key from the shipped palette.
pub fn gradient(key: &str) -> Option<&'static [&'static str]> {
    GradientRegistry::builtin().gradient(key)
}

// light_rain deliberately has no time-of-day variants.
const BUILTIN_GRADIENTS: &[(&str, &[&str])] = &[
    ("clear_dawn", &["#FF6B6B", "#FFE66D", "#87CEEB", "#6BB6FF"]),
    ("clear_day", &["#87CEEB", "#6BB6FF", "#4A90E2", "#74C7EC"]),
    ("clear_evening", &["#FF8E53", "#FF6B9D", "#9B59B6", "#2E4B7C"]),
    ("clear_night", &["#0B1426", "#1B2951", "#2E4B7C", "#2A3A5C"]),
    ("partly_cloudy_dawn", &["#FFB366", "#FFA726", "#87CEEB", "#6BB6FF"]),
    ("partly_cloudy_day", &["#74B9FF", "#6BB6FF", "#4A90E2", "#87CEEB"]),
    ("partly_cloudy_evening", &["#FF7043", "#8E24AA", "#5E35B1", "#3F51B5"]),
    ("partly_cloudy_night", &["#2D3436", "#74B9FF", "#4A5568"]),
    ("overcast_dawn", &["#D2691E", "#B0C4DE", "#87CEEB"]),
    ("overcast_day", &["#87CEEB", "#778899", "#708090"]),
    ("overcast_evening", &["#CD853F", "#A0522D", "#708090"]),
    ("overcast_night", &["#1C1C1C", "#2F2F2F", "#2A2A2A"]),
    ("fog_dawn", &["#FFDAB9", "#F5F5F5", "#E0E0E0"]),
    ("fog_day", &["#F5F5F5", "#E0E0E0", "#D3D3D3"]),
    ("fog_evening", &["#F5DEB3", "#F5F5F5", "#E0E0E0"]),
    ("fog_night", &["#2A2A2A", "#3A3A3A", "#2F2F2F"]),
    ("light_rain", &["#74B9FF", "#4682B4", "#2F4F4F"]),
    ("rain_dawn", &["#E1A95F", "#4682B4", "#2F4F4F", "#708090"]),
    ("rain_day", &["#4682B4", "#2F4F4F", "#708090"]),
    ("rain_evening", &["#CD853F", "#4682B4", "#2F4F4F"]),
    ("rain_night", &["#0F0F23", "#1A1A2E", "#1A1A3A"]),
    ("heavy_rain_dawn", &["#D2691E", "#2F4F4F", "#4682B4"]),
    ("heavy_rain_day", &["#2F4F4F", "#4682B4", "#74B9FF"]),
    ("heavy_rain_evening", &["#A0522D", "#2F4F4F", "#4682B4"]),
    ("heavy_rain_night", &["#0A0A0A", "#1A1A2E", "#1A1A2A"]),
    ("snow_dawn", &["#FFE4E1", "#F0F8FF", "#E6E6FA"]),
    ("snow_day", &["#F0F8FF", "#E6E6FA", "#B0C4DE"]),
    ("snow_evening", &["#F5DEB3", "#F0F8FF", "#E6E6FA"]),
    ("snow_night", &["#2F2F4F", "#4A4A6A", "#3A3A5A"]),
    ("thunderstorm_dawn", &["#8B4513", "#2F4F4F", "#4682B4"]),
    ("thunderstorm_day", &["#2F4F4F", "#4682B4", "#87CEEB"]),
    ("thunderstorm_evening", &["#654321", "#2F4F4F", "#4682B4"]),
    ("thunderstorm_night", &["#000000", "#0F0F23", "#1A1A2E"]),
    ("default_dawn", &["#FF6B6B", "#FFE66D", "#87CEEB", "#6BB6FF"]),
    ("default_day", &["#87CEEB", "#6BB6FF", "#4A90E2", "#74C7EC"]),
    ("default_evening", &["#FF8E53", "#FF6B9D", "#9B59B6", "#2E4B7C"]),
    ("default_night", &["#0B1426", "#1B2951", "#2E4B7C", "#2A3A5C"]),
    ("default", &["#87CEEB", "#6BB6FF", "#4A90E2", "#74C7EC"]),
];
