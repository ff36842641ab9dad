//! Daylight port: local sunrise and sunset times.

use chrono::NaiveTime;

/// Source of today's sunrise and sunset, in local time.
pub trait DaylightSource: Send + Sync {
    fn sunrise(&self) -> NaiveTime;
    fn sunset(&self) -> NaiveTime;
}

/// Daylight times that do not change over the year.
#[derive(Debug, Clone, Copy)]
pub struct FixedDaylight {
    sunrise: NaiveTime,
    sunset: NaiveTime,
}

impl FixedDaylight {
    #[must_use]
    pub fn new(sunrise: NaiveTime, sunset: NaiveTime) -> Self {
        Self { sunrise, sunset }
    }
}

impl DaylightSource for FixedDaylight {
    fn sunrise(&self) -> NaiveTime {
        self.sunrise
    }

    fn sunset(&self) -> NaiveTime {
        self.sunset
    }
}
