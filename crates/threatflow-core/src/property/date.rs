use std::fmt;

use chrono::{
    DateTime, NaiveDate, NaiveDateTime, SecondsFormat, SubsecRound, TimeDelta, TimeZone, Utc,
};
use chrono_tz::Tz;
use serde_json::{Value, json};

use super::{NONE_DISPLAY, PropertyMeta, hash};

/// Formats accepted for wall-clock times without an offset.
const LOCAL_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// A timestamp paired with an explicit IANA time zone.
///
/// Times are normalized to millisecond precision on every write. Changing the
/// zone keeps the wall-clock time and re-interprets it in the new zone.
#[derive(Debug, Clone, PartialEq)]
pub struct DateProperty {
    meta: PropertyMeta,
    time: Option<DateTime<Tz>>,
    zone: Tz,
}

impl DateProperty {
    /// Creates an unset date in UTC.
    pub fn new(meta: PropertyMeta) -> Self {
        Self {
            meta,
            time: None,
            zone: Tz::UTC,
        }
    }

    pub fn with_zone(mut self, zone: Tz) -> Self {
        self.set_zone(zone);
        self
    }

    pub fn meta(&self) -> &PropertyMeta {
        &self.meta
    }

    pub fn time(&self) -> Option<&DateTime<Tz>> {
        self.time.as_ref()
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Sets the time from an absolute instant, expressed in this property's zone.
    pub fn set_instant<T: TimeZone>(&mut self, instant: &DateTime<T>) {
        self.time = Some(instant.with_timezone(&self.zone).trunc_subsecs(3));
    }

    /// Sets the time from a wall-clock reading in this property's zone.
    ///
    /// Ambiguous readings (clocks turned back) resolve to the earlier instant;
    /// readings inside a gap (clocks turned forward) move one hour later.
    pub fn set_local(&mut self, local: Option<NaiveDateTime>) {
        self.time = local
            .and_then(|naive| resolve_local(self.zone, naive))
            .map(|t| t.trunc_subsecs(3));
    }

    /// Switches zones, keeping the wall-clock time.
    pub fn set_zone(&mut self, zone: Tz) {
        let local = self.time.as_ref().map(|t| t.naive_local());
        self.zone = zone;
        self.set_local(local);
    }

    pub fn clear(&mut self) {
        self.time = None;
    }

    pub fn is_defined(&self) -> bool {
        self.time.is_some()
    }

    /// Renders the instant in UTC as `YYYY-MM-DDTHH:MM:SS.sssZ`.
    pub fn to_utc_iso(&self) -> Option<String> {
        self.time.as_ref().map(|t| {
            t.with_timezone(&Utc)
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string()
        })
    }

    pub fn to_json(&self) -> Value {
        match &self.time {
            Some(t) => json!({
                "time": t.to_rfc3339_opts(SecondsFormat::Millis, true),
                "zone": self.zone.name(),
            }),
            None => Value::Null,
        }
    }

    pub fn to_hash(&self) -> u64 {
        match &self.time {
            Some(t) => hash::hash_value(
                "date",
                &format!(
                    "{}.{}",
                    t.to_rfc3339_opts(SecondsFormat::Millis, true),
                    self.zone.name()
                ),
            ),
            None => hash::UNDEFINED_HASH,
        }
    }

    pub fn clone_with_id(&self, id: Option<&str>) -> Self {
        Self {
            meta: self.meta.renamed(id),
            ..self.clone()
        }
    }

    /// Accepts `null`, an ISO string (with or without offset), or `{time, zone}`.
    pub(crate) fn set_json(&mut self, value: &Value) {
        match value {
            Value::String(text) => self.set_text(text),
            Value::Object(map) => {
                if let Some(zone) = map
                    .get("zone")
                    .and_then(Value::as_str)
                    .and_then(|z| z.parse::<Tz>().ok())
                {
                    self.zone = zone;
                }
                match map.get("time").and_then(Value::as_str) {
                    Some(text) => self.set_text(text),
                    None => self.time = None,
                }
            }
            _ => self.time = None,
        }
    }

    fn set_text(&mut self, text: &str) {
        let text = text.trim();
        if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
            self.set_instant(&instant);
            return;
        }
        let local = LOCAL_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
            .or_else(|| {
                NaiveDate::parse_from_str(text, "%Y-%m-%d")
                    .ok()
                    .and_then(|d| d.and_hms_opt(0, 0, 0))
            });
        self.set_local(local);
    }
}

fn resolve_local(zone: Tz, naive: NaiveDateTime) -> Option<DateTime<Tz>> {
    zone.from_local_datetime(&naive).earliest().or_else(|| {
        zone.from_local_datetime(&(naive + TimeDelta::hours(1)))
            .earliest()
    })
}

impl fmt::Display for DateProperty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.time {
            Some(t) => write!(f, "{}", t.format("%Y-%m-%d %H:%M:%S %Z")),
            None => f.write_str(NONE_DISPLAY),
        }
    }
}
