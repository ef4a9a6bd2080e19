//! Timestamp field validator.
//!
//! A [`TimestampConfig`] is the unconfigured form, built in code or read from
//! a schema document. [`TimestampConfig::compile`] checks it once and yields an
//! immutable [`TimestampValidator`], which can be shared across threads.
//!
//! Text input is tried against each layout in order and the first layout that
//! parses wins. Some layouts overlap, so the order of [`DEFAULT_LAYOUTS`]
//! matters.

use crate::errors::{ConfigError, ValidatorError};
use crate::schema::{FieldValidator, LessFn};
use crate::value::Value;
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, Utc};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DisplayFromStr, DurationSeconds};
use std::time::Duration;

const NANOS_PER_SEC: i128 = 1_000_000_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layout {
    /// `2006-01-02T15:04:05Z07:00`, fractional seconds allowed.
    Rfc3339,
    /// `Mon Jan  2 15:04:05 2006`
    Ansic,
    /// `Mon Jan  2 15:04:05 MST 2006`
    UnixDate,
    /// `Mon Jan 02 15:04:05 -0700 2006`
    RubyDate,
    /// `02 Jan 06 15:04 MST`
    Rfc822,
    /// `02 Jan 06 15:04 -0700`
    #[serde(rename = "rfc822z")]
    Rfc822Z,
    /// `Monday, 02-Jan-06 15:04:05 MST`
    Rfc850,
    /// `Mon, 02 Jan 2006 15:04:05 MST`
    Rfc1123,
    /// `Mon, 02 Jan 2006 15:04:05 -0700`
    #[serde(rename = "rfc1123z")]
    Rfc1123Z,
    /// A strftime pattern. Without `%z` the wall clock is read as UTC.
    Custom(String),
}

pub static DEFAULT_LAYOUTS: [Layout; 9] = [
    Layout::Rfc3339,
    Layout::Ansic,
    Layout::UnixDate,
    Layout::RubyDate,
    Layout::Rfc822,
    Layout::Rfc822Z,
    Layout::Rfc850,
    Layout::Rfc1123,
    Layout::Rfc1123Z,
];

impl Layout {
    pub fn parse(&self, input: &str) -> Option<DateTime<FixedOffset>> {
        match self {
            Layout::Rfc3339 => DateTime::parse_from_rfc3339(input).ok(),
            Layout::Ansic => parse_utc(input, "%a %b %e %H:%M:%S %Y"),
            Layout::UnixDate => parse_abbreviated(input, "%a %b %e %H:%M:%S %Z %Y", 4),
            Layout::RubyDate => DateTime::parse_from_str(input, "%a %b %d %H:%M:%S %z %Y").ok(),
            Layout::Rfc822 => parse_abbreviated(input, "%d %b %y %H:%M %Z", 4),
            Layout::Rfc822Z => DateTime::parse_from_str(input, "%d %b %y %H:%M %z").ok(),
            Layout::Rfc850 => parse_abbreviated(input, "%A, %d-%b-%y %H:%M:%S %Z", 3),
            Layout::Rfc1123 => parse_abbreviated(input, "%a, %d %b %Y %H:%M:%S %Z", 5),
            Layout::Rfc1123Z => DateTime::parse_from_str(input, "%a, %d %b %Y %H:%M:%S %z").ok(),
            Layout::Custom(fmt) => DateTime::parse_from_str(input, fmt)
                .ok()
                .or_else(|| parse_utc(input, fmt))
                .or_else(|| {
                    NaiveDate::parse_from_str(input, fmt)
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|n| n.and_utc().fixed_offset())
                }),
        }
    }
}

fn parse_utc(input: &str, fmt: &str) -> Option<DateTime<FixedOffset>> {
    NaiveDateTime::parse_from_str(input, fmt)
        .ok()
        .map(|n| n.and_utc().fixed_offset())
}

// Zone abbreviations carry no offset we can trust; the wall clock is read as
// UTC. The token must be an upper-case abbreviation so that numeric offsets
// fall through to the `…Z` layouts.
fn parse_abbreviated(input: &str, fmt: &str, zone_token: usize) -> Option<DateTime<FixedOffset>> {
    let zone = input.split_whitespace().nth(zone_token)?;
    if !(3..=5).contains(&zone.len()) || !zone.chars().all(|c| c.is_ascii_uppercase()) {
        return None;
    }
    parse_utc(input, fmt)
}

/// Unconfigured timestamp validator.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimestampConfig {
    /// Accepted layouts, tried in order. `None` selects [`DEFAULT_LAYOUTS`].
    pub layouts: Option<Vec<Layout>>,
    /// Target zone as `+HH:MM`. `None` is UTC.
    #[serde_as(as = "Option<DisplayFromStr>")]
    pub zone: Option<FixedOffset>,
    /// Truncation granularity, in whole seconds in documents.
    #[serde_as(as = "Option<DurationSeconds<u64>>")]
    pub truncate: Option<Duration>,
}

impl TimestampConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn layouts(mut self, layouts: impl IntoIterator<Item = Layout>) -> Self {
        self.layouts = Some(layouts.into_iter().collect());
        self
    }

    pub fn zone(mut self, zone: FixedOffset) -> Self {
        self.zone = Some(zone);
        self
    }

    pub fn truncate(mut self, granularity: Duration) -> Self {
        self.truncate = Some(granularity);
        self
    }

    pub fn compile(self) -> Result<TimestampValidator, ConfigError> {
        let layouts = match self.layouts {
            None => DEFAULT_LAYOUTS.to_vec(),
            Some(l) if l.is_empty() => return Err(ConfigError::EmptyLayouts),
            Some(l) => l,
        };
        for layout in &layouts {
            if let Layout::Custom(fmt) = layout {
                if fmt.is_empty() || StrftimeItems::new(fmt).any(|i| matches!(i, Item::Error)) {
                    return Err(ConfigError::InvalidLayout(fmt.clone()));
                }
            }
        }
        let truncate_nanos = match self.truncate {
            None => None,
            Some(d) if d.is_zero() => {
                return Err(ConfigError::InvalidTruncate("granularity must be positive".into()))
            }
            Some(d) => Some(i128::try_from(d.as_nanos()).map_err(|_| {
                ConfigError::InvalidTruncate(format!("granularity {d:?} is too large"))
            })?),
        };
        let zone = self.zone.unwrap_or_else(utc);
        tracing::trace!(
            layouts = layouts.len(),
            %zone,
            truncate = ?self.truncate,
            "compiled timestamp validator"
        );
        Ok(TimestampValidator {
            layouts,
            zone,
            truncate_nanos,
        })
    }
}

fn utc() -> FixedOffset {
    Utc.fix()
}

/// Compiled timestamp validator.
#[derive(Debug, Clone)]
pub struct TimestampValidator {
    layouts: Vec<Layout>,
    zone: FixedOffset,
    truncate_nanos: Option<i128>,
}

impl Default for TimestampValidator {
    fn default() -> Self {
        Self {
            layouts: DEFAULT_LAYOUTS.to_vec(),
            zone: utc(),
            truncate_nanos: None,
        }
    }
}

impl TimestampValidator {
    pub fn layouts(&self) -> &[Layout] {
        &self.layouts
    }

    pub fn zone(&self) -> FixedOffset {
        self.zone
    }

    /// Parses `input` with the first matching layout.
    pub fn parse(&self, input: &str) -> Result<DateTime<FixedOffset>, ValidatorError> {
        self.layouts
            .iter()
            .find_map(|layout| layout.parse(input))
            .ok_or(ValidatorError::NotATime)
    }

    /// Moves `t` into the target zone and truncates the instant down to a
    /// multiple of the granularity, counted from the Unix epoch.
    pub fn normalize(&self, t: DateTime<FixedOffset>) -> DateTime<FixedOffset> {
        let mut instant = t.with_timezone(&Utc);
        if let Some(step) = self.truncate_nanos {
            let total = i128::from(instant.timestamp()) * NANOS_PER_SEC
                + i128::from(instant.timestamp_subsec_nanos());
            let floored = total - total.rem_euclid(step);
            let secs = i64::try_from(floored.div_euclid(NANOS_PER_SEC)).ok();
            let nanos = u32::try_from(floored.rem_euclid(NANOS_PER_SEC)).ok();
            if let Some(truncated) = secs
                .zip(nanos)
                .and_then(|(s, n)| DateTime::from_timestamp(s, n))
            {
                instant = truncated;
            }
        }
        instant.with_timezone(&self.zone)
    }
}

impl FieldValidator for TimestampValidator {
    fn validate(&self, value: &Value) -> Result<Value, ValidatorError> {
        let parsed = match value {
            Value::Time(t) => *t,
            Value::String(s) => self.parse(s)?,
            _ => return Err(ValidatorError::NotATime),
        };
        Ok(Value::Time(self.normalize(parsed)))
    }

    fn less(&self) -> Option<LessFn> {
        Some(timestamp_less)
    }
}

/// `a` is strictly before `b`. Anything that is not an instant yields `false`.
pub fn timestamp_less(a: &Value, b: &Value) -> bool {
    match (a.as_time(), b.as_time()) {
        (Some(a), Some(b)) => a < b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Timelike};

    fn minus_one() -> FixedOffset {
        FixedOffset::west_opt(3600).unwrap()
    }

    fn parsed() -> Value {
        Value::Time(DateTime::parse_from_rfc3339("2018-11-18T17:15:16.000000017Z").unwrap())
    }

    fn time_of(v: Value) -> DateTime<FixedOffset> {
        match v {
            Value::Time(t) => t,
            other => panic!("expected a time, got {other:?}"),
        }
    }

    #[test]
    fn validates_string_with_defaults() {
        let v = TimestampConfig::new().compile().unwrap();
        let t = time_of(v.validate(&Value::from("2018-11-18T17:15:16.000000017Z")).unwrap());
        let expected = Utc
            .with_ymd_and_hms(2018, 11, 18, 17, 15, 16)
            .unwrap()
            .with_nanosecond(17)
            .unwrap();
        assert_eq!(t, expected);
        assert_eq!(t.offset().local_minus_utc(), 0);
    }

    #[test]
    fn accepts_parsed_instants() {
        let v = TimestampValidator::default();
        let t = time_of(v.validate(&parsed()).unwrap());
        assert_eq!(t.nanosecond(), 17);
        assert_eq!(t.offset(), &utc());
    }

    #[test]
    fn changes_zone() {
        let v = TimestampConfig::new().zone(minus_one()).compile().unwrap();
        let t = time_of(v.validate(&parsed()).unwrap());
        assert_eq!(t.offset(), &minus_one());
        assert_eq!((t.hour(), t.minute(), t.nanosecond()), (16, 15, 17));
    }

    #[test]
    fn truncates_to_one_second() {
        let v = TimestampConfig::new()
            .truncate(Duration::from_secs(1))
            .compile()
            .unwrap();
        let t = time_of(v.validate(&parsed()).unwrap());
        assert_eq!(t, Utc.with_ymd_and_hms(2018, 11, 18, 17, 15, 16).unwrap());
    }

    #[test]
    fn truncates_to_a_day() {
        let v = TimestampConfig::new()
            .truncate(Duration::from_secs(24 * 3600))
            .compile()
            .unwrap();
        let t = time_of(v.validate(&parsed()).unwrap());
        assert_eq!(t, Utc.with_ymd_and_hms(2018, 11, 18, 0, 0, 0).unwrap());
    }

    #[test]
    fn truncates_to_a_day_in_another_zone() {
        let v = TimestampConfig::new()
            .truncate(Duration::from_secs(24 * 3600))
            .zone(minus_one())
            .compile()
            .unwrap();
        let t = time_of(v.validate(&parsed()).unwrap());
        let expected = minus_one().with_ymd_and_hms(2018, 11, 17, 23, 0, 0).unwrap();
        assert_eq!(t, expected);
        assert_eq!(t.offset(), expected.offset());
        assert_eq!(t.to_rfc3339(), "2018-11-17T23:00:00-01:00");
    }

    #[test]
    fn truncation_floors_instants_before_the_epoch() {
        let v = TimestampConfig::new()
            .truncate(Duration::from_secs(60))
            .compile()
            .unwrap();
        let before = Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 30).unwrap();
        let t = time_of(v.validate(&Value::from(before)).unwrap());
        assert_eq!(t, Utc.with_ymd_and_hms(1969, 12, 31, 23, 59, 0).unwrap());
    }

    #[test]
    fn every_default_layout_parses_its_own_form() {
        let v = TimestampValidator::default();
        let cases = [
            ("2018-11-18T17:15:16Z", "2018-11-18T17:15:16+00:00"),
            ("2018-11-18T17:15:16.5+02:00", "2018-11-18T15:15:16.500+00:00"),
            ("Sun Nov 18 17:15:16 2018", "2018-11-18T17:15:16+00:00"),
            ("Sun Nov  4 17:15:16 2018", "2018-11-04T17:15:16+00:00"),
            ("Sun Nov 18 17:15:16 UTC 2018", "2018-11-18T17:15:16+00:00"),
            ("Sun Nov 18 17:15:16 -0700 2018", "2018-11-19T00:15:16+00:00"),
            ("18 Nov 18 17:15 GMT", "2018-11-18T17:15:00+00:00"),
            ("18 Nov 18 17:15 +0100", "2018-11-18T16:15:00+00:00"),
            ("Sunday, 18-Nov-18 17:15:16 UTC", "2018-11-18T17:15:16+00:00"),
            ("Sun, 18 Nov 2018 17:15:16 GMT", "2018-11-18T17:15:16+00:00"),
            ("Sun, 18 Nov 2018 17:15:16 +0100", "2018-11-18T16:15:16+00:00"),
        ];
        for (input, expected) in cases {
            let t = time_of(
                v.validate(&Value::from(input))
                    .unwrap_or_else(|e| panic!("{input}: {e}")),
            );
            assert_eq!(
                t.to_rfc3339_opts(chrono::SecondsFormat::AutoSi, false),
                expected,
                "{input}"
            );
        }
    }

    #[test]
    fn specific_layout_list_accepts_each_listed_form() {
        let now = Utc::now().with_second(0).unwrap().with_nanosecond(0).unwrap();
        let v = TimestampConfig::new()
            .layouts([Layout::Rfc3339, Layout::Rfc822Z, Layout::Rfc1123Z])
            .compile()
            .unwrap();
        for fmt in ["%a, %d %b %Y %H:%M:%S %z", "%d %b %y %H:%M %z"] {
            let text = now.format(fmt).to_string();
            let t = time_of(v.validate(&Value::from(text.as_str())).unwrap());
            assert_eq!(t, now, "{text}");
        }
        let t = time_of(v.validate(&Value::from(now.to_rfc3339())).unwrap());
        assert_eq!(t, now);
    }

    #[test]
    fn rejects_text_in_an_unlisted_layout() {
        let v = TimestampConfig::new()
            .layouts([Layout::Rfc3339])
            .compile()
            .unwrap();
        let ansic = Utc::now().format("%a %b %e %H:%M:%S %Y").to_string();
        let err = v.validate(&Value::from(ansic.as_str())).unwrap_err();
        assert_eq!(err, ValidatorError::NotATime);
        assert_eq!(err.to_string(), "not a time");
    }

    #[test]
    fn rejects_non_time_values() {
        let v = TimestampValidator::default();
        assert_eq!(v.validate(&Value::from(12)), Err(ValidatorError::NotATime));
        assert_eq!(
            v.validate(&Value::from("yesterday")),
            Err(ValidatorError::NotATime)
        );
    }

    #[test]
    fn custom_layouts_read_naive_values_as_utc() {
        let v = TimestampConfig::new()
            .layouts([
                Layout::Custom("%Y/%m/%d %H:%M".into()),
                Layout::Custom("%Y/%m/%d".into()),
            ])
            .compile()
            .unwrap();
        let t = time_of(v.validate(&Value::from("2020/02/29 10:30")).unwrap());
        assert_eq!(t, Utc.with_ymd_and_hms(2020, 2, 29, 10, 30, 0).unwrap());
        let d = time_of(v.validate(&Value::from("2020/02/29")).unwrap());
        assert_eq!(d, Utc.with_ymd_and_hms(2020, 2, 29, 0, 0, 0).unwrap());
    }

    #[test]
    fn compile_rejects_inconsistent_configuration() {
        assert!(matches!(
            TimestampConfig::new().layouts([]).compile(),
            Err(ConfigError::EmptyLayouts)
        ));
        assert!(matches!(
            TimestampConfig::new()
                .layouts([Layout::Custom("%Y-%Q".into())])
                .compile(),
            Err(ConfigError::InvalidLayout(_))
        ));
        assert!(matches!(
            TimestampConfig::new().truncate(Duration::ZERO).compile(),
            Err(ConfigError::InvalidTruncate(_))
        ));
    }

    #[test]
    fn less_is_a_strict_order_over_instants() {
        let low = Value::from(Utc.with_ymd_and_hms(2018, 11, 18, 17, 15, 16).unwrap());
        let high = Value::from(Utc.with_ymd_and_hms(2018, 11, 19, 17, 15, 16).unwrap());
        let less = TimestampValidator::default().less().unwrap();
        assert!(less(&low, &high));
        assert!(!less(&low, &low));
        assert!(!less(&high, &low));
        assert!(!less(&low, &Value::from("2.0")));
    }

    #[test]
    fn config_reads_from_json() {
        let config: TimestampConfig = serde_json::from_str(
            r#"{"layouts": ["rfc3339", "rfc1123z", {"custom": "%Y"}], "zone": "-01:00", "truncate": 3600}"#,
        )
        .unwrap();
        assert_eq!(
            config.layouts,
            Some(vec![
                Layout::Rfc3339,
                Layout::Rfc1123Z,
                Layout::Custom("%Y".into())
            ])
        );
        assert_eq!(config.zone, Some(minus_one()));
        assert_eq!(config.truncate, Some(Duration::from_secs(3600)));
        assert_eq!(
            TimestampConfig::default(),
            serde_json::from_str::<TimestampConfig>("{}").unwrap()
        );
    }
}
