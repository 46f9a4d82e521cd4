//! Filter values and spatial shapes.
//!
//! [`FilterValue`] is what callers put on the right-hand side of a `with`
//! predicate, a condition, a `without` exclusion or a custom option. Its
//! `Display` impl is the wire rendering used inside filter clauses.

use std::fmt;
use std::ops::RangeInclusive;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// Meters per kilometre; the engine takes distances in kilometres.
pub const KM_TO_METER: f64 = 1000.0;

/// Value side of a filter predicate.
///
/// # Example
///
/// ```
/// use solr_scope::FilterValue;
///
/// assert_eq!(FilterValue::from(7).to_string(), "7");
/// assert_eq!(FilterValue::from(1..=3).to_string(), "[1 TO 3]");
/// assert_eq!(FilterValue::from(Option::<i64>::None), FilterValue::Null);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum FilterValue {
    /// Absent value. Renders as `*` when a bare rendering is needed.
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// Calendar date, rendered as midnight UTC.
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    /// Inclusive range.
    Range(Box<FilterValue>, Box<FilterValue>),
    List(Vec<FilterValue>),
    BoundingBox(BoundingBox),
    Circle(Circle),
}

impl FilterValue {
    /// Inclusive range between two values.
    pub fn range(first: impl Into<FilterValue>, last: impl Into<FilterValue>) -> Self {
        FilterValue::Range(Box::new(first.into()), Box::new(last.into()))
    }

    /// List of values.
    pub fn list<T: Into<FilterValue>>(items: impl IntoIterator<Item = T>) -> Self {
        FilterValue::List(items.into_iter().map(Into::into).collect())
    }

    /// Whether this is null.
    pub fn is_null(&self) -> bool {
        matches!(self, FilterValue::Null)
    }

    /// Null, whitespace-only strings and empty lists are blank.
    pub fn is_blank(&self) -> bool {
        match self {
            FilterValue::Null => true,
            FilterValue::Str(s) => s.trim().is_empty(),
            FilterValue::List(items) => items.is_empty(),
            _ => false,
        }
    }

    /// String value, if this is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FilterValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Circle value, if this is one.
    pub fn as_circle(&self) -> Option<&Circle> {
        match self {
            FilterValue::Circle(c) => Some(c),
            _ => None,
        }
    }

    /// Flattens one level: lists yield their items, anything else yields itself.
    pub fn flatten(&self) -> Vec<FilterValue> {
        match self {
            FilterValue::List(items) => items.clone(),
            other => vec![other.clone()],
        }
    }
}

impl fmt::Display for FilterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterValue::Null => write!(f, "*"),
            FilterValue::Bool(b) => write!(f, "{}", b),
            FilterValue::Int(n) => write!(f, "{}", n),
            FilterValue::Float(n) => write!(f, "{}", fmt_float(*n)),
            FilterValue::Str(s) => write!(f, "{}", s),
            FilterValue::Date(d) => write!(f, "{}", iso_date(*d)),
            FilterValue::DateTime(t) => write!(f, "{}", iso_time(*t)),
            FilterValue::Range(first, last) => write!(f, "[{} TO {}]", first, last),
            FilterValue::List(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "{}", parts.join(","))
            }
            FilterValue::BoundingBox(b) => write!(f, "{} TO {}", b.sw, b.ne),
            FilterValue::Circle(_) => write!(f, "{}", crate::condition::GEOFILT),
        }
    }
}

/// Formats a float the way the engine echoes it back: integral values keep
/// a trailing `.0`.
pub fn fmt_float(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.1}", n)
    } else {
        format!("{}", n)
    }
}

/// `YYYY-MM-DDT00:00:00Z`.
pub fn iso_date(date: NaiveDate) -> String {
    match date.and_hms_opt(0, 0, 0) {
        Some(midnight) => iso_time(midnight.and_utc()),
        None => date.to_string(),
    }
}

/// UTC ISO-8601 with a trailing `Z`, second precision.
pub fn iso_time(time: DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Secs, true)
}

impl From<bool> for FilterValue {
    fn from(b: bool) -> Self {
        FilterValue::Bool(b)
    }
}

impl From<i32> for FilterValue {
    fn from(n: i32) -> Self {
        FilterValue::Int(n as i64)
    }
}

impl From<i64> for FilterValue {
    fn from(n: i64) -> Self {
        FilterValue::Int(n)
    }
}

impl From<u32> for FilterValue {
    fn from(n: u32) -> Self {
        FilterValue::Int(n as i64)
    }
}

impl From<f32> for FilterValue {
    fn from(n: f32) -> Self {
        FilterValue::Float(n as f64)
    }
}

impl From<f64> for FilterValue {
    fn from(n: f64) -> Self {
        FilterValue::Float(n)
    }
}

impl From<&str> for FilterValue {
    fn from(s: &str) -> Self {
        FilterValue::Str(s.to_string())
    }
}

impl From<String> for FilterValue {
    fn from(s: String) -> Self {
        FilterValue::Str(s)
    }
}

impl From<&String> for FilterValue {
    fn from(s: &String) -> Self {
        FilterValue::Str(s.clone())
    }
}

impl From<NaiveDate> for FilterValue {
    fn from(d: NaiveDate) -> Self {
        FilterValue::Date(d)
    }
}

impl From<DateTime<Utc>> for FilterValue {
    fn from(t: DateTime<Utc>) -> Self {
        FilterValue::DateTime(t)
    }
}

impl From<BoundingBox> for FilterValue {
    fn from(b: BoundingBox) -> Self {
        FilterValue::BoundingBox(b)
    }
}

impl From<Circle> for FilterValue {
    fn from(c: Circle) -> Self {
        FilterValue::Circle(c)
    }
}

impl<T: Into<FilterValue>> From<Option<T>> for FilterValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(FilterValue::Null)
    }
}

impl<T: Into<FilterValue>> From<Vec<T>> for FilterValue {
    fn from(items: Vec<T>) -> Self {
        FilterValue::list(items)
    }
}

impl<T: Into<FilterValue>, const N: usize> From<[T; N]> for FilterValue {
    fn from(items: [T; N]) -> Self {
        FilterValue::list(items)
    }
}

impl<T: Into<FilterValue>> From<RangeInclusive<T>> for FilterValue {
    fn from(r: RangeInclusive<T>) -> Self {
        let (first, last) = r.into_inner();
        FilterValue::range(first, last)
    }
}

/// Anything that exposes a latitude and a longitude.
pub trait LatLng {
    fn lat(&self) -> f64;
    fn lng(&self) -> f64;
}

/// A point on the globe, normalized to floats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinate {
    /// A point from latitude and longitude.
    pub fn new(lat: f64, lng: f64) -> Self {
        Coordinate { lat, lng }
    }

    /// Copies any point-like value.
    pub fn of(point: &impl LatLng) -> Self {
        Coordinate::new(point.lat(), point.lng())
    }
}

impl LatLng for Coordinate {
    fn lat(&self) -> f64 {
        self.lat
    }

    fn lng(&self) -> f64 {
        self.lng
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", fmt_float(self.lat), fmt_float(self.lng))
    }
}

impl From<(f64, f64)> for Coordinate {
    fn from((lat, lng): (f64, f64)) -> Self {
        Coordinate::new(lat, lng)
    }
}

impl From<(i32, i32)> for Coordinate {
    fn from((lat, lng): (i32, i32)) -> Self {
        Coordinate::new(lat as f64, lng as f64)
    }
}

impl From<[f64; 2]> for Coordinate {
    fn from([lat, lng]: [f64; 2]) -> Self {
        Coordinate::new(lat, lng)
    }
}

/// Rectangle given by its south-west and north-east corners.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub sw: Coordinate,
    pub ne: Coordinate,
}

impl BoundingBox {
    /// Box from its south-west and north-east corners.
    pub fn new(sw: impl Into<Coordinate>, ne: impl Into<Coordinate>) -> Self {
        BoundingBox {
            sw: sw.into(),
            ne: ne.into(),
        }
    }
}

/// A distance, stored in meters.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Distance(f64);

impl Distance {
    /// Distance in meters.
    pub fn meters(m: f64) -> Self {
        Distance(m)
    }

    /// Distance in kilometers.
    pub fn kms(km: f64) -> Self {
        Distance(km * KM_TO_METER)
    }

    /// Value in meters.
    pub fn in_meters(self) -> f64 {
        self.0
    }

    /// Value in kilometers.
    pub fn in_kms(self) -> f64 {
        self.0 / KM_TO_METER
    }
}

/// Center plus radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Circle {
    pub center: Coordinate,
    pub radius_in_meters: f64,
}

impl Circle {
    /// Circle around `center`.
    pub fn new(center: impl Into<Coordinate>, radius: Distance) -> Self {
        Circle {
            center: center.into(),
            radius_in_meters: radius.in_meters(),
        }
    }

    /// Radius as a [`Distance`].
    pub fn radius(&self) -> Distance {
        Distance::meters(self.radius_in_meters)
    }
}
