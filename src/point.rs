//! Geography point parsing.
//!
//! Turns `POINT(<lon> <lat>)` strings into a validated [`GeoPoint`].
//! Numbers glued to a label or a `:` (e.g. the `4326` in `SRID:4326`) are
//! not treated as coordinates.

use regex::Regex;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[-+]?\d*\.?\d+").expect("number pattern compiles"));

/// Bound applied to both coordinates.
pub const COORDINATE_LIMIT: f64 = 180.0;

/// True geographic bound for latitude.
pub const GEOGRAPHIC_LATITUDE_LIMIT: f64 = 90.0;

/// A (latitude, longitude) pair.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Build a point, checking both values against `[-180, 180]`.
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, MalformedPointError> {
        let raw = format!("({latitude}, {longitude})");
        check_range(&raw, "latitude", latitude, COORDINATE_LIMIT)?;
        check_range(&raw, "longitude", longitude, COORDINATE_LIMIT)?;
        Ok(Self { latitude, longitude })
    }

    /// Caller guarantees the values are in range.
    pub(crate) const fn new_unchecked(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "POINT({} {})", self.longitude, self.latitude)
    }
}

impl FromStr for GeoPoint {
    type Err = MalformedPointError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Which range latitude is checked against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatitudeBound {
    /// `[-180, 180]`, the bound historical inputs were validated with.
    /// Values beyond ±90 pass but are logged.
    #[default]
    Lenient,
    /// `[-90, 90]`.
    Geographic,
}

/// Errors raised while decoding a geography point.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum MalformedPointError {
    #[error("expected exactly 2 coordinates in '{input}', found {found}")]
    TokenCount { input: String, found: usize },

    #[error("invalid number '{token}' in '{input}'")]
    InvalidNumber { input: String, token: String },

    #[error("{axis} {value} is outside [-{limit}, {limit}] in '{input}'")]
    OutOfRange {
        input: String,
        axis: &'static str,
        value: f64,
        limit: f64,
    },
}

/// Parses geography points with a configurable latitude bound.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointParser {
    latitude_bound: LatitudeBound,
}

impl PointParser {
    pub fn new(latitude_bound: LatitudeBound) -> Self {
        Self { latitude_bound }
    }

    pub fn latitude_bound(&self) -> LatitudeBound {
        self.latitude_bound
    }

    /// Parse `raw` into a point. The first number is longitude, the second latitude.
    pub fn parse(&self, raw: &str) -> Result<GeoPoint, MalformedPointError> {
        let tokens = extract_numbers(raw);
        let [lon_token, lat_token] = tokens.as_slice() else {
            return Err(MalformedPointError::TokenCount {
                input: raw.to_string(),
                found: tokens.len(),
            });
        };

        let longitude = parse_number(raw, lon_token)?;
        let latitude = parse_number(raw, lat_token)?;

        let latitude_limit = match self.latitude_bound {
            LatitudeBound::Lenient => COORDINATE_LIMIT,
            LatitudeBound::Geographic => GEOGRAPHIC_LATITUDE_LIMIT,
        };
        check_range(raw, "latitude", latitude, latitude_limit)?;
        check_range(raw, "longitude", longitude, COORDINATE_LIMIT)?;

        if latitude.abs() > GEOGRAPHIC_LATITUDE_LIMIT {
            log::warn!("latitude {latitude} in '{raw}' is beyond ±90; coordinates may be swapped");
        }

        Ok(GeoPoint::new_unchecked(latitude, longitude))
    }
}

/// Parse with the default (lenient) latitude bound.
pub fn parse(raw: &str) -> Result<GeoPoint, MalformedPointError> {
    PointParser::default().parse(raw)
}

/// Every signed decimal in `raw` that does not directly follow a letter or `:`.
///
/// A disqualified match is retried one character later, so `SRID:4326`
/// still yields `326`.
fn extract_numbers(raw: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut pos = 0;
    while let Some(m) = NUMBER.find_at(raw, pos) {
        if follows_label(raw, m.start()) {
            pos = m.start() + raw[m.start()..].chars().next().map_or(1, char::len_utf8);
        } else {
            tokens.push(m.as_str());
            pos = m.end();
        }
    }
    tokens
}

fn follows_label(raw: &str, start: usize) -> bool {
    matches!(
        raw[..start].chars().next_back(),
        Some(c) if c.is_ascii_alphabetic() || c == ':'
    )
}

fn parse_number(raw: &str, token: &str) -> Result<f64, MalformedPointError> {
    token
        .parse::<f64>()
        .map_err(|_| MalformedPointError::InvalidNumber {
            input: raw.to_string(),
            token: token.to_string(),
        })
}

fn check_range(raw: &str, axis: &'static str, value: f64, limit: f64) -> Result<(), MalformedPointError> {
    if (-limit..=limit).contains(&value) {
        Ok(())
    } else {
        Err(MalformedPointError::OutOfRange {
            input: raw.to_string(),
            axis,
            value,
            limit,
        })
    }
}
