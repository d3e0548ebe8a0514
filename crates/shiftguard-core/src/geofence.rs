//! Work-location geofencing.
//!
//! Pure distance checks between a reported position and the configured work
//! locations. Obtaining the position is the caller's job.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{GeofenceError, ValidationError};

/// Mean Earth radius in meters.
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// A WGS84 position in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Result<Self, ValidationError> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(invalid("latitude", format!("{} is outside -90..=90", self.latitude)));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(invalid(
                "longitude",
                format!("{} is outside -180..=180", self.longitude),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.latitude, self.longitude)
    }
}

/// Parses `"<lat>,<lon>"`.
impl FromStr for GeoPoint {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (lat, lon) = s
            .split_once(',')
            .ok_or_else(|| invalid("location", format!("expected '<lat>,<lon>', got '{s}'")))?;
        let parse = |field: &str, raw: &str| {
            raw.trim()
                .parse::<f64>()
                .map_err(|e| invalid(field, format!("'{}': {e}", raw.trim())))
        };
        Self::new(parse("latitude", lat)?, parse("longitude", lon)?)
    }
}

/// A site where work may be clocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkLocation {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Fence radius in meters.
    pub radius_meters: f64,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl WorkLocation {
    pub fn center(&self) -> GeoPoint {
        GeoPoint {
            latitude: self.latitude,
            longitude: self.longitude,
        }
    }

    pub fn distance_to(&self, point: GeoPoint) -> f64 {
        distance_meters(self.center(), point)
    }

    /// Whether `point` lies on or inside the fence.
    pub fn contains(&self, point: GeoPoint) -> bool {
        self.distance_to(point) <= self.radius_meters
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        self.center().validate()?;
        if !self.radius_meters.is_finite() || self.radius_meters <= 0.0 {
            return Err(invalid(
                "radius_meters",
                format!("{} must be a positive distance", self.radius_meters),
            ));
        }
        Ok(())
    }
}

/// Great-circle distance in meters (haversine).
pub fn distance_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let phi1 = a.latitude.to_radians();
    let phi2 = b.latitude.to_radians();
    let d_phi = (b.latitude - a.latitude).to_radians();
    let d_lambda = (b.longitude - a.longitude).to_radians();

    let h = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());
    EARTH_RADIUS_M * c
}

/// Where a point stands relative to the work locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeofenceStatus {
    pub is_inside: bool,
    /// The containing location, or the closest one when outside.
    pub location: Option<WorkLocation>,
    pub distance_meters: Option<f64>,
}

impl GeofenceStatus {
    fn nowhere() -> Self {
        Self {
            is_inside: false,
            location: None,
            distance_meters: None,
        }
    }
}

/// Check `point` against the active locations.
///
/// The first active location whose fence contains the point wins; otherwise
/// the closest active location is reported. Inactive locations are ignored.
pub fn check_geofence_status(point: GeoPoint, locations: &[WorkLocation]) -> GeofenceStatus {
    let mut closest: Option<(&WorkLocation, f64)> = None;
    for location in locations.iter().filter(|l| l.is_active) {
        let distance = location.distance_to(point);
        if distance <= location.radius_meters {
            return GeofenceStatus {
                is_inside: true,
                location: Some(location.clone()),
                distance_meters: Some(distance),
            };
        }
        if closest.map_or(true, |(_, best)| distance < best) {
            closest = Some((location, distance));
        }
    }

    match closest {
        Some((location, distance)) => GeofenceStatus {
            is_inside: false,
            location: Some(location.clone()),
            distance_meters: Some(distance),
        },
        None => GeofenceStatus::nowhere(),
    }
}

/// Clock-in gate: admit only a point inside an active location.
pub fn require_inside(
    point: Option<GeoPoint>,
    locations: &[WorkLocation],
) -> Result<GeofenceStatus, GeofenceError> {
    if !locations.iter().any(|l| l.is_active) {
        return Err(GeofenceError::NoActiveLocations);
    }
    let point = point.ok_or(GeofenceError::LocationRequired)?;
    let status = check_geofence_status(point, locations);
    if status.is_inside {
        return Ok(status);
    }
    match (&status.location, status.distance_meters) {
        (Some(closest), Some(distance)) => Err(GeofenceError::Outside {
            closest: closest.name.clone(),
            distance_meters: distance.round(),
        }),
        _ => Err(GeofenceError::NoActiveLocations),
    }
}

fn invalid(field: &str, message: String) -> ValidationError {
    ValidationError::InvalidValue {
        field: field.into(),
        message,
    }
}
