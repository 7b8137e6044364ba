pub mod errors;
mod prediction;
mod request;

pub use errors::{ParserResult, PredictError, PredictErrorCategory, PredictResult};
pub use prediction::PredictionResult;
pub use request::{LOOKUP_KIND_COUNT, LookupIndexes, LookupKind, RequestRecord};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicI64, Ordering};

/// Sentinel for "value not available". Attribute reads never fail; they
/// return this instead.
pub const NA_VALUE: f64 = -999_999.0;

pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Id value meaning "not yet assigned".
pub const UNSET_ID: i64 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SeismicPhase {
    P,
    Pn,
    Pg,
    PKP,
    PcP,
    S,
    Sn,
    Sg,
    Lg,
    LR,
}

pub const PHASE_COUNT: usize = 10;

impl SeismicPhase {
    pub const ALL: [SeismicPhase; PHASE_COUNT] = [
        Self::P,
        Self::Pn,
        Self::Pg,
        Self::PKP,
        Self::PcP,
        Self::S,
        Self::Sn,
        Self::Sg,
        Self::Lg,
        Self::LR,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::P => "P",
            Self::Pn => "Pn",
            Self::Pg => "Pg",
            Self::PKP => "PKP",
            Self::PcP => "PcP",
            Self::S => "S",
            Self::Sn => "Sn",
            Self::Sg => "Sg",
            Self::Lg => "Lg",
            Self::LR => "LR",
        }
    }

    pub const fn ordinal(self) -> usize {
        self as usize
    }

    pub fn from_str_token(token: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|phase| phase.as_str() == token.trim())
    }
}

impl Display for SeismicPhase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// The three base observable families. Path corrections, uncertainties and
/// spatial derivatives all hang off one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeFamily {
    TravelTime,
    Azimuth,
    Slowness,
}

pub const FAMILY_COUNT: usize = 3;

impl AttributeFamily {
    pub const ALL: [AttributeFamily; FAMILY_COUNT] =
        [Self::TravelTime, Self::Azimuth, Self::Slowness];

    pub const fn ordinal(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TravelTime => "TRAVEL_TIME",
            Self::Azimuth => "AZIMUTH",
            Self::Slowness => "SLOWNESS",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GeoAttribute {
    TravelTime,
    TtModelUncertainty,
    TtPathCorrection,
    DttDlat,
    DttDlon,
    DttDr,
    Azimuth,
    AzimuthModelUncertainty,
    AzimuthPathCorrection,
    DazDlat,
    DazDlon,
    DazDr,
    Slowness,
    SlownessModelUncertainty,
    SlownessPathCorrection,
    DshDlat,
    DshDlon,
    DshDr,
    Backazimuth,
    Distance,
    TurningDepth,
}

pub const ATTRIBUTE_COUNT: usize = 21;

impl GeoAttribute {
    pub const ALL: [GeoAttribute; ATTRIBUTE_COUNT] = [
        Self::TravelTime,
        Self::TtModelUncertainty,
        Self::TtPathCorrection,
        Self::DttDlat,
        Self::DttDlon,
        Self::DttDr,
        Self::Azimuth,
        Self::AzimuthModelUncertainty,
        Self::AzimuthPathCorrection,
        Self::DazDlat,
        Self::DazDlon,
        Self::DazDr,
        Self::Slowness,
        Self::SlownessModelUncertainty,
        Self::SlownessPathCorrection,
        Self::DshDlat,
        Self::DshDlon,
        Self::DshDr,
        Self::Backazimuth,
        Self::Distance,
        Self::TurningDepth,
    ];

    pub const fn ordinal(self) -> usize {
        self as usize
    }

    pub const fn from_ordinal(ordinal: usize) -> Option<Self> {
        if ordinal < ATTRIBUTE_COUNT {
            Some(Self::ALL[ordinal])
        } else {
            None
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TravelTime => "TRAVEL_TIME",
            Self::TtModelUncertainty => "TT_MODEL_UNCERTAINTY",
            Self::TtPathCorrection => "TT_PATH_CORRECTION",
            Self::DttDlat => "DTT_DLAT",
            Self::DttDlon => "DTT_DLON",
            Self::DttDr => "DTT_DR",
            Self::Azimuth => "AZIMUTH",
            Self::AzimuthModelUncertainty => "AZIMUTH_MODEL_UNCERTAINTY",
            Self::AzimuthPathCorrection => "AZIMUTH_PATH_CORRECTION",
            Self::DazDlat => "DAZ_DLAT",
            Self::DazDlon => "DAZ_DLON",
            Self::DazDr => "DAZ_DR",
            Self::Slowness => "SLOWNESS",
            Self::SlownessModelUncertainty => "SLOWNESS_MODEL_UNCERTAINTY",
            Self::SlownessPathCorrection => "SLOWNESS_PATH_CORRECTION",
            Self::DshDlat => "DSH_DLAT",
            Self::DshDlon => "DSH_DLON",
            Self::DshDr => "DSH_DR",
            Self::Backazimuth => "BACKAZIMUTH",
            Self::Distance => "DISTANCE",
            Self::TurningDepth => "TURNING_DEPTH",
        }
    }

    pub fn from_str_token(token: &str) -> Option<Self> {
        let normalized = token.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|attribute| attribute.as_str() == normalized)
    }

    /// The observable family this attribute belongs to, when it has one.
    /// Backazimuth, distance and turning depth are family-free derived
    /// quantities.
    pub const fn family(self) -> Option<AttributeFamily> {
        match self {
            Self::TravelTime
            | Self::TtModelUncertainty
            | Self::TtPathCorrection
            | Self::DttDlat
            | Self::DttDlon
            | Self::DttDr => Some(AttributeFamily::TravelTime),
            Self::Azimuth
            | Self::AzimuthModelUncertainty
            | Self::AzimuthPathCorrection
            | Self::DazDlat
            | Self::DazDlon
            | Self::DazDr => Some(AttributeFamily::Azimuth),
            Self::Slowness
            | Self::SlownessModelUncertainty
            | Self::SlownessPathCorrection
            | Self::DshDlat
            | Self::DshDlon
            | Self::DshDr => Some(AttributeFamily::Slowness),
            Self::Backazimuth | Self::Distance | Self::TurningDepth => None,
        }
    }

    pub const fn is_uncertainty(self) -> bool {
        matches!(
            self,
            Self::TtModelUncertainty | Self::AzimuthModelUncertainty | Self::SlownessModelUncertainty
        )
    }

    pub const fn is_path_correction(self) -> bool {
        matches!(
            self,
            Self::TtPathCorrection | Self::AzimuthPathCorrection | Self::SlownessPathCorrection
        )
    }
}

impl Display for GeoAttribute {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Fixed-size bitset over `GeoAttribute` ordinals. Membership and union are
/// O(1) and allocation-free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeSet(u32);

impl AttributeSet {
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn of(attributes: &[GeoAttribute]) -> Self {
        let mut set = Self::empty();
        for attribute in attributes {
            set.insert(*attribute);
        }
        set
    }

    pub fn insert(&mut self, attribute: GeoAttribute) {
        self.0 |= 1 << attribute.ordinal();
    }

    pub fn remove(&mut self, attribute: GeoAttribute) {
        self.0 &= !(1 << attribute.ordinal());
    }

    pub const fn contains(self, attribute: GeoAttribute) -> bool {
        self.0 & (1 << attribute.ordinal()) != 0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn len(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn iter(self) -> impl Iterator<Item = GeoAttribute> {
        GeoAttribute::ALL
            .into_iter()
            .filter(move |attribute| self.contains(*attribute))
    }
}

/// Classification of a computed ray. The error and invalid variants mark
/// failed or short-circuited predictions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RayType {
    Refraction,
    Reflection,
    Diffraction,
    Error,
    Invalid,
}

impl RayType {
    pub const fn is_valid(self) -> bool {
        !matches!(self, Self::Error | Self::Invalid)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Refraction => "REFRACTION",
            Self::Reflection => "REFLECTION",
            Self::Diffraction => "DIFFRACTION",
            Self::Error => "ERROR",
            Self::Invalid => "INVALID",
        }
    }
}

impl Display for RayType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Geographic position stored as latitude/longitude in degrees plus depth in
/// km below the surface.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoVector {
    pub lat_deg: f64,
    pub lon_deg: f64,
    pub depth_km: f64,
}

impl GeoVector {
    pub fn new(lat_deg: f64, lon_deg: f64, depth_km: f64) -> Self {
        Self {
            lat_deg,
            lon_deg,
            depth_km,
        }
    }

    pub fn radius_km(&self) -> f64 {
        EARTH_RADIUS_KM - self.depth_km
    }

    /// Unit vector from the earth's center through this position.
    pub fn unit_vector(&self) -> [f64; 3] {
        let lat = self.lat_deg.to_radians();
        let lon = self.lon_deg.to_radians();
        [
            lat.cos() * lon.cos(),
            lat.cos() * lon.sin(),
            lat.sin(),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub source_id: i64,
    pub event_id: i64,
    pub position: GeoVector,
    /// Origin time, epoch seconds.
    pub origin_time: f64,
}

impl Source {
    pub fn new(source_id: i64, event_id: i64, position: GeoVector, origin_time: f64) -> Self {
        Self {
            source_id,
            event_id,
            position,
            origin_time,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Receiver {
    pub receiver_id: i64,
    pub station: String,
    pub position: GeoVector,
    /// Validity window, epoch seconds.
    pub on_time: f64,
    pub off_time: f64,
}

impl Receiver {
    pub fn new(
        receiver_id: i64,
        station: impl Into<String>,
        position: GeoVector,
        on_time: f64,
        off_time: f64,
    ) -> Self {
        Self {
            receiver_id,
            station: station.into(),
            position,
            on_time,
            off_time,
        }
    }

    pub fn is_valid_at(&self, epoch_time: f64) -> bool {
        epoch_time >= self.on_time && epoch_time <= self.off_time
    }
}

/// Sequential id source for receivers, sources and observations. Held by
/// whichever component constructs the entities so tests control sequencing.
#[derive(Debug)]
pub struct IdGenerator {
    next: AtomicI64,
}

impl IdGenerator {
    pub fn starting_at(first: i64) -> Self {
        Self {
            next: AtomicI64::new(first),
        }
    }

    pub fn next_id(&self) -> i64 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::starting_at(1)
    }
}
