use crate::types::{BoundingBox, RegionOfInterest};

/// Provides the fixed region of interest for the study area (Ca Mau coast, Vietnam)
pub struct GeometryProvider;

impl GeometryProvider {
    pub const MIN_LON: f64 = 104.5;
    pub const MAX_LON: f64 = 105.5;
    pub const MIN_LAT: f64 = 8.5;
    pub const MAX_LAT: f64 = 9.7;

    /// Same polygon on every call
    pub fn region_of_interest() -> RegionOfInterest {
        RegionOfInterest {
            bbox: BoundingBox {
                min_lon: Self::MIN_LON,
                max_lon: Self::MAX_LON,
                min_lat: Self::MIN_LAT,
                max_lat: Self::MAX_LAT,
            },
        }
    }
}
