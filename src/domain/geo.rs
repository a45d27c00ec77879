use std::f64::consts::PI;

// Krasovsky 1940 ellipsoid, as used by the vendor's obfuscated frame.
const SEMI_MAJOR_AXIS_M: f64 = 6_378_245.0;
const ECCENTRICITY_SQUARED: f64 = 0.006_693_421_622_965_943_23;

// Points outside this rectangle are already in the display frame.
const LONGITUDE_RANGE: (f64, f64) = (73.66, 135.05);
const LATITUDE_RANGE: (f64, f64) = (3.86, 53.55);

/// Converts a vendor-reported coordinate pair (GCJ-02) to standard
/// WGS-84 display coordinates.
///
/// The correction is the published single-step approximation: compute the
/// forward offset at the reported point and reflect through it
/// (`2 * reported - corrected`). The series terms below are reverse
/// engineered and must not be altered; any deviation moves every reported
/// position.
pub fn to_display_frame(longitude: f64, latitude: f64) -> (f64, f64) {
    if outside_correction_region(longitude, latitude) {
        return (longitude, latitude);
    }

    let delta_lat = latitude_offset(longitude - 105.0, latitude - 35.0);
    let delta_lng = longitude_offset(longitude - 105.0, latitude - 35.0);

    let rad_lat = latitude / 180.0 * PI;
    let mut magic = rad_lat.sin();
    magic = 1.0 - ECCENTRICITY_SQUARED * magic * magic;
    let sqrt_magic = magic.sqrt();

    let delta_lat = (delta_lat * 180.0)
        / ((SEMI_MAJOR_AXIS_M * (1.0 - ECCENTRICITY_SQUARED)) / (magic * sqrt_magic) * PI);
    let delta_lng = (delta_lng * 180.0) / (SEMI_MAJOR_AXIS_M / sqrt_magic * rad_lat.cos() * PI);

    let corrected_lng = longitude + delta_lng;
    let corrected_lat = latitude + delta_lat;

    (
        longitude * 2.0 - corrected_lng,
        latitude * 2.0 - corrected_lat,
    )
}

fn outside_correction_region(longitude: f64, latitude: f64) -> bool {
    !(longitude > LONGITUDE_RANGE.0
        && longitude < LONGITUDE_RANGE.1
        && latitude > LATITUDE_RANGE.0
        && latitude < LATITUDE_RANGE.1)
}

fn latitude_offset(x: f64, y: f64) -> f64 {
    let mut ret =
        -100.0 + 2.0 * x + 3.0 * y + 0.2 * y * y + 0.1 * x * y + 0.2 * x.abs().sqrt();
    ret += ((20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0) / 3.0;
    ret += ((20.0 * (y * PI).sin() + 40.0 * (y / 3.0 * PI).sin()) * 2.0) / 3.0;
    ret += ((160.0 * (y / 12.0 * PI).sin() + 320.0 * (y * PI / 30.0).sin()) * 2.0) / 3.0;
    ret
}

fn longitude_offset(x: f64, y: f64) -> f64 {
    let mut ret = 300.0 + x + 2.0 * y + 0.1 * x * x + 0.1 * x * y + 0.1 * x.abs().sqrt();
    ret += ((20.0 * (6.0 * x * PI).sin() + 20.0 * (2.0 * x * PI).sin()) * 2.0) / 3.0;
    ret += ((20.0 * (x * PI).sin() + 40.0 * (x / 3.0 * PI).sin()) * 2.0) / 3.0;
    ret += ((150.0 * (x / 12.0 * PI).sin() + 300.0 * (x / 30.0 * PI).sin()) * 2.0) / 3.0;
    ret
}
