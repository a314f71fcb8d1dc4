/// Mean Earth radius backing all geodesic math here, in meters. The speed
/// and outlier thresholds downstream were tuned against this exact value.
pub const EARTH_RADIUS_M: f64 = 6_373_000.0;

/// Great-circle distance in meters between two `[longitude, latitude]`
/// positions given in degrees, by the haversine formula.
pub fn haversine_m(from: [f64; 2], to: [f64; 2]) -> f64 {
    let lat1 = from[1].to_radians();
    let lon1 = from[0].to_radians();
    let lat2 = to[1].to_radians();
    let lon2 = to[0].to_radians();

    let dlat = lat2 - lat1;
    let dlon = lon2 - lon1;

    let a = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Flattens `[longitude, latitude, elevation]` positions into local `[x, y]`
/// meters by linearly scaling each axis between its per-track extremes. Not
/// a real projection; good enough for plotting one short track. An axis with
/// no spread maps every frame to 0.
pub fn flatten_to_meters(coordinates: &[[f64; 3]]) -> Vec<[f64; 2]> {
    if coordinates.is_empty() {
        return Vec::new();
    }

    let mut min_lon_at = 0;
    let mut max_lon = coordinates[0][0];
    let mut min_lat_at = 0;
    let mut max_lat = coordinates[0][1];
    for (i, pos) in coordinates.iter().enumerate() {
        if pos[0] < coordinates[min_lon_at][0] {
            min_lon_at = i;
        }
        max_lon = max_lon.max(pos[0]);
        if pos[1] < coordinates[min_lat_at][1] {
            min_lat_at = i;
        }
        max_lat = max_lat.max(pos[1]);
    }
    let min_lon = coordinates[min_lon_at][0];
    let min_lat = coordinates[min_lat_at][1];

    // Measure each axis span along the other axis's value at the minimum
    // frame, then interpolate within it
    let span_x = haversine_m(
        [min_lon, coordinates[min_lon_at][1]],
        [max_lon, coordinates[min_lon_at][1]],
    );
    let span_y = haversine_m(
        [coordinates[min_lat_at][0], min_lat],
        [coordinates[min_lat_at][0], max_lat],
    );

    coordinates
        .iter()
        .map(|pos| {
            let x = if max_lon > min_lon {
                (pos[0] - min_lon) / (max_lon - min_lon) * span_x
            } else {
                0.0
            };
            let y = if max_lat > min_lat {
                (pos[1] - min_lat) / (max_lat - min_lat) * span_y
            } else {
                0.0
            };
            [x, y]
        })
        .collect()
}
