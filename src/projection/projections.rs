use std::f64::consts::PI;
use std::sync::Arc;

use bevy::math::DVec2;

use super::rect::DoubleRect;
use crate::resources::constants::{MAX_LATITUDE, WORLD_MAP_SIZE};

/// Maps geographic `(longitude, latitude)` degrees to a projected plane.
pub trait Projection: Send + Sync {
    fn project(&self, geo: DVec2) -> DVec2;

    fn invert(&self, point: DVec2) -> DVec2;

    /// Geographic rectangle the projection is defined on
    fn valid_rect(&self) -> DoubleRect;

    /// Whether the projected plane wraps around horizontally
    fn cylindrical(&self) -> bool;

    fn projected_rect(&self) -> DoubleRect {
        let valid = self.valid_rect();
        let a = self.project(valid.origin);
        let b = self.project(valid.origin + valid.dimension);
        DoubleRect::from_ltrb(a.x.min(b.x), a.y.min(b.y), a.x.max(b.x), a.y.max(b.y))
    }
}

/// Spherical web mercator, in meters
#[derive(Debug, Clone, Copy, Default)]
pub struct MercatorProjection;

const EARTH_RADIUS: f64 = 6_378_137.0;

impl Projection for MercatorProjection {
    fn project(&self, geo: DVec2) -> DVec2 {
        let lat = geo.y.clamp(-MAX_LATITUDE, MAX_LATITUDE).to_radians();
        DVec2::new(
            EARTH_RADIUS * geo.x.to_radians(),
            EARTH_RADIUS * (PI / 4.0 + lat / 2.0).tan().ln(),
        )
    }

    fn invert(&self, point: DVec2) -> DVec2 {
        DVec2::new(
            (point.x / EARTH_RADIUS).to_degrees(),
            (2.0 * (point.y / EARTH_RADIUS).exp().atan() - PI / 2.0).to_degrees(),
        )
    }

    fn valid_rect(&self) -> DoubleRect {
        DoubleRect::from_ltrb(-180.0, -MAX_LATITUDE, 180.0, MAX_LATITUDE)
    }

    fn cylindrical(&self) -> bool {
        true
    }
}

/// Equirectangular: longitude and latitude used directly
#[derive(Debug, Clone, Copy, Default)]
pub struct GeographicProjection;

impl Projection for GeographicProjection {
    fn project(&self, geo: DVec2) -> DVec2 {
        geo
    }

    fn invert(&self, point: DVec2) -> DVec2 {
        point
    }

    fn valid_rect(&self) -> DoubleRect {
        DoubleRect::from_ltrb(-180.0, -90.0, 180.0, 90.0)
    }

    fn cylindrical(&self) -> bool {
        true
    }
}

/// Geographic coordinates to the square world map the tile grid subdivides.
///
/// North is at the top of the map rect.
#[derive(Clone)]
pub struct MapProjection {
    projection: Arc<dyn Projection>,
    map_rect: DoubleRect,
    projected: DoubleRect,
    scale: DVec2,
}

impl MapProjection {
    pub fn new(projection: Arc<dyn Projection>, map_rect: DoubleRect) -> Self {
        let projected = projection.projected_rect();
        let scale = map_rect.dimension / projected.dimension;
        Self {
            projection,
            map_rect,
            projected,
            scale,
        }
    }

    pub fn mercator() -> Self {
        Self::new(
            Arc::new(MercatorProjection),
            DoubleRect::new(DVec2::ZERO, DVec2::splat(WORLD_MAP_SIZE)),
        )
    }

    pub fn map_rect(&self) -> DoubleRect {
        self.map_rect
    }

    pub fn cylindrical(&self) -> bool {
        self.projection.cylindrical()
    }

    pub fn apply(&self, geo: DVec2) -> DVec2 {
        let valid = self.projection.valid_rect();
        let geo = DVec2::new(
            geo.x.clamp(valid.left(), valid.right()),
            geo.y.clamp(valid.top(), valid.bottom()),
        );
        let p = self.projection.project(geo);
        DVec2::new(
            self.map_rect.left() + (p.x - self.projected.left()) * self.scale.x,
            self.map_rect.top() + (self.projected.bottom() - p.y) * self.scale.y,
        )
    }

    pub fn invert(&self, world: DVec2) -> DVec2 {
        let p = DVec2::new(
            self.projected.left() + (world.x - self.map_rect.left()) / self.scale.x,
            self.projected.bottom() - (world.y - self.map_rect.top()) / self.scale.y,
        );
        self.projection.invert(p)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: DVec2, b: DVec2) {
        assert!((a - b).length() < 1e-6, "{a} != {b}");
    }

    fn sample_points(projection: &dyn Projection) -> Vec<DVec2> {
        let valid = projection.valid_rect();
        let mut points = Vec::new();
        for i in 0..=10 {
            for j in 0..=10 {
                points.push(DVec2::new(
                    valid.left() + valid.width() * i as f64 / 10.0,
                    valid.top() + valid.height() * j as f64 / 10.0,
                ));
            }
        }
        points
    }

    #[test]
    fn test_projections_round_trip_over_valid_rect() {
        let projections: [&dyn Projection; 2] = [&MercatorProjection, &GeographicProjection];
        for projection in projections {
            for geo in sample_points(projection) {
                assert_close(projection.invert(projection.project(geo)), geo);
            }
        }
    }

    #[test]
    fn test_map_projection_round_trip_and_orientation() {
        let map = MapProjection::mercator();
        for geo in sample_points(&MercatorProjection) {
            assert_close(map.invert(map.apply(geo)), geo);
        }

        assert_close(map.apply(DVec2::ZERO), DVec2::splat(WORLD_MAP_SIZE / 2.0));
        assert_close(map.apply(DVec2::new(-180.0, MAX_LATITUDE)), DVec2::ZERO);
        // Positive longitude and latitude land north-east of the map center
        let north_east = map.apply(DVec2::new(6.5, 53.2));
        assert!(north_east.x > 128.0 && north_east.y < 128.0);
    }
}
