//! Fresnel reflect/transmit split and the analytic refraction approximation.
//!
//! The same reflectance formula weights both the water surface's
//! reflected/transmitted blend (against the viewer) and the energy each
//! caustic sample carries (against the light), so the two stay physically
//! consistent. The landing-point computation substitutes a small-angle
//! linear scaling for a true refracted ray/plane intersection; see
//! [`refracted_landing_point`].

use glam::{Vec2, Vec3};

/// Refractive index of air
pub const AIR_IOR: f32 = 1.0;

/// Refractive index of water
pub const WATER_IOR: f32 = 1.333;

/// Floor for `cos_t` in the landing-point division. Unreachable for the
/// air-to-water ratio (sin_t <= 0.75 so cos_t >= 0.66); keeps the result
/// finite if a ratio with n1 > n2 is ever configured.
const MIN_COS_T: f32 = 1e-4;

/// Schlick's approximation of Fresnel reflectance.
///
/// `cos_theta` is `dot(N, D)` for a unit normal and a unit direction of
/// interest; callers mask back-facing geometry rather than passing negative
/// cosines. Grazing incidence (`cos_theta` near 0) is valid and reflects
/// almost everything.
pub fn reflectance(cos_theta: f32, n1: f32, n2: f32) -> f32 {
    let r0 = ((n1 - n2) / (n1 + n2)).powi(2);
    r0 + (1.0 - r0) * (1.0 - cos_theta).powi(5)
}

/// Transmitted fraction; exactly `1 - reflectance` for any input.
pub fn transmittance(cos_theta: f32, n1: f32, n2: f32) -> f32 {
    1.0 - reflectance(cos_theta, n1, n2)
}

/// Horizontal point where a ray arriving at surface point `p` from unit
/// direction `d` lands on the floor plane `y = 0` after refraction.
///
/// `p.y` is the height above the floor plane; `d` points from `p` toward
/// the source (light or viewer) and must have `d.y > 0` for a meaningful
/// straight-ray intersection below the surface.
///
/// The bent ray is approximated by scaling the straight-ray horizontal
/// offset by `(n1/n2) * (cos_i / cos_t)`. That is exact at normal incidence
/// and consistent with Snell's law in the small-angle limit; it stands in
/// for a full ray/plane intersection of the refracted direction. A landing
/// point outside the floor extent is a normal outcome the caller handles by
/// sampling the backdrop instead.
pub fn refracted_landing_point(p: Vec3, d: Vec3, n: Vec3, n1: f32, n2: f32) -> Vec2 {
    let cos_i = n.dot(d);
    let sin_i = (1.0 - cos_i * cos_i).max(0.0).sqrt();
    let sin_t = n1 * sin_i / n2;
    let cos_t = (1.0 - sin_t * sin_t).max(0.0).sqrt();

    // Straight, unrefracted continuation of the ray through p hits y = 0 at
    // p - d * (p.y / d.y); keep horizontal components only.
    let straight_offset = -Vec2::new(d.x, d.z) * (p.y / d.y);
    let refracted_offset = straight_offset * (n1 / n2) * (cos_i / cos_t.max(MIN_COS_T));

    Vec2::new(p.x, p.z) + refracted_offset
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflectance_is_monotone_toward_normal_incidence() {
        let mut prev = reflectance(0.0, AIR_IOR, WATER_IOR);
        for step in 1..=100 {
            let cos_theta = step as f32 / 100.0;
            let r = reflectance(cos_theta, AIR_IOR, WATER_IOR);
            assert!(
                r <= prev + 1e-7,
                "reflectance increased toward normal incidence at cos={cos_theta}"
            );
            prev = r;
        }
    }

    #[test]
    fn grazing_incidence_reflects_nearly_everything() {
        assert!((reflectance(0.0, AIR_IOR, WATER_IOR) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn normal_incidence_reflects_base_fraction() {
        let r0 = ((AIR_IOR - WATER_IOR) / (AIR_IOR + WATER_IOR)).powi(2);
        assert!((reflectance(1.0, AIR_IOR, WATER_IOR) - r0).abs() < 1e-7);
        assert!(r0 < 0.03, "water reflects only ~2% at normal incidence");
    }

    #[test]
    fn split_sums_to_one_exactly() {
        for step in 0..=20 {
            let cos_theta = step as f32 / 20.0;
            let r = reflectance(cos_theta, AIR_IOR, WATER_IOR);
            let t = transmittance(cos_theta, AIR_IOR, WATER_IOR);
            assert_eq!(r + t, 1.0);
        }
    }

    #[test]
    fn normal_incidence_does_not_bend() {
        // Flat surface, ray arriving straight from above: the landing point
        // is exactly the straight-ray intersection, i.e. directly below p.
        let p = Vec3::new(13.0, 1.5, 4.0);
        let landing =
            refracted_landing_point(p, Vec3::Y, Vec3::Y, AIR_IOR, WATER_IOR);
        assert_eq!(landing, Vec2::new(13.0, 4.0));
    }

    #[test]
    fn oblique_incidence_compresses_the_straight_offset() {
        // Air to water bends the ray toward the normal, so the refracted
        // landing point sits strictly between the foot of p and the
        // straight-ray intersection.
        let p = Vec3::new(10.0, 2.0, 4.0);
        let d = Vec3::new(0.6, 0.7, 0.2).normalize();
        let n = Vec3::Y;

        let straight = Vec2::new(p.x, p.z) - Vec2::new(d.x, d.z) * (p.y / d.y);
        let landing = refracted_landing_point(p, d, n, AIR_IOR, WATER_IOR);

        let foot = Vec2::new(p.x, p.z);
        let straight_dist = (straight - foot).length();
        let refracted_dist = (landing - foot).length();

        assert!(refracted_dist > 0.0);
        assert!(
            refracted_dist < straight_dist,
            "refraction into the denser medium must shorten the offset \
             ({refracted_dist} >= {straight_dist})"
        );

        // Same direction as the straight offset, only scaled
        let cross = (straight - foot).perp_dot(landing - foot);
        assert!(cross.abs() < 1e-5);
    }

    #[test]
    fn landing_point_stays_finite_at_grazing_light() {
        let p = Vec3::new(5.0, 1.0, 5.0);
        let d = Vec3::new(0.999, 0.04, 0.0).normalize();
        let landing = refracted_landing_point(p, d, Vec3::Y, AIR_IOR, WATER_IOR);
        assert!(landing.x.is_finite() && landing.y.is_finite());
    }
}
