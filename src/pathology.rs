// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

/*!
Mechanical perturbations of the nominal antenna geometry: subreflector and
feed misalignment, pointing and focus errors.
 */

use crate::{
    antenna::Antenna,
    math::{mat_mat, mat_vec, normalize, Mat3, Vec3, MAT3_IDENTITY},
    raytrace::SurfacePoint,
};

/// A perturbation of the nominal geometry, applied before ray tracing.
///
/// The default value is the exact identity: tracing with it produces
/// bit-identical results to the unperturbed antenna. A `Pathology` is built
/// fresh for each aperture computation and not modified afterwards.
#[derive(Clone, Debug, PartialEq)]
pub struct Pathology {
    /// Rotation applied to the subreflector about `sub_rot_point`.
    pub sub_rot: Mat3,
    /// Rotation applied to the feed boresight.
    pub feed_rot: Mat3,
    /// Translation of the subreflector \[m\], applied after the rotation.
    pub sub_shift: Vec3,
    /// Translation of the feed \[m\].
    pub feed_shift: Vec3,
    /// Pivot of the subreflector rotation \[m\].
    pub sub_rot_point: Vec3,
    /// Azimuthal pointing offset \[rad\].
    pub az_offset: f64,
    /// Elevation pointing offset \[rad\].
    pub el_offset: f64,
    /// Constant phase added to every aperture sample \[rad\].
    pub phase_offset: f64,
    /// Out-of-focus distance \[m\], along the feed-to-subreflector axis.
    /// Folded into `feed_shift` by [`Pathology::resolve`].
    pub focus: f64,
}

impl Default for Pathology {
    fn default() -> Pathology {
        Pathology {
            sub_rot: MAT3_IDENTITY,
            feed_rot: MAT3_IDENTITY,
            sub_shift: [0.0; 3],
            feed_shift: [0.0; 3],
            sub_rot_point: [0.0; 3],
            az_offset: 0.0,
            el_offset: 0.0,
            phase_offset: 0.0,
            focus: 0.0,
        }
    }
}

impl Pathology {
    /// The identity perturbation.
    pub fn new() -> Pathology {
        Pathology::default()
    }

    pub fn with_sub_shift(mut self, shift: Vec3) -> Pathology {
        self.sub_shift = shift;
        self
    }

    pub fn with_feed_shift(mut self, shift: Vec3) -> Pathology {
        self.feed_shift = shift;
        self
    }

    pub fn with_sub_rotation(mut self, rot: Mat3, pivot: Vec3) -> Pathology {
        self.sub_rot = rot;
        self.sub_rot_point = pivot;
        self
    }

    pub fn with_feed_rotation(mut self, rot: Mat3) -> Pathology {
        self.feed_rot = rot;
        self
    }

    pub fn with_pointing_offset(mut self, az_rad: f64, el_rad: f64) -> Pathology {
        self.az_offset = az_rad;
        self.el_offset = el_rad;
        self
    }

    pub fn with_phase_offset(mut self, phase_rad: f64) -> Pathology {
        self.phase_offset = phase_rad;
        self
    }

    pub fn with_focus(mut self, distance_m: f64) -> Pathology {
        self.focus = distance_m;
        self
    }

    /// Is this the identity perturbation?
    pub fn is_identity(&self) -> bool {
        *self == Pathology::default()
    }

    /// Fold the out-of-focus distance into the feed shift, along the unit
    /// vector from the feed to the subreflector. Returns a copy with
    /// `focus == 0`; the remaining fields are unchanged.
    pub(crate) fn resolve(&self, antenna: &Antenna) -> Pathology {
        let mut resolved = self.clone();
        if self.focus != 0.0 {
            let mut dx = [
                -antenna.feed[0],
                -antenna.feed[1],
                antenna.sub_h - antenna.feed[2],
            ];
            normalize(&mut dx);
            for i in 0..3 {
                resolved.feed_shift[i] += self.focus * dx[i];
            }
            resolved.focus = 0.0;
        }
        resolved
    }

    /// Sequential application: `self` first, `then` second. Rotations
    /// multiply and shifts/offsets add. The subreflector pivot is taken
    /// from `self`; two rotations about different pivots are not
    /// representable, so fold one of them into a shift first.
    pub fn compose(&self, then: &Pathology) -> Pathology {
        let mut out = Pathology {
            sub_rot: mat_mat(&then.sub_rot, &self.sub_rot),
            feed_rot: mat_mat(&then.feed_rot, &self.feed_rot),
            sub_rot_point: self.sub_rot_point,
            ..Pathology::default()
        };
        for i in 0..3 {
            out.sub_shift[i] = self.sub_shift[i] + then.sub_shift[i];
            out.feed_shift[i] = self.feed_shift[i] + then.feed_shift[i];
        }
        out.az_offset = self.az_offset + then.az_offset;
        out.el_offset = self.el_offset + then.el_offset;
        out.phase_offset = self.phase_offset + then.phase_offset;
        out.focus = self.focus + then.focus;
        out
    }

    /// Perturb a traced subreflector point: rotate position and normal
    /// about the pivot, then translate the position.
    pub(crate) fn pathologize(&self, sub: &mut SurfacePoint) {
        let centred = [
            sub.pos[0] - self.sub_rot_point[0],
            sub.pos[1] - self.sub_rot_point[1],
            sub.pos[2] - self.sub_rot_point[2],
        ];
        let rotated = mat_vec(&self.sub_rot, centred);
        for i in 0..3 {
            sub.pos[i] = rotated[i] + self.sub_rot_point[i] + self.sub_shift[i];
        }
        sub.normal = mat_vec(&self.sub_rot, sub.normal);
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;
    use crate::geometry::GeometryTable;

    fn test_antenna() -> Antenna {
        let table = GeometryTable::nominal_25m();
        Antenna::new(table.band("L").unwrap(), 1.4e9).unwrap()
    }

    #[test]
    fn default_is_identity() {
        assert!(Pathology::default().is_identity());
        assert!(!Pathology::new().with_focus(0.01).is_identity());
    }

    #[test]
    fn identity_pathologize_is_a_no_op() {
        let p = Pathology::default();
        let mut sub = SurfacePoint {
            pos: [1.0, -2.0, 5.5],
            normal: [0.1, 0.2, -0.97],
        };
        let before = sub;
        p.pathologize(&mut sub);
        assert_eq!(sub.pos, before.pos);
        assert_eq!(sub.normal, before.normal);
    }

    #[test]
    fn resolve_folds_focus_into_feed_shift() {
        let antenna = test_antenna();
        let p = Pathology::new().with_focus(0.003);
        let resolved = p.resolve(&antenna);
        assert_eq!(resolved.focus, 0.0);
        // The nominal feed is on axis, so the fold is purely axial.
        assert_abs_diff_eq!(resolved.feed_shift[0], 0.0);
        assert_abs_diff_eq!(resolved.feed_shift[1], 0.0);
        assert_abs_diff_eq!(resolved.feed_shift[2], 0.003, epsilon = 1e-15);
        // The original is untouched.
        assert_abs_diff_eq!(p.focus, 0.003);
    }

    #[test]
    fn resolve_of_identity_is_exact() {
        let antenna = test_antenna();
        let p = Pathology::default();
        assert_eq!(p.resolve(&antenna), p);
    }

    #[test]
    fn composed_inverse_shifts_are_identity() {
        let delta = [0.004, -0.002, 0.001];
        let p1 = Pathology::new()
            .with_sub_shift(delta)
            .with_feed_shift(delta);
        let p2 = Pathology::new()
            .with_sub_shift([-delta[0], -delta[1], -delta[2]])
            .with_feed_shift([-delta[0], -delta[1], -delta[2]]);
        let composed = p1.compose(&p2);
        for i in 0..3 {
            assert_abs_diff_eq!(composed.sub_shift[i], 0.0);
            assert_abs_diff_eq!(composed.feed_shift[i], 0.0);
        }
        assert!(composed.is_identity());
    }

    #[test]
    fn sub_shift_moves_the_traced_point() {
        let p = Pathology::new().with_sub_shift([0.01, 0.0, 0.0]);
        let mut sub = SurfacePoint {
            pos: [0.0, 0.0, 6.0],
            normal: [0.0, 0.0, -1.0],
        };
        p.pathologize(&mut sub);
        assert_abs_diff_eq!(sub.pos[0], 0.01);
        assert_abs_diff_eq!(sub.pos[2], 6.0);
        assert_abs_diff_eq!(sub.normal[2], -1.0);
    }
}
