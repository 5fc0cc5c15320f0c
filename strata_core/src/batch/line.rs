// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Stroke tessellation helpers for line and spline elements.

use alloc::vec::Vec;

use kurbo::{Affine, Point, Vec2};
#[cfg(not(feature = "std"))]
use kurbo::common::FloatFuncs as _;

use super::{SlateVertex, VertexRounding};
use crate::color::{LinearColor, PackedColor};

/// Flatness threshold below which a Bezier segment is emitted as a line.
const MAX_CURVINESS: f64 = 1.0;

/// Extra width added on both sides of filtered strokes.
pub(crate) fn filter_half_width(thickness: f64) -> f64 {
    (2.0 * core::f64::consts::SQRT_2 + thickness) * 0.5 + 1.0
}

/// Unit vector along `v`, or zero when `v` is (nearly) degenerate.
pub(crate) fn safe_normal(v: Vec2) -> Vec2 {
    let len = v.hypot();
    if len <= 1e-8 { Vec2::ZERO } else { v / len }
}

/// Intersection of segments `p1..p2` and `p3..p4`, extended by `tolerance`
/// (as a fraction of each segment) at both ends.
///
/// Coincident segments meet at the midpoint of the first; parallel segments
/// do not meet.
pub(crate) fn line_intersect(
    p1: Point,
    p2: Point,
    p3: Point,
    p4: Point,
    tolerance: f64,
) -> Option<Point> {
    let num_a = (p4.x - p3.x) * (p1.y - p3.y) - (p4.y - p3.y) * (p1.x - p3.x);
    let num_b = (p2.x - p1.x) * (p1.y - p3.y) - (p2.y - p1.y) * (p1.x - p3.x);
    let denom = (p4.y - p3.y) * (p2.x - p1.x) - (p4.x - p3.x) * (p2.y - p1.y);

    if num_a.abs() < 1e-8 && num_b.abs() < 1e-8 {
        return Some(p1.midpoint(p2));
    }
    if denom.abs() < 1e-8 {
        return None;
    }
    let a = num_a / denom;
    let b = num_b / denom;
    let range = -tolerance..=1.0 + tolerance;
    (range.contains(&a) && range.contains(&b)).then(|| p1 + (p2 - p1) * a)
}

/// Emits a filtered end cap at `origin`, extending along `dir`.
pub(crate) fn make_cap(
    verts: &mut Vec<SlateVertex>,
    indices: &mut Vec<u32>,
    transform: Affine,
    origin: Point,
    dir: Vec2,
    up: Vec2,
    color: PackedColor,
) {
    let first = vertex_count(verts);
    let mut push = |p: Point, uv: Point| {
        verts.push(SlateVertex::new(transform, p, uv, color, VertexRounding::Disabled));
    };
    push(origin, Point::new(0.5, 0.0));
    push(origin + dir + up, Point::ZERO);
    push(origin + dir - up, Point::ZERO);
    push(origin + up, Point::ZERO);
    push(origin - up, Point::ZERO);
    indices.extend([
        first,
        first + 3,
        first + 1,
        first,
        first + 1,
        first + 2,
        first,
        first + 2,
        first + 4,
    ]);
}

/// Builds a filtered strip through a sequence of points, mitering each
/// joint with the average of the adjacent segment normals.
#[derive(Clone, Debug)]
pub(crate) struct LineBuilder {
    transform: Affine,
    half_width: f64,
    last: [Point; 2],
    last_normal: Vec2,
    num_added: u32,
}

impl LineBuilder {
    pub(crate) fn new(transform: Affine, start: Point, half_width: f64) -> Self {
        Self {
            transform,
            half_width,
            last: [start, start],
            last_normal: Vec2::ZERO,
            num_added: 1,
        }
    }

    fn push_pair(
        &self,
        verts: &mut Vec<SlateVertex>,
        indices: &mut Vec<u32>,
        at: Point,
        offset: Vec2,
        color: PackedColor,
        connect: bool,
    ) {
        verts.push(SlateVertex::new(
            self.transform,
            at + offset,
            Point::new(1.0, 0.0),
            color,
            VertexRounding::Disabled,
        ));
        verts.push(SlateVertex::new(
            self.transform,
            at - offset,
            Point::ZERO,
            color,
            VertexRounding::Disabled,
        ));
        if connect {
            let n = vertex_count(verts);
            indices.extend([n - 3, n - 4, n - 2, n - 3, n - 2, n - 1]);
        }
    }

    pub(crate) fn append_point(
        &mut self,
        verts: &mut Vec<SlateVertex>,
        indices: &mut Vec<u32>,
        point: Point,
        color: PackedColor,
    ) {
        let new_normal = safe_normal(Vec2::new(
            self.last[0].y - point.y,
            point.x - self.last[0].x,
        ));
        if self.num_added == 2 {
            self.push_pair(
                verts,
                indices,
                self.last[1],
                self.last_normal * self.half_width,
                color,
                false,
            );
        }
        if self.num_added >= 2 {
            let averaged = safe_normal((new_normal + self.last_normal) * 0.5) * self.half_width;
            self.push_pair(verts, indices, self.last[0], averaged, color, true);
        }
        self.last[1] = self.last[0];
        self.last[0] = point;
        self.last_normal = new_normal;
        self.num_added += 1;
    }

    pub(crate) fn finish(
        &mut self,
        verts: &mut Vec<SlateVertex>,
        indices: &mut Vec<u32>,
        point: Point,
        color: PackedColor,
    ) {
        if self.num_added < 3 {
            self.append_point(verts, indices, point, color);
        } else {
            self.push_pair(
                verts,
                indices,
                self.last[0],
                self.last_normal * self.half_width,
                color,
                true,
            );
        }
    }

    /// Flattens the cubic `p` by recursive halving, appending the end point
    /// of every flat piece.
    pub(crate) fn subdivide(
        &mut self,
        verts: &mut Vec<SlateVertex>,
        indices: &mut Vec<u32>,
        p: [Point; 4],
        color: PackedColor,
    ) {
        if curviness(p) > MAX_CURVINESS {
            let (left, right) = split_cubic(p, 0.5);
            self.subdivide(verts, indices, left, color);
            self.subdivide(verts, indices, right, color);
        } else {
            self.append_point(verts, indices, p[3], color);
        }
    }

    /// Like [`subdivide`](Self::subdivide), interpolating the vertex color
    /// from `from` to `to` along the piece.
    pub(crate) fn subdivide_blended(
        &mut self,
        verts: &mut Vec<SlateVertex>,
        indices: &mut Vec<u32>,
        p: [Point; 4],
        from: LinearColor,
        to: LinearColor,
        srgb: bool,
    ) {
        if curviness(p) > MAX_CURVINESS {
            let mid = from.lerp(to, 0.5);
            let (left, right) = split_cubic(p, 0.5);
            self.subdivide_blended(verts, indices, left, from, mid, srgb);
            self.subdivide_blended(verts, indices, right, mid, to, srgb);
        } else {
            self.append_point(verts, indices, p[3], to.to_packed(srgb));
        }
    }
}

/// Sum of the L1 norms of the cubic's second differences.
fn curviness(p: [Point; 4]) -> f64 {
    let l1 = |v: Vec2| v.x.abs() + v.y.abs();
    l1(p[0].to_vec2() + p[2].to_vec2() - p[1].to_vec2() * 2.0)
        + l1(p[1].to_vec2() + p[3].to_vec2() - p[2].to_vec2() * 2.0)
}

/// De Casteljau split of a cubic at `t`.
pub(crate) fn split_cubic(p: [Point; 4], t: f64) -> ([Point; 4], [Point; 4]) {
    let ab = p[0].lerp(p[1], t);
    let bc = p[1].lerp(p[2], t);
    let cd = p[2].lerp(p[3], t);
    let abc = ab.lerp(bc, t);
    let bcd = bc.lerp(cd, t);
    let mid = abc.lerp(bcd, t);
    ([p[0], ab, abc, mid], [mid, bcd, cd, p[3]])
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "scratch arrays are bounded by the u32 index format"
)]
#[inline]
pub(crate) fn vertex_count(verts: &[SlateVertex]) -> u32 {
    verts.len() as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crossing_segments_intersect() {
        let p = line_intersect(
            Point::new(0.0, 0.0),
            Point::new(10.0, 10.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 0.0),
            0.1,
        );
        assert_eq!(p, Some(Point::new(5.0, 5.0)));
    }

    #[test]
    fn parallel_segments_do_not_intersect() {
        let p = line_intersect(
            Point::new(0.0, 0.0),
            Point::new(10.0, 0.0),
            Point::new(0.0, 1.0),
            Point::new(10.0, 1.0),
            0.1,
        );
        assert_eq!(p, None);
    }

    #[test]
    fn collinear_segments_meet_at_midpoint() {
        let p = line_intersect(
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(2.0, 0.0),
            Point::new(8.0, 0.0),
            0.1,
        );
        assert_eq!(p, Some(Point::new(2.0, 0.0)));
    }

    #[test]
    fn split_cubic_halves_share_midpoint() {
        let p = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 10.0),
            Point::new(10.0, 10.0),
            Point::new(10.0, 0.0),
        ];
        let (l, r) = split_cubic(p, 0.5);
        assert_eq!(l[3], r[0]);
        assert_eq!(l[3], Point::new(5.0, 7.5));
        assert_eq!(l[0], p[0]);
        assert_eq!(r[3], p[3]);
    }

    #[test]
    fn straight_segment_builds_one_quad() {
        let mut verts = Vec::new();
        let mut indices = Vec::new();
        let start = Point::ZERO;
        let end = Point::new(9.0, 0.0);
        let mut b = LineBuilder::new(Affine::IDENTITY, start, 2.0);
        let p = [start, Point::new(3.0, 0.0), Point::new(6.0, 0.0), end];
        b.subdivide(&mut verts, &mut indices, p, PackedColor::WHITE);
        b.finish(&mut verts, &mut indices, end, PackedColor::WHITE);
        assert_eq!(verts.len(), 4);
        assert_eq!(indices, [1, 0, 2, 1, 2, 3]);
        // The strip is offset by the half width on both sides.
        assert_eq!(verts[0].point(), Point::new(0.0, 2.0));
        assert_eq!(verts[1].point(), Point::new(0.0, -2.0));
    }

    #[test]
    fn curved_segment_is_subdivided() {
        let mut verts = Vec::new();
        let mut indices = Vec::new();
        let p = [
            Point::new(0.0, 0.0),
            Point::new(0.0, 50.0),
            Point::new(50.0, 50.0),
            Point::new(50.0, 0.0),
        ];
        let mut b = LineBuilder::new(Affine::IDENTITY, p[0], 2.0);
        b.subdivide(&mut verts, &mut indices, p, PackedColor::WHITE);
        b.finish(&mut verts, &mut indices, p[3], PackedColor::WHITE);
        assert!(verts.len() > 4);
        assert_eq!(verts.len() % 2, 0);
        assert_eq!(indices.len(), (verts.len() / 2 - 1) * 6);
    }
}
