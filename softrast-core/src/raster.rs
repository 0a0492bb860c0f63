/// Triangle rasterization: transform, cull, edge-function fill, 1/z depth test
/// and perspective-correct nearest texture sampling
use nalgebra::{Matrix4, Vector2, Vector4};

use crate::framebuffer::{FrameBand, FrameBuffer};
use crate::geometry::{Geometry, Texture, Vertex};

/// Triangles whose clip-space signed area exceeds this are treated as back-facing
pub const CULL_EPSILON: f32 = 0.15;

/// Smallest magnitude a clip-space z or w is allowed to have before taking its reciprocal
const RECIPROCAL_FLOOR: f32 = 1e-7;

#[inline]
fn safe_recip(value: f32) -> f32 {
    if value.abs() < RECIPROCAL_FLOOR {
        1.0 / RECIPROCAL_FLOOR.copysign(value)
    } else {
        1.0 / value
    }
}

/// Counters for one batch of triangles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RasterStats {
    pub triangles: usize,
    pub culled: usize,
}

impl std::ops::AddAssign for RasterStats {
    fn add_assign(&mut self, other: Self) {
        self.triangles += other.triangles;
        self.culled += other.culled;
    }
}

/// Twice the signed area of the clip-space triangle projected onto X/Y
pub fn signed_area(clip: &[Vector4<f32>; 3]) -> f32 {
    let [p0, p1, p2] = clip;
    (p1.x - p0.x) * (p2.y - p0.y) - (p2.x - p0.x) * (p1.y - p0.y)
}

/// Winding rejection; the only culling the pipeline performs
pub fn is_back_facing(clip: &[Vector4<f32>; 3]) -> bool {
    signed_area(clip) > CULL_EPSILON
}

/// Half-open integer pixel rectangle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelBounds {
    pub min_x: usize,
    pub max_x: usize,
    pub min_y: usize,
    pub max_y: usize,
}

impl PixelBounds {
    fn enclosing(points: &[Vector2<f32>; 3], width: usize, height: usize) -> Self {
        let clamp = |value: f32, limit: usize| (value.max(0.0) as usize).min(limit);
        let min_x = points[0].x.min(points[1].x).min(points[2].x).floor();
        let max_x = points[0].x.max(points[1].x).max(points[2].x).ceil();
        let min_y = points[0].y.min(points[1].y).min(points[2].y).floor();
        let max_y = points[0].y.max(points[1].y).max(points[2].y).ceil();
        Self {
            min_x: clamp(min_x, width),
            max_x: clamp(max_x, width),
            min_y: clamp(min_y, height),
            max_y: clamp(max_y, height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_x >= self.max_x || self.min_y >= self.max_y
    }
}

/// Everything the fill loop needs about one front-facing triangle
#[derive(Debug, Clone)]
pub struct TriangleSetup {
    screen: [Vector2<f32>; 3],
    inv_z: [f32; 3],
    inv_w: [f32; 3],
    u_over_w: [f32; 3],
    v_over_w: [f32; 3],
    // Edge-function basis relative to the third vertex
    ax: f32,
    ay: f32,
    bx: f32,
    by: f32,
    norm: f32,
    bounds: PixelBounds,
}

impl TriangleSetup {
    /// Returns `None` for back-facing triangles and for triangles with no screen area
    pub fn new(clip: [Vector4<f32>; 3], uv: [Vector2<f32>; 3], width: usize, height: usize) -> Option<Self> {
        if is_back_facing(&clip) {
            return None;
        }

        let inv_z = clip.map(|p| safe_recip(p.z));
        let inv_w = clip.map(|p| safe_recip(p.w));

        // Dividing by (w / width, z / height) folds the perspective divide into the pixel mapping
        let (w, h) = (width as f32, height as f32);
        let screen = [0, 1, 2].map(|i| Vector2::new(clip[i].x * w * inv_w[i], clip[i].y * h * inv_z[i]));

        let u_over_w = [0, 1, 2].map(|i| uv[i].x * inv_w[i]);
        let v_over_w = [0, 1, 2].map(|i| uv[i].y * inv_w[i]);

        let [p0, p1, p2] = screen;
        let ax = p2.x - p1.x;
        let ay = p1.y - p2.y;
        let bx = p0.x - p2.x;
        let by = p2.y - p0.y;

        let denominator = ay * bx + ax * (p0.y - p2.y);
        if !denominator.is_finite() || denominator.abs() < f32::MIN_POSITIVE {
            return None;
        }

        Some(Self {
            screen,
            inv_z,
            inv_w,
            u_over_w,
            v_over_w,
            ax,
            ay,
            bx,
            by,
            norm: 1.0 / denominator,
            bounds: PixelBounds::enclosing(&screen, width, height),
        })
    }

    pub fn screen_positions(&self) -> &[Vector2<f32>; 3] {
        &self.screen
    }

    pub fn bounds(&self) -> PixelBounds {
        self.bounds
    }

    /// Barycentric weights of the screen point `(x, y)`
    #[inline]
    pub fn weights(&self, x: f32, y: f32) -> [f32; 3] {
        let cx = x - self.screen[2].x;
        let cy = y - self.screen[2].y;
        let l0 = self.norm * (self.ay * cx + self.ax * cy);
        let l1 = self.norm * (self.by * cx + self.bx * cy);
        [l0, l1, 1.0 - l0 - l1]
    }

    /// Interpolated 1/z; larger is nearer
    #[inline]
    pub fn depth(&self, l: [f32; 3]) -> f32 {
        l[0] * self.inv_z[0] + l[1] * self.inv_z[1] + l[2] * self.inv_z[2]
    }

    /// Perspective-correct texture coordinate at the given weights
    #[inline]
    pub fn uv(&self, l: [f32; 3]) -> Vector2<f32> {
        let w = 1.0 / (l[0] * self.inv_w[0] + l[1] * self.inv_w[1] + l[2] * self.inv_w[2]);
        let u = l[0] * self.u_over_w[0] + l[1] * self.u_over_w[1] + l[2] * self.u_over_w[2];
        let v = l[0] * self.v_over_w[0] + l[1] * self.v_over_w[1] + l[2] * self.v_over_w[2];
        Vector2::new(u * w, v * w)
    }

    /// Fill the rows of `band` this triangle touches.
    ///
    /// Pixels are sampled at integer coordinates and must have all three
    /// weights strictly positive; shared edges get no tie-break.
    pub fn fill(&self, band: &mut FrameBand<'_>, texture: &Texture) {
        let rows = band.rows();
        let first = self.bounds.min_y.max(rows.start);
        let last = self.bounds.max_y.min(rows.end);
        let (tex_w, tex_h) = (texture.width() as f32, texture.height() as f32);

        for y in first..last {
            let (color, depth) = band.row_mut(y);
            for x in self.bounds.min_x..self.bounds.max_x {
                let l = self.weights(x as f32, y as f32);
                if l[0] > 0.0 && l[1] > 0.0 && l[2] > 0.0 {
                    let z = self.depth(l);
                    if z > depth[x] {
                        depth[x] = z;
                        let uv = self.uv(l);
                        color[x] = texture.texel(tex_w * uv.x, tex_h * uv.y);
                    }
                }
            }
        }
    }
}

/// Transform, cull and fill one triangle. Returns false if it was culled.
pub fn rasterize_triangle(band: &mut FrameBand<'_>, mvp: &Matrix4<f32>, triangle: [&Vertex; 3], texture: &Texture) -> bool {
    let clip = triangle.map(|v| mvp * v.position);
    let uv = triangle.map(|v| v.uv);
    match TriangleSetup::new(clip, uv, band.width(), band.height()) {
        Some(setup) => {
            if !setup.bounds.is_empty() {
                setup.fill(band, texture);
            }
            true
        }
        None => false,
    }
}

/// All triangles of one geometry, in index order
pub fn rasterize_geometry(band: &mut FrameBand<'_>, geometry: &Geometry, mvp: &Matrix4<f32>) -> RasterStats {
    let mut stats = RasterStats::default();
    for triangle in geometry.triangles() {
        stats.triangles += 1;
        if !rasterize_triangle(band, mvp, triangle, geometry.texture()) {
            stats.culled += 1;
        }
    }
    stats
}

/// Single-threaded reference path: geometries in order, triangles in index order
pub fn rasterize_scene(
    fb: &mut FrameBuffer,
    geometries: &[Geometry],
    view_projection: &Matrix4<f32>,
    model: &Matrix4<f32>,
) -> RasterStats {
    let mvp = view_projection * model;
    let mut band = fb.as_band();
    let mut stats = RasterStats::default();
    for geometry in geometries {
        stats += rasterize_geometry(&mut band, geometry, &mvp);
    }
    log::trace!("rasterized {} triangles, {} culled", stats.triangles, stats.culled);
    stats
}

/// Same output as [`rasterize_scene`], split over `bands` scoped threads.
///
/// Every worker walks every triangle but only writes the rows of its own
/// band, so the bands never alias and no locking is needed.
pub fn rasterize_scene_banded(
    fb: &mut FrameBuffer,
    geometries: &[Geometry],
    view_projection: &Matrix4<f32>,
    model: &Matrix4<f32>,
    bands: usize,
) -> RasterStats {
    if bands <= 1 {
        return rasterize_scene(fb, geometries, view_projection, model);
    }

    let mvp = view_projection * model;
    let per_band = run_bands(&mut fb.bands(bands), |band| {
        let mut stats = RasterStats::default();
        for geometry in geometries {
            stats += rasterize_geometry(band, geometry, &mvp);
        }
        stats
    });

    // Each band saw the same triangles
    per_band.first().copied().unwrap_or_default()
}

/// Run `work` on every band from its own scoped thread. A panicking worker
/// is re-raised on the caller once the scope ends.
fn run_bands<F>(bands: &mut [FrameBand<'_>], work: F) -> Vec<RasterStats>
where
    F: Fn(&mut FrameBand<'_>) -> RasterStats + Sync,
{
    std::thread::scope(|scope| {
        let workers: Vec<_> = bands
            .iter_mut()
            .map(|band| {
                let work = &work;
                scope.spawn(move || work(band))
            })
            .collect();
        workers
            .into_iter()
            .map(|worker| worker.join().unwrap_or_else(|panic| std::panic::resume_unwind(panic)))
            .collect()
    })
}
