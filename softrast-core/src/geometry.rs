/// Geometry primitives consumed by the rasterizer
use nalgebra::{Vector2, Vector3, Vector4};
use thiserror::Error;

/// Reasons a mesh is rejected before it ever reaches the rasterizer
#[derive(Debug, Error, PartialEq, Eq)]
pub enum GeometryError {
    #[error("index count {0} is not a multiple of 3")]
    RaggedIndices(usize),
    #[error("index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange { index: u32, vertex_count: usize },
    #[error("texture has zero size ({width}x{height})")]
    EmptyTexture { width: usize, height: usize },
    #[error("texture holds {actual} samples, expected {expected}")]
    TextureSizeMismatch { expected: usize, actual: usize },
}

/// A vertex with a homogeneous position and a texture coordinate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vector4<f32>,
    pub uv: Vector2<f32>,
}

impl Vertex {
    pub fn new(x: f32, y: f32, z: f32, u: f32, v: f32) -> Self {
        Self {
            position: Vector4::new(x, y, z, 1.0),
            uv: Vector2::new(u, v),
        }
    }
}

/// Pack 8-bit channels into the `0xAARRGGBB` layout used by textures and the frame buffer
pub fn pack_argb(r: u8, g: u8, b: u8, a: u8) -> u32 {
    (a as u32) << 24 | (r as u32) << 16 | (g as u32) << 8 | b as u32
}

/// Split a packed `0xAARRGGBB` sample back into `(r, g, b, a)`
pub fn unpack_argb(color: u32) -> (u8, u8, u8, u8) {
    (
        (color >> 16) as u8,
        (color >> 8) as u8,
        color as u8,
        (color >> 24) as u8,
    )
}

/// Row-major packed color samples
#[derive(Debug, Clone, PartialEq)]
pub struct Texture {
    width: usize,
    height: usize,
    pixels: Vec<u32>,
}

impl Texture {
    pub fn new(width: usize, height: usize, pixels: Vec<u32>) -> Result<Self, GeometryError> {
        if width == 0 || height == 0 {
            return Err(GeometryError::EmptyTexture { width, height });
        }
        if pixels.len() != width * height {
            return Err(GeometryError::TextureSizeMismatch {
                expected: width * height,
                actual: pixels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            pixels,
        })
    }

    /// Build from tightly packed RGBA8 bytes
    pub fn from_rgba8(width: usize, height: usize, bytes: &[u8]) -> Result<Self, GeometryError> {
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| pack_argb(p[0], p[1], p[2], p[3]))
            .collect();
        Self::new(width, height, pixels)
    }

    /// A 1x1 texture; every lookup returns `color`
    pub fn solid(color: u32) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: vec![color],
        }
    }

    /// Alternating `cell`-sized squares of two colors
    pub fn checkerboard(width: usize, height: usize, cell: usize, a: u32, b: u32) -> Self {
        let cell = cell.max(1);
        let width = width.max(1);
        let height = height.max(1);
        let pixels = (0..height)
            .flat_map(|y| (0..width).map(move |x| if (x / cell + y / cell) % 2 == 0 { a } else { b }))
            .collect();
        Self {
            width,
            height,
            pixels,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    /// Nearest texel for already-scaled coordinates, clamped into the texture.
    ///
    /// Truncation happens before clamping so that `u == width` at the far
    /// edge lands on the last column rather than outside the buffer.
    #[inline]
    pub fn texel(&self, u: f32, v: f32) -> u32 {
        let x = (u as usize).min(self.width - 1);
        let y = (v as usize).min(self.height - 1);
        self.pixels[y * self.width + x]
    }
}

/// Vertices, triangle indices and the texture they are painted with
#[derive(Debug, Clone)]
pub struct Geometry {
    vertices: Vec<Vertex>,
    indices: Vec<u32>,
    texture: Texture,
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>, texture: Texture) -> Result<Self, GeometryError> {
        if indices.len() % 3 != 0 {
            return Err(GeometryError::RaggedIndices(indices.len()));
        }
        if let Some(&index) = indices.iter().find(|&&i| i as usize >= vertices.len()) {
            return Err(GeometryError::IndexOutOfRange {
                index,
                vertex_count: vertices.len(),
            });
        }
        Ok(Self {
            vertices,
            indices,
            texture,
        })
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    pub fn texture(&self) -> &Texture {
        &self.texture
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Vertices of every triangle, in index order
    pub fn triangles(&self) -> impl Iterator<Item = [&Vertex; 3]> + '_ {
        self.indices.chunks_exact(3).map(move |t| {
            [
                &self.vertices[t[0] as usize],
                &self.vertices[t[1] as usize],
                &self.vertices[t[2] as usize],
            ]
        })
    }

    /// Textured cube centred on the origin, faces wound counter-clockwise seen from outside
    pub fn cube(size: f32, texture: Texture) -> Self {
        let half = size / 2.0;
        let faces: [(Vector3<f32>, Vector3<f32>, Vector3<f32>); 6] = [
            // Front, back, top, bottom, right, left: (normal, u axis, v axis)
            (Vector3::z(), Vector3::x(), Vector3::y()),
            (-Vector3::z(), -Vector3::x(), Vector3::y()),
            (Vector3::y(), Vector3::x(), -Vector3::z()),
            (-Vector3::y(), Vector3::x(), Vector3::z()),
            (Vector3::x(), -Vector3::z(), Vector3::y()),
            (-Vector3::x(), Vector3::z(), Vector3::y()),
        ];
        let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);
        for (normal, u_axis, v_axis) in faces {
            let base = vertices.len() as u32;
            for (cu, cv) in corners {
                let p = (normal + u_axis * cu + v_axis * cv) * half;
                vertices.push(Vertex::new(p.x, p.y, p.z, (cu + 1.0) / 2.0, (cv + 1.0) / 2.0));
            }
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self {
            vertices,
            indices,
            texture,
        }
    }
}
