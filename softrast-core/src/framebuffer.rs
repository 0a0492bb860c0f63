//! Color and depth storage for one output image

/// Packed `0xAARRGGBB` color buffer plus a 1/z depth buffer, both row-major.
///
/// Depth holds interpolated 1/z, so 0.0 is "infinitely far" and larger
/// values are nearer. Clearing resets both buffers to zero.
pub struct FrameBuffer {
    width: usize,
    height: usize,
    color: Vec<u32>,
    depth: Vec<f32>,
}

impl FrameBuffer {
    pub fn new(width: usize, height: usize) -> Self {
        let size = width * height;
        Self {
            width,
            height,
            color: vec![0; size],
            depth: vec![0.0; size],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn clear(&mut self) {
        self.color.fill(0);
        self.depth.fill(0.0);
    }

    /// The finished image, ready for presentation
    pub fn color(&self) -> &[u32] {
        &self.color
    }

    pub fn depth(&self) -> &[f32] {
        &self.depth
    }

    pub fn pixel(&self, x: usize, y: usize) -> Option<u32> {
        (x < self.width && y < self.height).then(|| self.color[y * self.width + x])
    }

    pub fn depth_at(&self, x: usize, y: usize) -> Option<f32> {
        (x < self.width && y < self.height).then(|| self.depth[y * self.width + x])
    }

    /// Number of pixels a fragment has won since the last clear
    pub fn covered_pixels(&self) -> usize {
        self.depth.iter().filter(|&&d| d != 0.0).count()
    }

    /// Write view over the whole buffer
    pub fn as_band(&mut self) -> FrameBand<'_> {
        FrameBand {
            width: self.width,
            height: self.height,
            first_row: 0,
            color: &mut self.color,
            depth: &mut self.depth,
        }
    }

    /// Split into at most `count` disjoint horizontal bands of whole rows.
    ///
    /// No two bands share a pixel, so each can be filled on its own thread.
    pub fn bands(&mut self, count: usize) -> Vec<FrameBand<'_>> {
        let (width, height) = (self.width, self.height);
        if width == 0 || height == 0 {
            return vec![self.as_band()];
        }
        let rows_per_band = height.div_ceil(count.clamp(1, height));
        self.color
            .chunks_mut(rows_per_band * width)
            .zip(self.depth.chunks_mut(rows_per_band * width))
            .enumerate()
            .map(|(i, (color, depth))| FrameBand {
                width,
                height,
                first_row: i * rows_per_band,
                color,
                depth,
            })
            .collect()
    }
}

/// Mutable view over a run of whole rows of a [`FrameBuffer`].
///
/// Coordinates passed in are absolute image coordinates; `width`/`height`
/// describe the full image so screen mapping is unaffected by banding.
pub struct FrameBand<'a> {
    width: usize,
    height: usize,
    first_row: usize,
    color: &'a mut [u32],
    depth: &'a mut [f32],
}

impl<'a> FrameBand<'a> {
    /// Full image width
    pub fn width(&self) -> usize {
        self.width
    }

    /// Full image height
    pub fn height(&self) -> usize {
        self.height
    }

    /// Absolute rows owned by this band
    pub fn rows(&self) -> std::ops::Range<usize> {
        let count = if self.width == 0 { 0 } else { self.color.len() / self.width };
        self.first_row..self.first_row + count
    }

    /// Color and depth slices for absolute row `y`; `y` must lie in [`Self::rows`]
    #[inline]
    pub fn row_mut(&mut self, y: usize) -> (&mut [u32], &mut [f32]) {
        let start = (y - self.first_row) * self.width;
        let end = start + self.width;
        (&mut self.color[start..end], &mut self.depth[start..end])
    }
}
