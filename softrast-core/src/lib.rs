//! softrast core: CPU triangle rasterization driven by a free-fly camera.
//!
//! Everything here is independent of any window system: scene ingestion
//! produces [`Geometry`], the [`Camera`] turns an [`InputSnapshot`] into
//! matrices, and the rasterizer fills a [`FrameBuffer`].

pub mod camera;
pub mod capability;
pub mod config;
pub mod framebuffer;
pub mod geometry;
pub mod input;
pub mod obj;
pub mod raster;
pub mod scene;
pub mod transform;

// Re-export commonly used types
pub use camera::{Camera, Viewport};
pub use capability::{CpuCapability, HostCpu};
pub use config::{ConfigError, ViewerConfig};
pub use framebuffer::{FrameBand, FrameBuffer};
pub use geometry::{Geometry, GeometryError, Texture, Vertex};
pub use input::{InputSnapshot, KeySet};
pub use raster::{rasterize_scene, rasterize_scene_banded, RasterStats};
pub use scene::{ObjSceneLoader, Scene, SceneError, SceneLoader};
pub use transform::ModelTransform;
