/// Scene ingestion: mesh file in, validated geometries out
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use nalgebra::Vector2;
use thiserror::Error;

use crate::geometry::{pack_argb, Geometry, GeometryError, Texture, Vertex};
use crate::obj::{parse_mtl, parse_obj, FaceVertex, Material, MaterialGroup, ObjError, ObjModel};

#[derive(Debug, Error)]
pub enum SceneError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ObjError,
    },
    #[error("failed to decode texture {}: {source}", path.display())]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("invalid geometry for material '{material}': {source}")]
    Geometry {
        material: String,
        #[source]
        source: GeometryError,
    },
    #[error("{} contains no triangles", .0.display())]
    Empty(PathBuf),
}

/// Everything the renderer draws, in draw order
#[derive(Debug, Clone, Default)]
pub struct Scene {
    pub geometries: Vec<Geometry>,
}

impl Scene {
    pub fn triangle_count(&self) -> usize {
        self.geometries.iter().map(Geometry::triangle_count).sum()
    }
}

/// Turns a mesh source into geometry the rasterizer can consume
pub trait SceneLoader {
    fn load(&self, path: &Path) -> Result<Scene, SceneError>;
}

/// Wavefront OBJ with optional MTL materials and diffuse texture maps.
///
/// One geometry is produced per material, in order of first use.
#[derive(Debug, Clone, Copy, Default)]
pub struct ObjSceneLoader;

impl SceneLoader for ObjSceneLoader {
    fn load(&self, path: &Path) -> Result<Scene, SceneError> {
        let source = read_text(path)?;
        let model = parse_obj(&source).map_err(|source| SceneError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        let base = path.parent().unwrap_or_else(|| Path::new(""));

        let mut materials = HashMap::new();
        for library in &model.material_libraries {
            let library_path = base.join(library);
            let text = match fs::read_to_string(&library_path) {
                Ok(text) => text,
                Err(e) => {
                    log::warn!("Skipping material library {}: {}", library_path.display(), e);
                    continue;
                }
            };
            let parsed = parse_mtl(&text).map_err(|source| SceneError::Parse {
                path: library_path.clone(),
                source,
            })?;
            for material in parsed {
                materials.insert(material.name.clone(), material);
            }
        }

        let mut textures: HashMap<PathBuf, Texture> = HashMap::new();
        let mut scene = Scene::default();
        for group in &model.groups {
            let label = group.material.clone().unwrap_or_else(|| "<default>".to_string());
            let texture = match group.material.as_ref().and_then(|name| materials.get(name)) {
                Some(material) => material_texture(material, base, &mut textures)?,
                None => {
                    if group.material.is_some() {
                        log::warn!("Material '{}' is not defined, using white", label);
                    }
                    Texture::solid(0xFFFF_FFFF)
                }
            };

            let geometry = build_geometry(&model, group, texture)
                .map_err(|source| SceneError::Geometry { material: label.clone(), source })?;
            if geometry.triangle_count() == 0 {
                continue;
            }
            log::debug!(
                "Material '{}': {} vertices, {} triangles, {}x{} texture",
                label,
                geometry.vertices().len(),
                geometry.triangle_count(),
                geometry.texture().width(),
                geometry.texture().height()
            );
            scene.geometries.push(geometry);
        }

        if scene.geometries.is_empty() {
            return Err(SceneError::Empty(path.to_path_buf()));
        }

        log::info!(
            "Loaded {}: {} geometries, {} triangles",
            path.display(),
            scene.geometries.len(),
            scene.triangle_count()
        );
        Ok(scene)
    }
}

fn read_text(path: &Path) -> Result<String, SceneError> {
    fs::read_to_string(path).map_err(|source| SceneError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn material_texture(
    material: &Material,
    base: &Path,
    cache: &mut HashMap<PathBuf, Texture>,
) -> Result<Texture, SceneError> {
    let Some(map) = &material.diffuse_map else {
        let [r, g, b] = material.diffuse.map(|c| (c.clamp(0.0, 1.0) * 255.0).round() as u8);
        return Ok(Texture::solid(pack_argb(r, g, b, 0xFF)));
    };

    let path = base.join(map);
    if let Some(texture) = cache.get(&path) {
        return Ok(texture.clone());
    }
    let texture = load_texture(&path)?;
    cache.insert(path, texture.clone());
    Ok(texture)
}

/// Decode an image file into a texture whose first row is the bottom of the
/// image, matching OBJ texture coordinates where v = 0 is the bottom edge
pub fn load_texture(path: &Path) -> Result<Texture, SceneError> {
    let image = image::open(path).map_err(|source| SceneError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    let rgba = image::imageops::flip_vertical(&image.to_rgba8());
    let (width, height) = rgba.dimensions();
    log::debug!("Loaded texture {} ({}x{})", path.display(), width, height);
    Texture::from_rgba8(width as usize, height as usize, rgba.as_raw()).map_err(|source| SceneError::Geometry {
        material: path.display().to_string(),
        source,
    })
}

/// De-duplicate corners per (position, uv) pair and fan-triangulate polygons
fn build_geometry(model: &ObjModel, group: &MaterialGroup, texture: Texture) -> Result<Geometry, GeometryError> {
    let mut lookup: HashMap<FaceVertex, u32> = HashMap::new();
    let mut vertices = Vec::new();
    let mut indices = Vec::new();

    for face in &group.faces {
        let corners: Vec<u32> = face
            .iter()
            .map(|corner| {
                *lookup.entry(*corner).or_insert_with(|| {
                    let p = model.positions[corner.position];
                    let uv = corner
                        .tex_coord
                        .map(|t| model.tex_coords[t])
                        .unwrap_or_else(Vector2::zeros);
                    vertices.push(Vertex::new(p.x, p.y, p.z, uv.x, uv.y));
                    (vertices.len() - 1) as u32
                })
            })
            .collect();

        for i in 1..corners.len().saturating_sub(1) {
            indices.extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
        }
    }

    Geometry::new(vertices, indices, texture)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fresh scratch directory for one test
    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("softrast-{}-{}", std::process::id(), name));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    const QUAD: &str = "\
mtllib quad.mtl
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
usemtl textured
f 1/1 2/2 3/3 4/4
usemtl flat
f 1 3 2
";

    #[test]
    fn test_load_obj_with_materials() {
        let dir = scratch_dir("materials");
        fs::write(dir.join("quad.obj"), QUAD).unwrap();
        fs::write(
            dir.join("quad.mtl"),
            "newmtl textured\nmap_Kd tex.png\nnewmtl flat\nKd 1 0 0\n",
        )
        .unwrap();
        // Top row red, bottom row blue
        let mut image = image::RgbaImage::new(1, 2);
        image.put_pixel(0, 0, image::Rgba([255, 0, 0, 255]));
        image.put_pixel(0, 1, image::Rgba([0, 0, 255, 255]));
        image.save(dir.join("tex.png")).unwrap();

        let scene = ObjSceneLoader.load(&dir.join("quad.obj")).unwrap();
        assert_eq!(scene.geometries.len(), 2);
        assert_eq!(scene.triangle_count(), 3);

        let textured = &scene.geometries[0];
        assert_eq!(textured.vertices().len(), 4);
        assert_eq!(textured.indices(), &[0, 1, 2, 0, 2, 3]);
        assert_eq!(textured.vertices()[2].uv, Vector2::new(1.0, 1.0));
        // Flipped: row 0 is the bottom of the image
        assert_eq!(textured.texture().pixels(), &[0xFF00_00FF, 0xFFFF_0000]);

        let flat = &scene.geometries[1];
        assert_eq!(flat.texture().pixels(), &[0xFFFF_0000]);
        assert_eq!(flat.vertices()[0].uv, Vector2::zeros());
    }

    #[test]
    fn test_missing_library_falls_back_to_white() {
        let dir = scratch_dir("nolib");
        fs::write(dir.join("quad.obj"), QUAD).unwrap();
        let scene = ObjSceneLoader.load(&dir.join("quad.obj")).unwrap();
        assert!(scene
            .geometries
            .iter()
            .all(|g| g.texture().pixels() == [0xFFFF_FFFF]));
    }

    #[test]
    fn test_missing_texture_is_fatal() {
        let dir = scratch_dir("notex");
        fs::write(dir.join("quad.obj"), QUAD).unwrap();
        fs::write(dir.join("quad.mtl"), "newmtl textured\nmap_Kd absent.png\n").unwrap();
        let err = ObjSceneLoader.load(&dir.join("quad.obj")).unwrap_err();
        assert!(matches!(err, SceneError::Image { .. }));
    }

    #[test]
    fn test_missing_file() {
        let err = ObjSceneLoader
            .load(Path::new("/definitely/not/here.obj"))
            .unwrap_err();
        assert!(matches!(err, SceneError::Io { .. }));
        assert!(err.to_string().contains("here.obj"));
    }

    #[test]
    fn test_empty_scene_is_rejected() {
        let dir = scratch_dir("empty");
        fs::write(dir.join("points.obj"), "v 0 0 0\nv 1 0 0\n").unwrap();
        let err = ObjSceneLoader.load(&dir.join("points.obj")).unwrap_err();
        assert!(matches!(err, SceneError::Empty(_)));
    }

    #[test]
    fn test_parse_error_is_reported_with_path() {
        let dir = scratch_dir("broken");
        fs::write(dir.join("broken.obj"), "v 0 0\n").unwrap();
        let err = ObjSceneLoader.load(&dir.join("broken.obj")).unwrap_err();
        assert!(matches!(err, SceneError::Parse { .. }));
        assert!(err.to_string().contains("line 1"));
    }
}
