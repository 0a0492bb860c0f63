/// Wavefront OBJ and MTL parsers
use nalgebra::{Vector2, Vector3};
use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{char, i64 as integer, space0, space1},
    combinator::{map, opt, rest},
    multi::{many0, separated_list1},
    number::complete::float,
    sequence::{preceded, terminated, tuple},
    IResult,
};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ObjError {
    #[error("line {line}: malformed '{keyword}' statement")]
    Malformed { line: usize, keyword: String },
    #[error("line {line}: index {index} does not refer to one of the {count} {kind} defined so far")]
    IndexOutOfRange {
        line: usize,
        kind: &'static str,
        index: i64,
        count: usize,
    },
    #[error("line {line}: face has {count} vertices, at least 3 required")]
    DegenerateFace { line: usize, count: usize },
}

/// One corner of a face, resolved to zero-based indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FaceVertex {
    pub position: usize,
    pub tex_coord: Option<usize>,
}

/// Faces sharing one `usemtl` material, in file order
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialGroup {
    pub material: Option<String>,
    pub faces: Vec<Vec<FaceVertex>>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjModel {
    pub positions: Vec<Vector3<f32>>,
    pub tex_coords: Vec<Vector2<f32>>,
    pub groups: Vec<MaterialGroup>,
    pub material_libraries: Vec<String>,
}

impl ObjModel {
    pub fn face_count(&self) -> usize {
        self.groups.iter().map(|g| g.faces.len()).sum()
    }

    fn group_for(&mut self, material: Option<&str>) -> &mut MaterialGroup {
        let position = self.groups.iter().position(|g| g.material.as_deref() == material);
        let index = match position {
            Some(index) => index,
            None => {
                self.groups.push(MaterialGroup {
                    material: material.map(str::to_owned),
                    faces: Vec::new(),
                });
                self.groups.len() - 1
            }
        };
        &mut self.groups[index]
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Statement<'a> {
    Position(Vector3<f32>),
    TexCoord(Vector2<f32>),
    Face(Vec<(i64, Option<i64>)>),
    UseMaterial(&'a str),
    MaterialLibrary(&'a str),
}

fn keyword<'a>(word: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, &'a str> {
    terminated(tag(word), space1)
}

fn vector3(input: &str) -> IResult<&str, Vector3<f32>> {
    map(
        tuple((float, preceded(space1, float), preceded(space1, float))),
        |(x, y, z)| Vector3::new(x, y, z),
    )(input)
}

fn position(input: &str) -> IResult<&str, Statement<'_>> {
    // Trailing w or per-vertex r g b are accepted and ignored
    let (input, p) = preceded(keyword("v"), vector3)(input)?;
    let (input, _) = many0(preceded(space1, float))(input)?;
    Ok((input, Statement::Position(p)))
}

fn tex_coord(input: &str) -> IResult<&str, Statement<'_>> {
    let (input, u) = preceded(keyword("vt"), float)(input)?;
    let (input, v) = opt(preceded(space1, float))(input)?;
    let (input, _) = opt(preceded(space1, float))(input)?;
    Ok((input, Statement::TexCoord(Vector2::new(u, v.unwrap_or(0.0)))))
}

/// `v`, `v/vt`, `v//vn` or `v/vt/vn`; normals are skipped
fn face_vertex(input: &str) -> IResult<&str, (i64, Option<i64>)> {
    let (input, position) = integer(input)?;
    let (input, tex_coord) = opt(preceded(char('/'), opt(integer)))(input)?;
    let (input, _) = opt(preceded(char('/'), opt(integer)))(input)?;
    Ok((input, (position, tex_coord.flatten())))
}

fn face(input: &str) -> IResult<&str, Statement<'_>> {
    map(preceded(keyword("f"), separated_list1(space1, face_vertex)), Statement::Face)(input)
}

fn use_material(input: &str) -> IResult<&str, Statement<'_>> {
    map(preceded(keyword("usemtl"), rest), |name| Statement::UseMaterial(name.trim()))(input)
}

fn material_library(input: &str) -> IResult<&str, Statement<'_>> {
    map(preceded(keyword("mtllib"), rest), |path| Statement::MaterialLibrary(path.trim()))(input)
}

fn statement(input: &str) -> IResult<&str, Statement<'_>> {
    terminated(
        alt((position, tex_coord, face, use_material, material_library)),
        space0,
    )(input)
}

/// Strip comments and surrounding whitespace
fn clean_line(line: &str) -> &str {
    line.split('#').next().unwrap_or("").trim()
}

/// Resolve a 1-based (or negative, relative) OBJ index against `count` entries
fn resolve_index(index: i64, count: usize, line: usize, kind: &'static str) -> Result<usize, ObjError> {
    let resolved = if index > 0 {
        index - 1
    } else {
        count as i64 + index
    };
    if index == 0 || resolved < 0 || resolved >= count as i64 {
        return Err(ObjError::IndexOutOfRange {
            line,
            kind,
            index,
            count,
        });
    }
    Ok(resolved as usize)
}

const KNOWN_KEYWORDS: [&str; 5] = ["v", "vt", "f", "usemtl", "mtllib"];

/// Parse OBJ source text. Statements other than `v`, `vt`, `f`, `usemtl`
/// and `mtllib` (normals, groups, smoothing, ...) are ignored.
pub fn parse_obj(source: &str) -> Result<ObjModel, ObjError> {
    let mut model = ObjModel::default();
    let mut material: Option<String> = None;

    for (number, raw) in source.lines().enumerate() {
        let line = number + 1;
        let text = clean_line(raw);
        let Some(word) = text.split_whitespace().next() else {
            continue;
        };
        if !KNOWN_KEYWORDS.contains(&word) {
            continue;
        }

        let parsed = match statement(text) {
            Ok(("", parsed)) => parsed,
            _ => {
                return Err(ObjError::Malformed {
                    line,
                    keyword: word.to_string(),
                })
            }
        };

        match parsed {
            Statement::Position(p) => model.positions.push(p),
            Statement::TexCoord(t) => model.tex_coords.push(t),
            Statement::UseMaterial(name) => material = Some(name.to_string()),
            Statement::MaterialLibrary(path) => model.material_libraries.push(path.to_string()),
            Statement::Face(corners) => {
                if corners.len() < 3 {
                    return Err(ObjError::DegenerateFace {
                        line,
                        count: corners.len(),
                    });
                }
                let (position_count, tex_coord_count) = (model.positions.len(), model.tex_coords.len());
                let face = corners
                    .into_iter()
                    .map(|(p, t)| {
                        Ok(FaceVertex {
                            position: resolve_index(p, position_count, line, "positions")?,
                            tex_coord: t
                                .map(|t| resolve_index(t, tex_coord_count, line, "texture coordinates"))
                                .transpose()?,
                        })
                    })
                    .collect::<Result<Vec<_>, ObjError>>()?;
                model.group_for(material.as_deref()).faces.push(face);
            }
        }
    }

    Ok(model)
}

/// Diffuse part of an MTL material; everything else is ignored
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub name: String,
    pub diffuse: [f32; 3],
    pub diffuse_map: Option<String>,
}

impl Material {
    fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            diffuse: [1.0, 1.0, 1.0],
            diffuse_map: None,
        }
    }
}

fn new_material(input: &str) -> IResult<&str, &str> {
    map(preceded(keyword("newmtl"), rest), str::trim)(input)
}

fn diffuse(input: &str) -> IResult<&str, Vector3<f32>> {
    terminated(preceded(keyword("Kd"), vector3), space0)(input)
}

fn diffuse_map(input: &str) -> IResult<&str, &str> {
    map(preceded(keyword("map_Kd"), rest), str::trim)(input)
}

/// Split off the first whitespace-separated token
fn next_token(text: &str) -> (&str, &str) {
    let text = text.trim_start();
    let end = text.find(char::is_whitespace).unwrap_or(text.len());
    text.split_at(end)
}

fn is_option_value(token: &str) -> bool {
    token == "on" || token == "off" || token.parse::<f32>().is_ok()
}

/// Drop leading `-option value...` pairs of a texture statement; the rest,
/// spaces included, is the file name
fn strip_map_options(args: &str) -> &str {
    let mut rest = args.trim();
    while rest.starts_with('-') {
        let (option, mut after) = next_token(rest);
        if option == "-imfchan" || option == "-type" {
            after = next_token(after).1;
        } else {
            loop {
                let (value, remainder) = next_token(after);
                if value.is_empty() || !is_option_value(value) {
                    break;
                }
                after = remainder;
            }
        }
        rest = after.trim_start();
    }
    rest.trim_end()
}

/// Parse MTL source text into its materials, in file order
pub fn parse_mtl(source: &str) -> Result<Vec<Material>, ObjError> {
    let mut materials: Vec<Material> = Vec::new();

    for (number, raw) in source.lines().enumerate() {
        let line = number + 1;
        let text = clean_line(raw);
        let Some(word) = text.split_whitespace().next() else {
            continue;
        };
        let malformed = || ObjError::Malformed {
            line,
            keyword: word.to_string(),
        };

        match word {
            "newmtl" => {
                let (_, name) = new_material(text).map_err(|_| malformed())?;
                materials.push(Material::named(name));
            }
            "Kd" => {
                let color = match diffuse(text) {
                    Ok(("", color)) => color,
                    _ => return Err(malformed()),
                };
                if let Some(current) = materials.last_mut() {
                    current.diffuse = [color.x, color.y, color.z];
                }
            }
            "map_Kd" => {
                let (_, args) = diffuse_map(text).map_err(|_| malformed())?;
                let path = strip_map_options(args);
                if path.is_empty() {
                    return Err(malformed());
                }
                if let Some(current) = materials.last_mut() {
                    current.diffuse_map = Some(path.to_string());
                }
            }
            _ => {}
        }
    }

    Ok(materials)
}

#[cfg(test)]
mod tests {
    use super::*;

    const QUAD: &str = "\
# a textured quad
mtllib quad.mtl
v -1 -1 0
v 1 -1 0
v 1 1 0
v -1 1 0 1.0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
vn 0 0 1
usemtl checker
f 1/1/1 2/2/1 3/3/1 4/4/1
";

    #[test]
    fn test_parse_quad() {
        let model = parse_obj(QUAD).unwrap();
        assert_eq!(model.positions.len(), 4);
        assert_eq!(model.tex_coords.len(), 4);
        assert_eq!(model.material_libraries, vec!["quad.mtl".to_string()]);
        assert_eq!(model.groups.len(), 1);
        assert_eq!(model.groups[0].material.as_deref(), Some("checker"));
        let face = &model.groups[0].faces[0];
        assert_eq!(face.len(), 4);
        assert_eq!(
            face[2],
            FaceVertex {
                position: 2,
                tex_coord: Some(2)
            }
        );
    }

    #[test]
    fn test_vertex_colors_are_ignored() {
        let source = "v 0 0 0 1 0 0\nv 1 0 0 0 1 0\nv 0 1 0 0 0 1\nf 1 2 3\n";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.positions[1], Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(model.face_count(), 1);
    }

    #[test]
    fn test_face_vertex_forms() {
        let source = "v 0 0 0\nv 1 0 0\nv 0 1 0\nvt 0.5 0.5\nf 1 2//7 -1/1\n";
        let model = parse_obj(source).unwrap();
        let face = &model.groups[0].faces[0];
        assert_eq!(face[0], FaceVertex { position: 0, tex_coord: None });
        assert_eq!(face[1], FaceVertex { position: 1, tex_coord: None });
        assert_eq!(face[2], FaceVertex { position: 2, tex_coord: Some(0) });
        assert_eq!(model.groups[0].material, None);
    }

    #[test]
    fn test_groups_follow_usemtl() {
        let source = "\
v 0 0 0
v 1 0 0
v 0 1 0
usemtl a
f 1 2 3
usemtl b
f 3 2 1
usemtl a
f 1 3 2
";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.groups.len(), 2);
        assert_eq!(model.groups[0].faces.len(), 2);
        assert_eq!(model.groups[1].faces.len(), 1);
        assert_eq!(model.face_count(), 3);
    }

    #[test]
    fn test_ignores_unknown_statements() {
        let source = "o thing\ng part\ns off\nv 0 0 0  # trailing comment\r\n";
        let model = parse_obj(source).unwrap();
        assert_eq!(model.positions, vec![Vector3::zeros()]);
    }

    #[test]
    fn test_index_out_of_range() {
        let err = parse_obj("v 0 0 0\nv 1 0 0\nf 1 2 3\n").unwrap_err();
        assert_eq!(
            err,
            ObjError::IndexOutOfRange {
                line: 3,
                kind: "positions",
                index: 3,
                count: 2
            }
        );
        assert!(parse_obj("v 0 0 0\nf 0 1 1\n").is_err());
    }

    #[test]
    fn test_malformed_lines() {
        assert_eq!(
            parse_obj("v 1 2\n").unwrap_err(),
            ObjError::Malformed {
                line: 1,
                keyword: "v".to_string()
            }
        );
        assert!(matches!(parse_obj("v 0 0 0\nf 1 1\n"), Err(ObjError::DegenerateFace { line: 2, count: 2 })));
        assert!(parse_obj("v 0 0 0\nf 1 x 1\n").is_err());
    }

    #[test]
    fn test_parse_mtl() {
        let source = "\
newmtl checker
Kd 0.8 0.4 0.2
map_Kd -s 1 1 1 textures/checker.png
newmtl plain
Ka 0 0 0
Kd 0 1 0
";
        let materials = parse_mtl(source).unwrap();
        assert_eq!(materials.len(), 2);
        assert_eq!(materials[0].name, "checker");
        assert_eq!(materials[0].diffuse, [0.8, 0.4, 0.2]);
        assert_eq!(materials[0].diffuse_map.as_deref(), Some("textures/checker.png"));
        assert_eq!(materials[1].diffuse, [0.0, 1.0, 0.0]);
        assert_eq!(materials[1].diffuse_map, None);
    }

    #[test]
    fn test_map_kd_keeps_spaces_in_file_name() {
        let source = "\
newmtl a
map_Kd my texture.png
newmtl b
map_Kd -blendu off -mm 0 1 -imfchan l maps/rough stone.jpg
newmtl c
map_Kd -o 0.5 0.5 2k.png
";
        let materials = parse_mtl(source).unwrap();
        assert_eq!(materials[0].diffuse_map.as_deref(), Some("my texture.png"));
        assert_eq!(materials[1].diffuse_map.as_deref(), Some("maps/rough stone.jpg"));
        assert_eq!(materials[2].diffuse_map.as_deref(), Some("2k.png"));
    }

    #[test]
    fn test_malformed_mtl() {
        assert!(matches!(parse_mtl("newmtl a\nKd 1 oops 0\n"), Err(ObjError::Malformed { line: 2, .. })));
    }
}
