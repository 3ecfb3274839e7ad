use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use roxmltree::{Document, Node};

use crate::world::{Category, InteractableKind};

use super::database::{DefDatabase, EntityArchetype};

const ROOT_TAG: &str = "Defs";
const ENTITY_DEF_TAG: &str = "EntityDef";
const INTERACTABLE_VALUES: &str = "chest_part, chest_empty, starting_car, repair_car";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentErrorCode {
    ReadFile,
    XmlMalformed,
    InvalidRoot,
    UnknownDefType,
    UnknownField,
    DuplicateField,
    MissingField,
    InvalidValue,
    DuplicateDef,
}

#[derive(Debug, Clone)]
pub struct ContentCompileError {
    pub code: ContentErrorCode,
    pub message: String,
    pub file_path: PathBuf,
    pub location: Option<SourceLocation>,
}

impl ContentCompileError {
    fn unlocated(code: ContentErrorCode, message: String, file_path: &Path) -> Self {
        Self {
            code,
            message,
            file_path: file_path.to_path_buf(),
            location: None,
        }
    }
}

impl fmt::Display for ContentCompileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {} ({}", self.code, self.message, self.file_path.display())?;
        if let Some(location) = self.location {
            write!(f, ":{}:{}", location.line, location.column)?;
        }
        f.write_str(")")
    }
}

impl std::error::Error for ContentCompileError {}

/// Compiles every `*.xml` under `defs_dir`. Files are visited in sorted
/// relative-path order and defs get ids in `defName` order.
pub fn compile_def_database(defs_dir: &Path) -> Result<DefDatabase, ContentCompileError> {
    let mut by_name = BTreeMap::<String, EntityArchetype>::new();
    for xml_file in xml_files_in(defs_dir)? {
        let raw = fs::read_to_string(&xml_file).map_err(|source| read_failed(&xml_file, &source))?;
        let doc = Document::parse(&raw).map_err(|error| ContentCompileError {
            code: ContentErrorCode::XmlMalformed,
            message: format!("malformed XML: {error}"),
            file_path: xml_file.clone(),
            location: Some(SourceLocation {
                line: error.pos().row as usize,
                column: error.pos().col as usize,
            }),
        })?;

        let file = DefsFile {
            path: &xml_file,
            doc: &doc,
        };
        for archetype in file.entity_defs()? {
            if by_name.contains_key(&archetype.def_name) {
                return Err(ContentCompileError::unlocated(
                    ContentErrorCode::DuplicateDef,
                    format!("EntityDef '{}' is defined more than once", archetype.def_name),
                    &xml_file,
                ));
            }
            by_name.insert(archetype.def_name.clone(), archetype);
        }
    }

    Ok(DefDatabase::from_entity_defs(by_name.into_values().collect()))
}

/// One parsed defs file; every error it raises points back into it.
struct DefsFile<'a, 'input> {
    path: &'a Path,
    doc: &'a Document<'input>,
}

impl DefsFile<'_, '_> {
    fn entity_defs(&self) -> Result<Vec<EntityArchetype>, ContentCompileError> {
        let root = self.doc.root_element();
        if !root.has_tag_name(ROOT_TAG) {
            return Err(self.error_at(
                root,
                ContentErrorCode::InvalidRoot,
                format!("root element must be <{ROOT_TAG}>"),
            ));
        }

        root.children()
            .filter(Node::is_element)
            .map(|node| {
                if node.has_tag_name(ENTITY_DEF_TAG) {
                    self.entity_def(node)
                } else {
                    Err(self.error_at(
                        node,
                        ContentErrorCode::UnknownDefType,
                        format!(
                            "<{}> is not a supported def type; expected <{ENTITY_DEF_TAG}>",
                            node.tag_name().name()
                        ),
                    ))
                }
            })
            .collect()
    }

    fn entity_def(&self, node: Node<'_, '_>) -> Result<EntityArchetype, ContentCompileError> {
        let mut seen = HashSet::new();
        let mut def_name = None;
        let mut label = None;
        let mut category = None;
        let mut move_speed = 0.0;
        let mut health_max = None;
        let mut interactable = None;
        let mut interaction_radius = None;

        for field in node.children().filter(Node::is_element) {
            let name = field.tag_name().name();
            if !seen.insert(name) {
                return Err(self.error_at(
                    field,
                    ContentErrorCode::DuplicateField,
                    format!("<{name}> appears twice in <{ENTITY_DEF_TAG}>"),
                ));
            }

            match name {
                "defName" => def_name = Some(self.text(field)?),
                "label" => label = Some(self.text(field)?),
                "category" => {
                    let value = self.text(field)?;
                    let parsed = Category::parse(&value).ok_or_else(|| {
                        self.error_at(
                            field,
                            ContentErrorCode::InvalidValue,
                            format!(
                                "unknown category '{value}'; expected one of {}",
                                Category::ALL.map(Category::name).join(", ")
                            ),
                        )
                    })?;
                    category = Some(parsed);
                }
                "moveSpeed" => move_speed = self.non_negative(field)?,
                "interactionRadius" => interaction_radius = Some(self.non_negative(field)?),
                "health" => {
                    let value = self.text(field)?;
                    let max = value
                        .parse::<u32>()
                        .ok()
                        .filter(|max| *max > 0)
                        .ok_or_else(|| {
                            self.error_at(
                                field,
                                ContentErrorCode::InvalidValue,
                                format!("health '{value}' must be a positive integer"),
                            )
                        })?;
                    health_max = Some(max);
                }
                "interactable" => {
                    let value = self.text(field)?;
                    let kind = interactable_kind(&value).ok_or_else(|| {
                        self.error_at(
                            field,
                            ContentErrorCode::InvalidValue,
                            format!(
                                "unknown interactable '{value}'; expected one of {INTERACTABLE_VALUES}"
                            ),
                        )
                    })?;
                    interactable = Some(kind);
                }
                // Editor-only labels.
                "tags" => {}
                other => {
                    return Err(self.error_at(
                        field,
                        ContentErrorCode::UnknownField,
                        format!("<{other}> is not a known <{ENTITY_DEF_TAG}> field"),
                    ))
                }
            }
        }

        let def_name = def_name.ok_or_else(|| self.missing(node, "defName"))?;
        let label = label.ok_or_else(|| self.missing(node, "label"))?;
        let category = category.ok_or_else(|| self.missing(node, "category"))?;

        let mut archetype = EntityArchetype::new(def_name, category);
        archetype.label = label;
        archetype.move_speed = move_speed;
        archetype.health_max = health_max;
        archetype.interactable = interactable;
        if let Some(radius) = interaction_radius {
            archetype.interaction_radius = radius;
        }
        Ok(archetype)
    }

    fn text(&self, node: Node<'_, '_>) -> Result<String, ContentCompileError> {
        match node.text().map(str::trim) {
            Some(value) if !value.is_empty() => Ok(value.to_string()),
            _ => Err(self.error_at(
                node,
                ContentErrorCode::MissingField,
                format!("<{}> must not be empty", node.tag_name().name()),
            )),
        }
    }

    fn non_negative(&self, node: Node<'_, '_>) -> Result<f32, ContentCompileError> {
        let value = self.text(node)?;
        match value.parse::<f32>() {
            Ok(parsed) if parsed.is_finite() && parsed >= 0.0 => Ok(parsed),
            _ => Err(self.error_at(
                node,
                ContentErrorCode::InvalidValue,
                format!(
                    "<{}> '{value}' must be a finite number >= 0",
                    node.tag_name().name()
                ),
            )),
        }
    }

    fn missing(&self, node: Node<'_, '_>, field: &str) -> ContentCompileError {
        self.error_at(
            node,
            ContentErrorCode::MissingField,
            format!("<{ENTITY_DEF_TAG}> is missing required field <{field}>"),
        )
    }

    fn error_at(
        &self,
        node: Node<'_, '_>,
        code: ContentErrorCode,
        message: String,
    ) -> ContentCompileError {
        let pos = self.doc.text_pos_at(node.range().start);
        ContentCompileError {
            code,
            message,
            file_path: self.path.to_path_buf(),
            location: Some(SourceLocation {
                line: pos.row as usize,
                column: pos.col as usize,
            }),
        }
    }
}

fn interactable_kind(value: &str) -> Option<InteractableKind> {
    let kind = match value {
        "chest_part" => InteractableKind::Chest {
            holds_part: true,
            opened: false,
        },
        "chest_empty" => InteractableKind::Chest {
            holds_part: false,
            opened: false,
        },
        "starting_car" => InteractableKind::StartingCar,
        "repair_car" => InteractableKind::RepairCar { parts_collected: 0 },
        _ => return None,
    };
    Some(kind)
}

/// Every `*.xml` below `root`, ordered by its `/`-joined path relative to
/// `root`.
fn xml_files_in(root: &Path) -> Result<Vec<PathBuf>, ContentCompileError> {
    let mut pending = vec![root.to_path_buf()];
    let mut files = Vec::new();
    while let Some(dir) = pending.pop() {
        let entries = fs::read_dir(&dir).map_err(|source| read_failed(&dir, &source))?;
        for entry in entries {
            let path = entry.map_err(|source| read_failed(&dir, &source))?.path();
            if path.is_dir() {
                pending.push(path);
            } else if path
                .extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("xml"))
            {
                files.push(path);
            }
        }
    }
    files.sort_by_cached_key(|path| {
        path.strip_prefix(root)
            .unwrap_or(path)
            .iter()
            .map(|part| part.to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    });
    Ok(files)
}

fn read_failed(path: &Path, source: &std::io::Error) -> ContentCompileError {
    ContentCompileError::unlocated(
        ContentErrorCode::ReadFile,
        format!("failed to read: {source}"),
        path,
    )
}
