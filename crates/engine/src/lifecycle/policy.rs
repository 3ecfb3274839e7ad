use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::world::{Category, Scope};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetStrategy {
    /// Kept alive; moved back to its spawn point and restored.
    PositionReset,
    /// Destroyed and recreated from the map's spawn data.
    FullReload,
    /// Destroyed; producers repopulate it during play.
    ClearOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyEntry {
    pub category: Category,
    pub strategy: ResetStrategy,
    #[serde(default)]
    pub expect_populated: bool,
}

impl PolicyEntry {
    pub fn new(category: Category, strategy: ResetStrategy) -> Self {
        Self {
            category,
            strategy,
            expect_populated: false,
        }
    }

    pub fn populated(mut self) -> Self {
        self.expect_populated = true;
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("category {category} has no reset strategy")]
    UnmappedCategory { category: Category },
    #[error("category {category} is mapped more than once")]
    DuplicateCategory { category: Category },
    #[error("persistent category {category} must use position_reset, found {strategy:?}")]
    PersistentNotPreserved {
        category: Category,
        strategy: ResetStrategy,
    },
    #[error("invalid value at {path}: {message}")]
    InvalidValue { path: String, message: String },
    #[error("failed to read lifecycle config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse lifecycle config {path} at {json_path}: {source}")]
    Parse {
        path: PathBuf,
        json_path: String,
        #[source]
        source: serde_json::Error,
    },
}

/// On-disk shape of the lifecycle table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LifecycleConfig {
    pub policies: Vec<PolicyEntry>,
    #[serde(default)]
    pub spawn_exclusion_radius: Option<f32>,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            policies: vec![
                PolicyEntry::new(Category::Player, ResetStrategy::PositionReset),
                PolicyEntry::new(Category::Camera, ResetStrategy::PositionReset),
                PolicyEntry::new(Category::Hud, ResetStrategy::PositionReset),
                PolicyEntry::new(Category::Enemy, ResetStrategy::FullReload).populated(),
                PolicyEntry::new(Category::Car, ResetStrategy::FullReload).populated(),
                PolicyEntry::new(Category::Chest, ResetStrategy::FullReload),
                PolicyEntry::new(Category::Projectile, ResetStrategy::ClearOnly),
            ],
            spawn_exclusion_radius: None,
        }
    }
}

impl LifecycleConfig {
    pub fn from_json_str(raw: &str, path: &Path) -> Result<Self, ConfigError> {
        let mut deserializer = serde_json::Deserializer::from_str(raw);
        serde_path_to_error::deserialize::<_, LifecycleConfig>(&mut deserializer).map_err(
            |error| {
                let json_path = error.path().to_string();
                ConfigError::Parse {
                    path: path.to_path_buf(),
                    json_path,
                    source: error.into_inner(),
                }
            },
        )
    }

    /// Reads `path`, falling back to the built-in table when the file does
    /// not exist.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        match fs::read_to_string(path) {
            Ok(raw) => Self::from_json_str(&raw, path),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn validate(self) -> Result<(LifecyclePolicy, ResetOptions), ConfigError> {
        let options = ResetOptions::new(self.spawn_exclusion_radius)?;
        let policy = LifecyclePolicy::from_entries(self.policies)?;
        Ok((policy, options))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ResetOptions {
    spawn_exclusion_radius: Option<f32>,
}

impl ResetOptions {
    pub fn new(spawn_exclusion_radius: Option<f32>) -> Result<Self, ConfigError> {
        if let Some(radius) = spawn_exclusion_radius {
            if !radius.is_finite() || radius < 0.0 {
                return Err(ConfigError::InvalidValue {
                    path: "spawn_exclusion_radius".to_string(),
                    message: format!("expected a finite number >= 0, got {radius}"),
                });
            }
        }
        Ok(Self {
            spawn_exclusion_radius,
        })
    }

    pub fn spawn_exclusion_radius(&self) -> Option<f32> {
        self.spawn_exclusion_radius
    }
}

/// Validated category -> strategy table. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LifecyclePolicy {
    table: BTreeMap<Category, PolicyEntry>,
}

impl LifecyclePolicy {
    pub fn from_entries(
        entries: impl IntoIterator<Item = PolicyEntry>,
    ) -> Result<Self, ConfigError> {
        let mut table = BTreeMap::new();
        for entry in entries {
            if table.insert(entry.category, entry).is_some() {
                return Err(ConfigError::DuplicateCategory {
                    category: entry.category,
                });
            }
        }

        for category in Category::ALL {
            let Some(entry) = table.get(&category) else {
                return Err(ConfigError::UnmappedCategory { category });
            };
            if category.scope() == Scope::Persistent
                && entry.strategy != ResetStrategy::PositionReset
            {
                return Err(ConfigError::PersistentNotPreserved {
                    category,
                    strategy: entry.strategy,
                });
            }
        }

        Ok(Self { table })
    }

    pub fn strategy_for(&self, category: Category) -> ResetStrategy {
        // Every category is present after `from_entries`.
        self.table
            .get(&category)
            .map_or(ResetStrategy::ClearOnly, |entry| entry.strategy)
    }

    pub fn expects_populated(&self, category: Category) -> bool {
        self.table
            .get(&category)
            .is_some_and(|entry| entry.expect_populated)
    }

    pub fn position_reset_order(&self) -> Vec<Category> {
        self.categories_with(ResetStrategy::PositionReset)
    }

    pub fn reload_order(&self) -> Vec<Category> {
        self.categories_with(ResetStrategy::FullReload)
    }

    /// Every destroyed category, transient ones first so nothing transient
    /// outlives the map-scoped entities it may point at.
    pub fn clear_order(&self) -> Vec<Category> {
        let mut order: Vec<Category> = Category::ALL
            .into_iter()
            .filter(|category| {
                matches!(
                    self.strategy_for(*category),
                    ResetStrategy::FullReload | ResetStrategy::ClearOnly
                )
            })
            .collect();
        order.sort_by_key(|category| match category.scope() {
            Scope::Transient => 0,
            Scope::MapScoped => 1,
            Scope::Persistent => 2,
        });
        order
    }

    fn categories_with(&self, strategy: ResetStrategy) -> Vec<Category> {
        Category::ALL
            .into_iter()
            .filter(|category| self.strategy_for(*category) == strategy)
            .collect()
    }
}
