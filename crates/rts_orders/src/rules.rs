//! Data-driven game rules.
//!
//! Tuning constants and per-type definitions, deserialized from RON.
//! Every field has a default so rule files only need to list overrides.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};
use crate::locomotor::LocomotorClass;
use crate::map::SpeedType;

/// Weapon definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WeaponRules {
    /// Damage per shot.
    pub damage: u32,
    /// Range in tiles.
    pub range: u32,
    /// Ticks between shots.
    pub cooldown: u32,
}

/// Unit type definition.
///
/// # Example RON
///
/// ```ron
/// UnitRules(
///     speed: 10,
///     locomotor: Foot,
///     speed_type: Foot,
///     infantry: true,
///     health: 100,
///     weapon: Some(WeaponRules(damage: 15, range: 4, cooldown: 20)),
/// )
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitRules {
    /// Base speed in leptons per tick.
    pub speed: u32,
    /// Movement class.
    pub locomotor: LocomotorClass,
    /// Terrain speed class.
    pub speed_type: SpeedType,
    /// Whether the unit is infantry.
    #[serde(default)]
    pub infantry: bool,
    /// Maximum health.
    pub health: u32,
    /// Weapon, if armed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weapon: Option<WeaponRules>,
    /// Building type the unit deploys into.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deploys_into: Option<String>,
    /// Ticks spent deploying.
    #[serde(default)]
    pub deploy_delay: u32,
    /// Unit can capture buildings.
    #[serde(default)]
    pub engineer: bool,
}

/// Building type definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildingRules {
    /// Footprint width in tiles.
    pub width: u32,
    /// Footprint height in tiles.
    pub height: u32,
    /// Maximum health.
    pub health: u32,
    /// Can be captured.
    #[serde(default)]
    pub capturable: bool,
    /// Accepts units for recycling.
    #[serde(default)]
    pub recycler: bool,
    /// Produces units.
    #[serde(default)]
    pub factory: bool,
}

/// Simulation rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Rules {
    /// Warp delay for jumps shorter than `chrono_range_minimum`.
    pub chrono_minimum_delay: u32,
    /// Jump distance in tiles below which the minimum delay applies.
    pub chrono_range_minimum: u32,
    /// Leptons of jump distance per tick of warp delay.
    pub chrono_distance_factor: u32,
    /// Hard limit on a move-aside attempt.
    pub move_aside_timeout_ticks: u32,
    /// Wait between move-aside rescans.
    pub move_aside_backoff_ticks: u32,
    /// Ticks a move waits on a blocker before repathing.
    pub move_blocked_wait_ticks: u32,
    /// Repaths before a blocked move gives up.
    pub move_max_repaths: u32,
    /// Ticks a factory exit spends clearing its ramp.
    pub factory_exit_clear_ticks: u32,
    /// Speed of panicked infantry, percent.
    pub panic_speed_percent: u32,
    /// Speed of prone infantry, percent.
    pub prone_speed_percent: u32,
    /// Unit types by name.
    pub unit_types: BTreeMap<String, UnitRules>,
    /// Building types by name.
    pub building_types: BTreeMap<String, BuildingRules>,
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            chrono_minimum_delay: 16,
            chrono_range_minimum: 15,
            chrono_distance_factor: 48,
            move_aside_timeout_ticks: 40,
            move_aside_backoff_ticks: 4,
            move_blocked_wait_ticks: 8,
            move_max_repaths: 3,
            factory_exit_clear_ticks: 10,
            panic_speed_percent: 150,
            prone_speed_percent: 50,
            unit_types: default_unit_types(),
            building_types: default_building_types(),
        }
    }
}

fn unit(speed: u32, locomotor: LocomotorClass, speed_type: SpeedType, health: u32) -> UnitRules {
    UnitRules {
        speed,
        locomotor,
        speed_type,
        infantry: false,
        health,
        weapon: None,
        deploys_into: None,
        deploy_delay: 0,
        engineer: false,
    }
}

fn default_unit_types() -> BTreeMap<String, UnitRules> {
    use LocomotorClass as L;
    use SpeedType as S;

    let mut types = BTreeMap::new();
    types.insert(
        "infantry".to_string(),
        UnitRules {
            infantry: true,
            weapon: Some(WeaponRules {
                damage: 15,
                range: 3,
                cooldown: 20,
            }),
            ..unit(10, L::Foot, S::Foot, 100)
        },
    );
    types.insert(
        "engineer".to_string(),
        UnitRules {
            infantry: true,
            engineer: true,
            ..unit(8, L::Foot, S::Foot, 75)
        },
    );
    types.insert(
        "tank".to_string(),
        UnitRules {
            weapon: Some(WeaponRules {
                damage: 40,
                range: 5,
                cooldown: 30,
            }),
            ..unit(14, L::Drive, S::Track, 400)
        },
    );
    types.insert("hovercraft".to_string(), unit(16, L::Hover, S::Hover, 300));
    types.insert(
        "jumpjet".to_string(),
        UnitRules {
            infantry: true,
            ..unit(18, L::Jumpjet, S::Winged, 120)
        },
    );
    types.insert("chrono".to_string(), unit(10, L::Chrono, S::Track, 350));
    types.insert("missile".to_string(), unit(40, L::Missile, S::Winged, 50));
    types.insert("aircraft".to_string(), unit(30, L::Winged, S::Winged, 200));
    types.insert(
        "mcv".to_string(),
        UnitRules {
            deploys_into: Some("construction_yard".to_string()),
            deploy_delay: 20,
            ..unit(8, L::Drive, S::Wheel, 1000)
        },
    );
    types
}

fn default_building_types() -> BTreeMap<String, BuildingRules> {
    let building = |width, height, health| BuildingRules {
        width,
        height,
        health,
        capturable: false,
        recycler: false,
        factory: false,
    };

    let mut types = BTreeMap::new();
    types.insert("construction_yard".to_string(), building(3, 3, 1000));
    types.insert(
        "war_factory".to_string(),
        BuildingRules {
            factory: true,
            ..building(3, 3, 1000)
        },
    );
    types.insert(
        "tech_outpost".to_string(),
        BuildingRules {
            capturable: true,
            ..building(2, 2, 500)
        },
    );
    types.insert(
        "recycler".to_string(),
        BuildingRules {
            recycler: true,
            ..building(2, 2, 800)
        },
    );
    types
}

impl Rules {
    /// Parse rules from a RON string.
    pub fn from_ron_str(ron: &str) -> Result<Self> {
        ron::from_str(ron).map_err(|e| SimError::DataParseError {
            path: "<string>".to_string(),
            message: e.to_string(),
        })
    }

    /// Load rules from a RON file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| SimError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        ron::from_str(&contents).map_err(|e| SimError::DataParseError {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }

    /// Look up a unit type.
    pub fn unit(&self, type_id: &str) -> Result<&UnitRules> {
        self.unit_types
            .get(type_id)
            .ok_or_else(|| SimError::UnknownUnitType(type_id.to_string()))
    }

    /// Look up a building type.
    pub fn building(&self, type_id: &str) -> Result<&BuildingRules> {
        self.building_types
            .get(type_id)
            .ok_or_else(|| SimError::UnknownBuildingType(type_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let rules = Rules::default();
        assert_eq!(rules.move_aside_timeout_ticks, 40);
        assert_eq!(rules.chrono_minimum_delay, 16);
        assert_eq!(rules.unit("tank").unwrap().locomotor, LocomotorClass::Drive);
        assert!(rules.building("war_factory").unwrap().factory);
    }

    #[test]
    fn test_partial_ron_overrides() {
        let rules =
            Rules::from_ron_str("(move_aside_timeout_ticks: 12, chrono_minimum_delay: 3)").unwrap();
        assert_eq!(rules.move_aside_timeout_ticks, 12);
        assert_eq!(rules.chrono_minimum_delay, 3);
        assert_eq!(rules.move_blocked_wait_ticks, 8);
    }

    #[test]
    fn test_unit_type_from_ron() {
        let ron = r#"(
            unit_types: {
                "scout": (
                    speed: 20,
                    locomotor: Drive,
                    speed_type: Wheel,
                    health: 90,
                    weapon: Some((damage: 5, range: 2, cooldown: 6)),
                ),
            },
        )"#;
        let rules = Rules::from_ron_str(ron).unwrap();
        let scout = rules.unit("scout").unwrap();
        assert_eq!(scout.speed, 20);
        assert_eq!(scout.weapon.map(|w| w.range), Some(2));
        assert!(rules.unit("tank").is_err());
    }

    #[test]
    fn test_unknown_types() {
        let rules = Rules::default();
        assert_eq!(
            rules.unit("dragon").unwrap_err(),
            SimError::UnknownUnitType("dragon".into())
        );
        assert!(matches!(
            rules.building("castle"),
            Err(SimError::UnknownBuildingType(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "(move_max_repaths: 7)").unwrap();
        let rules = Rules::load(file.path()).unwrap();
        assert_eq!(rules.move_max_repaths, 7);
    }

    #[test]
    fn test_parse_error() {
        let err = Rules::from_ron_str("(move_max_repaths: \"many\")").unwrap_err();
        assert!(matches!(err, SimError::DataParseError { .. }));
    }
}
