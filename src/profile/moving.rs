//! Motor driver moving profiles of the tower and tilt axes.

use super::set::{ProfileId, ProfileKind};
use super::single::{FieldSpec, ProfileFields};

/// Driver parameters of one moving profile, in controller order.
pub struct MovingFields;

impl ProfileFields for MovingFields {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("starting_steprate", 0, 22_000),
        FieldSpec::new("maximum_steprate", 0, 22_000),
        FieldSpec::new("acceleration", 0, 800),
        FieldSpec::new("deceleration", 0, 800),
        FieldSpec::new("current", 0, 63),
        FieldSpec::new("stallguard_threshold", -128, 127),
        FieldSpec::new("coolstep_threshold", 0, 10_000),
    ];
}

/// Index of the `current` field.
pub const CURRENT_FIELD: usize = 4;
/// Index of the `stallguard_threshold` field.
pub const STALLGUARD_FIELD: usize = 5;

/// Tilt moving profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TiltProfileId {
    /// Fast approach to the endstop
    HomingFast,
    /// Slow final approach to the endstop
    HomingSlow,
    /// Fast travel
    MoveFast,
    /// Slow travel
    MoveSlow,
    /// Slow move during layer change
    LayerMoveSlow,
    /// Peeling off a layer; also used to free a stuck tank
    LayerRelease,
    /// Fast move during layer change
    LayerMoveFast,
    /// Very slow move for viscous resin
    SuperSlow,
}

impl ProfileId for TiltProfileId {
    const ALL: &'static [Self] = &[
        Self::HomingFast,
        Self::HomingSlow,
        Self::MoveFast,
        Self::MoveSlow,
        Self::LayerMoveSlow,
        Self::LayerRelease,
        Self::LayerMoveFast,
        Self::SuperSlow,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::HomingFast => "homingFast",
            Self::HomingSlow => "homingSlow",
            Self::MoveFast => "moveFast",
            Self::MoveSlow => "moveSlow",
            Self::LayerMoveSlow => "layerMoveSlow",
            Self::LayerRelease => "layerRelease",
            Self::LayerMoveFast => "layerMoveFast",
            Self::SuperSlow => "superSlow",
        }
    }
}

/// Tower moving profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TowerProfileId {
    /// Fast approach to the endstop
    HomingFast,
    /// Slow final approach to the endstop
    HomingSlow,
    /// Fast travel
    MoveFast,
    /// Slow travel
    MoveSlow,
    /// Layer step
    Layer,
    /// Travel during layer change
    LayerMove,
    /// Very slow move for viscous resin
    SuperSlow,
    /// Probing the resin level
    ResinSensor,
}

impl ProfileId for TowerProfileId {
    const ALL: &'static [Self] = &[
        Self::HomingFast,
        Self::HomingSlow,
        Self::MoveFast,
        Self::MoveSlow,
        Self::Layer,
        Self::LayerMove,
        Self::SuperSlow,
        Self::ResinSensor,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::HomingFast => "homingFast",
            Self::HomingSlow => "homingSlow",
            Self::MoveFast => "moveFast",
            Self::MoveSlow => "moveSlow",
            Self::Layer => "layer",
            Self::LayerMove => "layerMove",
            Self::SuperSlow => "superSlow",
            Self::ResinSensor => "resinSensor",
        }
    }
}

/// Tilt moving profile set.
pub struct TiltMovingProfiles;

impl ProfileKind for TiltMovingProfiles {
    const NAME: &'static str = "tilt moving profiles";
    type Id = TiltProfileId;
    type Fields = MovingFields;

    fn defaults(id: TiltProfileId) -> &'static [i32] {
        match id {
            TiltProfileId::HomingFast => &[2560, 3200, 128, 128, 20, 7, 1500],
            TiltProfileId::HomingSlow => &[400, 1500, 64, 64, 16, 7, 0],
            TiltProfileId::MoveFast => &[1200, 6000, 250, 250, 44, 63, 2000],
            TiltProfileId::MoveSlow => &[1200, 1800, 12, 80, 44, 63, 2200],
            TiltProfileId::LayerMoveSlow => &[1200, 1800, 8, 20, 44, 63, 2200],
            TiltProfileId::LayerRelease => &[1200, 1800, 8, 20, 63, 63, 0],
            TiltProfileId::LayerMoveFast => &[1200, 6000, 250, 250, 44, 63, 2000],
            TiltProfileId::SuperSlow => &[400, 800, 4, 4, 44, 63, 2200],
        }
    }
}

/// Tower moving profile set.
pub struct TowerMovingProfiles;

impl ProfileKind for TowerMovingProfiles {
    const NAME: &'static str = "tower moving profiles";
    type Id = TowerProfileId;
    type Fields = MovingFields;

    fn defaults(id: TowerProfileId) -> &'static [i32] {
        match id {
            TowerProfileId::HomingFast => &[2250, 6000, 600, 600, 22, 4, 1500],
            TowerProfileId::HomingSlow => &[1000, 1500, 100, 100, 16, 1, 0],
            TowerProfileId::MoveFast => &[2250, 12_000, 250, 150, 32, 13, 1400],
            TowerProfileId::MoveSlow => &[2250, 2750, 250, 150, 32, 13, 1400],
            TowerProfileId::Layer => &[500, 2000, 80, 80, 32, 13, 1400],
            TowerProfileId::LayerMove => &[2250, 6000, 250, 150, 32, 13, 1400],
            TowerProfileId::SuperSlow => &[500, 1000, 20, 20, 32, 13, 1400],
            TowerProfileId::ResinSensor => &[1000, 1500, 100, 100, 22, 4, 1200],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileSet;

    #[test]
    fn test_compiled_defaults_are_complete() {
        assert!(ProfileSet::<TiltMovingProfiles>::new().validate().is_ok());
        assert!(ProfileSet::<TowerMovingProfiles>::new().validate().is_ok());
    }

    #[test]
    fn test_field_indices() {
        assert_eq!(MovingFields::index_of("current"), Some(CURRENT_FIELD));
        assert_eq!(
            MovingFields::index_of("stallguard_threshold"),
            Some(STALLGUARD_FIELD)
        );
    }

    #[test]
    fn test_lookup_by_name() {
        assert_eq!(
            TowerProfileId::from_name("resinSensor"),
            Some(TowerProfileId::ResinSensor)
        );
        assert_eq!(TiltProfileId::from_name("reserved"), None);
    }
}
