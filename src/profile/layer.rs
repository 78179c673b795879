//! Layer change (tear-off) profiles and the exposure profiles selecting them.
//!
//! Per-model differences in tear-off behaviour are plain data here: the same
//! [`LayerChange`] contract drives the choreography on every printer model.

use serde::{Deserialize, Serialize};

use crate::config::units::{Ms, Nm, Ustep};
use crate::error::{bounded, ConfigError};

use super::moving::{TiltProfileId, TowerProfileId};
use super::set::{ProfileId, ProfileKind};
use super::single::{FieldSpec, ProfileFields, SingleProfile};

/// Tear-off parameters of one layer change profile.
pub struct LayerFields;

impl ProfileFields for LayerFields {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("delay_before_exposure_ms", 0, 30_000),
        FieldSpec::new("delay_after_exposure_ms", 0, 30_000),
        FieldSpec::new("tower_hop_height_nm", 0, 100_000_000),
        FieldSpec::new("tower_profile", 0, 7),
        FieldSpec::new("use_tilt", 0, 1),
        FieldSpec::new("tilt_down_initial_profile", 0, 7),
        FieldSpec::new("tilt_down_offset_steps", 0, 10_000),
        FieldSpec::new("tilt_down_offset_delay_ms", 0, 20_000),
        FieldSpec::new("tilt_down_finish_profile", 0, 7),
        FieldSpec::new("tilt_down_cycles", 0, 10),
        FieldSpec::new("tilt_down_delay_ms", 0, 20_000),
        FieldSpec::new("tilt_up_initial_profile", 0, 7),
        FieldSpec::new("tilt_up_offset_steps", 0, 10_000),
        FieldSpec::new("tilt_up_offset_delay_ms", 0, 20_000),
        FieldSpec::new("tilt_up_finish_profile", 0, 7),
        FieldSpec::new("tilt_up_cycles", 0, 10),
        FieldSpec::new("tilt_up_delay_ms", 0, 20_000),
        FieldSpec::new("moves_time_ms", 0, 600_000),
    ];
}

/// Layer change profiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayerProfileId {
    /// Quickest tear-off
    SuperFast,
    /// Regular tear-off for small layers
    Fast,
    /// Regular tear-off for large layers
    Slow,
    /// Gentle tear-off for viscous resin
    SuperSlow,
}

impl ProfileId for LayerProfileId {
    const ALL: &'static [Self] = &[Self::SuperFast, Self::Fast, Self::Slow, Self::SuperSlow];

    fn name(self) -> &'static str {
        match self {
            Self::SuperFast => "super_fast",
            Self::Fast => "fast",
            Self::Slow => "slow",
            Self::SuperSlow => "super_slow",
        }
    }
}

/// Layer change profile set.
pub struct LayerProfiles;

impl ProfileKind for LayerProfiles {
    const NAME: &'static str = "layer change profiles";
    type Id = LayerProfileId;
    type Fields = LayerFields;

    // SL1 values; other models ship theirs as default files.
    fn defaults(id: LayerProfileId) -> &'static [i32] {
        match id {
            LayerProfileId::SuperFast => {
                &[0, 0, 0, 4, 1, 5, 0, 0, 4, 1, 0, 2, 400, 0, 5, 1, 0, 5000]
            }
            LayerProfileId::Fast => &[0, 0, 0, 4, 1, 5, 0, 0, 4, 1, 0, 2, 400, 0, 5, 1, 0, 5500],
            LayerProfileId::Slow => {
                &[0, 0, 0, 4, 1, 5, 650, 1000, 4, 1, 0, 2, 400, 0, 5, 1, 0, 8000]
            }
            LayerProfileId::SuperSlow => {
                &[0, 0, 0, 4, 1, 7, 2200, 0, 4, 1, 0, 4, 2200, 1000, 7, 1, 0, 16000]
            }
        }
    }
}

/// Field layout of an exposure profile.
pub struct ExposureFields;

impl ProfileFields for ExposureFields {
    const FIELDS: &'static [FieldSpec] = &[
        FieldSpec::new("small_fill_layer_profile", 0, 3),
        FieldSpec::new("large_fill_layer_profile", 0, 3),
    ];
}

/// Exposure profiles a project can choose from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureProfileId {
    /// Regular printing
    #[default]
    Default,
    /// Slow tear-off for every layer
    Safe,
    /// Gentlest tear-off for viscous resin
    HighViscosity,
}

impl ProfileId for ExposureProfileId {
    const ALL: &'static [Self] = &[Self::Default, Self::Safe, Self::HighViscosity];

    fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Safe => "safe",
            Self::HighViscosity => "high_viscosity",
        }
    }
}

/// Exposure profile set.
pub struct ExposureProfiles;

impl ProfileKind for ExposureProfiles {
    const NAME: &'static str = "exposure profiles";
    type Id = ExposureProfileId;
    type Fields = ExposureFields;

    fn defaults(id: ExposureProfileId) -> &'static [i32] {
        match id {
            ExposureProfileId::Default => &[1, 2],
            ExposureProfileId::Safe => &[2, 2],
            ExposureProfileId::HighViscosity => &[3, 3],
        }
    }
}

/// Layer profiles chosen for small and large layers.
pub fn fill_profiles(
    profile: &SingleProfile<ExposureFields>,
) -> Result<(LayerProfileId, LayerProfileId), ConfigError> {
    Ok((
        layer_id(profile, "small_fill_layer_profile")?,
        layer_id(profile, "large_fill_layer_profile")?,
    ))
}

fn layer_id(
    profile: &SingleProfile<ExposureFields>,
    field: &str,
) -> Result<LayerProfileId, ConfigError> {
    let value = profile.value(field)?;
    u8::try_from(value)
        .ok()
        .and_then(LayerProfileId::from_index)
        .ok_or_else(|| out_of_range(field, value, 3))
}

/// One phase (down or up) of a tilt tear-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TiltMoveParams {
    /// Profile of the offset move
    pub initial_profile: TiltProfileId,
    /// Length of the offset move, zero skips it
    pub offset: Ustep,
    /// Wait after the offset move
    pub offset_delay: Ms,
    /// Profile of the remaining moves
    pub finish_profile: TiltProfileId,
    /// Number of equal parts the remaining distance is split into
    pub cycles: u8,
    /// Wait after each part
    pub delay: Ms,
}

/// Typed view of a layer change profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LayerChange {
    /// Wait between tear-off and exposure
    pub delay_before_exposure: Ms,
    /// Wait between exposure and tear-off
    pub delay_after_exposure: Ms,
    /// Extra tower lift during layer change
    pub tower_hop_height: Nm,
    /// Tower profile for layer moves
    pub tower_profile: TowerProfileId,
    /// Tear off with the tilt
    pub use_tilt: bool,
    /// Tilt down phase
    pub tilt_down: TiltMoveParams,
    /// Tilt up phase
    pub tilt_up: TiltMoveParams,
    /// Expected duration of all layer change moves
    pub moves_time: Ms,
}

impl LayerChange {
    /// Read a complete layer change profile.
    ///
    /// # Errors
    ///
    /// `MissingValue` if the profile is incomplete.
    pub fn from_profile(profile: &SingleProfile<LayerFields>) -> Result<Self, ConfigError> {
        let tower_profile = profile.value("tower_profile")?;
        Ok(Self {
            delay_before_exposure: ms(profile, "delay_before_exposure_ms")?,
            delay_after_exposure: ms(profile, "delay_after_exposure_ms")?,
            tower_hop_height: Nm(i64::from(profile.value("tower_hop_height_nm")?)),
            tower_profile: u8::try_from(tower_profile)
                .ok()
                .and_then(TowerProfileId::from_index)
                .ok_or_else(|| out_of_range("tower_profile", tower_profile, 7))?,
            use_tilt: profile.value("use_tilt")? != 0,
            tilt_down: tilt_phase(profile, "tilt_down")?,
            tilt_up: tilt_phase(profile, "tilt_up")?,
            moves_time: ms(profile, "moves_time_ms")?,
        })
    }
}

fn tilt_phase(
    profile: &SingleProfile<LayerFields>,
    prefix: &str,
) -> Result<TiltMoveParams, ConfigError> {
    let field = |suffix: &str| -> heapless::String<48> {
        let mut name = heapless::String::new();
        let _ = name.push_str(prefix);
        let _ = name.push_str(suffix);
        name
    };
    Ok(TiltMoveParams {
        initial_profile: tilt_id(profile, &field("_initial_profile"))?,
        offset: Ustep(profile.value(&field("_offset_steps"))?),
        offset_delay: ms(profile, &field("_offset_delay_ms"))?,
        finish_profile: tilt_id(profile, &field("_finish_profile"))?,
        cycles: profile.value(&field("_cycles"))?.clamp(0, 10) as u8,
        delay: ms(profile, &field("_delay_ms"))?,
    })
}

fn tilt_id(profile: &SingleProfile<LayerFields>, field: &str) -> Result<TiltProfileId, ConfigError> {
    let value = profile.value(field)?;
    u8::try_from(value)
        .ok()
        .and_then(TiltProfileId::from_index)
        .ok_or_else(|| out_of_range(field, value, 7))
}

fn ms(profile: &SingleProfile<LayerFields>, field: &str) -> Result<Ms, ConfigError> {
    Ok(Ms(profile.value(field)?.max(0) as u32))
}

fn out_of_range(field: &str, value: i32, max: i64) -> ConfigError {
    ConfigError::ValueOutOfRange {
        field: bounded(field),
        value: i64::from(value),
        min: 0,
        max,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::profile::ProfileSet;

    #[test]
    fn test_slow_profile_view() {
        let set = ProfileSet::<LayerProfiles>::new();
        let slow = LayerChange::from_profile(set.profile(LayerProfileId::Slow)).unwrap();

        assert!(slow.use_tilt);
        assert_eq!(slow.tower_profile, TowerProfileId::Layer);
        assert_eq!(slow.tilt_down.initial_profile, TiltProfileId::LayerRelease);
        assert_eq!(slow.tilt_down.offset, Ustep(650));
        assert_eq!(slow.tilt_down.offset_delay, Ms(1000));
        assert_eq!(slow.tilt_down.finish_profile, TiltProfileId::LayerMoveSlow);
        assert_eq!(slow.tilt_up.initial_profile, TiltProfileId::MoveFast);
        assert_eq!(slow.tilt_up.offset, Ustep(400));
        assert_eq!(slow.moves_time, Ms(8000));
    }

    #[test]
    fn test_exposure_profile_selection() {
        let set = ProfileSet::<ExposureProfiles>::new();
        assert_eq!(
            fill_profiles(set.profile(ExposureProfileId::Default)).unwrap(),
            (LayerProfileId::Fast, LayerProfileId::Slow)
        );
        assert_eq!(
            fill_profiles(set.profile(ExposureProfileId::HighViscosity)).unwrap(),
            (LayerProfileId::SuperSlow, LayerProfileId::SuperSlow)
        );
    }

    #[test]
    fn test_compiled_layer_defaults_complete() {
        assert!(ProfileSet::<LayerProfiles>::new().validate().is_ok());
        assert!(ProfileSet::<ExposureProfiles>::new().validate().is_ok());
    }
}
