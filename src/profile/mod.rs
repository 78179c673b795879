//! Named motion and tear-off profiles.
//!
//! A [`ProfileSet`] is an ordered collection of [`SingleProfile`]s sharing one
//! field contract. The order of profiles and fields is fixed: it is the slot
//! order and value order of the motion controller.

mod layer;
mod moving;
mod set;
mod single;
mod store;

pub use layer::{
    fill_profiles, ExposureFields, ExposureProfileId, ExposureProfiles, LayerChange, LayerFields,
    LayerProfileId, LayerProfiles, TiltMoveParams,
};
pub use moving::{
    MovingFields, TiltMovingProfiles, TiltProfileId, TowerMovingProfiles, TowerProfileId,
    CURRENT_FIELD, STALLGUARD_FIELD,
};
pub use set::{ProfileId, ProfileKind, ProfileSet, ProfileWriter, MAX_PROFILES};
pub use single::{FieldSpec, Level, ProfileFields, ProfileValues, SingleProfile, MAX_FIELDS};
pub use store::ProfileFiles;
