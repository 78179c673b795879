//! Print parameters of one sliced project.

use serde::{Deserialize, Serialize};

use super::units::{Ms, Nm};
use crate::profile::ExposureProfileId;

/// Layer index breakpoint that is never reached in practice.
pub const SLICE_NEVER: u32 = 9_999_998;

/// Parameters read from a project's configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Job name
    pub name: String,
    /// Number of layers in the project
    pub total_layers: u32,
    /// Layers budgeted as slow by the slicer
    pub layers_slow: u32,
    /// Resin the slicer expects the print to use
    pub used_material_ml: f32,

    /// Regular exposure time
    pub exposure_time: Ms,
    /// Exposure time of the first layers
    pub exposure_time_first: Ms,
    /// Exposure time after `slice2`
    pub exposure_time2: Option<Ms>,
    /// Exposure time after `slice3`
    pub exposure_time3: Option<Ms>,

    /// Regular layer height
    pub layer_height: Nm,
    /// Height of the first layer
    pub layer_height_first: Option<Nm>,
    /// Layer height after `slice2`
    pub layer_height2: Option<Nm>,
    /// Layer height after `slice3`
    pub layer_height3: Option<Nm>,

    /// Layers over which exposure fades from first to regular time
    pub fade_layers: u16,
    /// First layer number using the second height/time pair
    pub slice2: u32,
    /// First layer number using the third height/time pair
    pub slice3: u32,

    /// Exposure profile chosen for the print
    pub exposure_profile: ExposureProfileId,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            name: String::from("no project"),
            total_layers: 0,
            layers_slow: 0,
            used_material_ml: 0.0,
            exposure_time: Ms(8000),
            exposure_time_first: Ms(35000),
            exposure_time2: None,
            exposure_time3: None,
            layer_height: Nm(50_000),
            layer_height_first: None,
            layer_height2: None,
            layer_height3: None,
            fade_layers: 10,
            slice2: SLICE_NEVER,
            slice3: SLICE_NEVER + 1,
            exposure_profile: ExposureProfileId::Default,
        }
    }
}

impl ProjectConfig {
    /// Height of the first layer.
    pub fn first_layer_height(&self) -> Nm {
        self.layer_height_first.unwrap_or(self.layer_height)
    }

    /// Height/time pair used after `slice2`.
    pub fn second_pair(&self) -> (Nm, Ms) {
        (
            self.layer_height2.unwrap_or(self.layer_height),
            self.exposure_time2.unwrap_or(self.exposure_time),
        )
    }

    /// Height/time pair used after `slice3`.
    pub fn third_pair(&self) -> (Nm, Ms) {
        (
            self.layer_height3.unwrap_or(self.layer_height),
            self.exposure_time3.unwrap_or(self.exposure_time),
        )
    }

    /// Layers always printed with slow tear-off at the start of a print.
    pub fn first_slow_layers(&self) -> u32 {
        u32::from(self.fade_layers) + 3
    }
}
