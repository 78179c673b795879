//! Read-only layer records of a sliced project.

use crate::config::units::{Ms, Nm};
use crate::config::{validate_project_config, ProjectConfig};
use crate::error::{ExposureError, Result};

use super::layers::LayerPlanner;

/// Fewest layers a project may have.
pub const MIN_LAYERS: usize = 1;

/// One layer of a project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayer {
    /// Image of the layer inside the project archive
    pub image: String,
    /// Tower step before the layer
    pub height: Nm,
    /// Planned exposure time
    pub etime: Ms,
}

/// Ordered layers plus the project parameters they came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Project {
    config: ProjectConfig,
    planner: LayerPlanner,
    layers: Vec<ProjectLayer>,
}

impl Project {
    /// Project with generated image names (`<name>00000.png`, ...).
    pub fn new(config: ProjectConfig) -> Self {
        let images = (0..config.total_layers)
            .map(|i| format!("{}{:05}.png", config.name, i))
            .collect();
        Self::with_images(config, images)
    }

    /// Project with explicit layer images; the image count wins over
    /// `total_layers`.
    pub fn with_images(mut config: ProjectConfig, images: Vec<String>) -> Self {
        config.total_layers = images.len() as u32;
        let planner = LayerPlanner::new(&config);
        let layers = images
            .into_iter()
            .enumerate()
            .map(|(i, image)| {
                let plan = planner.plan(i as u32);
                ProjectLayer {
                    image,
                    height: plan.height,
                    etime: plan.etime,
                }
            })
            .collect();
        Self {
            config,
            planner,
            layers,
        }
    }

    /// Check that the project can be printed.
    ///
    /// # Errors
    ///
    /// `NotEnoughLayers` or the parameter validation error.
    pub fn validate(&self) -> Result<()> {
        if self.layers.len() < MIN_LAYERS {
            return Err(ExposureError::NotEnoughLayers(self.layers.len()).into());
        }
        validate_project_config(&self.config)
    }

    /// Project parameters.
    #[inline]
    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    /// Job name.
    #[inline]
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Layer planner of the project.
    #[inline]
    pub fn planner(&self) -> &LayerPlanner {
        &self.planner
    }

    /// All layers in print order.
    pub fn layers(&self) -> &[ProjectLayer] {
        &self.layers
    }

    /// Layer by index.
    pub fn layer(&self, index: u32) -> Option<&ProjectLayer> {
        self.layers.get(index as usize)
    }

    /// Number of layers.
    #[inline]
    pub fn total_layers(&self) -> u32 {
        self.layers.len() as u32
    }

    /// Height of the finished print.
    pub fn total_height(&self) -> Nm {
        self.layers.iter().fold(Nm::ZERO, |acc, l| acc + l.height)
    }
}
