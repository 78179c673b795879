//! A single named profile: ordered values with layered overrides.

use core::fmt;
use core::marker::PhantomData;

use crate::error::{bounded, ConfigError};

/// Maximum number of fields in one profile contract.
pub const MAX_FIELDS: usize = 20;

/// Ordered values of one profile, as written to the controller.
pub type ProfileValues = heapless::Vec<i32, MAX_FIELDS>;

/// Description of one profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    /// Field name as used in profile files
    pub name: &'static str,
    /// Smallest accepted value
    pub min: i32,
    /// Largest accepted value
    pub max: i32,
}

impl FieldSpec {
    /// Create a field description.
    pub const fn new(name: &'static str, min: i32, max: i32) -> Self {
        Self { name, min, max }
    }

    /// Check `value` against the allowed range.
    pub fn check(&self, value: i32) -> Result<(), ConfigError> {
        if value < self.min || value > self.max {
            return Err(ConfigError::ValueOutOfRange {
                field: bounded(self.name),
                value: i64::from(value),
                min: i64::from(self.min),
                max: i64::from(self.max),
            });
        }
        Ok(())
    }
}

/// A fixed, ordered field contract.
///
/// The order of [`ProfileFields::FIELDS`] is the order values are transmitted
/// to the motion controller and must never change for an existing contract.
pub trait ProfileFields: 'static {
    /// Ordered field list.
    const FIELDS: &'static [FieldSpec];

    /// Fails the build for a contract longer than [`MAX_FIELDS`].
    const FITS: () = assert!(
        Self::FIELDS.len() <= MAX_FIELDS,
        "profile contract longer than MAX_FIELDS"
    );

    /// Position of a field in the contract.
    fn index_of(name: &str) -> Option<usize> {
        Self::FIELDS.iter().position(|f| f.name == name)
    }
}

/// Value layer a setting belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Level {
    /// Compiled-in defaults and the default file
    Default,
    /// Protected factory storage
    Factory,
    /// User-editable storage
    User,
}

type Layer = heapless::Vec<Option<i32>, MAX_FIELDS>;

fn empty_layer(len: usize) -> Layer {
    let mut layer = Layer::new();
    for _ in 0..len.min(MAX_FIELDS) {
        // Capacity checked by ProfileFields::FITS.
        let _ = layer.push(None);
    }
    layer
}

/// One named profile of a profile set.
///
/// The effective value of a field is taken from the highest layer that has
/// one: user, then factory, then default.
pub struct SingleProfile<F: ProfileFields> {
    name: &'static str,
    idx: u8,
    defaults: Layer,
    factory: Layer,
    user: Layer,
    _fields: PhantomData<F>,
}

impl<F: ProfileFields> SingleProfile<F> {
    /// Create a profile with the given compiled-in defaults.
    ///
    /// `defaults` may be shorter than the contract; missing values stay unset.
    pub fn new(name: &'static str, idx: u8, defaults: &[i32]) -> Self {
        let () = F::FITS;
        let len = F::FIELDS.len();
        let mut layer = empty_layer(len);
        for (slot, value) in layer.iter_mut().zip(defaults.iter()) {
            *slot = Some(*value);
        }
        Self {
            name,
            idx,
            defaults: layer,
            factory: empty_layer(len),
            user: empty_layer(len),
            _fields: PhantomData,
        }
    }

    /// Profile name.
    #[inline]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Controller slot index.
    #[inline]
    pub fn idx(&self) -> u8 {
        self.idx
    }

    /// Effective value of the field at `index`.
    pub fn get_at(&self, index: usize) -> Option<i32> {
        self.user
            .get(index)
            .copied()
            .flatten()
            .or_else(|| self.factory.get(index).copied().flatten())
            .or_else(|| self.defaults.get(index).copied().flatten())
    }

    /// Effective value of a field, `None` if unknown or unset.
    pub fn get(&self, field: &str) -> Option<i32> {
        F::index_of(field).and_then(|i| self.get_at(i))
    }

    /// Effective value of a field.
    ///
    /// # Errors
    ///
    /// `UnknownField` if the contract has no such field, `MissingValue` if
    /// no layer provides a value.
    pub fn value(&self, field: &str) -> Result<i32, ConfigError> {
        let index = F::index_of(field).ok_or_else(|| ConfigError::UnknownField {
            profile: bounded(self.name),
            field: bounded(field),
        })?;
        self.get_at(index).ok_or_else(|| self.missing(index))
    }

    /// Value stored in one layer only.
    pub fn layer_value(&self, level: Level, index: usize) -> Option<i32> {
        self.layer(level).get(index).copied().flatten()
    }

    /// Effective value of a field without `level` and the layers above it.
    ///
    /// This is what a field falls back to when `level` drops its value.
    pub fn value_below(&self, level: Level, index: usize) -> Option<i32> {
        match level {
            Level::Default => None,
            Level::Factory => self.layer_value(Level::Default, index),
            Level::User => self
                .layer_value(Level::Factory, index)
                .or_else(|| self.layer_value(Level::Default, index)),
        }
    }

    /// Ordered effective values.
    ///
    /// # Errors
    ///
    /// `MissingValue` for the first field without a value.
    pub fn dump(&self) -> Result<ProfileValues, ConfigError> {
        let mut values = ProfileValues::new();
        for index in 0..F::FIELDS.len() {
            let value = self.get_at(index).ok_or_else(|| self.missing(index))?;
            // Capacity checked by ProfileFields::FITS.
            let _ = values.push(value);
        }
        Ok(values)
    }

    /// True if every field has a value.
    pub fn is_complete(&self) -> bool {
        (0..F::FIELDS.len()).all(|i| self.get_at(i).is_some())
    }

    /// True if any factory value is set.
    pub fn is_modified(&self) -> bool {
        self.factory.iter().any(Option::is_some)
    }

    /// Set a field in one layer after a range check.
    pub fn set(&mut self, level: Level, field: &str, value: i32) -> Result<(), ConfigError> {
        let index = F::index_of(field).ok_or_else(|| ConfigError::UnknownField {
            profile: bounded(self.name),
            field: bounded(field),
        })?;
        self.set_at(level, index, value)
    }

    pub(crate) fn set_at(&mut self, level: Level, index: usize, value: i32) -> Result<(), ConfigError> {
        F::FIELDS[index].check(value)?;
        if let Some(slot) = self.layer_mut(level).get_mut(index) {
            *slot = Some(value);
        }
        Ok(())
    }

    /// Drop every value of one layer.
    pub fn clear(&mut self, level: Level) {
        for slot in self.layer_mut(level).iter_mut() {
            *slot = None;
        }
    }

    fn layer(&self, level: Level) -> &Layer {
        match level {
            Level::Default => &self.defaults,
            Level::Factory => &self.factory,
            Level::User => &self.user,
        }
    }

    fn layer_mut(&mut self, level: Level) -> &mut Layer {
        match level {
            Level::Default => &mut self.defaults,
            Level::Factory => &mut self.factory,
            Level::User => &mut self.user,
        }
    }

    fn missing(&self, index: usize) -> ConfigError {
        ConfigError::MissingValue {
            profile: bounded(self.name),
            field: bounded(F::FIELDS[index].name),
        }
    }
}

impl<F: ProfileFields> Clone for SingleProfile<F> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            idx: self.idx,
            defaults: self.defaults.clone(),
            factory: self.factory.clone(),
            user: self.user.clone(),
            _fields: PhantomData,
        }
    }
}

/// Profiles compare by their effective values.
impl<F: ProfileFields> PartialEq for SingleProfile<F> {
    fn eq(&self, other: &Self) -> bool {
        (0..F::FIELDS.len()).all(|i| self.get_at(i) == other.get_at(i))
    }
}

impl<F: ProfileFields> fmt::Debug for SingleProfile<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (i, spec) in F::FIELDS.iter().enumerate() {
            map.entry(&spec.name, &self.get_at(i));
        }
        map.finish()
    }
}
