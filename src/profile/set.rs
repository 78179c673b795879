//! Ordered collections of named profiles.

use core::fmt;

use log::debug;

use crate::config::ConfigChange;
use crate::error::{bounded, ConfigError};

use super::single::{Level, ProfileFields, SingleProfile, MAX_FIELDS};

/// Maximum number of profiles in one set.
pub const MAX_PROFILES: usize = 8;

/// Typed identifier of a profile within its set.
///
/// The position in [`ProfileId::ALL`] is the controller slot index.
pub trait ProfileId: Copy + Eq + fmt::Debug + 'static {
    /// Every profile of the set, in declared order.
    const ALL: &'static [Self];

    /// Name used in profile files.
    fn name(self) -> &'static str;

    /// Slot index of the profile.
    fn index(self) -> u8 {
        Self::ALL.iter().position(|id| *id == self).unwrap_or(0) as u8
    }

    /// Look up a profile by slot index.
    fn from_index(idx: u8) -> Option<Self> {
        Self::ALL.get(usize::from(idx)).copied()
    }

    /// Look up a profile by name.
    fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| id.name() == name)
    }
}

/// A profile set contract: which profiles exist and which fields they carry.
pub trait ProfileKind: 'static {
    /// Set name, used in logs and change records.
    const NAME: &'static str;
    /// Profile identifiers.
    type Id: ProfileId;
    /// Field contract shared by all profiles of the set.
    type Fields: ProfileFields;

    /// Fails the build for a set with more than [`MAX_PROFILES`] profiles.
    const FITS: () = assert!(
        <Self::Id as ProfileId>::ALL.len() <= MAX_PROFILES,
        "profile set larger than MAX_PROFILES"
    );

    /// Compiled-in values of one profile, in field order.
    fn defaults(id: Self::Id) -> &'static [i32];
}

/// Ordered, named profiles of one kind.
pub struct ProfileSet<K: ProfileKind> {
    profiles: heapless::Vec<SingleProfile<K::Fields>, MAX_PROFILES>,
}

impl<K: ProfileKind> ProfileSet<K> {
    /// Create a set holding only the compiled-in defaults.
    pub fn new() -> Self {
        let () = K::FITS;
        let mut profiles = heapless::Vec::new();
        for id in K::Id::ALL {
            // Capacity checked by ProfileKind::FITS.
            let _ = profiles.push(SingleProfile::new(id.name(), id.index(), K::defaults(*id)));
        }
        Self { profiles }
    }

    /// Set name.
    #[inline]
    pub fn name(&self) -> &'static str {
        K::NAME
    }

    /// Profile by identifier.
    pub fn profile(&self, id: K::Id) -> &SingleProfile<K::Fields> {
        &self.profiles[usize::from(id.index())]
    }

    /// Mutable profile by identifier.
    pub fn profile_mut(&mut self, id: K::Id) -> &mut SingleProfile<K::Fields> {
        &mut self.profiles[usize::from(id.index())]
    }

    /// Profile by name.
    pub fn by_name(&self, name: &str) -> Option<&SingleProfile<K::Fields>> {
        K::Id::from_name(name).map(|id| self.profile(id))
    }

    /// Profile by controller slot index.
    pub fn by_index(&self, idx: u8) -> Option<&SingleProfile<K::Fields>> {
        self.profiles.get(usize::from(idx))
    }

    /// Profiles in declared order.
    pub fn iter(&self) -> impl Iterator<Item = &SingleProfile<K::Fields>> {
        self.profiles.iter()
    }

    /// Number of profiles.
    #[inline]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// True for a set without profiles.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// True if any profile carries factory values.
    pub fn is_modified(&self) -> bool {
        self.profiles.iter().any(SingleProfile::is_modified)
    }

    /// Check that every profile has every value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for profile in self.profiles.iter() {
            profile.dump()?;
        }
        Ok(())
    }

    /// Drop user values; with `propagate` also drop factory values.
    pub fn factory_reset(&mut self, propagate: bool) {
        debug!("{}: factory reset (propagate: {})", K::NAME, propagate);
        for profile in self.profiles.iter_mut() {
            profile.clear(Level::User);
            if propagate {
                profile.clear(Level::Factory);
            }
        }
    }

    /// Start a batch of changes to one profile.
    pub fn writer(&mut self, id: K::Id) -> ProfileWriter<'_, K> {
        ProfileWriter {
            set: self,
            id,
            pending: heapless::Vec::new(),
        }
    }
}

impl<K: ProfileKind> Default for ProfileSet<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: ProfileKind> Clone for ProfileSet<K> {
    fn clone(&self) -> Self {
        Self {
            profiles: self.profiles.clone(),
        }
    }
}

impl<K: ProfileKind> fmt::Debug for ProfileSet<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for profile in self.profiles.iter() {
            map.entry(&profile.name(), profile);
        }
        map.finish()
    }
}

impl<'a, K: ProfileKind> IntoIterator for &'a ProfileSet<K> {
    type Item = &'a SingleProfile<K::Fields>;
    type IntoIter = core::slice::Iter<'a, SingleProfile<K::Fields>>;

    fn into_iter(self) -> Self::IntoIter {
        self.profiles.iter()
    }
}

/// Batched changes to one profile, applied together by [`ProfileWriter::commit`].
pub struct ProfileWriter<'a, K: ProfileKind> {
    set: &'a mut ProfileSet<K>,
    id: K::Id,
    pending: heapless::Vec<(usize, i32), MAX_FIELDS>,
}

impl<K: ProfileKind> ProfileWriter<'_, K> {
    /// Stage a new value. Later values for the same field replace earlier ones.
    ///
    /// # Errors
    ///
    /// `UnknownField` or `ValueOutOfRange`; nothing is staged in that case.
    pub fn set(&mut self, field: &str, value: i32) -> Result<&mut Self, ConfigError> {
        let index =
            <K::Fields as ProfileFields>::index_of(field).ok_or_else(|| ConfigError::UnknownField {
                profile: bounded(self.id.name()),
                field: bounded(field),
            })?;
        <K::Fields as ProfileFields>::FIELDS[index].check(value)?;
        match self.pending.iter_mut().find(|(i, _)| *i == index) {
            Some(entry) => entry.1 = value,
            None => {
                // One entry per field; capacity checked by ProfileFields::FITS.
                let _ = self.pending.push((index, value));
            }
        }
        Ok(self)
    }

    /// Number of staged changes.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// True if nothing is staged.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Apply all staged values to `level` and report what changed.
    ///
    /// Persisting the set is a separate step.
    pub fn commit(self, level: Level) -> Vec<ConfigChange> {
        let profile = self.set.profile_mut(self.id);
        let mut changes = Vec::with_capacity(self.pending.len());
        for (index, value) in self.pending {
            let old = profile.get_at(index);
            // Range was checked when staging.
            let _ = profile.set_at(level, index, value);
            let new = profile.get_at(index);
            if old != new {
                changes.push(ConfigChange {
                    scope: K::NAME,
                    target: self.id.name(),
                    field: <K::Fields as ProfileFields>::FIELDS[index].name,
                    old,
                    new,
                });
            }
        }
        debug!(
            "{}: committed {} change(s) to {}",
            K::NAME,
            changes.len(),
            self.id.name()
        );
        changes
    }
}
