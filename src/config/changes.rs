//! Typed change records and subscriber fan-out.
//!
//! Mutating configuration produces [`ConfigChange`] records; a [`ChangeBus`]
//! hands them to whoever subscribed to the changed field. Persisting the new
//! values is a separate, explicit step.

/// One changed configuration value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigChange {
    /// Owning configuration, e.g. the profile set name
    pub scope: &'static str,
    /// Profile or section name
    pub target: &'static str,
    /// Field name
    pub field: &'static str,
    /// Effective value before the change
    pub old: Option<i32>,
    /// Effective value after the change
    pub new: Option<i32>,
}

type Callback = Box<dyn FnMut(&ConfigChange) + Send>;

/// Delivers change records to subscribers by field name.
#[derive(Default)]
pub struct ChangeBus {
    subscribers: Vec<(Option<&'static str>, Callback)>,
}

impl ChangeBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe to changes of one field, in any scope.
    pub fn subscribe<F>(&mut self, field: &'static str, callback: F)
    where
        F: FnMut(&ConfigChange) + Send + 'static,
    {
        self.subscribers.push((Some(field), Box::new(callback)));
    }

    /// Subscribe to every change.
    pub fn subscribe_all<F>(&mut self, callback: F)
    where
        F: FnMut(&ConfigChange) + Send + 'static,
    {
        self.subscribers.push((None, Box::new(callback)));
    }

    /// Deliver `changes` in order. Returns the number of deliveries made.
    pub fn publish(&mut self, changes: &[ConfigChange]) -> usize {
        let mut delivered = 0;
        for change in changes {
            for (filter, callback) in self.subscribers.iter_mut() {
                if filter.map_or(true, |field| field == change.field) {
                    callback(change);
                    delivered += 1;
                }
            }
        }
        delivered
    }
}

impl core::fmt::Debug for ChangeBus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ChangeBus")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn change(field: &'static str) -> ConfigChange {
        ConfigChange {
            scope: "tilt",
            target: "homingFast",
            field,
            old: Some(1),
            new: Some(2),
        }
    }

    #[test]
    fn test_field_filter() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let mut bus = ChangeBus::new();
        let sink = Arc::clone(&seen);
        bus.subscribe("current", move |c| sink.lock().unwrap().push(c.field));

        let delivered = bus.publish(&[change("current"), change("acceleration")]);

        assert_eq!(delivered, 1);
        assert_eq!(*seen.lock().unwrap(), vec!["current"]);
    }

    #[test]
    fn test_subscribe_all() {
        let count = Arc::new(Mutex::new(0));
        let mut bus = ChangeBus::new();
        let sink = Arc::clone(&count);
        bus.subscribe_all(move |_| *sink.lock().unwrap() += 1);

        bus.publish(&[change("current"), change("acceleration")]);

        assert_eq!(*count.lock().unwrap(), 2);
    }
}
