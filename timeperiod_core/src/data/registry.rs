use std::collections::HashMap;

use tracing::debug;

use super::timeperiod::TimePeriod;
use crate::{config::SearchSettings, error::ConfigError};

/// A handle to a time period stored in a `Registry`.
///
/// IDs are only meaningful for the registry that handed them out.
#[derive(Debug, PartialEq, Eq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct TimePeriodId(usize);

/// A stored time period along with the IDs of the periods it excludes.
#[derive(Debug, Clone, Copy)]
pub struct Entry<'a> {
    pub period: &'a TimePeriod,
    pub excluded: &'a [TimePeriodId],
}

/// The set of all time periods of one configuration, addressable by name.
///
/// Exclusions between time periods are plain names; the registry is what
/// makes them resolvable. Building one resolves every excluded name to an ID
/// and checks that no time period ends up excluding itself, so evaluation
/// never has to deal with unresolved or cyclic references. The registry is
/// immutable once built and can be shared between threads freely.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    periods: Vec<TimePeriod>,
    by_name: HashMap<String, TimePeriodId>,
    /// Resolved exclusions, indexed like `periods`.
    exclusions: Vec<Vec<TimePeriodId>>,
}

impl Registry {
    pub fn new() -> Self {
        Registry::default()
    }

    /// Validates the given time periods and builds a registry out of them.
    pub fn build(
        periods: impl IntoIterator<Item = TimePeriod>,
        settings: &SearchSettings,
    ) -> Result<Self, ConfigError> {
        let mut registry = Registry::new();
        for period in periods {
            registry.insert(period, settings)?;
        }
        registry.resolve_exclusions()?;
        registry.check_cycles()?;
        debug!(count = registry.periods.len(), "built time period registry");
        Ok(registry)
    }

    // Stores a time period under a fresh ID after checking its name. Does not
    // look at its exclusions, which may name periods inserted later.
    fn insert(
        &mut self,
        period: TimePeriod,
        settings: &SearchSettings,
    ) -> Result<TimePeriodId, ConfigError> {
        let name = period.name();
        if name.is_empty() || period.alias().is_empty() {
            return Err(ConfigError::MissingName(name.to_owned()));
        }
        if name.chars().any(|c| settings.illegal_object_chars.contains(c)) {
            return Err(ConfigError::IllegalName(name.to_owned()));
        }
        if self.by_name.contains_key(name) {
            return Err(ConfigError::DuplicateName(name.to_owned()));
        }

        let id = TimePeriodId(self.periods.len());
        debug!(
            period = name,
            exceptions = %period.exceptions_dump(),
            exclude = ?period.excluded(),
            "registering time period"
        );
        self.by_name.insert(name.to_owned(), id);
        self.periods.push(period);
        Ok(id)
    }

    fn resolve_exclusions(&mut self) -> Result<(), ConfigError> {
        let mut exclusions = Vec::with_capacity(self.periods.len());
        for period in &self.periods {
            let ids = period
                .excluded()
                .iter()
                .map(|excluded| {
                    self.id_of(excluded).ok_or_else(|| ConfigError::UnknownExclusion {
                        period: period.name().to_owned(),
                        excluded: excluded.clone(),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            exclusions.push(ids);
        }
        self.exclusions = exclusions;
        Ok(())
    }

    fn check_cycles(&self) -> Result<(), ConfigError> {
        // depth-first search over the exclusion graph
        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Unvisited,
            InProgress,
            Done,
        }
        let mut marks = vec![Mark::Unvisited; self.periods.len()];
        for root in 0..self.periods.len() {
            if marks[root] != Mark::Unvisited {
                continue;
            }
            // each entry is a period and the index of the next exclusion to
            // follow from it
            let mut stack = vec![(root, 0)];
            marks[root] = Mark::InProgress;
            while let Some((index, next)) = stack.last_mut() {
                let Some(&TimePeriodId(child)) = self.exclusions[*index].get(*next) else {
                    marks[*index] = Mark::Done;
                    stack.pop();
                    continue;
                };
                *next += 1;
                match marks[child] {
                    Mark::Unvisited => {
                        marks[child] = Mark::InProgress;
                        stack.push((child, 0));
                    }
                    Mark::InProgress => {
                        return Err(ConfigError::ExclusionCycle(
                            self.periods[child].name().to_owned(),
                        ));
                    }
                    Mark::Done => {}
                }
            }
        }
        Ok(())
    }

    pub fn get(&self, id: TimePeriodId) -> Option<&TimePeriod> {
        self.periods.get(id.0)
    }

    pub fn id_of(&self, name: &str) -> Option<TimePeriodId> {
        self.by_name.get(name).copied()
    }

    pub fn get_by_name(&self, name: &str) -> Option<&TimePeriod> {
        self.id_of(name).and_then(|id| self.get(id))
    }

    /// The IDs of the periods excluded by the period with the given ID.
    pub fn excluded_ids(&self, id: TimePeriodId) -> &[TimePeriodId] {
        self.exclusions.get(id.0).map_or(&[][..], Vec::as_slice)
    }

    pub fn entry(&self, id: TimePeriodId) -> Option<Entry<'_>> {
        let period = self.get(id)?;
        Some(Entry { period, excluded: self.excluded_ids(id) })
    }

    pub fn len(&self) -> usize {
        self.periods.len()
    }

    pub fn is_empty(&self) -> bool {
        self.periods.is_empty()
    }

    /// Iterates over the time periods in the order they were given.
    pub fn iter(&self) -> impl Iterator<Item = (TimePeriodId, &TimePeriod)> {
        self.periods.iter().enumerate().map(|(index, period)| (TimePeriodId(index), period))
    }
}
