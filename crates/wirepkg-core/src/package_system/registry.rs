use std::collections::BTreeMap;

use semver::Version;

use crate::package_system::component::Component;
use crate::package_system::error::PackageSystemError;
use crate::package_system::record::{PackageInfo, PackageRecord};

/// Package records keyed by id, iterated in id order
#[derive(Debug, Default)]
pub struct PackageRegistry {
    records: BTreeMap<String, PackageRecord>,
}

impl PackageRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record; ids are unique
    pub fn insert(&mut self, record: PackageRecord) -> Result<(), PackageSystemError> {
        if self.records.contains_key(&record.id) {
            return Err(PackageSystemError::DuplicatePackage(record.id));
        }
        self.records.insert(record.id.clone(), record);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&PackageRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut PackageRecord> {
        self.records.get_mut(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.contains_key(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<PackageRecord> {
        self.records.remove(id)
    }

    pub fn ids(&self) -> Vec<String> {
        self.records.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PackageRecord> {
        self.records.values()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut PackageRecord> {
        self.records.values_mut()
    }

    /// Moves a record's components out, leaving it with none
    pub fn take_components(&mut self, id: &str) -> Vec<Box<dyn Component>> {
        self.records
            .get_mut(id)
            .map(|record| std::mem::take(&mut record.components))
            .unwrap_or_default()
    }

    /// Puts components back into a record. Returns them if the record is gone.
    pub fn restore_components(
        &mut self,
        id: &str,
        components: Vec<Box<dyn Component>>,
    ) -> Option<Vec<Box<dyn Component>>> {
        match self.records.get_mut(id) {
            Some(record) => {
                record.components = components;
                None
            }
            None => Some(components),
        }
    }

    /// Snapshot of every record, sorted by id
    pub fn snapshot(&self, host_version: &Version) -> Vec<PackageInfo> {
        self.records.values().map(|record| record.info(host_version)).collect()
    }
}
