//! 车辆计数 (Per-frame vehicle counting)
//!
//! Counts are rebuilt from scratch every frame; nothing carries over.

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};

use crate::detection::{ClassRegistry, Detection};

pub const DEFAULT_VEHICLE_CLASSES: [&str; 4] = ["car", "bus", "truck", "motorbike"];

/// Class names that are counted, in display order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleClassSet {
    names: Vec<String>,
}

impl VehicleClassSet {
    /// Duplicates are dropped, first occurrence wins.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut unique: Vec<String> = Vec::new();
        for name in names {
            let name = name.into();
            if !unique.contains(&name) {
                unique.push(name);
            }
        }
        Self { names: unique }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for VehicleClassSet {
    fn default() -> Self {
        Self::new(DEFAULT_VEHICLE_CLASSES)
    }
}

/// Count per vehicle class for one frame. Every class of the set is present,
/// zero when nothing was seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameCountResult {
    counts: Vec<(String, usize)>,
}

impl FrameCountResult {
    pub fn zeroed(classes: &VehicleClassSet) -> Self {
        Self {
            counts: classes.names().iter().map(|n| (n.clone(), 0)).collect(),
        }
    }

    /// `None` for a class outside the vehicle set.
    pub fn get(&self, name: &str) -> Option<usize> {
        self.counts.iter().find(|(n, _)| n == name).map(|(_, c)| *c)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> {
        self.counts.iter().map(|(n, c)| (n.as_str(), *c))
    }

    pub fn total(&self) -> usize {
        self.counts.iter().map(|(_, c)| c).sum()
    }

    /// Add another frame's counts; classes missing here are ignored.
    pub fn accumulate(&mut self, other: &FrameCountResult) {
        for (name, count) in other.iter() {
            if let Some((_, total)) = self.counts.iter_mut().find(|(n, _)| n == name) {
                *total += count;
            }
        }
    }

    fn increment(&mut self, name: &str) -> bool {
        match self.counts.iter_mut().find(|(n, _)| n == name) {
            Some((_, count)) => {
                *count += 1;
                true
            }
            None => false,
        }
    }
}

impl Serialize for FrameCountResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.counts.len()))?;
        for (name, count) in &self.counts {
            map.serialize_entry(name, count)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default)]
pub struct FrameCounter {
    classes: VehicleClassSet,
}

impl FrameCounter {
    pub fn new(classes: VehicleClassSet) -> Self {
        Self { classes }
    }

    pub fn classes(&self) -> &VehicleClassSet {
        &self.classes
    }

    /// `detections` are the kept, zone-accepted boxes of one frame.
    /// Unknown class ids and non-vehicle classes are ignored.
    pub fn count<'a, I>(&self, detections: I, registry: &ClassRegistry) -> FrameCountResult
    where
        I: IntoIterator<Item = &'a Detection>,
    {
        let mut result = FrameCountResult::zeroed(&self.classes);
        for det in detections {
            if let Some(name) = registry.name(det.class_id) {
                result.increment(name);
            }
        }
        result
    }

    /// Vehicle class name of a detection, if it is one.
    pub fn vehicle_name<'r>(&self, det: &Detection, registry: &'r ClassRegistry) -> Option<&'r str> {
        registry
            .name(det.class_id)
            .filter(|name| self.classes.contains(name))
    }
}
