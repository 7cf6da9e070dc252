//! Hotspot beat membership.

use std::collections::BTreeSet;

/// Reference set of high-frequency beats.
pub const REFERENCE_HOTSPOT_BEATS: [u32; 10] = [332, 2523, 1933, 224, 1022, 1113, 414, 2023, 1221, 925];

/// A fixed set of administrative beats flagged as hotspots.
///
/// The set is configuration, not learned. It must be the same at training
/// and inference time; [`crate::FeatureDeriver::fingerprint`] covers it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HotspotBeats {
    beats: BTreeSet<u32>,
}

impl HotspotBeats {
    /// Builds a set from beat codes. Duplicates collapse.
    #[must_use]
    pub fn new(beats: impl IntoIterator<Item = u32>) -> Self {
        Self {
            beats: beats.into_iter().collect(),
        }
    }

    /// The ten-beat reference configuration.
    #[must_use]
    pub fn reference() -> Self {
        Self::new(REFERENCE_HOTSPOT_BEATS)
    }

    /// Whether `beat` is a hotspot. An absent beat never is.
    #[must_use]
    pub fn contains(&self, beat: Option<u32>) -> bool {
        beat.is_some_and(|b| self.beats.contains(&b))
    }

    /// `contains` as a 0/1 flag.
    #[must_use]
    pub fn flag(&self, beat: Option<u32>) -> u8 {
        u8::from(self.contains(beat))
    }

    /// Number of beats in the set.
    #[must_use]
    pub fn len(&self) -> usize {
        self.beats.len()
    }

    /// Whether the set is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Beats in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.beats.iter().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_set_has_ten_beats() {
        let hotspots = HotspotBeats::reference();
        assert_eq!(hotspots.len(), 10);
        assert_eq!(hotspots.flag(Some(332)), 1);
        assert_eq!(hotspots.flag(Some(111)), 0);
        assert_eq!(hotspots.flag(None), 0);
    }

    #[test]
    fn iteration_order_is_independent_of_input_order() {
        let a = HotspotBeats::new([925, 332, 224]);
        let b = HotspotBeats::new([224, 925, 332, 332]);
        assert_eq!(a, b);
        assert_eq!(a.iter().collect::<Vec<_>>(), vec![224, 332, 925]);
    }
}
