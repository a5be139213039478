//! Euclidean distance and best-match search.

use faceid_types::{BiometricDescriptor, DescriptorError};

/// Distances strictly below this value are considered the same identity.
pub const MATCH_THRESHOLD: f64 = 0.5;

/// Euclidean distance between two descriptors of equal length.
///
/// Accumulates in `f64` so the result does not depend on summation order
/// precision loss in `f32`.
pub fn distance(a: &BiometricDescriptor, b: &BiometricDescriptor) -> Result<f64, DescriptorError> {
    if a.len() != b.len() {
        return Err(DescriptorError::DimensionMismatch {
            expected: a.len(),
            actual: b.len(),
        });
    }
    let sum: f64 = a
        .as_slice()
        .iter()
        .zip(b.as_slice())
        .map(|(x, y)| {
            let d = f64::from(*x) - f64::from(*y);
            d * d
        })
        .sum();
    Ok(sum.sqrt())
}

/// The closest candidate, reported only when it lies under the threshold.
#[derive(Clone, Debug, PartialEq)]
pub struct BestMatch<Id> {
    pub id: Id,
    pub distance: f64,
}

/// Fixed-threshold nearest-neighbour matcher.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DescriptorMatcher {
    threshold: f64,
}

impl Default for DescriptorMatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl DescriptorMatcher {
    pub fn new() -> Self {
        Self {
            threshold: MATCH_THRESHOLD,
        }
    }

    /// Whether `distance` counts as a match.
    pub fn is_match(&self, distance: f64) -> bool {
        distance < self.threshold
    }

    /// Scan `candidates` in order and return the closest one if it is a match.
    ///
    /// Ties on the minimal distance resolve to the candidate seen first, so
    /// callers that present candidates in a fixed order (registration order)
    /// get reproducible results. Any candidate whose length differs from the
    /// query fails the whole scan.
    pub fn find_best_match<'a, Id, I>(
        &self,
        query: &BiometricDescriptor,
        candidates: I,
    ) -> Result<Option<BestMatch<Id>>, DescriptorError>
    where
        I: IntoIterator<Item = (Id, &'a BiometricDescriptor)>,
    {
        let mut best: Option<BestMatch<Id>> = None;
        for (id, candidate) in candidates {
            let d = distance(query, candidate)?;
            let closer = match &best {
                Some(current) => d < current.distance,
                None => true,
            };
            if closer {
                best = Some(BestMatch { id, distance: d });
            }
        }
        Ok(best.filter(|m| self.is_match(m.distance)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc(values: &[f32]) -> BiometricDescriptor {
        BiometricDescriptor::new(values.to_vec()).unwrap()
    }

    /// Descriptor at `offset` along the first axis from the origin.
    fn axis(offset: f32) -> BiometricDescriptor {
        desc(&[offset, 0.0, 0.0, 0.0])
    }

    #[test]
    fn distance_of_identical_is_zero() {
        let a = desc(&[0.1, 0.2, 0.3]);
        assert_eq!(distance(&a, &a).unwrap(), 0.0);
    }

    #[test]
    fn distance_three_four_five() {
        assert_eq!(distance(&desc(&[0.0, 0.0]), &desc(&[3.0, 4.0])).unwrap(), 5.0);
    }

    #[test]
    fn distance_dimension_mismatch() {
        assert_eq!(
            distance(&desc(&[0.0, 0.0]), &desc(&[0.0])),
            Err(DescriptorError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        );
    }

    #[test]
    fn threshold_boundary() {
        let m = DescriptorMatcher::new();
        let origin = axis(0.0);

        let at = [("at", &axis(0.5))];
        assert_eq!(m.find_best_match(&origin, at).unwrap(), None);

        let below = axis(0.49);
        let hit = m.find_best_match(&origin, [("below", &below)]).unwrap();
        assert_eq!(hit.map(|h| h.id), Some("below"));

        let above = axis(0.51);
        assert_eq!(m.find_best_match(&origin, [("above", &above)]).unwrap(), None);
    }

    #[test]
    fn picks_closest_candidate() {
        let m = DescriptorMatcher::new();
        let far = axis(0.4);
        let near = axis(0.1);
        let hit = m
            .find_best_match(&axis(0.0), [("far", &far), ("near", &near)])
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "near");
        assert!((hit.distance - 0.1).abs() < 1e-6);
    }

    #[test]
    fn tie_keeps_first_candidate() {
        let m = DescriptorMatcher::new();
        let left = axis(-0.25);
        let right = axis(0.25);
        let hit = m
            .find_best_match(&axis(0.0), [("left", &left), ("right", &right)])
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "left");

        let hit = m
            .find_best_match(&axis(0.0), [("right", &right), ("left", &left)])
            .unwrap()
            .unwrap();
        assert_eq!(hit.id, "right");
    }

    #[test]
    fn empty_candidates_is_no_match() {
        let m = DescriptorMatcher::new();
        let none: Vec<(u32, &BiometricDescriptor)> = Vec::new();
        assert_eq!(m.find_best_match(&axis(0.0), none).unwrap(), None);
    }

    #[test]
    fn mismatched_candidate_fails_scan() {
        let m = DescriptorMatcher::new();
        let short = desc(&[0.0]);
        assert!(matches!(
            m.find_best_match(&axis(0.0), [(1, &short)]),
            Err(DescriptorError::DimensionMismatch { .. })
        ));
    }
}
