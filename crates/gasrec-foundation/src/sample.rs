/// One reading of the three monitored channels.
///
/// `-1` in any field means the value was unavailable that tick (hardware
/// absent, monitor warming up, or parse failure carry-over).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sample {
    pub mac: f64,
    pub o2: f64,
    pub dose: f64,
}

impl Sample {
    pub const UNAVAILABLE: Sample = Sample {
        mac: -1.0,
        o2: -1.0,
        dose: -1.0,
    };

    pub fn is_unavailable(&self) -> bool {
        *self == Self::UNAVAILABLE
    }
}

/// One synchronized record: wall-clock emission time plus the sample held
/// at that tick. Appended once per scheduling period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tick {
    /// Seconds since the Unix epoch. Strictly append-ordered, not monotonic
    /// under system clock adjustment.
    pub timestamp: f64,
    pub sample: Sample,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_sample_is_all_negative_one() {
        let s = Sample::UNAVAILABLE;
        assert_eq!(s.mac, -1.0);
        assert_eq!(s.o2, -1.0);
        assert_eq!(s.dose, -1.0);
        assert!(s.is_unavailable());
    }

    #[test]
    fn real_reading_is_not_sentinel() {
        let s = Sample { mac: 0.8, o2: 33.0, dose: 1.2 };
        assert!(!s.is_unavailable());
    }
}
