/// Quality flags and their significance ordering.
///
/// Every quality decision in the crate ("which of these two values is
/// worse?", "which members of a burst do we average?") goes through the
/// rank table in this module. The enumeration is closed; significance is
/// a plain integer comparison, not dynamic dispatch.
use serde::{Deserialize, Serialize};
use std::fmt;

/// A QC flag attached to a sensor value.
///
/// Significance, from least to most significant:
///
///   GOOD < ASSUMED_GOOD < NEEDED < QUESTIONABLE < BAD < FLUSHING < NO_QC
///
/// "More significant" means "worse" for the purposes of `worst_of`.
/// FLUSHING and NO_QC sit above BAD: neither carries a usable quality
/// judgement, so any checked value is preferred over them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Flag {
    /// Checked and good.
    Good,
    /// No check has raised anything; treated as good.
    AssumedGood,
    /// Automatic QC raised something and a human needs to look at it.
    Needed,
    Questionable,
    Bad,
    /// Instrument was flushing; ignore the value completely.
    Flushing,
    /// No QC has been performed (used for synthetic "no value" markers).
    NoQc,
}

impl Flag {
    /// Position in the significance order.
    pub const fn rank(self) -> u8 {
        match self {
            Flag::Good => 0,
            Flag::AssumedGood => 1,
            Flag::Needed => 2,
            Flag::Questionable => 3,
            Flag::Bad => 4,
            Flag::Flushing => 5,
            Flag::NoQc => 6,
        }
    }

    /// Integer code used when the flag is persisted. Positive codes follow
    /// the WOCE convention (2 = good, 3 = questionable, 4 = bad).
    pub const fn code(self) -> i32 {
        match self {
            Flag::NoQc => 0,
            Flag::Good => 2,
            Flag::AssumedGood => -2,
            Flag::Needed => -100,
            Flag::Questionable => 3,
            Flag::Bad => 4,
            Flag::Flushing => -10,
        }
    }

    /// Reverse of [`Flag::code`]. Returns `None` for unknown codes.
    pub fn from_code(code: i32) -> Option<Flag> {
        match code {
            0 => Some(Flag::NoQc),
            2 => Some(Flag::Good),
            -2 => Some(Flag::AssumedGood),
            -100 => Some(Flag::Needed),
            3 => Some(Flag::Questionable),
            4 => Some(Flag::Bad),
            -10 => Some(Flag::Flushing),
            _ => None,
        }
    }

    /// GOOD and ASSUMED_GOOD are both usable as good data.
    pub const fn is_good(self) -> bool {
        matches!(self, Flag::Good | Flag::AssumedGood)
    }

    pub fn more_significant_than(self, other: Flag) -> bool {
        self.rank() > other.rank()
    }

    /// Like [`Flag::more_significant_than`], but flags in the same quality
    /// class (GOOD and ASSUMED_GOOD) compare equal.
    pub fn worse_class_than(self, other: Flag) -> bool {
        self.class_rank() > other.class_rank()
    }

    fn class_rank(self) -> u8 {
        match self.simple() {
            Some(class) => class.rank(),
            None => self.rank(),
        }
    }

    /// The more significant (worse) of two flags.
    pub fn worst_of(a: Flag, b: Flag) -> Flag {
        if b.more_significant_than(a) { b } else { a }
    }

    /// The less significant (better) of two flags.
    pub fn best_of(a: Flag, b: Flag) -> Flag {
        if a.more_significant_than(b) { b } else { a }
    }

    /// Collapses the flag onto the three quality classes used when
    /// aggregating groups of values. ASSUMED_GOOD counts as GOOD. Flags
    /// outside the three classes have no simple equivalent.
    pub const fn simple(self) -> Option<Flag> {
        match self {
            Flag::Good | Flag::AssumedGood => Some(Flag::Good),
            Flag::Questionable => Some(Flag::Questionable),
            Flag::Bad => Some(Flag::Bad),
            _ => None,
        }
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Flag::NoQc => "No QC",
            Flag::Good => "Good",
            Flag::AssumedGood => "Assumed Good",
            Flag::Needed => "Needed",
            Flag::Questionable => "Questionable",
            Flag::Bad => "Bad",
            Flag::Flushing => "Flushing",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [Flag; 7] = [
        Flag::Good,
        Flag::AssumedGood,
        Flag::Needed,
        Flag::Questionable,
        Flag::Bad,
        Flag::Flushing,
        Flag::NoQc,
    ];

    #[test]
    fn test_significance_is_a_strict_total_order() {
        for (i, a) in ALL.iter().enumerate() {
            for (j, b) in ALL.iter().enumerate() {
                assert_eq!(
                    a.more_significant_than(*b),
                    i > j,
                    "{} vs {} disagrees with declaration order",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_worst_of_picks_more_significant_flag() {
        assert_eq!(Flag::worst_of(Flag::Good, Flag::Bad), Flag::Bad);
        assert_eq!(Flag::worst_of(Flag::Bad, Flag::Questionable), Flag::Bad);
        assert_eq!(Flag::worst_of(Flag::Flushing, Flag::Bad), Flag::Flushing);
        assert_eq!(Flag::worst_of(Flag::Good, Flag::Good), Flag::Good);
    }

    #[test]
    fn test_best_of_is_dual_of_worst_of() {
        for a in ALL {
            for b in ALL {
                let worst = Flag::worst_of(a, b);
                let best = Flag::best_of(a, b);
                assert!(
                    (worst == a && best == b) || (worst == b && best == a),
                    "best/worst of {} and {} should partition the pair",
                    a,
                    b
                );
            }
        }
    }

    #[test]
    fn test_no_qc_is_worse_than_any_checked_flag() {
        for checked in [Flag::Good, Flag::AssumedGood, Flag::Questionable, Flag::Bad] {
            assert!(Flag::NoQc.more_significant_than(checked), "NO_QC should lose to {}", checked);
            assert_eq!(Flag::best_of(Flag::NoQc, checked), checked);
        }
    }

    #[test]
    fn test_class_comparison_treats_assumed_good_as_good() {
        assert!(!Flag::AssumedGood.worse_class_than(Flag::Good));
        assert!(!Flag::Good.worse_class_than(Flag::AssumedGood));
        assert!(Flag::Questionable.worse_class_than(Flag::AssumedGood));
        assert!(Flag::NoQc.worse_class_than(Flag::Bad));
        assert!(Flag::AssumedGood.more_significant_than(Flag::Good), "plain order still separates them");
    }

    #[test]
    fn test_good_predicate() {
        assert!(Flag::Good.is_good());
        assert!(Flag::AssumedGood.is_good());
        assert!(!Flag::Questionable.is_good());
        assert!(!Flag::Needed.is_good());
        assert!(!Flag::Flushing.is_good());
    }

    #[test]
    fn test_codes_round_trip_and_reject_unknown() {
        for flag in ALL {
            assert_eq!(Flag::from_code(flag.code()), Some(flag));
        }
        assert_eq!(Flag::from_code(99), None);
    }

    #[test]
    fn test_simple_classes() {
        assert_eq!(Flag::AssumedGood.simple(), Some(Flag::Good));
        assert_eq!(Flag::Questionable.simple(), Some(Flag::Questionable));
        assert_eq!(Flag::NoQc.simple(), None);
        assert_eq!(Flag::Flushing.simple(), None);
    }
}
