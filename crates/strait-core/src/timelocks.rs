//! The eight-stage timelock schedule governing who may act when.
//!
//! Canonical form is the unpacked struct of absolute UNIX-second deadlines.
//! The packed form mirrors on-chain storage: one byte per stage holding the
//! hours-offset from a base timestamp, capped at 255.

use serde::{Deserialize, Serialize};

use crate::error::ResolverError;
use crate::types::Timestamp;

pub const SECONDS_PER_HOUR: i64 = 3_600;

/// Byte positions in the packed form, and the canonical emission order.
pub const STAGES: [TimelockStage; 8] = [
    TimelockStage::SrcWithdrawal,
    TimelockStage::SrcPublicWithdrawal,
    TimelockStage::SrcCancellation,
    TimelockStage::SrcPublicCancellation,
    TimelockStage::DstWithdrawal,
    TimelockStage::DstPublicWithdrawal,
    TimelockStage::DstCancellation,
    TimelockStage::DstPublicCancellation,
];

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelockStage {
    SrcWithdrawal,
    SrcPublicWithdrawal,
    SrcCancellation,
    SrcPublicCancellation,
    DstWithdrawal,
    DstPublicWithdrawal,
    DstCancellation,
    DstPublicCancellation,
}

impl TimelockStage {
    /// Byte index in the packed u64.
    pub fn index(&self) -> usize {
        match self {
            TimelockStage::SrcWithdrawal => 0,
            TimelockStage::SrcPublicWithdrawal => 1,
            TimelockStage::SrcCancellation => 2,
            TimelockStage::SrcPublicCancellation => 3,
            TimelockStage::DstWithdrawal => 4,
            TimelockStage::DstPublicWithdrawal => 5,
            TimelockStage::DstCancellation => 6,
            TimelockStage::DstPublicCancellation => 7,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimelockStage::SrcWithdrawal => "src_withdrawal",
            TimelockStage::SrcPublicWithdrawal => "src_public_withdrawal",
            TimelockStage::SrcCancellation => "src_cancellation",
            TimelockStage::SrcPublicCancellation => "src_public_cancellation",
            TimelockStage::DstWithdrawal => "dst_withdrawal",
            TimelockStage::DstPublicWithdrawal => "dst_public_withdrawal",
            TimelockStage::DstCancellation => "dst_cancellation",
            TimelockStage::DstPublicCancellation => "dst_public_cancellation",
        }
    }
}

impl std::fmt::Display for TimelockStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Timelocks ────────────────────────────────────────────────────────────────

/// Eight absolute UNIX-second deadlines, one per stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timelocks {
    pub src_withdrawal: Timestamp,
    pub src_public_withdrawal: Timestamp,
    pub src_cancellation: Timestamp,
    pub src_public_cancellation: Timestamp,
    pub dst_withdrawal: Timestamp,
    pub dst_public_withdrawal: Timestamp,
    pub dst_cancellation: Timestamp,
    pub dst_public_cancellation: Timestamp,
}

impl Timelocks {
    /// The absolute deadline for a stage.
    pub fn deadline(&self, stage: TimelockStage) -> Timestamp {
        match stage {
            TimelockStage::SrcWithdrawal => self.src_withdrawal,
            TimelockStage::SrcPublicWithdrawal => self.src_public_withdrawal,
            TimelockStage::SrcCancellation => self.src_cancellation,
            TimelockStage::SrcPublicCancellation => self.src_public_cancellation,
            TimelockStage::DstWithdrawal => self.dst_withdrawal,
            TimelockStage::DstPublicWithdrawal => self.dst_public_withdrawal,
            TimelockStage::DstCancellation => self.dst_cancellation,
            TimelockStage::DstPublicCancellation => self.dst_public_cancellation,
        }
    }

    /// Whether the stage's window has opened at `now`.
    pub fn is_open(&self, stage: TimelockStage, now: Timestamp) -> bool {
        now >= self.deadline(stage)
    }

    /// Validate the schedule ordering:
    ///
    ///   src_withdrawal ≤ src_public_withdrawal < src_cancellation ≤ src_public_cancellation
    ///   dst_withdrawal ≤ dst_public_withdrawal < dst_cancellation ≤ dst_public_cancellation
    ///   dst_withdrawal ≤ src_withdrawal
    ///   dst_cancellation ≤ src_cancellation
    ///
    /// The cross-chain constraints guarantee the destination claim window
    /// opens no later than the source one, so the resolver can always react
    /// to a user claim before source cancellation becomes allowed.
    pub fn validate(&self) -> Result<(), ResolverError> {
        let side = |name: &str, w: Timestamp, pw: Timestamp, c: Timestamp, pc: Timestamp| {
            if !(w <= pw && pw < c && c <= pc) {
                return Err(ResolverError::TimelockInversion(format!(
                    "{name} stages out of order: withdrawal={w} public_withdrawal={pw} \
                     cancellation={c} public_cancellation={pc}"
                )));
            }
            Ok(())
        };
        side(
            "src",
            self.src_withdrawal,
            self.src_public_withdrawal,
            self.src_cancellation,
            self.src_public_cancellation,
        )?;
        side(
            "dst",
            self.dst_withdrawal,
            self.dst_public_withdrawal,
            self.dst_cancellation,
            self.dst_public_cancellation,
        )?;
        if self.dst_withdrawal > self.src_withdrawal {
            return Err(ResolverError::TimelockInversion(format!(
                "dst_withdrawal {} must not trail src_withdrawal {}",
                self.dst_withdrawal, self.src_withdrawal
            )));
        }
        if self.dst_cancellation > self.src_cancellation {
            return Err(ResolverError::TimelockInversion(format!(
                "dst_cancellation {} must not trail src_cancellation {}",
                self.dst_cancellation, self.src_cancellation
            )));
        }
        Ok(())
    }

    /// True if every stage of `other` is strictly later than ours.
    pub fn strictly_precedes(&self, other: &Timelocks) -> bool {
        STAGES.iter().all(|s| self.deadline(*s) < other.deadline(*s))
    }

    /// Pack into the on-chain u64: byte `i` holds stage `i`'s offset from
    /// `base` in whole hours, saturating at 255. Lossy below one hour of
    /// granularity; the unpacked struct remains canonical off-chain.
    pub fn pack(&self, base: Timestamp) -> u64 {
        let mut packed: u64 = 0;
        for stage in STAGES {
            let offset = (self.deadline(stage) - base).max(0) / SECONDS_PER_HOUR;
            let byte = offset.min(255) as u64;
            packed |= byte << (8 * stage.index());
        }
        packed
    }

    /// Inverse of [`Timelocks::pack`] given the same base timestamp.
    pub fn unpack(base: Timestamp, packed: u64) -> Self {
        let at = |stage: TimelockStage| {
            let byte = (packed >> (8 * stage.index())) & 0xff;
            base + (byte as i64) * SECONDS_PER_HOUR
        };
        Self {
            src_withdrawal: at(TimelockStage::SrcWithdrawal),
            src_public_withdrawal: at(TimelockStage::SrcPublicWithdrawal),
            src_cancellation: at(TimelockStage::SrcCancellation),
            src_public_cancellation: at(TimelockStage::SrcPublicCancellation),
            dst_withdrawal: at(TimelockStage::DstWithdrawal),
            dst_public_withdrawal: at(TimelockStage::DstPublicWithdrawal),
            dst_cancellation: at(TimelockStage::DstCancellation),
            dst_public_cancellation: at(TimelockStage::DstPublicCancellation),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid(base: Timestamp) -> Timelocks {
        Timelocks {
            src_withdrawal: base + 2 * SECONDS_PER_HOUR,
            src_public_withdrawal: base + 3 * SECONDS_PER_HOUR,
            src_cancellation: base + 6 * SECONDS_PER_HOUR,
            src_public_cancellation: base + 7 * SECONDS_PER_HOUR,
            dst_withdrawal: base + SECONDS_PER_HOUR,
            dst_public_withdrawal: base + 2 * SECONDS_PER_HOUR,
            dst_cancellation: base + 4 * SECONDS_PER_HOUR,
            dst_public_cancellation: base + 5 * SECONDS_PER_HOUR,
        }
    }

    #[test]
    fn accepts_well_ordered_schedule() {
        assert!(valid(1_700_000_000).validate().is_ok());
    }

    #[test]
    fn rejects_src_inversion() {
        let mut t = valid(1_700_000_000);
        t.src_cancellation = t.src_withdrawal - 1;
        assert!(matches!(t.validate(), Err(ResolverError::TimelockInversion(_))));
    }

    #[test]
    fn rejects_dst_withdrawal_after_src() {
        let mut t = valid(1_700_000_000);
        t.dst_withdrawal = t.src_withdrawal + 1;
        assert!(matches!(t.validate(), Err(ResolverError::TimelockInversion(_))));
    }

    #[test]
    fn equal_withdrawal_opens_are_allowed() {
        let mut t = valid(1_700_000_000);
        t.dst_withdrawal = t.src_withdrawal;
        assert!(t.validate().is_ok());
    }

    #[test]
    fn pack_unpack_round_trip_on_hour_boundaries() {
        let base = 1_700_000_000;
        let t = valid(base);
        let packed = t.pack(base);
        assert_eq!(Timelocks::unpack(base, packed), t);
    }

    #[test]
    fn pack_saturates_at_255_hours() {
        let base = 1_700_000_000;
        let mut t = valid(base);
        t.src_public_cancellation = base + 9_999 * SECONDS_PER_HOUR;
        let packed = t.pack(base);
        let byte = (packed >> (8 * TimelockStage::SrcPublicCancellation.index())) & 0xff;
        assert_eq!(byte, 255);
    }

    #[test]
    fn strictly_precedes_requires_every_stage() {
        let base = 1_700_000_000;
        let a = valid(base);
        let b = valid(base + SECONDS_PER_HOUR);
        assert!(a.strictly_precedes(&b));
        assert!(!b.strictly_precedes(&a));
        assert!(!a.strictly_precedes(&a));
    }

    #[test]
    fn window_open_at_exact_deadline() {
        let t = valid(1_700_000_000);
        let d = t.deadline(TimelockStage::DstWithdrawal);
        assert!(!t.is_open(TimelockStage::DstWithdrawal, d - 1));
        assert!(t.is_open(TimelockStage::DstWithdrawal, d));
    }
}
