use crate::models::enums::{PriorityLevel, Tier};
use crate::models::HealthRecordSummary;

/// Normal-priority records are always capped to the first few entries,
/// with a "+N more" marker standing in for the rest.
pub const NORMAL_RECORD_CAP: usize = 3;

/// Health-record summaries split by inclusion policy for the current tier.
#[derive(Debug, Clone, Default)]
pub struct RecordPartitions {
    pub always: Vec<HealthRecordSummary>,
    pub conditional: Vec<HealthRecordSummary>,
    pub normal: Vec<HealthRecordSummary>,
    /// How many normal-priority records were dropped by the cap.
    pub normal_overflow: usize,
}

impl RecordPartitions {
    pub fn is_empty(&self) -> bool {
        self.always.is_empty() && self.conditional.is_empty() && self.normal.is_empty()
    }
}

/// Partition record summaries by priority under the tier's inclusion policy.
///
/// - `always` summaries are included for every tier.
/// - `conditional` summaries are included for pro, and for basic whenever
///   any conditional summary exists. Free tier never sees them.
/// - `normal` summaries are capped at `NORMAL_RECORD_CAP`; the overflow
///   count drives the "+N more" marker.
///
/// Absent data simply yields empty partitions; there is no error path.
pub fn partition_records(tier: Tier, records: Vec<HealthRecordSummary>) -> RecordPartitions {
    let mut always = Vec::new();
    let mut conditional = Vec::new();
    let mut normal = Vec::new();

    for record in records {
        match record.priority {
            PriorityLevel::Always => always.push(record),
            PriorityLevel::Conditional => conditional.push(record),
            PriorityLevel::Normal => normal.push(record),
        }
    }

    let include_conditional = match tier {
        Tier::Pro => true,
        Tier::Basic => !conditional.is_empty(),
        Tier::Free => false,
    };
    if !include_conditional {
        conditional.clear();
    }

    let normal_overflow = normal.len().saturating_sub(NORMAL_RECORD_CAP);
    normal.truncate(NORMAL_RECORD_CAP);

    RecordPartitions {
        always,
        conditional,
        normal,
        normal_overflow,
    }
}

/// Confidence band applied to AI-generated topics for a tier.
pub fn confidence_band(tier: Tier) -> (f32, f32) {
    match tier {
        Tier::Free => (0.10, 0.40),
        Tier::Basic => (0.20, 0.60),
        Tier::Pro => (0.30, 0.80),
    }
}

/// Clamp a raw model confidence into the tier's band.
pub fn clamp_confidence(tier: Tier, confidence: f32) -> f32 {
    let (low, high) = confidence_band(tier);
    confidence.clamp(low, high)
}
