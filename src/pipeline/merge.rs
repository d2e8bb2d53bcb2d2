use chrono::NaiveDateTime;

use crate::models::DiagnosisCandidate;

use super::extract::ExtractedDiagnosis;

/// At most this many diagnosis candidates are retained per patient.
pub const MAX_CANDIDATES: usize = 5;

/// Reconcile freshly extracted candidates with the patient's stored list.
///
/// Candidates are keyed by name: a new candidate replaces the stored one
/// with the same name outright (last write wins), otherwise it is
/// appended. Every surviving candidate is stamped with `now`, then the
/// list is sorted descending by confidence and truncated to
/// `MAX_CANDIDATES`.
///
/// A turn that extracts nothing leaves the stored list untouched.
pub fn merge_candidates(
    existing: &[DiagnosisCandidate],
    new: &[ExtractedDiagnosis],
    now: NaiveDateTime,
) -> Vec<DiagnosisCandidate> {
    if new.is_empty() {
        return existing.to_vec();
    }

    let mut merged: Vec<DiagnosisCandidate> = existing.to_vec();

    for candidate in new {
        let incoming = DiagnosisCandidate {
            name: candidate.diagnosis.clone(),
            confidence: candidate.confidence,
            reasoning: candidate.reasoning.clone(),
            updated_at: now,
        };
        match merged.iter_mut().find(|c| c.name == incoming.name) {
            Some(slot) => *slot = incoming,
            None => merged.push(incoming),
        }
    }

    for candidate in &mut merged {
        candidate.updated_at = now;
    }

    merged.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    merged.truncate(MAX_CANDIDATES);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Local;

    fn stored(name: &str, confidence: f32) -> DiagnosisCandidate {
        DiagnosisCandidate {
            name: name.into(),
            confidence,
            reasoning: "stored reasoning".into(),
            updated_at: Local::now().naive_local(),
        }
    }

    fn extracted(name: &str, confidence: f32) -> ExtractedDiagnosis {
        ExtractedDiagnosis {
            diagnosis: name.into(),
            confidence,
            reasoning: "new reasoning".into(),
        }
    }

    #[test]
    fn empty_extraction_is_a_no_op() {
        let existing = vec![stored("Migraine", 0.5), stored("Tension headache", 0.4)];
        let merged = merge_candidates(&existing, &[], Local::now().naive_local());
        assert_eq!(merged, existing);
    }

    #[test]
    fn new_names_are_appended() {
        let existing = vec![stored("Migraine", 0.5)];
        let merged = merge_candidates(
            &existing,
            &[extracted("Dehydration", 0.3)],
            Local::now().naive_local(),
        );
        assert_eq!(merged.len(), 2);
        assert!(merged.iter().any(|c| c.name == "Dehydration"));
    }

    #[test]
    fn replacement_and_append_rank_together() {
        let existing = vec![stored("Migraine", 0.5)];
        let merged = merge_candidates(
            &existing,
            &[extracted("Migraine", 0.7), extracted("Dehydration", 0.9)],
            Local::now().naive_local(),
        );
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "Dehydration");
        assert!((merged[0].confidence - 0.9).abs() < f32::EPSILON);
        assert_eq!(merged[1].name, "Migraine");
        assert!((merged[1].confidence - 0.7).abs() < f32::EPSILON);
    }

    #[test]
    fn same_name_last_write_wins() {
        let existing = vec![stored("Migraine", 0.9)];
        let merged = merge_candidates(
            &existing,
            &[extracted("Migraine", 0.2)],
            Local::now().naive_local(),
        );
        assert_eq!(merged.len(), 1);
        // Replacement is not confidence-aware: the lower new value wins.
        assert!((merged[0].confidence - 0.2).abs() < f32::EPSILON);
        assert_eq!(merged[0].reasoning, "new reasoning");
    }

    #[test]
    fn result_sorted_descending_and_capped() {
        let existing = vec![
            stored("A", 0.10),
            stored("B", 0.90),
            stored("C", 0.50),
            stored("D", 0.30),
        ];
        let merged = merge_candidates(
            &existing,
            &[extracted("E", 0.70), extracted("F", 0.20)],
            Local::now().naive_local(),
        );
        assert_eq!(merged.len(), MAX_CANDIDATES);
        for pair in merged.windows(2) {
            assert!(pair[0].confidence >= pair[1].confidence);
        }
        // The weakest entry fell off the end.
        assert!(!merged.iter().any(|c| c.name == "A"));
    }

    #[test]
    fn survivors_all_stamped_with_now() {
        let old = Local::now().naive_local() - chrono::Duration::days(3);
        let mut existing = vec![stored("Migraine", 0.5)];
        existing[0].updated_at = old;

        let now = Local::now().naive_local();
        let merged = merge_candidates(&existing, &[extracted("Dehydration", 0.3)], now);
        for candidate in &merged {
            assert_eq!(candidate.updated_at, now);
        }
    }

    #[test]
    fn five_new_on_five_existing_keeps_top_five() {
        let existing: Vec<_> = (0..5)
            .map(|i| stored(&format!("old{i}"), 0.5 + i as f32 * 0.05))
            .collect();
        let new: Vec<_> = (0..5)
            .map(|i| extracted(&format!("new{i}"), 0.8 + i as f32 * 0.01))
            .collect();
        let merged = merge_candidates(&existing, &new, Local::now().naive_local());
        assert_eq!(merged.len(), MAX_CANDIDATES);
        assert!(merged.iter().all(|c| c.name.starts_with("new")));
    }
}
