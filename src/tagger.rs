// 🏷️ Reappointment Tagger - chronological first-occurrence rule
// Within each identity group the earliest record is the original appointment;
// every later occurrence is a reappointment.

use serde::{Deserialize, Serialize};

use crate::identity::{IdentityKey, KeyResolution, ResolvedRecords};
use crate::normalize::FieldKind;
use crate::record::AppointmentRecord;

// ============================================================================
// FLAG POLICY
// ============================================================================

/// How a source-supplied `reappointed` flag interacts with the computed tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum FlagPolicy {
    /// Computed tag replaces the source flag
    #[default]
    Overwrite,
    /// Computed tag, plus keyed records the source already marked as reappointed
    Merge,
}

impl FlagPolicy {
    pub fn name(&self) -> &str {
        match self {
            FlagPolicy::Overwrite => "overwrite",
            FlagPolicy::Merge => "merge",
        }
    }
}

// ============================================================================
// TAGGED RECORD
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct TaggedRecord {
    pub record: AppointmentRecord,
    /// None when the record was excluded from grouping
    pub key: Option<IdentityKey>,
    pub reappointed: bool,
    /// Position within the identity group in chronological order (0 = original)
    pub occurrence: Option<usize>,
}

impl TaggedRecord {
    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    pub fn source_flag(&self) -> Option<bool> {
        self.record.reappointed_flag
    }

    /// The record with its flag replaced by the computed tag
    pub fn to_record(&self) -> AppointmentRecord {
        let mut record = self.record.clone();
        record.reappointed_flag = Some(self.reappointed);
        record
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaggingSummary {
    pub records: usize,
    pub keyed: usize,
    pub excluded: usize,
    pub missing_name: usize,
    pub missing_position: usize,
    pub missing_organization: usize,
    pub groups: usize,
    pub recurring_groups: usize,
    pub reappointments: usize,
    /// Keyed records carrying a source flag
    pub source_flags_present: usize,
    /// Source flag equal to the chronological tag
    pub source_flags_agreed: usize,
    pub source_flags_disagreed: usize,
}

impl TaggingSummary {
    pub fn summary(&self) -> String {
        format!(
            "Records: {}, keyed: {}, excluded: {}, groups: {} ({} recurring), reappointments: {}",
            self.records,
            self.keyed,
            self.excluded,
            self.groups,
            self.recurring_groups,
            self.reappointments
        )
    }
}

#[derive(Debug, Clone)]
pub struct TaggedRecords {
    /// In ingestion order
    pub records: Vec<TaggedRecord>,
    pub summary: TaggingSummary,
}

// ============================================================================
// TAGGER
// ============================================================================

pub struct ReappointmentTagger {
    policy: FlagPolicy,
}

impl ReappointmentTagger {
    pub fn new(policy: FlagPolicy) -> Self {
        ReappointmentTagger { policy }
    }

    pub fn policy(&self) -> FlagPolicy {
        self.policy
    }

    pub fn tag(&self, resolved: ResolvedRecords) -> TaggedRecords {
        let ResolvedRecords {
            records,
            keys,
            groups,
        } = resolved;

        let mut computed = vec![false; records.len()];
        let mut occurrence: Vec<Option<usize>> = vec![None; records.len()];

        for group in &groups {
            let mut ordered = group.members.clone();
            // Year ascending, same-year duplicates by ingestion order
            ordered.sort_by_key(|&i| (records[i].year, records[i].sequence, i));

            for (position, &idx) in ordered.iter().enumerate() {
                computed[idx] = position > 0;
                occurrence[idx] = Some(position);
            }
        }

        let mut summary = TaggingSummary {
            records: records.len(),
            groups: groups.len(),
            recurring_groups: groups.iter().filter(|g| g.is_recurring()).count(),
            ..TaggingSummary::default()
        };

        let tagged: Vec<TaggedRecord> = records
            .into_iter()
            .zip(keys)
            .enumerate()
            .map(|(idx, (record, resolution))| {
                let key = match resolution {
                    KeyResolution::Keyed(key) => Some(key),
                    KeyResolution::Missing(fields) => {
                        summary.excluded += 1;
                        for field in fields {
                            match field {
                                FieldKind::Name => summary.missing_name += 1,
                                FieldKind::Position => summary.missing_position += 1,
                                FieldKind::Organization => summary.missing_organization += 1,
                            }
                        }
                        None
                    }
                };

                let chronological = computed[idx];
                let reappointed = match (&key, self.policy) {
                    (None, _) => false,
                    (Some(_), FlagPolicy::Overwrite) => chronological,
                    (Some(_), FlagPolicy::Merge) => {
                        chronological || record.reappointed_flag == Some(true)
                    }
                };

                if key.is_some() {
                    summary.keyed += 1;
                    if let Some(flag) = record.reappointed_flag {
                        summary.source_flags_present += 1;
                        if flag == chronological {
                            summary.source_flags_agreed += 1;
                        } else {
                            summary.source_flags_disagreed += 1;
                        }
                    }
                }
                if reappointed {
                    summary.reappointments += 1;
                }

                TaggedRecord {
                    record,
                    key,
                    reappointed,
                    occurrence: occurrence[idx],
                }
            })
            .collect();

        tracing::info!(
            policy = self.policy.name(),
            "{}",
            summary.summary()
        );

        TaggedRecords {
            records: tagged,
            summary,
        }
    }
}

impl Default for ReappointmentTagger {
    fn default() -> Self {
        Self::new(FlagPolicy::default())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::IdentityResolver;
    use crate::normalize::StandardNormalizer;
    use crate::record::sequence_records;
    use std::collections::HashMap;

    fn create_test_record(name: &str, org: Option<&str>, year: i32) -> AppointmentRecord {
        AppointmentRecord::new(0, Some(name), Some("Director"), org, year)
    }

    fn tag_with(policy: FlagPolicy, records: Vec<AppointmentRecord>) -> TaggedRecords {
        let resolved = IdentityResolver::new(&StandardNormalizer).resolve(sequence_records(records));
        ReappointmentTagger::new(policy).tag(resolved)
    }

    fn flags(tagged: &TaggedRecords) -> Vec<bool> {
        tagged.records.iter().map(|t| t.reappointed).collect()
    }

    #[test]
    fn test_alice_scenario() {
        let tagged = tag_with(
            FlagPolicy::Overwrite,
            vec![
                create_test_record("Alice", Some("Health"), 2015),
                create_test_record("Alice", Some("Health"), 2018),
                create_test_record("Alice", Some("Health"), 2021),
            ],
        );

        assert_eq!(flags(&tagged), vec![false, true, true]);
        assert_eq!(tagged.records[2].occurrence, Some(2));
        assert_eq!(tagged.summary.reappointments, 2);
        assert_eq!(tagged.summary.recurring_groups, 1);
    }

    #[test]
    fn test_order_is_chronological_not_ingestion() {
        let tagged = tag_with(
            FlagPolicy::Overwrite,
            vec![
                create_test_record("Alice", Some("Health"), 2021),
                create_test_record("Alice", Some("Health"), 2015),
            ],
        );

        assert_eq!(flags(&tagged), vec![true, false]);
    }

    #[test]
    fn test_same_year_tie_breaks_by_ingestion_order() {
        let tagged = tag_with(
            FlagPolicy::Overwrite,
            vec![
                create_test_record("Bob", Some("Finance"), 2019),
                create_test_record("Bob", Some("Finance"), 2017),
                create_test_record("Bob", Some("Finance"), 2017),
            ],
        );

        // Second 2017 row loses the tie to the first 2017 row
        assert_eq!(flags(&tagged), vec![true, false, true]);
        assert_eq!(tagged.records[1].occurrence, Some(0));
        assert_eq!(tagged.records[2].occurrence, Some(1));
    }

    #[test]
    fn test_overwrite_ignores_source_flags() {
        let tagged = tag_with(
            FlagPolicy::Overwrite,
            vec![
                create_test_record("Carol", Some("Justice"), 2014).with_flag(true),
                create_test_record("Carol", Some("Justice"), 2016).with_flag(false),
                create_test_record("Dan", Some("Justice"), 2016).with_flag(true),
            ],
        );

        assert_eq!(flags(&tagged), vec![false, true, false]);
        assert_eq!(tagged.summary.source_flags_present, 3);
        assert_eq!(tagged.summary.source_flags_agreed, 0);
        assert_eq!(tagged.summary.source_flags_disagreed, 3);
    }

    #[test]
    fn test_merge_keeps_source_reappointments() {
        let tagged = tag_with(
            FlagPolicy::Merge,
            vec![
                create_test_record("Carol", Some("Justice"), 2014),
                create_test_record("Carol", Some("Justice"), 2016).with_flag(false),
                create_test_record("Dan", Some("Justice"), 2016).with_flag(true),
                create_test_record("Eve", None, 2016).with_flag(true),
            ],
        );

        // Computed tag survives a false source flag; unknown keys are never tagged
        assert_eq!(flags(&tagged), vec![false, true, true, false]);
    }

    #[test]
    fn test_excluded_records_are_counted_per_field() {
        let tagged = tag_with(
            FlagPolicy::Overwrite,
            vec![
                create_test_record("Alice", None, 2015),
                AppointmentRecord::new(0, None, None, Some("Health"), 2015),
            ],
        );

        assert_eq!(tagged.summary.excluded, 2);
        assert_eq!(tagged.summary.missing_organization, 1);
        assert_eq!(tagged.summary.missing_name, 1);
        assert_eq!(tagged.summary.missing_position, 1);
        assert!(tagged.records.iter().all(|t| !t.reappointed && t.occurrence.is_none()));
    }

    #[test]
    fn test_tagging_is_idempotent() {
        for policy in [FlagPolicy::Overwrite, FlagPolicy::Merge] {
            let first = tag_with(
                policy,
                vec![
                    create_test_record("Alice", Some("Health"), 2015),
                    create_test_record("alice", Some("health"), 2013).with_flag(true),
                    create_test_record("Bob", Some("Health"), 2015).with_flag(true),
                    create_test_record("Alice", Some("Health"), 2013),
                    create_test_record("Zoe", None, 2013),
                ],
            );

            let retagged_input: Vec<_> = first.records.iter().map(|t| t.to_record()).collect();
            let second = tag_with(policy, retagged_input);

            assert_eq!(flags(&first), flags(&second), "policy {:?}", policy);
        }
    }

    #[test]
    fn test_exactly_one_original_per_recurring_group() {
        let tagged = tag_with(
            FlagPolicy::Overwrite,
            vec![
                create_test_record("Alice", Some("Health"), 2016),
                create_test_record("Bob", Some("Health"), 2013),
                create_test_record("Alice", Some("Health"), 2014),
                create_test_record("Bob", Some("Health"), 2014),
                create_test_record("Alice", Some("Health"), 2014),
                create_test_record("Cy", Some("Health"), 2020),
            ],
        );

        let mut originals: HashMap<IdentityKey, Vec<i32>> = HashMap::new();
        let mut sizes: HashMap<IdentityKey, usize> = HashMap::new();
        for t in &tagged.records {
            let key = t.key.clone().unwrap();
            *sizes.entry(key.clone()).or_default() += 1;
            if !t.reappointed {
                originals.entry(key).or_default().push(t.record.year);
            }
        }

        for (key, size) in sizes {
            let years = &originals[&key];
            assert_eq!(years.len(), 1, "{} has {} originals", key, years.len());
            let earliest = tagged
                .records
                .iter()
                .filter(|t| t.key.as_ref() == Some(&key))
                .map(|t| t.record.year)
                .min()
                .unwrap();
            assert_eq!(years[0], earliest);
            assert!(size >= 1);
        }
    }
}
