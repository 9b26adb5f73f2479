// 🪪 Identity Resolution - group recurring appointments by normalized key

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

use crate::error::Error;
use crate::normalize::{FieldKind, FieldNormalizer};
use crate::record::AppointmentRecord;

// ============================================================================
// IDENTITY KEY
// ============================================================================

/// Normalized (name, position, organization) triple
///
/// Only constructible from three known components; a record with any
/// unknown component has no key at all.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IdentityKey {
    pub name: String,
    pub position: String,
    pub organization: String,
}

impl IdentityKey {
    /// Normalize a record's identity fields
    ///
    /// Returns the fields that normalized to unknown when no key can be built.
    pub fn from_record(
        record: &AppointmentRecord,
        normalizer: &dyn FieldNormalizer,
    ) -> Result<IdentityKey, Vec<FieldKind>> {
        let name = normalizer.normalize(FieldKind::Name, record.person_name.as_deref());
        let position = normalizer.normalize(FieldKind::Position, record.position.as_deref());
        let organization =
            normalizer.normalize(FieldKind::Organization, record.organization.as_deref());

        match (name, position, organization) {
            (n, p, o) if !n.is_unknown() && !p.is_unknown() && !o.is_unknown() => {
                Ok(IdentityKey {
                    name: n.into_known().unwrap_or_default(),
                    position: p.into_known().unwrap_or_default(),
                    organization: o.into_known().unwrap_or_default(),
                })
            }
            (n, p, o) => {
                let missing = [(FieldKind::Name, n), (FieldKind::Position, p), (FieldKind::Organization, o)]
                    .into_iter()
                    .filter(|(_, field)| field.is_unknown())
                    .map(|(kind, _)| kind)
                    .collect();
                Err(missing)
            }
        }
    }

    /// Stable short fingerprint used as `identity_id` in output tables
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        // Unit separator keeps ("a b", "c") and ("a", "b c") distinct
        hasher.update(self.name.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.position.as_bytes());
        hasher.update([0x1f]);
        hasher.update(self.organization.as_bytes());
        let digest = format!("{:x}", hasher.finalize());
        digest[..16].to_string()
    }
}

impl fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} | {} | {}", self.name, self.position, self.organization)
    }
}

// ============================================================================
// IDENTITY GROUPS
// ============================================================================

/// Records sharing one IdentityKey, as indices into the resolved record set
#[derive(Debug, Clone, PartialEq)]
pub struct IdentityGroup {
    pub key: IdentityKey,
    /// Indices in ingestion order (not yet chronologically sorted)
    pub members: Vec<usize>,
}

impl IdentityGroup {
    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn is_recurring(&self) -> bool {
        self.members.len() > 1
    }
}

/// Outcome of key resolution for one record
#[derive(Debug, Clone, PartialEq)]
pub enum KeyResolution {
    Keyed(IdentityKey),
    /// Excluded from grouping: these fields normalized to unknown
    Missing(Vec<FieldKind>),
}

impl KeyResolution {
    pub fn key(&self) -> Option<&IdentityKey> {
        match self {
            KeyResolution::Keyed(key) => Some(key),
            KeyResolution::Missing(_) => None,
        }
    }
}

/// Records with their resolved keys, plus the groups over keyed records
#[derive(Debug, Clone)]
pub struct ResolvedRecords {
    pub records: Vec<AppointmentRecord>,
    /// Parallel to `records`
    pub keys: Vec<KeyResolution>,
    /// In order of each group's first ingested member
    pub groups: Vec<IdentityGroup>,
}

impl ResolvedRecords {
    pub fn keyed_count(&self) -> usize {
        self.keys.iter().filter(|k| k.key().is_some()).count()
    }

    pub fn excluded_count(&self) -> usize {
        self.keys.len() - self.keyed_count()
    }
}

// ============================================================================
// RESOLVER
// ============================================================================

pub struct IdentityResolver<'a> {
    normalizer: &'a dyn FieldNormalizer,
}

impl<'a> IdentityResolver<'a> {
    pub fn new(normalizer: &'a dyn FieldNormalizer) -> Self {
        IdentityResolver { normalizer }
    }

    /// Key every record and partition the keyed ones into groups
    pub fn resolve(&self, records: Vec<AppointmentRecord>) -> ResolvedRecords {
        let mut keys = Vec::with_capacity(records.len());
        let mut groups: Vec<IdentityGroup> = Vec::new();
        let mut group_index: HashMap<IdentityKey, usize> = HashMap::new();

        for (idx, record) in records.iter().enumerate() {
            match IdentityKey::from_record(record, self.normalizer) {
                Ok(key) => {
                    match group_index.get(&key) {
                        Some(&g) => groups[g].members.push(idx),
                        None => {
                            group_index.insert(key.clone(), groups.len());
                            groups.push(IdentityGroup {
                                key: key.clone(),
                                members: vec![idx],
                            });
                        }
                    }
                    keys.push(KeyResolution::Keyed(key));
                }
                Err(missing) => {
                    let reason = Error::MissingField {
                        sequence: record.sequence,
                        fields: missing.clone(),
                    };
                    tracing::debug!(year = record.year, "excluded from identity grouping: {}", reason);
                    keys.push(KeyResolution::Missing(missing));
                }
            }
        }

        ResolvedRecords {
            records,
            keys,
            groups,
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================
