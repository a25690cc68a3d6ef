//! Primary store and the derived secondary indices.
//!
//! Secondary lists are append-only: the first entry of any list is the
//! earliest registrant and is treated as the original for its tier.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::dispute::Dispute;
use super::roles::Roles;
use super::types::{DetectResult, MatchKind, Principal, Record, SimilarRecord};
use crate::error::{FirstmarkError, Result};
use crate::fingerprint::{hamming_distance, AudioToken, ExactHash, FingerprintTriple, PerceptualHash};

#[derive(Debug)]
pub(crate) struct RegistryState {
    records: HashMap<ExactHash, Record>,
    /// Exact hashes in registration order
    order: Vec<ExactHash>,
    by_perceptual: HashMap<PerceptualHash, Vec<ExactHash>>,
    by_audio: HashMap<AudioToken, Vec<ExactHash>>,
    by_owner: HashMap<Principal, Vec<ExactHash>>,
    /// Dispute `n` lives at index `n - 1`
    pub(crate) disputes: Vec<Dispute>,
    pub(crate) roles: Roles,
    last_timestamp: Option<DateTime<Utc>>,
}

impl RegistryState {
    pub(crate) fn new(roles: Roles) -> Self {
        Self {
            records: HashMap::new(),
            order: Vec::new(),
            by_perceptual: HashMap::new(),
            by_audio: HashMap::new(),
            by_owner: HashMap::new(),
            disputes: Vec::new(),
            roles,
            last_timestamp: None,
        }
    }

    /// Tier-ordered lookup; the first hit wins.
    pub(crate) fn detect(&self, fp: &FingerprintTriple) -> DetectResult {
        if let Some(record) = self.records.get(&fp.exact) {
            return DetectResult::hit(MatchKind::ExactDuplicate, record);
        }

        if let Some(record) = fp
            .perceptual
            .as_ref()
            .and_then(|p| self.first_registrant(self.by_perceptual.get(p)))
        {
            return DetectResult::hit(MatchKind::VisualMatch, record);
        }

        if let Some(record) = fp
            .audio
            .as_ref()
            .and_then(|a| self.first_registrant(self.by_audio.get(a)))
        {
            return DetectResult::hit(MatchKind::AudioMatch, record);
        }

        DetectResult::original()
    }

    fn first_registrant(&self, list: Option<&Vec<ExactHash>>) -> Option<&Record> {
        list.and_then(|hashes| hashes.first())
            .and_then(|exact| self.records.get(exact))
    }

    /// Check every precondition of an insert without touching state.
    pub(crate) fn check_insertable(&self, owner: &Principal, fp: &FingerprintTriple) -> Result<()> {
        fp.validate()?;
        if owner.is_empty() {
            return Err(FirstmarkError::InvalidIdentity(
                "owner must not be empty".into(),
            ));
        }
        if self.records.contains_key(&fp.exact) {
            return Err(FirstmarkError::AlreadyRegistered(fp.exact));
        }
        Ok(())
    }

    /// Insert a record and append it to every applicable index.
    pub(crate) fn insert(&mut self, record: Record) -> Result<()> {
        self.check_insertable(&record.owner, &record.fingerprint)?;

        let exact = record.exact();
        if let Some(p) = &record.fingerprint.perceptual {
            self.by_perceptual.entry(p.clone()).or_default().push(exact);
        }
        if let Some(a) = &record.fingerprint.audio {
            self.by_audio.entry(a.clone()).or_default().push(exact);
        }
        self.by_owner
            .entry(record.owner.clone())
            .or_default()
            .push(exact);
        self.order.push(exact);

        self.last_timestamp = Some(match self.last_timestamp {
            Some(last) => last.max(record.created_at),
            None => record.created_at,
        });
        self.records.insert(exact, record);
        Ok(())
    }

    /// Current time, clamped so it never precedes an earlier registration.
    pub(crate) fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.last_timestamp {
            Some(last) if last > now => last,
            _ => now,
        }
    }

    pub(crate) fn record(&self, exact: &ExactHash) -> Option<&Record> {
        self.records.get(exact)
    }

    pub(crate) fn record_mut(&mut self, exact: &ExactHash) -> Option<&mut Record> {
        self.records.get_mut(exact)
    }

    pub(crate) fn records_by_owner(&self, owner: &Principal) -> Vec<Record> {
        self.by_owner
            .get(owner)
            .map(|hashes| {
                hashes
                    .iter()
                    .filter_map(|exact| self.records.get(exact))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Records in registration order.
    pub(crate) fn records_in_order(&self) -> impl Iterator<Item = &Record> {
        self.order.iter().filter_map(|exact| self.records.get(exact))
    }

    pub(crate) fn len(&self) -> usize {
        self.order.len()
    }

    /// Linear scan over registered perceptual hashes of the same length.
    pub(crate) fn similar(
        &self,
        query: &PerceptualHash,
        max_distance: u32,
        limit: usize,
    ) -> Vec<SimilarRecord> {
        // (distance, registration position, record)
        let mut hits: Vec<(u32, usize, &Record)> = self
            .order
            .iter()
            .enumerate()
            .filter_map(|(position, exact)| {
                let record = self.records.get(exact)?;
                let hash = record.fingerprint.perceptual.as_ref()?;
                let distance = hamming_distance(query, hash).ok()?;
                (distance <= max_distance).then_some((distance, position, record))
            })
            .collect();

        hits.sort_by_key(|(distance, position, _)| (*distance, *position));
        hits.into_iter()
            .take(limit)
            .map(|(hamming_distance, _, record)| SimilarRecord {
                record: record.clone(),
                hamming_distance,
            })
            .collect()
    }
}
