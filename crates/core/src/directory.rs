use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;

use crate::domain::participant::{Candidate, Profile};
use crate::errors::ApplicationError;

/// Result of resolving a batch of ids.
///
/// Ids the directory does not know are in neither map. Ids whose lookup
/// failed are in `failed` with the error text; only those are affected by
/// the failure.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProfileLookup {
    pub profiles: HashMap<Candidate, Profile>,
    pub failed: BTreeMap<Candidate, String>,
}

impl ProfileLookup {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line summary of the failed ids, e.g. `U3: timed out`.
    pub fn failure_summary(&self) -> Option<String> {
        if self.failed.is_empty() {
            return None;
        }
        let parts: Vec<String> =
            self.failed.iter().map(|(id, error)| format!("{id}: {error}")).collect();
        Some(parts.join("; "))
    }
}

impl FromIterator<(Candidate, Profile)> for ProfileLookup {
    fn from_iter<I: IntoIterator<Item = (Candidate, Profile)>>(iter: I) -> Self {
        Self { profiles: iter.into_iter().collect(), failed: BTreeMap::new() }
    }
}

/// Resolves member ids to profiles. Unknown ids are absent from the result
/// rather than failing the call, and a failure for one id is reported in
/// [`ProfileLookup::failed`]. `Err` means nothing could be resolved.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn resolve_profiles(
        &self,
        ids: &BTreeSet<Candidate>,
    ) -> Result<ProfileLookup, ApplicationError>;
}

#[derive(Clone, Debug)]
struct CachedProfile {
    profile: Profile,
    fetched_at: Instant,
}

/// Read-through cache in front of another directory. Entries older than `ttl`
/// are refetched; a zero `ttl` disables caching.
pub struct CachedUserDirectory<D> {
    inner: D,
    ttl: Duration,
    entries: RwLock<HashMap<Candidate, CachedProfile>>,
}

impl<D> CachedUserDirectory<D>
where
    D: UserDirectory,
{
    pub fn new(inner: D, ttl: Duration) -> Self {
        Self { inner, ttl, entries: RwLock::new(HashMap::new()) }
    }

    pub fn cached_len(&self) -> usize {
        match self.entries.read() {
            Ok(entries) => entries.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    fn fresh_entries(
        &self,
        ids: &BTreeSet<Candidate>,
        now: Instant,
    ) -> (HashMap<Candidate, Profile>, BTreeSet<Candidate>) {
        let entries = match self.entries.read() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut hits = HashMap::new();
        let mut misses = BTreeSet::new();
        for id in ids {
            match entries.get(id) {
                Some(cached) if now.duration_since(cached.fetched_at) < self.ttl => {
                    hits.insert(id.clone(), cached.profile.clone());
                }
                _ => {
                    misses.insert(id.clone());
                }
            }
        }
        (hits, misses)
    }

    fn store(&self, profiles: &HashMap<Candidate, Profile>, now: Instant) {
        let mut entries = match self.entries.write() {
            Ok(entries) => entries,
            Err(poisoned) => poisoned.into_inner(),
        };
        entries.retain(|_, cached| now.duration_since(cached.fetched_at) < self.ttl);
        for (id, profile) in profiles {
            entries.insert(id.clone(), CachedProfile { profile: profile.clone(), fetched_at: now });
        }
    }
}

#[async_trait]
impl<D> UserDirectory for CachedUserDirectory<D>
where
    D: UserDirectory,
{
    async fn resolve_profiles(
        &self,
        ids: &BTreeSet<Candidate>,
    ) -> Result<ProfileLookup, ApplicationError> {
        if self.ttl.is_zero() {
            return self.inner.resolve_profiles(ids).await;
        }

        let (hits, misses) = self.fresh_entries(ids, Instant::now());
        let mut resolved = ProfileLookup { profiles: hits, failed: BTreeMap::new() };
        if misses.is_empty() {
            return Ok(resolved);
        }

        // Cached hits survive a failed refill; only the misses are affected.
        match self.inner.resolve_profiles(&misses).await {
            Ok(fetched) => {
                self.store(&fetched.profiles, Instant::now());
                resolved.profiles.extend(fetched.profiles);
                resolved.failed.extend(fetched.failed);
            }
            Err(error) => {
                let error = error.to_string();
                resolved.failed.extend(misses.into_iter().map(|id| (id, error.clone())));
            }
        }
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{CachedUserDirectory, ProfileLookup, UserDirectory};
    use crate::domain::participant::{Candidate, Profile};
    use crate::errors::ApplicationError;

    #[derive(Clone, Default)]
    struct CountingDirectory {
        lookups: Arc<AtomicUsize>,
        failing: Arc<AtomicBool>,
    }

    #[async_trait]
    impl UserDirectory for CountingDirectory {
        async fn resolve_profiles(
            &self,
            ids: &BTreeSet<Candidate>,
        ) -> Result<ProfileLookup, ApplicationError> {
            if self.failing.load(Ordering::SeqCst) {
                return Err(ApplicationError::DirectoryUnavailable("users.info failed".to_owned()));
            }
            self.lookups.fetch_add(ids.len(), Ordering::SeqCst);
            Ok(ids
                .iter()
                .filter(|id| id.as_str() != "UGHOST")
                .map(|id| (id.clone(), Profile::human(id.clone())))
                .collect())
        }
    }

    fn ids(values: &[&str]) -> BTreeSet<Candidate> {
        values.iter().map(|value| Candidate::from(*value)).collect()
    }

    #[tokio::test]
    async fn fresh_entries_are_served_from_cache() {
        let inner = CountingDirectory::default();
        let directory = CachedUserDirectory::new(inner.clone(), Duration::from_secs(300));

        directory.resolve_profiles(&ids(&["U1", "U2"])).await.expect("first lookup");
        let lookup = directory.resolve_profiles(&ids(&["U1", "U2", "U3"])).await.expect("second");

        assert_eq!(lookup.profiles.len(), 3);
        assert!(lookup.is_complete());
        assert_eq!(inner.lookups.load(Ordering::SeqCst), 3);
        assert_eq!(directory.cached_len(), 3);
    }

    #[tokio::test]
    async fn unknown_ids_are_absent_and_not_cached() {
        let inner = CountingDirectory::default();
        let directory = CachedUserDirectory::new(inner.clone(), Duration::from_secs(300));

        let lookup = directory.resolve_profiles(&ids(&["U1", "UGHOST"])).await.expect("lookup");

        assert!(lookup.profiles.contains_key(&Candidate::from("U1")));
        assert!(!lookup.profiles.contains_key(&Candidate::from("UGHOST")));
        assert!(lookup.failed.is_empty());
        assert_eq!(directory.cached_len(), 1);
    }

    #[tokio::test]
    async fn zero_ttl_always_reads_through() {
        let inner = CountingDirectory::default();
        let directory = CachedUserDirectory::new(inner.clone(), Duration::ZERO);

        directory.resolve_profiles(&ids(&["U1"])).await.expect("first");
        directory.resolve_profiles(&ids(&["U1"])).await.expect("second");

        assert_eq!(inner.lookups.load(Ordering::SeqCst), 2);
        assert_eq!(directory.cached_len(), 0);
    }

    #[tokio::test]
    async fn inner_failure_marks_only_the_misses_as_failed() {
        let inner = CountingDirectory::default();
        let directory = CachedUserDirectory::new(inner.clone(), Duration::from_secs(300));
        directory.resolve_profiles(&ids(&["U1", "U2"])).await.expect("warm cache");

        inner.failing.store(true, Ordering::SeqCst);

        let lookup = directory.resolve_profiles(&ids(&["U1", "U2", "U3"])).await.expect("lookup");
        assert_eq!(lookup.profiles.len(), 2);
        assert!(lookup.profiles.contains_key(&Candidate::from("U1")));
        assert!(lookup.profiles.contains_key(&Candidate::from("U2")));
        assert_eq!(lookup.failed.keys().collect::<Vec<_>>(), vec![&Candidate::from("U3")]);
        assert_eq!(
            lookup.failure_summary().as_deref(),
            Some("U3: user directory unavailable: users.info failed")
        );
    }

    #[tokio::test]
    async fn partial_failures_from_the_inner_directory_pass_through() {
        let directory =
            CachedUserDirectory::new(FlakyDirectory { broken: "U2" }, Duration::from_secs(300));

        let lookup = directory.resolve_profiles(&ids(&["U1", "U2"])).await.expect("lookup");

        assert!(lookup.profiles.contains_key(&Candidate::from("U1")));
        assert!(lookup.failed.contains_key(&Candidate::from("U2")));
        assert_eq!(directory.cached_len(), 1);
    }

    struct FlakyDirectory {
        broken: &'static str,
    }

    #[async_trait]
    impl UserDirectory for FlakyDirectory {
        async fn resolve_profiles(
            &self,
            ids: &BTreeSet<Candidate>,
        ) -> Result<ProfileLookup, ApplicationError> {
            let mut lookup = ProfileLookup::default();
            for id in ids {
                if id.as_str() == self.broken {
                    lookup.failed.insert(id.clone(), "timed out".to_owned());
                } else {
                    lookup.profiles.insert(id.clone(), Profile::human(id.clone()));
                }
            }
            Ok(lookup)
        }
    }
}
