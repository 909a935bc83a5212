use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tracing::warn;

use spinbot_core::directory::{ProfileLookup, UserDirectory};
use spinbot_core::domain::participant::{Candidate, Profile};
use spinbot_core::errors::ApplicationError;

use crate::api::SlackWebApi;

/// Upper bound on concurrent `users.info` calls for one lookup.
pub const PROFILE_LOOKUP_CONCURRENCY: usize = 8;

/// Profile lookups through `users.info`, one call per id.
///
/// Ids Slack does not know are left out of the result. A failed call only
/// marks its own id as failed; the rest of the batch still resolves.
pub struct SlackDirectory {
    api: Arc<dyn SlackWebApi>,
}

impl SlackDirectory {
    pub fn new(api: Arc<dyn SlackWebApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl UserDirectory for SlackDirectory {
    async fn resolve_profiles(
        &self,
        ids: &BTreeSet<Candidate>,
    ) -> Result<ProfileLookup, ApplicationError> {
        let api = &self.api;
        let results: Vec<_> = stream::iter(ids.iter().cloned())
            .map(|id| async move {
                let result = api.user_info(id.as_str()).await;
                (id, result)
            })
            .buffer_unordered(PROFILE_LOOKUP_CONCURRENCY)
            .collect()
            .await;

        let mut lookup = ProfileLookup::default();
        for (id, result) in results {
            match result {
                Ok(Some(user)) => {
                    let mut profile = Profile::from(user);
                    profile.id = id.clone();
                    lookup.profiles.insert(id, profile);
                }
                Ok(None) => {}
                Err(error) => {
                    warn!(
                        event_name = "slack.directory.lookup_failed",
                        user_id = %id,
                        error = %error,
                        "users.info failed"
                    );
                    lookup.failed.insert(id, error.to_string());
                }
            }
        }
        Ok(lookup)
    }
}
