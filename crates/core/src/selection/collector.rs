use std::collections::BTreeSet;

use crate::domain::participant::{Candidate, Message};

/// Merges message authors and, when `allowed_reaction_emojis` is non-empty,
/// reactors of the allow-listed emojis into one deduplicated pool.
///
/// Bot-authored messages never contribute their author. An empty allow-list
/// disables reaction collection entirely.
pub fn collect(
    messages: &[Message],
    allowed_reaction_emojis: &BTreeSet<String>,
) -> BTreeSet<Candidate> {
    let mut pool = BTreeSet::new();

    for message in messages {
        if !message.is_from_bot {
            if let Some(author) = &message.author {
                pool.insert(author.clone());
            }
        }

        if allowed_reaction_emojis.is_empty() {
            continue;
        }

        for reaction in &message.reactions {
            if allowed_reaction_emojis.contains(&reaction.emoji_name) {
                pool.extend(reaction.reactors.iter().cloned());
            }
        }
    }

    pool
}

/// Deduplicates a channel roster.
pub fn collect_roster<I>(members: I) -> BTreeSet<Candidate>
where
    I: IntoIterator<Item = Candidate>,
{
    members.into_iter().collect()
}
