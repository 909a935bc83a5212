use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use spinbot_core::domain::participant::{Candidate, Message};
use spinbot_core::domain::selection::{SelectionMode, SelectionScope};
use spinbot_core::errors::ApplicationError;
use spinbot_core::selection::{
    Degradation, ParticipantSource, RecordContext, Selection, SelectionEngine, SelectionOutcome,
    SelectionRequest,
};

use crate::api::SlackWebApi;
use crate::blocks::{self, MessageTemplate};
use crate::events::{AppMentionEvent, EventContext, EventHandlerError, MentionService};

pub const DEFAULT_TASK: &str = "has to complete the task";

/// Pulls the task phrase out of a mention.
///
/// `"<@UBOT> who has to pre-order lunch? thanks"` becomes
/// `"has to pre-order lunch"`. Text before the first mention and after the
/// first `?` is dropped, mentions are removed, and a leading `who`/`wer` is
/// stripped.
pub fn extract_task(text: &str) -> String {
    let relevant = match find_mention(text, 0) {
        Some((start, _)) => &text[start..],
        None => text,
    };
    let relevant = match relevant.find('?') {
        Some(index) => &relevant[..index],
        None => relevant,
    };

    let without_mentions = remove_mentions(relevant);
    let task =
        without_mentions.trim().trim_start_matches(|ch: char| ch == ',' || ch.is_whitespace());
    let task = strip_question_word(task).trim();

    if task.is_empty() {
        DEFAULT_TASK.to_owned()
    } else {
        task.to_owned()
    }
}

/// Byte range of the next `<@ID>` token at or after `from`, where ID is
/// uppercase ASCII letters and digits.
fn find_mention(text: &str, from: usize) -> Option<(usize, usize)> {
    let mut search = from;
    while let Some(offset) = text[search..].find("<@") {
        let start = search + offset;
        let id_start = start + 2;
        let id_len = text[id_start..]
            .bytes()
            .take_while(|byte| byte.is_ascii_uppercase() || byte.is_ascii_digit())
            .count();
        let close = id_start + id_len;
        if id_len > 0 && text.as_bytes().get(close) == Some(&b'>') {
            return Some((start, close + 1));
        }
        search = id_start;
    }
    None
}

fn remove_mentions(text: &str) -> String {
    let mut output = String::with_capacity(text.len());
    let mut cursor = 0;
    while let Some((start, end)) = find_mention(text, cursor) {
        output.push_str(&text[cursor..start]);
        cursor = end;
    }
    output.push_str(&text[cursor..]);
    output
}

fn strip_question_word(task: &str) -> &str {
    for word in ["wer", "who"] {
        let Some(head) = task.get(..word.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(word) {
            continue;
        }
        let rest = &task[word.len()..];
        if rest.starts_with(char::is_whitespace) {
            return rest.trim_start();
        }
    }
    task
}

/// Answers mentions by running the selection engine over the thread or
/// channel the mention came from.
pub struct SpinMentionService {
    api: Arc<dyn SlackWebApi>,
    engine: Arc<SelectionEngine>,
}

impl SpinMentionService {
    pub fn new(api: Arc<dyn SlackWebApi>, engine: Arc<SelectionEngine>) -> Self {
        Self { api, engine }
    }

    async fn thread_source(
        &self,
        event: &AppMentionEvent,
        ctx: &EventContext,
    ) -> Option<ParticipantSource> {
        let thread_ts = event.reply_thread_ts();
        let messages = match self.api.conversation_replies(&event.channel_id, thread_ts).await {
            Ok(messages) => messages,
            Err(error) => {
                let error =
                    ApplicationError::from(error).into_interface(ctx.correlation_id.clone());
                warn!(
                    event_name = "slack.mention.replies_unavailable",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    thread_id = %thread_ts,
                    error = %error,
                    "could not fetch thread messages"
                );
                Vec::new()
            }
        };
        if messages.is_empty() {
            return None;
        }
        Some(ParticipantSource::Thread(messages.into_iter().map(Message::from).collect()))
    }

    async fn channel_source(
        &self,
        event: &AppMentionEvent,
        ctx: &EventContext,
    ) -> Option<ParticipantSource> {
        let members = match self.api.conversation_members(&event.channel_id).await {
            Ok(members) => members,
            Err(error) => {
                let error =
                    ApplicationError::from(error).into_interface(ctx.correlation_id.clone());
                warn!(
                    event_name = "slack.mention.members_unavailable",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    error = %error,
                    "could not fetch channel members"
                );
                Vec::new()
            }
        };
        if members.is_empty() {
            return None;
        }
        Some(ParticipantSource::Roster(members.into_iter().map(Candidate::from).collect()))
    }

    async fn channel_name(&self, event: &AppMentionEvent, ctx: &EventContext) -> Option<String> {
        match self.api.conversation_name(&event.channel_id).await {
            Ok(name) => name,
            Err(error) => {
                debug!(
                    correlation_id = %ctx.correlation_id,
                    channel_id = %event.channel_id,
                    error = %error,
                    "could not fetch channel name"
                );
                None
            }
        }
    }

    fn log_selection(&self, event: &AppMentionEvent, ctx: &EventContext, selection: &Selection) {
        for exclusion in &selection.excluded {
            debug!(
                correlation_id = %ctx.correlation_id,
                channel_id = %event.channel_id,
                candidate = %exclusion.candidate,
                reason = exclusion.reason.label(),
                "candidate excluded"
            );
        }
        log_degradations(event, ctx, &selection.degradations);
        info!(
            event_name = "selection.completed",
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            thread_id = %event.reply_thread_ts(),
            mode = event.mode().as_str(),
            eligible_count = selection.eligible_count,
            weighting = ?selection.weighting,
            selected = %selection.selected,
            "participant selected"
        );
    }
}

fn log_degradations(event: &AppMentionEvent, ctx: &EventContext, degradations: &[Degradation]) {
    for degradation in degradations {
        let (event_name, detail) = match degradation {
            Degradation::DirectoryUnavailable(detail) => {
                ("selection.directory_unavailable", detail)
            }
            Degradation::HistoryUnavailable(detail) => ("selection.history_unavailable", detail),
            Degradation::RecordWriteFailed(detail) => ("selection.record_write_failed", detail),
        };
        warn!(
            event_name,
            correlation_id = %ctx.correlation_id,
            channel_id = %event.channel_id,
            error = %detail,
            "selection degraded"
        );
    }
}

#[async_trait]
impl MentionService for SpinMentionService {
    async fn handle_mention(
        &self,
        event: &AppMentionEvent,
        ctx: &EventContext,
    ) -> Result<MessageTemplate, EventHandlerError> {
        let channel_id = event.channel_id.as_str();
        let thread_ts = event.reply_thread_ts();
        let mode = event.mode();
        let task = extract_task(&event.text);

        let source = match mode {
            SelectionMode::Thread => self.thread_source(event, ctx).await,
            SelectionMode::Channel => self.channel_source(event, ctx).await,
        };
        let Some(source) = source else {
            return Ok(match mode {
                SelectionMode::Thread => blocks::no_thread_messages(channel_id, thread_ts),
                SelectionMode::Channel => {
                    blocks::channel_members_unavailable(channel_id, thread_ts)
                }
            });
        };

        let request = SelectionRequest {
            scope: SelectionScope(event.channel_id.clone()),
            mode,
            source,
            record: RecordContext {
                invoked_by: Some(Candidate::from(event.user_id.as_str())),
                thread_ts: Some(thread_ts.to_owned()),
                channel_name: self.channel_name(event, ctx).await,
                task: Some(task.clone()),
            },
        };

        match self.engine.run(request).await {
            Ok(SelectionOutcome::Selected(selection)) => {
                self.log_selection(event, ctx, &selection);
                Ok(blocks::selection_message(channel_id, thread_ts, &selection.selected, &task))
            }
            Ok(SelectionOutcome::EmptyPool { reason, collected, excluded, degradations }) => {
                log_degradations(event, ctx, &degradations);
                info!(
                    event_name = "selection.empty_pool",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %channel_id,
                    mode = mode.as_str(),
                    reason = ?reason,
                    collected,
                    excluded = excluded.len(),
                    "nobody eligible to pick"
                );
                Ok(match mode {
                    SelectionMode::Thread => blocks::no_thread_humans(channel_id, thread_ts),
                    SelectionMode::Channel => blocks::everyone_busy(channel_id, thread_ts),
                })
            }
            Err(application_error) => {
                let interface = application_error.into_interface(ctx.correlation_id.clone());
                error!(
                    event_name = "selection.failed",
                    correlation_id = %ctx.correlation_id,
                    channel_id = %channel_id,
                    error = %interface,
                    "selection failed"
                );
                Ok(blocks::error_message(channel_id, thread_ts))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use spinbot_core::domain::participant::Candidate;
    use spinbot_core::domain::selection::SelectionScope;
    use spinbot_core::history::SelectionHistoryStore;
    use spinbot_core::selection::{SelectionEngine, SelectionSettings};
    use spinbot_db::InMemorySelectionHistory;

    use super::{extract_task, SpinMentionService, DEFAULT_TASK};
    use crate::api::{SlackMessage, SlackReaction, SlackUser, SlackUserProfile};
    use crate::blocks::{
        CHANNEL_MEMBERS_UNAVAILABLE, EVERYONE_BUSY, NO_THREAD_HUMANS, NO_THREAD_MESSAGES,
    };
    use crate::directory::SlackDirectory;
    use crate::events::{AppMentionEvent, EventContext, MentionService};
    use crate::testing::FakeSlackApi;

    #[test]
    fn task_is_extracted_after_the_mention() {
        assert_eq!(extract_task("<@UBOT> who has to pre-order lunch?"), "has to pre-order lunch");
        assert_eq!(
            extract_task("<@UBOT> wer muss essen vorbestellen?"),
            "muss essen vorbestellen"
        );
    }

    #[test]
    fn text_before_mention_and_after_question_mark_is_dropped() {
        assert_eq!(
            extract_task("hey team <@UBOT>, Who cleans the kitchen? today please"),
            "cleans the kitchen"
        );
    }

    #[test]
    fn all_mentions_are_removed() {
        assert_eq!(extract_task("<@UBOT> who pairs with <@U123> today"), "pairs with  today");
    }

    #[test]
    fn empty_task_falls_back_to_default() {
        assert_eq!(extract_task("<@UBOT>"), DEFAULT_TASK);
        assert_eq!(extract_task("<@UBOT> ?"), DEFAULT_TASK);
    }

    #[test]
    fn bare_question_word_is_kept() {
        assert_eq!(extract_task("<@UBOT>, who ?"), "who");
    }

    #[test]
    fn who_is_only_stripped_as_a_word() {
        assert_eq!(extract_task("<@UBOT> whoever is first"), "whoever is first");
        assert_eq!(extract_task("<@UBOT> WHO\tbrings cake"), "brings cake");
    }

    #[test]
    fn lowercase_tokens_are_not_mentions() {
        assert_eq!(extract_task("<@bot> who cooks"), "<@bot> who cooks");
    }

    fn human_message(user: &str) -> SlackMessage {
        SlackMessage {
            ts: format!("1700.{user}"),
            user: Some(user.to_owned()),
            ..SlackMessage::default()
        }
    }

    fn mention(ts: &str, thread_ts: Option<&str>) -> AppMentionEvent {
        AppMentionEvent {
            channel_id: "C1".to_owned(),
            user_id: "U1".to_owned(),
            text: "<@UBOT> who has to cook?".to_owned(),
            ts: ts.to_owned(),
            thread_ts: thread_ts.map(str::to_owned),
        }
    }

    fn service(api: FakeSlackApi) -> (SpinMentionService, Arc<InMemorySelectionHistory>) {
        let api = Arc::new(api);
        let history = Arc::new(InMemorySelectionHistory::default());
        let mut settings = SelectionSettings::new(Candidate::from("UBOT"));
        settings.excluded_status_markers = vec![":palm_tree:".to_owned()];
        settings.allowed_reaction_emojis = ["raised_hand".to_owned()].into_iter().collect();
        let engine = SelectionEngine::new(
            Arc::new(SlackDirectory::new(api.clone())),
            history.clone(),
            settings,
        );
        (SpinMentionService::new(api, Arc::new(engine)), history)
    }

    #[tokio::test]
    async fn thread_mention_picks_a_thread_participant() {
        let api = FakeSlackApi::default()
            .with_humans(&["U1", "U2"])
            .with_replies(
                "1700.1",
                vec![human_message("U1"), human_message("U2"), human_message("UBOT")],
            );
        let (service, history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.2", Some("1700.1")), &EventContext::default())
            .await
            .expect("reply");

        assert!(
            reply.fallback_text == "🎲 <@U1> has to cook"
                || reply.fallback_text == "🎲 <@U2> has to cook"
        );
        assert_eq!(reply.thread_ts.as_deref(), Some("1700.1"));

        let records = history.records(&SelectionScope("C1".to_owned())).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].participants_count, 2);
        assert_eq!(records[0].invoked_by, Some(Candidate::from("U1")));
        assert_eq!(records[0].thread_ts.as_deref(), Some("1700.1"));
        assert_eq!(records[0].task.as_deref(), Some("has to cook"));
    }

    #[tokio::test]
    async fn thread_mention_counts_allow_listed_reactions() {
        let mut root = SlackMessage {
            ts: "1700.1".to_owned(),
            bot_id: Some("B1".to_owned()),
            ..SlackMessage::default()
        };
        root.reactions =
            vec![SlackReaction { name: "raised_hand".to_owned(), users: vec!["U7".to_owned()] }];
        let api =
            FakeSlackApi::default().with_humans(&["U7"]).with_replies("1700.1", vec![root]);
        let (service, _history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.2", Some("1700.1")), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, "🎲 <@U7> has to cook");
    }

    #[tokio::test]
    async fn empty_thread_reports_missing_messages() {
        let (service, _history) = service(FakeSlackApi::default());

        let reply = service
            .handle_mention(&mention("1700.2", Some("1700.1")), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, NO_THREAD_MESSAGES);
    }

    #[tokio::test]
    async fn bot_only_thread_reports_no_humans() {
        let api = FakeSlackApi::default()
            .with_user(SlackUser { id: "UHOOK".to_owned(), is_bot: true, ..SlackUser::default() })
            .with_replies("1700.1", vec![human_message("UBOT"), human_message("UHOOK")]);
        let (service, history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.2", Some("1700.1")), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, NO_THREAD_HUMANS);
        assert_eq!(history.len(&SelectionScope("C1".to_owned())).await, 0);
    }

    #[tokio::test]
    async fn channel_mention_skips_members_with_excluded_status() {
        let api = FakeSlackApi::default()
            .with_members("C1", &["U1", "U2", "UBOT"])
            .with_humans(&["U1"])
            .with_user(SlackUser {
                id: "U2".to_owned(),
                profile: SlackUserProfile {
                    status_emoji: ":palm_tree:".to_owned(),
                    status_text: "Vacation".to_owned(),
                },
                ..SlackUser::default()
            });
        let (service, _history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.5", None), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, "🎲 <@U1> has to cook");
        assert_eq!(reply.thread_ts.as_deref(), Some("1700.5"));
    }

    #[tokio::test]
    async fn channel_without_members_reports_fetch_failure() {
        let api = FakeSlackApi { fail_members: true, ..FakeSlackApi::default() };
        let (service, _history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.5", None), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, CHANNEL_MEMBERS_UNAVAILABLE);
    }

    #[tokio::test]
    async fn failed_profile_lookup_only_skips_that_member() {
        let mut api =
            FakeSlackApi::default().with_members("C1", &["U1", "U2", "UBOT"]).with_humans(&["U1"]);
        api.failing_users.insert("U2".to_owned());
        let (service, history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.5", None), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, "🎲 <@U1> has to cook");
        let records = history.records(&SelectionScope("C1".to_owned())).await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].selected, Candidate::from("U1"));
    }

    #[tokio::test]
    async fn replies_failure_reports_missing_messages() {
        let api = FakeSlackApi { fail_replies: true, ..FakeSlackApi::default() }
            .with_replies("1700.1", vec![human_message("U3")])
            .with_humans(&["U3"]);
        let (service, history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.2", Some("1700.1")), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, NO_THREAD_MESSAGES);
        assert_eq!(history.len(&SelectionScope("C1".to_owned())).await, 0);
    }

    #[tokio::test]
    async fn busy_channel_reports_everyone_busy() {
        let api = FakeSlackApi::default().with_members("C1", &["U1", "UBOT"]).with_user(
            SlackUser {
                id: "U1".to_owned(),
                profile: SlackUserProfile {
                    status_emoji: String::new(),
                    status_text: "back soon :palm_tree:".to_owned(),
                },
                ..SlackUser::default()
            },
        );
        let (service, _history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.5", None), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, EVERYONE_BUSY);
    }

    #[tokio::test]
    async fn channel_name_failure_does_not_block_selection() {
        let api = FakeSlackApi { fail_channel_info: true, ..FakeSlackApi::default() }
            .with_members("C1", &["U1"])
            .with_humans(&["U1"]);
        let (service, history) = service(api);

        let reply = service
            .handle_mention(&mention("1700.5", None), &EventContext::default())
            .await
            .expect("reply");

        assert_eq!(reply.fallback_text, "🎲 <@U1> has to cook");
        let recent = history
            .recent_selections(&SelectionScope("C1".to_owned()), 20)
            .await
            .expect("history");
        assert_eq!(recent, vec![Candidate::from("U1")]);
    }
}
