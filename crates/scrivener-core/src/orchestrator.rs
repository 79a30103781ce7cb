//! One conversational turn: prompt in, archived artifact out.
//!
//! The prompt is persisted before generation starts and the reply only after
//! the generator returns, so a failed or cancelled turn leaves the log ending
//! in an unanswered prompt that [`Orchestrator::retry`] can pick up. The reply
//! and its artifact are stored together or not at all.

use std::fmt;

use anyhow::anyhow;
use futures_util::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use uuid::Uuid;

use scrivener_provider::{ContextMessage, GenerationOptions, Generator, ProviderError};
use scrivener_types::models::{ContentType, GeneratedArtifact, Length, Message, Role, Tone};

use crate::Stores;
use crate::error::{CoreError, CoreResult};
use crate::messages::Reply;
use crate::sessions::title_from_prompt;

pub const DEFAULT_MAX_TURNS: usize = 20;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 24_000;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub model: String,
    /// Most recent messages sent as context, the new prompt included.
    pub max_turns: usize,
    pub max_context_chars: usize,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            model: scrivener_provider::groq::DEFAULT_MODEL.to_string(),
            max_turns: DEFAULT_MAX_TURNS,
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TurnRequest {
    pub user_id: Uuid,
    /// `None` opens a new session titled after the prompt.
    pub session_id: Option<Uuid>,
    pub prompt: String,
    pub content_type: ContentType,
    /// Falls back to the user's preferences when unset.
    pub tone: Option<Tone>,
    pub length: Option<Length>,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    pub artifact: GeneratedArtifact,
}

/// A turn whose prompt is in the log and awaits generation.
#[derive(Debug, Clone)]
pub struct PendingTurn {
    pub user_id: Uuid,
    pub session_id: Uuid,
    pub prompt: String,
    /// Set on retries: the reply must answer exactly this prompt.
    prompt_seq: Option<u32>,
    pub content_type: ContentType,
    pub tone: Option<Tone>,
    pub length: Option<Length>,
}

#[derive(Debug, Clone)]
pub enum TurnEvent {
    Delta(String),
    Completed(TurnOutcome),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    AwaitingPrompt,
    ContextAssembled,
    GenerationInFlight,
    Completed,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TurnState::AwaitingPrompt => "awaiting_prompt",
            TurnState::ContextAssembled => "context_assembled",
            TurnState::GenerationInFlight => "generation_in_flight",
            TurnState::Completed => "completed",
            TurnState::Failed => "failed",
        })
    }
}

pub struct Orchestrator<G> {
    stores: Stores,
    generator: G,
    config: OrchestratorConfig,
}

impl<G: Generator> Orchestrator<G> {
    pub fn new(stores: Stores, generator: G, config: OrchestratorConfig) -> Self {
        Self {
            stores,
            generator,
            config,
        }
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub async fn run_turn(&self, req: TurnRequest, cancel: &CancellationToken) -> CoreResult<TurnOutcome> {
        let turn = self.begin_turn(req).await?;
        self.complete(turn, cancel).await
    }

    /// Validate the request, open or authorize the session and append the
    /// prompt. Nothing is generated yet.
    pub async fn begin_turn(&self, req: TurnRequest) -> CoreResult<PendingTurn> {
        debug!(user_id = %req.user_id, state = %TurnState::AwaitingPrompt, "Turn started");
        let prompt = req.prompt.trim().to_string();
        if prompt.is_empty() {
            return Err(CoreError::Validation("prompt must not be empty".into()));
        }

        let stores = self.stores.clone();
        let (user_id, content_type, session) = (req.user_id, req.content_type, req.session_id);
        let text = prompt.clone();
        let session_id = blocking(move || {
            let session_id = match session {
                Some(id) => stores.sessions.get(id, user_id)?.id,
                None => stores
                    .sessions
                    .create(user_id, Some(content_type), Some(&title_from_prompt(&text)))?,
            };
            stores.messages.append(session_id, Role::User, &text)?;
            Ok(session_id)
        })
        .await?;

        Ok(PendingTurn {
            user_id,
            session_id,
            prompt,
            prompt_seq: None,
            content_type,
            tone: req.tone,
            length: req.length,
        })
    }

    /// Re-run generation for a session whose last message is an unanswered
    /// prompt. Nothing is appended before the generator succeeds, and the
    /// reply is refused if another completion answered the prompt first.
    pub async fn retry(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        content_type: ContentType,
        tone: Option<Tone>,
        length: Option<Length>,
        cancel: &CancellationToken,
    ) -> CoreResult<TurnOutcome> {
        let stores = self.stores.clone();
        let last = blocking(move || {
            stores.sessions.get(session_id, user_id)?;
            stores.messages.last(session_id)
        })
        .await?;

        let (prompt, seq) = match last {
            Some(Message {
                role: Role::User,
                content,
                seq,
                ..
            }) => (content, seq),
            _ => {
                return Err(CoreError::Validation(
                    "session has no unanswered prompt to retry".into(),
                ));
            }
        };
        debug!(session_id = %session_id, seq, "Retrying turn");
        let turn = PendingTurn {
            user_id,
            session_id,
            prompt,
            prompt_seq: Some(seq),
            content_type,
            tone,
            length,
        };
        self.complete(turn, cancel).await
    }

    /// Generate for a begun turn, yielding reply chunks as they arrive and
    /// [`TurnEvent::Completed`] once everything is stored. The reply is
    /// persisted only after the last chunk; an error, cancellation or a
    /// dropped stream leaves the log ending in the prompt.
    pub fn stream_turn<'a>(
        &'a self,
        turn: PendingTurn,
        cancel: CancellationToken,
    ) -> impl Stream<Item = CoreResult<TurnEvent>> + Send + 'a {
        async_stream::try_stream! {
            let (context, options) = self.prepare(&turn).await?;
            let session_id = turn.session_id;
            debug!(session_id = %session_id, state = %TurnState::GenerationInFlight, model = %options.model, "Streaming");

            let mut chunks = self.generator.generate_stream(&context, &options);
            let mut reply = String::new();
            loop {
                // `None` means cancelled
                let next = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => None,
                    next = chunks.next() => Some(next),
                };
                match next {
                    None => {
                        debug!(session_id = %session_id, state = %TurnState::Failed, "Generation cancelled");
                        Err::<(), _>(CoreError::Cancelled)?;
                    }
                    Some(Some(Ok(chunk))) => {
                        reply.push_str(&chunk);
                        yield TurnEvent::Delta(chunk);
                    }
                    Some(Some(Err(err))) => {
                        warn!(session_id = %session_id, state = %TurnState::Failed, "Generation failed: {}", err);
                        Err::<(), _>(CoreError::from(err))?;
                    }
                    Some(None) => break,
                }
            }
            drop(chunks);

            let outcome = self.finish(turn, options, reply).await?;
            yield TurnEvent::Completed(outcome);
        }
    }

    async fn complete(&self, turn: PendingTurn, cancel: &CancellationToken) -> CoreResult<TurnOutcome> {
        let (context, options) = self.prepare(&turn).await?;
        let session_id = turn.session_id;

        debug!(session_id = %session_id, state = %TurnState::GenerationInFlight, model = %options.model, "Generating");
        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!(session_id = %session_id, state = %TurnState::Failed, "Generation cancelled");
                return Err(CoreError::Cancelled);
            }
            result = self.generator.generate(&context, &options) => result,
        };

        let reply = match result {
            Ok(reply) => reply,
            Err(err) => {
                warn!(session_id = %session_id, state = %TurnState::Failed, "Generation failed: {}", err);
                return Err(err.into());
            }
        };
        self.finish(turn, options, reply).await
    }

    /// Resolve tone and length against the user's preferences and assemble
    /// the context window, the new prompt included.
    async fn prepare(&self, turn: &PendingTurn) -> CoreResult<(Vec<ContextMessage>, GenerationOptions)> {
        let stores = self.stores.clone();
        let window = u32::try_from(self.config.max_turns.max(1)).unwrap_or(u32::MAX);
        let (user_id, session_id, tone, length) = (turn.user_id, turn.session_id, turn.tone, turn.length);
        let (history, tone, length) = blocking(move || {
            let (tone, length) = match (tone, length) {
                (Some(t), Some(l)) => (t, l),
                (t, l) => {
                    let prefs = stores.preferences.get(user_id)?;
                    (t.unwrap_or(prefs.default_tone), l.unwrap_or(prefs.default_length))
                }
            };
            let history = stores.messages.history(session_id, Some(window), false)?;
            Ok((history, tone, length))
        })
        .await?;

        let context = assemble_context(&history, self.config.max_turns, self.config.max_context_chars);
        debug!(
            session_id = %session_id,
            state = %TurnState::ContextAssembled,
            turns = context.len(),
            chars = context_chars(&context),
            "Context assembled"
        );

        let options = GenerationOptions {
            content_type: turn.content_type,
            tone,
            length,
            model: self.config.model.clone(),
        };
        Ok((context, options))
    }

    /// Store the reply and its artifact in one transaction.
    async fn finish(&self, turn: PendingTurn, options: GenerationOptions, reply: String) -> CoreResult<TurnOutcome> {
        let session_id = turn.session_id;
        if reply.trim().is_empty() {
            warn!(session_id = %session_id, state = %TurnState::Failed, "Generator returned an empty reply");
            return Err(CoreError::FatalProvider(ProviderError::InvalidResponse(
                "generator returned an empty reply".into(),
            )));
        }

        let stores = self.stores.clone();
        let artifact = blocking(move || {
            let (_, artifact_id) = stores.messages.append_reply(&Reply {
                user_id: turn.user_id,
                session_id,
                answers_seq: turn.prompt_seq,
                content_type: options.content_type,
                prompt: &turn.prompt,
                text: &reply,
                tone: options.tone,
                length: options.length,
            })?;
            stores.content.get(artifact_id, turn.user_id)
        })
        .await?;

        debug!(
            session_id = %session_id,
            artifact_id = %artifact.id,
            state = %TurnState::Completed,
            "Turn completed"
        );
        Ok(TurnOutcome { session_id, artifact })
    }
}

/// Trim `history` (oldest first) to the turn and character budgets by
/// dropping the oldest messages. The newest message always survives.
pub fn assemble_context(history: &[Message], max_turns: usize, max_chars: usize) -> Vec<ContextMessage> {
    let mut start = history.len().saturating_sub(max_turns.max(1));
    let mut chars: usize = history[start..].iter().map(|m| m.content.chars().count()).sum();
    while chars > max_chars && start + 1 < history.len() {
        chars -= history[start].content.chars().count();
        start += 1;
    }

    history[start..]
        .iter()
        .map(|m| ContextMessage {
            role: m.role,
            content: m.content.clone(),
        })
        .collect()
}

fn context_chars(context: &[ContextMessage]) -> usize {
    context.iter().map(|m| m.content.chars().count()).sum()
}

async fn blocking<T, F>(f: F) -> CoreResult<T>
where
    F: FnOnce() -> CoreResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| CoreError::Storage(anyhow!("store task failed: {}", e)))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use chrono::Utc;
    use scrivener_db::Database;
    use scrivener_provider::ChunkStream;
    use scrivener_types::api::ArtifactFilter;
    use scrivener_types::models::Theme;

    /// Replays canned results and records every context it was given.
    #[derive(Clone, Default)]
    struct ScriptedGenerator {
        replies: Arc<Mutex<VecDeque<Result<String, ProviderError>>>>,
        seen: Arc<Mutex<Vec<(Vec<ContextMessage>, GenerationOptions)>>>,
    }

    impl ScriptedGenerator {
        fn new(replies: Vec<Result<String, ProviderError>>) -> Self {
            Self {
                replies: Arc::new(Mutex::new(replies.into())),
                seen: Arc::default(),
            }
        }

        fn calls(&self) -> Vec<(Vec<ContextMessage>, GenerationOptions)> {
            self.seen.lock().unwrap().clone()
        }
    }

    impl Generator for ScriptedGenerator {
        async fn generate(
            &self,
            context: &[ContextMessage],
            options: &GenerationOptions,
        ) -> Result<String, ProviderError> {
            self.seen.lock().unwrap().push((context.to_vec(), options.clone()));
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(ProviderError::Unavailable("script exhausted".into())))
        }
    }

    /// Never answers.
    struct PendingGenerator;

    impl Generator for PendingGenerator {
        async fn generate(&self, _: &[ContextMessage], _: &GenerationOptions) -> Result<String, ProviderError> {
            std::future::pending().await
        }
    }

    /// Streams its chunks, then optionally fails.
    struct ChunkedGenerator {
        chunks: Vec<&'static str>,
        then_fail: bool,
    }

    impl Generator for ChunkedGenerator {
        async fn generate(&self, _: &[ContextMessage], _: &GenerationOptions) -> Result<String, ProviderError> {
            Ok(self.chunks.concat())
        }

        fn generate_stream<'a>(&'a self, _: &'a [ContextMessage], _: &'a GenerationOptions) -> ChunkStream<'a> {
            let mut items: Vec<Result<String, ProviderError>> =
                self.chunks.iter().map(|c| Ok(c.to_string())).collect();
            if self.then_fail {
                items.push(Err(ProviderError::Timeout));
            }
            Box::pin(futures_util::stream::iter(items))
        }
    }

    /// Deletes the session while "generating", then answers anyway.
    struct DeletingGenerator {
        stores: Stores,
        user: Uuid,
        session: Uuid,
    }

    impl Generator for DeletingGenerator {
        async fn generate(&self, _: &[ContextMessage], _: &GenerationOptions) -> Result<String, ProviderError> {
            self.stores.sessions.delete(self.session, self.user).unwrap();
            Ok("too late".into())
        }
    }

    /// Holds every caller until `n` of them are generating at once.
    struct GatedGenerator(tokio::sync::Barrier);

    impl Generator for GatedGenerator {
        async fn generate(&self, _: &[ContextMessage], _: &GenerationOptions) -> Result<String, ProviderError> {
            self.0.wait().await;
            Ok("the answer".into())
        }
    }

    fn setup<G: Generator>(generator: G) -> (Orchestrator<G>, Stores, Uuid) {
        let stores = Stores::new(Arc::new(Database::open_in_memory().unwrap()));
        let user = stores.credentials.register("writer@x.com", "Secret123!", None).unwrap();
        let orchestrator = Orchestrator::new(stores.clone(), generator, OrchestratorConfig::default());
        (orchestrator, stores, user)
    }

    fn turn(user_id: Uuid, session_id: Option<Uuid>, prompt: &str) -> TurnRequest {
        TurnRequest {
            user_id,
            session_id,
            prompt: prompt.into(),
            content_type: ContentType::LinkedinPost,
            tone: Some(Tone::Professional),
            length: Some(Length::Medium),
        }
    }

    fn message(seq: u32, role: Role, content: &str) -> Message {
        Message {
            id: Uuid::new_v4(),
            session_id: Uuid::nil(),
            seq,
            role,
            content: content.into(),
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn linkedin_post_end_to_end() {
        let generator = ScriptedGenerator::new(vec![Ok("Check out Rust...".into())]);
        let (orchestrator, stores, user) = setup(generator.clone());

        let outcome = orchestrator
            .run_turn(turn(user, None, "Write a LinkedIn post about Rust"), &CancellationToken::new())
            .await
            .unwrap();

        let log = stores.messages.history(outcome.session_id, None, false).unwrap();
        let entries: Vec<(Role, &str)> = log.iter().map(|m| (m.role, m.content.as_str())).collect();
        assert_eq!(
            entries,
            vec![
                (Role::User, "Write a LinkedIn post about Rust"),
                (Role::Assistant, "Check out Rust..."),
            ]
        );

        let archive = stores.content.list_by_user(user, &ArtifactFilter::default()).unwrap();
        assert_eq!(archive.len(), 1);
        assert_eq!(archive[0].id, outcome.artifact.id);
        assert_eq!(outcome.artifact.session_id, Some(outcome.session_id));
        assert_eq!(outcome.artifact.content_type, ContentType::LinkedinPost);
        assert_eq!(outcome.artifact.generated_text, "Check out Rust...");

        let session = stores.sessions.get(outcome.session_id, user).unwrap();
        assert_eq!(session.title, "Write a LinkedIn post about Rust");
        assert_eq!(session.content_type, Some(ContentType::LinkedinPost));

        let calls = generator.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0.len(), 1);
        assert_eq!(calls[0].0[0].role, Role::User);
    }

    #[tokio::test]
    async fn transient_failure_then_retry() {
        let generator = ScriptedGenerator::new(vec![
            Err(ProviderError::RateLimited { retry_after_secs: Some(1) }),
            Ok("Second time lucky".into()),
        ]);
        let (orchestrator, stores, user) = setup(generator.clone());
        let session = stores.sessions.create(user, None, None).unwrap();
        let cancel = CancellationToken::new();

        let err = orchestrator
            .run_turn(turn(user, Some(session), "Draft a post"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::TransientProvider(_)));

        let log = stores.messages.history(session, None, false).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].role, Role::User);
        assert!(stores.content.list_by_user(user, &ArtifactFilter::default()).unwrap().is_empty());

        let outcome = orchestrator
            .retry(user, session, ContentType::LinkedinPost, None, None, &cancel)
            .await
            .unwrap();
        assert_eq!(outcome.artifact.prompt, "Draft a post");
        let log = stores.messages.history(session, None, false).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].content, "Second time lucky");

        // Both attempts saw the same single-prompt context
        let calls = generator.calls();
        assert_eq!(calls[0].0, calls[1].0);

        // Nothing left to retry
        let err = orchestrator
            .retry(user, session, ContentType::LinkedinPost, None, None, &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
    }

    #[tokio::test]
    async fn fatal_failure_is_not_transient() {
        let generator = ScriptedGenerator::new(vec![Err(ProviderError::AuthRejected)]);
        let (orchestrator, stores, user) = setup(generator);
        let err = orchestrator
            .run_turn(turn(user, None, "hello"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FatalProvider(ProviderError::AuthRejected)));
        let sessions = stores.sessions.list(user, None).unwrap();
        assert_eq!(sessions[0].message_count, 1);
    }

    #[tokio::test]
    async fn cancellation_leaves_only_the_prompt() {
        let (orchestrator, stores, user) = setup(PendingGenerator);
        let session = stores.sessions.create(user, None, None).unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = orchestrator
            .run_turn(turn(user, Some(session), "never answered"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Cancelled));

        let log = stores.messages.history(session, None, false).unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].content, "never answered");
        assert!(stores.content.list_by_user(user, &ArtifactFilter::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_requests_touch_nothing() {
        let generator = ScriptedGenerator::new(vec![Ok("unused".into())]);
        let (orchestrator, stores, user) = setup(generator.clone());
        let cancel = CancellationToken::new();

        let err = orchestrator.run_turn(turn(user, None, "   "), &cancel).await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(stores.sessions.list(user, None).unwrap().is_empty());

        let other = stores.credentials.register("other@x.com", "Secret123!", None).unwrap();
        let foreign = stores.sessions.create(other, None, None).unwrap();
        let err = orchestrator
            .run_turn(turn(user, Some(foreign), "hijack"), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::Forbidden));
        assert!(stores.messages.history(foreign, None, false).unwrap().is_empty());
        assert!(generator.calls().is_empty());
    }

    #[tokio::test]
    async fn preferences_fill_missing_tone_and_length() {
        let generator = ScriptedGenerator::new(vec![Ok("hey!".into())]);
        let (orchestrator, stores, user) = setup(generator.clone());
        stores
            .preferences
            .update(user, Some(Tone::Casual), Some(Length::Short), Some(Theme::Dark))
            .unwrap();

        let mut req = turn(user, None, "caption for a beach photo");
        req.content_type = ContentType::SocialMediaCaption;
        req.tone = None;
        req.length = None;
        let outcome = orchestrator.run_turn(req, &CancellationToken::new()).await.unwrap();

        assert_eq!(outcome.artifact.tone, Tone::Casual);
        assert_eq!(outcome.artifact.length, Length::Short);
        let options = &generator.calls()[0].1;
        assert_eq!(options.tone, Tone::Casual);
        assert_eq!(options.model, OrchestratorConfig::default().model);
    }

    #[tokio::test]
    async fn follow_up_turns_carry_history() {
        let generator = ScriptedGenerator::new(vec![Ok("first reply".into()), Ok("second reply".into())]);
        let (orchestrator, _stores, user) = setup(generator.clone());
        let cancel = CancellationToken::new();

        let first = orchestrator.run_turn(turn(user, None, "first"), &cancel).await.unwrap();
        orchestrator
            .run_turn(turn(user, Some(first.session_id), "make it shorter"), &cancel)
            .await
            .unwrap();

        let contents: Vec<String> = generator.calls()[1].0.iter().map(|m| m.content.clone()).collect();
        assert_eq!(contents, vec!["first", "first reply", "make it shorter"]);
    }

    #[tokio::test]
    async fn empty_reply_is_a_provider_failure() {
        let generator = ScriptedGenerator::new(vec![Ok("  \n".into())]);
        let (orchestrator, stores, user) = setup(generator);
        let session = stores.sessions.create(user, None, None).unwrap();

        let err = orchestrator
            .run_turn(turn(user, Some(session), "say something"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::FatalProvider(ProviderError::InvalidResponse(_))));
        assert_eq!(stores.messages.history(session, None, false).unwrap().len(), 1);
        assert!(stores.content.list_by_user(user, &ArtifactFilter::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn session_deleted_mid_generation_stores_nothing() {
        let stores = Stores::new(Arc::new(Database::open_in_memory().unwrap()));
        let user = stores.credentials.register("writer@x.com", "Secret123!", None).unwrap();
        let session = stores.sessions.create(user, None, None).unwrap();
        let generator = DeletingGenerator {
            stores: stores.clone(),
            user,
            session,
        };
        let orchestrator = Orchestrator::new(stores.clone(), generator, OrchestratorConfig::default());

        let err = orchestrator
            .run_turn(turn(user, Some(session), "doomed"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::NotFound("session")));
        assert!(stores.messages.history(session, None, false).unwrap().is_empty());
        assert!(stores.content.list_by_user(user, &ArtifactFilter::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn concurrent_retries_answer_once() {
        let (orchestrator, stores, user) = setup(GatedGenerator(tokio::sync::Barrier::new(2)));
        let session = stores.sessions.create(user, None, None).unwrap();
        stores.messages.append(session, Role::User, "unanswered").unwrap();
        let cancel = CancellationToken::new();

        let (first, second) = tokio::join!(
            orchestrator.retry(user, session, ContentType::BlogPost, None, None, &cancel),
            orchestrator.retry(user, session, ContentType::BlogPost, None, None, &cancel),
        );
        let (ok, refused): (Vec<_>, Vec<_>) = [first, second].into_iter().partition(Result::is_ok);
        assert_eq!(ok.len(), 1);
        assert!(matches!(refused[0], Err(CoreError::Validation(_))));

        let roles: Vec<Role> = stores
            .messages
            .history(session, None, false)
            .unwrap()
            .into_iter()
            .map(|m| m.role)
            .collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant]);
        assert_eq!(stores.content.list_by_user(user, &ArtifactFilter::default()).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn streamed_turn_is_stored_after_the_last_chunk() {
        let generator = ChunkedGenerator {
            chunks: vec!["Check out ", "Rust", "..."],
            then_fail: false,
        };
        let (orchestrator, stores, user) = setup(generator);
        let pending = orchestrator
            .begin_turn(turn(user, None, "Write a LinkedIn post about Rust"))
            .await
            .unwrap();
        let session = pending.session_id;

        let events: Vec<CoreResult<TurnEvent>> =
            orchestrator.stream_turn(pending, CancellationToken::new()).collect().await;
        let mut deltas = Vec::new();
        let mut outcome = None;
        for event in events {
            match event.unwrap() {
                TurnEvent::Delta(text) => deltas.push(text),
                TurnEvent::Completed(done) => outcome = Some(done),
            }
        }
        assert_eq!(deltas, vec!["Check out ", "Rust", "..."]);
        let outcome = outcome.unwrap();
        assert_eq!(outcome.session_id, session);
        assert_eq!(outcome.artifact.generated_text, "Check out Rust...");

        let log = stores.messages.history(session, None, false).unwrap();
        assert_eq!(log.len(), 2);
        assert_eq!(log[1].content, "Check out Rust...");
    }

    #[tokio::test]
    async fn failed_or_abandoned_stream_keeps_only_the_prompt() {
        let generator = ChunkedGenerator {
            chunks: vec!["partial "],
            then_fail: true,
        };
        let (orchestrator, stores, user) = setup(generator);

        let pending = orchestrator.begin_turn(turn(user, None, "first")).await.unwrap();
        let failed = pending.session_id;
        let events: Vec<CoreResult<TurnEvent>> =
            orchestrator.stream_turn(pending, CancellationToken::new()).collect().await;
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], Ok(TurnEvent::Delta(_))));
        assert!(matches!(events[1], Err(CoreError::TransientProvider(ProviderError::Timeout))));
        assert_eq!(stores.messages.history(failed, None, false).unwrap().len(), 1);

        // The client goes away after the first chunk
        let pending = orchestrator.begin_turn(turn(user, None, "second")).await.unwrap();
        let abandoned = pending.session_id;
        {
            let mut stream = std::pin::pin!(orchestrator.stream_turn(pending, CancellationToken::new()));
            assert!(matches!(stream.next().await, Some(Ok(TurnEvent::Delta(_)))));
        }
        assert_eq!(stores.messages.history(abandoned, None, false).unwrap().len(), 1);
        assert!(stores.content.list_by_user(user, &ArtifactFilter::default()).unwrap().is_empty());
    }

    #[tokio::test]
    async fn cancelled_stream_yields_cancelled() {
        let (orchestrator, stores, user) = setup(PendingGenerator);
        let pending = orchestrator.begin_turn(turn(user, None, "never answered")).await.unwrap();
        let session = pending.session_id;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let events: Vec<CoreResult<TurnEvent>> = orchestrator.stream_turn(pending, cancel).collect().await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], Err(CoreError::Cancelled)));
        assert_eq!(stores.messages.history(session, None, false).unwrap().len(), 1);
    }

    #[test]
    fn context_respects_turn_budget() {
        let history: Vec<Message> = (1..=30)
            .map(|i| message(i, if i % 2 == 1 { Role::User } else { Role::Assistant }, &format!("m{i}")))
            .collect();
        let context = assemble_context(&history, 20, DEFAULT_MAX_CONTEXT_CHARS);
        assert_eq!(context.len(), 20);
        assert_eq!(context[0].content, "m11");
        assert_eq!(context.last().unwrap().content, "m30");
    }

    #[test]
    fn context_drops_oldest_to_fit_characters() {
        let history = vec![
            message(1, Role::User, &"a".repeat(40)),
            message(2, Role::Assistant, &"b".repeat(40)),
            message(3, Role::User, &"c".repeat(30)),
        ];
        let context = assemble_context(&history, 20, 75);
        assert_eq!(context.len(), 2);
        assert!(context[0].content.starts_with('b'));
    }

    #[test]
    fn newest_prompt_survives_an_oversized_budget() {
        let history = vec![
            message(1, Role::User, "short"),
            message(2, Role::User, &"z".repeat(500)),
        ];
        let context = assemble_context(&history, 20, 100);
        assert_eq!(context.len(), 1);
        assert_eq!(context[0].content.len(), 500);
        assert!(assemble_context(&[], 20, 100).is_empty());
    }
}
