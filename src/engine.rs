//! Engagement engine
//!
//! Orchestrates one verification: resolve the post, run the verifier for the
//! required action, and drive the task's state machine through the progress
//! store. This is the only place where verifier outcomes turn into task
//! state.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::chain::{Address, ChainReader};
use crate::services::{
    parse_reference, ActivityVerifier, CastResolver, PurchaseVerifier, TradabilityOracle,
};
use crate::social::SocialApi;
use crate::task::{ProgressStore, StoreError, Task, TaskEvent, TaskProgress, TaskState};
use crate::types::{ActionKind, EngineError, Result};

/// Verification request, as posted by clients
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub post_reference: String,
    pub user_id: u64,
    pub action_kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_id: Option<String>,
    /// Wallet to check for support tasks
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_address: Option<String>,
}

/// Verification outcome.
///
/// `resolved = false` means the post itself could not be identified, which
/// is different from a resolved post the user has not engaged with.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyResponse {
    pub resolved: bool,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canonical_post_hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<TaskState>,
}

/// Result of checking one request against the upstream services
#[derive(Debug, Default)]
struct Outcome {
    canonical: Option<String>,
    completed: bool,
    error: Option<String>,
}

pub struct EngagementEngine {
    resolver: CastResolver,
    activity: ActivityVerifier,
    purchase: PurchaseVerifier,
    oracle: Arc<TradabilityOracle>,
    store: Arc<dyn ProgressStore>,
}

impl EngagementEngine {
    pub fn new(
        social: Arc<dyn SocialApi>,
        chain: Arc<dyn ChainReader>,
        oracle: Arc<TradabilityOracle>,
        store: Arc<dyn ProgressStore>,
    ) -> Self {
        Self {
            resolver: CastResolver::new(social.clone()),
            activity: ActivityVerifier::new(social),
            purchase: PurchaseVerifier::new(chain),
            oracle,
            store,
        }
    }

    pub fn oracle(&self) -> &TradabilityOracle {
        &self.oracle
    }

    /// Verify a request and, when it names a task, persist the outcome.
    ///
    /// A request naming a task must agree with the stored definition; the
    /// definition is what gets verified.
    pub async fn verify_request(&self, request: &VerifyRequest) -> VerifyResponse {
        let Some(task_id) = request.task_id.as_deref() else {
            return self.evaluate(request).await.into_response(None);
        };

        let task = match self.store.task(task_id).await {
            Ok(Some(task)) => task,
            Ok(None) => {
                debug!(task_id = %task_id, "Verification for unknown task");
                return rejected(format!("unknown task {task_id}"));
            }
            Err(e) => return store_failure(e, None),
        };

        if let Err(e) = check_binding(&task, request) {
            warn!(user_id = request.user_id, task_id = %task_id, error = %e, "Request does not match task");
            return rejected(e.to_string());
        }

        self.verify_task(&task, request.wallet_address.as_deref()).await
    }

    /// Verify a stored task for its required user and persist the outcome.
    pub async fn verify_task(&self, task: &Task, wallet_address: Option<&str>) -> VerifyResponse {
        let request = VerifyRequest {
            post_reference: task.post_reference.clone(),
            user_id: task.required_user_id,
            action_kind: task.required_action,
            task_id: Some(task.id.clone()),
            wallet_address: wallet_address.map(str::to_string),
            token_address: task.token_address.map(|a| a.to_string()),
        };
        let user_id = request.user_id;
        let task_id = task.id.as_str();

        let attempt = match self.store.begin_verification(user_id, task_id).await {
            Ok(attempt) if attempt.state.is_terminal() => {
                debug!(user_id, task_id = %task_id, "Task already completed");
                return VerifyResponse {
                    resolved: true,
                    completed: true,
                    state: Some(TaskState::Completed),
                    ..Default::default()
                };
            }
            Ok(attempt) => attempt.id,
            Err(StoreError::Transition(e)) => {
                debug!(user_id, task_id = %task_id, error = %e, "Verification already in progress");
                return VerifyResponse {
                    error: Some("verification already in progress".to_string()),
                    state: Some(e.from),
                    ..Default::default()
                };
            }
            Err(e) => return store_failure(e, None),
        };

        let outcome = self.evaluate(&request).await;

        let state = match self
            .store
            .finish_verification(user_id, task_id, attempt, outcome.completed)
            .await
        {
            Ok(state) => state,
            Err(e) => {
                warn!(user_id, task_id = %task_id, error = %e, "Failed to persist verification outcome");
                return store_failure(e, outcome.canonical);
            }
        };

        info!(
            user_id,
            task_id = %task_id,
            attempt,
            action = %request.action_kind,
            state = ?state,
            "Task verification finished"
        );
        outcome.into_response(Some(state))
    }

    /// Store a task definition. Progress already recorded under the same id
    /// is kept.
    pub async fn register_task(&self, task: Task) -> Result<()> {
        if task.id.trim().is_empty() {
            return Err(EngineError::InvalidInput("task id is empty".to_string()));
        }
        if task.post_reference.trim().is_empty() {
            return Err(EngineError::InvalidInput("task post reference is empty".to_string()));
        }
        let task = Task {
            state: TaskState::NotOpened,
            ..task
        };
        info!(task_id = %task.id, action = %task.required_action, user_id = task.required_user_id, "Task registered");
        Ok(self.store.put_task(task).await?)
    }

    /// Record that the user was sent to the post.
    pub async fn open_task(&self, user_id: u64, task_id: &str) -> Result<TaskState> {
        if task_id.trim().is_empty() {
            return Err(EngineError::InvalidInput("task id is empty".to_string()));
        }
        let task = self
            .store
            .task(task_id)
            .await?
            .ok_or_else(|| EngineError::InvalidInput(format!("unknown task {task_id}")))?;
        if task.required_user_id != user_id {
            return Err(EngineError::InvalidInput(format!(
                "task {task_id} is assigned to another user"
            )));
        }
        Ok(self.store.transition(user_id, task_id, TaskEvent::Open).await?)
    }

    pub async fn progress(&self, user_id: u64) -> Result<TaskProgress> {
        Ok(self.store.progress(user_id).await?)
    }

    /// Whether a token should be offered as a support task.
    pub async fn support_task_eligible(&self, token: &str, quote_input_amount: &str) -> bool {
        self.oracle.is_tradable(token, quote_input_amount).await
    }

    async fn evaluate(&self, request: &VerifyRequest) -> Outcome {
        let canonical = match self.resolver.resolve(&request.post_reference).await {
            Ok(Some(hash)) => hash,
            Ok(None) => {
                info!(reference = %request.post_reference, "Post reference did not resolve");
                return Outcome::default();
            }
            Err(e) => {
                warn!(reference = %request.post_reference, error = %e, "Post resolution failed");
                return Outcome {
                    error: Some(e.to_string()),
                    ..Default::default()
                };
            }
        };

        match self.check_action(request, &canonical).await {
            Ok(completed) => Outcome {
                canonical: Some(canonical),
                completed,
                error: None,
            },
            Err(e) => {
                warn!(
                    post_hash = %canonical,
                    action = %request.action_kind,
                    transient = e.is_transient(),
                    error = %e,
                    "Verification failed"
                );
                Outcome {
                    canonical: Some(canonical),
                    completed: false,
                    error: Some(e.to_string()),
                }
            }
        }
    }

    async fn check_action(&self, request: &VerifyRequest, post_hash: &str) -> Result<bool> {
        match request.action_kind {
            ActionKind::Support => {
                let wallet = request
                    .wallet_address
                    .as_deref()
                    .ok_or_else(|| EngineError::InvalidInput("support requires a wallet address".to_string()))?;
                let token = self.support_token(request)?;
                self.purchase.has_purchased(&token.to_string(), wallet).await
            }
            action => self.activity.verify(post_hash, request.user_id, action).await,
        }
    }

    /// Token from the request, else from a content link
    fn support_token(&self, request: &VerifyRequest) -> Result<Address> {
        if let Some(token) = request.token_address.as_deref() {
            return Address::parse(token)
                .map_err(|e| EngineError::InvalidInput(format!("token address: {e}")));
        }
        parse_reference(&request.post_reference)
            .and_then(|reference| reference.token())
            .ok_or_else(|| EngineError::InvalidInput("support requires a token address".to_string()))
    }
}

impl Outcome {
    fn into_response(self, state: Option<TaskState>) -> VerifyResponse {
        VerifyResponse {
            resolved: self.canonical.is_some(),
            completed: self.completed,
            canonical_post_hash: self.canonical,
            error: self.error,
            state,
        }
    }
}

/// Whether a request names the same user, action, post and token as the task
fn check_binding(task: &Task, request: &VerifyRequest) -> Result<()> {
    if request.user_id != task.required_user_id {
        return Err(EngineError::InvalidInput(format!(
            "task {} is assigned to another user",
            task.id
        )));
    }
    if request.action_kind != task.required_action {
        return Err(EngineError::InvalidInput(format!(
            "task {} requires {}, not {}",
            task.id, task.required_action, request.action_kind
        )));
    }
    if !same_reference(&task.post_reference, &request.post_reference) {
        return Err(EngineError::InvalidInput(format!(
            "task {} is for a different post",
            task.id
        )));
    }
    if let Some(token) = request.token_address.as_deref() {
        let token = Address::parse(token)
            .map_err(|e| EngineError::InvalidInput(format!("token address: {e}")))?;
        let task_token = task
            .token_address
            .or_else(|| parse_reference(&task.post_reference).and_then(|r| r.token()));
        if task_token != Some(token) {
            return Err(EngineError::InvalidInput(format!(
                "task {} is for a different token",
                task.id
            )));
        }
    }
    Ok(())
}

/// An empty request reference defers to the task's
fn same_reference(task_reference: &str, requested: &str) -> bool {
    let requested = requested.trim();
    if requested.is_empty() || requested.eq_ignore_ascii_case(task_reference.trim()) {
        return true;
    }
    match (parse_reference(task_reference), parse_reference(requested)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn rejected(message: String) -> VerifyResponse {
    VerifyResponse {
        error: Some(message),
        ..Default::default()
    }
}

fn store_failure(error: StoreError, canonical: Option<String>) -> VerifyResponse {
    VerifyResponse {
        resolved: canonical.is_some(),
        completed: false,
        canonical_post_hash: canonical,
        error: Some(EngineError::from(error).to_string()),
        state: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::abi::BALANCE_OF;
    use crate::chain::ChainError;
    use crate::content_id;
    use crate::services::OracleConfig;
    use crate::social::{CastSummary, ReactionKind, SocialApiError};
    use crate::task::InMemoryProgressStore;
    use serde_json::{json, Value};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    const POST: &str = "0xabcdef0123456789abcdef0123456789abcdef01";
    const SHORT_LINK: &str = "https://warpcast.com/alice/0xabcdef01";
    const TOKEN: &str = "0x04d388da70c32fc5876981097c536c51c8d3d236";
    const WALLET: &str = "0x1111111111111111111111111111111111111111";

    #[derive(Default)]
    struct FakeSocial {
        by_url: HashMap<String, String>,
        likes: Vec<u64>,
        conversation: Option<Value>,
        down: AtomicBool,
        calls: AtomicUsize,
    }

    impl FakeSocial {
        fn check(&self) -> std::result::Result<(), SocialApiError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(SocialApiError::Timeout);
            }
            Ok(())
        }
    }

    #[async_trait::async_trait]
    impl SocialApi for FakeSocial {
        async fn cast_by_url(&self, url: &str) -> std::result::Result<Option<CastSummary>, SocialApiError> {
            self.check()?;
            Ok(self.by_url.get(url).map(|hash| CastSummary {
                hash: hash.clone(),
                author_id: None,
            }))
        }

        async fn cast_by_hash(&self, hash: &str) -> std::result::Result<Option<CastSummary>, SocialApiError> {
            self.check()?;
            Ok((hash == POST).then(|| CastSummary {
                hash: POST.to_string(),
                author_id: None,
            }))
        }

        async fn reactor_ids(&self, _: &str, kind: ReactionKind) -> std::result::Result<Vec<u64>, SocialApiError> {
            self.check()?;
            Ok(match kind {
                ReactionKind::Like => self.likes.clone(),
                ReactionKind::Recast => vec![],
            })
        }

        async fn conversation(&self, _: &str) -> std::result::Result<Option<Value>, SocialApiError> {
            self.check()?;
            Ok(self.conversation.clone())
        }

        async fn replies(&self, _: &str) -> std::result::Result<Option<Value>, SocialApiError> {
            self.check()?;
            Ok(None)
        }
    }

    /// Answers `balanceOf` with a fixed balance; reverts everything else
    struct FakeChain {
        balance: u128,
    }

    #[async_trait::async_trait]
    impl ChainReader for FakeChain {
        async fn call(&self, _: &Address, data: &[u8]) -> std::result::Result<Vec<u8>, ChainError> {
            if data[..4] != BALANCE_OF {
                return Err(ChainError::Reverted("no pool".to_string()));
            }
            let mut word = vec![0u8; 32];
            word[16..].copy_from_slice(&self.balance.to_be_bytes());
            Ok(word)
        }
    }

    fn engine_with(social: Arc<FakeSocial>, balance: u128) -> (EngagementEngine, Arc<InMemoryProgressStore>) {
        let chain: Arc<dyn ChainReader> = Arc::new(FakeChain { balance });
        let oracle = Arc::new(TradabilityOracle::new(OracleConfig::default(), chain.clone()));
        let store = Arc::new(InMemoryProgressStore::default());
        let engine = EngagementEngine::new(social, chain, oracle, store.clone());
        (engine, store)
    }

    fn request(reference: &str, action: ActionKind, task_id: Option<&str>) -> VerifyRequest {
        VerifyRequest {
            post_reference: reference.to_string(),
            user_id: 42,
            action_kind: action,
            task_id: task_id.map(str::to_string),
            wallet_address: None,
            token_address: None,
        }
    }

    async fn add_task(store: &InMemoryProgressStore, id: &str, reference: &str, action: ActionKind) {
        store
            .put_task(Task {
                id: id.to_string(),
                post_reference: reference.to_string(),
                required_action: action,
                required_user_id: 42,
                token_address: None,
                state: TaskState::NotOpened,
            })
            .await
            .unwrap();
    }

    fn social_with_link() -> FakeSocial {
        let mut social = FakeSocial::default();
        social.by_url.insert(SHORT_LINK.to_string(), POST.to_string());
        social
    }

    #[tokio::test]
    async fn test_like_completes_task() {
        let social = Arc::new(FakeSocial {
            likes: vec![42],
            ..social_with_link()
        });
        let (engine, store) = engine_with(social, 0);
        add_task(&store, "t1", SHORT_LINK, ActionKind::Like).await;

        let response = engine
            .verify_request(&request(SHORT_LINK, ActionKind::Like, Some("t1")))
            .await;
        assert!(response.resolved);
        assert!(response.completed);
        assert_eq!(response.canonical_post_hash.as_deref(), Some(POST));
        assert_eq!(response.state, Some(TaskState::Completed));
        assert_eq!(store.state(42, "t1").await.unwrap(), TaskState::Completed);
    }

    #[tokio::test]
    async fn test_completed_task_short_circuits() {
        let social = Arc::new(FakeSocial {
            likes: vec![42],
            ..social_with_link()
        });
        let (engine, store) = engine_with(social.clone(), 0);
        add_task(&store, "t1", SHORT_LINK, ActionKind::Like).await;
        let req = request(SHORT_LINK, ActionKind::Like, Some("t1"));

        engine.verify_request(&req).await;
        let calls = social.calls.load(Ordering::SeqCst);

        let again = engine.verify_request(&req).await;
        assert!(again.completed);
        assert_eq!(again.state, Some(TaskState::Completed));
        assert_eq!(social.calls.load(Ordering::SeqCst), calls);
    }

    #[tokio::test]
    async fn test_unresolvable_reference_moves_task_to_error() {
        let (engine, store) = engine_with(Arc::new(FakeSocial::default()), 0);
        add_task(&store, "t1", "https://example.com/nothing", ActionKind::Like).await;

        let response = engine
            .verify_request(&request("https://example.com/nothing", ActionKind::Like, Some("t1")))
            .await;
        assert!(!response.resolved);
        assert!(!response.completed);
        assert_eq!(response.error, None);
        assert_eq!(response.state, Some(TaskState::Error));
        assert_eq!(store.state(42, "t1").await.unwrap(), TaskState::Error);
    }

    #[tokio::test]
    async fn test_comment_in_thread_only() {
        let social = Arc::new(FakeSocial {
            conversation: Some(json!({
                "conversation": { "cast": {
                    "direct_replies": [],
                    "thread": [ { "author": { "fid": 42 }, "parent_hash": POST } ]
                } }
            })),
            ..social_with_link()
        });
        let (engine, store) = engine_with(social, 0);
        add_task(&store, "t1", SHORT_LINK, ActionKind::Comment).await;

        let response = engine
            .verify_request(&request(SHORT_LINK, ActionKind::Comment, Some("t1")))
            .await;
        assert!(response.completed);
        assert_eq!(response.state, Some(TaskState::Completed));
    }

    #[tokio::test]
    async fn test_not_engaged_is_resolved_but_incomplete() {
        let (engine, _) = engine_with(Arc::new(social_with_link()), 0);

        let response = engine.verify_request(&request(POST, ActionKind::Like, None)).await;
        assert!(response.resolved);
        assert!(!response.completed);
        assert_eq!(response.state, None);
    }

    #[tokio::test]
    async fn test_upstream_failure_then_retry() {
        let social = Arc::new(FakeSocial {
            likes: vec![42],
            ..social_with_link()
        });
        social.down.store(true, Ordering::SeqCst);
        let (engine, store) = engine_with(social.clone(), 0);
        add_task(&store, "t1", SHORT_LINK, ActionKind::Like).await;
        let req = request(SHORT_LINK, ActionKind::Like, Some("t1"));

        let failed = engine.verify_request(&req).await;
        assert!(failed.error.is_some());
        assert!(!failed.completed);
        assert_eq!(failed.state, Some(TaskState::Error));

        social.down.store(false, Ordering::SeqCst);
        let retried = engine.verify_request(&req).await;
        assert!(retried.completed);
        assert_eq!(retried.state, Some(TaskState::Completed));
    }

    #[tokio::test]
    async fn test_in_flight_verification_is_rejected() {
        let (engine, store) = engine_with(Arc::new(social_with_link()), 0);
        add_task(&store, "t1", SHORT_LINK, ActionKind::Like).await;
        store
            .transition(42, "t1", TaskEvent::BeginVerification)
            .await
            .unwrap();

        let response = engine
            .verify_request(&request(SHORT_LINK, ActionKind::Like, Some("t1")))
            .await;
        assert!(response.error.is_some());
        assert_eq!(response.state, Some(TaskState::Verifying));
    }

    #[tokio::test]
    async fn test_support_uses_token_from_content_link() {
        let token = Address::parse(TOKEN).unwrap();
        let link = content_id::content_url("base.app", &token);
        let mut social = FakeSocial::default();
        social.by_url.insert(link.clone(), POST.to_string());
        let (engine, store) = engine_with(Arc::new(social), 5);
        add_task(&store, "t1", &link, ActionKind::Support).await;

        let mut req = request(&link, ActionKind::Support, Some("t1"));
        req.wallet_address = Some(WALLET.to_string());
        let response = engine.verify_request(&req).await;
        assert!(response.completed);
        assert_eq!(response.state, Some(TaskState::Completed));
    }

    #[tokio::test]
    async fn test_support_without_wallet_is_error() {
        let (engine, store) = engine_with(Arc::new(social_with_link()), 5);
        store
            .put_task(Task {
                id: "t1".to_string(),
                post_reference: SHORT_LINK.to_string(),
                required_action: ActionKind::Support,
                required_user_id: 42,
                token_address: Some(Address::parse(TOKEN).unwrap()),
                state: TaskState::NotOpened,
            })
            .await
            .unwrap();

        let mut req = request(SHORT_LINK, ActionKind::Support, Some("t1"));
        req.token_address = Some(TOKEN.to_string());
        let response = engine.verify_request(&req).await;
        assert!(response.resolved);
        assert!(!response.completed);
        assert!(response.error.is_some());
        assert_eq!(response.state, Some(TaskState::Error));
    }

    #[tokio::test]
    async fn test_open_task_and_progress() {
        let (engine, store) = engine_with(Arc::new(FakeSocial::default()), 0);
        add_task(&store, "t1", SHORT_LINK, ActionKind::Like).await;
        assert_eq!(engine.open_task(42, "t1").await.unwrap(), TaskState::Opened);
        assert!(engine.open_task(42, " ").await.is_err());
        assert!(engine.open_task(42, "missing").await.is_err());
        assert!(engine.open_task(7, "t1").await.is_err());

        let progress = engine.progress(42).await.unwrap();
        assert_eq!(progress.state("t1"), TaskState::Opened);
    }

    #[tokio::test]
    async fn test_request_must_match_task_action() {
        let social = Arc::new(FakeSocial {
            likes: vec![42],
            ..social_with_link()
        });
        let (engine, store) = engine_with(social.clone(), 0);
        add_task(&store, "recast-task-9", SHORT_LINK, ActionKind::Recast).await;

        // The user liked the post, but the task asks for a recast
        let response = engine
            .verify_request(&request(SHORT_LINK, ActionKind::Like, Some("recast-task-9")))
            .await;
        assert!(!response.completed);
        assert!(response.error.is_some());
        assert_eq!(response.state, None);
        assert_eq!(social.calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.state(42, "recast-task-9").await.unwrap(), TaskState::NotOpened);
    }

    #[tokio::test]
    async fn test_request_must_match_task_post_and_user() {
        let mut social = social_with_link();
        social.by_url.insert("https://warpcast.com/bob/0x12345678".to_string(), POST.to_string());
        let social = Arc::new(FakeSocial {
            likes: vec![42, 7],
            ..social
        });
        let (engine, store) = engine_with(social, 0);
        add_task(&store, "t1", SHORT_LINK, ActionKind::Like).await;

        let other_post = request("https://warpcast.com/bob/0x12345678", ActionKind::Like, Some("t1"));
        assert!(engine.verify_request(&other_post).await.error.is_some());

        let mut other_user = request(SHORT_LINK, ActionKind::Like, Some("t1"));
        other_user.user_id = 7;
        assert!(engine.verify_request(&other_user).await.error.is_some());

        let mut other_token = request(SHORT_LINK, ActionKind::Like, Some("t1"));
        other_token.token_address = Some(TOKEN.to_string());
        assert!(engine.verify_request(&other_token).await.error.is_some());

        assert_eq!(store.state(42, "t1").await.unwrap(), TaskState::NotOpened);
        assert_eq!(store.state(7, "t1").await.unwrap(), TaskState::NotOpened);

        // Same post in a different spelling, or no reference at all, is accepted
        let respelled = request(&format!("  {}  ", SHORT_LINK.to_uppercase()), ActionKind::Like, Some("t1"));
        assert!(engine.verify_request(&respelled).await.completed);
    }

    #[tokio::test]
    async fn test_empty_reference_defers_to_task() {
        let social = Arc::new(FakeSocial {
            likes: vec![42],
            ..social_with_link()
        });
        let (engine, store) = engine_with(social, 0);
        add_task(&store, "t1", SHORT_LINK, ActionKind::Like).await;

        let response = engine.verify_request(&request("", ActionKind::Like, Some("t1"))).await;
        assert!(response.completed);
        assert_eq!(response.canonical_post_hash.as_deref(), Some(POST));
    }

    #[tokio::test]
    async fn test_unknown_task_is_rejected() {
        let social = Arc::new(FakeSocial {
            likes: vec![42],
            ..social_with_link()
        });
        let (engine, store) = engine_with(social, 0);

        let response = engine
            .verify_request(&request(SHORT_LINK, ActionKind::Like, Some("nope")))
            .await;
        assert!(!response.completed);
        assert!(response.error.unwrap().contains("unknown task"));
        assert!(store.progress(42).await.unwrap().tasks.is_empty());
    }

    #[tokio::test]
    async fn test_register_task_validates() {
        let (engine, store) = engine_with(Arc::new(FakeSocial::default()), 0);
        let task = Task {
            id: "t1".to_string(),
            post_reference: SHORT_LINK.to_string(),
            required_action: ActionKind::Like,
            required_user_id: 42,
            token_address: None,
            state: TaskState::Completed,
        };

        assert!(engine
            .register_task(Task { id: " ".to_string(), ..task.clone() })
            .await
            .is_err());
        assert!(engine
            .register_task(Task { post_reference: "  ".to_string(), ..task.clone() })
            .await
            .is_err());

        engine.register_task(task).await.unwrap();
        let stored = store.task("t1").await.unwrap().unwrap();
        assert_eq!(stored.state, TaskState::NotOpened);
    }

    #[tokio::test]
    async fn test_unroutable_token_is_not_eligible() {
        let (engine, _) = engine_with(Arc::new(FakeSocial::default()), 0);
        assert!(!engine.support_task_eligible(TOKEN, "1000000").await);
        assert!(!engine.support_task_eligible("nope", "1000000").await);
    }

    #[test]
    fn test_request_wire_format() {
        let req: VerifyRequest = serde_json::from_value(json!({
            "postReference": SHORT_LINK,
            "userId": 42,
            "actionKind": "recast",
            "taskId": "t9"
        }))
        .unwrap();
        assert_eq!(req.action_kind, ActionKind::Recast);
        assert_eq!(req.task_id.as_deref(), Some("t9"));

        let body = serde_json::to_value(VerifyResponse {
            resolved: false,
            ..Default::default()
        })
        .unwrap();
        assert_eq!(body, json!({ "resolved": false, "completed": false }));
    }
}
