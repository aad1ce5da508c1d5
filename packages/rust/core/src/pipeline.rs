//! Response pipeline: query → (optional) web search → prompt → completion.

use std::sync::Arc;

use chrono::Datelike;
use tracing::{info, instrument, warn};

use researcher_inference::{InferenceProvider, OllamaClient, OllamaOptions};
use researcher_search::{DuckDuckGoSearch, SearchOptions, SearchProvider};
use researcher_shared::{
    AppConfig, ChatMessage, Exchange, ResearcherError, Result, SearchFailurePolicy, Snippet,
};

use crate::prompt::{self, DIRECT_SYSTEM_PROMPT};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Runtime pipeline settings, merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Model name sent with every completion request.
    pub model: String,
    /// Number of search results requested in web mode.
    pub max_results: usize,
    /// What to do when web search fails.
    pub on_search_failure: SearchFailurePolicy,
    /// Prefix web answers with the current year when they omit it.
    pub annotate_answers: bool,
}

impl From<&AppConfig> for PipelineConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            model: config.inference.model.clone(),
            max_results: config.search.max_results,
            on_search_failure: config.search.on_failure,
            annotate_answers: config.temporal.annotate_answers,
        }
    }
}

// ---------------------------------------------------------------------------
// Clock
// ---------------------------------------------------------------------------

/// Source of the current year for time-aware prompts.
pub trait Clock: Send + Sync {
    fn current_year(&self) -> i32;
}

/// Wall clock in the local timezone.
pub struct LocalClock;

impl Clock for LocalClock {
    fn current_year(&self) -> i32 {
        chrono::Local::now().year()
    }
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// Progress callback for reporting pipeline status.
pub trait PipelineProgress: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl PipelineProgress for SilentProgress {
    fn phase(&self, _name: &str) {}
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// Everything one request produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    /// Text returned to the user.
    pub response: String,
    /// The user message sent to the model.
    pub prompt: String,
    /// Search hits the prompt was built from (empty in direct mode).
    pub sources: Vec<Snippet>,
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// Dual-mode response pipeline.
pub struct ResponsePipeline {
    config: PipelineConfig,
    search: Arc<dyn SearchProvider>,
    inference: Arc<dyn InferenceProvider>,
    clock: Arc<dyn Clock>,
}

impl ResponsePipeline {
    pub fn new(
        config: PipelineConfig,
        search: Arc<dyn SearchProvider>,
        inference: Arc<dyn InferenceProvider>,
    ) -> Self {
        Self {
            config,
            search,
            inference,
            clock: Arc::new(LocalClock),
        }
    }

    /// Replace the clock used for time-aware prompts.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Build a pipeline wired to DuckDuckGo and Ollama from app config.
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let search = DuckDuckGoSearch::new(&SearchOptions::from(&config.search))?;
        let inference = OllamaClient::new(&OllamaOptions::from(&config.inference))?;
        Ok(Self::new(
            PipelineConfig::from(config),
            Arc::new(search),
            Arc::new(inference),
        ))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Answer `query` with no prior conversation.
    pub async fn generate_response(&self, query: &str, use_web_search: bool) -> Result<String> {
        self.generate_response_with_history(query, use_web_search, &[])
            .await
    }

    /// Answer `query` after replaying `history` to the model. The caller owns
    /// the history and appends the new exchange itself.
    pub async fn generate_response_with_history(
        &self,
        query: &str,
        use_web_search: bool,
        history: &[Exchange],
    ) -> Result<String> {
        let output = self
            .respond(query, use_web_search, history, &SilentProgress)
            .await?;
        Ok(output.response)
    }

    /// Run one request end to end.
    ///
    /// 1. Web search (if enabled)
    /// 2. Prompt assembly
    /// 3. Completion
    #[instrument(skip_all, fields(web = use_web_search, history = history.len()))]
    pub async fn respond(
        &self,
        query: &str,
        use_web_search: bool,
        history: &[Exchange],
        progress: &dyn PipelineProgress,
    ) -> Result<PipelineOutput> {
        if query.trim().is_empty() {
            return Err(ResearcherError::validation("query must not be empty"));
        }

        // --- Phase 1: Search ---
        let sources = if use_web_search {
            progress.phase("Searching the web...");
            self.search_context(query).await?
        } else {
            Vec::new()
        };

        // --- Phase 2: Prompt ---
        let year = self.clock.current_year();
        let (system, prompt) = if sources.is_empty() {
            (DIRECT_SYSTEM_PROMPT.to_string(), query.to_string())
        } else {
            let analysis = prompt::analyze_content(&sources, query, year);
            (
                prompt::web_system_prompt(year),
                prompt::time_aware_prompt(&analysis),
            )
        };

        let mut messages = Vec::with_capacity(history.len() * 2 + 2);
        messages.push(ChatMessage::system(system));
        messages.extend(history.iter().flat_map(Exchange::to_messages));
        messages.push(ChatMessage::user(prompt.clone()));

        // --- Phase 3: Completion ---
        progress.phase("Thinking...");
        let completion = self
            .inference
            .chat(&self.config.model, &messages)
            .await
            .map_err(|e| match e {
                ResearcherError::Inference(_) => e,
                other => ResearcherError::Inference(other.to_string()),
            })?;

        let response = if self.config.annotate_answers && !sources.is_empty() {
            prompt::annotate_with_year(&completion, year)
        } else {
            completion
        };

        info!(
            provider = self.inference.name(),
            sources = sources.len(),
            chars = response.len(),
            "response generated"
        );

        Ok(PipelineOutput {
            response,
            prompt,
            sources,
        })
    }

    /// Fetch snippets, applying the configured failure policy.
    async fn search_context(&self, query: &str) -> Result<Vec<Snippet>> {
        match self.search.search(query, self.config.max_results).await {
            Ok(snippets) => Ok(snippets
                .into_iter()
                .filter(|s| !s.body.trim().is_empty())
                .collect()),
            Err(e) => match self.config.on_search_failure {
                SearchFailurePolicy::Degrade => {
                    warn!(
                        provider = self.search.name(),
                        error = %e,
                        "web search failed, answering without context"
                    );
                    Ok(Vec::new())
                }
                SearchFailurePolicy::Propagate => Err(match e {
                    ResearcherError::Search(_) => e,
                    other => ResearcherError::Search(other.to_string()),
                }),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use researcher_shared::Role;

    use super::*;

    // -----------------------------------------------------------------------
    // Fake collaborators
    // -----------------------------------------------------------------------

    enum SearchBehaviour {
        Returns(Vec<Snippet>),
        Fails,
    }

    struct FakeSearch {
        behaviour: SearchBehaviour,
        calls: AtomicUsize,
    }

    impl FakeSearch {
        fn returning(bodies: &[&str]) -> Arc<Self> {
            Arc::new(Self {
                behaviour: SearchBehaviour::Returns(
                    bodies.iter().map(|b| Snippet::new("title", *b)).collect(),
                ),
                calls: AtomicUsize::new(0),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                behaviour: SearchBehaviour::Fails,
                calls: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl SearchProvider for FakeSearch {
        fn name(&self) -> &'static str {
            "fake-search"
        }

        async fn search(&self, _query: &str, max_results: usize) -> Result<Vec<Snippet>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behaviour {
                SearchBehaviour::Returns(s) => Ok(s.iter().take(max_results).cloned().collect()),
                SearchBehaviour::Fails => Err(ResearcherError::Search("connection refused".into())),
            }
        }
    }

    enum InferenceBehaviour {
        Fixed(String),
        EchoPrompt,
        Fails,
    }

    struct FakeInference {
        behaviour: InferenceBehaviour,
        requests: Mutex<Vec<Vec<ChatMessage>>>,
    }

    impl FakeInference {
        fn new(behaviour: InferenceBehaviour) -> Arc<Self> {
            Arc::new(Self {
                behaviour,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn fixed(text: &str) -> Arc<Self> {
            Self::new(InferenceBehaviour::Fixed(text.into()))
        }

        fn last_request(&self) -> Vec<ChatMessage> {
            self.requests.lock().unwrap().last().cloned().unwrap_or_default()
        }

        fn last_prompt(&self) -> String {
            self.last_request().last().map(|m| m.content.clone()).unwrap_or_default()
        }

        fn call_count(&self) -> usize {
            self.requests.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl InferenceProvider for FakeInference {
        fn name(&self) -> &'static str {
            "fake-inference"
        }

        async fn chat(&self, _model: &str, messages: &[ChatMessage]) -> Result<String> {
            self.requests.lock().unwrap().push(messages.to_vec());
            match &self.behaviour {
                InferenceBehaviour::Fixed(text) => Ok(text.clone()),
                InferenceBehaviour::EchoPrompt => Ok(messages.last().unwrap().content.clone()),
                InferenceBehaviour::Fails => {
                    Err(ResearcherError::Inference("model not loaded".into()))
                }
            }
        }
    }

    /// A clock stuck at one year.
    struct FixedClock(i32);

    impl Clock for FixedClock {
        fn current_year(&self) -> i32 {
            self.0
        }
    }

    fn test_config() -> PipelineConfig {
        PipelineConfig::from(&AppConfig::default())
    }

    fn pipeline(search: Arc<FakeSearch>, inference: Arc<FakeInference>) -> ResponsePipeline {
        ResponsePipeline::new(test_config(), search, inference).with_clock(Arc::new(FixedClock(2026)))
    }

    // -----------------------------------------------------------------------
    // Direct mode
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn direct_mode_returns_completion_verbatim() {
        let search = FakeSearch::returning(&["unused"]);
        let inference = FakeInference::fixed("Paris.");
        let p = pipeline(search.clone(), inference.clone());

        let answer = p
            .generate_response("What is the capital of France?", false)
            .await
            .unwrap();

        assert_eq!(answer, "Paris.");
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn direct_mode_prompt_is_query() {
        let inference = FakeInference::fixed("ok");
        let p = pipeline(FakeSearch::returning(&[]), inference.clone());

        let query = "  Explain   ownership\n in Rust ";
        p.generate_response(query, false).await.unwrap();

        let request = inference.last_request();
        assert_eq!(request.len(), 2);
        assert_eq!(request[0], ChatMessage::system(DIRECT_SYSTEM_PROMPT));
        assert_eq!(request[1], ChatMessage::user(query));
    }

    #[tokio::test]
    async fn empty_query_is_rejected_before_any_call() {
        let search = FakeSearch::returning(&["x"]);
        let inference = FakeInference::fixed("ok");
        let p = pipeline(search.clone(), inference.clone());

        let err = p.generate_response("   ", true).await.unwrap_err();
        assert!(matches!(err, ResearcherError::Validation { .. }));
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
        assert_eq!(inference.call_count(), 0);
    }

    // -----------------------------------------------------------------------
    // Web mode
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn web_mode_prompt_has_snippets_in_order_then_query() {
        let inference = FakeInference::fixed("ok");
        let p = pipeline(FakeSearch::returning(&["s1 alpha", "s2 beta", "s3 gamma"]), inference.clone());

        p.generate_response("my question", true).await.unwrap();

        let prompt = inference.last_prompt();
        let positions: Vec<usize> = ["s1 alpha", "s2 beta", "s3 gamma", "my question"]
            .iter()
            .map(|needle| prompt.find(needle).expect(needle))
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));

        let request = inference.last_request();
        assert_eq!(request[0].role, Role::System);
        assert!(request[0].content.contains("2026"));
    }

    #[tokio::test]
    async fn web_mode_echo_contains_snippets_and_query() {
        let inference = FakeInference::new(InferenceBehaviour::EchoPrompt);
        let p = pipeline(
            FakeSearch::returning(&["OpenAI releases X", "Google announces Y"]),
            inference,
        );

        let answer = p.generate_response("latest AI news", true).await.unwrap();

        assert!(answer.contains("OpenAI releases X"));
        assert!(answer.contains("Google announces Y"));
        assert!(answer.contains("latest AI news"));
    }

    #[tokio::test]
    async fn empty_search_result_matches_direct_prompt() {
        let inference = FakeInference::fixed("ok");
        let p = pipeline(FakeSearch::returning(&[]), inference.clone());

        p.generate_response("latest AI news", true).await.unwrap();
        let web_request = inference.last_request();
        p.generate_response("latest AI news", false).await.unwrap();
        let direct_request = inference.last_request();

        assert_eq!(web_request, direct_request);
    }

    #[tokio::test]
    async fn blank_snippet_bodies_count_as_no_context() {
        let inference = FakeInference::fixed("ok");
        let p = pipeline(FakeSearch::returning(&["", "   "]), inference.clone());

        let output = p.respond("q", true, &[], &SilentProgress).await.unwrap();
        assert!(output.sources.is_empty());
        assert_eq!(output.prompt, "q");
    }

    #[tokio::test]
    async fn web_mode_requests_configured_result_count() {
        let inference = FakeInference::fixed("ok");
        let search = FakeSearch::returning(&["1", "2", "3", "4", "5", "6", "7"]);
        let mut config = test_config();
        config.max_results = 3;
        let p = ResponsePipeline::new(config, search, inference);

        let output = p.respond("q", true, &[], &SilentProgress).await.unwrap();
        assert_eq!(output.sources.len(), 3);
    }

    // -----------------------------------------------------------------------
    // Failure handling
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn inference_failure_is_inference_error() {
        let p = pipeline(
            FakeSearch::returning(&["ctx"]),
            FakeInference::new(InferenceBehaviour::Fails),
        );

        for web in [false, true] {
            let err = p.generate_response("hello", web).await.unwrap_err();
            assert!(err.is_inference(), "web={web}: {err}");
        }
    }

    #[tokio::test]
    async fn search_failure_degrades_by_default() {
        let inference = FakeInference::fixed("answer without context");
        let p = pipeline(FakeSearch::failing(), inference.clone());

        let answer = p.generate_response("hello", true).await.unwrap();

        assert_eq!(answer, "answer without context");
        assert_eq!(inference.last_prompt(), "hello");
    }

    #[tokio::test]
    async fn search_failure_propagates_when_configured() {
        let inference = FakeInference::fixed("never");
        let mut config = test_config();
        config.on_search_failure = SearchFailurePolicy::Propagate;
        let p = ResponsePipeline::new(config, FakeSearch::failing(), inference.clone());

        let err = p.generate_response("hello", true).await.unwrap_err();

        assert!(err.is_search());
        assert_eq!(inference.call_count(), 0);
    }

    // -----------------------------------------------------------------------
    // History and annotation
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn history_is_replayed_in_order_before_prompt() {
        let inference = FakeInference::fixed("ok");
        let p = pipeline(FakeSearch::returning(&[]), inference.clone());
        let history = vec![
            Exchange::new("first q", "first a"),
            Exchange::new("second q", "second a"),
        ];

        p.generate_response_with_history("third q", false, &history)
            .await
            .unwrap();

        let contents: Vec<(Role, String)> = inference
            .last_request()
            .into_iter()
            .map(|m| (m.role, m.content))
            .collect();
        assert_eq!(
            contents[1..],
            [
                (Role::User, "first q".to_string()),
                (Role::Assistant, "first a".to_string()),
                (Role::User, "second q".to_string()),
                (Role::Assistant, "second a".to_string()),
                (Role::User, "third q".to_string()),
            ]
        );
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn annotation_applies_only_to_web_answers() {
        let mut config = test_config();
        config.annotate_answers = true;
        let p = ResponsePipeline::new(
            config,
            FakeSearch::returning(&["some news"]),
            FakeInference::fixed("Prices rose."),
        )
        .with_clock(Arc::new(FixedClock(2026)));

        assert_eq!(
            p.generate_response("prices", true).await.unwrap(),
            "As of 2026, Prices rose."
        );
        assert_eq!(p.generate_response("prices", false).await.unwrap(), "Prices rose.");
    }

    #[tokio::test]
    async fn progress_reports_phases() {
        struct Recorder(Mutex<Vec<String>>);
        impl PipelineProgress for Recorder {
            fn phase(&self, name: &str) {
                self.0.lock().unwrap().push(name.to_string());
            }
        }

        let p = pipeline(FakeSearch::returning(&["ctx"]), FakeInference::fixed("ok"));
        let recorder = Recorder(Mutex::new(Vec::new()));
        p.respond("q", true, &[], &recorder).await.unwrap();

        assert_eq!(
            *recorder.0.lock().unwrap(),
            vec!["Searching the web...".to_string(), "Thinking...".to_string()]
        );
    }

    // -----------------------------------------------------------------------
    // End to end over HTTP
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn end_to_end_with_mock_backends() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        let page = std::fs::read_to_string("../../../fixtures/html/duckduckgo-results.html")
            .expect("read duckduckgo fixture");

        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(page))
            .expect(1)
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "message": {"role": "assistant", "content": "Tokio is the most used runtime."},
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let mut config = AppConfig::default();
        config.inference.host = server.uri();
        config.search.base_url = format!("{}/html/", server.uri());

        let p = ResponsePipeline::from_app_config(&config).unwrap();
        let output = p
            .respond("rust async runtime", true, &[], &SilentProgress)
            .await
            .unwrap();

        assert_eq!(output.response, "Tokio is the most used runtime.");
        assert_eq!(output.sources.len(), 3);
        assert!(output.prompt.contains("rust async runtime"));
        assert!(output.prompt.contains("The most recent year mentioned in the sources is 2024."));
    }

    #[tokio::test]
    async fn unrecognised_search_page_propagates_without_calling_model() {
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/html/"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"error":"service moved"}"#))
            .mount(&server)
            .await;

        Mock::given(method("POST"))
            .and(path("/api/chat"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let mut config = AppConfig::default();
        config.inference.host = server.uri();
        config.search.base_url = format!("{}/html/", server.uri());
        config.search.on_failure = SearchFailurePolicy::Propagate;

        let p = ResponsePipeline::from_app_config(&config).unwrap();
        let err = p.generate_response("rust async runtime", true).await.unwrap_err();

        assert!(err.is_search(), "{err}");
        assert!(err.to_string().contains("unrecognised"));
    }
}
