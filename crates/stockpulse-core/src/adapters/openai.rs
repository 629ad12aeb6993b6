use std::sync::Arc;

use serde::Deserialize;
use serde_json::{json, Value};

use super::{api_key_from_env, execute_checked, parse_body, require_key};
use crate::data_source::{AnalysisEngine, SourceError, SourceFuture};
use crate::http_client::{HttpAuth, HttpClient, HttpRequest};
use crate::provider_policy::ProviderPolicy;
use crate::throttling::Throttle;
use crate::{Analysis, AnalysisRequest, ProviderId};

const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";
pub const DEFAULT_MODEL: &str = "gpt-4-turbo-preview";
pub const DEFAULT_CHAT_MODEL: &str = "gpt-4o-mini";

/// OpenAI chat completions client.
///
/// Analyses run in JSON mode on `model`; free-form chat replies use the
/// lighter `chat_model`.
#[derive(Clone)]
pub struct OpenAiAnalysisEngine {
    http_client: Arc<dyn HttpClient>,
    api_key: Option<String>,
    endpoint: String,
    model: String,
    chat_model: String,
    policy: ProviderPolicy,
    throttle: Throttle,
}

impl OpenAiAnalysisEngine {
    pub fn new(http_client: Arc<dyn HttpClient>, api_key: Option<String>) -> Self {
        let policy = ProviderPolicy::openai_default();
        Self {
            http_client,
            api_key,
            endpoint: String::from(DEFAULT_ENDPOINT),
            model: String::from(DEFAULT_MODEL),
            chat_model: String::from(DEFAULT_CHAT_MODEL),
            throttle: Throttle::from_policy(&policy),
            policy,
        }
    }

    pub fn from_env(http_client: Arc<dyn HttpClient>) -> Self {
        Self::new(http_client, api_key_from_env(ProviderId::Openai))
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn chat_model(&self) -> &str {
        &self.chat_model
    }

    async fn run(&self, req: &AnalysisRequest) -> Result<Analysis, SourceError> {
        let body = json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": build_prompt(req) }],
            "response_format": { "type": "json_object" },
        });
        let content = self.complete(body).await?;

        serde_json::from_str(&content).map_err(|error| {
            SourceError::malformed(format!("openai analysis is not valid JSON: {error}"))
        })
    }

    async fn reply(&self, message: &str) -> Result<String, SourceError> {
        let body = json!({
            "model": self.chat_model,
            "messages": [{ "role": "user", "content": message }],
        });
        self.complete(body).await
    }

    /// Send one completion request and return the first choice's content.
    async fn complete(&self, body: Value) -> Result<String, SourceError> {
        let key = require_key(ProviderId::Openai, self.api_key.as_deref())?;
        let request = HttpRequest::post_json(self.endpoint.as_str(), body.to_string())
            .with_auth(&HttpAuth::BearerToken(key.to_owned()))
            .with_timeout_ms(self.policy.request_timeout_ms());
        let response = execute_checked(
            ProviderId::Openai,
            &self.throttle,
            self.http_client.as_ref(),
            request,
        )
        .await?;

        let completion: ChatCompletion = parse_body(ProviderId::Openai, &response.body)?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| SourceError::malformed("openai completion has no message content"))
    }
}

impl AnalysisEngine for OpenAiAnalysisEngine {
    fn analyze<'a>(&'a self, req: &'a AnalysisRequest) -> SourceFuture<'a, Analysis> {
        Box::pin(self.run(req))
    }

    fn chat<'a>(&'a self, message: &'a str) -> SourceFuture<'a, String> {
        Box::pin(self.reply(message))
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

/// Render the analysis prompt for one symbol.
pub fn build_prompt(req: &AnalysisRequest) -> String {
    let stock = &req.stock_data;
    let company = &req.company_overview;
    format!(
        "Analyze the following stock data and provide insights:\n\
         Symbol: {symbol}\n\
         Current Price: ${price}\n\
         Change: {change} ({change_percent}%)\n\
         Company: {name}\n\
         Sector: {sector}\n\
         Industry: {industry}\n\
         Description: {description}\n\
         \n\
         Please provide:\n\
         1. A sentiment analysis (positive, neutral, or negative)\n\
         2. A detailed analysis of the stock's performance and future outlook\n\
         3. 2-3 recent news headlines that might be affecting the stock price\n\
         \n\
         Format the response as JSON with the following structure:\n\
         {{\n  \"sentiment\": \"positive|neutral|negative\",\n  \"aiInsight\": \"detailed analysis here\",\n  \
         \"news\": [\n    {{\n      \"title\": \"news headline\",\n      \"source\": \"news source\",\n      \
         \"date\": \"YYYY-MM-DD\"\n    }}\n  ]\n}}",
        symbol = req.symbol,
        price = stock.price,
        change = stock.change,
        change_percent = stock.change_percent,
        name = company.name,
        sector = company.sector,
        industry = company.industry,
        description = company.description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_source::SourceErrorKind;
    use crate::http_client::{HttpResponse, StaticHttpClient};
    use crate::{CompanyOverview, Sentiment, StockData, Symbol};

    fn request() -> AnalysisRequest {
        let symbol = Symbol::parse("MSFT").expect("valid");
        AnalysisRequest {
            symbol: symbol.clone(),
            stock_data: StockData {
                symbol,
                price: 401.5,
                change: -2.25,
                change_percent: -0.56,
            },
            company_overview: CompanyOverview {
                name: String::from("Microsoft Corp"),
                description: String::from("Software."),
                sector: String::from("TECHNOLOGY"),
                industry: String::from("SOFTWARE"),
            },
        }
    }

    fn completion(content: &str) -> HttpResponse {
        let body = json!({ "choices": [{ "message": { "role": "assistant", "content": content } }] });
        HttpResponse::ok_json(body.to_string())
    }

    #[test]
    fn prompt_carries_market_data_and_schema() {
        let prompt = build_prompt(&request());
        assert!(prompt.contains("Symbol: MSFT"));
        assert!(prompt.contains("Current Price: $401.5"));
        assert!(prompt.contains("Change: -2.25 (-0.56%)"));
        assert!(prompt.contains("Industry: SOFTWARE"));
        assert!(prompt.contains("\"aiInsight\""));
    }

    #[tokio::test]
    async fn parses_json_mode_completion() {
        let client = Arc::new(StaticHttpClient::new().route(
            "chat/completions",
            completion(
                r#"{"sentiment":"negative","aiInsight":"Slight pullback.","news":[{"title":"t","source":"s","date":"2024-01-10"}]}"#,
            ),
        ));
        let engine = OpenAiAnalysisEngine::new(client.clone(), Some(String::from("sk-test")))
            .with_endpoint("https://ai.test/v1/chat/completions");

        let analysis = engine.analyze(&request()).await.expect("analysis");
        assert_eq!(analysis.sentiment, Sentiment::Negative);
        assert_eq!(analysis.news.len(), 1);

        let sent = &client.requests()[0];
        assert_eq!(
            sent.headers.get("authorization").map(String::as_str),
            Some("Bearer sk-test")
        );
        let body: serde_json::Value =
            serde_json::from_str(sent.body.as_deref().expect("body")).expect("json body");
        assert_eq!(body["model"], DEFAULT_MODEL);
        assert_eq!(body["response_format"]["type"], "json_object");
    }

    #[tokio::test]
    async fn unknown_sentiment_is_malformed() {
        let client = Arc::new(StaticHttpClient::new().route(
            "chat/completions",
            completion(r#"{"sentiment":"bullish","aiInsight":"?"}"#),
        ));
        let engine = OpenAiAnalysisEngine::new(client, Some(String::from("sk-test")));

        let err = engine.analyze(&request()).await.expect_err("must fail");
        assert_eq!(err.kind(), SourceErrorKind::Malformed);
    }

    #[tokio::test]
    async fn chat_sends_plain_single_message_completion() {
        let client = Arc::new(
            StaticHttpClient::new().route("chat/completions", completion("Hi! How can I help?")),
        );
        let engine = OpenAiAnalysisEngine::new(client.clone(), Some(String::from("sk-test")))
            .with_endpoint("https://ai.test/v1/chat/completions");

        let reply = engine.chat("hello").await.expect("reply");
        assert_eq!(reply, "Hi! How can I help?");

        let body: serde_json::Value =
            serde_json::from_str(client.requests()[0].body.as_deref().expect("body"))
                .expect("json body");
        assert_eq!(body["model"], DEFAULT_CHAT_MODEL);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["messages"][0]["content"], "hello");
        assert!(body.get("response_format").is_none());
    }

    #[tokio::test]
    async fn chat_model_is_configurable() {
        let client = Arc::new(StaticHttpClient::new().route("chat/completions", completion("ok")));
        let engine = OpenAiAnalysisEngine::new(client.clone(), Some(String::from("sk-test")))
            .with_chat_model("gpt-4o");
        assert_eq!(engine.chat_model(), "gpt-4o");

        engine.chat("ping").await.expect("reply");
        let body: serde_json::Value =
            serde_json::from_str(client.requests()[0].body.as_deref().expect("body"))
                .expect("json body");
        assert_eq!(body["model"], "gpt-4o");
    }

    #[tokio::test]
    async fn chat_without_content_is_malformed() {
        let body = json!({ "choices": [] });
        let client = Arc::new(
            StaticHttpClient::new().route("chat/completions", HttpResponse::ok_json(body.to_string())),
        );
        let engine = OpenAiAnalysisEngine::new(client, Some(String::from("sk-test")));

        let err = engine.chat("hello").await.expect_err("must fail");
        assert_eq!(err.kind(), SourceErrorKind::Malformed);
    }

    #[tokio::test]
    async fn upstream_error_fails_chat() {
        let client = Arc::new(
            StaticHttpClient::new().route("chat/completions", HttpResponse::with_status(500, "{}")),
        );
        let engine = OpenAiAnalysisEngine::new(client, Some(String::from("sk-test")));

        let err = engine.chat("hello").await.expect_err("must fail");
        assert_eq!(err.kind(), SourceErrorKind::Unavailable);
    }

    #[tokio::test]
    async fn missing_key_is_misconfigured() {
        let engine = OpenAiAnalysisEngine::new(Arc::new(StaticHttpClient::new()), None);
        let err = engine.analyze(&request()).await.expect_err("must fail");
        assert_eq!(err.kind(), SourceErrorKind::Misconfigured);
    }
}
