use std::{collections::HashMap, fmt, thread, time::Duration};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use log::{debug, warn};
use reqwest::{blocking::{Client, Response}, Url};
use serde::Deserialize;
use serde_json::{json, Value};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Role {
	System,
	User,
	Assistant,
}
impl Role {
	fn as_str(self) -> &'static str {
		match self {
			Role::System => "system",
			Role::User => "user",
			Role::Assistant => "assistant",
		}
	}
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Part {
	Text(String),
	Png(Vec<u8>),
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct ChatMessage {
	pub role: Role,
	pub parts: Vec<Part>,
}
impl ChatMessage {
	pub fn new(role: Role, text: impl Into<String>) -> Self {
		ChatMessage { role, parts: vec![Part::Text(text.into())] }
	}
	pub fn system(text: impl Into<String>) -> Self {
		ChatMessage::new(Role::System, text)
	}
	pub fn user(text: impl Into<String>) -> Self {
		ChatMessage::new(Role::User, text)
	}
	pub fn assistant(text: impl Into<String>) -> Self {
		ChatMessage::new(Role::Assistant, text)
	}
	pub fn with_png(mut self, png: Vec<u8>) -> Self {
		self.parts.push(Part::Png(png));
		self
	}
	pub fn text(&self) -> String {
		let texts: Vec<&str> = self.parts.iter().filter_map(|part| match part {
			Part::Text(text) => Some(text.as_str()),
			Part::Png(_) => None,
		}).collect();
		texts.join("\n")
	}
	pub fn has_image(&self) -> bool {
		self.parts.iter().any(|part| matches!(part, Part::Png(_)))
	}
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
	#[error("no API key for {provider}: set {var}")]
	MissingKey { provider: Provider, var: &'static str },
	#[error("invalid endpoint URL '{0}'")]
	InvalidUrl(String),
	#[error("failed to send request: {0}")]
	Transport(String),
	#[error("HTTP {status}: {message}")]
	Status { status: u16, message: String },
	#[error("still rate limited by {0} after waiting")]
	RateLimited(Provider),
	#[error("unexpected response: {0}")]
	Decode(String),
	#[error("model returned no content")]
	EmptyResponse,
}

/// Sends a conversation to a model and returns its text answer.
pub trait ModelClient {
	fn complete(&mut self, model: &str, messages: &[ChatMessage]) -> Result<String, ModelError>;
}
impl<C: ModelClient + ?Sized> ModelClient for Box<C> {
	fn complete(&mut self, model: &str, messages: &[ChatMessage]) -> Result<String, ModelError> {
		(**self).complete(model, messages)
	}
}

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Provider {
	OpenAi,
	Anthropic,
	Gemini,
	OpenRouter,
	Ollama,
}
impl Provider {
	pub const ALL: [Provider; 5] = [
		Provider::OpenAi, Provider::Anthropic, Provider::Gemini, Provider::OpenRouter, Provider::Ollama,
	];

	/// Splits `provider/model` identifiers; bare identifiers go to OpenAI.
	pub fn route(model: &str) -> (Provider, &str) {
		if let Some((prefix, rest)) = model.split_once('/') {
			for provider in Provider::ALL {
				if provider.prefix() == prefix {
					return (provider, rest);
				}
			}
		}
		(Provider::OpenAi, model)
	}
	pub fn prefix(self) -> &'static str {
		match self {
			Provider::OpenAi => "openai",
			Provider::Anthropic => "anthropic",
			Provider::Gemini => "gemini",
			Provider::OpenRouter => "openrouter",
			Provider::Ollama => "ollama",
		}
	}
	pub fn default_base_url(self) -> &'static str {
		match self {
			Provider::OpenAi => "https://api.openai.com/v1",
			Provider::Anthropic => "https://api.anthropic.com/v1",
			Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta/openai",
			Provider::OpenRouter => "https://openrouter.ai/api/v1",
			Provider::Ollama => "http://localhost:11434/v1",
		}
	}
	pub fn key_var(self) -> Option<&'static str> {
		match self {
			Provider::OpenAi => Some("OPENAI_API_KEY"),
			Provider::Anthropic => Some("ANTHROPIC_API_KEY"),
			Provider::Gemini => Some("GEMINI_API_KEY"),
			Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
			Provider::Ollama => None,
		}
	}
	fn endpoint(self) -> &'static str {
		match self {
			Provider::Anthropic => "messages",
			_ => "chat/completions",
		}
	}
}
impl fmt::Display for Provider {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		write!(f, "{}", self.prefix())
	}
}

/// Best-effort guess; image input is still attempted for other models.
pub fn supports_vision(model: &str) -> bool {
	let (provider, name) = Provider::route(model);
	let name = name.to_ascii_lowercase();
	match provider {
		Provider::Gemini => true,
		Provider::Anthropic => name.starts_with("claude-3") || name.contains("sonnet-4")
			|| name.contains("opus-4") || name.contains("haiku-4"),
		_ => ["gpt-4o", "gpt-4.1", "gpt-4-turbo", "vision", "gpt-5", "o3", "o4", "llava", "gemini", "claude"]
			.iter().any(|hint| name.contains(hint)),
	}
}

#[derive(Clone, PartialEq, Debug)]
pub struct ClientSettings {
	pub max_tokens: u32,
	pub temperature: f32,
	pub request_timeout: Duration,
	pub rate_limit_wait: Duration,
	pub max_rate_limit_waits: u32,
	pub base_urls: HashMap<Provider, String>,
}
impl Default for ClientSettings {
	fn default() -> Self {
		ClientSettings {
			max_tokens: 4000,
			temperature: 0.0,
			request_timeout: Duration::from_secs(300),
			rate_limit_wait: Duration::from_secs(60),
			max_rate_limit_waits: 3,
			base_urls: HashMap::new(),
		}
	}
}
impl ClientSettings {
	fn base_url(&self, provider: Provider) -> &str {
		self.base_urls.get(&provider).map(|s| s.as_str()).unwrap_or(provider.default_base_url())
	}
}

struct ProviderReq {
	provider: Provider,
	url: Url,
	headers: Vec<(&'static str, String)>,
	body: Value,
}
impl ProviderReq {
	fn new(provider: Provider, base_url: &str, body: Value) -> Result<Self, ModelError> {
		let url = format!("{}/{}", base_url.trim_end_matches('/'), provider.endpoint());
		Ok(ProviderReq {
			provider,
			url: Url::parse(&url).map_err(|_| ModelError::InvalidUrl(url.clone()))?,
			headers: vec![],
			body,
		})
	}
	fn header(mut self, key: &'static str, value: impl fmt::Display) -> Self {
		self.headers.push((key, format!("{}", value)));
		self
	}
}

fn png_data_url(png: &[u8]) -> String {
	format!("data:image/png;base64,{}", BASE64.encode(png))
}

fn openai_content(msg: &ChatMessage) -> Value {
	if !msg.has_image() {
		return Value::String(msg.text());
	}
	let parts: Vec<Value> = msg.parts.iter().map(|part| match part {
		Part::Text(text) => json!({ "type": "text", "text": text }),
		Part::Png(png) => json!({ "type": "image_url", "image_url": { "url": png_data_url(png) } }),
	}).collect();
	Value::Array(parts)
}

fn anthropic_content(msg: &ChatMessage) -> Value {
	let parts: Vec<Value> = msg.parts.iter().map(|part| match part {
		Part::Text(text) => json!({ "type": "text", "text": text }),
		Part::Png(png) => json!({
			"type": "image",
			"source": { "type": "base64", "media_type": "image/png", "data": BASE64.encode(png) },
		}),
	}).collect();
	Value::Array(parts)
}

fn build_body(provider: Provider, model: &str, messages: &[ChatMessage], settings: &ClientSettings) -> Value {
	match provider {
		Provider::Anthropic => {
			let system: Vec<String> = messages.iter()
				.filter(|msg| msg.role == Role::System)
				.map(|msg| msg.text())
				.collect();
			let turns: Vec<Value> = messages.iter()
				.filter(|msg| msg.role != Role::System)
				.map(|msg| json!({ "role": msg.role.as_str(), "content": anthropic_content(msg) }))
				.collect();
			let mut body = json!({
				"model": model,
				"max_tokens": settings.max_tokens,
				"temperature": settings.temperature,
				"messages": turns,
			});
			if !system.is_empty() {
				body["system"] = Value::String(system.join("\n\n"));
			}
			body
		},
		_ => {
			let turns: Vec<Value> = messages.iter()
				.map(|msg| json!({ "role": msg.role.as_str(), "content": openai_content(msg) }))
				.collect();
			json!({
				"model": model,
				"max_tokens": settings.max_tokens,
				"temperature": settings.temperature,
				"messages": turns,
			})
		},
	}
}

fn parse_completion(provider: Provider, body: &Value) -> Result<String, ModelError> {
	let text = match provider {
		Provider::Anthropic => {
			let blocks = body["content"].as_array()
				.ok_or_else(|| ModelError::Decode(format!("no content array in {}", body)))?;
			let texts: Vec<&str> = blocks.iter()
				.filter(|block| block["type"] == "text")
				.filter_map(|block| block["text"].as_str())
				.collect();
			texts.join("")
		},
		_ => {
			let choice = body["choices"].get(0)
				.ok_or_else(|| ModelError::Decode(format!("no choices in {}", body)))?;
			match &choice["message"]["content"] {
				Value::String(text) => text.clone(),
				Value::Null => String::new(),
				other => return Err(ModelError::Decode(format!("content is not a string: {}", other))),
			}
		},
	};
	let text = text.trim();
	if text.is_empty() {
		return Err(ModelError::EmptyResponse);
	}
	Ok(text.to_owned())
}

fn error_message(raw: &str) -> Option<String> {
	#[derive(Deserialize)]
	struct ErrorData {
		error: ErrorDetail,
	}
	#[derive(Deserialize)]
	#[serde(untagged)]
	enum ErrorDetail {
		Object { message: String },
		Text(String),
	}
	let data: ErrorData = serde_json::from_str(raw).ok()?;
	Some(match data.error {
		ErrorDetail::Object { message } => message,
		ErrorDetail::Text(text) => text,
	})
}

/// Chat client for OpenAI-compatible endpoints and the Anthropic Messages API.
pub struct HttpModelClient {
	client: Client,
	settings: ClientSettings,
}
impl HttpModelClient {
	pub fn new(settings: ClientSettings) -> Result<Self, ModelError> {
		let client = Client::builder()
			.timeout(settings.request_timeout)
			.build()
			.map_err(|e| ModelError::Transport(format!("{}", e)))?;
		Ok(HttpModelClient { client, settings })
	}

	fn prepare(&self, model: &str, messages: &[ChatMessage]) -> Result<ProviderReq, ModelError> {
		let (provider, name) = Provider::route(model);
		let body = build_body(provider, name, messages, &self.settings);
		let req = ProviderReq::new(provider, self.settings.base_url(provider), body)?;
		let key = match provider.key_var() {
			Some(var) => Some(std::env::var(var).map_err(|_| ModelError::MissingKey { provider, var })?),
			None => None,
		};
		Ok(match (provider, key) {
			(Provider::Anthropic, Some(key)) => req
				.header("x-api-key", key)
				.header("anthropic-version", "2023-06-01"),
			(_, Some(key)) => req.header("authorization", format!("Bearer {}", key)),
			(_, None) => req,
		})
	}

	fn request(&self, req: &ProviderReq) -> Result<Response, ModelError> {
		let mut waits = 0;
		loop {
			let mut b = self.client.post(req.url.clone()).json(&req.body);
			for (key, value) in &req.headers {
				b = b.header(*key, value);
			}
			let res = b.send().map_err(|e| ModelError::Transport(format!("{}", e)))?;
			let status = res.status();
			if status.as_u16() == 429 {
				if waits >= self.settings.max_rate_limit_waits {
					return Err(ModelError::RateLimited(req.provider));
				}
				waits += 1;
				warn!("{} returned Too Many Requests, waiting {}s ({}/{})", req.provider,
					self.settings.rate_limit_wait.as_secs(), waits, self.settings.max_rate_limit_waits);
				thread::sleep(self.settings.rate_limit_wait);
				continue;
			} else if !status.is_success() {
				let raw = res.text().unwrap_or_default();
				let message = error_message(&raw)
					.or_else(|| status.canonical_reason().map(|s| s.to_owned()))
					.unwrap_or(raw);
				return Err(ModelError::Status { status: status.as_u16(), message });
			}
			return Ok(res);
		}
	}
}
impl ModelClient for HttpModelClient {
	fn complete(&mut self, model: &str, messages: &[ChatMessage]) -> Result<String, ModelError> {
		let req = self.prepare(model, messages)?;
		debug!("POST {} ({} messages)", req.url, messages.len());
		let body: Value = self.request(&req)?
			.json()
			.map_err(|e| ModelError::Decode(format!("{}", e)))?;
		parse_completion(req.provider, &body)
	}
}

#[cfg(test)]
pub(crate) mod scripted {
	use std::collections::VecDeque;

	use super::{ChatMessage, ModelClient, ModelError};

	/// Replays canned answers and keeps every conversation it was sent.
	pub struct ScriptedClient {
		answers: VecDeque<Result<String, ModelError>>,
		pub calls: Vec<(String, Vec<ChatMessage>)>,
	}
	impl ScriptedClient {
		pub fn new<S: Into<String>>(answers: impl IntoIterator<Item = S>) -> Self {
			ScriptedClient::with_results(answers.into_iter().map(|a| Ok(a.into())))
		}
		pub fn with_results(answers: impl IntoIterator<Item = Result<String, ModelError>>) -> Self {
			ScriptedClient { answers: answers.into_iter().collect(), calls: vec![] }
		}
	}
	impl ModelClient for ScriptedClient {
		fn complete(&mut self, model: &str, messages: &[ChatMessage]) -> Result<String, ModelError> {
			self.calls.push((model.to_owned(), messages.to_vec()));
			self.answers.pop_front().unwrap_or(Err(ModelError::EmptyResponse))
		}
	}
}

#[cfg(test)]
mod test_llm {
	use super::*;

	fn conversation() -> Vec<ChatMessage> {
		vec![
			ChatMessage::system("You are a chess engine."),
			ChatMessage::user("Your move.").with_png(vec![0x89, b'P', b'N', b'G']),
			ChatMessage::assistant("e5"),
			ChatMessage::user("Illegal, try again."),
		]
	}

	#[test]
	fn routing() {
		assert_eq!(Provider::route("gpt-4.1"), (Provider::OpenAi, "gpt-4.1"));
		assert_eq!(Provider::route("anthropic/claude-sonnet-4-20250514"),
			(Provider::Anthropic, "claude-sonnet-4-20250514"));
		assert_eq!(Provider::route("gemini/gemini-2.0-flash"), (Provider::Gemini, "gemini-2.0-flash"));
		assert_eq!(Provider::route("openrouter/meta-llama/llama-3-70b"),
			(Provider::OpenRouter, "meta-llama/llama-3-70b"));
		assert_eq!(Provider::route("unknown/model"), (Provider::OpenAi, "unknown/model"));
	}

	#[test]
	fn vision_guess() {
		assert!(supports_vision("gpt-4o"));
		assert!(supports_vision("gemini/gemini-2.0-flash"));
		assert!(supports_vision("anthropic/claude-3-opus-20240229"));
		assert!(!supports_vision("gpt-3.5-turbo"));
	}

	#[test]
	fn openai_body() {
		let settings = ClientSettings::default();
		let body = build_body(Provider::OpenAi, "gpt-4.1", &conversation(), &settings);
		assert_eq!(body["model"], "gpt-4.1");
		assert_eq!(body["max_tokens"], 4000);
		let messages = body["messages"].as_array().unwrap();
		assert_eq!(messages.len(), 4);
		assert_eq!(messages[0]["role"], "system");
		assert_eq!(messages[0]["content"], "You are a chess engine.");
		let parts = messages[1]["content"].as_array().unwrap();
		assert_eq!(parts[0]["type"], "text");
		assert_eq!(parts[1]["type"], "image_url");
		assert!(parts[1]["image_url"]["url"].as_str().unwrap().starts_with("data:image/png;base64,iVBORw"));
		assert_eq!(messages[2]["role"], "assistant");
		assert_eq!(messages[3]["content"], "Illegal, try again.");
	}

	#[test]
	fn anthropic_body() {
		let settings = ClientSettings::default();
		let body = build_body(Provider::Anthropic, "claude-sonnet-4-20250514", &conversation(), &settings);
		assert_eq!(body["system"], "You are a chess engine.");
		let messages = body["messages"].as_array().unwrap();
		assert_eq!(messages.len(), 3);
		assert_eq!(messages[0]["role"], "user");
		assert_eq!(messages[0]["content"][1]["type"], "image");
		assert_eq!(messages[0]["content"][1]["source"]["media_type"], "image/png");
		assert_eq!(messages[1]["content"][0]["text"], "e5");
	}

	#[test]
	fn completions() {
		let openai = json!({ "choices": [{ "message": { "role": "assistant", "content": "  Nf3\n" } }] });
		assert_eq!(parse_completion(Provider::OpenAi, &openai), Ok("Nf3".to_owned()));
		let anthropic = json!({ "content": [{ "type": "text", "text": "I play " }, { "type": "text", "text": "e4" }] });
		assert_eq!(parse_completion(Provider::Anthropic, &anthropic), Ok("I play e4".to_owned()));
		let empty = json!({ "choices": [{ "message": { "content": null } }] });
		assert_eq!(parse_completion(Provider::Gemini, &empty), Err(ModelError::EmptyResponse));
		assert!(matches!(parse_completion(Provider::OpenAi, &json!({})), Err(ModelError::Decode(_))));
	}

	#[test]
	fn error_bodies() {
		assert_eq!(error_message(r#"{"error":{"message":"Incorrect API key","type":"invalid_request_error"}}"#),
			Some("Incorrect API key".to_owned()));
		assert_eq!(error_message(r#"{"error":"model not found"}"#), Some("model not found".to_owned()));
		assert_eq!(error_message("<html>bad gateway</html>"), None);
	}

	#[test]
	fn endpoint_urls() {
		let mut settings = ClientSettings::default();
		settings.base_urls.insert(Provider::Ollama, "http://gpu-box:11434/v1/".to_owned());
		let req = ProviderReq::new(Provider::Ollama, settings.base_url(Provider::Ollama), json!({})).unwrap();
		assert_eq!(req.url.as_str(), "http://gpu-box:11434/v1/chat/completions");
		let req = ProviderReq::new(Provider::Anthropic, settings.base_url(Provider::Anthropic), json!({})).unwrap();
		assert_eq!(req.url.as_str(), "https://api.anthropic.com/v1/messages");
		assert!(ProviderReq::new(Provider::OpenAi, "not a url", json!({})).is_err());
	}
}
