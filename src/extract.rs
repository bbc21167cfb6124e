use regex::Regex;

/// Finds move-like tokens in free text. Models answer conversationally, so
/// the extractor only proposes; legality is decided by the board.
pub trait CandidateExtractor {
	/// Every move-like token, in scan order.
	fn candidates(&self, text: &str) -> Vec<String>;

	fn extract_candidate(&self, text: &str) -> Option<String> {
		self.candidates(text).into_iter().next()
	}
}

const SAN_PATTERN: &str = r"\b(O-O-O|O-O|0-0-0|0-0|[NBRQK]?[a-h]?[1-8]?x?[a-h][1-8](?:=?[QRBN]|[qrbn])?)\b";

pub struct RegexExtractor {
	pattern: Regex,
}
impl RegexExtractor {
	pub fn new() -> Self {
		RegexExtractor::with_pattern(SAN_PATTERN).expect("invalid built-in move pattern")
	}
	pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
		Ok(RegexExtractor { pattern: Regex::new(pattern)? })
	}
}
impl Default for RegexExtractor {
	fn default() -> Self {
		RegexExtractor::new()
	}
}
impl CandidateExtractor for RegexExtractor {
	fn candidates(&self, text: &str) -> Vec<String> {
		// first capture group if the pattern has one, whole match otherwise
		self.pattern.captures_iter(text)
			.filter_map(|caps| caps.get(1).or_else(|| caps.get(0)))
			.map(|m| m.as_str().to_owned())
			.collect()
	}
}

pub fn extract_candidate(text: &str) -> Option<String> {
	RegexExtractor::new().extract_candidate(text)
}
