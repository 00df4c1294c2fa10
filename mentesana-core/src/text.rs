use regex::Regex;
use std::sync::OnceLock;

fn noise_tag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Speech-to-text marks non-speech as "[laughter]", "(music)" and similar.
        Regex::new(r"(?s)\[[^\]]*\]|\([^\)]*\)").expect("valid noise tag regex")
    })
}

fn filler_words_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // English and Spanish hesitations.
        Regex::new(r"(?i)\b(uh|um|uhm|umm|ah|eh|ehm|mmm|mm)\b[,.]?")
            .expect("valid filler regex")
    })
}

fn whitespace_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\s{2,}").expect("valid whitespace regex"))
}

fn reasoning_block_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)<thinking>.*?</thinking>|<think>.*?</think>|<reasoning>.*?</reasoning>")
            .expect("valid reasoning regex")
    })
}

/// Returns the trimmed content if it has anything besides whitespace.
pub fn non_empty_trimmed(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

/// Cleans a raw speech-to-text result before it is sent as a user turn.
pub fn filter_transcription_output(text: &str) -> String {
    let mut out = noise_tag_re().replace_all(text, "").to_string();
    out = filler_words_re().replace_all(&out, "").to_string();
    out = whitespace_re().replace_all(&out, " ").to_string();
    out.trim().to_string()
}

/// Strips model reasoning blocks from a responder answer.
pub fn filter_model_output(text: &str) -> String {
    let out = reasoning_block_re().replace_all(text, "");
    out.trim().to_string()
}
