//! Inline directive parsing. Directives are control tokens embedded in user
//! text (`::temperature=0.2::`, `::model=gpt-4::`, `::search rust news::`, or
//! a bare URL) that alter request parameters or routing instead of being sent
//! to the model as content. Pure text rewriting; no I/O.

use std::sync::LazyLock;

use regex::Regex;

use crate::error::MagpieError;

static TEMPERATURE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::temperature=(.*?)::").expect("temperature regex"));
static MODEL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::model=(\w+(?:-\w+)*(?:\.\w+)*)::").expect("model regex"));
static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("url regex"));
static SEARCH_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"::search\s+(.*?)::").expect("search regex"));

/// Result of parsing one message. Consumed once; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct Directives {
    pub temperature: Option<f64>,
    pub model: Option<String>,
    /// Set only when no URL was found; a URL short-circuits search.
    pub search_query: Option<String>,
    pub url: Option<String>,
    /// Input text with every matched directive token removed. Whitespace is
    /// left as-is.
    pub cleaned_text: String,
}

/// Parse and strip directives from raw message text.
///
/// When the same directive appears more than once, the first occurrence wins
/// and the rest are stripped without being honored. A temperature value that
/// is not a float is an error rather than a silent fallback to the default.
pub fn parse(text: &str) -> Result<Directives, MagpieError> {
    let mut cleaned = text.to_string();

    let temperature = match TEMPERATURE_RE.captures(text) {
        Some(caps) => {
            let raw = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let value: f64 = raw.parse().map_err(|_| {
                MagpieError::Directive(format!("invalid temperature value '{raw}'"))
            })?;
            cleaned = TEMPERATURE_RE.replace_all(&cleaned, "").into_owned();
            Some(value)
        }
        None => None,
    };

    let model = MODEL_RE.captures(text).map(|caps| caps[1].to_string());
    if model.is_some() {
        cleaned = MODEL_RE.replace_all(&cleaned, "").into_owned();
    }

    let url = URL_RE.find(&cleaned).map(|m| m.as_str().to_string());
    if url.is_some() {
        cleaned = URL_RE.replace_all(&cleaned, "").into_owned();
    }

    // Search is only honored when no URL was present in the message.
    let search_query = if url.is_none() {
        let query = SEARCH_RE.captures(&cleaned).map(|caps| caps[1].to_string());
        if query.is_some() {
            cleaned = SEARCH_RE.replace_all(&cleaned, "").into_owned();
        }
        query
    } else {
        None
    };

    Ok(Directives {
        temperature,
        model,
        search_query,
        url,
        cleaned_text: cleaned,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_text_passes_through() {
        let d = parse("hello there").unwrap();
        assert_eq!(d.temperature, None);
        assert_eq!(d.model, None);
        assert_eq!(d.url, None);
        assert_eq!(d.search_query, None);
        assert_eq!(d.cleaned_text, "hello there");
    }

    #[test]
    fn temperature_parsed_and_stripped() {
        let d = parse("::temperature=0.2:: hi").unwrap();
        assert_eq!(d.temperature, Some(0.2));
        assert_eq!(d.cleaned_text, " hi");
    }

    #[test]
    fn malformed_temperature_is_an_error() {
        let err = parse("::temperature=warm:: hi").unwrap_err();
        assert!(matches!(err, MagpieError::Directive(_)));
        assert!(err.to_string().contains("warm"));
    }

    #[test]
    fn empty_temperature_is_an_error() {
        assert!(parse("::temperature=::").is_err());
    }

    #[test]
    fn model_parsed_and_stripped() {
        let d = parse("hello ::model=gpt-4::").unwrap();
        assert_eq!(d.model.as_deref(), Some("gpt-4"));
        assert_eq!(d.cleaned_text, "hello ");
    }

    #[test]
    fn dotted_model_identifier() {
        let d = parse("::model=gpt-3.5-turbo:: hey").unwrap();
        assert_eq!(d.model.as_deref(), Some("gpt-3.5-turbo"));
    }

    #[test]
    fn url_detected() {
        let d = parse("check http://x.com now").unwrap();
        assert_eq!(d.url.as_deref(), Some("http://x.com"));
        assert_eq!(d.cleaned_text, "check  now");
    }

    #[test]
    fn url_takes_precedence_over_search() {
        let d = parse("::search cats:: see https://example.com/page").unwrap();
        assert_eq!(d.url.as_deref(), Some("https://example.com/page"));
        assert_eq!(d.search_query, None);
    }

    #[test]
    fn search_query_extracted() {
        let d = parse("::search rust async runtimes:: please").unwrap();
        assert_eq!(d.search_query.as_deref(), Some("rust async runtimes"));
        assert_eq!(d.cleaned_text, " please");
    }

    #[test]
    fn first_occurrence_wins() {
        let d = parse("::temperature=0.1:: and ::temperature=0.9::").unwrap();
        assert_eq!(d.temperature, Some(0.1));
        // Both tokens are stripped even though only the first is honored.
        assert_eq!(d.cleaned_text, " and ");
    }

    #[test]
    fn combined_directives() {
        let d = parse("::model=gpt-4:: ::temperature=0.5:: explain this").unwrap();
        assert_eq!(d.model.as_deref(), Some("gpt-4"));
        assert_eq!(d.temperature, Some(0.5));
        assert_eq!(d.cleaned_text, "  explain this");
    }

    #[test]
    fn whitespace_not_collapsed() {
        let d = parse("a  ::model=gpt-4::  b").unwrap();
        assert_eq!(d.cleaned_text, "a    b");
    }
}
