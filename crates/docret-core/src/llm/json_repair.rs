//! Best-effort repair of almost-JSON produced by LLMs: trailing commas
//! before closing brackets, adjacent objects, prose around the payload.
//! A compatibility shim for imperfect model output, not a general JSON
//! relaxation — anything still broken after repair is an error.

use anyhow::{anyhow, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;

static TRAILING_COMMA_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r#"",\s*\}"#).unwrap());
static TRAILING_COMMA_ARRAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"\},\s*\]").unwrap());
static ADJACENT_OBJECTS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\}\s*\{").unwrap());

/// Repair common LLM JSON defects and slice away surrounding prose.
/// Returns the input unchanged when no bracketed payload is present.
pub fn get_fixed_json(text: &str) -> String {
    let fixed = TRAILING_COMMA_OBJECT.replace_all(text, "\"}");
    let fixed = TRAILING_COMMA_ARRAY.replace_all(&fixed, "}]");
    let fixed = ADJACENT_OBJECTS.replace_all(&fixed, "},{");

    let (Some(open), Some(close)) = (fixed.find(['[', '{']), fixed.rfind([']', '}'])) else {
        return fixed.into_owned();
    };
    if close < open {
        return fixed.into_owned();
    }
    fixed[open..=close].to_string()
}

/// Repair then parse into a typed value.
pub fn parse_llm_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    serde_json::from_str(&get_fixed_json(text))
        .map_err(|err| anyhow!("unparseable LLM response ({}): {}", err, text))
}
