//! Extraction of an [`EnergyEstimate`] from the model's free-form answer.
//!
//! [`parse`] is total: it tries a chain of extraction strategies from
//! strictest to loosest and falls back to a zeroed estimate. Every result
//! passes through [`EnergyEstimate::sanitized`].
//!
//! 1. [`FencedJson`]: a ```` ```json ```` block.
//! 2. [`EmbeddedObject`]: any balanced `{...}` in the text that carries
//!    estimate fields. Lenient JSON5 syntax is accepted.
//! 3. [`Heuristic`]: regex scraping of figures like `12.5 kWh` or `$3.10`.
//!    Confidence is capped at [`HEURISTIC_CONFIDENCE`].

use std::iter::Peekable;
use std::str::CharIndices;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};
use tracing::debug;

use aluminati_core::estimate::EnergyEstimate;

/// Upper bound on confidence for heuristically scraped estimates.
pub const HEURISTIC_CONFIDENCE: f64 = 0.3;

const KWH_KEYS: &[&str] = &["estimated_kwh", "kwh", "energy_kwh"];
const CARBON_KEYS: &[&str] = &["estimated_carbon_kg", "carbon_kg", "co2_kg", "co2e_kg"];
const COST_KEYS: &[&str] = &["estimated_cost_usd", "cost_usd", "cost"];
const CONFIDENCE_KEYS: &[&str] = &["confidence"];
const OPTIMIZATION_KEYS: &[&str] = &["optimizations", "recommendations"];
const REASONING_KEYS: &[&str] = &["reasoning_trace", "reasoning"];
const QUESTION_KEYS: &[&str] = &["clarifying_questions", "questions"];

/// One link in the extraction chain.
trait ExtractionStrategy: Sync {
    fn name(&self) -> &'static str;
    fn extract(&self, text: &str) -> Option<EnergyEstimate>;
}

static STRATEGIES: &[&dyn ExtractionStrategy] = &[&FencedJson, &EmbeddedObject, &Heuristic];

/// Parse a final answer into an estimate. Never fails.
pub fn parse(text: &str) -> EnergyEstimate {
    if text.trim().is_empty() {
        return EnergyEstimate::zeroed("The model returned an empty answer; no estimate could be extracted");
    }

    for strategy in STRATEGIES {
        if let Some(estimate) = strategy.extract(text) {
            debug!(strategy = strategy.name(), "Extracted estimate from answer");
            return estimate.sanitized();
        }
    }

    debug!("No extraction strategy matched the answer");
    EnergyEstimate::zeroed(
        "Could not extract a structured estimate or any recognizable figures from the model's answer",
    )
}

// --- Structured payloads ---

static FENCED_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```[A-Za-z0-9]*[ \t]*\r?\n?(.*?)```").expect("fenced block pattern is a valid regex")
});

struct FencedJson;

impl ExtractionStrategy for FencedJson {
    fn name(&self) -> &'static str {
        "fenced_json"
    }

    fn extract(&self, text: &str) -> Option<EnergyEstimate> {
        // The last block wins; models put the final payload at the end.
        let blocks: Vec<&str> = FENCED_BLOCK
            .captures_iter(text)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim())
            .collect();
        blocks
            .into_iter()
            .rev()
            .filter_map(parse_object)
            .find_map(|obj| from_payload(&obj))
    }
}

/// Deepest `{`/`[` nesting a candidate payload may have. Kept well below
/// serde_json's recursion limit so the JSON5 fallback never recurses deeply.
const MAX_NESTING_DEPTH: usize = 64;

/// The embedded strategy only scans this many trailing bytes of an answer.
const MAX_SCAN_BYTES: usize = 16 * 1024;

/// Upper bound on `{` positions the embedded strategy tries.
const MAX_CANDIDATES: usize = 256;

struct EmbeddedObject;

impl ExtractionStrategy for EmbeddedObject {
    fn name(&self) -> &'static str {
        "embedded_object"
    }

    fn extract(&self, text: &str) -> Option<EnergyEstimate> {
        let text = scan_window(text);
        let mut found = None;
        let mut pos = 0;
        let mut candidates = 0;
        while let Some(offset) = text[pos..].find('{') {
            candidates += 1;
            if candidates > MAX_CANDIDATES {
                debug!(candidates, "Embedded object scan stopped at candidate limit");
                break;
            }
            let start = pos + offset;
            match balanced_object_end(text, start) {
                // Too deep to parse safely; nothing nested inside it is a payload either.
                Some((end, depth)) if depth > MAX_NESTING_DEPTH => pos = end,
                Some((end, _)) => match parse_object(&text[start..end]).and_then(|o| from_payload(&o)) {
                    Some(estimate) => {
                        found = Some(estimate);
                        pos = end;
                    }
                    None => pos = start + 1,
                },
                None => pos = start + 1,
            }
        }
        found
    }
}

/// The last [`MAX_SCAN_BYTES`] of `text`, cut on a char boundary.
fn scan_window(text: &str) -> &str {
    let mut start = text.len().saturating_sub(MAX_SCAN_BYTES);
    while !text.is_char_boundary(start) {
        start += 1;
    }
    &text[start..]
}

/// Brackets and braces outside string literals and JSON5 comments, with
/// their byte offsets.
struct Brackets<'a> {
    chars: Peekable<CharIndices<'a>>,
}

impl<'a> Brackets<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            chars: text.char_indices().peekable(),
        }
    }

    fn skip_string(&mut self, quote: char) {
        while let Some((_, c)) = self.chars.next() {
            if c == '\\' {
                self.chars.next();
            } else if c == quote {
                return;
            }
        }
    }

    fn skip_line_comment(&mut self) {
        for (_, c) in self.chars.by_ref() {
            if c == '\n' {
                return;
            }
        }
    }

    fn skip_block_comment(&mut self) {
        let mut prev = ' ';
        for (_, c) in self.chars.by_ref() {
            if prev == '*' && c == '/' {
                return;
            }
            prev = c;
        }
    }
}

impl Iterator for Brackets<'_> {
    type Item = (usize, char);

    fn next(&mut self) -> Option<(usize, char)> {
        while let Some((i, c)) = self.chars.next() {
            match c {
                '{' | '}' | '[' | ']' => return Some((i, c)),
                '"' | '\'' => self.skip_string(c),
                '/' => match self.chars.peek().map(|&(_, next)| next) {
                    Some('/') => self.skip_line_comment(),
                    Some('*') => {
                        self.chars.next();
                        self.skip_block_comment();
                    }
                    _ => {}
                },
                _ => {}
            }
        }
        None
    }
}

/// Byte index one past the `}` closing the object that opens at `start`,
/// and the deepest nesting seen inside it. `None` when it never closes.
fn balanced_object_end(text: &str, start: usize) -> Option<(usize, usize)> {
    let mut braces = 0usize;
    let mut nesting = 0usize;
    let mut max_nesting = 0usize;

    for (i, c) in Brackets::new(&text[start..]) {
        match c {
            '{' | '[' => {
                nesting += 1;
                max_nesting = max_nesting.max(nesting);
                if c == '{' {
                    braces += 1;
                }
            }
            _ => {
                nesting = nesting.saturating_sub(1);
                if c == '}' {
                    braces = braces.saturating_sub(1);
                    if braces == 0 {
                        return Some((start + i + 1, max_nesting));
                    }
                }
            }
        }
    }
    None
}

fn exceeds_nesting_limit(raw: &str) -> bool {
    let mut depth = 0usize;
    for (_, c) in Brackets::new(raw) {
        if c == '{' || c == '[' {
            depth += 1;
            if depth > MAX_NESTING_DEPTH {
                return true;
            }
        } else {
            depth = depth.saturating_sub(1);
        }
    }
    false
}

/// Strict JSON first, then JSON5 for trailing commas, comments and
/// single-quoted strings. Deeply nested input is rejected before either
/// parser sees it.
fn parse_object(raw: &str) -> Option<Map<String, Value>> {
    if exceeds_nesting_limit(raw) {
        return None;
    }
    let value = match serde_json::from_str::<Value>(raw) {
        Ok(value) => value,
        Err(e) if e.to_string().contains("recursion limit") => return None,
        Err(_) => json5::from_str::<Value>(raw).ok()?,
    };
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

fn lookup<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k)).filter(|v| !v.is_null())
}

/// Build an estimate from a JSON object. `None` when the object carries
/// none of the estimate fields.
fn from_payload(obj: &Map<String, Value>) -> Option<EnergyEstimate> {
    let known = [
        KWH_KEYS,
        CARBON_KEYS,
        COST_KEYS,
        CONFIDENCE_KEYS,
        OPTIMIZATION_KEYS,
        REASONING_KEYS,
        QUESTION_KEYS,
    ];
    if !known.iter().any(|keys| lookup(obj, keys).is_some()) {
        return None;
    }

    let number = |keys: &[&str]| lookup(obj, keys).and_then(coerce_number).unwrap_or(0.0);
    let list = |keys: &[&str]| lookup(obj, keys).map(coerce_list).unwrap_or_default();

    let questions = list(QUESTION_KEYS);
    Some(EnergyEstimate {
        estimated_kwh: number(KWH_KEYS),
        estimated_carbon_kg: number(CARBON_KEYS),
        estimated_cost_usd: number(COST_KEYS),
        optimizations: list(OPTIMIZATION_KEYS),
        reasoning_trace: list(REASONING_KEYS),
        confidence: normalize_confidence(number(CONFIDENCE_KEYS)),
        clarifying_questions: if questions.is_empty() {
            None
        } else {
            Some(questions)
        },
    })
}

static LEADING_NUMBER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[$~≈]?\s*(-?\d[\d,]*(?:\.\d+)?|-?\.\d+)(\s*%)?")
        .expect("leading number pattern is a valid regex")
});

/// Numbers, or strings that start with one (`"12.5 kWh"`, `"$1,200"`, `"80%"`).
fn coerce_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let caps = LEADING_NUMBER.captures(s)?;
            let n: f64 = caps[1].replace(',', "").parse().ok()?;
            Some(if caps.get(2).is_some() { n / 100.0 } else { n })
        }
        Value::Bool(_) | Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn coerce_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::String(s) => Some(s.trim().to_string()),
                Value::Null => None,
                other => Some(other.to_string()),
            })
            .collect(),
        Value::String(s) => vec![s.trim().to_string()],
        _ => Vec::new(),
    }
}

/// Models sometimes report confidence as a percentage.
fn normalize_confidence(value: f64) -> f64 {
    if value > 1.0 && value <= 100.0 {
        value / 100.0
    } else {
        value
    }
}

// --- Free-text scraping ---

static KWH_FIGURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(kwh|mwh|kilowatt[- ]hours?|megawatt[- ]hours?)\b")
        .expect("kwh pattern is a valid regex")
});

static CARBON_FIGURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(\d[\d,]*(?:\.\d+)?)\s*(kg|kilograms?|t|tonnes?|metric tons?)\s*(?:of\s+)?(?:co2e?|co₂e?|carbon)",
    )
    .expect("carbon pattern is a valid regex")
});

static COST_FIGURE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\$\s*(\d[\d,]*(?:\.\d+)?)|(\d[\d,]*(?:\.\d+)?)\s*(?:usd|dollars)\b")
        .expect("cost pattern is a valid regex")
});

static BULLET: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*(?:[-*•]|\d+[.)])\s+(.+)$").expect("bullet pattern is a valid regex")
});

fn parse_figure(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

struct Heuristic;

impl ExtractionStrategy for Heuristic {
    fn name(&self) -> &'static str {
        "heuristic"
    }

    fn extract(&self, text: &str) -> Option<EnergyEstimate> {
        let kwh = KWH_FIGURE.captures(text).and_then(|c| {
            let n = parse_figure(&c[1])?;
            Some(if c[2].to_ascii_lowercase().starts_with('m') {
                n * 1000.0
            } else {
                n
            })
        });
        let carbon_kg = CARBON_FIGURE.captures(text).and_then(|c| {
            let n = parse_figure(&c[1])?;
            Some(if c[2].to_ascii_lowercase().starts_with('k') {
                n
            } else {
                n * 1000.0
            })
        });
        let cost_usd = COST_FIGURE.captures(text).and_then(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .and_then(|m| parse_figure(m.as_str()))
        });

        let questions: Vec<String> = text
            .lines()
            .map(str::trim)
            .filter(|l| l.ends_with('?') && l.len() > 1)
            .map(|l| {
                BULLET
                    .captures(l)
                    .map_or_else(|| l.to_string(), |c| c[1].trim().to_string())
            })
            .collect();

        if kwh.is_none() && carbon_kg.is_none() && cost_usd.is_none() && questions.is_empty() {
            return None;
        }

        Some(EnergyEstimate {
            estimated_kwh: kwh.unwrap_or(0.0),
            estimated_carbon_kg: carbon_kg.unwrap_or(0.0),
            estimated_cost_usd: cost_usd.unwrap_or(0.0),
            optimizations: scrape_optimizations(text),
            reasoning_trace: vec![
                "No structured payload found; figures were extracted heuristically from free text"
                    .to_string(),
            ],
            confidence: if kwh.is_some() { HEURISTIC_CONFIDENCE } else { 0.1 },
            clarifying_questions: if questions.is_empty() || kwh.is_some() {
                None
            } else {
                Some(questions)
            },
        })
    }
}

/// Bullet points following a line that mentions optimizations or
/// recommendations.
fn scrape_optimizations(text: &str) -> Vec<String> {
    let mut in_section = false;
    let mut items = Vec::new();

    for line in text.lines() {
        let lower = line.to_lowercase();
        if let Some(c) = BULLET.captures(line) {
            if in_section {
                items.push(c[1].trim().to_string());
            }
            continue;
        }
        if lower.contains("optimi") || lower.contains("recommend") {
            in_section = true;
        } else if line.trim().is_empty() {
            if !items.is_empty() {
                in_section = false;
            }
        } else {
            in_section = false;
        }
    }
    items
}
