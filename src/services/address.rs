use serde_json::Value;

const STREET_SUFFIXES: &[&str] = &[
    "street", "st", "avenue", "ave", "av", "boulevard", "blvd", "road", "rd", "drive", "dr",
    "court", "ct", "crescent", "cres", "lane", "ln", "place", "pl", "terrace", "ter", "trail",
    "trl", "way", "parkway", "pkwy", "highway", "hwy", "circle", "cir", "square", "sq", "gardens",
    "gdns", "grove", "grv", "heights", "hts",
];

const DIRECTIONS: &[&str] = &[
    "n", "s", "e", "w", "ne", "nw", "se", "sw", "north", "south", "east", "west",
];

const UNIT_MARKERS: &[&str] = &["unit", "apt", "suite", "ste", "ph"];

const ADDRESS_KEYS: &[&str] = &["address", "street", "streetAddress", "street_address", "fullAddress"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedAddress {
    pub number: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("address is empty")]
    Empty,

    #[error("no street number in {0:?}")]
    MissingNumber(String),

    #[error("no street name in {0:?}")]
    MissingName(String),
}

// Saved searches store either the raw address or a JSON object captured from
// the building page; pull the street line out of whichever we got.
pub fn street_line(raw: &str) -> Option<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.starts_with('{') {
        return Some(raw.to_string());
    }

    let value: Value = match serde_json::from_str(raw) {
        Ok(v) => v,
        Err(_) => return Some(raw.to_string()),
    };

    let number = value
        .get("streetNumber")
        .or_else(|| value.get("street_number"))
        .and_then(json_text);
    let name = value
        .get("streetName")
        .or_else(|| value.get("street_name"))
        .and_then(json_text);
    if let (Some(number), Some(name)) = (number, name) {
        return Some(format!("{number} {name}"));
    }

    ADDRESS_KEYS
        .iter()
        .find_map(|key| value.get(*key).and_then(json_text))
}

fn json_text(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// The street line before any city or postal suffix, with runs of whitespace
/// collapsed. Two saved addresses name the same building when their keys
/// match ignoring case.
pub fn building_key(raw: &str) -> Option<String> {
    let line = street_line(raw)?;
    let street = line.split(',').next().unwrap_or_default();
    let key = street.split_whitespace().collect::<Vec<_>>().join(" ");
    if key.is_empty() {
        None
    } else {
        Some(key)
    }
}

pub fn parse_street_address(raw: &str) -> Result<ParsedAddress, AddressError> {
    let line = street_line(raw).ok_or(AddressError::Empty)?;
    let street = line.split(',').next().unwrap_or_default().trim();

    let mut tokens: Vec<&str> = Vec::new();
    let mut skip_next = false;
    for token in street.split_whitespace() {
        if skip_next {
            skip_next = false;
            continue;
        }
        if token.starts_with('#') {
            continue;
        }
        let bare = token.trim_end_matches(['.', ':']);
        if UNIT_MARKERS.iter().any(|m| bare.eq_ignore_ascii_case(m)) {
            skip_next = true;
            continue;
        }
        tokens.push(token);
    }

    let first = tokens.first().ok_or(AddressError::Empty)?;
    let number = parse_number(first).ok_or_else(|| AddressError::MissingNumber(line.clone()))?;

    let mut name_tokens: Vec<&str> = tokens[1..]
        .iter()
        .map(|t| t.trim_end_matches(['.', ',']))
        .filter(|t| !t.is_empty())
        .collect();

    if name_tokens.len() > 1 && matches_any(name_tokens[name_tokens.len() - 1], DIRECTIONS) {
        name_tokens.pop();
    }
    if name_tokens.len() > 1 && matches_any(name_tokens[name_tokens.len() - 1], STREET_SUFFIXES) {
        name_tokens.pop();
    }

    if name_tokens.is_empty() {
        return Err(AddressError::MissingName(line));
    }

    Ok(ParsedAddress {
        number,
        name: name_tokens.join(" "),
    })
}

fn matches_any(token: &str, list: &[&str]) -> bool {
    list.iter().any(|s| token.eq_ignore_ascii_case(s))
}

// "1200-1210" keeps 1200, "15A" stays as-is.
fn parse_number(token: &str) -> Option<String> {
    let token = token.trim_matches(|c: char| !c.is_ascii_alphanumeric() && c != '-');
    let first = token.split('-').next()?;
    if !first.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    if !first.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(first.to_string())
}
