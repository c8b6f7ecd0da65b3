// Copyright 2024 OctoFHIR Team
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! String operators. `Matches`/`ReplaceMatches` use `regex` the same way
//! the rest of the workspace reaches for it for pattern work, rather than
//! a hand-rolled matcher.

use crate::error::{EvalError, EvalResult};
use octofhir_cql_core::Value;
use regex::Regex;

fn as_str(v: &Value, op: &str) -> EvalResult<String> {
    match v {
        Value::String(s) => Ok(s.clone()),
        _ => Err(EvalError::TypeMismatch { op: op.into(), expected: "String".into(), actual: v.kind() }),
    }
}

pub fn starts_with(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(Value::Boolean(as_str(a, "StartsWith")?.starts_with(&as_str(b, "StartsWith")?)))
}

pub fn ends_with(a: &Value, b: &Value) -> EvalResult<Value> {
    Ok(Value::Boolean(as_str(a, "EndsWith")?.ends_with(&as_str(b, "EndsWith")?)))
}

pub fn matches(a: &Value, pattern: &Value) -> EvalResult<Value> {
    let text = as_str(a, "Matches")?;
    let pattern = as_str(pattern, "Matches")?;
    let re = Regex::new(&pattern).map_err(|_| EvalError::TypeMismatch {
        op: "Matches".into(),
        expected: "valid regular expression".into(),
        actual: a.kind(),
    })?;
    Ok(Value::Boolean(re.is_match(&text)))
}

pub fn replace_matches(a: &Value, pattern: &Value, substitution: &Value) -> EvalResult<Value> {
    let text = as_str(a, "ReplaceMatches")?;
    let pattern = as_str(pattern, "ReplaceMatches")?;
    let substitution = as_str(substitution, "ReplaceMatches")?;
    let re = Regex::new(&pattern).map_err(|_| EvalError::TypeMismatch {
        op: "ReplaceMatches".into(),
        expected: "valid regular expression".into(),
        actual: a.kind(),
    })?;
    Ok(Value::String(re.replace_all(&text, substitution.as_str()).into_owned()))
}

pub fn replace(a: &Value, pattern: &Value, substitution: &Value) -> EvalResult<Value> {
    let text = as_str(a, "Replace")?;
    let pattern = as_str(pattern, "Replace")?;
    let substitution = as_str(substitution, "Replace")?;
    Ok(Value::String(text.replace(&pattern, &substitution)))
}

pub fn length(a: &Value) -> EvalResult<Value> {
    Ok(Value::Integer(as_str(a, "Length")?.chars().count() as i64))
}

pub fn substring(a: &Value, start: i64, len: Option<i64>) -> EvalResult<Value> {
    let text = as_str(a, "Substring")?;
    let chars: Vec<char> = text.chars().collect();
    if start < 0 || start as usize > chars.len() {
        return Ok(Value::Null);
    }
    let start = start as usize;
    let end = match len {
        Some(l) => (start + l.max(0) as usize).min(chars.len()),
        None => chars.len(),
    };
    Ok(Value::String(chars[start..end].iter().collect()))
}

pub fn upper(a: &Value) -> EvalResult<Value> {
    Ok(Value::String(as_str(a, "Upper")?.to_uppercase()))
}

pub fn lower(a: &Value) -> EvalResult<Value> {
    Ok(Value::String(as_str(a, "Lower")?.to_lowercase()))
}

pub fn trim(a: &Value) -> EvalResult<Value> {
    Ok(Value::String(as_str(a, "Trim")?.trim().to_string()))
}

pub fn split(a: &Value, separator: &Value) -> EvalResult<Value> {
    let text = as_str(a, "Split")?;
    let sep = as_str(separator, "Split")?;
    Ok(Value::List(text.split(sep.as_str()).map(|s| Value::String(s.to_string())).collect()))
}

pub fn join(list: &Value, separator: &Value) -> EvalResult<Value> {
    let sep = as_str(separator, "Join")?;
    let parts: EvalResult<Vec<String>> = list.as_list().iter().map(|v| as_str(v, "Join")).collect();
    Ok(Value::String(parts?.join(&sep)))
}

pub fn index_of(a: &Value, substring: &Value) -> EvalResult<Value> {
    let text = as_str(a, "IndexOf")?;
    let needle = as_str(substring, "IndexOf")?;
    match text.find(&needle) {
        Some(byte_idx) => Ok(Value::Integer(text[..byte_idx].chars().count() as i64)),
        None => Ok(Value::Integer(-1)),
    }
}

pub fn to_chars(a: &Value) -> EvalResult<Value> {
    Ok(Value::List(as_str(a, "ToChars")?.chars().map(|c| Value::String(c.to_string())).collect()))
}

pub fn encode(a: &Value, scheme: &Value) -> EvalResult<Value> {
    let text = as_str(a, "Encode")?;
    match as_str(scheme, "Encode")?.as_str() {
        "hex" => Ok(Value::String(text.bytes().map(|b| format!("{b:02x}")).collect())),
        _ => Ok(Value::String(text)),
    }
}

pub fn decode(a: &Value, scheme: &Value) -> EvalResult<Value> {
    let text = as_str(a, "Decode")?;
    match as_str(scheme, "Decode")?.as_str() {
        "hex" => {
            let bytes: Option<Vec<u8>> = (0..text.len())
                .step_by(2)
                .map(|i| text.get(i..i + 2).and_then(|s| u8::from_str_radix(s, 16).ok()))
                .collect();
            match bytes.and_then(|b| String::from_utf8(b).ok()) {
                Some(s) => Ok(Value::String(s)),
                None => Ok(Value::Null),
            }
        }
        _ => Ok(Value::String(text)),
    }
}

pub fn concatenate(values: &[Value]) -> EvalResult<Value> {
    if values.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    let mut result = String::new();
    for v in values {
        result.push_str(&as_str(v, "Concatenate")?);
    }
    Ok(Value::String(result))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn substring_respects_optional_length() {
        let text = Value::String("hello world".into());
        assert_eq!(substring(&text, 6, None).unwrap(), Value::String("world".into()));
        assert_eq!(substring(&text, 0, Some(5)).unwrap(), Value::String("hello".into()));
    }

    #[test]
    fn index_of_counts_in_characters_not_bytes() {
        let text = Value::String("héllo".into());
        assert_eq!(index_of(&text, &Value::String("llo".into())).unwrap(), Value::Integer(2));
    }

    #[test]
    fn split_divides_on_separator() {
        let text = Value::String("a,b,c".into());
        let result = split(&text, &Value::String(",".into())).unwrap();
        assert_eq!(result, Value::List(vec![Value::String("a".into()), Value::String("b".into()), Value::String("c".into())]));
    }
}
