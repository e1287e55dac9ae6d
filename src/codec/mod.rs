//! Snake-case JSON encoding and decoding.
//!
//! The API speaks `snake_case` field names. [`encode`] renames struct fields
//! as they are serialized, whatever `serde` attributes the type carries. Map
//! keys are caller data (metadata, for instance) and pass through untouched.
//! [`decode`] is the inverse: a snake-case key fills the struct field it was
//! encoded from.

mod de;
mod ser;

pub use ser::SnakeCase;

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::sync::{LazyLock, Mutex, PoisonError};

/// Serializes `value` as JSON with snake-case struct field names.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(&SnakeCase(value))
}

/// Deserializes a snake-case JSON document.
///
/// Struct fields accept both their declared name and its snake-case form, so
/// anything [`encode`] produces decodes back. Types that buffer their input
/// (`#[serde(flatten)]`, untagged or internally tagged enums) only see the
/// declared names.
pub fn decode<T: DeserializeOwned>(text: &str) -> serde_json::Result<T> {
    let mut deserializer = serde_json::Deserializer::from_str(text);
    let value = de::deserialize(&mut deserializer)?;
    deserializer.end()?;
    Ok(value)
}

/// Converts a `camelCase` or `PascalCase` identifier to `snake_case`.
///
/// Acronyms stay together: `HTTPStatus` becomes `http_status`.
pub fn to_snake_case(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if !c.is_uppercase() {
            out.push(c);
            continue;
        }
        if i > 0 {
            let prev = chars[i - 1];
            let next_is_lower = chars.get(i + 1).is_some_and(|n| n.is_lowercase());
            let boundary = prev.is_lowercase()
                || prev.is_ascii_digit()
                || (prev.is_uppercase() && next_is_lower);
            if boundary && prev != '_' {
                out.push('_');
            }
        }
        out.extend(c.to_lowercase());
    }

    out
}

/// `SerializeStruct` wants `&'static str` keys. Field names come from derived
/// impls, so the set is finite and each converted name is leaked once.
fn field_name(name: &'static str) -> &'static str {
    if !name.chars().any(char::is_uppercase) {
        return name;
    }

    static NAMES: LazyLock<Mutex<HashMap<&'static str, &'static str>>> =
        LazyLock::new(Default::default);

    let mut names = NAMES.lock().unwrap_or_else(PoisonError::into_inner);
    *names
        .entry(name)
        .or_insert_with(|| Box::leak(to_snake_case(name).into_boxed_str()))
}
