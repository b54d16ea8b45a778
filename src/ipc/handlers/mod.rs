pub mod attendance;
pub mod core;
pub mod gate;
pub mod ip_rules;
pub mod students;

use serde::Deserialize;

/// Student ids arrive as strings from forms but as numbers from some clients.
/// Both are handed to the directory lookup as raw text so format errors are
/// reported the same way.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum StudentIdParam {
    Text(String),
    Number(i64),
}

impl StudentIdParam {
    pub fn into_raw(self) -> String {
        match self {
            StudentIdParam::Text(s) => s,
            StudentIdParam::Number(n) => n.to_string(),
        }
    }
}
