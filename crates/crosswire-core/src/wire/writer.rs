//! Token writer with a deduplicated string table.
//!
//! Every string referenced from the payload body is stored once in the table
//! and referenced by 1-based index; the table is emitted before the body at
//! finalization time.

use std::collections::HashMap;

use crate::wire::escape::escape;
use crate::wire::SEPARATOR;

#[derive(Debug, Default)]
pub struct PayloadWriter {
    table: Vec<String>,
    index: HashMap<String, u32>,
    body: Vec<String>,
}

impl PayloadWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern a string, returning its 1-based table index.
    pub fn intern(&mut self, s: &str) -> u32 {
        if let Some(&idx) = self.index.get(s) {
            return idx;
        }
        self.table.push(s.to_string());
        let idx = self.table.len() as u32;
        self.index.insert(s.to_string(), idx);
        idx
    }

    /// Append a raw body token.
    pub fn token(&mut self, t: impl Into<String>) {
        self.body.push(t.into());
    }

    /// Append a body token referencing an interned string.
    pub fn string_ref(&mut self, s: &str) {
        let idx = self.intern(s);
        self.body.push(idx.to_string());
    }

    /// Append the null-string token (index zero).
    pub fn null_ref(&mut self) {
        self.body.push("0".into());
    }

    /// Finalize a request payload: `version|flags|N|table...|body...|`.
    pub fn finalize_request(self, version: u32, flags: u32) -> String {
        let mut tokens: Vec<String> =
            Vec::with_capacity(3 + self.table.len() + self.body.len());
        tokens.push(version.to_string());
        tokens.push(flags.to_string());
        Self::emit(tokens, self.table, self.body)
    }

    /// Finalize a bare value stream: `N|table...|body...|`. Used for response
    /// payloads produced by test fixtures and consumed by the reader.
    pub fn finalize_value_stream(self) -> String {
        let tokens = Vec::with_capacity(1 + self.table.len() + self.body.len());
        Self::emit(tokens, self.table, self.body)
    }

    fn emit(mut tokens: Vec<String>, table: Vec<String>, body: Vec<String>) -> String {
        tokens.push(table.len().to_string());
        tokens.extend(table.iter().map(|s| escape(s)));
        tokens.extend(body);

        let mut out = String::new();
        for t in tokens {
            out.push_str(&t);
            out.push(SEPARATOR);
        }
        out
    }
}
