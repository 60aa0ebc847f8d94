//! Optional fields with change tracking.
//!
//! Every optional piece of a parameter or type definition moves through
//! the same small state machine:
//!
//! ```text
//!            set(v)                    delta write
//! Absent ──────────→ Present(dirty) ──────────────→ Present(clean)
//!                         │    ↑ set(other)               │
//!                  clear()│    └──────────────────────────┘
//!                         ↓                               │ clear()
//!                   Absent(dirty) ←───────────────────────┘
//!                         │ delta write (emits a sentinel)
//!                         ↓
//!                   Absent(clean)
//! ```
//!
//! A full write (`all = true`) emits every present field and leaves the
//! change flags alone. A delta write (`all = false`) emits only changed
//! fields and resets their flags.

use std::collections::BTreeMap;

use crate::wire::{WireReader, WireWriter, TERMINATOR};
use crate::ProtocolError;

/// What a field contributes to the next write.
pub(crate) enum Pending<'a, T> {
    Skip,
    Present(&'a T),
    Cleared,
}

/// One optional value plus its "changed since last delta" flag.
///
/// Equality compares only the value. A field that was cleared and one that
/// was never set are equal.
#[derive(Debug, Clone)]
pub struct Field<T> {
    value: Option<T>,
    changed: bool,
}

impl<T> Default for Field<T> {
    fn default() -> Self {
        Self {
            value: None,
            changed: false,
        }
    }
}

impl<T: PartialEq> PartialEq for Field<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl<T> Field<T> {
    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn is_present(&self) -> bool {
        self.value.is_some()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    /// Removes the value and marks the field changed so the next delta
    /// carries a clearing sentinel.
    pub fn clear(&mut self) {
        self.value = None;
        self.changed = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.changed = false;
    }

    pub(crate) fn pending(&mut self, all: bool) -> Pending<'_, T> {
        match &self.value {
            Some(value) if all || self.changed => {
                if !all {
                    self.changed = false;
                }
                Pending::Present(value)
            }
            Some(_) => Pending::Skip,
            None if self.changed && !all => {
                self.changed = false;
                Pending::Cleared
            }
            None => Pending::Skip,
        }
    }

    /// Writes `code` and the value (or `sentinel()` for a cleared field)
    /// when the field is due.
    pub(crate) fn write_option(
        &mut self,
        out: &mut WireWriter,
        code: u8,
        all: bool,
        sentinel: impl FnOnce() -> T,
        write: impl Fn(&mut WireWriter, &T),
    ) {
        match self.pending(all) {
            Pending::Skip => {}
            Pending::Present(value) => {
                out.write_u8(code);
                write(out, value);
            }
            Pending::Cleared => {
                out.write_u8(code);
                write(out, &sentinel());
            }
        }
    }
}

impl<T: PartialEq> Field<T> {
    /// Stores `value` and marks the field changed. Returns `false` without
    /// touching the flag when the value is already present and equal.
    pub fn set(&mut self, value: T) -> bool {
        if self.value.as_ref() == Some(&value) {
            return false;
        }
        self.value = Some(value);
        self.changed = true;
        true
    }

    /// Stores a value received from a peer. Remote data never marks the
    /// field changed, so it is not echoed back on the next delta.
    pub(crate) fn apply(&mut self, value: T) -> bool {
        if self.value.as_ref() == Some(&value) {
            return false;
        }
        self.value = Some(value);
        true
    }
}

impl<T: PartialEq + Clone> Field<T> {
    /// Copies a present value from `other` (a parsed proxy) into `self`.
    pub(crate) fn merge(&mut self, other: &Field<T>) -> bool {
        match &other.value {
            Some(value) => self.apply(value.clone()),
            None => false,
        }
    }
}

impl<T> From<T> for Field<T> {
    fn from(value: T) -> Self {
        Self {
            value: Some(value),
            changed: false,
        }
    }
}

// ---------------------------------------------------------------------------
// LocalizedText
// ---------------------------------------------------------------------------

/// Length prefix used by a [`LocalizedText`] block.
#[derive(Debug, Clone, Copy)]
pub(crate) enum TextWidth {
    Tiny,
    Short,
}

impl TextWidth {
    fn write(self, out: &mut WireWriter, text: &str) {
        match self {
            Self::Tiny => out.write_tiny_string(text),
            Self::Short => out.write_short_string(text),
        }
    }

    fn read(self, input: &mut WireReader<'_>) -> Result<String, ProtocolError> {
        match self {
            Self::Tiny => input.read_tiny_string(),
            Self::Short => input.read_short_string(),
        }
    }
}

const DEFAULT_LANGUAGE: &[u8; 3] = b"any";

/// A label or description: one default text plus per-language overrides.
///
/// On the wire a block is a sequence of `3-byte language code + string`
/// pairs closed by `0x00`. The default text uses the code `any`. All
/// entries share one change flag.
#[derive(Debug, Clone, Default)]
pub struct LocalizedText {
    text: Option<String>,
    languages: BTreeMap<String, String>,
    changed: bool,
}

impl PartialEq for LocalizedText {
    fn eq(&self, other: &Self) -> bool {
        self.text == other.text && self.languages == other.languages
    }
}

impl LocalizedText {
    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn language(&self, code: &str) -> Option<&str> {
        self.languages.get(code).map(String::as_str)
    }

    pub fn languages(&self) -> impl Iterator<Item = (&str, &str)> {
        self.languages
            .iter()
            .map(|(code, text)| (code.as_str(), text.as_str()))
    }

    pub fn is_present(&self) -> bool {
        self.text.is_some() || !self.languages.is_empty()
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn set(&mut self, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.text.as_ref() == Some(&text) {
            return false;
        }
        self.text = Some(text);
        self.changed = true;
        true
    }

    /// Sets the override for a language. Codes are three ASCII letters
    /// (ISO 639-2); longer codes are cut, shorter ones space-padded on
    /// the wire.
    pub fn set_language(&mut self, code: &str, text: impl Into<String>) -> bool {
        let text = text.into();
        if self.languages.get(code) == Some(&text) {
            return false;
        }
        self.languages.insert(code.to_string(), text);
        self.changed = true;
        true
    }

    pub fn remove_language(&mut self, code: &str) -> bool {
        let removed = self.languages.remove(code).is_some();
        if removed {
            self.changed = true;
        }
        removed
    }

    /// Drops the default text and every override.
    pub fn clear(&mut self) {
        self.text = None;
        self.languages.clear();
        self.changed = true;
    }

    pub(crate) fn mark_clean(&mut self) {
        self.changed = false;
    }

    pub(crate) fn write(&mut self, out: &mut WireWriter, code: u8, all: bool, width: TextWidth) {
        if self.is_present() {
            if !(all || self.changed) {
                return;
            }
            out.write_u8(code);
            if let Some(text) = &self.text {
                out.write_bytes(DEFAULT_LANGUAGE);
                width.write(out, text);
            }
            for (language, text) in &self.languages {
                out.write_bytes(&language_code(language));
                width.write(out, text);
            }
            out.terminate();
            if !all {
                self.changed = false;
            }
        } else if self.changed && !all {
            // A cleared block is the option code with an empty entry list.
            out.write_u8(code);
            out.terminate();
            self.changed = false;
        }
    }

    pub(crate) fn parse(
        input: &mut WireReader<'_>,
        width: TextWidth,
    ) -> Result<Self, ProtocolError> {
        let mut parsed = Self::default();
        loop {
            if input.peek_u8()? == TERMINATOR {
                input.read_u8()?;
                break;
            }
            let code: [u8; 3] = input.read_array()?;
            let text = width.read(input)?;
            if &code == DEFAULT_LANGUAGE {
                parsed.text = Some(text);
            } else {
                let language = String::from_utf8_lossy(&code).trim_end().to_string();
                parsed.languages.insert(language, text);
            }
        }
        Ok(parsed)
    }

    /// Applies present entries from a parsed proxy without marking changes.
    pub(crate) fn merge(&mut self, other: &LocalizedText) -> bool {
        let mut applied = false;
        if let Some(text) = &other.text {
            if self.text.as_ref() != Some(text) {
                self.text = Some(text.clone());
                applied = true;
            }
        }
        for (language, text) in &other.languages {
            if self.languages.get(language) != Some(text) {
                self.languages.insert(language.clone(), text.clone());
                applied = true;
            }
        }
        applied
    }
}

fn language_code(language: &str) -> [u8; 3] {
    let mut code = [b' '; 3];
    for (slot, byte) in code.iter_mut().zip(language.bytes()) {
        *slot = byte;
    }
    code
}

// =========================================================================
// Tests
// =========================================================================
