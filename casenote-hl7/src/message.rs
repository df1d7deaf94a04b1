use serde::{Deserialize, Serialize};

use crate::Hl7Error;

static EMPTY_FIELD: Field = Field {
    value: String::new(),
    components: Vec::new(),
    repetitions: Vec::new(),
};

static EMPTY_COMPONENT: Component = Component {
    value: String::new(),
    sub_components: Vec::new(),
};

/// Separator characters declared by the message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Delimiters {
    pub field: char,
    pub component: char,
    pub repetition: char,
    pub escape: char,
    pub subcomponent: char,
}

impl Default for Delimiters {
    fn default() -> Self {
        Self {
            field: '|',
            component: '^',
            repetition: '~',
            escape: '\\',
            subcomponent: '&',
        }
    }
}

impl Delimiters {
    /// Read the separators from an `MSH` line, keeping the default for any that are missing.
    fn from_header(line: &str) -> Self {
        let defaults = Self::default();
        let mut chars = line.chars().skip(3);
        let Some(field) = chars.next() else {
            return defaults;
        };

        let encoding: Vec<char> = chars.take_while(|c| *c != field).collect();
        Self {
            field,
            component: encoding.first().copied().unwrap_or(defaults.component),
            repetition: encoding.get(1).copied().unwrap_or(defaults.repetition),
            escape: encoding.get(2).copied().unwrap_or(defaults.escape),
            subcomponent: encoding.get(3).copied().unwrap_or(defaults.subcomponent),
        }
    }

    /// Decode the separator escapes `\F\`, `\S\`, `\T\`, `\R\` and `\E\`.
    ///
    /// Other escape sequences (highlighting, hex, formatting) and an unterminated
    /// escape character are kept verbatim.
    pub fn unescape(&self, text: &str) -> String {
        if !text.contains(self.escape) {
            return text.to_string();
        }

        let width = self.escape.len_utf8();
        let mut decoded = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find(self.escape) {
            decoded.push_str(&rest[..start]);
            let after = &rest[start + width..];
            let Some(end) = after.find(self.escape) else {
                decoded.push_str(&rest[start..]);
                return decoded;
            };

            let sequence = &after[..end];
            match self.separator_for(sequence) {
                Some(separator) => decoded.push(separator),
                None => decoded.push_str(&rest[start..start + width + end + width]),
            }
            rest = &after[end + width..];
        }
        decoded.push_str(rest);
        decoded
    }

    fn separator_for(&self, sequence: &str) -> Option<char> {
        match sequence {
            "F" => Some(self.field),
            "S" => Some(self.component),
            "T" => Some(self.subcomponent),
            "R" => Some(self.repetition),
            "E" => Some(self.escape),
            _ => None,
        }
    }
}

/// A tokenized message: an ordered list of segments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    segments: Vec<Segment>,
}

impl Message {
    /// Tokenize a message. Segments may be terminated by `\r`, `\n` or `\r\n`.
    ///
    /// When the first segment is an `MSH` header its encoding characters are honoured,
    /// otherwise the standard `|^~\&` set is assumed.
    pub fn parse(text: &str) -> Result<Self, Hl7Error> {
        let lines: Vec<&str> = text
            .split(|c| c == '\r' || c == '\n')
            .map(str::trim_start)
            .filter(|line| !line.is_empty())
            .collect();

        let first = lines.first().ok_or(Hl7Error::Empty)?;
        let delimiters = if first.starts_with("MSH") {
            Delimiters::from_header(first)
        } else {
            Delimiters::default()
        };

        let segments = lines
            .iter()
            .map(|line| Segment::parse(line, &delimiters))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// All segments with the given name, in message order.
    pub fn segments_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Segment> + 'a {
        self.segments.iter().filter(move |segment| segment.name == name)
    }

    /// First segment with the given name.
    pub fn segment(&self, name: &str) -> Option<&Segment> {
        self.segments.iter().find(|segment| segment.name == name)
    }
}

/// A named record holding 1-based fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    name: String,
    fields: Vec<Field>,
}

impl Segment {
    /// Tokenize one segment line.
    pub fn parse(line: &str, delimiters: &Delimiters) -> Result<Self, Hl7Error> {
        let mut parts = line.split(delimiters.field);
        let name = parts.next().unwrap_or_default();
        if name.len() != 3 || !name.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(Hl7Error::InvalidSegment(name.to_string()));
        }

        let fields = if name == "MSH" {
            // MSH-1 is the field separator itself; MSH-2 carries the encoding characters verbatim.
            let mut fields = vec![Field::literal(delimiters.field.to_string())];
            if let Some(encoding) = parts.next() {
                fields.push(Field::literal(encoding.to_string()));
            }
            fields.extend(parts.map(|raw| Field::parse(raw, delimiters)));
            fields
        } else {
            parts.map(|raw| Field::parse(raw, delimiters)).collect()
        };

        Ok(Self {
            name: name.to_string(),
            fields,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Field at a 1-based position; empty when the segment is shorter.
    pub fn field(&self, position: usize) -> &Field {
        position
            .checked_sub(1)
            .and_then(|index| self.fields.get(index))
            .unwrap_or(&EMPTY_FIELD)
    }

    /// Number of fields actually carried by the segment.
    pub fn field_count(&self) -> usize {
        self.fields.len()
    }
}

/// One field position. When the field repeats, `components` mirrors the first repetition.
///
/// Text accessors return decoded text: separator escapes are replaced by the
/// separator they stand for, after the field has been split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field {
    value: String,
    components: Vec<Component>,
    repetitions: Vec<Field>,
}

impl Field {
    pub fn parse(raw: &str, delimiters: &Delimiters) -> Self {
        let repetitions: Vec<Field> = if raw.contains(delimiters.repetition) {
            raw.split(delimiters.repetition)
                .map(|repetition| Self::single(repetition, delimiters))
                .collect()
        } else {
            Vec::new()
        };

        let components = match repetitions.first() {
            Some(first) => first.components.clone(),
            None => Self::split_components(raw, delimiters),
        };

        Self {
            value: delimiters.unescape(raw),
            components,
            repetitions,
        }
    }

    fn single(raw: &str, delimiters: &Delimiters) -> Self {
        Self {
            value: delimiters.unescape(raw),
            components: Self::split_components(raw, delimiters),
            repetitions: Vec::new(),
        }
    }

    fn literal(raw: String) -> Self {
        Self {
            components: vec![Component {
                value: raw.clone(),
                sub_components: vec![raw.clone()],
            }],
            value: raw,
            repetitions: Vec::new(),
        }
    }

    fn split_components(raw: &str, delimiters: &Delimiters) -> Vec<Component> {
        raw.split(delimiters.component)
            .map(|component| Component::parse(component, delimiters))
            .collect()
    }

    /// Text of the whole field, separators included.
    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    /// Component at a 1-based position; empty when absent.
    pub fn component(&self, position: usize) -> &Component {
        position
            .checked_sub(1)
            .and_then(|index| self.components.get(index))
            .unwrap_or(&EMPTY_COMPONENT)
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    pub fn has_repetitions(&self) -> bool {
        !self.repetitions.is_empty()
    }

    /// Every repetition, or the field itself when it does not repeat.
    pub fn occurrences(&self) -> &[Field] {
        if self.has_repetitions() {
            &self.repetitions
        } else {
            std::slice::from_ref(self)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    value: String,
    sub_components: Vec<String>,
}

impl Component {
    fn parse(raw: &str, delimiters: &Delimiters) -> Self {
        Self {
            value: delimiters.unescape(raw),
            sub_components: raw
                .split(delimiters.subcomponent)
                .map(|sub_component| delimiters.unescape(sub_component))
                .collect(),
        }
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_blank(&self) -> bool {
        self.value.trim().is_empty()
    }

    pub fn sub_components(&self) -> &[String] {
        &self.sub_components
    }

    /// Subcomponent at a 1-based position; empty when absent.
    pub fn sub_component(&self, position: usize) -> &str {
        position
            .checked_sub(1)
            .and_then(|index| self.sub_components.get(index))
            .map_or("", String::as_str)
    }
}
