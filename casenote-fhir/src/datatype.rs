/// HL7v2 datatype tag carried in OBX-2, closed over the tags the converters understand.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    /// `NM`
    Numeric,
    /// `SN`
    StructuredNumeric,
    /// `DT`
    Date,
    /// `TS`
    Timestamp,
    /// `CE`
    CodedElement,
    /// `CWE`
    CodedWithExceptions,
    /// `EI`
    EntityIdentifier,
    /// `ST`
    StringData,
    /// `TX`
    Text,
    /// `FT`
    FormattedText,
    /// Any other tag, kept verbatim.
    Unhandled(String),
}

impl DataType {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim() {
            "NM" => Self::Numeric,
            "SN" => Self::StructuredNumeric,
            "DT" => Self::Date,
            "TS" => Self::Timestamp,
            "CE" => Self::CodedElement,
            "CWE" => Self::CodedWithExceptions,
            "EI" => Self::EntityIdentifier,
            "ST" => Self::StringData,
            "TX" => Self::Text,
            "FT" => Self::FormattedText,
            other => Self::Unhandled(other.to_string()),
        }
    }
}
