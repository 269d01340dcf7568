//! HL7 v2 message tokenizer.
//!
//! Splits raw message text into segments and fields using the delimiters the
//! message declares in its own `MSH` segment, then hands the flat segment list
//! to a [`StructureRegistry`] to build the grouped [`MessageTree`].

use csv::{ReaderBuilder, StringRecord, Terminator};
use hl7_types::{EncodingCharacters, MessageTree, MessageType, Segment};

use crate::structure::StructureRegistry;
use crate::types::{ParseError, ParseResult, ParserConfig};

/// Turns raw message text into a structural tree.
///
/// Implementations must be usable from many conversions at once.
pub trait MessageParser: Send + Sync {
    /// Parses one raw message.
    fn parse(&self, raw: &str) -> ParseResult<MessageTree>;
}

/// The result of tokenizing a message, before grouping.
#[derive(Debug, Clone)]
pub struct TokenizedMessage {
    /// Delimiters declared by the message.
    pub encoding: EncodingCharacters,
    /// Message type from `MSH-9`.
    pub message_type: MessageType,
    /// Segments in source order; the first is always `MSH`.
    pub segments: Vec<Segment>,
}

/// Tokenizer for pipe-delimited HL7 v2 messages.
///
/// # Example
///
/// ```ignore
/// use hl7_converter::{Hl7Parser, MessageParser};
///
/// let parser = Hl7Parser::new();
/// let tree = parser.parse("MSH|^~\\&|APP|FAC|||||ADT^A01|1|P|2.6\rPID|1||123^^^MR")?;
/// assert_eq!(tree.message_type.trigger, "A01");
/// ```
#[derive(Debug, Clone, Default)]
pub struct Hl7Parser {
    config: ParserConfig,
    structures: StructureRegistry,
}

impl Hl7Parser {
    /// Creates a parser with the default config and the built-in structures.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a parser with explicit settings.
    pub fn with_config(config: ParserConfig, structures: StructureRegistry) -> Self {
        Self { config, structures }
    }

    /// Returns the parser configuration.
    pub fn config(&self) -> &ParserConfig {
        &self.config
    }

    /// Returns the structure registry used for grouping.
    pub fn structures(&self) -> &StructureRegistry {
        &self.structures
    }

    /// Splits the message into segments without grouping them.
    pub fn tokenize(&self, raw: &str) -> ParseResult<TokenizedMessage> {
        let normalized = raw.replace("\r\n", "\r").replace('\n', "\r");
        let text = normalized.trim_start_matches(['\r', ' ', '\t', '\u{feff}']);

        if text.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        if !text.starts_with("MSH") {
            return Err(ParseError::MissingHeader {
                found: text.chars().take(3).collect(),
            });
        }

        let separator = text.chars().nth(3).ok_or_else(|| ParseError::InvalidEncoding {
            value: String::new(),
        })?;
        if !separator.is_ascii() || separator.is_ascii_alphanumeric() || separator == '\r' {
            return Err(ParseError::InvalidEncoding {
                value: separator.to_string(),
            });
        }

        let mut reader = ReaderBuilder::new()
            .delimiter(separator as u8)
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .terminator(Terminator::Any(b'\r'))
            .trim(csv::Trim::None)
            .from_reader(text.as_bytes());

        let mut records = Vec::new();
        let mut record = StringRecord::new();
        while reader.read_record(&mut record)? {
            // Skip blank lines
            if record.iter().all(|f| f.trim().is_empty()) {
                continue;
            }
            records.push(record.clone());
        }

        let header = records.first().ok_or(ParseError::Empty)?;
        let msh2 = header.get(1).unwrap_or("");
        let encoding =
            EncodingCharacters::from_msh(separator, msh2).ok_or_else(|| ParseError::InvalidEncoding {
                value: format!("{}{}", separator, msh2),
            })?;

        let mut segments = Vec::with_capacity(records.len());
        for (i, record) in records.iter().enumerate() {
            let name = record.get(0).unwrap_or("").trim();
            if !parse::is_valid_segment_name(name, self.config.strict_segment_names) {
                return Err(ParseError::InvalidSegmentName {
                    index: i + 1,
                    name: name.to_string(),
                });
            }
            segments.push(parse::segment(name, record, &encoding));
        }

        let msh = &segments[0];
        let message_type = MessageType::new(
            msh.component(9, 1).unwrap_or(""),
            msh.component(9, 2).unwrap_or(""),
            msh.component(9, 3),
        );

        Ok(TokenizedMessage {
            encoding,
            message_type,
            segments,
        })
    }
}

impl MessageParser for Hl7Parser {
    fn parse(&self, raw: &str) -> ParseResult<MessageTree> {
        let tokenized = self.tokenize(raw)?;
        let root = self
            .structures
            .group(&tokenized.message_type.structure, tokenized.segments);
        Ok(MessageTree {
            message_type: tokenized.message_type,
            encoding: tokenized.encoding,
            root,
        })
    }
}

/// Helper functions for splitting HL7 field values.
pub mod parse {
    use csv::StringRecord;
    use hl7_types::{Component, EncodingCharacters, Field, Repetition, Segment};

    /// Returns true if `name` is an acceptable segment name.
    ///
    /// Strict mode requires three upper-case ASCII letters or digits, starting
    /// with a letter.
    pub fn is_valid_segment_name(name: &str, strict: bool) -> bool {
        if !strict {
            return !name.is_empty();
        }
        let bytes = name.as_bytes();
        bytes.len() == 3
            && bytes[0].is_ascii_uppercase()
            && bytes[1..]
                .iter()
                .all(|b| b.is_ascii_uppercase() || b.is_ascii_digit())
    }

    /// Builds a segment from a delimited record.
    ///
    /// For `MSH` the field separator becomes `MSH-1` and the raw encoding
    /// characters `MSH-2`, so that later positions line up with the standard.
    pub fn segment(name: &str, record: &StringRecord, enc: &EncodingCharacters) -> Segment {
        let mut fields = Vec::with_capacity(record.len());
        let rest = record.iter().skip(1);

        if name == "MSH" {
            fields.push(Field::verbatim(enc.field.to_string()));
            fields.push(Field::verbatim(record.get(1).unwrap_or("")));
            fields.extend(rest.skip(1).map(|raw| field(raw, enc)));
        } else {
            fields.extend(rest.map(|raw| field(raw, enc)));
        }

        Segment::new(name, fields)
    }

    /// Splits a raw field into repetitions, components and subcomponents.
    pub fn field(raw: &str, enc: &EncodingCharacters) -> Field {
        if raw.is_empty() {
            return Field::default();
        }
        Field {
            repetitions: raw
                .split(enc.repetition)
                .map(|rep| Repetition {
                    components: rep
                        .split(enc.component)
                        .map(|comp| Component {
                            subcomponents: comp
                                .split(enc.subcomponent)
                                .map(|sub| unescape(sub, enc))
                                .collect(),
                        })
                        .collect(),
                })
                .collect(),
        }
    }

    /// Decodes HL7 escape sequences in a leaf value.
    ///
    /// Supports `\F\ \S\ \T\ \R\ \E\`, `\.br\` and `\Xhh..\`; unknown or
    /// unterminated sequences are kept verbatim.
    pub fn unescape(value: &str, enc: &EncodingCharacters) -> String {
        if !value.contains(enc.escape) {
            return value.to_string();
        }

        let mut out = String::with_capacity(value.len());
        let mut rest = value;
        while let Some(start) = rest.find(enc.escape) {
            out.push_str(&rest[..start]);
            let after = &rest[start + enc.escape.len_utf8()..];
            let Some(end) = after.find(enc.escape) else {
                out.push_str(&rest[start..]);
                return out;
            };

            let sequence = &after[..end];
            match decode_sequence(sequence, enc) {
                Some(decoded) => out.push_str(&decoded),
                None => out.push_str(&rest[start..start + 2 * enc.escape.len_utf8() + end]),
            }
            rest = &after[end + enc.escape.len_utf8()..];
        }
        out.push_str(rest);
        out
    }

    fn decode_sequence(sequence: &str, enc: &EncodingCharacters) -> Option<String> {
        match sequence {
            "F" => Some(enc.field.to_string()),
            "S" => Some(enc.component.to_string()),
            "T" => Some(enc.subcomponent.to_string()),
            "R" => Some(enc.repetition.to_string()),
            "E" => Some(enc.escape.to_string()),
            ".br" => Some("\n".to_string()),
            hex if hex.starts_with('X') && hex.len() > 1 && (hex.len() - 1) % 2 == 0 => {
                let digits = &hex[1..];
                if !digits.bytes().all(|b| b.is_ascii_hexdigit()) {
                    return None;
                }
                let bytes: Option<Vec<u8>> = (0..digits.len())
                    .step_by(2)
                    .map(|i| u8::from_str_radix(&digits[i..i + 2], 16).ok())
                    .collect();
                bytes.and_then(|b| String::from_utf8(b).ok())
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ADT: &str = "MSH|^~\\&|hl7Integration|hl7Integration|||||ADT^A01|||2.3|\r\
        EVN|A01|20130617154644\r\
        PID|1|465 306 5961|000010016^^^MR~000010017^^^MR~000010018^^^MR|407623|Wood^Patrick^^Sr^MR||19700101|female|||High Street^^Oxford^^Ox1 4DP~George St^^Oxford^^Ox1 5AP|||||||\r\
        NK1|1|Wood^John^^^MR|Father||999-9999\r";

    #[test]
    fn test_tokenize_segments() {
        let msg = Hl7Parser::new().tokenize(ADT).unwrap();
        let names: Vec<&str> = msg.segments.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["MSH", "EVN", "PID", "NK1"]);
        assert_eq!(msg.message_type.code, "ADT");
        assert_eq!(msg.message_type.trigger, "A01");
        assert_eq!(msg.message_type.structure, "ADT_A01");
    }

    #[test]
    fn test_msh_positions_follow_standard() {
        let msg = Hl7Parser::new().tokenize(ADT).unwrap();
        let msh = &msg.segments[0];
        assert_eq!(msh.value(1), Some("|"));
        assert_eq!(msh.value(2), Some("^~\\&"));
        assert_eq!(msh.value(3), Some("hl7Integration"));
        assert_eq!(msh.component(9, 2), Some("A01"));
        assert_eq!(msh.value(12), Some("2.3"));
    }

    #[test]
    fn test_repetitions_and_components() {
        let msg = Hl7Parser::new().tokenize(ADT).unwrap();
        let pid = &msg.segments[2];
        let ids = pid.repetitions(3);
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[1].component(1), Some("000010017"));
        assert_eq!(ids[1].component(4), Some("MR"));
        assert_eq!(pid.component(5, 2), Some("Patrick"));
        assert_eq!(pid.repetitions(11).len(), 2);
    }

    #[test]
    fn test_line_endings_are_normalized() {
        let crlf = "MSH|^~\\&|A|B|||||ADT^A01|1|P|2.6\r\nPID|1\nPV1|1\r\n\r\n";
        let msg = Hl7Parser::new().tokenize(crlf).unwrap();
        assert_eq!(msg.segments.len(), 3);
    }

    #[test]
    fn test_custom_delimiters() {
        let raw = "MSH#*!\\%#APP#FAC#####ORU*R01#1#P#2.6\rOBX#1#NM#code*Name##7.3";
        let msg = Hl7Parser::new().tokenize(raw).unwrap();
        assert_eq!(msg.encoding.field, '#');
        assert_eq!(msg.encoding.component, '*');
        assert_eq!(msg.message_type.trigger, "R01");
        assert_eq!(msg.segments[1].component(3, 2), Some("Name"));
        assert_eq!(msg.segments[1].value(5), Some("7.3"));
    }

    #[test]
    fn test_errors() {
        let parser = Hl7Parser::new();
        assert!(matches!(parser.tokenize(""), Err(ParseError::Empty)));
        assert!(matches!(parser.tokenize("\r\n  "), Err(ParseError::Empty)));
        assert!(matches!(
            parser.tokenize("PID|1"),
            Err(ParseError::MissingHeader { .. })
        ));
        assert!(matches!(
            parser.tokenize("MSHA^~\\&"),
            Err(ParseError::InvalidEncoding { .. })
        ));
        assert!(matches!(
            parser.tokenize("MSH|^^\\&|A"),
            Err(ParseError::InvalidEncoding { .. })
        ));
        assert!(matches!(
            parser.tokenize("MSH|^~\\&|A\rpid|1"),
            Err(ParseError::InvalidSegmentName { index: 2, .. })
        ));
    }

    #[test]
    fn test_lenient_segment_names() {
        let parser = Hl7Parser::with_config(ParserConfig::lenient(), StructureRegistry::default());
        let msg = parser.tokenize("MSH|^~\\&|A\rZpid|1").unwrap();
        assert_eq!(msg.segments[1].name, "Zpid");
    }

    #[test]
    fn test_unescape() {
        let enc = EncodingCharacters::default();
        assert_eq!(parse::unescape("a\\F\\b", &enc), "a|b");
        assert_eq!(parse::unescape("\\S\\\\T\\\\R\\\\E\\", &enc), "^&~\\");
        assert_eq!(parse::unescape("line\\.br\\two", &enc), "line\ntwo");
        assert_eq!(parse::unescape("\\X41\\", &enc), "A");
        assert_eq!(parse::unescape("\\Xaé1\\", &enc), "\\Xaé1\\");
        assert_eq!(parse::unescape("Do\\Xzz\\e", &enc), "Do\\Xzz\\e");
        assert_eq!(parse::unescape("\\Q\\", &enc), "\\Q\\");
        assert_eq!(parse::unescape("open\\F", &enc), "open\\F");
        assert_eq!(parse::unescape("plain", &enc), "plain");
    }

    #[test]
    fn test_non_ascii_hex_escape_is_kept() {
        let raw = "MSH|^~\\&|A|B|||||ADT^A01|1|P|2.5\rPID|1||123||Do\\Xaé1\\e";
        let msg = Hl7Parser::new().tokenize(raw).unwrap();
        assert_eq!(msg.segments[1].value(5), Some("Do\\Xaé1\\e"));
    }

    #[test]
    fn test_parse_builds_tree() {
        let tree = Hl7Parser::new().parse(ADT).unwrap();
        assert_eq!(tree.root.children.len(), 4);
        assert!(tree.header().is_some());
    }

    #[test]
    fn test_segment_name_rules() {
        assert!(parse::is_valid_segment_name("PV1", true));
        assert!(parse::is_valid_segment_name("ZPD", true));
        assert!(!parse::is_valid_segment_name("1PV", true));
        assert!(!parse::is_valid_segment_name("PIDX", true));
        assert!(parse::is_valid_segment_name("pid", false));
        assert!(!parse::is_valid_segment_name("", false));
    }
}
