//! Event-level view of a template: where each mapping key starts and which
//! mappings are written in flow style. The node tree does not carry source
//! positions, so rewriting a single entry in place needs this second pass.

use super::types::Location;
use crate::errors::{Error, Result};
use std::borrow::Cow;
use std::ffi::CStr;
use std::marker::PhantomData;
use std::mem::MaybeUninit;
use std::path::PathBuf;
use unsafe_libyaml as sys;

/// 0-based position of an event in the source text. `column` counts
/// characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Mark {
    pub(crate) line: usize,
    pub(crate) column: usize,
}

impl Mark {
    fn location(self) -> Location {
        Location::from_zero_based(self.line, self.column)
    }
}

#[derive(Debug)]
pub(crate) enum Marked {
    Scalar,
    Sequence,
    Mapping { flow: bool, entries: Vec<Entry> },
}

#[derive(Debug)]
pub(crate) struct Entry {
    /// Key text when the key is a scalar.
    pub(crate) key: Option<String>,
    pub(crate) mark: Mark,
    pub(crate) value: Marked,
}

impl Marked {
    /// The node reached by following `path` through mapping keys.
    pub(crate) fn find<S: AsRef<str>>(&self, path: &[S]) -> Option<&Marked> {
        path.iter().try_fold(self, |node, key| match node {
            Marked::Mapping { entries, .. } => entries
                .iter()
                .find(|e| e.key.as_deref() == Some(key.as_ref()))
                .map(|e| &e.value),
            _ => None,
        })
    }
}

/// Parses the first document of `text` into its marked outline. Also rejects
/// tags that are not local `!Name` tags: the node tree could not write them
/// back.
pub(crate) fn parse_marks(text: &str) -> Result<Option<Marked>> {
    let mut parser = EventParser::new(text)?;
    loop {
        let (event, mark) = parser.next()?;
        match event {
            Event::StreamEnd => return Ok(None),
            Event::StreamStart | Event::DocumentStart | Event::Other => continue,
            event => return parser.node(event, mark).map(Some),
        }
    }
}

enum Event {
    StreamStart,
    StreamEnd,
    DocumentStart,
    Alias,
    Scalar { value: String, tag: Option<String> },
    SequenceStart { tag: Option<String> },
    SequenceEnd,
    MappingStart { flow: bool, tag: Option<String> },
    MappingEnd,
    Other,
}

struct EventParser<'input> {
    parser: Box<MaybeUninit<sys::yaml_parser_t>>,
    input: PhantomData<&'input str>,
}

impl<'input> EventParser<'input> {
    fn new(input: &'input str) -> Result<Self> {
        let mut parser = Box::new(MaybeUninit::<sys::yaml_parser_t>::uninit());
        unsafe {
            let raw = parser.as_mut_ptr();
            if !sys::yaml_parser_initialize(raw).ok {
                return Err(parse_error(None, "cannot initialise the YAML parser"));
            }
            sys::yaml_parser_set_encoding(raw, sys::YAML_UTF8_ENCODING);
            sys::yaml_parser_set_input_string(raw, input.as_ptr(), input.len() as u64);
        }
        Ok(EventParser {
            parser,
            input: PhantomData,
        })
    }

    fn next(&mut self) -> Result<(Event, Mark)> {
        let mut event = MaybeUninit::<sys::yaml_event_t>::uninit();
        unsafe {
            let raw = self.parser.as_mut_ptr();
            let event = event.as_mut_ptr();
            if !sys::yaml_parser_parse(raw, event).ok {
                let problem = cstr_lossy((&(*raw)).problem.cast::<u8>())
                    .unwrap_or(Cow::Borrowed("unknown YAML error"));
                let location = Location::from_zero_based(
                    (&(*raw)).problem_mark.line as usize,
                    (&(*raw)).problem_mark.column as usize,
                );
                return Err(parse_error(Some(location), &problem));
            }
            let mark = Mark {
                line: (*event).start_mark.line as usize,
                column: (*event).start_mark.column as usize,
            };
            let converted = convert(&*event);
            sys::yaml_event_delete(event);
            Ok((converted, mark))
        }
    }

    fn node(&mut self, event: Event, mark: Mark) -> Result<Marked> {
        match event {
            Event::Alias => Ok(Marked::Scalar),
            Event::Scalar { tag, .. } => {
                check_tag(tag.as_deref(), mark)?;
                Ok(Marked::Scalar)
            }
            Event::SequenceStart { tag } => {
                check_tag(tag.as_deref(), mark)?;
                loop {
                    let (event, mark) = self.next()?;
                    if let Event::SequenceEnd = event {
                        break;
                    }
                    self.node(event, mark)?;
                }
                Ok(Marked::Sequence)
            }
            Event::MappingStart { flow, tag } => {
                check_tag(tag.as_deref(), mark)?;
                let mut entries = Vec::new();
                loop {
                    let (event, key_mark) = self.next()?;
                    if let Event::MappingEnd = event {
                        break;
                    }
                    let key = match &event {
                        Event::Scalar { value, .. } => Some(value.clone()),
                        _ => None,
                    };
                    self.node(event, key_mark)?;
                    let (event, value_mark) = self.next()?;
                    let value = self.node(event, value_mark)?;
                    entries.push(Entry {
                        key,
                        mark: key_mark,
                        value,
                    });
                }
                Ok(Marked::Mapping { flow, entries })
            }
            _ => Err(parse_error(Some(mark.location()), "unexpected YAML event")),
        }
    }
}

impl Drop for EventParser<'_> {
    fn drop(&mut self) {
        unsafe { sys::yaml_parser_delete(self.parser.as_mut_ptr()) }
    }
}

unsafe fn convert(event: &sys::yaml_event_t) -> Event {
    match event.type_ {
        sys::YAML_STREAM_START_EVENT => Event::StreamStart,
        sys::YAML_STREAM_END_EVENT => Event::StreamEnd,
        sys::YAML_DOCUMENT_START_EVENT => Event::DocumentStart,
        sys::YAML_ALIAS_EVENT => Event::Alias,
        sys::YAML_SCALAR_EVENT => {
            let scalar = &event.data.scalar;
            let value = if scalar.value.is_null() || scalar.length == 0 {
                String::new()
            } else {
                let bytes = std::slice::from_raw_parts(scalar.value, scalar.length as usize);
                String::from_utf8_lossy(bytes).into_owned()
            };
            Event::Scalar {
                value,
                tag: cstr_lossy(scalar.tag).map(Cow::into_owned),
            }
        }
        sys::YAML_SEQUENCE_START_EVENT => {
            let start = &event.data.sequence_start;
            Event::SequenceStart {
                tag: cstr_lossy(start.tag).map(Cow::into_owned),
            }
        }
        sys::YAML_SEQUENCE_END_EVENT => Event::SequenceEnd,
        sys::YAML_MAPPING_START_EVENT => {
            let start = &event.data.mapping_start;
            Event::MappingStart {
                flow: matches!(start.style, sys::YAML_FLOW_MAPPING_STYLE),
                tag: cstr_lossy(start.tag).map(Cow::into_owned),
            }
        }
        sys::YAML_MAPPING_END_EVENT => Event::MappingEnd,
        _ => Event::Other,
    }
}

unsafe fn cstr_lossy<'a>(ptr: *const u8) -> Option<Cow<'a, str>> {
    if ptr.is_null() {
        None
    } else {
        Some(CStr::from_ptr(ptr.cast()).to_string_lossy())
    }
}

/// Local tags resolve to `!Name`. Everything else (`!!binary`, verbatim
/// `!<tag:...>`, the bare `!`) would be dropped by the node conversion.
fn check_tag(tag: Option<&str>, mark: Mark) -> Result<()> {
    match tag {
        None => Ok(()),
        Some(tag) if tag.len() > 1 && tag.starts_with('!') => Ok(()),
        Some(tag) => Err(parse_error(
            Some(mark.location()),
            &format!("tag {} is not a local tag and cannot be kept", tag),
        )),
    }
}

fn parse_error(location: Option<Location>, reason: &str) -> Error {
    Error::Parse {
        path: PathBuf::new(),
        location,
        reason: reason.to_string(),
    }
}
