//! SAX-style parser for GROBID TEI output.
//!
//! Only the parts needed for citation contexts are kept:
//! ```xml
//! <TEI>
//!   <teiHeader>
//!     <fileDesc>
//!       <titleStmt><title>Citing Paper</title></titleStmt>
//!       <sourceDesc><biblStruct><analytic>
//!         <author><persName><forename>Ann</forename><surname>Lee</surname></persName></author>
//!       </analytic></biblStruct></sourceDesc>
//!     </fileDesc>
//!   </teiHeader>
//!   <text>
//!     <body><div><p><s>As shown in <ref type="bibr" target="#b0">[1]</ref>.</s></p></div></body>
//!     <back><listBibl>
//!       <biblStruct xml:id="b0"><analytic><title>Cited Paper</title>...</analytic></biblStruct>
//!     </listBibl></back>
//!   </text>
//! </TEI>
//! ```

use std::collections::HashMap;
use std::io::BufRead;
use std::path::Path;

use once_cell::sync::Lazy;
use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::Regex;

use crate::TeiError;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Collapse runs of whitespace (including newlines from pretty-printed XML)
/// into single spaces and trim.
pub fn collapse_whitespace(text: &str) -> String {
    WHITESPACE_RE.replace_all(text, " ").trim().to_string()
}

/// A bibliography entry from `<listBibl>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BiblEntry {
    pub title: Option<String>,
    pub authors: Vec<String>,
}

/// An in-text reference inside a sentence.
#[derive(Debug, Clone, PartialEq)]
pub struct InlineRef {
    pub text: String,
    /// Bibliography id without the leading `#`.
    pub target: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sentence {
    pub text: String,
    /// Bibliographic references only; figure/table/formula refs are dropped.
    pub refs: Vec<InlineRef>,
}

/// The citation-relevant content of one TEI document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TeiDocument {
    pub title: Option<String>,
    pub authors: Vec<String>,
    /// Body paragraphs, each a list of sentences in reading order.
    pub paragraphs: Vec<Vec<Sentence>>,
    pub bibliography: HashMap<String, BiblEntry>,
    /// Bibliographic refs between the `<s>` elements of a segmented
    /// paragraph. They belong to no sentence and yield no context.
    pub unplaced_refs: usize,
}

impl TeiDocument {
    pub fn sentence_count(&self) -> usize {
        self.paragraphs.iter().map(Vec::len).sum()
    }
}

#[derive(Default)]
struct PersonBuf {
    forenames: Vec<String>,
    surname: String,
}

impl PersonBuf {
    fn finish(self) -> Option<String> {
        let mut parts: Vec<String> = self
            .forenames
            .iter()
            .map(|f| collapse_whitespace(f))
            .filter(|f| !f.is_empty())
            .collect();
        let surname = collapse_whitespace(&self.surname);
        if !surname.is_empty() {
            parts.push(surname);
        }
        if parts.is_empty() {
            None
        } else {
            Some(parts.join(" "))
        }
    }
}

#[derive(Default)]
struct BiblBuf {
    id: Option<String>,
    analytic_title: Option<String>,
    monogr_title: Option<String>,
    analytic_authors: Vec<String>,
    monogr_authors: Vec<String>,
}

impl BiblBuf {
    fn finish(self) -> Option<(String, BiblEntry)> {
        let id = self.id?;
        let authors = if self.analytic_authors.is_empty() {
            self.monogr_authors
        } else {
            self.analytic_authors
        };
        Some((
            id,
            BiblEntry {
                title: self.analytic_title.or(self.monogr_title),
                authors,
            },
        ))
    }
}

/// Where a person name or title inside the document belongs.
#[derive(Clone, Copy, PartialEq)]
enum Slot {
    Header,
    Analytic,
    Monogr,
}

struct RefBuf {
    text: String,
    target: Option<String>,
    bibliographic: bool,
}

#[derive(Default)]
struct SentenceBuf {
    text: String,
    refs: Vec<InlineRef>,
}

impl SentenceBuf {
    fn finish(self) -> Sentence {
        Sentence {
            text: collapse_whitespace(&self.text),
            refs: self.refs,
        }
    }
}

#[derive(Default)]
struct ParagraphBuf {
    sentences: Vec<Sentence>,
    /// Text outside any `<s>`; used when the document was not sentence
    /// segmented.
    loose: SentenceBuf,
}

#[derive(Default)]
struct State {
    path: Vec<String>,
    doc: TeiDocument,
    title: Option<(Slot, String)>,
    person: Option<(Slot, PersonBuf)>,
    bibl: Option<BiblBuf>,
    paragraph: Option<ParagraphBuf>,
    sentence: Option<SentenceBuf>,
    inline_ref: Option<RefBuf>,
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.as_ref() == key)
        .map(|a| String::from_utf8_lossy(&a.value).into_owned())
}

impl State {
    fn within(&self, name: &str) -> bool {
        self.path.iter().any(|p| p == name)
    }

    /// Title/author slot of the element being opened, by its ancestors.
    fn slot(&self) -> Option<Slot> {
        if self.bibl.is_some() && self.within("listBibl") {
            if self.within("analytic") {
                Some(Slot::Analytic)
            } else if self.within("monogr") {
                Some(Slot::Monogr)
            } else {
                None
            }
        } else if self.within("teiHeader") {
            Some(Slot::Header)
        } else {
            None
        }
    }

    fn start(&mut self, name: &str, e: &BytesStart<'_>) {
        match name {
            "title" if self.title.is_none() => match self.slot() {
                Some(Slot::Header) if self.within("titleStmt") && self.doc.title.is_none() => {
                    self.title = Some((Slot::Header, String::new()));
                }
                Some(slot @ (Slot::Analytic | Slot::Monogr)) => {
                    self.title = Some((slot, String::new()));
                }
                _ => {}
            },
            "persName" if self.person.is_none() => match self.slot() {
                Some(Slot::Header) if self.within("sourceDesc") && self.within("analytic") => {
                    self.person = Some((Slot::Header, PersonBuf::default()));
                }
                Some(slot @ (Slot::Analytic | Slot::Monogr)) => {
                    self.person = Some((slot, PersonBuf::default()));
                }
                _ => {}
            },
            "forename" => {
                if let Some((_, person)) = self.person.as_mut() {
                    person.forenames.push(String::new());
                }
            }
            "biblStruct" if self.within("listBibl") && self.bibl.is_none() => {
                self.bibl = Some(BiblBuf {
                    id: attr(e, b"xml:id"),
                    ..Default::default()
                });
            }
            "p" if self.within("body") && self.paragraph.is_none() => {
                self.paragraph = Some(ParagraphBuf::default());
            }
            "s" if self.paragraph.is_some() && self.sentence.is_none() => {
                self.sentence = Some(SentenceBuf::default());
            }
            "ref" if self.paragraph.is_some() && self.inline_ref.is_none() => {
                self.inline_ref = Some(RefBuf {
                    text: String::new(),
                    target: attr(e, b"target")
                        .map(|t| t.trim_start_matches('#').to_string())
                        .filter(|t| !t.is_empty()),
                    bibliographic: attr(e, b"type").as_deref() == Some("bibr"),
                });
            }
            _ => {}
        }
        self.path.push(name.to_string());
    }

    fn text(&mut self, text: &str) {
        if let Some((_, buf)) = self.title.as_mut() {
            buf.push_str(text);
        }
        if let Some((_, person)) = self.person.as_mut() {
            match self.path.last().map(String::as_str) {
                Some("forename") => {
                    if let Some(f) = person.forenames.last_mut() {
                        f.push_str(text);
                    }
                }
                Some("surname") => person.surname.push_str(text),
                _ => {}
            }
        }
        if let Some(r) = self.inline_ref.as_mut() {
            r.text.push_str(text);
        }
        if let Some(s) = self.sentence.as_mut() {
            s.text.push_str(text);
        } else if let Some(p) = self.paragraph.as_mut() {
            p.loose.text.push_str(text);
        }
    }

    fn end(&mut self, name: &str) {
        self.path.pop();
        match name {
            "title" => {
                if let Some((slot, buf)) = self.title.take() {
                    let title = Some(collapse_whitespace(&buf)).filter(|t| !t.is_empty());
                    match (slot, self.bibl.as_mut()) {
                        (Slot::Header, _) => self.doc.title = title,
                        (Slot::Analytic, Some(b)) if b.analytic_title.is_none() => {
                            b.analytic_title = title;
                        }
                        (Slot::Monogr, Some(b)) if b.monogr_title.is_none() => {
                            b.monogr_title = title;
                        }
                        _ => {}
                    }
                }
            }
            "persName" => {
                if let Some((slot, person)) = self.person.take()
                    && let Some(name) = person.finish()
                {
                    match (slot, self.bibl.as_mut()) {
                        (Slot::Header, _) => self.doc.authors.push(name),
                        (Slot::Analytic, Some(b)) => b.analytic_authors.push(name),
                        (Slot::Monogr, Some(b)) => b.monogr_authors.push(name),
                        _ => {}
                    }
                }
            }
            "biblStruct" if !self.within("biblStruct") => {
                if let Some((id, entry)) = self.bibl.take().and_then(BiblBuf::finish) {
                    self.doc.bibliography.insert(id, entry);
                }
            }
            "ref" => {
                if let Some(r) = self.inline_ref.take()
                    && r.bibliographic
                {
                    let inline = InlineRef {
                        text: collapse_whitespace(&r.text),
                        target: r.target,
                    };
                    if let Some(s) = self.sentence.as_mut() {
                        s.refs.push(inline);
                    } else if let Some(p) = self.paragraph.as_mut() {
                        p.loose.refs.push(inline);
                    }
                }
            }
            "s" => {
                if let (Some(s), Some(p)) = (self.sentence.take(), self.paragraph.as_mut()) {
                    p.sentences.push(s.finish());
                }
            }
            "p" if !self.within("p") => {
                if let Some(p) = self.paragraph.take() {
                    let mut sentences = p.sentences;
                    if sentences.is_empty() {
                        let loose = p.loose.finish();
                        if !loose.text.is_empty() {
                            sentences.push(loose);
                        }
                    } else if !p.loose.refs.is_empty() {
                        tracing::debug!(
                            refs = p.loose.refs.len(),
                            "bibliographic refs outside sentences"
                        );
                        self.doc.unplaced_refs += p.loose.refs.len();
                    }
                    if !sentences.is_empty() {
                        self.doc.paragraphs.push(sentences);
                    }
                }
            }
            _ => {}
        }
    }
}

/// Parse a TEI document from a reader. Fails on the first XML error.
pub fn parse_tei<R: BufRead>(reader: R, path: &Path) -> Result<TeiDocument, TeiError> {
    let mut xml = Reader::from_reader(reader);
    xml.config_mut().trim_text(false);

    let mut buf = Vec::with_capacity(4096);
    let mut state = State::default();

    loop {
        let event = xml.read_event_into(&mut buf).map_err(|e| TeiError::Xml {
            path: path.to_path_buf(),
            position: xml.error_position() as u64,
            message: e.to_string(),
        })?;

        match event {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                state.start(&name, e);
            }
            Event::Text(ref e) => {
                let text = e.unescape().map_err(|err| TeiError::Xml {
                    path: path.to_path_buf(),
                    position: xml.buffer_position() as u64,
                    message: err.to_string(),
                })?;
                state.text(&text);
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                state.end(&name);
            }
            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    Ok(state.doc)
}

/// Parse a TEI file from disk.
pub fn parse_tei_file(path: &Path) -> Result<TeiDocument, TeiError> {
    let file = std::fs::File::open(path).map_err(|source| TeiError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_tei(std::io::BufReader::new(file), path)
}
