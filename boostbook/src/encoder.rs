use std::borrow::Cow;
use std::fmt::Write;

use quickbook::event::{DocInfo, Format, Image, LinkKind};
use quickbook::{EncodeError, Encoder, Event, Tag, TagEnd};

const DOCTYPE_PUBLIC: &str = "-//Boost//DTD BoostBook XML V1.0//EN";
const DOCTYPE_SYSTEM: &str = "http://www.boost.org/tools/boostbook/dtd/boostbook.dtd";
const XINCLUDE_NS: &str = "http://www.w3.org/2001/XInclude";

/// Escape text content. Quotes are left alone.
pub fn escape(text: &str) -> Cow<'_, str> {
    quick_xml::escape::partial_escape(text)
}

/// Escape an attribute value (double quoted).
pub fn escape_attribute(text: &str) -> Cow<'_, str> {
    quick_xml::escape::escape(text)
}

struct Open {
    end: TagEnd,
    markup: String,
}

/// Writes the event stream as BoostBook XML.
///
/// Every `Start` pushes the markup that closes it, so the matching `End` only
/// has to pop. A stream that closes the wrong tag, or leaves tags open at
/// [`Encoder::finish`], is rejected.
#[derive(Default)]
pub struct BoostBookEncoder {
    out: String,
    open: Vec<Open>,
    /// Column count of a titled table whose `<tgroup>` follows the title.
    pending_tgroup: Option<usize>,
}

impl BoostBookEncoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }

    fn open(&mut self, start: &str, end: TagEnd, close: &str) {
        self.out.push_str(start);
        self.open.push(Open {
            end,
            markup: close.to_string(),
        });
    }

    /// `<name attrs>` ... `</name>`
    fn element(&mut self, name: &str, attributes: &str, end: TagEnd) {
        let start = format!("<{name}{attributes}>");
        let close = format!("</{name}>");
        self.open(&start, end, &close);
    }

    fn start(&mut self, tag: Tag) {
        let end = tag.to_end();
        match tag {
            Tag::Document(info) => self.document(&info),
            Tag::Section { id, .. } => {
                self.element("section", &format!(" id=\"{}\"", escape_attribute(&id)), end)
            }
            Tag::Title => self.element("title", "", end),
            Tag::Paragraph => self.element("para", "", end),
            Tag::SimplePara => self.element("simpara", "", end),
            Tag::Heading { level, id } => self.element(
                "bridgehead",
                &format!(" renderas=\"sect{level}\" id=\"{}\"", escape_attribute(&id)),
                end,
            ),
            Tag::Formatted(format) => {
                let (name, attributes) = format_element(format);
                self.element(name, attributes, end);
            }
            Tag::Link { kind, dest } => {
                let dest = escape_attribute(&dest);
                let (name, attributes) = match kind {
                    LinkKind::Link => ("link", format!(" linkend=\"{dest}\"")),
                    LinkKind::Url => ("ulink", format!(" url=\"{dest}\"")),
                    reference => (reference_element(reference), format!(" alt=\"{dest}\"")),
                };
                self.element(name, &attributes, end);
            }
            Tag::Footnote => self.element("footnote", "", end),
            Tag::List { ordered: true } => self.element("orderedlist", "", end),
            Tag::List { ordered: false } => self.element("itemizedlist", "", end),
            Tag::ListItem | Tag::VarListItem => self.element("listitem", "", end),
            Tag::Table { id, columns, titled } => {
                let name = if titled { "table" } else { "informaltable" };
                let mut start = format!("<{name} frame=\"all\"");
                if let Some(id) = id {
                    let _ = write!(start, " id=\"{}\"", escape_attribute(&id));
                }
                start.push('>');
                if titled {
                    self.pending_tgroup = Some(columns);
                } else {
                    let _ = write!(start, "<tgroup cols=\"{columns}\">");
                }
                self.open(&start, end, &format!("</tgroup></{name}>"));
            }
            Tag::TableHead => self.element("thead", "", end),
            Tag::TableBody => self.element("tbody", "", end),
            Tag::TableRow => self.element("row", "", end),
            Tag::TableCell => self.element("entry", "", end),
            Tag::VariableList => self.element("variablelist", "", end),
            Tag::VarListEntry => self.element("varlistentry", "", end),
            Tag::VarListTerm => self.element("term", "", end),
            Tag::Admonition(kind) => self.element(kind.as_str(), "", end),
            Tag::Blurb => self.element("sidebar", " role=\"blurb\"", end),
            Tag::Blockquote => self.element("blockquote", "", end),
            Tag::Preformatted => self.element("programlisting", "", end),
        }
    }

    fn document(&mut self, info: &DocInfo) {
        let doc_type = info.doc_type.as_str();
        let out = &mut self.out;
        let _ = writeln!(out, "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
        let _ = writeln!(
            out,
            "<!DOCTYPE {doc_type} PUBLIC \"{DOCTYPE_PUBLIC}\" \"{DOCTYPE_SYSTEM}\">"
        );
        let _ = write!(out, "<{doc_type} id=\"{}\"", escape_attribute(&info.id));
        if doc_type == "library" {
            let _ = write!(out, " name=\"{}\"", escape_attribute(&info.title));
        }
        if let Some(dirname) = &info.dirname {
            let _ = write!(out, " dirname=\"{}\"", escape_attribute(dirname));
        }
        let _ = writeln!(
            out,
            " last-revision=\"{}\" xmlns:xi=\"{XINCLUDE_NS}\">",
            escape_attribute(&info.last_revision)
        );

        let _ = write!(out, "<title>{}", escape(&info.title));
        if let Some(version) = &info.version {
            let _ = write!(out, " {}", escape(version));
        }
        let _ = writeln!(out, "</title>");

        let has_info = !info.authors.is_empty()
            || !info.copyrights.is_empty()
            || info.license.is_some()
            || info.purpose.is_some()
            || !info.categories.is_empty();
        if has_info {
            let _ = writeln!(out, "<{doc_type}info>");
            for author in &info.authors {
                let _ = writeln!(
                    out,
                    "<author><firstname>{}</firstname><surname>{}</surname></author>",
                    escape(&author.firstname),
                    escape(&author.surname)
                );
            }
            for copyright in &info.copyrights {
                let _ = write!(out, "<copyright>");
                for year in &copyright.years {
                    let _ = write!(out, "<year>{}</year>", escape(year));
                }
                let _ = writeln!(out, "<holder>{}</holder></copyright>", escape(&copyright.holder));
            }
            if let Some(license) = &info.license {
                let _ = writeln!(
                    out,
                    "<legalnotice id=\"{}\"><para>{}</para></legalnotice>",
                    escape_attribute(&format!("{}.legal", info.id)),
                    escape(license)
                );
            }
            if let Some(purpose) = &info.purpose {
                let _ = writeln!(out, "<{doc_type}purpose>{}</{doc_type}purpose>", escape(purpose));
            }
            for category in &info.categories {
                let _ = writeln!(
                    out,
                    "<{doc_type}category name=\"category:{}\"></{doc_type}category>",
                    escape_attribute(category)
                );
            }
            let _ = writeln!(out, "</{doc_type}info>");
        }

        self.open.push(Open {
            end: TagEnd::Document,
            markup: format!("</{doc_type}>\n"),
        });
    }

    fn end(&mut self, end: TagEnd) -> Result<(), EncodeError> {
        let Some(open) = self.open.pop() else {
            return Err(EncodeError::Unbalanced(format!(
                "end of {end:?} with nothing open"
            )));
        };
        if open.end != end {
            return Err(EncodeError::Unbalanced(format!(
                "end of {end:?} while {:?} is open",
                open.end
            )));
        }
        self.out.push_str(&open.markup);

        if end == TagEnd::Title {
            if let Some(columns) = self.pending_tgroup.take() {
                let _ = write!(self.out, "<tgroup cols=\"{columns}\">");
            }
        }
        Ok(())
    }

    fn leaf(&mut self, event: Event) {
        let out = &mut self.out;
        match event {
            Event::Text(text) => out.push_str(&escape(&text)),
            Event::Raw(markup) => out.push_str(&markup),
            Event::Code(code) => {
                let _ = write!(out, "<code>{}</code>", escape(&code));
            }
            Event::CodeBlock { text, .. } => {
                let _ = write!(out, "<programlisting>{}</programlisting>", escape(&text));
            }
            Event::Image(image) => write_image(out, &image),
            Event::Anchor(id) => {
                let _ = write!(out, "<anchor id=\"{}\"/>", escape_attribute(&id));
            }
            Event::LineBreak => out.push_str("<sbr/>"),
            Event::Callout { role, id } => {
                let _ = write!(
                    out,
                    "<phrase role=\"{}\"><co id=\"{}co\" linkends=\"{}\"/></phrase>",
                    escape_attribute(&role),
                    escape_attribute(&id),
                    escape_attribute(&id)
                );
            }
            Event::Rule => out.push_str("<para/>"),
            Event::XInclude(href) => {
                let _ = write!(out, "<xi:include href=\"{}\"/>", escape_attribute(&href));
            }
            Event::Start(_) | Event::End(_) => {}
        }
    }
}

impl Encoder for BoostBookEncoder {
    fn emit(&mut self, event: Event) -> Result<(), EncodeError> {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(end) => self.end(end)?,
            leaf => self.leaf(leaf),
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EncodeError> {
        if let Some(open) = self.open.last() {
            return Err(EncodeError::Unbalanced(format!(
                "{:?} is still open at the end of the document",
                open.end
            )));
        }
        Ok(())
    }
}

fn format_element(format: Format) -> (&'static str, &'static str) {
    match format {
        Format::Bold => ("emphasis", " role=\"bold\""),
        Format::Italic => ("emphasis", ""),
        Format::Underline => ("emphasis", " role=\"underline\""),
        Format::Teletype => ("literal", ""),
        Format::Strikethrough => ("emphasis", " role=\"strikethrough\""),
        Format::Quote => ("quote", ""),
        Format::Replaceable => ("replaceable", ""),
    }
}

fn reference_element(kind: LinkKind) -> &'static str {
    match kind {
        LinkKind::Funcref => "functionname",
        LinkKind::Classref => "classname",
        LinkKind::Memberref => "methodname",
        LinkKind::Enumref => "enumname",
        LinkKind::Macroref => "macroname",
        LinkKind::Headerref => "headername",
        LinkKind::Conceptref => "conceptname",
        LinkKind::Globalref => "globalname",
        LinkKind::Link => "link",
        LinkKind::Url => "ulink",
    }
}

/// `alt` becomes the text object (the file stem when absent); every other
/// named attribute is copied onto `<imagedata>`.
fn write_image(out: &mut String, image: &Image) {
    let alt = image.attributes.get("alt").cloned().unwrap_or_else(|| {
        let name = image.file.rsplit(['/', '\\']).next().unwrap_or(&image.file);
        name.split('.').next().unwrap_or(name).to_string()
    });
    let _ = write!(
        out,
        "<inlinemediaobject><imageobject><imagedata fileref=\"{}\"",
        escape_attribute(&image.file)
    );
    let copied = image
        .attributes
        .iter()
        .filter(|(key, _)| !key.is_empty() && *key != "alt");
    for (key, value) in copied {
        let _ = write!(out, " {key}=\"{}\"", escape_attribute(value));
    }
    let _ = write!(
        out,
        "></imagedata></imageobject><textobject><phrase>{}</phrase></textobject></inlinemediaobject>",
        escape(&alt)
    );
}
