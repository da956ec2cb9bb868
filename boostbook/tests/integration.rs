use std::collections::BTreeMap;

use boostbook::{BoostBookEncoder, PostProcessError, PostProcessOptions, post_process, to_boostbook};
use quickbook::event::{Author, Copyright, DocInfo, Format, Image, LinkKind, SourceMode};
use quickbook::{EncodeError, Encoder, Event, Tag, TagEnd};

fn encode(events: Vec<Event>) -> String {
    let mut encoder = BoostBookEncoder::new();
    for event in events {
        encoder.emit(event).expect("balanced events");
    }
    encoder.finish().expect("nothing left open");
    encoder.into_string()
}

fn wrapped(tag: Tag, inner: Vec<Event>) -> Vec<Event> {
    let end = tag.to_end();
    let mut out = vec![Event::Start(tag)];
    out.extend(inner);
    out.push(Event::End(end));
    out
}

fn text(s: &str) -> Event {
    Event::Text(s.to_string())
}

fn pretty(xml: &str) -> Result<String, PostProcessError> {
    post_process(xml, &PostProcessOptions::default())
}

#[test]
fn compiled_document_round_trip() {
    let compilation = quickbook::compile_str("[section:s Start]\nSome *bold* text.\n[endsect]\n");
    assert_eq!(
        to_boostbook(&compilation).expect("encodes"),
        "<section id=\"s\"><title>Start</title>\
         <para>Some <emphasis role=\"bold\">bold</emphasis> text.</para></section>"
    );
}

#[test]
fn formatting_roles() {
    let cases = [
        (Format::Bold, "<emphasis role=\"bold\">x</emphasis>"),
        (Format::Italic, "<emphasis>x</emphasis>"),
        (Format::Underline, "<emphasis role=\"underline\">x</emphasis>"),
        (Format::Teletype, "<literal>x</literal>"),
        (Format::Strikethrough, "<emphasis role=\"strikethrough\">x</emphasis>"),
        (Format::Quote, "<quote>x</quote>"),
        (Format::Replaceable, "<replaceable>x</replaceable>"),
    ];
    for (format, expected) in cases {
        assert_eq!(
            encode(wrapped(Tag::Formatted(format), vec![text("x")])),
            expected
        );
    }
}

#[test]
fn text_is_escaped() {
    assert_eq!(
        encode(wrapped(Tag::Paragraph, vec![text("a < b && c > d \"q\"")])),
        "<para>a &lt; b &amp;&amp; c &gt; d \"q\"</para>"
    );
    assert_eq!(
        encode(vec![Event::Raw("<b>&amp;</b>".to_string())]),
        "<b>&amp;</b>"
    );
}

#[test]
fn links_and_references() {
    let link = |kind, dest: &str| {
        encode(wrapped(
            Tag::Link {
                kind,
                dest: dest.to_string(),
            },
            vec![text("t")],
        ))
    };
    assert_eq!(link(LinkKind::Link, "a.b"), "<link linkend=\"a.b\">t</link>");
    assert_eq!(
        link(LinkKind::Url, "http://x/?a=1&b=\"2\""),
        "<ulink url=\"http://x/?a=1&amp;b=&quot;2&quot;\">t</ulink>"
    );
    assert_eq!(
        link(LinkKind::Classref, "std::vector"),
        "<classname alt=\"std::vector\">t</classname>"
    );
    assert_eq!(
        link(LinkKind::Headerref, "x.hpp"),
        "<headername alt=\"x.hpp\">t</headername>"
    );
}

#[test]
fn titled_table_puts_tgroup_after_the_title() {
    let cell = wrapped(Tag::TableCell, vec![text("a")]);
    let body = wrapped(Tag::TableBody, wrapped(Tag::TableRow, cell));

    let mut titled = wrapped(Tag::Title, vec![text("T")]);
    titled.extend(body.clone());
    assert_eq!(
        encode(wrapped(
            Tag::Table {
                id: Some("t".to_string()),
                columns: 2,
                titled: true,
            },
            titled
        )),
        "<table frame=\"all\" id=\"t\"><title>T</title><tgroup cols=\"2\">\
         <tbody><row><entry>a</entry></row></tbody></tgroup></table>"
    );

    assert_eq!(
        encode(wrapped(
            Tag::Table {
                id: None,
                columns: 1,
                titled: false,
            },
            body
        )),
        "<informaltable frame=\"all\"><tgroup cols=\"1\">\
         <tbody><row><entry>a</entry></row></tbody></tgroup></informaltable>"
    );
}

#[test]
fn images() {
    let image = |file: &str, attributes: &[(&str, &str)]| {
        encode(vec![Event::Image(Image {
            file: file.to_string(),
            attributes: attributes
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        })])
    };
    assert_eq!(
        image("images/pic.png", &[("width", "10")]),
        "<inlinemediaobject><imageobject><imagedata fileref=\"images/pic.png\" width=\"10\">\
         </imagedata></imageobject><textobject><phrase>pic</phrase></textobject></inlinemediaobject>"
    );
    assert!(image("pic.png", &[("alt", "A & B")]).contains("<phrase>A &amp; B</phrase>"));
    assert!(image("pic.png", &[("", "foo")]).contains("fileref=\"pic.png\">"));
    assert!(image("it's.png", &[]).contains("fileref=\"it&apos;s.png\""));
}

#[test]
fn leaf_events() {
    assert_eq!(encode(vec![Event::LineBreak]), "<sbr/>");
    assert_eq!(encode(vec![Event::Rule]), "<para/>");
    assert_eq!(
        encode(vec![Event::Anchor("here".to_string())]),
        "<anchor id=\"here\"/>"
    );
    assert_eq!(
        encode(vec![Event::Code("a<b".to_string())]),
        "<code>a&lt;b</code>"
    );
    assert_eq!(
        encode(vec![Event::CodeBlock {
            language: SourceMode::Python,
            text: "if a < b:\n    pass\n".to_string(),
        }]),
        "<programlisting>if a &lt; b:\n    pass\n</programlisting>"
    );
    assert_eq!(
        encode(vec![Event::XInclude("a&b.xml".to_string())]),
        "<xi:include href=\"a&amp;b.xml\"/>"
    );
    assert_eq!(
        encode(vec![Event::Callout {
            role: "callout_bug".to_string(),
            id: "c0".to_string(),
        }]),
        "<phrase role=\"callout_bug\"><co id=\"c0co\" linkends=\"c0\"/></phrase>"
    );
}

#[test]
fn document_header() {
    let info = DocInfo {
        doc_type: "library".to_string(),
        title: "Widgets".to_string(),
        id: "widgets".to_string(),
        dirname: Some("widgets".to_string()),
        version: Some("1.2".to_string()),
        copyrights: vec![Copyright {
            years: vec!["2005".to_string()],
            holder: "Jane Doe".to_string(),
        }],
        authors: vec![Author {
            firstname: "Jane".to_string(),
            surname: "Doe".to_string(),
        }],
        license: Some("Free".to_string()),
        purpose: Some("Widgets".to_string()),
        categories: vec!["utility".to_string()],
        last_revision: "$Date: 2000/12/20 12:00:00 $".to_string(),
    };
    let xml = encode(wrapped(Tag::Document(Box::new(info)), Vec::new()));
    let lines: Vec<&str> = xml.lines().collect();
    assert_eq!(lines[0], "<?xml version=\"1.0\" encoding=\"UTF-8\"?>");
    assert_eq!(
        lines[1],
        "<!DOCTYPE library PUBLIC \"-//Boost//DTD BoostBook XML V1.0//EN\" \
         \"http://www.boost.org/tools/boostbook/dtd/boostbook.dtd\">"
    );
    assert_eq!(
        lines[2],
        "<library id=\"widgets\" name=\"Widgets\" dirname=\"widgets\" \
         last-revision=\"$Date: 2000/12/20 12:00:00 $\" \
         xmlns:xi=\"http://www.w3.org/2001/XInclude\">"
    );
    assert_eq!(lines[3], "<title>Widgets 1.2</title>");
    assert_eq!(
        &lines[4..],
        [
            "<libraryinfo>",
            "<author><firstname>Jane</firstname><surname>Doe</surname></author>",
            "<copyright><year>2005</year><holder>Jane Doe</holder></copyright>",
            "<legalnotice id=\"widgets.legal\"><para>Free</para></legalnotice>",
            "<librarypurpose>Widgets</librarypurpose>",
            "<librarycategory name=\"category:utility\"></librarycategory>",
            "</libraryinfo>",
            "</library>",
        ]
    );
}

#[test]
fn unbalanced_streams_are_rejected() {
    let mut encoder = BoostBookEncoder::new();
    assert!(matches!(
        encoder.emit(Event::End(TagEnd::Paragraph)),
        Err(EncodeError::Unbalanced(_))
    ));

    let mut encoder = BoostBookEncoder::new();
    encoder.emit(Event::Start(Tag::Paragraph)).expect("start");
    assert!(matches!(
        encoder.emit(Event::End(TagEnd::Title)),
        Err(EncodeError::Unbalanced(_))
    ));

    let mut encoder = BoostBookEncoder::new();
    encoder.emit(Event::Start(Tag::Blurb)).expect("start");
    assert!(matches!(encoder.finish(), Err(EncodeError::Unbalanced(_))));
}

#[test]
fn post_process_indents_blocks() {
    assert_eq!(
        pretty("<section id=\"a\"><title>T</title><para>Hello <emphasis>world</emphasis>.</para></section>"),
        Ok("<section id=\"a\">\n  <title>T</title>\n  <para>Hello <emphasis>world</emphasis>.</para>\n</section>\n".to_string())
    );
    assert_eq!(
        pretty("<?xml version=\"1.0\"?>\n<!DOCTYPE x>\n<article id=\"a\"><para>x</para></article>"),
        Ok("<?xml version=\"1.0\"?>\n<!DOCTYPE x>\n<article id=\"a\">\n  <para>x</para>\n</article>\n".to_string())
    );
}

#[test]
fn post_process_keeps_entities_in_text() {
    assert_eq!(
        pretty("<para>a &amp; b&lt;c&#62;</para>"),
        Ok("<para>a &amp; b&lt;c&#62;</para>\n".to_string())
    );
    assert_eq!(
        pretty("<section><programlisting>x &lt; y</programlisting></section>"),
        Ok("<section>\n  <programlisting>x &lt; y</programlisting>\n</section>\n".to_string())
    );
}

#[test]
fn post_process_wraps_long_lines() {
    let options = PostProcessOptions {
        indent: 2,
        linewidth: 20,
    };
    assert_eq!(
        post_process("<para>aaaa bbbb cccc dddd eeee</para>", &options),
        Ok("<para>aaaa bbbb cccc\n  dddd eeee</para>\n".to_string())
    );
}

#[test]
fn post_process_keeps_verbatim_elements() {
    assert_eq!(
        pretty("<section><programlisting>  a  <b>x</b>\n   y</programlisting></section>"),
        Ok("<section>\n  <programlisting>  a  <b>x</b>\n   y</programlisting>\n</section>\n".to_string())
    );
    assert_eq!(
        pretty("<para><ulink url=\"a>b\">x</ulink></para>"),
        Ok("<para><ulink url=\"a>b\">x</ulink></para>\n".to_string())
    );
}

#[test]
fn post_process_errors() {
    assert_eq!(
        pretty("<para></note>"),
        Err(PostProcessError::Mismatched {
            expected: "para".to_string(),
            found: "note".to_string(),
        })
    );
    assert_eq!(
        pretty("</para>"),
        Err(PostProcessError::UnexpectedClose("para".to_string()))
    );
    assert!(matches!(pretty("<para"), Err(PostProcessError::Xml { .. })));
    assert!(matches!(pretty("x <!-- open"), Err(PostProcessError::Xml { .. })));
    assert_eq!(pretty("<para>"), Err(PostProcessError::Unclosed("para".to_string())));
    assert_eq!(
        pretty("<programlisting>x"),
        Err(PostProcessError::Unclosed("programlisting".to_string()))
    );
}
