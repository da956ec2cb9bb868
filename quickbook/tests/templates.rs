use quickbook::event::Format;
use quickbook::{Compilation, CompileOptions, Compiler, ErrorKind, Event, Tag, TagEnd};

fn compile(source: &str) -> Compilation {
    quickbook::compile_str(source)
}

fn events(source: &str) -> Vec<Event> {
    let compilation = compile(source);
    assert!(
        !compilation.has_errors(),
        "unexpected errors: {:?}",
        compilation.diagnostics
    );
    compilation.events
}

fn paragraph(inner: Vec<Event>) -> Vec<Event> {
    let mut out = vec![Event::Start(Tag::Paragraph)];
    out.extend(inner);
    out.push(Event::End(TagEnd::Paragraph));
    out
}

fn text(s: &str) -> Event {
    Event::Text(s.to_string())
}

fn first_error(compilation: &Compilation) -> &ErrorKind {
    &compilation
        .diagnostics
        .iter()
        .find(|d| d.is_error())
        .expect("an error")
        .kind
}

#[test]
fn call_is_the_same_as_inlining() {
    for argument in ["hello", "two words", "*bold* text", "[* nested]", "x`code`"] {
        let called = events(&format!("[template t[x] [x]]\n[t {argument}]"));
        assert_eq!(called, events(argument), "argument {argument:?}");
    }
}

#[test]
fn body_with_markup() {
    let mut inner = vec![text("Hello, ")];
    inner.extend([
        Event::Start(Tag::Formatted(Format::Bold)),
        text("World"),
        Event::End(TagEnd::Formatted),
        text("!"),
    ]);
    assert_eq!(
        events("[template greet[name] Hello, [*[name]]!]\n[greet World]"),
        paragraph(inner)
    );
}

#[test]
fn arguments_split_on_dot_dot() {
    assert_eq!(
        events("[template pair[a b] [b] then [a]]\n[pair first..second]"),
        paragraph(vec![text("second then first")])
    );
}

#[test]
fn last_argument_is_broken_at_whitespace() {
    assert_eq!(
        events("[template three[a b c] [c] | [b] | [a]]\n[three one two and the rest]"),
        paragraph(vec![text("and the rest | two | one")])
    );
}

#[test]
fn nullary_template() {
    assert_eq!(
        events("[template name Boost]\nI like [name]."),
        paragraph(vec![text("I like Boost.")])
    );
}

#[test]
fn punctuation_template_name() {
    assert_eq!(
        events("[template %[x] ([x])]\n[%hi]"),
        paragraph(vec![text("(hi)")])
    );
}

#[test]
fn escaped_call_is_raw() {
    assert_eq!(
        events("[template tag[a] <b>[a]</b>]\n[`tag arg]"),
        paragraph(vec![Event::Raw("<b>arg</b>".to_string())])
    );
}

#[test]
fn arguments_expand_in_the_callers_scope() {
    // `x` inside the argument is the caller's `x`, not the parameter.
    assert_eq!(
        events("[template x outer]\n[template show[x] <[x]>]\n[show [x]]"),
        paragraph(vec![text("<outer>")])
    );
}

#[test]
fn body_expands_in_its_definition_scope() {
    assert_eq!(
        events("[template inner called]\n[template outer [inner]]\n[template use[inner] [outer]]\n[use shadow]"),
        paragraph(vec![text("called")])
    );
}

#[test]
fn block_template_splits_the_paragraph() {
    let out = events("[template box\n[note Boxed.]\n]\nBefore [box] after.");
    assert_eq!(
        out,
        [
            paragraph(vec![text("Before")]),
            vec![Event::Start(Tag::Admonition(quickbook::event::Admonition::Note))],
            paragraph(vec![text("Boxed.")]),
            vec![Event::End(TagEnd::Admonition)],
            paragraph(vec![text("after.")]),
        ]
        .concat()
    );
}

#[test]
fn duplicate_definition_is_fatal() {
    let compilation = compile("[template a one]\n[template a two]\n");
    assert_eq!(compilation.error_count, 1);
    assert_eq!(
        first_error(&compilation),
        &ErrorKind::DuplicateTemplate("a".to_string())
    );
}

#[test]
fn shadowing_in_a_nested_scope_is_allowed() {
    assert_eq!(
        events("[template a outer]\n[template wrap[a] [a]]\n[wrap inner]"),
        paragraph(vec![text("inner")])
    );
}

#[test]
fn too_many_arguments() {
    let compilation = compile("[template two[a b] [a][b]]\n[two x..y..z]");
    assert_eq!(
        first_error(&compilation),
        &ErrorKind::Arity {
            name: "two".to_string(),
            expected: 2,
            got: 3,
        }
    );
}

#[test]
fn too_few_arguments() {
    let compilation = compile("[template two[a b] [a][b]]\n[two lonely]");
    assert!(matches!(
        first_error(&compilation),
        ErrorKind::Arity { expected: 2, got: 1, .. }
    ));
}

#[test]
fn self_reference_is_detected() {
    let options = CompileOptions {
        max_template_depth: 20,
        ..CompileOptions::default()
    };
    let compilation = Compiler::new(options).compile_str("loop.qbk", "[template t[] [t]]\n[t]");
    assert_eq!(compilation.error_count, 1);
    assert_eq!(
        first_error(&compilation),
        &ErrorKind::RecursiveTemplate("t".to_string())
    );
}

#[test]
fn unknown_template_lenient_and_strict() {
    let lenient = compile("[missing thing]");
    assert!(!lenient.has_errors());
    assert_eq!(lenient.events, paragraph(vec![text("[missing thing]")]));
    assert_eq!(
        lenient.diagnostics[0].kind,
        ErrorKind::UnknownTemplate("missing".to_string())
    );

    let options = CompileOptions {
        lenient: false,
        ..CompileOptions::default()
    };
    let strict = Compiler::new(options).compile_str("strict.qbk", "[missing thing]");
    assert_eq!(strict.error_count, 1);
    assert_eq!(
        first_error(&strict),
        &ErrorKind::UnknownTemplate("missing".to_string())
    );
}

#[test]
fn epoch_changes_backslash_handling() {
    let v15 = events("[template t[x] <[x]>]\n[t a\\]b]");
    assert_eq!(v15, paragraph(vec![text("<a]b>")]));

    // 1.4 keeps backslashes literally, so `\]` closes the call.
    let v14 = compile("[article A\n[quickbook 1.4]\n]\n[template t[x] <[x]>]\n[t a\\]b]");
    let texts: String = v14
        .events
        .iter()
        .filter_map(|e| match e {
            Event::Text(t) => Some(t.as_str()),
            _ => None,
        })
        .collect();
    assert!(texts.contains("<a\\>"), "{texts:?}");
}

#[test]
fn imported_snippets() {
    let loader = quickbook::MemoryLoader::new().with_file(
        "code.cpp",
        "int unrelated;\n//[ first\nint a = 1;\n//]\n/*[ second */\nint b = 2;\n/*]*/\n",
    );
    let compilation = Compiler::with_loader(CompileOptions::default(), loader)
        .compile_str("doc.qbk", "[import code.cpp]\n[first]\n\n[second]\n");
    assert!(!compilation.has_errors(), "{:?}", compilation.diagnostics);
    let code: Vec<&str> = compilation
        .events
        .iter()
        .filter_map(|e| match e {
            Event::CodeBlock { text, .. } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(code, ["int a = 1;\n", "int b = 2;\n"]);
}

/// Compile with default options on a thread with room for deep expansion.
fn compile_deep(source: &'static str) -> (usize, Option<ErrorKind>) {
    std::thread::Builder::new()
        .stack_size(256 * 1024 * 1024)
        .spawn(move || {
            let compilation = compile(source);
            let kind = compilation
                .diagnostics
                .iter()
                .find(|d| d.is_error())
                .map(|d| d.kind.clone());
            (compilation.error_count, kind)
        })
        .expect("spawn")
        .join()
        .expect("no panic")
}

#[test]
fn default_depth_limit_stops_self_reference() {
    let (errors, kind) = compile_deep("[template t[] [t]]\n[t]");
    assert_eq!(errors, 1);
    assert_eq!(kind, Some(ErrorKind::RecursiveTemplate("t".to_string())));
}

#[test]
fn mutual_recursion_is_detected() {
    let (errors, kind) = compile_deep("[template a[] [b]]\n[template b[] [a]]\n[a]");
    assert_eq!(errors, 1);
    assert!(matches!(kind, Some(ErrorKind::RecursiveTemplate(_))), "{kind:?}");
}

#[test]
fn non_ascii_bodies_and_arguments() {
    assert_eq!(
        events("[template greet[] caf\u{e9}]\n[greet]"),
        paragraph(vec![text("caf\u{e9}")])
    );
    assert_eq!(
        events("[template t[x] \u{ab}[x]\u{bb}]\n[t na\u{ef}ve \u{65e5}\u{672c}]"),
        events("\u{ab}na\u{ef}ve \u{65e5}\u{672c}\u{bb}")
    );
    assert_eq!(
        events("[template raw[] '''<b>\u{e9}</b>''' \u{2014}]\n[raw]"),
        events("'''<b>\u{e9}</b>''' \u{2014}")
    );
}

#[test]
fn unbalanced_argument_bracket_is_a_syntax_error() {
    let source = "[template t[x] <[x]>]\n[t a[b]";

    let lenient = compile(source);
    assert!(!lenient.has_errors());
    match &lenient.diagnostics[0].kind {
        ErrorKind::Syntax(message) => assert!(message.contains("`t`"), "{message}"),
        other => panic!("expected a syntax warning, got {other:?}"),
    }
    assert!(
        !lenient
            .diagnostics
            .iter()
            .any(|d| d.kind == ErrorKind::UnknownTemplate("t".to_string()))
    );

    let options = CompileOptions {
        lenient: false,
        ..CompileOptions::default()
    };
    let strict = Compiler::new(options).compile_str("doc.qbk", source);
    assert!(strict.has_errors());
    match first_error(&strict) {
        ErrorKind::Syntax(message) => assert!(message.contains("`t`"), "{message}"),
        other => panic!("expected a syntax error, got {other:?}"),
    }
}
