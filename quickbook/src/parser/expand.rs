use std::ops::Range;
use std::rc::Rc;

use crate::event::Event;
use crate::parser::error::{Diagnostic, ErrorKind, ParseResult};
use crate::parser::phrase::PhraseEnd;
use crate::parser::Parser;
use crate::template::{TemplateArg, TemplateBody, TemplateSymbol, break_arguments};

impl Parser<'_> {
    /// Expand a call of `symbol` with the given unexpanded arguments.
    pub(crate) fn expand(
        &mut self,
        symbol: Rc<TemplateSymbol>,
        mut args: Vec<TemplateArg>,
        escape: bool,
        call: Range<usize>,
    ) -> ParseResult<()> {
        if self.state.template_depth >= self.options.max_template_depth {
            return Err(self.error(ErrorKind::RecursiveTemplate(symbol.name.clone()), call));
        }

        let body = match &symbol.body {
            TemplateBody::Code { language, code } => {
                if !args.is_empty() {
                    return Err(self.error(
                        ErrorKind::Arity {
                            name: symbol.name.clone(),
                            expected: 0,
                            got: args.len(),
                        },
                        call,
                    ));
                }
                if escape {
                    self.push(Event::Raw(code.clone()));
                } else {
                    self.push(Event::CodeBlock {
                        language: *language,
                        text: code.clone(),
                    });
                }
                return Ok(());
            }
            TemplateBody::Markup(body) => body.clone(),
        };

        break_arguments(&mut args, symbol.params.len());
        if args.len() != symbol.params.len() {
            return Err(self.error(
                ErrorKind::Arity {
                    name: symbol.name.clone(),
                    expected: symbol.params.len(),
                    got: args.len(),
                },
                call,
            ));
        }

        if escape {
            let mut text = body.as_str().to_string();
            for (param, arg) in symbol.params.iter().zip(&args) {
                text = text.replace(&format!("[{param}]"), arg.as_str());
            }
            self.push(Event::Raw(text));
            return Ok(());
        }

        tracing::trace!(
            template = %symbol.name,
            depth = self.state.template_depth,
            args = args.len(),
            "expanding template"
        );

        let caller_scope = self.state.templates.current();
        let arena_len = self.state.templates.len();
        self.state.templates.push(symbol.scope);

        let result = self.bind_and_parse(&symbol, args, caller_scope, &body, call);

        self.state.templates.truncate(arena_len, caller_scope);
        result
    }

    fn bind_and_parse(
        &mut self,
        symbol: &TemplateSymbol,
        args: Vec<TemplateArg>,
        caller_scope: usize,
        body: &TemplateArg,
        call: Range<usize>,
    ) -> ParseResult<()> {
        for (param, arg) in symbol.params.iter().zip(args) {
            let span = arg.range.clone();
            let file = arg.file;
            let bound = TemplateSymbol {
                name: param.clone(),
                params: Vec::new(),
                body: TemplateBody::Markup(arg),
                file,
                span,
                scope: caller_scope,
            };
            if let Err(kind) = self.state.templates.define(bound) {
                return Err(self.error(kind, call));
            }
        }

        self.state.template_depth += 1;
        let block = body.is_block();
        let result = self.with_cursor(body.cursor(), |p| {
            if block {
                p.blocks()?;
            } else {
                p.phrase(PhraseEnd::Phrase)?;
            }
            if p.cursor.at_end() {
                Ok(None)
            } else {
                Ok(Some(p.cursor.pos()))
            }
        });
        self.state.template_depth -= 1;

        let (leftover, _) = result?;
        let Some(pos) = leftover else {
            return Ok(());
        };
        let mut diagnostic = Diagnostic::error(
            ErrorKind::syntax(format!(
                "could not parse the whole body of template `{}`",
                symbol.name
            )),
            pos..body.range.end,
            body.file,
        );
        if let Some(at) = self.sources.position(self.cursor.file(), call.start) {
            diagnostic = diagnostic.with_note(format!(
                "expanded from the call at line {}, column {}",
                at.line, at.column
            ));
        }
        Err(diagnostic)
    }
}
