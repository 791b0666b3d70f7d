// Parser for data-dictionary .dd scripts.
//
// Parses a token stream (from the lexer) into the dictionary AST using
// chumsky combinators.
//
// Preconditions: input is a valid token stream from `lexer::lex()`.
// Postconditions: returns an AST plus any parse errors (non-fatal).
// Failure modes: syntax errors produce `Rich` diagnostics; parsing continues.
// Side effects: none.

use chumsky::input::{Stream, ValueInput};
use chumsky::prelude::*;
use chumsky::span::SimpleSpan;

use crate::ast::*;
use crate::lexer::Token;
use crate::symtab::DataType;

/// Result of parsing: AST plus any errors.
#[derive(Debug)]
pub struct ParseResult {
    pub dictionary: Option<Dictionary>,
    pub errors: Vec<Rich<'static, Token, SimpleSpan>>,
}

/// Parse a dictionary script. Lexes then parses.
///
/// Returns an AST (if parsing succeeded) plus any errors.
pub fn parse(source: &str) -> ParseResult {
    let lex_result = crate::lexer::lex(source);
    let len = source.len();

    // Convert lexer output to chumsky stream.
    let token_iter = lex_result.tokens.into_iter().map(|(tok, span)| {
        let cspan: SimpleSpan = (span.start..span.end).into();
        (tok, cspan)
    });
    let eoi: SimpleSpan = (len..len).into();
    let stream = Stream::from_iter(token_iter).map(eoi, |(t, s): (_, _)| (t, s));

    let parser = dictionary_parser(source);
    let (dictionary, parse_errors) = parser.parse(stream).into_output_errors();

    // Merge lex errors + parse errors.
    let mut all_errors: Vec<Rich<'static, Token, SimpleSpan>> = lex_result
        .errors
        .into_iter()
        .map(|e| {
            let span: SimpleSpan = (e.span.start..e.span.end).into();
            Rich::custom(span, e.message)
        })
        .collect();
    all_errors.extend(parse_errors.into_iter().map(|e| e.into_owned()));

    ParseResult {
        dictionary,
        errors: all_errors,
    }
}

// ── Main parser builder ──
//
// All grammar rules are built inside `dictionary_parser` so that the
// `source` reference is captured once and shared by all combinators.

fn dictionary_parser<'tokens, 'src: 'tokens, I>(
    source: &'src str,
) -> impl Parser<'tokens, I, Dictionary, extra::Err<Rich<'tokens, Token, SimpleSpan>>> + 'src
where
    'tokens: 'src,
    I: ValueInput<'tokens, Token = Token, Span = SimpleSpan>,
{
    // ── Newlines ──

    let nl = just(Token::Newline).repeated().ignored();

    // ── Identifier ──

    let ident = just(Token::Ident).map_with(move |_, e| {
        let span: SimpleSpan = e.span();
        Ident {
            name: source[span.start()..span.end()].to_string(),
            span,
        }
    });

    // ── Type annotation: ':' typename ──
    // Type names lex as Ident; validate against the fixed type set here so
    // `: float64` is a syntax-level error, unlike storage classes which are
    // validated semantically.

    let type_name = ident.clone().try_map(|id, span| match DataType::parse_name(&id.name) {
        Some(ty) => Ok(TypeName { ty, span: id.span }),
        None => Err(Rich::custom(
            span,
            format!(
                "expected data type (bool, int8, uint8, int16, uint16, int32, uint32, single, double), found '{}'",
                id.name
            ),
        )),
    });

    let ty_annot = just(Token::Colon).ignore_then(type_name).or_not();

    // ── Expression ──

    let expr = recursive(|expr| {
        let literal = select! {
            Token::Number(n) = e => Expr::Number(n, e.span()),
            Token::True = e => Expr::Bool(true, e.span()),
            Token::False = e => Expr::Bool(false, e.span()),
        };

        let atom = literal
            .or(ident.clone().map(Expr::Ref))
            .or(expr.delimited_by(just(Token::LParen), just(Token::RParen)));

        let unary = just(Token::Minus)
            .map_with(|_, e| e.span())
            .repeated()
            .foldr(atom, |op_span: SimpleSpan, rhs: Expr| {
                let span: SimpleSpan = (op_span.start()..rhs.span().end()).into();
                Expr::Neg(Box::new(rhs), span)
            });

        let product = unary.clone().foldl(
            choice((
                just(Token::Star).to(BinOp::Mul),
                just(Token::Slash).to(BinOp::Div),
            ))
            .then(unary)
            .repeated(),
            |lhs, (op, rhs)| {
                let span: SimpleSpan = (lhs.span().start()..rhs.span().end()).into();
                Expr::Binary(op, Box::new(lhs), Box::new(rhs), span)
            },
        );

        product.clone().foldl(
            choice((
                just(Token::Plus).to(BinOp::Add),
                just(Token::Minus).to(BinOp::Sub),
            ))
            .then(product)
            .repeated(),
            |lhs, (op, rhs)| {
                let span: SimpleSpan = (lhs.span().start()..rhs.span().end()).into();
                Expr::Binary(op, Box::new(lhs), Box::new(rhs), span)
            },
        )
    });

    // ── Trailing clauses: storage / rename ──
    // The storage word is a plain identifier; the resolver validates it.

    let storage = just(Token::Storage).ignore_then(ident.clone()).or_not();

    let rename_target = ident.clone().or(select! {
        Token::StringLit(s) = e => Ident { name: s, span: e.span() },
    });
    let rename = just(Token::As).ignore_then(rename_target).or_not();

    // ── Statements ──

    let param_stmt = just(Token::Param)
        .ignore_then(ident.clone())
        .then(ty_annot.clone())
        .then_ignore(just(Token::Equals))
        .then(expr)
        .then(storage.clone())
        .then(rename.clone())
        .map(|((((name, ty), value), storage), rename)| {
            StatementKind::Param(ParamDecl {
                name,
                ty,
                value,
                storage,
                rename,
            })
        });

    let signal_stmt = just(Token::Signal)
        .ignore_then(ident.clone())
        .then(ty_annot)
        .then(storage)
        .then(rename)
        .map(|(((name, ty), storage), rename)| {
            StatementKind::Signal(SignalDecl {
                name,
                ty,
                storage,
                rename,
            })
        });

    let statement = choice((param_stmt, signal_stmt)).map_with(|kind, e| Statement {
        kind,
        span: e.span(),
    });

    // ── Dictionary ──

    nl.clone()
        .ignore_then(
            statement
                .separated_by(just(Token::Newline).repeated().at_least(1))
                .allow_trailing()
                .collect::<Vec<_>>(),
        )
        .then_ignore(nl)
        .map_with(move |statements, e| Dictionary {
            statements,
            span: e.span(),
        })
}

// ── Tests ──
