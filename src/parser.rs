use std::sync::Arc;

use miette::{Severity, SourceSpan};

use winnow::{
    ascii::{digit1, hex_digit1, oct_digit1},
    combinator::{alt, cut_err, eof, fail, not, opt, peek, preceded, repeat, repeat_till},
    error::{AddContext, ErrMode, ErrorKind, FromRecoverableError, ParserError},
    prelude::*,
    stream::{AsChar, Location, Recoverable, Stream},
    token::{any, one_of, take_till, take_while},
    Located,
};

use crate::{
    DiagnosticKind, Document, Identifier, Literal, Node, ParseDiagnostic, ParseFailure, Value,
};

type Input<'a> = Recoverable<Located<&'a str>, ScanError>;
type PResult<T> = winnow::PResult<T, ScanError>;

pub(crate) fn try_parse<'a, P: Parser<Input<'a>, T, ScanError>, T>(
    mut parser: P,
    input: &'a str,
) -> (Option<T>, Vec<ScanError>) {
    let (_, maybe_val, errs) = parser.recoverable_parse(Located::new(input));
    (maybe_val, errs)
}

pub(crate) fn failure_from_errs(errs: Vec<ScanError>, input: &str) -> ParseFailure {
    let src = Arc::new(String::from(input));
    ParseFailure {
        input: src.clone(),
        diagnostics: errs
            .into_iter()
            .map(|e| ParseDiagnostic {
                input: src.clone(),
                span: e.span.unwrap_or_else(|| (0usize..0usize).into()),
                label: e.label,
                help: e.help,
                severity: Severity::Error,
                kind: if let Some(kind) = e.kind {
                    kind
                } else if let Some(ctx) = e.context {
                    DiagnosticKind::Context(ctx)
                } else {
                    DiagnosticKind::Other
                },
            })
            .collect(),
    }
}

/// The error type threaded through the scanner. Speculative branches throw
/// these away wholesale on backtrack; only committed failures are recorded
/// into the diagnostic accumulator.
#[derive(Debug, Clone, Eq, PartialEq)]
pub(crate) struct ScanError {
    pub(crate) context: Option<&'static str>,
    pub(crate) span: Option<SourceSpan>,
    pub(crate) label: Option<&'static str>,
    pub(crate) help: Option<&'static str>,
    pub(crate) kind: Option<DiagnosticKind>,
}

impl ScanError {
    fn message(message: &'static str, help: Option<&'static str>) -> Self {
        Self {
            context: None,
            span: None,
            label: None,
            help,
            kind: Some(DiagnosticKind::Message(message)),
        }
    }
}

impl<I: Stream> ParserError<I> for ScanError {
    fn from_error_kind(_input: &I, _kind: ErrorKind) -> Self {
        Self {
            context: None,
            span: None,
            label: None,
            help: None,
            kind: None,
        }
    }

    fn append(
        self,
        _input: &I,
        _token_start: &<I as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }
}

impl<I: Stream> AddContext<I> for ScanError {
    fn add_context(
        mut self,
        _input: &I,
        _token_start: &<I as Stream>::Checkpoint,
        ctx: &'static str,
    ) -> Self {
        self.context = self.context.or(Some(ctx));
        self
    }
}

impl<I: Stream + Location> FromRecoverableError<I, Self> for ScanError {
    #[inline]
    fn from_recoverable_error(
        token_start: &<I as Stream>::Checkpoint,
        _err_start: &<I as Stream>::Checkpoint,
        input: &I,
        mut e: Self,
    ) -> Self {
        e.span = e.span.or_else(|| {
            let start = input
                .location()
                .saturating_sub(input.offset_from(token_start));
            Some((start..input.location()).into())
        });
        e
    }
}

fn lbl(label: &'static str) -> &'static str {
    label
}

// -------------------------------------------------------------------------
// Character classes
// -------------------------------------------------------------------------

/// Code points that may not appear literally anywhere in KDL text: most
/// C0 controls, DEL and the C1 controls, the bidirectional control
/// characters, and ZWNBSP/BOM (legal only as the very first scalar of a
/// document).
pub(crate) fn is_disallowed_char(c: char) -> bool {
    matches!(c,
        '\u{0000}'..='\u{0008}'
            | '\u{000E}'..='\u{001F}'
            | '\u{007F}'..='\u{009F}'
            | '\u{200E}'..='\u{200F}'
            | '\u{202A}'..='\u{202E}'
            | '\u{2066}'..='\u{2069}'
            | '\u{FEFF}')
}

/// Horizontal whitespace.
pub(crate) fn is_unicode_space(c: char) -> bool {
    matches!(c,
        '\u{0009}'
            | '\u{0020}'
            | '\u{00A0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200A}'
            | '\u{202F}'
            | '\u{205F}'
            | '\u{3000}')
}

/// Scalars that participate in a newline sequence.
pub(crate) fn is_newline_char(c: char) -> bool {
    matches!(
        c,
        '\u{000D}' | '\u{000A}' | '\u{0085}' | '\u{000B}' | '\u{000C}' | '\u{2028}' | '\u{2029}'
    )
}

/// Anything that may continue an identifier: not whitespace, not a newline,
/// not disallowed, and not structural punctuation.
pub(crate) fn is_identifier_char(c: char) -> bool {
    !is_disallowed_char(c)
        && !is_unicode_space(c)
        && !is_newline_char(c)
        && !matches!(
            c,
            '(' | ')' | '{' | '}' | '[' | ']' | ';' | '=' | '"' | '\\' | '#' | '/'
        )
}

// -------------------------------------------------------------------------
// Whitespace, newlines, comments
// -------------------------------------------------------------------------

/// `bom := '\u{FEFF}'`
fn bom(input: &mut Input<'_>) -> PResult<()> {
    "\u{FEFF}".void().parse_next(input)
}

/// `newline := <See Table>`, longest sequence first so CRLF wins over CR.
fn newline(input: &mut Input<'_>) -> PResult<()> {
    alt((
        "\u{000D}\u{000A}",
        "\u{000D}",
        "\u{000A}",
        "\u{0085}",
        "\u{000B}",
        "\u{000C}",
        "\u{2028}",
        "\u{2029}",
    ))
    .void()
    .context(lbl("newline"))
    .parse_next(input)
}

/// `unicode-space := <See Table>`
fn unicode_space(input: &mut Input<'_>) -> PResult<()> {
    one_of(is_unicode_space).void().parse_next(input)
}

/// `ws := unicode-space | multi-line-comment`
fn ws(input: &mut Input<'_>) -> PResult<()> {
    alt((unicode_space, block_comment)).parse_next(input)
}

fn wss(input: &mut Input<'_>) -> PResult<()> {
    repeat(0.., ws).parse_next(input)
}

fn wsp(input: &mut Input<'_>) -> PResult<()> {
    repeat(1.., ws).parse_next(input)
}

/// `single-line-comment := '//' ^newline* (newline | eof)`
fn single_line_comment(input: &mut Input<'_>) -> PResult<()> {
    "//".parse_next(input)?;
    repeat_till(
        0..,
        (not(alt((newline, eof.void()))), any),
        alt((newline, eof.void())),
    )
    .map(|(_, _): ((), _)| ())
    .parse_next(input)
}

/// `multi-line-comment := '/*' commented-block`
fn block_comment(input: &mut Input<'_>) -> PResult<()> {
    "/*".parse_next(input)?;
    cut_err(commented_block)
        .context(lbl("closing */ of block comment"))
        .parse_next(input)
}

/// `commented-block := '*/' | (multi-line-comment | '*' | '/' | [^*/]+) commented-block`
fn commented_block(input: &mut Input<'_>) -> PResult<()> {
    alt((
        "*/".void(),
        preceded(
            alt((
                block_comment,
                "*".void(),
                "/".void(),
                take_till(1.., ['*', '/']).void(),
            )),
            commented_block,
        ),
    ))
    .parse_next(input)
}

/// `escline := '\\' ws* (single-line-comment | newline | eof)`
fn escline(input: &mut Input<'_>) -> PResult<()> {
    "\\".parse_next(input)?;
    repeat(0.., ws).map(|_: ()| ()).parse_next(input)?;
    alt((single_line_comment, newline, eof.void())).parse_next(input)
}

/// `plain-line-space := newline | ws | single-line-comment`
fn plain_line_space(input: &mut Input<'_>) -> PResult<()> {
    alt((newline, ws, single_line_comment)).parse_next(input)
}

/// `plain-node-space := ws* escline ws* | ws+`
fn plain_node_space(input: &mut Input<'_>) -> PResult<()> {
    alt(((wss, escline, wss).void(), wsp)).parse_next(input)
}

/// `line-space := plain-line-space+ | '/-' (line or node space)* node`
fn line_space(input: &mut Input<'_>) -> PResult<()> {
    alt((
        repeat(1.., plain_line_space).map(|_: ()| ()),
        (
            "/-",
            repeat(0.., alt((plain_node_space, plain_line_space))).map(|_: ()| ()),
            cut_err(node).void(),
        )
            .void()
            .context(lbl("slashdashed node")),
    ))
    .parse_next(input)
}

/// `node-space := plain-node-space+ ('/-' (space)* (node-prop-or-arg | node-children))?`
fn node_space(input: &mut Input<'_>) -> PResult<()> {
    repeat(1.., plain_node_space)
        .map(|_: ()| ())
        .parse_next(input)?;
    opt((
        "/-",
        repeat(0.., alt((plain_node_space, plain_line_space))).map(|_: ()| ()),
        cut_err(alt((
            node_entry.void().context(lbl("slashdashed entry")),
            node_children.void().context(lbl("slashdashed children block")),
        ))),
    ))
    .void()
    .parse_next(input)
}

/// `required-node-space := node-space* plain-node-space+`
fn required_node_space(input: &mut Input<'_>) -> PResult<()> {
    repeat(0.., (node_space, peek(plain_node_space)))
        .map(|_: ()| ())
        .parse_next(input)?;
    repeat(1.., plain_node_space).parse_next(input)
}

/// `optional-node-space := node-space*`
fn optional_node_space(input: &mut Input<'_>) -> PResult<()> {
    repeat(0.., node_space).parse_next(input)
}

// -------------------------------------------------------------------------
// Document and node structure
// -------------------------------------------------------------------------

/// `document := bom? nodes eof`
pub(crate) fn document(input: &mut Input<'_>) -> PResult<Document> {
    opt(bom).parse_next(input)?;
    let doc = nodes.parse_next(input)?;
    cut_err(eof)
        .context(lbl("end of document"))
        .parse_next(input)?;
    Ok(doc)
}

/// `nodes := (line-space* node)* line-space*`
fn nodes(input: &mut Input<'_>) -> PResult<Document> {
    let ((_, nodes, _), span) = (
        repeat(0.., line_space).map(|_: ()| ()),
        repeat(0.., node),
        repeat(0.., line_space).map(|_: ()| ()),
    )
        .with_span()
        .parse_next(input)?;
    Ok(Document {
        nodes,
        span: span.into(),
    })
}

/// A node parsed on its own, with nothing but padding around it.
pub(crate) fn standalone_node(input: &mut Input<'_>) -> PResult<Node> {
    let parsed = node.parse_next(input)?;
    repeat(0.., line_space)
        .map(|_: ()| ())
        .parse_next(input)?;
    cut_err(eof)
        .context(lbl("end of input after node"))
        .parse_next(input)?;
    Ok(parsed)
}

/// `node := line-space* base-node optional-node-space node-terminator`
fn node(input: &mut Input<'_>) -> PResult<Node> {
    let ((_, mut parsed, _, _), span) = (
        repeat(0.., line_space).map(|_: ()| ()),
        base_node,
        optional_node_space,
        node_terminator,
    )
        .context(lbl("node"))
        .with_span()
        .parse_next(input)?;
    parsed.span = span.into();
    Ok(parsed)
}

/// `final-node := base-node optional-node-space node-terminator?`
fn final_node(input: &mut Input<'_>) -> PResult<Node> {
    let parsed = base_node.parse_next(input)?;
    optional_node_space.parse_next(input)?;
    opt(node_terminator).parse_next(input)?;
    Ok(parsed)
}

/// An entry as it exists on the wire: an optionally named value. Unnamed
/// entries become arguments, named ones become properties.
struct Entry {
    name: Option<Identifier>,
    value: Value,
}

enum Segment {
    Entry(Entry),
    Children(Document),
}

/// `base-node := type? optional-node-space string (node-space node-prop-or-arg | node-children)*`
///
/// Kept children blocks may repeat; their nodes concatenate in order.
/// Slashdashed entries and blocks are consumed (and discarded) by the
/// node-space between segments.
fn base_node(input: &mut Input<'_>) -> PResult<Node> {
    let start = input.location();
    let ty = opt(ty).parse_next(input)?;
    optional_node_space.parse_next(input)?;
    let name = if ty.is_some() {
        cut_err(identifier)
            .context(lbl("node name after type annotation"))
            .parse_next(input)?
    } else {
        identifier.parse_next(input)?
    };
    let segments: Vec<Option<Segment>> = repeat(0.., node_segment).parse_next(input)?;
    let mut parsed = Node::new(name);
    parsed.ty = ty;
    for segment in segments.into_iter().flatten() {
        match segment {
            Segment::Entry(entry) => match entry.name {
                Some(key) => {
                    // Last write wins for repeated property names.
                    parsed.props.insert(key.value, entry.value);
                }
                None => parsed.args.push(entry.value),
            },
            Segment::Children(block) => match &mut parsed.children {
                Some(existing) => existing.nodes.extend(block.nodes),
                None => parsed.children = Some(block),
            },
        }
    }
    parsed.span = (start..input.location()).into();
    Ok(parsed)
}

fn node_segment(input: &mut Input<'_>) -> PResult<Option<Segment>> {
    alt((
        (peek(required_node_space), node_entry).map(|(_, entry)| entry.map(Segment::Entry)),
        (optional_node_space, node_children).map(|(_, block)| Some(Segment::Children(block))),
    ))
    .parse_next(input)
}

/// `node-terminator := single-line-comment | newline | ';' | eof`
fn node_terminator(input: &mut Input<'_>) -> PResult<()> {
    alt((eof.void(), ";".void(), newline, single_line_comment)).parse_next(input)
}

/// `node-children := '{' nodes final-node? '}'`
///
/// The scalar immediately after the closing brace must be able to end or
/// continue the surrounding node.
fn node_children(input: &mut Input<'_>) -> PResult<Document> {
    "{".parse_next(input)?;
    let mut block = nodes.parse_next(input)?;
    let fin = opt(final_node).parse_next(input)?;
    if let Some(fin) = fin {
        block.nodes.push(fin);
    }
    cut_err("}")
        .context(lbl("closing '}' of children block"))
        .parse_next(input)?;
    cut_err(peek(after_children))
        .context(lbl("terminator after children block"))
        .parse_next(input)?;
    Ok(block)
}

fn after_children(input: &mut Input<'_>) -> PResult<()> {
    alt((
        eof.void(),
        unicode_space,
        newline,
        one_of([';', '}']).void(),
        "/-".void(),
        "/*".void(),
        "//".void(),
    ))
    .parse_next(input)
}

/// `node-prop-or-arg := prop | value`
fn node_entry(input: &mut Input<'_>) -> PResult<Option<Entry>> {
    preceded(
        optional_node_space,
        alt((
            prop,
            value.map(|v| v.map(|value| Entry { name: None, value })),
        )),
    )
    .context(lbl("node entry"))
    .parse_next(input)
}

/// `prop := string optional-node-space '=' optional-node-space value`
fn prop(input: &mut Input<'_>) -> PResult<Option<Entry>> {
    let (key, _, _, _, value) = (
        identifier,
        optional_node_space,
        "=",
        optional_node_space,
        cut_err(value).context(lbl("property value")),
    )
        .context(lbl("property"))
        .parse_next(input)?;
    Ok(value.map(|value| Entry {
        name: Some(key),
        value,
    }))
}

/// `type := '(' optional-node-space string optional-node-space ')'`
fn ty(input: &mut Input<'_>) -> PResult<Identifier> {
    "(".parse_next(input)?;
    optional_node_space.parse_next(input)?;
    let annotation = cut_err(identifier)
        .context(lbl("type name after '('"))
        .parse_next(input)?;
    optional_node_space.parse_next(input)?;
    cut_err(")")
        .context(lbl("closing ')' of type annotation"))
        .parse_next(input)?;
    Ok(annotation)
}

/// `value := type? optional-node-space (string | number | keyword)`
///
/// Returns `None` when the value was invalid but the parse recovered past
/// it; a diagnostic has been recorded in that case.
fn value(input: &mut Input<'_>) -> PResult<Option<Value>> {
    let start = input.location();
    let ty = opt(ty).parse_next(input)?;
    optional_node_space.parse_next(input)?;
    let literal_part = alt((literal.map(Some), bare_reserved_keyword)).context(lbl("value"));
    let (maybe_literal, raw) = if ty.is_some() {
        // A consumed annotation commits us to a value.
        cut_err(literal_part)
            .context(lbl("value after type annotation"))
            .resume_after(badval)
            .with_taken()
            .parse_next(input)?
    } else {
        literal_part
            .resume_after(badval)
            .with_taken()
            .parse_next(input)?
    };
    let Some(literal) = maybe_literal.flatten() else {
        return Ok(None);
    };
    Ok(Some(Value {
        ty,
        literal,
        repr: Some(raw.into()),
        span: (start..input.location()).into(),
    }))
}

/// Consumes the rest of a value we've cut_err on, so the parse can continue
/// to the next entry boundary and report further diagnostics.
fn badval(input: &mut Input<'_>) -> PResult<()> {
    repeat_till(
        0..,
        (
            not(alt((ws, node_terminator, "{".void(), "}".void()))),
            any,
        ),
        alt((
            eof.void(),
            peek(alt((ws, node_terminator, "{".void(), "}".void()))),
        )),
    )
    .map(|(_, _): ((), _)| ())
    .parse_next(input)
}

/// Reserved bare words are rejected from identifiers by backtracking; when
/// one shows up where a value belongs, report it specifically, with a
/// property-key variant when an `=` follows.
fn bare_reserved_keyword(input: &mut Input<'_>) -> PResult<Option<Literal>> {
    let word = take_while(1.., is_identifier_char).parse_next(input)?;
    if !crate::fmt::is_reserved_word(word) {
        return fail.parse_next(input);
    }
    let is_prop_key = peek(opt((optional_node_space, "=")))
        .parse_next(input)?
        .is_some();
    let message = if is_prop_key {
        "reserved keywords cannot be used as bare property keys"
    } else {
        match word {
            "true" => "reserved keyword 'true' cannot be used as a bare identifier",
            "false" => "reserved keyword 'false' cannot be used as a bare identifier",
            "null" => "reserved keyword 'null' cannot be used as a bare identifier",
            "inf" => "reserved keyword 'inf' cannot be used as a bare identifier",
            "-inf" => "reserved keyword '-inf' cannot be used as a bare identifier",
            _ => "reserved keyword 'nan' cannot be used as a bare identifier",
        }
    };
    Err(ErrMode::Cut(ScanError {
        context: None,
        span: None,
        label: Some("reserved keyword"),
        help: Some("Prefix the keyword with '#' (e.g. #true) to use it as a value."),
        kind: Some(DiagnosticKind::Message(message)),
    }))
}

// -------------------------------------------------------------------------
// Strings and identifiers
// -------------------------------------------------------------------------

/// `string := identifier-string | raw-string | quoted-string`
fn string_literal(input: &mut Input<'_>) -> PResult<Literal> {
    alt((identifier_string, raw_string, quoted_string))
        .context(lbl("string"))
        .parse_next(input)
}

fn identifier(input: &mut Input<'_>) -> PResult<Identifier> {
    let ((value, raw), span) = string_literal
        .verify_map(|v| match v {
            Literal::String(s) => Some(s),
            _ => None,
        })
        .with_taken()
        .with_span()
        .parse_next(input)?;
    Ok(Identifier {
        value,
        repr: Some(raw.into()),
        span: span.into(),
    })
}

/// `identifier-string := unambiguous-ident | signed-ident | dotted-ident`,
/// minus the reserved bare words.
fn identifier_string(input: &mut Input<'_>) -> PResult<Literal> {
    alt((unambiguous_ident, signed_ident, dotted_ident))
        .take()
        .verify(|s: &str| !crate::fmt::is_reserved_word(s))
        .map(|s: &str| Literal::String(s.into()))
        .parse_next(input)
}

/// `unambiguous-ident := (identifier-char - digit - sign - '.') identifier-char*`
fn unambiguous_ident(input: &mut Input<'_>) -> PResult<()> {
    not(one_of(|c: char| {
        c.is_ascii_digit() || matches!(c, '+' | '-' | '.')
    }))
    .parse_next(input)?;
    take_while(1.., is_identifier_char).void().parse_next(input)
}

/// `signed-ident := sign ((identifier-char - digit - '.') identifier-char*)?`
fn signed_ident(input: &mut Input<'_>) -> PResult<()> {
    one_of(['+', '-']).parse_next(input)?;
    not(one_of(|c: char| c.is_ascii_digit() || c == '.')).parse_next(input)?;
    take_while(0.., is_identifier_char).void().parse_next(input)
}

/// `dotted-ident := sign? '.' ((identifier-char - digit) identifier-char*)?`
fn dotted_ident(input: &mut Input<'_>) -> PResult<()> {
    (
        opt(one_of(['+', '-'])),
        '.',
        not(one_of(|c: char| c.is_ascii_digit())),
        take_while(0.., is_identifier_char),
    )
        .void()
        .parse_next(input)
}

/// One resolved character of a multiline string body. Escapes stay tagged
/// until after dedentation, because escaped whitespace neither counts as
/// indentation nor makes a line blank.
#[derive(Debug, Clone, Copy)]
enum MlChunk {
    Verbatim(char),
    Escaped(char),
    Newline,
}

impl MlChunk {
    fn resolve(&self) -> char {
        match self {
            MlChunk::Verbatim(c) | MlChunk::Escaped(c) => *c,
            MlChunk::Newline => '\n',
        }
    }
}

/// ```text
/// quoted-string := '"' single-line-string-body '"'
///                | '"""' newline multi-line-string-body newline unicode-space* '"""'
/// ```
fn quoted_string(input: &mut Input<'_>) -> PResult<Literal> {
    if opt("\"\"\"").parse_next(input)?.is_some() {
        cut_err(peek(newline))
            .context(lbl("newline after opening '\"\"\"'"))
            .parse_next(input)?;
        let (chunks, (_, prefix, _)): (Vec<Option<MlChunk>>, ((), &str, &str)) =
            cut_err(repeat_till(
                0..,
                ml_quoted_chunk,
                (newline, take_while(0.., is_unicode_space), "\"\"\""),
            ))
            .context(lbl("closing '\"\"\"' of multiline string"))
            .parse_next(input)?;
        let body = dedent_multiline(chunks.into_iter().flatten(), prefix)?;
        Ok(Literal::String(body))
    } else {
        "\"".parse_next(input)?;
        let (parts, _): (Vec<Option<char>>, &str) =
            cut_err(repeat_till(0.., string_char, "\""))
                .context(lbl("closing quote of string"))
                .parse_next(input)?;
        Ok(Literal::String(parts.into_iter().flatten().collect()))
    }
}

/// `string-character := '\' escape | [^\\"] - disallowed-literal-code-points`
fn string_char(input: &mut Input<'_>) -> PResult<Option<char>> {
    alt((
        string_escape,
        unescaped_newline,
        disallowed_char,
        one_of(|c: char| c != '\\' && c != '"' && !is_newline_char(c) && !is_disallowed_char(c))
            .map(Some),
    ))
    .parse_next(input)
}

fn ml_quoted_chunk(input: &mut Input<'_>) -> PResult<Option<MlChunk>> {
    alt((
        ml_string_escape,
        newline.value(Some(MlChunk::Newline)),
        disallowed_char,
        one_of(|c: char| c != '\\' && !is_disallowed_char(c))
            .map(|c| Some(MlChunk::Verbatim(c))),
    ))
    .parse_next(input)
}

/// The single-character escapes and `\u{...}`.
fn escape_char(input: &mut Input<'_>) -> PResult<char> {
    alt((
        "\\".value('\\'),
        "\"".value('"'),
        "b".value('\u{0008}'),
        "f".value('\u{000C}'),
        "n".value('\n'),
        "r".value('\r'),
        "t".value('\t'),
        "s".value(' '),
        unicode_escape,
    ))
    .parse_next(input)
}

/// ```text
/// escape := ["\\bfnrts] | 'u{' hex-digit{1, 6} '}' | (unicode-space | newline)+
/// ```
/// The whitespace escape consumes the run and produces nothing.
fn string_escape(input: &mut Input<'_>) -> PResult<Option<char>> {
    preceded(
        "\\",
        cut_err(alt((
            escape_char.map(Some),
            repeat(1.., alt((unicode_space, newline))).map(|_: ()| None),
        ))),
    )
    .context(lbl("escape sequence"))
    .parse_next(input)
}

/// Multiline variant of the whitespace escape: it may cross line
/// boundaries, but never swallows the newline that begins the closing line.
fn ml_string_escape(input: &mut Input<'_>) -> PResult<Option<MlChunk>> {
    preceded(
        "\\",
        cut_err(alt((
            escape_char.map(|c| Some(MlChunk::Escaped(c))),
            repeat(1.., alt((unicode_space, ml_escaped_newline))).map(|_: ()| None),
        ))),
    )
    .context(lbl("escape sequence"))
    .parse_next(input)
}

fn ml_escaped_newline(input: &mut Input<'_>) -> PResult<()> {
    (
        newline,
        not(peek((take_while(0.., is_unicode_space), "\"\"\""))),
    )
        .void()
        .parse_next(input)
}

/// `'u{' hex-digit{1, 6} '}'`, limited to scalar values that may legally
/// appear in a string.
fn unicode_escape(input: &mut Input<'_>) -> PResult<char> {
    "u{".parse_next(input)?;
    let hex = cut_err(take_while(1..=6, AsChar::is_hex_digit))
        .context(lbl("1-6 hex digits in unicode escape"))
        .parse_next(input)?;
    cut_err("}")
        .context(lbl("closing '}' of unicode escape"))
        .parse_next(input)?;
    let code = u32::from_str_radix(hex, 16).expect("1-6 hex digits always fit in a u32");
    match char::from_u32(code) {
        Some(c) if !is_disallowed_char(c) => Ok(c),
        _ => Err(ErrMode::Cut(ScanError::message(
            "invalid code point in unicode escape",
            Some("Escapes must name a Unicode scalar value that is legal in KDL text."),
        ))),
    }
}

fn unescaped_newline<T>(input: &mut Input<'_>) -> PResult<T> {
    peek(newline).parse_next(input)?;
    Err(ErrMode::Cut(ScanError::message(
        "unescaped newline in single-line string",
        Some("Use a multiline string (\"\"\") or the \\n escape."),
    )))
}

fn disallowed_char<T>(input: &mut Input<'_>) -> PResult<T> {
    peek(one_of(is_disallowed_char)).parse_next(input)?;
    Err(ErrMode::Cut(ScanError::message(
        "disallowed literal code point",
        Some("This code point must not appear literally in KDL text; use a string escape if you need it."),
    )))
}

/// ```text
/// raw-string := '#'+ '"' single-line-raw-string-body '"' '#'+
///             | '#'+ '"""' newline multi-line-raw-string-body newline unicode-space* '"""' '#'+
/// ```
/// No escape processing happens inside; the hash count of the opener picks
/// the closing delimiter.
fn raw_string(input: &mut Input<'_>) -> PResult<Literal> {
    let hashes: String = repeat(1.., "#").parse_next(input)?;
    if opt("\"\"\"").parse_next(input)?.is_some() {
        cut_err(peek(newline))
            .context(lbl("newline after opening '\"\"\"'"))
            .parse_next(input)?;
        let closer = format!("\"\"\"{hashes}");
        let (chunks, (_, prefix, _)): (Vec<MlChunk>, ((), &str, &str)) = cut_err(repeat_till(
            0..,
            ml_raw_chunk,
            (
                newline,
                take_while(0.., is_unicode_space),
                closer.as_str(),
            ),
        ))
        .context(lbl("closing quotes of multiline raw string"))
        .parse_next(input)?;
        let body = dedent_multiline(chunks, prefix)?;
        Ok(Literal::String(body))
    } else {
        "\"".parse_next(input)?;
        let closer = format!("\"{hashes}");
        let (body, _): (String, &str) = cut_err(repeat_till(
            0..,
            alt((unescaped_newline, disallowed_char, any)),
            closer.as_str(),
        ))
        .context(lbl("closing quotes of raw string"))
        .parse_next(input)?;
        Ok(Literal::String(body))
    }
}

fn ml_raw_chunk(input: &mut Input<'_>) -> PResult<MlChunk> {
    alt((
        newline.value(MlChunk::Newline),
        disallowed_char,
        any.map(MlChunk::Verbatim),
    ))
    .parse_next(input)
}

/// Applies the dedentation rule: the closing line's whitespace is stripped
/// from every line; lines that are entirely whitespace become empty; a
/// non-blank line that does not start with the prefix is an error. Lines
/// join with LF.
fn dedent_multiline(
    chunks: impl IntoIterator<Item = MlChunk>,
    prefix: &str,
) -> Result<String, ErrMode<ScanError>> {
    let mut lines: Vec<Vec<MlChunk>> = vec![Vec::new()];
    for chunk in chunks {
        if matches!(chunk, MlChunk::Newline) {
            lines.push(Vec::new());
        } else if let Some(line) = lines.last_mut() {
            line.push(chunk);
        }
    }
    // Whatever precedes the opening newline is an empty pseudo-line.
    lines.remove(0);
    let mut rendered = Vec::with_capacity(lines.len());
    for line in lines {
        let blank = line
            .iter()
            .all(|c| matches!(c, MlChunk::Verbatim(ch) if is_unicode_space(*ch)));
        if blank {
            rendered.push(String::new());
            continue;
        }
        let mut rest = line.iter();
        for want in prefix.chars() {
            match rest.next() {
                Some(MlChunk::Verbatim(have)) if *have == want => {}
                _ => {
                    return Err(ErrMode::Cut(ScanError::message(
                        "multiline string line does not start with the closing line's whitespace prefix",
                        Some("Every non-blank line must begin with the exact indentation of the line holding the closing quotes."),
                    )))
                }
            }
        }
        rendered.push(rest.map(MlChunk::resolve).collect());
    }
    Ok(rendered.join("\n"))
}

// -------------------------------------------------------------------------
// Numbers and keywords
// -------------------------------------------------------------------------

/// `number := hex | octal | binary | decimal`, which must end at a value
/// terminator: whitespace, a newline, `= ) { } ;`, a comment or slashdash,
/// or end of input.
fn number(input: &mut Input<'_>) -> PResult<Literal> {
    let parsed = alt((hex, octal, binary, float, integer)).parse_next(input)?;
    cut_err(peek(value_terminator))
        .context(lbl("value terminator after number"))
        .parse_next(input)?;
    Ok(parsed)
}

fn value_terminator(input: &mut Input<'_>) -> PResult<()> {
    alt((
        eof.void(),
        unicode_space,
        newline,
        one_of(['=', ')', '{', '}', ';']).void(),
        "//".void(),
        "/*".void(),
        "/-".void(),
    ))
    .parse_next(input)
}

/// `digit (digit | '_')*` — underscores may group digits but cannot lead.
fn dec_digits(input: &mut Input<'_>) -> PResult<()> {
    digit1.void().parse_next(input)?;
    take_while(0.., |c: char| c.is_ascii_digit() || c == '_')
        .void()
        .parse_next(input)
}

/// ```text
/// decimal := sign? integer ('.' integer)? exponent?
/// exponent := ('e' | 'E') sign? integer
/// ```
/// At least one of the fractional part and the exponent must be present.
fn float(input: &mut Input<'_>) -> PResult<Literal> {
    alt((
        (
            opt(one_of(['+', '-'])),
            dec_digits,
            opt(preceded(
                '.',
                cut_err(dec_digits).context(lbl("digits after the decimal point")),
            )),
            one_of(['e', 'E']),
            opt(one_of(['+', '-'])),
            cut_err(dec_digits).context(lbl("digits in the exponent")),
        )
            .take(),
        (
            opt(one_of(['+', '-'])),
            dec_digits,
            '.',
            cut_err(dec_digits).context(lbl("digits after the decimal point")),
        )
            .take(),
    ))
    .map(|lexeme: &str| {
        let cleaned = lexeme.replace('_', "");
        Literal::Float(
            cleaned
                .parse::<f64>()
                .expect("a validated float lexeme always parses"),
        )
    })
    .context(lbl("float"))
    .parse_next(input)
}

/// Non-float decimal: signed 64-bit when it fits, arbitrary precision
/// otherwise.
fn integer(input: &mut Input<'_>) -> PResult<Literal> {
    (opt(one_of(['+', '-'])), dec_digits)
        .take()
        .map(|lexeme: &str| {
            let cleaned = lexeme.replace('_', "");
            match cleaned.parse::<i64>() {
                Ok(value) => Literal::Int(value),
                Err(_) => Literal::BigInt(
                    cleaned
                        .parse()
                        .expect("a validated decimal lexeme always parses"),
                ),
            }
        })
        .context(lbl("integer"))
        .parse_next(input)
}

fn big_from_radix(sign: Option<char>, digits: &str, radix: u32) -> Literal {
    let cleaned = digits.replace('_', "");
    let magnitude = num_bigint::BigInt::parse_bytes(cleaned.as_bytes(), radix)
        .expect("validated radix digits always parse");
    Literal::BigInt(if sign == Some('-') {
        -magnitude
    } else {
        magnitude
    })
}

/// `hex := sign? '0x' hex-digit (hex-digit | '_')*`
fn hex(input: &mut Input<'_>) -> PResult<Literal> {
    let sign = opt(one_of(['+', '-'])).parse_next(input)?;
    "0x".parse_next(input)?;
    cut_err((
        hex_digit1,
        take_while(0.., |c: char| c.is_ascii_hexdigit() || c == '_'),
    ))
    .take()
    .map(|digits: &str| big_from_radix(sign, digits, 16))
    .context(lbl("hexadecimal digits"))
    .parse_next(input)
}

/// `octal := sign? '0o' [0-7] [0-7_]*`
fn octal(input: &mut Input<'_>) -> PResult<Literal> {
    let sign = opt(one_of(['+', '-'])).parse_next(input)?;
    "0o".parse_next(input)?;
    cut_err((
        oct_digit1,
        take_while(0.., |c: char| c.is_oct_digit() || c == '_'),
    ))
    .take()
    .map(|digits: &str| big_from_radix(sign, digits, 8))
    .context(lbl("octal digits"))
    .parse_next(input)
}

/// `binary := sign? '0b' ('0' | '1') ('0' | '1' | '_')*`
fn binary(input: &mut Input<'_>) -> PResult<Literal> {
    let sign = opt(one_of(['+', '-'])).parse_next(input)?;
    "0b".parse_next(input)?;
    cut_err((
        one_of(['0', '1']),
        take_while(0.., ['0', '1', '_']),
    ))
    .take()
    .map(|digits: &str| big_from_radix(sign, digits, 2))
    .context(lbl("binary digits"))
    .parse_next(input)
}

/// ```text
/// keyword := '#true' | '#false' | '#null'
/// keyword-number := '#inf' | '#-inf' | '#nan'
/// ```
/// A `#` followed by `"` or another `#` is the start of a raw string
/// instead.
fn keyword(input: &mut Input<'_>) -> PResult<Literal> {
    "#".parse_next(input)?;
    not(one_of(['#', '"'])).parse_next(input)?;
    let parsed = cut_err(alt((
        "true".value(Literal::Bool(true)),
        "false".value(Literal::Bool(false)),
        "null".value(Literal::Null),
        "nan".value(Literal::Float(f64::NAN)),
        "inf".value(Literal::Float(f64::INFINITY)),
        "-inf".value(Literal::Float(f64::NEG_INFINITY)),
    )))
    .context(lbl("keyword"))
    .parse_next(input)?;
    cut_err(peek(value_terminator))
        .context(lbl("value terminator after keyword"))
        .parse_next(input)?;
    Ok(parsed)
}

/// `value-literal := string | number | keyword`
fn literal(input: &mut Input<'_>) -> PResult<Literal> {
    alt((string_literal, number, keyword)).parse_next(input)
}

#[cfg(test)]
fn new_input(s: &str) -> Input<'_> {
    Recoverable::new(Located::new(s))
}

#[cfg(test)]
mod string_tests {
    use super::*;

    #[test]
    fn identifiers() {
        assert_eq!(
            string_literal.parse(new_input("foo")).unwrap(),
            Literal::String("foo".into())
        );
        assert_eq!(
            string_literal.parse(new_input("foo123~!@$%^&*.:'|?+<>,")).unwrap(),
            Literal::String("foo123~!@$%^&*.:'|?+<>,".into())
        );
        assert_eq!(
            string_literal.parse(new_input("+false")).unwrap(),
            Literal::String("+false".into())
        );
        assert_eq!(
            string_literal.parse(new_input(".well-known")).unwrap(),
            Literal::String(".well-known".into())
        );
        // Reserved bare words and number-alikes are not identifiers.
        assert!(string_literal.parse(new_input("true")).is_err());
        assert!(string_literal.parse(new_input("-inf")).is_err());
        assert!(string_literal.parse(new_input("123")).is_err());
        assert!(string_literal.parse(new_input(".5")).is_err());
    }

    #[test]
    fn quoted() {
        assert_eq!(
            string_literal.parse(new_input(r#""foo""#)).unwrap(),
            Literal::String("foo".into())
        );
        assert_eq!(
            string_literal.parse(new_input(r#""""#)).unwrap(),
            Literal::String("".into())
        );
        assert_eq!(
            string_literal
                .parse(new_input(r#""a\nb\tc\\d\"e\s""#))
                .unwrap(),
            Literal::String("a\nb\tc\\d\"e ".into())
        );
        assert_eq!(
            string_literal.parse(new_input(r#""\u{1F600}""#)).unwrap(),
            Literal::String("\u{1F600}".into())
        );
    }

    #[test]
    fn whitespace_escape() {
        assert_eq!(
            string_literal.parse(new_input("\"foo\\   bar\"")).unwrap(),
            Literal::String("foobar".into())
        );
        assert_eq!(
            string_literal
                .parse(new_input("\"foo\\\n   bar\""))
                .unwrap(),
            Literal::String("foobar".into())
        );
    }

    #[test]
    fn bad_escapes() {
        assert!(string_literal.parse(new_input(r#""\q""#)).is_err());
        assert!(string_literal.parse(new_input(r#""\u{D800}""#)).is_err());
        assert!(string_literal.parse(new_input(r#""\u{110000}""#)).is_err());
        assert!(string_literal.parse(new_input(r#""\u{FEFF}""#)).is_err());
    }

    #[test]
    fn raw() {
        assert_eq!(
            string_literal.parse(new_input(r##"#"foo"#"##)).unwrap(),
            Literal::String("foo".into())
        );
        assert_eq!(
            string_literal.parse(new_input(r##"#"foo\nbar"#"##)).unwrap(),
            Literal::String("foo\\nbar".into())
        );
        assert_eq!(
            string_literal
                .parse(new_input(r###"##"contains "# inside"##"###))
                .unwrap(),
            Literal::String("contains \"# inside".into())
        );
        assert!(string_literal.parse(new_input("#\"unclosed")).is_err());
    }

    #[test]
    fn multiline() {
        assert_eq!(
            string_literal
                .parse(new_input("\"\"\"\n  hello\n    world\n  \"\"\""))
                .unwrap(),
            Literal::String("hello\n  world".into())
        );
        assert_eq!(
            string_literal.parse(new_input("\"\"\"\n\"\"\"")).unwrap(),
            Literal::String("".into())
        );
        assert_eq!(
            string_literal
                .parse(new_input("\"\"\"\n  a\n\n  b\n  \"\"\""))
                .unwrap(),
            Literal::String("a\n\nb".into())
        );
        // A whitespace escape may join lines before dedentation applies.
        assert_eq!(
            string_literal
                .parse(new_input("\"\"\"\n  a\\\n  b\n  \"\"\""))
                .unwrap(),
            Literal::String("ab".into())
        );
    }

    #[test]
    fn multiline_dedent_mixed_prefix() {
        assert_eq!(
            string_literal
                .parse(new_input("\"\"\"\n\t one\n\t  two\n\t \"\"\""))
                .unwrap(),
            Literal::String("one\n two".into())
        );
    }

    #[test]
    fn multiline_errors() {
        // The opening quotes must be followed directly by a newline.
        assert!(string_literal.parse(new_input("\"\"\"foo\"\"\"")).is_err());
        // A non-blank line that lacks the closing line's prefix.
        assert!(string_literal
            .parse(new_input("\"\"\"\n  ok\n bad\n  \"\"\""))
            .is_err());
    }

    #[test]
    fn multiline_raw() {
        assert_eq!(
            string_literal
                .parse(new_input("#\"\"\"\n  no \\n escapes\n  \"\"\"#"))
                .unwrap(),
            Literal::String("no \\n escapes".into())
        );
    }
}


#[cfg(test)]
mod grammar_tests {
    use crate::Document;

    #[test]
    fn children_without_false_diagnostics() {
        // Entry speculation over `{` must not leave stray diagnostics.
        let doc = Document::parse("node {\n    child\n}").expect("clean parse");
        assert!(doc.get("node").unwrap().children().is_some());
    }

    #[test]
    fn comments_nest() {
        let doc = Document::parse("node /* a /* b */ c */ 1").expect("clean parse");
        assert_eq!(doc.get_arg("node"), Some(&1.into()));
        assert!(Document::parse("node /* unclosed").is_err());
    }

    #[test]
    fn escline_continues_entries() {
        let doc = Document::parse("node 1 \\ // comment\n    2").expect("clean parse");
        assert_eq!(
            doc.iter_args("node").collect::<Vec<_>>(),
            vec![&1.into(), &2.into()]
        );
    }

    #[test]
    fn terminator_required_after_children() {
        assert!(Document::parse("node {\n    a\n}x").is_err());
        assert!(Document::parse("node {\n    a\n};").is_ok());
        assert!(Document::parse("node {\n    a\n} // done").is_ok());
    }

    #[test]
    fn bom_only_at_start() {
        assert!(Document::parse("\u{FEFF}node").is_ok());
        assert!(Document::parse("node \u{FEFF}x").is_err());
    }

    #[test]
    fn property_key_quoting() {
        let doc = Document::parse("node \"my key\"=1 other = 2").expect("clean parse");
        let node = doc.get("node").unwrap();
        assert_eq!(node["my key"], 1.into());
        assert_eq!(node["other"], 2.into());
    }

    #[test]
    fn reserved_words_rejected() {
        let err = Document::parse("node true").unwrap_err();
        assert!(err
            .diagnostics
            .iter()
            .any(|d| d.to_string().contains("reserved keyword 'true'")));
        let err = Document::parse("node null=1").unwrap_err();
        assert!(err
            .diagnostics
            .iter()
            .any(|d| d.to_string().contains("bare property keys")));
    }

    #[test]
    fn multiple_diagnostics_in_one_run() {
        let err = Document::parse("node 0xzz 0o9").unwrap_err();
        assert!(err.diagnostics.len() >= 2);
    }
}
