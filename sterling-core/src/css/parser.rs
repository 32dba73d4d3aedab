use std::{
    error,
    fmt::{self, Display},
    sync::Arc,
};

use cssparser::{BasicParseErrorKind, ParseErrorKind as CssErrorKind, Parser, ParserInput, ToCss, Token};
use log::debug;

use crate::{
    css::{
        Defaults, FilterChain, PropertyMap, Rule, Stylesheet,
        selector::{Combinator, Selector, sorted_unique},
    },
    interner::StrId,
};

// ---------- Errors ----------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A selector, or one entry of a comma separated group, has no segments.
    EmptySelector,
    /// Two `#id` markers in one segment.
    DuplicateId,
    /// A token that is not a type name, `*`, `#id`, `.class`, `:state` or combinator.
    UnexpectedToken(String),
    /// A `>` with nothing on one side of it.
    DanglingCombinator,
    /// A `{` without its `}`.
    UnclosedBlock,
    /// A `{` inside a block, or a `}` outside of one.
    UnexpectedBrace,
    /// Selector text with no `{ ... }` after it.
    MissingBlock,
    /// Declaration text that isn't `name: value;`.
    MalformedDeclaration,
}

/// A stylesheet that could not be loaded. Nothing from the sheet is kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub kind: ParseErrorKind,
    /// The offending selector or declaration.
    pub snippet: String,
    /// 1-based.
    pub line: u32,
    /// 1-based, in characters.
    pub column: u32,
}

impl error::Error for ParseError {}
impl Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match &self.kind {
            ParseErrorKind::EmptySelector => "Empty selector".to_string(),
            ParseErrorKind::DuplicateId => "More than one #id in a selector segment".to_string(),
            ParseErrorKind::UnexpectedToken(token) => format!("Unexpected `{token}` in selector"),
            ParseErrorKind::DanglingCombinator => "Combinator `>` is missing a selector".to_string(),
            ParseErrorKind::UnclosedBlock => "Missing `}`".to_string(),
            ParseErrorKind::UnexpectedBrace => "Unexpected brace".to_string(),
            ParseErrorKind::MissingBlock => "Selector has no declaration block".to_string(),
            ParseErrorKind::MalformedDeclaration => "Failed to parse declaration".to_string(),
        };
        write!(f, "{reason}: `{}` at {}:{}", self.snippet, self.line, self.column)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum CustomParseError {
    EmptySelector,
    DuplicateId,
    DanglingCombinator,
}

// ---------- Configuration ----------

/// Comment syntax stripped from a sheet before anything else is parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentMarkers {
    /// Start and end of a block comment.
    pub block: Option<(String, String)>,
    /// Start of a comment that runs to the end of the line.
    pub line: Option<String>,
}

impl Default for CommentMarkers {
    fn default() -> Self {
        Self {
            block: Some(("/*".to_string(), "*/".to_string())),
            line: Some("//".to_string()),
        }
    }
}

impl CommentMarkers {
    pub fn none() -> Self {
        Self { block: None, line: None }
    }
}

/// Turns stylesheet text into a [`Stylesheet`].
///
/// ```
/// use sterling_core::css::{StyleParser, Filter, Value};
///
/// let mut parser = StyleParser::new();
/// parser.filters_mut().register_property("color", Filter::new("upper", |raw| Ok(Value::from(raw.to_uppercase()))));
/// parser.defaults_mut().set("*", "color", "BLACK");
///
/// let sheet = parser.parse("label { color: red; }").unwrap();
/// assert_eq!(sheet.len(), 1);
/// ```
#[derive(Debug, Clone, Default)]
pub struct StyleParser {
    comments: CommentMarkers,
    filters: FilterChain,
    defaults: Defaults,
}

impl StyleParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_comments(mut self, comments: CommentMarkers) -> Self {
        self.comments = comments;
        self
    }

    pub fn with_filters(mut self, filters: FilterChain) -> Self {
        self.filters = filters;
        self
    }

    pub fn filters(&self) -> &FilterChain {
        &self.filters
    }

    pub fn filters_mut(&mut self) -> &mut FilterChain {
        &mut self.filters
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }

    pub fn defaults_mut(&mut self) -> &mut Defaults {
        &mut self.defaults
    }

    /// Parses `css`. Any malformed rule fails the whole sheet.
    ///
    /// The filter chain persists across calls, so a filter removed while parsing one sheet
    /// stays removed for the next.
    pub fn parse(&mut self, css: &str) -> Result<Stylesheet, ParseError> {
        let rules = self.parse_rules(css)?;
        debug!("Loaded stylesheet with {} rules", rules.len());
        Ok(Stylesheet::from_rules(rules, self.defaults.clone(), None))
    }

    /// Parses `css` into rules in source order, without building an index.
    pub fn parse_rules(&mut self, css: &str) -> Result<Vec<Rule>, ParseError> {
        let text = blank_comments(css, &self.comments);
        let mut rules = Vec::new();

        for block in split_blocks(&text)? {
            let selectors = parse_selector_group(&text, block.prelude)?;
            let properties = Arc::new(parse_declarations(&text, block.body, &mut self.filters)?);

            for selector in selectors {
                rules.push(Rule::new(selector, Arc::clone(&properties)));
            }
        }

        Ok(rules)
    }
}

// ---------- Comments ----------

/// Replaces comments with spaces, keeping newlines and byte offsets intact.
pub(crate) fn blank_comments(css: &str, markers: &CommentMarkers) -> String {
    let block = markers.block.as_ref().filter(|(start, end)| !start.is_empty() && !end.is_empty());
    let line = markers.line.as_deref().filter(|start| !start.is_empty());

    if block.is_none() && line.is_none() {
        return css.to_string();
    }

    let mut out = String::with_capacity(css.len());
    let mut pos = 0;

    while pos < css.len() {
        let rest = &css[pos..];
        let next_block = block.and_then(|(start, _)| rest.find(start.as_str()));
        let next_line = line.and_then(|start| rest.find(start));

        let (start, end) = match (next_block, next_line) {
            (None, None) => {
                out.push_str(rest);
                break;
            }
            (Some(b), Some(l)) if l < b => line_comment_span(rest, l),
            (Some(b), _) => block_comment_span(rest, b, block),
            (None, Some(l)) => line_comment_span(rest, l),
        };

        out.push_str(&rest[..start]);
        for c in rest[start..end].chars() {
            if c == '\n' {
                out.push('\n');
            } else {
                out.extend(std::iter::repeat_n(' ', c.len_utf8()));
            }
        }
        pos += end;
    }

    out
}

fn line_comment_span(rest: &str, start: usize) -> (usize, usize) {
    (start, rest[start..].find('\n').map_or(rest.len(), |e| start + e))
}

// An unterminated block comment runs to the end of the sheet.
fn block_comment_span(rest: &str, start: usize, markers: Option<&(String, String)>) -> (usize, usize) {
    let Some((open, close)) = markers else {
        return (start, start);
    };
    let body = start + open.len();
    (start, rest[body..].find(close.as_str()).map_or(rest.len(), |e| body + e + close.len()))
}

// ---------- Blocks ----------

#[derive(Debug, Clone, Copy)]
pub(crate) struct Span {
    pub start: usize,
    pub end: usize,
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct RawBlock {
    pub prelude: Span,
    pub body: Span,
}

/// Splits `text` into `selector { body }` pairs with a forward scan for literal braces.
pub(crate) fn split_blocks(text: &str) -> Result<Vec<RawBlock>, ParseError> {
    let mut blocks = Vec::new();
    let mut start = 0;

    loop {
        let rest = &text[start..];
        let Some(open) = rest.find('{') else {
            if let Some(close) = rest.find('}') {
                return Err(error_at(text, start + close, ParseErrorKind::UnexpectedBrace, "}"));
            }
            if !rest.trim().is_empty() {
                return Err(error_at(text, start + leading_ws(rest), ParseErrorKind::MissingBlock, rest.trim()));
            }
            return Ok(blocks);
        };

        let open = start + open;
        if let Some(close) = text[start..open].find('}') {
            return Err(error_at(text, start + close, ParseErrorKind::UnexpectedBrace, "}"));
        }

        let Some(close) = text[open + 1..].find('}') else {
            let prelude = text[start..open].trim();
            return Err(error_at(text, start + leading_ws(&text[start..]), ParseErrorKind::UnclosedBlock, prelude));
        };
        let close = open + 1 + close;

        if let Some(nested) = text[open + 1..close].find('{') {
            return Err(error_at(text, open + 1 + nested, ParseErrorKind::UnexpectedBrace, "{"));
        }

        blocks.push(RawBlock {
            prelude: Span { start, end: open },
            body: Span { start: open + 1, end: close },
        });
        start = close + 1;
    }
}

// ---------- Selectors ----------

/// Parses a comma separated selector group.
pub(crate) fn parse_selector_group(text: &str, span: Span) -> Result<Vec<Selector>, ParseError> {
    let source = &text[span.start..span.end];
    let mut input = ParserInput::new(source);
    let mut parser = Parser::new(&mut input);

    parser.parse_comma_separated(parse_selector).map_err(|error| {
        let kind = match error.kind {
            CssErrorKind::Custom(CustomParseError::EmptySelector) => ParseErrorKind::EmptySelector,
            CssErrorKind::Custom(CustomParseError::DuplicateId) => ParseErrorKind::DuplicateId,
            CssErrorKind::Custom(CustomParseError::DanglingCombinator) => ParseErrorKind::DanglingCombinator,
            CssErrorKind::Basic(BasicParseErrorKind::UnexpectedToken(token)) => ParseErrorKind::UnexpectedToken(token.to_css_string()),
            CssErrorKind::Basic(BasicParseErrorKind::EndOfInput) => ParseErrorKind::EmptySelector,
            CssErrorKind::Basic(_) => ParseErrorKind::UnexpectedToken(source.trim().to_string()),
        };

        // cssparser locations are relative to the selector text
        let (base_line, base_column) = line_column(text, span.start);
        let (line, column) = if error.location.line == 0 {
            (base_line, base_column + error.location.column.saturating_sub(1))
        } else {
            (base_line + error.location.line, error.location.column)
        };

        ParseError {
            kind,
            snippet: source.trim().to_string(),
            line,
            column,
        }
    })
}

fn parse_selector<'i>(parser: &mut Parser<'i, '_>) -> Result<Selector, cssparser::ParseError<'i, CustomParseError>> {
    let mut left: Option<(Selector, Combinator)> = None;
    let mut current: Option<Selector> = None;
    let mut pending: Option<Combinator> = None;

    while !parser.is_exhausted() {
        let token = parser.next_including_whitespace()?.clone();
        match token {
            Token::WhiteSpace(_) => {
                if current.is_some() && pending.is_none() {
                    pending = Some(Combinator::Descendant);
                }
            }
            Token::Delim('>') => {
                if current.is_none() || pending == Some(Combinator::Child) {
                    return Err(parser.new_custom_error(CustomParseError::DanglingCombinator));
                }
                pending = Some(Combinator::Child);
            }
            // `*` and type names can only open a segment
            Token::Delim('*') => {
                if current.is_some() && pending.is_none() {
                    return Err(parser.new_unexpected_token_error(token));
                }
                start_segment(&mut left, &mut current, &mut pending);
            }
            Token::Ident(name) => {
                if current.is_some() && pending.is_none() {
                    return Err(parser.new_unexpected_token_error(Token::Ident(name)));
                }
                let segment = start_segment(&mut left, &mut current, &mut pending);
                segment.type_name = Some(StrId::new(&name.to_ascii_lowercase()));
            }
            Token::IDHash(id) | Token::Hash(id) => {
                let segment = continue_segment(&mut left, &mut current, &mut pending);
                if segment.id.is_some() {
                    return Err(parser.new_custom_error(CustomParseError::DuplicateId));
                }
                segment.id = Some(StrId::new(&id));
            }
            Token::Delim('.') => {
                let class = expect_adjacent_ident(parser)?;
                let segment = continue_segment(&mut left, &mut current, &mut pending);
                segment.classes.push(class);
                segment.classes = sorted_unique(std::mem::take(&mut segment.classes));
            }
            Token::Colon => {
                let state = expect_adjacent_ident(parser)?;
                let segment = continue_segment(&mut left, &mut current, &mut pending);
                segment.states.push(state);
                segment.states = sorted_unique(std::mem::take(&mut segment.states));
            }
            _ => return Err(parser.new_unexpected_token_error(token)),
        }
    }

    if pending == Some(Combinator::Child) {
        return Err(parser.new_custom_error(CustomParseError::DanglingCombinator));
    }

    let Some(mut selector) = current else {
        return Err(parser.new_custom_error(CustomParseError::EmptySelector));
    };
    selector.ancestor = left.map(|(sel, comb)| (Box::new(sel), comb));
    Ok(selector)
}

/// Closes the current segment if a combinator is pending and opens a new one.
fn start_segment<'a>(left: &mut Option<(Selector, Combinator)>, current: &'a mut Option<Selector>, pending: &mut Option<Combinator>) -> &'a mut Selector {
    if let Some(mut done) = current.take() {
        let combinator = pending.take().unwrap_or(Combinator::Descendant);
        done.ancestor = left.take().map(|(sel, comb)| (Box::new(sel), comb));
        *left = Some((done, combinator));
    }
    pending.take();
    current.insert(Selector::default())
}

/// Keeps adding to the current segment unless a combinator separates us from it.
fn continue_segment<'a>(left: &mut Option<(Selector, Combinator)>, current: &'a mut Option<Selector>, pending: &mut Option<Combinator>) -> &'a mut Selector {
    if current.is_none() || pending.is_some() {
        return start_segment(left, current, pending);
    }
    current.get_or_insert_with(Selector::default)
}

fn expect_adjacent_ident<'i>(parser: &mut Parser<'i, '_>) -> Result<StrId, cssparser::ParseError<'i, CustomParseError>> {
    match parser.next_including_whitespace()?.clone() {
        Token::Ident(name) => Ok(StrId::new(&name)),
        token => Err(parser.new_unexpected_token_error(token)),
    }
}

// ---------- Declarations ----------

/// Parses `name: value;` pairs. The final `;` may be left off.
pub(crate) fn parse_declarations(text: &str, span: Span, filters: &mut FilterChain) -> Result<PropertyMap, ParseError> {
    let mut properties = PropertyMap::new();
    let mut start = span.start;

    while start < span.end {
        let rest = &text[start..span.end];
        if rest.trim().is_empty() {
            break;
        }

        let end = rest.find(';').unwrap_or(rest.len());
        let declaration = &rest[..end];
        let at = start + leading_ws(rest);

        let Some(colon) = declaration.find(':') else {
            return Err(error_at(text, at, ParseErrorKind::MalformedDeclaration, declaration.trim()));
        };

        let name = declaration[..colon].trim();
        let raw = declaration[colon + 1..].trim();
        if name.is_empty() || raw.is_empty() || name.contains(char::is_whitespace) {
            return Err(error_at(text, at, ParseErrorKind::MalformedDeclaration, declaration.trim()));
        }

        let value = filters.convert_property(name, raw);
        properties.insert(name, value);

        start += end + 1;
    }

    Ok(properties)
}

// ---------- Locations ----------

fn leading_ws(text: &str) -> usize {
    text.len() - text.trim_start().len()
}

/// 1-based line and column of a byte offset.
pub(crate) fn line_column(text: &str, offset: usize) -> (u32, u32) {
    let before = &text[..offset.min(text.len())];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |i| i + 1);
    let column = before[line_start..].chars().count() + 1;
    (line as u32, column as u32)
}

fn error_at(text: &str, offset: usize, kind: ParseErrorKind, snippet: &str) -> ParseError {
    let (line, column) = line_column(text, offset);
    ParseError {
        kind,
        snippet: snippet.lines().next().unwrap_or("").to_string(),
        line,
        column,
    }
}
