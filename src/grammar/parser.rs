//! Schema grammar
//!
//! ```text
//! schema      = { comment } { declaration { comment } }
//! declaration = model | relation
//! model       = "model" ModelName "{" { body_entry } "}"
//! body_entry  = annotation | ModelName | model_field
//! model_field = fieldName type [ "?" | "+" | "-" ] { model_specifier }
//! relation    = "relation" "{" { fieldName ModelName [ "?" | "[]" ] { relation_specifier } } "}"
//! annotation  = "@" ident "(" [ param { "," param } ] ")"
//! ```
//!
//! Model names start with an uppercase letter, field names with a lowercase
//! letter or `_`. Comments (`//` and `/* */`) preceding a declaration, field or
//! composition are attached to it.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_until, take_while},
    character::complete::{char, digit1, multispace0, satisfy},
    combinator::{cut, eof, map, map_res, not, opt, recognize, value},
    error::{context, ContextError, ErrorKind, ParseError, VerboseError, VerboseErrorKind},
    multi::{many0, separated_list1},
    sequence::{delimited, pair, preceded, terminated},
    IResult, InputTake,
};
use nom_locate::{position, LocatedSpan};

use super::cst::*;
use crate::ast::{FieldType, RefAction};
use crate::error::{Result, SchemaError};

pub type Input<'a> = LocatedSpan<&'a str>;
type PResult<'a, T> = IResult<Input<'a>, T, VerboseError<Input<'a>>>;

// ============================================================================
// Public API
// ============================================================================

/// Parse one schema source into its concrete syntax tree
pub fn parse_source(file: &str, text: &str) -> Result<SourceTree> {
    match source_tree(Input::new(text)) {
        Ok((_, tree)) => Ok(tree),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(file, &e)),
        Err(nom::Err::Incomplete(_)) => Err(SchemaError::Syntax {
            file: file.to_string(),
            line: text.lines().count().max(1),
            column: 1,
            expected: "more input".to_string(),
        }),
    }
}

fn syntax_error(file: &str, err: &VerboseError<Input<'_>>) -> SchemaError {
    let (line, column) = err
        .errors
        .first()
        .map(|(at, _)| (at.location_line() as usize, at.get_utf8_column()))
        .unwrap_or((1, 1));

    let expected = err
        .errors
        .iter()
        .find_map(|(_, kind)| match kind {
            VerboseErrorKind::Context(ctx) => Some(ctx.to_string()),
            _ => None,
        })
        .or_else(|| {
            err.errors.iter().find_map(|(_, kind)| match kind {
                VerboseErrorKind::Char(c) => Some(format!("'{}'", c)),
                _ => None,
            })
        })
        .unwrap_or_else(|| "valid schema syntax".to_string());

    SchemaError::Syntax {
        file: file.to_string(),
        line,
        column,
        expected,
    }
}

// ============================================================================
// Declarations
// ============================================================================

fn source_tree(i: Input) -> PResult<SourceTree> {
    let (i, items) = many0(item)(i)?;
    let (i, _) = comments(i)?;
    let (i, _) = context("'model' or 'relation' declaration", eof)(i)?;
    Ok((i, SourceTree { items }))
}

fn item(i: Input) -> PResult<Item> {
    let (i, comments) = comments(i)?;
    let (i, mut item) = alt((map(model, Item::Model), map(relation, Item::Relation)))(i)?;
    match &mut item {
        Item::Model(m) => m.comments = comments,
        Item::Relation(r) => r.comments = comments,
    }
    Ok((i, item))
}

fn model(i: Input) -> PResult<ModelNode> {
    let (i, start) = position(i)?;
    let (i, _) = keyword("model")(i)?;
    let (i, name) = cut(preceded(multispace0, context("model name", model_name)))(i)?;
    let (i, _) = cut(preceded(multispace0, context("'{'", char('{'))))(i)?;
    let (i, entries) = many0(body_entry)(i)?;
    let (i, _) = comments(i)?;
    let (i, _) = cut(context("'}' closing the model", char('}')))(i)?;
    let (i, end) = position(i)?;

    Ok((
        i,
        ModelNode {
            comments: Vec::new(),
            name: name.fragment().to_string(),
            entries,
            span: span(start, end),
        },
    ))
}

fn relation(i: Input) -> PResult<RelationNode> {
    let (i, start) = position(i)?;
    let (i, _) = keyword("relation")(i)?;
    let (i, _) = cut(preceded(multispace0, context("'{'", char('{'))))(i)?;
    let (i, fields) = many0(relation_field_entry)(i)?;
    let (i, _) = comments(i)?;
    let (i, _) = cut(context("'}' closing the relation", char('}')))(i)?;
    let (i, end) = position(i)?;

    Ok((
        i,
        RelationNode {
            comments: Vec::new(),
            fields,
            span: span(start, end),
        },
    ))
}

// ============================================================================
// Model bodies
// ============================================================================

fn body_entry(i: Input) -> PResult<BodyEntry> {
    let (i, comments) = comments(i)?;
    let (i, mut entry) = alt((
        map(annotation, BodyEntry::Annotation),
        map(composition, BodyEntry::Composition),
        map(model_field, BodyEntry::Field),
    ))(i)?;
    match &mut entry {
        BodyEntry::Field(f) => f.comments = comments,
        BodyEntry::Composition(c) => c.comments = comments,
        BodyEntry::Annotation(_) => {}
    }
    Ok((i, entry))
}

fn composition(i: Input) -> PResult<CompositionNode> {
    let (i, start) = position(i)?;
    let (i, name) = model_name(i)?;
    let (i, end) = position(i)?;
    Ok((
        i,
        CompositionNode {
            comments: Vec::new(),
            name: name.fragment().to_string(),
            span: span(start, end),
        },
    ))
}

fn annotation(i: Input) -> PResult<AnnotationNode> {
    let (i, start) = position(i)?;
    let (i, _) = char('@')(i)?;
    let (i, name) = cut(context("annotation name", identifier))(i)?;
    let (i, _) = cut(preceded(multispace0, context("'('", char('('))))(i)?;
    let (i, raw) = take_till(|c| c == ')')(i)?;
    let (i, _) = cut(context("')' closing the annotation", char(')')))(i)?;
    let (i, end) = position(i)?;

    let params = raw
        .fragment()
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(String::from)
        .collect();

    Ok((
        i,
        AnnotationNode {
            name: name.fragment().to_string(),
            params,
            span: span(start, end),
        },
    ))
}

fn model_field(i: Input) -> PResult<FieldNode> {
    let (i, start) = position(i)?;
    let (i, name) = field_name(i)?;
    let (i, ty) = cut(preceded(
        multispace0,
        context(
            "field type (bool, int*, uint*, float*, date, string, bytes)",
            field_type,
        ),
    ))(i)?;
    let (i, symbol) = opt(preceded(multispace0, model_symbol))(i)?;
    let (i, _) = cut(context(
        "at most one of '?', '+', '-'",
        not(preceded(multispace0, model_symbol)),
    ))(i)?;
    let (i, specifiers) = many0(preceded(multispace0, |i| model_specifier(i, ty)))(i)?;
    let (i, end) = position(i)?;

    Ok((
        i,
        FieldNode {
            comments: Vec::new(),
            name: name.fragment().to_string(),
            ty: ty.as_str().to_string(),
            symbol,
            specifiers,
            span: span(start, end),
        },
    ))
}

fn model_symbol(i: Input) -> PResult<Symbol> {
    alt((
        value(Symbol::Nullable, char('?')),
        value(Symbol::NoCreate, char('+')),
        value(Symbol::NoUpdate, char('-')),
    ))(i)
}

fn model_specifier(i: Input, ty: FieldType) -> PResult<Specifier> {
    alt((|i| validation(i, ty), model_keyword))(i)
}

/// `private`, `hidden`, `unique` or `auto`; a keyword followed by a field type
/// is the next field's name instead
fn model_keyword(i: Input) -> PResult<Specifier> {
    let (i, word) = alt((
        keyword("private"),
        keyword("hidden"),
        keyword("unique"),
        keyword("auto"),
    ))(i)?;
    let (i, _) = not(preceded(multispace0, field_type))(i)?;
    Ok((i, Specifier::keyword(*word.fragment())))
}

fn validation(i: Input, ty: FieldType) -> PResult<Specifier> {
    let at = i;
    let (i, op) = alt((
        keyword("gt"),
        keyword("gte"),
        keyword("lt"),
        keyword("lte"),
        keyword("mul"),
        keyword("minlen"),
        keyword("maxlen"),
        keyword("regex"),
    ))(i)?;
    let (i, _) = preceded(multispace0, char('('))(i)?;

    let op = *op.fragment();
    let (i, arg) = match op {
        "gt" | "gte" | "lt" | "lte" | "mul" if ty.is_numeric() => {
            let (i, n) = cut(delimited(
                multispace0,
                context("integer", signed_int),
                multispace0,
            ))(i)?;
            (i, Arg::Int(n))
        }
        "minlen" | "maxlen" if ty.is_text() => {
            let (i, n) = cut(delimited(
                multispace0,
                context("non-negative integer", unsigned_int),
                multispace0,
            ))(i)?;
            (i, Arg::Int(n))
        }
        "regex" if ty.is_text() => {
            let (i, body) = balanced_text(i)?;
            (i, Arg::Raw(body.fragment().trim().to_string()))
        }
        _ => {
            return Err(nom::Err::Failure(VerboseError::add_context(
                at,
                validation_expectation(ty),
                VerboseError::from_error_kind(at, ErrorKind::Verify),
            )))
        }
    };
    let (i, _) = cut(context("')'", char(')')))(i)?;

    Ok((
        i,
        Specifier {
            name: op.to_string(),
            args: vec![arg],
        },
    ))
}

fn validation_expectation(ty: FieldType) -> &'static str {
    if ty.is_text() {
        "string validation (minlen, maxlen, regex)"
    } else if ty.is_numeric() {
        "numeric validation (gt, gte, lt, lte, mul)"
    } else {
        "no validation clause for this field type"
    }
}

// ============================================================================
// Relation bodies
// ============================================================================

fn relation_field_entry(i: Input) -> PResult<FieldNode> {
    let (i, comments) = comments(i)?;
    let (i, mut field) = relation_field(i)?;
    field.comments = comments;
    Ok((i, field))
}

fn relation_field(i: Input) -> PResult<FieldNode> {
    let (i, start) = position(i)?;
    let (i, name) = field_name(i)?;
    let (i, ty) = cut(preceded(multispace0, context("related model name", model_name)))(i)?;
    let (i, symbol) = opt(preceded(multispace0, relation_symbol))(i)?;
    let (i, _) = cut(context(
        "at most one of '?', '[]'",
        not(preceded(multispace0, relation_symbol)),
    ))(i)?;
    let (i, specifiers) = many0(preceded(multispace0, relation_specifier))(i)?;
    let (i, end) = position(i)?;

    Ok((
        i,
        FieldNode {
            comments: Vec::new(),
            name: name.fragment().to_string(),
            ty: ty.fragment().to_string(),
            symbol,
            specifiers,
            span: span(start, end),
        },
    ))
}

fn relation_symbol(i: Input) -> PResult<Symbol> {
    alt((
        value(Symbol::Nullable, char('?')),
        value(Symbol::Array, tag("[]")),
    ))(i)
}

fn relation_specifier(i: Input) -> PResult<Specifier> {
    alt((relation_call, relation_keyword))(i)
}

/// `mutual` or `mutable`; a keyword followed by a model name is the next
/// field's name instead
fn relation_keyword(i: Input) -> PResult<Specifier> {
    let (i, word) = alt((keyword("mutual"), keyword("mutable")))(i)?;
    let (i, _) = not(preceded(multispace0, model_name))(i)?;
    Ok((i, Specifier::keyword(*word.fragment())))
}

fn relation_call(i: Input) -> PResult<Specifier> {
    let (i, op) = alt((keyword("delete"), keyword("update"), keyword("ref")))(i)?;
    let (i, _) = preceded(multispace0, char('('))(i)?;

    let op = *op.fragment();
    let (i, args) = if op == "ref" {
        let (i, names) = cut(separated_list1(
            char(','),
            delimited(
                multispace0,
                context("referenced field name", field_name),
                multispace0,
            ),
        ))(i)?;
        let args = names
            .into_iter()
            .map(|n| Arg::Word(n.fragment().to_string()))
            .collect();
        (i, args)
    } else {
        let (i, action) = cut(delimited(
            multispace0,
            context("action (nothing, cascade, unlink)", ref_action),
            multispace0,
        ))(i)?;
        (i, vec![Arg::Word(action.as_str().to_string())])
    };
    let (i, _) = cut(context("')'", char(')')))(i)?;

    Ok((
        i,
        Specifier {
            name: op.to_string(),
            args,
        },
    ))
}

fn ref_action(i: Input) -> PResult<RefAction> {
    map_res(identifier, |s: Input| s.fragment().parse::<RefAction>())(i)
}

// ============================================================================
// Comments
// ============================================================================

/// Zero or more comments with the whitespace around them
fn comments(i: Input) -> PResult<Vec<String>> {
    let (i, found) = many0(preceded(multispace0, comment))(i)?;
    let (i, _) = multispace0(i)?;
    Ok((i, found))
}

fn comment(i: Input) -> PResult<String> {
    alt((line_comment, block_comment))(i)
}

fn line_comment(i: Input) -> PResult<String> {
    let (i, _) = tag("//")(i)?;
    let (i, text) = take_till(|c| c == '\n' || c == '\r')(i)?;
    Ok((i, normalize_comment(text.fragment())))
}

fn block_comment(i: Input) -> PResult<String> {
    let (i, _) = tag("/*")(i)?;
    let (i, text) = cut(context("'*/' closing the comment", take_until("*/")))(i)?;
    let (i, _) = tag("*/")(i)?;
    Ok((i, normalize_comment(text.fragment())))
}

/// Drop blank lines and leading indentation
fn normalize_comment(text: &str) -> String {
    text.lines()
        .map(str::trim_start)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

// ============================================================================
// Tokens
// ============================================================================

fn keyword<'a>(word: &'static str) -> impl FnMut(Input<'a>) -> PResult<'a, Input<'a>> {
    terminated(tag(word), not(satisfy(is_ident_char)))
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn identifier(i: Input) -> PResult<Input> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(is_ident_char),
    ))(i)
}

fn model_name(i: Input) -> PResult<Input> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_uppercase()),
        take_while(is_ident_char),
    ))(i)
}

fn field_name(i: Input) -> PResult<Input> {
    recognize(pair(
        satisfy(|c: char| c.is_ascii_lowercase() || c == '_'),
        take_while(is_ident_char),
    ))(i)
}

fn field_type(i: Input) -> PResult<FieldType> {
    map_res(identifier, |s: Input| s.fragment().parse::<FieldType>())(i)
}

fn signed_int(i: Input) -> PResult<i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), |s: Input| {
        s.fragment().parse::<i64>()
    })(i)
}

fn unsigned_int(i: Input) -> PResult<i64> {
    map_res(digit1, |s: Input| s.fragment().parse::<i64>())(i)
}

/// Text up to the parenthesis closing the current group, which is left unconsumed
fn balanced_text(i: Input) -> PResult<Input> {
    let mut depth = 0usize;
    let mut escaped = false;
    for (idx, c) in i.fragment().char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '(' => depth += 1,
            ')' if depth == 0 => {
                let (rest, body) = i.take_split(idx);
                return Ok((rest, body));
            }
            ')' => depth -= 1,
            _ => {}
        }
    }
    Err(nom::Err::Failure(VerboseError::add_context(
        i,
        "')' closing the regex",
        VerboseError::from_error_kind(i, ErrorKind::TakeUntil),
    )))
}

fn span(start: Input, end: Input) -> Span {
    Span {
        start: start.location_offset(),
        end: end.location_offset(),
        line: start.location_line(),
    }
}
