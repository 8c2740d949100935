//! PDF object-syntax lexer.
//!
//! Low-level tokenization of the PDF *object* language (file structure,
//! dictionaries, arrays, indirect objects). The content-stream language has
//! its own byte-faithful tokenizer in [`crate::content`]; this lexer is free
//! to discard whitespace because object syntax round-trips through the
//! serializer, not through raw bytes.
//!
//! Token types: numbers (integer and real), literal `(...)` and hex `<...>`
//! strings, `/Names` (with `#XX` escapes decoded), the keywords `true`,
//! `false`, `null`, `obj`, `endobj`, `stream`, `endstream`, `R`, and the
//! `[` `]` `<<` `>>` delimiters. Whitespace and `%` comments are skipped.

use nom::{
    branch::alt,
    bytes::complete::{tag, take_till, take_while},
    character::complete::{char, digit1, one_of},
    combinator::{map, opt, value},
    sequence::{delimited, preceded},
    IResult,
};

/// Token types recognized by the PDF object lexer.
#[derive(Debug, PartialEq, Clone)]
pub enum Token<'a> {
    /// Integer number (e.g. 42, -123)
    Integer(i64),
    /// Real (floating-point) number (e.g. 3.14, -.002)
    Real(f64),
    /// Literal string content (escape sequences NOT yet decoded)
    LiteralString(&'a [u8]),
    /// Hexadecimal string content (decoding happens at parser level)
    HexString(&'a [u8]),
    /// Name with `#XX` escapes decoded (e.g. "Type" from "/Type")
    Name(String),
    /// Boolean true keyword
    True,
    /// Boolean false keyword
    False,
    /// Null keyword
    Null,
    /// Array start delimiter `[`
    ArrayStart,
    /// Array end delimiter `]`
    ArrayEnd,
    /// Dictionary start delimiter `<<`
    DictStart,
    /// Dictionary end delimiter `>>`
    DictEnd,
    /// Indirect object start keyword `obj`
    ObjStart,
    /// Indirect object end keyword `endobj`
    ObjEnd,
    /// Stream data start keyword `stream`
    StreamStart,
    /// Stream data end keyword `endstream`
    StreamEnd,
    /// Reference keyword `R` (as in `10 0 R`)
    R,
}

/// True for the six PDF whitespace characters.
pub(crate) fn is_pdf_whitespace(c: u8) -> bool {
    matches!(c, b' ' | b'\t' | b'\r' | b'\n' | 0x00 | 0x0C)
}

/// Skip whitespace and `%` comments before a token.
fn skip_ws(input: &[u8]) -> IResult<&[u8], ()> {
    let mut remaining = input;
    loop {
        let (rest, ws) = take_while(is_pdf_whitespace)(remaining)?;
        remaining = rest;
        if remaining.first() == Some(&b'%') {
            let (rest, _) =
                preceded(char('%'), take_till(|c| c == b'\r' || c == b'\n'))(remaining)?;
            remaining = rest;
            continue;
        }
        if ws.is_empty() {
            break;
        }
    }
    Ok((remaining, ()))
}

/// Parse an integer or real number.
///
/// PDF allows leading +/- and numbers starting or ending with a decimal
/// point: 42, -123, +17, 3.14, .5, 0., -.002
fn parse_number(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (rest, sign) = opt(one_of("+-"))(input)?;
    let (rest, int_part) = opt(digit1)(rest)?;
    let (rest, frac_part) = opt(preceded(char('.'), opt(digit1)))(rest)?;

    let err = || nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Digit));

    if int_part.is_none() && frac_part.is_none() {
        return Err(err());
    }

    let int_str = int_part
        .map(|b| std::str::from_utf8(b).map_err(|_| err()))
        .transpose()?
        .unwrap_or("0");

    if let Some(frac) = frac_part {
        let frac_str = frac
            .map(|b| std::str::from_utf8(b).map_err(|_| err()))
            .transpose()?
            .unwrap_or("0");
        let mut num: f64 = format!("{}.{}", int_str, frac_str).parse().map_err(|_| err())?;
        if sign == Some('-') {
            num = -num;
        }
        Ok((rest, Token::Real(num)))
    } else {
        let mut num: i64 = int_str.parse().map_err(|_| err())?;
        if sign == Some('-') {
            num = -num;
        }
        Ok((rest, Token::Integer(num)))
    }
}

/// Parse a literal string enclosed in parentheses.
///
/// Tracks nesting depth so balanced inner parentheses stay inside the token,
/// and skips over escape sequences so `\(` and `\)` do not affect depth.
/// Returns raw content; escape decoding happens at the parser level.
fn parse_literal_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (body, _) = char('(')(input)?;
    let mut depth = 1usize;
    let mut pos = 0usize;

    while depth > 0 && pos < body.len() {
        match body[pos] {
            b'\\' => pos += 2, // escape covers the next byte whatever it is
            b'(' => {
                depth += 1;
                pos += 1;
            },
            b')' => {
                depth -= 1;
                pos += 1;
            },
            _ => pos += 1,
        }
    }

    if depth != 0 || pos > body.len() {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    Ok((&body[pos..], Token::LiteralString(&body[..pos - 1])))
}

/// Parse a hexadecimal string enclosed in angle brackets.
///
/// Must not fire on `<<` (dictionary start).
fn parse_hex_string(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    if input.starts_with(b"<<") {
        return Err(nom::Err::Error(nom::error::Error::new(input, nom::error::ErrorKind::Tag)));
    }

    delimited(
        char('<'),
        map(
            take_while(|c: u8| c.is_ascii_hexdigit() || c.is_ascii_whitespace()),
            Token::HexString,
        ),
        char('>'),
    )(input)
}

/// Decode `#XX` escape sequences in PDF names.
///
/// Invalid sequences (missing or non-hex digits) keep the `#` literal, which
/// is the common lenient behavior for malformed files.
pub fn decode_name_escapes(name: &str) -> String {
    let mut result = String::with_capacity(name.len());
    let mut chars = name.chars();

    while let Some(ch) = chars.next() {
        if ch != '#' {
            result.push(ch);
            continue;
        }
        let rest = chars.as_str();
        if rest.len() >= 2 && rest.is_char_boundary(2) {
            if let Ok(byte) = u8::from_str_radix(&rest[..2], 16) {
                result.push(byte as char);
                chars.next();
                chars.next();
                continue;
            }
        }
        result.push('#');
    }

    result
}

/// Parse a name starting with `/`.
///
/// Name content runs until the next whitespace or delimiter; `#XX` escapes
/// are decoded here per the spec. Empty names (`/ `) are accepted leniently.
fn parse_name(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    preceded(
        char('/'),
        map(
            take_while(|c: u8| {
                !is_pdf_whitespace(c)
                    && !matches!(
                        c,
                        b'/' | b'%' | b'(' | b')' | b'<' | b'>' | b'[' | b']' | b'{' | b'}'
                    )
            }),
            |bytes| {
                let name_str = std::str::from_utf8(bytes).unwrap_or("");
                Token::Name(decode_name_escapes(name_str))
            },
        ),
    )(input)
}

/// Parse keywords and delimiters.
///
/// Order matters: multi-character keywords before their prefixes
/// (`endstream` before `stream`, `<<` before `<`).
fn parse_keyword(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    alt((
        value(Token::False, tag(b"false")),
        value(Token::True, tag(b"true")),
        value(Token::Null, tag(b"null")),
        value(Token::ObjEnd, tag(b"endobj")),
        value(Token::StreamEnd, tag(b"endstream")),
        value(Token::StreamStart, tag(b"stream")),
        value(Token::ObjStart, tag(b"obj")),
        value(Token::DictStart, tag(b"<<")),
        value(Token::DictEnd, tag(b">>")),
        value(Token::ArrayStart, tag(b"[")),
        value(Token::ArrayEnd, tag(b"]")),
        value(Token::R, tag(b"R")),
    ))(input)
}

/// Parse a single PDF token, skipping any leading whitespace and comments.
///
/// Alternative order matters: keywords first (so `true` is not read as a
/// name), then names, numbers, and strings.
pub fn token(input: &[u8]) -> IResult<&[u8], Token<'_>> {
    let (input, _) = skip_ws(input)?;
    alt((
        parse_keyword,
        parse_name,
        parse_number,
        parse_literal_string,
        parse_hex_string,
    ))(input)
}
