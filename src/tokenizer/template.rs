//! Template-mode tokenizer
//!
//! Advisory messages (volcanic ash, tropical cyclone) are fixed-label forms
//! rather than free token streams:
//!
//! ```text
//! VA ADVISORY
//! DTG:      20240101/0600Z
//! VAAC:     TOULOUSE
//! OBS VA CLD: SFC/FL100 N4830 E00215
//!             MOV SE 15KT
//! ```
//!
//! Line 0 is the bare message identifier. Every other line is matched
//! against the template's label table (case-insensitive prefix match); the
//! remainder becomes the field's value and is tokenized against the field's
//! declared value type. A line matching no label but starting with deep
//! indentation continues the previous field's value; anything else is
//! unstructured word-by-word content.

use tracing::trace;

use super::{typed_token, Token};
use crate::grammar::{CompiledGrammar, TemplateField};
use crate::validate::ValidatorRegistry;

/// Leading columns beyond which an unlabelled line is a value continuation.
const CONTINUATION_INDENT: usize = 6;

/// Synthetic token type for matched template labels.
const LABEL_TYPE: &str = "label";
/// Synthetic token type for the line-0 identifier.
const IDENTIFIER_TYPE: &str = "identifier";

pub fn tokenize_template(
    grammar: &CompiledGrammar,
    validators: &ValidatorRegistry,
    text: &str,
) -> Vec<Token> {
    let fields: &[TemplateField] = grammar
        .grammar
        .template
        .as_ref()
        .map(|t| t.fields.as_slice())
        .unwrap_or_default();

    let mut tokens = Vec::new();
    let mut pos = 0;
    let mut line_index = 0;
    let mut last_value_type: Option<String> = None;

    for line in text.split_inclusive('\n') {
        let content = line.trim_end_matches(['\n', '\r']);
        let trailing = &line[content.len()..];

        tokenize_line(
            grammar,
            validators,
            text,
            pos,
            content,
            line_index,
            fields,
            &mut last_value_type,
            &mut tokens,
        );

        push_whitespace(&mut tokens, pos + content.len(), trailing);
        pos += line.len();
        line_index += 1;
    }

    trace!(tokens = tokens.len(), "tokenized template message");
    tokens
}

#[allow(clippy::too_many_arguments)]
fn tokenize_line(
    grammar: &CompiledGrammar,
    validators: &ValidatorRegistry,
    full_text: &str,
    line_start: usize,
    content: &str,
    line_index: usize,
    fields: &[TemplateField],
    last_value_type: &mut Option<String>,
    tokens: &mut Vec<Token>,
) {
    let trimmed = content.trim_start();
    let indent = content.len() - trimmed.len();
    push_whitespace(tokens, line_start, &content[..indent]);
    let body_start = line_start + indent;
    let body = trimmed.trim_end();
    let tail_ws_start = body_start + body.len();

    if body.is_empty() {
        push_whitespace(tokens, tail_ws_start, &trimmed[body.len()..]);
        return;
    }

    if line_index == 0 {
        let identifier = grammar.grammar.identifier.as_deref().unwrap_or("");
        if !identifier.is_empty() && body.eq_ignore_ascii_case(identifier) {
            let mut token = typed_token(
                grammar,
                validators,
                full_text,
                body_start,
                body,
                IDENTIFIER_TYPE,
            );
            token.category.get_or_insert_with(|| IDENTIFIER_TYPE.to_string());
            tokens.push(token);
        } else {
            tokens.push(Token::error(
                body_start,
                body,
                format!("Expected message identifier \"{identifier}\""),
            ));
        }
        push_whitespace(tokens, tail_ws_start, &trimmed[body.len()..]);
        return;
    }

    if let Some(field) = match_label(fields, body) {
        let label_len = field.label.len();
        let label = &body[..label_len];
        let mut token = typed_token(
            grammar,
            validators,
            full_text,
            body_start,
            label,
            LABEL_TYPE,
        );
        token.category.get_or_insert_with(|| LABEL_TYPE.to_string());
        token.description = Some(field.label.clone());
        tokens.push(token);

        let value = &body[label_len..];
        let value_trim = value.trim_start();
        push_whitespace(
            tokens,
            body_start + label_len,
            &value[..value.len() - value_trim.len()],
        );
        tokenize_value(
            grammar,
            validators,
            full_text,
            body_start + label_len + (value.len() - value_trim.len()),
            value_trim,
            field.value_type.as_deref(),
            tokens,
        );
        *last_value_type = field.value_type.clone();
    } else if indent >= CONTINUATION_INDENT {
        // Deeply indented line continues the previous field's value
        tokenize_value(
            grammar,
            validators,
            full_text,
            body_start,
            body,
            last_value_type.as_deref(),
            tokens,
        );
    } else {
        tokenize_value(grammar, validators, full_text, body_start, body, None, tokens);
    }

    push_whitespace(tokens, tail_ws_start, &trimmed[body.len()..]);
}

/// Case-insensitive prefix match against the label table. Longest label
/// wins so "OBS VA CLD:" is not shadowed by "OBS:".
fn match_label<'f>(fields: &'f [TemplateField], body: &str) -> Option<&'f TemplateField> {
    fields
        .iter()
        .filter(|f| {
            !f.label.is_empty()
                && body.len() >= f.label.len()
                && body.is_char_boundary(f.label.len())
                && body[..f.label.len()].eq_ignore_ascii_case(&f.label)
        })
        .max_by_key(|f| f.label.len())
}

/// Tokenizes a field value: whole-value match against the declared type
/// first, word by word otherwise.
fn tokenize_value(
    grammar: &CompiledGrammar,
    validators: &ValidatorRegistry,
    full_text: &str,
    start: usize,
    value: &str,
    value_type: Option<&str>,
    tokens: &mut Vec<Token>,
) {
    if value.is_empty() {
        return;
    }

    if let Some(ty) = value_type {
        if grammar.token_matches(ty, value) {
            tokens.push(typed_token(
                grammar, validators, full_text, start, value, ty,
            ));
            return;
        }
    }

    let mut pos = 0;
    while pos < value.len() {
        let rest = &value[pos..];
        let first = rest.chars().next().expect("rest is non-empty");
        if first.is_whitespace() {
            let end = rest
                .find(|c: char| !c.is_whitespace())
                .unwrap_or(rest.len());
            push_whitespace(tokens, start + pos, &rest[..end]);
            pos += end;
            continue;
        }
        let word_len = rest.find(char::is_whitespace).unwrap_or(rest.len());
        let word = &rest[..word_len];
        tokens.push(match_value_word(
            grammar,
            validators,
            full_text,
            start + pos,
            word,
            value_type,
        ));
        pos += word_len;
    }
}

fn match_value_word(
    grammar: &CompiledGrammar,
    validators: &ValidatorRegistry,
    full_text: &str,
    pos: usize,
    word: &str,
    value_type: Option<&str>,
) -> Token {
    if let Some(ty) = value_type {
        if grammar.token_matches(ty, word) {
            return typed_token(grammar, validators, full_text, pos, word, ty);
        }
    }
    for (id, def) in &grammar.grammar.tokens {
        if def.greedy && grammar.token_matches(id, word) {
            return typed_token(grammar, validators, full_text, pos, word, id);
        }
    }
    Token::error(pos, word, format!("Unrecognized text \"{word}\""))
}

/// Appends whitespace, merging into the previous token when adjacent so a
/// newline and the following indent form one run.
fn push_whitespace(tokens: &mut Vec<Token>, start: usize, text: &str) {
    if text.is_empty() {
        return;
    }
    if let Some(last) = tokens.last_mut() {
        if last.is_whitespace() && last.end == start {
            last.text.push_str(text);
            last.end += text.len();
            return;
        }
    }
    tokens.push(Token::whitespace(start, text));
}
