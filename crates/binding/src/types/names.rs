//! Type-name parsing for configuration-declared types
//!
//! Metadata entries and the CLI name their destination type as text. The
//! grammar is a tiny subset of Rust type syntax:
//! `name` | `name<arg>` | `name<arg, arg>`.

use super::{NumberKind, TypeDescriptor};

pub(super) fn parse_type_name(input: &str) -> Option<TypeDescriptor> {
    let mut parser = Parser { input, pos: 0 };
    let descriptor = parser.descriptor()?;
    parser.skip_ws();
    if parser.pos == input.len() {
        Some(descriptor)
    } else {
        None
    }
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn skip_ws(&mut self) {
        while let Some(ch) = self.peek() {
            if !ch.is_whitespace() {
                break;
            }
            self.pos += ch.len_utf8();
        }
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn eat(&mut self, expected: char) -> bool {
        self.skip_ws();
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        self.skip_ws();
        let start = self.pos;
        while let Some(ch) = self.peek() {
            if ch.is_alphanumeric() || ch == '_' || ch == ':' || ch == '.' {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
        let input = self.input;
        (self.pos > start).then(|| &input[start..self.pos])
    }

    fn descriptor(&mut self) -> Option<TypeDescriptor> {
        let name = self.ident()?;
        let mut args = Vec::new();
        if self.eat('<') {
            loop {
                args.push(self.descriptor()?);
                if self.eat(',') {
                    continue;
                }
                if self.eat('>') {
                    break;
                }
                return None;
            }
        }
        build(name, args)
    }
}

fn build(name: &str, mut args: Vec<TypeDescriptor>) -> Option<TypeDescriptor> {
    // std::collections::HashMap → HashMap
    let simple = name.rsplit("::").next().unwrap_or(name);
    match args.len() {
        0 => scalar(simple),
        1 => {
            let inner = args.pop()?;
            match simple {
                "Option" => Some(TypeDescriptor::optional(inner)),
                family => Some(TypeDescriptor::sequence(family.to_string(), inner)),
            }
        }
        2 => {
            let value = args.pop()?;
            let key = args.pop()?;
            Some(TypeDescriptor::map(simple.to_string(), key, value))
        }
        _ => None,
    }
}

fn scalar(name: &str) -> Option<TypeDescriptor> {
    let kind = match name.to_ascii_lowercase().as_str() {
        "string" | "str" => return Some(TypeDescriptor::text()),
        "bool" | "boolean" => return Some(TypeDescriptor::boolean()),
        "char" => return Some(TypeDescriptor::character()),
        "i8" => NumberKind::I8,
        "i16" => NumberKind::I16,
        "i32" | "int" => NumberKind::I32,
        "i64" | "long" => NumberKind::I64,
        "i128" => NumberKind::I128,
        "isize" => NumberKind::Isize,
        "u8" | "byte" => NumberKind::U8,
        "u16" => NumberKind::U16,
        "u32" => NumberKind::U32,
        "u64" => NumberKind::U64,
        "u128" => NumberKind::U128,
        "usize" => NumberKind::Usize,
        "f32" | "float" => NumberKind::F32,
        "f64" | "double" => NumberKind::F64,
        _ => return None,
    };
    Some(TypeDescriptor::number(kind))
}
