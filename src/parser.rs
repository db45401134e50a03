//! Parse schema source into AST using PEST.

use crate::ast::*;
use pest::Parser;
use pest_derive::Parser as PestParser;

/// Largest field number a schema may declare (`extensions 100 to max;`).
pub const MAX_FIELD_NUMBER: u32 = 536_870_911;

#[derive(PestParser)]
#[grammar = "grammar.pest"]
struct SchemaParser;

type Pair<'a> = pest::iterators::Pair<'a, Rule>;

/// Parse schema source into AST.
pub fn parse(source: &str) -> Result<SchemaFile, String> {
    let pairs = SchemaParser::parse(Rule::schema, source).map_err(|e| format!("Parse error: {}", e))?;
    let pair = pairs.into_iter().next().ok_or("Empty parse")?;
    build_schema(pair)
}

fn build_schema(pair: Pair) -> Result<SchemaFile, String> {
    let mut file = SchemaFile::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::syntax_stmt => {
                let lit = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::string_lit)
                    .ok_or("syntax: missing string")?;
                file.syntax = Some(unquote(lit.as_str()));
            }
            Rule::package_stmt => {
                if file.package.is_some() {
                    return Err("multiple package statements".to_string());
                }
                let name = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::full_ident)
                    .ok_or("package: missing name")?;
                file.package = Some(name.as_str().to_string());
            }
            Rule::import_stmt => {
                let lit = inner
                    .into_inner()
                    .find(|p| p.as_rule() == Rule::string_lit)
                    .ok_or("import: missing path")?;
                file.imports.push(unquote(lit.as_str()));
            }
            Rule::message_def => file.messages.push(build_message(inner)?),
            Rule::enum_def => file.enums.push(build_enum(inner)?),
            Rule::extend_def => file.extends.push(build_extend(inner)?),
            _ => {}
        }
    }
    Ok(file)
}

fn build_message(pair: Pair) -> Result<MessageDef, String> {
    let mut msg = MessageDef::default();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => msg.name = inner.as_str().to_string(),
            Rule::field_def => msg.fields.push(build_field(inner, None)?),
            Rule::map_field_def => msg.fields.push(build_map_field(inner)?),
            Rule::oneof_def => {
                let index = msg.oneofs.len();
                let mut it = inner.into_inner().filter(|p| p.as_rule() != Rule::kw_oneof);
                let name = it.next().ok_or("oneof: missing name")?;
                msg.oneofs.push(name.as_str().to_string());
                for part in it {
                    if part.as_rule() == Rule::oneof_field {
                        msg.fields.push(build_field(part, Some(index))?);
                    }
                }
            }
            Rule::message_def => msg.messages.push(build_message(inner)?),
            Rule::enum_def => msg.enums.push(build_enum(inner)?),
            Rule::extend_def => msg.extends.push(build_extend(inner)?),
            Rule::reserved_stmt => {
                for part in inner.into_inner() {
                    match part.as_rule() {
                        Rule::ranges => msg.reserved_numbers.extend(build_ranges(part)?),
                        Rule::reserved_names => {
                            for lit in part.into_inner() {
                                msg.reserved_names.push(unquote(lit.as_str()));
                            }
                        }
                        _ => {}
                    }
                }
            }
            Rule::extensions_stmt => {
                for part in inner.into_inner() {
                    if part.as_rule() == Rule::ranges {
                        msg.extension_ranges.extend(build_ranges(part)?);
                    }
                }
            }
            _ => {}
        }
    }
    if msg.name.is_empty() {
        return Err("message: missing name".to_string());
    }
    Ok(msg)
}

/// Shared by `field_def` (label, type, name, number) and `oneof_field` (type, name, number).
fn build_field(pair: Pair, oneof: Option<usize>) -> Result<FieldDef, String> {
    let mut label = Label::None;
    let mut type_spec = None;
    let mut name = None;
    let mut number = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::label => {
                label = match inner.as_str() {
                    "repeated" => Label::Repeated,
                    "optional" => Label::Optional,
                    "required" => Label::Required,
                    other => return Err(format!("unknown label: {}", other)),
                }
            }
            Rule::type_name => type_spec = Some(parse_type_name(inner.as_str())),
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::int_lit => number = Some(parse_field_number(inner.as_str())?),
            _ => {}
        }
    }
    Ok(FieldDef {
        name: name.ok_or("field: missing name")?,
        label,
        type_spec: type_spec.ok_or("field: missing type")?,
        number: number.ok_or("field: missing number")?,
        oneof,
    })
}

fn build_map_field(pair: Pair) -> Result<FieldDef, String> {
    let mut types = Vec::with_capacity(2);
    let mut name = None;
    let mut number = None;
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_name => types.push(parse_type_name(inner.as_str())),
            Rule::ident => name = Some(inner.as_str().to_string()),
            Rule::int_lit => number = Some(parse_field_number(inner.as_str())?),
            _ => {}
        }
    }
    let mut types = types.into_iter();
    let key = types.next().ok_or("map: missing key type")?;
    let value = types.next().ok_or("map: missing value type")?;
    Ok(FieldDef {
        name: name.ok_or("map field: missing name")?,
        label: Label::None,
        type_spec: TypeSpec::Map(Box::new(key), Box::new(value)),
        number: number.ok_or("map field: missing number")?,
        oneof: None,
    })
}

fn build_enum(pair: Pair) -> Result<EnumDef, String> {
    let mut name = String::new();
    let mut values = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::ident => name = inner.as_str().to_string(),
            Rule::enum_value => {
                let mut it = inner.into_inner();
                let value_name = it.next().ok_or("enum value: name")?.as_str().to_string();
                let lit = it.next().ok_or("enum value: number")?;
                let number = parse_int(lit.as_str())
                    .and_then(|n| i32::try_from(n).ok())
                    .ok_or_else(|| format!("enum value {}: invalid number {}", value_name, lit.as_str()))?;
                values.push(EnumValueDef { name: value_name, number });
            }
            _ => {}
        }
    }
    if name.is_empty() {
        return Err("enum: missing name".to_string());
    }
    Ok(EnumDef { name, values })
}

fn build_extend(pair: Pair) -> Result<ExtendDef, String> {
    let mut extendee = None;
    let mut fields = Vec::new();
    for inner in pair.into_inner() {
        match inner.as_rule() {
            Rule::type_name => extendee = Some(inner.as_str().to_string()),
            Rule::field_def => fields.push(build_field(inner, None)?),
            _ => {}
        }
    }
    Ok(ExtendDef {
        extendee: extendee.ok_or("extend: missing extendee")?,
        fields,
    })
}

fn build_ranges(pair: Pair) -> Result<Vec<NumberRange>, String> {
    let mut out = Vec::new();
    for range in pair.into_inner() {
        let mut it = range.into_inner().filter(|p| p.as_rule() != Rule::kw_to);
        let start = parse_field_number(it.next().ok_or("range: missing start")?.as_str())?;
        let end = match it.next() {
            None => start,
            Some(p) if p.as_rule() == Rule::kw_max => MAX_FIELD_NUMBER,
            Some(p) => parse_field_number(p.as_str())?,
        };
        if end < start {
            return Err(format!("range {} to {} is empty", start, end));
        }
        out.push(NumberRange { start, end });
    }
    Ok(out)
}

fn parse_type_name(s: &str) -> TypeSpec {
    match ScalarType::from_keyword(s) {
        Some(scalar) => TypeSpec::Scalar(scalar),
        None => TypeSpec::Named(s.to_string()),
    }
}

fn parse_field_number(s: &str) -> Result<u32, String> {
    parse_int(s)
        .and_then(|n| u32::try_from(n).ok())
        .filter(|n| (1..=MAX_FIELD_NUMBER).contains(n))
        .ok_or_else(|| format!("invalid field number: {}", s))
}

fn parse_int(s: &str) -> Option<i64> {
    let s = s.trim();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };
    let magnitude = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        digits.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

fn unquote(s: &str) -> String {
    let inner = if s.len() >= 2 && (s.starts_with('"') || s.starts_with('\'')) {
        &s[1..s.len() - 1]
    } else {
        s
    };
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
