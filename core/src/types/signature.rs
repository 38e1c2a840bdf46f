//! Parser for textual native signatures such as `"function< int, any >"`.
//!
//! The first type argument is the return type; the rest are the parameter
//! types, in order.

use crate::diagnostics::CompileErrorKind;

use super::{TypeId, TypeRegistry};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSignature {
    pub ret: TypeId,
    pub params: Vec<TypeId>,
}

struct SignatureParser<'a, 'r> {
    text: &'a str,
    rest: &'a str,
    registry: &'r mut TypeRegistry,
}

pub fn parse_signature(
    registry: &mut TypeRegistry,
    text: &str,
) -> Result<FunctionSignature, CompileErrorKind> {
    let mut parser = SignatureParser {
        text,
        rest: text,
        registry,
    };
    let (name, args) = parser.parse_application()?;
    if name != "function" {
        return Err(parser.error(format!("expected `function`, found `{}`", name)));
    }
    parser.skip_ws();
    if !parser.rest.is_empty() {
        return Err(parser.error(format!("unexpected trailing `{}`", parser.rest)));
    }
    let mut args = args.into_iter();
    let ret = args
        .next()
        .ok_or_else(|| parser.error("missing return type".to_owned()))?;
    Ok(FunctionSignature {
        ret,
        params: args.collect(),
    })
}

impl SignatureParser<'_, '_> {
    fn error(&self, reason: String) -> CompileErrorKind {
        CompileErrorKind::InvalidSignature {
            signature: self.text.to_owned(),
            reason,
        }
    }

    fn skip_ws(&mut self) {
        self.rest = self.rest.trim_start();
    }

    fn eat(&mut self, c: char) -> bool {
        self.skip_ws();
        match self.rest.strip_prefix(c) {
            Some(rest) => {
                self.rest = rest;
                true
            }
            None => false,
        }
    }

    fn ident(&mut self) -> Result<&str, CompileErrorKind> {
        self.skip_ws();
        let end = self
            .rest
            .find(|c: char| !(c.is_alphanumeric() || c == '_'))
            .unwrap_or(self.rest.len());
        if end == 0 {
            return Err(self.error("expected a type name".to_owned()));
        }
        let (ident, rest) = self.rest.split_at(end);
        self.rest = rest;
        Ok(ident)
    }

    /// `name` or `name< type, ... >`
    fn parse_application(&mut self) -> Result<(String, Vec<TypeId>), CompileErrorKind> {
        let name = self.ident()?.to_owned();
        let mut args = Vec::new();
        if self.eat('<') {
            loop {
                args.push(self.parse_type()?);
                if self.eat('>') {
                    break;
                }
                if !self.eat(',') {
                    return Err(self.error("expected `,` or `>`".to_owned()));
                }
            }
        }
        Ok((name, args))
    }

    fn parse_type(&mut self) -> Result<TypeId, CompileErrorKind> {
        let (name, args) = self.parse_application()?;
        match name.as_str() {
            "function" => {
                let mut args = args.into_iter();
                let ret = args
                    .next()
                    .ok_or_else(|| self.error("missing return type".to_owned()))?;
                Ok(self.registry.function_type(args.collect(), ret))
            }
            "array" => {
                let element = match args.as_slice() {
                    [] => TypeId::ANY,
                    [element] => *element,
                    _ => return Err(self.error("`array` takes one type argument".to_owned())),
                };
                Ok(self.registry.array_of(element))
            }
            other => {
                let ty = self
                    .registry
                    .builtin(other)
                    .ok_or_else(|| self.error(format!("unknown type `{}`", other)))?;
                if !args.is_empty() {
                    return Err(self.error(format!("`{}` takes no type arguments", other)));
                }
                Ok(ty)
            }
        }
    }
}
