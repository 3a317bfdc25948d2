use anyhow::anyhow;

use super::ast::{
    AttrArg, Attribute, Expr, FieldDecl, FieldInit, Ident, Item, OpDecl, ParamDecl, ShapeDecl,
    SourceFile, Stmt, TypeExpr, TypeExprKind,
};
use super::lexer::{tokenize, Span, Token, TokenKind};
use crate::types::TypeRef;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub message: String,
    pub span: Span,
}

impl From<super::lexer::LexError> for ParseError {
    fn from(err: super::lexer::LexError) -> Self {
        ParseError {
            message: err.message,
            span: err.span,
        }
    }
}

type PResult<T> = Result<T, ParseError>;

static EOF: TokenKind = TokenKind::Eof;

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn peek(&self) -> &TokenKind {
        self.peek_at(0)
    }

    fn peek_at(&self, offset: usize) -> &TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len().saturating_sub(1));
        self.tokens
            .get(idx)
            .map_or(&EOF, |t| &t.kind)
    }

    fn span(&self) -> Span {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        self.tokens.get(idx).map_or(0..0, |t| t.span.clone())
    }

    fn prev_end(&self) -> usize {
        self.pos
            .checked_sub(1)
            .and_then(|i| self.tokens.get(i))
            .map_or(0, |t| t.span.end)
    }

    fn bump(&mut self) -> Token {
        let idx = self.pos.min(self.tokens.len().saturating_sub(1));
        let token = self.tokens.get(idx).cloned().unwrap_or(Token {
            kind: TokenKind::Eof,
            span: 0..0,
        });
        if self.pos < self.tokens.len() {
            self.pos += 1;
        }
        token
    }

    fn at(&self, kind: &TokenKind) -> bool {
        self.peek() == kind
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        if self.at(kind) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn error<T>(&self, expected: &str) -> PResult<T> {
        Err(ParseError {
            message: format!("expected {expected}, found {}", self.peek()),
            span: self.span(),
        })
    }

    fn expect(&mut self, kind: &TokenKind) -> PResult<Span> {
        if self.at(kind) {
            Ok(self.bump().span)
        } else {
            self.error(&kind.to_string())
        }
    }

    fn ident(&mut self) -> PResult<Ident> {
        if let TokenKind::Ident(name) = self.peek() {
            let name = name.clone();
            let span = self.bump().span;
            Ok(Ident { name, span })
        } else {
            self.error("identifier")
        }
    }

    fn file(&mut self) -> PResult<SourceFile> {
        let mut items = Vec::new();
        while !self.at(&TokenKind::Eof) {
            items.push(self.item()?);
        }
        Ok(SourceFile { items })
    }

    fn item(&mut self) -> PResult<Item> {
        let start = self.span().start;
        let attrs = self.attributes()?;
        match self.peek() {
            TokenKind::Shape => {
                self.bump();
                self.shape(attrs, start).map(Item::Shape)
            }
            TokenKind::Async | TokenKind::Op => {
                let is_async = self.eat(&TokenKind::Async);
                self.expect(&TokenKind::Op)?;
                self.op(attrs, is_async, start).map(Item::Op)
            }
            _ => self.error("`shape` or `op`"),
        }
    }

    fn attributes(&mut self) -> PResult<Vec<Attribute>> {
        let mut attrs = Vec::new();
        while self.at(&TokenKind::Hash) {
            let start = self.bump().span.start;
            self.expect(&TokenKind::LBracket)?;
            let name = self.ident()?;
            let mut args = Vec::new();
            if self.eat(&TokenKind::LParen) {
                while !self.at(&TokenKind::RParen) {
                    if let TokenKind::Str(value) = self.peek() {
                        let value = value.clone();
                        let span = self.bump().span;
                        args.push(AttrArg::Str(value, span));
                    } else {
                        args.push(AttrArg::Type(self.type_expr()?));
                    }
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                self.expect(&TokenKind::RParen)?;
            }
            let end = self.expect(&TokenKind::RBracket)?.end;
            attrs.push(Attribute {
                name,
                args,
                span: start..end,
            });
        }
        Ok(attrs)
    }

    fn shape(&mut self, attrs: Vec<Attribute>, start: usize) -> PResult<ShapeDecl> {
        let name = self.ident()?;
        self.expect(&TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            let field = self.ident()?;
            self.expect(&TokenKind::Colon)?;
            let ty = self.type_expr()?;
            fields.push(FieldDecl { name: field, ty });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(&TokenKind::RBrace)?.end;
        Ok(ShapeDecl {
            attrs,
            name,
            fields,
            span: start..end,
        })
    }

    fn op(&mut self, attrs: Vec<Attribute>, is_async: bool, start: usize) -> PResult<OpDecl> {
        let name = self.ident()?;
        self.expect(&TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(&TokenKind::RParen) {
            let param_attrs = self.attributes()?;
            let param = self.ident()?;
            self.expect(&TokenKind::Colon)?;
            let ty = self.type_expr()?;
            params.push(ParamDecl {
                attrs: param_attrs,
                name: param,
                ty,
            });
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        self.expect(&TokenKind::RParen)?;
        self.expect(&TokenKind::Arrow)?;
        let ret = self.type_expr()?;
        self.expect(&TokenKind::LBrace)?;
        let mut body = Vec::new();
        while !self.at(&TokenKind::RBrace) {
            body.push(self.stmt()?);
        }
        let end = self.expect(&TokenKind::RBrace)?.end;
        Ok(OpDecl {
            attrs,
            is_async,
            name,
            params,
            ret,
            body,
            span: start..end,
        })
    }

    fn stmt(&mut self) -> PResult<Stmt> {
        let start = self.span().start;
        match self.peek() {
            TokenKind::Let => {
                self.bump();
                let name = self.ident()?;
                self.expect(&TokenKind::Eq)?;
                let value = self.expr()?;
                let end = self.expect(&TokenKind::Semi)?.end;
                Ok(Stmt::Let {
                    name,
                    value,
                    span: start..end,
                })
            }
            TokenKind::Return => {
                self.bump();
                let value = self.expr()?;
                let end = self.expect(&TokenKind::Semi)?.end;
                Ok(Stmt::Return {
                    value,
                    span: start..end,
                })
            }
            _ => self.error("`let` or `return`"),
        }
    }

    fn expr(&mut self) -> PResult<Expr> {
        let start = self.span().start;
        match self.peek() {
            TokenKind::Await => {
                self.bump();
                let inner = self.expr()?;
                let end = self.prev_end();
                Ok(Expr::Await {
                    inner: Box::new(inner),
                    span: start..end,
                })
            }
            TokenKind::New => {
                self.bump();
                let ty = self.type_expr()?;
                self.expect(&TokenKind::LBrace)?;
                let mut fields = Vec::new();
                while !self.at(&TokenKind::RBrace) {
                    let name = self.ident()?;
                    self.expect(&TokenKind::Eq)?;
                    let value = self.expr()?;
                    fields.push(FieldInit { name, value });
                    if !self.eat(&TokenKind::Comma) {
                        break;
                    }
                }
                let end = self.expect(&TokenKind::RBrace)?.end;
                Ok(Expr::New {
                    ty,
                    fields,
                    span: start..end,
                })
            }
            TokenKind::Ident(_) => {
                let func = self.ident()?;
                let turbofish =
                    self.at(&TokenKind::ColonColon) && self.peek_at(1) == &TokenKind::Lt;
                if turbofish || self.at(&TokenKind::LParen) {
                    return self.call(func, start);
                }
                let mut expr = Expr::Var(func);
                while self.eat(&TokenKind::Dot) {
                    let field = self.ident()?;
                    let end = field.span.end;
                    expr = Expr::Field {
                        base: Box::new(expr),
                        field,
                        span: start..end,
                    };
                }
                Ok(expr)
            }
            _ => self.error("expression"),
        }
    }

    fn call(&mut self, func: Ident, start: usize) -> PResult<Expr> {
        let mut type_args = Vec::new();
        if self.eat(&TokenKind::ColonColon) {
            self.expect(&TokenKind::Lt)?;
            type_args = self.type_list()?;
            self.expect(&TokenKind::Gt)?;
        }
        self.expect(&TokenKind::LParen)?;
        let mut args = Vec::new();
        while !self.at(&TokenKind::RParen) {
            args.push(self.expr()?);
            if !self.eat(&TokenKind::Comma) {
                break;
            }
        }
        let end = self.expect(&TokenKind::RParen)?.end;
        Ok(Expr::Call {
            func,
            type_args,
            args,
            span: start..end,
        })
    }

    fn type_list(&mut self) -> PResult<Vec<TypeExpr>> {
        let mut types = vec![self.type_expr()?];
        while self.eat(&TokenKind::Comma) {
            types.push(self.type_expr()?);
        }
        Ok(types)
    }

    fn type_expr(&mut self) -> PResult<TypeExpr> {
        let start = self.span().start;
        if self.eat(&TokenKind::LBracket) {
            let elem = self.type_expr()?;
            let end = self.expect(&TokenKind::RBracket)?.end;
            return Ok(TypeExpr {
                kind: TypeExprKind::Array(Box::new(elem)),
                span: start..end,
            });
        }

        let mut segments = vec![self.ident()?.name];
        while self.eat(&TokenKind::Dot) {
            segments.push(self.ident()?.name);
        }
        let (module, name) = if self.eat(&TokenKind::ColonColon) {
            (Some(segments.join(".")), self.ident()?.name)
        } else if segments.len() == 1 {
            (None, segments.remove(0))
        } else {
            return self.error("`::` after module path");
        };

        let mut args = Vec::new();
        if self.eat(&TokenKind::Lt) {
            args = self.type_list()?;
            self.expect(&TokenKind::Gt)?;
        }
        Ok(TypeExpr {
            kind: TypeExprKind::Path { module, name, args },
            span: start..self.prev_end(),
        })
    }
}

/// Parse one source unit.
///
/// # Errors
///
/// Returns the first lexical or syntax error.
pub fn parse_source(text: &str) -> Result<SourceFile, ParseError> {
    let tokens = tokenize(text)?;
    Parser::new(tokens).file()
}

/// Parse the text form of a [`TypeRef`] (`app.users::User`, `[core::Int]`,
/// `Async<app::Pong>`, `Anonymous`).
///
/// # Errors
///
/// Returns an error if `text` is not exactly one type.
pub fn parse_type_text(text: &str) -> anyhow::Result<TypeRef> {
    let parse = || -> PResult<TypeExpr> {
        let mut parser = Parser::new(tokenize(text)?);
        let ty = parser.type_expr()?;
        parser.expect(&TokenKind::Eof)?;
        Ok(ty)
    };
    parse()
        .map(|ty| ty.to_type_ref())
        .map_err(|e| anyhow!("invalid type '{text}': {} at {:?}", e.message, e.span))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    const PING: &str = r#"
#[http(GET, "/ping/{id}")]
#[produces(app::Pong)]
op Ping(#[path] id: core::Int, #[query("max-size")] max_size: core::Int) -> app::Pong {
    let request_1 = new app::Ping {
        Id = id,
        MaxSize = max_size,
    };
    return process::<app::Ping, app::Pong>(request_1);
}
"#;

    #[test]
    fn test_parse_operation() {
        let file = parse_source(PING).unwrap();
        assert_eq!(file.items.len(), 1);
        let Item::Op(op) = &file.items[0] else {
            panic!("expected op");
        };
        assert_eq!(op.name.name, "Ping");
        assert!(!op.is_async);
        assert_eq!(op.attrs.len(), 2);
        assert_eq!(op.attrs[0].name.name, "http");
        assert_eq!(op.params.len(), 2);
        assert!(matches!(&op.params[1].attrs[0].args[0], AttrArg::Str(s, _) if s == "max-size"));
        assert_eq!(op.body.len(), 2);
        let Stmt::Return { value, .. } = &op.body[1] else {
            panic!("expected return");
        };
        assert!(matches!(value, Expr::Call { type_args, .. } if type_args.len() == 2));
    }

    #[test]
    fn test_parse_shape_and_async_op() {
        let text = r#"
shape CreateUserBody_0001 {
    Name: core::String,
    Tags: [core::String],
}

#[http(POST, "/users")]
async op CreateUser(#[body] body: CreateUserBody_0001) -> Async<app::User> {
    let request_0001 = new app::CreateUser { Name = body.Name, Tags = body.Tags };
    return await process_async::<app::CreateUser, app::User>(request_0001);
}
"#;
        let file = parse_source(text).unwrap();
        assert_eq!(file.items.len(), 2);
        let Item::Shape(shape) = &file.items[0] else {
            panic!("expected shape");
        };
        assert_eq!(shape.fields.len(), 2);
        let Item::Op(op) = &file.items[1] else {
            panic!("expected op");
        };
        assert!(op.is_async);
        assert!(op.ret.to_type_ref().is_async());
        let Stmt::Return { value, .. } = &op.body[1] else {
            panic!("expected return");
        };
        assert!(matches!(value, Expr::Await { .. }));
    }

    #[test]
    fn test_syntax_error_span() {
        let err = parse_source("shape A { Name core::String }").unwrap_err();
        assert_eq!(&"shape A { Name core::String }"[err.span.clone()], "core");
        assert!(err.message.contains("`:`"));
    }

    #[test]
    fn test_parse_type_text() {
        assert_eq!(
            parse_type_text("core::List<core::Int>").unwrap(),
            TypeRef::generic("core", "List", vec![TypeRef::core("Int")])
        );
        assert!(parse_type_text("app.users").is_err());
        assert!(parse_type_text("core::Int core::Int").is_err());
    }
}
