//! Immutable syntax tree handed to the semantic core by the parser.
//!
//! Definitions that the core may check more than once (functions, structs,
//! function literals) are behind `Rc` so scopes and unchecked entries can hold
//! on to them without copying.

use std::rc::Rc;

use crate::diagnostics::Span;

#[derive(Debug, Clone, PartialEq)]
pub struct SpannedName {
    pub name: String,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Program {
    pub modules: Vec<Module>,
}

#[derive(Debug, Clone)]
pub struct Module {
    pub name: SpannedName,
    /// A global module registers its items directly in the program scope.
    pub global: bool,
    pub items: Vec<ModuleItem>,
}

#[derive(Debug, Clone)]
pub enum ModuleItem {
    Function(Rc<FunctionDefn>),
    Struct(Rc<StructDecl>),
    TypeAlias(TypeAlias),
}

#[derive(Debug, Clone)]
pub struct FunctionDefn {
    pub name: SpannedName,
    pub type_params: Vec<SpannedName>,
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FunctionLiteral {
    pub params: Vec<Param>,
    pub ret: Option<TypeExpr>,
    pub body: Block,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct Param {
    pub name: SpannedName,
    pub ty: Option<TypeExpr>,
}

#[derive(Debug, Clone)]
pub struct StructDecl {
    pub name: SpannedName,
    pub type_params: Vec<SpannedName>,
    pub fields: Vec<FieldDecl>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub struct FieldDecl {
    pub name: SpannedName,
    pub ty: TypeExpr,
}

#[derive(Debug, Clone)]
pub struct TypeAlias {
    pub name: SpannedName,
    pub params: Vec<SpannedName>,
    pub aliased: TypeExpr,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum TypeExpr {
    Name(SpannedName),
    Apply {
        base: Box<TypeExpr>,
        args: Vec<TypeExpr>,
    },
    Func {
        params: Vec<TypeExpr>,
        ret: Box<TypeExpr>,
    },
    Tuple(Vec<TypeExpr>),
    Sum(Vec<TypeExpr>),
    Ref(Box<TypeExpr>),
    Maybe(Box<TypeExpr>),
    Pointer(Box<TypeExpr>),
    Extern(Box<TypeExpr>),
}

#[derive(Debug, Clone)]
pub struct Block {
    pub stmts: Vec<Stmt>,
    pub span: Span,
}

#[derive(Debug, Clone)]
pub enum Stmt {
    Let {
        name: SpannedName,
        ty: Option<TypeExpr>,
        value: Expr,
        span: Span,
    },
    Return {
        value: Option<Expr>,
        span: Span,
    },
    If {
        cond: Expr,
        then_block: Block,
        else_block: Option<Block>,
        span: Span,
    },
    Block(Block),
    Expr(Expr),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    Unit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Eq,
    Lt,
    Gt,
}

impl BinaryOp {
    /// Binary operators resolve as ordinary calls to these names.
    pub fn function_name(self) -> &'static str {
        match self {
            BinaryOp::Add => "__plus__",
            BinaryOp::Sub => "__minus__",
            BinaryOp::Mul => "__times__",
            BinaryOp::Div => "__divide__",
            BinaryOp::Eq => "__eq__",
            BinaryOp::Lt => "__lt__",
            BinaryOp::Gt => "__gt__",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Expr {
    Literal {
        value: Literal,
        span: Span,
    },
    Ident(SpannedName),
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
        span: Span,
    },
    Binary {
        op: BinaryOp,
        left: Box<Expr>,
        right: Box<Expr>,
        span: Span,
    },
    Tuple {
        items: Vec<Expr>,
        span: Span,
    },
    Field {
        base: Box<Expr>,
        field: SpannedName,
        span: Span,
    },
    Function(Rc<FunctionLiteral>),
}

impl Expr {
    pub fn span(&self) -> &Span {
        match self {
            Expr::Literal { span, .. }
            | Expr::Call { span, .. }
            | Expr::Binary { span, .. }
            | Expr::Tuple { span, .. }
            | Expr::Field { span, .. } => span,
            Expr::Ident(name) => &name.span,
            Expr::Function(literal) => &literal.span,
        }
    }
}

impl Stmt {
    pub fn span(&self) -> &Span {
        match self {
            Stmt::Let { span, .. } | Stmt::Return { span, .. } | Stmt::If { span, .. } => span,
            Stmt::Block(block) => &block.span,
            Stmt::Expr(expr) => expr.span(),
        }
    }

    /// Short text used in "while checking statement" frames.
    pub fn describe(&self) -> String {
        match self {
            Stmt::Let { name, .. } => format!("let {}", name.name),
            Stmt::Return { .. } => "return".to_string(),
            Stmt::If { .. } => "if".to_string(),
            Stmt::Block(_) => "block".to_string(),
            Stmt::Expr(Expr::Call { callee, .. }) => match callee.as_ref() {
                Expr::Ident(name) => format!("{}(...)", name.name),
                _ => "call".to_string(),
            },
            Stmt::Expr(_) => "expression".to_string(),
        }
    }
}

/// Constructors for building trees by hand, used by tests and by front ends
/// that lower their own syntax into this tree.
pub mod build {
    use std::rc::Rc;

    use super::*;

    pub fn name(text: &str) -> SpannedName {
        name_at(text, Span::default())
    }

    pub fn name_at(text: &str, span: Span) -> SpannedName {
        SpannedName {
            name: text.to_string(),
            span,
        }
    }

    pub fn ty(text: &str) -> TypeExpr {
        TypeExpr::Name(name(text))
    }

    pub fn ty_apply(base: &str, args: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::Apply {
            base: Box::new(ty(base)),
            args,
        }
    }

    pub fn ty_func(params: Vec<TypeExpr>, ret: TypeExpr) -> TypeExpr {
        TypeExpr::Func {
            params,
            ret: Box::new(ret),
        }
    }

    pub fn ty_tuple(items: Vec<TypeExpr>) -> TypeExpr {
        TypeExpr::Tuple(items)
    }

    pub fn literal(value: Literal) -> Expr {
        Expr::Literal {
            value,
            span: Span::default(),
        }
    }

    pub fn int(value: i64) -> Expr {
        literal(Literal::Int(value))
    }

    pub fn float(value: f64) -> Expr {
        literal(Literal::Float(value))
    }

    pub fn string(value: &str) -> Expr {
        literal(Literal::Str(value.to_string()))
    }

    pub fn boolean(value: bool) -> Expr {
        literal(Literal::Bool(value))
    }

    pub fn ident(text: &str) -> Expr {
        Expr::Ident(name(text))
    }

    pub fn call(callee: &str, args: Vec<Expr>) -> Expr {
        call_at(callee, args, Span::default())
    }

    pub fn call_at(callee: &str, args: Vec<Expr>, span: Span) -> Expr {
        Expr::Call {
            callee: Box::new(Expr::Ident(name_at(callee, span.clone()))),
            args,
            span,
        }
    }

    pub fn call_expr(callee: Expr, args: Vec<Expr>) -> Expr {
        Expr::Call {
            callee: Box::new(callee),
            args,
            span: Span::default(),
        }
    }

    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary {
            op,
            left: Box::new(left),
            right: Box::new(right),
            span: Span::default(),
        }
    }

    pub fn tuple(items: Vec<Expr>) -> Expr {
        Expr::Tuple {
            items,
            span: Span::default(),
        }
    }

    pub fn field(base: Expr, field: &str) -> Expr {
        Expr::Field {
            base: Box::new(base),
            field: name(field),
            span: Span::default(),
        }
    }

    pub fn lambda(params: Vec<Param>, ret: Option<TypeExpr>, body: Vec<Stmt>) -> Expr {
        Expr::Function(Rc::new(FunctionLiteral {
            params,
            ret,
            body: block(body),
            span: Span::default(),
        }))
    }

    pub fn param(text: &str, ty: TypeExpr) -> Param {
        Param {
            name: name(text),
            ty: Some(ty),
        }
    }

    pub fn untyped(text: &str) -> Param {
        Param {
            name: name(text),
            ty: None,
        }
    }

    pub fn block(stmts: Vec<Stmt>) -> Block {
        Block {
            stmts,
            span: Span::default(),
        }
    }

    pub fn let_(text: &str, value: Expr) -> Stmt {
        Stmt::Let {
            name: name(text),
            ty: None,
            value,
            span: Span::default(),
        }
    }

    pub fn let_typed(text: &str, ty: TypeExpr, value: Expr) -> Stmt {
        Stmt::Let {
            name: name(text),
            ty: Some(ty),
            value,
            span: Span::default(),
        }
    }

    pub fn ret(value: Expr) -> Stmt {
        Stmt::Return {
            value: Some(value),
            span: Span::default(),
        }
    }

    pub fn ret_unit() -> Stmt {
        Stmt::Return {
            value: None,
            span: Span::default(),
        }
    }

    pub fn expr(value: Expr) -> Stmt {
        Stmt::Expr(value)
    }

    pub fn if_(cond: Expr, then_stmts: Vec<Stmt>, else_stmts: Option<Vec<Stmt>>) -> Stmt {
        Stmt::If {
            cond,
            then_block: block(then_stmts),
            else_block: else_stmts.map(block),
            span: Span::default(),
        }
    }

    pub fn function(text: &str) -> FunctionBuilder {
        FunctionBuilder {
            defn: FunctionDefn {
                name: name(text),
                type_params: Vec::new(),
                params: Vec::new(),
                ret: None,
                body: block(Vec::new()),
                span: Span::default(),
            },
        }
    }

    pub struct FunctionBuilder {
        defn: FunctionDefn,
    }

    impl FunctionBuilder {
        pub fn type_param(mut self, text: &str) -> Self {
            self.defn.type_params.push(name(text));
            self
        }

        pub fn param(mut self, text: &str, ty: TypeExpr) -> Self {
            self.defn.params.push(param(text, ty));
            self
        }

        pub fn untyped(mut self, text: &str) -> Self {
            self.defn.params.push(untyped(text));
            self
        }

        pub fn returns(mut self, ty: TypeExpr) -> Self {
            self.defn.ret = Some(ty);
            self
        }

        pub fn body(mut self, stmts: Vec<Stmt>) -> Self {
            self.defn.body = block(stmts);
            self
        }

        pub fn at(mut self, line: usize, column: usize) -> Self {
            let span = Span::point(line, column);
            self.defn.name.span = span.clone();
            self.defn.span = span;
            self
        }

        pub fn build(self) -> ModuleItem {
            ModuleItem::Function(Rc::new(self.defn))
        }
    }

    pub fn structure(
        text: &str,
        type_params: &[&str],
        fields: Vec<(&str, TypeExpr)>,
    ) -> ModuleItem {
        ModuleItem::Struct(Rc::new(StructDecl {
            name: name(text),
            type_params: type_params.iter().map(|p| name(p)).collect(),
            fields: fields
                .into_iter()
                .map(|(field, ty)| FieldDecl {
                    name: name(field),
                    ty,
                })
                .collect(),
            span: Span::default(),
        }))
    }

    pub fn alias(text: &str, params: &[&str], aliased: TypeExpr) -> ModuleItem {
        ModuleItem::TypeAlias(TypeAlias {
            name: name(text),
            params: params.iter().map(|p| name(p)).collect(),
            aliased,
            span: Span::default(),
        })
    }

    pub fn module(text: &str, items: Vec<ModuleItem>) -> Module {
        Module {
            name: name(text),
            global: false,
            items,
        }
    }

    pub fn program(modules: Vec<Module>) -> Program {
        Program { modules }
    }
}
