// AST (Abstract Syntax Tree) definitions for the teaching language

use crate::memory::value::Value;
use rustc_hash::FxHashMap;
use std::fmt;
use std::rc::Rc;

/// Unique identifier for AST nodes, assigned at parse time.
///
/// Execution contexts are keyed by this id inside each stack frame, so the same
/// node reached at different recursion depths keeps independent state.
pub type NodeId = usize;

/// An immutable, cheaply shared list of instructions (function body or branch).
pub type Block = Rc<[Instr]>;

/// Type tags attached to declarations, cells and evaluation results
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeTag {
    I32,
    Usize,
    Bool,
    Str,
    Unit,
    /// Raw heap address word (the `ptr` field of a Vec)
    Ptr,
    /// Any other scalar annotation, kept verbatim (`u8`, `i64`, ...)
    Named(String),
    /// `&T` / `&mut T`
    Ref(Box<TypeTag>),
    /// `*const T` / `*mut T`
    Raw(Box<TypeTag>),
    /// `[T; N]`
    Array(Box<TypeTag>, usize),
    Vec(Box<TypeTag>),
    Boxed(Box<TypeTag>),
    /// Result of `vec![..]` whose heap buffer has not been allocated yet
    VecLiteral,
    /// Result of `Box::new(..)` whose heap cell has not been allocated yet
    BoxLiteral,
}

impl TypeTag {
    /// Parse a type annotation. Unknown names are kept as [`TypeTag::Named`].
    pub fn parse(text: &str) -> TypeTag {
        let text = text.trim();

        if let Some(rest) = text.strip_prefix('&') {
            let rest = rest.trim_start();
            let rest = rest.strip_prefix("mut ").unwrap_or(rest);
            return TypeTag::Ref(Box::new(TypeTag::parse(rest)));
        }

        if let Some(rest) = text.strip_prefix('*') {
            let rest = rest.trim_start();
            let rest = rest
                .strip_prefix("const ")
                .or_else(|| rest.strip_prefix("mut "))
                .unwrap_or(rest);
            return TypeTag::Raw(Box::new(TypeTag::parse(rest)));
        }

        if text.starts_with('[') && text.ends_with(']') {
            let inner = &text[1..text.len() - 1];
            if let Some((elem, count)) = inner.rsplit_once(';') {
                if let Ok(n) = count.trim().parse::<usize>() {
                    return TypeTag::Array(Box::new(TypeTag::parse(elem)), n);
                }
            }
            return TypeTag::Named(text.to_string());
        }

        if text == "Vec" {
            return TypeTag::Vec(Box::new(TypeTag::I32));
        }
        if let Some(inner) = generic_argument(text, "Vec") {
            return TypeTag::Vec(Box::new(TypeTag::parse(inner)));
        }
        if let Some(inner) = generic_argument(text, "Box") {
            return TypeTag::Boxed(Box::new(TypeTag::parse(inner)));
        }

        match text {
            "i32" => TypeTag::I32,
            "usize" => TypeTag::Usize,
            "bool" => TypeTag::Bool,
            "str" | "String" => TypeTag::Str,
            "()" | "" => TypeTag::Unit,
            other => TypeTag::Named(other.to_string()),
        }
    }

    /// Whether a cell of this type holds an address
    pub fn is_pointer(&self) -> bool {
        matches!(
            self,
            TypeTag::Ref(_) | TypeTag::Raw(_) | TypeTag::Boxed(_) | TypeTag::Ptr
        )
    }

    pub fn is_vec(&self) -> bool {
        matches!(self, TypeTag::Vec(_))
    }

    /// True for `&Vec<T>` and `*const Vec<T>`
    pub fn points_to_vec(&self) -> bool {
        match self {
            TypeTag::Ref(inner) | TypeTag::Raw(inner) => inner.is_vec(),
            _ => false,
        }
    }

    pub fn array_len(&self) -> Option<usize> {
        match self {
            TypeTag::Array(_, n) => Some(*n),
            _ => None,
        }
    }

    /// Number of stack slots a binding of this type occupies
    pub fn slot_count(&self) -> usize {
        match self {
            TypeTag::Vec(_) | TypeTag::VecLiteral => 3,
            TypeTag::Array(_, n) => (*n).max(1),
            _ => 1,
        }
    }
}

/// Extract `T` from `Name<T>`
fn generic_argument<'a>(text: &'a str, name: &str) -> Option<&'a str> {
    let rest = text.strip_prefix(name)?.trim_start();
    let inner = rest.strip_prefix('<')?.strip_suffix('>')?;
    Some(inner)
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeTag::I32 => write!(f, "i32"),
            TypeTag::Usize => write!(f, "usize"),
            TypeTag::Bool => write!(f, "bool"),
            TypeTag::Str => write!(f, "str"),
            TypeTag::Unit => write!(f, "()"),
            TypeTag::Ptr => write!(f, "ptr"),
            TypeTag::Named(name) => write!(f, "{}", name),
            TypeTag::Ref(inner) => write!(f, "&{}", inner),
            TypeTag::Raw(inner) => write!(f, "*{}", inner),
            TypeTag::Array(inner, n) => write!(f, "[{}; {}]", inner, n),
            TypeTag::Vec(inner) => write!(f, "Vec<{}>", inner),
            TypeTag::Boxed(inner) => write!(f, "Box<{}>", inner),
            TypeTag::VecLiteral => write!(f, "vec!"),
            TypeTag::BoxLiteral => write!(f, "Box::new"),
        }
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    // Arithmetic
    Add,
    Sub,
    Mul,
    Div,
    // Comparison
    Eq,
    Ne,
    Lt,
    Gt,
    Le,
    Ge,
    // Logical
    And,
    Or,
}

impl BinOp {
    pub fn symbol(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Gt => ">",
            BinOp::Le => "<=",
            BinOp::Ge => ">=",
            BinOp::And => "&&",
            BinOp::Or => "||",
        }
    }

    pub fn from_symbol(symbol: &str) -> Option<BinOp> {
        Some(match symbol {
            "+" => BinOp::Add,
            "-" => BinOp::Sub,
            "*" => BinOp::Mul,
            "/" => BinOp::Div,
            "==" => BinOp::Eq,
            "!=" => BinOp::Ne,
            "<" => BinOp::Lt,
            ">" => BinOp::Gt,
            "<=" => BinOp::Le,
            ">=" => BinOp::Ge,
            "&&" => BinOp::And,
            "||" => BinOp::Or,
            _ => return None,
        })
    }

    /// Binding strength, higher binds tighter
    fn precedence(self) -> u8 {
        match self {
            BinOp::Or => 1,
            BinOp::And => 2,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge => 3,
            BinOp::Add | BinOp::Sub => 4,
            BinOp::Mul | BinOp::Div => 5,
        }
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnOp {
    Neg,
    Not,
}

/// Named metadata words of a Vec, stored as `[cap, len, ptr]` in ascending addresses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VecField {
    Ptr,
    Len,
    Cap,
}

impl VecField {
    /// Offset of this word from the metadata base address
    pub fn offset(self) -> usize {
        match self {
            VecField::Cap => 0,
            VecField::Len => 1,
            VecField::Ptr => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VecField::Ptr => "ptr",
            VecField::Len => "len",
            VecField::Cap => "cap",
        }
    }

    pub fn from_name(name: &str) -> Option<VecField> {
        match name {
            "ptr" => Some(VecField::Ptr),
            "len" => Some(VecField::Len),
            "cap" => Some(VecField::Cap),
            _ => None,
        }
    }
}

/// Expression node
#[derive(Debug, Clone, PartialEq)]
pub struct Expr {
    pub id: NodeId,
    pub kind: ExprKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExprKind {
    Literal {
        value: Value,
        ty: TypeTag,
    },
    Variable(String),
    ArrayAccess {
        array: Box<Expr>,
        index: Box<Expr>,
    },
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Unary {
        op: UnOp,
        operand: Box<Expr>,
    },
    FunctionCall {
        name: String,
        args: Vec<Expr>,
    },
    Dereference {
        inner: Box<Expr>,
        levels: usize,
    },
    Reference(String),
    ArrayLiteral(Vec<Expr>),
    VecMacro(Vec<Expr>),
    BoxNew(Box<Expr>),
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<Expr>,
    },
    RandInt {
        min: Box<Expr>,
        max: Box<Expr>,
    },
    Println {
        format: String,
        args: Vec<Expr>,
        newline: bool,
    },
}

impl Expr {
    /// Direct sub-expressions, in evaluation order
    pub fn children(&self) -> Vec<&Expr> {
        match &self.kind {
            ExprKind::Literal { .. } | ExprKind::Variable(_) | ExprKind::Reference(_) => {
                Vec::new()
            }
            ExprKind::ArrayAccess { array, index } => vec![array.as_ref(), index.as_ref()],
            ExprKind::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            ExprKind::Unary { operand, .. } => vec![operand.as_ref()],
            ExprKind::FunctionCall { args, .. }
            | ExprKind::ArrayLiteral(args)
            | ExprKind::VecMacro(args)
            | ExprKind::Println { args, .. } => args.iter().collect(),
            ExprKind::Dereference { inner, .. } | ExprKind::BoxNew(inner) => vec![inner.as_ref()],
            ExprKind::MethodCall { object, args, .. } => {
                let mut children: Vec<&Expr> = vec![object.as_ref()];
                children.extend(args.iter());
                children
            }
            ExprKind::RandInt { min, max } => vec![min.as_ref(), max.as_ref()],
        }
    }

    /// Visit this node and every node below it
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Expr)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }
}

/// Assignment target
#[derive(Debug, Clone, PartialEq)]
pub enum LValue {
    Variable(String),
    Dereference { inner: Expr, levels: usize },
    ArrayIndex { array: Expr, index: Expr },
    Field { object: Expr, field: VecField },
}

impl LValue {
    pub fn expressions(&self) -> Vec<&Expr> {
        match self {
            LValue::Variable(_) => Vec::new(),
            LValue::Dereference { inner, .. } => vec![inner],
            LValue::ArrayIndex { array, index } => vec![array, index],
            LValue::Field { object, .. } => vec![object],
        }
    }
}

/// Instruction (statement) node
#[derive(Debug, Clone, PartialEq)]
pub struct Instr {
    pub id: NodeId,
    pub kind: InstrKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InstrKind {
    Nop(String),
    LetBinding {
        name: String,
        ty: Option<TypeTag>,
        /// Type known at parse time for an unannotated binding (used for frame sizing)
        inferred: Option<TypeTag>,
        init: Option<Expr>,
    },
    Assignment {
        target: LValue,
        value: Expr,
    },
    CompoundAssignment {
        target: LValue,
        op: BinOp,
        value: Expr,
    },
    Expression(Expr),
    IfElse {
        condition: Expr,
        then_body: Block,
        else_body: Block,
    },
    While {
        condition: Expr,
        body: Block,
    },
    Return(Option<Expr>),
    Drop {
        name: String,
        is_vec: bool,
    },
}

impl Instr {
    /// Expressions evaluated by this instruction itself, nested blocks excluded
    pub fn expressions(&self) -> Vec<&Expr> {
        match &self.kind {
            InstrKind::Nop(_) | InstrKind::Drop { .. } => Vec::new(),
            InstrKind::LetBinding { init, .. } => init.iter().collect(),
            InstrKind::Assignment { target, value }
            | InstrKind::CompoundAssignment { target, value, .. } => {
                let mut exprs = vec![value];
                exprs.extend(target.expressions());
                exprs
            }
            InstrKind::Expression(expr) => vec![expr],
            InstrKind::IfElse { condition, .. } | InstrKind::While { condition, .. } => {
                vec![condition]
            }
            InstrKind::Return(expr) => expr.iter().collect(),
        }
    }

    /// Nested instruction blocks owned by this instruction
    pub fn blocks(&self) -> Vec<&Block> {
        match &self.kind {
            InstrKind::IfElse {
                then_body,
                else_body,
                ..
            } => vec![then_body, else_body],
            InstrKind::While { body, .. } => vec![body],
            _ => Vec::new(),
        }
    }

    /// Ids of this instruction and every node below it, nested blocks included
    pub fn subtree_ids(&self) -> Vec<NodeId> {
        let mut ids = vec![self.id];
        for expr in self.expressions() {
            expr.walk(&mut |e| ids.push(e.id));
        }
        for block in self.blocks() {
            for instr in block.iter() {
                ids.extend(instr.subtree_ids());
            }
        }
        ids
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, InstrKind::Return(_))
    }
}

/// Function parameter
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: Option<TypeTag>,
}

/// Function definition
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDef {
    pub name: String,
    pub params: Vec<Param>,
    pub return_type: Option<TypeTag>,
    pub body: Block,
}

/// A parsed program: function name → definition, plus declaration order
#[derive(Debug, Clone, Default)]
pub struct Program {
    pub functions: FxHashMap<String, FunctionDef>,
    pub order: Vec<String>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, def: FunctionDef) {
        if !self.functions.contains_key(&def.name) {
            self.order.push(def.name.clone());
        }
        self.functions.insert(def.name.clone(), def);
    }

    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(name)
    }

    /// Functions in declaration order
    pub fn iter(&self) -> impl Iterator<Item = &FunctionDef> {
        self.order.iter().filter_map(|name| self.functions.get(name))
    }

    pub fn len(&self) -> usize {
        self.functions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

// ========== Descriptions ==========

fn write_list(f: &mut fmt::Formatter<'_>, items: &[Expr]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{}", item)?;
    }
    Ok(())
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ExprKind::Literal { value, .. } => match value {
                Value::Str(s) => write!(f, "{:?}", s),
                other => write!(f, "{}", other),
            },
            ExprKind::Variable(name) => write!(f, "{}", name),
            ExprKind::ArrayAccess { array, index } => write!(f, "{}[{}]", array, index),
            ExprKind::BinaryOp { op, left, right } => {
                write_operand(f, left, *op, false)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, *op, true)
            }
            ExprKind::Unary { op, operand } => {
                let symbol = match op {
                    UnOp::Neg => "-",
                    UnOp::Not => "!",
                };
                if matches!(operand.kind, ExprKind::BinaryOp { .. }) {
                    write!(f, "{}({})", symbol, operand)
                } else {
                    write!(f, "{}{}", symbol, operand)
                }
            }
            ExprKind::FunctionCall { name, args } => {
                write!(f, "{}(", name)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::Dereference { inner, levels } => {
                write!(f, "{}{}", "*".repeat(*levels), inner)
            }
            ExprKind::Reference(name) => write!(f, "&{}", name),
            ExprKind::ArrayLiteral(elements) => {
                write!(f, "[")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
            ExprKind::VecMacro(elements) => {
                write!(f, "vec![")?;
                write_list(f, elements)?;
                write!(f, "]")
            }
            ExprKind::BoxNew(inner) => write!(f, "Box::new({})", inner),
            ExprKind::MethodCall {
                object,
                method,
                args,
            } => {
                write!(f, "{}.{}(", object, method)?;
                write_list(f, args)?;
                write!(f, ")")
            }
            ExprKind::RandInt { min, max } => write!(f, "rand_int({}, {})", min, max),
            ExprKind::Println {
                format,
                args,
                newline,
            } => {
                let name = if *newline { "println!" } else { "print!" };
                write!(f, "{}({:?}", name, format)?;
                for arg in args {
                    write!(f, ", {}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Parenthesize a nested binary operand when it binds looser than its parent
fn write_operand(f: &mut fmt::Formatter<'_>, operand: &Expr, parent: BinOp, right: bool) -> fmt::Result {
    if let ExprKind::BinaryOp { op, .. } = &operand.kind {
        let child = op.precedence();
        let outer = parent.precedence();
        if child < outer || (right && child == outer) {
            return write!(f, "({})", operand);
        }
    }
    write!(f, "{}", operand)
}

impl fmt::Display for LValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LValue::Variable(name) => write!(f, "{}", name),
            LValue::Dereference { inner, levels } => write!(f, "{}{}", "*".repeat(*levels), inner),
            LValue::ArrayIndex { array, index } => match array.kind {
                ExprKind::Dereference { .. } => write!(f, "({})[{}]", array, index),
                _ => write!(f, "{}[{}]", array, index),
            },
            LValue::Field { object, field } => write!(f, "{}.{}", object, field.name()),
        }
    }
}

impl fmt::Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            InstrKind::Nop(comment) => write!(f, "// {}", comment),
            InstrKind::LetBinding { name, ty, init, .. } => {
                write!(f, "let {}", name)?;
                if let Some(ty) = ty {
                    write!(f, ": {}", ty)?;
                }
                if let Some(init) = init {
                    write!(f, " = {}", init)?;
                }
                write!(f, ";")
            }
            InstrKind::Assignment { target, value } => write!(f, "{} = {};", target, value),
            InstrKind::CompoundAssignment { target, op, value } => {
                write!(f, "{} {}= {};", target, op.symbol(), value)
            }
            InstrKind::Expression(expr) => write!(f, "{};", expr),
            InstrKind::IfElse { condition, .. } => write!(f, "if {} {{", condition),
            InstrKind::While { condition, .. } => write!(f, "while {} {{", condition),
            InstrKind::Return(Some(expr)) => write!(f, "return {};", expr),
            InstrKind::Return(None) => write!(f, "return;"),
            InstrKind::Drop { name, is_vec } => {
                write!(f, "drop({});", name)?;
                if *is_vec {
                    write!(f, " // Vec")?;
                }
                Ok(())
            }
        }
    }
}

impl fmt::Display for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, param) in self.params.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match &param.ty {
                Some(ty) => write!(f, "{}: {}", param.name, ty)?,
                None => write!(f, "{}", param.name)?,
            }
        }
        write!(f, ")")?;
        if let Some(ret) = &self.return_type {
            write!(f, " -> {}", ret)?;
        }
        write!(f, " {{")
    }
}
