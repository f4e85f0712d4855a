use serde::{Deserialize, Serialize};

use super::expr::Expr;
use super::member::LocalId;
use super::ty::TypeId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Block {
    pub stmts: Vec<Stmt>,
}

impl Block {
    pub fn new(stmts: Vec<Stmt>) -> Self {
        Self { stmts }
    }

    pub fn is_empty(&self) -> bool {
        self.stmts.is_empty()
    }
}

/// One catch clause. Multi-catch clauses are split into one `Catch` per
/// named type during lowering; the catch collapser later folds them back
/// into a single dispatching handler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catch {
    pub local: LocalId,
    pub ty: TypeId,
    pub block: Block,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Stmt {
    Block(Block),
    Expr(Expr),
    If {
        cond: Expr,
        then: Box<Stmt>,
        els: Option<Box<Stmt>>,
    },
    While {
        cond: Expr,
        body: Box<Stmt>,
    },
    DoWhile {
        body: Box<Stmt>,
        cond: Expr,
    },
    For {
        init: Vec<Stmt>,
        cond: Option<Expr>,
        update: Vec<Expr>,
        body: Box<Stmt>,
    },
    Switch {
        selector: Expr,
        /// Flat body: `Case` markers interleaved with the statements that
        /// follow them, fall-through preserved.
        body: Block,
    },
    /// A case label inside a switch body; `None` is the default label.
    Case(Option<Expr>),
    Try {
        block: Block,
        catches: Vec<Catch>,
        finally_block: Option<Block>,
    },
    Return(Option<Expr>),
    Throw(Expr),
    Break(Option<String>),
    Continue(Option<String>),
    Labeled {
        label: String,
        body: Box<Stmt>,
    },
    Assert {
        test: Expr,
        message: Option<Expr>,
    },
    LocalDecl {
        local: LocalId,
        init: Option<Expr>,
    },
    Empty,
}

impl Stmt {
    /// Whether control can leave this statement other than by falling off
    /// the end: any break/continue/return/throw anywhere inside, without
    /// matching it to its target. Used to gate loop unrolling.
    pub fn has_control_exit(&self) -> bool {
        match self {
            Stmt::Break(_) | Stmt::Continue(_) | Stmt::Return(_) | Stmt::Throw(_) => true,
            Stmt::Block(b) | Stmt::Switch { body: b, .. } => {
                b.stmts.iter().any(Stmt::has_control_exit)
            }
            Stmt::If { then, els, .. } => {
                then.has_control_exit()
                    || els.as_ref().map(|e| e.has_control_exit()).unwrap_or(false)
            }
            Stmt::While { body, .. }
            | Stmt::DoWhile { body, .. }
            | Stmt::Labeled { body, .. } => body.has_control_exit(),
            Stmt::For { init, body, .. } => {
                init.iter().any(Stmt::has_control_exit) || body.has_control_exit()
            }
            Stmt::Try {
                block,
                catches,
                finally_block,
            } => {
                block.stmts.iter().any(Stmt::has_control_exit)
                    || catches
                        .iter()
                        .any(|c| c.block.stmts.iter().any(Stmt::has_control_exit))
                    || finally_block
                        .iter()
                        .any(|b| b.stmts.iter().any(Stmt::has_control_exit))
            }
            Stmt::Expr(_)
            | Stmt::Case(_)
            | Stmt::Assert { .. }
            | Stmt::LocalDecl { .. }
            | Stmt::Empty => false,
        }
    }

    /// Whether this statement declares locals directly in its own scope,
    /// which blocks flattening the enclosing block.
    pub fn declares_locals(&self) -> bool {
        matches!(self, Stmt::LocalDecl { .. })
    }
}
