//! Human-readable IR dumps for debugging and the CLI's `print-ir` command.

use std::fmt::Write;

use super::expr::{BinOp, Expr, Literal, UnaryOp};
use super::member::MethodBody;
use super::program::Program;
use super::stmt::{Block, Stmt};
use super::ty::TypeId;

pub struct Printer<'a> {
    program: &'a Program,
    out: String,
    indent: usize,
}

impl<'a> Printer<'a> {
    pub fn new(program: &'a Program) -> Self {
        Self {
            program,
            out: String::new(),
            indent: 0,
        }
    }

    pub fn print_program(mut self) -> String {
        for &ty in &self.program.declared {
            if self.program.types[ty].synthetic {
                continue;
            }
            self.print_type(ty);
            self.out.push('\n');
        }
        self.out
    }

    pub fn print_type(&mut self, ty: TypeId) {
        let program = self.program;
        let decl = &program.types[ty];
        let kind = if decl.is_interface() {
            "interface"
        } else if decl.is_array() {
            "array"
        } else {
            "class"
        };
        self.line(&format!("{kind} {}", decl.name));
        if let Some(qid) = program.query_ids.get(ty) {
            self.indent += 1;
            self.line(&format!("queryId {qid}"));
            self.indent -= 1;
        }
        self.indent += 1;
        for &field in &decl.fields {
            let f = &program.fields[field];
            let stat = if f.is_static { "static " } else { "" };
            self.line(&format!(
                "field {stat}{}: {}",
                f.name,
                program.display_type(f.ty)
            ));
        }
        for &method in &decl.methods {
            self.print_method_header(method);
            if let MethodBody::Stmts(body) = &program.methods[method].body {
                self.indent += 1;
                self.print_block(&body.block);
                self.indent -= 1;
            }
        }
        self.indent -= 1;
    }

    fn print_method_header(&mut self, method: super::member::MethodId) {
        let program = self.program;
        let m = &program.methods[method];
        let stat = if m.is_static { "static " } else { "" };
        let params: Vec<String> = m
            .params
            .iter()
            .map(|p| format!("{}: {}", p.name, program.display_type(p.ty)))
            .collect();
        self.line(&format!(
            "method {stat}{}({}) -> {}",
            m.name,
            params.join(", "),
            program.display_type(m.return_ty)
        ));
    }

    fn print_block(&mut self, block: &Block) {
        for stmt in &block.stmts {
            self.print_stmt(stmt);
        }
    }

    fn print_stmt(&mut self, stmt: &Stmt) {
        match stmt {
            Stmt::Block(block) => {
                self.line("{");
                self.indent += 1;
                self.print_block(block);
                self.indent -= 1;
                self.line("}");
            }
            Stmt::Expr(e) => {
                let text = self.expr(e);
                self.line(&format!("{text};"));
            }
            Stmt::If { cond, then, els } => {
                let text = self.expr(cond);
                self.line(&format!("if ({text})"));
                self.indent += 1;
                self.print_stmt(then);
                self.indent -= 1;
                if let Some(els) = els {
                    self.line("else");
                    self.indent += 1;
                    self.print_stmt(els);
                    self.indent -= 1;
                }
            }
            Stmt::While { cond, body } => {
                let text = self.expr(cond);
                self.line(&format!("while ({text})"));
                self.indent += 1;
                self.print_stmt(body);
                self.indent -= 1;
            }
            Stmt::DoWhile { body, cond } => {
                self.line("do");
                self.indent += 1;
                self.print_stmt(body);
                self.indent -= 1;
                let text = self.expr(cond);
                self.line(&format!("while ({text});"));
            }
            Stmt::For {
                init,
                cond,
                update,
                body,
            } => {
                let cond_text = cond.as_ref().map(|c| self.expr(c)).unwrap_or_default();
                let update_text: Vec<String> = update.iter().map(|e| self.expr(e)).collect();
                self.line(&format!(
                    "for (<{} decls>; {cond_text}; {})",
                    init.len(),
                    update_text.join(", ")
                ));
                self.indent += 1;
                for s in init {
                    self.print_stmt(s);
                }
                self.print_stmt(body);
                self.indent -= 1;
            }
            Stmt::Switch { selector, body } => {
                let text = self.expr(selector);
                self.line(&format!("switch ({text})"));
                self.indent += 1;
                self.print_block(body);
                self.indent -= 1;
            }
            Stmt::Case(Some(e)) => {
                let text = self.expr(e);
                self.line(&format!("case {text}:"));
            }
            Stmt::Case(None) => self.line("default:"),
            Stmt::Try {
                block,
                catches,
                finally_block,
            } => {
                self.line("try {");
                self.indent += 1;
                self.print_block(block);
                self.indent -= 1;
                for catch in catches {
                    let header = format!(
                        "}} catch ({}: {}) {{",
                        self.program.locals[catch.local].name,
                        self.program.types[catch.ty].name
                    );
                    self.line(&header);
                    self.indent += 1;
                    self.print_block(&catch.block);
                    self.indent -= 1;
                }
                if let Some(finally_block) = finally_block {
                    self.line("} finally {");
                    self.indent += 1;
                    self.print_block(finally_block);
                    self.indent -= 1;
                }
                self.line("}");
            }
            Stmt::Return(Some(e)) => {
                let text = self.expr(e);
                self.line(&format!("return {text};"));
            }
            Stmt::Return(None) => self.line("return;"),
            Stmt::Throw(e) => {
                let text = self.expr(e);
                self.line(&format!("throw {text};"));
            }
            Stmt::Break(label) => match label {
                Some(l) => self.line(&format!("break {l};")),
                None => self.line("break;"),
            },
            Stmt::Continue(label) => match label {
                Some(l) => self.line(&format!("continue {l};")),
                None => self.line("continue;"),
            },
            Stmt::Labeled { label, body } => {
                self.line(&format!("{label}:"));
                self.indent += 1;
                self.print_stmt(body);
                self.indent -= 1;
            }
            Stmt::Assert { test, message } => {
                let test = self.expr(test);
                match message {
                    Some(m) => {
                        let m = self.expr(m);
                        self.line(&format!("assert {test} : {m};"));
                    }
                    None => self.line(&format!("assert {test};")),
                }
            }
            Stmt::LocalDecl { local, init } => {
                let decl = &self.program.locals[*local];
                let header = format!("let {}: {}", decl.name, self.program.display_type(decl.ty));
                match init {
                    Some(init) => {
                        let init = self.expr(init);
                        self.line(&format!("{header} = {init};"));
                    }
                    None => self.line(&format!("{header};")),
                }
            }
            Stmt::Empty => self.line(";"),
        }
    }

    pub fn expr(&self, expr: &Expr) -> String {
        match expr {
            Expr::Literal(lit) => literal(lit, self.program),
            Expr::Binary { op, lhs, rhs, .. } => {
                format!("({} {} {})", self.expr(lhs), bin_op(*op), self.expr(rhs))
            }
            Expr::Prefix { op, arg } => format!("{}{}", unary_op(*op), self.expr(arg)),
            Expr::Postfix { op, arg } => format!("{}{}", self.expr(arg), unary_op(*op)),
            Expr::Cast { ty, expr } => {
                format!("({}) {}", self.program.display_type(*ty), self.expr(expr))
            }
            Expr::InstanceOf { ty, expr } => format!(
                "({} instanceof {})",
                self.expr(expr),
                self.program.types[*ty].name
            ),
            Expr::Field { field, instance } => {
                let f = &self.program.fields[*field];
                match instance {
                    Some(instance) => format!("{}.{}", self.expr(instance), f.name),
                    None => format!("{}.{}", self.program.types[f.owner].name, f.name),
                }
            }
            Expr::ArrayRef { array, index, .. } => {
                format!("{}[{}]", self.expr(array), self.expr(index))
            }
            Expr::Local(local) => self.program.locals[*local].name.clone(),
            Expr::Param { method, index } => self.program.methods[*method].params
                [*index as usize]
                .name
                .clone(),
            Expr::This { .. } => "this".into(),
            Expr::Call {
                target,
                instance,
                args,
                ..
            } => {
                let m = &self.program.methods[*target];
                let args: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                let recv = match instance {
                    Some(instance) => self.expr(instance),
                    None => self.program.types[m.owner].name.clone(),
                };
                format!("{recv}.{}({})", m.name, args.join(", "))
            }
            Expr::New { ty, args, .. } => {
                let args: Vec<String> = args.iter().map(|a| self.expr(a)).collect();
                format!("new {}({})", self.program.types[*ty].name, args.join(", "))
            }
            Expr::NewArray {
                elem, dims, init, ..
            } => {
                let mut s = format!("new {}", self.program.display_type(*elem));
                for dim in dims {
                    match dim {
                        Some(d) => {
                            let _ = write!(s, "[{}]", self.expr(d));
                        }
                        None => s.push_str("[]"),
                    }
                }
                if let Some(init) = init {
                    let items: Vec<String> = init.iter().map(|e| self.expr(e)).collect();
                    let _ = write!(s, " {{{}}}", items.join(", "));
                }
                s
            }
            Expr::Conditional {
                cond, then, els, ..
            } => format!(
                "({} ? {} : {})",
                self.expr(cond),
                self.expr(then),
                self.expr(els)
            ),
            Expr::Multi(exprs) => {
                let items: Vec<String> = exprs.iter().map(|e| self.expr(e)).collect();
                format!("({})", items.join(", "))
            }
        }
    }

    fn line(&mut self, text: &str) {
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }
}

fn literal(lit: &Literal, program: &Program) -> String {
    match lit {
        Literal::Bool(b) => b.to_string(),
        Literal::Byte(v) => v.to_string(),
        Literal::Char(c) => match char::from_u32(*c as u32) {
            Some(c) if !c.is_control() => format!("'{c}'"),
            _ => format!("'\\u{c:04x}'"),
        },
        Literal::Short(v) => v.to_string(),
        Literal::Int(v) => v.to_string(),
        Literal::Long(v) => format!("{v}L"),
        Literal::Float(v) => format!("{v}f"),
        Literal::Double(v) => format!("{v}d"),
        Literal::String(s) => format!("{s:?}"),
        Literal::Null => "null".into(),
        Literal::Class(ty) => format!("{}.class", program.display_type(*ty)),
    }
}

fn bin_op(op: BinOp) -> &'static str {
    match op {
        BinOp::Add => "+",
        BinOp::Sub => "-",
        BinOp::Mul => "*",
        BinOp::Div => "/",
        BinOp::Rem => "%",
        BinOp::Shl => "<<",
        BinOp::Shr => ">>",
        BinOp::Shru => ">>>",
        BinOp::BitAnd => "&",
        BinOp::BitOr => "|",
        BinOp::BitXor => "^",
        BinOp::And => "&&",
        BinOp::Or => "||",
        BinOp::Eq => "==",
        BinOp::Ne => "!=",
        BinOp::Lt => "<",
        BinOp::Le => "<=",
        BinOp::Gt => ">",
        BinOp::Ge => ">=",
        BinOp::Assign => "=",
        BinOp::AddAssign => "+=",
        BinOp::SubAssign => "-=",
        BinOp::MulAssign => "*=",
        BinOp::DivAssign => "/=",
        BinOp::RemAssign => "%=",
        BinOp::ShlAssign => "<<=",
        BinOp::ShrAssign => ">>=",
        BinOp::ShruAssign => ">>>=",
        BinOp::BitAndAssign => "&=",
        BinOp::BitOrAssign => "|=",
        BinOp::BitXorAssign => "^=",
    }
}

fn unary_op(op: UnaryOp) -> &'static str {
    match op {
        UnaryOp::Neg => "-",
        UnaryOp::Not => "!",
        UnaryOp::BitNot => "~",
        UnaryOp::Inc => "++",
        UnaryOp::Dec => "--",
    }
}
