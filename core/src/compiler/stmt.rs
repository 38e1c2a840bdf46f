use core::mem;

use crate::bytecode::{BytecodeChunk, Instruction, Reg};
use crate::diagnostics::InternalError;
use crate::syntax::{Expr, ModuleDecl, Stmt, StmtKind, TryStmt, VarDecl};
use crate::unit::Storage;

use super::{Compiler, ends_in_jump, pop_slots};

impl Compiler<'_> {
    pub(super) fn stmts(&mut self, stmts: &[Stmt], chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        for stmt in stmts {
            self.stmt(stmt, chunk)?;
        }
        Ok(())
    }

    /// Generates `stmts` as a block and pops the locals it declared.
    /// Returns how many locals that was.
    pub(super) fn scoped(&mut self, stmts: &[Stmt], chunk: &mut BytecodeChunk) -> Result<u32, InternalError> {
        let mark = self.frame.next_slot;
        self.stmts(stmts, chunk)?;
        Ok(self.close_scope(mark, stmts, chunk))
    }

    fn close_scope(&mut self, mark: u32, stmts: &[Stmt], chunk: &mut BytecodeChunk) -> u32 {
        let declared = self.frame.release(mark);
        if !ends_in_jump(stmts) {
            pop_slots(chunk, declared);
        }
        declared
    }

    fn stmt(&mut self, stmt: &Stmt, chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        chunk.trace(stmt.span);
        match &stmt.kind {
            StmtKind::Module(decl) => self.module(decl, chunk)?,
            StmtKind::Var(decl) => self.var(decl, chunk)?,
            StmtKind::Expr(expr) => self.expr(expr, chunk)?,
            StmtKind::If {
                cond,
                then_branch,
                else_branch,
            } => self.if_else(cond, then_branch, else_branch.as_deref(), chunk)?,
            StmtKind::While { cond, body } => {
                let (start, end) = (self.label(), self.label());
                chunk.bind(start);
                self.expr(cond, chunk)?;
                chunk.emit(Instruction::JumpIfFalse {
                    cond: Reg::R0,
                    target: end,
                });
                self.scoped(body, chunk)?;
                chunk.emit(Instruction::Jump { target: start }).bind(end);
            }
            StmtKind::Block(body) => {
                self.scoped(body, chunk)?;
            }
            StmtKind::Return(value) => {
                self.value_or_null(value.as_ref(), chunk)?;
                chunk.emit(Instruction::Return);
            }
            StmtKind::Throw(Some(value)) => {
                self.expr(value, chunk)?;
                chunk.emit(Instruction::Throw { src: Some(Reg::R0) });
            }
            StmtKind::Throw(None) => {
                chunk.emit(Instruction::Throw { src: None });
            }
            StmtKind::Try(decl) => self.try_catch(decl, chunk)?,
            // Declarations only; bodies are generated from the function table.
            StmtKind::Function(_)
            | StmtKind::Struct(_)
            | StmtKind::Import { .. }
            | StmtKind::Using { .. } => {}
        }
        Ok(())
    }

    fn module(&mut self, decl: &ModuleDecl, chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        let module = decl.module.ok_or_else(|| {
            InternalError::MalformedTree(format!("module `{}` was not declared", decl.name))
        })?;
        let path = self.unit.modules.canonical_path(module);
        let outer = mem::replace(&mut self.module_path, path);
        let result = self.stmts(&decl.body, chunk);
        self.module_path = outer;
        result
    }

    fn var(&mut self, decl: &VarDecl, chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        let ident = decl.ident.ok_or_else(|| InternalError::UnresolvedIdentifier {
            name: decl.name.clone(),
        })?;
        self.value_or_null(decl.init.as_ref(), chunk)?;
        match self.unit.idents.get(ident).storage {
            Storage::Static(index) => {
                chunk.emit(Instruction::StoreStatic {
                    index,
                    src: Reg::R0,
                });
            }
            Storage::Local => {
                chunk.emit(Instruction::Push { src: Reg::R0 });
                self.frame.declare(ident);
            }
            storage => {
                return Err(InternalError::MalformedTree(format!(
                    "variable `{}` stored as {:?}",
                    decl.name, storage
                )));
            }
        }
        if decl.exported {
            let name = self.export_name(&decl.name);
            let name = self.string_constant(&name);
            chunk.emit(Instruction::Export { name, src: Reg::R0 });
        }
        Ok(())
    }

    fn value_or_null(&mut self, value: Option<&Expr>, chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        match value {
            Some(value) => self.expr(value, chunk),
            None => {
                chunk.emit(Instruction::LoadNull { dst: Reg::R0 });
                Ok(())
            }
        }
    }

    fn if_else(
        &mut self,
        cond: &Expr,
        then_branch: &[Stmt],
        else_branch: Option<&[Stmt]>,
        chunk: &mut BytecodeChunk,
    ) -> Result<(), InternalError> {
        let end = self.label();
        self.expr(cond, chunk)?;
        match else_branch {
            None => {
                chunk.emit(Instruction::JumpIfFalse {
                    cond: Reg::R0,
                    target: end,
                });
                self.scoped(then_branch, chunk)?;
            }
            Some(else_branch) => {
                let otherwise = self.label();
                chunk.emit(Instruction::JumpIfFalse {
                    cond: Reg::R0,
                    target: otherwise,
                });
                self.scoped(then_branch, chunk)?;
                chunk.emit(Instruction::Jump { target: end }).bind(otherwise);
                self.scoped(else_branch, chunk)?;
            }
        }
        chunk.bind(end);
        Ok(())
    }

    /// ```text
    ///     try.begin catch, <body locals>
    ///     <body>
    ///     try.end
    ///     jump end
    /// catch:
    ///     pop <body locals>
    ///     <handler>
    /// end:
    /// ```
    ///
    /// Unwinding restores the stack to the scope's entry height plus its
    /// locals, so the catch block always pops the same number of slots.
    fn try_catch(&mut self, decl: &TryStmt, chunk: &mut BytecodeChunk) -> Result<(), InternalError> {
        let (catch, end) = (self.label(), self.label());
        let mut body = BytecodeChunk::new();
        let locals = self.scoped(&decl.body, &mut body)?;

        chunk
            .emit(Instruction::TryBegin { catch, locals })
            .append(body)
            .emit(Instruction::TryEnd)
            .emit(Instruction::Jump { target: end })
            .bind(catch);
        pop_slots(chunk, locals);

        // The message is in R0 when the catch block starts.
        let mark = self.frame.next_slot;
        if let Some(ident) = decl.catch_ident {
            chunk.emit(Instruction::Push { src: Reg::R0 });
            self.frame.declare(ident);
        }
        self.stmts(&decl.handler, chunk)?;
        self.close_scope(mark, &decl.handler, chunk);
        chunk.bind(end);
        Ok(())
    }
}
