//! Operator table: text, opcode, precedence and category of every operator.

use hashbrown::HashMap;
use lazy_static::lazy_static;

use crate::bytecode::{BinaryOpcode, UnaryOpcode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OpCategory {
    Arithmetic,
    Comparison,
    Logical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryOp {
    Neg,
    Not,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BinaryOperatorInfo {
    pub op: BinaryOp,
    /// `None` for the short-circuiting operators, which compile to jumps.
    pub opcode: Option<BinaryOpcode>,
    pub precedence: u8,
    pub category: OpCategory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnaryOperatorInfo {
    pub op: UnaryOp,
    pub opcode: UnaryOpcode,
    pub category: OpCategory,
}

lazy_static! {
    static ref BINARY_OPERATORS: HashMap<&'static str, BinaryOperatorInfo> = {
        use BinaryOp::*;
        use OpCategory::*;

        let entries = [
            ("||", Or, None, 1, Logical),
            ("&&", And, None, 2, Logical),
            ("==", Eq, Some(BinaryOpcode::Eq), 3, Comparison),
            ("!=", Ne, Some(BinaryOpcode::Ne), 3, Comparison),
            ("<", Lt, Some(BinaryOpcode::Lt), 4, Comparison),
            ("<=", Le, Some(BinaryOpcode::Le), 4, Comparison),
            (">", Gt, Some(BinaryOpcode::Gt), 4, Comparison),
            (">=", Ge, Some(BinaryOpcode::Ge), 4, Comparison),
            ("+", Add, Some(BinaryOpcode::Add), 5, Arithmetic),
            ("-", Sub, Some(BinaryOpcode::Sub), 5, Arithmetic),
            ("*", Mul, Some(BinaryOpcode::Mul), 6, Arithmetic),
            ("/", Div, Some(BinaryOpcode::Div), 6, Arithmetic),
            ("%", Mod, Some(BinaryOpcode::Mod), 6, Arithmetic),
        ];
        entries
            .into_iter()
            .map(|(text, op, opcode, precedence, category)| {
                (
                    text,
                    BinaryOperatorInfo {
                        op,
                        opcode,
                        precedence,
                        category,
                    },
                )
            })
            .collect()
    };
    static ref UNARY_OPERATORS: HashMap<&'static str, UnaryOperatorInfo> = {
        let mut map = HashMap::new();
        map.insert(
            "-",
            UnaryOperatorInfo {
                op: UnaryOp::Neg,
                opcode: UnaryOpcode::Neg,
                category: OpCategory::Arithmetic,
            },
        );
        map.insert(
            "!",
            UnaryOperatorInfo {
                op: UnaryOp::Not,
                opcode: UnaryOpcode::Not,
                category: OpCategory::Logical,
            },
        );
        map
    };
}

impl BinaryOp {
    pub fn from_text(text: &str) -> Option<BinaryOp> {
        BINARY_OPERATORS.get(text).map(|info| info.op)
    }

    pub fn text(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    pub fn info(self) -> &'static BinaryOperatorInfo {
        // Every variant's text is a key of the table.
        &BINARY_OPERATORS[self.text()]
    }

    pub fn opcode(self) -> Option<BinaryOpcode> {
        self.info().opcode
    }

    pub fn precedence(self) -> u8 {
        self.info().precedence
    }

    pub fn category(self) -> OpCategory {
        self.info().category
    }
}

impl UnaryOp {
    /// Binds tighter than every binary operator.
    pub const PRECEDENCE: u8 = 7;

    pub fn from_text(text: &str) -> Option<UnaryOp> {
        UNARY_OPERATORS.get(text).map(|info| info.op)
    }

    pub fn text(self) -> &'static str {
        match self {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }

    pub fn info(self) -> &'static UnaryOperatorInfo {
        &UNARY_OPERATORS[self.text()]
    }

    pub fn opcode(self) -> UnaryOpcode {
        self.info().opcode
    }

    pub fn category(self) -> OpCategory {
        self.info().category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_round_trips_through_table() {
        for text in ["+", "-", "*", "/", "%", "==", "!=", "<", "<=", ">", ">=", "&&", "||"] {
            let op = BinaryOp::from_text(text).unwrap();
            assert_eq!(op.text(), text);
        }
        assert_eq!(UnaryOp::from_text("!"), Some(UnaryOp::Not));
        assert_eq!(BinaryOp::from_text("**"), None);
    }

    #[test]
    fn multiplication_binds_tighter_than_addition() {
        assert!(BinaryOp::Mul.precedence() > BinaryOp::Add.precedence());
        assert!(BinaryOp::Add.precedence() > BinaryOp::Lt.precedence());
        assert!(BinaryOp::And.precedence() > BinaryOp::Or.precedence());
    }

    #[test]
    fn logical_operators_have_no_opcode() {
        assert_eq!(BinaryOp::And.opcode(), None);
        assert_eq!(BinaryOp::Or.category(), OpCategory::Logical);
        assert_eq!(BinaryOp::Mod.opcode(), Some(BinaryOpcode::Mod));
        assert_eq!(UnaryOp::Neg.opcode(), UnaryOpcode::Neg);
    }
}
