// # Linearized Relational-Algebra Expressions
//
// An expression is an ordered list of tagged tokens in prefix form: an
// operator token comes first, its payload (attribute list or condition)
// follows immediately, and its operand subtrees come after that. Base
// relations are operand tokens.
//
// `π[a;b] σ[`a` > 10] (employee)` linearizes as:
//
// ```text
// Operator('p') AttributeList("a;b") Operator('s') Condition("`a` > 10") Operand("employee")
// ```

use std::fmt;

/// Relational-algebra operators recognized by the rewriter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperatorKind {
    Projection,
    Selection,
    NaturalJoin,
    ThetaJoin,
    Union,
    Intersection,
    Except,
    Rename,
}

impl OperatorKind {
    /// Resolves a single-character operator code.
    pub fn from_code(code: char) -> Option<Self> {
        match code {
            'p' => Some(OperatorKind::Projection),
            's' => Some(OperatorKind::Selection),
            'n' => Some(OperatorKind::NaturalJoin),
            't' => Some(OperatorKind::ThetaJoin),
            'u' => Some(OperatorKind::Union),
            'i' => Some(OperatorKind::Intersection),
            'e' => Some(OperatorKind::Except),
            'r' => Some(OperatorKind::Rename),
            _ => None,
        }
    }

    /// The single-character code stored in linearized expressions.
    pub fn code(&self) -> char {
        match self {
            OperatorKind::Projection => 'p',
            OperatorKind::Selection => 's',
            OperatorKind::NaturalJoin => 'n',
            OperatorKind::ThetaJoin => 't',
            OperatorKind::Union => 'u',
            OperatorKind::Intersection => 'i',
            OperatorKind::Except => 'e',
            OperatorKind::Rename => 'r',
        }
    }

    /// Display symbol for rendering.
    pub fn symbol(&self) -> &'static str {
        match self {
            OperatorKind::Projection => "π",
            OperatorKind::Selection => "σ",
            OperatorKind::NaturalJoin => "⋈",
            OperatorKind::ThetaJoin => "⋈θ",
            OperatorKind::Union => "∪",
            OperatorKind::Intersection => "∩",
            OperatorKind::Except => "−",
            OperatorKind::Rename => "ρ",
        }
    }
}

/// One element of a linearized expression.
///
/// Operator codes are kept raw so an expression carrying an unknown code
/// survives a rewrite pass unchanged instead of failing to represent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// Single-character RA operator code.
    Operator(char),
    /// Base relation (table name).
    Operand(String),
    /// Delimited attribute names, payload of a projection.
    AttributeList(String),
    /// Predicate text, payload of a selection or theta-join.
    Condition(String),
}

/// A linearized relational-algebra expression.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Expression {
    tokens: Vec<Token>,
}

impl Expression {
    pub fn new() -> Self {
        Self { tokens: Vec::new() }
    }

    pub fn from_tokens(tokens: Vec<Token>) -> Self {
        Self { tokens }
    }

    pub fn tokens(&self) -> &[Token] {
        &self.tokens
    }

    pub fn into_tokens(self) -> Vec<Token> {
        self.tokens
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    // -- Builder helpers ----------------------------------------------------

    pub fn operator(mut self, kind: OperatorKind) -> Self {
        self.tokens.push(Token::Operator(kind.code()));
        self
    }

    /// Appends `π` with its attribute list.
    pub fn projection(mut self, attributes: &str) -> Self {
        self.tokens.push(Token::Operator(OperatorKind::Projection.code()));
        self.tokens.push(Token::AttributeList(attributes.to_string()));
        self
    }

    /// Appends `σ` with its predicate.
    pub fn selection(mut self, condition: &str) -> Self {
        self.tokens.push(Token::Operator(OperatorKind::Selection.code()));
        self.tokens.push(Token::Condition(condition.to_string()));
        self
    }

    /// Appends `⋈θ` with its predicate.
    pub fn theta_join(mut self, condition: &str) -> Self {
        self.tokens.push(Token::Operator(OperatorKind::ThetaJoin.code()));
        self.tokens.push(Token::Condition(condition.to_string()));
        self
    }

    pub fn natural_join(self) -> Self {
        self.operator(OperatorKind::NaturalJoin)
    }

    pub fn union(self) -> Self {
        self.operator(OperatorKind::Union)
    }

    pub fn intersection(self) -> Self {
        self.operator(OperatorKind::Intersection)
    }

    pub fn except(self) -> Self {
        self.operator(OperatorKind::Except)
    }

    /// Appends a base relation.
    pub fn relation(mut self, name: &str) -> Self {
        self.tokens.push(Token::Operand(name.to_string()));
        self
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, token) in self.tokens.iter().enumerate() {
            if i > 0 {
                match token {
                    // payloads bind tightly to their operator
                    Token::AttributeList(_) | Token::Condition(_) => {}
                    _ => write!(f, " ")?,
                }
            }
            match token {
                Token::Operator(code) => match OperatorKind::from_code(*code) {
                    Some(kind) => write!(f, "{}", kind.symbol())?,
                    None => write!(f, "{}", code)?,
                },
                Token::Operand(name) => write!(f, "({})", name)?,
                Token::AttributeList(list) => write!(f, "[{}]", list)?,
                Token::Condition(condition) => write!(f, "[{}]", condition)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operator_code_round_trip() {
        for kind in [
            OperatorKind::Projection,
            OperatorKind::Selection,
            OperatorKind::NaturalJoin,
            OperatorKind::ThetaJoin,
            OperatorKind::Union,
            OperatorKind::Intersection,
            OperatorKind::Except,
            OperatorKind::Rename,
        ] {
            assert_eq!(OperatorKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(OperatorKind::from_code('z'), None);
    }

    #[test]
    fn test_builder_produces_prefix_order() {
        let expr = Expression::new().projection("a;b").relation("employee");
        assert_eq!(
            expr.tokens(),
            &[
                Token::Operator('p'),
                Token::AttributeList("a;b".into()),
                Token::Operand("employee".into()),
            ]
        );
    }

    #[test]
    fn test_display_rendering() {
        let expr = Expression::new()
            .projection("a;b")
            .selection("`a` > 10")
            .relation("employee");
        assert_eq!(expr.to_string(), "π[a;b] σ[`a` > 10] (employee)");
    }

    #[test]
    fn test_display_unknown_operator_code() {
        let expr = Expression::from_tokens(vec![
            Token::Operator('z'),
            Token::Operand("r".into()),
        ]);
        assert_eq!(expr.to_string(), "z (r)");
    }
}
