// Rule-driven projection rewriter.
//
// Applies projection-centric equivalence rules to a linearized RA
// expression in a single forward pass. Each rule consults the suffix of
// the already-emitted output (the enclosing projection, if any) and, for
// the join and set-operation rules, the operand tokens that follow the
// operator in the input:
//
// - **Cascade**: a projection subsumed by a narrower enclosing projection
//   is dropped.
// - **Selection**: a projection covering a selection's attributes is
//   pushed below it.
// - **Set operations**: an enclosing projection is distributed onto both
//   operands of a union or intersection.
// - **Theta-join**: an enclosing projection is split by schema across the
//   join's operands, widened with the join attributes when the condition
//   reaches outside it.
//
// The rewriter is best-effort and total: malformed tokens pass through
// with a debug log, schema-lookup failures leave the affected operator
// untouched, and the output of a pass is a fixed point of the rules.

use std::sync::Arc;

use tracing::debug;

use crate::catalog::SchemaProvider;
use crate::Config;

use super::attrs;
use super::expression::{Expression, OperatorKind, Token};

/// Applies projection equivalence rules to linearized expressions.
pub struct ProjectionRewriter {
    schema: Arc<dyn SchemaProvider>,
    delimiter: char,
    escape: char,
}

impl ProjectionRewriter {
    /// Creates a rewriter with the default `;` delimiter and backtick
    /// escape.
    pub fn new(schema: Arc<dyn SchemaProvider>) -> Self {
        Self {
            schema,
            delimiter: ';',
            escape: '`',
        }
    }

    /// Creates a rewriter honoring the engine configuration.
    pub fn with_config(schema: Arc<dyn SchemaProvider>, config: &Config) -> Self {
        Self {
            schema,
            delimiter: config.attribute_delimiter,
            escape: config.attribute_escape,
        }
    }

    /// Rewrites `expression`, returning an equivalent one.
    pub fn rewrite(&self, expression: &Expression) -> Expression {
        let input = expression.tokens();
        let mut output: Vec<Token> = Vec::with_capacity(input.len());
        let mut i = 0;
        while i < input.len() {
            match &input[i] {
                Token::Operator(code) => {
                    i = match OperatorKind::from_code(*code) {
                        Some(OperatorKind::Projection) => self.on_projection(input, i, &mut output),
                        Some(OperatorKind::Selection) => self.on_selection(input, i, &mut output),
                        Some(OperatorKind::Union) | Some(OperatorKind::Intersection) => {
                            self.on_set_op(*code, input, i, &mut output)
                        }
                        Some(OperatorKind::ThetaJoin) => self.on_theta_join(input, i, &mut output),
                        Some(_) => {
                            output.push(input[i].clone());
                            i + 1
                        }
                        None => {
                            debug!(%code, "unknown operator code in expression; passing through");
                            output.push(input[i].clone());
                            i + 1
                        }
                    };
                }
                token => {
                    output.push(token.clone());
                    i += 1;
                }
            }
        }
        Expression::from_tokens(output)
    }

    /// Cascade of projections: `π_L'(π_L(e)) = π_L'(e)` when `L' ⊆ L`.
    ///
    /// The enclosing projection was emitted first, so the current one is
    /// the inner of the pair; it is redundant whenever the enclosing list
    /// is a subset of it.
    fn on_projection(&self, input: &[Token], i: usize, output: &mut Vec<Token>) -> usize {
        let Some(Token::AttributeList(list)) = input.get(i + 1) else {
            output.push(input[i].clone());
            return i + 1;
        };
        if let Some(enclosing) = trailing_projection(output) {
            let outer = attrs::tokenize(&enclosing, self.delimiter);
            let inner = attrs::tokenize(list, self.delimiter);
            if attrs::is_subset(&outer, &inner) {
                debug!(dropped = %list, kept = %enclosing, "projection cascade");
                return i + 2;
            }
        }
        output.push(input[i].clone());
        output.push(input[i + 1].clone());
        i + 2
    }

    /// Projection pushed below a selection: `π_L(σ_C(e)) = σ_C(π_L(e))`
    /// when every attribute of `C` lies in `L`.
    fn on_selection(&self, input: &[Token], i: usize, output: &mut Vec<Token>) -> usize {
        let Some(Token::Condition(condition)) = input.get(i + 1) else {
            output.push(input[i].clone());
            return i + 1;
        };
        if let Some(list) = trailing_projection(output) {
            let referenced = attrs::condition_attrs(condition, self.escape);
            let projected = attrs::tokenize(&list, self.delimiter);
            if attrs::is_subset(&referenced, &projected) {
                let at = output.len() - 2;
                output.insert(at, Token::Operator(OperatorKind::Selection.code()));
                output.insert(at + 1, Token::Condition(condition.clone()));
                debug!(condition = %condition, "projection pushed below selection");
                return i + 2;
            }
        }
        output.push(input[i].clone());
        output.push(input[i + 1].clone());
        i + 2
    }

    /// Projection distributed over a set operation:
    /// `π_L(e1 ∪ e2) = π_L(e1) ∪ π_L(e2)`.
    ///
    /// Applies only when both operands are plain relations directly
    /// following the operator; the distributed copies make the outer
    /// projection redundant, so it is dropped.
    fn on_set_op(&self, code: char, input: &[Token], i: usize, output: &mut Vec<Token>) -> usize {
        let plain_operands = matches!(
            (input.get(i + 1), input.get(i + 2)),
            (Some(Token::Operand(_)), Some(Token::Operand(_)))
        );
        if plain_operands {
            if let Some(list) = trailing_projection(output) {
                output.truncate(output.len() - 2);
                output.push(Token::Operator(code));
                for operand in &input[i + 1..i + 3] {
                    output.push(Token::Operator(OperatorKind::Projection.code()));
                    output.push(Token::AttributeList(list.clone()));
                    output.push(operand.clone());
                }
                debug!(attributes = %list, "projection distributed over set operation");
                return i + 3;
            }
        }
        output.push(Token::Operator(code));
        i + 1
    }

    /// Projection split over a theta-join.
    ///
    /// With an enclosing `π_L` and plain relation operands, partitions
    /// `L` by schema into per-side lists. When the join condition only
    /// mentions attributes of `L` the outer projection is dropped
    /// entirely; otherwise each side is widened with the join attributes
    /// it owns and the outer projection stays.
    fn on_theta_join(&self, input: &[Token], i: usize, output: &mut Vec<Token>) -> usize {
        let Some(Token::Condition(condition)) = input.get(i + 1) else {
            output.push(input[i].clone());
            return i + 1;
        };

        let enclosing = trailing_projection(output);
        let operands = match (input.get(i + 2), input.get(i + 3)) {
            (Some(Token::Operand(left)), Some(Token::Operand(right))) => {
                Some((left.clone(), right.clone()))
            }
            _ => None,
        };

        let (Some(list), Some((left, right))) = (enclosing, operands) else {
            output.push(input[i].clone());
            output.push(input[i + 1].clone());
            return i + 2;
        };

        let (left_schema, right_schema) = match (
            self.schema.attributes(&left),
            self.schema.attributes(&right),
        ) {
            (Ok(l), Ok(r)) => (l, r),
            _ => {
                debug!(%left, %right, "schema lookup failed; theta-join left unchanged");
                output.push(input[i].clone());
                output.push(input[i + 1].clone());
                return i + 2;
            }
        };

        let wanted = attrs::tokenize(&list, self.delimiter);
        let referenced = attrs::condition_attrs(condition, self.escape);
        let mut left_list = attrs::filter_to_schema(&wanted, &left_schema);
        let mut right_list = attrs::filter_to_schema(&wanted, &right_schema);

        if attrs::is_subset(&referenced, &wanted) {
            // the split projections already carry every joined attribute
            output.truncate(output.len() - 2);
            debug!(attributes = %list, "projection split over theta-join");
        } else {
            left_list.extend(attrs::filter_to_schema(&referenced, &left_schema));
            left_list = attrs::dedup(left_list);
            right_list.extend(attrs::filter_to_schema(&referenced, &right_schema));
            right_list = attrs::dedup(right_list);
            debug!(
                attributes = %list,
                "projection split over theta-join, join attributes retained"
            );
        }

        output.push(input[i].clone());
        output.push(input[i + 1].clone());
        for (side_list, name) in [(left_list, left), (right_list, right)] {
            if !side_list.is_empty() {
                output.push(Token::Operator(OperatorKind::Projection.code()));
                output.push(Token::AttributeList(attrs::join(&side_list, self.delimiter)));
            }
            output.push(Token::Operand(name));
        }
        i + 4
    }
}

impl std::fmt::Debug for ProjectionRewriter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectionRewriter")
            .field("delimiter", &self.delimiter)
            .field("escape", &self.escape)
            .finish()
    }
}

/// The attribute list of the projection the output currently ends with.
fn trailing_projection(output: &[Token]) -> Option<String> {
    match output {
        [.., Token::Operator(code), Token::AttributeList(list)]
            if *code == OperatorKind::Projection.code() =>
        {
            Some(list.clone())
        }
        _ => None,
    }
}
