//! Type promotion rules shared by operators and function overload resolution.

use crate::binder::node::{ConstantNode, ConvertNode, QueryNode};
use crate::parser::{BinaryOperatorKind, UnaryOperatorKind};
use crate::types::{PrimitiveKind, TypeKind, TypeRef};

/// Cost of converting a literal to a type it is not implicitly convertible to.
const LITERAL_NARROWING_COST: u32 = 3;

/// Implicit widening conversions, nearest target first.
fn implicit_targets(from: PrimitiveKind) -> &'static [PrimitiveKind] {
    use PrimitiveKind::{
        Date, DateTimeOffset, Decimal, Double, Int16, Int32, Int64, SByte, Single,
    };
    match from {
        PrimitiveKind::Byte | SByte => &[Int16, Int32, Int64, Single, Double, Decimal],
        Int16 => &[Int32, Int64, Single, Double, Decimal],
        Int32 => &[Int64, Single, Double, Decimal],
        Int64 => &[Single, Double, Decimal],
        Single => &[Double],
        Date => &[DateTimeOffset],
        _ => &[],
    }
}

/// Returns the number of widening steps from `from` to `to`.
#[must_use]
pub fn conversion_distance(from: PrimitiveKind, to: PrimitiveKind) -> Option<u32> {
    if from == to {
        return Some(0);
    }
    implicit_targets(from)
        .iter()
        .position(|k| *k == to)
        .and_then(|i| u32::try_from(i + 1).ok())
}

/// Returns the cost of passing `node` where `target` is expected, or `None`
/// if it cannot be converted. Untyped nodes fit anywhere for free.
#[must_use]
pub fn conversion_cost(node: &QueryNode, target: &TypeRef) -> Option<u32> {
    let Some(source) = node.type_ref() else {
        return Some(0);
    };
    if source.same_type(target) {
        return Some(0);
    }
    if source.is_collection() || target.is_collection() {
        return None;
    }
    let (Some(from), Some(to)) = (source.as_primitive(), target.as_primitive()) else {
        return None;
    };
    if let Some(distance) = conversion_distance(from, to) {
        return Some(distance);
    }
    match node {
        QueryNode::Constant(c) if c.value.convert_to(to).is_some() => Some(LITERAL_NARROWING_COST),
        _ => None,
    }
}

/// Target operand types and result type chosen for a binary operator.
#[derive(Debug, Clone, PartialEq)]
pub struct BinaryPromotion {
    /// Type the left operand converts to, `None` to leave it as is.
    pub left: Option<TypeRef>,
    /// Type the right operand converts to, `None` to leave it as is.
    pub right: Option<TypeRef>,
    /// Result type of the operation.
    pub result: Option<TypeRef>,
}

struct OperatorSignature {
    left: PrimitiveKind,
    right: PrimitiveKind,
    result: PrimitiveKind,
}

const fn sig(left: PrimitiveKind, right: PrimitiveKind, result: PrimitiveKind) -> OperatorSignature {
    OperatorSignature {
        left,
        right,
        result,
    }
}

const NUMERIC: [PrimitiveKind; 5] = [
    PrimitiveKind::Int32,
    PrimitiveKind::Int64,
    PrimitiveKind::Single,
    PrimitiveKind::Double,
    PrimitiveKind::Decimal,
];

fn operator_signatures(kind: BinaryOperatorKind) -> Vec<OperatorSignature> {
    use PrimitiveKind::{Boolean, Date, DateTimeOffset, Duration};
    match kind {
        BinaryOperatorKind::Or | BinaryOperatorKind::And => vec![sig(Boolean, Boolean, Boolean)],
        BinaryOperatorKind::Equal | BinaryOperatorKind::NotEqual => PrimitiveKind::ALL
            .iter()
            .map(|k| sig(*k, *k, Boolean))
            .collect(),
        BinaryOperatorKind::GreaterThan
        | BinaryOperatorKind::GreaterThanOrEqual
        | BinaryOperatorKind::LessThan
        | BinaryOperatorKind::LessThanOrEqual => PrimitiveKind::ALL
            .iter()
            .filter(|k| k.is_orderable())
            .map(|k| sig(*k, *k, Boolean))
            .collect(),
        BinaryOperatorKind::Add => {
            let mut sigs: Vec<_> = NUMERIC.iter().map(|k| sig(*k, *k, *k)).collect();
            sigs.push(sig(DateTimeOffset, Duration, DateTimeOffset));
            sigs.push(sig(Duration, Duration, Duration));
            sigs.push(sig(Date, Duration, Date));
            sigs
        }
        BinaryOperatorKind::Subtract => {
            let mut sigs: Vec<_> = NUMERIC.iter().map(|k| sig(*k, *k, *k)).collect();
            sigs.push(sig(DateTimeOffset, Duration, DateTimeOffset));
            sigs.push(sig(Duration, Duration, Duration));
            sigs.push(sig(DateTimeOffset, DateTimeOffset, Duration));
            sigs.push(sig(Date, Duration, Date));
            sigs.push(sig(Date, Date, Duration));
            sigs
        }
        BinaryOperatorKind::Multiply
        | BinaryOperatorKind::Divide
        | BinaryOperatorKind::Modulo => NUMERIC.iter().map(|k| sig(*k, *k, *k)).collect(),
        BinaryOperatorKind::DivideBy => vec![
            sig(PrimitiveKind::Double, PrimitiveKind::Double, PrimitiveKind::Double),
            sig(PrimitiveKind::Decimal, PrimitiveKind::Decimal, PrimitiveKind::Decimal),
        ],
        BinaryOperatorKind::Has => Vec::new(),
    }
}

fn nullable_of(node: &QueryNode) -> bool {
    node.type_ref().map_or(true, |t| t.nullable)
}

/// Chooses the operand conversions for a binary operator.
///
/// Numeric operands widen to the cheapest common signature; literals may
/// also narrow when their value fits. Returns `None` if no signature
/// accepts both operands.
#[must_use]
pub fn promote_binary_operand_types(
    kind: BinaryOperatorKind,
    left: &QueryNode,
    right: &QueryNode,
) -> Option<BinaryPromotion> {
    let nullable = nullable_of(left) || nullable_of(right);
    let boolean = || Some(TypeRef::boolean(nullable));
    let (lt, rt) = (left.type_ref(), right.type_ref());

    match (lt, rt) {
        (None, None) => {
            return Some(BinaryPromotion {
                left: None,
                right: None,
                result: if kind.is_boolean_result() { boolean() } else { None },
            });
        }
        (Some(l), Some(r)) if l.is_collection() || r.is_collection() => return None,
        _ => {}
    }

    // Enumerations, structured values and null comparisons.
    let known = lt.or(rt)?;
    if !known.is_scalar() || known.is_enum() || kind == BinaryOperatorKind::Has {
        return promote_non_primitive(kind, left, right, nullable);
    }

    let candidates = operator_signatures(kind);
    let mut best: Option<(u32, &OperatorSignature)> = None;
    for candidate in &candidates {
        let lp = TypeRef::primitive(candidate.left, true);
        let rp = TypeRef::primitive(candidate.right, true);
        let (Some(lc), Some(rc)) = (conversion_cost(left, &lp), conversion_cost(right, &rp))
        else {
            continue;
        };
        let cost = lc + rc;
        if best.map_or(true, |(b, _)| cost < b) {
            best = Some((cost, candidate));
        }
    }
    let (_, chosen) = best?;

    let target = |node: &QueryNode, kind: PrimitiveKind| -> Option<TypeRef> {
        match node.type_ref() {
            None if !node.is_null_constant() => None,
            Some(t) if t.as_primitive() == Some(kind) => None,
            _ => Some(TypeRef::primitive(kind, nullable_of(node))),
        }
    };
    let result = if kind.is_boolean_result() {
        boolean()
    } else {
        // A shared type definition survives only if its underlying kind is the result.
        match (lt, rt) {
            (Some(l), Some(r))
                if l.same_type(r)
                    && matches!(&l.kind, TypeKind::TypeDefinition { underlying, .. } if *underlying == chosen.result) =>
            {
                Some(l.with_nullable(nullable))
            }
            _ => Some(TypeRef::primitive(chosen.result, nullable)),
        }
    };
    Some(BinaryPromotion {
        left: target(left, chosen.left),
        right: target(right, chosen.right),
        result,
    })
}

fn promote_non_primitive(
    kind: BinaryOperatorKind,
    left: &QueryNode,
    right: &QueryNode,
    nullable: bool,
) -> Option<BinaryPromotion> {
    let boolean = Some(TypeRef::boolean(nullable));
    match (left.type_ref(), right.type_ref()) {
        (Some(l), Some(r)) => {
            let same = l.same_type(r);
            let comparable = match kind {
                BinaryOperatorKind::Has => l.is_enum() && same,
                k if k.is_equality() => same,
                k if k.is_relational() => same && l.is_enum(),
                _ => false,
            };
            comparable.then_some(BinaryPromotion {
                left: None,
                right: None,
                result: boolean,
            })
        }
        (Some(known), None) | (None, Some(known)) => {
            let untyped_is_null = left.is_null_constant() || right.is_null_constant();
            let allowed = match kind {
                BinaryOperatorKind::Has => known.is_enum(),
                k if k.is_equality() => true,
                k if k.is_relational() => known.is_enum(),
                _ => false,
            };
            if !allowed {
                return None;
            }
            let typed_null = untyped_is_null.then(|| known.with_nullable(true));
            let (l, r) = if left.type_ref().is_none() {
                (typed_null, None)
            } else {
                (None, typed_null)
            };
            Some(BinaryPromotion {
                left: l,
                right: r,
                result: boolean,
            })
        }
        (None, None) => None,
    }
}

/// Returns the result type of a unary operator, `Some(None)` for an
/// untyped operand, or `None` if the operand type is not accepted.
#[must_use]
pub fn promote_unary_operand_type(
    kind: UnaryOperatorKind,
    operand: Option<&TypeRef>,
) -> Option<Option<TypeRef>> {
    let Some(operand) = operand else {
        return Some(match kind {
            UnaryOperatorKind::Not => Some(TypeRef::boolean(true)),
            UnaryOperatorKind::Negate => None,
        });
    };
    let accepted = match (kind, operand.as_primitive()) {
        (UnaryOperatorKind::Not, Some(PrimitiveKind::Boolean)) => true,
        (UnaryOperatorKind::Negate, Some(k)) => {
            (k.is_numeric() && k != PrimitiveKind::Byte) || k == PrimitiveKind::Duration
        }
        _ => false,
    };
    accepted.then(|| Some(operand.clone()))
}

/// Converts `node` to `target`, rewriting literals in place and wrapping
/// everything else in a [`ConvertNode`].
#[must_use]
pub fn convert_to_type_if_needed(node: QueryNode, target: Option<&TypeRef>) -> QueryNode {
    let Some(target) = target else {
        return node;
    };
    if node.type_ref().is_some_and(|t| t.same_type(target)) && !node.is_null_constant() {
        return node;
    }
    match node {
        QueryNode::Constant(constant) => convert_constant(constant, target),
        other => {
            let nullable = other.type_ref().map_or(true, |t| t.nullable);
            QueryNode::Convert(ConvertNode {
                source: Box::new(other),
                type_ref: target.with_nullable(nullable),
            })
        }
    }
}

fn convert_constant(constant: ConstantNode, target: &TypeRef) -> QueryNode {
    if constant.value.is_null() {
        return QueryNode::Constant(ConstantNode {
            type_ref: Some(target.with_nullable(true)),
            ..constant
        });
    }
    let converted = match (&target.kind, target.as_primitive()) {
        (TypeKind::Enum(_), _) => None,
        (_, Some(kind)) => constant.value.convert_to(kind),
        _ => None,
    };
    match converted {
        Some(value) => QueryNode::Constant(ConstantNode {
            value,
            literal_text: constant.literal_text,
            type_ref: Some(target.with_nullable(false)),
        }),
        None => QueryNode::Convert(ConvertNode {
            source: Box::new(QueryNode::Constant(constant)),
            type_ref: target.clone(),
        }),
    }
}
