use crate::document::PathResolution;
use crate::types::{ConditionOperator, ScalarValue};
use serde::{Deserialize, Serialize};

/// Three-valued logic: boolean extended with an explicit "cannot decide"
/// outcome. `Undefined` is not `False` — it marks an edge that cannot be
/// decided at all, and callers must never coerce it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Tri {
    True,
    False,
    Undefined,
}

impl Tri {
    /// Negate a definite value; `Undefined` stays `Undefined`.
    pub fn negate(self) -> Tri {
        match self {
            Tri::True => Tri::False,
            Tri::False => Tri::True,
            Tri::Undefined => Tri::Undefined,
        }
    }

    pub fn is_true(self) -> bool {
        self == Tri::True
    }
}

impl From<bool> for Tri {
    fn from(value: bool) -> Self {
        if value {
            Tri::True
        } else {
            Tri::False
        }
    }
}

/// Evaluate a typed comparison over two resolved operands.
///
/// Any operand that did not resolve to a primitive (composite or
/// unresolved) makes the whole comparison `Undefined`. Among primitives the
/// operators behave asymmetrically, and deliberately so:
///
/// - `Equal` compares only matching types (nil–nil is `True`) and yields
///   `Undefined` across mismatched types.
/// - `GreaterThan`/`LowerThan` are defined for int–int and float–float
///   only; every other pairing is a definite `False`.
/// - `GreaterThanOrEqual`/`LowerThanOrEqual` are the negation of the strict
///   opposite comparison, so they too stay definite for incomparable
///   pairings.
///
/// No lexicographic string ordering is supported.
pub fn evaluate(
    operator: ConditionOperator,
    operand1: &PathResolution,
    operand2: &PathResolution,
) -> Tri {
    let (Some(lhs), Some(rhs)) = (operand1.as_primitive(), operand2.as_primitive()) else {
        return Tri::Undefined;
    };

    match operator {
        ConditionOperator::Equal => equal(lhs, rhs),
        ConditionOperator::NotEqual => equal(lhs, rhs).negate(),
        ConditionOperator::GreaterThan => greater_than(lhs, rhs).into(),
        ConditionOperator::LowerThan => lower_than(lhs, rhs).into(),
        ConditionOperator::GreaterThanOrEqual => (!lower_than(lhs, rhs)).into(),
        ConditionOperator::LowerThanOrEqual => (!greater_than(lhs, rhs)).into(),
    }
}

fn equal(lhs: &ScalarValue, rhs: &ScalarValue) -> Tri {
    use ScalarValue::*;
    match (lhs, rhs) {
        (Bool(a), Bool(b)) => (a == b).into(),
        (Int(a), Int(b)) => (a == b).into(),
        (Float(a), Float(b)) => (a == b).into(),
        (Str(a), Str(b)) => (a == b).into(),
        (Nil, Nil) => Tri::True,
        _ => Tri::Undefined,
    }
}

fn greater_than(lhs: &ScalarValue, rhs: &ScalarValue) -> bool {
    use ScalarValue::*;
    match (lhs, rhs) {
        (Int(a), Int(b)) => a > b,
        (Float(a), Float(b)) => a > b,
        _ => false,
    }
}

fn lower_than(lhs: &ScalarValue, rhs: &ScalarValue) -> bool {
    use ScalarValue::*;
    match (lhs, rhs) {
        (Int(a), Int(b)) => a < b,
        (Float(a), Float(b)) => a < b,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConditionOperator::*;

    fn prim(v: ScalarValue) -> PathResolution {
        PathResolution::Primitive(v)
    }

    fn eval(op: ConditionOperator, a: ScalarValue, b: ScalarValue) -> Tri {
        evaluate(op, &prim(a), &prim(b))
    }

    #[test]
    fn equal_is_reflexive_per_type() {
        use ScalarValue::*;
        for v in [
            Bool(true),
            Int(42),
            Float(2.5),
            Str("abc".into()),
            Nil,
        ] {
            assert_eq!(eval(Equal, v.clone(), v), Tri::True);
        }
    }

    #[test]
    fn equal_mismatched_types_is_undefined_not_false() {
        assert_eq!(
            eval(Equal, ScalarValue::Int(1), ScalarValue::Str("1".into())),
            Tri::Undefined
        );
        assert_eq!(
            eval(Equal, ScalarValue::Int(1), ScalarValue::Float(1.0)),
            Tri::Undefined
        );
        assert_eq!(
            eval(Equal, ScalarValue::Nil, ScalarValue::Int(0)),
            Tri::Undefined
        );
    }

    #[test]
    fn not_equal_propagates_undefined() {
        assert_eq!(
            eval(NotEqual, ScalarValue::Int(1), ScalarValue::Int(2)),
            Tri::True
        );
        assert_eq!(
            eval(NotEqual, ScalarValue::Int(1), ScalarValue::Int(1)),
            Tri::False
        );
        assert_eq!(
            eval(NotEqual, ScalarValue::Int(1), ScalarValue::Str("1".into())),
            Tri::Undefined
        );
    }

    #[test]
    fn strict_ordering_on_matching_numeric_types() {
        assert_eq!(
            eval(GreaterThan, ScalarValue::Int(150), ScalarValue::Int(100)),
            Tri::True
        );
        assert_eq!(
            eval(GreaterThan, ScalarValue::Int(50), ScalarValue::Int(100)),
            Tri::False
        );
        assert_eq!(
            eval(LowerThan, ScalarValue::Float(1.5), ScalarValue::Float(2.0)),
            Tri::True
        );
        assert_eq!(
            eval(GreaterThanOrEqual, ScalarValue::Int(100), ScalarValue::Int(100)),
            Tri::True
        );
        assert_eq!(
            eval(LowerThanOrEqual, ScalarValue::Int(101), ScalarValue::Int(100)),
            Tri::False
        );
    }

    // Characterized behavior: ordering across mismatched types is a
    // definite False, unlike Equal which goes Undefined.
    #[test]
    fn greater_than_mismatched_types_is_false() {
        assert_eq!(
            eval(GreaterThan, ScalarValue::Int(1), ScalarValue::Str("x".into())),
            Tri::False
        );
        assert_eq!(
            eval(GreaterThan, ScalarValue::Int(1), ScalarValue::Float(0.5)),
            Tri::False
        );
        assert_eq!(
            eval(
                LowerThan,
                ScalarValue::Str("a".into()),
                ScalarValue::Str("b".into())
            ),
            Tri::False
        );
    }

    // Characterized behavior: >= and <= are computed as the negation of
    // the strict opposite, so an incomparable pairing comes out definite.
    #[test]
    fn ge_incomparable_is_definite() {
        assert_eq!(
            eval(
                GreaterThanOrEqual,
                ScalarValue::Int(1),
                ScalarValue::Str("x".into())
            ),
            Tri::True
        );
        assert_eq!(
            eval(
                LowerThanOrEqual,
                ScalarValue::Bool(true),
                ScalarValue::Int(1)
            ),
            Tri::True
        );
    }

    #[test]
    fn non_primitive_operands_are_undefined_for_every_operator() {
        let one = prim(ScalarValue::Int(1));
        for op in [
            Equal,
            NotEqual,
            GreaterThan,
            GreaterThanOrEqual,
            LowerThan,
            LowerThanOrEqual,
        ] {
            assert_eq!(evaluate(op, &PathResolution::Unresolved, &one), Tri::Undefined);
            assert_eq!(evaluate(op, &one, &PathResolution::Composite), Tri::Undefined);
        }
    }

    #[test]
    fn negate_keeps_undefined() {
        assert_eq!(Tri::True.negate(), Tri::False);
        assert_eq!(Tri::False.negate(), Tri::True);
        assert_eq!(Tri::Undefined.negate(), Tri::Undefined);
    }
}
