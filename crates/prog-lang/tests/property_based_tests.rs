//! Property-based tests for expression parsing and evaluation.
use prog_lang::{Declarations, Number, Value};
use prog_test::strategies::{
    arb_arithmetic_expr, arb_precedence_expr, arb_unbalanced_expr, arb_variable_name, arb_wrapped_expr,
};
use proptest::prelude::*;

fn evaluate(code: &str) -> Result<Value, TestCaseError> {
    prog_lang::compile(code, &Declarations::new())
        .and_then(|expression| expression.execute(&mut prog_lang::VariableScope::new()))
        .map_err(|e| TestCaseError::fail(format!("{code}: {}", e.message())))
}

proptest! {
    #[test]
    fn arithmetic_matches_reference((code, expected) in arb_arithmetic_expr()) {
        prop_assert_eq!(evaluate(&code)?, Value::Number(Number::new(expected)));
    }

    #[test]
    fn operators_follow_precedence((code, expected) in arb_precedence_expr()) {
        prop_assert_eq!(evaluate(&code)?, Value::Number(Number::new(expected)));
    }

    #[test]
    fn redundant_parens_are_transparent((plain, wrapped) in arb_wrapped_expr()) {
        prop_assert_eq!(evaluate(&wrapped)?, evaluate(&plain)?);
    }

    #[test]
    fn unbalanced_input_is_rejected(code in arb_unbalanced_expr()) {
        let declarations = [("list", prog_lang::ProgType::Collection(prog_lang::Scalar::Number))]
            .into_iter()
            .collect::<Declarations>();
        let message = prog_lang::compile(&code, &declarations).err().map(|e| e.message());
        prop_assert_eq!(message.as_deref(), Some("Found unbalanced brackets or string literals"));
    }

    #[test]
    fn declared_variables_resolve(name in arb_variable_name(), n in -1000i64..1000) {
        let declarations = [(name.as_str(), prog_lang::ProgType::NUMBER)].into_iter().collect::<Declarations>();
        let expression = prog_lang::compile(&format!("@{name} + 1"), &declarations)
            .map_err(|e| TestCaseError::fail(e.message()))?;
        let mut scope = prog_lang::VariableScope::new().with(&name, n);

        prop_assert_eq!(expression.execute(&mut scope).ok(), Some(Value::from(n + 1)));
    }

    #[test]
    fn arbitrary_text_never_panics(code in "[ -~]{0,40}") {
        let _ = prog_lang::compile(&code, &Declarations::new());
    }
}
