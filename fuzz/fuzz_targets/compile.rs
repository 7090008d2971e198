#![no_main]

use arbitrary::Arbitrary;
use itertools::Itertools;
use libfuzzer_sys::fuzz_target;
use prog_lang::{BoxedValue, Engine, Prog, ProgType, Scalar, Value};

#[derive(Debug, Clone, Arbitrary)]
enum Fragment {
    Number(i32),
    Text(String),
    Variable(bool),
    Binary(Box<Fragment>, u8, Box<Fragment>),
    Call(String, Vec<Fragment>),
    Extension(Box<Fragment>, String, Box<Fragment>),
    Index(Box<Fragment>),
    Raw(String),
}

const OPERATORS: [&str; 14] = [
    "+", "-", "*", "/", "%", "^", "==", "!=", "<", ">=", "and", "or", "xor", "=",
];

impl Fragment {
    fn to_code(&self) -> String {
        match self {
            Fragment::Number(n) => n.to_string(),
            Fragment::Text(s) => format!("{s:?}"),
            Fragment::Variable(true) => "@n".to_string(),
            Fragment::Variable(false) => "@items".to_string(),
            Fragment::Binary(lhs, op, rhs) => format!(
                "({} {} {})",
                lhs.to_code(),
                OPERATORS[*op as usize % OPERATORS.len()],
                rhs.to_code()
            ),
            Fragment::Call(name, args) => format!("{name}({})", args.iter().map(Fragment::to_code).join(", ")),
            Fragment::Extension(source, name, inner) => {
                format!("{}.{name}(i, {})", source.to_code(), inner.to_code())
            }
            Fragment::Index(key) => format!("@items[{}]", key.to_code()),
            Fragment::Raw(code) => code.clone(),
        }
    }
}

#[derive(Debug, Clone, Arbitrary)]
struct Context {
    raw_expression: Option<String>,
    generated: Option<Fragment>,
    program_body: Option<Vec<Fragment>>,
}

fuzz_target!(|context: Context| {
    let mut engine = Engine::default();

    if let Some(body) = &context.program_body {
        let body = body.iter().map(|f| format!("return {}", f.to_code())).join("\n");
        engine.define_prog(Prog::new("fuzz", ProgType::NUMBER, body).with_parameter("n", ProgType::NUMBER));
        if engine.compile_progs().is_empty() {
            let _ = engine.run_prog("fuzz", vec![Value::from(3i64)]);
        }
    }

    let code = match (&context.raw_expression, &context.generated) {
        (Some(raw), _) => raw.clone(),
        (_, Some(generated)) => generated.to_code(),
        _ => String::new(),
    };

    let variables = [
        ("n", BoxedValue::new(ProgType::NUMBER, Value::from(2i64))),
        (
            "items",
            BoxedValue::new(
                ProgType::Collection(Scalar::Number),
                Value::collection([Value::from(1i64), Value::from(2i64)]),
            ),
        ),
    ];
    let _ = engine.eval(&code, variables);
});
