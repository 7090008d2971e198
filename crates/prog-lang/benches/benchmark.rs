use prog_lang::{BoxedValue, Declarations, Engine, Prog, ProgType, Value, VariableScope};

fn main() {
    divan::main();
}

#[divan::bench]
fn compile_expression() -> prog_lang::CompiledExpression {
    let declarations = [("level", ProgType::NUMBER), ("name", ProgType::TEXT)]
        .into_iter()
        .collect::<Declarations>();
    prog_lang::compile(
        "if(@level > 5 and upper(@name) == \"BOB\", round(@level * 1.5, 1), 0)",
        &declarations,
    )
    .unwrap()
}

#[divan::bench(args = [10, 1_000])]
fn execute_compiled(bencher: divan::Bencher, n: i64) {
    let declarations = [("x", ProgType::NUMBER)].into_iter().collect::<Declarations>();
    let expression = prog_lang::compile("(@x + 1) * 2 - @x % 3", &declarations).unwrap();

    bencher.bench(|| {
        (0..n)
            .map(|x| {
                let mut scope = VariableScope::new().with("x", x);
                expression.execute(&mut scope).unwrap()
            })
            .count()
    });
}

#[divan::bench(args = [500])]
fn extension_pipeline(n: usize) -> BoxedValue {
    let items = Value::collection((0..n).map(Value::from));
    Engine::default()
        .eval(
            "@items.where(i, @i % 2 == 0).sum(i, @i * @i)",
            [("items", BoxedValue::new(ProgType::Collection(prog_lang::Scalar::Number), items))],
        )
        .unwrap()
}

#[divan::bench(args = [15])]
fn run_fibonacci(n: i64) -> BoxedValue {
    let mut engine = Engine::default();
    engine.define_prog(
        Prog::new("fib", ProgType::NUMBER, "return if(@n < 2, @n, @fib(@n - 1) + @fib(@n - 2))")
            .with_parameter("n", ProgType::NUMBER),
    );
    engine.compile_progs();
    engine.run_prog("fib", vec![Value::from(n)]).unwrap()
}
