use assert_cmd::cargo;
use prog_test::create_file;
use rstest::rstest;
use scopeguard::defer;

const PROGS: &str = r#"
[options]
max_call_depth = 40

[[prog]]
name = "fib"
returns = "number"
parameters = ["number n"]
body = """
// naive recursion
return if(@n < 2, @n, @fib(@n - 1) + @fib(@n - 2))
"""

[[prog]]
name = "greet"
returns = "text"
parameters = ["text name", "number times"]
body = "return upper(@name) + \"!\" + @times"

[[prog]]
name = "total"
returns = "number"
parameters = ["number collection xs"]
body = "return @xs.sum(x, @x)"
"#;

#[rstest]
#[case::arithmetic(vec!["eval", "2 + 3 * 4"], "14\n")]
#[case::variables(
    vec!["eval", "@level > 5 and @name == \"BOB\"", "--var", "level:number=7", "--var", "name:text=bob"],
    "true\n"
)]
#[case::collection_variable(
    vec!["eval", "@xs.where(x, @x > 1).Count", "--var", "xs:number collection=collection(1, 2, 3)"],
    "2\n"
)]
#[case::show_type(vec!["eval", "-t", "1d + 2h"], "1d 2h (TimeSpan)\n")]
#[case::rounding(vec!["eval", "round(2.567, 2)"], "2.57\n")]
fn test_eval(#[case] args: Vec<&str>, #[case] expected: &str) {
    cargo::cargo_bin_cmd!("prog")
        .args(args)
        .assert()
        .success()
        .stdout(expected.to_string());
}

#[rstest]
#[case::compile_error(vec!["eval", "1 + true"])]
#[case::runtime_error(vec!["eval", "1 / 0"])]
#[case::unbalanced(vec!["eval", "(1 + 2"])]
#[case::bad_variable(vec!["eval", "@x", "--var", "x=1"])]
#[case::variable_type_mismatch(vec!["eval", "@x", "--var", "x:number=\"one\""])]
fn test_eval_failures(#[case] args: Vec<&str>) {
    cargo::cargo_bin_cmd!("prog").args(args).assert().failure();
}

#[test]
fn test_run_program() {
    let path = create_file("prog_run_test_run_program.toml", PROGS);
    defer! {
        let _ = std::fs::remove_file(&path);
    }

    cargo::cargo_bin_cmd!("prog")
        .arg("run")
        .arg(&path)
        .args(["fib", "10"])
        .assert()
        .success()
        .stdout("55\n");

    cargo::cargo_bin_cmd!("prog")
        .arg("run")
        .arg(&path)
        .args(["greet", "ann", "2"])
        .assert()
        .success()
        .stdout("ANN!2\n");

    cargo::cargo_bin_cmd!("prog")
        .arg("run")
        .arg(&path)
        .args(["total", "collection(1, 2, 3.5)"])
        .assert()
        .success()
        .stdout("6.5\n");
}

#[rstest]
#[case::unknown_program("unknown_program", vec!["missing"])]
#[case::wrong_arity("wrong_arity", vec!["fib"])]
#[case::wrong_argument_type("wrong_argument_type", vec!["fib", "\"ten\""])]
fn test_run_failures(#[case] case: &str, #[case] args: Vec<&str>) {
    let path = create_file(&format!("prog_run_test_run_failures_{case}.toml"), PROGS);
    defer! {
        let _ = std::fs::remove_file(&path);
    }

    cargo::cargo_bin_cmd!("prog")
        .arg("run")
        .arg(&path)
        .args(args)
        .assert()
        .failure();
}

#[test]
fn test_eval_with_programs() {
    let path = create_file("prog_run_test_eval_with_programs.toml", PROGS);
    defer! {
        let _ = std::fs::remove_file(&path);
    }

    cargo::cargo_bin_cmd!("prog")
        .args(["eval", "@fib(@n) * 2", "--var", "n:number=7", "--progs"])
        .arg(&path)
        .assert()
        .success()
        .stdout("26\n");
}

#[test]
fn test_check() {
    let good = create_file("prog_run_test_check_good.toml", PROGS);
    let bad = create_file(
        "prog_run_test_check_bad.toml",
        r#"
[[prog]]
name = "broken"
returns = "number"
body = """
// fine
return 1 + true
"""
"#,
    );
    defer! {
        let _ = std::fs::remove_file(&good);
        let _ = std::fs::remove_file(&bad);
    }

    cargo::cargo_bin_cmd!("prog")
        .arg("check")
        .arg(&good)
        .assert()
        .success();

    let output = cargo::cargo_bin_cmd!("prog")
        .arg("check")
        .arg(&good)
        .arg(&bad)
        .assert()
        .failure()
        .get_output()
        .stdout
        .clone();
    let stdout = String::from_utf8_lossy(&output);

    assert!(stdout.contains("Error in @broken: Line 2: Operator + cannot be applied to Number and Boolean"));
    assert!(!stdout.contains("@fib"));
}

#[test]
fn test_check_missing_file() {
    cargo::cargo_bin_cmd!("prog")
        .args(["check", "definitely/not/here.toml"])
        .assert()
        .failure();
}

#[rstest]
#[case::all(vec!["docs"], "round(Number, literal Number) -> Number")]
#[case::filtered(vec!["docs", "orderby"], "Collection.orderby(variable, Number) -> source collection")]
#[case::property(vec!["docs", "length"], "Text.Length -> Number")]
fn test_docs(#[case] args: Vec<&str>, #[case] expected: &str) {
    let output = cargo::cargo_bin_cmd!("prog")
        .args(args)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert!(String::from_utf8_lossy(&output).contains(expected));
}
