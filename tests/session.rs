use pcalc::{CalcError, Environment, Namespace, Number, Precision, Reply, Session};
use pretty_assertions::assert_eq;
use std::sync::Once;

static INIT: Once = Once::new();
fn setup_test_logger() {
    INIT.call_once(|| {
        let _ = env_logger::builder().is_test(true).try_init();
    });
}

fn run(session: &mut Session, line: &str) -> String {
    session
        .execute(line)
        .unwrap_or_else(|err| panic!("{line:?} failed: {err}"))
        .to_string()
}

#[test]
fn test_assignment_then_reference() {
    setup_test_logger();
    let mut session = Session::new();
    assert_eq!(run(&mut session, "u.x << 5"), "u.x=5");
    assert_eq!(
        session.execute("u.x"),
        Ok(Reply::Evaluated {
            description: "5".to_string(),
            value: Some(Number::integer(5)),
        })
    );
    assert_eq!(run(&mut session, ".x^2 - 1"), "5^2-1 = 24");
}

#[test]
fn test_significant_figures_through_a_session() {
    setup_test_logger();
    let mut session = Session::new();
    assert_eq!(run(&mut session, "12.34 * 1.2"), "12.34*1.2 = 15");
    assert_eq!(run(&mut session, "m.pi * 2"), "3.14159265358979*2 = 6.28318530717959");

    let Ok(Reply::Evaluated { value: Some(g), .. }) = session.execute("p.g") else {
        panic!("p.g should evaluate");
    };
    assert_eq!(g.precision(), Precision::Significant(6));
}

#[test]
fn test_exact_rationals_stay_exact() {
    setup_test_logger();
    let mut session = Session::new();
    assert_eq!(run(&mut session, "1/3 + 1/6"), "1/3+1/6 = 1/2");
    assert_eq!(run(&mut session, "(2/3)^-2"), "(2/3)^(-2) = 9/4");
}

#[test]
fn test_errors_do_not_end_the_session() {
    setup_test_logger();
    let mut session = Session::new();
    assert!(matches!(
        session.execute("()"),
        Err(CalcError::EmptyParenthesisBody { .. })
    ));
    assert!(matches!(
        session.execute("2 # 3"),
        Err(CalcError::InvalidOperator { .. })
    ));
    assert!(matches!(
        session.execute("nope(1)"),
        Err(CalcError::UnknownReference { .. })
    ));
    assert_eq!(run(&mut session, "2(3+1)"), "2*(3+1) = 8");
}

#[test]
fn test_assignment_redirected_from_constant_namespace() {
    setup_test_logger();
    let mut session = Session::new();
    assert_eq!(run(&mut session, "c.k << 3"), "u.k=3");
    assert!(session
        .environment()
        .lookup(Namespace::Chemistry, "k")
        .is_none());
    assert_eq!(run(&mut session, "u.k + 1"), "3+1 = 4");
}

#[test]
fn test_list_shows_assigned_variables() {
    setup_test_logger();
    let mut session = Session::new();
    run(&mut session, "u.b << 2");
    run(&mut session, "u.a << a + 1");
    assert_eq!(
        session.execute("list u"),
        Ok(Reply::Listing(vec!["a=a+1".to_string(), "b=2".to_string()]))
    );
    assert_eq!(run(&mut session, "list m"), "e=2.71828182845905\npi=3.14159265358979");
}

#[test]
fn test_user_templates_and_builtin_functions() {
    setup_test_logger();
    let mut session = Session::new();
    run(&mut session, "u.area << w * h");
    assert_eq!(run(&mut session, "u.area(3, 4)"), "3*4 = 12");
    assert_eq!(run(&mut session, "u.area(h = 2)"), "w*2");
    assert_eq!(run(&mut session, "u.area(h = 2, 5)"), "5*2 = 10");
    assert_eq!(run(&mut session, "lg(1000)"), "lg(1000) = 3");

    // The stored template is untouched by calls.
    assert_eq!(run(&mut session, "u.area"), "w*h");
}

#[test]
fn test_empty_environment_has_no_builtins() {
    setup_test_logger();
    let mut session = Session::with_environment(Environment::empty());
    assert!(matches!(
        session.execute("m.pi"),
        Err(CalcError::UnknownReference { .. })
    ));
    assert!(matches!(
        session.execute("ln(2)"),
        Err(CalcError::UnknownReference { .. })
    ));
}
