// ABOUTME: Tests for classes, inheritance, initializers, and static members

use veld::config::Options;
use veld::error::RunError;
use veld::eval::Interpreter;

fn run(source: &str) -> Result<String, RunError> {
    let mut interpreter = Interpreter::new(Options::default());
    let output = interpreter.capture_output();
    interpreter.run(source)?;
    let text = output.borrow().clone();
    Ok(text)
}

fn run_ok(source: &str) -> String {
    match run(source) {
        Ok(output) => output,
        Err(error) => {
            error.report();
            panic!("program failed:\n{source}");
        }
    }
}

fn runtime_message(source: &str) -> String {
    match run(source) {
        Err(RunError::Runtime(error)) => error.message().to_string(),
        other => panic!("expected runtime error, got {other:?}"),
    }
}

fn static_message(source: &str) -> String {
    match run(source) {
        Err(RunError::Static(errors)) => errors[0].message().to_string(),
        other => panic!("expected static error, got {other:?}"),
    }
}

// ----------------------------------------------------------------------
// Instances and methods
// ----------------------------------------------------------------------

#[test]
fn test_fields_and_methods() {
    let source = "
        class Counter {
            init(start) { this.n = start; }
            bump() { this.n = this.n + 1; return this.n; }
        }
        var c = Counter(10);
        print c.bump();
        print c.bump();
        print c.n;
    ";
    assert_eq!(run_ok(source), "11\n12\n12\n");
}

#[test]
fn test_methods_are_bound_when_extracted() {
    let source = "
        class Box {
            init(v) { this.v = v; }
            get() { return this.v; }
        }
        var b = Box(7);
        var getter = b.get;
        print getter();
    ";
    assert_eq!(run_ok(source), "7\n");
}

#[test]
fn test_fields_shadow_methods() {
    let source = "
        class Thing {
            label() { return 'method'; }
        }
        var t = Thing();
        t.label = fun () { return 'field'; };
        print t.label();
    ";
    assert_eq!(run_ok(source), "field\n");
}

#[test]
fn test_this_in_nested_closure() {
    let source = "
        class Greeter {
            init(name) { this.name = name; }
            make() {
                fun hello() { return 'hi ' + this.name; }
                return hello;
            }
        }
        print Greeter('ada').make()();
    ";
    assert_eq!(run_ok(source), "hi ada\n");
}

// ----------------------------------------------------------------------
// Initializers
// ----------------------------------------------------------------------

#[test]
fn test_init_implicitly_returns_instance() {
    let source = "
        class A { init() { this.x = 1; } }
        var a = A();
        print a.x;
        // Calling init through the instance re-runs it and returns this
        var again = a.init();
        print again == a;
    ";
    assert_eq!(run_ok(source), "1\ntrue\n");
}

#[test]
fn test_bare_return_in_init_returns_instance() {
    let source = "
        class A {
            init(flag) {
                this.x = 'early';
                if (flag) return;
                this.x = 'late';
            }
        }
        print A(true).x;
        print A(false).x;
    ";
    assert_eq!(run_ok(source), "early\nlate\n");
}

#[test]
fn test_value_return_in_init_is_static_error() {
    assert_eq!(
        static_message("class A { init() { return 1; } }"),
        "Can't return a value from an initializer."
    );
}

// ----------------------------------------------------------------------
// Inheritance
// ----------------------------------------------------------------------

#[test]
fn test_method_lookup_climbs_chain() {
    let source = "
        class A { who() { return 'A'; } }
        class B < A {}
        class C < B {}
        print C().who();
    ";
    assert_eq!(run_ok(source), "A\n");
}

#[test]
fn test_super_starts_above_defining_class() {
    let source = "
        class A { m() { return 'A'; } }
        class B < A { m() { return 'B(' + super.m() + ')'; } }
        class C < B {}
        print C().m();
    ";
    // C inherits B.m; super inside B.m still starts at A
    assert_eq!(run_ok(source), "B(A)\n");
}

#[test]
fn test_super_in_chain_of_three() {
    let source = "
        class A { m() { return 'A'; } }
        class B < A { m() { return super.m() + 'B'; } }
        class C < B { m() { return super.m() + 'C'; } }
        print C().m();
    ";
    assert_eq!(run_ok(source), "ABC\n");
}

#[test]
fn test_inherited_init() {
    let source = "
        class A { init(x) { this.x = x; } }
        class B < A {}
        print B(5).x;
    ";
    assert_eq!(run_ok(source), "5\n");
}

#[test]
fn test_super_method_missing() {
    assert_eq!(
        runtime_message("class A {} class B < A { m() { return super.nope(); } } B().m();"),
        "Undefined property 'nope'."
    );
}

// ----------------------------------------------------------------------
// Field initializers
// ----------------------------------------------------------------------

#[test]
fn test_field_initializers_run_before_init() {
    let source = "
        class A {
            xs = [];
            init() { this.xs.append(1); }
        }
        print A().xs;
    ";
    assert_eq!(run_ok(source), "[1]\n");
}

#[test]
fn test_field_initializers_do_not_alias_between_instances() {
    let source = "
        class A { xs = []; }
        var a = A();
        var b = A();
        a.xs.append(1);
        print a.xs;
        print b.xs;
    ";
    assert_eq!(run_ok(source), "[1]\n[]\n");
}

#[test]
fn test_field_initializers_see_construction_time_scope() {
    let source = "
        var base = 10;
        class A { x = base + 1; }
        print A().x;
        base = 20;
        print A().x;
    ";
    assert_eq!(run_ok(source), "11\n21\n");
}

#[test]
fn test_subclass_field_overrides_superclass_field() {
    let source = "
        class A { x = 1; y = 2; }
        class B < A { x = 9; }
        var b = B();
        print b.x;
        print b.y;
    ";
    assert_eq!(run_ok(source), "9\n2\n");
}

// ----------------------------------------------------------------------
// Static members
// ----------------------------------------------------------------------

#[test]
fn test_static_fields_evaluate_once() {
    let source = "
        var n = 1;
        class A { class snapshot = n; }
        n = 2;
        print A.snapshot;
    ";
    assert_eq!(run_ok(source), "1\n");
}

#[test]
fn test_static_methods_are_not_bound() {
    let source = "
        class StringUtil {
            class shout(s) { return s.upper() + '!'; }
        }
        print StringUtil.shout('hey');
    ";
    assert_eq!(run_ok(source), "HEY!\n");
}

#[test]
fn test_static_lookup_climbs_superclass() {
    let source = "
        class A { class kind = 'base'; }
        class B < A {}
        print B.kind;
    ";
    assert_eq!(run_ok(source), "base\n");
}

#[test]
fn test_static_assignment() {
    let source = "
        class A {}
        A.version = 3;
        print A.version;
    ";
    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn test_this_in_static_method_is_static_error() {
    assert_eq!(
        static_message("class A { class m() { return this; } }"),
        "Can't use 'this' in a static method."
    );
}

// ----------------------------------------------------------------------
// Class-shaped namespaces from the registration surface
// ----------------------------------------------------------------------

#[test]
fn test_registered_namespace_looks_like_a_class() {
    let source = "
        print type(Math);
        print Math.max(1, 2.5, 2);
        print JSON.parse('[1]');
    ";
    assert_eq!(run_ok(source), "class\n2.5\n[1]\n");
}

#[test]
fn test_namespace_instantiation_yields_empty_instance() {
    // Namespaces are ordinary classes with no init, so calling one works
    assert_eq!(run_ok("print type(Math());"), "instance\n");
}

// ----------------------------------------------------------------------
// Error cases
// ----------------------------------------------------------------------

#[test]
fn test_undefined_property_and_method() {
    assert_eq!(
        runtime_message("class A {} print A().missing;"),
        "Undefined property 'missing'."
    );
    assert_eq!(
        runtime_message("class A {} print A.missing;"),
        "Undefined property 'missing'."
    );
}

#[test]
fn test_setting_property_on_non_instance() {
    assert_eq!(
        runtime_message("var x = 1; x.field = 2;"),
        "Only instances have properties."
    );
}

#[test]
fn test_inheriting_from_non_class() {
    assert_eq!(
        runtime_message("var V = 42; class A < V {}"),
        "Superclass must be a class."
    );
}
