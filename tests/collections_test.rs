// ABOUTME: Tests for the aggregate value types and their built-in methods

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

// ----------------------------------------------------------------------
// Lists
// ----------------------------------------------------------------------

#[test]
fn test_list_methods() {
    assert_eq!(
        run_ok("var xs = [1]; xs.append(2); xs.extend([3, 4]); print xs;"),
        "[1, 2, 3, 4]\n"
    );
    assert_eq!(run_ok("print [1, 2, 3].contains(2);"), "true\n");
    assert_eq!(run_ok("print [1, 2, 3].contains(9);"), "false\n");
    assert_eq!(run_ok("print [1, 2, 3].index(3);"), "2\n");
    assert_eq!(run_ok("print [1, 2, 3].index(9);"), "-1\n");
    assert_eq!(run_ok("var xs = [1, 2, 3]; print xs.pop(); print xs;"), "3\n[1, 2]\n");
    assert_eq!(run_ok("var xs = [1, 2, 3]; print xs.pop(0); print xs;"), "1\n[2, 3]\n");
    assert_eq!(run_ok("var xs = [1, 2]; xs.reverse(); print xs;"), "[2, 1]\n");
    assert_eq!(run_ok("var xs = [1, 2]; xs.clear(); print xs;"), "[]\n");
    assert_eq!(run_ok("var xs = [1, 2, 1]; print xs.remove(1); print xs;"), "true\n[2, 1]\n");
}

#[test]
fn test_list_sort() {
    assert_eq!(run_ok("var xs = [3, 1.5, 2]; xs.sort(); print xs;"), "[1.5, 2, 3]\n");
    assert_eq!(run_ok("var xs = ['b', 'a']; xs.sort(); print xs;"), "['a', 'b']\n");
    assert_eq!(
        runtime_message("var xs = [1, 'a']; xs.sort();"),
        "Cannot sort a list of mixed element types."
    );
}

#[test]
fn test_list_insert_negative_indices() {
    assert_eq!(run_ok("var xs = [1, 3]; xs.insert(1, 2); print xs;"), "[1, 2, 3]\n");
    assert_eq!(run_ok("var xs = [2, 3]; xs.insert(-9, 1); print xs;"), "[1, 2, 3]\n");
    assert_eq!(run_ok("var xs = [1, 2]; xs.insert(99, 3); print xs;"), "[1, 2, 3]\n");
}

#[test]
fn test_list_with_returns_copy() {
    let source = "
        var xs = [1, 2, 3];
        var ys = xs.with(-1, 9);
        print xs;
        print ys;
    ";
    assert_eq!(run_ok(source), "[1, 2, 3]\n[1, 2, 9]\n");
    assert_eq!(
        runtime_message("[1].with(5, 0);"),
        "List index out of range."
    );
}

#[test]
fn test_list_copy_is_shallow() {
    let source = "
        var inner = [1];
        var xs = [inner];
        var ys = xs.copy();
        ys.append(2);
        inner.append(9);
        print xs;
        print ys;
    ";
    assert_eq!(run_ok(source), "[[1, 9]]\n[[1, 9], 2]\n");
}

#[test]
fn test_pop_from_empty_list() {
    assert_eq!(runtime_message("[].pop();"), "Cannot pop from an empty list.");
}

// ----------------------------------------------------------------------
// Dicts
// ----------------------------------------------------------------------

#[test]
fn test_dict_methods() {
    assert_eq!(
        run_ok("var d = {'a': 1, 'b': 2}; print d.keys(); print d.values();"),
        "['a', 'b']\n[1, 2]\n"
    );
    assert_eq!(
        run_ok("print {'a': 1}.items();"),
        "[['a', 1]]\n"
    );
    assert_eq!(run_ok("print {'a': 1}.get('a');"), "1\n");
    assert_eq!(run_ok("print {'a': 1}.get('z');"), "nil\n");
    assert_eq!(run_ok("print {'a': 1}.get('z', 42);"), "42\n");
    assert_eq!(
        run_ok("var d = {'a': 1}; print d.removeKey('a'); print d.removeKey('a'); print d;"),
        "true\nfalse\n{}\n"
    );
}

#[test]
fn test_dict_iteration_order_is_insertion_order() {
    let source = "
        var d = {};
        d['z'] = 1;
        d['a'] = 2;
        d['m'] = 3;
        print d.keys();
    ";
    assert_eq!(run_ok(source), "['z', 'a', 'm']\n");
}

#[test]
fn test_dict_mixed_key_types() {
    let source = "
        var d = {1: 'int', 1.0: 'float', true: 'bool', nil: 'nil'};
        print d[1];
        print d[1.0];
        print d[true];
        print d[nil];
    ";
    assert_eq!(run_ok(source), "int\nfloat\nbool\nnil\n");
}

#[test]
fn test_dict_keys_are_quote_insensitive() {
    assert_eq!(run_ok("var d = {'k': 1}; print d[\"k\"];"), "1\n");
}

#[test]
fn test_dict_copy_is_independent() {
    let source = "
        var d = {'a': 1};
        var e = d.copy();
        e['b'] = 2;
        print d;
        print e;
    ";
    assert_eq!(run_ok(source), "{'a': 1}\n{'a': 1, 'b': 2}\n");
}

// ----------------------------------------------------------------------
// Sets
// ----------------------------------------------------------------------

#[test]
fn test_set_methods() {
    assert_eq!(run_ok("var s = set(1, 2); s.add(3); print s.contains(3);"), "true\n");
    assert_eq!(run_ok("var s = set(1, 2); print s.remove(1); print s.remove(1);"), "true\nfalse\n");
    assert_eq!(run_ok("print set(1, 2).union(set(2, 3));"), "set(1, 2, 3)\n");
    assert_eq!(run_ok("print set(1, 2, 3).intersect(set(2, 3, 4));"), "set(2, 3)\n");
    assert_eq!(run_ok("print set(1, 2).toList();"), "[1, 2]\n");
}

#[test]
fn test_set_rejects_unhashable_members() {
    assert_eq!(
        runtime_message("set([1]);"),
        "Only strings, numbers, booleans, and nil can be used as keys, got list."
    );
    assert_eq!(
        runtime_message("set(1).add({});"),
        "Only strings, numbers, booleans, and nil can be used as keys, got dict."
    );
}

// ----------------------------------------------------------------------
// Buffers
// ----------------------------------------------------------------------

#[test]
fn test_buffer_methods() {
    assert_eq!(
        run_ok("var b = buffer(1, 2); b.append(3); print b; print b.toList();"),
        "buffer(1, 2, 3)\n[1, 2, 3]\n"
    );
    assert_eq!(run_ok("print buffer(5, 6).contains(6);"), "true\n");
    assert_eq!(run_ok("print buffer(5, 6).index(6);"), "1\n");
    assert_eq!(run_ok("var b = buffer(7); print b.pop();"), "7\n");
    assert_eq!(
        runtime_message("buffer(1).append(300);"),
        "Buffer elements must be integers between 0 and 255."
    );
    assert_eq!(
        runtime_message("buffer(-1);"),
        "Buffer elements must be integers between 0 and 255."
    );
}

#[test]
fn test_buffer_slice_and_index() {
    assert_eq!(run_ok("print buffer(1, 2, 3)[1];"), "2\n");
    assert_eq!(run_ok("print buffer(1, 2, 3)[1:];"), "buffer(2, 3)\n");
    assert_eq!(
        runtime_message("print buffer(1)[1];"),
        "Buffer index out of range."
    );
}

// ----------------------------------------------------------------------
// Queues and stacks
// ----------------------------------------------------------------------

#[test]
fn test_queue_fifo() {
    let source = "
        var q = queue();
        q.enqueue('a');
        q.enqueue('b');
        print q.dequeue();
        print q.dequeue();
    ";
    assert_eq!(run_ok(source), "a\nb\n");
    assert_eq!(
        runtime_message("queue().dequeue();"),
        "Cannot dequeue from an empty queue."
    );
    assert_eq!(run_ok("print queue().peek();"), "nil\n");
}

#[test]
fn test_stack_lifo() {
    let source = "
        var s = stack();
        s.push('a');
        s.push('b');
        print s.pop();
        print s.peek();
    ";
    assert_eq!(run_ok(source), "b\na\n");
    assert_eq!(
        runtime_message("stack().pop();"),
        "Cannot pop from an empty stack."
    );
}

// ----------------------------------------------------------------------
// Strings
// ----------------------------------------------------------------------

#[test]
fn test_string_methods() {
    assert_eq!(run_ok("print 'aBc'.upper();"), "ABC\n");
    assert_eq!(run_ok("print 'aBc'.lower();"), "abc\n");
    assert_eq!(run_ok("print '  x  '.strip();"), "x\n");
    assert_eq!(run_ok("print 'a-b-c'.split('-');"), "['a', 'b', 'c']\n");
    assert_eq!(run_ok("print 'hello'.replace('l', 'L');"), "heLLo\n");
    assert_eq!(run_ok("print 'hello'.startsWith('he');"), "true\n");
    assert_eq!(run_ok("print 'hello'.endsWith('lo');"), "true\n");
    assert_eq!(run_ok("print '42'.toNum() + 1;"), "43\n");
    assert_eq!(run_ok("print '2.5'.toNum() * 2;"), "5\n");
    assert_eq!(run_ok("print 'xyz'.toNum();"), "nil\n");
    assert_eq!(run_ok("print 'ab'.chars();"), "['a', 'b']\n");
}

#[test]
fn test_string_find_uses_code_points() {
    assert_eq!(run_ok("print 'héllo'.find('o');"), "4\n");
    assert_eq!(run_ok("print 'héllo'.find('zz');"), "-1\n");
}

#[test]
fn test_strings_are_immutable() {
    assert_eq!(
        runtime_message("var s = 'abc'; s[0] = 'x';"),
        "Can only assign into dictionaries, lists, and buffers."
    );
}

// ----------------------------------------------------------------------
// Aliasing and cycles
// ----------------------------------------------------------------------

#[test]
fn test_aliasing_across_containers() {
    let source = "
        var shared = [1];
        var d = {'a': shared};
        var xs = [shared];
        shared.append(2);
        print d['a'];
        print xs[0];
    ";
    assert_eq!(run_ok(source), "[1, 2]\n[1, 2]\n");
}

#[test]
fn test_cycles_print_and_compare() {
    let source = "
        var a = [1];
        a.append(a);
        print a;
        print a == a;
        var d = {};
        d['me'] = d;
        print d;
        print d == d;
    ";
    assert_eq!(run_ok(source), "[1, [...]]\ntrue\n{'me': {...}}\ntrue\n");
}

#[test]
fn test_mutual_cycle_printing() {
    let source = "
        var a = [];
        var b = [a];
        a.append(b);
        print a;
    ";
    assert_eq!(run_ok(source), "[[[...]]]\n");
}

// ----------------------------------------------------------------------
// JSON round trips
// ----------------------------------------------------------------------

#[test]
fn test_json_parse_types() {
    let source = "
        var v = JSON.parse('{\"n\": 1, \"f\": 2.5, \"s\": \"x\", \"b\": true, \"z\": null, \"a\": [1]}');
        print type(v);
        print v['n'] + 1;
        print v['f'];
        print v['s'];
        print v['b'];
        print v['z'];
        print v['a'];
    ";
    assert_eq!(run_ok(source), "dict\n2\n2.5\nx\ntrue\nnil\n[1]\n");
}

#[test]
fn test_json_stringify_containers() {
    assert_eq!(
        run_ok("print JSON.stringify([1, 'a', nil, true]);"),
        "[1,\"a\",null,true]\n"
    );
    assert_eq!(
        run_ok("print JSON.stringify(buffer(1, 2));"),
        "[1,2]\n"
    );
    assert_eq!(
        run_ok("print JSON.stringify({'a': {'b': [1]}});"),
        "{\"a\":{\"b\":[1]}}\n"
    );
}

#[test]
fn test_json_rejects_functions() {
    assert_eq!(
        runtime_message("fun f() {} JSON.stringify(f);"),
        "JSON.stringify: cannot serialize a function value."
    );
}

#[test]
fn test_json_round_trip_preserves_order() {
    let source = "
        var d = {'z': 1, 'a': 2};
        var back = JSON.parse(JSON.stringify(d));
        print back.keys();
    ";
    assert_eq!(run_ok(source), "['z', 'a']\n");
}
