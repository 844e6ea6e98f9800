// Integration tests for the loop tags
//
// These tests compile and render complete templates and check the output.
// Tests cover:
// - Iterating arrays, ranges, dicts and records
// - Loop metadata (first, last, counters, labels)
// - where filtering and the empty branch
// - break / continue, nested and labeled
// - Compile-time and render-time errors
// - Render options loaded from TOML

use serde::Serialize;
use stencil_loops::ast::Expression;
use stencil_loops::lexer::Token;
use stencil_loops::parser::TokenParser;
use stencil_loops::render::{render_nodes, NodeList};
use stencil_loops::{
    Context, Environment, ErrorKind, Fields, Flow, Node, Record, RenderOptions, Result, TemplateError, Value,
};
use std::collections::HashMap;

fn default_bindings() -> HashMap<String, Value> {
    HashMap::from([
        ("items".to_string(), Value::from(vec![1, 2, 3])),
        ("empty_items".to_string(), Value::array(vec![])),
        (
            "dict".to_string(),
            Value::from(HashMap::from([("one".to_string(), "I"), ("two".to_string(), "II")])),
        ),
    ])
}

fn render_with(environment: &Environment, template: &str, bindings: HashMap<String, Value>) -> Result<String> {
    environment.template_from_str(template)?.render(bindings)
}

fn render(template: &str) -> String {
    render_with(&Environment::new(), template, default_bindings()).unwrap()
}

fn render_err(template: &str) -> TemplateError {
    render_with(&Environment::new(), template, default_bindings()).unwrap_err()
}

fn sorted_parts(output: &str) -> Vec<String> {
    let mut parts: Vec<String> = output.split(',').filter(|p| !p.is_empty()).map(str::to_string).collect();
    parts.sort();
    parts
}

/// Minimal `{% if expr %}...{% endif %}` used to place signals inside nested nodes
#[derive(Debug)]
struct IfNode {
    condition: Box<dyn Expression>,
    nodes: NodeList,
}

impl Node for IfNode {
    fn render_into(&self, ctx: &mut Context, out: &mut String) -> Result<Flow> {
        if self.condition.evaluate(ctx)? {
            ctx.push(|ctx| render_nodes(&self.nodes, ctx, out))
        } else {
            Ok(Flow::Normal)
        }
    }
}

fn parse_if(parser: &mut TokenParser<'_>, token: &Token) -> Result<Box<dyn Node>> {
    let components = token.components();
    let condition = parser.compile_expression(&components[1..])?;
    let nodes = parser.parse_until(&["endif"])?;
    parser.next_token().ok_or_else(|| token.error("`endif` was not found."))?;
    Ok(Box::new(IfNode { condition: Box::new(condition), nodes }))
}

fn environment_with_if() -> Environment {
    let mut environment = Environment::new();
    environment.register_tag("if", parse_if);
    environment
}

// ============================================================
// Iteration sources
// ============================================================

#[test]
fn test_iterates_array() {
    assert_eq!(render("{% for item in items %}{{ item }}{% endfor %}"), "123");
}

#[test]
fn test_iterates_closed_and_half_open_ranges() {
    let environment = Environment::new();
    let template = "{% for item in range %}{{ item }}{% endfor %}";
    let closed = HashMap::from([("range".to_string(), Value::from(1..=3))]);
    let half_open = HashMap::from([("range".to_string(), Value::from(1..4))]);
    assert_eq!(render_with(&environment, template, closed).unwrap(), "123");
    assert_eq!(render_with(&environment, template, half_open).unwrap(), "123");
}

#[test]
fn test_empty_branch_for_empty_source() {
    assert_eq!(render("{% for item in empty_items %}{{ item }}{% empty %}empty{% endfor %}"), "empty");
}

#[test]
fn test_empty_branch_for_missing_and_scalar_sources() {
    assert_eq!(render("{% for item in nothing %}x{% empty %}none{% endfor %}"), "none");
    let bindings = HashMap::from([("n".to_string(), Value::Int(5))]);
    let output = render_with(&Environment::new(), "{% for c in n %}x{% empty %}none{% endfor %}", bindings);
    assert_eq!(output.unwrap(), "none");
}

#[test]
fn test_source_expression_with_filter() {
    #[derive(Serialize)]
    struct Article {
        title: String,
        author: String,
    }

    let articles = vec![
        Article { title: "Migrating from OCUnit to XCTest".into(), author: "Kyle Fuller".into() },
        Article { title: "Memory Management with ARC".into(), author: "Kyle Fuller".into() },
    ];
    let articles = articles
        .iter()
        .map(|article| Value::record_from_serialize("Article", article))
        .collect::<Result<Vec<_>>>()
        .unwrap();

    let template = "{% for article in ars|default:articles %}- {{ article.title }} by {{ article.author }}.\n{% endfor %}\n";
    let bindings = HashMap::from([("articles".to_string(), Value::array(articles))]);
    let output = render_with(&Environment::new(), template, bindings).unwrap();
    assert_eq!(
        output,
        "- Migrating from OCUnit to XCTest by Kyle Fuller.\n- Memory Management with ARC by Kyle Fuller.\n\n"
    );
}

#[test]
fn test_dict_key_and_value() {
    let output = render("{% for key,value in dict %}{{ key }}: {{ value }},{% endfor %}");
    assert_eq!(sorted_parts(&output), vec!["one: I", "two: II"]);
}

#[test]
fn test_dict_with_single_variable_binds_key() {
    let output = render("{% for key in dict %}{{ key }},{% empty %}empty{% endfor %}");
    assert_eq!(sorted_parts(&output), vec!["one", "two"]);
}

#[test]
fn test_second_variable_unbound_for_single_items() {
    assert_eq!(render("{% for a,b in items %}{{ a }}[{{ b }}]{% endfor %}"), "1[]2[]3[]");
}

#[test]
fn test_struct_fields_in_declaration_order() {
    struct MyStruct {
        string: String,
        number: i64,
    }

    impl Fields for MyStruct {
        fn type_name(&self) -> &str {
            "MyStruct"
        }

        fn fields(&self) -> Vec<(String, Value)> {
            vec![("string".into(), Value::str(self.string.as_str())), ("number".into(), Value::Int(self.number))]
        }
    }

    let value = Value::record(&MyStruct { string: "abc".into(), number: 123 });
    let bindings = HashMap::from([("struct".to_string(), value)]);
    let template = "{% for property,value in struct %}{{ property }}={{ value }}\n{% endfor %}";
    assert_eq!(render_with(&Environment::new(), template, bindings).unwrap(), "string=abc\nnumber=123\n");
}

#[test]
fn test_tuple_like_record() {
    let tuple = Record::new("tuple", vec![("one".into(), Value::Int(1)), ("two".into(), Value::from("dva"))]);
    let bindings = HashMap::from([("tuple".to_string(), Value::from(tuple))]);
    let template = "{% for label,value in tuple %}{{ label }}={{ value }}\n{% endfor %}";
    assert_eq!(render_with(&Environment::new(), template, bindings).unwrap(), "one=1\ntwo=dva\n");
}

#[test]
fn test_subtype_fields_before_supertype_fields() {
    #[derive(Serialize)]
    struct MyClass {
        #[serde(rename = "baseString")]
        base_string: String,
        #[serde(rename = "baseInt")]
        base_int: i64,
    }

    #[derive(Serialize)]
    struct MySubclass {
        #[serde(rename = "childString")]
        child_string: String,
        #[serde(flatten)]
        base: MyClass,
    }

    let object = MySubclass {
        child_string: "child".into(),
        base: MyClass { base_string: "base".into(), base_int: 1 },
    };
    let bindings = HashMap::from([("class".to_string(), Value::record_from_serialize("MySubclass", &object).unwrap())]);
    let template = "{% for label,value in class %}{{ label }}={{ value }}\n{% endfor %}";
    assert_eq!(
        render_with(&Environment::new(), template, bindings).unwrap(),
        "childString=child\nbaseString=base\nbaseInt=1\n"
    );
}

#[test]
fn test_supertype_chain_from_explicit_records() {
    let base = Record::new("Base", vec![("base".into(), Value::Int(2))]);
    let child = Record::new("Child", vec![("child".into(), Value::Int(1))]).with_supertype(base);
    let bindings = HashMap::from([("obj".to_string(), Value::from(child))]);
    let template = "{% for k,v in obj %}{{ k }}={{ v }};{% endfor %}";
    assert_eq!(render_with(&Environment::new(), template, bindings).unwrap(), "child=1;base=2;");
}

// ============================================================
// Loop metadata
// ============================================================

#[test]
fn test_first_and_last() {
    assert_eq!(render("{% for item in items %}{{ item }}{{ forloop.first }}{% endfor %}"), "1true2false3false");
    assert_eq!(render("{% for item in items %}{{ item }}{{ forloop.last }}{% endfor %}"), "1false2false3true");
}

#[test]
fn test_counters() {
    assert_eq!(render("{% for item in items %}{{ item }}{{ forloop.counter }}{% endfor %}"), "112233");
    assert_eq!(render("{% for item in items %}{{ item }}{{ forloop.counter0 }}{% endfor %}"), "102132");
    assert_eq!(render("{% for item in items %}{{ forloop.length }}{% endfor %}"), "333");
}

#[test]
fn test_metadata_is_scoped_to_the_loop() {
    assert_eq!(render("{% for item in items %}{% endfor %}[{{ forloop.counter }}][{{ item }}]"), "[][]");
}

#[test]
fn test_inner_loop_shadows_outer_metadata() {
    let output = render("{% for a in items %}{% for b in items %}{{ forloop.counter }}{% endfor %}|{% endfor %}");
    assert_eq!(output, "123|123|123|");
}

// ============================================================
// where clause
// ============================================================

#[test]
fn test_where_filters_before_counting() {
    assert_eq!(
        render("{% for item in items where item > 1 %}{{ item }}{{ forloop.counter }}{% endfor %}"),
        "2132"
    );
}

#[test]
fn test_where_marks_last_among_kept_items() {
    assert_eq!(
        render("{% for item in items where item < 3 %}{{ item }}{{ forloop.last }},{% endfor %}"),
        "1false,2true,"
    );
}

#[test]
fn test_where_filtering_everything_renders_empty_branch() {
    assert_eq!(render("{% for item in items where item == 0 %}{{ item }}{% empty %}empty{% endfor %}"), "empty");
}

#[test]
fn test_where_with_boolean_operators() {
    assert_eq!(render("{% for item in items where item == 1 or item == 3 %}{{ item }}{% endfor %}"), "13");
    assert_eq!(render("{% for item in items where not item == 2 %}{{ item }}{% endfor %}"), "13");
}

#[test]
fn test_where_sees_both_pair_variables() {
    let output = render("{% for key,value in dict where value == \"II\" %}{{ key }}{% endfor %}");
    assert_eq!(output, "two");
}

// ============================================================
// break / continue
// ============================================================

#[test]
fn test_break_stops_loop() {
    assert_eq!(render("{% for item in items %}{{ item }}{% break %}\n{% endfor %}\n"), "1\n");
}

#[test]
fn test_break_from_nested_node() {
    let template = "{% for item in items %}{{ item }}{% if forloop.first %}<{% break %}>{% endif %}!{% endfor %}\n";
    assert_eq!(render_with(&environment_with_if(), template, default_bindings()).unwrap(), "1<\n");
}

#[test]
fn test_continue_skips_rest_of_body() {
    assert_eq!(render("{% for item in items %}{{ item }}\n{% continue %}!{% endfor %}\n"), "1\n2\n3\n\n");
}

#[test]
fn test_continue_from_nested_node() {
    let template = "{% for item in items %}{% if forloop.last %}<{% continue %}>{% endif %}!{{ item }}{% endfor %}\n";
    assert_eq!(render_with(&environment_with_if(), template, default_bindings()).unwrap(), "!1!2<\n");
}

#[test]
fn test_break_outside_loop_is_syntax_error() {
    let err = render_err("{% for item in items %}{% endfor %}{% break %}");
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    assert_eq!(err.message, "'break' can be used only inside loop body");
}

#[test]
fn test_continue_outside_loop_is_syntax_error() {
    let err = render_err("{% for item in items %}{{ item }}\n{% endfor %}\n{% continue %}");
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    assert_eq!(err.message, "'continue' can be used only inside loop body");
}

#[test]
fn test_termination_tag_with_too_many_arguments() {
    let err = render_err("{% outer: for item in items %}{% break outer now %}{% endfor %}");
    assert_eq!(err.message, "'break' does not accept more than one parameter `break outer now`.");
}

#[test]
fn test_break_after_loop_does_not_leak_signal() {
    let output = render("{% for a in items %}{% for b in items %}{% break %}{% endfor %}{{ a }}{% endfor %}");
    assert_eq!(output, "123");
}

#[test]
fn test_loop_variable_named_forloop_keeps_metadata_and_signals() {
    assert_eq!(
        render("{% for forloop in items %}[{{ forloop.counter }}]{% continue %}!{% endfor %}END"),
        "[1][2][3]END"
    );
    assert_eq!(render("{% for forloop in items %}{{ forloop.counter }}{% break %}{% endfor %}END"), "1END");
}

#[test]
fn test_label_prefix_on_empty_is_unknown_tag() {
    let err = render_err("{% for x in items %}{{ x }}{% outer: empty %}E{% endfor %}");
    assert_eq!(err.kind, ErrorKind::UnknownTag);
}

// ============================================================
// Nested loops
// ============================================================

#[test]
fn test_break_in_outer_loop_after_inner_completes() {
    let template = "{% for item in items %}outer: {{ item }}\n{% for item in items %}inner: {{ item }}\n{% endfor %}{% break %}{% endfor %}\n";
    assert_eq!(render(template), "outer: 1\ninner: 1\ninner: 2\ninner: 3\n\n");
}

#[test]
fn test_break_in_inner_loop() {
    let template = "{% for item in items %}outer: {{ item }}\n{% for item in items %}inner: {{ item }}\n{% break %}{% endfor %}{% endfor %}\n";
    assert_eq!(render(template), "outer: 1\ninner: 1\nouter: 2\ninner: 1\nouter: 3\ninner: 1\n\n");
}

#[test]
fn test_continue_in_outer_loop() {
    let template = "{% for item in items %}{% for item in items %}inner: {{ item }}\n{% endfor %}{% continue %}outer: {{ item }}\n{% endfor %}\n";
    assert_eq!(
        render(template),
        "inner: 1\ninner: 2\ninner: 3\ninner: 1\ninner: 2\ninner: 3\ninner: 1\ninner: 2\ninner: 3\n\n"
    );
}

#[test]
fn test_continue_in_inner_loop() {
    let template = "{% for item in items %}{% for item in items %}{% continue %}inner: {{ item }}\n{% endfor %}outer: {{ item }}\n{% endfor %}\n";
    assert_eq!(render(template), "outer: 1\nouter: 2\nouter: 3\n\n");
}

// ============================================================
// Labeled loops
// ============================================================

#[test]
fn test_labeled_outer_metadata_visible_in_inner_loop() {
    let template = "{% outer: for item in items %}{% for item in items %}{{ forloop.counter }}-{{ forloop.outer.counter }}\n{% endfor %}{% endfor %}\n";
    assert_eq!(render(template), "1-1\n2-1\n3-1\n1-2\n2-2\n3-2\n1-3\n2-3\n3-3\n\n");
}

#[test]
fn test_labels_chain_through_nested_loops() {
    let template = "{% a: for x in items %}{% b: for y in items %}{% for z in items %}{{ forloop.b.a.counter }}{{ forloop.b.counter }}{{ forloop.counter }} {% endfor %}{% break %}{% endfor %}{% break %}{% endfor %}";
    assert_eq!(render(template), "111 112 113 ");
}

#[test]
fn test_break_labeled_loop() {
    let template = "{% outer: for item in items %}outer: {{ item }}\n{% for item in items %}{% break outer %}inner: {{ item }}\n{% endfor %}{% endfor %}\n";
    assert_eq!(render(template), "outer: 1\n\n");
}

#[test]
fn test_continue_labeled_loop() {
    let template = "{% outer: for item in items %}{% for item in items %}inner: {{ item }}\n{% continue outer %}{% endfor %}outer: {{ item }}\n{% endfor %}\n";
    assert_eq!(render(template), "inner: 1\ninner: 1\ninner: 1\n\n");
}

#[test]
fn test_unlabeled_continue_targets_innermost_loop() {
    let template = "{% outer: for a in items %}{% for b in items %}{% continue %}x{% endfor %}{{ a }}{% endfor %}";
    assert_eq!(render(template), "123");
}

#[test]
fn test_break_with_unknown_label_fails_at_render() {
    let template = Environment::new().template_from_str("{% outer: for item in items %}{% break inner %}{% endfor %}\n");
    let err = template.unwrap().render(default_bindings()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UnknownLabel);
}

#[test]
fn test_continue_with_unknown_label_fails_at_render() {
    let err = render_err("{% outer: for item in items %}{% continue inner %}{% endfor %}\n");
    assert_eq!(err.kind, ErrorKind::UnknownLabel);
    assert!(err.message.contains("inner"));
}

#[test]
fn test_unknown_label_not_reached_is_not_an_error() {
    assert_eq!(render("{% outer: for item in empty_items %}{% break inner %}{% endfor %}ok"), "ok");
}

// ============================================================
// Parse errors
// ============================================================

#[test]
fn test_malformed_for_head() {
    let err = render_err("{% for i %}{% endfor %}");
    assert_eq!(err.kind, ErrorKind::SyntaxError);
    assert_eq!(err.message, "'for' statements should use the following 'for x in y where condition' `for i`.");
    assert_eq!(err.location.line, 1);
}

#[test]
fn test_missing_endfor() {
    let err = render_err("{% for item in items %}{{ item }}");
    assert_eq!(err.message, "`endfor` was not found.");
}

#[test]
fn test_unknown_filter_in_source() {
    let err = render_err("{% for item in items|uper %}{% endfor %}");
    assert_eq!(err.kind, ErrorKind::UnknownFilter);
    assert_eq!(err.suggestion.as_deref(), Some("upper"));
}

// ============================================================
// Options
// ============================================================

#[test]
fn test_strict_variables_from_toml() {
    let options = RenderOptions::from_toml_str("strict_variables = true\n").unwrap();
    let environment = Environment::with_options(options);
    let err = render_with(&environment, "{% for item in itmes %}{% endfor %}", default_bindings()).unwrap_err();
    assert_eq!(err.kind, ErrorKind::UndefinedVariable);
    assert_eq!(err.suggestion.as_deref(), Some("items"));
}

#[test]
fn test_trim_blocks() {
    let options = RenderOptions { trim_blocks: true, ..Default::default() };
    let environment = Environment::with_options(options);
    let template = "{% for item in items %}\n{{ item }}\n{% endfor %}\n";
    assert_eq!(render_with(&environment, template, default_bindings()).unwrap(), "1\n2\n3\n");
}
