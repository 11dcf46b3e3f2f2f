//! End-to-end parsing scenarios against the public tree.

use cuddle::{Document, Literal, Node, Value};
use num_bigint::BigInt;

#[test]
fn node_with_children() -> miette::Result<()> {
    let doc = Document::parse("node 1 3.14 {child \"abc\" #true}")?;

    let node = doc.get("node").expect("expected a node");
    assert_eq!(node.args().to_vec(), vec![1.into(), 3.14.into()]);

    let children = node.children().expect("expected children");
    let child = children.get("child").expect("expected a child");
    assert_eq!(child.args().to_vec(), vec!["abc".into(), true.into()]);
    Ok(())
}

#[test]
fn bare_reserved_word_fails() {
    let err = Document::parse("(tag)node 1 null key=\"val\" {child \"abc\" true}").unwrap_err();
    assert!(err.diagnostics.iter().any(|d| {
        let msg = d.to_string();
        msg.contains("reserved keyword") && msg.contains("'true'")
    }));
    // `null` without `#` is just as dead.
    assert!(err.diagnostics.iter().any(|d| d.to_string().contains("'null'")));
}

#[test]
fn typed_node_with_keywords() -> miette::Result<()> {
    let doc = Document::parse("(tag)node 1 #null key=\"val\" {child \"abc\" #true}")?;

    let node = doc.get("node").expect("expected a node");
    assert_eq!(node.ty().map(|t| t.value()), Some("tag"));
    assert_eq!(node.args().to_vec(), vec![1.into(), Value::new(Literal::Null)]);
    assert_eq!(node["key"], "val".into());

    let child = node.children().unwrap().get("child").expect("child");
    assert_eq!(child.args().to_vec(), vec!["abc".into(), true.into()]);
    Ok(())
}

#[test]
fn typed_numbers() -> miette::Result<()> {
    let doc = Document::parse("numbers (i32)10 (u8)255 myfloat=(f32)1.5")?;

    let node = doc.get("numbers").expect("expected a node");
    assert_eq!(node.args().len(), 2);
    assert_eq!(node.args()[0].ty().map(|t| t.value()), Some("i32"));
    assert_eq!(node.args()[0].as_int::<i32>(), Some(10));
    assert_eq!(node.args()[1].ty().map(|t| t.value()), Some("u8"));
    assert_eq!(node.args()[1].as_int::<u8>(), Some(255));

    let myfloat = node.get("myfloat").expect("expected a property");
    assert_eq!(myfloat.ty().map(|t| t.value()), Some("f32"));
    assert_eq!(myfloat.as_float(), Some(1.5));
    Ok(())
}

#[test]
fn multiline_string_dedent() -> miette::Result<()> {
    let doc = Document::parse("node \"\"\"\n  hello\n    world\n  \"\"\"")?;
    assert_eq!(
        doc.get_arg("node"),
        Some(&"hello\n  world".into())
    );
    Ok(())
}

#[test]
fn slashdash_node() -> miette::Result<()> {
    let doc = Document::parse("/-node1; node2")?;
    assert_eq!(doc.nodes().len(), 1);
    assert_eq!(doc.nodes()[0].name().value(), "node2");
    Ok(())
}

#[test]
fn slashdash_entries() -> miette::Result<()> {
    let doc = Document::parse("node 1 /-2 3 /-key=\"x\" other=\"y\"")?;
    let node = doc.get("node").expect("expected a node");
    assert_eq!(node.args().to_vec(), vec![1.into(), 3.into()]);
    assert!(node.get("key").is_none());
    assert_eq!(node["other"], "y".into());
    Ok(())
}

#[test]
fn slashdash_spans_lines() -> miette::Result<()> {
    let doc = Document::parse("node 1 /-\n    2 3")?;
    let node = doc.get("node").expect("expected a node");
    assert_eq!(node.args().to_vec(), vec![1.into(), 3.into()]);

    let doc = Document::parse("/-\nnode1 {\n    inner\n}\nnode2")?;
    assert_eq!(doc.nodes().len(), 1);
    assert_eq!(doc.nodes()[0].name().value(), "node2");
    Ok(())
}

#[test]
fn kept_children_blocks_concatenate() -> miette::Result<()> {
    let doc = Document::parse("node { a; b } /-{ c } { d }")?;
    let node = doc.get("node").expect("expected a node");
    let names: Vec<_> = node
        .children()
        .expect("expected children")
        .nodes()
        .iter()
        .map(|n| n.name().value())
        .collect();
    assert_eq!(names, ["a", "b", "d"]);
    Ok(())
}

#[test]
fn int64_boundary_selects_width() -> miette::Result<()> {
    let doc = Document::parse("node 9223372036854775807 9223372036854775808")?;
    let node = doc.get("node").unwrap();
    assert!(!node.args()[0].literal().is_big_integer());
    assert_eq!(node.args()[0].as_integer(), Some(i64::MAX));
    assert!(node.args()[1].literal().is_big_integer());
    assert_eq!(
        node.args()[1].as_big_integer(),
        Some(BigInt::from(i64::MAX) + 1)
    );
    Ok(())
}

#[test]
fn radix_literals_are_big_integers() -> miette::Result<()> {
    let doc = Document::parse("node 0xFF_FF 0o77 0b1010")?;
    let node = doc.get("node").unwrap();
    for (arg, expected) in node.args().iter().zip([0xFFFF, 0o77, 0b1010]) {
        assert!(arg.literal().is_big_integer());
        assert_eq!(arg.as_integer(), Some(expected));
    }
    Ok(())
}

#[test]
fn float_specials_roundtrip() -> miette::Result<()> {
    let doc = Document::parse("node #inf #-inf #nan")?;
    let node = doc.get("node").unwrap();
    assert_eq!(node.args()[0].as_float(), Some(f64::INFINITY));
    assert_eq!(node.args()[1].as_float(), Some(f64::NEG_INFINITY));
    assert!(node.args()[2].as_float().unwrap().is_nan());

    let rendered = doc.to_string();
    assert_eq!(rendered, "node #inf #-inf #nan\n");
    let reparsed = Document::parse(&rendered)?;
    assert_eq!(doc, reparsed);
    Ok(())
}

#[test]
fn raw_string_hash_counting() -> miette::Result<()> {
    let doc = Document::parse("node ##\"contains \"# inside\"##")?;
    assert_eq!(doc.get_arg("node"), Some(&"contains \"# inside".into()));

    let doc = Document::parse("node #\"no \\n escapes\"#")?;
    assert_eq!(doc.get_arg("node"), Some(&"no \\n escapes".into()));
    Ok(())
}

#[test]
fn property_last_write_wins() -> miette::Result<()> {
    let doc = Document::parse("node a=1 b=2 a=3")?;
    let node = doc.get("node").unwrap();
    assert_eq!(node["a"], 3.into());
    assert_eq!(node["b"], 2.into());
    assert_eq!(node.props().len(), 2);
    Ok(())
}

#[test]
fn argument_and_node_order_preserved() -> miette::Result<()> {
    let doc = Document::parse("z 3 1 2\na\nm")?;
    let names: Vec<_> = doc.nodes().iter().map(|n| n.name().value()).collect();
    assert_eq!(names, ["z", "a", "m"]);
    assert_eq!(doc.get("z").unwrap().args().to_vec(), vec![3.into(), 1.into(), 2.into()]);
    Ok(())
}

#[test]
fn empty_children_distinct_from_none() -> miette::Result<()> {
    let doc = Document::parse("a {}\nb")?;
    let a = doc.get("a").unwrap();
    let b = doc.get("b").unwrap();
    assert!(a.children().is_some());
    assert!(a.children().unwrap().nodes().is_empty());
    assert!(b.children().is_none());
    assert_ne!(a.children().is_some(), b.children().is_some());
    Ok(())
}

#[test]
fn disallowed_code_points_rejected() {
    assert!(Document::parse("node \"a\u{0007}b\"").is_err());
    assert!(Document::parse("node na\u{200E}me").is_err());
    assert!(Document::parse("node \u{202A}").is_err());
}

#[test]
fn multiline_dedent_mismatch_is_error() {
    let err = Document::parse("node \"\"\"\n  ok\n bad\n  \"\"\"").unwrap_err();
    assert!(err
        .diagnostics
        .iter()
        .any(|d| d.to_string().contains("whitespace prefix")));
}

#[test]
fn unclosed_constructs_fail() {
    assert!(Document::parse("node \"unclosed").is_err());
    assert!(Document::parse("node /* unclosed").is_err());
    assert!(Document::parse("node {\n    child").is_err());
    assert!(Document::parse("node #\"unclosed\"").is_err());
}

#[test]
fn unescaped_newline_in_string_fails() {
    let err = Document::parse("node \"line\nbreak\"").unwrap_err();
    assert!(err
        .diagnostics
        .iter()
        .any(|d| d.to_string().contains("unescaped newline")));
}

#[test]
fn number_must_end_at_terminator() {
    assert!(Document::parse("node 1abc").is_err());
    assert!(Document::parse("node 1.2.3").is_err());
    assert!(Document::parse("node 1.").is_err());
    // Terminators from the structural set are fine.
    assert!(Document::parse("node 1;other 2").is_ok());
    assert!(Document::parse("node (u8)1{c}").is_ok());
}

#[test]
fn node_from_str_parses_single_node() -> miette::Result<()> {
    let node: Node = "commit abc123 author=\"Gwen\" {\n    parent def456\n}".parse()?;
    assert_eq!(node.name().value(), "commit");
    assert_eq!(node.arg(0), Some(&"abc123".into()));
    assert_eq!(node["author"], "Gwen".into());
    assert!(node.children().is_some());

    assert!("one; two".parse::<Node>().is_err());
    Ok(())
}

#[test]
fn semicolons_and_inline_children() -> miette::Result<()> {
    let doc = Document::parse("a; b; c { d; e }; f")?;
    let names: Vec<_> = doc.nodes().iter().map(|n| n.name().value()).collect();
    assert_eq!(names, ["a", "b", "c", "f"]);
    let c = doc.get("c").unwrap();
    assert_eq!(c.children().unwrap().nodes().len(), 2);
    Ok(())
}

#[test]
fn crlf_and_exotic_newlines() -> miette::Result<()> {
    let doc = Document::parse("a 1\r\nb 2\u{0085}c 3\u{2028}d 4")?;
    let names: Vec<_> = doc.nodes().iter().map(|n| n.name().value()).collect();
    assert_eq!(names, ["a", "b", "c", "d"]);
    Ok(())
}

#[test]
fn unicode_whitespace_separates_entries() -> miette::Result<()> {
    let doc = Document::parse("node\u{00A0}1\u{3000}2")?;
    assert_eq!(
        doc.iter_args("node").collect::<Vec<_>>(),
        vec![&1.into(), &2.into()]
    );
    Ok(())
}

#[test]
fn date_ish_values_are_tagged_strings() -> miette::Result<()> {
    let doc = Document::parse("event (date)\"2021-02-03\" when=(datetime)\"2021-02-03T04:05:06Z\"")?;
    let node = doc.get("event").unwrap();
    assert_eq!(node.args()[0].ty().map(|t| t.value()), Some("date"));
    assert_eq!(node.args()[0].as_string(), Some("2021-02-03"));
    assert_eq!(node["when"].ty().map(|t| t.value()), Some("datetime"));
    assert_eq!(node["when"].as_string(), Some("2021-02-03T04:05:06Z"));
    Ok(())
}
