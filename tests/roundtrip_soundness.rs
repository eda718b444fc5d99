//! Property test: compilation preserves filter semantics
//!
//! For randomly generated trees over native lookups, the union of records
//! matched by the compiled conjunctions must equal the records matched by
//! evaluating the original tree directly.

use prismquery::compiler::{CompileError, FilterQuery, MapCatalog, QueryCompiler};
use prismquery::filter::eval::matches_tree;
use prismquery::filter::FilterNode;
use prismquery::indexing::{FieldCategory, IndexManifest, IndexerRegistry, ManifestCatalog, ManifestMode};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde_json::{json, Value};

const COLUMNS: [&str; 3] = ["a", "b", "c"];

fn random_value(rng: &mut StdRng) -> Value {
    match rng.gen_range(0..5) {
        0 => Value::Null,
        _ => json!(rng.gen_range(0..6)),
    }
}

fn random_key_value(rng: &mut StdRng) -> Value {
    if rng.gen_bool(0.1) {
        Value::Null
    } else {
        json!(format!("doc{}", rng.gen_range(0..6)))
    }
}

/// Leaves on the primary key exercise the exclusion diversion and the
/// impossible-filter recognition
fn random_key_leaf(rng: &mut StdRng) -> FilterNode {
    match rng.gen_range(0..3) {
        0 => FilterNode::eq("_id", random_key_value(rng)),
        1 => {
            let len = rng.gen_range(0..3);
            let options = (0..len).map(|_| random_key_value(rng)).collect();
            FilterNode::is_in("_id", options)
        }
        _ => FilterNode::gt("_id", json!(format!("doc{}", rng.gen_range(0..6)))),
    }
}

fn random_leaf(rng: &mut StdRng) -> FilterNode {
    if rng.gen_bool(0.15) {
        return random_key_leaf(rng);
    }
    let column = COLUMNS[rng.gen_range(0..COLUMNS.len())];
    match rng.gen_range(0..6) {
        0 => FilterNode::eq(column, random_value(rng)),
        1 => FilterNode::lt(column, json!(rng.gen_range(0..6))),
        2 => FilterNode::gt(column, json!(rng.gen_range(0..6))),
        3 => {
            let len = rng.gen_range(0..4);
            let options = (0..len).map(|_| random_value(rng)).collect();
            FilterNode::is_in(column, options)
        }
        4 => FilterNode::isnull(column, rng.gen_bool(0.5)),
        _ => {
            let lo = rng.gen_range(0..4);
            let hi = lo + rng.gen_range(0..4);
            FilterNode::range(column, json!(lo), json!(hi))
        }
    }
}

fn random_tree(rng: &mut StdRng, depth: u32) -> FilterNode {
    let node = if depth == 0 || rng.gen_bool(0.4) {
        random_leaf(rng)
    } else {
        let children = (0..rng.gen_range(1..=3))
            .map(|_| random_tree(rng, depth - 1))
            .collect();
        if rng.gen_bool(0.5) {
            FilterNode::and(children)
        } else {
            FilterNode::or(children)
        }
    };
    if rng.gen_bool(0.25) {
        FilterNode::not(node)
    } else {
        node
    }
}

fn random_doc(rng: &mut StdRng, id: usize) -> Value {
    let mut doc = serde_json::Map::new();
    doc.insert("_id".to_string(), json!(format!("doc{}", id)));
    for column in COLUMNS {
        // Sometimes the field is absent entirely
        if rng.gen_bool(0.85) {
            doc.insert(column.to_string(), random_value(rng));
        }
    }
    Value::Object(doc)
}

#[test]
fn test_compiled_union_equals_direct_evaluation() {
    let registry = IndexerRegistry::with_builtins();
    let manifest = ManifestCatalog::in_memory(IndexManifest::new(), ManifestMode::Strict);
    let fields = MapCatalog::with_fields([
        ("a", FieldCategory::Number),
        ("b", FieldCategory::Number),
        ("c", FieldCategory::Number),
    ]);
    let compiler = QueryCompiler::with_config(
        &registry,
        &manifest,
        &fields,
        prismquery::compiler::CompilerConfig::new().with_max_branches(200),
    );

    let mut rng = StdRng::seed_from_u64(0x5eed);
    let mut checked = 0;
    for case in 0..300 {
        let tree = random_tree(&mut rng, 3);
        let query = FilterQuery::new("t", tree.clone());
        let compiled = match compiler.compile(&query) {
            Ok(compiled) => compiled,
            // Complexity rejections are legitimate outcomes for random trees
            Err(CompileError::QueryTooComplex { .. }) => continue,
            Err(other) => panic!("case {}: unexpected error {:?}", case, other),
        };

        for doc_id in 0..40 {
            let doc = random_doc(&mut rng, doc_id);
            let expected = matches_tree(&doc, &tree);
            let actual = compiled.matches(&doc, "_id");
            assert_eq!(
                expected, actual,
                "case {}: divergence on {} for tree {:?}",
                case, doc, tree
            );
        }
        checked += 1;
    }
    assert!(checked > 50, "too few trees survived compilation: {}", checked);
}

#[test]
fn test_negated_key_conjunction_agrees_with_direct_evaluation() {
    let registry = IndexerRegistry::with_builtins();
    let manifest = ManifestCatalog::in_memory(IndexManifest::new(), ManifestMode::Strict);
    let fields = MapCatalog::with_fields([("a", FieldCategory::Number)]);
    let compiler = QueryCompiler::new(&registry, &manifest, &fields);

    // NOT (pk = k1 AND a = 5) is a disjunction after De Morgan: a record
    // with pk = k1 but a != 5 must still match
    let tree = FilterNode::not(FilterNode::and(vec![
        FilterNode::eq("_id", json!("k1")),
        FilterNode::eq("a", json!(5)),
    ]));
    let compiled = compiler
        .compile(&FilterQuery::new("t", tree.clone()))
        .unwrap();

    for (id, a) in [("k1", 3), ("k1", 5), ("k2", 5), ("k2", 3)] {
        let doc = json!({"_id": id, "a": a});
        assert_eq!(
            matches_tree(&doc, &tree),
            compiled.matches(&doc, "_id"),
            "divergence on {}",
            doc
        );
    }
}

#[test]
fn test_exclusion_queries_agree_with_direct_evaluation() {
    let registry = IndexerRegistry::with_builtins();
    let manifest = ManifestCatalog::in_memory(IndexManifest::new(), ManifestMode::Strict);
    let fields = MapCatalog::with_fields([("a", FieldCategory::Number)]);
    let compiler = QueryCompiler::new(&registry, &manifest, &fields);

    let tree = FilterNode::and(vec![
        FilterNode::eq("a", json!(1)),
        FilterNode::not(FilterNode::eq("_id", json!("doc1"))),
        FilterNode::not(FilterNode::is_in("_id", vec![json!("doc2"), json!("doc3")])),
    ]);
    let compiled = compiler
        .compile(&FilterQuery::new("t", tree.clone()))
        .unwrap();

    for id in 0..6 {
        for a in [json!(0), json!(1)] {
            let doc = json!({"_id": format!("doc{}", id), "a": a});
            assert_eq!(
                matches_tree(&doc, &tree),
                compiled.matches(&doc, "_id"),
                "divergence on {}",
                doc
            );
        }
    }
}
