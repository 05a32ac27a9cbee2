//! End-to-end scenarios: text → trees → mappings → edit script.

use facet_testhelpers::test;
use gumleaf::indextree::NodeId;
use gumleaf::matching::GreedySubtreeMatcher;
use gumleaf::{
    Config, ConfigOption, DiffOptions, MappingStore, Matcher, MatcherDescriptor, NodePath,
    ScriptKind, Strategy, Tree, TreeGenerator, compute_mappings, diff_trees, replay,
};
use gumleaf_sexp::SexpGenerator;

fn sexp(text: &str) -> Tree {
    SexpGenerator.generate_from_str(text).unwrap()
}

fn at(tree: &Tree, path: &str) -> NodeId {
    let path: NodePath = path.parse().unwrap();
    tree.node_at(&path).unwrap()
}

const INCREMENT: &str = r#"
(ExpressionStatement
  (PostfixExpression (SimpleName "i") (Operator "++")))
"#;

const DECREMENT: &str = r#"
(ExpressionStatement
  (PostfixExpression (SimpleName "i") (Operator "--")))
"#;

#[test]
fn test_trivial_value_change() {
    let src = sexp(INCREMENT);
    let dst = sexp(DECREMENT);

    for strategy in Strategy::ALL {
        let options = DiffOptions {
            strategy,
            ..DiffOptions::default()
        };
        let diff = diff_trees(&src, &dst, &options);
        assert_eq!(diff.mappings.len(), 4, "{strategy}");
        assert!(diff.mappings.has(at(&src, "0.1"), at(&dst, "0.1")));
        assert_eq!(diff.script.len(), 1, "{strategy}:\n{}", diff.script);
        assert_eq!(diff.script.count("update-node"), 1);
    }
}

const CLASS_BEFORE: &str = r#"
(CompilationUnit
  (ImportDeclaration (QualifiedName "java.util.List"))
  (ImportDeclaration (QualifiedName "java.util.Map"))
  (TypeDeclaration "Foo"
    (FieldDeclaration
      (SimpleType (SimpleName "String"))
      (VariableDeclarationFragment (SimpleName "name")))
    (MethodDeclaration "bar"
      (PrimitiveType "void")
      (Block (ReturnStatement)))))
"#;

const CLASS_AFTER: &str = r#"
(CompilationUnit
  (ImportDeclaration (QualifiedName "java.util.List"))
  (ImportDeclaration (QualifiedName "java.util.Set"))
  (ImportDeclaration (QualifiedName "java.util.Map"))
  (TypeDeclaration "Bar"
    (FieldDeclaration
      (SimpleType (SimpleName "String"))
      (VariableDeclarationFragment (SimpleName "name")))
    (MethodDeclaration "bar"
      (PrimitiveType "void")
      (Block (ReturnStatement)))))
"#;

#[test]
fn test_import_noise_is_not_reported_as_churn() {
    let src = sexp(CLASS_BEFORE);
    let dst = sexp(CLASS_AFTER);

    for (strategy, script) in [
        (Strategy::ClassicGumtree, ScriptKind::Classic),
        (Strategy::SimpleGumtree, ScriptKind::Simplified),
    ] {
        let options = DiffOptions {
            strategy,
            script,
            ..DiffOptions::default()
        };
        let diff = diff_trees(&src, &dst, &options);

        // every source node survives
        assert!(
            src.pre_order().all(|id| diff.mappings.is_src_mapped(id)),
            "{strategy}"
        );
        assert!(diff.mappings.has(at(&src, "1"), at(&dst, "2")));
        assert!(diff.mappings.has(at(&src, "2"), at(&dst, "3")));

        assert_eq!(diff.script.count("update-node"), 1, "{}", diff.script);
        assert_eq!(diff.script.count("move-node"), 0, "{}", diff.script);
        assert_eq!(diff.script.count("delete-node"), 0);
        assert_eq!(diff.script.count("delete-tree"), 0);
        // the one added import is the only insertion
        let (action, expected) = match script {
            ScriptKind::Classic => ("insert-node", 2),
            ScriptKind::Simplified => ("insert-tree", 1),
        };
        assert_eq!(diff.script.count(action), expected, "{}", diff.script);
        assert_eq!(diff.script.len(), expected + 1);
    }
}

#[test]
fn test_duplicate_imports_leave_one_update() {
    let src = sexp(
        r#"(CompilationUnit
             (PackageDeclaration (Name "p"))
             (ImportDeclaration (QualifiedName "java.util.List"))
             (ImportDeclaration (QualifiedName "java.util.List"))
             (TypeDeclaration "A" (FieldDeclaration "x" (NumberLiteral "1"))))"#,
    );
    let dst = sexp(
        r#"(CompilationUnit
             (PackageDeclaration (Name "p"))
             (ImportDeclaration (QualifiedName "java.util.List"))
             (ImportDeclaration (QualifiedName "java.util.List"))
             (TypeDeclaration "A" (FieldDeclaration "x" (NumberLiteral "2"))))"#,
    );
    let eager = Config::new().with(ConfigOption::StMinPrio, 1).unwrap();

    for config in [Config::default(), eager] {
        for strategy in Strategy::ALL {
            for script in ScriptKind::ALL {
                let options = DiffOptions {
                    strategy,
                    script,
                    config: config.clone(),
                };
                let diff = diff_trees(&src, &dst, &options);
                let context = format!("{strategy}/{script:?}/{config:?}:\n{}", diff.script);

                assert_eq!(diff.script.len(), 1, "{context}");
                assert_eq!(diff.script.count("update-node"), 1, "{context}");
                for child in ["0", "1", "2", "3"] {
                    assert!(diff.mappings.is_src_mapped(at(&src, child)), "{child} {context}");
                }
                // the identical imports keep their order
                assert!(diff.mappings.has(at(&src, "1"), at(&dst, "1")), "{context}");
                assert!(diff.mappings.has(at(&src, "2"), at(&dst, "2")), "{context}");
            }
        }
    }
}

#[test]
fn test_call_shapes_are_not_isomorphic() {
    // a(b);
    let call = sexp(
        r#"(ExpressionStatement
             (MethodInvocation (SimpleName "a") (Arguments (SimpleName "b"))))"#,
    );
    // a.b();
    let field_call = sexp(
        r#"(ExpressionStatement
             (MethodInvocation (FieldAccess (SimpleName "a") (SimpleName "b")) (Arguments)))"#,
    );

    assert!(!call.is_isomorphic_to(&field_call));
    assert!(!field_call.is_isomorphic_to(&call));
    assert!(call.is_isomorphic_to(&call));

    let diff = diff_trees(&call, &field_call, &DiffOptions::default());
    assert!(!diff.script.is_empty());
}

#[test]
fn test_self_diff_is_empty() {
    let tree = sexp(CLASS_BEFORE);
    for strategy in Strategy::ALL {
        for script in ScriptKind::ALL {
            let options = DiffOptions {
                strategy,
                script,
                ..DiffOptions::default()
            };
            let diff = diff_trees(&tree, &tree, &options);
            assert!(diff.script.is_empty(), "{}", diff.script);
            assert_eq!(diff.mappings.len(), tree.len());
        }
    }
}

#[test]
fn test_min_size_threshold_is_monotonic() {
    let src = sexp(
        r#"(TypeDeclaration "A"
             (FieldDeclaration "x" (SimpleName "a"))
             (MethodDeclaration "m" (Block (ReturnStatement)) (Parameter "p")))"#,
    );
    let dst = sexp(
        r#"(TypeDeclaration "A"
             (FieldDeclaration "y" (SimpleName "a"))
             (MethodDeclaration "n" (Block (ReturnStatement)) (Parameter "p")))"#,
    );
    // leaves take part in top-down matching; no recovery to blur the result
    let base = Config::new()
        .with(ConfigOption::StMinHeight, 0)
        .unwrap()
        .with(ConfigOption::BuMaxSize, 0)
        .unwrap();

    let mappings = |min_size: usize| {
        let config = base.clone().with(ConfigOption::BuMinSize, min_size).unwrap();
        compute_mappings(&src, &dst, Strategy::ClassicGumtree, &config)
    };
    let loose = mappings(1);
    let strict = mappings(2);

    let field = (at(&src, "0"), at(&dst, "0"));
    let method = (at(&src, "1"), at(&dst, "1"));
    assert!(loose.has(field.0, field.1));
    assert!(!strict.is_src_mapped(field.0));
    assert!(loose.has(method.0, method.1));
    assert!(strict.has(method.0, method.1));

    // the stricter run only loses pairs
    assert!(strict.pairs().all(|(s, d)| loose.has(s, d)));
    assert_eq!(loose.len(), strict.len() + 1);
}

#[test]
fn test_ambiguous_groups_wait_for_min_priority() {
    let src = sexp(r#"(Block (Statement (Name "x")) (Return))"#);
    let dst = sexp(r#"(Block (Statement (Name "x")) (Statement (Name "x")) (Return))"#);

    let top_down = |min_prio: usize| {
        let config = Config::new().with(ConfigOption::StMinPrio, min_prio).unwrap();
        GreedySubtreeMatcher::new(&config).match_trees(&src, &dst, MappingStore::new())
    };

    let eager = top_down(1);
    assert!(eager.has(at(&src, "0"), at(&dst, "0")));
    assert!(eager.has(at(&src, "0.0"), at(&dst, "0.0")));

    let patient = top_down(2);
    assert!(!patient.is_src_mapped(at(&src, "0")));
}

#[test]
fn test_simplified_is_never_longer() {
    let src = sexp(
        r#"(Block
             (ExpressionStatement (MethodInvocation (SimpleName "save") (SimpleName "doc")))
             (ReturnStatement))"#,
    );
    let dst = sexp(
        r#"(Block
             (IfStatement
               (PrefixExpression (Operator "!") (SimpleName "readOnly"))
               (Block
                 (ExpressionStatement (MethodInvocation (SimpleName "save") (SimpleName "doc")))))
             (ReturnStatement))"#,
    );

    for strategy in Strategy::ALL {
        let mappings = compute_mappings(&src, &dst, strategy, &Config::default());
        let classic = ScriptKind::Classic.generate(&src, &dst, &mappings);
        let simplified = ScriptKind::Simplified.generate(&src, &dst, &mappings);
        assert!(simplified.len() < classic.len(), "{classic}\n{simplified}");
        assert_eq!(simplified.count("insert-tree"), 1);
        for script in [&classic, &simplified] {
            let out = replay(&src, &dst, script).unwrap();
            assert!(out.is_isomorphic_to(&dst));
        }
    }
}

#[test]
fn test_descriptor_round_trip() {
    let text = "ClassicGumtree@GT_BUM_SMT@0.1@GT_BUM_SZT@1500@GT_STM_MH@1";
    let descriptor: MatcherDescriptor = text.parse().unwrap();
    assert_eq!(descriptor.to_string(), text);

    let options = DiffOptions::from_descriptor(text).unwrap();
    assert_eq!(options.strategy, Strategy::ClassicGumtree);
    assert_eq!(options.config.bu_minsim(), 0.1);
    assert_eq!(options.config.bu_maxsize(), 1500);
    assert_eq!(options.config.st_minheight(), 1);

    let src = sexp(INCREMENT);
    let dst = sexp(DECREMENT);
    let diff = diff_trees(&src, &dst, &options);
    assert_eq!(diff.script.count("update-node"), 1);
}
