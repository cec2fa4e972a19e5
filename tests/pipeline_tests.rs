//! End-to-end pipeline tests
//!
//! Compile fixture schemas and check the properties independent builders rely
//! on: stable hashes, ledger linking and all-or-nothing builds.

use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use rstest::rstest;
use tempfile::tempdir;

use distributed_interfaces::compose::{resolve_compositions, sort_compositions};
use distributed_interfaces::config::{BuildSection, HistoryEntry};
use distributed_interfaces::{
    build, compile, BuildConfig, Checksum, Compilation, Definition, FsStorage, InterfaceKind,
    PreviousVersion, SchemaError, SourceText, Storage,
};

fn fixtures_path() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn fixture(name: &str) -> SourceText {
    let path = fixtures_path().join(name);
    SourceText::new(name, fs::read_to_string(path).unwrap())
}

fn compile_text(text: &str, config: &BuildConfig) -> Result<Compilation, SchemaError> {
    compile(&[SourceText::new("inline.di", text)], config)
}

fn blog_sources() -> Vec<SourceText> {
    FsStorage::new(fixtures_path().join("blog"), fixtures_path().join("unused"))
        .read_sources()
        .unwrap()
}

fn blog_config() -> BuildConfig {
    BuildConfig::new("http://localhost:3000").with_composition("Timestamps")
}

// =============================================================================
// Minimal schema
// =============================================================================

#[test]
fn test_minimal_model_end_to_end() {
    let compilation = compile_text("model User { name string }", &BuildConfig::default()).unwrap();

    let user = &compilation.canonical.model("User").unwrap().model;
    let names: Vec<_> = user.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["_change", "_created_at", "_id", "_updated_at", "name"]);

    let encoded = compilation.interface("User").unwrap();
    assert_eq!(
        encoded.text,
        "model User {\n\t_change int64\n\t_created_at int64-\n\t_id string\n\t_updated_at int64\n\tname string\n}"
    );

    let entry = compilation.ledger.get("User").unwrap();
    assert_eq!(entry.root, Checksum::of("User"));
    assert_eq!(entry.prev, entry.root);
    assert_eq!(entry.file, Checksum::of(&encoded.text));
}

// =============================================================================
// Ledger history
// =============================================================================

#[test]
fn test_genesis_previous_links_to_root() {
    let config = BuildConfig::default().with_previous("User", PreviousVersion::Genesis);
    let compilation = compile_text("model User { name string }", &config).unwrap();
    let entry = compilation.ledger.get("User").unwrap();
    assert_eq!(entry.prev, entry.root);
    assert!(!compilation.is_unchanged("User"));
}

#[test]
fn test_remote_hash_is_case_insensitive_and_skips_unchanged() {
    let schema = "model User { name string }\nmodel Post { title string }";
    let first = compile_text(schema, &BuildConfig::default()).unwrap();
    let user_hash = first.interface("User").unwrap().file.clone();

    let section = BuildSection {
        remote: vec![HistoryEntry {
            name: "User".into(),
            hash: Some(user_hash.to_upper()),
        }],
        ..BuildSection::default()
    };
    let config = BuildConfig::try_from(&section).unwrap();

    let dir = tempdir().unwrap();
    let schema_file = dir.path().join("schema.di");
    fs::write(&schema_file, schema).unwrap();
    let build_dir = dir.path().join("build");
    let mut storage = FsStorage::new(&schema_file, &build_dir);

    let compilation = build(&mut storage, &config).unwrap();
    let entry = compilation.ledger.get("User").unwrap();
    assert_eq!(entry.prev.as_str(), user_hash.as_str());
    assert_eq!(entry.prev.as_str(), user_hash.to_upper().to_ascii_lowercase());

    let user_file = build_dir.join(compilation.interface("User").unwrap().file_path());
    let post_file = build_dir.join(compilation.interface("Post").unwrap().file_path());
    assert!(!user_file.exists());
    assert!(post_file.exists());

    let ledger: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(build_dir.join("ledger.json")).unwrap()).unwrap();
    assert_eq!(ledger["User"]["prev"], user_hash.as_str());
}

// =============================================================================
// Determinism
// =============================================================================

#[rstest]
#[case("user_reversed.di")]
#[case("user_shuffled.di")]
fn test_field_order_does_not_change_hash(#[case] permuted: &str) {
    let config = BuildConfig::default();
    let expected = compile(&[fixture("user_forward.di")], &config).unwrap();
    let actual = compile(&[fixture(permuted)], &config).unwrap();
    assert_eq!(
        actual.interface("User").unwrap().file,
        expected.interface("User").unwrap().file
    );
}

#[test]
fn test_source_order_does_not_change_output() {
    let config = blog_config();
    let mut sources = blog_sources();
    let forward = compile(&sources, &config).unwrap();
    sources.reverse();
    let reversed = compile(&sources, &config).unwrap();

    assert_eq!(forward.interfaces, reversed.interfaces);
    assert_eq!(forward.ledger, reversed.ledger);
    assert_eq!(forward.definition, reversed.definition);
}

#[test]
fn test_compilation_is_idempotent() {
    let config = blog_config();
    let first = compile(&blog_sources(), &config).unwrap();
    let second = compile(&blog_sources(), &config).unwrap();
    for (a, b) in first.interfaces.iter().zip(&second.interfaces) {
        assert_eq!(a.text, b.text);
        assert_eq!(a.file, b.file);
    }
}

#[test]
fn test_any_specifier_change_changes_hash() {
    let config = BuildConfig::default();
    let base = compile_text("model A { n int gt(1) }", &config).unwrap();
    for variant in [
        "model A { n int gt(2) }",
        "model A { n int gte(1) }",
        "model A { n int? gt(1) }",
        "model A { n int- gt(1) }",
        "model A { n int unique gt(1) }",
        "model A { n int64 gt(1) }",
    ] {
        let other = compile_text(variant, &config).unwrap();
        assert_ne!(
            other.interface("A").unwrap().file,
            base.interface("A").unwrap().file,
            "{}",
            variant
        );
    }
}

// =============================================================================
// Composition
// =============================================================================

#[test]
fn test_composed_fields_precede_own_fields() {
    let sources = [SourceText::new(
        "inline.di",
        "model A { own string\n B }\nmodel B { b2 int\n b1 int }",
    )];
    let schema = distributed_interfaces::compiler::parse_sources(&sources).unwrap();
    let mut models = schema.models.clone();
    sort_compositions(&mut models);
    let resolved = resolve_compositions(&models).unwrap();
    let names: Vec<_> = resolved[0].fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["b2", "b1", "own"]);

    let compilation = compile(&sources, &BuildConfig::default()).unwrap();
    let a = &compilation.canonical.model("A").unwrap().model;
    let names: Vec<_> = a.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        names,
        vec!["_change", "_created_at", "_id", "_updated_at", "b1", "b2", "own"]
    );
}

#[test]
fn test_composed_annotations_precede_own() {
    let text = "model A { @own()\n C\n B }\nmodel B { @b1()\n @b2() }\nmodel C { @c(x)\n D }\nmodel D { @d() }";
    let compilation = compile_text(text, &BuildConfig::default()).unwrap();

    let annotations = |name: &str| -> Vec<String> {
        let model = &compilation.canonical.model(name).unwrap().model;
        model.annotations.iter().map(|a| a.name.clone()).collect()
    };
    assert_eq!(annotations("A"), vec!["b1", "b2", "d", "c", "own"]);
    assert_eq!(annotations("C"), vec!["d", "c"]);
    assert_eq!(annotations("B"), vec!["b1", "b2"]);
}

#[test]
fn test_composition_list_order_is_irrelevant() {
    let config = BuildConfig::default();
    let base = "model X { x int }\nmodel Y { y int }\n";
    let one = compile_text(&format!("{}model A {{ X\n Y }}", base), &config).unwrap();
    let two = compile_text(&format!("{}model A {{ Y\n X }}", base), &config).unwrap();
    assert_eq!(one.interface("A").unwrap().file, two.interface("A").unwrap().file);
}

#[rstest]
#[case("model A { A }", vec!["A", "A"])]
#[case("model A { B }\nmodel B { A }", vec!["A", "B", "A"])]
#[case("model A { B }\nmodel B { C }\nmodel C { B }", vec!["B", "C", "B"])]
fn test_composition_cycles(#[case] text: &str, #[case] path: Vec<&str>) {
    match compile_text(text, &BuildConfig::default()) {
        Err(SchemaError::CompositionCycle { path: found }) => assert_eq!(found, path),
        other => panic!("expected cycle, got {:?}", other.map(|c| c.ledger)),
    }
}

#[test]
fn test_deep_cycle_terminates() {
    let depth = 50_000;
    let text: String = (0..depth)
        .map(|i| format!("model M{} {{ M{} }}\n", i, (i + 1) % depth))
        .collect();
    match compile_text(&text, &BuildConfig::default()) {
        Err(SchemaError::CompositionCycle { path }) => {
            assert_eq!(path.len(), depth + 1);
            assert_eq!(path.first(), path.last());
        }
        other => panic!("expected cycle, got {:?}", other.map(|c| c.ledger)),
    }
}

#[test]
fn test_deep_chain_resolves() {
    let depth = 200;
    let mut text: String = (0..depth - 1)
        .map(|i| format!("model M{} {{ M{}\n f{} int }}\n", i, i + 1, i))
        .collect();
    text.push_str(&format!("model M{} {{ f{} int }}\n", depth - 1, depth - 1));

    let compilation = compile_text(&text, &BuildConfig::default()).unwrap();
    assert_eq!(compilation.canonical.model("M0").unwrap().model.fields.len(), depth + 4);
}

#[test]
fn test_missing_models_reported_together() {
    let text = "model A { Zed\n Gone }\nrelation { a A\n b Nowhere[] }";
    match compile_text(text, &BuildConfig::default()) {
        Err(SchemaError::MissingModels(names)) => {
            assert_eq!(names, vec!["Gone", "Nowhere", "Zed"])
        }
        other => panic!("expected missing models, got {:?}", other.map(|c| c.ledger)),
    }
}

#[test]
fn test_relation_to_remote_model() {
    let config = BuildConfig::default().with_remote("Org", Checksum::of("org"));
    let compilation = compile_text("model A { x int }\nrelation { a A?\n org Org[] }", &config).unwrap();
    assert!(compilation.ledger.get("A-Org-a-org").is_some());
}

// =============================================================================
// Relations
// =============================================================================

#[rstest]
#[case::empty("relation { }")]
#[case::three_fields("relation { a A?\n b A[]\n c A[] }")]
#[case::both_nullable("relation { a A?\n b A? }")]
#[case::both_required("relation { a A\n b A }")]
#[case::required_self("relation { a A }")]
fn test_invalid_relation_shapes(#[case] relation: &str) {
    let text = format!("model A {{ x int }}\n{}", relation);
    assert!(matches!(
        compile_text(&text, &BuildConfig::default()),
        Err(SchemaError::RelationShape { .. })
    ));
}

#[rstest]
#[case::one_to_many("relation { a A\n b A[] }")]
#[case::optional_one_to_one("relation { a A?\n b A }")]
#[case::self_relation("relation { a A? mutual }")]
fn test_valid_relation_shapes(#[case] relation: &str) {
    let text = format!("model A {{ x int }}\n{}", relation);
    assert!(compile_text(&text, &BuildConfig::default()).is_ok());
}

#[test]
fn test_relation_identity_and_encoding() {
    let compilation = compile(&blog_sources(), &blog_config()).unwrap();
    let relation = compilation.interface("Post-User-posts-author").unwrap();
    assert_eq!(relation.kind, InterfaceKind::Relation);
    assert_eq!(
        relation.text,
        "relation {\n\tauthor User delete(cascade)\n\tposts Post[]\n}"
    );
    assert_eq!(
        compilation.interface("User-mentor").unwrap().text,
        "relation {\n\tmentor User? mutual\n}"
    );
}

// =============================================================================
// Build directory
// =============================================================================

#[test]
fn test_blog_build_directory() {
    let dir = tempdir().unwrap();
    let build_dir = dir.path().join("build");
    let mut storage = FsStorage::new(fixtures_path().join("blog"), &build_dir);
    let compilation = build(&mut storage, &blog_config()).unwrap();

    assert_eq!(compilation.interfaces.len(), 5);
    for interface in &compilation.interfaces {
        let written = fs::read_to_string(build_dir.join(interface.file_path())).unwrap();
        assert_eq!(written, interface.text);
    }

    let definition: Definition =
        serde_json::from_str(&fs::read_to_string(build_dir.join("definition.json")).unwrap())
            .unwrap();
    assert_eq!(definition.server, "http://localhost:3000");
    assert_eq!(definition.models.keys().collect::<Vec<_>>(), vec!["Post", "User"]);
    assert_eq!(definition.compositions.keys().collect::<Vec<_>>(), vec!["Timestamps"]);
    assert_eq!(
        definition.models["User"],
        compilation.interface("User").unwrap().file.to_upper()
    );

    let linked: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(build_dir.join("linked.json")).unwrap()).unwrap();
    let user_id = compilation.interface("User").unwrap().file.to_upper();
    assert_eq!(linked[&user_id]["name"], "User");
    assert_eq!(linked[&user_id]["compositions"][0]["name"], "Timestamps");

    let manifest: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(build_dir.join("manifest.json")).unwrap()).unwrap();
    assert_eq!(manifest["stats"]["models"], 2);
    assert_eq!(manifest["stats"]["compositions"], 1);
    assert_eq!(manifest["stats"]["relations"], 2);
}

#[test]
fn test_failed_build_keeps_previous_output() {
    let dir = tempdir().unwrap();
    let schema_file = dir.path().join("schema.di");
    let build_dir = dir.path().join("build");

    fs::write(&schema_file, "model A { x int }").unwrap();
    let mut storage = FsStorage::new(&schema_file, &build_dir);
    build(&mut storage, &BuildConfig::default()).unwrap();
    let ledger_before = fs::read_to_string(build_dir.join("ledger.json")).unwrap();

    fs::write(&schema_file, "model A { x int\n").unwrap();
    assert!(matches!(
        build(&mut storage, &BuildConfig::default()),
        Err(SchemaError::Syntax { line: 2, .. })
    ));
    assert_eq!(fs::read_to_string(build_dir.join("ledger.json")).unwrap(), ledger_before);
}
