// tests/model_config.rs
use baleen_entity_consumer::analyze::{EntityExtractor, SentimentModel};
use baleen_entity_consumer::errors::ModelError;
use baleen_entity_consumer::{Enricher, EnrichmentModel};
use std::path::{Path, PathBuf};
use std::{env, fs};

#[test]
fn example_rules_file_parses() {
    let ner = EntityExtractor::from_path(Path::new(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/config/entity_rules.example.toml"
    )))
    .unwrap();
    assert_eq!(ner.rule_count(), 4);
    let out = ner.extract("Rotational labs and Acme Corp met Dr. Ada Lovelace in Paris");
    assert_eq!(out["Rotational Labs"], "ORG");
    assert_eq!(out["Acme Corp"], "ORG");
    assert_eq!(out["Ada Lovelace"], "PERSON");
    assert_eq!(out["Paris"], "GPE");
}

/// Switches the working directory and restores it on drop, even if the test panics.
struct CwdGuard(PathBuf);

impl CwdGuard {
    fn enter(dir: &Path) -> Self {
        let old = env::current_dir().unwrap();
        env::set_current_dir(dir).unwrap();
        CwdGuard(old)
    }
}

impl Drop for CwdGuard {
    fn drop(&mut self) {
        let _ = env::set_current_dir(&self.0);
    }
}

#[serial_test::serial]
#[test]
fn default_lookup_prefers_config_dir_then_builtin() {
    // Isolate CWD so the repo's own config/ is not picked up.
    let tmp = tempfile::tempdir().unwrap();
    let _cwd = CwdGuard::enter(tmp.path());

    // 1) Nothing on disk -> built-in rules
    let ner = EntityExtractor::load(None).unwrap();
    assert_eq!(ner.extract("Acme Corp")["Acme Corp"], "ORG");

    // 2) JSON fallback in ./config/
    let cfg_dir = tmp.path().join("config");
    fs::create_dir_all(&cfg_dir).unwrap();
    fs::write(
        cfg_dir.join("entity_rules.json"),
        r#"{"rules":[{"label":"PRODUCT","regex":"\\bWidget\\b"}]}"#,
    )
    .unwrap();
    let ner = EntityExtractor::load(None).unwrap();
    assert_eq!(ner.rule_count(), 1);
    assert!(ner.extract("Acme Corp").is_empty());

    // 3) TOML wins over JSON
    fs::write(
        cfg_dir.join("entity_rules.toml"),
        "[[rules]]\nlabel = \"GPE\"\nregex = \"\\\\bOslo\\\\b\"\n",
    )
    .unwrap();
    let ner = EntityExtractor::load(None).unwrap();
    assert_eq!(ner.extract("Oslo")["Oslo"], "GPE");
}

#[serial_test::serial]
#[test]
fn cwd_is_restored_after_a_failing_test_body() {
    let before = env::current_dir().unwrap();
    let tmp = tempfile::tempdir().unwrap();
    let outcome = std::panic::catch_unwind(|| {
        let _cwd = CwdGuard::enter(tmp.path());
        panic!("assertion inside the switched directory");
    });
    assert!(outcome.is_err());
    assert_eq!(env::current_dir().unwrap(), before);
}

#[test]
fn bad_lexicon_fails_model_load() {
    let dir = tempfile::tempdir().unwrap();
    let p = dir.path().join("lexicon.json");
    fs::write(&p, "{ not json").unwrap();
    let err = EnrichmentModel::load(Some(p.as_path()), None).unwrap_err();
    assert!(matches!(err, ModelError::Parse { .. }));
}

#[test]
fn custom_lexicon_drives_sentiment() {
    let dir = tempfile::tempdir().unwrap();
    let lex = dir.path().join("lexicon.json");
    fs::write(&lex, r#"{"meh": -1, "yay": 2}"#).unwrap();
    let rules = dir.path().join("rules.json");
    fs::write(&rules, r#"{"rules":[]}"#).unwrap();

    let model = EnrichmentModel::new(
        SentimentModel::from_path(&lex).unwrap(),
        EntityExtractor::from_path(&rules).unwrap(),
    );
    let out = model.enrich("Yay. Meh. Yay.").unwrap();
    assert!(out.entities.is_empty());
    assert!((out.sentiment - 2.0 / 3.0).abs() < 1e-6);

    let loaded = EnrichmentModel::load(Some(lex.as_path()), Some(rules.as_path())).unwrap();
    assert_eq!(loaded.enrich("meh").unwrap().sentiment, 0.0);
}
