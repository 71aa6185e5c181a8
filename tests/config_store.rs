use box_cli::config::{ConfigStore, NamedImageConfig, SaveOutcome};
use box_cli::images::detect::EnvKind;
use box_cli::network::NetworkMode;

fn cfg(ports: &[&str]) -> NamedImageConfig {
    NamedImageConfig {
        environment: Some(EnvKind::Node),
        ports: ports.iter().map(|s| s.to_string()).collect(),
        command: vec!["npm".into(), "start".into()],
        ..NamedImageConfig::default()
    }
}

#[test]
fn test_save_reload_and_overwrite() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let path = dir.path().join("nested").join("config.json");

    let mut store = ConfigStore::load_from(&path);
    let first = cfg(&["3000"]);
    assert_eq!(
        store.save("mydev", first.clone(), false, |_, _| panic!("no prompt for new names")),
        SaveOutcome::Saved { persisted: true }
    );

    let mut reloaded = ConfigStore::load_from(&path);
    assert_eq!(reloaded.get("mydev"), Some(&first));

    let second = NamedImageConfig {
        network: NetworkMode::Internal,
        ..cfg(&["8080:80"])
    };
    assert_eq!(
        reloaded.save("mydev", second.clone(), false, |_, _| false),
        SaveOutcome::Cancelled
    );
    assert_eq!(ConfigStore::load_from(&path).get("mydev"), Some(&first));

    assert_eq!(
        reloaded.save("mydev", second.clone(), true, |_, _| false),
        SaveOutcome::Saved { persisted: true }
    );
    assert_eq!(ConfigStore::load_from(&path).get("mydev"), Some(&second));
}

#[test]
fn test_written_file_uses_current_keys() {
    let dir = tempfile::tempdir().expect("tmpdir");
    let path = dir.path().join("config.json");
    let mut store = ConfigStore::load_from(&path);
    store.save("web", cfg(&["3000"]), true, |_, _| true);

    let text = std::fs::read_to_string(&path).expect("read");
    let v: serde_json::Value = serde_json::from_str(&text).expect("json");
    let web = &v["images"]["web"];
    assert_eq!(web["environment"], "node");
    assert_eq!(web["ports"][0], "3000");
    assert_eq!(web["network"], "unrestricted");
    assert!(v.get("detection").is_none());
}
