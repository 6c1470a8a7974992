use wc_domain::config::EndpointConfig;
use wc_domain::registration::{QName, RegistrationState};
use wc_registry::{FileRegistry, ProducerRecord, ProducerRegistry};

fn record(id: &str) -> ProducerRecord {
    let mut registration = RegistrationState::new("portal");
    registration.set_property_value(QName::new("urn:acme", "email"), Some("ops@acme.test".into()));
    registration.mark_registered("handle-1".into(), Some(vec![7, 7]));
    ProducerRecord {
        id: id.into(),
        endpoint: EndpointConfig::new("http://a/wsrp http://b/wsrp"),
        registration,
        cache_ttl_secs: 120,
        active: true,
        updated_at: chrono::Utc::now(),
    }
}

#[test]
fn records_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let reg = FileRegistry::open(dir.path()).unwrap();
        reg.save(&record("remote")).unwrap();
        assert!(reg.path().exists());
    }

    let reopened = FileRegistry::open(dir.path()).unwrap();
    let loaded = reopened.load("remote").unwrap().expect("record persisted");
    assert_eq!(loaded, record_with_time("remote", loaded.updated_at));
    assert_eq!(loaded.registration.handle(), Some("handle-1"));
    assert_eq!(loaded.registration.opaque_state(), Some(&[7u8, 7][..]));
}

fn record_with_time(id: &str, at: chrono::DateTime<chrono::Utc>) -> ProducerRecord {
    let mut r = record(id);
    r.updated_at = at;
    r
}

#[test]
fn remove_is_persisted() {
    let dir = tempfile::tempdir().unwrap();
    let reg = FileRegistry::open(dir.path()).unwrap();
    reg.save(&record("a")).unwrap();
    reg.save(&record("b")).unwrap();
    assert!(reg.remove("a").unwrap());
    assert!(!reg.remove("missing").unwrap());

    let reopened = FileRegistry::open(dir.path()).unwrap();
    let ids: Vec<_> = reopened.list().unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["b"]);
}

#[test]
fn corrupt_file_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let producers = dir.path().join("producers");
    std::fs::create_dir_all(&producers).unwrap();
    std::fs::write(producers.join("producers.json"), "{not json").unwrap();

    let err = FileRegistry::open(dir.path()).unwrap_err();
    assert!(err.to_string().contains("parsing"));
}
