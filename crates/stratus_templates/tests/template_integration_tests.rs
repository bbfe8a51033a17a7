//! Integration tests for template resolution and instantiation.

use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::{Arc, Barrier};

use chrono::{TimeZone, Utc};
use serde_json::{json, Value};
use stratus_templates::{instance_base_name, TemplateError, TemplateInstantiator, TFVARS_FILE};
use tempfile::tempdir;

fn seed_template(templates_root: &Path) {
    let web_app = templates_root.join("web-app");
    fs::create_dir_all(web_app.join("modules").join("cdn")).unwrap();
    fs::create_dir_all(web_app.join(".terraform").join("providers")).unwrap();
    fs::write(web_app.join("main.tf"), "module \"cdn\" { source = \"./modules/cdn\" }\n").unwrap();
    fs::write(web_app.join("variables.tf"), "variable \"app_name\" {}\n").unwrap();
    fs::write(web_app.join("modules").join("cdn").join("main.tf"), "# cdn\n").unwrap();
    fs::write(web_app.join(".terraform").join("providers").join("lock"), "stale").unwrap();
    fs::write(web_app.join("terraform.tfstate"), "{}").unwrap();
    fs::write(web_app.join("tfplan"), "binary").unwrap();
}

#[test]
fn test_resolve_then_instantiate() {
    let root = tempdir().unwrap();
    seed_template(&root.path().join("templates"));
    let instantiator = TemplateInstantiator::new(root.path().join("templates"), root.path().join("instances"));

    let template = instantiator.catalog().resolve("web_app").unwrap();
    let name = instance_base_name("Blog", "dev", Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap());
    let config = json!({"app_name": "Blog", "environment": "dev", "scaling": {"min": 1, "max": 3}, "domains": ["a.example.com"]});
    let instance = instantiator.instantiate(template, &name, &config).unwrap();

    assert_eq!(instance.name, "blog-dev-20240102030405");
    assert!(instance.path.join("main.tf").exists());
    assert!(instance.path.join("modules").join("cdn").join("main.tf").exists());
    assert!(!instance.path.join(".terraform").exists());
    assert!(!instance.path.join("terraform.tfstate").exists());
    assert!(!instance.path.join("tfplan").exists());

    let tfvars: Value = serde_json::from_str(&fs::read_to_string(instance.path.join(TFVARS_FILE)).unwrap()).unwrap();
    assert_eq!(tfvars, config);
}

#[test]
fn test_unsupported_type_never_touches_disk() {
    let root = tempdir().unwrap();
    let instantiator = TemplateInstantiator::new(root.path().join("templates"), root.path().join("instances"));

    let err = instantiator.catalog().resolve("unknown_type").unwrap_err();
    assert!(matches!(err, TemplateError::UnsupportedResourceType(ref t) if t == "unknown_type"));
    assert!(!root.path().join("instances").exists());
}

#[test]
fn test_concurrent_instantiation_gets_distinct_directories() {
    let root = tempdir().unwrap();
    seed_template(&root.path().join("templates"));
    let instantiator = Arc::new(TemplateInstantiator::new(
        root.path().join("templates"),
        root.path().join("instances"),
    ));

    let workers = 6;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let instantiator = Arc::clone(&instantiator);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                instantiator
                    .instantiate("web-app", "blog-dev-20240102030405", &json!({"app_name": "blog"}))
                    .unwrap()
                    .name
            })
        })
        .collect();

    let names: HashSet<String> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert_eq!(names.len(), workers);
    assert!(names.contains("blog-dev-20240102030405"));
    assert_eq!(fs::read_dir(root.path().join("instances")).unwrap().count(), workers);
}
