//! The abbreviated projection of version records.

use mirra_registry::{AbbreviatedVersion, VersionRecord};
use serde_json::Value;

fn extra(record: &VersionRecord, key: &str) -> Option<Value> {
    record.field(key).cloned()
}

/// Derives the abbreviated form of a (normalized) version record.
///
/// `scripts`, readme text and every other field outside the abbreviated
/// format are dropped. Fields absent from `record` stay absent.
pub fn abbreviate(record: &VersionRecord) -> AbbreviatedVersion {
    let dist = record.dist.clone().map(|mut dist| {
        dist.noattachment = None;
        dist
    });

    AbbreviatedVersion {
        name: record.name.clone(),
        version: record.version.clone(),
        deprecated: record.deprecated.clone(),
        dependencies: record.dependencies.clone(),
        optional_dependencies: record.optional_dependencies.clone(),
        dev_dependencies: extra(record, "devDependencies"),
        bundle_dependencies: extra(record, "bundleDependencies")
            .or_else(|| extra(record, "bundledDependencies")),
        peer_dependencies: extra(record, "peerDependencies"),
        peer_dependencies_meta: record.peer_dependencies_meta.clone(),
        bin: extra(record, "bin"),
        os: record.os.clone(),
        cpu: record.cpu.clone(),
        directories: extra(record, "directories"),
        dist,
        engines: extra(record, "engines"),
        workspaces: extra(record, "workspaces"),
        has_shrinkwrap: record.field("_hasShrinkwrap").and_then(Value::as_bool),
        has_install_script: record
            .has_install_script
            .or_else(|| record.declares_install_script().then_some(true)),
        publish_time: record.publish_time,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn record(value: Value) -> VersionRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_field_presence_is_preserved() {
        let v1 = abbreviate(&record(json!({
            "name": "mk2test-module-cnpmsync", "version": "1.0.0",
            "os": ["linux"], "cpu": ["x64"]
        })));
        let v2 = abbreviate(&record(json!({
            "name": "mk2test-module-cnpmsync", "version": "2.0.0",
            "os": ["linux"], "cpu": ["x64"],
            "peerDependenciesMeta": { "foo": { "optional": true } }
        })));
        let v3 = abbreviate(&record(json!({
            "name": "mk2test-module-cnpmsync", "version": "3.0.0",
            "peerDependenciesMeta": { "foo": { "optional": true } }
        })));

        assert_eq!(v1.os.as_deref(), Some(&["linux".to_string()][..]));
        assert_eq!(v1.cpu.as_deref(), Some(&["x64".to_string()][..]));
        assert!(v1.peer_dependencies_meta.is_none());
        assert!(v2.os.is_some() && v2.cpu.is_some() && v2.peer_dependencies_meta.is_some());
        assert!(v3.os.is_none() && v3.cpu.is_none());
        assert!(v3.peer_dependencies_meta.is_some());

        let serialized = serde_json::to_value(&v3).unwrap();
        assert!(serialized.get("os").is_none());
        assert!(serialized.get("cpu").is_none());
    }

    #[test]
    fn test_heavy_fields_are_dropped() {
        let abbreviated = abbreviate(&record(json!({
            "name": "a", "version": "1.0.0",
            "description": "long", "readme": "very long",
            "scripts": { "postinstall": "node x.js" },
            "deprecated": "use b",
            "engines": { "node": ">=8" },
            "_hasShrinkwrap": false,
            "dist": { "shasum": "abc", "noattachment": true }
        })));
        let value = serde_json::to_value(&abbreviated).unwrap();

        assert!(value.get("scripts").is_none());
        assert!(value.get("readme").is_none());
        assert!(value.get("description").is_none());
        assert_eq!(value["hasInstallScript"], json!(true));
        assert_eq!(value["deprecated"], json!("use b"));
        assert_eq!(value["engines"], json!({ "node": ">=8" }));
        assert_eq!(value["_hasShrinkwrap"], json!(false));
        assert!(value["dist"].get("noattachment").is_none());
    }

    #[test]
    fn test_projection_is_deterministic() {
        let input = record(json!({
            "name": "a", "version": "1.0.0",
            "dependencies": { "z": "1", "a": "2" },
            "bin": { "a": "cli.js" }
        }));
        let first = serde_json::to_vec(&abbreviate(&input)).unwrap();
        let second = serde_json::to_vec(&abbreviate(&input)).unwrap();
        assert_eq!(first, second);
    }
}
