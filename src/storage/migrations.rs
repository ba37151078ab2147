use std::path::Path;

use serde_json::Value;

use crate::storage::StorageError;

type MigrationFn = fn(Value) -> Result<Value, StorageError>;

/// Index `n` upgrades a document from version `n + 1` to `n + 2`.
fn migrations() -> Vec<MigrationFn> {
    vec![]
}

/// Reads the schema version of a parsed store document.
/// A document without a version field predates versioning and counts as v1.
pub fn detect_version(document: &Value, path: &Path) -> Result<u32, StorageError> {
    match document.get("version") {
        None => Ok(1),
        Some(version) => version
            .as_u64()
            .and_then(|n| u32::try_from(n).ok())
            .ok_or_else(|| StorageError::InvalidVersion {
                path: path.to_path_buf(),
            }),
    }
}

/// Upgrades a document step by step: v1 -> v2 -> ... -> `to_version`
pub fn apply_migrations(
    mut document: Value,
    from_version: u32,
    to_version: u32,
) -> Result<Value, StorageError> {
    if from_version > to_version {
        return Err(StorageError::FutureVersion(from_version));
    }

    let steps = migrations();
    for version in from_version..to_version {
        let step = version
            .checked_sub(1)
            .and_then(|index| steps.get(index as usize))
            .ok_or(StorageError::UnsupportedVersion(version))?;
        document = step(document)?;
    }

    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_version_with_version_field() {
        let document = serde_json::json!({"version": 2, "projects": [], "tasks": []});
        assert_eq!(detect_version(&document, Path::new("store.json")).unwrap(), 2);
    }

    #[test]
    fn test_detect_version_without_version_field() {
        let document = serde_json::json!({"projects": [], "tasks": []});
        assert_eq!(detect_version(&document, Path::new("store.json")).unwrap(), 1);
    }

    #[test]
    fn test_detect_version_rejects_non_numeric() {
        let document = serde_json::json!({"version": "one"});
        assert!(matches!(
            detect_version(&document, Path::new("store.json")),
            Err(StorageError::InvalidVersion { .. })
        ));
    }

    #[test]
    fn test_apply_migrations_same_version() {
        let document = serde_json::json!({"version": 1});
        let result = apply_migrations(document.clone(), 1, 1).unwrap();
        assert_eq!(result, document);
    }

    #[test]
    fn test_apply_migrations_future_version() {
        let document = serde_json::json!({"version": 5});
        let result = apply_migrations(document, 5, 1);
        assert!(matches!(result, Err(StorageError::FutureVersion(5))));
    }

    #[test]
    fn test_apply_migrations_without_step_is_unsupported() {
        let document = serde_json::json!({"version": 1});
        let result = apply_migrations(document, 1, 2);
        assert!(matches!(result, Err(StorageError::UnsupportedVersion(1))));
    }
}
