use crate::error::RepairError;
use crate::java::{find_method_text, splice_file};
use crate::target::TargetDescriptor;
use std::fs;
use std::path::Path;

/// Copy the corrected method from the working copy into the original file.
///
/// Only the method's span in `original_file` changes.
pub fn promote(
    working_file: &Path,
    original_file: &Path,
    target: &TargetDescriptor,
) -> Result<(), RepairError> {
    let corrected = fs::read_to_string(working_file).map_err(|e| {
        RepairError::Promotion(format!("cannot read {}: {}", working_file.display(), e))
    })?;

    let method_text = find_method_text(
        &corrected,
        Some(target.owner_simple_name()),
        target.method_name(),
        Some(target.parameter_types()),
    )
    .map_err(|e| RepairError::Promotion(format!("corrected method not found: {}", e)))?;

    splice_file(original_file, &method_text, Some(target.method_name())).map_err(|e| {
        RepairError::Promotion(format!("cannot update {}: {}", original_file.display(), e))
    })?;

    tracing::info!(file = %original_file.display(), method = target.method_name(), "promoted");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    const ORIGINAL: &str = "package p;\n\npublic class C {\n    int keep() {\n        return 1;\n    }\n\n    void run(int a) {\n        a++;\n    }\n\n    void run(String s) {\n        s.trim();\n    }\n}\n";

    const CORRECTED: &str = "package p;\n\npublic class C {\n    void run(String s) {\n        if (s != null) {\n            s.trim();\n        }\n    }\n}\n";

    #[test]
    fn test_promote_changes_only_target_overload() {
        let dir = tempdir().unwrap();
        let working = dir.path().join("work.java");
        let original = dir.path().join("C.java");
        fs::write(&working, CORRECTED).unwrap();
        fs::write(&original, ORIGINAL).unwrap();

        let target = TargetDescriptor::parse(dir.path(), "C.java", "p.C#run(String)").unwrap();
        promote(&working, &original, &target).unwrap();

        let updated = fs::read_to_string(&original).unwrap();
        assert!(updated.contains("    void run(int a) {\n        a++;\n    }"));
        assert!(updated.contains(
            "    void run(String s) {\n        if (s != null) {\n            s.trim();\n        }\n    }"
        ));
        assert!(updated.starts_with("package p;\n\npublic class C {\n    int keep() {"));
    }

    #[test]
    fn test_missing_method_is_promotion_error() {
        let dir = tempdir().unwrap();
        let working = dir.path().join("work.java");
        let original = dir.path().join("C.java");
        fs::write(&working, "public class C { }").unwrap();
        fs::write(&original, ORIGINAL).unwrap();

        let target = TargetDescriptor::parse(dir.path(), "C.java", "p.C#run(String)").unwrap();
        let err = promote(&working, &original, &target).unwrap_err();
        assert!(matches!(err, RepairError::Promotion(_)));
        assert_eq!(fs::read_to_string(&original).unwrap(), ORIGINAL);
    }
}
