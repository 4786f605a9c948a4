use crate::error::Result;
use crate::processing::EXCLUDE_SENTINEL;

/// Source of target column names offered to clients for mappings.
///
/// Only populates client-side choices; the engine accepts any target name.
pub trait MappingTargetProvider: Send + Sync {
    fn targets(&self, owner_id: &str) -> Result<Vec<String>>;
}

/// Fixed list of targets, the same for every owner.
#[derive(Debug, Clone, Default)]
pub struct StaticMappingTargets {
    targets: Vec<String>,
}

impl StaticMappingTargets {
    pub fn new(targets: Vec<String>) -> Self {
        Self { targets }
    }
}

impl MappingTargetProvider for StaticMappingTargets {
    /// Configured targets in order, deduplicated, with the exclusion sentinel last.
    fn targets(&self, _owner_id: &str) -> Result<Vec<String>> {
        let mut out: Vec<String> = Vec::with_capacity(self.targets.len() + 1);
        for target in &self.targets {
            let target = target.trim();
            if target.eq_ignore_ascii_case(EXCLUDE_SENTINEL) {
                continue;
            }
            if !out.iter().any(|t| t == target) {
                out.push(target.to_string());
            }
        }
        out.push(EXCLUDE_SENTINEL.to_string());
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_targets() {
        let provider = StaticMappingTargets::new(vec![
            "email".into(),
            " firstname ".into(),
            "email".into(),
            "do not import".into(),
        ]);
        assert_eq!(
            provider.targets("u1").unwrap(),
            vec!["email", "firstname", EXCLUDE_SENTINEL]
        );
        assert_eq!(
            StaticMappingTargets::default().targets("u1").unwrap(),
            vec![EXCLUDE_SENTINEL]
        );
    }
}
