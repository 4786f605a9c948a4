use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info_span};

use super::config::ProcessingConfig;
use super::error::TransformError;
use super::progress::{stage_percent, ProgressEvent, ProgressReporter};
use super::stages;
use super::table::Table;

/// One transformation step. Declaration order is execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    RemoveEmptyColumns,
    RemoveDuplicates,
    MergeColumns,
    MapColumns,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::RemoveEmptyColumns => write!(f, "Removing empty columns"),
            Stage::RemoveDuplicates => write!(f, "Removing duplicates"),
            Stage::MergeColumns => write!(f, "Merging columns"),
            Stage::MapColumns => write!(f, "Mapping columns"),
        }
    }
}

/// Runs the configured stages over a table. Pure: no I/O.
pub struct Pipeline<'a> {
    config: &'a ProcessingConfig,
    stages: Vec<Stage>,
}

impl<'a> Pipeline<'a> {
    pub fn new(config: &'a ProcessingConfig) -> Self {
        Self {
            stages: Self::plan(config),
            config,
        }
    }

    /// Applicable stages for `config`. Empty-column removal is always first.
    pub fn plan(config: &ProcessingConfig) -> Vec<Stage> {
        let mut stages = vec![Stage::RemoveEmptyColumns];
        if config.remove_duplicates {
            stages.push(Stage::RemoveDuplicates);
        }
        if !config.merge_columns.is_empty() {
            stages.push(Stage::MergeColumns);
        }
        if config.has_mappings() {
            stages.push(Stage::MapColumns);
        }
        stages
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Applies every stage in order, reporting after each one.
    ///
    /// On error the reporter has seen only the stages that finished.
    pub fn run(
        &self,
        mut table: Table,
        progress: &dyn ProgressReporter,
    ) -> Result<Table, TransformError> {
        let total = self.stages.len();

        for (index, stage) in self.stages.iter().copied().enumerate() {
            let _step = info_span!("stage", stage = ?stage).entered();
            let rows_before = table.row_count();

            table = self.apply(stage, table)?;

            debug!(
                rows_before,
                rows_after = table.row_count(),
                columns = table.column_count(),
                "stage finished"
            );

            let completed = index + 1;
            progress.report(ProgressEvent::StageCompleted {
                stage,
                completed,
                total,
                percent: stage_percent(completed, total),
            });
        }

        Ok(table)
    }

    fn apply(&self, stage: Stage, table: Table) -> Result<Table, TransformError> {
        let config = self.config;
        match stage {
            Stage::RemoveEmptyColumns => Ok(stages::remove_empty_columns(table)),
            Stage::RemoveDuplicates => Ok(stages::remove_duplicates(
                table,
                &config.duplicate_check_columns,
            )),
            Stage::MergeColumns => Ok(stages::merge_columns(
                table,
                &config.merge_columns,
                &config.merge_delimiter,
            )),
            Stage::MapColumns => stages::apply_column_mappings(table, &config.column_mappings),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressReporter for Recorder {
        fn report(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    impl Recorder {
        fn percents(&self) -> Vec<u8> {
            self.events
                .lock()
                .unwrap()
                .iter()
                .map(|e| match e {
                    ProgressEvent::StageCompleted { percent, .. } => *percent,
                })
                .collect()
        }
    }

    fn table(csv: &str) -> Table {
        Table::from_csv(csv.as_bytes()).unwrap()
    }

    #[test]
    fn test_plan_empty_config() {
        let config = ProcessingConfig::default();
        assert_eq!(Pipeline::plan(&config), vec![Stage::RemoveEmptyColumns]);
    }

    #[test]
    fn test_plan_full_config_order() {
        let mut mappings = BTreeMap::new();
        mappings.insert("a".to_string(), "A".to_string());
        let config = ProcessingConfig {
            remove_duplicates: true,
            duplicate_check_columns: vec!["a".into()],
            merge_columns: vec!["a".into(), "b".into()],
            column_mappings: mappings,
            ..Default::default()
        };
        assert_eq!(
            Pipeline::plan(&config),
            vec![
                Stage::RemoveEmptyColumns,
                Stage::RemoveDuplicates,
                Stage::MergeColumns,
                Stage::MapColumns
            ]
        );
    }

    #[test]
    fn test_empty_config_reports_full_progress() {
        let config = ProcessingConfig::default();
        let recorder = Recorder::default();
        let out = Pipeline::new(&config)
            .run(table("a,b\n1,\n2,\n"), &recorder)
            .unwrap();
        assert_eq!(out.headers, vec!["a"]);
        assert_eq!(recorder.percents(), vec![100]);
    }

    #[test]
    fn test_progress_is_monotonic() {
        let mut mappings = BTreeMap::new();
        mappings.insert("email".to_string(), "contact_email".to_string());
        mappings.insert("first_last".to_string(), "full_name".to_string());
        let config = ProcessingConfig {
            remove_duplicates: true,
            duplicate_check_columns: vec!["email".into()],
            merge_columns: vec!["first".into(), "last".into()],
            merge_delimiter: " ".into(),
            column_mappings: mappings,
        };
        let recorder = Recorder::default();
        let out = Pipeline::new(&config)
            .run(
                table("first,last,email,notes\nJane,Doe,j@x.com,\nJ,D,j@x.com,\nBob,Ray,b@x.com,\n"),
                &recorder,
            )
            .unwrap();

        assert_eq!(recorder.percents(), vec![25, 50, 75, 100]);
        assert_eq!(out.headers, vec!["contact_email", "full_name"]);
        assert_eq!(
            out.rows,
            vec![
                vec!["j@x.com".to_string(), "Jane Doe".to_string()],
                vec!["b@x.com".to_string(), "Bob Ray".to_string()],
            ]
        );
    }

    #[test]
    fn test_mapping_failure_stops_progress() {
        let mut mappings = BTreeMap::new();
        mappings.insert("missing".to_string(), "target".to_string());
        let config = ProcessingConfig {
            remove_duplicates: true,
            duplicate_check_columns: vec!["a".into()],
            column_mappings: mappings,
            ..Default::default()
        };
        let recorder = Recorder::default();
        let result = Pipeline::new(&config).run(table("a\n1\n"), &recorder);

        assert!(matches!(result, Err(TransformError::NoColumnsMapped)));
        assert_eq!(recorder.percents(), vec![33, 67]);
    }
}
