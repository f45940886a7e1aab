//! Orchestrator scenarios against an in-memory workspace.

#[cfg(test)]
mod tests {
    use crate::checkpoint::{CaptureLimits, CheckpointKind, CheckpointLimits, CheckpointManager};
    use crate::config::Limits;
    use crate::edit::normalize::{EditAction, NormalizedEdit};
    use crate::edit::{ContextFile, EditError, EditGenerator, EditOrchestrator};
    use crate::workspace::memory::MemoryWorkspace;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    struct CannedGenerator {
        reply: String,
        seen_context: Mutex<Vec<String>>,
    }

    impl CannedGenerator {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen_context: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl EditGenerator for CannedGenerator {
        async fn generate_edits(
            &self,
            _instruction: &str,
            context: &[ContextFile],
        ) -> anyhow::Result<String> {
            *self.seen_context.lock().unwrap() = context.iter().map(|f| f.path.clone()).collect();
            Ok(self.reply.clone())
        }
    }

    struct FailingGenerator;

    #[async_trait]
    impl EditGenerator for FailingGenerator {
        async fn generate_edits(&self, _: &str, _: &[ContextFile]) -> anyhow::Result<String> {
            Err(anyhow::anyhow!("model unavailable"))
        }
    }

    fn setup(
        files: &[(&str, &str)],
    ) -> (Arc<MemoryWorkspace>, Arc<CheckpointManager>, EditOrchestrator) {
        setup_with_limits(files, CheckpointLimits::default())
    }

    fn setup_with_limits(
        files: &[(&str, &str)],
        limits: CheckpointLimits,
    ) -> (Arc<MemoryWorkspace>, Arc<CheckpointManager>, EditOrchestrator) {
        let ws = Arc::new(MemoryWorkspace::with_files(files));
        let checkpoints = Arc::new(CheckpointManager::new(ws.clone(), "sb-test", None, limits));
        let orchestrator =
            EditOrchestrator::new(ws.clone(), checkpoints.clone(), Limits::default());
        (ws, checkpoints, orchestrator)
    }

    fn write(path: &str, content: &str) -> NormalizedEdit {
        NormalizedEdit {
            path: path.to_string(),
            action: EditAction::Write {
                content: content.to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_footer_preview() {
        let (_ws, _cp, orchestrator) = setup(&[("app/page.tsx", "<div>Home</div>")]);
        let generator = CannedGenerator::new(
            r#"{"summary":"Adds a footer","edits":[{"path":"app/page.tsx","content":"<div>Home</div><footer>Hi</footer>"}]}"#,
        );
        let orchestrator = orchestrator.with_generator(generator.clone());

        let plan = orchestrator.prepare("add a footer", &[]).await.unwrap();
        assert_eq!(plan.summary(), Some("Adds a footer"));
        assert_eq!(plan.previews().len(), 1);

        let preview = &plan.previews()[0];
        assert_eq!(preview.path, "app/page.tsx");
        assert_eq!(preview.additions, 1);
        assert_eq!(preview.deletions, 1);
        assert!(preview.changed);
        assert!(!preview.is_new_file);
        assert!(preview.diff.contains("\n-<div>Home</div>"));
        assert!(preview.diff.contains("\n+<div>Home</div><footer>Hi</footer>"));
        assert_eq!(plan.paths(), vec!["app/page.tsx"]);
        assert_eq!(
            *generator.seen_context.lock().unwrap(),
            vec!["app/page.tsx".to_string()]
        );
    }

    #[tokio::test]
    async fn test_prepare_domain_errors() {
        let (_ws, _cp, orchestrator) = setup(&[("app/page.tsx", "x")]);
        let orchestrator = orchestrator.with_generator(CannedGenerator::new(r#"{"edits":[]}"#));
        assert!(matches!(
            orchestrator.prepare("   ", &[]).await,
            Err(EditError::EmptyInstruction)
        ));
        assert!(matches!(
            orchestrator.prepare("do it", &[]).await,
            Err(EditError::NoEffectiveChanges)
        ));
        assert!(matches!(
            orchestrator.prepare("do it", &["missing.ts".to_string()]).await,
            Err(EditError::NoContextFiles)
        ));

        let (_ws, _cp, empty) = setup(&[]);
        let empty = empty.with_generator(CannedGenerator::new("{}"));
        assert!(matches!(
            empty.prepare("do it", &[]).await,
            Err(EditError::NoContextFiles)
        ));

        let (_ws, _cp, failing) = setup(&[("a.ts", "a")]);
        let failing = failing.with_generator(Arc::new(FailingGenerator));
        let err = failing.prepare("do it", &[]).await.unwrap_err();
        assert!(err.to_string().contains("model unavailable"));
    }

    #[tokio::test]
    async fn test_no_ops_dropped_and_new_files_kept() {
        let (_ws, _cp, orchestrator) = setup(&[("a.ts", "same"), ("b.ts", "old")]);
        let candidates = vec![
            json!({"path": "a.ts", "content": "same"}),
            json!({"path": "b.ts", "content": "new"}),
            json!({"path": "components/footer.tsx", "content": "<footer/>"}),
            json!({"path": "ghost.ts", "delete": true}),
            json!({"path": "../escape.ts", "content": "x"}),
        ];

        let plan = orchestrator
            .preview_edits("tidy", &candidates)
            .await
            .unwrap();
        assert_eq!(plan.paths(), vec!["b.ts", "components/footer.tsx"]);
        assert!(plan.previews()[1].is_new_file);
        assert_eq!(plan.previews()[1].additions, 1);
        let preview_paths: Vec<&str> = plan.previews().iter().map(|p| p.path.as_str()).collect();
        assert_eq!(preview_paths, vec!["b.ts", "components/footer.tsx"]);
    }

    #[tokio::test]
    async fn test_delete_of_missing_file_is_no_effective_change() {
        let (_ws, checkpoints, orchestrator) = setup(&[("app/page.tsx", "x")]);
        let edits = vec![NormalizedEdit {
            path: "old.ts".to_string(),
            action: EditAction::Delete,
        }];

        assert!(matches!(
            orchestrator.apply_edits(edits).await,
            Err(EditError::NoEffectiveChanges)
        ));
        // Nothing was applied, so nothing was backed up either
        assert!(checkpoints.list().await.is_empty());
    }

    #[tokio::test]
    async fn test_apply_selected_subset_with_backup() {
        let (ws, checkpoints, orchestrator) =
            setup(&[("a.ts", "a1"), ("b.ts", "b1"), ("old.ts", "x")]);
        let candidates = vec![
            json!({"path": "a.ts", "content": "a2"}),
            json!({"path": "b.ts", "content": "b2"}),
            json!({"path": "old.ts", "delete": true}),
        ];
        let plan = orchestrator
            .preview_edits("update", &candidates)
            .await
            .unwrap();
        assert!(plan.previews()[2].is_deleted);

        let report = orchestrator
            .apply_selected(
                &plan,
                &[
                    "a.ts".to_string(),
                    "./old.ts".to_string(),
                    "zzz.ts".to_string(),
                ],
            )
            .await
            .unwrap();
        assert!(report.is_complete());
        assert_eq!(report.applied, vec!["a.ts", "old.ts"]);
        assert_eq!(ws.get("a.ts").as_deref(), Some("a2"));
        assert_eq!(ws.get("b.ts").as_deref(), Some("b1"));
        assert_eq!(ws.get("old.ts"), None);

        let backup = checkpoints.get(&report.checkpoint_id).await.unwrap();
        assert_eq!(backup.kind, CheckpointKind::BeforeApply);
        assert_eq!(backup.prompt.as_deref(), Some("update"));

        checkpoints.undo_last_apply().await.unwrap();
        assert_eq!(ws.get("a.ts").as_deref(), Some("a1"));
        assert_eq!(ws.get("old.ts").as_deref(), Some("x"));

        assert!(matches!(
            orchestrator.apply_selected(&plan, &[]).await,
            Err(EditError::NothingSelected)
        ));
    }

    #[tokio::test]
    async fn test_partial_failure_still_leaves_backup() {
        let (ws, checkpoints, orchestrator) = setup(&[("a.ts", "a"), ("b.ts", "b")]);
        ws.fail_on("b.ts");

        let report = orchestrator
            .apply_edits(vec![write("a.ts", "A"), write("b.ts", "B")])
            .await
            .unwrap();
        assert_eq!(report.applied, vec!["a.ts"]);
        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].path, "b.ts");
        assert!(report.summary().contains("1 edit(s) failed"));
        assert!(checkpoints.get(&report.checkpoint_id).await.is_some());

        // Every write failing still yields a report and a backup
        ws.fail_on("a.ts");
        let report = orchestrator
            .apply_edits(vec![write("a.ts", "AA")])
            .await
            .unwrap();
        assert!(report.applied.is_empty());
        let backup = checkpoints.last_apply_backup().await.unwrap();
        assert_eq!(backup.id, report.checkpoint_id);
    }

    #[tokio::test]
    async fn test_line_ending_only_edit_is_applied() {
        let (ws, _cp, orchestrator) = setup(&[("a.ts", "x\r\ny\r\n")]);

        let plan = orchestrator
            .preview_edits("normalize endings", &[json!({"path": "a.ts", "content": "x\ny\n"})])
            .await
            .unwrap();
        assert_eq!(plan.paths(), vec!["a.ts"]);
        assert!(plan.previews()[0].changed);
        assert!(plan.previews()[0].diff.contains("Line endings changed"));

        let report = orchestrator
            .apply_edits(vec![write("a.ts", "x\ny\n")])
            .await
            .unwrap();
        assert_eq!(report.applied, vec!["a.ts"]);
        assert_eq!(ws.get("a.ts").as_deref(), Some("x\ny\n"));

        // Byte-identical content is still a no-op
        assert!(matches!(
            orchestrator.apply_edits(vec![write("a.ts", "x\ny\n")]).await,
            Err(EditError::NoEffectiveChanges)
        ));
    }

    #[tokio::test]
    async fn test_backup_covers_targets_beyond_capture_cap() {
        let files = [
            ("f0.ts", "0"),
            ("f1.ts", "1"),
            ("f2.ts", "2"),
            ("f3.ts", "3"),
            ("f4.ts", "4"),
        ];
        let limits = CheckpointLimits {
            capture: CaptureLimits {
                max_files: 3,
                max_bytes: 1024,
            },
            ..CheckpointLimits::default()
        };
        let (ws, checkpoints, orchestrator) = setup_with_limits(&files, limits);

        let report = orchestrator
            .apply_edits(vec![write("f4.ts", "edited")])
            .await
            .unwrap();
        let backup = checkpoints.get(&report.checkpoint_id).await.unwrap();
        assert_eq!(backup.files[0].path, "f4.ts");
        assert!(backup.truncated);

        checkpoints.undo_last_apply().await.unwrap();
        assert_eq!(ws.get("f4.ts").as_deref(), Some("4"));
    }

    #[tokio::test]
    async fn test_apply_refused_when_target_cannot_be_backed_up() {
        let limits = CheckpointLimits {
            capture: CaptureLimits {
                max_files: 10,
                max_bytes: 4,
            },
            ..CheckpointLimits::default()
        };
        let (ws, checkpoints, orchestrator) =
            setup_with_limits(&[("big.ts", "0123456789")], limits);

        let err = orchestrator
            .apply_edits(vec![write("big.ts", "small")])
            .await
            .unwrap_err();
        assert!(matches!(err, EditError::Checkpoint(_)));
        assert_eq!(ws.get("big.ts").as_deref(), Some("0123456789"));
        assert!(checkpoints.list().await.is_empty());
    }
}
