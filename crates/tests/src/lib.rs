//! # Integration Tests
//!
//! Integration and end-to-end tests.
//!
//! Responsibilities:
//! - Contract snapshot tests
//! - Stage wiring e2e tests (source -> assembler -> dispatcher)
//! - Configuration-driven client tests

#[cfg(test)]
mod contract_tests {
    use contracts::{BatchingPolicy, Record, RootReference, UploaderSettings};

    #[test]
    fn test_contract_defaults() {
        let policy = BatchingPolicy::default();
        assert_eq!(policy.max_count(), 300);
        assert_eq!(policy.max_size_bytes(), 256 * 1024);

        let settings = UploaderSettings::default();
        assert_eq!(settings.queues.read_buffer_size, 50);
        assert_eq!(settings.queues.batch_buffer_size, 10);
    }

    #[test]
    fn test_input_line_shape() {
        let record: Record = serde_json::from_str(
            r#"{"name":"n","type":"t","body":"payload","attachedMessageIds":[
                {"book":"b","alias":"a","group":"g","timestamp":1,"sequence":2}]}"#,
        )
        .unwrap();
        assert_eq!(record.attached_message_ids.len(), 1);

        let root = RootReference::new("book", "scope", "id");
        assert!(root.record_overhead(&record) > record.estimated_size());
    }
}

#[cfg(test)]
mod e2e_tests {
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    use batcher::{AssemblerReport, BatchAssembler};
    use contracts::{
        stage_channel, Ack, Batch, BatchingPolicy, ContractError, DeliveryClient, RootProvider,
        RootReference, SharedError,
    };
    use dispatcher::{DispatchReport, Dispatcher};
    use ingestion::{JsonRecordDecoder, RecordSource, SourceReport};
    use tempfile::NamedTempFile;

    /// Captures every delivered batch
    #[derive(Clone, Default)]
    struct RecordingClient {
        batches: Arc<Mutex<Vec<Batch>>>,
        closed: Arc<Mutex<bool>>,
    }

    impl DeliveryClient for RecordingClient {
        fn name(&self) -> &str {
            "recording"
        }

        async fn send(&mut self, batch: &Batch) -> Result<Ack, ContractError> {
            self.batches.lock().unwrap().push(batch.clone());
            Ok(Ack {
                records: batch.len(),
                bytes: batch.estimated_size,
            })
        }

        async fn close(&mut self) -> Result<(), ContractError> {
            *self.closed.lock().unwrap() = true;
            Ok(())
        }
    }

    struct StageResults {
        source: Result<SourceReport, SharedError>,
        assembler: Result<AssemblerReport, SharedError>,
        dispatcher: Result<DispatchReport, SharedError>,
    }

    fn events_file(lines: &[String]) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        file.flush().unwrap();
        file
    }

    fn numbered_lines(n: usize) -> Vec<String> {
        (0..n)
            .map(|i| format!(r#"{{"name":"event-{i}","type":"test","body":"payload {i}"}}"#))
            .collect()
    }

    /// Wire the three stages the way the uploader binary does
    async fn run_stages<C>(
        file: &NamedTempFile,
        policy: BatchingPolicy,
        mut client: C,
    ) -> StageResults
    where
        C: DeliveryClient + RootProvider + 'static,
    {
        let root = client
            .create_root("book", "scope", "Root event")
            .await
            .unwrap();
        let (records_tx, records_rx) = stage_channel("records", 4);
        let (batches_tx, batches_rx) = stage_channel("batches", 2);

        let source = tokio::spawn(
            RecordSource::new(file.path().to_path_buf(), JsonRecordDecoder).run(records_tx),
        );
        let assembler =
            tokio::spawn(BatchAssembler::new(policy, Arc::new(root)).run(records_rx, batches_tx));
        let dispatcher = tokio::spawn(Dispatcher::new(client).run(batches_rx));

        StageResults {
            assembler: assembler.await.unwrap(),
            dispatcher: dispatcher.await.unwrap(),
            source: source.await.unwrap(),
        }
    }

    impl RootProvider for RecordingClient {
        async fn create_root(
            &mut self,
            book: &str,
            scope: &str,
            _label: &str,
        ) -> Result<RootReference, ContractError> {
            Ok(RootReference::new(book, scope, "20260101120000000000001"))
        }
    }

    /// End-to-end test: RecordSource -> BatchAssembler -> Dispatcher
    ///
    /// Every record arrives exactly once, in input order, under one root.
    #[tokio::test]
    async fn test_e2e_conserves_records_in_order() {
        let lines = numbered_lines(1000);
        let file = events_file(&lines);
        let client = RecordingClient::default();
        let policy = BatchingPolicy::new(7, 600).unwrap();

        let results = run_stages(&file, policy, client.clone()).await;

        assert_eq!(results.source.unwrap().records, 1000);
        assert_eq!(results.dispatcher.unwrap().records, 1000);
        assert_eq!(results.assembler.unwrap().records, 1000);
        assert!(*client.closed.lock().unwrap());

        let batches = client.batches.lock().unwrap();
        let names: Vec<String> = batches
            .iter()
            .flat_map(|batch| batch.records.iter())
            .map(|record| record.name.clone().unwrap())
            .collect();
        let expected: Vec<String> = (0..1000).map(|i| format!("event-{i}")).collect();
        assert_eq!(names, expected);

        let root = Arc::clone(&batches[0].parent);
        for (index, batch) in batches.iter().enumerate() {
            assert_eq!(batch.batch_id, index as u64 + 1);
            assert!(Arc::ptr_eq(&batch.parent, &root));
            assert!(batch.len() <= 7);
            assert!(!batch.is_empty());
            let last = index + 1 == batches.len();
            if batch.len() < 7 && !last {
                assert!(batch.estimated_size > 600, "short batch not sealed by size");
            }
        }
    }

    #[tokio::test]
    async fn test_e2e_count_scenario() {
        let file = events_file(&numbered_lines(7));
        let client = RecordingClient::default();

        let results = run_stages(&file, BatchingPolicy::new(3, 1 << 20).unwrap(), client.clone())
            .await;

        assert_eq!(results.dispatcher.unwrap().batches, 3);
        let sizes: Vec<usize> = client
            .batches
            .lock()
            .unwrap()
            .iter()
            .map(Batch::len)
            .collect();
        assert_eq!(sizes, vec![3, 3, 1]);
    }

    #[tokio::test]
    async fn test_e2e_decode_error_propagates_to_every_stage() {
        let mut lines = numbered_lines(10);
        lines[8] = r#"{"name":"x","unexpected":true}"#.to_string();
        let file = events_file(&lines);
        let client = RecordingClient::default();

        let results = run_stages(&file, BatchingPolicy::new(3, 1 << 20).unwrap(), client.clone())
            .await;

        let source_err = results.source.unwrap_err();
        assert!(matches!(
            source_err.as_ref(),
            ContractError::Decode { line: 9, .. }
        ));
        assert!(Arc::ptr_eq(&results.assembler.unwrap_err(), &source_err));
        assert!(Arc::ptr_eq(&results.dispatcher.unwrap_err(), &source_err));

        // floor((9 - 1) / 3) full batches, the partial one is dropped
        assert_eq!(client.batches.lock().unwrap().len(), 2);
        assert!(*client.closed.lock().unwrap());
    }

    #[tokio::test]
    async fn test_e2e_empty_input() {
        let file = events_file(&[]);
        let client = RecordingClient::default();

        let results = run_stages(&file, BatchingPolicy::default(), client.clone()).await;

        assert_eq!(results.source.unwrap().records, 0);
        assert_eq!(results.assembler.unwrap().batches, 0);
        assert_eq!(results.dispatcher.unwrap().records, 0);
        assert!(client.batches.lock().unwrap().is_empty());
    }

    /// Configuration directory -> file client -> JSON lines on disk
    #[tokio::test]
    async fn test_e2e_file_client_from_config_dir() {
        let config_dir = tempfile::tempdir().unwrap();
        let output_dir = tempfile::tempdir().unwrap();
        std::fs::write(
            config_dir.path().join("box.json"),
            r#"{"boxName":"box","bookName":"book"}"#,
        )
        .unwrap();
        std::fs::write(
            config_dir.path().join("uploader.toml"),
            format!(
                "[delivery]\nname = \"archive\"\nclient = \"file\"\n\n[delivery.params]\nbase_path = {:?}\nfile_name = \"out.jsonl\"\n",
                output_dir.path().display().to_string()
            ),
        )
        .unwrap();

        let loaded = config_loader::ConfigLoader::load_from_dir(config_dir.path()).unwrap();
        let client = dispatcher::create_client(&loaded.settings.delivery)
            .await
            .unwrap();
        let file = events_file(&numbered_lines(5));

        let results = run_stages(&file, BatchingPolicy::new(2, 1 << 20).unwrap(), client).await;
        assert_eq!(results.dispatcher.unwrap().batches, 3);

        let written = std::fs::read_to_string(output_dir.path().join("out.jsonl")).unwrap();
        let lines: Vec<serde_json::Value> = written
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["root"]["label"], "Root event");
        assert_eq!(lines[0]["root"]["root"]["book"], "book");
        assert_eq!(lines[1]["batch"]["batch_id"], 1);
        assert_eq!(lines[3]["batch"]["records"].as_array().unwrap().len(), 1);
    }
}
