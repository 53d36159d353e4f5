use super::VisionService;
use crate::models::{InferenceReport, VisionAnalysis};
use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct MockVisionClient {
    reports: Arc<Mutex<Vec<InferenceReport>>>,
    call_count: Arc<Mutex<usize>>,
}

impl MockVisionClient {
    pub fn new() -> Self {
        Self {
            reports: Arc::new(Mutex::new(Vec::new())),
            call_count: Arc::new(Mutex::new(0)),
        }
    }

    pub fn with_report(self, report: InferenceReport) -> Self {
        self.reports.lock().unwrap().push(report);
        self
    }

    pub fn with_analysis(self, analysis: VisionAnalysis) -> Self {
        let report = InferenceReport {
            analysis: Some(analysis),
            ..Default::default()
        };
        self.with_report(report)
    }

    pub fn get_call_count(&self) -> usize {
        *self.call_count.lock().unwrap()
    }
}

impl Default for MockVisionClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VisionService for MockVisionClient {
    async fn analyze(&self, image_paths: &[PathBuf], _extra_prompt: &str) -> InferenceReport {
        let mut count = self.call_count.lock().unwrap();
        *count += 1;

        let reports = self.reports.lock().unwrap();
        if reports.is_empty() {
            // Default mock response: a benign description of the batch
            let names: Vec<String> = image_paths
                .iter()
                .map(|p| p.display().to_string())
                .collect();
            let analysis = VisionAnalysis {
                image_contents: format!("Nothing unusual in {}", names.join(", ")),
                ..Default::default()
            };
            InferenceReport {
                analysis: Some(analysis),
                raw_reply: "{}".to_string(),
                failures: Vec::new(),
            }
        } else {
            let index = (*count - 1) % reports.len();
            reports[index].clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Emergency, FailureStage};

    #[tokio::test]
    async fn test_mock_default_report_is_benign() {
        let client = MockVisionClient::new();
        let report = client
            .analyze(&[PathBuf::from("cam/frame1.png")], "")
            .await;

        assert!(report.is_ok());
        let analysis = report.analysis.unwrap();
        assert!(!analysis.emergency.is_emergency());
        assert!(analysis.image_contents.contains("frame1.png"));
    }

    #[tokio::test]
    async fn test_mock_cycles_queued_reports() {
        let mut failing = InferenceReport::default();
        failing.record(FailureStage::RequestSend, "down");

        let client = MockVisionClient::new()
            .with_analysis(VisionAnalysis {
                emergency: Emergency::Fire,
                ..Default::default()
            })
            .with_report(failing);

        let first = client.analyze(&[], "").await;
        assert_eq!(first.analysis.unwrap().emergency, Emergency::Fire);

        let second = client.analyze(&[], "").await;
        assert!(second.failed_at(FailureStage::RequestSend));

        // Cycles back
        let third = client.analyze(&[], "").await;
        assert!(third.is_ok());
        assert_eq!(client.get_call_count(), 3);
    }
}
